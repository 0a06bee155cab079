//! The CDC line coding structure

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One = 0,
    OnePointFive = 1,
    Two = 2,
}

impl StopBits {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(StopBits::One),
            1 => Some(StopBits::OnePointFive),
            2 => Some(StopBits::Two),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None = 0,
    Odd = 1,
    Even = 2,
    Mark = 3,
    Space = 4,
}

impl Parity {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Parity::None),
            1 => Some(Parity::Odd),
            2 => Some(Parity::Even),
            3 => Some(Parity::Mark),
            4 => Some(Parity::Space),
            _ => None,
        }
    }
}

/// Serial parameters requested by the host
///
/// The device doesn't drive a UART with these. They're published so that
/// a bridge to a real serial port can follow them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCoding {
    baud: u32,
    stop_bits: StopBits,
    parity: Parity,
    data_bits: u8,
}

impl LineCoding {
    /// Size of the line coding on the wire
    pub const LEN: usize = 7;

    /// 9600 baud, 8 data bits, no parity, 1 stop bit
    pub const DEFAULT: Self = LineCoding {
        baud: 9600,
        stop_bits: StopBits::One,
        parity: Parity::None,
        data_bits: 8,
    };

    /// Returns `None` if `data_bits` isn't 5, 6, 7, 8 or 16
    pub const fn new(baud: u32, data_bits: u8, parity: Parity, stop_bits: StopBits) -> Option<Self> {
        match data_bits {
            5..=8 | 16 => Some(LineCoding {
                baud,
                stop_bits,
                parity,
                data_bits,
            }),
            _ => None,
        }
    }

    /// Decode the line coding from `SET_LINE_CODING` data
    ///
    /// Returns `None` unless `raw` is exactly [`LEN`](Self::LEN) bytes of
    /// valid fields.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let raw: &[u8; Self::LEN] = raw.try_into().ok()?;
        let baud = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let stop_bits = StopBits::from_raw(raw[4])?;
        let parity = Parity::from_raw(raw[5])?;
        Self::new(baud, raw[6], parity, stop_bits)
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let baud = self.baud.to_le_bytes();
        [
            baud[0],
            baud[1],
            baud[2],
            baud[3],
            self.stop_bits as u8,
            self.parity as u8,
            self.data_bits,
        ]
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn data_bits(&self) -> u8 {
        self.data_bits
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        Self::DEFAULT
    }
}
