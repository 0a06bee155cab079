//! USB SETUP packets

use usb_device::UsbDirection;

/// `bmRequestType` bits 6..5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Standard,
    Class,
    Vendor,
    Reserved,
}

/// `bmRequestType` bits 4..0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other,
    Reserved,
}

/// The 8-byte header of a control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    /// Size of a SETUP packet on the wire
    pub const LEN: usize = 8;

    /// Decode a packet, little endian fields
    pub fn from_bytes(raw: [u8; Self::LEN]) -> Self {
        SetupPacket {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    /// Direction of the data stage
    pub fn direction(&self) -> UsbDirection {
        if self.request_type & 0x80 != 0 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        }
    }

    pub fn kind(&self) -> RequestKind {
        match (self.request_type >> 5) & 0b11 {
            0 => RequestKind::Standard,
            1 => RequestKind::Class,
            2 => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self.request_type & 0x1F {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        }
    }

    /// Returns `true` if the transfer has a data stage
    pub fn has_data_stage(&self) -> bool {
        self.length != 0
    }
}

#[cfg(test)]
mod tests {
    use super::{Recipient, RequestKind, SetupPacket};
    use usb_device::UsbDirection;

    #[test]
    fn decode_get_line_coding() {
        let setup = SetupPacket::from_bytes([0xA1, 0x21, 0x00, 0x00, 0x02, 0x00, 0x07, 0x00]);
        assert_eq!(setup.request, 0x21);
        assert_eq!(setup.value, 0);
        assert_eq!(setup.index, 2);
        assert_eq!(setup.length, 7);
        assert_eq!(setup.direction(), UsbDirection::In);
        assert_eq!(setup.kind(), RequestKind::Class);
        assert_eq!(setup.recipient(), Recipient::Interface);
        assert!(setup.has_data_stage());
    }

    #[test]
    fn decode_set_address() {
        let raw = [0x00, 0x05, 0x2A, 0x00, 0x00, 0x00, 0x00, 0x00];
        let setup = SetupPacket::from_bytes(raw);
        assert_eq!(setup.value, 42);
        assert_eq!(setup.direction(), UsbDirection::Out);
        assert_eq!(setup.kind(), RequestKind::Standard);
        assert_eq!(setup.recipient(), Recipient::Device);
        assert!(!setup.has_data_stage());
        assert_eq!(setup.to_bytes(), raw);
    }

    #[test]
    fn multibyte_fields_are_little_endian() {
        let setup = SetupPacket::from_bytes([0xC2, 0xFF, 0x34, 0x12, 0x78, 0x56, 0x00, 0x01]);
        assert_eq!(setup.value, 0x1234);
        assert_eq!(setup.index, 0x5678);
        assert_eq!(setup.length, 256);
        assert_eq!(setup.kind(), RequestKind::Vendor);
        assert_eq!(setup.recipient(), Recipient::Endpoint);
    }
}
