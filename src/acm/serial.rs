//! A blocking byte stream over [`CdcAcm`]

use super::{CdcAcm, LineCoding};
use crate::events::Events;
use crate::hardware::Hardware;
use crate::{Device, Error};

/// A USB serial port
///
/// `read` and `write` block by polling the device until they can make
/// progress. Use them from the main loop of a device that isn't also
/// serviced from an interrupt, or mask the controller interrupt with
/// [`Controller::set_interrupts`](crate::Controller::set_interrupts)
/// before sharing.
///
/// ```no_run
/// use fifo_usbd::acm::{AcmBuffers, AcmConfig, CdcAcm, SerialPort};
/// use fifo_usbd::Hardware;
///
/// static mut BUFFERS: AcmBuffers = AcmBuffers::new();
///
/// fn echo<H: Hardware>(usb: H) -> ! {
///     let buffers = unsafe { &mut *core::ptr::addr_of_mut!(BUFFERS) };
///     let acm = CdcAcm::new(AcmConfig::default(), buffers).unwrap();
///     let mut port = SerialPort::new(usb, acm);
///     // After enumeration selects the configuration:
///     port.configure().unwrap();
///
///     let mut line = [0; 32];
///     loop {
///         let count = port.read(&mut line).unwrap_or(0);
///         port.write(&line[..count]);
///     }
/// }
/// ```
pub struct SerialPort<'a, H> {
    device: Device<'a, H, CdcAcm<'a>>,
}

impl<'a, H: Hardware> SerialPort<'a, H> {
    pub fn new(hw: H, acm: CdcAcm<'a>) -> Self {
        SerialPort {
            device: Device::new(hw, acm),
        }
    }

    /// Enable the ACM endpoints
    pub fn configure(&mut self) -> Result<(), Error> {
        self.device.with_class(|acm, ctrl| acm.configure(ctrl))
    }

    pub fn deconfigure(&mut self) {
        self.device.with_class(|acm, ctrl| acm.deconfigure(ctrl))
    }

    /// Fill `buffer` with received bytes
    ///
    /// Blocks until `buffer` is full. Returns early, with the number of
    /// bytes read so far, if the terminal goes away or the class is
    /// deconfigured; 0 means end of stream. Returns
    /// [`Error::Aborted`] while the host signals a break.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        let mut count = 0;
        loop {
            let read = self
                .device
                .with_class(|acm, ctrl| acm.read_available(ctrl, &mut buffer[count..]));
            count += read;
            if count == buffer.len() {
                return Ok(count);
            }

            let acm = self.device.class();
            if acm.is_break_active() {
                return Err(Error::Aborted);
            }
            if !acm.is_present() || !acm.is_configured() {
                return Ok(count);
            }
            self.device.poll();
        }
    }

    /// Send all of `data`
    ///
    /// Blocks while the transmit FIFO is full. Returns early, with the
    /// number of bytes queued, if the terminal goes away or the class is
    /// deconfigured.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut count = 0;
        while count < data.len() {
            let written = self
                .device
                .with_class(|acm, ctrl| acm.write_available(ctrl, &data[count..]));
            count += written;
            if written == 0 {
                if !self.is_connected() {
                    break;
                }
                self.device.poll();
            }
        }
        count
    }

    /// Service the controller
    pub fn poll(&mut self) -> Events {
        self.device.poll()
    }

    /// Number of bytes that `read` could return without blocking
    pub fn can_read(&self) -> usize {
        self.device.class().can_read()
    }

    /// Returns `true` while the host asserts DTR
    pub fn is_present(&self) -> bool {
        self.device.class().is_present()
    }

    pub fn line_coding(&self) -> LineCoding {
        self.device.class().line_coding()
    }

    pub fn device(&self) -> &Device<'a, H, CdcAcm<'a>> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device<'a, H, CdcAcm<'a>> {
        &mut self.device
    }

    pub fn into_device(self) -> Device<'a, H, CdcAcm<'a>> {
        self.device
    }

    fn is_connected(&self) -> bool {
        let acm = self.device.class();
        acm.is_configured() && acm.is_present()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::SerialPort;
    use crate::acm::{AcmBuffers, AcmConfig, CdcAcm};
    use crate::mock::MockHardware;
    use crate::Error;
    use std::vec::Vec;

    const DTR_ON: [u8; 8] = [0x21, 0x22, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
    const DTR_OFF: [u8; 8] = [0x21, 0x22, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

    fn host(port: &mut SerialPort<'_, MockHardware>, func: impl FnOnce(&mut MockHardware)) {
        port.device_mut()
            .with_class(|_, ctrl| func(ctrl.hardware_mut()));
    }

    fn open<'a>(buffers: &'a mut AcmBuffers) -> SerialPort<'a, MockHardware> {
        let acm = CdcAcm::new(AcmConfig::DEFAULT, buffers).unwrap();
        let mut port = SerialPort::new(MockHardware::new(), acm);
        port.configure().unwrap();
        host(&mut port, |hw| hw.host_setup(DTR_ON));
        port.poll();
        assert!(port.is_present());
        port
    }

    #[test]
    fn write_waits_for_room() {
        let mut buffers = AcmBuffers::new();
        let mut port = open(&mut buffers);
        let data: Vec<u8> = (0..200).map(|i| i as u8).collect();

        assert_eq!(port.write(&data), data.len());
        // Completing packets took polls inside write
        assert!(port.device().controller().hardware().sent[2].len() >= 2);

        for _ in 0..8 {
            if port.device().class().is_write_idle() {
                break;
            }
            port.poll();
        }
        assert!(port.device().class().is_write_idle());
        let hw = port.device().controller().hardware();
        assert_eq!(hw.sent_bytes(2), data);
        assert!(hw.sent[2].iter().all(|packet| packet.len() <= 64));
    }

    #[test]
    fn write_without_terminal_stops_at_full_fifo() {
        let mut buffers = AcmBuffers::new();
        let acm = CdcAcm::new(AcmConfig::DEFAULT, &mut buffers).unwrap();
        let mut port = SerialPort::new(MockHardware::new(), acm);
        assert_eq!(port.write(b"unconfigured"), 0);

        port.configure().unwrap();
        // One packet in flight, one FIFO full
        assert_eq!(port.write(&[0x55; 300]), 128);
    }

    #[test]
    fn read_blocks_until_full() {
        let mut buffers = AcmBuffers::new();
        let mut port = open(&mut buffers);
        host(&mut port, |hw| {
            hw.host_out(1, b"abc");
            hw.host_out(1, b"def");
        });

        let mut line = [0; 6];
        assert_eq!(port.read(&mut line), Ok(6));
        assert_eq!(&line, b"abcdef");
        assert_eq!(port.can_read(), 0);
    }

    #[test]
    fn read_returns_partial_on_disconnect() {
        let mut buffers = AcmBuffers::new();
        let mut port = open(&mut buffers);
        host(&mut port, |hw| {
            hw.host_out(1, b"abc");
            hw.host_setup(DTR_OFF);
        });

        let mut line = [0; 8];
        assert_eq!(port.read(&mut line), Ok(3));
        assert_eq!(&line[..3], b"abc");
        // End of stream
        assert_eq!(port.read(&mut line), Ok(0));
    }

    #[test]
    fn read_aborts_on_break() {
        let mut buffers = AcmBuffers::new();
        let mut port = open(&mut buffers);
        host(&mut port, |hw| {
            hw.host_setup([0x21, 0x23, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00])
        });

        let mut line = [0; 4];
        assert_eq!(port.read(&mut line), Err(Error::Aborted));
        assert!(port.device().class().is_break_active());
    }

    #[test]
    fn line_coding_follows_host() {
        let mut buffers = AcmBuffers::new();
        let mut port = open(&mut buffers);
        assert_eq!(port.line_coding().baud(), 9600);

        host(&mut port, |hw| {
            hw.host_setup([0x21, 0x20, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00])
        });
        port.poll();
        host(&mut port, |hw| {
            hw.host_out(0, &[0x40, 0x4B, 0x4C, 0x00, 0x00, 0x00, 0x08])
        });
        port.poll();
        assert_eq!(port.line_coding().baud(), 5_000_000);
    }
}
