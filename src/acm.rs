//! CDC-ACM virtual serial port
//!
//! [`CdcAcm`] is a [`Class`] that answers the ACM control requests, keeps
//! one OUT request armed while a terminal is attached, and drains a
//! transmit FIFO through the bulk IN endpoint. [`SerialPort`] puts a
//! blocking byte stream on top.
//!
//! Descriptors and `SET_CONFIGURATION` belong to the enumeration layer.
//! Call [`CdcAcm::configure`] once the host selects the configuration.

mod line_coding;
mod serial;

pub use line_coding::{LineCoding, Parity, StopBits};
pub use serial::SerialPort;

use crate::device::Class;
use crate::endpoint::{EndpointConfig, EndpointDirectionType};
use crate::events::{Events, Signals};
use crate::fifo::Fifo;
use crate::hardware::Hardware;
use crate::setup::{Recipient, RequestKind, SetupPacket};
use crate::{Controller, Error, TransferRequest};
use core::ops::Range;
use usb_device::{endpoint::EndpointAddress, UsbDirection};

pub const SET_LINE_CODING: u8 = 0x20;
pub const GET_LINE_CODING: u8 = 0x21;
pub const SET_CONTROL_LINE_STATE: u8 = 0x22;
pub const SEND_BREAK: u8 = 0x23;

/// `SERIAL_STATE` notification code
const SERIAL_STATE: u8 = 0x20;

const CONTROL_LINE_DTR: u16 = 1 << 0;
const CONTROL_LINE_RTS: u16 = 1 << 1;

/// Size of the bulk request buffers
pub const EP_BUFFER_SIZE: usize = 64;
/// Capacity of each byte FIFO
pub const FIFO_SIZE: usize = 64;
/// Size of a `SERIAL_STATE` notification
pub const NOTIFICATION_LEN: usize = 10;

// Request tags
const READ: usize = 1;
const WRITE: usize = 2;
const NOTIFY: usize = 3;
const LINE_CODING: usize = 4;

bitflags::bitflags! {
    /// `SERIAL_STATE` notification bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SerialState: u16 {
        /// bRxCarrier
        const DCD = 1 << 0;
        /// bTxCarrier
        const DSR = 1 << 1;
        const BREAK = 1 << 2;
        const RING = 1 << 3;
        const FRAMING = 1 << 4;
        const PARITY = 1 << 5;
        const OVERRUN = 1 << 6;
    }
}

/// Interface and endpoint numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcmConfig {
    /// Communication interface number, matched against `wIndex`.
    pub interface: u16,
    /// Bulk OUT endpoint.
    pub out_endpoint: usize,
    /// Bulk IN endpoint.
    pub in_endpoint: usize,
    /// Interrupt IN endpoint for notifications.
    pub notify_endpoint: usize,
    pub max_packet_size: u16,
}

impl AcmConfig {
    pub const DEFAULT: Self = AcmConfig {
        interface: 0,
        out_endpoint: 1,
        in_endpoint: 2,
        notify_endpoint: 3,
        max_packet_size: 64,
    };

    fn validate(&self) -> Result<(), Error> {
        EndpointConfig::new(self.out_endpoint, EndpointDirectionType::Out, self.max_packet_size)?;
        EndpointConfig::new(self.in_endpoint, EndpointDirectionType::In, self.max_packet_size)?;
        EndpointConfig::new(self.notify_endpoint, EndpointDirectionType::In, self.max_packet_size)?;
        if self.out_endpoint == self.in_endpoint
            || self.out_endpoint == self.notify_endpoint
            || self.in_endpoint == self.notify_endpoint
        {
            return Err(Error::InvalidEndpoint);
        }
        Ok(())
    }

    fn endpoints(&self) -> [usize; 3] {
        [self.out_endpoint, self.in_endpoint, self.notify_endpoint]
    }
}

impl Default for AcmConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Memory for the class's transfer requests
///
/// Typically a `static`, since the class borrows it for as long as the
/// device lives.
pub struct AcmBuffers {
    read: [u8; EP_BUFFER_SIZE],
    write: [u8; EP_BUFFER_SIZE],
    coding: [u8; LineCoding::LEN],
    notify: [u8; NOTIFICATION_LEN],
}

impl AcmBuffers {
    pub const fn new() -> Self {
        AcmBuffers {
            read: [0; EP_BUFFER_SIZE],
            write: [0; EP_BUFFER_SIZE],
            coding: [0; LineCoding::LEN],
            notify: [0; NOTIFICATION_LEN],
        }
    }
}

impl Default for AcmBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `SERIAL_STATE` notification for `interface`
pub fn serial_state_notification(interface: u16, state: SerialState) -> [u8; NOTIFICATION_LEN] {
    let interface = interface.to_le_bytes();
    let state = state.bits().to_le_bytes();
    [
        0xA1,
        SERIAL_STATE,
        0x00,
        0x00,
        interface[0],
        interface[1],
        0x02,
        0x00,
        state[0],
        state[1],
    ]
}

/// The CDC-ACM class driver
///
/// A buffer field is `None` while its request is with the controller.
pub struct CdcAcm<'a> {
    config: AcmConfig,
    configured: bool,
    dte_present: bool,
    rts: bool,
    break_active: bool,
    line_coding: LineCoding,
    rx: Fifo<FIFO_SIZE>,
    tx: Fifo<FIFO_SIZE>,
    read: Option<&'a mut [u8]>,
    write: Option<&'a mut [u8]>,
    coding: Option<&'a mut [u8]>,
    notify: Option<&'a mut [u8]>,
    /// Received bytes that didn't fit in `rx`, still in the read buffer
    backlog: Range<usize>,
    on_line_coding: Option<fn(&LineCoding) -> bool>,
    on_connect: Option<fn(bool)>,
    on_read_ready: Option<fn()>,
}

impl<'a> CdcAcm<'a> {
    /// Create the class, borrowing its request buffers
    ///
    /// Fails with [`Error::InvalidEndpoint`] if the endpoint numbers overlap,
    /// or aren't valid data endpoints.
    pub fn new(config: AcmConfig, buffers: &'a mut AcmBuffers) -> Result<Self, Error> {
        config.validate()?;
        let AcmBuffers {
            read,
            write,
            coding,
            notify,
        } = buffers;
        Ok(CdcAcm {
            config,
            configured: false,
            dte_present: false,
            rts: false,
            break_active: false,
            line_coding: LineCoding::DEFAULT,
            rx: Fifo::new(),
            tx: Fifo::new(),
            read: Some(&mut read[..]),
            write: Some(&mut write[..]),
            coding: Some(&mut coding[..]),
            notify: Some(&mut notify[..]),
            backlog: 0..0,
            on_line_coding: None,
            on_connect: None,
            on_read_ready: None,
        })
    }

    /// Validate each new line coding
    ///
    /// Return `false` to reject it. The host sees a stall, and the previous
    /// coding stays in effect.
    pub fn on_line_coding(mut self, hook: fn(&LineCoding) -> bool) -> Self {
        self.on_line_coding = Some(hook);
        self
    }

    /// Called with the new DTR state whenever it changes
    pub fn on_connect(mut self, hook: fn(bool)) -> Self {
        self.on_connect = Some(hook);
        self
    }

    /// Called after received data lands in the FIFO
    pub fn on_read_ready(mut self, hook: fn()) -> Self {
        self.on_read_ready = Some(hook);
        self
    }

    pub fn config(&self) -> &AcmConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Returns `true` while the host asserts DTR
    pub fn is_present(&self) -> bool {
        self.dte_present
    }

    pub fn rts(&self) -> bool {
        self.rts
    }

    pub fn is_break_active(&self) -> bool {
        self.break_active
    }

    pub fn line_coding(&self) -> LineCoding {
        self.line_coding
    }

    /// Number of received bytes ready to read
    pub fn can_read(&self) -> usize {
        self.rx.len() + self.backlog.len()
    }

    /// Returns `true` once every written byte has been sent
    pub fn is_write_idle(&self) -> bool {
        self.tx.is_empty() && self.write.is_some()
    }

    /// Enable the class's endpoints
    ///
    /// Any data still queued from an earlier configuration is dropped.
    pub fn configure<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>) -> Result<(), Error> {
        let mps = self.config.max_packet_size;
        ctrl.configure_endpoint(self.config.out_endpoint, EndpointDirectionType::Out, mps)?;
        ctrl.configure_endpoint(self.config.in_endpoint, EndpointDirectionType::In, mps)?;
        ctrl.configure_endpoint(self.config.notify_endpoint, EndpointDirectionType::In, mps)?;
        self.reset_state();
        self.configured = true;
        debug!("ACM CONFIGURED");
        Ok(())
    }

    /// Disable the class's endpoints, aborting their requests
    pub fn deconfigure<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>) {
        {
            let mut cs = ctrl.lock();
            for ep in self.config.endpoints() {
                cs.reset_endpoint_locked(ep);
            }
        }
        let was_present = self.dte_present;
        self.configured = false;
        self.reset_state();
        if was_present {
            if let Some(hook) = self.on_connect {
                hook(false);
            }
        }
        debug!("ACM DECONFIGURED");
    }

    /// Take received bytes
    ///
    /// Returns the number of bytes copied into `out`.
    pub fn read_available<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, out: &mut [u8]) -> usize {
        let count = self.rx.pop(out);
        self.refill(ctrl);
        count
    }

    /// Queue bytes for the host
    ///
    /// Returns the number of bytes accepted, which is 0 if the FIFO is full
    /// or the class isn't configured.
    pub fn write_available<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, data: &[u8]) -> usize {
        if !self.configured {
            return 0;
        }
        let count = self.tx.push(data);
        self.start_write(ctrl);
        count
    }

    fn reset_state(&mut self) {
        self.rx.clear();
        self.tx.clear();
        self.backlog = 0..0;
        self.dte_present = false;
        self.rts = false;
        self.break_active = false;
    }

    /// Move the backlog into the FIFO, and rearm the read once it's empty
    fn refill<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>) {
        if !self.backlog.is_empty() {
            if let Some(buffer) = self.read.as_deref() {
                let taken = self.rx.push(&buffer[self.backlog.clone()]);
                self.backlog.start += taken;
            }
        }
        self.start_read(ctrl);
    }

    fn start_read<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>) {
        if !self.configured || !self.backlog.is_empty() {
            return;
        }
        let Some(buffer) = self.read.take() else {
            return;
        };
        let ep = EndpointAddress::from_parts(self.config.out_endpoint, UsbDirection::Out);
        if let Err(rejected) = ctrl.submit(TransferRequest::new(ep, buffer).with_context(READ)) {
            self.read = Some(rejected.into_buffer());
        }
    }

    /// Send up to one packet from the transmit FIFO, if the IN endpoint is
    /// idle
    fn start_write<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>) {
        if !self.configured || self.tx.is_empty() {
            return;
        }
        let Some(buffer) = self.write.take() else {
            return;
        };
        let limit = buffer.len().min(self.config.max_packet_size as usize);
        let len = self.tx.peek(&mut buffer[..limit]);
        let ep = EndpointAddress::from_parts(self.config.in_endpoint, UsbDirection::In);
        let request = TransferRequest::new(ep, buffer).with_length(len).with_context(WRITE);
        match ctrl.submit(request) {
            Ok(()) => self.tx.consume(len),
            Err(rejected) => self.write = Some(rejected.into_buffer()),
        }
    }

    fn notify_serial_state<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>) {
        let Some(buffer) = self.notify.take() else {
            return;
        };
        let notification = serial_state_notification(self.config.interface, SerialState::DSR);
        buffer[..NOTIFICATION_LEN].copy_from_slice(&notification);
        let ep = EndpointAddress::from_parts(self.config.notify_endpoint, UsbDirection::In);
        if let Err(rejected) = ctrl.submit(TransferRequest::new(ep, buffer).with_context(NOTIFY)) {
            self.notify = Some(rejected.into_buffer());
        }
    }

    fn set_control_line_state<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, value: u16) {
        let dtr = value & CONTROL_LINE_DTR != 0;
        self.rts = value & CONTROL_LINE_RTS != 0;
        if dtr == self.dte_present {
            return;
        }

        self.dte_present = dtr;
        debug!("ACM DTR {}", dtr);
        if dtr {
            self.notify_serial_state(ctrl);
            self.start_read(ctrl);
        }
        if let Some(hook) = self.on_connect {
            hook(dtr);
        }
    }

    fn set_line_coding<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, setup: &SetupPacket) -> bool {
        if setup.length as usize != LineCoding::LEN || setup.direction() != UsbDirection::Out {
            return false;
        }
        self.submit_line_coding(ctrl, UsbDirection::Out)
    }

    fn get_line_coding<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, setup: &SetupPacket) -> bool {
        if setup.direction() != UsbDirection::In {
            return false;
        }
        if let Some(buffer) = self.coding.as_deref_mut() {
            buffer.copy_from_slice(&self.line_coding.to_bytes());
        }
        self.submit_line_coding(ctrl, UsbDirection::In)
    }

    fn submit_line_coding<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, direction: UsbDirection) -> bool {
        let Some(buffer) = self.coding.take() else {
            return false;
        };
        let ep = EndpointAddress::from_parts(0, direction);
        match ctrl.submit(TransferRequest::new(ep, buffer).with_context(LINE_CODING)) {
            Ok(()) => true,
            Err(rejected) => {
                self.coding = Some(rejected.into_buffer());
                false
            }
        }
    }

    /// The `SET_LINE_CODING` data stage finished
    ///
    /// The status stage waits on validation.
    fn line_coding_received<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, request: TransferRequest<'a>) {
        let hook = self.on_line_coding;
        let coding = LineCoding::from_bytes(request.data())
            .filter(|coding| hook.map_or(true, |hook| hook(coding)));
        self.coding = Some(request.into_buffer());

        match coding {
            Some(coding) => {
                self.line_coding = coding;
                debug!(
                    "ACM LINE CODING {} {} {} {}",
                    coding.baud(),
                    coding.data_bits(),
                    coding.parity() as u8,
                    coding.stop_bits() as u8
                );
                if ctrl.acknowledge_status_stage().is_err() {
                    warn!("ACM LINE CODING STATUS STAGE");
                }
            }
            None => {
                warn!("ACM LINE CODING REJECTED");
                let _ = ctrl.stall(0);
            }
        }
    }

    fn read_complete<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, request: TransferRequest<'a>) {
        if request.error().is_some() {
            self.read = Some(request.into_buffer());
            return;
        }

        let len = request.transferred_length();
        let buffer = request.into_buffer();
        let taken = self.rx.push(&buffer[..len]);
        self.backlog = taken..len;
        self.read = Some(buffer);
        trace!("ACM READ {} BACKLOG {}", len, len - taken);

        if taken > 0 {
            if let Some(hook) = self.on_read_ready {
                hook();
            }
        }
        self.start_read(ctrl);
    }
}

impl<'a> Class<'a> for CdcAcm<'a> {
    fn setup<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, setup: &SetupPacket) -> bool {
        if setup.kind() != RequestKind::Class
            || setup.recipient() != Recipient::Interface
            || setup.index != self.config.interface
        {
            return false;
        }

        match setup.request {
            SET_LINE_CODING => self.set_line_coding(ctrl, setup),
            GET_LINE_CODING => self.get_line_coding(ctrl, setup),
            SET_CONTROL_LINE_STATE if !setup.has_data_stage() => {
                self.set_control_line_state(ctrl, setup.value);
                ctrl.acknowledge_status_stage().is_ok()
            }
            SEND_BREAK if !setup.has_data_stage() => {
                self.break_active = setup.value != 0;
                debug!("ACM BREAK {}", self.break_active);
                ctrl.acknowledge_status_stage().is_ok()
            }
            _ => false,
        }
    }

    fn complete<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, request: TransferRequest<'a>) {
        match request.context() {
            READ => self.read_complete(ctrl, request),
            WRITE => {
                let sent = request.error().is_none();
                self.write = Some(request.into_buffer());
                if sent {
                    self.start_write(ctrl);
                }
            }
            NOTIFY => self.notify = Some(request.into_buffer()),
            LINE_CODING => {
                if request.direction() == UsbDirection::Out && request.error().is_none() {
                    self.line_coding_received(ctrl, request);
                } else {
                    self.coding = Some(request.into_buffer());
                }
            }
            _ => {}
        }
    }

    fn event<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, events: &Events) {
        if events.contains(Signals::VBUS) {
            ctrl.connect();
        }
        if events.contains(Signals::NO_VBUS) {
            ctrl.disconnect();
        }
        if events.signals().intersects(Signals::BUS_RESET | Signals::NO_VBUS) && self.configured {
            self.deconfigure(ctrl);
        }
    }
}
