//! The seam between the protocol engine and the USB controller

use crate::endpoint::EndpointDirectionType;
use crate::Error;

bitflags::bitflags! {
    /// Bus-level interrupt sources
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BusFlags: u8 {
        /// The host drove a bus reset.
        const RESET = 1 << 0;
        /// The bus has been idle long enough to suspend.
        const SUSPEND = 1 << 1;
        /// Resume signalling was detected.
        const RESUME = 1 << 2;
        /// A start-of-frame token was received.
        const SOF = 1 << 3;
        /// VBUS became valid.
        const VBUS = 1 << 4;
        /// VBUS went away.
        const NO_VBUS = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Endpoint 0 control and status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Ep0Status: u8 {
        /// A SETUP or OUT data packet is held in the endpoint 0 FIFO.
        const OUT_PACKET_READY = 1 << 0;
        /// A protocol stall was handshaked to the host.
        const SENT_STALL = 1 << 1;
        /// The host ended the control transfer before its status stage.
        const SETUP_END = 1 << 2;
    }
}

/// Interrupt flags latched by the controller
///
/// Bit `n` of `ep_in` / `ep_out` maps to endpoint `n`. Endpoint 0 only
/// signals through bit 0 of `ep_in`; its details come from
/// [`Hardware::ep0_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawFlags {
    pub bus: BusFlags,
    pub ep_in: u16,
    pub ep_out: u16,
}

impl RawFlags {
    /// No pending interrupts
    pub const fn empty() -> Self {
        RawFlags {
            bus: BusFlags::empty(),
            ep_in: 0,
            ep_out: 0,
        }
    }
}

/// A FIFO-based full-speed USB device controller
///
/// Implement this for your controller's register block. The protocol
/// engine only calls these methods from inside its critical section, so
/// implementations don't need their own locking.
///
/// Endpoint arguments are endpoint numbers, `0..MAX_ENDPOINTS`. Data
/// endpoints are unidirectional: the direction is fixed by
/// [`set_endpoint_config`](Hardware::set_endpoint_config).
///
/// # Example
///
/// A controller with memory-mapped FIFOs might start like this.
///
/// ```ignore
/// use fifo_usbd::{Hardware, RawFlags, Ep0Status, EndpointDirectionType, Error};
///
/// struct Musb { regs: &'static RegisterBlock }
///
/// impl Hardware for Musb {
///     fn read_fifo_byte(&mut self, ep: usize) -> u8 {
///         self.regs.fifo[ep].read()
///     }
///     fn write_fifo_byte(&mut self, ep: usize, byte: u8) {
///         self.regs.fifo[ep].write(byte)
///     }
///     // ...
/// }
/// ```
pub trait Hardware {
    /// Read the next byte out of an endpoint's receive FIFO.
    fn read_fifo_byte(&mut self, ep: usize) -> u8;
    /// Append a byte to an endpoint's transmit FIFO.
    fn write_fifo_byte(&mut self, ep: usize, byte: u8);
    /// Read, then clear, every latched interrupt flag.
    ///
    /// A flag reported here must not be reported again by the next call.
    fn read_and_clear_interrupt_flags(&mut self) -> RawFlags;

    /// Program a data endpoint's direction and maximum packet size.
    ///
    /// This also resets the endpoint's data toggle. `Disabled` turns the
    /// endpoint off.
    fn set_endpoint_config(&mut self, ep: usize, direction: EndpointDirectionType, max_packet_size: u16);
    /// Halt an endpoint.
    ///
    /// On endpoint 0, this serves the held packet with a protocol stall.
    fn assert_stall(&mut self, ep: usize);
    /// Clear an endpoint halt, and reset its data toggle.
    fn clear_stall(&mut self, ep: usize);
    /// Set the device address.
    ///
    /// Fails with [`Error::InvalidAddress`] if `addr > 127`.
    fn set_address(&mut self, addr: u8) -> Result<(), Error>;

    /// Returns the number of unread bytes of the OUT packet held in the FIFO.
    ///
    /// `None` if software doesn't hold a packet, because hardware owns the
    /// FIFO.
    fn out_packet_len(&mut self, ep: usize) -> Option<usize>;
    /// Return a data endpoint's OUT FIFO to the hardware so that it can
    /// accept the next packet.
    fn release_out(&mut self, ep: usize);
    /// Send the bytes loaded into a data endpoint's IN FIFO.
    fn arm_in(&mut self, ep: usize);

    /// Endpoint 0 status, read once per endpoint 0 interrupt.
    fn ep0_status(&mut self) -> Ep0Status;
    /// Acknowledge the latched `SENT_STALL` and / or `SETUP_END` bits.
    fn ep0_clear(&mut self, status: Ep0Status);
    /// Serve the packet held in the endpoint 0 FIFO.
    ///
    /// When `data_end` is set, the controller also completes the status stage.
    fn ep0_ack_out(&mut self, data_end: bool);
    /// Send the loaded endpoint 0 IN packet.
    ///
    /// `data_end` marks the last packet of the data stage.
    fn ep0_arm_in(&mut self, data_end: bool);

    /// Mask, or unmask, the controller's interrupt.
    fn set_interrupts(&mut self, enabled: bool);
    /// Enable or disable bus-level interrupt sources.
    fn set_bus_interrupts(&mut self, sources: BusFlags, enabled: bool);
    /// Enable the D+ pull-up, making the device visible to the host.
    fn connect(&mut self);
    /// Disable the D+ pull-up.
    fn disconnect(&mut self);
    /// Drive, or stop driving, resume signalling on the bus.
    fn signal_resume(&mut self, active: bool);
}
