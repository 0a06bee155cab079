//! The protocol engine's shared state

use crate::control::ControlPipe;
use crate::critical::CriticalSection;
use crate::endpoint::{EndpointConfig, EndpointDirectionType};
use crate::events::Events;
use crate::hardware::{BusFlags, Hardware};
use crate::request::TransferRequest;
use crate::{Error, MAX_ENDPOINTS};

/// Number of request slots, one per endpoint and direction
pub(crate) const SLOT_COUNT: usize = MAX_ENDPOINTS * 2;

/// A USB device controller
///
/// `Controller` owns the hardware, the endpoint configurations, the
/// endpoint 0 control state, and every request slot. Interrupt service and
/// API calls both take it by exclusive reference, and both run inside a
/// [`CriticalSection`].
///
/// Most applications drive a `Controller` through a [`Device`](crate::Device),
/// which also delivers completions to a class driver.
pub struct Controller<'a, H> {
    pub(crate) hw: H,
    pub(crate) endpoints: [EndpointConfig; MAX_ENDPOINTS],
    pub(crate) pending: [Option<TransferRequest<'a>>; SLOT_COUNT],
    pub(crate) completed: [Option<TransferRequest<'a>>; SLOT_COUNT],
    pub(crate) control: ControlPipe,
    pub(crate) interrupts: bool,
    pub(crate) mask_depth: u8,
}

impl<'a, H: Hardware> Controller<'a, H> {
    /// Create a controller with every data endpoint disabled
    ///
    /// The controller interrupt stays masked until you call
    /// [`set_interrupts`](Self::set_interrupts).
    pub fn new(hw: H) -> Self {
        let mut endpoints = [EndpointConfig::DISABLED; MAX_ENDPOINTS];
        endpoints[0] = EndpointConfig::CONTROL;
        Controller {
            hw,
            endpoints,
            pending: core::array::from_fn(|_| None),
            completed: core::array::from_fn(|_| None),
            control: ControlPipe::new(),
            interrupts: false,
            mask_depth: 0,
        }
    }

    /// Enter a critical section
    pub fn lock(&mut self) -> CriticalSection<'_, 'a, H> {
        CriticalSection::enter(self)
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Access the hardware outside of the protocol engine's bookkeeping
    ///
    /// The protocol engine can't see what you do here. Prefer the
    /// controller's methods.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Release the hardware
    ///
    /// Pending requests, and their buffers, are dropped.
    pub fn release(self) -> H {
        self.hw
    }

    /// Enable (`true`) or disable (`false`) the controller interrupt
    ///
    /// Critical sections restore this setting when they end.
    pub fn set_interrupts(&mut self, enabled: bool) {
        self.interrupts = enabled;
        if self.mask_depth == 0 {
            self.hw.set_interrupts(enabled);
        }
    }

    pub fn enable_bus_interrupts(&mut self, sources: BusFlags) {
        self.lock().hw.set_bus_interrupts(sources, true);
    }

    pub fn disable_bus_interrupts(&mut self, sources: BusFlags) {
        self.lock().hw.set_bus_interrupts(sources, false);
    }

    /// Returns the configuration for endpoint `ep`
    ///
    /// # Panics
    ///
    /// Panics if `ep` is not less than [`MAX_ENDPOINTS`].
    pub fn endpoint_config(&self, ep: usize) -> &EndpointConfig {
        &self.endpoints[ep]
    }

    /// Configure a data endpoint
    ///
    /// Any request pending on the endpoint is aborted first. Configuring
    /// `Disabled` is the same as [`reset_endpoint`](Self::reset_endpoint).
    pub fn configure_endpoint(
        &mut self,
        ep: usize,
        direction: EndpointDirectionType,
        max_packet_size: u16,
    ) -> Result<(), Error> {
        let config = EndpointConfig::new(ep, direction, max_packet_size)?;
        let mut cs = self.lock();
        cs.reset_endpoint_locked(ep);
        if config.is_enabled() {
            cs.endpoints[ep] = config;
            cs.hw.set_endpoint_config(ep, direction, max_packet_size);
            debug!("EP{} CONFIGURED MPS {}", ep, max_packet_size);
        }
        Ok(())
    }

    /// Set the device address
    pub fn set_address(&mut self, addr: u8) -> Result<(), Error> {
        if addr > 127 {
            return Err(Error::InvalidAddress);
        }
        self.lock().hw.set_address(addr)?;
        debug!("ADDRESS {}", addr);
        Ok(())
    }

    /// Make the device visible to the host
    pub fn connect(&mut self) {
        let mut cs = self.lock();
        cs.hw.connect();
        cs.control.reset();
    }

    /// Leave the bus
    ///
    /// Every endpoint is reset, like a bus reset.
    pub fn disconnect(&mut self) {
        let mut cs = self.lock();
        cs.hw.disconnect();
        cs.bus_reset_locked();
    }

    /// Signal remote wakeup to a suspended host
    ///
    /// `delay_us` must block for the given number of microseconds.
    pub fn remote_wakeup(&mut self, mut delay_us: impl FnMut(u32)) {
        self.lock().hw.signal_resume(true);
        delay_us(10_000);
        self.lock().hw.signal_resume(false);
    }

    /// Returns `true` if a request on `ep_addr` hasn't been handed back yet
    pub fn is_pending(&self, ep_addr: usb_device::endpoint::EndpointAddress) -> bool {
        let idx = crate::request::index(ep_addr);
        self.pending.get(idx).map_or(false, Option::is_some)
            || self.completed.get(idx).map_or(false, Option::is_some)
    }

    /// Service one controller interrupt
    ///
    /// Reads the interrupt flags once, runs the endpoint 0 state machine,
    /// and pumps data endpoints. Completed requests wait in their slots for
    /// [`take_completion`](Self::take_completion).
    pub fn service_interrupt(&mut self) -> Events {
        let mut cs = self.lock();
        let mut events = Events::read(&mut cs.hw);

        if events.contains(crate::Signals::BUS_RESET) {
            debug!("RESET");
            cs.bus_reset_locked();
            return events;
        }

        if let Some(status) = events.ep0() {
            if cs.service_control(status) {
                events.insert(crate::Signals::SETUP_AVAILABLE);
            }
        }

        for ep in 1..MAX_ENDPOINTS {
            if events.ep_in() & (1 << ep) != 0 {
                cs.pump_in(ep);
            }
            if events.ep_out() & (1 << ep) != 0 {
                cs.pump_out(ep);
            }
        }

        events
    }

    /// Take the next completed request
    ///
    /// The request's slot is free once this returns.
    pub fn take_completion(&mut self) -> Option<TransferRequest<'a>> {
        let mut cs = self.lock();
        cs.completed.iter_mut().find_map(Option::take)
    }

    /// Move a pending request to its completed slot
    pub(crate) fn complete(&mut self, idx: usize, error: Option<Error>) {
        if let Some(mut request) = self.pending[idx].take() {
            request.finish(error);
            self.completed[idx] = Some(request);
        }
    }
}
