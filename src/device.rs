//! A controller paired with the class driver that consumes it

use crate::events::{Events, Signals};
use crate::hardware::Hardware;
use crate::request::TransferRequest;
use crate::setup::SetupPacket;
use crate::Controller;

/// The consumer of a [`Controller`]
///
/// Each method receives the controller, so the class can submit new
/// requests, stall, or acknowledge from inside its handlers.
pub trait Class<'a> {
    /// A SETUP packet arrived on endpoint 0
    ///
    /// Return `false` if the class doesn't handle the request. The device
    /// then stalls endpoint 0.
    fn setup<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, setup: &SetupPacket) -> bool;

    /// A request submitted by this class completed, or was aborted
    fn complete<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, request: TransferRequest<'a>);

    /// Bus events from one interrupt activation
    fn event<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, events: &Events) {
        let _ = (ctrl, events);
    }
}

/// A USB device
///
/// `Device` owns both the controller and the class driver. Every
/// completed request reaches the class before a `Device` method returns.
pub struct Device<'a, H, C> {
    ctrl: Controller<'a, H>,
    class: C,
}

impl<'a, H: Hardware, C: Class<'a>> Device<'a, H, C> {
    pub fn new(hw: H, class: C) -> Self {
        Device {
            ctrl: Controller::new(hw),
            class,
        }
    }

    /// Service the controller interrupt
    ///
    /// Call this from the USB ISR, or in a loop. Returns the events that
    /// the class saw.
    pub fn poll(&mut self) -> Events {
        let events = self.ctrl.service_interrupt();

        let bus = events.signals() - Signals::SETUP_AVAILABLE;
        if !bus.is_empty() {
            self.class.event(&mut self.ctrl, &events);
        }
        self.dispatch();

        if events.contains(Signals::SETUP_AVAILABLE) {
            if let Some(setup) = self.ctrl.setup_packet() {
                if !self.class.setup(&mut self.ctrl, &setup) {
                    let _ = self.ctrl.stall(0);
                }
            }
            self.dispatch();
        }

        events
    }

    /// Run `func` with the class and the controller
    ///
    /// Requests that complete inside `func`, like those aborted by a
    /// stall, are delivered before this returns.
    pub fn with_class<R>(&mut self, func: impl FnOnce(&mut C, &mut Controller<'a, H>) -> R) -> R {
        let result = func(&mut self.class, &mut self.ctrl);
        self.dispatch();
        result
    }

    /// Reset the entire device, as if the host reset the bus
    pub fn bus_reset(&mut self) {
        self.ctrl.bus_reset();
        let events = Events::translate(
            crate::hardware::RawFlags {
                bus: crate::hardware::BusFlags::RESET,
                ..crate::hardware::RawFlags::empty()
            },
            None,
        );
        self.class.event(&mut self.ctrl, &events);
        self.dispatch();
    }

    pub fn controller(&self) -> &Controller<'a, H> {
        &self.ctrl
    }

    pub fn class(&self) -> &C {
        &self.class
    }

    /// Release the hardware and the class
    pub fn release(self) -> (H, C) {
        (self.ctrl.release(), self.class)
    }

    /// Deliver completions until none are left
    fn dispatch(&mut self) {
        while let Some(request) = self.ctrl.take_completion() {
            self.class.complete(&mut self.ctrl, request);
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{Class, Device};
    use crate::endpoint::EndpointDirectionType;
    use crate::events::{Events, Signals};
    use crate::hardware::{BusFlags, Hardware};
    use crate::mock::MockHardware;
    use crate::{Controller, Error, SetupPacket, TransferRequest};
    use std::vec::Vec;
    use usb_device::{endpoint::EndpointAddress, UsbDirection};

    /// Keeps one OUT request armed on endpoint 1
    #[derive(Default)]
    struct Rearm<'a> {
        buffer: Option<&'a mut [u8]>,
        results: Vec<(usize, Option<Error>)>,
        setups: Vec<u8>,
        events: Vec<Signals>,
    }

    impl<'a> Rearm<'a> {
        fn arm<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>) {
            if let Some(buffer) = self.buffer.take() {
                let ep = EndpointAddress::from_parts(1, UsbDirection::Out);
                if let Err(rejected) = ctrl.submit(TransferRequest::new(ep, buffer)) {
                    self.buffer = Some(rejected.into_buffer());
                }
            }
        }
    }

    impl<'a> Class<'a> for Rearm<'a> {
        fn setup<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, setup: &SetupPacket) -> bool {
            self.setups.push(setup.request);
            if setup.request == 0x09 {
                ctrl.acknowledge_status_stage().is_ok()
            } else {
                false
            }
        }

        fn complete<H: Hardware>(&mut self, ctrl: &mut Controller<'a, H>, request: TransferRequest<'a>) {
            self.results.push((request.transferred_length(), request.error()));
            let resubmit = request.error().is_none();
            self.buffer = Some(request.into_buffer());
            // The slot is already free
            if resubmit {
                self.arm(ctrl);
            }
        }

        fn event<H: Hardware>(&mut self, _: &mut Controller<'a, H>, events: &Events) {
            self.events.push(events.signals());
        }
    }

    fn device<'a>(buffer: &'a mut [u8]) -> Device<'a, MockHardware, Rearm<'a>> {
        let mut device = Device::new(
            MockHardware::new(),
            Rearm {
                buffer: Some(buffer),
                ..Default::default()
            },
        );
        device.with_class(|class, ctrl| {
            ctrl.configure_endpoint(1, EndpointDirectionType::Out, 64).unwrap();
            class.arm(ctrl);
        });
        device
    }

    #[test]
    fn completion_handler_may_resubmit() {
        let mut buffer = [0; 64];
        let mut device = device(&mut buffer);
        device.with_class(|_, ctrl| ctrl.hardware_mut().host_out(1, &[1, 2, 3]));
        device.poll();
        device.with_class(|_, ctrl| ctrl.hardware_mut().host_out(1, &[4]));
        device.poll();

        assert_eq!(device.class().results, [(3, None), (1, None)]);
        let out = EndpointAddress::from_parts(1, UsbDirection::Out);
        assert!(device.controller().is_pending(out));
    }

    #[test]
    fn unhandled_setup_stalls() {
        let mut buffer = [0; 64];
        let mut device = device(&mut buffer);
        device.with_class(|_, ctrl| {
            ctrl.hardware_mut()
                .host_setup([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00])
        });
        let events = device.poll();
        assert!(events.contains(Signals::SETUP_AVAILABLE));
        assert!(device.controller().is_stalled(0));
        assert!(device.controller().hardware().stalled[0]);
        // SETUP packets alone aren't bus events
        assert!(device.class().events.is_empty());
    }

    #[test]
    fn handled_setup_acknowledges() {
        let mut buffer = [0; 64];
        let mut device = device(&mut buffer);
        device.with_class(|_, ctrl| {
            ctrl.hardware_mut()
                .host_setup([0x00, 0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00])
        });
        device.poll();
        assert_eq!(device.class().setups, [0x09]);
        assert!(!device.controller().is_stalled(0));
        assert_eq!(device.controller().hardware().ep0_acks, [true]);
    }

    #[test]
    fn stall_delivers_abort_before_returning() {
        let mut buffer = [0; 64];
        let mut device = device(&mut buffer);
        device.with_class(|_, ctrl| ctrl.stall(1)).unwrap();
        assert_eq!(device.class().results, [(0, Some(Error::Aborted))]);
        assert!(device.class().buffer.is_some());
    }

    #[test]
    fn bus_reset_reaches_class() {
        let mut buffer = [0; 64];
        let mut device = device(&mut buffer);
        device.with_class(|_, ctrl| ctrl.hardware_mut().host_bus(BusFlags::RESET | BusFlags::SOF));
        device.poll();

        assert_eq!(device.class().events, [Signals::BUS_RESET | Signals::BUS_ACTIVE]);
        assert_eq!(device.class().results, [(0, Some(Error::Aborted))]);
        assert!(device.class().buffer.is_some());
        assert!(!device.controller().endpoint_config(1).is_enabled());

        device.bus_reset();
        assert_eq!(device.class().events.len(), 2);
        assert_eq!(device.class().results.len(), 1);
    }
}
