//! Interrupt flags to generic events

use crate::hardware::{BusFlags, Ep0Status, Hardware, RawFlags};
use crate::MAX_ENDPOINTS;

bitflags::bitflags! {
    /// Bus and control conditions seen by one interrupt activation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Signals: u8 {
        const BUS_RESET = 1 << 0;
        const SUSPEND = 1 << 1;
        const RESUME = 1 << 2;
        /// Start-of-frame traffic.
        const BUS_ACTIVE = 1 << 3;
        /// The control state machine accepted a new SETUP packet.
        const SETUP_AVAILABLE = 1 << 4;
        const VBUS = 1 << 5;
        const NO_VBUS = 1 << 6;
    }
}

/// Mask of the data endpoint bits, 1 through `MAX_ENDPOINTS - 1`
const DATA_ENDPOINTS: u16 = ((1 << MAX_ENDPOINTS) - 1) & !1;

/// Everything pending at one interrupt activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Events {
    signals: Signals,
    ep0: Option<Ep0Status>,
    ep_in: u16,
    ep_out: u16,
}

impl Events {
    /// Read and consume the controller's latched flags
    pub fn read<H: Hardware>(hw: &mut H) -> Self {
        let raw = hw.read_and_clear_interrupt_flags();
        let ep0 = if raw.ep_in & 1 != 0 {
            Some(hw.ep0_status())
        } else {
            None
        };
        Self::translate(raw, ep0)
    }

    /// Map raw flags to events
    pub fn translate(raw: RawFlags, ep0: Option<Ep0Status>) -> Self {
        const MAP: [(BusFlags, Signals); 6] = [
            (BusFlags::RESET, Signals::BUS_RESET),
            (BusFlags::SUSPEND, Signals::SUSPEND),
            (BusFlags::RESUME, Signals::RESUME),
            (BusFlags::SOF, Signals::BUS_ACTIVE),
            (BusFlags::VBUS, Signals::VBUS),
            (BusFlags::NO_VBUS, Signals::NO_VBUS),
        ];
        let signals = MAP
            .iter()
            .filter(|(flag, _)| raw.bus.contains(*flag))
            .fold(Signals::empty(), |acc, (_, signal)| acc | *signal);

        Events {
            signals,
            ep0,
            ep_in: raw.ep_in & DATA_ENDPOINTS,
            ep_out: raw.ep_out & DATA_ENDPOINTS,
        }
    }

    pub fn signals(&self) -> Signals {
        self.signals
    }

    pub fn contains(&self, signals: Signals) -> bool {
        self.signals.contains(signals)
    }

    /// Endpoint 0 status, if endpoint 0 interrupted
    pub fn ep0(&self) -> Option<Ep0Status> {
        self.ep0
    }

    /// Data endpoints that finished sending a packet
    pub fn ep_in(&self) -> u16 {
        self.ep_in
    }

    /// Data endpoints that received a packet
    pub fn ep_out(&self) -> u16 {
        self.ep_out
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.ep0.is_none() && self.ep_in == 0 && self.ep_out == 0
    }

    pub(crate) fn insert(&mut self, signals: Signals) {
        self.signals.insert(signals);
    }
}

#[cfg(test)]
mod tests {
    use super::{Events, Signals};
    use crate::hardware::{BusFlags, Ep0Status, RawFlags};

    #[test]
    fn translate_bus_flags() {
        let raw = RawFlags {
            bus: BusFlags::RESET | BusFlags::SOF | BusFlags::NO_VBUS,
            ..RawFlags::empty()
        };
        let events = Events::translate(raw, None);
        assert_eq!(
            events.signals(),
            Signals::BUS_RESET | Signals::BUS_ACTIVE | Signals::NO_VBUS
        );
        assert!(!events.contains(Signals::SETUP_AVAILABLE));
        assert_eq!(events.ep0(), None);
    }

    #[test]
    fn endpoint_masks_exclude_control_and_unknown_bits() {
        let raw = RawFlags {
            bus: BusFlags::empty(),
            ep_in: 0xFFFF,
            ep_out: 0b1000_0101,
        };
        let events = Events::translate(raw, Some(Ep0Status::OUT_PACKET_READY));
        assert_eq!(events.ep_in(), 0b1111_1110);
        assert_eq!(events.ep_out(), 0b1000_0100);
        assert_eq!(events.ep0(), Some(Ep0Status::OUT_PACKET_READY));
    }

    #[test]
    fn empty_activation() {
        assert!(Events::translate(RawFlags::empty(), None).is_empty());
    }

    #[test]
    fn read_consumes_flags() {
        let mut hw = crate::mock::MockHardware::new();
        hw.host_setup([0x00, 0x05, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
        let events = Events::read(&mut hw);
        assert_eq!(events.ep0(), Some(Ep0Status::OUT_PACKET_READY));
        assert!(Events::read(&mut hw).is_empty());
    }
}
