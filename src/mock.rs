//! A simulated controller, and the host on the other side of the cable

extern crate std;

use crate::endpoint::EndpointDirectionType;
use crate::hardware::{BusFlags, Ep0Status, Hardware, RawFlags};
use crate::{Error, MAX_ENDPOINTS};
use std::{collections::VecDeque, vec::Vec};

pub struct MockHardware {
    flags: RawFlags,
    ep0_latched: Ep0Status,
    /// Packets held in the FIFO, on the software side
    rx: [Option<VecDeque<u8>>; MAX_ENDPOINTS],
    /// Packets the host is waiting to send
    queued: [VecDeque<Vec<u8>>; MAX_ENDPOINTS],
    tx: [Vec<u8>; MAX_ENDPOINTS],
    /// Data endpoint IN packets, in transmit order
    pub sent: [Vec<Vec<u8>>; MAX_ENDPOINTS],
    /// Endpoint 0 IN packets, with their `data_end` flag
    pub ep0_in: Vec<(Vec<u8>, bool)>,
    /// `data_end` flag of every served endpoint 0 packet
    pub ep0_acks: Vec<bool>,
    pub config: [(EndpointDirectionType, u16); MAX_ENDPOINTS],
    pub stalled: [bool; MAX_ENDPOINTS],
    pub toggle_resets: [usize; MAX_ENDPOINTS],
    pub interrupts: bool,
    pub interrupt_masks: usize,
    pub bus_interrupts: BusFlags,
    pub address: u8,
    pub connected: bool,
    pub resume: bool,
    pub resume_pulses: usize,
}

impl MockHardware {
    pub fn new() -> Self {
        MockHardware {
            flags: RawFlags::empty(),
            ep0_latched: Ep0Status::empty(),
            rx: core::array::from_fn(|_| None),
            queued: core::array::from_fn(|_| VecDeque::new()),
            tx: core::array::from_fn(|_| Vec::new()),
            sent: core::array::from_fn(|_| Vec::new()),
            ep0_in: Vec::new(),
            ep0_acks: Vec::new(),
            config: [(EndpointDirectionType::Disabled, 0); MAX_ENDPOINTS],
            stalled: [false; MAX_ENDPOINTS],
            toggle_resets: [0; MAX_ENDPOINTS],
            interrupts: false,
            interrupt_masks: 0,
            bus_interrupts: BusFlags::empty(),
            address: 0,
            connected: false,
            resume: false,
            resume_pulses: 0,
        }
    }

    fn raise(&mut self, ep: usize) {
        if ep == 0 {
            self.flags.ep_in |= 1;
        } else {
            self.flags.ep_out |= 1 << ep;
        }
    }

    /// The host sends a SETUP packet
    pub fn host_setup(&mut self, raw: [u8; 8]) {
        self.rx[0] = Some(raw.iter().copied().collect());
        self.raise(0);
    }

    /// The host abandons the control transfer with a new SETUP
    pub fn host_setup_end(&mut self) {
        self.ep0_latched |= Ep0Status::SETUP_END;
        self.raise(0);
    }

    /// The host saw the protocol stall on endpoint 0
    pub fn host_stall_seen(&mut self) {
        self.ep0_latched |= Ep0Status::SENT_STALL;
        self.raise(0);
    }

    /// The host sends an OUT packet
    ///
    /// The packet lands in the FIFO if the FIFO is free. Otherwise, the
    /// host retries after software releases the FIFO.
    pub fn host_out(&mut self, ep: usize, data: &[u8]) {
        if self.rx[ep].is_none() {
            self.rx[ep] = Some(data.iter().copied().collect());
            self.raise(ep);
        } else {
            self.queued[ep].push_back(data.to_vec());
        }
    }

    pub fn host_bus(&mut self, flags: BusFlags) {
        self.flags.bus |= flags;
    }

    /// Every byte sent on a data endpoint, in order
    pub fn sent_bytes(&self, ep: usize) -> Vec<u8> {
        self.sent[ep].iter().flatten().copied().collect()
    }

    /// Every byte sent on endpoint 0, in order
    pub fn ep0_in_bytes(&self) -> Vec<u8> {
        self.ep0_in.iter().flat_map(|(packet, _)| packet.iter()).copied().collect()
    }

    pub fn holds_out_packet(&self, ep: usize) -> bool {
        self.rx[ep].is_some()
    }

    fn load_next(&mut self, ep: usize) {
        self.rx[ep] = None;
        if let Some(next) = self.queued[ep].pop_front() {
            self.rx[ep] = Some(next.into_iter().collect());
            self.raise(ep);
        }
    }
}

impl Hardware for MockHardware {
    fn read_fifo_byte(&mut self, ep: usize) -> u8 {
        self.rx[ep]
            .as_mut()
            .and_then(|packet| packet.pop_front())
            .unwrap_or(0)
    }

    fn write_fifo_byte(&mut self, ep: usize, byte: u8) {
        self.tx[ep].push(byte);
    }

    fn read_and_clear_interrupt_flags(&mut self) -> RawFlags {
        core::mem::take(&mut self.flags)
    }

    fn set_endpoint_config(&mut self, ep: usize, direction: EndpointDirectionType, max_packet_size: u16) {
        self.config[ep] = (direction, max_packet_size);
        self.toggle_resets[ep] += 1;
        self.stalled[ep] = false;
        self.rx[ep] = None;
        self.tx[ep].clear();
    }

    fn assert_stall(&mut self, ep: usize) {
        self.stalled[ep] = true;
        if ep == 0 {
            self.rx[0] = None;
        }
    }

    fn clear_stall(&mut self, ep: usize) {
        self.stalled[ep] = false;
        self.toggle_resets[ep] += 1;
    }

    fn set_address(&mut self, addr: u8) -> Result<(), Error> {
        if addr > 127 {
            return Err(Error::InvalidAddress);
        }
        self.address = addr;
        Ok(())
    }

    fn out_packet_len(&mut self, ep: usize) -> Option<usize> {
        self.rx[ep].as_ref().map(|packet| packet.len())
    }

    fn release_out(&mut self, ep: usize) {
        self.load_next(ep);
    }

    fn arm_in(&mut self, ep: usize) {
        let packet = core::mem::take(&mut self.tx[ep]);
        self.sent[ep].push(packet);
        self.flags.ep_in |= 1 << ep;
    }

    fn ep0_status(&mut self) -> Ep0Status {
        let mut status = self.ep0_latched;
        if self.rx[0].is_some() {
            status |= Ep0Status::OUT_PACKET_READY;
        }
        status
    }

    fn ep0_clear(&mut self, status: Ep0Status) {
        self.ep0_latched.remove(status);
    }

    fn ep0_ack_out(&mut self, data_end: bool) {
        self.ep0_acks.push(data_end);
        if data_end {
            self.rx[0] = None;
        } else {
            self.load_next(0);
        }
    }

    fn ep0_arm_in(&mut self, data_end: bool) {
        let packet = core::mem::take(&mut self.tx[0]);
        self.ep0_in.push((packet, data_end));
        self.flags.ep_in |= 1;
    }

    fn set_interrupts(&mut self, enabled: bool) {
        if !enabled {
            self.interrupt_masks += 1;
        }
        self.interrupts = enabled;
    }

    fn set_bus_interrupts(&mut self, sources: BusFlags, enabled: bool) {
        self.bus_interrupts.set(sources, enabled);
    }

    fn connect(&mut self) {
        self.connected = true;
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn signal_resume(&mut self, active: bool) {
        if active && !self.resume {
            self.resume_pulses += 1;
        }
        self.resume = active;
    }
}
