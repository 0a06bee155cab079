//! Submitting and pumping transfer requests

use crate::endpoint::FifoOwner;
use crate::hardware::Hardware;
use crate::request::{index, Rejected, TransferRequest};
use crate::{Controller, Error};
use usb_device::UsbDirection;

impl<'a, H: Hardware> Controller<'a, H> {
    /// Register a request with its endpoint
    ///
    /// IN requests send their first packet right away. OUT requests first
    /// take any packet already waiting in the FIFO.
    ///
    /// On endpoint 0, the request must match the data stage of the current
    /// control transfer, and is cut down to the SETUP packet's `wLength`.
    ///
    /// If the request can't be registered, it comes back in the error
    /// along with the reason.
    pub fn submit(&mut self, mut request: TransferRequest<'a>) -> Result<(), Rejected<'a>> {
        let mut cs = self.lock();
        if let Err(error) = cs.check_submit(&request) {
            return Err(Rejected::new(error, request));
        }

        let ep = request.endpoint().index();
        let direction = request.direction();
        let idx = index(request.endpoint());
        if ep == 0 {
            request.clamp(cs.control_length());
        }
        cs.pending[idx] = Some(request);

        match (ep, direction) {
            (0, UsbDirection::In) => cs.load_control_in(),
            (0, UsbDirection::Out) => cs.receive_control_out(),
            (_, UsbDirection::In) => cs.load_in(ep),
            (_, UsbDirection::Out) => cs.start_out(ep),
        }
        Ok(())
    }

    fn check_submit(&self, request: &TransferRequest<'a>) -> Result<(), Error> {
        let ep = request.endpoint().index();
        let config = self.endpoints.get(ep).ok_or(Error::InvalidEndpoint)?;
        if !config.is_enabled() || !config.accepts(request.direction()) {
            return Err(Error::NotConfigured);
        }
        if config.is_stalled() {
            return Err(Error::Stalled);
        }
        if self.is_pending(request.endpoint()) {
            return Err(Error::AlreadyPending);
        }
        if ep == 0 && self.control.state != Self::control_phase(request.direction()) {
            return Err(Error::ProtocolViolation);
        }
        Ok(())
    }

    /// Load and send the next packet of an IN request
    fn load_in(&mut self, ep: usize) {
        let mps = self.endpoints[ep].max_packet_size as usize;
        let Some(request) = self.pending[ep * 2 + 1].as_mut() else {
            return;
        };
        let packet = request.unsent(mps);
        let len = packet.len();
        for &byte in packet {
            self.hw.write_fifo_byte(ep, byte);
        }
        request.advance(len);
        self.hw.arm_in(ep);
        trace!("EP{} IN {}", ep, len);
    }

    /// A data endpoint sent its packet
    pub(crate) fn pump_in(&mut self, ep: usize) {
        if !self.endpoints[ep].accepts(UsbDirection::In) {
            return;
        }
        let idx = ep * 2 + 1;
        let done = match self.pending[idx].as_ref() {
            Some(request) => request.is_done(),
            None => return,
        };
        if done {
            self.complete(idx, None);
        } else {
            self.load_in(ep);
        }
    }

    /// Start an OUT request from whatever state the FIFO is in
    fn start_out(&mut self, ep: usize) {
        if self.endpoints[ep].fifo_owner == FifoOwner::Hardware {
            return;
        }
        match self.hw.out_packet_len(ep) {
            Some(count) if count > 0 => self.receive_out(ep, count),
            _ => self.release_out(ep),
        }
    }

    /// A data endpoint received a packet
    pub(crate) fn pump_out(&mut self, ep: usize) {
        if !self.endpoints[ep].accepts(UsbDirection::Out) {
            return;
        }
        let Some(count) = self.hw.out_packet_len(ep) else {
            return;
        };
        let config = &mut self.endpoints[ep];
        config.fifo_owner = FifoOwner::Software;
        config.held_short = count < config.max_packet_size as usize;
        if self.pending[ep * 2].is_none() {
            trace!("EP{} OUT HELD {}", ep, count);
            return;
        }
        self.receive_out(ep, count);
    }

    /// Copy `count` FIFO bytes into the pending OUT request
    ///
    /// Bytes left over from an earlier request end the transfer only if
    /// they came from a short packet.
    fn receive_out(&mut self, ep: usize, count: usize) {
        let short = self.endpoints[ep].held_short;
        let idx = ep * 2;
        let Some(request) = self.pending[idx].as_mut() else {
            return;
        };

        let room = request.unfilled(count);
        let len = room.len();
        for byte in room.iter_mut() {
            *byte = self.hw.read_fifo_byte(ep);
        }
        request.advance(len);
        trace!("EP{} OUT {}", ep, len);

        if short || request.is_done() {
            // The FIFO stays with software until the next request.
            self.complete(idx, None);
        } else {
            self.release_out(ep);
        }
    }

    fn release_out(&mut self, ep: usize) {
        self.endpoints[ep].fifo_owner = FifoOwner::Hardware;
        self.hw.release_out(ep);
    }
}
