//! Endpoint 0 control transfers
//!
//! A control transfer starts with a SETUP packet. If `wLength` is zero, the
//! state machine waits in [`ControlState::NoData`] until the issuer
//! acknowledges the status stage, or stalls. Otherwise, the issuer submits
//! one request on endpoint 0, in the direction of the data stage, and the
//! state machine pumps it.
//!
//! OUT data stages end in `NoData`: the last packet stays in the FIFO until
//! the issuer has looked at the data and acknowledged it.

use crate::hardware::{Ep0Status, Hardware};
use crate::setup::SetupPacket;
use crate::{Controller, Error, EP0_MAX_PACKET_SIZE};
use usb_device::UsbDirection;

/// Request slot of the endpoint 0 OUT direction
pub(crate) const EP0_OUT: usize = 0;
/// Request slot of the endpoint 0 IN direction
pub(crate) const EP0_IN: usize = 1;

/// Phase of the endpoint 0 control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Waiting for a SETUP packet.
    Idle,
    /// Waiting for the issuer to acknowledge the status stage.
    NoData,
    /// Receiving the data stage.
    DataOut,
    /// Sending the data stage.
    DataIn,
}

pub(crate) struct ControlPipe {
    pub(crate) state: ControlState,
    pub(crate) setup: Option<SetupPacket>,
    /// The last IN packet went out with DATA_END.
    status_armed: bool,
    /// A zero-length packet must follow the last full IN packet.
    zlp_pending: bool,
}

impl ControlPipe {
    pub(crate) const fn new() -> Self {
        ControlPipe {
            state: ControlState::Idle,
            setup: None,
            status_armed: false,
            zlp_pending: false,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = ControlState::Idle;
        self.status_armed = false;
        self.zlp_pending = false;
    }

    /// `wLength` of the current transfer
    fn length(&self) -> usize {
        self.setup.map_or(0, |setup| setup.length as usize)
    }
}

impl<'a, H: Hardware> Controller<'a, H> {
    pub fn control_state(&self) -> ControlState {
        self.control.state
    }

    /// The most recent SETUP packet
    ///
    /// `None` before the first SETUP, and after a bus reset.
    pub fn setup_packet(&self) -> Option<SetupPacket> {
        self.control.setup
    }

    /// Complete the status stage of a control transfer
    ///
    /// Only valid in [`ControlState::NoData`]. In any other state, the
    /// hardware isn't touched and this returns
    /// [`Error::ProtocolViolation`].
    pub fn acknowledge_status_stage(&mut self) -> Result<(), Error> {
        let mut cs = self.lock();
        if cs.control.state != ControlState::NoData {
            return Err(Error::ProtocolViolation);
        }
        cs.hw.ep0_ack_out(true);
        cs.control.reset();
        Ok(())
    }

    /// The state a request for `direction` needs
    pub(crate) fn control_phase(direction: UsbDirection) -> ControlState {
        match direction {
            UsbDirection::In => ControlState::DataIn,
            UsbDirection::Out => ControlState::DataOut,
        }
    }

    /// Limit an endpoint 0 request to `wLength`
    pub(crate) fn control_length(&self) -> usize {
        self.control.length()
    }

    /// Run the state machine for one endpoint 0 interrupt
    ///
    /// Returns `true` if a new SETUP packet was accepted.
    pub(crate) fn service_control(&mut self, status: Ep0Status) -> bool {
        if status.contains(Ep0Status::SENT_STALL) {
            self.hw.ep0_clear(Ep0Status::SENT_STALL);
            self.endpoints[0].stalled = false;
            self.abort_control();
        }

        if status.contains(Ep0Status::SETUP_END) {
            self.hw.ep0_clear(Ep0Status::SETUP_END);
            if self.control.state != ControlState::Idle {
                warn!("EP0 SETUP END IN STATE {}", self.control.state as u8);
            }
            self.abort_control();
        }

        let packet_ready = status.contains(Ep0Status::OUT_PACKET_READY);
        match self.control.state {
            ControlState::Idle => {}
            // The held packet belongs to this transfer. A new SETUP shows
            // up as SETUP_END.
            ControlState::NoData => {}
            ControlState::DataOut => {
                if packet_ready {
                    self.receive_control_out();
                }
            }
            ControlState::DataIn => {
                if self.control.status_armed {
                    self.complete(EP0_IN, None);
                    self.control.reset();
                } else if packet_ready {
                    warn!("EP0 SETUP DURING IN DATA STAGE");
                    self.abort_control();
                } else {
                    self.load_control_in();
                }
            }
        }

        if packet_ready && self.control.state == ControlState::Idle {
            self.read_setup();
            true
        } else {
            false
        }
    }

    /// Fail both endpoint 0 requests, and return to `Idle`
    pub(crate) fn abort_control(&mut self) {
        self.complete(EP0_OUT, Some(Error::Aborted));
        self.complete(EP0_IN, Some(Error::Aborted));
        self.control.reset();
    }

    fn read_setup(&mut self) {
        let mut raw = [0; SetupPacket::LEN];
        for byte in raw.iter_mut() {
            *byte = self.hw.read_fifo_byte(0);
        }
        let setup = SetupPacket::from_bytes(raw);
        debug!(
            "SETUP {:x} {:x} {:x} {:x} {}",
            setup.request_type,
            setup.request,
            setup.value,
            setup.index,
            setup.length
        );

        self.endpoints[0].stalled = false;
        self.control.reset();
        self.control.setup = Some(setup);
        self.control.state = if setup.has_data_stage() {
            self.hw.ep0_ack_out(false);
            Self::control_phase(setup.direction())
        } else {
            ControlState::NoData
        };
    }

    /// Load and send the next IN packet of the data stage
    pub(crate) fn load_control_in(&mut self) {
        const MPS: usize = EP0_MAX_PACKET_SIZE as usize;
        let length = self.control.length();
        let Some(request) = self.pending[EP0_IN].as_mut() else {
            return;
        };

        if self.control.zlp_pending {
            self.control.zlp_pending = false;
            self.control.status_armed = true;
            self.hw.ep0_arm_in(true);
            return;
        }

        let packet = request.unsent(MPS);
        let len = packet.len();
        for &byte in packet {
            self.hw.write_fifo_byte(0, byte);
        }
        request.advance(len);
        trace!("EP0 IN {}", len);

        if !request.is_done() {
            self.hw.ep0_arm_in(false);
        } else if len == MPS && request.requested_length() < length {
            self.control.zlp_pending = true;
            self.hw.ep0_arm_in(false);
        } else {
            self.control.status_armed = true;
            self.hw.ep0_arm_in(true);
        }
    }

    /// Copy the held OUT packet into the data stage request
    pub(crate) fn receive_control_out(&mut self) {
        const MPS: usize = EP0_MAX_PACKET_SIZE as usize;
        let Some(request) = self.pending[EP0_OUT].as_mut() else {
            return;
        };
        let Some(count) = self.hw.out_packet_len(0) else {
            return;
        };

        let room = request.unfilled(count);
        let len = room.len();
        for byte in room.iter_mut() {
            *byte = self.hw.read_fifo_byte(0);
        }
        request.advance(len);
        trace!("EP0 OUT {}", len);

        if count < MPS || request.is_done() {
            self.control.state = ControlState::NoData;
            self.complete(EP0_OUT, None);
        } else {
            self.hw.ep0_ack_out(false);
        }
    }
}
