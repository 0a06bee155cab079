//! Stalls and resets
//!
//! These are the only ways to cancel a request. A cancelled request
//! completes with [`Error::Aborted`], exactly once, and keeps the
//! transferred length it reached.

use crate::endpoint::{EndpointConfig, EndpointDirectionType};
use crate::hardware::Hardware;
use crate::{Controller, Error, MAX_ENDPOINTS};

impl<'a, H: Hardware> Controller<'a, H> {
    /// Halt endpoint `ep`
    ///
    /// A request pending in either direction is aborted. Stalling a stalled
    /// endpoint does nothing. Stalling endpoint 0 also ends the control
    /// transfer.
    pub fn stall(&mut self, ep: usize) -> Result<(), Error> {
        let mut cs = self.lock();
        let config = cs.endpoints.get(ep).ok_or(Error::InvalidEndpoint)?;
        if !config.is_enabled() {
            return Err(Error::NotConfigured);
        }
        if config.is_stalled() {
            return Ok(());
        }

        cs.hw.assert_stall(ep);
        cs.endpoints[ep].stalled = true;
        debug!("EP{} STALL", ep);
        cs.abort(ep);
        if ep == 0 {
            cs.control.reset();
        }
        Ok(())
    }

    /// Clear the halt on endpoint `ep`, and reset its data toggle
    ///
    /// Transfers don't resume; submit a new request. Endpoint 0 stalls
    /// clear themselves at the next SETUP, so this only updates bookkeeping
    /// for endpoint 0.
    pub fn unstall(&mut self, ep: usize) -> Result<(), Error> {
        let mut cs = self.lock();
        let config = cs.endpoints.get(ep).ok_or(Error::InvalidEndpoint)?;
        if !config.is_enabled() {
            return Err(Error::NotConfigured);
        }
        if ep != 0 {
            cs.hw.clear_stall(ep);
            debug!("EP{} UNSTALL", ep);
        }
        cs.endpoints[ep].stalled = false;
        Ok(())
    }

    /// Returns `true` if endpoint `ep` is halted
    pub fn is_stalled(&self, ep: usize) -> bool {
        self.endpoints.get(ep).map_or(false, EndpointConfig::is_stalled)
    }

    /// Disable endpoint `ep`, aborting its requests
    ///
    /// Endpoint 0 stays enabled; its control transfer returns to `Idle`.
    pub fn reset_endpoint(&mut self, ep: usize) -> Result<(), Error> {
        if ep >= MAX_ENDPOINTS {
            return Err(Error::InvalidEndpoint);
        }
        self.lock().reset_endpoint_locked(ep);
        Ok(())
    }

    /// Reset every endpoint, including endpoint 0
    ///
    /// Afterwards, no request is pending, and the control transfer is
    /// `Idle`.
    pub fn bus_reset(&mut self) {
        self.lock().bus_reset_locked();
    }

    pub(crate) fn reset_endpoint_locked(&mut self, ep: usize) {
        self.abort(ep);
        if ep == 0 {
            self.endpoints[0] = EndpointConfig::CONTROL;
            self.control.reset();
        } else {
            self.endpoints[ep] = EndpointConfig::DISABLED;
            self.hw.set_endpoint_config(ep, EndpointDirectionType::Disabled, 0);
        }
    }

    pub(crate) fn bus_reset_locked(&mut self) {
        for ep in 0..MAX_ENDPOINTS {
            self.reset_endpoint_locked(ep);
        }
        self.control.setup = None;
    }

    /// Abort requests in both directions
    fn abort(&mut self, ep: usize) {
        self.complete(ep * 2, Some(Error::Aborted));
        self.complete(ep * 2 + 1, Some(Error::Aborted));
    }
}
