//! Scoped masking of the controller interrupt

use crate::{Controller, Hardware};
use core::ops::{Deref, DerefMut};

/// Exclusive access to the controller with its interrupt masked
///
/// Entering the outermost section masks the controller interrupt; dropping
/// it restores the interrupt to what the application last asked for with
/// [`Controller::set_interrupts`]. Sections nest.
pub struct CriticalSection<'c, 'a, H: Hardware> {
    ctrl: &'c mut Controller<'a, H>,
}

impl<'c, 'a, H: Hardware> CriticalSection<'c, 'a, H> {
    pub(crate) fn enter(ctrl: &'c mut Controller<'a, H>) -> Self {
        if ctrl.mask_depth == 0 && ctrl.interrupts {
            ctrl.hw.set_interrupts(false);
        }
        ctrl.mask_depth += 1;
        CriticalSection { ctrl }
    }
}

impl<H: Hardware> Drop for CriticalSection<'_, '_, H> {
    fn drop(&mut self) {
        self.ctrl.mask_depth -= 1;
        if self.ctrl.mask_depth == 0 && self.ctrl.interrupts {
            self.ctrl.hw.set_interrupts(true);
        }
    }
}

impl<'a, H: Hardware> Deref for CriticalSection<'_, 'a, H> {
    type Target = Controller<'a, H>;
    fn deref(&self) -> &Self::Target {
        self.ctrl
    }
}

impl<'a, H: Hardware> DerefMut for CriticalSection<'_, 'a, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctrl
    }
}
