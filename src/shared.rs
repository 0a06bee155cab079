//! Sharing a device between an ISR and the main loop

use core::cell::RefCell;
use cortex_m::interrupt::{self, Mutex};

/// A value that both interrupt handlers and thread code may access
///
/// Every access runs in a global critical section, so keep the closures
/// short.
///
/// ```no_run
/// use fifo_usbd::Shared;
/// # struct Board;
/// # impl Board { fn poll(&mut self) {} }
///
/// static DEVICE: Shared<Option<Board>> = Shared::new(None);
///
/// // In the USB ISR:
/// DEVICE.with_mut(|device| {
///     if let Some(device) = device {
///         device.poll();
///     }
/// });
/// ```
pub struct Shared<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    pub const fn new(value: T) -> Self {
        Shared {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Interrupt-safe, immutable access to the value
    ///
    /// # Panics
    ///
    /// Panics if called from inside a `with_mut` closure.
    pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
        interrupt::free(|cs| {
            let value = self.inner.borrow(cs);
            let value = value.borrow();
            func(&*value)
        })
    }

    /// Interrupt-safe, mutable access to the value
    ///
    /// # Panics
    ///
    /// Panics if called from inside another `with` or `with_mut` closure.
    pub fn with_mut<R>(&self, func: impl FnOnce(&mut T) -> R) -> R {
        interrupt::free(|cs| {
            let value = self.inner.borrow(cs);
            let mut value = value.borrow_mut();
            func(&mut *value)
        })
    }
}
