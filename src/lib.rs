//! A USB device protocol engine for FIFO-based full-speed controllers
//!
//! `fifo-usbd` runs the device side of USB on controllers that move data
//! through per-endpoint FIFOs: endpoint 0 control transfers, the transfer
//! requests of data endpoints, stalls, and resets. The [`acm`] module adds
//! a CDC-ACM serial class on top.
//!
//! To interface the library, implement [`Hardware`] for your controller.
//! Wrap it in a [`Controller`], and pair the controller with a [`Class`] in a
//! [`Device`]. Then call [`Device::poll`] from the USB interrupt, or from your
//! main loop.
//!
//! Requests borrow their buffers for as long as the controller holds them.
//! Each request comes back exactly once, through [`Class::complete`], with
//! its transferred length and error.
//!
//! Descriptors and enumeration are the job of a layer above this crate. The
//! [`SetupPacket`]s it doesn't handle reach your class.

#![no_std]

#[macro_use]
mod log;

mod control;
mod controller;
mod critical;
mod device;
mod endpoint;
mod error;
mod events;
mod fifo;
mod hardware;
mod request;
mod setup;
mod shared;
mod supervisor;
mod transfer;

#[cfg(test)]
mod mock;

pub mod acm;

pub use control::ControlState;
pub use controller::Controller;
pub use critical::CriticalSection;
pub use device::{Class, Device};
pub use endpoint::{EndpointConfig, EndpointDirectionType, FifoOwner};
pub use error::Error;
pub use events::{Events, Signals};
pub use hardware::{BusFlags, Ep0Status, Hardware, RawFlags};
pub use request::{Rejected, TransferRequest};
pub use setup::{Recipient, RequestKind, SetupPacket};
pub use shared::Shared;

/// Endpoints 0 through 7
pub const MAX_ENDPOINTS: usize = 8;

/// Maximum packet size of endpoint 0
pub const EP0_MAX_PACKET_SIZE: u16 = 64;

/// Largest full-speed data packet
pub const MAX_PACKET_SIZE: u16 = 64;
