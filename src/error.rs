//! Driver error type

use core::fmt;

/// Errors reported by the protocol engine
///
/// Precondition failures come back synchronously from the call that
/// caused them. Transfer failures travel inside the completed
/// [`TransferRequest`](crate::TransferRequest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A request is already registered for this endpoint and direction.
    AlreadyPending,
    /// The endpoint is disabled, or configured for the other direction.
    NotConfigured,
    /// The endpoint is halted.
    Stalled,
    /// The transfer was cancelled by a stall, reset or disconnect.
    Aborted,
    /// The USB address is above 127.
    InvalidAddress,
    /// The host, or the caller, broke the control transfer sequence.
    ProtocolViolation,
    /// The endpoint number or configuration can't be represented.
    InvalidEndpoint,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::AlreadyPending => "a transfer is already pending",
            Error::NotConfigured => "endpoint not configured",
            Error::Stalled => "endpoint stalled",
            Error::Aborted => "transfer aborted",
            Error::InvalidAddress => "invalid device address",
            Error::ProtocolViolation => "control transfer protocol violation",
            Error::InvalidEndpoint => "invalid endpoint configuration",
        };
        f.write_str(msg)
    }
}
