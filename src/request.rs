//! Transfer requests

use crate::Error;
use usb_device::{endpoint::EndpointAddress, UsbDirection};

/// A transfer between a borrowed buffer and one endpoint
///
/// Once submitted, the request belongs to the [`Controller`](crate::Controller) until
/// it comes back through [`Class::complete`](crate::Class::complete),
/// exactly once, with the final [`transferred_length`](Self::transferred_length)
/// and [`error`](Self::error).
#[derive(Debug)]
pub struct TransferRequest<'a> {
    endpoint: EndpointAddress,
    buffer: &'a mut [u8],
    requested: usize,
    transferred: usize,
    context: usize,
    error: Option<Error>,
}

impl<'a> TransferRequest<'a> {
    /// Transfer `buffer.len()` bytes on `endpoint`
    ///
    /// For IN endpoints, the buffer holds the data to send. For OUT
    /// endpoints, it receives the data.
    pub fn new(endpoint: EndpointAddress, buffer: &'a mut [u8]) -> Self {
        let requested = buffer.len();
        TransferRequest {
            endpoint,
            buffer,
            requested,
            transferred: 0,
            context: 0,
            error: None,
        }
    }

    /// Transfer only the first `len` bytes of the buffer
    ///
    /// `len` is clamped to the buffer's length.
    pub fn with_length(mut self, len: usize) -> Self {
        self.requested = len.min(self.buffer.len());
        self
    }

    /// Tag the request with an issuer-defined value
    pub fn with_context(mut self, context: usize) -> Self {
        self.context = context;
        self
    }

    pub fn endpoint(&self) -> EndpointAddress {
        self.endpoint
    }

    pub fn direction(&self) -> UsbDirection {
        self.endpoint.direction()
    }

    pub fn context(&self) -> usize {
        self.context
    }

    pub fn requested_length(&self) -> usize {
        self.requested
    }

    pub fn transferred_length(&self) -> usize {
        self.transferred
    }

    /// `None` if the transfer succeeded
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// The bytes transferred so far
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.transferred]
    }

    /// Release the buffer
    pub fn into_buffer(self) -> &'a mut [u8] {
        self.buffer
    }

    pub(crate) fn remaining(&self) -> usize {
        self.requested - self.transferred
    }

    pub(crate) fn is_done(&self) -> bool {
        self.transferred == self.requested
    }

    /// The next `len` bytes to send
    pub(crate) fn unsent(&self, len: usize) -> &[u8] {
        let len = len.min(self.remaining());
        &self.buffer[self.transferred..self.transferred + len]
    }

    /// Room for the next `len` bytes to receive
    pub(crate) fn unfilled(&mut self, len: usize) -> &mut [u8] {
        let len = len.min(self.remaining());
        &mut self.buffer[self.transferred..self.transferred + len]
    }

    /// Account for `len` more transferred bytes
    pub(crate) fn advance(&mut self, len: usize) {
        self.transferred = (self.transferred + len).min(self.requested);
    }

    pub(crate) fn clamp(&mut self, len: usize) {
        self.requested = self.requested.min(len);
        self.transferred = self.transferred.min(self.requested);
    }

    pub(crate) fn finish(&mut self, error: Option<Error>) {
        self.error = error;
    }
}

/// A request that [`Controller::submit`](crate::Controller::submit) refused
///
/// The request comes back untouched, so the issuer keeps its buffer.
#[derive(Debug)]
pub struct Rejected<'a> {
    error: Error,
    request: TransferRequest<'a>,
}

impl<'a> Rejected<'a> {
    pub(crate) fn new(error: Error, request: TransferRequest<'a>) -> Self {
        Rejected { error, request }
    }

    pub fn error(&self) -> Error {
        self.error
    }

    pub fn into_request(self) -> TransferRequest<'a> {
        self.request
    }

    /// Shorthand for `into_request().into_buffer()`
    pub fn into_buffer(self) -> &'a mut [u8] {
        self.request.into_buffer()
    }
}

/// Request slot for an endpoint address
pub(crate) fn index(ep_addr: EndpointAddress) -> usize {
    (ep_addr.index() * 2) + (UsbDirection::In == ep_addr.direction()) as usize
}
