//! Fixed-capacity byte ring buffer

/// A byte FIFO holding up to `N` bytes
pub struct Fifo<const N: usize> {
    buffer: [u8; N],
    head: usize,
    len: usize,
}

impl<const N: usize> Fifo<N> {
    const NOT_EMPTY: () = assert!(N > 0, "a FIFO needs room for at least one byte");

    /// An empty FIFO
    ///
    /// `N` must not be zero; this fails to build otherwise.
    pub const fn new() -> Self {
        let () = Self::NOT_EMPTY;
        Fifo {
            buffer: [0; N],
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes that still fit
    pub fn available(&self) -> usize {
        N - self.len
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Append as many bytes of `data` as fit
    ///
    /// Returns the number of bytes taken.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.available());
        for &byte in &data[..count] {
            self.buffer[(self.head + self.len) % N] = byte;
            self.len += 1;
        }
        count
    }

    /// Move up to `out.len()` bytes out of the FIFO
    ///
    /// Returns the number of bytes moved.
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        let count = self.peek(out);
        self.consume(count);
        count
    }

    /// Copy up to `out.len()` bytes without removing them
    pub fn peek(&self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.len);
        for (offset, byte) in out[..count].iter_mut().enumerate() {
            *byte = self.buffer[(self.head + offset) % N];
        }
        count
    }

    /// Drop up to `count` bytes from the front
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.len);
        self.head = (self.head + count) % N;
        self.len -= count;
    }
}

impl<const N: usize> Default for Fifo<N> {
    fn default() -> Self {
        Self::new()
    }
}
