//! Serial transport abstraction.
//!
//! The host owns the UART (baud rate, pins, buffering); the driver only
//! needs a duplex byte stream with a non-blocking read. Implementations
//! are injected into the driver facade.

/// Byte-oriented duplex stream
pub trait Transport {
    /// Error type for transport operations
    type Error;

    /// Write the whole buffer to the serial line
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read whatever bytes are currently available, without blocking.
    ///
    /// Returns the number of bytes placed in `buf`; zero when the line is
    /// idle.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}
