//! `embedded-io` transport adapter.
//!
//! Hosts whose UART already implements the `embedded-io` traits can wrap
//! it here instead of implementing [`Transport`] by hand. `ReadReady`
//! supplies the non-blocking availability check the polling model needs.

use embedded_io::{Read, ReadReady, Write};
use ld2402_core::transport::Transport;

/// Adapter from an `embedded-io` UART to the driver's [`Transport`]
pub struct IoTransport<T> {
    inner: T,
}

impl<T> IoTransport<T> {
    /// Wrap an `embedded-io` stream
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Recover the wrapped stream
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> Transport for IoTransport<T>
where
    T: Read + Write + ReadReady,
{
    type Error = T::Error;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(data)?;
        self.inner.flush()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut total = 0;
        while total < buf.len() && self.inner.read_ready()? {
            let n = self.inner.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }
}
