//! Byte-oriented I/O abstraction.
//!
//! The engine never touches `std::io::stdin()`/`stdout()` directly so that it can be
//! driven from real terminals, files, pipes, or in-memory buffers in tests. The binary
//! crate wires real stdio handles in; tests use `Cursor`/`Vec<u8>`.

use std::io::{self, Read};

/// A blocking byte source. `Ok(None)` signals end-of-input; interrupted reads are
/// retried transparently, matching the "retry on interrupt" suspension point of §5.
pub trait InputStream {
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

/// A byte sink.
pub trait OutputStream {
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}

impl<R: Read> InputStream for R {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            return match self.read(&mut buf) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
        }
    }
}

/// An in-memory sink, used by tests and by anything that wants to capture the guest's
/// output rather than stream it.
impl OutputStream for Vec<u8> {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.push(byte);
        Ok(())
    }
}
