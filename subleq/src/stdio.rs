//! Concrete `InputStream`/`OutputStream` adapters over real stdio (§4.1a). The
//! engine crate only knows the traits; this binary wires the real handles in,
//! deciding whether to flush after each byte based on `IsTerminal` (§6's "flushes
//! output after each byte when the output is a TTY").

use std::io::{self, IsTerminal, Stdout, Write};
use subleq_core::io::OutputStream;

/// Wraps `Stdout`, flushing after every byte when connected to a terminal and
/// batching otherwise (files and pipes get ordinary buffered-write performance).
pub struct StdioOutput {
    stdout: Stdout,
    is_terminal: bool,
}

impl StdioOutput {
    pub fn new() -> Self {
        let stdout = io::stdout();
        let is_terminal = stdout.is_terminal();
        StdioOutput { stdout, is_terminal }
    }
}

impl Default for StdioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputStream for StdioOutput {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.stdout.write_all(&[byte])?;
        if self.is_terminal {
            self.stdout.flush()?;
        }
        Ok(())
    }
}
