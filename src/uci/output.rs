//! Protocol output channel.
//!
//! Both the command-processing thread and the search worker write
//! protocol lines; a shared locked writer keeps lines whole and lets
//! tests capture output in memory.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Clone-able handle to the protocol output stream.
#[derive(Clone)]
pub struct UciOut {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl UciOut {
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        UciOut {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Standard output, the normal protocol wire.
    #[must_use]
    pub fn stdout() -> Self {
        UciOut::new(Box::new(io::stdout()))
    }

    /// Write one protocol line and flush it immediately; the peer reads
    /// line by line and must never wait on a buffer.
    pub fn line(&self, args: fmt::Arguments<'_>) {
        let mut writer = self.inner.lock();
        let _ = writeln!(writer, "{args}");
        let _ = writer.flush();
    }
}
