//! In-memory channel for testing the request path without sockets.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::channel::Channel;

#[derive(Debug, Default)]
struct Shared {
    input: VecDeque<u8>,
    output: Vec<u8>,
    /// Once set, an empty input reads as end of file instead of a timeout.
    closed: bool,
    read_timeout: Option<Duration>,
    max_chunk: Option<usize>,
}

/// A fake client connection: tests feed `input` and inspect `output`.
///
/// Clones share the same buffers, like duplicated socket handles.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that delivers `input` and then reports end of file.
    pub fn with_request(input: &str) -> Self {
        let channel = Self::new();
        channel.feed(input.as_bytes());
        channel.close();
        channel
    }

    pub fn feed(&self, bytes: &[u8]) {
        self.shared.lock().input.extend(bytes);
    }

    pub fn close(&self) {
        self.shared.lock().closed = true;
    }

    /// Delivers at most `n` bytes per read, to exercise partial reads.
    pub fn with_max_chunk(self, n: usize) -> Self {
        self.shared.lock().max_chunk = Some(n.max(1));
        self
    }

    pub fn output(&self) -> Vec<u8> {
        self.shared.lock().output.clone()
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = {
            let mut shared = self.shared.lock();
            if !shared.input.is_empty() {
                let limit = shared.max_chunk.unwrap_or(usize::MAX).min(buf.len());
                let n = limit.min(shared.input.len());
                for (slot, byte) in buf.iter_mut().zip(shared.input.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if shared.closed {
                return Ok(0);
            }
            shared.read_timeout
        };
        thread::sleep(timeout.unwrap_or(Duration::from_millis(10)));
        Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"))
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.shared.lock().output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for MemoryChannel {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.shared.lock().read_timeout = timeout;
        Ok(())
    }

    fn set_write_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(self.clone())
    }

    fn peer(&self) -> String {
        "memory".to_string()
    }
}
