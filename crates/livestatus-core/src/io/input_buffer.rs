//! Timeout-aware request reader.
//!
//! A request is a sequence of `\n`-terminated lines ended by an empty line.
//! Reading waits at most `idle_timeout` for the first byte of a request and
//! at most `query_timeout` for the rest of it. The shared termination flag
//! is polled between short read slices.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use super::channel::Channel;

const INITIAL_BUFFER_SIZE: usize = 4096;

/// Requests whose lines do not fit into this many bytes are rejected.
const MAXIMUM_BUFFER_SIZE: usize = 500 * 1024 * 1024;

/// Granularity for polling the termination flag while waiting for data.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestResult {
    RequestRead,
    UnexpectedEof,
    ShouldTerminate,
    LineTooLong,
    Timeout,
    InvalidUtf8,
    EmptyRequest,
}

enum ReadOutcome {
    Data,
    Eof,
    Timeout,
    ShouldTerminate,
}

pub struct InputBuffer<C: Channel> {
    channel: C,
    should_terminate: Arc<AtomicBool>,
    query_timeout: Duration,
    idle_timeout: Duration,
    buffer: Vec<u8>,
    read_index: usize,
    write_index: usize,
    request_lines: VecDeque<String>,
}

impl<C: Channel> InputBuffer<C> {
    /// Zero timeouts disable the respective limit.
    pub fn new(
        channel: C,
        should_terminate: Arc<AtomicBool>,
        query_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            should_terminate,
            query_timeout,
            idle_timeout,
            buffer: vec![0; INITIAL_BUFFER_SIZE],
            read_index: 0,
            write_index: 0,
            request_lines: VecDeque::new(),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Reads the next complete request into the line queue.
    pub fn read_request(&mut self) -> RequestResult {
        self.request_lines.clear();
        let mut scan = self.read_index;
        loop {
            let pending = &self.buffer[scan..self.write_index];
            if let Some(offset) = pending.iter().position(|&b| b == b'\n') {
                let newline = scan + offset;
                let mut end = newline;
                if end > self.read_index && self.buffer[end - 1] == b'\r' {
                    end -= 1;
                }
                let start = self.read_index;
                self.read_index = newline + 1;
                scan = self.read_index;
                if start == end {
                    return if self.request_lines.is_empty() {
                        RequestResult::EmptyRequest
                    } else {
                        RequestResult::RequestRead
                    };
                }
                match std::str::from_utf8(&self.buffer[start..end]) {
                    Ok(line) => self.request_lines.push_back(line.to_string()),
                    Err(_) => return RequestResult::InvalidUtf8,
                }
                continue;
            }

            scan = self.write_index;
            if self.write_index == self.buffer.len() {
                if self.read_index > 0 {
                    self.buffer.copy_within(self.read_index..self.write_index, 0);
                    self.write_index -= self.read_index;
                    scan -= self.read_index;
                    self.read_index = 0;
                } else if self.buffer.len() < MAXIMUM_BUFFER_SIZE {
                    let new_size = (self.buffer.len() * 2).min(MAXIMUM_BUFFER_SIZE);
                    self.buffer.resize(new_size, 0);
                } else {
                    return RequestResult::LineTooLong;
                }
            }

            let timeout = if self.has_pending_data() {
                self.query_timeout
            } else {
                self.idle_timeout
            };
            match self.read_data(timeout) {
                ReadOutcome::Data => {}
                ReadOutcome::Timeout => return RequestResult::Timeout,
                ReadOutcome::ShouldTerminate => return RequestResult::ShouldTerminate,
                ReadOutcome::Eof => return self.finish_at_eof(),
            }
        }
    }

    /// A client that closes its write side after the last line still gets
    /// an answer: collected lines plus an unterminated tail form the request.
    fn finish_at_eof(&mut self) -> RequestResult {
        if self.read_index < self.write_index {
            let tail = &self.buffer[self.read_index..self.write_index];
            let tail = tail.strip_suffix(b"\r").unwrap_or(tail);
            match std::str::from_utf8(tail) {
                Ok(line) => self.request_lines.push_back(line.to_string()),
                Err(_) => return RequestResult::InvalidUtf8,
            }
            self.read_index = self.write_index;
        }
        if self.request_lines.is_empty() {
            RequestResult::UnexpectedEof
        } else {
            RequestResult::RequestRead
        }
    }

    /// True while a request has started but not yet completed.
    pub fn has_pending_data(&self) -> bool {
        !self.request_lines.is_empty() || self.read_index < self.write_index
    }

    fn read_data(&mut self, timeout: Duration) -> ReadOutcome {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        loop {
            if self.should_terminate.load(Ordering::Relaxed) {
                return ReadOutcome::ShouldTerminate;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return ReadOutcome::Timeout;
                    }
                    (deadline - now).min(POLL_INTERVAL)
                }
                None => POLL_INTERVAL,
            };
            if let Err(e) = self
                .channel
                .set_read_timeout(Some(slice.max(Duration::from_millis(1))))
            {
                debug!("cannot set read timeout: {}", e);
                return ReadOutcome::Eof;
            }
            match self.channel.read(&mut self.buffer[self.write_index..]) {
                Ok(0) => return ReadOutcome::Eof,
                Ok(n) => {
                    self.write_index += n;
                    return ReadOutcome::Data;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    debug!("read error on {}: {}", self.channel.peer(), e);
                    return ReadOutcome::Eof;
                }
            }
        }
    }

    pub fn empty(&self) -> bool {
        self.request_lines.is_empty()
    }

    pub fn next_line(&mut self) -> Option<String> {
        self.request_lines.pop_front()
    }

    /// Takes all lines of the current request.
    pub fn get_lines(&mut self) -> Vec<String> {
        self.request_lines.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryChannel;

    fn buffer(channel: MemoryChannel) -> InputBuffer<MemoryChannel> {
        InputBuffer::new(
            channel,
            Arc::new(AtomicBool::new(false)),
            Duration::from_millis(300),
            Duration::from_millis(300),
        )
    }

    #[test]
    fn test_reads_consecutive_requests() {
        let channel = MemoryChannel::with_request(
            "GET hosts\nColumns: name\n\nGET services\r\nLimit: 1\r\n\r\n",
        );
        let mut input = buffer(channel);
        assert_eq!(input.read_request(), RequestResult::RequestRead);
        assert_eq!(input.get_lines(), vec!["GET hosts", "Columns: name"]);
        assert_eq!(input.read_request(), RequestResult::RequestRead);
        assert_eq!(input.next_line().as_deref(), Some("GET services"));
        assert_eq!(input.next_line().as_deref(), Some("Limit: 1"));
        assert!(input.empty());
        assert_eq!(input.read_request(), RequestResult::UnexpectedEof);
    }

    #[test]
    fn test_partial_reads_are_reassembled() {
        let channel = MemoryChannel::with_request("GET status\nColumns: program_version\n\n")
            .with_max_chunk(3);
        let mut input = buffer(channel);
        assert_eq!(input.read_request(), RequestResult::RequestRead);
        assert_eq!(input.get_lines().len(), 2);
    }

    #[test]
    fn test_eof_completes_unterminated_request() {
        let mut input = buffer(MemoryChannel::with_request("GET hosts\nColumns: name"));
        assert_eq!(input.read_request(), RequestResult::RequestRead);
        assert_eq!(input.get_lines(), vec!["GET hosts", "Columns: name"]);
    }

    #[test]
    fn test_empty_request() {
        let mut input = buffer(MemoryChannel::with_request("\n"));
        assert_eq!(input.read_request(), RequestResult::EmptyRequest);
    }

    #[test]
    fn test_invalid_utf8() {
        let channel = MemoryChannel::new();
        channel.feed(b"GET h\xffsts\n\n");
        channel.close();
        let mut input = buffer(channel);
        assert_eq!(input.read_request(), RequestResult::InvalidUtf8);
    }

    #[test]
    fn test_idle_timeout() {
        let channel = MemoryChannel::new();
        let mut input = buffer(channel);
        let start = Instant::now();
        assert_eq!(input.read_request(), RequestResult::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(!input.has_pending_data());
    }

    #[test]
    fn test_query_timeout_with_partial_request() {
        let channel = MemoryChannel::new();
        channel.feed(b"GET hosts\n");
        let mut input = buffer(channel);
        assert_eq!(input.read_request(), RequestResult::Timeout);
        assert!(input.has_pending_data());
    }

    #[test]
    fn test_should_terminate() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut input = InputBuffer::new(
            MemoryChannel::new(),
            flag,
            Duration::ZERO,
            Duration::ZERO,
        );
        assert_eq!(input.read_request(), RequestResult::ShouldTerminate);
    }

    #[test]
    fn test_long_line_grows_buffer() {
        let long = "x".repeat(3 * INITIAL_BUFFER_SIZE);
        let mut input = buffer(MemoryChannel::with_request(&format!("GET {long}\n\n")));
        assert_eq!(input.read_request(), RequestResult::RequestRead);
        assert_eq!(input.get_lines()[0].len(), long.len() + 4);
    }
}
