//! Response writer.
//!
//! Without a response header the body is streamed in chunks at row
//! boundaries. With `fixed16` everything is buffered, because the header
//! carries the final length and status.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::{RequestError, ResponseCode};

/// Buffered bytes that trigger an intermediate write when streaming.
const FLUSH_THRESHOLD: usize = 64 * 1024;

/// Size of each socket write, so the termination flag is polled in between.
const WRITE_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseHeader {
    #[default]
    Off,
    Fixed16,
}

pub struct OutputBuffer<'w, W: Write> {
    writer: &'w mut W,
    should_terminate: Arc<AtomicBool>,
    max_response_size: usize,
    response_header: ResponseHeader,
    buffer: Vec<u8>,
    streamed: usize,
    error: Option<RequestError>,
    write_failed: bool,
}

impl<'w, W: Write> OutputBuffer<'w, W> {
    pub fn new(writer: &'w mut W, should_terminate: Arc<AtomicBool>, max_response_size: usize) -> Self {
        Self {
            writer,
            should_terminate,
            max_response_size,
            response_header: ResponseHeader::Off,
            buffer: Vec::new(),
            streamed: 0,
            error: None,
            write_failed: false,
        }
    }

    pub fn set_response_header(&mut self, header: ResponseHeader) {
        self.response_header = header;
    }

    pub fn response_header(&self) -> ResponseHeader {
        self.response_header
    }

    pub fn should_terminate(&self) -> bool {
        self.should_terminate.load(Ordering::Relaxed)
    }

    /// Appends rendered bytes. Returns false once output should stop.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        if self.error.is_some() || self.write_failed {
            return false;
        }
        if self.streamed + self.buffer.len() + bytes.len() > self.max_response_size {
            self.buffer.clear();
            self.set_error(RequestError::payload_too_large(format!(
                "Maximum response size of {} bytes exceeded!",
                self.max_response_size
            )));
            return false;
        }
        self.buffer.extend_from_slice(bytes);
        true
    }

    /// Called between rows; streams the buffer if streaming is possible.
    pub fn flush_row_boundary(&mut self) {
        if self.response_header == ResponseHeader::Off
            && self.error.is_none()
            && self.buffer.len() >= FLUSH_THRESHOLD
        {
            let chunk = std::mem::take(&mut self.buffer);
            self.streamed += chunk.len();
            self.write(&chunk);
        }
    }

    /// Records an error; the first one wins.
    pub fn set_error(&mut self, error: RequestError) {
        if let Some(existing) = &self.error {
            debug!("ignoring follow-up error '{}' after '{}'", error, existing);
            return;
        }
        debug!("request error: {}", error.message);
        self.error = Some(error);
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Writes whatever is pending: header, body or error message.
    pub fn flush(&mut self) {
        let (code, body) = match self.error.take() {
            Some(error) => {
                if self.streamed > 0 {
                    warn!("error after {} bytes were already sent", self.streamed);
                }
                self.buffer.clear();
                (error.code, format!("{}\n", error.message).into_bytes())
            }
            None => (ResponseCode::Ok, std::mem::take(&mut self.buffer)),
        };
        if self.response_header == ResponseHeader::Fixed16 {
            let header = format!("{:03} {:>11}\n", code.as_u16(), body.len());
            self.write(header.as_bytes());
        }
        self.write(&body);
        if !self.write_failed
            && let Err(e) = self.writer.flush()
        {
            debug!("flush failed: {}", e);
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(WRITE_CHUNK) {
            if self.write_failed {
                return;
            }
            if self.should_terminate() {
                debug!("aborting write due to shutdown");
                self.write_failed = true;
                return;
            }
            if let Err(e) = self.writer.write_all(chunk) {
                debug!("write failed: {}", e);
                self.write_failed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn test_fixed16_header() {
        let mut sink = Vec::new();
        let mut out = OutputBuffer::new(&mut sink, flag(), 1024);
        out.set_response_header(ResponseHeader::Fixed16);
        assert!(out.append(b"hello\n"));
        out.flush();
        assert_eq!(sink, b"200           6\nhello\n");
    }

    #[test]
    fn test_error_replaces_body() {
        let mut sink = Vec::new();
        let mut out = OutputBuffer::new(&mut sink, flag(), 1024);
        out.set_response_header(ResponseHeader::Fixed16);
        out.append(b"partial");
        out.set_error(RequestError::not_found("Invalid GET request, no such table 'x'"));
        out.set_error(RequestError::bad_request("second"));
        out.flush();
        let text = String::from_utf8(sink).unwrap();
        assert!(text.starts_with("404          39\n"));
        assert!(text.ends_with("no such table 'x'\n"));
        assert_eq!(text.len(), 16 + 39);
    }

    #[test]
    fn test_max_response_size() {
        let mut sink = Vec::new();
        let mut out = OutputBuffer::new(&mut sink, flag(), 10);
        out.set_response_header(ResponseHeader::Fixed16);
        assert!(out.append(b"12345"));
        assert!(!out.append(b"678901"));
        assert!(!out.append(b"x"));
        out.flush();
        let text = String::from_utf8(sink).unwrap();
        assert!(text.starts_with("413"));
        assert!(text.contains("Maximum response size of 10 bytes exceeded!"));
    }

    #[test]
    fn test_streaming_without_header() {
        let mut sink = Vec::new();
        let mut out = OutputBuffer::new(&mut sink, flag(), usize::MAX);
        let row = vec![b'a'; FLUSH_THRESHOLD];
        out.append(&row);
        out.flush_row_boundary();
        out.append(b"tail");
        out.flush();
        assert_eq!(sink.len(), FLUSH_THRESHOLD + 4);
    }

    #[test]
    fn test_error_after_streaming_appends_message() {
        let mut sink = Vec::new();
        let mut out = OutputBuffer::new(&mut sink, flag(), usize::MAX);
        out.append(&vec![b'a'; FLUSH_THRESHOLD]);
        out.flush_row_boundary();
        out.append(b"unsent row\n");
        out.set_error(RequestError::payload_too_large("Maximum query time of 1 seconds exceeded!"));
        assert!(!out.append(b"more"));
        out.flush();
        let text = String::from_utf8(sink).unwrap();
        assert_eq!(text.len(), FLUSH_THRESHOLD + "Maximum query time of 1 seconds exceeded!\n".len());
        assert!(text.ends_with("aMaximum query time of 1 seconds exceeded!\n"));
        assert!(!text.contains("unsent row"));
    }

    #[test]
    fn test_terminated_output_is_dropped() {
        let mut sink = Vec::new();
        let mut out = OutputBuffer::new(&mut sink, Arc::new(AtomicBool::new(true)), 100);
        out.append(b"abc");
        out.flush();
        assert!(sink.is_empty());
    }
}
