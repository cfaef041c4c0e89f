use super::{Renderer, Separators, output_value};
use crate::column::Value;

/// RFC 4180 style: every field quoted, embedded quotes doubled.
#[derive(Default)]
pub struct CsvRenderer {
    buffer: Vec<u8>,
}

impl CsvRenderer {
    fn push_escaped(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'"' {
                self.buffer.push(b'"');
            }
            self.buffer.push(b);
        }
    }
}

impl Renderer for CsvRenderer {
    fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    fn separate_row_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn end_row(&mut self) {
        self.buffer.extend_from_slice(b"\r\n");
    }

    fn separate_list_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn separate_sublist_elements(&mut self) {
        self.buffer.push(b'|');
    }

    fn begin_sublist(&mut self) {}

    fn end_sublist(&mut self) {}

    fn separate_dict_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn separate_dict_key_value(&mut self) {
        self.buffer.push(b'|');
    }

    fn output_blob(&mut self, bytes: &[u8]) {
        self.push_escaped(bytes);
    }

    fn output_string(&mut self, text: &str) {
        self.push_escaped(text.as_bytes());
    }

    fn output_field(&mut self, value: &Value, timezone_offset: i64) {
        self.buffer.push(b'"');
        output_value(self, value, timezone_offset, 0);
        self.buffer.push(b'"');
    }
}

/// The original `csv` format: configurable separator bytes, no escaping.
pub struct BrokenCsvRenderer {
    buffer: Vec<u8>,
    separators: Separators,
}

impl BrokenCsvRenderer {
    pub fn new(separators: Separators) -> Self {
        Self {
            buffer: Vec::new(),
            separators,
        }
    }
}

impl Renderer for BrokenCsvRenderer {
    fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    fn separate_row_elements(&mut self) {
        self.buffer.push(self.separators.field);
    }

    fn end_row(&mut self) {
        self.buffer.push(self.separators.dataset);
    }

    fn separate_list_elements(&mut self) {
        self.buffer.push(self.separators.list);
    }

    fn begin_sublist(&mut self) {}

    fn separate_sublist_elements(&mut self) {
        self.buffer.push(self.separators.host_service);
    }

    fn end_sublist(&mut self) {}

    fn separate_dict_elements(&mut self) {
        self.buffer.push(self.separators.list);
    }

    fn separate_dict_key_value(&mut self) {
        self.buffer.push(self.separators.host_service);
    }

    fn output_blob(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn output_string(&mut self, text: &str) {
        self.buffer.extend_from_slice(text.as_bytes());
    }
}
