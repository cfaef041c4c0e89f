use std::fmt::Write as _;

use super::Renderer;

/// Escapes `text` as a double-quoted literal. Non-ASCII characters become
/// `\uXXXX`; outside the BMP either a surrogate pair or `\UXXXXXXXX`.
fn push_quoted(buffer: &mut Vec<u8>, text: &str, surrogate_pairs: bool) {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if c.is_ascii() => out.push(c),
            c if (c as u32) < 0x10000 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if surrogate_pairs => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
            c => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
        }
    }
    out.push('"');
    buffer.extend_from_slice(out.as_bytes());
}

/// Blob bytes as a latin-1 string, so arbitrary bytes survive JSON.
fn blob_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[derive(Default)]
pub struct JsonRenderer {
    buffer: Vec<u8>,
}

impl Renderer for JsonRenderer {
    fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    fn begin_query(&mut self) {
        self.buffer.push(b'[');
    }

    fn separate_query_elements(&mut self) {
        self.buffer.extend_from_slice(b",\n");
    }

    fn end_query(&mut self) {
        self.buffer.extend_from_slice(b"]\n");
    }

    fn begin_row(&mut self) {
        self.buffer.push(b'[');
    }

    fn separate_row_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn end_row(&mut self) {
        self.buffer.push(b']');
    }

    fn begin_list(&mut self) {
        self.buffer.push(b'[');
    }

    fn separate_list_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn end_list(&mut self) {
        self.buffer.push(b']');
    }

    fn begin_dict(&mut self) {
        self.buffer.push(b'{');
    }

    fn separate_dict_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn separate_dict_key_value(&mut self) {
        self.buffer.push(b':');
    }

    fn end_dict(&mut self) {
        self.buffer.push(b'}');
    }

    fn output_null(&mut self) {
        self.buffer.extend_from_slice(b"null");
    }

    fn output_blob(&mut self, bytes: &[u8]) {
        push_quoted(&mut self.buffer, &blob_text(bytes), true);
    }

    fn output_string(&mut self, text: &str) {
        push_quoted(&mut self.buffer, text, true);
    }
}

/// Python literal syntax; `python` marks non-ASCII strings with `u`.
pub struct PythonRenderer {
    buffer: Vec<u8>,
    python3: bool,
}

impl PythonRenderer {
    pub fn python2() -> Self {
        Self {
            buffer: Vec::new(),
            python3: false,
        }
    }

    pub fn python3() -> Self {
        Self {
            buffer: Vec::new(),
            python3: true,
        }
    }
}

impl Renderer for PythonRenderer {
    fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    fn begin_query(&mut self) {
        self.buffer.push(b'[');
    }

    fn separate_query_elements(&mut self) {
        self.buffer.extend_from_slice(b",\n");
    }

    fn end_query(&mut self) {
        self.buffer.extend_from_slice(b"]\n");
    }

    fn begin_row(&mut self) {
        self.buffer.push(b'[');
    }

    fn separate_row_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn end_row(&mut self) {
        self.buffer.push(b']');
    }

    fn begin_list(&mut self) {
        self.buffer.push(b'[');
    }

    fn separate_list_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn end_list(&mut self) {
        self.buffer.push(b']');
    }

    fn begin_dict(&mut self) {
        self.buffer.push(b'{');
    }

    fn separate_dict_elements(&mut self) {
        self.buffer.push(b',');
    }

    fn separate_dict_key_value(&mut self) {
        self.buffer.push(b':');
    }

    fn end_dict(&mut self) {
        self.buffer.push(b'}');
    }

    fn output_null(&mut self) {
        self.buffer.extend_from_slice(b"None");
    }

    fn output_blob(&mut self, bytes: &[u8]) {
        if self.python3 {
            self.buffer.push(b'b');
        }
        self.buffer.push(b'"');
        for &b in bytes {
            match b {
                b'"' | b'\\' => self.buffer.extend_from_slice(&[b'\\', b]),
                0x20..0x7f => self.buffer.push(b),
                _ => self.buffer.extend_from_slice(format!("\\x{b:02x}").as_bytes()),
            }
        }
        self.buffer.push(b'"');
    }

    fn output_string(&mut self, text: &str) {
        if !self.python3 && !text.is_ascii() {
            self.buffer.push(b'u');
        }
        push_quoted(&mut self.buffer, text, false);
    }
}
