//! Output encodings.
//!
//! A [`Renderer`] knows the brackets and separators of one wire format;
//! [`QueryRenderer`] drives it for a whole response and decides where
//! separators go. Renderers write into their own byte buffer, which the
//! query moves to the output buffer at row boundaries, so an aborted
//! response never ends inside a value.

mod csv;
mod json;

use std::str::FromStr;

use crate::column::Value;
use crate::error::RequestError;

pub use csv::{BrokenCsvRenderer, CsvRenderer};
pub use json::{JsonRenderer, PythonRenderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `csv`: the historic format with configurable separators and no quoting.
    #[default]
    BrokenCsv,
    /// `CSV`: quoted fields, CRLF line ends.
    Csv,
    Json,
    Python,
    Python3,
}

impl FromStr for OutputFormat {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "csv" => OutputFormat::BrokenCsv,
            "CSV" => OutputFormat::Csv,
            "json" => OutputFormat::Json,
            "python" => OutputFormat::Python,
            "python3" => OutputFormat::Python3,
            _ => {
                return Err(RequestError::bad_request(format!(
                    "missing/invalid output format '{s}', use one of 'CSV', 'csv', 'json', 'python', 'python3'"
                )));
            }
        })
    }
}

/// Byte values of the `csv` separators, as sent in `Separators:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Separators {
    pub dataset: u8,
    pub field: u8,
    pub list: u8,
    pub host_service: u8,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            dataset: b'\n',
            field: b';',
            list: b',',
            host_service: b'|',
        }
    }
}

/// Structural output of one format.
pub trait Renderer: Send {
    fn buffer(&mut self) -> &mut Vec<u8>;

    fn begin_query(&mut self) {}
    fn separate_query_elements(&mut self) {}
    fn end_query(&mut self) {}

    fn begin_row(&mut self) {}
    fn separate_row_elements(&mut self);
    fn end_row(&mut self);

    fn begin_list(&mut self) {}
    fn separate_list_elements(&mut self);
    fn end_list(&mut self) {}

    fn begin_sublist(&mut self) {
        self.begin_list();
    }
    fn separate_sublist_elements(&mut self) {
        self.separate_list_elements();
    }
    fn end_sublist(&mut self) {
        self.end_list();
    }

    fn begin_dict(&mut self) {}
    fn separate_dict_elements(&mut self);
    fn separate_dict_key_value(&mut self);
    fn end_dict(&mut self) {}

    fn output_null(&mut self) {}
    fn output_blob(&mut self, bytes: &[u8]);
    fn output_string(&mut self, text: &str);

    fn output_int(&mut self, value: i64) {
        self.buffer().extend_from_slice(value.to_string().as_bytes());
    }

    fn output_double(&mut self, value: f64) {
        if value.is_finite() {
            self.buffer().extend_from_slice(value.to_string().as_bytes());
        } else {
            self.output_null();
        }
    }

    /// One column of a row. Formats that quote whole fields override this.
    fn output_field(&mut self, value: &Value, timezone_offset: i64) {
        output_value(self, value, timezone_offset, 0);
    }
}

pub(crate) fn output_value<R: Renderer + ?Sized>(r: &mut R, value: &Value, timezone_offset: i64, depth: usize) {
    match value {
        Value::Null => r.output_null(),
        Value::Int(v) => r.output_int(*v),
        Value::Double(v) => r.output_double(*v),
        Value::Time(v) => r.output_int(v.saturating_add(timezone_offset)),
        Value::Str(s) => r.output_string(s),
        Value::Blob(bytes) => r.output_blob(bytes),
        Value::List(items) => {
            let nested = depth > 0;
            if nested {
                r.begin_sublist();
            } else {
                r.begin_list();
            }
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    if nested {
                        r.separate_sublist_elements();
                    } else {
                        r.separate_list_elements();
                    }
                }
                output_value(r, item, timezone_offset, depth + 1);
            }
            if nested {
                r.end_sublist();
            } else {
                r.end_list();
            }
        }
        Value::Dict(entries) => {
            r.begin_dict();
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    r.separate_dict_elements();
                }
                r.output_string(key);
                r.separate_dict_key_value();
                output_value(r, item, timezone_offset, depth + 1);
            }
            r.end_dict();
        }
    }
}

pub fn make_renderer(format: OutputFormat, separators: Separators) -> Box<dyn Renderer> {
    match format {
        OutputFormat::BrokenCsv => Box::new(BrokenCsvRenderer::new(separators)),
        OutputFormat::Csv => Box::new(CsvRenderer::default()),
        OutputFormat::Json => Box::new(JsonRenderer::default()),
        OutputFormat::Python => Box::new(PythonRenderer::python2()),
        OutputFormat::Python3 => Box::new(PythonRenderer::python3()),
    }
}

/// Places query, row and field separators around a renderer.
pub struct QueryRenderer {
    renderer: Box<dyn Renderer>,
    timezone_offset: i64,
    rows: usize,
    fields: usize,
}

impl QueryRenderer {
    pub fn new(format: OutputFormat, separators: Separators, timezone_offset: i64) -> Self {
        let mut renderer = make_renderer(format, separators);
        renderer.begin_query();
        Self {
            renderer,
            timezone_offset,
            rows: 0,
            fields: 0,
        }
    }

    pub fn begin_row(&mut self) {
        if self.rows > 0 {
            self.renderer.separate_query_elements();
        }
        self.rows += 1;
        self.fields = 0;
        self.renderer.begin_row();
    }

    pub fn field(&mut self, value: &Value) {
        if self.fields > 0 {
            self.renderer.separate_row_elements();
        }
        self.fields += 1;
        self.renderer.output_field(value, self.timezone_offset);
    }

    pub fn end_row(&mut self) {
        self.renderer.end_row();
    }

    /// Convenience for header rows and plain string rows.
    pub fn row<'v>(&mut self, values: impl IntoIterator<Item = &'v Value>) {
        self.begin_row();
        for value in values {
            self.field(value);
        }
        self.end_row();
    }

    pub fn end(&mut self) {
        self.renderer.end_query();
    }

    /// Bytes rendered since the last call.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(self.renderer.buffer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(format: OutputFormat, rows: &[Vec<Value>]) -> String {
        let mut r = QueryRenderer::new(format, Separators::default(), 0);
        for row in rows {
            r.row(row.iter());
        }
        r.end();
        String::from_utf8(r.take()).unwrap()
    }

    fn sample() -> Vec<Vec<Value>> {
        vec![
            vec![Value::from("name"), Value::from("services")],
            vec![
                Value::from("my \"host\""),
                Value::List(vec![
                    Value::List(vec![Value::from("CPU"), Value::Int(2)]),
                    Value::List(vec![Value::from("Memory"), Value::Int(0)]),
                ]),
            ],
        ]
    }

    #[test]
    fn test_broken_csv() {
        assert_eq!(
            render(OutputFormat::BrokenCsv, &sample()),
            "name;services\nmy \"host\";CPU|2,Memory|0\n"
        );
    }

    #[test]
    fn test_csv() {
        assert_eq!(
            render(OutputFormat::Csv, &sample()),
            "\"name\",\"services\"\r\n\"my \"\"host\"\"\",\"CPU|2,Memory|0\"\r\n"
        );
    }

    #[test]
    fn test_json() {
        assert_eq!(
            render(OutputFormat::Json, &sample()),
            "[[\"name\",\"services\"],\n[\"my \\\"host\\\"\",[[\"CPU\",2],[\"Memory\",0]]]]\n"
        );
    }

    #[test]
    fn test_python() {
        let rows = vec![vec![Value::Null, Value::Dict(vec![("a".into(), Value::Double(1.5))])]];
        assert_eq!(render(OutputFormat::Python3, &rows), "[[None,{\"a\":1.5}]]\n");
    }

    #[test]
    fn test_time_is_shifted() {
        let mut r = QueryRenderer::new(OutputFormat::BrokenCsv, Separators::default(), 60);
        r.row([Value::Time(100)].iter());
        assert_eq!(r.take(), b"160\n");
    }

    #[test]
    fn test_custom_separators() {
        let separators = Separators {
            dataset: b'#',
            field: b'\t',
            list: b'+',
            host_service: b'/',
        };
        let mut r = QueryRenderer::new(OutputFormat::BrokenCsv, separators, 0);
        r.row(sample()[1].iter());
        assert_eq!(String::from_utf8(r.take()).unwrap(), "my \"host\"\tCPU/2+Memory/0#");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::BrokenCsv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
