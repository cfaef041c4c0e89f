//! Request dispatch: `GET`, `COMMAND` and `LOGROTATE`.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, info};

use crate::counters::Counter;
use crate::error::RequestError;
use crate::io::OutputBuffer;
use crate::query::{ParsedQuery, Query};
use crate::tables::{Context, DummyTable, Table, all_tables};
use crate::triggers::Trigger;
use crate::util::strings::lstrip;

pub struct Store {
    ctx: Arc<Context>,
    tables: Vec<Box<dyn Table>>,
}

impl Store {
    pub fn new(ctx: Arc<Context>) -> Self {
        let tables = all_tables(&ctx);
        debug!("registered {} tables", tables.len());
        Self { ctx, tables }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn find_table(&self, name: &str) -> Option<&dyn Table> {
        self.tables.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Answers one request. Returns whether the connection stays open.
    pub fn answer_request<W: Write>(&self, lines: &[String], output: &mut OutputBuffer<'_, W>) -> bool {
        let Some((first, headers)) = lines.split_first() else {
            output.set_error(RequestError::bad_request("empty request"));
            return false;
        };
        if let Some(table) = first.strip_prefix("GET ") {
            return self.answer_get(lstrip(table).trim_end(), headers, output);
        }
        if first == "GET" {
            return self.answer_get("", headers, output);
        }
        if let Some(command) = first.strip_prefix("COMMAND ") {
            self.answer_command(lstrip(command));
            return true;
        }
        if first.starts_with("LOGROTATE") {
            info!("closing history files on request");
            self.ctx.log_cache.invalidate();
            return false;
        }
        output.set_error(RequestError::invalid_request(format!("Invalid request method '{first}'")));
        false
    }

    fn answer_get<W: Write>(&self, table_name: &str, headers: &[String], output: &mut OutputBuffer<'_, W>) -> bool {
        self.ctx.counters.increment(Counter::Requests);
        let Some(table) = self.find_table(table_name) else {
            let parsed = ParsedQuery::parse(
                headers,
                &DummyTable::default(),
                self.ctx.core.as_ref(),
                self.ctx.settings.authorization,
            );
            output.set_response_header(parsed.response_header);
            output.set_error(RequestError::not_found(format!("Table '{table_name}' does not exist")));
            return parsed.keepalive;
        };
        let mut query = Query::new(&self.ctx, table, headers);
        query.process(output);
        query.keepalive()
    }

    fn answer_command(&self, command: &str) {
        self.ctx.counters.increment(Counter::Commands);
        self.ctx.core.submit_command(command);
        self.ctx.triggers.notify_all(Trigger::Command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use crate::core::{InMemoryCore, ObjectDefinitions};
    use crate::config::Settings;
    use crate::error::ResponseCode;

    fn store() -> (Store, Arc<InMemoryCore>) {
        let core = Arc::new(InMemoryCore::new(ObjectDefinitions::typical_site()));
        let ctx = Context::new(core.clone(), Settings::default(), Arc::new(AtomicBool::new(false)));
        (Store::new(Arc::new(ctx)), core)
    }

    fn answer(store: &Store, request: &[&str]) -> (bool, String, Option<ResponseCode>) {
        let lines: Vec<String> = request.iter().map(|l| l.to_string()).collect();
        let mut sink = Vec::new();
        let mut output = OutputBuffer::new(&mut sink, Arc::new(AtomicBool::new(false)), usize::MAX);
        let keepalive = store.answer_request(&lines, &mut output);
        let code = output.error().map(|e| e.code);
        output.flush();
        drop(output);
        (keepalive, String::from_utf8(sink).unwrap(), code)
    }

    #[test]
    fn test_get() {
        let (store, _) = store();
        let (keepalive, out, code) = answer(&store, &["GET hosts", "Columns: name", "Filter: name = myhost"]);
        assert!(!keepalive);
        assert_eq!(out, "myhost\n");
        assert_eq!(code, None);
        assert_eq!(store.context().counters.value(Counter::Requests), 1);

        let (keepalive, _, _) = answer(&store, &["GET status", "Columns: program_version", "KeepAlive: on"]);
        assert!(keepalive);
    }

    #[test]
    fn test_get_hosts_as_csv() {
        let (store, _) = store();
        let (_, out, code) = answer(&store, &["GET hosts", "Filter: name = myhost", "OutputFormat: CSV"]);
        assert_eq!(code, None);
        let rows: Vec<&str> = out.split_terminator("\r\n").collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].split(',').any(|h| h == "\"name\""));
        assert!(rows[1].starts_with("\"myhost\","));
    }

    #[test]
    fn test_unknown_table_and_method() {
        let (store, _) = store();
        let (_, out, code) = answer(&store, &["GET nosuchtable"]);
        assert_eq!(code, Some(ResponseCode::NotFound));
        assert_eq!(out, "Table 'nosuchtable' does not exist\n");

        let (keepalive, out, code) = answer(&store, &["GET nosuchtable", "Columns: name", "KeepAlive: on", "ResponseHeader: fixed16"]);
        let message = "Table 'nosuchtable' does not exist\n";
        assert!(keepalive);
        assert_eq!(code, Some(ResponseCode::NotFound));
        assert_eq!(out, format!("404 {:>11}\n{message}", message.len()));
        assert_eq!(&out[..16], "404          35\n");

        let (keepalive, _, code) = answer(&store, &["PUT hosts"]);
        assert!(!keepalive);
        assert_eq!(code, Some(ResponseCode::InvalidRequest));
    }

    #[test]
    fn test_command_is_forwarded() {
        let (store, core) = store();
        let (keepalive, out, _) = answer(&store, &["COMMAND [1700000000] SCHEDULE_HOST_CHECK;myhost;1700000000"]);
        assert!(keepalive);
        assert!(out.is_empty());
        assert_eq!(core.submitted_commands(), vec!["[1700000000] SCHEDULE_HOST_CHECK;myhost;1700000000".to_string()]);
        assert_eq!(store.context().counters.value(Counter::Commands), 1);
    }

    #[test]
    fn test_every_table_is_registered() {
        let (store, _) = store();
        for name in [
            "hosts",
            "services",
            "hostgroups",
            "servicegroups",
            "contactgroups",
            "hostsbygroup",
            "servicesbygroup",
            "servicesbyhostgroup",
            "contacts",
            "commands",
            "downtimes",
            "comments",
            "timeperiods",
            "status",
            "log",
            "statehist",
            "crashreports",
            "eventconsoleevents",
            "eventconsolehistory",
            "eventconsolestatus",
            "eventconsolerules",
            "labels",
            "columns",
        ] {
            assert!(store.find_table(name).is_some(), "{name}");
        }
    }
}
