//! Request headers of a `GET` query.
//!
//! ```text
//!   GET services
//!   Columns: host_name description state
//!   Filter: state = 2
//!   Filter: acknowledged = 0
//!   And: 2
//!   OutputFormat: json
//! ```
//!
//! Parsing does not stop at the first bad header: `ResponseHeader:` and
//! `KeepAlive:` further down still apply to the error response.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::auth::{Authorization, User};
use crate::column::Column;
use crate::core::MonitoringCore;
use crate::error::RequestError;
use crate::filter::{ColumnFilter, Filter, RelationalOperator};
use crate::io::ResponseHeader;
use crate::render::{OutputFormat, Separators};
use crate::stats::{AggregationKind, StatsColumn};
use crate::tables::Table;
use crate::triggers::Trigger;
use crate::util::strings::{lstrip, next_field, strip};

/// Client clocks further off than this are rejected by `Localtime:`.
const MAX_TIMEZONE_DIFFERENCE_SECS: i64 = 24 * 60 * 60;

/// `Localtime:` differences are rounded to this granularity.
const TIMEZONE_GRANULARITY_SECS: i64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: Arc<Column>,
    pub descending: bool,
}

#[derive(Debug)]
pub struct ParsedQuery {
    pub columns: Vec<Arc<Column>>,
    /// False when `Columns:` was absent and every column is output.
    pub columns_given: bool,
    pub show_column_headers: bool,
    /// Value of an explicit `ColumnHeaders:` header.
    explicit_headers: Option<bool>,
    pub filter: Filter,
    pub stats: Vec<StatsColumn>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub time_limit: Option<Duration>,
    pub user: User,
    pub output_format: OutputFormat,
    pub separators: Separators,
    pub keepalive: bool,
    pub response_header: ResponseHeader,
    pub timezone_offset: i64,
    pub wait_object: Option<String>,
    pub wait_condition: Filter,
    pub wait_trigger: Option<Trigger>,
    pub wait_timeout: Option<Duration>,
    /// The first bad header, if any.
    pub error: Option<RequestError>,
}

impl Default for ParsedQuery {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            columns_given: false,
            show_column_headers: true,
            explicit_headers: None,
            filter: Filter::tautology(),
            stats: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            time_limit: None,
            user: User::NoAuth,
            output_format: OutputFormat::default(),
            separators: Separators::default(),
            keepalive: false,
            response_header: ResponseHeader::Off,
            timezone_offset: 0,
            wait_object: None,
            wait_condition: Filter::tautology(),
            wait_trigger: None,
            wait_timeout: None,
            error: None,
        }
    }
}

/// Filters collected so far; `And:`/`Or:`/`Negate:` combine the topmost.
#[derive(Default)]
struct FilterStack(Vec<Filter>);

impl FilterStack {
    fn pop_n(&mut self, header: &str, n: usize) -> Result<Vec<Filter>, RequestError> {
        if n > self.0.len() {
            return Err(RequestError::bad_request(format!(
                "error combining filters for '{header}': expected {n} filters, but only {} on stack",
                self.0.len()
            )));
        }
        Ok(self.0.split_off(self.0.len() - n))
    }

    fn combine(&mut self, header: &str, argument: &str, combine: fn(Vec<Filter>) -> Filter) -> Result<(), RequestError> {
        let n = parse_count(header, argument)?;
        let filters = self.pop_n(header, n)?;
        self.0.push(combine(filters));
        Ok(())
    }

    fn negate(&mut self, header: &str) -> Result<(), RequestError> {
        let filter = self.pop_n(header, 1)?.remove(0);
        self.0.push(filter.negate());
        Ok(())
    }

    fn into_filter(self) -> Filter {
        Filter::and(self.0)
    }
}

fn parse_count(header: &str, argument: &str) -> Result<usize, RequestError> {
    strip(argument)
        .parse()
        .map_err(|_| RequestError::bad_request(format!("{header}: expected a non-negative integer, got '{argument}'")))
}

fn parse_on_off(header: &str, argument: &str) -> Result<bool, RequestError> {
    match strip(argument) {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(RequestError::bad_request(format!("{header}: expected 'on' or 'off', got '{other}'"))),
    }
}

/// `<column> <operator> <value>`; the value may be empty or contain spaces.
fn parse_filter(table: &dyn Table, header: &str, argument: &str) -> Result<Filter, RequestError> {
    let mut rest = argument;
    let name = next_field(&mut rest)
        .ok_or_else(|| RequestError::bad_request(format!("{header}: missing column name")))?;
    let op = next_field(&mut rest)
        .ok_or_else(|| RequestError::bad_request(format!("{header}: missing operator after '{name}'")))?;
    let op: RelationalOperator = op.parse()?;
    let column = table.column(name)?;
    Ok(Filter::Column(ColumnFilter::new(column, op, lstrip(rest))?))
}

/// `Stats:` takes a filter, `<aggregation> <column>` or `<column> <aggregation>`.
fn parse_stats(table: &dyn Table, argument: &str) -> Result<StatsColumn, RequestError> {
    let fields: Vec<&str> = argument.split_whitespace().collect();
    if let [first, second] = fields.as_slice() {
        if let Ok(kind) = first.parse::<AggregationKind>()
            && let Ok(column) = table.column(second)
        {
            return Ok(StatsColumn::op(kind, column));
        }
        if let Ok(kind) = second.parse::<AggregationKind>() {
            return Ok(StatsColumn::op(kind, table.column(first)?));
        }
    }
    Ok(StatsColumn::Count(parse_filter(table, "Stats", argument)?))
}

/// Combines the topmost count stats for `StatsAnd:`/`StatsOr:`/`StatsNegate:`.
fn combine_stats(
    stats: &mut Vec<StatsColumn>,
    header: &str,
    n: usize,
    combine: impl FnOnce(Vec<Filter>) -> Filter,
) -> Result<(), RequestError> {
    if n > stats.len() {
        return Err(RequestError::bad_request(format!(
            "error combining stats for '{header}': expected {n} stats, but only {} on stack",
            stats.len()
        )));
    }
    let mut filters = Vec::with_capacity(n);
    for column in stats.split_off(stats.len() - n) {
        match column {
            StatsColumn::Count(filter) => filters.push(filter),
            StatsColumn::Op { .. } => {
                return Err(RequestError::bad_request(format!("{header}: only counting stats can be combined")));
            }
        }
    }
    stats.push(StatsColumn::Count(combine(filters)));
    Ok(())
}

fn parse_separators(argument: &str) -> Result<Separators, RequestError> {
    let codes: Result<Vec<u8>, _> = argument.split_whitespace().map(str::parse::<u8>).collect();
    match codes.as_deref() {
        Ok([dataset, field, list, host_service]) => Ok(Separators {
            dataset: *dataset,
            field: *field,
            list: *list,
            host_service: *host_service,
        }),
        _ => Err(RequestError::bad_request(format!(
            "Separators: expected four ASCII codes, got '{argument}'"
        ))),
    }
}

/// Offset added to server times so they read as client local times.
fn timezone_offset(argument: &str, now: i64) -> Result<i64, RequestError> {
    let client: i64 = strip(argument)
        .parse()
        .map_err(|_| RequestError::bad_request(format!("Localtime: expected a UNIX timestamp, got '{argument}'")))?;
    let too_large = || RequestError::bad_request("timezone difference greater than or equal to 24 hours");
    let difference = client.checked_sub(now).ok_or_else(too_large)?;
    let rounded = (difference as f64 / TIMEZONE_GRANULARITY_SECS as f64).round() * TIMEZONE_GRANULARITY_SECS as f64;
    if rounded.abs() >= MAX_TIMEZONE_DIFFERENCE_SECS as f64 {
        return Err(too_large());
    }
    Ok(rounded as i64)
}

impl ParsedQuery {
    /// Parses the header lines following `GET <table>`.
    pub fn parse(
        lines: &[String],
        table: &dyn Table,
        core: &dyn MonitoringCore,
        authorization: Authorization,
    ) -> Self {
        let mut query = ParsedQuery::default();
        let mut filters = FilterStack::default();
        let mut wait_conditions = FilterStack::default();
        for line in lines {
            if let Err(e) = query.parse_line(line, table, core, authorization, &mut filters, &mut wait_conditions)
                && query.error.is_none()
            {
                query.error = Some(e);
            }
        }
        query.filter = filters.into_filter();
        query.wait_condition = wait_conditions.into_filter();

        if !query.columns_given && query.stats.is_empty() {
            query.columns = table.catalog().columns().to_vec();
        }
        // Headers default to on only when every column is output.
        let all_columns = !query.columns_given && query.stats.is_empty();
        query.show_column_headers = query.explicit_headers.unwrap_or(all_columns);
        query
    }

    fn parse_line(
        &mut self,
        line: &str,
        table: &dyn Table,
        core: &dyn MonitoringCore,
        authorization: Authorization,
        filters: &mut FilterStack,
        wait_conditions: &mut FilterStack,
    ) -> Result<(), RequestError> {
        let Some((header, argument)) = line.split_once(':') else {
            return Err(RequestError::bad_request(format!("invalid header line '{line}'")));
        };
        let argument = lstrip(argument);
        match header {
            "Columns" => {
                self.columns_given = true;
                for name in argument.split_whitespace() {
                    self.columns.push(table.column(name)?);
                }
            }
            "Filter" => filters.0.push(parse_filter(table, header, argument)?),
            "And" => filters.combine(header, argument, Filter::and)?,
            "Or" => filters.combine(header, argument, Filter::or)?,
            "Negate" => filters.negate(header)?,
            "Stats" => self.stats.push(parse_stats(table, argument)?),
            "StatsAnd" => combine_stats(&mut self.stats, header, parse_count(header, argument)?, Filter::and)?,
            "StatsOr" => combine_stats(&mut self.stats, header, parse_count(header, argument)?, Filter::or)?,
            "StatsNegate" => combine_stats(&mut self.stats, header, 1, |mut f| f.remove(0).negate())?,
            "OrderBy" => {
                let mut rest = argument;
                let name = next_field(&mut rest)
                    .ok_or_else(|| RequestError::bad_request("OrderBy: missing column name"))?;
                let descending = match next_field(&mut rest) {
                    None | Some("asc") => false,
                    Some("desc") => true,
                    Some(other) => {
                        return Err(RequestError::bad_request(format!(
                            "OrderBy: expected 'asc' or 'desc', got '{other}'"
                        )));
                    }
                };
                self.order_by.push(OrderBy {
                    column: table.column(name)?,
                    descending,
                });
            }
            "Limit" => self.limit = Some(parse_count(header, argument)?),
            "Timelimit" => self.time_limit = Some(Duration::from_secs(parse_count(header, argument)? as u64)),
            "AuthUser" => self.user = User::resolve(core, strip(argument), authorization),
            "OutputFormat" => self.output_format = strip(argument).parse()?,
            "Separators" => self.separators = parse_separators(argument)?,
            "ColumnHeaders" => {
                self.explicit_headers = Some(parse_on_off(header, argument)?);
            }
            "KeepAlive" => self.keepalive = parse_on_off(header, argument)?,
            "ResponseHeader" => {
                self.response_header = match strip(argument) {
                    "off" => ResponseHeader::Off,
                    "fixed16" => ResponseHeader::Fixed16,
                    other => {
                        return Err(RequestError::bad_request(format!(
                            "ResponseHeader: expected 'off' or 'fixed16', got '{other}'"
                        )));
                    }
                };
            }
            "Localtime" => self.timezone_offset = timezone_offset(argument, Utc::now().timestamp())?,
            "WaitObject" => self.wait_object = Some(strip(argument).to_string()),
            "WaitCondition" => wait_conditions.0.push(parse_filter(table, header, argument)?),
            "WaitConditionAnd" => wait_conditions.combine(header, argument, Filter::and)?,
            "WaitConditionOr" => wait_conditions.combine(header, argument, Filter::or)?,
            "WaitConditionNegate" => wait_conditions.negate(header)?,
            "WaitTrigger" => {
                self.wait_trigger = Some(strip(argument).parse().map_err(RequestError::bad_request)?);
            }
            "WaitTimeout" => {
                let ms = parse_count(header, argument)?;
                self.wait_timeout = (ms > 0).then(|| Duration::from_millis(ms as u64));
            }
            _ => return Err(RequestError::bad_request(format!("undefined request header '{header}'"))),
        }
        Ok(())
    }

    /// Whether the query has to block before answering.
    pub fn waits(&self) -> bool {
        self.wait_object.is_some() || self.wait_trigger.is_some() || !self.wait_condition.is_tautology()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResponseCode;
    use crate::tables::hosts::HostsTable;
    use crate::tables::testing::context;

    fn parse(lines: &[&str]) -> ParsedQuery {
        let ctx = context();
        let table = HostsTable::new(&ctx);
        let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        ParsedQuery::parse(&lines, &table, ctx.core.as_ref(), Authorization::default())
    }

    #[test]
    fn test_defaults_select_all_columns_with_headers() {
        let query = parse(&[]);
        assert!(query.error.is_none());
        assert!(!query.columns_given);
        assert!(query.show_column_headers);
        assert!(query.columns.len() > 50);
        assert!(query.filter.is_tautology());
    }

    #[test]
    fn test_columns_turn_headers_off() {
        let query = parse(&["Columns: name host_address"]);
        assert_eq!(query.columns.len(), 2);
        assert_eq!(query.columns[1].name(), "address");
        assert!(!query.show_column_headers);
        assert!(parse(&["Columns: name", "ColumnHeaders: on"]).show_column_headers);
    }

    #[test]
    fn test_filter_combinators() {
        let query = parse(&["Filter: state = 0", "Filter: state = 1", "Or: 2", "Filter: name ~ host", "Negate:"]);
        assert!(query.error.is_none());
        match &query.filter {
            Filter::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], Filter::Or(or) if or.len() == 2));
            }
            other => panic!("unexpected filter {other:?}"),
        }
        let err = parse(&["Filter: state = 0", "And: 3"]).error.unwrap();
        assert!(err.message.contains("expected 3 filters, but only 1 on stack"));
    }

    #[test]
    fn test_stats_syntaxes() {
        let query = parse(&["Stats: state = 1", "Stats: state = 2", "StatsOr: 2", "Stats: sum latency", "Stats: latency max"]);
        assert!(query.error.is_none(), "{:?}", query.error);
        assert_eq!(query.stats.len(), 3);
        assert!(matches!(query.stats[0], StatsColumn::Count(Filter::Or(_))));
        assert!(matches!(query.stats[1], StatsColumn::Op { kind: AggregationKind::Sum, .. }));
        assert!(matches!(query.stats[2], StatsColumn::Op { kind: AggregationKind::Max, .. }));
        assert!(!query.show_column_headers);
        assert!(query.columns.is_empty());
    }

    #[test]
    fn test_first_error_wins_and_later_headers_apply() {
        let query = parse(&["Columns: nosuchcolumn", "Bogus: 1", "ResponseHeader: fixed16", "KeepAlive: on"]);
        let err = query.error.unwrap();
        assert_eq!(err.code, ResponseCode::BadRequest);
        assert_eq!(err.message, "Table 'hosts' has no column 'nosuchcolumn'");
        assert_eq!(query.response_header, ResponseHeader::Fixed16);
        assert!(query.keepalive);
    }

    #[test]
    fn test_misc_headers() {
        let query = parse(&[
            "Limit: 5",
            "Timelimit: 2",
            "OutputFormat: json",
            "Separators: 10 9 44 124",
            "AuthUser: alice",
            "OrderBy: name desc",
            "WaitTrigger: state",
            "WaitTimeout: 500",
            "WaitObject: myhost",
        ]);
        assert!(query.error.is_none(), "{:?}", query.error);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.time_limit, Some(Duration::from_secs(2)));
        assert_eq!(query.output_format, OutputFormat::Json);
        assert_eq!(query.separators.field, b'\t');
        assert_eq!(query.user.name(), Some("alice"));
        assert!(query.order_by[0].descending);
        assert_eq!(query.wait_trigger, Some(Trigger::State));
        assert_eq!(query.wait_timeout, Some(Duration::from_millis(500)));
        assert!(query.waits());
        assert!(parse(&["Limit: -1"]).error.is_some());
        assert!(parse(&["Missing colon"]).error.is_some());
    }

    #[test]
    fn test_timezone_offset() {
        assert_eq!(timezone_offset("10000", 10000 - 3590).unwrap(), 3600);
        assert_eq!(timezone_offset("10000", 10000 + 900).unwrap(), -1800);
        assert!(timezone_offset("200000", 100000).is_err());
        assert!(timezone_offset("soon", 0).is_err());
        assert!(timezone_offset("-9223372036854775808", 1_700_000_000).is_err());
        assert!(timezone_offset("9223372036854775807", -1).is_err());
        assert!(timezone_offset("9223372036854775807", 0).is_err());
    }
}
