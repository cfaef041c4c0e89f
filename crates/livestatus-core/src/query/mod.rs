//! Execution of a parsed `GET` request.
//!
//! ```text
//!   ParsedQuery ──wait──▶ Table::answer_query ──row──▶ filter ─┬─▶ render
//!                                                              ├─▶ group + aggregate
//!                                                              └─▶ buffer for OrderBy
//! ```
//!
//! Plain queries stream rows into the [`OutputBuffer`] as they arrive.
//! Stats and `OrderBy:` queries collect first and render at the end.

pub mod parser;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Instant;

use tracing::debug;

use crate::column::{Row, Value};
use crate::error::RequestError;
use crate::filter::Filter;
use crate::io::OutputBuffer;
use crate::render::QueryRenderer;
use crate::stats::Aggregator;
use crate::tables::{Context, Scope, Table};
use crate::triggers::Trigger;

pub use parser::{OrderBy, ParsedQuery};

/// Orders values the way `OrderBy:` and stats groups sort them: numbers
/// numerically, strings bytewise, lists element by element.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.to_text().cmp(&b.to_text()),
        },
    }
}

fn compare_rows(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare_values(x, y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Values of the grouping columns, ordered by [`compare_values`].
struct GroupKey(Vec<Value>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_rows(&self.0, &other.0)
    }
}

/// Accepted rows waiting for `OrderBy:`.
struct SortedRow {
    keys: Vec<Value>,
    values: Vec<Value>,
}

pub struct Query<'a> {
    ctx: &'a Context,
    table: &'a dyn Table,
    parsed: ParsedQuery,
    renderer: QueryRenderer,
    started: Instant,
    accepted: usize,
    groups: BTreeMap<GroupKey, Vec<Box<dyn Aggregator>>>,
    sorted: Vec<SortedRow>,
}

impl<'a> Query<'a> {
    pub fn new(ctx: &'a Context, table: &'a dyn Table, lines: &[String]) -> Self {
        let parsed = ParsedQuery::parse(lines, table, ctx.core.as_ref(), ctx.settings.authorization);
        let renderer = QueryRenderer::new(parsed.output_format, parsed.separators, parsed.timezone_offset);
        Self {
            ctx,
            table,
            parsed,
            renderer,
            started: Instant::now(),
            accepted: 0,
            groups: BTreeMap::new(),
            sorted: Vec::new(),
        }
    }

    pub fn keepalive(&self) -> bool {
        self.parsed.keepalive
    }

    /// Answers the query into `output`. Errors end up in `output`.
    pub fn process<W: Write>(&mut self, output: &mut OutputBuffer<'_, W>) {
        output.set_response_header(self.parsed.response_header);
        if let Some(error) = self.parsed.error.take() {
            output.set_error(error);
            return;
        }
        if let Err(e) = self.wait() {
            output.set_error(e);
            return;
        }
        self.started = Instant::now();

        if self.parsed.show_column_headers {
            let mut headers: Vec<Value> = self.parsed.columns.iter().map(|c| Value::from(c.name())).collect();
            headers.extend((1..=self.parsed.stats.len()).map(|i| Value::from(format!("stats_{i}"))));
            self.renderer.row(headers.iter());
        }

        let filter = std::mem::replace(&mut self.parsed.filter, Filter::tautology());
        let user = self.parsed.user.clone();
        let scope = Scope {
            filter: &filter,
            user: &user,
            timezone_offset: self.parsed.timezone_offset,
        };
        let table = self.table;
        let result = table.answer_query(&scope, &mut |row| self.process_row(row, &filter, output));
        if let Err(e) = result {
            output.set_error(e);
        }
        self.parsed.filter = filter;
        if output.has_error() {
            return;
        }

        if !self.parsed.stats.is_empty() {
            self.render_groups(output);
        } else if !self.parsed.order_by.is_empty() {
            self.render_sorted(output);
        }
        self.renderer.end();
        output.append(&self.renderer.take());
    }

    /// Returns false to stop the table.
    fn process_row<W: Write>(&mut self, row: Row<'_>, filter: &Filter, output: &mut OutputBuffer<'_, W>) -> bool {
        if self.ctx.should_terminate() || output.should_terminate() {
            return false;
        }
        if let Some(limit) = self.parsed.time_limit
            && self.started.elapsed() > limit
        {
            output.set_error(RequestError::payload_too_large(format!(
                "Maximum query time of {} seconds exceeded!",
                limit.as_secs()
            )));
            return false;
        }
        let user = &self.parsed.user;
        let timezone_offset = self.parsed.timezone_offset;
        if !filter.accepts(row, user, timezone_offset) {
            return true;
        }

        let values: Vec<Value> = self.parsed.columns.iter().map(|c| c.get(row, user)).collect();
        if !self.parsed.stats.is_empty() {
            let stats = &self.parsed.stats;
            let aggregators = self
                .groups
                .entry(GroupKey(values))
                .or_insert_with(|| stats.iter().map(|s| s.create_aggregator()).collect());
            for aggregator in aggregators.iter_mut() {
                aggregator.consume(row, user, timezone_offset);
            }
            return true;
        }
        if !self.parsed.order_by.is_empty() {
            let keys = self.parsed.order_by.iter().map(|o| o.column.get(row, user)).collect();
            self.sorted.push(SortedRow { keys, values });
            return true;
        }

        if self.parsed.limit.is_some_and(|limit| self.accepted >= limit) {
            return false;
        }
        self.accepted += 1;
        self.renderer.row(values.iter());
        if !output.append(&self.renderer.take()) {
            return false;
        }
        output.flush_row_boundary();
        true
    }

    fn render_groups<W: Write>(&mut self, output: &mut OutputBuffer<'_, W>) {
        if self.groups.is_empty() && self.parsed.columns.is_empty() {
            let aggregators = self.parsed.stats.iter().map(|s| s.create_aggregator()).collect();
            self.groups.insert(GroupKey(Vec::new()), aggregators);
        }
        let limit = self.parsed.limit.unwrap_or(usize::MAX);
        for (key, aggregators) in std::mem::take(&mut self.groups).into_iter().take(limit) {
            let mut values = key.0;
            values.extend(aggregators.iter().map(|a| a.value()));
            self.renderer.row(values.iter());
            if !output.append(&self.renderer.take()) {
                return;
            }
            output.flush_row_boundary();
        }
    }

    fn render_sorted<W: Write>(&mut self, output: &mut OutputBuffer<'_, W>) {
        let order_by = &self.parsed.order_by;
        let mut rows = std::mem::take(&mut self.sorted);
        rows.sort_by(|a, b| {
            for (i, order) in order_by.iter().enumerate() {
                let ordering = compare_values(&a.keys[i], &b.keys[i]);
                let ordering = if order.descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        let limit = self.parsed.limit.unwrap_or(usize::MAX);
        for row in rows.into_iter().take(limit) {
            self.renderer.row(row.values.iter());
            if !output.append(&self.renderer.take()) {
                return;
            }
            output.flush_row_boundary();
        }
    }

    /// Blocks until the wait condition holds, the trigger fires or the
    /// wait times out.
    fn wait(&self) -> Result<(), RequestError> {
        if !self.parsed.waits() {
            return Ok(());
        }
        let trigger = self.parsed.wait_trigger.unwrap_or(Trigger::All);
        let condition = &self.parsed.wait_condition;
        let user = &self.parsed.user;
        let timezone_offset = self.parsed.timezone_offset;
        debug!(
            "waiting for trigger {} on table {} (object {:?})",
            trigger.name(),
            self.table.name(),
            self.parsed.wait_object
        );

        if let Some(object) = &self.parsed.wait_object {
            // Fail early for unknown objects instead of waiting for the timeout.
            self.table.with_row(object, user, &mut |_| true)?;
        }

        let mut error = None;
        let mut woken = false;
        self.ctx.triggers.wait_for(trigger, self.parsed.wait_timeout, || {
            if self.ctx.should_terminate() || error.is_some() {
                return true;
            }
            if condition.is_tautology() {
                // Without a condition the query waits for one notification.
                let done = woken;
                woken = true;
                return done;
            }
            match &self.parsed.wait_object {
                Some(object) => match self.table.with_row(object, user, &mut |row| {
                    condition.accepts(row, user, timezone_offset)
                }) {
                    Ok(holds) => holds,
                    Err(e) => {
                        error = Some(e);
                        true
                    }
                },
                None => {
                    let mut found = false;
                    let all = Filter::tautology();
                    let scope = Scope {
                        filter: &all,
                        user,
                        timezone_offset,
                    };
                    let result = self.table.answer_query(&scope, &mut |row| {
                        found = condition.accepts(row, user, timezone_offset);
                        !found
                    });
                    if let Err(e) = result {
                        error = Some(e);
                    }
                    found || error.is_some()
                }
            }
        });
        error.map_or(Ok(()), Err)
    }
}
