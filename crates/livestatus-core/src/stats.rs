//! `Stats:` columns and their per-group accumulators.

use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

use crate::auth::User;
use crate::column::{Column, ColumnType, Row, Value};
use crate::filter::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    Sum,
    Min,
    Max,
    Avg,
    Std,
    SumInv,
    AvgInv,
}

impl FromStr for AggregationKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "sum" => AggregationKind::Sum,
            "min" => AggregationKind::Min,
            "max" => AggregationKind::Max,
            "avg" => AggregationKind::Avg,
            "std" => AggregationKind::Std,
            "suminv" => AggregationKind::SumInv,
            "avginv" => AggregationKind::AvgInv,
            _ => return Err(()),
        })
    }
}

/// Streaming statistic over a sequence of doubles.
///
/// Mean and variance use Welford's update, so every value is seen once.
/// An empty group yields 0 for every kind.
#[derive(Debug, Clone)]
pub struct Aggregation {
    kind: AggregationKind,
    count: u64,
    sum: f64,
    sum_inv: f64,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl Aggregation {
    pub fn new(kind: AggregationKind) -> Self {
        Self {
            kind,
            count: 0,
            sum: 0.0,
            sum_inv: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        if value != 0.0 {
            self.sum_inv += 1.0 / value;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn value(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match self.kind {
            AggregationKind::Sum => self.sum,
            AggregationKind::Min => self.min,
            AggregationKind::Max => self.max,
            AggregationKind::Avg => self.mean,
            AggregationKind::Std => (self.m2 / n).sqrt(),
            AggregationKind::SumInv => self.sum_inv,
            AggregationKind::AvgInv => self.sum_inv / n,
        }
    }
}

pub trait Aggregator: Send {
    fn consume(&mut self, row: Row<'_>, user: &User, timezone_offset: i64);
    fn value(&self) -> Value;
}

/// Counts rows accepted by its filter.
pub struct CountAggregator {
    filter: Filter,
    count: i64,
}

impl Aggregator for CountAggregator {
    fn consume(&mut self, row: Row<'_>, user: &User, timezone_offset: i64) {
        if self.filter.accepts(row, user, timezone_offset) {
            self.count += 1;
        }
    }

    fn value(&self) -> Value {
        Value::Int(self.count)
    }
}

/// Feeds a numeric column into an [`Aggregation`]. Time columns are
/// shifted by the timezone offset first.
pub struct NumericAggregator {
    column: Arc<Column>,
    aggregation: Aggregation,
}

impl Aggregator for NumericAggregator {
    fn consume(&mut self, row: Row<'_>, user: &User, timezone_offset: i64) {
        let value = self.column.get(row, user);
        let shift = if self.column.kind() == ColumnType::Time {
            timezone_offset as f64
        } else {
            0.0
        };
        if let Some(v) = value.as_f64() {
            self.aggregation.update(v + shift);
        }
    }

    fn value(&self) -> Value {
        Value::Double(self.aggregation.value())
    }
}

#[derive(Debug, Clone)]
pub enum StatsColumn {
    Count(Filter),
    Op { kind: AggregationKind, column: Arc<Column> },
}

impl StatsColumn {
    /// Aggregation over `column`. Columns without a numeric value cannot
    /// be aggregated; such requests count rows instead, as they always have.
    pub fn op(kind: AggregationKind, column: Arc<Column>) -> Self {
        match column.kind() {
            ColumnType::Int | ColumnType::Double | ColumnType::Time => StatsColumn::Op { kind, column },
            other => {
                warn!(
                    "cannot aggregate {} column '{}', counting rows instead",
                    other.name(),
                    column.name()
                );
                StatsColumn::Count(Filter::tautology())
            }
        }
    }

    pub fn create_aggregator(&self) -> Box<dyn Aggregator> {
        match self {
            StatsColumn::Count(filter) => Box::new(CountAggregator {
                filter: filter.clone(),
                count: 0,
            }),
            StatsColumn::Op { kind, column } => Box::new(NumericAggregator {
                column: Arc::clone(column),
                aggregation: Aggregation::new(*kind),
            }),
        }
    }

    /// The counting filter, for `StatsAnd:`/`StatsOr:`/`StatsNegate:`.
    pub fn filter(&self) -> Option<&Filter> {
        match self {
            StatsColumn::Count(filter) => Some(filter),
            StatsColumn::Op { .. } => None,
        }
    }
}
