//! Foundation helpers: strings, regular expressions, performance data,
//! time series consolidation and decaying averages.

pub mod average;
pub mod perf_data;
pub mod regexp;
pub mod rrd;
pub mod strings;

pub use average::Average;
pub use perf_data::{Metric, PerformanceData};
pub use regexp::{Case, RegExp, Syntax};
pub use rrd::{ConsolidationFunction, rrd_consolidate};
