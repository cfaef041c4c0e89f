//! Consolidation of time series to a coarser step.

/// Consolidation function applied to each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidationFunction {
    Max,
    Min,
    Average,
    Last,
}

impl ConsolidationFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "MAX" => Some(Self::Max),
            "MIN" => Some(Self::Min),
            "AVERAGE" | "AVG" => Some(Self::Average),
            "LAST" => Some(Self::Last),
            _ => None,
        }
    }

    /// Reduces one window. NaN samples are ignored; an all-NaN window yields NaN.
    ///
    /// The average accumulates in window order, so results are not
    /// guaranteed to be bit-identical to a different summation order.
    fn consolidate(self, window: &[f64]) -> f64 {
        let mut values = window.iter().copied().filter(|v| !v.is_nan());
        match self {
            Self::Max => values.reduce(f64::max).unwrap_or(f64::NAN),
            Self::Min => values.reduce(f64::min).unwrap_or(f64::NAN),
            Self::Last => values.last().unwrap_or(f64::NAN),
            Self::Average => {
                let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if count == 0 { f64::NAN } else { sum / count as f64 }
            }
        }
    }
}

/// Consolidates `input` sampled every `act_step` seconds to `target_step`.
///
/// Returns the consolidated series and the step actually used. A target
/// step not larger than the actual step leaves the series untouched; a
/// trailing partial window is consolidated on its own.
pub fn rrd_consolidate(
    cf: ConsolidationFunction,
    input: &[f64],
    act_step: u64,
    target_step: u64,
) -> (Vec<f64>, u64) {
    if act_step == 0 || target_step <= act_step {
        return (input.to_vec(), act_step);
    }
    let factor = (target_step / act_step).max(1) as usize;
    let output = input.chunks(factor).map(|w| cf.consolidate(w)).collect();
    (output, act_step * factor as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_constant_series() {
        let input = vec![42.0; 200];
        let (output, step) = rrd_consolidate(ConsolidationFunction::Max, &input, 10, 20);
        assert_eq!(step, 20);
        assert_eq!(output.len(), 100);
        assert!(output.iter().all(|&v| v == 42.0));
    }

    #[test]
    fn test_functions_on_windows() {
        let input = [1.0, 5.0, 3.0, 2.0, f64::NAN, 4.0];
        let run = |cf| rrd_consolidate(cf, &input, 60, 180).0;
        assert_eq!(run(ConsolidationFunction::Max), vec![5.0, 4.0]);
        assert_eq!(run(ConsolidationFunction::Min), vec![1.0, 2.0]);
        assert_eq!(run(ConsolidationFunction::Average), vec![3.0, 3.0]);
        assert_eq!(run(ConsolidationFunction::Last), vec![3.0, 4.0]);
    }

    #[test]
    fn test_finer_target_is_identity() {
        let input = [1.0, 2.0];
        let (output, step) = rrd_consolidate(ConsolidationFunction::Max, &input, 60, 30);
        assert_eq!(output, input);
        assert_eq!(step, 60);
    }

    #[test]
    fn test_all_nan_window() {
        let (output, _) =
            rrd_consolidate(ConsolidationFunction::Average, &[f64::NAN, f64::NAN], 1, 2);
        assert!(output[0].is_nan());
    }

    #[test]
    fn test_names() {
        assert_eq!(ConsolidationFunction::from_name("max"), Some(ConsolidationFunction::Max));
        assert_eq!(ConsolidationFunction::from_name("AVERAGE"), Some(ConsolidationFunction::Average));
        assert_eq!(ConsolidationFunction::from_name("median"), None);
    }
}
