//! Parser for plugin performance data.
//!
//! Format: `name=value[uom];warn;crit;min;max`, tokens separated by
//! whitespace. Names containing spaces are single-quoted. Optional fields
//! may be empty or missing. A trailing `[check_command]` token is skipped.

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub unit_of_measure: String,
    pub warning: Option<f64>,
    pub critical: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceData {
    metrics: Vec<Metric>,
    check_command: Option<String>,
}

impl PerformanceData {
    pub fn parse(perf_data: &str) -> Self {
        let mut result = Self::default();
        let mut rest = perf_data.trim();
        while !rest.is_empty() {
            let (token, tail) = next_token(rest);
            rest = tail.trim_start();
            if token.starts_with('[') && token.ends_with(']') && rest.is_empty() {
                result.check_command = Some(token[1..token.len() - 1].to_string());
                break;
            }
            match parse_metric(&token) {
                Some(metric) => result.metrics.push(metric),
                None => tracing::debug!("skipping malformed perf data token '{}'", token),
            }
        }
        result
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn check_command(&self) -> Option<&str> {
        self.check_command.as_deref()
    }
}

/// Splits off one token, honouring single-quoted names like `'a b'=1`.
fn next_token(text: &str) -> (String, &str) {
    let mut token = String::new();
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => {
                quoted = !quoted;
                token.push(c);
            }
            c if c.is_whitespace() && !quoted => return (token, &text[i..]),
            c => token.push(c),
        }
    }
    (token, "")
}

fn parse_metric(token: &str) -> Option<Metric> {
    let (name, rest) = token.rsplit_once('=').filter(|(name, _)| !name.is_empty())?;
    let name = name
        .strip_prefix('\'')
        .and_then(|n| n.strip_suffix('\''))
        .unwrap_or(name);
    let mut fields = rest.split(';');
    let value_field = fields.next()?;
    let number_end = value_field
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E' | ',')))
        .unwrap_or(value_field.len());
    let value = parse_number(&value_field[..number_end])?;
    let unit_of_measure = value_field[number_end..].to_string();
    let mut optional = || fields.next().and_then(parse_number);
    Some(Metric {
        name: name.to_string(),
        value,
        unit_of_measure,
        warning: optional(),
        critical: optional(),
        minimum: optional(),
        maximum: optional(),
    })
}

fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    // Some plugins emit a decimal comma.
    text.replace(',', ".").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_metrics_with_empty_fields() {
        let pd = PerformanceData::parse("time=0.073836s;;;0.000000; size=557B;;;0;");
        let metrics = pd.metrics();
        assert_eq!(metrics.len(), 2);

        assert_eq!(metrics[0].name, "time");
        assert_eq!(metrics[0].value, 0.073836);
        assert_eq!(metrics[0].unit_of_measure, "s");
        assert_eq!(metrics[0].warning, None);
        assert_eq!(metrics[0].critical, None);
        assert_eq!(metrics[0].minimum, Some(0.0));
        assert_eq!(metrics[0].maximum, None);

        assert_eq!(metrics[1].name, "size");
        assert_eq!(metrics[1].value, 557.0);
        assert_eq!(metrics[1].unit_of_measure, "B");
        assert_eq!(metrics[1].minimum, Some(0.0));
        assert_eq!(metrics[1].maximum, None);
    }

    #[test]
    fn test_full_metric() {
        let pd = PerformanceData::parse("load1=0.25;5;10;0;32");
        let m = &pd.metrics()[0];
        assert_eq!(m.name, "load1");
        assert_eq!(m.value, 0.25);
        assert_eq!(m.unit_of_measure, "");
        assert_eq!(m.warning, Some(5.0));
        assert_eq!(m.critical, Some(10.0));
        assert_eq!(m.minimum, Some(0.0));
        assert_eq!(m.maximum, Some(32.0));
    }

    #[test]
    fn test_quoted_name_and_check_command() {
        let pd = PerformanceData::parse("'disk usage'=81%;90;95 [check_df]");
        assert_eq!(pd.metrics().len(), 1);
        assert_eq!(pd.metrics()[0].name, "disk usage");
        assert_eq!(pd.metrics()[0].unit_of_measure, "%");
        assert_eq!(pd.check_command(), Some("check_df"));
    }

    #[test]
    fn test_malformed_tokens_are_skipped() {
        let pd = PerformanceData::parse("garbage =1 ok=1");
        assert_eq!(pd.metrics().len(), 1);
        assert_eq!(pd.metrics()[0].name, "ok");
        assert!(PerformanceData::parse("").metrics().is_empty());
    }
}
