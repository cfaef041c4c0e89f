//! Row predicates.
//!
//! ```text
//!   Filter ::= Column(ColumnFilter)      leaf: column <op> value
//!            | And(Vec<Filter>)          empty: tautology
//!            | Or(Vec<Filter>)           empty: contradiction
//! ```
//!
//! Leaves compile their comparison value once, when the request is parsed.
//! A leaf and its negation share the compiled matcher: every operator and
//! its complement need the same regular expression.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::auth::User;
use crate::column::{Column, ColumnType, Row, Value};
use crate::error::RequestError;
use crate::util::strings::{lstrip, next_field, parse_leading_double, parse_leading_int};
use crate::util::{Case, RegExp, Syntax};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationalOperator {
    Equal,
    NotEqual,
    Matches,
    DoesntMatch,
    EqualIcase,
    DoesntEqualIcase,
    MatchesIcase,
    DoesntMatchIcase,
    Less,
    GreaterOrEqual,
    Greater,
    LessOrEqual,
}

impl RelationalOperator {
    pub const ALL: [RelationalOperator; 12] = [
        RelationalOperator::Equal,
        RelationalOperator::NotEqual,
        RelationalOperator::Matches,
        RelationalOperator::DoesntMatch,
        RelationalOperator::EqualIcase,
        RelationalOperator::DoesntEqualIcase,
        RelationalOperator::MatchesIcase,
        RelationalOperator::DoesntMatchIcase,
        RelationalOperator::Less,
        RelationalOperator::GreaterOrEqual,
        RelationalOperator::Greater,
        RelationalOperator::LessOrEqual,
    ];

    pub fn negate(self) -> Self {
        use RelationalOperator::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            Matches => DoesntMatch,
            DoesntMatch => Matches,
            EqualIcase => DoesntEqualIcase,
            DoesntEqualIcase => EqualIcase,
            MatchesIcase => DoesntMatchIcase,
            DoesntMatchIcase => MatchesIcase,
            Less => GreaterOrEqual,
            GreaterOrEqual => Less,
            Greater => LessOrEqual,
            LessOrEqual => Greater,
        }
    }

    pub fn as_str(self) -> &'static str {
        use RelationalOperator::*;
        match self {
            Equal => "=",
            NotEqual => "!=",
            Matches => "~",
            DoesntMatch => "!~",
            EqualIcase => "=~",
            DoesntEqualIcase => "!=~",
            MatchesIcase => "~~",
            DoesntMatchIcase => "!~~",
            Less => "<",
            GreaterOrEqual => ">=",
            Greater => ">",
            LessOrEqual => "<=",
        }
    }

    /// True for the operators that invert a positive test.
    fn is_negative(self) -> bool {
        use RelationalOperator::*;
        matches!(self, NotEqual | DoesntMatch | DoesntEqualIcase | DoesntMatchIcase)
    }

    fn is_regex(self) -> bool {
        use RelationalOperator::*;
        matches!(self, Matches | DoesntMatch | MatchesIcase | DoesntMatchIcase)
    }
}

impl FromStr for RelationalOperator {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use RelationalOperator::*;
        Ok(match s {
            "=" => Equal,
            "!=" => NotEqual,
            "~" => Matches,
            "!~" => DoesntMatch,
            "=~" => EqualIcase,
            "!=~" => DoesntEqualIcase,
            "~~" => MatchesIcase,
            "!~~" => DoesntMatchIcase,
            "<" => Less,
            "!<" => GreaterOrEqual,
            ">=" => GreaterOrEqual,
            "!>=" => Less,
            ">" => Greater,
            "!>" => LessOrEqual,
            "<=" => LessOrEqual,
            "!<=" => Greater,
            _ => return Err(RequestError::bad_request(format!("invalid operator '{s}'"))),
        })
    }
}

impl fmt::Display for RelationalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison value, compiled for the column's type.
#[derive(Debug, Clone)]
enum Matcher {
    /// String comparison; `regex` is absent for ordering operators.
    Text { regex: Option<RegExp>, reference: String },
    Int(i64),
    Double(f64),
    Time(i64),
    /// Element tests; `regex` is absent for the emptiness test.
    List { regex: Option<RegExp> },
    /// Compares the entry `key` as a string.
    Dict {
        key: String,
        regex: Option<RegExp>,
        reference: String,
    },
}

fn compile(op: RelationalOperator, value: &str) -> Result<Option<RegExp>, RequestError> {
    use RelationalOperator::*;
    let (case, syntax) = match op {
        Equal | NotEqual => (Case::Respect, Syntax::Literal),
        EqualIcase | DoesntEqualIcase => (Case::Ignore, Syntax::Literal),
        Matches | DoesntMatch => (Case::Respect, Syntax::Pattern),
        MatchesIcase | DoesntMatchIcase => (Case::Ignore, Syntax::Pattern),
        Less | GreaterOrEqual | Greater | LessOrEqual => return Ok(None),
    };
    RegExp::new(value, case, syntax)
        .map(Some)
        .map_err(|e| RequestError::bad_request(format!("invalid regular expression '{value}': {e}")))
}

/// `column op value`.
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    column: Arc<Column>,
    op: RelationalOperator,
    value: String,
    matcher: Matcher,
}

impl ColumnFilter {
    pub fn new(column: Arc<Column>, op: RelationalOperator, value: &str) -> Result<Self, RequestError> {
        use RelationalOperator::*;
        let matcher = match column.kind() {
            ColumnType::String => Matcher::Text {
                regex: compile(op, value)?,
                reference: value.to_string(),
            },
            ColumnType::Int | ColumnType::Double | ColumnType::Time if op.is_regex() => {
                return Err(RequestError::bad_request(format!(
                    "operator '{op}' not implemented for {} column '{}'",
                    column.kind().name(),
                    column.name()
                )));
            }
            ColumnType::Int => Matcher::Int(parse_leading_int(value)),
            ColumnType::Double => Matcher::Double(parse_leading_double(value)),
            ColumnType::Time => Matcher::Time(parse_leading_int(value)),
            ColumnType::List => {
                let regex = match op {
                    Equal | NotEqual if !value.is_empty() => {
                        return Err(RequestError::bad_request(format!(
                            "list column '{}' can only be compared to the empty list",
                            column.name()
                        )));
                    }
                    Equal | NotEqual => None,
                    GreaterOrEqual | Less => compile(Equal, value)?,
                    LessOrEqual | Greater => compile(EqualIcase, value)?,
                    _ => compile(op, value)?,
                };
                Matcher::List { regex }
            }
            ColumnType::Dict => {
                let mut rest = value;
                let key = next_field(&mut rest).unwrap_or_default().to_string();
                let reference = lstrip(rest);
                Matcher::Dict {
                    key,
                    regex: compile(op, reference)?,
                    reference: reference.to_string(),
                }
            }
            ColumnType::Blob => {
                return Err(RequestError::bad_request(format!(
                    "filtering on blob column '{}' not supported",
                    column.name()
                )));
            }
        };
        Ok(Self {
            column,
            op,
            value: value.to_string(),
            matcher,
        })
    }

    pub fn column(&self) -> &Arc<Column> {
        &self.column
    }

    pub fn column_name(&self) -> &str {
        self.column.name()
    }

    pub fn op(&self) -> RelationalOperator {
        self.op
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn negate(&self) -> Self {
        Self {
            op: self.op.negate(),
            ..self.clone()
        }
    }

    pub fn accepts(&self, row: Row<'_>, user: &User, timezone_offset: i64) -> bool {
        let value = self.column.get(row, user);
        match &self.matcher {
            Matcher::Text { regex, reference } => self.compare_text(&value.to_text(), regex.as_ref(), reference),
            Matcher::Int(reference) => compare_ordered(self.op, &value_as_i64(&value), reference),
            Matcher::Time(reference) => {
                compare_ordered(self.op, &value_as_i64(&value).saturating_add(timezone_offset), reference)
            }
            Matcher::Double(reference) => compare_ordered(self.op, &value.as_f64().unwrap_or_default(), reference),
            Matcher::List { regex } => self.accepts_list(&value, regex.as_ref()),
            Matcher::Dict { key, regex, reference } => {
                let entry = match &value {
                    Value::Dict(entries) => entries
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.to_text())
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                self.compare_text(&entry, regex.as_ref(), reference)
            }
        }
    }

    fn compare_text(&self, text: &str, regex: Option<&RegExp>, reference: &str) -> bool {
        use RelationalOperator::*;
        match (self.op, regex) {
            (Equal | NotEqual | EqualIcase | DoesntEqualIcase, Some(regex)) => {
                regex.matches(text) != self.op.is_negative()
            }
            (Matches | DoesntMatch | MatchesIcase | DoesntMatchIcase, Some(regex)) => {
                regex.search(text) != self.op.is_negative()
            }
            (op, _) => compare_ordered(op, text, reference),
        }
    }

    fn accepts_list(&self, value: &Value, regex: Option<&RegExp>) -> bool {
        use RelationalOperator::*;
        let items: &[Value] = match value {
            Value::List(items) => items,
            _ => &[],
        };
        let any = |test: &dyn Fn(&str) -> bool| items.iter().any(|item| test(&item.to_text()));
        match (self.op, regex) {
            (Equal, _) => items.is_empty(),
            (NotEqual, _) => !items.is_empty(),
            (GreaterOrEqual | LessOrEqual | EqualIcase | Matches | MatchesIcase, Some(regex)) => {
                if self.op.is_regex() {
                    any(&|text| regex.search(text))
                } else {
                    any(&|text| regex.matches(text))
                }
            }
            (Less | Greater | DoesntEqualIcase | DoesntMatch | DoesntMatchIcase, Some(regex)) => {
                if self.op.is_regex() {
                    !any(&|text| regex.search(text))
                } else {
                    !any(&|text| regex.matches(text))
                }
            }
            _ => false,
        }
    }

    /// Lower bound on the column's (timezone adjusted back) value implied
    /// by this leaf, for int and time columns.
    fn lower_bound(&self, column: &str, timezone_offset: i64) -> Option<i64> {
        let reference = self.numeric_reference(column, timezone_offset)?;
        match self.op {
            RelationalOperator::Equal | RelationalOperator::GreaterOrEqual => Some(reference),
            RelationalOperator::Greater => Some(reference.saturating_add(1)),
            _ => None,
        }
    }

    fn upper_bound(&self, column: &str, timezone_offset: i64) -> Option<i64> {
        let reference = self.numeric_reference(column, timezone_offset)?;
        match self.op {
            RelationalOperator::Equal | RelationalOperator::LessOrEqual => Some(reference),
            RelationalOperator::Less => Some(reference.saturating_sub(1)),
            _ => None,
        }
    }

    fn numeric_reference(&self, column: &str, timezone_offset: i64) -> Option<i64> {
        if self.column.name() != column {
            return None;
        }
        match self.matcher {
            Matcher::Int(reference) => Some(reference),
            Matcher::Time(reference) => Some(reference.saturating_sub(timezone_offset)),
            _ => None,
        }
    }
}

fn value_as_i64(value: &Value) -> i64 {
    match value {
        Value::Int(v) | Value::Time(v) => *v,
        Value::Double(v) => *v as i64,
        _ => 0,
    }
}

fn compare_ordered<T: PartialOrd + ?Sized>(op: RelationalOperator, value: &T, reference: &T) -> bool {
    use RelationalOperator::*;
    match op {
        Equal | EqualIcase => value == reference,
        NotEqual | DoesntEqualIcase => value != reference,
        Less => value < reference,
        GreaterOrEqual => value >= reference,
        Greater => value > reference,
        LessOrEqual => value <= reference,
        Matches | MatchesIcase => false,
        DoesntMatch | DoesntMatchIcase => true,
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    Column(ColumnFilter),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::tautology()
    }
}

impl Filter {
    pub fn tautology() -> Self {
        Filter::And(Vec::new())
    }

    pub fn contradiction() -> Self {
        Filter::Or(Vec::new())
    }

    /// Conjunction that flattens nested `And`s and folds constants.
    pub fn and(filters: Vec<Filter>) -> Self {
        let mut children = Vec::new();
        for filter in filters {
            match filter {
                Filter::And(nested) => children.extend(nested),
                f if f.is_contradiction() => return Filter::contradiction(),
                f => children.push(f),
            }
        }
        if children.len() == 1 {
            return children.remove(0);
        }
        Filter::And(children)
    }

    /// Disjunction that flattens nested `Or`s and folds constants.
    pub fn or(filters: Vec<Filter>) -> Self {
        let mut children = Vec::new();
        for filter in filters {
            match filter {
                Filter::Or(nested) => children.extend(nested),
                f if f.is_tautology() => return Filter::tautology(),
                f => children.push(f),
            }
        }
        if children.len() == 1 {
            return children.remove(0);
        }
        Filter::Or(children)
    }

    pub fn is_tautology(&self) -> bool {
        matches!(self, Filter::And(children) if children.is_empty())
    }

    pub fn is_contradiction(&self) -> bool {
        matches!(self, Filter::Or(children) if children.is_empty())
    }

    pub fn accepts(&self, row: Row<'_>, user: &User, timezone_offset: i64) -> bool {
        match self {
            Filter::Column(leaf) => leaf.accepts(row, user, timezone_offset),
            Filter::And(children) => children.iter().all(|f| f.accepts(row, user, timezone_offset)),
            Filter::Or(children) => children.iter().any(|f| f.accepts(row, user, timezone_offset)),
        }
    }

    /// De Morgan.
    pub fn negate(&self) -> Self {
        match self {
            Filter::Column(leaf) => Filter::Column(leaf.negate()),
            Filter::And(children) => Filter::Or(children.iter().map(Filter::negate).collect()),
            Filter::Or(children) => Filter::And(children.iter().map(Filter::negate).collect()),
        }
    }

    /// Keeps only leaves on columns satisfying `keep`; every other leaf
    /// becomes a tautology, so the result accepts a superset of rows.
    pub fn partial_filter(&self, keep: &dyn Fn(&str) -> bool) -> Self {
        match self {
            Filter::Column(leaf) if keep(leaf.column_name()) => self.clone(),
            Filter::Column(_) => Filter::tautology(),
            Filter::And(children) => Filter::and(children.iter().map(|f| f.partial_filter(keep)).collect()),
            Filter::Or(children) => Filter::or(children.iter().map(|f| f.partial_filter(keep)).collect()),
        }
    }

    /// A value the string column must equal for any row to pass.
    pub fn string_value_restriction_for(&self, column: &str) -> Option<String> {
        match self {
            Filter::Column(leaf) => (leaf.column_name() == column
                && leaf.op == RelationalOperator::Equal
                && matches!(leaf.matcher, Matcher::Text { .. }))
            .then(|| leaf.value.clone()),
            Filter::And(children) => children.iter().find_map(|f| f.string_value_restriction_for(column)),
            Filter::Or(children) => {
                let mut values = children.iter().map(|f| f.string_value_restriction_for(column));
                let first = values.next()??;
                values.all(|v| v.as_deref() == Some(first.as_str())).then_some(first)
            }
        }
    }

    /// Greatest lower bound on an int/time column implied by the filter.
    pub fn greatest_lower_bound_for(&self, column: &str, timezone_offset: i64) -> Option<i64> {
        match self {
            Filter::Column(leaf) => leaf.lower_bound(column, timezone_offset),
            Filter::And(children) => children
                .iter()
                .filter_map(|f| f.greatest_lower_bound_for(column, timezone_offset))
                .max(),
            Filter::Or(children) => {
                let bounds: Option<Vec<i64>> = children
                    .iter()
                    .map(|f| f.greatest_lower_bound_for(column, timezone_offset))
                    .collect();
                bounds?.into_iter().min()
            }
        }
    }

    /// Least upper bound on an int/time column implied by the filter.
    pub fn least_upper_bound_for(&self, column: &str, timezone_offset: i64) -> Option<i64> {
        match self {
            Filter::Column(leaf) => leaf.upper_bound(column, timezone_offset),
            Filter::And(children) => children
                .iter()
                .filter_map(|f| f.least_upper_bound_for(column, timezone_offset))
                .min(),
            Filter::Or(children) => {
                let bounds: Option<Vec<i64>> = children
                    .iter()
                    .map(|f| f.least_upper_bound_for(column, timezone_offset))
                    .collect();
                bounds?.into_iter().max()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnOffsets;

    struct Item {
        name: String,
        state: i64,
        load: f64,
        since: i64,
        tags: Vec<String>,
        vars: Vec<(String, String)>,
    }

    fn item(name: &str, state: i64, tags: &[&str]) -> Item {
        Item {
            name: name.into(),
            state,
            load: state as f64 * 1.5,
            since: 1000 + state,
            tags: tags.iter().map(|s| s.to_string()).collect(),
            vars: vec![("SITE".into(), format!("site{state}"))],
        }
    }

    fn column(name: &str) -> Arc<Column> {
        let offsets = ColumnOffsets::new();
        Arc::new(match name {
            "name" => Column::string("name", "", &offsets, |i: &Item| i.name.clone()),
            "state" => Column::int("state", "", &offsets, |i: &Item| i.state),
            "load" => Column::double("load", "", &offsets, |i: &Item| i.load),
            "since" => Column::time("since", "", &offsets, |i: &Item| i.since),
            "tags" => Column::string_list("tags", "", &offsets, |i: &Item| i.tags.clone()),
            "vars" => Column::dict("vars", "", &offsets, |i: &Item| {
                i.vars.iter().map(|(k, v)| (k.clone(), Value::from(v.as_str()))).collect()
            }),
            _ => Column::blob("data", "", &offsets, |_: &Item| None),
        })
    }

    fn leaf(name: &str, op: &str, value: &str) -> Filter {
        Filter::Column(ColumnFilter::new(column(name), op.parse().unwrap(), value).unwrap())
    }

    fn items() -> Vec<Item> {
        vec![
            item("myhost", 0, &["prod", "Linux"]),
            item("otherhost", 2, &[]),
            item("xy.z|", 1, &["test"]),
        ]
    }

    fn accepted(filter: &Filter) -> Vec<String> {
        items()
            .iter()
            .filter(|i| filter.accepts(Row::new(*i), &User::NoAuth, 0))
            .map(|i| i.name.clone())
            .collect()
    }

    #[test]
    fn test_negation_is_an_involution() {
        for op in RelationalOperator::ALL {
            assert_eq!(op.negate().negate(), op);
            assert_ne!(op.negate(), op);
        }
    }

    #[test]
    fn test_bang_forms_parse_to_complements() {
        for (bang, plain) in [("!<", "<"), ("!>=", ">="), ("!>", ">"), ("!<=", "<=")] {
            let bang: RelationalOperator = bang.parse().unwrap();
            let plain: RelationalOperator = plain.parse().unwrap();
            assert_eq!(bang, plain.negate());
        }
        assert!("<>".parse::<RelationalOperator>().is_err());
    }

    #[test]
    fn test_every_leaf_disagrees_with_its_negation() {
        let cases = [
            ("name", "myhost"),
            ("name", "HOST"),
            ("name", "^my"),
            ("name", "xy.z|"),
            ("state", "1"),
            ("load", "1.5"),
            ("since", "1001"),
            ("tags", "prod"),
            ("tags", "linux"),
            ("tags", "^t"),
            ("vars", "SITE site2"),
        ];
        for (name, value) in cases {
            for op in RelationalOperator::ALL {
                let Ok(leaf) = ColumnFilter::new(column(name), op, value) else {
                    continue;
                };
                let filter = Filter::Column(leaf);
                let negated = filter.negate();
                for i in items() {
                    let row = Row::new(&i);
                    assert_ne!(
                        filter.accepts(row, &User::NoAuth, 0),
                        negated.accepts(row, &User::NoAuth, 0),
                        "{name} {op} {value} on {}",
                        i.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_empty_and_or() {
        let row_item = item("a", 0, &[]);
        let row = Row::new(&row_item);
        assert!(Filter::tautology().accepts(row, &User::NoAuth, 0));
        assert!(!Filter::contradiction().accepts(row, &User::NoAuth, 0));
        assert!(Filter::contradiction().negate().is_tautology());
        assert!(Filter::tautology().negate().is_contradiction());
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(accepted(&leaf("name", "=", "myhost")), vec!["myhost"]);
        assert_eq!(accepted(&leaf("name", "=~", "MYHOST")), vec!["myhost"]);
        assert_eq!(accepted(&leaf("name", "~", "host$")), vec!["myhost", "otherhost"]);
        assert_eq!(accepted(&leaf("name", "~~", "^OTHER")), vec!["otherhost"]);
        // Equality is literal, not a pattern.
        assert_eq!(accepted(&leaf("name", "=", "xy.z|")), vec!["xy.z|"]);
        assert_eq!(accepted(&leaf("name", "<", "n")), vec!["myhost"]);
    }

    #[test]
    fn test_numeric_operators() {
        assert_eq!(accepted(&leaf("state", ">", "0")), vec!["otherhost", "xy.z|"]);
        assert_eq!(accepted(&leaf("state", "!>", "0")), vec!["myhost"]);
        assert_eq!(accepted(&leaf("load", ">=", "1.5")), vec!["otherhost", "xy.z|"]);
        assert!(ColumnFilter::new(column("state"), RelationalOperator::Matches, "1").is_err());
    }

    #[test]
    fn test_time_filter_uses_timezone_offset() {
        let filter = leaf("since", "=", "4601");
        let i = item("x", 1, &[]);
        assert!(!filter.accepts(Row::new(&i), &User::NoAuth, 0));
        assert!(filter.accepts(Row::new(&i), &User::NoAuth, 3600));
    }

    #[test]
    fn test_list_operators() {
        assert_eq!(accepted(&leaf("tags", "=", "")), vec!["otherhost"]);
        assert_eq!(accepted(&leaf("tags", "!=", "")), vec!["myhost", "xy.z|"]);
        assert_eq!(accepted(&leaf("tags", ">=", "prod")), vec!["myhost"]);
        assert_eq!(accepted(&leaf("tags", ">=", "linux")), Vec::<String>::new());
        assert_eq!(accepted(&leaf("tags", "<=", "linux")), vec!["myhost"]);
        assert_eq!(accepted(&leaf("tags", "~", "^te")), vec!["xy.z|"]);
        assert!(ColumnFilter::new(column("tags"), RelationalOperator::Equal, "prod").is_err());
    }

    #[test]
    fn test_dict_and_blob() {
        assert_eq!(accepted(&leaf("vars", "=", "SITE site2")), vec!["otherhost"]);
        assert_eq!(accepted(&leaf("vars", "~", "SITE ^site[01]")), vec!["myhost", "xy.z|"]);
        assert!(ColumnFilter::new(column("data"), RelationalOperator::Equal, "").is_err());
    }

    #[test]
    fn test_smart_constructors() {
        let a = leaf("state", "=", "0");
        assert!(matches!(Filter::and(vec![a.clone()]), Filter::Column(_)));
        assert!(Filter::and(vec![a.clone(), Filter::contradiction()]).is_contradiction());
        assert!(Filter::or(vec![a.clone(), Filter::tautology()]).is_tautology());
        match Filter::and(vec![Filter::And(vec![a.clone(), a.clone()]), a]) {
            Filter::And(children) => assert_eq!(children.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_partial_filter() {
        let filter = Filter::and(vec![leaf("name", "=", "myhost"), leaf("state", "=", "2")]);
        let partial = filter.partial_filter(&|name| name == "state");
        assert_eq!(accepted(&partial), vec!["otherhost"]);
        let none = filter.partial_filter(&|_| false);
        assert!(none.is_tautology());
    }

    #[test]
    fn test_restrictions_and_bounds() {
        let filter = Filter::and(vec![
            leaf("name", "=", "myhost"),
            leaf("state", ">=", "10"),
            leaf("state", ">", "12"),
            leaf("state", "<", "20"),
        ]);
        assert_eq!(filter.string_value_restriction_for("name").as_deref(), Some("myhost"));
        assert_eq!(filter.string_value_restriction_for("state"), None);
        assert_eq!(filter.greatest_lower_bound_for("state", 0), Some(13));
        assert_eq!(filter.least_upper_bound_for("state", 0), Some(19));

        let either = Filter::or(vec![leaf("since", ">=", "100"), leaf("since", ">=", "50")]);
        assert_eq!(either.greatest_lower_bound_for("since", 0), Some(50));
        assert_eq!(either.greatest_lower_bound_for("since", 10), Some(40));
        let open = Filter::or(vec![leaf("since", ">=", "100"), leaf("state", "=", "1")]);
        assert_eq!(open.greatest_lower_bound_for("since", 0), None);
    }

    #[test]
    fn test_bounds_saturate() {
        assert_eq!(leaf("state", ">", "9223372036854775807").greatest_lower_bound_for("state", 0), Some(i64::MAX));
        assert_eq!(leaf("state", "<", "-9223372036854775808").least_upper_bound_for("state", 0), Some(i64::MIN));
        assert_eq!(leaf("since", ">=", "-9223372036854775808").greatest_lower_bound_for("since", 3600), Some(i64::MIN));
        assert_eq!(leaf("since", "<=", "9223372036854775807").least_upper_bound_for("since", -3600), Some(i64::MAX));
    }
}
