//! Filters, sorting and offset pagination shared by the list operations.
//!
//! Filter expressions look like `eq(phase,RUNNING)+value_in(name,a;b)`.

use crate::domain::execution::WorkflowExecution;
use crate::domain::node_execution::NodeExecution;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const FILTER_SEPARATOR: char = '+';
const VALUE_IN_SEPARATOR: char = ';';

/// Comparison applied by an [`InlineFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// `eq`
    Equal,
    /// `ne`
    NotEqual,
    /// `gt`
    GreaterThan,
    /// `gte`
    GreaterThanOrEqual,
    /// `lt`
    LessThan,
    /// `lte`
    LessThanOrEqual,
    /// `contains`
    Contains,
    /// `value_in`
    ValueIn,
}

impl FilterOp {
    /// Parse the expression keyword
    pub fn parse(op: &str) -> Result<Self, CoreError> {
        match op {
            "eq" => Ok(FilterOp::Equal),
            "ne" => Ok(FilterOp::NotEqual),
            "gt" => Ok(FilterOp::GreaterThan),
            "gte" => Ok(FilterOp::GreaterThanOrEqual),
            "lt" => Ok(FilterOp::LessThan),
            "lte" => Ok(FilterOp::LessThanOrEqual),
            "contains" => Ok(FilterOp::Contains),
            "value_in" => Ok(FilterOp::ValueIn),
            other => Err(CoreError::InvalidFilter(format!("unrecognized filter function: {}", other))),
        }
    }

    /// Expression keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equal => "eq",
            FilterOp::NotEqual => "ne",
            FilterOp::GreaterThan => "gt",
            FilterOp::GreaterThanOrEqual => "gte",
            FilterOp::LessThan => "lt",
            FilterOp::LessThanOrEqual => "lte",
            FilterOp::Contains => "contains",
            FilterOp::ValueIn => "value_in",
        }
    }
}

/// Right hand side of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// One value
    Single(String),
    /// A set of values, for `value_in`
    Repeated(Vec<String>),
}

/// One `op(field,value)` term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFilter {
    /// Field name
    pub field: String,
    /// Comparison
    pub op: FilterOp,
    /// Value(s) to compare with
    pub value: FilterValue,
}

impl InlineFilter {
    /// Filter with a single value; `value_in` is rejected
    pub fn single(field: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Result<Self, CoreError> {
        if op == FilterOp::ValueIn {
            return Err(CoreError::InvalidFilter(
                "invalid single value filter expression: value_in".to_string(),
            ));
        }
        Ok(Self {
            field: field.into(),
            op,
            value: FilterValue::Single(value.into()),
        })
    }

    /// Filter with a value set; only `value_in` is accepted
    pub fn repeated(field: impl Into<String>, op: FilterOp, values: Vec<String>) -> Result<Self, CoreError> {
        if op != FilterOp::ValueIn {
            return Err(CoreError::InvalidFilter(format!(
                "invalid repeated value filter expression: {}",
                op.as_str()
            )));
        }
        Ok(Self {
            field: field.into(),
            op,
            value: FilterValue::Repeated(values),
        })
    }

    /// Equality filter
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equal,
            value: FilterValue::Single(value.into()),
        }
    }

    /// Whether a record's field value satisfies the filter.
    ///
    /// A missing value never matches.
    pub fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match (&self.op, &self.value) {
            (FilterOp::ValueIn, FilterValue::Repeated(values)) => values.iter().any(|v| v == actual),
            (FilterOp::Contains, FilterValue::Single(value)) => actual.contains(value.as_str()),
            (op, FilterValue::Single(value)) => {
                let ordering = compare_values(actual, value);
                match op {
                    FilterOp::Equal => ordering == Ordering::Equal,
                    FilterOp::NotEqual => ordering != Ordering::Equal,
                    FilterOp::GreaterThan => ordering == Ordering::Greater,
                    FilterOp::GreaterThanOrEqual => ordering != Ordering::Less,
                    FilterOp::LessThan => ordering == Ordering::Less,
                    FilterOp::LessThanOrEqual => ordering != Ordering::Greater,
                    FilterOp::Contains | FilterOp::ValueIn => false,
                }
            }
            _ => false,
        }
    }
}

/// Numbers compare numerically, everything else lexically. RFC 3339 timestamps
/// in UTC compare correctly as strings.
pub fn compare_values(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

fn parse_term(term: &str) -> Result<InlineFilter, CoreError> {
    let invalid = || CoreError::InvalidFilter(format!("invalid filter expression: {}", term));
    let open = term.find('(').ok_or_else(invalid)?;
    if !term.ends_with(')') {
        return Err(invalid());
    }
    let op = FilterOp::parse(term[..open].trim())?;
    let args = &term[open + 1..term.len() - 1];
    let (field, value) = args.split_once(',').ok_or_else(invalid)?;
    let field = field.trim();
    if field.is_empty() {
        return Err(invalid());
    }
    if op == FilterOp::ValueIn {
        let values = value
            .split(VALUE_IN_SEPARATOR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        InlineFilter::repeated(field, op, values)
    } else {
        InlineFilter::single(field, op, value.trim())
    }
}

/// Parse a `+` separated filter expression. An empty expression yields no filters.
pub fn parse_filters(expression: &str) -> Result<Vec<InlineFilter>, CoreError> {
    if expression.trim().is_empty() {
        return Ok(Vec::new());
    }
    expression
        .split(FILTER_SEPARATOR)
        .map(|term| parse_term(term.trim()))
        .collect()
}

/// Equality on a field that may be null, e.g. "has no parent task"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapFilter {
    /// Field name
    pub field: String,
    /// Expected value; `None` requires the field to be null
    pub value: Option<String>,
}

impl MapFilter {
    /// Require the field to be null
    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: None,
        }
    }

    /// Whether a record's field value satisfies the filter
    pub fn matches(&self, actual: Option<&str>) -> bool {
        self.value.as_deref() == actual
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    #[default]
    Descending,
}

/// Sort order of a list request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Sortable field
    pub key: String,
    /// Direction
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    /// Ascending sort on a key
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on a key
    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Everything a repository needs to produce one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResourceInput {
    /// Page size
    pub limit: usize,
    /// Records to skip
    pub offset: usize,
    /// All must match
    pub filters: Vec<InlineFilter>,
    /// All must match
    pub map_filters: Vec<MapFilter>,
    /// Order; insertion order when absent
    pub sort: Option<Sort>,
}

/// Parse a continuation token. The empty token is offset 0.
pub fn parse_token(token: &str) -> Result<usize, CoreError> {
    if token.is_empty() {
        return Ok(0);
    }
    token
        .parse::<usize>()
        .map_err(|_| CoreError::InvalidPaginationToken(format!("invalid pagination token {}", token)))
}

/// Token for the page after `offset`; empty unless the page was full
pub fn next_token(offset: usize, page_len: usize, limit: usize) -> String {
    if limit > 0 && page_len == limit {
        (offset + page_len).to_string()
    } else {
        String::new()
    }
}

/// Records that can be filtered and sorted by named fields
pub trait Filterable {
    /// Fields accepted in filters and sort keys
    fn filterable_fields() -> &'static [&'static str];

    /// String form of a field value; `None` when the field is null or unknown
    fn field_value(&self, field: &str) -> Option<String>;

    /// Whether the record satisfies every filter of the input
    fn matches(&self, input: &ListResourceInput) -> bool {
        input
            .filters
            .iter()
            .all(|filter| filter.matches(self.field_value(&filter.field).as_deref()))
            && input
                .map_filters
                .iter()
                .all(|filter| filter.matches(self.field_value(&filter.field).as_deref()))
    }
}

/// Reject filters and sort keys on fields the record type does not expose
pub fn validate_fields<T: Filterable>(filters: &[InlineFilter], sort: Option<&Sort>) -> Result<(), CoreError> {
    let allowed = T::filterable_fields();
    if let Some(filter) = filters.iter().find(|f| !allowed.contains(&f.field.as_str())) {
        return Err(CoreError::InvalidFilter(format!("unknown filter field: {}", filter.field)));
    }
    if let Some(sort) = sort {
        if !allowed.contains(&sort.key.as_str()) {
            return Err(CoreError::InvalidFilter(format!("unknown sort key: {}", sort.key)));
        }
    }
    Ok(())
}

/// Filter, sort and page a set of records in memory
pub fn apply_list_input<T: Filterable + Clone>(records: impl Iterator<Item = T>, input: &ListResourceInput) -> Vec<T> {
    let mut matched: Vec<T> = records.filter(|record| record.matches(input)).collect();
    if let Some(sort) = &input.sort {
        matched.sort_by(|a, b| {
            let ordering = match (a.field_value(&sort.key), b.field_value(&sort.key)) {
                (Some(a), Some(b)) => compare_values(&a, &b),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            match sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
    matched.into_iter().skip(input.offset).take(input.limit).collect()
}

impl Filterable for WorkflowExecution {
    fn filterable_fields() -> &'static [&'static str] {
        &[
            "project",
            "domain",
            "name",
            "phase",
            "mode",
            "cluster",
            "principal",
            "launch_plan_name",
            "workflow_name",
            "created_at",
            "updated_at",
            "started_at",
            "duration_ms",
        ]
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "project" => Some(self.id.project.clone()),
            "domain" => Some(self.id.domain.clone()),
            "name" => Some(self.id.name.clone()),
            "phase" => Some(self.closure.phase.as_str().to_string()),
            "mode" => Some(self.spec.metadata.mode.as_str().to_string()),
            "cluster" => Some(self.closure.cluster.clone()),
            "principal" => Some(self.spec.metadata.principal.clone()),
            "launch_plan_name" => Some(self.spec.launch_plan.name.clone()),
            "workflow_name" => Some(self.closure.workflow_id.name.clone()),
            "created_at" => Some(self.closure.created_at.to_rfc3339()),
            "updated_at" => Some(self.closure.updated_at.to_rfc3339()),
            "started_at" => self.closure.started_at.map(|t| t.to_rfc3339()),
            "duration_ms" => self.closure.duration_ms.map(|d| d.to_string()),
            _ => None,
        }
    }
}

impl Filterable for NodeExecution {
    fn filterable_fields() -> &'static [&'static str] {
        &[
            "execution_project",
            "execution_domain",
            "execution_name",
            "node_id",
            "phase",
            "parent_task_execution_id",
            "created_at",
            "updated_at",
            "started_at",
            "duration_ms",
        ]
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "execution_project" => Some(self.id.execution_id.project.clone()),
            "execution_domain" => Some(self.id.execution_id.domain.clone()),
            "execution_name" => Some(self.id.execution_id.name.clone()),
            "node_id" => Some(self.id.node_id.clone()),
            "phase" => Some(self.closure.phase.as_str().to_string()),
            "parent_task_execution_id" => self.parent_task_execution_id.map(|id| id.to_string()),
            "created_at" => Some(self.closure.created_at.to_rfc3339()),
            "updated_at" => Some(self.closure.updated_at.to_rfc3339()),
            "started_at" => self.closure.started_at.map(|t| t.to_rfc3339()),
            "duration_ms" => self.closure.duration_ms.map(|d| d.to_string()),
            _ => None,
        }
    }
}
