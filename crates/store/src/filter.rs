use serde_json::Value;

use crate::DocumentId;

/// A single predicate over a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the given JSON value exactly.
    Eq { field: String, value: Value },

    /// String field equals the given value, ignoring ASCII/Unicode case.
    EqIgnoreCase { field: String, value: String },

    /// String field ends with the given suffix.
    EndsWith { field: String, suffix: String },

    /// Field equals any of the given values.
    In { field: String, values: Vec<Value> },

    /// At least one of the nested conditions holds.
    AnyOf(Vec<Condition>),
}

impl Condition {
    /// Field equals value.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Case-insensitive string equality.
    pub fn eq_ignore_case(field: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::EqIgnoreCase {
            field: field.into(),
            value: value.into(),
        }
    }

    /// String suffix match.
    pub fn ends_with(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        Condition::EndsWith {
            field: field.into(),
            suffix: suffix.into(),
        }
    }

    /// Membership in a set of values.
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Condition::In {
            field: field.into(),
            values,
        }
    }

    /// Returns true if the document body satisfies this condition.
    pub fn matches(&self, body: &Value) -> bool {
        match self {
            Condition::Eq { field, value } => body.get(field) == Some(value),
            Condition::EqIgnoreCase { field, value } => body
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase() == value.to_lowercase()),
            Condition::EndsWith { field, suffix } => {
                !suffix.is_empty()
                    && body
                        .get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.ends_with(suffix.as_str()))
            }
            Condition::In { field, values } => body
                .get(field)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
            Condition::AnyOf(conditions) => conditions.iter().any(|c| c.matches(body)),
        }
    }
}

/// Builder for document queries.
///
/// All conditions must hold (logical AND); use [`Condition::AnyOf`]
/// for alternatives. Results come back in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
    limit: Option<usize>,
}

impl Filter {
    /// Creates an empty filter matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter matching the document with the given ID.
    pub fn by_id(id: DocumentId) -> Self {
        Self::new().eq("id", id.to_string())
    }

    /// Adds an arbitrary condition.
    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Requires a field to equal the given value.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Condition::eq(field, value))
    }

    /// Requires a string field to equal the value, ignoring case.
    pub fn eq_ignore_case(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Condition::eq_ignore_case(field, value))
    }

    /// Requires a field to be one of the given values.
    pub fn is_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.with(Condition::is_in(field, values))
    }

    /// Requires at least one of the conditions to hold.
    pub fn any_of(self, conditions: Vec<Condition>) -> Self {
        self.with(Condition::AnyOf(conditions))
    }

    /// Limits the number of documents returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the conditions of this filter.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns the result limit, if any.
    pub fn result_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns true if the document body satisfies every condition.
    pub fn matches(&self, body: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(body))
    }
}
