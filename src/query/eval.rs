//! Evaluator for compiled query expressions.

use super::ast::{CompareOp, Expression, Literal, ValueSet};
use super::error::EvalError;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// A value produced while evaluating an expression against one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    /// Field missing from the record, or holding null or a nested value.
    Absent,
    Number(f64),
    Text(&'a str),
    Bool(bool),
    List(&'a [Literal]),
}

impl<'a> Scalar<'a> {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Absent => "absent",
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "string",
            Scalar::Bool(_) => "boolean",
            Scalar::List(_) => "list",
        }
    }

    fn from_literal(value: &'a Literal) -> Self {
        match value {
            Literal::Number(n) => Scalar::Number(*n),
            Literal::Text(s) => Scalar::Text(s),
            Literal::Bool(b) => Scalar::Bool(*b),
        }
    }
}

/// Field lookup over one record.
pub trait Fields {
    fn field(&self, name: &str) -> Scalar<'_>;
}

impl Fields for Map<String, JsonValue> {
    fn field(&self, name: &str) -> Scalar<'_> {
        match self.get(name) {
            Some(JsonValue::Number(n)) => n.as_f64().map_or(Scalar::Absent, Scalar::Number),
            Some(JsonValue::String(s)) => Scalar::Text(s),
            Some(JsonValue::Bool(b)) => Scalar::Bool(*b),
            _ => Scalar::Absent,
        }
    }
}

impl Fields for HashMap<String, Literal> {
    fn field(&self, name: &str) -> Scalar<'_> {
        self.get(name).map_or(Scalar::Absent, Scalar::from_literal)
    }
}

/// A record with no readable fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFields;

impl Fields for NoFields {
    fn field(&self, _name: &str) -> Scalar<'_> {
        Scalar::Absent
    }
}

/// Evaluate an expression against a record's fields.
pub fn evaluate<'a, F>(expr: &'a Expression, fields: &'a F) -> Result<Scalar<'a>, EvalError>
where
    F: Fields + ?Sized,
{
    match expr {
        Expression::Literal(value) => Ok(Scalar::from_literal(value)),

        Expression::Field(name) => Ok(fields.field(name)),

        Expression::Array(values) => Ok(Scalar::List(values)),

        Expression::Compare { op, left, right } => {
            let left = evaluate(left, fields)?;
            let right = evaluate(right, fields)?;
            compare(*op, left, right).map(Scalar::Bool)
        }

        Expression::And(left, right) => Ok(Scalar::Bool(
            truth("AND", evaluate(left, fields)?)? && truth("AND", evaluate(right, fields)?)?,
        )),

        Expression::Or(left, right) => Ok(Scalar::Bool(
            truth("OR", evaluate(left, fields)?)? || truth("OR", evaluate(right, fields)?)?,
        )),

        Expression::Not(inner) => Ok(Scalar::Bool(!truth("NOT", evaluate(inner, fields)?)?)),

        Expression::In {
            probe,
            set,
            negated,
        } => {
            let found = contains(set, evaluate(probe, fields)?);
            Ok(Scalar::Bool(found != *negated))
        }

        Expression::Group(inner) => evaluate(inner, fields),
    }
}

/// Evaluate an expression as a record predicate.
pub fn evaluate_predicate<F>(expr: &Expression, fields: &F) -> Result<bool, EvalError>
where
    F: Fields + ?Sized,
{
    truth("WHERE", evaluate(expr, fields)?)
}

/// Boolean view of an operand. Absent reads as false.
fn truth(context: &str, value: Scalar<'_>) -> Result<bool, EvalError> {
    match value {
        Scalar::Bool(b) => Ok(b),
        Scalar::Absent => Ok(false),
        other => Err(EvalError::TypeMismatch(format!(
            "{context} expects a boolean operand, found {}",
            other.kind()
        ))),
    }
}

/// Exact equality. Absent equals nothing, itself included.
fn scalar_eq(left: Scalar<'_>, right: Scalar<'_>) -> bool {
    match (left, right) {
        (Scalar::Number(a), Scalar::Number(b)) => a == b,
        (Scalar::Text(a), Scalar::Text(b)) => a == b,
        (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
        _ => false,
    }
}

/// Apply a comparison operator.
fn compare(op: CompareOp, left: Scalar<'_>, right: Scalar<'_>) -> Result<bool, EvalError> {
    if !op.is_ordering() {
        let equal = scalar_eq(left, right);
        return Ok(if op == CompareOp::Eq { equal } else { !equal });
    }

    let ordering = match (left, right) {
        (Scalar::Absent, _) | (_, Scalar::Absent) => return Ok(false),
        (Scalar::Number(a), Scalar::Number(b)) => a.partial_cmp(&b),
        (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
        (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(&b)),
        (left, right) => {
            return Err(EvalError::TypeMismatch(format!(
                "cannot apply '{op}' to {} and {}",
                left.kind(),
                right.kind()
            )));
        }
    };

    let Some(ordering) = ordering else {
        return Ok(false);
    };

    Ok(match op {
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Ge => ordering.is_ge(),
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => ordering.is_ne(),
    })
}

fn contains(set: &ValueSet, probe: Scalar<'_>) -> bool {
    match probe {
        Scalar::Number(n) => set.contains_number(n),
        Scalar::Text(s) => set.contains_text(s),
        Scalar::Bool(b) => set.contains_bool(b),
        Scalar::Absent | Scalar::List(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compile;
    use serde_json::json;

    fn record(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn check(clause: &str, value: JsonValue) -> Result<bool, EvalError> {
        let expr = compile(clause).unwrap();
        evaluate_predicate(&expr, &record(value))
    }

    #[test]
    fn test_absent_equals_nothing() {
        assert_eq!(check("a = 1", json!({})), Ok(false));
        assert_eq!(check("a = b", json!({})), Ok(false));
        assert_eq!(check("a = a", json!({})), Ok(false));
        assert_eq!(check("a = 'x'", json!({ "a": null })), Ok(false));
    }

    #[test]
    fn test_absent_is_unequal() {
        assert_eq!(check("a != 1", json!({})), Ok(true));
        assert_eq!(check("a != b", json!({})), Ok(true));
    }

    #[test]
    fn test_absent_ordering_is_false() {
        assert_eq!(check("a < 1", json!({})), Ok(false));
        assert_eq!(check("a >= 1", json!({ "a": null })), Ok(false));
    }

    #[test]
    fn test_absent_membership() {
        assert_eq!(check("a IN (1, 2)", json!({})), Ok(false));
        assert_eq!(check("a NOT IN (1, 2)", json!({})), Ok(true));
    }

    #[test]
    fn test_mixed_kinds_equality() {
        assert_eq!(check("a = 1", json!({ "a": "1" })), Ok(false));
        assert_eq!(check("a != 1", json!({ "a": "1" })), Ok(true));
        assert_eq!(check("a = TRUE", json!({ "a": 1 })), Ok(false));
    }

    #[test]
    fn test_string_ordering_against_number_is_mismatch() {
        let result = check("name > 5", json!({ "name": "Ottawa" }));
        assert!(matches!(result, Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn test_same_kind_ordering() {
        assert_eq!(check("name < 'Toronto'", json!({ "name": "Ottawa" })), Ok(true));
        assert_eq!(check("pop >= 2.5", json!({ "pop": 2.5 })), Ok(true));
        assert_eq!(check("flag > FALSE", json!({ "flag": true })), Ok(true));
    }

    #[test]
    fn test_boolean_field_as_predicate() {
        assert_eq!(check("capital", json!({ "capital": true })), Ok(true));
        assert_eq!(check("NOT capital", json!({ "capital": false })), Ok(true));
        assert_eq!(check("capital", json!({})), Ok(false));
    }

    #[test]
    fn test_non_boolean_predicate_is_mismatch() {
        assert!(matches!(
            check("name", json!({ "name": "x" })),
            Err(EvalError::TypeMismatch(_))
        ));
        assert!(matches!(
            check("a = 1 AND name", json!({ "a": 1, "name": "x" })),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_membership_kinds() {
        assert_eq!(check("prov IN ('ON', 'QC')", json!({ "prov": "QC" })), Ok(true));
        assert_eq!(check("prov IN ('ON', 'QC')", json!({ "prov": "BC" })), Ok(false));
        assert_eq!(check("code IN ('1', 2)", json!({ "code": 1 })), Ok(false));
        assert_eq!(check("code IN ('1', 2)", json!({ "code": 2.0 })), Ok(true));
    }

    #[test]
    fn test_nested_values_are_absent() {
        assert_eq!(check("a = 1", json!({ "a": [1] })), Ok(false));
        assert_eq!(check("a != 1", json!({ "a": { "b": 1 } })), Ok(true));
    }

    #[test]
    fn test_literal_map_fields() {
        let expr = compile("kind = 'lake' AND area > 10").unwrap();
        let mut fields = HashMap::new();
        fields.insert("kind".to_string(), Literal::Text("lake".into()));
        fields.insert("area".to_string(), Literal::Number(12.0));
        assert_eq!(evaluate_predicate(&expr, &fields), Ok(true));
        assert_eq!(evaluate_predicate(&expr, &NoFields), Ok(false));
    }
}
