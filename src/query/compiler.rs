//! Compiler from clause text to [`Expression`] trees.
//!
//! The clause is framed as a throwaway `SELECT` so a stock SQL grammar can
//! parse it, then only the `WHERE` tree is lowered.

use super::ast::{CompareOp, Expression, Literal, ValueSet};
use super::error::CompileError;
use super::eval::{NoFields, Scalar, evaluate};
use super::lexer::normalize_clause;
use sqlparser::ast::{BinaryOperator, Expr, SetExpr, Statement, UnaryOperator, Value};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

const SELECT_PREFIX: &str = "SELECT * FROM features WHERE ";

/// Compile a `WHERE` clause into an expression.
pub fn compile(clause: &str) -> Result<Expression, CompileError> {
    let tree = parse_where(clause)?;
    lower(&tree)
}

/// Parse a clause with the generic SQL grammar and return its `WHERE` tree.
pub fn parse_where(clause: &str) -> Result<Expr, CompileError> {
    let normalized = normalize_clause(clause)?;
    if normalized.trim().is_empty() {
        return Err(CompileError::Parse("empty filter clause".into()));
    }

    let sql = format!("{SELECT_PREFIX}{normalized}");
    let mut statements = Parser::parse_sql(&GenericDialect {}, &sql)
        .map_err(|e| CompileError::Parse(e.to_string()))?;

    if statements.len() != 1 {
        return Err(CompileError::UnsupportedConstruct(format!(
            "{} statements in filter",
            statements.len()
        )));
    }
    let Some(Statement::Query(query)) = statements.pop() else {
        return Err(CompileError::UnsupportedConstruct(
            "statement other than a query".into(),
        ));
    };

    // Any ORDER BY, LIMIT, GROUP BY or set operation shows up in the rendering
    let rendered = query.to_string();
    let query = *query;
    let SetExpr::Select(select) = *query.body else {
        return Err(CompileError::UnsupportedConstruct(rendered));
    };
    let select = *select;
    let Some(selection) = select.selection else {
        return Err(CompileError::Parse("missing WHERE expression".into()));
    };

    if rendered != format!("{SELECT_PREFIX}{selection}") {
        let tail = rendered.strip_prefix(SELECT_PREFIX).unwrap_or(&rendered);
        return Err(CompileError::UnsupportedConstruct(format!(
            "clauses beyond WHERE: {tail}"
        )));
    }

    Ok(selection)
}

/// Lower a generic SQL expression tree into a query expression.
pub fn lower(expr: &Expr) -> Result<Expression, CompileError> {
    match expr {
        Expr::BinaryOp { left, op, right } => lower_binary(left, op, right),

        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: inner,
        } => Ok(Expression::Not(Box::new(lower(inner)?))),

        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => lower_signed(inner, -1.0, expr),

        Expr::UnaryOp {
            op: UnaryOperator::Plus,
            expr: inner,
        } => lower_signed(inner, 1.0, expr),

        Expr::Nested(inner) => Ok(Expression::Group(Box::new(lower(inner)?))),

        Expr::Tuple(items) => Err(CompileError::UnsupportedConstruct(format!(
            "parenthesized list of {} elements outside IN: {expr}",
            items.len()
        ))),

        Expr::InList {
            expr: probe,
            list,
            negated,
        } => lower_membership(probe, list, *negated),

        Expr::Identifier(ident) => Ok(Expression::Field(ident.value.clone())),

        Expr::Value(value) => lower_value(&value.value).map(Expression::Literal),

        other => Err(CompileError::UnsupportedConstruct(other.to_string())),
    }
}

fn lower_binary(
    left: &Expr,
    op: &BinaryOperator,
    right: &Expr,
) -> Result<Expression, CompileError> {
    let compare = match op {
        BinaryOperator::And => {
            return Ok(Expression::And(Box::new(lower(left)?), Box::new(lower(right)?)));
        }
        BinaryOperator::Or => {
            return Ok(Expression::Or(Box::new(lower(left)?), Box::new(lower(right)?)));
        }
        BinaryOperator::Eq => CompareOp::Eq,
        BinaryOperator::NotEq => CompareOp::Ne,
        BinaryOperator::Gt => CompareOp::Gt,
        BinaryOperator::GtEq => CompareOp::Ge,
        BinaryOperator::Lt => CompareOp::Lt,
        BinaryOperator::LtEq => CompareOp::Le,
        other => {
            return Err(CompileError::UnsupportedConstruct(format!(
                "operator '{other}'"
            )));
        }
    };

    Ok(Expression::compare(compare, lower(left)?, lower(right)?))
}

/// Fold a unary sign into a numeric literal.
fn lower_signed(inner: &Expr, sign: f64, whole: &Expr) -> Result<Expression, CompileError> {
    match inner {
        Expr::Value(value) => match &value.value {
            Value::Number(token, _) => Ok(Expression::number(sign * parse_number(token)?)),
            _ => Err(CompileError::UnsupportedConstruct(whole.to_string())),
        },
        _ => Err(CompileError::UnsupportedConstruct(whole.to_string())),
    }
}

fn lower_value(value: &Value) -> Result<Literal, CompileError> {
    match value {
        Value::Number(token, _) => parse_number(token).map(Literal::Number),
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
            Ok(Literal::Text(s.clone()))
        }
        Value::Boolean(b) => Ok(Literal::Bool(*b)),
        other => Err(CompileError::UnsupportedConstruct(format!(
            "literal {other}"
        ))),
    }
}

fn parse_number(token: &str) -> Result<f64, CompileError> {
    match token.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        Ok(_) => Err(CompileError::MalformedLiteral(format!(
            "number out of range '{token}'"
        ))),
        Err(_) => Err(CompileError::MalformedLiteral(format!(
            "invalid number '{token}'"
        ))),
    }
}

fn lower_membership(
    probe: &Expr,
    list: &[Expr],
    negated: bool,
) -> Result<Expression, CompileError> {
    let probe = lower(probe)?;
    let array = lower_list(list)?;
    let set = materialize(&array)?;

    Ok(Expression::In {
        probe: Box::new(probe),
        set,
        negated,
    })
}

/// Lower an `IN` list. Every item must reduce to a literal.
fn lower_list(list: &[Expr]) -> Result<Expression, CompileError> {
    let values = list
        .iter()
        .map(|item| match lower(item)?.ungrouped() {
            Expression::Literal(value) => Ok(value.clone()),
            _ => Err(CompileError::UnsupportedConstruct(format!(
                "non-literal IN list item: {item}"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Expression::Array(values))
}

/// Evaluate a literal list once so records never re-evaluate it.
fn materialize(array: &Expression) -> Result<ValueSet, CompileError> {
    match evaluate(array, &NoFields) {
        Ok(Scalar::List(values)) => Ok(ValueSet::from_literals(values)),
        _ => Err(CompileError::UnsupportedConstruct(format!(
            "IN right-hand side is not a literal list: {array}"
        ))),
    }
}
