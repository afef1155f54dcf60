//! AST types for the attribute query language.

use std::collections::HashSet;
use std::fmt;

/// Compiled predicate tree. Immutable once built and safe to share across
/// threads.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant value: `1`, `'Bob'`, `TRUE`
    Literal(Literal),

    /// Field reference: `population`
    Field(String),

    /// Literal list, only present while lowering an `IN` right-hand side
    Array(Vec<Literal>),

    /// Comparison: `a >= 2`
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Boolean AND: `expr1 AND expr2`
    And(Box<Expression>, Box<Expression>),

    /// Boolean OR: `expr1 OR expr2`
    Or(Box<Expression>, Box<Expression>),

    /// Boolean NOT: `NOT expr`
    Not(Box<Expression>),

    /// Membership: `a IN (1, 2)` or `a NOT IN (1, 2)`
    In {
        probe: Box<Expression>,
        set: ValueSet,
        negated: bool,
    },

    /// Parenthesized expression: `(expr)`
    Group(Box<Expression>),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq, // =
    Ne, // !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

impl CompareOp {
    /// Look up an operator symbol as written in a clause.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" | "===" => Some(CompareOp::Eq),
            "!=" | "!==" | "<>" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            _ => None,
        }
    }

    pub fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "!="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Bool(true) => write!(f, "TRUE"),
            Literal::Bool(false) => write!(f, "FALSE"),
        }
    }
}

/// Candidate values of an `IN` list, indexed by kind for exact lookups.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueSet {
    values: Vec<Literal>,
    numbers: Vec<f64>,
    texts: HashSet<String>,
    bools: [bool; 2],
}

impl ValueSet {
    pub fn from_literals(values: &[Literal]) -> Self {
        let mut set = ValueSet {
            values: values.to_vec(),
            ..ValueSet::default()
        };
        for value in values {
            match value {
                // + 0.0 folds -0.0 into 0.0 so the sorted lookup agrees with ==
                Literal::Number(n) => set.numbers.push(n + 0.0),
                Literal::Text(s) => {
                    set.texts.insert(s.clone());
                }
                Literal::Bool(b) => set.bools[usize::from(*b)] = true,
            }
        }
        set.numbers.sort_by(f64::total_cmp);
        set.numbers.dedup();
        set
    }

    /// Values in the order they were written.
    pub fn values(&self) -> &[Literal] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_number(&self, n: f64) -> bool {
        let n = n + 0.0;
        self.numbers.binary_search_by(|probe| probe.total_cmp(&n)).is_ok()
    }

    pub fn contains_text(&self, s: &str) -> bool {
        self.texts.contains(s)
    }

    pub fn contains_bool(&self, b: bool) -> bool {
        self.bools[usize::from(b)]
    }
}

impl Expression {
    pub fn field(name: impl Into<String>) -> Self {
        Expression::Field(name.into())
    }

    pub fn number(n: f64) -> Self {
        Expression::Literal(Literal::Number(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Expression::Literal(Literal::Text(s.into()))
    }

    pub fn boolean(b: bool) -> Self {
        Expression::Literal(Literal::Bool(b))
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Strip any number of enclosing groups.
    pub fn ungrouped(&self) -> &Expression {
        match self {
            Expression::Group(inner) => inner.ungrouped(),
            other => other,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[Literal]) -> fmt::Result {
    write!(f, "(")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    write!(f, ")")
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Field(name) if is_plain_identifier(name) => write!(f, "{name}"),
            Expression::Field(name) => write!(f, "`{}`", name.replace('`', "``")),
            Expression::Array(values) => write_list(f, values),
            Expression::Compare { op, left, right } => write!(f, "{left} {op} {right}"),
            Expression::And(left, right) => write!(f, "{left} AND {right}"),
            Expression::Or(left, right) => write!(f, "{left} OR {right}"),
            Expression::Not(inner) => write!(f, "NOT {inner}"),
            Expression::In {
                probe,
                set,
                negated,
            } => {
                write!(f, "{probe} ")?;
                if *negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "IN ")?;
                write_list(f, set.values())
            }
            Expression::Group(inner) => write!(f, "({inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_table() {
        for symbol in ["=", "==", "==="] {
            assert_eq!(CompareOp::from_symbol(symbol), Some(CompareOp::Eq));
        }
        for symbol in ["!=", "!==", "<>"] {
            assert_eq!(CompareOp::from_symbol(symbol), Some(CompareOp::Ne));
        }
        assert_eq!(CompareOp::from_symbol(">="), Some(CompareOp::Ge));
        assert_eq!(CompareOp::from_symbol("=>"), None);
        assert_eq!(CompareOp::from_symbol("!"), None);
    }

    #[test]
    fn test_value_set_lookup() {
        let set = ValueSet::from_literals(&[
            Literal::Number(3.0),
            Literal::Number(-0.0),
            Literal::Text("ON".into()),
            Literal::Bool(true),
        ]);
        assert_eq!(set.len(), 4);
        assert!(set.contains_number(3.0));
        assert!(set.contains_number(0.0));
        assert!(!set.contains_number(2.0));
        assert!(set.contains_text("ON"));
        assert!(!set.contains_text("on"));
        assert!(set.contains_bool(true));
        assert!(!set.contains_bool(false));
    }

    #[test]
    fn test_display() {
        let expr = Expression::And(
            Box::new(Expression::compare(
                CompareOp::Ge,
                Expression::field("lanes"),
                Expression::number(2.0),
            )),
            Box::new(Expression::Group(Box::new(Expression::In {
                probe: Box::new(Expression::field("road name")),
                set: ValueSet::from_literals(&[Literal::Text("King's".into())]),
                negated: true,
            }))),
        );
        assert_eq!(
            expr.to_string(),
            "lanes >= 2 AND (`road name` NOT IN ('King''s'))"
        );
    }
}
