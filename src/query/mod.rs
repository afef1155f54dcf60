//! Attribute query language: a SQL `WHERE` clause subset compiled into a typed
//! predicate.
//!
//! Syntax:
//!   field = 1                 - equality (also `==`, `===`)
//!   field != 'x'              - inequality (also `!==`, `<>`)
//!   field >= 2, field < 3     - ordering comparisons
//!   name = "Bob"              - single or double quoted strings
//!   flag = TRUE               - booleans, any case
//!   field IN (1, 2, 3)        - membership over literal lists
//!   field NOT IN ('a', 'b')   - negated membership
//!   expr AND expr             - conjunction
//!   expr OR expr              - disjunction (lower precedence than AND)
//!   NOT expr                  - negation
//!   (expr)                    - grouping
//!   `odd field` = 1           - backtick-quoted field names

mod ast;
mod compiler;
mod error;
mod eval;
mod lexer;

pub use ast::*;
pub use compiler::{compile, lower, parse_where};
pub use error::{CompileError, EvalError};
pub use eval::{Fields, NoFields, Scalar, evaluate, evaluate_predicate};
pub use lexer::normalize_clause;
