//! Lexical pre-pass over raw clause text.
//!
//! Validates quoting and numeric tokens, and rewrites operator spellings and
//! double-quoted strings into the forms the SQL grammar parser expects.

use super::ast::CompareOp;
use super::error::CompileError;
use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_till, take_while};

/// Lexical pieces of a clause. Everything not listed passes through as `Other`.
#[derive(Debug, Clone, PartialEq)]
enum Piece<'s> {
    // Quoted text with one layer of quotes stripped and doubled quotes unescaped
    Quoted {
        quote: char,
        body: String,
        raw: &'s str,
    },
    Unterminated(&'s str),
    Operator(&'s str),
    Number(&'s str),
    Word(&'s str),
    Other(char),
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

fn open_quote(input: &mut &str) -> PResult<char> {
    one_of(['\'', '"', '`']).parse_next(input)
}

fn until_quote<'s>(input: &mut &'s str, quote: char) -> PResult<&'s str> {
    take_till(0.., quote).parse_next(input)
}

fn eat(input: &mut &str, c: char) -> PResult<bool> {
    opt(c).map(|found| found.is_some()).parse_next(input)
}

/// Lex a quoted run: 'text', "text" or `ident`.
fn lex_quoted<'s>(input: &mut &'s str) -> PResult<Piece<'s>> {
    let start = *input;
    let quote = open_quote(input)?;
    let mut body = String::new();

    loop {
        body.push_str(until_quote(input, quote)?);
        if !eat(input, quote)? {
            return Ok(Piece::Unterminated(start));
        }
        // A doubled quote is an escaped quote character
        if eat(input, quote)? {
            body.push(quote);
            continue;
        }
        let raw = &start[..start.len() - input.len()];
        return Ok(Piece::Quoted { quote, body, raw });
    }
}

/// Lex a run of comparison symbols.
fn lex_operator<'s>(input: &mut &'s str) -> PResult<&'s str> {
    take_while(1.., ['=', '!', '<', '>']).parse_next(input)
}

/// Lex anything that starts like a number, including trailing junk such as
/// `12abc`, so the whole token can be rejected.
fn lex_number<'s>(input: &mut &'s str) -> PResult<&'s str> {
    (
        take_while(1.., |c: char| c.is_ascii_digit() || c == '.'),
        opt((
            one_of(['e', 'E']),
            opt(one_of(['+', '-'])),
            take_while(0.., |c: char| c.is_ascii_digit()),
        )),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_' || c == '.'),
    )
        .take()
        .parse_next(input)
}

/// Lex an identifier or keyword.
fn lex_word<'s>(input: &mut &'s str) -> PResult<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '.').parse_next(input)
}

fn lex_piece<'s>(input: &mut &'s str) -> PResult<Piece<'s>> {
    alt((
        lex_quoted,
        lex_operator.map(Piece::Operator),
        lex_number.map(Piece::Number),
        lex_word.map(Piece::Word),
        any.map(Piece::Other),
    ))
    .parse_next(input)
}

/// Rewrite a clause into canonical SQL text.
///
/// Comparison symbols go through [`CompareOp::from_symbol`], so `==`, `===`
/// and `!==` reach the parser as `=` and `!=`. Double-quoted strings become
/// single-quoted SQL strings. Single-quoted strings and backtick identifiers
/// pass through untouched.
pub fn normalize_clause(clause: &str) -> Result<String, CompileError> {
    let mut remaining = clause;
    let mut out = String::with_capacity(clause.len());

    while !remaining.is_empty() {
        let piece = lex_piece(&mut remaining).map_err(|e| {
            CompileError::Parse(format!("lexer error at '{}': {:?}", remaining, e))
        })?;

        match piece {
            Piece::Quoted {
                quote: '"', body, ..
            } => {
                out.push('\'');
                out.push_str(&body.replace('\'', "''"));
                out.push('\'');
            }
            Piece::Quoted { raw, .. } => out.push_str(raw),
            Piece::Unterminated(raw) => {
                return Err(CompileError::MalformedLiteral(format!(
                    "unterminated quote: {raw}"
                )));
            }
            Piece::Operator(symbol) => match CompareOp::from_symbol(symbol) {
                Some(op) => out.push_str(&op.to_string()),
                None => {
                    return Err(CompileError::UnsupportedConstruct(format!(
                        "operator '{symbol}'"
                    )));
                }
            },
            Piece::Number(token) => {
                match token.parse::<f64>() {
                    Ok(n) if n.is_finite() => {}
                    Ok(_) => {
                        return Err(CompileError::MalformedLiteral(format!(
                            "number out of range '{token}'"
                        )));
                    }
                    Err(_) => {
                        return Err(CompileError::MalformedLiteral(format!(
                            "invalid number '{token}'"
                        )));
                    }
                }
                out.push_str(token);
            }
            Piece::Word(word) => out.push_str(word),
            Piece::Other(c) => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_spellings() {
        assert_eq!(
            normalize_clause("a === 1 AND b !== 2 OR c == 3 OR d <> 4").unwrap(),
            "a = 1 AND b != 2 OR c = 3 OR d != 4"
        );
        assert_eq!(normalize_clause("a>=-1").unwrap(), "a>=-1");
    }

    #[test]
    fn test_double_quoted_strings() {
        assert_eq!(normalize_clause(r#"name = "Bob""#).unwrap(), "name = 'Bob'");
        assert_eq!(
            normalize_clause(r#"name = "O'Brien""#).unwrap(),
            "name = 'O''Brien'"
        );
        assert_eq!(
            normalize_clause(r#"note = "say ""hi""""#).unwrap(),
            r#"note = 'say "hi"'"#
        );
    }

    #[test]
    fn test_quoted_text_untouched() {
        let clause = "note = 'a == b' AND `odd name` = 'it''s'";
        assert_eq!(normalize_clause(clause).unwrap(), clause);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(
            normalize_clause("name = 'Bob"),
            Err(CompileError::MalformedLiteral(_))
        ));
        assert!(matches!(
            normalize_clause(r#"name = "Bob"#),
            Err(CompileError::MalformedLiteral(_))
        ));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(normalize_clause("a > 1e-3").unwrap(), "a > 1e-3");
        assert_eq!(normalize_clause("a IN (1,2.5,.5)").unwrap(), "a IN (1,2.5,.5)");
        for clause in ["a = 1.2.3", "a = 12abc", "a = 1e"] {
            assert!(
                matches!(
                    normalize_clause(clause),
                    Err(CompileError::MalformedLiteral(_))
                ),
                "{clause}"
            );
        }
    }

    #[test]
    fn test_numbers_out_of_range() {
        assert_eq!(
            normalize_clause("a = 1e400"),
            Err(CompileError::MalformedLiteral(
                "number out of range '1e400'".into()
            ))
        );
        assert_eq!(normalize_clause("a = 1e300").unwrap(), "a = 1e300");
    }

    #[test]
    fn test_unknown_operator() {
        assert_eq!(
            normalize_clause("a => 1"),
            Err(CompileError::UnsupportedConstruct("operator '=>'".into()))
        );
    }

    #[test]
    fn test_identifiers_with_digits() {
        assert_eq!(normalize_clause("road2 = 1").unwrap(), "road2 = 1");
    }
}
