//! Python-style literal values and their textual form.
//!
//! Span statistics, addresses, and span collections travel between processes
//! in a "literal" encoding: a small value language made of `None`, booleans,
//! integers, floats, quoted strings, tuples, lists, and dicts. This module
//! provides:
//!
//! - [`Literal`], the in-memory value model.
//! - A printer (`Display`) producing the canonical text form, for example
//!   `{'type': 'SpanStats', 'time': (0, 99)}`.
//! - A safe parser ([`Literal::parse`] / `FromStr`) that only ever builds
//!   values. Nothing in the input is evaluated, and nesting depth is bounded.
//!
//! ```
//! use coverage_model_core::literal::Literal;
//!
//! let lit: Literal = "(('Address', 'abc'), ('time', (0, 99)))".parse()?;
//! assert_eq!(lit.to_string(), "(('Address', 'abc'), ('time', (0, 99)))");
//! # Ok::<(), coverage_model_core::literal::LiteralError>(())
//! ```

mod lexer;
mod parser;

use std::{fmt, str::FromStr};

use snafu::prelude::*;

/// Maximum nesting depth accepted by the parser.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Errors produced while parsing literal text.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum LiteralError {
    /// The input contains a fragment that is not part of the literal grammar.
    #[snafu(display("Invalid token {fragment:?} at offset {offset}"))]
    InvalidToken {
        /// Byte offset of the offending fragment.
        offset: usize,
        /// The text that could not be tokenized.
        fragment: String,
    },

    /// A token appeared where the grammar expected something else.
    #[snafu(display("Expected {expected} at offset {offset}, found {found}"))]
    UnexpectedToken {
        /// Byte offset of the unexpected token.
        offset: usize,
        /// Human-readable description of what was expected.
        expected: &'static str,
        /// Human-readable description of the token found.
        found: String,
    },

    /// The input ended in the middle of a value.
    #[snafu(display("Unexpected end of input, expected {expected}"))]
    UnexpectedEnd {
        /// Human-readable description of what was expected.
        expected: &'static str,
    },

    /// A complete value was parsed but more input follows it.
    #[snafu(display("Trailing input after literal at offset {offset}"))]
    TrailingInput {
        /// Byte offset of the first trailing token.
        offset: usize,
    },

    /// Containers are nested deeper than [`MAX_NESTING_DEPTH`].
    #[snafu(display("Literal nesting exceeds the limit of {limit}"))]
    NestingTooDeep {
        /// The configured depth limit.
        limit: usize,
    },
}

/// A literal value.
///
/// Dict entries keep their insertion order; producers in this crate always
/// emit them in a deterministic order so the text form is stable.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float. Non-finite values print as `inf`, `-inf`, `nan`.
    Float(f64),
    /// Quoted string.
    Str(String),
    /// `(a, b, ...)`; a single element prints with a trailing comma.
    Tuple(Vec<Literal>),
    /// `[a, b, ...]`
    List(Vec<Literal>),
    /// `{k: v, ...}`
    Dict(Vec<(Literal, Literal)>),
}

impl Literal {
    /// Parse literal text into a value.
    pub fn parse(source: &str) -> Result<Literal, LiteralError> {
        parser::parse(source)
    }

    /// Convenience constructor for a string literal.
    pub fn str(value: impl Into<String>) -> Literal {
        Literal::Str(value.into())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::None => "None",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "str",
            Literal::Tuple(_) => "tuple",
            Literal::List(_) => "list",
            Literal::Dict(_) => "dict",
        }
    }

    /// Borrow the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Return the integer payload, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the elements of a tuple.
    pub fn as_tuple(&self) -> Option<&[Literal]> {
        match self {
            Literal::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the elements of a tuple or a list.
    pub fn as_sequence(&self) -> Option<&[Literal]> {
        match self {
            Literal::Tuple(items) | Literal::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the entries of a dict.
    pub fn as_dict(&self) -> Option<&[(Literal, Literal)]> {
        match self {
            Literal::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a dict entry by string key.
    pub fn dict_get(&self, key: &str) -> Option<&Literal> {
        self.as_dict()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl FromStr for Literal {
    type Err = LiteralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Literal::parse(s)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("None"),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write_float(*v, f),
            Literal::Str(s) => write_quoted(s, f),
            Literal::Tuple(items) => {
                f.write_str("(")?;
                write_items(items, f)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Literal::List(items) => {
                f.write_str("[")?;
                write_items(items, f)?;
                f.write_str("]")
            }
            Literal::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_items(items: &[Literal], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_float(v: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if v.is_nan() {
        f.write_str("nan")
    } else if v.is_infinite() {
        f.write_str(if v > 0.0 { "inf" } else { "-inf" })
    } else {
        // Debug keeps the fractional part ("3.0") and switches to exponent
        // notation for very large/small magnitudes; both re-parse exactly.
        write!(f, "{v:?}")
    }
}

fn write_quoted(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_python_style_scalars() {
        assert_eq!(Literal::None.to_string(), "None");
        assert_eq!(Literal::Bool(true).to_string(), "True");
        assert_eq!(Literal::Int(-7).to_string(), "-7");
        assert_eq!(Literal::Float(3.0).to_string(), "3.0");
        assert_eq!(Literal::Float(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(Literal::str("it's").to_string(), r"'it\'s'");
    }

    #[test]
    fn single_element_tuple_keeps_trailing_comma() {
        let lit = Literal::Tuple(vec![Literal::Int(1)]);
        assert_eq!(lit.to_string(), "(1,)");
        assert_eq!(Literal::parse("(1,)").unwrap(), lit);
        // Without the comma it is just a parenthesized value.
        assert_eq!(Literal::parse("(1)").unwrap(), Literal::Int(1));
    }

    #[test]
    fn parses_nested_containers() {
        let lit =
            Literal::parse("{'type': 'SpanStats', 'time': (0, 99), 'q': [1.5, None]}").unwrap();
        assert_eq!(lit.dict_get("type"), Some(&Literal::str("SpanStats")));
        assert_eq!(
            lit.dict_get("time"),
            Some(&Literal::Tuple(vec![Literal::Int(0), Literal::Int(99)]))
        );
        assert_eq!(
            lit.dict_get("q"),
            Some(&Literal::List(vec![Literal::Float(1.5), Literal::None]))
        );
    }

    #[test]
    fn text_form_reparses_to_same_value() {
        let lit = Literal::Dict(vec![
            (Literal::str("a\tb"), Literal::Float(1e-7)),
            (
                Literal::str("nested"),
                Literal::Tuple(vec![
                    Literal::Float(1e300),
                    Literal::Float(-0.25),
                    Literal::Bool(false),
                    Literal::Tuple(vec![]),
                ]),
            ),
        ]);
        let text = lit.to_string();
        assert_eq!(Literal::parse(&text).unwrap(), lit);
    }

    #[test]
    fn accepts_double_quoted_strings_and_whitespace() {
        let lit = Literal::parse("  ( \"x\" ,\n 'y' , )  ").unwrap();
        assert_eq!(
            lit,
            Literal::Tuple(vec![Literal::str("x"), Literal::str("y")])
        );
    }

    #[test]
    fn rejects_code_like_input() {
        let err = Literal::parse("__import__('os').system('ls')").unwrap_err();
        assert!(matches!(err, LiteralError::InvalidToken { offset: 0, .. }));
    }

    #[test]
    fn rejects_trailing_input() {
        let err = Literal::parse("(1, 2) 3").unwrap_err();
        assert_eq!(err, LiteralError::TrailingInput { offset: 7 });
    }

    #[test]
    fn rejects_unterminated_containers() {
        let err = Literal::parse("(1, 2").unwrap_err();
        assert!(matches!(err, LiteralError::UnexpectedEnd { .. }));

        let err = Literal::parse("{'a' 1}").unwrap_err();
        assert!(matches!(err, LiteralError::UnexpectedToken { offset: 5, .. }));
    }

    #[test]
    fn bounds_nesting_depth() {
        let deep = "[".repeat(MAX_NESTING_DEPTH + 1) + &"]".repeat(MAX_NESTING_DEPTH + 1);
        let err = Literal::parse(&deep).unwrap_err();
        assert_eq!(
            err,
            LiteralError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH
            }
        );

        let ok = "[".repeat(MAX_NESTING_DEPTH) + &"]".repeat(MAX_NESTING_DEPTH);
        assert!(Literal::parse(&ok).is_ok());
    }

    #[test]
    fn non_finite_floats_round_trip() {
        let lit = Literal::Tuple(vec![
            Literal::Float(f64::INFINITY),
            Literal::Float(f64::NEG_INFINITY),
        ]);
        assert_eq!(Literal::parse(&lit.to_string()).unwrap(), lit);
        match Literal::parse("nan").unwrap() {
            Literal::Float(v) => assert!(v.is_nan()),
            other => panic!("expected float, got {other:?}"),
        }
    }
}
