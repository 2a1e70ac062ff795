//! Storage addresses and their tuple/string codecs.
//!
//! An [`Address`] names where a piece of coverage data lives. Addresses are
//! totally ordered and project to a *top-level key*: the name of the physical
//! container (brick, file) shared by every address inside it. Span
//! collections index their records by that key.
//!
//! Tuple form is `('<TypeName>', field, ...)`, for example
//! `('BrickFileAddress', 'cov-1', 'brick-7')`. The string form is the literal
//! text of the tuple form, so [`Address::from_str`](std::str::FromStr) is the
//! exact inverse of `to_string()`.

use std::{fmt, str::FromStr};

use snafu::prelude::*;

use crate::literal::{Literal, LiteralError};

/// Errors raised while decoding an address.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum AddressError {
    /// The address text is not valid literal syntax.
    #[snafu(transparent)]
    Literal {
        /// Underlying literal parse error.
        source: LiteralError,
    },

    /// The tuple names an address type this crate does not know.
    #[snafu(display("Unknown address type {kind:?}"))]
    UnknownKind {
        /// Type name found in the tuple.
        kind: String,
    },

    /// The literal does not have the shape of an address tuple.
    #[snafu(display("Malformed address {found}: {detail}"))]
    Malformed {
        /// Text form of the offending literal.
        found: String,
        /// What was wrong with it.
        detail: &'static str,
    },
}

/// A storage address.
///
/// Ordering is derived: first by address type (in declaration order), then
/// field by field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    /// A bare identifier; its own top-level key.
    Id {
        /// Identifier (for example a span id).
        id: String,
    },
    /// A region inside one brick.
    Brick {
        /// Owning coverage.
        coverage_uid: String,
        /// Brick identifier; the top-level key.
        brick_id: String,
        /// Per-dimension `(start, stop)` extents within the brick.
        brick_slice: Vec<(i64, i64)>,
    },
    /// A whole brick file.
    BrickFile {
        /// Owning coverage.
        coverage_uid: String,
        /// Brick identifier; the top-level key.
        brick_id: String,
    },
    /// A `[begin, end)` record range inside a data file.
    File {
        /// Owning coverage.
        coverage_uid: String,
        /// File path; the top-level key.
        file_path: String,
        /// First record.
        begin: i64,
        /// One past the last record.
        end: i64,
    },
}

impl Address {
    /// Address for a bare identifier.
    pub fn id(id: impl Into<String>) -> Address {
        Address::Id { id: id.into() }
    }

    /// Address for a whole brick file.
    pub fn brick_file(coverage_uid: impl Into<String>, brick_id: impl Into<String>) -> Address {
        Address::BrickFile {
            coverage_uid: coverage_uid.into(),
            brick_id: brick_id.into(),
        }
    }

    /// Address for a region of a brick.
    pub fn brick(
        coverage_uid: impl Into<String>,
        brick_id: impl Into<String>,
        brick_slice: Vec<(i64, i64)>,
    ) -> Address {
        Address::Brick {
            coverage_uid: coverage_uid.into(),
            brick_id: brick_id.into(),
            brick_slice,
        }
    }

    /// Address for a record range of a file.
    pub fn file(
        coverage_uid: impl Into<String>,
        file_path: impl Into<String>,
        begin: i64,
        end: i64,
    ) -> Address {
        Address::File {
            coverage_uid: coverage_uid.into(),
            file_path: file_path.into(),
            begin,
            end,
        }
    }

    /// Type name used as the first tuple element.
    pub fn type_name(&self) -> &'static str {
        match self {
            Address::Id { .. } => "Address",
            Address::Brick { .. } => "BrickAddress",
            Address::BrickFile { .. } => "BrickFileAddress",
            Address::File { .. } => "FileAddress",
        }
    }

    /// Key of the physical container this address belongs to.
    pub fn top_level_key(&self) -> &str {
        match self {
            Address::Id { id } => id,
            Address::Brick { brick_id, .. } | Address::BrickFile { brick_id, .. } => brick_id,
            Address::File { file_path, .. } => file_path,
        }
    }

    /// Owning coverage, when the address carries one.
    pub fn coverage_uid(&self) -> Option<&str> {
        match self {
            Address::Id { .. } => None,
            Address::Brick { coverage_uid, .. }
            | Address::BrickFile { coverage_uid, .. }
            | Address::File { coverage_uid, .. } => Some(coverage_uid),
        }
    }

    /// Tuple form.
    pub fn as_tuple(&self) -> Literal {
        let mut items = vec![Literal::str(self.type_name())];
        match self {
            Address::Id { id } => items.push(Literal::str(id.as_str())),
            Address::Brick {
                coverage_uid,
                brick_id,
                brick_slice,
            } => {
                items.push(Literal::str(coverage_uid.as_str()));
                items.push(Literal::str(brick_id.as_str()));
                items.push(Literal::Tuple(
                    brick_slice
                        .iter()
                        .map(|(start, stop)| {
                            Literal::Tuple(vec![Literal::Int(*start), Literal::Int(*stop)])
                        })
                        .collect(),
                ));
            }
            Address::BrickFile {
                coverage_uid,
                brick_id,
            } => {
                items.push(Literal::str(coverage_uid.as_str()));
                items.push(Literal::str(brick_id.as_str()));
            }
            Address::File {
                coverage_uid,
                file_path,
                begin,
                end,
            } => {
                items.push(Literal::str(coverage_uid.as_str()));
                items.push(Literal::str(file_path.as_str()));
                items.push(Literal::Int(*begin));
                items.push(Literal::Int(*end));
            }
        }
        Literal::Tuple(items)
    }

    /// Decode an address from its tuple form.
    pub fn from_tuple(lit: &Literal) -> Result<Address, AddressError> {
        let malformed = |detail| AddressError::Malformed {
            found: lit.to_string(),
            detail,
        };

        let items = lit.as_tuple().ok_or_else(|| malformed("expected a tuple"))?;
        let (kind, fields) = items
            .split_first()
            .ok_or_else(|| malformed("empty tuple"))?;
        let kind = kind
            .as_str()
            .ok_or_else(|| malformed("first element must be the type name"))?;

        let text = |i: usize| -> Result<String, AddressError> {
            fields
                .get(i)
                .and_then(Literal::as_str)
                .map(str::to_string)
                .ok_or_else(|| malformed("expected a string field"))
        };
        let int = |i: usize| -> Result<i64, AddressError> {
            fields
                .get(i)
                .and_then(Literal::as_int)
                .ok_or_else(|| malformed("expected an integer field"))
        };
        let arity = |n: usize| -> Result<(), AddressError> {
            if fields.len() == n {
                Ok(())
            } else {
                Err(malformed("wrong number of fields"))
            }
        };

        match kind {
            "Address" => {
                arity(1)?;
                Ok(Address::Id { id: text(0)? })
            }
            "BrickFileAddress" => {
                arity(2)?;
                Ok(Address::BrickFile {
                    coverage_uid: text(0)?,
                    brick_id: text(1)?,
                })
            }
            "BrickAddress" => {
                arity(3)?;
                let extents = fields[2]
                    .as_sequence()
                    .ok_or_else(|| malformed("brick slice must be a tuple"))?;
                let brick_slice = extents
                    .iter()
                    .map(|extent| match extent.as_sequence() {
                        Some([Literal::Int(start), Literal::Int(stop)]) => Ok((*start, *stop)),
                        _ => Err(malformed("brick extents must be (start, stop) pairs")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Address::Brick {
                    coverage_uid: text(0)?,
                    brick_id: text(1)?,
                    brick_slice,
                })
            }
            "FileAddress" => {
                arity(4)?;
                Ok(Address::File {
                    coverage_uid: text(0)?,
                    file_path: text(1)?,
                    begin: int(2)?,
                    end: int(3)?,
                })
            }
            other => UnknownKindSnafu { kind: other }.fail(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tuple())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_tuple(&Literal::parse(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Address> {
        vec![
            Address::id("span-1"),
            Address::brick("cov", "b0", vec![(0, 10), (5, 6)]),
            Address::brick_file("cov", "b1"),
            Address::file("cov", "data/part-0.bin", 0, 128),
        ]
    }

    #[test]
    fn top_level_keys_group_by_container() {
        let inside = Address::brick("cov", "b0", vec![(0, 10)]);
        let whole = Address::brick_file("cov", "b0");
        assert_eq!(inside.top_level_key(), whole.top_level_key());
        assert_ne!(inside, whole);

        assert_eq!(Address::id("x").top_level_key(), "x");
        assert_eq!(
            Address::file("cov", "data/f.bin", 0, 1).top_level_key(),
            "data/f.bin"
        );
    }

    #[test]
    fn string_form_reparses() {
        for addr in samples() {
            let text = addr.to_string();
            let back: Address = text.parse().expect("parse address");
            assert_eq!(back, addr, "text was {text}");
        }
    }

    #[test]
    fn brick_file_string_form() {
        assert_eq!(
            Address::brick_file("cov-1", "brick-7").to_string(),
            "('BrickFileAddress', 'cov-1', 'brick-7')"
        );
    }

    #[test]
    fn ordering_is_total_and_field_wise() {
        let mut v = vec![
            Address::brick_file("cov", "b2"),
            Address::id("z"),
            Address::brick_file("cov", "b1"),
            Address::id("a"),
        ];
        v.sort();
        assert_eq!(
            v,
            vec![
                Address::id("a"),
                Address::id("z"),
                Address::brick_file("cov", "b1"),
                Address::brick_file("cov", "b2"),
            ]
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_tuples() {
        let err = "('GridAddress', 'x')".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            AddressError::UnknownKind {
                kind: "GridAddress".to_string()
            }
        );

        let err = "('BrickFileAddress', 'cov')".parse::<Address>().unwrap_err();
        assert!(matches!(err, AddressError::Malformed { .. }));

        let err = "not an address".parse::<Address>().unwrap_err();
        assert!(matches!(err, AddressError::Literal { .. }));
    }
}
