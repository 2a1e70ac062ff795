//! Recursive-descent parser over the token stream.
//!
//! The parser only constructs [`Literal`] values; there is no name lookup
//! and no evaluation.

use snafu::ensure;

use crate::literal::{
    Literal, LiteralError, MAX_NESTING_DEPTH, NestingTooDeepSnafu, TrailingInputSnafu,
    UnexpectedEndSnafu, UnexpectedTokenSnafu,
    lexer::{SpannedToken, Token, tokenize},
};

pub(crate) fn parse(source: &str) -> Result<Literal, LiteralError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };

    let value = parser.value()?;
    if let Some(tok) = parser.peek() {
        return TrailingInputSnafu {
            offset: tok.span.start,
        }
        .fail();
    }
    Ok(value)
}

struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a SpannedToken> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Consume the next token if it equals `expected`.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().is_some_and(|t| &t.token == expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &'static str) -> Result<(), LiteralError> {
        match self.advance() {
            Some(tok) if &tok.token == expected => Ok(()),
            Some(tok) => UnexpectedTokenSnafu {
                offset: tok.span.start,
                expected: what,
                found: tok.token.describe(),
            }
            .fail(),
            None => UnexpectedEndSnafu { expected: what }.fail(),
        }
    }

    fn value(&mut self) -> Result<Literal, LiteralError> {
        let Some(tok) = self.advance() else {
            return UnexpectedEndSnafu {
                expected: "a literal value",
            }
            .fail();
        };

        match &tok.token {
            Token::None => Ok(Literal::None),
            Token::True => Ok(Literal::Bool(true)),
            Token::False => Ok(Literal::Bool(false)),
            Token::Int(v) => Ok(Literal::Int(*v)),
            Token::Float(v) => Ok(Literal::Float(*v)),
            Token::Str(s) => Ok(Literal::Str(s.clone())),
            Token::LParen => self.nested(Self::tuple_body),
            Token::LBracket => self.nested(|p| p.list_body().map(Literal::List)),
            Token::LBrace => self.nested(Self::dict_body),
            other => UnexpectedTokenSnafu {
                offset: tok.span.start,
                expected: "a literal value",
                found: other.describe(),
            }
            .fail(),
        }
    }

    fn nested(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<Literal, LiteralError>,
    ) -> Result<Literal, LiteralError> {
        self.depth += 1;
        ensure!(
            self.depth <= MAX_NESTING_DEPTH,
            NestingTooDeepSnafu {
                limit: MAX_NESTING_DEPTH
            }
        );
        let out = body(self);
        self.depth -= 1;
        out
    }

    /// After `(`: `()`, `(x)` (grouping), `(x,)`, `(x, y, ...)`.
    fn tuple_body(&mut self) -> Result<Literal, LiteralError> {
        if self.eat(&Token::RParen) {
            return Ok(Literal::Tuple(Vec::new()));
        }

        let first = self.value()?;
        if self.eat(&Token::RParen) {
            return Ok(first);
        }
        self.expect(&Token::Comma, "',' or ')'")?;

        let mut items = vec![first];
        loop {
            if self.eat(&Token::RParen) {
                break;
            }
            items.push(self.value()?);
            if self.eat(&Token::RParen) {
                break;
            }
            self.expect(&Token::Comma, "',' or ')'")?;
        }
        Ok(Literal::Tuple(items))
    }

    fn list_body(&mut self) -> Result<Vec<Literal>, LiteralError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&Token::RBracket) {
                break;
            }
            items.push(self.value()?);
            if self.eat(&Token::RBracket) {
                break;
            }
            self.expect(&Token::Comma, "',' or ']'")?;
        }
        Ok(items)
    }

    fn dict_body(&mut self) -> Result<Literal, LiteralError> {
        let mut entries = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                break;
            }
            let key = self.value()?;
            self.expect(&Token::Colon, "':'")?;
            let value = self.value()?;
            entries.push((key, value));
            if self.eat(&Token::RBrace) {
                break;
            }
            self.expect(&Token::Comma, "',' or '}'")?;
        }
        Ok(Literal::Dict(entries))
    }
}
