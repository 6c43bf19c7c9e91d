//! Per-sub-pattern regex grammar.
//!
//! This is *not* the boolean combinator grammar in [`crate::query_parser`] —
//! by the time a `SubPattern`'s text reaches this module, the boolean layer
//! has already stripped `^`/`$` anchors and split on top-level `&`/`|`/`-`.
//! What is left is a conventional extended-regex body: literals, `.`, `[...]`
//! classes, alternation, repetition, and capture groups.
//!
//! Capture groups may be written either `(...)` or `\(...\)` — both spellings
//! are accepted and treated identically. This resolves the apparent tension
//! between end-to-end scenario 3 (`a(b|c)+d`, unescaped groups) and scenario
//! 4 (`\(ab\)\1`, escaped groups): the boolean-combinator tokenizer only
//! treats a bare `(` as *its own* structural token when it would open a fresh
//! `Factor`; once a `SubPattern` has started accumulating text, any `(...)`
//! it sees — escaped or not — is handed to this module's own grammar
//! unchanged (see `query_parser`'s module docs and DESIGN.md).

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Empty,
    Char(u16),
    Any,
    Class { ranges: Vec<(u16, u16)>, invert: bool },
    Backref(u8),
    Concat(Vec<Ast>),
    Alt(Vec<Ast>),
    Star(Box<Ast>),
    Plus(Box<Ast>),
    Opt(Box<Ast>),
    Repeat { min: u32, max: Option<u32>, inner: Box<Ast> },
    Group { id: u8, inner: Box<Ast> },
}

/// Parses a single sub-pattern's regex body into an [`Ast`].
///
/// `text` is in the crate's internal UCS-2 code-unit representation.
pub fn parse(text: &[u16]) -> Result<Ast> {
    let mut p = Parser {
        text,
        pos: 0,
        next_group: 1,
    };
    let ast = p.parse_alt()?;
    if p.pos != text.len() {
        return Err(Error::InvalidExpression(format!(
            "unexpected character at offset {}",
            p.pos
        )));
    }
    Ok(ast)
}

struct Parser<'a> {
    text: &'a [u16],
    pos: usize,
    next_group: u8,
}

const BACKSLASH: u16 = b'\\' as u16;
const PIPE: u16 = b'|' as u16;
const LPAREN: u16 = b'(' as u16;
const RPAREN: u16 = b')' as u16;
const LBRACKET: u16 = b'[' as u16;
const RBRACKET: u16 = b']' as u16;
const STAR: u16 = b'*' as u16;
const PLUS: u16 = b'+' as u16;
const QUESTION: u16 = b'?' as u16;
const LBRACE: u16 = b'{' as u16;
const RBRACE: u16 = b'}' as u16;
const DOT: u16 = b'.' as u16;
const CARET: u16 = b'^' as u16;
const DASH: u16 = b'-' as u16;
const COMMA: u16 = b',' as u16;

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u16> {
        self.text.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u16> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: u16) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// `Alt := Concat ('|' Concat)*`
    fn parse_alt(&mut self) -> Result<Ast> {
        let mut branches = vec![self.parse_concat()?];
        while self.eat(PIPE) {
            branches.push(self.parse_concat()?);
        }
        Ok(if branches.len() == 1 {
            branches.pop().unwrap()
        } else {
            Ast::Alt(branches)
        })
    }

    /// `Concat := Repeat*`
    fn parse_concat(&mut self) -> Result<Ast> {
        let mut items = Vec::new();
        while let Some(c) = self.peek() {
            if c == PIPE || c == RPAREN {
                break;
            }
            if c == BACKSLASH && matches!(self.text.get(self.pos + 1).copied(), Some(RPAREN)) {
                break;
            }
            items.push(self.parse_repeat()?);
        }
        Ok(match items.len() {
            0 => Ast::Empty,
            1 => items.pop().unwrap(),
            _ => Ast::Concat(items),
        })
    }

    /// `Repeat := Atom ( '*' | '+' | '?' | '{' n (',' m?)? '}' )?`
    fn parse_repeat(&mut self) -> Result<Ast> {
        let atom = self.parse_atom()?;
        Ok(match self.peek() {
            Some(STAR) => {
                self.pos += 1;
                Ast::Star(Box::new(atom))
            }
            Some(PLUS) => {
                self.pos += 1;
                Ast::Plus(Box::new(atom))
            }
            Some(QUESTION) => {
                self.pos += 1;
                Ast::Opt(Box::new(atom))
            }
            Some(LBRACE) => match self.try_parse_bound() {
                Some((min, max)) => Ast::Repeat {
                    min,
                    max,
                    inner: Box::new(atom),
                },
                None => atom,
            },
            _ => atom,
        })
    }

    fn try_parse_bound(&mut self) -> Option<(u32, Option<u32>)> {
        let start = self.pos;
        self.pos += 1; // '{'
        let min = self.parse_number();
        let min = match min {
            Some(n) => n,
            None => {
                self.pos = start;
                return None;
            }
        };
        let max = if self.eat(COMMA) {
            self.parse_number()
        } else {
            Some(min)
        };
        if !self.eat(RBRACE) {
            self.pos = start;
            return None;
        }
        Some((min, max))
    }

    fn parse_number(&mut self) -> Option<u32> {
        let mut n: u32 = 0;
        let mut any = false;
        while let Some(c) = self.peek() {
            if (b'0' as u16..=b'9' as u16).contains(&c) {
                any = true;
                n = n * 10 + (c - b'0' as u16) as u32;
                self.pos += 1;
            } else {
                break;
            }
        }
        any.then_some(n)
    }

    /// Group-start positions accept both `(` and `\(`, per the module docs.
    fn parse_atom(&mut self) -> Result<Ast> {
        match self.peek() {
            Some(DOT) => {
                self.pos += 1;
                Ok(Ast::Any)
            }
            Some(LBRACKET) => self.parse_class(),
            Some(LPAREN) => self.parse_group(false),
            Some(BACKSLASH) => {
                let next = self.text.get(self.pos + 1).copied();
                match next {
                    Some(LPAREN) => {
                        self.pos += 1;
                        self.parse_group(true)
                    }
                    Some(c) if (b'1' as u16..=b'9' as u16).contains(&c) => {
                        self.pos += 2;
                        Ok(Ast::Backref((c - b'0' as u16) as u8))
                    }
                    Some(c) => {
                        self.pos += 2;
                        Ok(Ast::Char(c))
                    }
                    None => Err(Error::InvalidExpression(
                        "dangling escape at end of pattern".into(),
                    )),
                }
            }
            Some(c) if c == STAR || c == PLUS || c == QUESTION => Err(
                Error::InvalidExpression("repetition operator with no operand".into()),
            ),
            Some(c) => {
                self.pos += 1;
                Ok(Ast::Char(c))
            }
            None => Err(Error::InvalidExpression("unexpected end of pattern".into())),
        }
    }

    fn parse_group(&mut self, escaped: bool) -> Result<Ast> {
        self.pos += 1; // '('
        if self.next_group > 9 {
            return Err(Error::TooComplex("more than 9 capture groups"));
        }
        let id = self.next_group;
        self.next_group += 1;
        let inner = self.parse_alt()?;
        let closed = if escaped {
            self.eat(BACKSLASH) && self.eat(RPAREN)
        } else {
            self.eat(RPAREN)
        };
        if !closed {
            return Err(Error::InvalidExpression("unbalanced group".into()));
        }
        Ok(Ast::Group {
            id,
            inner: Box::new(inner),
        })
    }

    /// `'[' (^)? (range | char)* ']'`
    fn parse_class(&mut self) -> Result<Ast> {
        self.pos += 1; // '['
        let invert = self.eat(CARET);
        let mut ranges = Vec::new();
        let mut saw_any = false;
        loop {
            match self.peek() {
                None => return Err(Error::InvalidExpression("unterminated character class".into())),
                Some(RBRACKET) if saw_any => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    let lo = self.parse_class_char()?;
                    saw_any = true;
                    if self.peek() == Some(DASH) && self.text.get(self.pos + 1) != Some(&RBRACKET)
                    {
                        self.pos += 1;
                        let hi = self.parse_class_char()?;
                        if hi < lo {
                            return Err(Error::InvalidExpression(
                                "character class range out of order".into(),
                            ));
                        }
                        ranges.push((lo, hi));
                    } else {
                        ranges.push((lo, lo));
                    }
                }
            }
        }
        Ok(Ast::Class { ranges, invert })
    }

    fn parse_class_char(&mut self) -> Result<u16> {
        match self.bump() {
            Some(BACKSLASH) => self
                .bump()
                .ok_or_else(|| Error::InvalidExpression("dangling escape in class".into())),
            Some(c) => Ok(c),
            None => Err(Error::InvalidExpression("unterminated character class".into())),
        }
    }
}
