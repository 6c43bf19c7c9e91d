//! Top-level boolean-combinator grammar.
//!
//! ```text
//! Expr   := Term   ( '|' Term )*                  -- OR
//! Term   := Factor ( '&' Factor | '-' Factor )*   -- AND, ANDNOT
//! Factor := '(' Expr ')' | SubPattern
//! ```
//!
//! A `SubPattern` token copies characters verbatim until an unescaped
//! operator (`& | -`, an *outer* `(`/`)`) or end-of-input; `\(...\)` groups,
//! `[...]` classes, and `\`-escapes all suppress the operator meaning inside
//! the token. See the module docs on [`crate::regex_parser`] for how the
//! ambiguity between an outer boolean `(` and a sub-pattern's own `(b|c)`
//! group is resolved: a bare `(` only starts a boolean [`Factor`] right here,
//! at a position where [`parse_factor`] is called; everywhere else — in
//! particular once a sub-pattern has started accumulating text — `(` and
//! `\(` are both just sub-pattern content, tracked by a local paren-depth
//! counter so that operators nested inside a group never end the token
//! early.

use crate::boolean_tree::BooleanNode;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct SubPatternSpec {
    /// Raw sub-pattern text, anchors already stripped, still containing any
    /// regex escapes — handed to [`crate::regex_parser::parse`] unchanged
    /// when `is_regex` is set.
    pub text: Vec<u16>,
    pub is_regex: bool,
    pub anchored_start: bool,
    pub anchored_end: bool,
}

pub struct ParsedQuery {
    pub sub_patterns: Vec<SubPatternSpec>,
    pub tree: BooleanNode,
}

const AMP: u16 = b'&' as u16;
const PIPE: u16 = b'|' as u16;
const DASH: u16 = b'-' as u16;
const LPAREN: u16 = b'(' as u16;
const RPAREN: u16 = b')' as u16;
const LBRACKET: u16 = b'[' as u16;
const RBRACKET: u16 = b']' as u16;
const BACKSLASH: u16 = b'\\' as u16;
const CARET: u16 = b'^' as u16;
const DOLLAR: u16 = b'$' as u16;
const DOT: u16 = b'.' as u16;
const STAR: u16 = b'*' as u16;
const PLUS: u16 = b'+' as u16;
const QUESTION: u16 = b'?' as u16;
const LBRACE: u16 = b'{' as u16;

pub fn parse(text: &[u16]) -> Result<ParsedQuery> {
    if text.is_empty() {
        return Err(Error::InvalidExpression("empty expression".into()));
    }
    let mut p = Parser {
        text,
        pos: 0,
        sub_patterns: Vec::new(),
    };
    let tree = p.parse_expr()?;
    if p.pos != text.len() {
        return Err(Error::InvalidExpression(format!(
            "unexpected character at offset {}",
            p.pos
        )));
    }
    Ok(ParsedQuery {
        sub_patterns: p.sub_patterns,
        tree,
    })
}

struct Parser<'a> {
    text: &'a [u16],
    pos: usize,
    sub_patterns: Vec<SubPatternSpec>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u16> {
        self.text.get(self.pos).copied()
    }

    /// `Expr := Term ('|' Term)*`
    fn parse_expr(&mut self) -> Result<BooleanNode> {
        let mut node = self.parse_term()?;
        while self.peek() == Some(PIPE) {
            self.pos += 1;
            let rhs = self.parse_term()?;
            node = BooleanNode::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    /// `Term := Factor ('&' Factor | '-' Factor)*`
    fn parse_term(&mut self) -> Result<BooleanNode> {
        let mut node = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(AMP) => {
                    self.pos += 1;
                    let rhs = self.parse_factor()?;
                    node = BooleanNode::And(Box::new(node), Box::new(rhs));
                }
                Some(DASH) => {
                    self.pos += 1;
                    let rhs = self.parse_factor()?;
                    node = BooleanNode::AndNot(Box::new(node), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// `Factor := '(' Expr ')' | SubPattern`
    ///
    /// A literal, unescaped `(` is only ever boolean-structural right here —
    /// at the start of a fresh `Factor`.
    fn parse_factor(&mut self) -> Result<BooleanNode> {
        match self.peek() {
            None => Err(Error::InvalidExpression("expected operand".into())),
            Some(c) if c == AMP || c == PIPE || c == DASH => {
                Err(Error::InvalidExpression("empty operand before operator".into()))
            }
            Some(LPAREN) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                if self.peek() != Some(RPAREN) {
                    return Err(Error::InvalidExpression("unbalanced parenthesis".into()));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => self.parse_sub_pattern(),
        }
    }

    fn parse_sub_pattern(&mut self) -> Result<BooleanNode> {
        let mut raw = Vec::new();
        let mut depth: i32 = 0;
        loop {
            let Some(c) = self.peek() else { break };
            if c == BACKSLASH {
                let Some(escaped) = self.text.get(self.pos + 1).copied() else {
                    return Err(Error::InvalidExpression("dangling escape".into()));
                };
                raw.push(c);
                raw.push(escaped);
                self.pos += 2;
                if escaped == LPAREN {
                    depth += 1;
                } else if escaped == RPAREN {
                    depth -= 1;
                }
                continue;
            }
            if c == LBRACKET {
                self.copy_char_class(&mut raw)?;
                continue;
            }
            if depth == 0 && (c == AMP || c == PIPE || c == DASH || c == RPAREN) {
                break;
            }
            if c == LPAREN {
                depth += 1;
            } else if c == RPAREN {
                depth -= 1;
            }
            raw.push(c);
            self.pos += 1;
        }
        if depth != 0 {
            return Err(Error::InvalidExpression(
                "unbalanced group inside sub-pattern".into(),
            ));
        }
        self.finish_sub_pattern(raw)
    }

    fn copy_char_class(&mut self, raw: &mut Vec<u16>) -> Result<()> {
        raw.push(LBRACKET);
        self.pos += 1;
        let mut saw_any = false;
        loop {
            match self.peek() {
                None => return Err(Error::InvalidExpression("unterminated character class".into())),
                Some(BACKSLASH) => {
                    let Some(escaped) = self.text.get(self.pos + 1).copied() else {
                        return Err(Error::InvalidExpression("dangling escape in class".into()));
                    };
                    raw.push(BACKSLASH);
                    raw.push(escaped);
                    self.pos += 2;
                    saw_any = true;
                }
                Some(RBRACKET) if saw_any => {
                    raw.push(RBRACKET);
                    self.pos += 1;
                    return Ok(());
                }
                Some(c) => {
                    raw.push(c);
                    self.pos += 1;
                    saw_any = true;
                }
            }
        }
    }

    fn finish_sub_pattern(&mut self, mut raw: Vec<u16>) -> Result<BooleanNode> {
        let original = raw.clone();
        let is_caret_dollar = original.len() == 2 && original[0] == CARET && original[1] == DOLLAR;

        let anchored_start = raw.first() == Some(&CARET);
        if anchored_start {
            raw.remove(0);
        }
        let anchored_end = !raw.is_empty()
            && raw.last() == Some(&DOLLAR)
            && (raw.len() < 2 || raw[raw.len() - 2] != BACKSLASH);
        if anchored_end {
            raw.pop();
        }

        if raw.is_empty() && !is_caret_dollar {
            return Err(Error::InvalidExpression(
                "sub-pattern is empty after anchor stripping".into(),
            ));
        }

        let is_regex = classify_is_regex(&raw);
        let id = self.sub_patterns.len() as u32;
        self.sub_patterns.push(SubPatternSpec {
            text: raw,
            is_regex,
            anchored_start,
            anchored_end,
        });
        Ok(BooleanNode::Leaf(id))
    }
}

/// A sub-pattern needs the DFA engine ("regex") if any unescaped regex
/// metacharacter survives anchor stripping; otherwise it is a plain literal
/// string fed straight to the multi-pattern matcher.
fn classify_is_regex(text: &[u16]) -> bool {
    let mut i = 0;
    while i < text.len() {
        let c = text[i];
        if c == BACKSLASH {
            if let Some(&next) = text.get(i + 1) {
                if (b'1' as u16..=b'9' as u16).contains(&next) || next == LPAREN {
                    return true;
                }
            }
            i += 2;
            continue;
        }
        if c == DOT || c == STAR || c == PLUS || c == QUESTION || c == LBRACKET || c == LPAREN || c == LBRACE
        {
            return true;
        }
        i += 1;
    }
    false
}
