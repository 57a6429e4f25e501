//! Recursive descent compiler for ABDL pattern strings.
//!
//! Produces the flat instruction sequence described in [`super`], resolving
//! `$param` and `:$type` names against the caller's [`Defs`] as it goes.

use regex::Regex;

use crate::defs::{Def, Defs};
use crate::error::{PatternError, PatternErrorKind};

use super::op::Op;

/// Parse `input` into a flat instruction sequence.
pub fn parse(input: &str, defs: &Defs) -> Result<Vec<Op>, PatternError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        defs,
    };
    let mut ops = Vec::new();
    let result = parser.parse_pattern(&mut ops).and_then(|()| {
        parser.skip_space();
        match parser.peek() {
            None => Ok(()),
            Some(_) => Err(parser.unexpected()),
        }
    });
    match result {
        Ok(()) => Ok(ops),
        Err(Fail { kind, pos }) => Err(PatternError {
            kind,
            pos,
            pattern: input.to_string(),
            defs: defs.clone(),
            partial: ops,
        }),
    }
}

/// A parse failure before it is given the pattern context.
struct Fail {
    kind: PatternErrorKind,
    pos: usize,
}

type ParseResult<T> = Result<T, Fail>;

struct Parser<'d> {
    chars: Vec<char>,
    pos: usize,
    defs: &'d Defs,
}

impl Parser<'_> {
    /// `typeTest* (arrow tag)* valueSubtreeGroup*`, appended to `ops`.
    fn parse_pattern(&mut self, ops: &mut Vec<Op>) -> ParseResult<()> {
        loop {
            self.skip_space();
            if self.peek() != Some(':') {
                break;
            }
            ops.push(self.parse_type_test()?);
        }

        loop {
            self.skip_space();
            if !self.eat_arrow() {
                break;
            }
            ops.push(Op::Arrow);
            self.parse_tag(ops)?;
        }

        loop {
            self.skip_space();
            if self.peek() != Some('(') {
                break;
            }
            self.bump();
            let nested = self.parse_group(')')?;
            let skippable = self.eat_skippable();
            ops.push(Op::ValueSubtree {
                ops: nested.into(),
                skippable,
            });
            ops.push(Op::End);
        }
        Ok(())
    }

    /// One tag after an arrow: a selector, optional type tests, and the `End`.
    fn parse_tag(&mut self, ops: &mut Vec<Op>) -> ParseResult<()> {
        self.skip_space();
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                let name = self.parse_ident();
                ops.push(Op::Ident(name.into()));
                self.skip_space();
                if self.peek().is_some_and(is_selector_start) {
                    ops.push(self.parse_selector()?);
                }
            }
            Some(c) if is_selector_start(c) => ops.push(self.parse_selector()?),
            _ => return Err(self.unexpected()),
        }

        loop {
            self.skip_space();
            if self.peek() != Some(':') {
                break;
            }
            ops.push(self.parse_type_test()?);
        }
        ops.push(Op::End);
        Ok(())
    }

    /// A literal, regex, parameter or key subtree.
    fn parse_selector(&mut self) -> ParseResult<Op> {
        match self.peek() {
            Some('\'') => {
                let key = self.parse_delimited(
                    '\'',
                    PatternErrorKind::StringEscape,
                    PatternErrorKind::UnfinishedString,
                )?;
                Ok(Op::StringKey {
                    key,
                    skippable: self.eat_skippable(),
                })
            }
            Some('/') => {
                let start = self.pos;
                let source = self.parse_delimited(
                    '/',
                    PatternErrorKind::RegexEscape,
                    PatternErrorKind::UnfinishedRegex,
                )?;
                let regex = Regex::new(&source).map_err(|err| Fail {
                    kind: PatternErrorKind::InvalidRegex(err.to_string()),
                    pos: start,
                })?;
                Ok(Op::RegexKey {
                    regex,
                    skippable: self.eat_skippable(),
                })
            }
            Some('$') => self.parse_param(),
            Some('[') => {
                self.bump();
                let nested = self.parse_group(']')?;
                Ok(Op::KeySubtree {
                    ops: nested.into(),
                    skippable: self.eat_skippable(),
                })
            }
            _ => Err(self.unexpected()),
        }
    }

    /// `$name`, `$?name` or `$name?`.
    fn parse_param(&mut self) -> ParseResult<Op> {
        self.bump(); // '$'
        let mut skippable = self.eat_skippable();
        self.skip_space();
        let name_pos = self.pos;
        let name = self.expect_ident()?;
        skippable |= self.eat_skippable();
        let key = match self.defs.get(&name) {
            Some(Def::Key(key)) => key.clone(),
            Some(Def::Predicate(_)) => return Err(wrong_definition(name, "key value", name_pos)),
            None => return Err(undefined(name, name_pos)),
        };
        Ok(Op::Param {
            name,
            key,
            skippable,
        })
    }

    /// `:$name` or `:?$name`.
    fn parse_type_test(&mut self) -> ParseResult<Op> {
        self.bump(); // ':'
        let skippable = self.eat_skippable();
        self.skip_space();
        if self.peek() != Some('$') {
            return Err(self.unexpected());
        }
        self.bump();
        self.skip_space();
        let name_pos = self.pos;
        let name = self.expect_ident()?;
        let predicate = match self.defs.get(&name) {
            Some(Def::Predicate(p)) => p.clone(),
            Some(Def::Key(_)) => return Err(wrong_definition(name, "predicate", name_pos)),
            None => return Err(undefined(name, name_pos)),
        };
        Ok(Op::Ty {
            name,
            predicate,
            skippable,
        })
    }

    /// A nested pattern up to `close` (the opener has already been consumed).
    fn parse_group(&mut self, close: char) -> ParseResult<Vec<Op>> {
        let mut nested = Vec::new();
        self.parse_pattern(&mut nested)?;
        self.skip_space();
        if self.peek() != Some(close) {
            return Err(self.unexpected());
        }
        self.bump();
        Ok(nested)
    }

    /// Read a `delim`-delimited body where `%delim` and `%%` are the only
    /// escapes.
    fn parse_delimited(
        &mut self,
        delim: char,
        bad_escape: PatternErrorKind,
        unfinished: PatternErrorKind,
    ) -> ParseResult<String> {
        let start = self.pos;
        self.bump(); // opening delimiter
        let mut text = String::new();
        loop {
            let at = self.pos;
            match self.bump() {
                None => {
                    return Err(Fail {
                        kind: unfinished,
                        pos: start,
                    });
                }
                Some(c) if c == delim => return Ok(text),
                Some('%') => match self.bump() {
                    Some(c) if c == delim || c == '%' => text.push(c),
                    _ => {
                        return Err(Fail {
                            kind: bad_escape,
                            pos: at,
                        });
                    }
                },
                Some(c) => text.push(c),
            }
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(c) if is_ident_start(c) => Ok(self.parse_ident()),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    fn eat_arrow(&mut self) -> bool {
        if self.peek() == Some('-') && self.chars.get(self.pos + 1) == Some(&'>') {
            self.pos += 2;
            true
        } else {
            false
        }
    }

    fn eat_skippable(&mut self) -> bool {
        self.skip_space();
        if self.peek() == Some('?') {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_space(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn unexpected(&self) -> Fail {
        Fail {
            kind: PatternErrorKind::UnexpectedToken,
            pos: self.pos,
        }
    }
}

fn undefined(name: String, pos: usize) -> Fail {
    Fail {
        kind: PatternErrorKind::UndefinedName(name),
        pos,
    }
}

fn wrong_definition(name: String, expected: &'static str, pos: usize) -> Fail {
    Fail {
        kind: PatternErrorKind::WrongDefinition { name, expected },
        pos,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_selector_start(c: char) -> bool {
    matches!(c, '$' | '\'' | '/' | '[')
}
