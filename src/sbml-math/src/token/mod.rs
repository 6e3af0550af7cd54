// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

// tokenizer for infix formulas, in the same shape as the LALRPOP
// whitespace tokenizer

use std::str::CharIndices;

use lazy_static::lazy_static;
use unicode_xid::UnicodeXID;

use self::Token::*;
use crate::common::ErrorCode::*;
use crate::common::{ErrorCode, FormulaError};


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'input> {
    Plus,
    Minus,
    Mul,
    Div,
    Exp,
    Percent,
    Lt,
    Lte,
    Gt,
    Gte,
    EqEq,
    Neq,
    And,
    Or,
    Not,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Ident(&'input str),
    Num(&'input str),
}

fn error<T>(code: ErrorCode, start: usize, end: usize) -> Result<T, FormulaError> {
    Err(FormulaError::new(code, start, end))
}

pub type Spanned<T> = (usize, T, usize);

pub struct Lexer<'input> {
    text: &'input str,
    chars: CharIndices<'input>,
    lookahead: Option<(usize, char)>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        let mut t = Lexer {
            text: input,
            chars: input.char_indices(),
            lookahead: None,
        };
        t.bump();
        t
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.bump_n(1)
    }

    fn bump_n(&mut self, n: usize) -> Option<(usize, char)> {
        debug_assert!(n > 0);
        self.lookahead = self.chars.nth(n - 1);
        self.lookahead
    }

    fn take_while<F>(&mut self, mut keep_going: F) -> Option<usize>
    where
        F: FnMut(char) -> bool,
    {
        loop {
            match self.lookahead {
                None => {
                    return None;
                }
                Some((idx1, c)) => {
                    if keep_going(c) {
                        self.bump();
                    } else {
                        return Some(idx1);
                    }
                }
            }
        }
    }

    fn identifier(&mut self, idx0: usize) -> Spanned<Token<'input>> {
        match self.take_while(is_identifier_continue) {
            Some(end) => (idx0, Ident(&self.text[idx0..end]), end),
            None => (idx0, Ident(&self.text[idx0..]), self.text.len()),
        }
    }

    fn number(&mut self, idx0: usize) -> Result<Spanned<Token<'input>>, FormulaError> {
        use regex::Regex;

        lazy_static! {
            static ref NUMBER_RE: Regex =
                Regex::new(r"^(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?").unwrap();
        }

        let m = match NUMBER_RE.find(&self.text[idx0..]) {
            Some(m) => m,
            // a lone '.'
            None => {
                self.bump();
                return error(ExpectedNumber, idx0, idx0 + 1);
            }
        };

        // every character matched is ASCII, so bytes and chars line up
        self.bump_n(m.end());

        let end = idx0 + m.end();
        Ok((idx0, Num(&self.text[idx0..end]), end))
    }

    #[allow(clippy::unnecessary_wraps)]
    fn consume(
        &mut self,
        i: usize,
        tok: Token<'input>,
        len: usize,
    ) -> Option<Result<Spanned<Token<'input>>, FormulaError>> {
        self.bump();
        Some(Ok((i, tok, i + len)))
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Result<Spanned<Token<'input>>, FormulaError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            return match self.lookahead {
                Some((i, '+')) => self.consume(i, Plus, 1),
                Some((i, '-')) => self.consume(i, Minus, 1),
                Some((i, '*')) => self.consume(i, Mul, 1),
                Some((i, '/')) => self.consume(i, Div, 1),
                Some((i, '^')) => self.consume(i, Exp, 1),
                Some((i, '%')) => self.consume(i, Percent, 1),
                Some((i, '<')) => {
                    match self.bump() {
                        Some((_, '=')) => self.consume(i, Lte, 2),
                        // we've already bumped, don't consume
                        _ => Some(Ok((i, Lt, i + 1))),
                    }
                }
                Some((i, '>')) => match self.bump() {
                    Some((_, '=')) => self.consume(i, Gte, 2),
                    _ => Some(Ok((i, Gt, i + 1))),
                },
                Some((i, '=')) => match self.bump() {
                    Some((_, '=')) => self.consume(i, EqEq, 2),
                    // a single '=' is assignment, which formulas don't have
                    _ => Some(error(UnrecognizedToken, i, i + 1)),
                },
                Some((i, '!')) => match self.bump() {
                    Some((_, '=')) => self.consume(i, Neq, 2),
                    _ => Some(Ok((i, Not, i + 1))),
                },
                Some((i, '&')) => match self.bump() {
                    Some((_, '&')) => self.consume(i, And, 2),
                    _ => Some(error(UnrecognizedToken, i, i + 1)),
                },
                Some((i, '|')) => match self.bump() {
                    Some((_, '|')) => self.consume(i, Or, 2),
                    _ => Some(error(UnrecognizedToken, i, i + 1)),
                },
                Some((i, '(')) => self.consume(i, LParen, 1),
                Some((i, ')')) => self.consume(i, RParen, 1),
                Some((i, '{')) => self.consume(i, LBrace, 1),
                Some((i, '}')) => self.consume(i, RBrace, 1),
                Some((i, '[')) => self.consume(i, LBracket, 1),
                Some((i, ']')) => self.consume(i, RBracket, 1),
                Some((i, ',')) => self.consume(i, Comma, 1),
                Some((i, c)) if is_identifier_start(c) => Some(Ok(self.identifier(i))),
                Some((i, c)) if is_number_start(c) => Some(self.number(i)),
                Some((_, c)) if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                Some((i, _)) => {
                    self.bump(); // eat whatever is killing us
                    let end = match self.lookahead {
                        Some((end, _)) => end,
                        None => self.text.len(),
                    };
                    Some(error(UnrecognizedToken, i, end))
                }
                None => None,
            };
        }
    }
}

fn is_number_start(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

fn is_identifier_start(c: char) -> bool {
    UnicodeXID::is_xid_start(c) || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    UnicodeXID::is_xid_continue(c)
}
