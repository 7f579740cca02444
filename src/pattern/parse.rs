//! Pattern source compiler: lexer and recursive-descent parser.

use super::{Pat, SeqElem};
use crate::error::{Error, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBrace,
    RBrace,
    Question,
    Ellipsis,
    Dollar,
    Colon,
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
}

struct Lexer<'a> {
    source: &'a str,
    tokens: Vec<(Token, usize)>,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

impl<'a> Lexer<'a> {
    fn tokenize(source: &'a str) -> Result<Vec<(Token, usize)>> {
        let mut lexer = Lexer {
            source,
            tokens: Vec::new(),
        };
        lexer.run()?;
        Ok(lexer.tokens)
    }

    fn run(&mut self) -> Result<()> {
        let mut chars = self.source.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            match c {
                c if c.is_whitespace() => {}
                '(' => self.tokens.push((Token::LParen, offset)),
                ')' => self.tokens.push((Token::RParen, offset)),
                '{' => self.tokens.push((Token::LBrace, offset)),
                '}' => self.tokens.push((Token::RBrace, offset)),
                '?' => self.tokens.push((Token::Question, offset)),
                '$' => self.tokens.push((Token::Dollar, offset)),
                ':' => self.tokens.push((Token::Colon, offset)),
                '.' => {
                    for _ in 0..2 {
                        match chars.next() {
                            Some((_, '.')) => {}
                            _ => return Err(Error::pattern(offset, "expected '...'")),
                        }
                    }
                    self.tokens.push((Token::Ellipsis, offset));
                }
                '"' => {
                    let mut text = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '"')) => break,
                            Some((_, '\\')) => match chars.next() {
                                Some((_, 'n')) => text.push('\n'),
                                Some((_, 't')) => text.push('\t'),
                                Some((_, c @ ('"' | '\\'))) => text.push(c),
                                Some((esc, c)) => {
                                    return Err(Error::pattern(
                                        esc,
                                        format!("unknown escape '\\{c}'"),
                                    ))
                                }
                                None => {
                                    return Err(Error::pattern(offset, "unterminated string"))
                                }
                            },
                            Some((_, c)) => text.push(c),
                            None => return Err(Error::pattern(offset, "unterminated string")),
                        }
                    }
                    self.tokens.push((Token::Str(text), offset));
                }
                c if c.is_ascii_digit() || c == '-' => {
                    let mut text = String::from(c);
                    let mut is_float = false;
                    while let Some(&(_, next)) = chars.peek() {
                        if next.is_ascii_digit() {
                            text.push(next);
                            chars.next();
                        } else if next == '.' {
                            // Lookahead so a trailing `...` is not eaten
                            // as a fraction.
                            let mut ahead = chars.clone();
                            ahead.next();
                            match ahead.peek() {
                                Some(&(_, d)) if d.is_ascii_digit() => {
                                    is_float = true;
                                    text.push('.');
                                    chars.next();
                                }
                                _ => break,
                            }
                        } else {
                            break;
                        }
                    }
                    let token = if is_float {
                        let value = text
                            .parse::<f64>()
                            .map_err(|_| Error::pattern(offset, format!("bad number '{text}'")))?;
                        Token::Float(value)
                    } else {
                        let value = text
                            .parse::<i64>()
                            .map_err(|_| Error::pattern(offset, format!("bad number '{text}'")))?;
                        Token::Int(value)
                    };
                    self.tokens.push((token, offset));
                }
                c if is_ident_start(c) => {
                    let mut text = String::from(c);
                    while let Some(&(_, next)) = chars.peek() {
                        if is_ident_continue(next) {
                            text.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    self.tokens.push((Token::Ident(text), offset));
                }
                other => {
                    return Err(Error::pattern(offset, format!("unexpected character '{other}'")))
                }
            }
        }
        Ok(())
    }
}

struct ParserState {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl ParserState {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|&(_, o)| o)
            .unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(Error::pattern(offset, format!("expected {what}"))),
        }
    }

    fn parse_pattern(&mut self) -> Result<Pat> {
        let offset = self.offset();
        match self.next() {
            Some(Token::LParen) => {
                let kind = self.expect_ident("node kind after '('")?;
                let mut elems = Vec::new();
                loop {
                    match self.peek() {
                        Some(Token::RParen) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => elems.push(self.parse_elem()?),
                        None => {
                            return Err(Error::pattern(offset, "unclosed '('"));
                        }
                    }
                }
                Ok(Pat::Kind {
                    kind,
                    children: Some(elems),
                })
            }
            Some(Token::LBrace) => {
                let mut alts = Vec::new();
                loop {
                    match self.peek() {
                        Some(Token::RBrace) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => alts.push(self.parse_pattern()?),
                        None => return Err(Error::pattern(offset, "unclosed '{'")),
                    }
                }
                if alts.is_empty() {
                    return Err(Error::pattern(offset, "empty alternation"));
                }
                Ok(Pat::Alt(alts))
            }
            Some(Token::Dollar) => {
                let name = self.expect_ident("capture name after '$'")?;
                let pat = if self.peek() == Some(&Token::Colon) {
                    self.pos += 1;
                    self.parse_pattern()?
                } else {
                    Pat::Wildcard
                };
                Ok(Pat::Capture {
                    name,
                    pat: Box::new(pat),
                    offset,
                })
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "_" => Ok(Pat::Wildcard),
                "true" => Ok(Pat::Literal(crate::tree::NodeValue::Bool(true))),
                "false" => Ok(Pat::Literal(crate::tree::NodeValue::Bool(false))),
                _ => Ok(Pat::Kind {
                    kind: name,
                    children: None,
                }),
            },
            Some(Token::Int(value)) => Ok(Pat::Literal(crate::tree::NodeValue::Int(value))),
            Some(Token::Float(value)) => Ok(Pat::Literal(crate::tree::NodeValue::Float(value))),
            Some(Token::Str(text)) => Ok(Pat::Literal(crate::tree::NodeValue::Str(text))),
            Some(Token::Ellipsis) => Err(Error::pattern(
                offset,
                "'...' is only allowed inside a child list",
            )),
            Some(Token::Question) => Err(Error::pattern(
                offset,
                "'?' must follow a child pattern",
            )),
            Some(token) => Err(Error::pattern(offset, format!("unexpected {token:?}"))),
            None => Err(Error::pattern(offset, "unexpected end of pattern")),
        }
    }

    fn parse_elem(&mut self) -> Result<SeqElem> {
        let offset = self.offset();
        if self.peek() == Some(&Token::Ellipsis) {
            self.pos += 1;
            return Ok(SeqElem::Splat { name: None, offset });
        }

        // `$name:...` is a named splat, which only makes sense here.
        if self.peek() == Some(&Token::Dollar)
            && self.tokens.get(self.pos + 2).map(|(t, _)| t) == Some(&Token::Colon)
            && self.tokens.get(self.pos + 3).map(|(t, _)| t) == Some(&Token::Ellipsis)
        {
            self.pos += 1;
            let name = self.expect_ident("capture name after '$'")?;
            self.pos += 2; // ':' '...'
            return Ok(SeqElem::Splat {
                name: Some(name),
                offset,
            });
        }

        let pat = self.parse_pattern()?;
        if self.peek() == Some(&Token::Question) {
            self.pos += 1;
            Ok(SeqElem::Optional(pat))
        } else {
            Ok(SeqElem::One(pat))
        }
    }
}

fn collect_capture_names(pat: &Pat, seen: &mut HashSet<String>) -> Result<()> {
    match pat {
        Pat::Wildcard | Pat::Literal(_) => Ok(()),
        Pat::Capture { name, pat, offset } => {
            if !seen.insert(name.clone()) {
                return Err(Error::pattern(
                    *offset,
                    format!("duplicate capture name '{name}'"),
                ));
            }
            collect_capture_names(pat, seen)
        }
        Pat::Alt(alts) => {
            // Alternatives may reuse a name between branches (only one
            // branch ever commits), but duplicates within a branch against
            // the outer scope are still rejected.
            let outer = seen.clone();
            let mut merged = outer.clone();
            for alt in alts {
                let mut branch = outer.clone();
                collect_capture_names(alt, &mut branch)?;
                merged.extend(branch);
            }
            *seen = merged;
            Ok(())
        }
        Pat::Kind { children, .. } => {
            if let Some(elems) = children {
                for elem in elems {
                    match elem {
                        SeqElem::One(p) | SeqElem::Optional(p) => {
                            collect_capture_names(p, seen)?;
                        }
                        SeqElem::Splat {
                            name: Some(name),
                            offset,
                        } => {
                            if !seen.insert(name.clone()) {
                                return Err(Error::pattern(
                                    *offset,
                                    format!("duplicate capture name '{name}'"),
                                ));
                            }
                        }
                        SeqElem::Splat { name: None, .. } => {}
                    }
                }
            }
            Ok(())
        }
    }
}

/// Compile pattern source into a [`Pat`] tree.
pub(crate) fn parse(source: &str) -> Result<Pat> {
    let tokens = Lexer::tokenize(source)?;
    if tokens.is_empty() {
        return Err(Error::pattern(0, "empty pattern"));
    }
    let mut state = ParserState {
        tokens,
        pos: 0,
        end: source.len(),
    };
    let pat = state.parse_pattern()?;
    if state.pos < state.tokens.len() {
        return Err(Error::pattern(
            state.offset(),
            "trailing tokens after pattern",
        ));
    }
    let mut seen = HashSet::new();
    collect_capture_names(&pat, &mut seen)?;
    Ok(pat)
}
