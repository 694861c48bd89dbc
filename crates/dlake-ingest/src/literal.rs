//! Parser for the literal syntax used in object metadata values
//!
//! Producers attach values such as `['ObservationDate']` or
//! `{'ObservationDate': 'date', 'WindSpeed': 'int'}`. Only literals are
//! accepted: strings, numbers, `True`/`False`/`None`, lists, tuples and
//! dicts. Anything that would need evaluation is rejected.

use thiserror::Error;

/// A parsed literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    /// Entries in source order
    Dict(Vec<(Literal, Literal)>),
}

impl Literal {
    /// Short description of the value's shape, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Str(_) => "string",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Bool(_) => "bool",
            Literal::None => "None",
            Literal::List(_) => "list",
            Literal::Tuple(_) => "tuple",
            Literal::Dict(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected character '{ch}' at offset {offset}")]
    Unexpected { ch: char, offset: usize },

    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("'{0}' is not a literal")]
    NotALiteral(String),

    #[error("trailing input at offset {0}")]
    Trailing(usize),
}

/// Parse a complete literal; surrounding whitespace is ignored.
pub fn parse_literal(input: &str) -> Result<Literal, LiteralError> {
    let mut parser = Parser { src: input, pos: 0 };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < input.len() {
        return Err(LiteralError::Trailing(parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), LiteralError> {
        self.skip_ws();
        match self.bump() {
            Some(ch) if ch == wanted => Ok(()),
            Some(ch) => Err(LiteralError::Unexpected {
                ch,
                offset: self.pos - ch.len_utf8(),
            }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn value(&mut self) -> Result<Literal, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('\'' | '"') => self.strings(),
            Some('[') => {
                self.bump();
                let (items, _) = self.sequence(']')?;
                Ok(Literal::List(items))
            },
            Some('(') => {
                self.bump();
                let (mut items, trailing_comma) = self.sequence(')')?;
                // `('a')` is a parenthesized value, `('a',)` a tuple
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Literal::Tuple(items))
                }
            },
            Some('{') => {
                self.bump();
                self.dict()
            },
            Some(ch) if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.') => self.number(),
            Some(ch) if ch.is_alphabetic() || ch == '_' => self.name(),
            Some(ch) => Err(LiteralError::Unexpected {
                ch,
                offset: self.pos,
            }),
        }
    }

    /// Comma-separated values up to `close`. Returns whether the last item
    /// was followed by a comma.
    fn sequence(&mut self, close: char) -> Result<(Vec<Literal>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, trailing_comma));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(ch) if ch == close => return Ok((items, false)),
                Some(ch) => {
                    return Err(LiteralError::Unexpected {
                        ch,
                        offset: self.pos - ch.len_utf8(),
                    })
                },
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn dict(&mut self) -> Result<Literal, LiteralError> {
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Literal::Dict(entries));
            }
            let key = self.value()?;
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            self.skip_ws();
            match self.bump() {
                Some(',') => {},
                Some('}') => return Ok(Literal::Dict(entries)),
                Some(ch) => {
                    return Err(LiteralError::Unexpected {
                        ch,
                        offset: self.pos - ch.len_utf8(),
                    })
                },
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    /// One or more adjacent string literals, concatenated
    fn strings(&mut self) -> Result<Literal, LiteralError> {
        let mut out = self.string()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            if matches!(self.peek(), Some('\'' | '"')) {
                out.push_str(&self.string()?);
            } else {
                self.pos = save;
                return Ok(Literal::Str(out));
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LiteralError::UnterminatedString(start)),
                Some(ch) if ch == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(LiteralError::UnterminatedString(start)),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('\n') => {},
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    },
                },
                Some('\n') => return Err(LiteralError::UnterminatedString(start)),
                Some(ch) => out.push(ch),
            }
        }
    }

    fn number(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut prev = ' ';
        while let Some(ch) = self.peek() {
            let accepted = ch.is_ascii_digit()
                || ch == '.'
                || ch == '_'
                || matches!(ch, 'e' | 'E')
                || (matches!(ch, '-' | '+') && matches!(prev, 'e' | 'E'));
            if !accepted {
                break;
            }
            prev = ch;
            self.bump();
        }

        let text = &self.src[start..self.pos];
        let cleaned: String = text.chars().filter(|&c| c != '_').collect();
        let is_float = cleaned.contains(['.', 'e', 'E']);
        if is_float {
            cleaned
                .parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| LiteralError::InvalidNumber(text.to_string()))
        } else {
            cleaned
                .parse::<i64>()
                .map(Literal::Int)
                .map_err(|_| LiteralError::InvalidNumber(text.to_string()))
        }
    }

    fn name(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            "None" => Ok(Literal::None),
            other => Err(LiteralError::NotALiteral(other.to_string())),
        }
    }
}
