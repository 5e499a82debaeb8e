//! Strict parser for the list literals stored in text columns of the
//! track table, e.g. `[21, 76]` or `['Rock', 'Punk']`.
//!
//! Only literal structure is accepted: integers, floats, quoted strings,
//! `None`/`True`/`False` and nested lists. Anything else is an error.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character '{ch}' at offset {offset}")]
    Unexpected { ch: char, offset: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),
    #[error("trailing characters after literal at offset {0}")]
    Trailing(usize),
    #[error("expected a list of integers, found {0}")]
    NotIntegerList(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
}

impl Literal {
    fn kind(&self) -> &'static str {
        match self {
            Literal::None => "None",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "str",
            Literal::List(_) => "list",
        }
    }
}

/// Parse a single literal; the whole input must be consumed.
pub fn parse(input: &str) -> Result<Literal, LiteralError> {
    let mut p = Parser { src: input, pos: 0 };
    let value = p.value()?;
    p.skip_ws();
    if p.pos < p.src.len() {
        return Err(LiteralError::Trailing(p.pos));
    }
    Ok(value)
}

/// Parse a list of non-negative integer IDs such as `[12, 25]`.
pub fn parse_id_list(input: &str) -> Result<Vec<u32>, LiteralError> {
    match parse(input)? {
        Literal::List(items) => items
            .into_iter()
            .map(|item| match item {
                Literal::Int(n) if n >= 0 && n <= u32::MAX as i64 => Ok(n as u32),
                Literal::Int(n) => Err(LiteralError::InvalidNumber(n.to_string())),
                other => Err(LiteralError::NotIntegerList(other.kind().to_string())),
            })
            .collect(),
        other => Err(LiteralError::NotIntegerList(other.kind().to_string())),
    }
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
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn value(&mut self) -> Result<Literal, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('[') => self.list(),
            Some(q @ ('\'' | '"')) => self.string(q),
            Some(ch) if ch == '-' || ch == '+' || ch == '.' || ch.is_ascii_digit() => self.number(),
            Some(ch) if ch.is_ascii_alphabetic() => self.keyword(),
            Some(ch) => Err(LiteralError::Unexpected {
                ch,
                offset: self.pos,
            }),
        }
    }

    fn list(&mut self) -> Result<Literal, LiteralError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(LiteralError::UnexpectedEnd),
                Some(']') => {
                    self.bump();
                    return Ok(Literal::List(items));
                }
                _ => {}
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Literal::List(items)),
                Some(ch) => {
                    return Err(LiteralError::Unexpected {
                        ch,
                        offset: self.pos - ch.len_utf8(),
                    });
                }
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<Literal, LiteralError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LiteralError::UnterminatedString(start)),
                Some(ch) if ch == quote => return Ok(Literal::Str(out)),
                Some('\\') => match self.bump() {
                    None => return Err(LiteralError::UnterminatedString(start)),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    // \\, \', \" and unknown escapes keep the escaped char
                    Some(other) => out.push(other),
                },
                Some(ch) => out.push(ch),
            }
        }
    }

    fn number(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.' | 'e' | 'E' | '_') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        let cleaned = text.replace('_', "");
        if let Ok(n) = cleaned.parse::<i64>() {
            return Ok(Literal::Int(n));
        }
        cleaned
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| LiteralError::InvalidNumber(text.to_string()))
    }

    fn keyword(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        match &self.src[start..self.pos] {
            "None" => Ok(Literal::None),
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            _ => Err(LiteralError::Unexpected {
                ch: self.src[start..].chars().next().unwrap_or('?'),
                offset: start,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list() {
        assert_eq!(parse_id_list("[21]").unwrap(), vec![21]);
        assert_eq!(parse_id_list("[76, 103]").unwrap(), vec![76, 103]);
        assert_eq!(parse_id_list(" [ 1 ,2, 3 , ] ").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(parse_id_list("[]").unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn test_nested_and_mixed_literals() {
        let v = parse("[1, -2.5, 'a\\'b', \"x\", None, True, [False]]").unwrap();
        assert_eq!(
            v,
            Literal::List(vec![
                Literal::Int(1),
                Literal::Float(-2.5),
                Literal::Str("a'b".to_string()),
                Literal::Str("x".to_string()),
                Literal::None,
                Literal::Bool(true),
                Literal::List(vec![Literal::Bool(false)]),
            ])
        );
    }

    #[test]
    fn test_rejects_code() {
        assert!(parse("__import__('os').system('ls')").is_err());
        assert!(parse("[1, os]").is_err());
        assert!(parse("[1, 2] + [3]").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse("[1, 2"), Err(LiteralError::UnexpectedEnd));
        assert_eq!(parse("'abc"), Err(LiteralError::UnterminatedString(0)));
        assert!(matches!(parse("[1 2]"), Err(LiteralError::Unexpected { ch: '2', .. })));
        assert_eq!(parse(""), Err(LiteralError::UnexpectedEnd));
    }

    #[test]
    fn test_id_list_type_errors() {
        assert!(matches!(
            parse_id_list("['Rock']"),
            Err(LiteralError::NotIntegerList(_))
        ));
        assert!(matches!(parse_id_list("5"), Err(LiteralError::NotIntegerList(_))));
        assert!(matches!(parse_id_list("[-1]"), Err(LiteralError::InvalidNumber(_))));
    }
}
