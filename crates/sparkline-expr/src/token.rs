//! Lexer for the condition language.
//!
//! The token set is a small subset of Python's expression grammar: numbers,
//! quoted strings, identifiers, the keywords `and`/`or`/`not`/`True`/`False`/
//! `None`, and arithmetic, comparison and grouping punctuation.

use std::fmt;

use crate::error::ExprError;

/// Kinds of token produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// String literal with escapes resolved
    Str(String),
    /// Identifier (variable, attribute or function name)
    Ident(String),
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,
    /// `True`
    True,
    /// `False`
    False,
    /// `None`
    None,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    StarStar,
    /// `/`
    Slash,
    /// `//`
    SlashSlash,
    /// `%`
    Percent,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    EqEq,
    /// `!=`
    Ne,
    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "number {v}"),
            Self::Float(v) => write!(f, "number {v}"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Ident(name) => write!(f, "name {name:?}"),
            Self::And => write!(f, "'and'"),
            Self::Or => write!(f, "'or'"),
            Self::Not => write!(f, "'not'"),
            Self::True => write!(f, "'True'"),
            Self::False => write!(f, "'False'"),
            Self::None => write!(f, "'None'"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::Comma => write!(f, "','"),
            Self::Dot => write!(f, "'.'"),
            Self::Plus => write!(f, "'+'"),
            Self::Minus => write!(f, "'-'"),
            Self::Star => write!(f, "'*'"),
            Self::StarStar => write!(f, "'**'"),
            Self::Slash => write!(f, "'/'"),
            Self::SlashSlash => write!(f, "'//'"),
            Self::Percent => write!(f, "'%'"),
            Self::Lt => write!(f, "'<'"),
            Self::Le => write!(f, "'<='"),
            Self::Gt => write!(f, "'>'"),
            Self::Ge => write!(f, "'>='"),
            Self::EqEq => write!(f, "'=='"),
            Self::Ne => write!(f, "'!='"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// A token together with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was lexed
    pub kind: TokenKind,
    /// Byte offset of the first character
    pub pos: usize,
}

/// Splits `source` into tokens, always terminated by [`TokenKind::Eof`].
///
/// # Errors
///
/// Returns an [`ExprError`] for characters outside the language, unterminated
/// strings and numeric literals that overflow.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let kind = match c {
            b'0'..=b'9' => {
                let (kind, end) = lex_number(source, start)?;
                i = end;
                kind
            }
            b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                let (kind, end) = lex_number(source, start)?;
                i = end;
                kind
            }
            b'"' | b'\'' => {
                let (text, end) = lex_string(source, start)?;
                i = end;
                TokenKind::Str(text)
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                keyword_or_ident(&source[start..i])
            }
            _ => {
                let (kind, width) = lex_punct(bytes, i).ok_or_else(|| ExprError::UnexpectedChar {
                    found: source[i..].chars().next().unwrap_or('\u{fffd}'),
                    pos: i,
                })?;
                i += width;
                kind
            }
        };
        tokens.push(Token { kind, pos: start });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: source.len(),
    });
    Ok(tokens)
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "True" => TokenKind::True,
        "False" => TokenKind::False,
        "None" => TokenKind::None,
        _ => TokenKind::Ident(word.to_string()),
    }
}

fn lex_punct(bytes: &[u8], i: usize) -> Option<(TokenKind, usize)> {
    let next = bytes.get(i + 1).copied();
    let pair = match (bytes[i], next) {
        (b'*', Some(b'*')) => Some(TokenKind::StarStar),
        (b'/', Some(b'/')) => Some(TokenKind::SlashSlash),
        (b'<', Some(b'=')) => Some(TokenKind::Le),
        (b'>', Some(b'=')) => Some(TokenKind::Ge),
        (b'=', Some(b'=')) => Some(TokenKind::EqEq),
        (b'!', Some(b'=')) => Some(TokenKind::Ne),
        _ => None,
    };
    if let Some(kind) = pair {
        return Some((kind, 2));
    }

    let single = match bytes[i] {
        b'(' => TokenKind::LParen,
        b')' => TokenKind::RParen,
        b'[' => TokenKind::LBracket,
        b']' => TokenKind::RBracket,
        b',' => TokenKind::Comma,
        b'.' => TokenKind::Dot,
        b'+' => TokenKind::Plus,
        b'-' => TokenKind::Minus,
        b'*' => TokenKind::Star,
        b'/' => TokenKind::Slash,
        b'%' => TokenKind::Percent,
        b'<' => TokenKind::Lt,
        b'>' => TokenKind::Gt,
        _ => return None,
    };
    Some((single, 1))
}

fn lex_number(source: &str, start: usize) -> Result<(TokenKind, usize), ExprError> {
    let bytes = source.as_bytes();
    let mut i = start;
    let mut is_float = false;

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    // A dot followed by a letter is attribute access on a literal, which the
    // parser rejects; only consume it when digits (or nothing alphabetic) follow.
    if i < bytes.len() && bytes[i] == b'.' && !bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text = &source[start..i];
    let invalid = || ExprError::InvalidNumber {
        text: text.to_string(),
        pos: start,
    };
    let kind = if is_float {
        TokenKind::Float(text.parse().map_err(|_| invalid())?)
    } else {
        TokenKind::Int(text.parse().map_err(|_| invalid())?)
    };
    Ok((kind, i))
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize), ExprError> {
    let mut chars = source[start..].char_indices();
    let (_, quote) = chars.next().ok_or(ExprError::UnterminatedString { pos: start })?;
    let mut out = String::new();

    while let Some((offset, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, start + offset + c.len_utf8())),
            '\\' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or(ExprError::UnterminatedString { pos: start })?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
    Err(ExprError::UnterminatedString { pos: start })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn attribute_path() {
        assert_eq!(
            kinds("packet.game_ball.physics"),
            vec![
                TokenKind::Ident("packet".into()),
                TokenKind::Dot,
                TokenKind::Ident("game_ball".into()),
                TokenKind::Dot,
                TokenKind::Ident("physics".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("300 0.95 .5 1e3 2E-2"),
            vec![
                TokenKind::Int(300),
                TokenKind::Float(0.95),
                TokenKind::Float(0.5),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.02),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators_win() {
        assert_eq!(
            kinds("** // <= >= == != * /"),
            vec![
                TokenKind::StarStar,
                TokenKind::SlashSlash,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::EqEq,
                TokenKind::Ne,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords() {
        assert_eq!(
            kinds("not True and False or None"),
            vec![
                TokenKind::Not,
                TokenKind::True,
                TokenKind::And,
                TokenKind::False,
                TokenKind::Or,
                TokenKind::None,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb""#),
            vec![
                TokenKind::Str("it's".into()),
                TokenKind::Str("a\tb".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn positions_are_byte_offsets() {
        let tokens = tokenize("a  >= 10").unwrap();
        assert_eq!(tokens[0].pos, 0);
        assert_eq!(tokens[1].pos, 3);
        assert_eq!(tokens[2].pos, 6);
        assert_eq!(tokens[3].pos, 8);
    }

    #[test]
    fn rejects_unknown_character() {
        assert_eq!(
            tokenize("a = 1"),
            Err(ExprError::UnexpectedChar { found: '=', pos: 2 })
        );
        assert!(matches!(
            tokenize("__import__('os') ; 1"),
            Err(ExprError::UnexpectedChar { found: ';', .. })
        ));
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(
            tokenize("name == 'bob"),
            Err(ExprError::UnterminatedString { pos: 8 })
        );
    }

    #[test]
    fn integer_overflow_is_reported() {
        assert!(matches!(
            tokenize("99999999999999999999999"),
            Err(ExprError::InvalidNumber { pos: 0, .. })
        ));
    }
}
