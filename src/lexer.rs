use std::{iter::Peekable, num::ParseIntError};

use crate::token::{Span, Spanned, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// The buffer always ends with an [`TokenKind::Eof`] token on success.
pub fn lex(src: &str, tokens: &mut Vec<Token>) -> Result<(), Spanned<Error>> {
    Lexer::new(src, tokens).lex()
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Result<Vec<Token>, Spanned<Error>> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens)?;
    Ok(tokens)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedChar(char),
    UnclosedComment,
    UnclosedString,
    UnescapedLineBreak,
    InvalidCharLiteral,
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    line: u32,
    current_line: u32,
    /// Set once `advance` ran past the last char. A `'\0'` read before that
    /// is part of the source.
    exhausted: bool,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted or the first
    /// lexical error is found.
    fn lex(mut self) -> Result<(), Spanned<Error>> {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            let next = match self.scan_token_kind() {
                Ok(next) => next,
                Err(error) => return Err(self.span().wrap(error)),
            };
            match next {
                Some(TokenKind::Eof) => {
                    self.produce(TokenKind::Eof);
                    return Ok(());
                }
                Some(kind) => self.produce(kind),
                // Trivia
                None => (),
            }
        }
    }

    /// Tries to scan the current character. Whitespace and comments yield
    /// `None`.
    fn scan_token_kind(&mut self) -> Result<Option<TokenKind>, Error> {
        use TokenKind::*;
        let kind = match self.mark_advance() {
            '\0' if self.exhausted => Eof,
            '+' => match self.peek() {
                '+' => self.advance_with(PlusPlus),
                _ => Plus,
            },
            '-' => Minus,
            '*' => Star,
            '/' => match self.peek() {
                '/' => return Ok(self.inline_comment()),
                '*' => return self.multiline_comment(),
                _ => Slash,
            },
            '%' => Percent,
            '&' => Amp,
            '=' => match self.peek() {
                '=' => self.advance_with(EqEq),
                _ => Assign,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => return Err(Error::UnexpectedChar('!')),
            },
            '<' => match self.peek() {
                '>' => self.advance_with(Newline),
                _ => Less,
            },
            '>' => Greater,
            '|' => Bar,
            ';' => Semicolon,
            ',' => Comma,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            '"' => self.string()?,
            '\'' => self.char_literal()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_whitespace() => return Ok(self.whitespace()),
            other => return Err(Error::UnexpectedChar(other)),
        };
        Ok(Some(kind))
    }

    /// Scans a string literal. Escapes are only validated here; they're
    /// expanded by [`extract::string`] once the parser asks for the value.
    fn string(&mut self) -> Result<TokenKind, Error> {
        let mut is_escaping = false;
        loop {
            match (is_escaping, self.advance()) {
                (_, '\0') if self.exhausted => return Err(Error::UnclosedString),
                (false, '"') => return Ok(TokenKind::String),
                (false, '\n') => return Err(Error::UnescapedLineBreak),
                (false, '\\') => is_escaping = true,
                (_, _) => is_escaping = false,
            }
        }
    }

    fn char_literal(&mut self) -> Result<TokenKind, Error> {
        match self.advance() {
            '\0' | '\n' | '\'' => return Err(Error::InvalidCharLiteral),
            '\\' => {
                if self.advance() == '\0' {
                    return Err(Error::InvalidCharLiteral);
                }
            }
            c if !c.is_ascii() => return Err(Error::InvalidCharLiteral),
            _ => (),
        }
        if self.advance() == '\'' {
            Ok(TokenKind::CharLit)
        } else {
            Err(Error::InvalidCharLiteral)
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: char| c.is_ascii_alphanumeric() || c == '_';

        while valid_identifier_suffix(self.peek()) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Number
    }

    fn whitespace(&mut self) -> Option<TokenKind> {
        while self.peek().is_ascii_whitespace() {
            self.advance();
        }
        None
    }

    fn inline_comment(&mut self) -> Option<TokenKind> {
        assert_eq!(self.advance(), '/');
        while self.iter.peek().is_some_and(|&c| c != '\n') {
            self.advance();
        }
        None
    }

    fn multiline_comment(&mut self) -> Result<Option<TokenKind>, Error> {
        assert_eq!(self.advance(), '*');
        loop {
            match self.advance() {
                '*' => (), // start closing comment
                '\0' if self.exhausted => return Err(Error::UnclosedComment),
                _ => continue,
            }
            // A run of stars may precede the slash.
            while self.peek() == '*' {
                self.advance();
            }
            match self.advance() {
                '/' => return Ok(None),
                '\0' if self.exhausted => return Err(Error::UnclosedComment),
                _ => continue,
            }
        }
    }
}

impl Lexer<'_, '_> {
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            line: 1,
            current_line: 1,
            exhausted: false,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.current_line = self.line;
        self.advance()
    }

    /// Returns the next char and advances the iterator, keeping track of
    /// line breaks.
    fn advance(&mut self) -> char {
        let Some(c) = self.iter.next() else {
            self.exhausted = true;
            return '\0';
        };
        self.cursor += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        c
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next char without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor, self.current_line)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.span()));
    }
}

/// Functions to recover the literal value of a token from the source.
pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Number);
        token.span().substr(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.span().substr(src)
    }

    pub fn char(token: Token, src: &str) -> u8 {
        debug_assert_eq!(token.kind, TokenKind::CharLit);
        let raw = token.span().offset(1, -1).substr(src);
        // The lexer only accepts a single ASCII char or a two-char escape.
        perform_escape(raw)[0]
    }

    pub fn string(token: Token, src: &str) -> Box<[u8]> {
        debug_assert_eq!(token.kind, TokenKind::String);
        let raw = token.span().offset(1, -1).substr(src);
        perform_escape(raw).into_boxed_slice()
    }
}

fn perform_escape(raw: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(raw.len());
    let mut escaped = false;
    for byte in raw.bytes() {
        let byte = match (escaped, byte) {
            (true, b'n') => b'\n',
            (true, b't') => b'\t',
            (true, b'0') => b'\0',
            (false, b'\\') => {
                escaped = true;
                continue;
            }
            (_, byte) => byte,
        };
        escaped = false;
        buf.push(byte);
    }
    buf
}
