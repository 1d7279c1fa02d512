use std::{fmt, ops::Range};

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
    line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            lo: span.lo,
            len: span.len,
            line: span.line,
        }
    }

    /// Returns a zero-length end of file token positioned at the end of `src`.
    pub fn eof_for(src: &str, line: u32) -> Token {
        Token::new(TokenKind::Eof, Span::new_of_length(src.len(), 0, line))
    }

    pub fn span(&self) -> Span {
        Span {
            lo: self.lo,
            len: self.len,
            line: self.line,
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

/// A source region. Besides the byte bounds, a span remembers the (1-based)
/// line on which it starts, since that is what diagnostics report.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub lo: usize,
    pub len: u32,
    pub line: u32,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>, line: u32) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap(), line)
    }

    pub fn new_of_length(lo: usize, len: u32, line: u32) -> Span {
        Span { lo, len, line }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a span covering both `self` and `other`, which must come after
    /// `self` in the source.
    pub fn to(self, other: Span) -> Span {
        Span::new_of_bounds(self.lo..other.hi().max(self.hi()), self.line)
    }

    /// Shrinks (or grows) the span by the provided deltas.
    pub fn offset(self, lo: isize, hi: isize) -> Span {
        let new_lo = self.lo.checked_add_signed(lo).unwrap();
        let new_hi = self.hi().checked_add_signed(hi).unwrap();
        Span::new_of_bounds(new_lo..new_hi, self.line)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, line: {})", self.line)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Exit,
    If,
    Elif,
    Else,
    Loop,
    Write,
    Print,
    Int,
    Char,

    Plus,
    /// `++`
    PlusPlus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    Less,
    Greater,
    /// `<>`, the trailing newline marker of write statements.
    Newline,
    Bar,
    Semicolon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Identifier,
    Number,
    CharLit,
    String,

    Eof,
}

impl TokenKind {
    /// Describes the token kind as it is expected in diagnostics.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            Exit => "'exit'",
            If => "'if'",
            Elif => "'elif'",
            Else => "'else'",
            Loop => "'loop'",
            Write => "'write'",
            Print => "'print'",
            Int => "'int'",
            Char => "'char'",
            Plus => "'+'",
            PlusPlus => "'++'",
            Minus => "'-'",
            Star => "'*'",
            Slash => "'/'",
            Percent => "'%'",
            Amp => "'&'",
            Assign => "'='",
            EqEq => "'=='",
            NotEq => "'!='",
            Less => "'<'",
            Greater => "'>'",
            Newline => "'<>'",
            Bar => "'|'",
            Semicolon => "';'",
            Comma => "','",
            LParen => "'('",
            RParen => "')'",
            LBrace => "'{'",
            RBrace => "'}'",
            LBracket => "'['",
            RBracket => "']'",
            Identifier => "an identifier",
            Number => "an integer",
            CharLit => "a character",
            String => "a string",
            Eof => "end of file",
        }
    }

    /// Whether the token starts a type in declarations.
    pub fn is_type(self) -> bool {
        matches!(self, TokenKind::Int | TokenKind::Char)
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "exit" => TokenKind::Exit,
    "if" => TokenKind::If,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "loop" => TokenKind::Loop,
    "write" => TokenKind::Write,
    "print" => TokenKind::Print,
    "int" => TokenKind::Int,
    "char" => TokenKind::Char,
};
