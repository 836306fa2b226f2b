//! Lexer for CD25
//!
//! Converts source code into a stream of tokens.
//!
//! The scanner is a small state machine. It reads one character at a time and
//! may push back up to [`PUSHBACK_DEPTH`] characters; positions are restored
//! from a stack of prior positions, so pushing back a newline puts the cursor
//! back at the end of the previous line. Scanning never fails: malformed input
//! becomes an `Undefined` token plus one lexical diagnostic.

use std::collections::VecDeque;

use crate::frontend::listing::SourceListener;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Diagnostics, Position};

/// How many characters can be pushed back in a row
const PUSHBACK_DEPTH: usize = 4;

/// Minimum run of `*` before the `/` that closes a block comment
const BLOCK_CLOSE_STARS: usize = 2;

/// Scanner states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Ready,
    Word,
    Digit,
    Real,
    Operator,
    String,
}

/// The lexer state
pub struct Lexer<'a> {
    /// Source code as characters
    source: Vec<char>,
    /// Index of the next character to read
    pos: usize,
    /// Line of the next character (1-based)
    line: u32,
    /// Column of the last character read on this line (0 before the first)
    col: u32,
    /// Positions before each recent read, newest last
    history: VecDeque<(u32, u32)>,
    /// Set once the EOF token has been produced
    finished: bool,
    diagnostics: Diagnostics,
    listener: Option<&'a mut dyn SourceListener>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 0,
            history: VecDeque::with_capacity(PUSHBACK_DEPTH),
            finished: false,
            diagnostics: Diagnostics::new(),
            listener: None,
        }
    }

    /// Echo every character read (and retract every pushback) to `listener`
    pub fn with_listener(mut self, listener: &'a mut dyn SourceListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Lexical diagnostics collected so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Take the collected diagnostics, leaving none behind
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    // ==================== Character Level ====================

    /// Position the next character will have
    fn here(&self) -> Position {
        Position::new(self.line, self.col + 1)
    }

    fn read(&mut self) -> Option<char> {
        let c = *self.source.get(self.pos)?;
        if self.history.len() == PUSHBACK_DEPTH {
            self.history.pop_front();
        }
        self.history.push_back((self.line, self.col));
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        if let Some(listener) = self.listener.as_deref_mut() {
            listener.echo(c);
        }
        Some(c)
    }

    /// Push back the most recently read character
    fn unread(&mut self) {
        let Some((line, col)) = self.history.pop_back() else {
            debug_assert!(false, "pushback deeper than {PUSHBACK_DEPTH}");
            return;
        };
        self.pos -= 1;
        self.line = line;
        self.col = col;
        if let Some(listener) = self.listener.as_deref_mut() {
            listener.retract();
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn is_space(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\n' | '\r')
    }

    /// Characters that unambiguously begin a new token
    fn starts_token(c: char) -> bool {
        Self::is_space(c)
            || c.is_ascii_alphanumeric()
            || c == '"'
            || TokenKind::one_char_op(c).is_some()
    }

    fn starts_operator(c: char) -> bool {
        TokenKind::one_char_op(c).is_some() || c == '!'
    }

    // ==================== Comments ====================

    /// Called with the `/` already read. Returns true if a comment was skipped,
    /// otherwise every extra character read has been pushed back.
    fn skip_comment(&mut self, start: Position) -> bool {
        match self.read() {
            Some('/') => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.read();
                }
                true
            }
            Some('*') => match self.read() {
                Some('*') => {
                    self.skip_block_comment(start);
                    true
                }
                Some(_) => {
                    self.unread();
                    self.unread();
                    false
                }
                None => {
                    self.unread();
                    false
                }
            },
            Some(_) => {
                self.unread();
                false
            }
            None => false,
        }
    }

    /// Skip to the closing `**/`; a longer run of stars also closes
    fn skip_block_comment(&mut self, start: Position) {
        let mut stars = 0;
        loop {
            match self.read() {
                Some('*') => stars += 1,
                Some('/') if stars >= BLOCK_CLOSE_STARS => return,
                Some(_) => stars = 0,
                None => {
                    self.diagnostics.lexical("unterminated block comment", start);
                    return;
                }
            }
        }
    }

    // ==================== Token Level ====================

    fn make_token(&self, kind: TokenKind, lexeme: Option<String>, start: Position) -> Token {
        log::trace!("token {:?} {:?} at {}", kind, lexeme, start);
        Token::new(kind, lexeme, start)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        let mut state = ScanState::Ready;
        let mut start = self.here();
        let mut text = String::new();

        loop {
            match state {
                ScanState::Ready => {
                    start = self.here();
                    let Some(c) = self.read() else {
                        self.finished = true;
                        return self.make_token(TokenKind::Eof, None, start);
                    };
                    if Self::is_space(c) {
                        continue;
                    }
                    if c == '/' && self.skip_comment(start) {
                        continue;
                    }
                    text.push(c);
                    state = if c.is_ascii_alphabetic() {
                        ScanState::Word
                    } else if c.is_ascii_digit() {
                        ScanState::Digit
                    } else if c == '"' {
                        text.clear();
                        ScanState::String
                    } else if Self::starts_operator(c) {
                        ScanState::Operator
                    } else {
                        return self.read_undefined(text, start);
                    };
                }

                ScanState::Word => match self.read() {
                    Some(c) if c.is_ascii_alphanumeric() => text.push(c),
                    next => {
                        if next.is_some() {
                            self.unread();
                        }
                        return match TokenKind::keyword_from_str(&text) {
                            Some(kind) => self.make_token(kind, None, start),
                            None => self.make_token(TokenKind::Ident, Some(text), start),
                        };
                    }
                },

                ScanState::Digit => match self.read() {
                    Some(c) if c.is_ascii_digit() => text.push(c),
                    Some('.') => match self.read() {
                        Some(d) if d.is_ascii_digit() => {
                            text.push('.');
                            text.push(d);
                            state = ScanState::Real;
                        }
                        after_dot => {
                            // A bare trailing dot belongs to the next token
                            if after_dot.is_some() {
                                self.unread();
                            }
                            self.unread();
                            return self.make_token(TokenKind::IntLit, Some(text), start);
                        }
                    },
                    next => {
                        if next.is_some() {
                            self.unread();
                        }
                        return self.make_token(TokenKind::IntLit, Some(text), start);
                    }
                },

                ScanState::Real => match self.read() {
                    Some(c) if c.is_ascii_digit() => text.push(c),
                    next => {
                        if next.is_some() {
                            self.unread();
                        }
                        return self.make_token(TokenKind::RealLit, Some(text), start);
                    }
                },

                ScanState::Operator => {
                    let first = text.chars().next().unwrap_or_default();
                    if let Some(second) = self.read() {
                        if let Some(kind) = TokenKind::two_char_op(first, second) {
                            return self.make_token(kind, None, start);
                        }
                        self.unread();
                    }
                    return match TokenKind::one_char_op(first) {
                        Some(kind) => self.make_token(kind, None, start),
                        None => self.read_undefined(text, start),
                    };
                }

                ScanState::String => match self.read() {
                    Some('"') => return self.make_token(TokenKind::StrLit, Some(text), start),
                    Some('\n') => {
                        self.unread();
                        return self.unterminated_string(text, start);
                    }
                    Some(c) => text.push(c),
                    None => return self.unterminated_string(text, start),
                },
            }
        }
    }

    fn unterminated_string(&mut self, text: String, start: Position) -> Token {
        self.diagnostics.lexical(format!("unterminated string \"{}", text), start);
        self.make_token(TokenKind::Undefined, Some(format!("\"{}", text)), start)
    }

    /// Absorb unclassifiable characters up to the next token start
    fn read_undefined(&mut self, mut text: String, start: Position) -> Token {
        while let Some(c) = self.read() {
            if Self::starts_token(c) {
                self.unread();
                break;
            }
            text.push(c);
        }
        self.diagnostics.lexical(format!("invalid character sequence '{}'", text), start);
        self.make_token(TokenKind::Undefined, Some(text), start)
    }

    /// Tokenize the entire source and return all tokens
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        log::debug!("scanned {} tokens", tokens.len());
        tokens
    }

    /// True once the EOF token has been produced
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::listing::Listing;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = Lexer::new("CD25 prog main begin end").tokenize();

        assert_eq!(tokens[0].kind, TokenKind::Cd25);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].lexeme.as_deref(), Some("prog"));
        assert_eq!(tokens[2].kind, TokenKind::Main);
        assert_eq!(tokens[3].kind, TokenKind::Begin);
        assert_eq!(tokens[4].kind, TokenKind::End);
        assert_eq!(tokens[5].kind, TokenKind::Eof);
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("a\n  bc = 1").tokenize();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
        assert_eq!((tokens[2].line, tokens[2].col), (2, 6));
        assert_eq!((tokens[3].line, tokens[3].col), (2, 8));
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("42 3.14").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::IntLit);
        assert_eq!(tokens[0].text(), "42");
        assert_eq!(tokens[1].kind, TokenKind::RealLit);
        assert_eq!(tokens[1].text(), "3.14");
    }

    #[test]
    fn test_trailing_dot_is_pushed_back() {
        assert_eq!(
            kinds("12.x"),
            vec![TokenKind::IntLit, TokenKind::Dot, TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(kinds("7."), vec![TokenKind::IntLit, TokenKind::Dot, TokenKind::Eof]);
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("<< >> <= >= != == += -= *= /= < ="),
            vec![
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Ne,
                TokenKind::EqEq,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::Lt,
                TokenKind::Assign,
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("<-"), vec![TokenKind::Lt, TokenKind::Minus, TokenKind::Eof]);
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("a // note\nb /** block\n * still ***/ c"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
        // `/*` without the second star is division then multiplication
        assert_eq!(
            kinds("a /* b"),
            vec![TokenKind::Ident, TokenKind::Slash, TokenKind::Star, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut lexer = Lexer::new("a /** never closed");
        let tokens = lexer.tokenize();
        assert_eq!(tokens.len(), 2);
        assert_eq!(lexer.diagnostics().len(), 1);
    }

    #[test]
    fn test_strings() {
        let tokens = Lexer::new("\"hello world\"").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::StrLit);
        assert_eq!(tokens[0].text(), "hello world");
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"abc\nx");
        let tokens = lexer.tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Undefined);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!((tokens[1].line, tokens[1].col), (2, 1));
        assert_eq!(lexer.diagnostics().len(), 1);
    }

    #[test]
    fn test_undefined_run_is_one_token() {
        let mut lexer = Lexer::new("x @#$ y !");
        let tokens = lexer.tokenize();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Undefined,
                TokenKind::Ident,
                TokenKind::Undefined,
                TokenKind::Eof
            ]
        );
        assert_eq!(tokens[1].text(), "@#$");
        assert_eq!(lexer.diagnostics().len(), 2);
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            kinds("IF Else rePEAT"),
            vec![TokenKind::If, TokenKind::Else, TokenKind::Repeat, TokenKind::Eof]
        );
    }

    #[test]
    fn test_single_eof_and_restart_free() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert!(lexer.is_finished());
    }

    #[test]
    fn test_listing_reconstructs_source() {
        let source = "cd25 p /** c **/\nmain x : integer begin\n x = 12.y; out << \"s\" end cd25 p\n!@";
        let mut listing = Listing::new();
        {
            let mut lexer = Lexer::new(source).with_listener(&mut listing);
            lexer.tokenize();
        }
        assert_eq!(listing.text(), source);
    }
}
