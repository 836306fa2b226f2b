//! Backtrackable read-only view over a scanned token sequence

use crate::frontend::token::{Token, TokenKind};
use crate::utils::Position;

/// Cursor over a token vector that always ends with `Eof`
pub struct TokenCursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenCursor {
    /// Wrap a token sequence, appending an `Eof` if it lacks one
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let at = tokens.last().map(|t| t.position()).unwrap_or_default();
            tokens.push(Token::eof(at));
        }
        Self { tokens, pos: 0 }
    }

    /// The current token
    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub fn position(&self) -> Position {
        self.peek().position()
    }

    /// The token `k` places ahead, clamped to `Eof`
    pub fn lookahead(&self, k: usize) -> &Token {
        let j = (self.pos + k).min(self.tokens.len() - 1);
        &self.tokens[j]
    }

    /// Consume and return the current token; `Eof` is never consumed
    pub fn consume(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// Consume the current token iff it has the given kind
    pub fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.consume();
            true
        } else {
            false
        }
    }

    /// Consume and return the current token iff it has the given kind
    pub fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.consume())
        } else {
            None
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    pub fn mark(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len() - 1);
    }

    /// Skip tokens until the current one is in `follow` (or `Eof`)
    pub fn synchronize_to(&mut self, follow: &[TokenKind]) {
        self.synchronize_to_either(follow, &[]);
    }

    /// Skip tokens until the current one is in `follow` or `starts` (or `Eof`)
    pub fn synchronize_to_either(&mut self, follow: &[TokenKind], starts: &[TokenKind]) {
        while !self.is_at_end() {
            let kind = self.peek_kind();
            if follow.contains(&kind) || starts.contains(&kind) {
                break;
            }
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn cursor(source: &str) -> TokenCursor {
        TokenCursor::new(Lexer::new(source).tokenize())
    }

    #[test]
    fn test_lookahead_is_clamped() {
        let c = cursor("a b");
        assert_eq!(c.lookahead(1).kind, TokenKind::Ident);
        assert_eq!(c.lookahead(2).kind, TokenKind::Eof);
        assert_eq!(c.lookahead(50).kind, TokenKind::Eof);
    }

    #[test]
    fn test_expect_leaves_position_on_mismatch() {
        let mut c = cursor("a ;");
        assert!(c.expect(TokenKind::Semicolon).is_none());
        assert_eq!(c.mark(), 0);
        assert_eq!(c.expect(TokenKind::Ident).map(|t| t.text().to_string()), Some("a".to_string()));
        assert!(c.match_kind(TokenKind::Semicolon));
        assert!(c.is_at_end());
    }

    #[test]
    fn test_consume_stops_at_eof() {
        let mut c = cursor("a");
        c.consume();
        c.consume();
        c.consume();
        assert!(c.is_at_end());
        assert_eq!(c.mark(), 1);
    }

    #[test]
    fn test_mark_and_reset() {
        let mut c = cursor("a b c");
        let m = c.mark();
        c.consume();
        c.consume();
        c.reset(m);
        assert_eq!(c.peek().text(), "a");
        c.reset(100);
        assert!(c.is_at_end());
    }

    #[test]
    fn test_synchronize() {
        let mut c = cursor("x y z ; end");
        c.synchronize_to(&[TokenKind::Semicolon]);
        assert_eq!(c.peek_kind(), TokenKind::Semicolon);

        let mut c = cursor("x y z");
        c.synchronize_to(&[TokenKind::Semicolon]);
        assert!(c.is_at_end());

        let mut c = cursor("x if ; end");
        c.synchronize_to_either(&[TokenKind::Semicolon], &[TokenKind::If]);
        assert_eq!(c.peek_kind(), TokenKind::If);
    }

    #[test]
    fn test_missing_eof_is_appended() {
        let c = TokenCursor::new(Vec::new());
        assert!(c.is_at_end());
    }
}
