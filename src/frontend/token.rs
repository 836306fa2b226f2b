//! Token definitions for CD25

use crate::utils::Position;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: Option<String>,
    pub line: u32,
    pub col: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: Option<String>, at: Position) -> Self {
        Self {
            kind,
            lexeme,
            line: at.line,
            col: at.col,
        }
    }

    pub fn eof(at: Position) -> Self {
        Self::new(TokenKind::Eof, None, at)
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    /// The lexeme, or an empty string for tokens that carry none
    pub fn text(&self) -> &str {
        self.lexeme.as_deref().unwrap_or("")
    }
}

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ============ Keywords ============
    /// cd25 (program header and footer)
    Cd25,
    /// constants
    Constants,
    /// types
    Types,
    /// is
    Is,
    /// arrays
    Arrays,
    /// main
    Main,
    /// begin
    Begin,
    /// end
    End,
    /// array
    Array,
    /// of
    Of,
    /// func
    Func,
    /// void
    Void,
    /// const
    Const,
    /// integer
    Integer,
    /// real
    Real,
    /// boolean
    Boolean,
    /// for
    For,
    /// repeat
    Repeat,
    /// until
    Until,
    /// if
    If,
    /// else
    Else,
    /// in (input)
    In,
    /// out (output)
    Out,
    /// line
    Line,
    /// return
    Return,
    /// not
    Not,
    /// and
    And,
    /// or
    Or,
    /// xor
    Xor,
    /// true
    True,
    /// false
    False,

    // ============ Identifiers and Literals ============
    Ident,
    IntLit,
    RealLit,
    StrLit,

    // ============ Operators ============
    /// ,
    Comma,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// (
    LParen,
    /// )
    RParen,
    /// =
    Assign,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// ^
    Caret,
    /// <
    Lt,
    /// >
    Gt,
    /// :
    Colon,
    /// ;
    Semicolon,
    /// .
    Dot,
    /// >>
    Shr,
    /// <<
    Shl,
    /// <=
    Le,
    /// >=
    Ge,
    /// !=
    Ne,
    /// ==
    EqEq,
    /// +=
    PlusEq,
    /// -=
    MinusEq,
    /// *=
    StarEq,
    /// /=
    SlashEq,

    // ============ Special ============
    /// Unclassifiable input, already reported as a lexical error
    Undefined,
    /// End of file
    Eof,
}

impl TokenKind {
    /// Try to convert a word to a keyword (case-insensitive)
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "cd25" => TokenKind::Cd25,
            "constants" => TokenKind::Constants,
            "types" => TokenKind::Types,
            "is" => TokenKind::Is,
            "arrays" => TokenKind::Arrays,
            "main" => TokenKind::Main,
            "begin" => TokenKind::Begin,
            "end" => TokenKind::End,
            "array" => TokenKind::Array,
            "of" => TokenKind::Of,
            "func" => TokenKind::Func,
            "void" => TokenKind::Void,
            "const" => TokenKind::Const,
            "integer" => TokenKind::Integer,
            "real" => TokenKind::Real,
            "boolean" => TokenKind::Boolean,
            "for" => TokenKind::For,
            "repeat" => TokenKind::Repeat,
            "until" => TokenKind::Until,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "in" => TokenKind::In,
            "out" => TokenKind::Out,
            "line" => TokenKind::Line,
            "return" => TokenKind::Return,
            "not" => TokenKind::Not,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "xor" => TokenKind::Xor,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }

    /// Look up a two-character operator
    pub fn two_char_op(first: char, second: char) -> Option<TokenKind> {
        let kind = match (first, second) {
            ('>', '>') => TokenKind::Shr,
            ('<', '<') => TokenKind::Shl,
            ('<', '=') => TokenKind::Le,
            ('>', '=') => TokenKind::Ge,
            ('!', '=') => TokenKind::Ne,
            ('=', '=') => TokenKind::EqEq,
            ('+', '=') => TokenKind::PlusEq,
            ('-', '=') => TokenKind::MinusEq,
            ('*', '=') => TokenKind::StarEq,
            ('/', '=') => TokenKind::SlashEq,
            _ => return None,
        };
        Some(kind)
    }

    /// Look up a one-character operator
    pub fn one_char_op(c: char) -> Option<TokenKind> {
        let kind = match c {
            ',' => TokenKind::Comma,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '=' => TokenKind::Assign,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            _ => return None,
        };
        Some(kind)
    }

    /// Short printable name used by the token printer
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Cd25 => "TCD25",
            TokenKind::Constants => "TCONS",
            TokenKind::Types => "TTYPS",
            TokenKind::Is => "TTTIS",
            TokenKind::Arrays => "TARRS",
            TokenKind::Main => "TMAIN",
            TokenKind::Begin => "TBEGN",
            TokenKind::End => "TTEND",
            TokenKind::Array => "TARAY",
            TokenKind::Of => "TTTOF",
            TokenKind::Func => "TFUNC",
            TokenKind::Void => "TVOID",
            TokenKind::Const => "TCNST",
            TokenKind::Integer => "TINTG",
            TokenKind::Real => "TREAL",
            TokenKind::Boolean => "TBOOL",
            TokenKind::For => "TTFOR",
            TokenKind::Repeat => "TREPT",
            TokenKind::Until => "TUNTL",
            TokenKind::If => "TIFTH",
            TokenKind::Else => "TELSE",
            TokenKind::In => "TINPT",
            TokenKind::Out => "TOUTP",
            TokenKind::Line => "TOUTL",
            TokenKind::Return => "TRETN",
            TokenKind::Not => "TNOTT",
            TokenKind::And => "TTAND",
            TokenKind::Or => "TTTOR",
            TokenKind::Xor => "TTXOR",
            TokenKind::True => "TTRUE",
            TokenKind::False => "TFALS",
            TokenKind::Ident => "TIDEN",
            TokenKind::IntLit => "TILIT",
            TokenKind::RealLit => "TFLIT",
            TokenKind::StrLit => "TSTRG",
            TokenKind::Comma => "TCOMA",
            TokenKind::LBracket => "TLBRK",
            TokenKind::RBracket => "TRBRK",
            TokenKind::LParen => "TLPAR",
            TokenKind::RParen => "TRPAR",
            TokenKind::Assign => "TEQUL",
            TokenKind::Plus => "TPLUS",
            TokenKind::Minus => "TMINS",
            TokenKind::Star => "TSTAR",
            TokenKind::Slash => "TDIVD",
            TokenKind::Percent => "TPERC",
            TokenKind::Caret => "TCART",
            TokenKind::Lt => "TLESS",
            TokenKind::Gt => "TGRTR",
            TokenKind::Colon => "TCOLN",
            TokenKind::Semicolon => "TSEMI",
            TokenKind::Dot => "TDOTT",
            TokenKind::Shr => "TGRGR",
            TokenKind::Shl => "TLSLS",
            TokenKind::Le => "TLEQL",
            TokenKind::Ge => "TGEQL",
            TokenKind::Ne => "TNEQL",
            TokenKind::EqEq => "TEQEQ",
            TokenKind::PlusEq => "TPLEQ",
            TokenKind::MinusEq => "TMNEQ",
            TokenKind::StarEq => "TSTEQ",
            TokenKind::SlashEq => "TDVEQ",
            TokenKind::Undefined => "TUNDF",
            TokenKind::Eof => "TTEOF",
        }
    }

    /// Human readable spelling for diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Cd25 => "'cd25'",
            TokenKind::Constants => "'constants'",
            TokenKind::Types => "'types'",
            TokenKind::Is => "'is'",
            TokenKind::Arrays => "'arrays'",
            TokenKind::Main => "'main'",
            TokenKind::Begin => "'begin'",
            TokenKind::End => "'end'",
            TokenKind::Array => "'array'",
            TokenKind::Of => "'of'",
            TokenKind::Func => "'func'",
            TokenKind::Void => "'void'",
            TokenKind::Const => "'const'",
            TokenKind::Integer => "'integer'",
            TokenKind::Real => "'real'",
            TokenKind::Boolean => "'boolean'",
            TokenKind::For => "'for'",
            TokenKind::Repeat => "'repeat'",
            TokenKind::Until => "'until'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::In => "'in'",
            TokenKind::Out => "'out'",
            TokenKind::Line => "'line'",
            TokenKind::Return => "'return'",
            TokenKind::Not => "'not'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Xor => "'xor'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Ident => "identifier",
            TokenKind::IntLit => "integer literal",
            TokenKind::RealLit => "real literal",
            TokenKind::StrLit => "string literal",
            TokenKind::Comma => "','",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Assign => "'='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Caret => "'^'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::Shr => "'>>'",
            TokenKind::Shl => "'<<'",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::Ne => "'!='",
            TokenKind::EqEq => "'=='",
            TokenKind::PlusEq => "'+='",
            TokenKind::MinusEq => "'-='",
            TokenKind::StarEq => "'*='",
            TokenKind::SlashEq => "'/='",
            TokenKind::Undefined => "undefined token",
            TokenKind::Eof => "end of file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(TokenKind::keyword_from_str("CD25"), Some(TokenKind::Cd25));
        assert_eq!(TokenKind::keyword_from_str("Begin"), Some(TokenKind::Begin));
        assert_eq!(TokenKind::keyword_from_str("beginning"), None);
    }

    #[test]
    fn test_operator_tables() {
        assert_eq!(TokenKind::two_char_op('<', '<'), Some(TokenKind::Shl));
        assert_eq!(TokenKind::two_char_op('<', '-'), None);
        assert_eq!(TokenKind::one_char_op('.'), Some(TokenKind::Dot));
        assert_eq!(TokenKind::one_char_op('!'), None);
    }
}
