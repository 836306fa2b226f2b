//! Debug printers for the token stream and the syntax tree

use std::fmt::Write;

use crate::frontend::ast::{Ast, NodeId};
use crate::frontend::token::{Token, TokenKind};

/// Width of a packed token line
const LINE_WIDTH: usize = 60;
/// Token names and lexemes are laid out in columns of this width
const COLUMN: usize = 6;

/// Pad `s` with spaces to the next multiple of six; a full column gets one more
fn pad_to_column(s: &str) -> String {
    let len = s.chars().count();
    let next = (len / COLUMN + 1) * COLUMN;
    format!("{}{}", s, " ".repeat(next - len))
}

/// Printed form of one token
fn chunk(token: &Token) -> String {
    let name = pad_to_column(token.kind.name());
    match token.kind {
        TokenKind::Ident | TokenKind::IntLit | TokenKind::RealLit => name + &pad_to_column(token.text()),
        TokenKind::StrLit => name + &pad_to_column(&format!("\"{}\"", token.text())),
        _ => name,
    }
}

/// Keep an error lexeme on one output line
fn sanitize(s: &str) -> String {
    s.replace('\r', "").replace(['\n', '\t'], " ")
}

/// Pack tokens into lines of at most sixty columns
///
/// A chunk wider than a line gets a line of its own. An undefined token
/// flushes the current line and is followed by a lexical error line.
pub fn print_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut line = String::new();

    for token in tokens {
        if token.kind == TokenKind::Undefined {
            flush(&mut out, &mut line);
            writeln!(out, "{}", token.kind.name()).unwrap();
            writeln!(
                out,
                "      lexical error {} (line {}, column {})",
                sanitize(token.text()),
                token.line,
                token.col
            )
            .unwrap();
            continue;
        }

        let chunk = chunk(token);
        if chunk.len() > LINE_WIDTH {
            flush(&mut out, &mut line);
            writeln!(out, "{}", chunk).unwrap();
            continue;
        }
        if !line.is_empty() && line.len() + chunk.len() > LINE_WIDTH {
            flush(&mut out, &mut line);
        }
        line.push_str(&chunk);
    }
    flush(&mut out, &mut line);
    out
}

fn flush(out: &mut String, line: &mut String) {
    if !line.is_empty() {
        writeln!(out, "{}", line).unwrap();
        line.clear();
    }
}

/// Preorder dump of the tree, two spaces per depth level
pub fn print_tree(ast: &Ast) -> String {
    let mut out = String::new();
    if let Some(root) = ast.root() {
        print_node(ast, root, 0, &mut out);
    }
    out
}

fn print_node(ast: &Ast, id: NodeId, depth: usize, out: &mut String) {
    let node = ast.node(id);
    write!(out, "{}{:?}", "  ".repeat(depth), node.kind).unwrap();
    if let Some(lexeme) = &node.lexeme {
        write!(out, "({})", lexeme).unwrap();
    }
    out.push('\n');
    for &child in &node.children {
        print_node(ast, child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::NodeKind;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::parse_source;
    use crate::utils::Position;

    #[test]
    fn test_padding() {
        assert_eq!(pad_to_column("x"), "x     ");
        assert_eq!(pad_to_column("abcdef"), "abcdef      ");
        assert_eq!(pad_to_column("TCD25"), "TCD25 ");
    }

    #[test]
    fn test_token_lines() {
        let tokens = Lexer::new("cd25 prog main begin end cd25 prog").tokenize();
        let printed = print_tokens(&tokens);
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines[0], "TCD25 TIDEN prog  TMAIN TBEGN TTEND TCD25 TIDEN prog  TTEOF ");
        assert!(lines.iter().all(|l| l.len() <= LINE_WIDTH));
    }

    #[test]
    fn test_long_lines_wrap() {
        let tokens: Vec<Token> = (0..12)
            .map(|i| Token::new(TokenKind::Ident, Some(format!("v{}", i)), Position::new(1, 1)))
            .collect();
        let printed = print_tokens(&tokens);
        assert_eq!(printed.lines().count(), 3);
        assert!(printed.lines().all(|l| l.len() <= LINE_WIDTH));
    }

    #[test]
    fn test_undefined_token_gets_its_own_lines() {
        let tokens = vec![
            Token::new(TokenKind::Begin, None, Position::new(1, 1)),
            Token::new(TokenKind::Undefined, Some("@@".into()), Position::new(1, 7)),
            Token::new(TokenKind::End, None, Position::new(1, 10)),
        ];
        assert_eq!(
            print_tokens(&tokens),
            "TBEGN \nTUNDF\n      lexical error @@ (line 1, column 7)\nTTEND \n"
        );
    }

    #[test]
    fn test_tree_indentation() {
        let (ast, diags) = parse_source("cd25 p main begin x = 1; end cd25 p");
        assert!(diags.is_empty());
        let printed = print_tree(&ast);
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines[0], "Program");
        assert_eq!(lines[1], "  SimpleVar(p)");
        assert!(lines.contains(&"      Assign"));
        assert!(lines.contains(&"        SimpleVar(x)"));
        assert!(lines.contains(&"        IntLit(1)"));
    }

    #[test]
    fn test_unfinished_tree_prints_nothing() {
        let mut ast = Ast::new();
        ast.push(NodeKind::IntLit, Some("1".into()), Position::new(1, 1), vec![]);
        assert_eq!(print_tree(&ast), "");
    }
}
