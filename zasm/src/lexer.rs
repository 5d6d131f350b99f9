//! One-shot tokeniser: walks the pest parse of the whole source into a
//! flat token list with explicit NewLine and Eof sentinels.
//!
//! Words are classified here — mnemonic set first, then register set,
//! otherwise identifier — after case-folding and stripping the 8080-style
//! `$` digit-group/name separators, so the passes never look at raw
//! spellings again.

use pest::Parser;

use z80::is_register_name;

use crate::diag::Diagnostic;
use crate::ops::Mnemonic;
use crate::parser::{Rule, ZasmParser};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// A colon that directly follows an identifier: a label definition.
    Label,
    Mnemonic,
    Register,
    Number,
    String,
    Comma,
    Colon,
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Multiply,
    Divide,
    /// Bare `$`: the current program counter.
    Dollar,
    Identifier,
    Equals,
    NewLine,
    Eof,
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based source line.
    pub line: u32,
    /// 1-based source column.
    pub col: u32,
}

impl Token {
    fn new(kind: TokenKind, text: String, line: u32, col: u32) -> Token {
        Token {
            kind,
            text,
            line,
            col,
        }
    }
}

/// Uniform `0x` spelling for all three hex literal forms.
fn normalize_hex(digits: &str) -> String {
    let cleaned: String = digits
        .chars()
        .filter(|&c| c != '$')
        .collect::<String>()
        .to_uppercase();
    let trimmed = cleaned.trim_start_matches('0');
    format!("0x{}", if trimmed.is_empty() { "0" } else { trimmed })
}

fn classify_word(word: &str) -> (TokenKind, String) {
    let canonical = word.to_uppercase().replace('$', "");
    if canonical.parse::<Mnemonic>().is_ok() {
        (TokenKind::Mnemonic, canonical)
    } else if is_register_name(&canonical) {
        (TokenKind::Register, canonical)
    } else {
        // identifiers keep their spelling, minus the separators
        (TokenKind::Identifier, word.replace('$', ""))
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    let program = ZasmParser::parse(Rule::program, source)
        .map_err(|err| {
            let line = match err.line_col {
                pest::error::LineColLocation::Pos((line, _)) => line,
                pest::error::LineColLocation::Span((line, _), _) => line,
            };
            Diagnostic::error(line as u32, format!("{}", err.variant.message()))
        })?
        .next()
        .expect("grammar produces exactly one program pair");

    let mut tokens = Vec::new();
    for pair in program.into_inner() {
        let (line, col) = pair.as_span().start_pos().line_col();
        let (line, col) = (line as u32, col as u32);
        let rule = pair.as_rule();
        let text = pair.as_str();

        let token = match rule {
            Rule::newline => Token::new(TokenKind::NewLine, String::new(), line, col),
            Rule::EOI => Token::new(TokenKind::Eof, String::new(), line, col),
            Rule::sq_string | Rule::dq_string => {
                let body = pair
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                Token::new(TokenKind::String, body, line, col)
            }
            Rule::hex_prefixed => {
                Token::new(TokenKind::Number, normalize_hex(&text[2..]), line, col)
            }
            Rule::hex_dollar => Token::new(TokenKind::Number, normalize_hex(&text[1..]), line, col),
            Rule::hex_suffixed => {
                Token::new(TokenKind::Number, normalize_hex(&text[..text.len() - 1]), line, col)
            }
            Rule::bin_suffixed => {
                let digits: String = text[..text.len() - 1]
                    .chars()
                    .filter(|&c| c != '$')
                    .collect();
                Token::new(TokenKind::Number, format!("{}b", digits), line, col)
            }
            Rule::decimal => {
                let digits: String = text.chars().filter(|&c| c != '$').collect();
                Token::new(TokenKind::Number, digits, line, col)
            }
            Rule::dot_word => Token::new(TokenKind::Mnemonic, text.to_uppercase(), line, col),
            Rule::word => {
                let (kind, canonical) = classify_word(text);
                Token::new(kind, canonical, line, col)
            }
            Rule::comma => Token::new(TokenKind::Comma, text.to_string(), line, col),
            Rule::colon => Token::new(TokenKind::Colon, text.to_string(), line, col),
            Rule::lparen => Token::new(TokenKind::LeftParen, text.to_string(), line, col),
            Rule::rparen => Token::new(TokenKind::RightParen, text.to_string(), line, col),
            Rule::plus => Token::new(TokenKind::Plus, text.to_string(), line, col),
            Rule::minus => Token::new(TokenKind::Minus, text.to_string(), line, col),
            Rule::star => Token::new(TokenKind::Multiply, text.to_string(), line, col),
            Rule::slash => Token::new(TokenKind::Divide, text.to_string(), line, col),
            Rule::dollar => Token::new(TokenKind::Dollar, text.to_string(), line, col),
            Rule::equals => Token::new(TokenKind::Equals, text.to_string(), line, col),
            _ => Token::new(TokenKind::Unknown, text.to_string(), line, col),
        };
        tokens.push(token);
    }

    // a colon straight after an identifier marks a label definition
    for i in 1..tokens.len() {
        if tokens[i].kind == TokenKind::Colon
            && tokens[i - 1].kind == TokenKind::Identifier
            && tokens[i - 1].line == tokens[i].line
        {
            tokens[i].kind = TokenKind::Label;
        }
    }

    Ok(tokens)
}

/// Logical lines of the token stream, without their NewLine/Eof
/// terminators. Empty lines are dropped.
pub fn logical_lines(tokens: &[Token]) -> impl Iterator<Item = &[Token]> {
    tokens
        .split(|t| matches!(t.kind, TokenKind::NewLine | TokenKind::Eof))
        .filter(|line| !line.is_empty())
}
