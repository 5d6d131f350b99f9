//! Numeric literal parsing and operand-expression evaluation.
//!
//! The expression grammar is deliberately tiny: a literal, the current
//! PC (`$`), a symbol, or one of those plus/minus a literal. Anything
//! richer is out of scope for the sources this assembler targets.

use std::num::ParseIntError;

use num::Num;

use crate::labels::symbol_key;
use crate::lexer::{Token, TokenKind};
use crate::SymbolTable;

/// Parse one of the lexer's normalised literal forms (`0x..`, `..b`,
/// decimal). `None` means "not a number" — the caller decides whether a
/// symbol lookup applies, never this function.
pub fn parse_number<T>(text: &str) -> Option<T>
where
    T: Num<FromStrRadixErr = ParseIntError>,
{
    if let Some(hex) = text.strip_prefix("0x") {
        T::from_str_radix(hex, 16).ok()
    } else if text.ends_with('b') || text.ends_with('B') {
        T::from_str_radix(&text[..text.len() - 1], 2).ok()
    } else {
        T::from_str_radix(text, 10).ok()
    }
}

/// An evaluated operand: either a value, or a reference to a symbol that
/// is not (yet) in the table, for the caller to turn into a patch.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprValue {
    Known(u16),
    Forward { name: String, addend: i32 },
}

/// Evaluate an operand expression against the symbol table with `$`
/// bound to `pc`. Returns `None` when the tokens do not form an
/// expression at all.
pub fn eval(tokens: &[Token], symbols: &SymbolTable, pc: u16) -> Option<ExprValue> {
    let mut iter = tokens.iter();
    let first = iter.next()?;

    let mut value = match first.kind {
        TokenKind::Minus => {
            let num = iter.next()?;
            if num.kind != TokenKind::Number {
                return None;
            }
            let magnitude: u32 = parse_number(&num.text)?;
            ExprValue::Known((magnitude as u16).wrapping_neg())
        }
        TokenKind::Number => ExprValue::Known(parse_number::<u32>(&first.text)? as u16),
        TokenKind::Dollar => ExprValue::Known(pc),
        TokenKind::String => {
            // a one-character string is an 8-bit immediate ('$'-terminated
            // CP/M strings lean on this)
            let mut chars = first.text.chars();
            let c = chars.next()?;
            if chars.next().is_some() || !c.is_ascii() {
                return None;
            }
            ExprValue::Known(c as u16)
        }
        TokenKind::Identifier => match symbols.get(&symbol_key(&first.text)) {
            Some(&v) => ExprValue::Known(v),
            None => ExprValue::Forward {
                name: first.text.clone(),
                addend: 0,
            },
        },
        _ => return None,
    };

    // single infix +/- with a pure number on the right
    if let Some(op) = iter.next() {
        let sign: i32 = match op.kind {
            TokenKind::Plus => 1,
            TokenKind::Minus => -1,
            _ => return None,
        };
        let rhs = iter.next()?;
        if rhs.kind != TokenKind::Number {
            return None;
        }
        let offset = parse_number::<u32>(&rhs.text)? as i32;
        if iter.next().is_some() {
            return None;
        }
        value = match value {
            ExprValue::Known(v) => {
                ExprValue::Known((v as i32).wrapping_add(sign.wrapping_mul(offset)) as u16)
            }
            ExprValue::Forward { name, addend } => ExprValue::Forward {
                name,
                addend: addend.wrapping_add(sign.wrapping_mul(offset)),
            },
        };
    }

    Some(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::tokenize;

    fn eval_str(source: &str, symbols: &SymbolTable, pc: u16) -> Option<ExprValue> {
        let tokens = tokenize(source).unwrap();
        let end = tokens.len() - 1; // drop Eof
        eval(&tokens[..end], symbols, pc)
    }

    #[test]
    fn literal_forms() {
        assert_eq!(parse_number::<u32>("0xFF"), Some(255));
        assert_eq!(parse_number::<u32>("11111110b"), Some(0xFE));
        assert_eq!(parse_number::<u32>("42"), Some(42));
        assert_eq!(parse_number::<u32>("4x2"), None);
        assert_eq!(parse_number::<u32>("FF"), None);
    }

    #[test]
    fn pc_and_offsets() {
        let symbols = SymbolTable::new();
        assert_eq!(eval_str("$", &symbols, 0x200), Some(ExprValue::Known(0x200)));
        assert_eq!(
            eval_str("$+2", &symbols, 0x200),
            Some(ExprValue::Known(0x202))
        );
        assert_eq!(
            eval_str("-1", &symbols, 0),
            Some(ExprValue::Known(0xFFFF))
        );
    }

    #[test]
    fn symbols_are_case_insensitive() {
        let mut symbols = SymbolTable::new();
        symbols.insert("MSG".to_string(), 0x109);
        assert_eq!(
            eval_str("msg+1", &symbols, 0),
            Some(ExprValue::Known(0x10A))
        );
    }

    #[test]
    fn unknown_symbol_is_forward() {
        let symbols = SymbolTable::new();
        assert_eq!(
            eval_str("TARGET-2", &symbols, 0),
            Some(ExprValue::Forward {
                name: "TARGET".to_string(),
                addend: -2
            })
        );
    }

    #[test]
    fn character_immediates() {
        let symbols = SymbolTable::new();
        assert_eq!(eval_str("'$'", &symbols, 0), Some(ExprValue::Known(0x24)));
        assert_eq!(eval_str("'hi'", &symbols, 0), None);
    }

    #[test]
    fn rejected_shapes() {
        let symbols = SymbolTable::new();
        assert_eq!(eval_str("1*2", &symbols, 0), None);
        assert_eq!(eval_str("1+FOO", &symbols, 0), None);
    }
}
