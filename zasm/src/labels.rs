//! Statement-level line recognition shared by both passes: label
//! prefixes (colon and 8080 colonless styles), constant definitions and
//! the mnemonic/operand split.

use crate::diag::Diagnostic;
use crate::lexer::{Token, TokenKind};
use crate::ops::Mnemonic;
use crate::SymbolTable;

#[derive(Debug)]
pub struct Line<'t> {
    /// Source line number, from the first token.
    pub number: u32,
    /// Labels to bind to the current PC.
    pub labels: Vec<&'t Token>,
    pub stmt: Stmt<'t>,
}

#[derive(Debug)]
pub enum Stmt<'t> {
    Empty,
    /// `name EQU expr`, `name SET expr` or `name: EQU expr`.
    Equate { name: &'t Token, expr: &'t [Token] },
    /// An instruction or directive with its operand tokens.
    Op {
        mnemonic: Mnemonic,
        token: &'t Token,
        args: &'t [Token],
    },
    /// Dot-prefixed directives (`.Z80`, `.8080`, ...), accepted and ignored.
    Ignored,
    /// Something else in mnemonic position.
    Unknown { token: &'t Token },
}

pub fn parse_line<'t>(toks: &'t [Token]) -> Line<'t> {
    let number = toks.first().map_or(0, |t| t.line);
    let mut labels = Vec::new();
    let mut rest = toks;

    // `NAME:` prefixes, possibly several on one line
    while let [name, sep, tail @ ..] = rest {
        if name.kind == TokenKind::Identifier && sep.kind == TokenKind::Label {
            labels.push(name);
            rest = tail;
        } else {
            break;
        }
    }

    // `NAME EQU expr` / `NAME SET expr`
    if let [name, op, expr @ ..] = rest {
        if name.kind == TokenKind::Identifier && op.kind == TokenKind::Mnemonic {
            if let Ok(m) = op.text.parse::<Mnemonic>() {
                if m == Mnemonic::EQU || m == Mnemonic::SET {
                    return Line {
                        number,
                        labels,
                        stmt: Stmt::Equate { name, expr },
                    };
                }
            }
        }
    }

    // `NAME: EQU expr` — the label is the constant's name. `SET` after a
    // colon stays the bit instruction, so only EQU is accepted here.
    if let [op, expr @ ..] = rest {
        if op.kind == TokenKind::Mnemonic
            && labels.len() == 1
            && op.text.parse::<Mnemonic>() == Ok(Mnemonic::EQU)
        {
            let name = labels.pop().expect("exactly one label");
            return Line {
                number,
                labels,
                stmt: Stmt::Equate { name, expr },
            };
        }
    }

    // 8080 colonless label: an identifier in the first column followed by
    // a mnemonic or nothing at all
    if let [first, tail @ ..] = rest {
        if first.kind == TokenKind::Identifier
            && first.col == 1
            && (tail.is_empty() || tail[0].kind == TokenKind::Mnemonic)
        {
            labels.push(first);
            rest = tail;
        }
    }

    let stmt = match rest.split_first() {
        None => Stmt::Empty,
        Some((first, tail)) => match first.kind {
            TokenKind::Mnemonic => match first.text.parse::<Mnemonic>() {
                Ok(mnemonic) => Stmt::Op {
                    mnemonic,
                    token: first,
                    args: tail,
                },
                // dot words are mnemonic tokens without an enum entry
                Err(_) => Stmt::Ignored,
            },
            _ => Stmt::Unknown { token: first },
        },
    };

    Line {
        number,
        labels,
        stmt,
    }
}

/// `DEFC name = expr` operand split.
pub fn defc_parts<'t>(args: &'t [Token]) -> Option<(&'t Token, &'t [Token])> {
    match args {
        [name, eq, expr @ ..]
            if name.kind == TokenKind::Identifier
                && eq.kind == TokenKind::Equals
                && !expr.is_empty() =>
        {
            Some((name, expr))
        }
        _ => None,
    }
}

/// Symbol names compare case-insensitively; the lexer already stripped
/// the `$` separators.
pub fn symbol_key(name: &str) -> String {
    name.to_uppercase()
}

/// First-definition binding with the duplicate check (pass 1 only).
pub fn bind(symbols: &mut SymbolTable, name: &Token, value: u16) -> Result<(), Diagnostic> {
    let key = symbol_key(&name.text);
    if symbols.contains_key(&key) {
        return Err(Diagnostic::error(
            name.line,
            format!("Duplicate label '{}'", name.text),
        ));
    }
    symbols.insert(key, value);
    Ok(())
}

/// Idempotent re-binding for pass 2, which walks the same definitions a
/// second time.
pub fn rebind(symbols: &mut SymbolTable, name: &Token, value: u16) {
    symbols.insert(symbol_key(&name.text), value);
}
