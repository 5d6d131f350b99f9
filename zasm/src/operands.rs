//! Comma-separated operand splitting and the contextual accessors the
//! encoders use. A name such as `C` is a register in one position and a
//! condition code in another, so operands stay as token slices and each
//! encoder asks for the reading it needs.

use z80::{index_half, Cond, Prefix, Reg16, Reg8};

use crate::eval::{self, ExprValue};
use crate::lexer::{Token, TokenKind};
use crate::SymbolTable;

#[derive(Debug)]
pub struct Operand<'t> {
    toks: &'t [Token],
    indirect: bool,
    inner: &'t [Token],
}

/// Split an instruction's operand tokens at top-level commas.
pub fn split<'t>(args: &'t [Token]) -> Result<Vec<Operand<'t>>, String> {
    let mut out = Vec::new();
    if args.is_empty() {
        return Ok(out);
    }

    let mut depth = 0i32;
    let mut start = 0;
    for (i, tok) in args.iter().enumerate() {
        match tok.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => {
                depth -= 1;
                if depth < 0 {
                    return Err("Unbalanced parentheses".to_string());
                }
            }
            TokenKind::Comma if depth == 0 => {
                out.push(Operand::parse(&args[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("Unbalanced parentheses".to_string());
    }
    out.push(Operand::parse(&args[start..])?);

    Ok(out)
}

impl<'t> Operand<'t> {
    fn parse(toks: &'t [Token]) -> Result<Operand<'t>, String> {
        if toks.is_empty() {
            return Err("Missing operand".to_string());
        }

        let mut wrapped = toks.len() >= 2
            && toks[0].kind == TokenKind::LeftParen
            && toks[toks.len() - 1].kind == TokenKind::RightParen;
        if wrapped {
            // the opening paren must be the one closed at the end
            let mut depth = 0i32;
            for (i, tok) in toks.iter().enumerate() {
                match tok.kind {
                    TokenKind::LeftParen => depth += 1,
                    TokenKind::RightParen => {
                        depth -= 1;
                        if depth == 0 && i != toks.len() - 1 {
                            wrapped = false;
                        }
                    }
                    _ => {}
                }
            }
        }

        if wrapped {
            Ok(Operand {
                toks,
                indirect: true,
                inner: &toks[1..toks.len() - 1],
            })
        } else {
            Ok(Operand {
                toks,
                indirect: false,
                inner: toks,
            })
        }
    }

    pub fn is_indirect(&self) -> bool {
        self.indirect
    }

    fn single(&self) -> Option<&'t Token> {
        if !self.indirect && self.toks.len() == 1 {
            self.toks.first()
        } else {
            None
        }
    }

    fn single_inner(&self) -> Option<&'t Token> {
        if self.indirect && self.inner.len() == 1 {
            self.inner.first()
        } else {
            None
        }
    }

    /// The name of a bare register token, if that is what this operand is.
    pub fn reg_name(&self) -> Option<&'t str> {
        self.single()
            .filter(|t| t.kind == TokenKind::Register)
            .map(|t| t.text.as_str())
    }

    pub fn reg8(&self) -> Option<Reg8> {
        self.reg_name()?.parse().ok()
    }

    pub fn reg16(&self) -> Option<Reg16> {
        let name = self.reg_name()?;
        if name == "PSW" {
            return Some(Reg16::AF);
        }
        name.parse().ok()
    }

    pub fn cond(&self) -> Option<Cond> {
        self.reg_name()?.parse().ok()
    }

    pub fn index_half(&self) -> Option<(Prefix, Reg8)> {
        index_half(self.reg_name()?)
    }

    /// 8080 register-pair spellings: single letters name the pair, and
    /// `PSW` is AF.
    pub fn pair8080(&self) -> Option<Reg16> {
        match self.reg_name()? {
            "B" | "BC" => Some(Reg16::BC),
            "D" | "DE" => Some(Reg16::DE),
            "H" | "HL" => Some(Reg16::HL),
            "SP" => Some(Reg16::SP),
            "PSW" | "AF" => Some(Reg16::AF),
            _ => None,
        }
    }

    /// `(BC)`, `(HL)`, `(SP)` — memory through a register pair.
    pub fn indirect_reg16(&self) -> Option<Reg16> {
        self.single_inner()
            .filter(|t| t.kind == TokenKind::Register)?
            .text
            .parse()
            .ok()
    }

    /// `(C)` — the I/O-port register operand.
    pub fn indirect_reg8(&self) -> Option<Reg8> {
        self.single_inner()
            .filter(|t| t.kind == TokenKind::Register)?
            .text
            .parse()
            .ok()
    }

    /// `(IX...)` / `(IY...)`: the prefix plus the displacement tokens
    /// (empty for plain `(IX)`).
    pub fn index(&self) -> Option<(Prefix, &'t [Token])> {
        if !self.indirect {
            return None;
        }
        let first = self.inner.first()?;
        if first.kind != TokenKind::Register {
            return None;
        }
        let prefix = match first.text.as_str() {
            "IX" => Prefix::IX,
            "IY" => Prefix::IY,
            _ => return None,
        };
        Some((prefix, &self.inner[1..]))
    }

    /// `(HL+)` — the post-increment load pseudo-operand.
    pub fn hl_inc(&self) -> bool {
        self.indirect
            && self.inner.len() == 2
            && self.inner[0].kind == TokenKind::Register
            && self.inner[0].text == "HL"
            && self.inner[1].kind == TokenKind::Plus
    }

    /// A string literal operand (DB/DEFM data).
    pub fn string(&self) -> Option<&'t str> {
        self.single()
            .filter(|t| t.kind == TokenKind::String)
            .map(|t| t.text.as_str())
    }

    /// The tokens an expression evaluator should see: the operand, or
    /// the body of its parentheses.
    pub fn expr_toks(&self) -> &'t [Token] {
        self.inner
    }

    pub fn eval(&self, symbols: &SymbolTable, pc: u16) -> Option<ExprValue> {
        eval::eval(self.expr_toks(), symbols, pc)
    }

    /// Source-ish rendering for diagnostics.
    pub fn text(&self) -> String {
        self.toks
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::tokenize;

    fn operands(source: &str) -> (Vec<Token>, usize) {
        let tokens = tokenize(source).unwrap();
        let len = tokens.len() - 1; // drop Eof
        (tokens, len)
    }

    #[test]
    fn splits_at_top_level_commas() {
        let (toks, len) = operands("A,(IX+5),'x'");
        let ops = split(&toks[..len]).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].reg8(), Some(Reg8::A));
        assert!(ops[1].is_indirect());
        assert_eq!(ops[2].string(), Some("x"));
    }

    #[test]
    fn contextual_readings() {
        let (toks, len) = operands("C");
        let ops = split(&toks[..len]).unwrap();
        assert_eq!(ops[0].reg8(), Some(Reg8::C));
        assert_eq!(ops[0].cond(), Some(Cond::C));
    }

    #[test]
    fn pair_spellings() {
        let (toks, len) = operands("B,PSW");
        let ops = split(&toks[..len]).unwrap();
        assert_eq!(ops[0].pair8080(), Some(Reg16::BC));
        assert_eq!(ops[1].pair8080(), Some(Reg16::AF));
        assert_eq!(ops[1].reg16(), Some(Reg16::AF));
    }

    #[test]
    fn indexed_operands() {
        let (toks, len) = operands("(IY-3)");
        let ops = split(&toks[..len]).unwrap();
        let (prefix, disp) = ops[0].index().unwrap();
        assert_eq!(prefix, Prefix::IY);
        assert_eq!(disp.len(), 2);

        let (toks, len) = operands("(IX)");
        let ops = split(&toks[..len]).unwrap();
        let (_, disp) = ops[0].index().unwrap();
        assert!(disp.is_empty());
    }

    #[test]
    fn post_increment() {
        let (toks, len) = operands("(HL+)");
        let ops = split(&toks[..len]).unwrap();
        assert!(ops[0].hl_inc());
        assert_eq!(ops[0].index(), None);
    }

    #[test]
    fn missing_operand_is_an_error() {
        let (toks, len) = operands("A,,B");
        assert!(split(&toks[..len]).is_err());
    }
}
