//! Pass 2: per-mnemonic encoders and the emission driver.
//!
//! Every encoder is pure — operands in, `Emit` out — so pass 1 can dry-run
//! the same functions to size instructions, which keeps the two passes
//! agreeing on byte counts by construction. Encoders report failures as
//! `Err(message)`; the driver turns those into diagnostics, emits nothing,
//! and advances the PC by the pass-1 size so later lines keep their
//! addresses.

use byteorder::ByteOrder;
use log::debug;
use matches::debug_assert_matches;
use util::Endian;

use z80::constants::{PREFIX_BIT, PREFIX_EXT};
use z80::{
    add_hl_rr, adc_hl_rr, alu_n, alu_r, bit_r, call_cc, dec_r, dec_rr, im, in_r_c, inc_r, inc_rr,
    jp_cc, jr_cc, ld_mem_rr, ld_r_n, ld_r_r, ld_rr_mem, ld_rr_nn, out_c_r, pop_rr, push_rr,
    ret_cc, rot_r, rst, sbc_hl_rr, AluOp, BitOp, Cond, Prefix, Reg16, Reg8, RotOp,
};

use crate::diag::Diagnostic;
use crate::eval::ExprValue;
use crate::labels::{self, Stmt};
use crate::lexer::{self, Token, TokenKind};
use crate::listing;
use crate::operands::{split, Operand};
use crate::ops::Mnemonic;
use crate::patch::Patch;
use crate::{Context, SymbolTable};

/// Everything one instruction produces: its bytes plus any forward
/// references, with offsets relative to the instruction start.
#[derive(Debug, Default, PartialEq)]
pub struct Emit {
    pub bytes: Vec<u8>,
    pub refs: Vec<ForwardRef>,
}

#[derive(Debug, PartialEq)]
pub struct ForwardRef {
    pub offset: usize,
    pub name: String,
    pub addend: i32,
    pub relative: bool,
}

impl Emit {
    fn of(bytes: &[u8]) -> Emit {
        Emit {
            bytes: bytes.to_vec(),
            refs: Vec::new(),
        }
    }

    fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn push_word(&mut self, value: u16) {
        let mut pair = [0u8; 2];
        Endian::write_u16(&mut pair, value);
        self.bytes.extend_from_slice(&pair);
    }

    /// Emit a 16-bit operand, recording a patch when the value is a
    /// forward reference.
    fn word_operand(&mut self, value: ExprValue) {
        match value {
            ExprValue::Known(v) => self.push_word(v),
            ExprValue::Forward { name, addend } => {
                self.refs.push(ForwardRef {
                    offset: self.bytes.len(),
                    name,
                    addend,
                    relative: false,
                });
                self.push_word(0);
            }
        }
    }
}

type EncodeResult = Result<Emit, String>;

/// Evaluation context for one instruction.
pub struct Cx<'a> {
    pub symbols: &'a SymbolTable,
    pub pc: u16,
}

fn imp(ops: &[Operand], bytes: &[u8]) -> EncodeResult {
    if !ops.is_empty() {
        return Err("Unexpected operand".to_string());
    }
    Ok(Emit::of(bytes))
}

fn arity(ops: &[Operand], n: usize) -> Result<(), String> {
    if ops.len() == n {
        Ok(())
    } else {
        Err(format!("Expected {} operand(s), found {}", n, ops.len()))
    }
}

/// 8-bit immediate. These slots cannot be patched after the fact, so an
/// unresolved name propagates as zero.
fn byte_value(op: &Operand, cx: &Cx) -> Result<u8, String> {
    match op.eval(cx.symbols, cx.pc) {
        Some(ExprValue::Known(v)) => Ok(v as u8),
        Some(ExprValue::Forward { .. }) => Ok(0),
        None => Err(format!("Invalid operand '{}'", op.text())),
    }
}

fn word_value(op: &Operand, cx: &Cx) -> Result<ExprValue, String> {
    op.eval(cx.symbols, cx.pc)
        .ok_or_else(|| format!("Invalid operand '{}'", op.text()))
}

/// A value that has to be known right now (bit numbers, RST vectors,
/// DS counts, IM modes).
fn known_value(op: &Operand, cx: &Cx) -> Result<u16, String> {
    match op.eval(cx.symbols, cx.pc) {
        Some(ExprValue::Known(v)) => Ok(v),
        Some(ExprValue::Forward { name, .. }) => Err(format!("Undefined symbol '{}'", name)),
        None => Err(format!("Invalid operand '{}'", op.text())),
    }
}

/// Signed displacement of an `(IX+d)` / `(IY-d)` operand.
fn index_disp(disp: &[Token], cx: &Cx) -> Result<u8, String> {
    if disp.is_empty() {
        return Ok(0);
    }
    let sign: i32 = match disp[0].kind {
        TokenKind::Plus => 1,
        TokenKind::Minus => -1,
        _ => return Err("Invalid index displacement".to_string()),
    };
    let magnitude = match crate::eval::eval(&disp[1..], cx.symbols, cx.pc) {
        Some(ExprValue::Known(v)) => v as i32,
        Some(ExprValue::Forward { .. }) => 0,
        None => return Err("Invalid index displacement".to_string()),
    };
    let d = sign.wrapping_mul(magnitude);
    if d < -128 || d > 127 {
        return Err("Index displacement out of range".to_string());
    }
    Ok(d as i8 as u8)
}

/// The fixed condition carried by the 8080 jump/call/return mnemonics.
fn fixed_cond(m: Mnemonic) -> Option<Cond> {
    use Mnemonic::*;
    Some(match m {
        JC | CC | RC => Cond::C,
        JNC | CNC | RNC => Cond::NC,
        JZ | CZ | RZ => Cond::Z,
        JNZ | CNZ | RNZ => Cond::NZ,
        JM | CM | RM => Cond::M,
        RP => Cond::P,
        JPE | CPE | RPE => Cond::PE,
        JPO | CPO | RPO => Cond::PO,
        _ => return None,
    })
}

/// One ALU operation applied to a value operand: register, `(HL)`,
/// indexed memory, index half or immediate.
fn alu_value(op: AluOp, value: &Operand, cx: &Cx) -> EncodeResult {
    if let Some(r) = value.reg8() {
        return Ok(Emit::of(&[alu_r(op, r)]));
    }
    if let Some((prefix, half)) = value.index_half() {
        return Ok(Emit::of(&[prefix.byte(), alu_r(op, half)]));
    }
    if value.indirect_reg16() == Some(Reg16::HL) {
        return Ok(Emit::of(&[alu_r(op, Reg8::M)]));
    }
    if let Some((prefix, disp)) = value.index() {
        let d = index_disp(disp, cx)?;
        return Ok(Emit::of(&[prefix.byte(), alu_r(op, Reg8::M), d]));
    }
    let n = byte_value(value, cx)?;
    Ok(Emit::of(&[alu_n(op), n]))
}

/// Dispatch for ADD/ADC/SBC, which also have 16-bit forms.
fn alu_wide(m: Mnemonic, ops: &[Operand], cx: &Cx) -> EncodeResult {
    let op = match m {
        Mnemonic::ADD => AluOp::ADD,
        Mnemonic::ADC => AluOp::ADC,
        _ => AluOp::SBC,
    };
    match ops.len() {
        1 => alu_value(op, &ops[0], cx),
        2 => {
            if ops[0].reg8() == Some(Reg8::A) {
                return alu_value(op, &ops[1], cx);
            }
            match ops[0].reg16() {
                Some(Reg16::HL) => {
                    let rr = ops[1]
                        .reg16()
                        .and_then(Reg16::dd)
                        .ok_or_else(|| format!("Invalid operand combination for {:?}", m))?;
                    match op {
                        AluOp::ADD => Ok(Emit::of(&[add_hl_rr(rr)])),
                        AluOp::ADC => Ok(Emit::of(&[PREFIX_EXT, adc_hl_rr(rr)])),
                        _ => Ok(Emit::of(&[PREFIX_EXT, sbc_hl_rr(rr)])),
                    }
                }
                Some(index @ Reg16::IX) | Some(index @ Reg16::IY) if op == AluOp::ADD => {
                    // ADD IX,rr reuses the HL slot for the index register itself
                    let rr = match ops[1].reg16() {
                        Some(Reg16::BC) => 0,
                        Some(Reg16::DE) => 1,
                        Some(r) if r == index => 2,
                        Some(Reg16::SP) => 3,
                        _ => return Err("Invalid operand combination for ADD".to_string()),
                    };
                    let prefix = if index == Reg16::IX { Prefix::IX } else { Prefix::IY };
                    Ok(Emit::of(&[prefix.byte(), add_hl_rr(rr)]))
                }
                _ => Err(format!("Invalid operand combination for {:?}", m)),
            }
        }
        _ => Err(format!("Expected 1 or 2 operands, found {}", ops.len())),
    }
}

/// SUB/AND/OR/XOR/CP accept the canonical single operand and the
/// spelled-out `A,value` form.
fn alu_narrow(op: AluOp, ops: &[Operand], cx: &Cx) -> EncodeResult {
    match ops.len() {
        1 => alu_value(op, &ops[0], cx),
        2 if ops[0].reg8() == Some(Reg8::A) => alu_value(op, &ops[1], cx),
        _ => Err("Invalid operand combination".to_string()),
    }
}

fn alu_immediate(op: AluOp, ops: &[Operand], cx: &Cx) -> EncodeResult {
    arity(ops, 1)?;
    let n = byte_value(&ops[0], cx)?;
    Ok(Emit::of(&[alu_n(op), n]))
}

fn inc_dec(ops: &[Operand], cx: &Cx, dec: bool) -> EncodeResult {
    arity(ops, 1)?;
    let op = &ops[0];
    let one = if dec { dec_r } else { inc_r };
    let wide = if dec { dec_rr } else { inc_rr };

    if let Some(r) = op.reg8() {
        return Ok(Emit::of(&[one(r)]));
    }
    if let Some((prefix, half)) = op.index_half() {
        return Ok(Emit::of(&[prefix.byte(), one(half)]));
    }
    if let Some(rr) = op.reg16() {
        return match rr {
            Reg16::IX => Ok(Emit::of(&[Prefix::IX.byte(), wide(2)])),
            Reg16::IY => Ok(Emit::of(&[Prefix::IY.byte(), wide(2)])),
            _ => rr
                .dd()
                .map(|code| Emit::of(&[wide(code)]))
                .ok_or_else(|| "Invalid register".to_string()),
        };
    }
    if op.indirect_reg16() == Some(Reg16::HL) {
        return Ok(Emit::of(&[one(Reg8::M)]));
    }
    if let Some((prefix, disp)) = op.index() {
        let d = index_disp(disp, cx)?;
        return Ok(Emit::of(&[prefix.byte(), one(Reg8::M), d]));
    }
    Err(format!("Invalid operand '{}'", op.text()))
}

fn rotate(op: RotOp, ops: &[Operand], cx: &Cx) -> EncodeResult {
    arity(ops, 1)?;
    let target = &ops[0];
    if let Some(r) = target.reg8() {
        return Ok(Emit::of(&[PREFIX_BIT, rot_r(op, r)]));
    }
    if target.indirect_reg16() == Some(Reg16::HL) {
        return Ok(Emit::of(&[PREFIX_BIT, rot_r(op, Reg8::M)]));
    }
    if let Some((prefix, disp)) = target.index() {
        let d = index_disp(disp, cx)?;
        return Ok(Emit::of(&[prefix.byte(), PREFIX_BIT, d, rot_r(op, Reg8::M)]));
    }
    Err(format!("Invalid operand '{}'", target.text()))
}

fn bit_family(op: BitOp, ops: &[Operand], cx: &Cx) -> EncodeResult {
    arity(ops, 2)?;
    let bit = known_value(&ops[0], cx)?;
    if bit > 7 {
        return Err("Invalid bit number".to_string());
    }
    let bit = bit as u8;
    let target = &ops[1];
    if let Some(r) = target.reg8() {
        return Ok(Emit::of(&[PREFIX_BIT, bit_r(op, bit, r)]));
    }
    if target.indirect_reg16() == Some(Reg16::HL) {
        return Ok(Emit::of(&[PREFIX_BIT, bit_r(op, bit, Reg8::M)]));
    }
    if let Some((prefix, disp)) = target.index() {
        let d = index_disp(disp, cx)?;
        return Ok(Emit::of(&[
            prefix.byte(),
            PREFIX_BIT,
            d,
            bit_r(op, bit, Reg8::M),
        ]));
    }
    Err(format!("Invalid operand '{}'", target.text()))
}

/// JR/DJNZ body: a one-byte opcode plus a signed displacement relative
/// to the byte after the instruction. Forward targets become relative
/// patches; everything else is range-checked immediately.
fn relative(base: u8, target: &Operand, cx: &Cx) -> EncodeResult {
    let mut emit = Emit::of(&[base]);
    match word_value(target, cx)? {
        ExprValue::Known(v) => {
            let rel = v as i32 - (cx.pc as i32 + 2);
            if rel < -128 || rel > 127 {
                return Err(format!(
                    "Relative jump to '{}' out of range",
                    target.text()
                ));
            }
            emit.push(rel as i8 as u8);
        }
        ExprValue::Forward { name, addend } => {
            emit.refs.push(ForwardRef {
                offset: 1,
                name,
                addend,
                relative: true,
            });
            emit.push(0);
        }
    }
    Ok(emit)
}

fn absolute(base: &[u8], target: &Operand, cx: &Cx) -> EncodeResult {
    let mut emit = Emit::of(base);
    emit.word_operand(word_value(target, cx)?);
    Ok(emit)
}

fn push_pop(ops: &[Operand], push: bool) -> EncodeResult {
    arity(ops, 1)?;
    let builder = if push { push_rr } else { pop_rr };
    let rr = ops[0]
        .reg16()
        .or_else(|| ops[0].pair8080())
        .ok_or_else(|| format!("Invalid operand '{}'", ops[0].text()))?;
    match rr {
        Reg16::IX => Ok(Emit::of(&[Prefix::IX.byte(), builder(2)])),
        Reg16::IY => Ok(Emit::of(&[Prefix::IY.byte(), builder(2)])),
        _ => rr
            .qq()
            .map(|code| Emit::of(&[builder(code)]))
            .ok_or_else(|| "Invalid register pair".to_string()),
    }
}

fn pair_halves(rr: Reg16) -> Option<(Reg8, Reg8)> {
    match rr {
        Reg16::BC => Some((Reg8::B, Reg8::C)),
        Reg16::DE => Some((Reg8::D, Reg8::E)),
        Reg16::HL => Some((Reg8::H, Reg8::L)),
        _ => None,
    }
}

fn ld(ops: &[Operand], cx: &Cx) -> EncodeResult {
    arity(ops, 2)?;
    let (dst, src) = (&ops[0], &ops[1]);
    let invalid = || "Invalid operand combination for LD".to_string();

    // interrupt-vector and refresh registers pair only with A
    if let Some(name) = dst.reg_name() {
        if name == "I" || name == "R" {
            if src.reg8() == Some(Reg8::A) {
                let opcode = if name == "I" { 0x47 } else { 0x4F };
                return Ok(Emit::of(&[PREFIX_EXT, opcode]));
            }
            return Err(invalid());
        }
    }
    if let Some(name) = src.reg_name() {
        if name == "I" || name == "R" {
            if dst.reg8() == Some(Reg8::A) {
                let opcode = if name == "I" { 0x57 } else { 0x5F };
                return Ok(Emit::of(&[PREFIX_EXT, opcode]));
            }
            return Err(invalid());
        }
    }

    // 8-bit destination register (M is the (HL) slot)
    if let Some(d) = dst.reg8() {
        if let Some(s) = src.reg8() {
            if d == Reg8::M && s == Reg8::M {
                // that encoding is HALT
                return Err(invalid());
            }
            return Ok(Emit::of(&[ld_r_r(d, s)]));
        }
        if let Some((prefix, half)) = src.index_half() {
            if matches!(d, Reg8::H | Reg8::L | Reg8::M) {
                return Err(invalid());
            }
            return Ok(Emit::of(&[prefix.byte(), ld_r_r(d, half)]));
        }
        if src.hl_inc() {
            // LD r,(HL+)  =>  LD r,(HL) ; INC HL
            return Ok(Emit::of(&[ld_r_r(d, Reg8::M), 0x23]));
        }
        if let Some(rr) = src.indirect_reg16() {
            return match rr {
                Reg16::HL => Ok(Emit::of(&[ld_r_r(d, Reg8::M)])),
                Reg16::BC if d == Reg8::A => Ok(Emit::of(&[0x0A])),
                Reg16::DE if d == Reg8::A => Ok(Emit::of(&[0x1A])),
                _ => Err(invalid()),
            };
        }
        if let Some((prefix, disp)) = src.index() {
            let dd = index_disp(disp, cx)?;
            return Ok(Emit::of(&[prefix.byte(), ld_r_r(d, Reg8::M), dd]));
        }
        if src.is_indirect() {
            if d != Reg8::A {
                return Err(invalid());
            }
            return absolute(&[0x3A], src, cx);
        }
        let n = byte_value(src, cx)?;
        return Ok(Emit::of(&[ld_r_n(d), n]));
    }

    // index-half destination
    if let Some((prefix, half)) = dst.index_half() {
        if let Some(s) = src.reg8() {
            if matches!(s, Reg8::H | Reg8::L | Reg8::M) {
                return Err(invalid());
            }
            return Ok(Emit::of(&[prefix.byte(), ld_r_r(half, s)]));
        }
        if let Some((src_prefix, src_half)) = src.index_half() {
            if src_prefix != prefix {
                return Err(invalid());
            }
            return Ok(Emit::of(&[prefix.byte(), ld_r_r(half, src_half)]));
        }
        let n = byte_value(src, cx)?;
        return Ok(Emit::of(&[prefix.byte(), ld_r_n(half), n]));
    }

    // memory destinations through a register pair
    if let Some(rr) = dst.indirect_reg16() {
        return match rr {
            Reg16::HL => {
                if let Some(s) = src.reg8() {
                    if s == Reg8::M {
                        return Err(invalid());
                    }
                    return Ok(Emit::of(&[ld_r_r(Reg8::M, s)]));
                }
                let n = byte_value(src, cx)?;
                Ok(Emit::of(&[ld_r_n(Reg8::M), n]))
            }
            Reg16::BC if src.reg8() == Some(Reg8::A) => Ok(Emit::of(&[0x02])),
            Reg16::DE if src.reg8() == Some(Reg8::A) => Ok(Emit::of(&[0x12])),
            _ => Err(invalid()),
        };
    }

    // indexed memory destination
    if let Some((prefix, disp)) = dst.index() {
        let dd = index_disp(disp, cx)?;
        if let Some(s) = src.reg8() {
            if s == Reg8::M {
                return Err(invalid());
            }
            return Ok(Emit::of(&[prefix.byte(), ld_r_r(Reg8::M, s), dd]));
        }
        // displacement precedes the immediate
        let n = byte_value(src, cx)?;
        return Ok(Emit::of(&[prefix.byte(), ld_r_n(Reg8::M), dd, n]));
    }

    // absolute memory destination: (nn),src
    if dst.is_indirect() {
        let target = word_value(dst, cx)?;
        let mut emit = match src.reg8() {
            Some(Reg8::A) => Emit::of(&[0x32]),
            Some(_) => return Err(invalid()),
            None => match src.reg16() {
                Some(Reg16::HL) => Emit::of(&[0x22]),
                Some(Reg16::IX) => Emit::of(&[Prefix::IX.byte(), 0x22]),
                Some(Reg16::IY) => Emit::of(&[Prefix::IY.byte(), 0x22]),
                Some(rr) => match rr.dd() {
                    Some(code) => Emit::of(&[PREFIX_EXT, ld_mem_rr(code)]),
                    None => return Err(invalid()),
                },
                None => return Err(invalid()),
            },
        };
        emit.word_operand(target);
        return Ok(emit);
    }

    // 16-bit destinations
    if let Some(rr) = dst.reg16() {
        return match rr {
            Reg16::SP => {
                match src.reg16() {
                    Some(Reg16::HL) => return Ok(Emit::of(&[0xF9])),
                    Some(Reg16::IX) => return Ok(Emit::of(&[Prefix::IX.byte(), 0xF9])),
                    Some(Reg16::IY) => return Ok(Emit::of(&[Prefix::IY.byte(), 0xF9])),
                    Some(_) => return Err(invalid()),
                    None => {}
                }
                if src.is_indirect() {
                    if src.indirect_reg16().is_some() || src.index().is_some() {
                        return Err(invalid());
                    }
                    return absolute(&[PREFIX_EXT, ld_rr_mem(3)], src, cx);
                }
                absolute(&[ld_rr_nn(3)], src, cx)
            }
            Reg16::BC | Reg16::DE | Reg16::HL => {
                if src.is_indirect() {
                    if src.indirect_reg16().is_some() || src.index().is_some() {
                        return Err(invalid());
                    }
                    return match rr {
                        Reg16::HL => absolute(&[0x2A], src, cx),
                        _ => {
                            let code = rr.dd().expect("BC/DE have dd codes");
                            absolute(&[PREFIX_EXT, ld_rr_mem(code)], src, cx)
                        }
                    };
                }
                if let Some(s) = src.reg16() {
                    // no single opcode moves pair to pair; split into the
                    // two 8-bit loads, high halves first
                    let (dh, dl) = pair_halves(rr).ok_or_else(invalid)?;
                    let (sh, sl) = pair_halves(s).ok_or_else(invalid)?;
                    return Ok(Emit::of(&[ld_r_r(dh, sh), ld_r_r(dl, sl)]));
                }
                let code = rr.dd().expect("BC/DE/HL have dd codes");
                absolute(&[ld_rr_nn(code)], src, cx)
            }
            Reg16::IX | Reg16::IY => {
                let prefix = if rr == Reg16::IX { Prefix::IX } else { Prefix::IY };
                if src.is_indirect() {
                    if src.indirect_reg16().is_some() || src.index().is_some() {
                        return Err(invalid());
                    }
                    return absolute(&[prefix.byte(), 0x2A], src, cx);
                }
                if src.reg16().is_some() {
                    return Err(invalid());
                }
                absolute(&[prefix.byte(), 0x21], src, cx)
            }
            _ => Err(invalid()),
        };
    }

    Err(invalid())
}

fn jump(ops: &[Operand], cx: &Cx) -> EncodeResult {
    match ops.len() {
        1 => {
            if ops[0].indirect_reg16() == Some(Reg16::HL) {
                return Ok(Emit::of(&[0xE9]));
            }
            if let Some((prefix, disp)) = ops[0].index() {
                if !disp.is_empty() {
                    return Err("Invalid operand for JP".to_string());
                }
                return Ok(Emit::of(&[prefix.byte(), 0xE9]));
            }
            absolute(&[0xC3], &ops[0], cx)
        }
        2 => {
            let cc = ops[0]
                .cond()
                .ok_or_else(|| format!("Invalid condition code '{}'", ops[0].text()))?;
            absolute(&[jp_cc(cc)], &ops[1], cx)
        }
        _ => Err(format!("Expected 1 or 2 operands, found {}", ops.len())),
    }
}

fn call(ops: &[Operand], cx: &Cx) -> EncodeResult {
    match ops.len() {
        1 => absolute(&[0xCD], &ops[0], cx),
        2 => {
            let cc = ops[0]
                .cond()
                .ok_or_else(|| format!("Invalid condition code '{}'", ops[0].text()))?;
            absolute(&[call_cc(cc)], &ops[1], cx)
        }
        _ => Err(format!("Expected 1 or 2 operands, found {}", ops.len())),
    }
}

fn input(ops: &[Operand], cx: &Cx) -> EncodeResult {
    match ops.len() {
        // 8080 form: IN n
        1 => {
            let n = byte_value(&ops[0], cx)?;
            Ok(Emit::of(&[0xDB, n]))
        }
        2 => {
            if ops[1].indirect_reg8() == Some(Reg8::C) {
                let r = ops[0]
                    .reg8()
                    .ok_or_else(|| format!("Invalid operand '{}'", ops[0].text()))?;
                return Ok(Emit::of(&[PREFIX_EXT, in_r_c(r)]));
            }
            if ops[0].reg8() == Some(Reg8::A) && ops[1].is_indirect() {
                let n = byte_value(&ops[1], cx)?;
                return Ok(Emit::of(&[0xDB, n]));
            }
            Err("Invalid operand combination for IN".to_string())
        }
        _ => Err(format!("Expected 1 or 2 operands, found {}", ops.len())),
    }
}

fn output(ops: &[Operand], cx: &Cx) -> EncodeResult {
    match ops.len() {
        // 8080 form: OUT n
        1 => {
            let n = byte_value(&ops[0], cx)?;
            Ok(Emit::of(&[0xD3, n]))
        }
        2 => {
            if ops[0].indirect_reg8() == Some(Reg8::C) {
                let r = ops[1]
                    .reg8()
                    .ok_or_else(|| format!("Invalid operand '{}'", ops[1].text()))?;
                return Ok(Emit::of(&[PREFIX_EXT, out_c_r(r)]));
            }
            if ops[1].reg8() == Some(Reg8::A) && ops[0].is_indirect() {
                let n = byte_value(&ops[0], cx)?;
                return Ok(Emit::of(&[0xD3, n]));
            }
            Err("Invalid operand combination for OUT".to_string())
        }
        _ => Err(format!("Expected 1 or 2 operands, found {}", ops.len())),
    }
}

fn exchange(ops: &[Operand]) -> EncodeResult {
    arity(ops, 2)?;
    if ops[0].reg16() == Some(Reg16::DE) && ops[1].reg16() == Some(Reg16::HL) {
        return Ok(Emit::of(&[0xEB]));
    }
    if ops[0].reg16() == Some(Reg16::AF) && ops[1].reg16() == Some(Reg16::AFP) {
        return Ok(Emit::of(&[0x08]));
    }
    if ops[0].indirect_reg16() == Some(Reg16::SP) {
        return match ops[1].reg16() {
            Some(Reg16::HL) => Ok(Emit::of(&[0xE3])),
            Some(Reg16::IX) => Ok(Emit::of(&[Prefix::IX.byte(), 0xE3])),
            Some(Reg16::IY) => Ok(Emit::of(&[Prefix::IY.byte(), 0xE3])),
            _ => Err("Invalid operand combination for EX".to_string()),
        };
    }
    Err("Invalid operand combination for EX".to_string())
}

fn data_bytes(ops: &[Operand], cx: &Cx) -> EncodeResult {
    if ops.is_empty() {
        return Err("Expected at least one value".to_string());
    }
    let mut emit = Emit::default();
    for op in ops {
        if let Some(s) = op.string() {
            emit.bytes.extend(s.bytes());
        } else {
            let n = byte_value(op, cx)?;
            emit.push(n);
        }
    }
    Ok(emit)
}

fn data_words(ops: &[Operand], cx: &Cx) -> EncodeResult {
    if ops.is_empty() {
        return Err("Expected at least one value".to_string());
    }
    let mut emit = Emit::default();
    for op in ops {
        let value = word_value(op, cx)?;
        emit.word_operand(value);
    }
    Ok(emit)
}

fn data_space(ops: &[Operand], cx: &Cx) -> EncodeResult {
    if ops.is_empty() || ops.len() > 2 {
        return Err(format!("Expected 1 or 2 operands, found {}", ops.len()));
    }
    let count = known_value(&ops[0], cx)? as usize;
    let fill = match ops.get(1) {
        Some(op) => byte_value(op, cx)?,
        None => 0,
    };
    Ok(Emit {
        bytes: vec![fill; count],
        refs: Vec::new(),
    })
}

/// Encode one instruction or data directive. Assembler-state directives
/// (ORG, EQU, DEFC, END) are the drivers' business and never reach this
/// function; the linker-oriented ones are accepted and emit nothing.
pub fn encode_op(m: Mnemonic, args: &[Token], cx: &Cx) -> EncodeResult {
    use Mnemonic::*;
    let ops = split(args)?;

    match m {
        NOP => imp(&ops, &[0x00]),
        HALT | HLT => imp(&ops, &[0x76]),
        DI => imp(&ops, &[0xF3]),
        EI => imp(&ops, &[0xFB]),
        EXX => imp(&ops, &[0xD9]),
        RLCA => imp(&ops, &[0x07]),
        RRCA => imp(&ops, &[0x0F]),
        RLA | RAL => imp(&ops, &[0x17]),
        RRA | RAR => imp(&ops, &[0x1F]),
        DAA => imp(&ops, &[0x27]),
        CPL | CMA => imp(&ops, &[0x2F]),
        SCF | STC => imp(&ops, &[0x37]),
        CCF | CMC => imp(&ops, &[0x3F]),
        XCHG => imp(&ops, &[0xEB]),
        PCHL => imp(&ops, &[0xE9]),
        SPHL => imp(&ops, &[0xF9]),
        XTHL => imp(&ops, &[0xE3]),

        NEG => imp(&ops, &[PREFIX_EXT, 0x44]),
        RETI => imp(&ops, &[PREFIX_EXT, 0x4D]),
        RETN => imp(&ops, &[PREFIX_EXT, 0x45]),
        RLD => imp(&ops, &[PREFIX_EXT, 0x6F]),
        RRD => imp(&ops, &[PREFIX_EXT, 0x67]),
        LDI => imp(&ops, &[PREFIX_EXT, 0xA0]),
        INI => imp(&ops, &[PREFIX_EXT, 0xA2]),
        OUTI => imp(&ops, &[PREFIX_EXT, 0xA3]),
        LDD => imp(&ops, &[PREFIX_EXT, 0xA8]),
        CPD => imp(&ops, &[PREFIX_EXT, 0xA9]),
        IND => imp(&ops, &[PREFIX_EXT, 0xAA]),
        OUTD => imp(&ops, &[PREFIX_EXT, 0xAB]),
        LDIR => imp(&ops, &[PREFIX_EXT, 0xB0]),
        CPIR => imp(&ops, &[PREFIX_EXT, 0xB1]),
        INIR => imp(&ops, &[PREFIX_EXT, 0xB2]),
        OTIR => imp(&ops, &[PREFIX_EXT, 0xB3]),
        LDDR => imp(&ops, &[PREFIX_EXT, 0xB8]),
        CPDR => imp(&ops, &[PREFIX_EXT, 0xB9]),
        INDR => imp(&ops, &[PREFIX_EXT, 0xBA]),
        OTDR => imp(&ops, &[PREFIX_EXT, 0xBB]),

        // Z80 block compare without operands, 8080 compare-immediate with one
        CPI => {
            if ops.is_empty() {
                Ok(Emit::of(&[PREFIX_EXT, 0xA1]))
            } else {
                alu_immediate(AluOp::CP, &ops, cx)
            }
        }

        IM => {
            arity(&ops, 1)?;
            let mode = known_value(&ops[0], cx)?;
            let opcode = im(mode as u8).ok_or_else(|| "Invalid interrupt mode".to_string())?;
            Ok(Emit::of(&[PREFIX_EXT, opcode]))
        }

        INC | INR => inc_dec(&ops, cx, false),
        DEC | DCR => inc_dec(&ops, cx, true),
        INX => {
            arity(&ops, 1)?;
            let rr = ops[0]
                .pair8080()
                .and_then(Reg16::dd)
                .ok_or_else(|| "Invalid register pair for INX".to_string())?;
            Ok(Emit::of(&[inc_rr(rr)]))
        }
        DCX => {
            arity(&ops, 1)?;
            let rr = ops[0]
                .pair8080()
                .and_then(Reg16::dd)
                .ok_or_else(|| "Invalid register pair for DCX".to_string())?;
            Ok(Emit::of(&[dec_rr(rr)]))
        }
        DAD => {
            arity(&ops, 1)?;
            let rr = ops[0]
                .pair8080()
                .and_then(Reg16::dd)
                .ok_or_else(|| "Invalid register pair for DAD".to_string())?;
            Ok(Emit::of(&[add_hl_rr(rr)]))
        }

        ADD | ADC | SBC => alu_wide(m, &ops, cx),
        SUB => alu_narrow(AluOp::SUB, &ops, cx),
        AND => alu_narrow(AluOp::AND, &ops, cx),
        OR => alu_narrow(AluOp::OR, &ops, cx),
        XOR => alu_narrow(AluOp::XOR, &ops, cx),
        CP => alu_narrow(AluOp::CP, &ops, cx),
        SBB => alu_narrow(AluOp::SBC, &ops, cx),
        ANA => alu_narrow(AluOp::AND, &ops, cx),
        XRA => alu_narrow(AluOp::XOR, &ops, cx),
        ORA => alu_narrow(AluOp::OR, &ops, cx),
        CMP => alu_narrow(AluOp::CP, &ops, cx),
        ADI => alu_immediate(AluOp::ADD, &ops, cx),
        ACI => alu_immediate(AluOp::ADC, &ops, cx),
        SUI => alu_immediate(AluOp::SUB, &ops, cx),
        SBI => alu_immediate(AluOp::SBC, &ops, cx),
        ANI => alu_immediate(AluOp::AND, &ops, cx),
        XRI => alu_immediate(AluOp::XOR, &ops, cx),
        ORI => alu_immediate(AluOp::OR, &ops, cx),

        // bare RLC/RRC are the 8080 accumulator rotates
        RLC => {
            if ops.is_empty() {
                Ok(Emit::of(&[0x07]))
            } else {
                rotate(RotOp::RLC, &ops, cx)
            }
        }
        RRC => {
            if ops.is_empty() {
                Ok(Emit::of(&[0x0F]))
            } else {
                rotate(RotOp::RRC, &ops, cx)
            }
        }
        RL => rotate(RotOp::RL, &ops, cx),
        RR => rotate(RotOp::RR, &ops, cx),
        SLA => rotate(RotOp::SLA, &ops, cx),
        SRA => rotate(RotOp::SRA, &ops, cx),
        SLL => rotate(RotOp::SLL, &ops, cx),
        SRL => rotate(RotOp::SRL, &ops, cx),

        BIT => bit_family(BitOp::BIT, &ops, cx),
        RES => bit_family(BitOp::RES, &ops, cx),
        SET => bit_family(BitOp::SET, &ops, cx),

        LD => ld(&ops, cx),
        MOV => {
            arity(&ops, 2)?;
            let d = ops[0]
                .reg8()
                .ok_or_else(|| format!("Invalid operand '{}'", ops[0].text()))?;
            let s = ops[1]
                .reg8()
                .ok_or_else(|| format!("Invalid operand '{}'", ops[1].text()))?;
            if d == Reg8::M && s == Reg8::M {
                return Err("Invalid operand combination for MOV".to_string());
            }
            Ok(Emit::of(&[ld_r_r(d, s)]))
        }
        MVI => {
            arity(&ops, 2)?;
            let r = ops[0]
                .reg8()
                .ok_or_else(|| format!("Invalid operand '{}'", ops[0].text()))?;
            let n = byte_value(&ops[1], cx)?;
            Ok(Emit::of(&[ld_r_n(r), n]))
        }
        LXI => {
            arity(&ops, 2)?;
            let rr = ops[0]
                .pair8080()
                .and_then(Reg16::dd)
                .ok_or_else(|| "Invalid register pair for LXI".to_string())?;
            absolute(&[ld_rr_nn(rr)], &ops[1], cx)
        }
        LDA => {
            arity(&ops, 1)?;
            absolute(&[0x3A], &ops[0], cx)
        }
        STA => {
            arity(&ops, 1)?;
            absolute(&[0x32], &ops[0], cx)
        }
        LHLD => {
            arity(&ops, 1)?;
            absolute(&[0x2A], &ops[0], cx)
        }
        SHLD => {
            arity(&ops, 1)?;
            absolute(&[0x22], &ops[0], cx)
        }
        LDAX => {
            arity(&ops, 1)?;
            match ops[0].pair8080() {
                Some(Reg16::BC) => Ok(Emit::of(&[0x0A])),
                Some(Reg16::DE) => Ok(Emit::of(&[0x1A])),
                _ => Err("Invalid register pair for LDAX".to_string()),
            }
        }
        STAX => {
            arity(&ops, 1)?;
            match ops[0].pair8080() {
                Some(Reg16::BC) => Ok(Emit::of(&[0x02])),
                Some(Reg16::DE) => Ok(Emit::of(&[0x12])),
                _ => Err("Invalid register pair for STAX".to_string()),
            }
        }

        PUSH => push_pop(&ops, true),
        POP => push_pop(&ops, false),
        EX => exchange(&ops),

        JP => jump(&ops, cx),
        JMP => {
            arity(&ops, 1)?;
            absolute(&[0xC3], &ops[0], cx)
        }
        JR => match ops.len() {
            1 => relative(0x18, &ops[0], cx),
            2 => {
                let cc = ops[0]
                    .cond()
                    .and_then(jr_cc)
                    .ok_or_else(|| format!("Invalid condition code '{}' for JR", ops[0].text()))?;
                relative(cc, &ops[1], cx)
            }
            _ => Err(format!("Expected 1 or 2 operands, found {}", ops.len())),
        },
        DJNZ => {
            arity(&ops, 1)?;
            relative(0x10, &ops[0], cx)
        }
        CALL => call(&ops, cx),
        RET => match ops.len() {
            0 => Ok(Emit::of(&[0xC9])),
            1 => {
                let cc = ops[0]
                    .cond()
                    .ok_or_else(|| format!("Invalid condition code '{}'", ops[0].text()))?;
                Ok(Emit::of(&[ret_cc(cc)]))
            }
            _ => Err(format!("Expected 0 or 1 operand(s), found {}", ops.len())),
        },
        JC | JNC | JZ | JNZ | JM | JPE | JPO => {
            arity(&ops, 1)?;
            let cc = fixed_cond(m).expect("8080 jumps carry a condition");
            absolute(&[jp_cc(cc)], &ops[0], cx)
        }
        CC | CNC | CZ | CNZ | CM | CPE | CPO => {
            arity(&ops, 1)?;
            let cc = fixed_cond(m).expect("8080 calls carry a condition");
            absolute(&[call_cc(cc)], &ops[0], cx)
        }
        RC | RNC | RZ | RNZ | RM | RP | RPE | RPO => {
            let cc = fixed_cond(m).expect("8080 returns carry a condition");
            imp(&ops, &[ret_cc(cc)])
        }
        RST => {
            arity(&ops, 1)?;
            let n = known_value(&ops[0], cx)?;
            // small arguments are 8080-style vector numbers
            let vector = if n < 8 { n * 8 } else { n };
            Ok(Emit::of(&[rst(vector as u8)]))
        }

        IN => input(&ops, cx),
        OUT => output(&ops, cx),

        DB | DEFB | DEFM => data_bytes(&ops, cx),
        DW | DEFW => data_words(&ops, cx),
        DS | DEFS => data_space(&ops, cx),

        // tokenised and ignored: no linker, no conditional assembly
        INCLUDE | PUBLIC | EXTERN | GLOBAL | MODULE | SECTION | IF | ELSE | ENDIF | TITLE
        | PAGE | EJECT | NAME | MACLIB => Ok(Emit::default()),

        EQU => Err("EQU requires a name".to_string()),
        ORG | DEFC | END => Ok(Emit::default()),
    }
}

/// Pass 2 driver: emit bytes, bind constants, build the listing, record
/// patches for the resolver.
pub(crate) fn run(ctx: &mut Context, tokens: &[Token], source: &str) {
    let src_lines: Vec<&str> = source.lines().collect();

    for line_toks in lexer::logical_lines(tokens) {
        let line = labels::parse_line(line_toks);
        for label in &line.labels {
            labels::rebind(&mut ctx.symbols, label, ctx.pc);
        }
        let source_text = src_lines
            .get(line.number.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("");

        match line.stmt {
            Stmt::Empty | Stmt::Ignored => {}
            Stmt::Equate { name, expr } => {
                match crate::eval::eval(expr, &ctx.symbols, ctx.pc) {
                    Some(ExprValue::Known(value)) => {
                        labels::rebind(&mut ctx.symbols, name, value);
                    }
                    Some(ExprValue::Forward { name: missing, .. }) => {
                        ctx.errors.push(Diagnostic::error(
                            line.number,
                            format!("Undefined symbol '{}'", missing),
                        ));
                    }
                    None => {
                        ctx.errors.push(Diagnostic::error(
                            line.number,
                            format!("Invalid expression for '{}'", name.text),
                        ));
                    }
                }
            }
            Stmt::Unknown { token } => {
                let message = if token.kind == TokenKind::Identifier {
                    format!("Unknown mnemonic '{}'", token.text)
                } else {
                    format!("Unexpected token '{}'", token.text)
                };
                ctx.errors.push(Diagnostic::error(line.number, message));
                let estimate = ctx.line_sizes.get(&line.number).copied().unwrap_or(0);
                ctx.pc = ctx.pc.wrapping_add(estimate);
            }
            Stmt::Op {
                mnemonic,
                token,
                args,
            } => {
                debug_assert_matches!(token.kind, TokenKind::Mnemonic);
                match mnemonic {
                    Mnemonic::ORG => {
                        match crate::eval::eval(args, &ctx.symbols, ctx.pc) {
                            Some(ExprValue::Known(value)) => {
                                ctx.set_origin(value);
                                ctx.listing
                                    .push(listing::format_line(value, &[], source_text));
                            }
                            _ => ctx.errors.push(Diagnostic::error(
                                line.number,
                                "Invalid ORG operand".to_string(),
                            )),
                        }
                    }
                    Mnemonic::END => break,
                    Mnemonic::DEFC => match labels::defc_parts(args) {
                        Some((name, expr)) => {
                            match crate::eval::eval(expr, &ctx.symbols, ctx.pc) {
                                Some(ExprValue::Known(value)) => {
                                    labels::rebind(&mut ctx.symbols, name, value);
                                }
                                _ => ctx.errors.push(Diagnostic::error(
                                    line.number,
                                    format!("Invalid expression for '{}'", name.text),
                                )),
                            }
                        }
                        None => ctx.errors.push(Diagnostic::error(
                            line.number,
                            "Expected DEFC name = value".to_string(),
                        )),
                    },
                    _ => {
                        let address = ctx.pc;
                        let cx = Cx {
                            symbols: &ctx.symbols,
                            pc: ctx.pc,
                        };
                        match encode_op(mnemonic, args, &cx) {
                            Ok(emit) => {
                                if let Some(&expected) = ctx.line_sizes.get(&line.number) {
                                    if expected as usize != emit.bytes.len() {
                                        ctx.errors.push(Diagnostic::error(
                                            line.number,
                                            "Phase error: size changed between passes"
                                                .to_string(),
                                        ));
                                    }
                                }
                                for fref in emit.refs {
                                    ctx.patches.push(Patch {
                                        offset: ctx.buffer.len() + fref.offset,
                                        name: fref.name,
                                        addend: fref.addend,
                                        line: line.number,
                                        relative: fref.relative,
                                    });
                                }
                                ctx.listing.push(listing::format_line(
                                    address,
                                    &emit.bytes,
                                    source_text,
                                ));
                                if !emit.bytes.is_empty() {
                                    ctx.emitted = true;
                                }
                                ctx.pc = ctx.pc.wrapping_add(emit.bytes.len() as u16);
                                ctx.buffer.extend_from_slice(&emit.bytes);
                            }
                            Err(message) => {
                                ctx.errors.push(Diagnostic::error(line.number, message));
                                ctx.listing
                                    .push(listing::format_line(address, &[], source_text));
                                let estimate =
                                    ctx.line_sizes.get(&line.number).copied().unwrap_or(0);
                                ctx.pc = ctx.pc.wrapping_add(estimate);
                            }
                        }
                    }
                }
            }
        }
    }

    debug!(
        "pass 2 emitted {} bytes, {} patches pending",
        ctx.buffer.len(),
        ctx.patches.len()
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::tokenize;

    fn encode(source: &str) -> EncodeResult {
        let tokens = tokenize(source).unwrap();
        let line: Vec<Token> = lexer::logical_lines(&tokens).next().unwrap().to_vec();
        let symbols = SymbolTable::new();
        let cx = Cx {
            symbols: &symbols,
            pc: 0x100,
        };
        match labels::parse_line(&line).stmt {
            Stmt::Op { mnemonic, args, .. } => encode_op(mnemonic, args, &cx),
            other => panic!("not an instruction: {:?}", other),
        }
    }

    fn bytes(source: &str) -> Vec<u8> {
        encode(source).unwrap().bytes
    }

    #[test]
    fn implicit_forms() {
        assert_eq!(bytes(" NOP"), vec![0x00]);
        assert_eq!(bytes(" HALT"), vec![0x76]);
        assert_eq!(bytes(" EXX"), vec![0xD9]);
        assert_eq!(bytes(" NEG"), vec![0xED, 0x44]);
        assert_eq!(bytes(" LDIR"), vec![0xED, 0xB0]);
    }

    #[test]
    fn ld_forms() {
        assert_eq!(bytes(" LD A,B"), vec![0x78]);
        assert_eq!(bytes(" LD B,0x12"), vec![0x06, 0x12]);
        assert_eq!(bytes(" LD A,(HL)"), vec![0x7E]);
        assert_eq!(bytes(" LD (HL),A"), vec![0x77]);
        assert_eq!(bytes(" LD (HL),0x20"), vec![0x36, 0x20]);
        assert_eq!(bytes(" LD A,(BC)"), vec![0x0A]);
        assert_eq!(bytes(" LD (DE),A"), vec![0x12]);
        assert_eq!(bytes(" LD A,(0x1234)"), vec![0x3A, 0x34, 0x12]);
        assert_eq!(bytes(" LD (0x1234),A"), vec![0x32, 0x34, 0x12]);
        assert_eq!(bytes(" LD HL,0x1234"), vec![0x21, 0x34, 0x12]);
        assert_eq!(bytes(" LD HL,(0x1234)"), vec![0x2A, 0x34, 0x12]);
        assert_eq!(bytes(" LD (0x1234),HL"), vec![0x22, 0x34, 0x12]);
        assert_eq!(bytes(" LD BC,(0x1234)"), vec![0xED, 0x4B, 0x34, 0x12]);
        assert_eq!(bytes(" LD (0x1234),SP"), vec![0xED, 0x73, 0x34, 0x12]);
        assert_eq!(bytes(" LD SP,HL"), vec![0xF9]);
        assert_eq!(bytes(" LD SP,IX"), vec![0xDD, 0xF9]);
        assert_eq!(bytes(" LD IX,0x1234"), vec![0xDD, 0x21, 0x34, 0x12]);
        assert_eq!(bytes(" LD IY,(0x1234)"), vec![0xFD, 0x2A, 0x34, 0x12]);
        assert_eq!(bytes(" LD A,I"), vec![0xED, 0x57]);
        assert_eq!(bytes(" LD R,A"), vec![0xED, 0x4F]);
    }

    #[test]
    fn ld_indexed_forms() {
        assert_eq!(bytes(" LD A,(IX+5)"), vec![0xDD, 0x7E, 0x05]);
        assert_eq!(bytes(" LD (IY-3),B"), vec![0xFD, 0x70, 0xFD]);
        assert_eq!(bytes(" LD (IX+1),0x42"), vec![0xDD, 0x36, 0x01, 0x42]);
        assert_eq!(bytes(" LD B,IXH"), vec![0xDD, 0x44]);
        assert_eq!(bytes(" LD IYL,7"), vec![0xFD, 0x2E, 0x07]);
    }

    #[test]
    fn ld_pseudo_forms() {
        // pair-to-pair split, high halves first
        assert_eq!(bytes(" LD DE,HL"), vec![0x54, 0x5D]);
        assert_eq!(bytes(" LD A,(HL+)"), vec![0x7E, 0x23]);
        assert!(encode(" LD AF,BC").is_err());
    }

    #[test]
    fn alu_forms() {
        assert_eq!(bytes(" ADD A,B"), vec![0x80]);
        assert_eq!(bytes(" ADD A,0x10"), vec![0xC6, 0x10]);
        assert_eq!(bytes(" ADD B"), vec![0x80]);
        assert_eq!(bytes(" ADD HL,DE"), vec![0x19]);
        assert_eq!(bytes(" ADD IX,BC"), vec![0xDD, 0x09]);
        assert_eq!(bytes(" ADC HL,BC"), vec![0xED, 0x4A]);
        assert_eq!(bytes(" SBC HL,SP"), vec![0xED, 0x72]);
        assert_eq!(bytes(" SUB (HL)"), vec![0x96]);
        assert_eq!(bytes(" AND 0x0F"), vec![0xE6, 0x0F]);
        assert_eq!(bytes(" XOR A"), vec![0xAF]);
        assert_eq!(bytes(" CP (IX+2)"), vec![0xDD, 0xBE, 0x02]);
    }

    #[test]
    fn inc_dec_forms() {
        assert_eq!(bytes(" INC A"), vec![0x3C]);
        assert_eq!(bytes(" DEC B"), vec![0x05]);
        assert_eq!(bytes(" INC (HL)"), vec![0x34]);
        assert_eq!(bytes(" INC HL"), vec![0x23]);
        assert_eq!(bytes(" DEC SP"), vec![0x3B]);
        assert_eq!(bytes(" INC IX"), vec![0xDD, 0x23]);
        assert_eq!(bytes(" INC (IX+1)"), vec![0xDD, 0x34, 0x01]);
        assert_eq!(bytes(" INC IXL"), vec![0xDD, 0x2C]);
    }

    #[test]
    fn rotate_and_bit_forms() {
        assert_eq!(bytes(" RLC B"), vec![0xCB, 0x00]);
        assert_eq!(bytes(" SRL A"), vec![0xCB, 0x3F]);
        assert_eq!(bytes(" RL (HL)"), vec![0xCB, 0x16]);
        assert_eq!(bytes(" BIT 7,(IX+0)"), vec![0xDD, 0xCB, 0x00, 0x7E]);
        assert_eq!(bytes(" SET 0,A"), vec![0xCB, 0xC7]);
        assert_eq!(bytes(" RES 1,(HL)"), vec![0xCB, 0x8E]);
        assert_eq!(bytes(" SLA (IY+2)"), vec![0xFD, 0xCB, 0x02, 0x26]);
        // bare rotates are the 8080 accumulator forms
        assert_eq!(bytes(" RLC"), vec![0x07]);
        assert_eq!(bytes(" RRC"), vec![0x0F]);
    }

    #[test]
    fn branch_forms() {
        assert_eq!(bytes(" JP 0x1234"), vec![0xC3, 0x34, 0x12]);
        assert_eq!(bytes(" JP NZ,0x1234"), vec![0xC2, 0x34, 0x12]);
        assert_eq!(bytes(" JP (HL)"), vec![0xE9]);
        assert_eq!(bytes(" JP (IX)"), vec![0xDD, 0xE9]);
        assert_eq!(bytes(" CALL 0x0005"), vec![0xCD, 0x05, 0x00]);
        assert_eq!(bytes(" CALL PE,0x0005"), vec![0xEC, 0x05, 0x00]);
        assert_eq!(bytes(" RET"), vec![0xC9]);
        assert_eq!(bytes(" RET NC"), vec![0xD0]);
        assert_eq!(bytes(" RST 0x28"), vec![0xEF]);
        assert_eq!(bytes(" RST 3"), vec![0xDF]);
    }

    #[test]
    fn relative_branches() {
        // backward target: pc = 0x100, JR to 0xFE
        assert_eq!(bytes(" JR 0xFE"), vec![0x18, 0xFC]);
        assert_eq!(bytes(" JR NZ,0x102"), vec![0x20, 0x00]);
        assert_eq!(bytes(" DJNZ 0xFF"), vec![0x10, 0xFD]);
        assert!(encode(" JR 0x300").is_err());
        assert!(encode(" JR PO,0x102").is_err());
    }

    #[test]
    fn forward_references_become_patches() {
        let emit = encode(" JP TARGET").unwrap();
        assert_eq!(emit.bytes, vec![0xC3, 0x00, 0x00]);
        assert_eq!(emit.refs.len(), 1);
        assert_eq!(emit.refs[0].offset, 1);
        assert!(!emit.refs[0].relative);

        let emit = encode(" JR TARGET").unwrap();
        assert_eq!(emit.bytes, vec![0x18, 0x00]);
        assert!(emit.refs[0].relative);
        assert_eq!(emit.refs[0].offset, 1);
    }

    #[test]
    fn io_and_exchange_forms() {
        assert_eq!(bytes(" IN A,(0x10)"), vec![0xDB, 0x10]);
        assert_eq!(bytes(" IN B,(C)"), vec![0xED, 0x40]);
        assert_eq!(bytes(" OUT (0x10),A"), vec![0xD3, 0x10]);
        assert_eq!(bytes(" OUT (C),E"), vec![0xED, 0x59]);
        assert_eq!(bytes(" IN 0x10"), vec![0xDB, 0x10]);
        assert_eq!(bytes(" OUT 0x10"), vec![0xD3, 0x10]);
        assert_eq!(bytes(" EX DE,HL"), vec![0xEB]);
        assert_eq!(bytes(" EX AF,AF'"), vec![0x08]);
        assert_eq!(bytes(" EX (SP),HL"), vec![0xE3]);
        assert_eq!(bytes(" EX (SP),IY"), vec![0xFD, 0xE3]);
    }

    #[test]
    fn stack_forms() {
        assert_eq!(bytes(" PUSH BC"), vec![0xC5]);
        assert_eq!(bytes(" POP AF"), vec![0xF1]);
        assert_eq!(bytes(" PUSH IX"), vec![0xDD, 0xE5]);
        assert_eq!(bytes(" PUSH PSW"), vec![0xF5]);
        assert_eq!(bytes(" PUSH B"), vec![0xC5]);
        assert!(encode(" PUSH SP").is_err());
    }

    #[test]
    fn eighty_eighty_layer() {
        assert_eq!(bytes(" MOV A,B"), vec![0x78]);
        assert_eq!(bytes(" MOV D,E"), vec![0x53]);
        assert_eq!(bytes(" MOV A,M"), vec![0x7E]);
        assert_eq!(bytes(" MVI C,9"), vec![0x0E, 0x09]);
        assert_eq!(bytes(" LXI H,0x1234"), vec![0x21, 0x34, 0x12]);
        assert_eq!(bytes(" LDA 0x1234"), vec![0x3A, 0x34, 0x12]);
        assert_eq!(bytes(" SHLD 0x1234"), vec![0x22, 0x34, 0x12]);
        assert_eq!(bytes(" LDAX D"), vec![0x1A]);
        assert_eq!(bytes(" STAX B"), vec![0x02]);
        assert!(encode(" LDAX H").is_err());
        assert_eq!(bytes(" ADI 0x10"), vec![0xC6, 0x10]);
        assert_eq!(bytes(" CPI 0x10"), vec![0xFE, 0x10]);
        assert_eq!(bytes(" CPI"), vec![0xED, 0xA1]);
        assert_eq!(bytes(" ANA B"), vec![0xA0]);
        assert_eq!(bytes(" SBB M"), vec![0x9E]);
        assert_eq!(bytes(" INR M"), vec![0x34]);
        assert_eq!(bytes(" INX D"), vec![0x13]);
        assert_eq!(bytes(" DAD SP"), vec![0x39]);
        assert_eq!(bytes(" JMP 0x1234"), vec![0xC3, 0x34, 0x12]);
        assert_eq!(bytes(" JC 0x1234"), vec![0xDA, 0x34, 0x12]);
        assert_eq!(bytes(" CNZ 0x1234"), vec![0xC4, 0x34, 0x12]);
        assert_eq!(bytes(" RPO"), vec![0xE0]);
        assert_eq!(bytes(" RP"), vec![0xF0]);
    }

    #[test]
    fn data_directives() {
        assert_eq!(bytes(" DB 1,2,0xFF"), vec![1, 2, 0xFF]);
        assert_eq!(bytes(" DB 'Hi',0x0D"), vec![0x48, 0x69, 0x0D]);
        assert_eq!(bytes(" DB -1"), vec![0xFF]);
        assert_eq!(bytes(" DW 0x1234,5"), vec![0x34, 0x12, 0x05, 0x00]);
        assert_eq!(bytes(" DS 4"), vec![0, 0, 0, 0]);
        assert_eq!(bytes(" DS 3,0xAA"), vec![0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn invalid_combinations() {
        assert!(encode(" LD (BC),B").is_err());
        assert!(encode(" LD M,M").is_err());
        assert!(encode(" IM 3").is_err());
        assert!(encode(" BIT 8,A").is_err());
        assert!(encode(" EX HL,DE").is_err());
        assert!(encode(" MOV A,0x10").is_err());
    }
}
