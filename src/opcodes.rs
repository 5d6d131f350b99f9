//! Opcode builders: pack field codes into the base values from
//! [`constants`](../constants/index.html).

use num_derive::{FromPrimitive, ToPrimitive};
use util::EnumFromStr;
use util_derive::EnumFromStr;

use crate::constants::*;
use crate::registers::{enum_to_u8, Cond, Reg8};

/// ALU operations in opcode field-code order (`10 ooo rrr`, `11 ooo 110 n`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum AluOp {
    ADD,
    ADC,
    SUB,
    SBC,
    AND,
    XOR,
    OR,
    CP,
}

/// Rotate/shift operations on the CB page, in field-code order.
/// `SLL` is the undocumented shift-left-sets-bit-0.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum RotOp {
    RLC,
    RRC,
    RL,
    RR,
    SLA,
    SRA,
    SLL,
    SRL,
}

/// The three bit-manipulation groups on the CB page.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumFromStr)]
pub enum BitOp {
    BIT,
    RES,
    SET,
}

impl BitOp {
    pub fn base(self) -> u8 {
        match self {
            BitOp::BIT => 0x40,
            BitOp::RES => 0x80,
            BitOp::SET => 0xC0,
        }
    }
}

#[inline]
pub fn ld_r_r(dst: Reg8, src: Reg8) -> u8 {
    LD_R_R | dst.code() << 3 | src.code()
}

#[inline]
pub fn ld_r_n(dst: Reg8) -> u8 {
    LD_R_N | dst.code() << 3
}

#[inline]
pub fn ld_rr_nn(rr: u8) -> u8 {
    LD_RR_NN | rr << 4
}

#[inline]
pub fn inc_r(r: Reg8) -> u8 {
    INC_R | r.code() << 3
}

#[inline]
pub fn dec_r(r: Reg8) -> u8 {
    DEC_R | r.code() << 3
}

#[inline]
pub fn inc_rr(rr: u8) -> u8 {
    INC_RR | rr << 4
}

#[inline]
pub fn dec_rr(rr: u8) -> u8 {
    DEC_RR | rr << 4
}

#[inline]
pub fn add_hl_rr(rr: u8) -> u8 {
    ADD_HL_RR | rr << 4
}

#[inline]
pub fn alu_r(op: AluOp, src: Reg8) -> u8 {
    ALU_R | enum_to_u8(op) << 3 | src.code()
}

#[inline]
pub fn alu_n(op: AluOp) -> u8 {
    ALU_N | enum_to_u8(op) << 3
}

#[inline]
pub fn rot_r(op: RotOp, r: Reg8) -> u8 {
    enum_to_u8(op) << 3 | r.code()
}

#[inline]
pub fn bit_r(op: BitOp, bit: u8, r: Reg8) -> u8 {
    op.base() | (bit & 7) << 3 | r.code()
}

#[inline]
pub fn push_rr(qq: u8) -> u8 {
    PUSH_RR | qq << 4
}

#[inline]
pub fn pop_rr(qq: u8) -> u8 {
    POP_RR | qq << 4
}

#[inline]
pub fn jp_cc(cc: Cond) -> u8 {
    JP_CC | cc.code() << 3
}

#[inline]
pub fn call_cc(cc: Cond) -> u8 {
    CALL_CC | cc.code() << 3
}

#[inline]
pub fn ret_cc(cc: Cond) -> u8 {
    RET_CC | cc.code() << 3
}

/// `JR cc` base; only NZ/Z/NC/C exist.
pub fn jr_cc(cc: Cond) -> Option<u8> {
    cc.jr_code().map(|code| JR_CC | code << 3)
}

/// `RST` encodes the vector address directly: `11 ttt 111`.
#[inline]
pub fn rst(vector: u8) -> u8 {
    RST_BASE | (vector & 0x38)
}

// 0xED page builders.

#[inline]
pub fn adc_hl_rr(rr: u8) -> u8 {
    EXT_ADC_HL | rr << 4
}

#[inline]
pub fn sbc_hl_rr(rr: u8) -> u8 {
    EXT_SBC_HL | rr << 4
}

#[inline]
pub fn ld_mem_rr(rr: u8) -> u8 {
    EXT_LD_MEM_RR | rr << 4
}

#[inline]
pub fn ld_rr_mem(rr: u8) -> u8 {
    EXT_LD_RR_MEM | rr << 4
}

#[inline]
pub fn in_r_c(r: Reg8) -> u8 {
    EXT_IN_R | r.code() << 3
}

#[inline]
pub fn out_c_r(r: Reg8) -> u8 {
    EXT_OUT_R | r.code() << 3
}

/// `IM 0/1/2` opcode on the 0xED page.
pub fn im(mode: u8) -> Option<u8> {
    IM_MODES.get(mode as usize).copied()
}
