//! Opcode prefixes and the base values of the regular opcode groups.
//!
//! A "base" is the opcode with all variable fields zero; the builders in
//! [`opcodes`](../index.html) OR the field codes into it.

pub const PREFIX_BIT    : u8 = 0xCB;
pub const PREFIX_EXT    : u8 = 0xED;
pub const PREFIX_IX     : u8 = 0xDD;
pub const PREFIX_IY     : u8 = 0xFD;

pub const LD_R_R        : u8 = 0x40;
pub const LD_R_N        : u8 = 0x06;
pub const LD_RR_NN      : u8 = 0x01;
pub const INC_R         : u8 = 0x04;
pub const DEC_R         : u8 = 0x05;
pub const INC_RR        : u8 = 0x03;
pub const DEC_RR        : u8 = 0x0B;
pub const ADD_HL_RR     : u8 = 0x09;
pub const ALU_R         : u8 = 0x80;
pub const ALU_N         : u8 = 0xC6;
pub const PUSH_RR       : u8 = 0xC5;
pub const POP_RR        : u8 = 0xC1;
pub const RET_CC        : u8 = 0xC0;
pub const JP_CC         : u8 = 0xC2;
pub const CALL_CC       : u8 = 0xC4;
pub const JR_CC         : u8 = 0x20;
pub const RST_BASE      : u8 = 0xC7;

// Bases on the 0xED page.
pub const EXT_SBC_HL    : u8 = 0x42;
pub const EXT_ADC_HL    : u8 = 0x4A;
pub const EXT_LD_MEM_RR : u8 = 0x43;
pub const EXT_LD_RR_MEM : u8 = 0x4B;
pub const EXT_IN_R      : u8 = 0x40;
pub const EXT_OUT_R     : u8 = 0x41;

/// `IM 0` / `IM 1` / `IM 2` opcodes on the 0xED page.
pub const IM_MODES      : [u8; 3] = [0x46, 0x56, 0x5E];
