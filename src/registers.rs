use num::traits::ToPrimitive;
use num_derive::{FromPrimitive, ToPrimitive};
use util::EnumFromStr;
use util_derive::EnumFromStr;

use crate::constants;

/// 8-bit registers in opcode field-code order (`B`=0 .. `A`=7).
///
/// `M` is the `(HL)` memory slot (code 6). It doubles as the register
/// name the 8080 syntax uses for it (`MOV A,M`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum Reg8 {
    B,
    C,
    D,
    E,
    H,
    L,
    M,
    A,
}

/// 16-bit register pairs. The first four are in `dd` field-code order.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum Reg16 {
    BC,
    DE,
    HL,
    SP,
    AF,
    IX,
    IY,
    /// The alternate accumulator/flags pair, only valid in `EX AF,AF'`.
    #[enum_str(rename = "AF'")]
    AFP,
}

/// Condition codes in opcode field-code order.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum Cond {
    NZ,
    Z,
    NC,
    C,
    PO,
    PE,
    P,
    M,
}

/// The two index-register opcode prefixes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Prefix {
    IX,
    IY,
}

#[inline]
pub fn enum_to_u8<T: ToPrimitive + Copy>(val: T) -> u8 {
    val.to_u8().unwrap()
}

macro_rules! impl_enum_display {
    ($e:ty) => {
        impl std::fmt::Display for $e {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Debug::fmt(self, f)
            }
        }
    };
}

impl_enum_display!(Reg8);
impl_enum_display!(Reg16);
impl_enum_display!(Cond);

impl Reg8 {
    /// Three-bit opcode field code.
    #[inline]
    pub fn code(self) -> u8 {
        enum_to_u8(self)
    }
}

impl Reg16 {
    /// Two-bit `dd`/`ss` field code, for the contexts where the fourth
    /// slot is SP (`LD rr,nn`, `INC rr`, `ADD HL,rr`, ...).
    pub fn dd(self) -> Option<u8> {
        match self {
            Reg16::BC | Reg16::DE | Reg16::HL | Reg16::SP => Some(enum_to_u8(self)),
            _ => None,
        }
    }

    /// Two-bit `qq` field code for PUSH/POP, where the fourth slot is AF.
    pub fn qq(self) -> Option<u8> {
        match self {
            Reg16::BC | Reg16::DE | Reg16::HL => Some(enum_to_u8(self)),
            Reg16::AF => Some(3),
            _ => None,
        }
    }
}

impl Cond {
    /// Three-bit opcode field code.
    #[inline]
    pub fn code(self) -> u8 {
        enum_to_u8(self)
    }

    /// Field code when used with `JR`, which only accepts NZ/Z/NC/C.
    pub fn jr_code(self) -> Option<u8> {
        match self {
            Cond::NZ | Cond::Z | Cond::NC | Cond::C => Some(enum_to_u8(self)),
            _ => None,
        }
    }
}

impl Prefix {
    #[inline]
    pub fn byte(self) -> u8 {
        match self {
            Prefix::IX => constants::PREFIX_IX,
            Prefix::IY => constants::PREFIX_IY,
        }
    }
}

/// The undocumented index-register halves, which reuse the H/L field
/// codes under the matching prefix.
pub fn index_half(name: &str) -> Option<(Prefix, Reg8)> {
    match name {
        "IXH" => Some((Prefix::IX, Reg8::H)),
        "IXL" => Some((Prefix::IX, Reg8::L)),
        "IYH" => Some((Prefix::IY, Reg8::H)),
        "IYL" => Some((Prefix::IY, Reg8::L)),
        _ => None,
    }
}

/// Whether an upper-cased word names a register, a condition code or one
/// of the special registers. The lexer classifies tokens with this; the
/// operand accessors decide contextually what the name means.
pub fn is_register_name(name: &str) -> bool {
    name.parse::<Reg8>().is_ok()
        || name.parse::<Reg16>().is_ok()
        || name.parse::<Cond>().is_ok()
        || index_half(name).is_some()
        || matches!(name, "I" | "R" | "PSW")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn field_codes() {
        assert_eq!(Reg8::B.code(), 0);
        assert_eq!(Reg8::M.code(), 6);
        assert_eq!(Reg8::A.code(), 7);
        assert_eq!(Reg16::SP.dd(), Some(3));
        assert_eq!(Reg16::AF.dd(), None);
        assert_eq!(Reg16::AF.qq(), Some(3));
        assert_eq!(Reg16::SP.qq(), None);
        assert_eq!(Cond::M.code(), 7);
        assert_eq!(Cond::PO.jr_code(), None);
        assert_eq!(Cond::C.jr_code(), Some(3));
    }

    #[test]
    fn names() {
        assert_eq!("AF'".parse::<Reg16>(), Ok(Reg16::AFP));
        assert_eq!(index_half("IYL"), Some((Prefix::IY, Reg8::L)));
        assert!(is_register_name("PSW"));
        assert!(is_register_name("NZ"));
        assert!(!is_register_name("FOO"));
    }
}
