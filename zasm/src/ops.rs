//! The mnemonic vocabulary: Z80 instructions, their 8080 spellings, and
//! the assembler directives, all sharing one token kind.
//!
//! A handful of names exist in both instruction sets (`CPI`, `RLC`,
//! `RRC`, `JP`); the encoders tell them apart by operand shape, with the
//! Z80 reading winning where both are plausible.

use util::EnumFromStr;
use util_derive::EnumFromStr;

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumFromStr)]
pub enum Mnemonic {
    // Z80 loads, exchanges and block transfers
    LD,
    PUSH,
    POP,
    EX,
    EXX,
    LDI,
    LDIR,
    LDD,
    LDDR,
    CPI,
    CPIR,
    CPD,
    CPDR,

    // Z80 arithmetic and logic
    ADD,
    ADC,
    SUB,
    SBC,
    AND,
    OR,
    XOR,
    CP,
    INC,
    DEC,
    DAA,
    CPL,
    NEG,
    CCF,
    SCF,

    // Z80 control
    NOP,
    HALT,
    DI,
    EI,
    IM,
    JP,
    JR,
    DJNZ,
    CALL,
    RET,
    RETI,
    RETN,
    RST,

    // Z80 rotates, shifts and bit operations
    RLCA,
    RLA,
    RRCA,
    RRA,
    RLC,
    RL,
    RRC,
    RR,
    SLA,
    SRA,
    SLL,
    SRL,
    RLD,
    RRD,
    BIT,
    SET,
    RES,

    // Z80 input/output
    IN,
    INI,
    INIR,
    IND,
    INDR,
    OUT,
    OUTI,
    OTIR,
    OUTD,
    OTDR,

    // 8080 data transfer
    MOV,
    MVI,
    LXI,
    LDA,
    STA,
    LHLD,
    SHLD,
    LDAX,
    STAX,
    XCHG,
    XTHL,
    SPHL,
    PCHL,

    // 8080 arithmetic and logic
    ADI,
    ACI,
    SUI,
    SBI,
    SBB,
    ANA,
    ANI,
    XRA,
    XRI,
    ORA,
    ORI,
    CMP,
    INR,
    DCR,
    INX,
    DCX,
    DAD,
    RAL,
    RAR,
    CMA,
    STC,
    CMC,
    HLT,

    // 8080 jumps, calls and returns
    JMP,
    JC,
    JNC,
    JZ,
    JNZ,
    JM,
    JPE,
    JPO,
    CC,
    CNC,
    CZ,
    CNZ,
    CM,
    CPE,
    CPO,
    RC,
    RNC,
    RZ,
    RNZ,
    RM,
    RP,
    RPE,
    RPO,

    // directives
    ORG,
    EQU,
    DEFC,
    DB,
    DEFB,
    DEFM,
    DW,
    DEFW,
    DS,
    DEFS,
    END,
    INCLUDE,
    PUBLIC,
    EXTERN,
    GLOBAL,
    MODULE,
    SECTION,
    IF,
    ELSE,
    ENDIF,
    TITLE,
    PAGE,
    EJECT,
    NAME,
    MACLIB,
}

impl Mnemonic {
    /// Directives share the mnemonic token kind with instructions. `SET`
    /// is deliberately absent: in mnemonic position it is always the Z80
    /// bit instruction, and the `name SET value` constant form is
    /// recognised by its leading identifier instead.
    pub fn is_directive(self) -> bool {
        use Mnemonic::*;
        matches!(
            self,
            ORG | EQU
                | DEFC
                | DB
                | DEFB
                | DEFM
                | DW
                | DEFW
                | DS
                | DEFS
                | END
                | INCLUDE
                | PUBLIC
                | EXTERN
                | GLOBAL
                | MODULE
                | SECTION
                | IF
                | ELSE
                | ENDIF
                | TITLE
                | PAGE
                | EJECT
                | NAME
                | MACLIB
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup() {
        assert_eq!("LD".parse::<Mnemonic>(), Ok(Mnemonic::LD));
        assert_eq!("DJNZ".parse::<Mnemonic>(), Ok(Mnemonic::DJNZ));
        assert_eq!("LXI".parse::<Mnemonic>(), Ok(Mnemonic::LXI));
        assert!("FROB".parse::<Mnemonic>().is_err());
    }

    #[test]
    fn directives() {
        assert!(Mnemonic::ORG.is_directive());
        assert!(Mnemonic::MACLIB.is_directive());
        assert!(!Mnemonic::SET.is_directive());
        assert!(!Mnemonic::LD.is_directive());
    }
}
