use crate::{assemble, Assembler};


/// CP/M hello world: EQUates, forward data reference, DEFM/DB data.
#[test]
fn cpm_hello_world() {
    let source = "        ORG  0100h
BDOS    EQU  0005h
PRINT   EQU  9
START:  LD   C,PRINT
        LD   DE,MSG
        CALL BDOS
        RET
MSG:    DEFM 'Hi'
        DB   0Dh,0Ah,'$'
        END  START
";

    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.load_address, 0x0100);
    assert_eq!(result.bytes.len(), 14);
    // LD C,9 ; LD DE,MSG with MSG = 0x0109
    assert_eq!(&result.bytes[..5], &[0x0E, 0x09, 0x11, 0x09, 0x01]);
    // CALL 0x0005 at 0x0105
    assert_eq!(&result.bytes[5..8], &[0xCD, 0x05, 0x00]);
    // RET at 0x0108
    assert_eq!(result.bytes[8], 0xC9);
    assert_eq!(result.symbols["MSG"], 0x0109);
    assert_eq!(&result.bytes[9..], &[0x48, 0x69, 0x0D, 0x0A, 0x24]);
    assert!(!result.hex.is_empty());
}

#[test]
fn forward_reference_resolution() {
    let source = "        ORG 0100h
        JP  TARGET
        NOP
TARGET: HALT
";

    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.bytes, vec![0xC3, 0x04, 0x01, 0x00, 0x76]);
    assert_eq!(result.symbols["TARGET"], 0x0104);
}

#[test]
fn relative_jump_out_of_range() {
    let source = "        ORG 0100h
        JR  FAR
        DS  200
FAR:    NOP
";

    let result = assemble(source);

    assert!(!result.success());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0]
        .message
        .contains("Relative jump to 'FAR' out of range"));
    assert!(result.hex.is_empty());
}

#[test]
fn djnz_loop() {
    let source = "        ORG  0100h
        LD   B,10
LOOP:   DEC  B
        DJNZ LOOP
        RET
";

    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.bytes, vec![0x06, 0x0A, 0x05, 0x10, 0xFD, 0xC9]);
}

#[test]
fn equivalent_8080_and_z80_sources() {
    let source_8080 = " ORG 100h
 LXI H,1234h
 MOV A,M
 RET
";
    let source_z80 = " ORG 100h
 LD HL,1234h
 LD A,(HL)
 RET
";

    let result_8080 = assemble(source_8080);
    let result_z80 = assemble(source_z80);

    assert!(result_8080.success());
    assert!(result_z80.success());
    assert_eq!(result_8080.bytes, vec![0x21, 0x34, 0x12, 0x7E, 0xC9]);
    assert_eq!(result_8080.bytes, result_z80.bytes);
    assert_eq!(result_8080.hex, result_z80.hex);
}

#[test]
fn indexed_addressing() {
    let source = "        ORG 0100h
        LD  A,(IX+5)
        LD  (IY-3),B
        BIT 7,(IX+0)
";

    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(
        result.bytes,
        vec![0xDD, 0x7E, 0x05, 0xFD, 0x70, 0xFD, 0xDD, 0xCB, 0x00, 0x7E]
    );
}

#[test]
fn hex_records_checksum_and_terminate() {
    let source = " ORG 0100h
 LD B,10
LOOP: DJNZ LOOP
 DS 40,0xAA
 RET
";

    let result = assemble(source);
    assert!(result.success(), "errors: {:?}", result.errors);

    let lines: Vec<&str> = result.hex.lines().collect();
    assert_eq!(*lines.last().unwrap(), ":00000001FF");
    assert!(result.hex.ends_with(":00000001FF\r\n"));

    for line in &lines {
        let body = &line[1..];
        let sum = (0..body.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&body[i..i + 2], 16).unwrap())
            .fold(0u8, |a, b| a.wrapping_add(b));
        assert_eq!(sum, 0, "record {} does not checksum to zero", line);
    }

    // data records carry the load address
    assert!(lines[0].starts_with(":100100"));
}

#[test]
fn deterministic_output() {
    let source = " ORG 0x200
A1: LD HL,A2
A2: DJNZ A1
 DB 'abc',255
";
    let first = assemble(source);
    let second = assemble(source);

    assert!(first.success());
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.hex, second.hex);
    assert_eq!(first.listing, second.listing);
}

/// Each accepted form must emit exactly the byte count the sizing pass
/// predicted; a mismatch would surface as a phase error and fail the
/// success assertion.
#[test]
fn instruction_sizes() {
    let corpus: &[(&str, usize)] = &[
        ("NOP", 1),
        ("RET", 1),
        ("RET Z", 1),
        ("NEG", 2),
        ("IM 1", 2),
        ("LDIR", 2),
        ("INC A", 1),
        ("INC HL", 1),
        ("INC IX", 2),
        ("INC (IX+3)", 3),
        ("INC IXH", 2),
        ("ADD A,B", 1),
        ("ADD A,5", 2),
        ("ADD HL,SP", 1),
        ("ADD IX,DE", 2),
        ("ADC HL,BC", 2),
        ("SUB 5", 2),
        ("AND (HL)", 1),
        ("XOR (IX+1)", 3),
        ("LD A,B", 1),
        ("LD A,5", 2),
        ("LD BC,0x1234", 3),
        ("LD A,(0x1234)", 3),
        ("LD (0x1234),HL", 3),
        ("LD (0x1234),DE", 4),
        ("LD IX,0x1234", 4),
        ("LD A,(IX+1)", 3),
        ("LD (IX+1),5", 4),
        ("LD SP,HL", 1),
        ("LD DE,HL", 2),
        ("LD A,(HL+)", 2),
        ("LD A,I", 2),
        ("JP 0x1234", 3),
        ("JP (HL)", 1),
        ("JP (IX)", 2),
        ("JP Z,0x1234", 3),
        ("JR $", 2),
        ("DJNZ $", 2),
        ("CALL 0x1234", 3),
        ("RST 0x10", 1),
        ("PUSH BC", 1),
        ("PUSH IX", 2),
        ("IN A,(1)", 2),
        ("IN B,(C)", 2),
        ("OUT (1),A", 2),
        ("BIT 0,A", 2),
        ("SET 7,(IX+1)", 4),
        ("RLC B", 2),
        ("RLC", 1),
        ("SRL (HL)", 2),
        ("EX DE,HL", 1),
        ("EX (SP),IX", 2),
        ("MOV A,B", 1),
        ("MVI A,1", 2),
        ("LXI B,0x1234", 3),
        ("LDA 0x1234", 3),
        ("LDAX B", 1),
        ("STAX D", 1),
        ("INX H", 1),
        ("DAD B", 1),
        ("ADI 1", 2),
        ("CPI 1", 2),
        ("CPI", 2),
        ("JMP 0x1234", 3),
        ("JC 0x1234", 3),
        ("CC 0x1234", 3),
        ("RC", 1),
        ("PCHL", 1),
        ("XTHL", 1),
        ("DB 1,2,'abc'", 5),
        ("DW 1,2", 4),
        ("DS 7", 7),
    ];

    for &(line, expected) in corpus {
        let result = assemble(&format!("        {}\n", line));
        assert!(result.success(), "{}: errors {:?}", line, result.errors);
        assert_eq!(result.bytes.len(), expected, "size of {}", line);
    }
}

#[test]
fn every_referenced_label_is_defined() {
    let source = " ORG 0
BEGIN: LD HL,TABLE
 CALL WORK
 JR BEGIN
WORK: RET
TABLE: DW BEGIN,WORK
";
    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    for name in ["BEGIN", "WORK", "TABLE"].iter() {
        assert!(result.symbols.contains_key(*name), "missing {}", name);
    }
    // DW BEGIN,WORK resolved through the patch table
    let table = result.symbols["TABLE"] as usize;
    assert_eq!(result.bytes[table], 0x00);
    assert_eq!(result.bytes[table + 2], result.symbols["WORK"] as u8);
}

#[test]
fn symbols_fold_case_and_separators() {
    let source = " ORG 0x100
set$alloc$bit:  NOP
        JP SETALLOCBIT
        JP Set$Alloc$Bit
";
    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.symbols["SETALLOCBIT"], 0x0100);
    assert_eq!(&result.bytes[1..4], &[0xC3, 0x00, 0x01]);
    assert_eq!(&result.bytes[4..], &[0xC3, 0x00, 0x01]);
}

#[test]
fn duplicate_labels_are_errors() {
    let result = assemble("X: NOP\nX: NOP\n");

    assert!(!result.success());
    assert!(result.errors[0].message.contains("Duplicate label 'X'"));
}

#[test]
fn undefined_label_is_reported_at_patch_time() {
    let result = assemble(" JP NOWHERE\n");

    assert!(!result.success());
    assert!(result.errors[0].message.contains("Undefined label 'NOWHERE'"));
    assert!(result.hex.is_empty());
}

#[test]
fn unknown_mnemonics_are_reported() {
    let result = assemble("  FROB 1,2\n");

    assert!(!result.success());
    assert!(result.errors[0].message.contains("Unknown mnemonic 'FROB'"));
}

#[test]
fn diagnostics_render_the_stable_format() {
    let result = assemble(" NOP\n FROB\n");

    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        result.errors[0].to_string(),
        "Line 2: ERROR: Unknown mnemonic 'FROB'"
    );
}

#[test]
fn constants_and_defc() {
    let source = " ORG 0
N EQU 5
 DEFC IOBYTE = 3
 LD B,N
 LD A,(IOBYTE)
";
    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.symbols["N"], 5);
    assert_eq!(result.symbols["IOBYTE"], 3);
    assert_eq!(result.bytes, vec![0x06, 0x05, 0x3A, 0x03, 0x00]);
}

#[test]
fn second_org_moves_only_the_pc() {
    let source = " ORG 0x100
 NOP
 ORG 0x200
X: NOP
";
    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.load_address, 0x0100);
    assert_eq!(result.symbols["X"], 0x0200);
    // the buffer stays linear; only addresses move
    assert_eq!(result.bytes, vec![0x00, 0x00]);
    assert!(result.hex.starts_with(":02010000"));
}

#[test]
fn label_offsets_patch_with_their_addend() {
    let source = " ORG 0x100
 LD HL,TABLE+2
 JP DONE
TABLE: DW 1,2,3
DONE: RET
";
    let result = assemble(source);

    assert!(result.success(), "errors: {:?}", result.errors);
    let table = result.symbols["TABLE"];
    assert_eq!(result.bytes[1], (table + 2) as u8);
    assert_eq!(result.bytes[2], ((table + 2) >> 8) as u8);
}

#[test]
fn listing_lines_carry_addresses_and_bytes() {
    let source = "        ORG 0100h
START:  LD C,9
        RET
";
    let result = assemble(source);

    assert!(result.success());
    assert_eq!(result.listing.len(), 3);
    assert!(result.listing[1].starts_with("0100  0E 09"));
    assert!(result.listing[1].ends_with("LD C,9"));
    assert!(result.listing[2].starts_with("0102  C9"));
}

#[test]
fn empty_source_assembles_to_nothing() {
    let result = assemble("");

    assert!(result.success());
    assert!(result.bytes.is_empty());
    assert_eq!(result.hex, ":00000001FF\r\n");
}

#[test]
fn pc_symbol_points_at_the_instruction() {
    // JP $ is the canonical self-loop
    let result = assemble(" ORG 0x150\n JP $\n");

    assert!(result.success());
    assert_eq!(result.bytes, vec![0xC3, 0x50, 0x01]);
}

#[test]
fn assemble_file_expands_includes() {
    use std::fs;
    use std::io::Write;

    let dir = std::env::temp_dir().join("zasm_include_test");
    fs::create_dir_all(&dir).unwrap();
    fs::File::create(dir.join("defs.z80"))
        .unwrap()
        .write_all(b"VALUE EQU 42\n")
        .unwrap();
    fs::File::create(dir.join("main.z80"))
        .unwrap()
        .write_all(b"INCLUDE \"defs.z80\"\n LD A,VALUE\n")
        .unwrap();

    let result = Assembler::new()
        .assemble_file(dir.join("main.z80"))
        .unwrap();

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.bytes, vec![0x3E, 42]);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn assemble_file_follows_stub_includes() {
    use std::fs;
    use std::io::Write;

    let dir = std::env::temp_dir().join("zasm_stub_test");
    fs::create_dir_all(dir.join("real")).unwrap();
    fs::File::create(dir.join("real/actual.z80"))
        .unwrap()
        .write_all(b" NOP\n")
        .unwrap();
    // a Git symlink surrogate: a one-line file naming the real one
    fs::File::create(dir.join("lib.z80"))
        .unwrap()
        .write_all(b"real/actual.z80")
        .unwrap();
    fs::File::create(dir.join("main.z80"))
        .unwrap()
        .write_all(b"INCLUDE \"lib.z80\"\n HALT\n")
        .unwrap();

    let result = Assembler::new()
        .assemble_file(dir.join("main.z80"))
        .unwrap();

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.bytes, vec![0x00, 0x76]);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_include_fails_the_run() {
    let result = assemble("INCLUDE \"no_such_file_anywhere.z80\"\n NOP\n");

    assert!(!result.success());
    assert!(result.errors[0].message.contains("Include file not found"));
    // the marker kept the NOP on its line, so it still assembled
    assert_eq!(result.bytes, vec![0x00]);
}
