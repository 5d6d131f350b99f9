//! Forward-reference resolution, run once after pass 2.

use byteorder::ByteOrder;
use log::debug;
use util::Endian;

use crate::diag::Diagnostic;
use crate::labels::symbol_key;
use crate::SymbolTable;

/// A forward reference positioned absolutely in the output buffer.
/// Absolute patches cover a little-endian 16-bit slot at `offset`;
/// relative ones cover the single displacement byte of a JR/DJNZ.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    pub offset: usize,
    pub name: String,
    pub addend: i32,
    pub line: u32,
    pub relative: bool,
}

pub fn resolve(
    patches: &[Patch],
    symbols: &SymbolTable,
    buffer: &mut [u8],
    load_address: u16,
    errors: &mut Vec<Diagnostic>,
) {
    debug!("resolving {} patches", patches.len());

    for patch in patches {
        let target = match symbols.get(&symbol_key(&patch.name)) {
            Some(&value) => (value as i32).wrapping_add(patch.addend) as u16,
            None => {
                errors.push(Diagnostic::error(
                    patch.line,
                    format!("Undefined label '{}'", patch.name),
                ));
                continue;
            }
        };

        if patch.relative {
            // the displacement is taken from the byte after itself
            let disp_address = load_address.wrapping_add(patch.offset as u16);
            let rel = target as i32 - (disp_address as i32 + 1);
            if rel < -128 || rel > 127 {
                errors.push(Diagnostic::error(
                    patch.line,
                    format!("Relative jump to '{}' out of range", patch.name),
                ));
                continue;
            }
            buffer[patch.offset] = rel as i8 as u8;
        } else {
            Endian::write_u16(&mut buffer[patch.offset..patch.offset + 2], target);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn symbols(entries: &[(&str, u16)]) -> SymbolTable {
        entries
            .iter()
            .map(|&(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn absolute_writes_little_endian() {
        let symbols = symbols(&[("TARGET", 0x0104)]);
        let mut buffer = vec![0xC3, 0x00, 0x00];
        let mut errors = Vec::new();
        let patches = vec![Patch {
            offset: 1,
            name: "TARGET".to_string(),
            addend: 0,
            line: 2,
            relative: false,
        }];

        resolve(&patches, &symbols, &mut buffer, 0x0100, &mut errors);

        assert!(errors.is_empty());
        assert_eq!(buffer, vec![0xC3, 0x04, 0x01]);
    }

    #[test]
    fn addend_is_applied() {
        let symbols = symbols(&[("TABLE", 0x0200)]);
        let mut buffer = vec![0x21, 0x00, 0x00];
        let mut errors = Vec::new();
        let patches = vec![Patch {
            offset: 1,
            name: "TABLE".to_string(),
            addend: 3,
            line: 1,
            relative: false,
        }];

        resolve(&patches, &symbols, &mut buffer, 0x0100, &mut errors);

        assert_eq!(buffer, vec![0x21, 0x03, 0x02]);
    }

    #[test]
    fn relative_in_range() {
        // DJNZ at 0x0103, displacement byte at buffer offset 4,
        // target 0x0102: rel = 0x0102 - 0x0105 = -3
        let symbols = symbols(&[("LOOP", 0x0102)]);
        let mut buffer = vec![0x06, 0x0A, 0x05, 0x10, 0x00, 0xC9];
        let mut errors = Vec::new();
        let patches = vec![Patch {
            offset: 4,
            name: "LOOP".to_string(),
            addend: 0,
            line: 4,
            relative: true,
        }];

        resolve(&patches, &symbols, &mut buffer, 0x0100, &mut errors);

        assert!(errors.is_empty());
        assert_eq!(buffer[4], 0xFD);
    }

    #[test]
    fn relative_out_of_range() {
        let symbols = symbols(&[("FAR", 0x0300)]);
        let mut buffer = vec![0x18, 0x00];
        let mut errors = Vec::new();
        let patches = vec![Patch {
            offset: 1,
            name: "FAR".to_string(),
            addend: 0,
            line: 2,
            relative: true,
        }];

        resolve(&patches, &symbols, &mut buffer, 0x0100, &mut errors);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Relative jump to 'FAR' out of range"));
        assert_eq!(buffer[1], 0x00);
    }

    #[test]
    fn unresolved_label() {
        let symbols = SymbolTable::new();
        let mut buffer = vec![0xC3, 0x00, 0x00];
        let mut errors = Vec::new();
        let patches = vec![Patch {
            offset: 1,
            name: "NOWHERE".to_string(),
            addend: 0,
            line: 7,
            relative: false,
        }];

        resolve(&patches, &symbols, &mut buffer, 0, &mut errors);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Undefined label 'NOWHERE'"));
        assert_eq!(buffer, vec![0xC3, 0x00, 0x00]);
    }
}
