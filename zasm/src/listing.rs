//! Text rendering of the listing and the symbol-table dump. Both formats
//! are stable external contracts.

use crate::SymbolTable;

/// `AAAA  XX XX XX  source` — four hex digits of address, the emitted
/// bytes in a 12-column field, then the trimmed source line.
pub fn format_line(address: u16, bytes: &[u8], source: &str) -> String {
    let hex = bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{:04X}  {:<12}  {}", address, hex, source.trim())
}

/// Alphabetically sorted `name hex decimal` rows under a comment header.
pub fn format_symbols(symbols: &SymbolTable) -> String {
    let mut names: Vec<&String> = symbols.keys().collect();
    names.sort();

    let mut out = String::from("; Symbol table\n");
    for name in names {
        let value = symbols[name];
        out.push_str(&format!("{:<24} {:04X}  {:>5}\n", name, value, value));
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn line_layout() {
        assert_eq!(
            format_line(0x0100, &[0x0E, 0x09], "        LD   C,PRINT"),
            "0100  0E 09         LD   C,PRINT"
        );
        assert_eq!(format_line(0x0200, &[], "MSG:"), "0200                MSG:");
    }

    #[test]
    fn symbol_dump_is_sorted() {
        let mut symbols = SymbolTable::new();
        symbols.insert("ZETA".to_string(), 0x0200);
        symbols.insert("ALPHA".to_string(), 0x0005);

        let dump = format_symbols(&symbols);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "; Symbol table");
        assert!(lines[1].starts_with("ALPHA"));
        assert!(lines[1].contains("0005"));
        assert!(lines[1].trim_end().ends_with("5"));
        assert!(lines[2].starts_with("ZETA"));
    }
}
