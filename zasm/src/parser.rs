use pest_derive::Parser;

/// Token-level parser generated from `z80.pest`.
#[derive(Parser)]
#[grammar = "z80.pest"]
pub struct ZasmParser;
