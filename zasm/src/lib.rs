//! Two-pass cross-assembler for the Zilog Z80, with Intel 8080 mnemonic
//! compatibility, targeting CP/M-style environments.
//!
//! The main entry point is [`assemble`](fn.assemble.html) (or an
//! [`Assembler`](struct.Assembler.html) instance when include paths are
//! needed), which takes assembly source text and returns an
//! [`Assembly`](struct.Assembly.html): the raw image, its Intel HEX
//! rendering, the symbol table, a listing, and every diagnostic found.
//! Assembly never aborts early — all problems in a source are reported
//! in one run.
//!
//! The pipeline is linear: `INCLUDE` expansion
//! ([`preprocess`](preprocess/index.html)), a one-shot [pest]-based
//! tokeniser, a sizing pass that binds every label, an encoding pass,
//! forward-reference patching and [Intel HEX](../hexfile/index.html)
//! serialisation.
//!
//! # Source format
//!
//! One statement per line; `;` starts a comment. Labels end in a colon,
//! or — 8080 style — stand colonless in the first column. Symbol names
//! are case-insensitive and may carry embedded `$` separators, so
//! `set$alloc$bit` and `SETALLOCBIT` are the same symbol.
//!
//! ## Numeric literals
//!
//!  Form      | Example      | Meaning
//! -----------|--------------|----------------------
//! `0x` / `$` | `0x80`, `$80`| hexadecimal
//! `h` suffix | `0FFh`       | hexadecimal (must start with a digit)
//! `b` suffix | `10110b`     | binary
//! plain      | `128`        | decimal
//!
//! `$` on its own is the current program counter. Operand expressions
//! are a single value, optionally plus or minus a literal (`MSG+1`,
//! `$-2`); one-character strings are 8-bit immediates.
//!
//! ## Directives
//!
//!  Directive            | Effect
//! ----------------------|------------------------------------------------
//! `ORG addr`            | set the PC; the first ORG before any emission also sets the load address
//! `name EQU value`      | bind a constant (also `name: EQU`, `name SET`)
//! `DEFC name = value`   | bind a constant
//! `DB`/`DEFB`/`DEFM`    | emit bytes; strings expand one byte per character
//! `DW`/`DEFW`           | emit little-endian words
//! `DS count [, fill]`   | emit `count` bytes of `fill` (default 0)
//! `INCLUDE "file"`      | splice a file (handled by the preprocessor)
//! `END [start]`         | stop assembling
//! `.Z80`, `.8080`       | accepted and ignored
//!
//! `PUBLIC`, `EXTERN`, `GLOBAL`, `MODULE`, `SECTION`, `IF`, `ELSE`,
//! `ENDIF`, `TITLE`, `PAGE`, `EJECT`, `NAME` and `MACLIB` are tokenised
//! and ignored — there is no linker and no conditional assembly here.
//!
//! # Instruction set
//!
//! The full Z80 set is encoded, including the CB/ED-page operations, the
//! DD/FD-prefixed IX/IY forms with signed displacements, the four-byte
//! indexed bit operations and the undocumented index-register halves.
//! Every 8080 mnemonic (`MOV`, `LXI`, `ADI`, `JC`, ...) maps to its Z80
//! encoding, so CP/M-era sources assemble unchanged. Two pseudo-forms
//! expand to instruction pairs: `LD rr,rr'` between plain pairs and
//! `LD r,(HL+)`.
//!
//! [pest]: https://docs.rs/pest/

mod diag;
mod encode;
mod eval;
mod labels;
mod lexer;
mod listing;
mod operands;
mod ops;
mod parser;
mod pass1;
mod patch;
pub mod preprocess;

#[cfg(test)]
mod test;

use std::collections::HashMap;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::debug;

pub use diag::{Diagnostic, Severity};
pub use lexer::{Token, TokenKind};
pub use listing::{format_line, format_symbols};
pub use ops::Mnemonic;
pub use preprocess::{preprocess, FsResolver, IncludeResolver};

use patch::Patch;

/// Case-folded symbol name → 16-bit value.
pub type SymbolTable = HashMap<String, u16>;

/// Everything one assembly run produces.
#[derive(Debug)]
pub struct Assembly {
    /// The raw image, in emission order.
    pub bytes: Vec<u8>,
    /// Intel HEX rendering of the image; empty unless the run succeeded.
    pub hex: String,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub symbols: SymbolTable,
    pub listing: Vec<String>,
    pub load_address: u16,
}

impl Assembly {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Mutable state threaded through the two passes. Built fresh for every
/// assembly call, which is what makes an `Assembler` reusable.
pub(crate) struct Context {
    pub(crate) symbols: SymbolTable,
    pub(crate) buffer: Vec<u8>,
    pub(crate) patches: Vec<Patch>,
    pub(crate) errors: Vec<Diagnostic>,
    pub(crate) warnings: Vec<Diagnostic>,
    pub(crate) listing: Vec<String>,
    /// Source line → byte count, filled by pass 1.
    pub(crate) line_sizes: HashMap<u32, u16>,
    pub(crate) pc: u16,
    pub(crate) load_address: u16,
    pub(crate) load_set: bool,
    pub(crate) emitted: bool,
}

impl Context {
    pub(crate) fn new() -> Context {
        Context {
            symbols: SymbolTable::new(),
            buffer: Vec::new(),
            patches: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            listing: Vec::new(),
            line_sizes: HashMap::new(),
            pc: 0,
            load_address: 0,
            load_set: false,
            emitted: false,
        }
    }

    pub(crate) fn record_size(&mut self, line: u32, size: u16) {
        self.line_sizes.insert(line, size);
    }

    /// ORG: move the PC; the first one before any emission also fixes
    /// the load address.
    pub(crate) fn set_origin(&mut self, value: u16) {
        self.pc = value;
        if !self.emitted && !self.load_set {
            self.load_address = value;
            self.load_set = true;
        }
    }

    /// Pass 2 re-simulates the PC from scratch; symbols, sizes and
    /// diagnostics carry over.
    fn rewind(&mut self) {
        self.pc = 0;
        self.load_address = 0;
        self.load_set = false;
        self.emitted = false;
    }
}

/// The assembler engine. One instance can be reused across independent
/// sources — every [`assemble`](#method.assemble) call starts from a
/// clean slate — but a single instance is not meant for concurrent use.
pub struct Assembler {
    include_paths: Vec<PathBuf>,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler {
            include_paths: Vec::new(),
        }
    }

    /// Add a directory to the include search path, used after the
    /// including file's own directory.
    pub fn add_include_path<P: Into<PathBuf>>(&mut self, path: P) {
        self.include_paths.push(path.into());
    }

    /// Assemble source text. `INCLUDE` directives resolve relative to
    /// the current directory and the configured include paths.
    pub fn assemble(&mut self, source: &str) -> Assembly {
        self.assemble_from(source, Path::new("source.z80"))
    }

    /// Read and assemble a file; includes resolve relative to it.
    pub fn assemble_file<P: AsRef<Path>>(&mut self, path: P) -> io::Result<Assembly> {
        let path = path.as_ref();
        let mut source = String::new();
        BufReader::new(File::open(path)?).read_to_string(&mut source)?;
        Ok(self.assemble_from(&source, path))
    }

    fn assemble_from(&mut self, source: &str, origin: &Path) -> Assembly {
        let (expanded, mut preprocess_errors) = preprocess::preprocess_with(
            source,
            origin,
            &self.include_paths,
            &preprocess::FsResolver,
        );

        let mut ctx = Context::new();
        ctx.errors.append(&mut preprocess_errors);

        match lexer::tokenize(&expanded) {
            Ok(tokens) => {
                pass1::run(&mut ctx, &tokens);
                ctx.rewind();
                encode::run(&mut ctx, &tokens, &expanded);
                patch::resolve(
                    &ctx.patches,
                    &ctx.symbols,
                    &mut ctx.buffer,
                    ctx.load_address,
                    &mut ctx.errors,
                );
            }
            Err(diagnostic) => ctx.errors.push(diagnostic),
        }

        let hex = if ctx.errors.is_empty() {
            hexfile::Image::copy_from(ctx.load_address, &ctx.buffer).to_hex()
        } else {
            String::new()
        };

        debug!(
            "assembly finished: {} bytes at {:04X}, {} error(s)",
            ctx.buffer.len(),
            ctx.load_address,
            ctx.errors.len()
        );

        Assembly {
            bytes: ctx.buffer,
            hex,
            errors: ctx.errors,
            warnings: ctx.warnings,
            symbols: ctx.symbols,
            listing: ctx.listing,
            load_address: ctx.load_address,
        }
    }
}

impl Default for Assembler {
    fn default() -> Assembler {
        Assembler::new()
    }
}

/// Assemble a source string with default settings.
pub fn assemble(source: &str) -> Assembly {
    Assembler::new().assemble(source)
}
