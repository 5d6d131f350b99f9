//! Pass 1: simulate the program counter to bind every label, and record
//! per-line byte counts for pass 2.
//!
//! Sizing dry-runs the pass-2 encoders against the (still incomplete)
//! symbol table. Instruction lengths on the Z80 depend on operand shape,
//! never on operand values, so the counts match what pass 2 will emit;
//! the one exception — a DS whose count is not yet known — is caught by
//! pass 2's phase check.

use log::debug;
use matches::debug_assert_matches;

use crate::encode::{self, Cx};
use crate::eval::{self, ExprValue};
use crate::labels::{self, Stmt};
use crate::lexer::{self, Token, TokenKind};
use crate::ops::Mnemonic;
use crate::Context;

pub(crate) fn run(ctx: &mut Context, tokens: &[Token]) {
    for line_toks in lexer::logical_lines(tokens) {
        let line = labels::parse_line(line_toks);
        for label in &line.labels {
            if let Err(diagnostic) = labels::bind(&mut ctx.symbols, label, ctx.pc) {
                ctx.errors.push(diagnostic);
            }
        }

        match line.stmt {
            Stmt::Empty | Stmt::Ignored => {}
            Stmt::Equate { name, expr } => {
                // bind now when the value is already computable; values
                // that look ahead are left for pass 2
                if let Some(ExprValue::Known(value)) = eval::eval(expr, &ctx.symbols, ctx.pc) {
                    if let Err(diagnostic) = labels::bind(&mut ctx.symbols, name, value) {
                        ctx.errors.push(diagnostic);
                    }
                }
            }
            Stmt::Unknown { .. } => {
                // unknown mnemonics are assumed one byte long; pass 2
                // reports them
                ctx.record_size(line.number, 1);
                ctx.pc = ctx.pc.wrapping_add(1);
            }
            Stmt::Op {
                mnemonic,
                token,
                args,
            } => {
                debug_assert_matches!(token.kind, TokenKind::Mnemonic);
                match mnemonic {
                    Mnemonic::ORG => {
                        if let Some(ExprValue::Known(value)) =
                            eval::eval(args, &ctx.symbols, ctx.pc)
                        {
                            ctx.set_origin(value);
                        }
                    }
                    Mnemonic::END => break,
                    Mnemonic::DEFC => {
                        if let Some((name, expr)) = labels::defc_parts(args) {
                            if let Some(ExprValue::Known(value)) =
                                eval::eval(expr, &ctx.symbols, ctx.pc)
                            {
                                if let Err(diagnostic) =
                                    labels::bind(&mut ctx.symbols, name, value)
                                {
                                    ctx.errors.push(diagnostic);
                                }
                            }
                        }
                    }
                    _ => {
                        let cx = Cx {
                            symbols: &ctx.symbols,
                            pc: ctx.pc,
                        };
                        let size = match encode::encode_op(mnemonic, args, &cx) {
                            Ok(emit) => emit.bytes.len() as u16,
                            // pass 2 reports the failure; size zero keeps
                            // this pass moving
                            Err(_) => 0,
                        };
                        ctx.record_size(line.number, size);
                        if size > 0 {
                            ctx.emitted = true;
                        }
                        ctx.pc = ctx.pc.wrapping_add(size);
                    }
                }
            }
        }
    }

    debug!(
        "pass 1 bound {} symbols, pc ended at {:04X}",
        ctx.symbols.len(),
        ctx.pc
    );
}
