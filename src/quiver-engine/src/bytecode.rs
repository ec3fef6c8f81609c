// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeSet, HashMap};

use quiver_core::Complex;

use crate::ops::BinaryOp;
use crate::quiver::{ArrowId, Quiver};

// ============================================================================
// Type Aliases
// ============================================================================

pub type Register = u32;

// ============================================================================
// Opcodes
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Opcode {
    LoadInput {
        dst: Register,
    },
    LoadConst {
        dst: Register,
        value: Complex,
    },
    Add {
        dst: Register,
        lhs: Register,
        rhs: Register,
    },
    Mul {
        dst: Register,
        lhs: Register,
        rhs: Register,
    },
}

/// Straight-line code computing one arrow from one input arrow.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub(crate) code: Vec<Opcode>,
    pub(crate) registers: usize,
    pub(crate) output: Register,
}

impl Program {
    pub fn code(&self) -> &[Opcode] {
        &self.code
    }

    pub fn register_count(&self) -> usize {
        self.registers
    }

    pub fn output(&self) -> Register {
        self.output
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// Walk back from `output` to the leaves it depends on and emit code in
/// arrow order, which is already a topological order: an arrow's operands
/// always predate it.
///
/// `input` must be a resolved leaf and `output` must exist.
pub(crate) fn compile(quiver: &Quiver, input: ArrowId, output: ArrowId) -> Program {
    let represents_input = |id: ArrowId| quiver.resolve(id).ok() == Some(input);

    let mut needed: BTreeSet<ArrowId> = BTreeSet::new();
    let mut stack = vec![output];
    while let Some(id) = stack.pop() {
        if !needed.insert(id) || represents_input(id) {
            continue;
        }
        if let Some((lhs, rhs)) = quiver.arrow(id).and_then(|arrow| arrow.operands) {
            stack.push(lhs);
            stack.push(rhs);
        }
    }

    let registers: HashMap<ArrowId, Register> = needed
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as Register))
        .collect();

    let mut code = Vec::with_capacity(needed.len());
    for &id in needed.iter() {
        let dst = registers[&id];
        let Some(arrow) = quiver.arrow(id) else {
            continue;
        };
        let opcode = match (arrow.op.binary(), arrow.operands) {
            _ if represents_input(id) => Opcode::LoadInput { dst },
            (Some(op), Some((lhs, rhs))) => {
                let (lhs, rhs) = (registers[&lhs], registers[&rhs]);
                match op {
                    BinaryOp::Add => Opcode::Add { dst, lhs, rhs },
                    BinaryOp::Multiply => Opcode::Mul { dst, lhs, rhs },
                }
            }
            _ => Opcode::LoadConst {
                dst,
                value: quiver.position(id).unwrap_or(arrow.at),
            },
        };
        code.push(opcode);
    }

    Program {
        code,
        registers: needed.len(),
        output: registers[&output],
    }
}
