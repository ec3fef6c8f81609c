// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use smallvec::{SmallVec, smallvec};

use quiver_core::Complex;

use crate::bytecode::{Opcode, Program};

/// Evaluates a `Program` at many points, reusing one register file.
#[derive(Debug)]
pub struct Vm<'a> {
    program: &'a Program,
    registers: SmallVec<[Complex; 16]>,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a Program) -> Self {
        Vm {
            program,
            registers: smallvec![Complex::ZERO; program.registers],
        }
    }

    pub fn eval(&mut self, input: Complex) -> Complex {
        let regs = &mut self.registers;
        for opcode in self.program.code.iter() {
            match *opcode {
                Opcode::LoadInput { dst } => regs[dst as usize] = input,
                Opcode::LoadConst { dst, value } => regs[dst as usize] = value,
                Opcode::Add { dst, lhs, rhs } => {
                    regs[dst as usize] = regs[lhs as usize] + regs[rhs as usize]
                }
                Opcode::Mul { dst, lhs, rhs } => {
                    regs[dst as usize] = regs[lhs as usize] * regs[rhs as usize]
                }
            }
        }
        regs[self.program.output as usize]
    }

    pub fn eval_many(&mut self, inputs: &[Complex]) -> Vec<Complex> {
        inputs.iter().map(|&z| self.eval(z)).collect()
    }
}

impl Program {
    pub fn eval(&self, input: Complex) -> Complex {
        Vm::new(self).eval(input)
    }
}
