// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The fixed capability table: what each kind of arrow knows how to do.

use std::fmt;

use serde::Deserialize;

use quiver_core::Complex;

use crate::binding::ComplexHandle;
use crate::label::parenthesize;
use crate::network::Network;

/// An operator that can derive a new arrow from two existing ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Multiply,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Constant,
    Variable,
    Add,
    Multiply,
}

/// What a renderer should draw to show where an arrow came from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Provenance {
    None,
    Line { from: Complex, to: Complex },
    /// A logarithmic spiral from `u` to `uv`, similar to the one from 1 to `v`.
    Spiral { u: Complex, v: Complex, uv: Complex },
}

impl BinaryOp {
    pub fn apply(self, a: Complex, b: Complex) -> Complex {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Multiply => a * b,
        }
    }

    /// The unary inverse of `at` under this operator, if it has one.
    pub fn inverse(self, at: Complex) -> Option<Complex> {
        match self {
            BinaryOp::Add => Some(-at),
            BinaryOp::Multiply => at.reciprocal(),
        }
    }

    pub fn inverse_label(self, source: &str) -> String {
        match self {
            BinaryOp::Add => format!("-{}", parenthesize(source)),
            BinaryOp::Multiply => format!("1/{}", parenthesize(source)),
        }
    }

    pub(crate) fn infix(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Multiply => "",
        }
    }

    fn aux_stem(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Multiply => "*",
        }
    }

    fn compile(self, net: &mut Network, a: ComplexHandle, b: ComplexHandle, v: ComplexHandle) {
        match self {
            BinaryOp::Add => net.compile_add(a, b, v),
            BinaryOp::Multiply => net.compile_multiply(a, b, v),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "add"),
            BinaryOp::Multiply => write!(f, "multiply"),
        }
    }
}

impl From<BinaryOp> for Op {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => Op::Add,
            BinaryOp::Multiply => Op::Multiply,
        }
    }
}

impl Op {
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            Op::Add => Some(BinaryOp::Add),
            Op::Multiply => Some(BinaryOp::Multiply),
            Op::Constant | Op::Variable => None,
        }
    }

    pub fn is_leaf(self) -> bool {
        self.binary().is_none()
    }

    /// The position implied by the operands; leaves keep their own.
    pub fn recompute(self, at: Complex, operands: Option<(Complex, Complex)>) -> Complex {
        match (self.binary(), operands) {
            (Some(op), Some((a, b))) => op.apply(a, b),
            _ => at,
        }
    }

    /// Allocate wires for a new arrow and tie them into the network.
    pub fn make_constraint(
        self,
        net: &mut Network,
        name: &str,
        at: Complex,
        operands: Option<(ComplexHandle, ComplexHandle)>,
    ) -> ComplexHandle {
        match (self, self.binary(), operands) {
            (Op::Constant, _, _) => net.bind_constant(at),
            (Op::Variable, _, _) => net.bind_variable(name, at),
            (_, Some(op), Some((a, b))) => {
                let v = net.bind_gensym(op.aux_stem(), at);
                op.compile(net, a, b, v);
                v
            }
            (_, _, None) | (_, None, _) => {
                panic!("internal error: {self:?} arrow without operands")
            }
        }
    }

    pub fn provenance(self, at: Complex, operands: Option<(Complex, Complex)>) -> Provenance {
        match (self, operands) {
            (Op::Add, Some((a, _))) => Provenance::Line { from: a, to: at },
            (Op::Multiply, Some((a, b))) => Provenance::Spiral { u: a, v: b, uv: at },
            _ => Provenance::None,
        }
    }
}
