// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Display labels for arrows.
//!
//! Labels are cosmetic. Repeated sums and products of the same arrow are
//! collapsed into coefficients (`3a`) and powers (`a^3`); the memo that makes
//! this possible lives in `LabelTable`, keyed by arrow id, and the solver
//! never looks at it.

use std::collections::HashMap;

use quiver_core::Complex;

use crate::ops::BinaryOp;
use crate::quiver::ArrowId;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Collapse {
    /// The arrow is `coeff` times `base`.
    Coefficient { coeff: f64, base: ArrowId },
    /// The arrow is `base` raised to `power`.
    Power { power: u32, base: ArrowId },
}

/// An operand as far as labeling is concerned.
#[derive(Copy, Clone, Debug)]
pub struct Operand<'a> {
    pub id: ArrowId,
    pub label: &'a str,
}

impl Operand<'_> {
    fn numeric(&self) -> Option<f64> {
        self.label.parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

#[derive(Clone, Debug, Default)]
pub struct LabelTable {
    collapsed: HashMap<ArrowId, Collapse>,
}

impl LabelTable {
    pub fn collapse(&self, id: ArrowId) -> Option<Collapse> {
        self.collapsed.get(&id).copied()
    }

    /// Label the arrow `id = lhs <op> rhs`, recording any collapse.
    pub fn derived(&mut self, id: ArrowId, op: BinaryOp, lhs: Operand, rhs: Operand) -> String {
        match op {
            BinaryOp::Add => self.sum(id, lhs, rhs),
            BinaryOp::Multiply => self.product(id, lhs, rhs),
        }
    }

    fn sum(&mut self, id: ArrowId, lhs: Operand, rhs: Operand) -> String {
        if let (Some(a), Some(b)) = (lhs.numeric(), rhs.numeric()) {
            return format_number(a + b);
        }
        if lhs.id == rhs.id {
            self.collapsed.insert(
                id,
                Collapse::Coefficient {
                    coeff: 2.0,
                    base: lhs.id,
                },
            );
            return format!("2{}", parenthesize(lhs.label));
        }
        if let Some(Collapse::Coefficient { coeff, base }) = self.collapse(lhs.id) {
            if base == rhs.id {
                let coeff = coeff + 1.0;
                self.collapsed
                    .insert(id, Collapse::Coefficient { coeff, base });
                return format!("{}{}", format_number(coeff), parenthesize(rhs.label));
            }
        }
        infix(lhs.label, BinaryOp::Add, rhs.label)
    }

    fn product(&mut self, id: ArrowId, lhs: Operand, rhs: Operand) -> String {
        match (lhs.numeric(), rhs.numeric()) {
            (Some(a), Some(b)) => return format_number(a * b),
            (Some(coeff), None) => {
                self.collapsed
                    .insert(id, Collapse::Coefficient { coeff, base: rhs.id });
                return format!("{}{}", format_number(coeff), parenthesize(rhs.label));
            }
            _ => (),
        }
        if lhs.id == rhs.id {
            self.collapsed.insert(
                id,
                Collapse::Power {
                    power: 2,
                    base: lhs.id,
                },
            );
            return format!("{}^2", parenthesize(lhs.label));
        }
        if let Some(Collapse::Power { power, base }) = self.collapse(lhs.id) {
            if base == rhs.id {
                let power = power + 1;
                self.collapsed.insert(id, Collapse::Power { power, base });
                return format!("{}^{}", parenthesize(rhs.label), power);
            }
        }
        infix(lhs.label, BinaryOp::Multiply, rhs.label)
    }
}

/// Format a real the way labels show numbers: `2`, not `2.0`.
pub fn format_number(n: f64) -> String {
    // no "-0" labels
    let n = if n == 0.0 { 0.0 } else { n };
    format!("{n}")
}

fn format_imaginary(im: f64) -> String {
    if im == 1.0 {
        "i".to_string()
    } else if im == -1.0 {
        "-i".to_string()
    } else {
        format!("{}i", format_number(im))
    }
}

pub fn constant_label(z: Complex) -> String {
    if z.im == 0.0 {
        format_number(z.re)
    } else if z.re == 0.0 {
        format_imaginary(z.im)
    } else if z.im < 0.0 {
        format!("{}-{}", format_number(z.re), format_imaginary(-z.im))
    } else {
        format!("{}+{}", format_number(z.re), format_imaginary(z.im))
    }
}

/// Variables are named `a`, `b`, ... `z`, then `a1`, `b1`, ...
pub fn variable_label(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    match index / 26 {
        0 => letter.to_string(),
        round => format!("{letter}{round}"),
    }
}

pub fn parenthesize(name: &str) -> String {
    if name.chars().count() == 1 {
        name.to_string()
    } else {
        format!("({name})")
    }
}

fn infix(lhs: &str, op: BinaryOp, rhs: &str) -> String {
    format!("{}{}{}", parenthesize(lhs), op.infix(), parenthesize(rhs))
}
