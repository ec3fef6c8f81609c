// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Dragging an arrow around while the rest of the diagram follows.
//!
//! Dragging the only free thing in a diagram (a variable, with no merges or
//! pinned results holding anything else in place) pins every variable: the
//! dragged one moves and everything derived from it follows. Otherwise only
//! the dragged arrow is pinned and the variables are free to move so that
//! the constraints stay satisfied. Ending the drag restores the pins that
//! were in place when it began.

use tracing::debug;

use quiver_core::common::Result;
use quiver_core::{Complex, quiver_err};

use crate::ops::Op;
use crate::quiver::{ArrowId, Quiver};

#[derive(Clone, Debug, PartialEq)]
pub struct Drag {
    arrow: ArrowId,
    start: Complex,
    pin_variables: bool,
    /// Pin state of every movable arrow when the drag began.
    pins: Vec<(ArrowId, bool)>,
}

impl Drag {
    pub fn begin(quiver: &mut Quiver, arrow: ArrowId) -> Result<Drag> {
        let arrow = quiver.resolve(arrow)?;
        let (op, start) = match quiver.arrow(arrow) {
            Some(a) => (a.op, a.at),
            None => return quiver_err!(DoesNotExist, format!("{arrow}")),
        };
        if op == Op::Constant {
            return quiver_err!(ImmovableConstant, format!("{arrow}"));
        }

        let pins = quiver
            .free_arrows()
            .map(|a| Ok((a.id, quiver.is_pinned(a.id)?)))
            .collect::<Result<Vec<_>>>()?;

        let pin_variables = op == Op::Variable && !quiver.has_constrained_result();
        if pin_variables {
            quiver.pin_variables(true);
        } else {
            quiver.pin(arrow, true)?;
        }
        debug!(%arrow, pin_variables, "drag started");

        Ok(Drag {
            arrow,
            start,
            pin_variables,
            pins,
        })
    }

    pub fn arrow(&self) -> ArrowId {
        self.arrow
    }

    pub fn pins_variables(&self) -> bool {
        self.pin_variables
    }

    /// Move the dragged arrow to `offset` from where the drag started.
    /// The caller relaxes the network afterwards.
    pub fn move_by(&self, quiver: &mut Quiver, offset: Complex) -> Result<()> {
        quiver.set_position(self.arrow, self.start + offset)
    }

    /// Put every pin back the way it was when the drag began. Arrows
    /// made sticky during the drag stay pinned; arrows merged away since
    /// are skipped.
    pub fn end(self, quiver: &mut Quiver) -> Result<()> {
        for (id, pinned) in self.pins {
            if quiver.arrow(id).is_some_and(|a| a.is_merged()) {
                continue;
            }
            let pinned = pinned || quiver.stay_pinned(id)?;
            quiver.pin(id, pinned)?;
        }
        debug!(arrow = %self.arrow, "drag ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;
    use crate::ops::BinaryOp;
    use crate::quiver::ArrowSpec;

    #[test]
    fn dragging_the_only_variable_pins_all_variables() {
        let mut q = Quiver::default();
        let a = q.add(ArrowSpec::Variable(Complex::new(1.0, 0.0))).unwrap();
        let b = q.add(ArrowSpec::Variable(Complex::new(0.0, 1.0))).unwrap();
        let sum = q.add(ArrowSpec::Derived(BinaryOp::Add, a, b)).unwrap();

        let drag = Drag::begin(&mut q, a).unwrap();
        assert!(drag.pins_variables());
        assert!(q.is_pinned(a).unwrap() && q.is_pinned(b).unwrap());
        assert!(!q.is_pinned(sum).unwrap());

        drag.move_by(&mut q, Complex::new(1.0, 0.0)).unwrap();
        assert_eq!(Complex::new(2.0, 0.0), q.position(a).unwrap());
        q.settle();
        let at = q.position(sum).unwrap();
        assert!(approx_eq!(f64, 2.0, at.re, epsilon = 1e-2));
        assert!(approx_eq!(f64, 1.0, at.im, epsilon = 1e-2));
        assert_eq!(Complex::new(0.0, 1.0), q.position(b).unwrap());

        drag.end(&mut q).unwrap();
        assert!(!q.is_pinned(a).unwrap());
        assert!(!q.is_pinned(b).unwrap());
    }

    #[test]
    fn dragging_a_result_moves_its_operands() {
        let mut q = Quiver::default();
        let a = q.add(ArrowSpec::Variable(Complex::new(1.0, 0.0))).unwrap();
        let b = q.add(ArrowSpec::Variable(Complex::new(0.0, 1.0))).unwrap();
        let sum = q.add(ArrowSpec::Derived(BinaryOp::Add, a, b)).unwrap();

        let drag = Drag::begin(&mut q, sum).unwrap();
        assert!(!drag.pins_variables());
        assert!(q.is_pinned(sum).unwrap());
        assert!(!q.is_pinned(a).unwrap());

        drag.move_by(&mut q, Complex::new(2.0, 0.0)).unwrap();
        q.settle();
        assert_eq!(Complex::new(3.0, 1.0), q.position(sum).unwrap());
        let moved = q.position(a).unwrap() + q.position(b).unwrap();
        assert!(approx_eq!(f64, 3.0, moved.re, epsilon = 1e-2));

        drag.end(&mut q).unwrap();
        for id in [a, b, sum] {
            assert!(!q.is_pinned(id).unwrap());
        }

        // the diagram is free again: a new constraint can pull the operands
        let ten = q.add(ArrowSpec::Constant(Complex::new(10.0, 0.0))).unwrap();
        q.merge(&[sum, ten]).unwrap();
        assert!(q.settle().converged);
        let moved = q.position(a).unwrap() + q.position(b).unwrap();
        assert!(approx_eq!(f64, 10.0, moved.re, epsilon = 1e-2));
        assert!(approx_eq!(f64, 0.0, moved.im, epsilon = 1e-2));
    }

    #[test]
    fn pins_are_restored_after_a_drag() {
        let mut q = Quiver::default();
        let a = q.add(ArrowSpec::Variable(Complex::new(1.0, 0.0))).unwrap();
        let b = q.add(ArrowSpec::Variable(Complex::new(0.0, 1.0))).unwrap();
        let sum = q.add(ArrowSpec::Derived(BinaryOp::Add, a, b)).unwrap();
        q.pin(b, true).unwrap();

        let drag = Drag::begin(&mut q, a).unwrap();
        assert!(drag.pins_variables());
        drag.move_by(&mut q, Complex::new(0.5, 0.0)).unwrap();
        q.settle();
        drag.end(&mut q).unwrap();
        assert!(!q.is_pinned(a).unwrap());
        assert!(q.is_pinned(b).unwrap());
        assert!(!q.is_pinned(sum).unwrap());

        let drag = Drag::begin(&mut q, sum).unwrap();
        q.set_stay_pinned(a, true).unwrap();
        drag.end(&mut q).unwrap();
        assert!(q.is_pinned(a).unwrap());
        assert!(q.is_pinned(b).unwrap());
        assert!(!q.is_pinned(sum).unwrap());
    }

    #[test]
    fn sticky_pins_survive_a_drag() {
        let mut q = Quiver::default();
        let a = q.add(ArrowSpec::Variable(Complex::new(1.0, 0.0))).unwrap();
        let square = q.add(ArrowSpec::Derived(BinaryOp::Multiply, a, a)).unwrap();
        q.set_stay_pinned(square, true).unwrap();

        let drag = Drag::begin(&mut q, square).unwrap();
        drag.end(&mut q).unwrap();
        assert!(q.is_pinned(square).unwrap());
    }

    #[test]
    fn constants_cannot_be_dragged() {
        let mut q = Quiver::default();
        let one = q.one();
        let err = Drag::begin(&mut q, one).unwrap_err();
        assert_eq!(quiver_core::ErrorCode::ImmovableConstant, err.code);
    }
}
