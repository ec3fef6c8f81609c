// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Where a real number has one wire, a complex number has two.

use quiver_core::Complex;

use crate::network::{Network, WireId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComplexHandle {
    pub re: WireId,
    pub im: WireId,
}

impl ComplexHandle {
    pub fn wires(self) -> [WireId; 2] {
        [self.re, self.im]
    }
}

impl Network {
    pub fn bind_variable(&mut self, name: &str, initial: Complex) -> ComplexHandle {
        ComplexHandle {
            re: self.create_variable(&format!("{name}.x"), initial.re),
            im: self.create_variable(&format!("{name}.y"), initial.im),
        }
    }

    /// Like `bind_variable`, but reuses wires already bound under `name`.
    pub fn bind_ref(&mut self, name: &str, initial: Complex) -> ComplexHandle {
        ComplexHandle {
            re: self.variable_ref(&format!("{name}.x"), initial.re),
            im: self.variable_ref(&format!("{name}.y"), initial.im),
        }
    }

    pub fn bind_constant(&mut self, value: Complex) -> ComplexHandle {
        ComplexHandle {
            re: self.create_constant(value.re),
            im: self.create_constant(value.im),
        }
    }

    /// A fresh pair of auxiliary wires seeded at `initial`.
    pub fn bind_gensym(&mut self, stem: &str, initial: Complex) -> ComplexHandle {
        ComplexHandle {
            re: self.gensym(&format!("{stem}x"), initial.re),
            im: self.gensym(&format!("{stem}y"), initial.im),
        }
    }

    pub fn compile_add(&mut self, a: ComplexHandle, b: ComplexHandle, v: ComplexHandle) {
        self.add(a.re, b.re, v.re);
        self.add(a.im, b.im, v.im);
    }

    /// A complex product is not one ternary real constraint, so split it:
    ///
    ///   x1 = a.re*b.re   x2 = a.im*b.im   v.re + x2 = x1
    ///   y1 = a.im*b.re   y2 = a.re*b.im   y1 + y2 = v.im
    ///
    /// The auxiliaries start at their true values for the operands' current
    /// wire values.
    pub fn compile_multiply(&mut self, a: ComplexHandle, b: ComplexHandle, v: ComplexHandle) {
        let (a_re, a_im) = (self.value(a.re), self.value(a.im));
        let (b_re, b_im) = (self.value(b.re), self.value(b.im));

        let x1 = self.gensym("x1", a_re * b_re);
        let x2 = self.gensym("x2", a_im * b_im);
        let y1 = self.gensym("y1", a_im * b_re);
        let y2 = self.gensym("y2", a_re * b_im);

        self.multiply(a.re, b.re, x1);
        self.multiply(a.im, b.im, x2);
        self.add(v.re, x2, x1);
        self.multiply(a.im, b.re, y1);
        self.multiply(a.re, b.im, y2);
        self.add(y1, y2, v.im);
    }

    pub fn complex_value(&self, handle: ComplexHandle) -> Complex {
        Complex::new(self.value(handle.re), self.value(handle.im))
    }

    pub fn set_complex_value(&mut self, handle: ComplexHandle, z: Complex) {
        self.set_value(handle.re, z.re);
        self.set_value(handle.im, z.im);
    }

    pub fn pin_complex(&mut self, handle: ComplexHandle, pinned: bool) {
        self.set_pinned(handle.re, pinned);
        self.set_pinned(handle.im, pinned);
    }

    pub fn is_complex_pinned(&self, handle: ComplexHandle) -> bool {
        self.is_pinned(handle.re) && self.is_pinned(handle.im)
    }
}
