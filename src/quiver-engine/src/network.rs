// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! A network of real-valued wires joined by soft ternary constraints,
//! solved by gradient descent on the total squared residual.
//!
//! Wires live in an append-only arena: a `WireId` stays valid for the
//! lifetime of the network and is never reused, even after every
//! constraint that mentioned it has been rewritten by a merge.

use std::collections::HashMap;
use std::fmt;

use ordered_float::OrderedFloat;
use tracing::trace;

use crate::config::{DEFAULT_STEP_SIZE, SolverConfig};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(usize);

impl WireId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Wire {
    pub value: f64,
    /// Pinned wires are held fixed by `relax`.
    pub pinned: bool,
    /// Constants have no name.
    pub name: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Add,
    Multiply,
}

/// Asserts `a <kind> b == v`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub a: WireId,
    pub b: WireId,
    pub v: WireId,
}

impl Constraint {
    fn residual(&self, wires: &[Wire]) -> f64 {
        let a = wires[self.a.0].value;
        let b = wires[self.b.0].value;
        let v = wires[self.v.0].value;
        match self.kind {
            ConstraintKind::Add => a + b - v,
            ConstraintKind::Multiply => a * b - v,
        }
    }

    pub fn mentions(&self, wire: WireId) -> bool {
        self.a == wire || self.b == wire || self.v == wire
    }
}

#[derive(Clone, Debug)]
pub struct Network {
    wires: Vec<Wire>,
    constraints: Vec<Constraint>,
    step_size: f64,
    dedupe_constants: bool,
    constants: HashMap<OrderedFloat<f64>, WireId>,
    gensym_count: usize,
}

impl Default for Network {
    fn default() -> Self {
        Network {
            wires: Vec::new(),
            constraints: Vec::new(),
            step_size: DEFAULT_STEP_SIZE,
            dedupe_constants: false,
            constants: HashMap::new(),
            gensym_count: 0,
        }
    }
}

impl Network {
    pub fn new(config: &SolverConfig) -> Self {
        Network {
            step_size: config.step_size,
            dedupe_constants: config.dedupe_constants,
            ..Default::default()
        }
    }

    fn push_wire(&mut self, value: f64, pinned: bool, name: Option<String>) -> WireId {
        let id = WireId(self.wires.len());
        self.wires.push(Wire {
            value,
            pinned,
            name,
        });
        id
    }

    pub fn create_variable(&mut self, name: &str, initial: f64) -> WireId {
        self.push_wire(initial, false, Some(name.to_owned()))
    }

    /// Returns the wire already carrying `name`, or a fresh variable.
    pub fn variable_ref(&mut self, name: &str, initial: f64) -> WireId {
        match self
            .wires
            .iter()
            .position(|w| w.name.as_deref() == Some(name))
        {
            Some(i) => WireId(i),
            None => self.create_variable(name, initial),
        }
    }

    /// A fresh auxiliary variable named `{stem}_{n}`.
    pub fn gensym(&mut self, stem: &str, initial: f64) -> WireId {
        let name = format!("{}_{}", stem, self.gensym_count);
        self.gensym_count += 1;
        self.create_variable(&name, initial)
    }

    pub fn create_constant(&mut self, value: f64) -> WireId {
        if !self.dedupe_constants {
            return self.push_wire(value, true, None);
        }
        // normalize -0.0 so it shares a key with 0.0
        let key = OrderedFloat(if value == 0.0 { 0.0 } else { value });
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let id = self.push_wire(value, true, None);
        self.constants.insert(key, id);
        id
    }

    pub fn add_constraint(&mut self, kind: ConstraintKind, a: WireId, b: WireId, v: WireId) {
        self.constraints.push(Constraint { kind, a, b, v });
    }

    pub fn add(&mut self, a: WireId, b: WireId, v: WireId) {
        self.add_constraint(ConstraintKind::Add, a, b, v);
    }

    pub fn multiply(&mut self, a: WireId, b: WireId, v: WireId) {
        self.add_constraint(ConstraintKind::Multiply, a, b, v);
    }

    /// Partial derivatives of the total error with respect to every wire,
    /// pinned or not.
    pub fn gradient(&self) -> Vec<f64> {
        let mut pd = vec![0.0; self.wires.len()];
        self.accumulate_gradient(&mut pd);
        pd
    }

    fn accumulate_gradient(&self, pd: &mut [f64]) {
        pd.iter_mut().for_each(|d| *d = 0.0);
        for c in self.constraints.iter() {
            let diff = c.residual(&self.wires);
            match c.kind {
                // E = 0.5 * (a + b - v)^2
                ConstraintKind::Add => {
                    pd[c.a.0] += diff;
                    pd[c.b.0] += diff;
                    pd[c.v.0] -= diff;
                }
                // E = 0.5 * (a * b - v)^2
                ConstraintKind::Multiply => {
                    let av = self.wires[c.a.0].value;
                    let bv = self.wires[c.b.0].value;
                    pd[c.a.0] += diff * bv;
                    pd[c.b.0] += diff * av;
                    pd[c.v.0] -= diff;
                }
            }
        }
    }

    /// Run `steps` synchronous gradient descent steps. Every wire's gradient
    /// is taken from the same snapshot before any wire moves.
    pub fn relax(&mut self, steps: usize) {
        let mut pd = vec![0.0; self.wires.len()];
        for _ in 0..steps {
            self.accumulate_gradient(&mut pd);
            for (wire, d) in self.wires.iter_mut().zip(pd.iter()) {
                if !wire.pinned {
                    wire.value -= self.step_size * d;
                }
            }
        }
        trace!(
            steps,
            wires = self.wires.len(),
            constraints = self.constraints.len(),
            "relaxed"
        );
    }

    pub fn total_error(&self) -> f64 {
        self.constraints
            .iter()
            .map(|c| {
                let r = c.residual(&self.wires);
                0.5 * r * r
            })
            .sum()
    }

    /// Rewrite constraint operands in place; wires themselves are untouched.
    pub fn substitute_wires(&mut self, mapping: &HashMap<WireId, WireId>) {
        for c in self.constraints.iter_mut() {
            if let Some(&w) = mapping.get(&c.a) {
                c.a = w;
            }
            if let Some(&w) = mapping.get(&c.b) {
                c.b = w;
            }
            if let Some(&w) = mapping.get(&c.v) {
                c.v = w;
            }
        }
    }

    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id.0]
    }

    pub fn value(&self, id: WireId) -> f64 {
        self.wires[id.0].value
    }

    pub fn set_value(&mut self, id: WireId, value: f64) {
        self.wires[id.0].value = value;
    }

    pub fn is_pinned(&self, id: WireId) -> bool {
        self.wires[id.0].pinned
    }

    pub fn set_pinned(&mut self, id: WireId, pinned: bool) {
        self.wires[id.0].pinned = pinned;
    }

    pub fn name(&self, id: WireId) -> Option<&str> {
        self.wires[id.0].name.as_deref()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn satisfied_pinned_network_stays_at_zero_error() {
        let mut net = Network::default();
        let a = net.create_constant(2.0);
        let b = net.create_constant(3.0);
        let sum = net.create_constant(5.0);
        let product = net.create_constant(6.0);
        net.add(a, b, sum);
        net.multiply(a, b, product);

        assert_eq!(0.0, net.total_error());
        net.relax(1000);
        assert_eq!(0.0, net.total_error());
        assert_eq!(5.0, net.value(sum));
        assert_eq!(6.0, net.value(product));
    }

    #[test]
    fn add_converges() {
        let mut net = Network::default();
        let a = net.create_constant(2.0);
        let b = net.create_constant(3.0);
        let v = net.create_variable("v", 0.0);
        net.add(a, b, v);

        net.relax(1200);
        assert!(approx_eq!(f64, 5.0, net.value(v), epsilon = 1e-4));
        assert_eq!(2.0, net.value(a));
        assert_eq!(3.0, net.value(b));
    }

    #[test]
    fn multiply_converges() {
        let mut net = Network::default();
        let a = net.create_constant(2.0);
        let b = net.create_constant(3.0);
        let v = net.create_variable("v", 0.0);
        net.multiply(a, b, v);

        net.relax(2000);
        assert!(approx_eq!(f64, 6.0, net.value(v), epsilon = 1e-4));
    }

    #[test]
    fn error_decreases_monotonically_for_small_steps() {
        let mut net = Network::default();
        let a = net.create_variable("a", 1.0);
        let b = net.create_variable("b", 1.0);
        let v = net.create_constant(10.0);
        net.add(a, b, v);

        let mut last = net.total_error();
        for _ in 0..20 {
            net.relax(10);
            let error = net.total_error();
            assert!(error < last, "{error} should be below {last}");
            last = error;
        }
    }

    #[test]
    fn gradient_is_taken_before_any_update() {
        // two constraints sharing `a`; if `a` moved between them the
        // gradient of `b` would see the updated value
        let mut net = Network::default();
        let a = net.create_variable("a", 1.0);
        let b = net.create_variable("b", 2.0);
        let c = net.create_variable("c", 0.0);
        net.add(a, b, c);
        net.multiply(a, b, c);

        let pd = net.gradient();
        // add: r = 3, multiply: r = 2
        assert_eq!(3.0 + 2.0 * 2.0, pd[a.index()]);
        assert_eq!(3.0 + 2.0 * 1.0, pd[b.index()]);
        assert_eq!(-3.0 - 2.0, pd[c.index()]);

        net.relax(1);
        assert!(approx_eq!(f64, 1.0 - 0.01 * 7.0, net.value(a), ulps = 2));
        assert!(approx_eq!(f64, 2.0 - 0.01 * 5.0, net.value(b), ulps = 2));
        assert!(approx_eq!(f64, 0.0 + 0.01 * 5.0, net.value(c), ulps = 2));
    }

    #[test]
    fn pinned_gradient_is_discarded() {
        let mut net = Network::default();
        let a = net.create_variable("a", 1.0);
        let b = net.create_constant(1.0);
        let v = net.create_variable("v", 7.0);
        net.add(a, b, v);
        net.set_pinned(a, true);

        assert_ne!(0.0, net.gradient()[a.index()]);
        net.relax(500);
        assert_eq!(1.0, net.value(a));
        assert!(net.value(v) < 7.0);
    }

    #[test]
    fn substitute_rewrites_every_operand() {
        let mut net = Network::default();
        let a = net.create_variable("a", 1.0);
        let b = net.create_variable("b", 1.0);
        let c = net.create_variable("c", 2.0);
        let d = net.create_variable("d", 1.0);
        net.add(a, b, c);
        net.multiply(b, b, b);

        let mapping: HashMap<WireId, WireId> = [(b, d)].into_iter().collect();
        net.substitute_wires(&mapping);

        assert_eq!(
            &[
                Constraint {
                    kind: ConstraintKind::Add,
                    a,
                    b: d,
                    v: c
                },
                Constraint {
                    kind: ConstraintKind::Multiply,
                    a: d,
                    b: d,
                    v: d
                },
            ],
            net.constraints()
        );
        // the old wire is still addressable
        assert_eq!(Some("b"), net.name(b));
        assert_eq!(4, net.wire_count());
    }

    #[test]
    fn constants_are_not_deduplicated_by_default() {
        let mut net = Network::default();
        let a = net.create_constant(1.0);
        let b = net.create_constant(1.0);
        assert_ne!(a, b);
        assert!(net.is_pinned(a) && net.is_pinned(b));
        assert_eq!(None, net.name(a));
    }

    #[test]
    fn constants_deduplicate_when_configured() {
        let config = SolverConfig {
            dedupe_constants: true,
            ..Default::default()
        };
        let mut net = Network::new(&config);
        let a = net.create_constant(1.0);
        let b = net.create_constant(1.0);
        let z = net.create_constant(0.0);
        let neg_z = net.create_constant(-0.0);
        assert_eq!(a, b);
        assert_eq!(z, neg_z);
        assert_eq!(2, net.wire_count());
    }

    #[test]
    fn constants_are_distinct_by_default() {
        let mut net = Network::default();
        let a = net.create_constant(1.0);
        let b = net.create_constant(1.0);
        assert_ne!(a, b);
        assert_eq!(2, net.wire_count());
        assert!(net.constants.is_empty());
    }

    #[test]
    fn variable_ref_reuses_names() {
        let mut net = Network::default();
        let a = net.variable_ref("a.x", 1.0);
        let again = net.variable_ref("a.x", 5.0);
        assert_eq!(a, again);
        assert_eq!(1.0, net.value(a));

        let t0 = net.gensym("t", 0.0);
        let t1 = net.gensym("t", 0.0);
        assert_eq!(Some("t_0"), net.name(t0));
        assert_eq!(Some("t_1"), net.name(t1));
    }
}
