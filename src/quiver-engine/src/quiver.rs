// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! A quiver is a collection of arrows (complex numbers), some of them
//! defined in terms of others. Each arrow is backed by a pair of wires in
//! the constraint network; the quiver keeps the two views consistent and
//! owns the operations that unify arrows and synthesize inverses.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;

use quiver_core::common::{Error, ErrorCode, ErrorKind, Result};
use quiver_core::{Complex, quiver_err};

use crate::binding::ComplexHandle;
use crate::bytecode::{self, Program};
use crate::config::SolverConfig;
use crate::label::{self, LabelTable, Operand};
use crate::network::{Network, WireId};
use crate::ops::{BinaryOp, Op, Provenance};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrowId(usize);

impl ArrowId {
    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Self {
        ArrowId(index)
    }
}

impl fmt::Display for ArrowId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "arrow#{}", self.0)
    }
}

/// What to build.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ArrowSpec {
    Constant(Complex),
    Variable(Complex),
    Derived(BinaryOp, ArrowId, ArrowId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Arrow {
    pub id: ArrowId,
    pub op: Op,
    pub operands: Option<(ArrowId, ArrowId)>,
    pub handle: ComplexHandle,
    /// Last position synced from the network.
    pub at: Complex,
    /// Sticky pin: survives `pin_all(false)` and the end of a drag.
    pub stay_pinned: bool,
    pub merged_into: Option<ArrowId>,
    /// Arrows merged into this one, oldest first.
    pub aliases: Vec<ArrowId>,
    pub label: Option<String>,
}

impl Arrow {
    pub fn is_merged(&self) -> bool {
        self.merged_into.is_some()
    }

    pub fn is_constant(&self) -> bool {
        self.op == Op::Constant
    }
}

/// A position where an inverse of `source` under `op` could be created.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InverseCandidate {
    pub source: ArrowId,
    pub op: BinaryOp,
    pub at: Complex,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Add(ArrowId),
    Move(ArrowId),
    Merge {
        representative: ArrowId,
        merged: Vec<ArrowId>,
    },
}

/// Outcome of driving relaxation until the error is small.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Settled {
    pub batches: usize,
    pub steps: usize,
    pub error: f64,
    pub converged: bool,
}

type Watcher = Box<dyn FnMut(&Event)>;

pub struct Quiver {
    config: SolverConfig,
    network: Network,
    arrows: Vec<Arrow>,
    active: Vec<ArrowId>,
    labels: LabelTable,
    zero: ArrowId,
    one: ArrowId,
    watchers: Vec<Watcher>,
}

impl Default for Quiver {
    fn default() -> Self {
        Quiver::new(SolverConfig::default())
    }
}

impl fmt::Debug for Quiver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Quiver")
            .field("arrows", &self.arrows)
            .field("active", &self.active)
            .field("wires", &self.network.wire_count())
            .field("constraints", &self.network.constraints().len())
            .finish()
    }
}

fn does_not_exist(id: ArrowId) -> Error {
    Error::new(
        ErrorKind::Quiver,
        ErrorCode::DoesNotExist,
        Some(format!("{id}")),
    )
}

impl Quiver {
    /// A quiver holding the constants `0`, `1` and `-1`; the first two are
    /// the identities inverses are merged against.
    pub fn new(config: SolverConfig) -> Self {
        let network = Network::new(&config);
        let mut quiver = Quiver {
            config,
            network,
            arrows: Vec::new(),
            active: Vec::new(),
            labels: LabelTable::default(),
            zero: ArrowId(0),
            one: ArrowId(1),
            watchers: Vec::new(),
        };
        for value in [Complex::ZERO, Complex::ONE, -Complex::ONE] {
            let spec = ArrowSpec::Constant(value);
            let label = quiver.auto_label(spec);
            quiver.insert(spec, label);
        }
        quiver
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn zero(&self) -> ArrowId {
        self.zero
    }

    pub fn one(&self) -> ArrowId {
        self.one
    }

    /// The standard constant that is the identity element of `op`.
    pub fn identity(&self, op: BinaryOp) -> ArrowId {
        match op {
            BinaryOp::Add => self.zero,
            BinaryOp::Multiply => self.one,
        }
    }

    pub fn add_watcher(&mut self, watcher: impl FnMut(&Event) + 'static) {
        self.watchers.push(Box::new(watcher));
    }

    fn notify(&mut self, event: Event) {
        for watcher in self.watchers.iter_mut() {
            watcher(&event);
        }
    }

    fn get(&self, id: ArrowId) -> Result<&Arrow> {
        self.arrows.get(id.0).ok_or_else(|| does_not_exist(id))
    }

    /// Follow merges to the active arrow that now stands for `id`.
    pub fn resolve(&self, id: ArrowId) -> Result<ArrowId> {
        let mut id = id;
        while let Some(next) = self.get(id)?.merged_into {
            id = next;
        }
        Ok(id)
    }

    /// The arrow record for `id` itself, merged or not. Every other
    /// accessor taking an `ArrowId` acts on the arrow `id` resolves to.
    pub fn arrow(&self, id: ArrowId) -> Option<&Arrow> {
        self.arrows.get(id.0)
    }

    pub fn label(&self, id: ArrowId) -> Result<Option<&str>> {
        let id = self.resolve(id)?;
        Ok(self.arrows[id.0].label.as_deref())
    }

    pub fn position(&self, id: ArrowId) -> Result<Complex> {
        let id = self.resolve(id)?;
        Ok(self.arrows[id.0].at)
    }

    pub fn is_pinned(&self, id: ArrowId) -> Result<bool> {
        let id = self.resolve(id)?;
        Ok(self.network.is_complex_pinned(self.arrows[id.0].handle))
    }

    pub fn stay_pinned(&self, id: ArrowId) -> Result<bool> {
        let id = self.resolve(id)?;
        Ok(self.arrows[id.0].stay_pinned)
    }

    pub fn provenance(&self, id: ArrowId) -> Result<Provenance> {
        let id = self.resolve(id)?;
        let arrow = &self.arrows[id.0];
        let operands = match arrow.operands {
            Some((a, b)) => Some((self.position(a)?, self.position(b)?)),
            None => None,
        };
        Ok(arrow.op.provenance(self.position(id)?, operands))
    }

    pub fn active_ids(&self) -> &[ArrowId] {
        &self.active
    }

    pub fn active(&self) -> impl Iterator<Item = &Arrow> + '_ {
        self.active.iter().map(move |id| &self.arrows[id.0])
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn free_arrows(&self) -> impl Iterator<Item = &Arrow> + '_ {
        self.active().filter(|arrow| !arrow.is_constant())
    }

    /// The first variable, used as the input of field plots.
    pub fn independent_variable(&self) -> Option<ArrowId> {
        self.active()
            .find(|arrow| arrow.op == Op::Variable)
            .map(|arrow| arrow.id)
    }

    pub fn find_label(&self, label: &str) -> Option<ArrowId> {
        self.active()
            .find(|arrow| arrow.label.as_deref() == Some(label))
            .map(|arrow| arrow.id)
    }

    pub fn rename(&mut self, id: ArrowId, label: &str) -> Result<()> {
        let id = self.resolve(id)?;
        self.arrows[id.0].label = Some(label.to_owned());
        Ok(())
    }

    pub fn next_variable_name(&self) -> String {
        let variables = self.active().filter(|a| a.op == Op::Variable).count();
        label::variable_label(variables)
    }

    /// True once something other than a plain variable is holding the
    /// diagram in place: a merge, or a sticky-pinned result.
    pub fn has_constrained_result(&self) -> bool {
        self.active().any(|arrow| {
            !arrow.aliases.is_empty() || (arrow.op != Op::Variable && arrow.stay_pinned)
        })
    }

    fn resolve_spec(&self, spec: ArrowSpec) -> Result<ArrowSpec> {
        Ok(match spec {
            ArrowSpec::Derived(op, lhs, rhs) => {
                ArrowSpec::Derived(op, self.resolve(lhs)?, self.resolve(rhs)?)
            }
            leaf => leaf,
        })
    }

    fn auto_label(&mut self, spec: ArrowSpec) -> Option<String> {
        let label = match spec {
            ArrowSpec::Constant(z) => label::constant_label(z),
            ArrowSpec::Variable(_) => self.next_variable_name(),
            ArrowSpec::Derived(op, lhs, rhs) => {
                let id = ArrowId(self.arrows.len());
                let lhs = Operand {
                    id: lhs,
                    label: self.arrows[lhs.0].label.as_deref().unwrap_or(""),
                };
                let rhs = Operand {
                    id: rhs,
                    label: self.arrows[rhs.0].label.as_deref().unwrap_or(""),
                };
                self.labels.derived(id, op, lhs, rhs)
            }
        };
        Some(label)
    }

    /// Add an arrow, labeled the usual way for its kind.
    pub fn add(&mut self, spec: ArrowSpec) -> Result<ArrowId> {
        let spec = self.resolve_spec(spec)?;
        let label = self.auto_label(spec);
        Ok(self.insert(spec, label))
    }

    /// Add an arrow with an explicit label, or none at all.
    pub fn add_labeled(&mut self, spec: ArrowSpec, label: Option<String>) -> Result<ArrowId> {
        let spec = self.resolve_spec(spec)?;
        Ok(self.insert(spec, label))
    }

    // operands in `spec` must already be resolved
    fn insert(&mut self, spec: ArrowSpec, label: Option<String>) -> ArrowId {
        let id = ArrowId(self.arrows.len());
        let (op, operands, at) = match spec {
            ArrowSpec::Constant(z) => (Op::Constant, None, z),
            ArrowSpec::Variable(z) => (Op::Variable, None, z),
            ArrowSpec::Derived(op, lhs, rhs) => {
                let op = Op::from(op);
                let operands = (self.arrows[lhs.0].at, self.arrows[rhs.0].at);
                (op, Some((lhs, rhs)), op.recompute(Complex::ZERO, Some(operands)))
            }
        };
        let handles = operands.map(|(a, b)| (self.arrows[a.0].handle, self.arrows[b.0].handle));
        let name = label.clone().unwrap_or_else(|| format!("_{}", id.0));
        let handle = op.make_constraint(&mut self.network, &name, at, handles);

        self.arrows.push(Arrow {
            id,
            op,
            operands,
            handle,
            at,
            stay_pinned: false,
            merged_into: None,
            aliases: Vec::new(),
            label,
        });
        self.active.push(id);
        debug!(arrow = %id, ?op, label = %name, "added arrow");
        self.notify(Event::Add(id));
        id
    }

    /// Pin or unpin both wires of an arrow. Constants stay pinned.
    pub fn pin(&mut self, id: ArrowId, on: bool) -> Result<()> {
        let id = self.resolve(id)?;
        let arrow = &self.arrows[id.0];
        let on = on || arrow.is_constant();
        self.network.pin_complex(arrow.handle, on);
        Ok(())
    }

    /// `pin` every non-constant arrow that isn't sticky-pinned.
    pub fn pin_all(&mut self, on: bool) {
        for arrow in self.active.iter().map(|id| &self.arrows[id.0]) {
            if !arrow.is_constant() && !arrow.stay_pinned {
                self.network.pin_complex(arrow.handle, on);
            }
        }
    }

    /// `pin` every variable that isn't sticky-pinned.
    pub fn pin_variables(&mut self, on: bool) {
        for arrow in self.active.iter().map(|id| &self.arrows[id.0]) {
            if arrow.op == Op::Variable && !arrow.stay_pinned {
                self.network.pin_complex(arrow.handle, on);
            }
        }
    }

    pub fn set_stay_pinned(&mut self, id: ArrowId, on: bool) -> Result<()> {
        let id = self.resolve(id)?;
        if self.arrows[id.0].is_constant() {
            return Ok(());
        }
        self.arrows[id.0].stay_pinned = on;
        self.pin(id, on)
    }

    /// Flip the sticky pin, returning the new state.
    pub fn toggle_stay_pinned(&mut self, id: ArrowId) -> Result<bool> {
        let id = self.resolve(id)?;
        let on = !self.arrows[id.0].stay_pinned;
        self.set_stay_pinned(id, on)?;
        Ok(self.arrows[id.0].stay_pinned)
    }

    /// Move an arrow directly, as a drag does. The network is not relaxed.
    pub fn set_position(&mut self, id: ArrowId, at: Complex) -> Result<()> {
        let id = self.resolve(id)?;
        self.arrows[id.0].at = at;
        self.network.set_complex_value(self.arrows[id.0].handle, at);
        self.notify(Event::Move(id));
        Ok(())
    }

    pub fn total_error(&self) -> f64 {
        self.network.total_error()
    }

    /// Relax, then publish the solved wire values as arrow positions.
    pub fn relax_and_sync(&mut self, steps: usize) {
        self.network.relax(steps);
        for id in self.active.iter() {
            let arrow = &mut self.arrows[id.0];
            arrow.at = self.network.complex_value(arrow.handle);
        }
    }

    /// Relax in batches until the error drops to `epsilon` or the batch
    /// budget runs out.
    pub fn settle(&mut self) -> Settled {
        let epsilon = self.config.epsilon;
        let batch_steps = self.config.batch_steps;
        let mut settled = Settled {
            batches: 0,
            steps: 0,
            error: self.total_error(),
            converged: false,
        };
        while settled.error > epsilon && settled.batches < self.config.max_batches {
            self.relax_and_sync(batch_steps);
            settled.batches += 1;
            settled.steps += batch_steps;
            settled.error = self.total_error();
        }
        settled.converged = settled.error <= epsilon;
        debug!(
            batches = settled.batches,
            error = settled.error,
            converged = settled.converged,
            "settled"
        );
        settled
    }

    /// Groups of active arrows lying within `tolerance` of each other.
    ///
    /// By default clusters are formed in scan order: each unclaimed arrow
    /// gathers the later unclaimed arrows close to it. Two arrows that are
    /// each close to a third but not to each other may end up apart. With
    /// `transitive_coincidences` set, clusters are the connected components
    /// of the "within tolerance" relation instead.
    pub fn find_coincidences(&self, tolerance: f64) -> Vec<Vec<ArrowId>> {
        if self.config.transitive_coincidences {
            self.transitive_coincidences(tolerance)
        } else {
            self.scan_coincidences(tolerance)
        }
    }

    fn scan_coincidences(&self, tolerance: f64) -> Vec<Vec<ArrowId>> {
        let n = self.active.len();
        let mut claimed = vec![false; n];
        let mut clusters = Vec::new();
        for i in 0..n {
            if claimed[i] {
                continue;
            }
            let at_i = self.arrows[self.active[i].0].at;
            let mut cluster = vec![self.active[i]];
            for j in (i + 1)..n {
                if !claimed[j] && at_i.distance(self.arrows[self.active[j].0].at) < tolerance {
                    claimed[j] = true;
                    cluster.push(self.active[j]);
                }
            }
            if cluster.len() > 1 {
                claimed[i] = true;
                clusters.push(cluster);
            }
        }
        clusters
    }

    fn transitive_coincidences(&self, tolerance: f64) -> Vec<Vec<ArrowId>> {
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        let n = self.active.len();
        let mut parent: Vec<usize> = (0..n).collect();
        for i in 0..n {
            let at_i = self.arrows[self.active[i].0].at;
            for j in (i + 1)..n {
                if at_i.distance(self.arrows[self.active[j].0].at) < tolerance {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        // keep the earliest arrow as the root
                        parent[ri.max(rj)] = ri.min(rj);
                    }
                }
            }
        }

        let mut clusters: Vec<Vec<ArrowId>> = Vec::new();
        let mut by_root: HashMap<usize, usize> = HashMap::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            let slot = *by_root.entry(root).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[slot].push(self.active[i]);
        }
        clusters.retain(|cluster| cluster.len() > 1);
        clusters
    }

    /// Make every arrow in `cluster` one and the same, returning the
    /// representative. Constants win over variables, variables over
    /// derived arrows; otherwise the first member wins.
    ///
    /// Panics on an empty cluster.
    pub fn merge(&mut self, cluster: &[ArrowId]) -> Result<ArrowId> {
        assert!(!cluster.is_empty(), "merge requires a non-empty cluster");

        let mut members: Vec<ArrowId> = Vec::with_capacity(cluster.len());
        for &id in cluster {
            let id = self.resolve(id)?;
            if !members.contains(&id) {
                members.push(id);
            }
        }

        let pick = |op: Op| members.iter().copied().find(|id| self.arrows[id.0].op == op);
        let repr = pick(Op::Constant)
            .or_else(|| pick(Op::Variable))
            .unwrap_or(members[0]);
        let repr_handle = self.arrows[repr.0].handle;

        // Shared constant wires stay put: rewriting them would drag along
        // every other arrow on the same wire.
        let kept: HashSet<WireId> = self
            .active
            .iter()
            .filter(|&&id| id == repr || !members.contains(&id))
            .flat_map(|id| self.arrows[id.0].handle.wires())
            .collect();
        let mut substs: HashMap<WireId, WireId> = HashMap::new();
        let mut conflicting: HashSet<WireId> = HashSet::new();
        let mut merged = Vec::with_capacity(members.len() - 1);
        for id in members.iter().copied().filter(|&id| id != repr) {
            let wires = self.arrows[id.0].handle.wires();
            for (old, new) in wires.into_iter().zip(repr_handle.wires()) {
                if kept.contains(&old) {
                    continue;
                }
                if substs.insert(old, new).is_some_and(|previous| previous != new) {
                    conflicting.insert(old);
                }
            }

            self.arrows[id.0].merged_into = Some(repr);
            let alias_label = self.arrows[id.0].label.clone();
            let repr_arrow = &mut self.arrows[repr.0];
            repr_arrow.aliases.push(id);
            if let Some(alias_label) = alias_label {
                repr_arrow.label = Some(match repr_arrow.label.take() {
                    Some(label) => format!("{label} = {alias_label}"),
                    None => alias_label,
                });
            }
            merged.push(id);
        }
        substs.retain(|wire, _| !conflicting.contains(wire));
        self.network.substitute_wires(&substs);

        let arrows = &self.arrows;
        self.active.retain(|id| !arrows[id.0].is_merged());

        debug!(representative = %repr, merged = merged.len(), "merged arrows");
        self.notify(Event::Merge {
            representative: repr,
            merged,
        });
        Ok(repr)
    }

    /// `find_coincidences` then `merge` each cluster; returns the
    /// representatives.
    pub fn merge_coincidences(&mut self, tolerance: f64) -> Result<Vec<ArrowId>> {
        self.find_coincidences(tolerance)
            .into_iter()
            .map(|cluster| self.merge(&cluster))
            .collect()
    }

    pub fn compute_inverse_candidates(&self, op: BinaryOp) -> Vec<InverseCandidate> {
        self.active()
            .filter_map(|arrow| {
                op.inverse(arrow.at).map(|at| InverseCandidate {
                    source: arrow.id,
                    op,
                    at,
                })
            })
            .collect()
    }

    /// Create a variable constrained to be the inverse of `candidate.source`.
    ///
    /// The new variable starts at the candidate's position; the constraint
    /// `source <op> variable == identity` pulls it to the true inverse as the
    /// network relaxes. Panics when asked for the reciprocal of zero.
    pub fn materialize_inverse(&mut self, candidate: &InverseCandidate) -> Result<ArrowId> {
        let source = self.resolve(candidate.source)?;
        let op = candidate.op;
        if op.inverse(self.arrows[source.0].at).is_none() {
            panic!(
                "no {op} inverse exists for {} at {}",
                source, self.arrows[source.0].at
            );
        }

        let label = op.inverse_label(self.arrows[source.0].label.as_deref().unwrap_or(""));
        let inverse = self.add_labeled(ArrowSpec::Variable(candidate.at), Some(label))?;
        // unlabeled: it is about to become an alias of the identity
        let combined = self.add_labeled(ArrowSpec::Derived(op, source, inverse), None)?;
        self.merge(&[combined, self.identity(op)])?;

        debug!(source = %source, inverse = %inverse, %op, "materialized inverse");
        Ok(inverse)
    }

    /// Compile `output` as a function of `input`, with every other leaf
    /// frozen at its current position.
    pub fn as_function(&self, input: ArrowId, output: ArrowId) -> Result<Program> {
        let input = self.resolve(input)?;
        if !self.arrows[input.0].op.is_leaf() {
            return quiver_err!(
                NotAnInput,
                format!("{input} is derived from other arrows")
            );
        }
        self.get(output)?;
        Ok(bytecode::compile(self, input, output))
    }
}
