// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub use quiver_core;

pub mod binding;
pub mod bytecode;
pub mod config;
pub mod drag;
pub mod label;
pub mod network;
pub mod ops;
pub mod quiver;
mod vm;

pub use self::binding::ComplexHandle;
pub use self::bytecode::Program;
pub use self::config::SolverConfig;
pub use self::drag::Drag;
pub use self::network::{Constraint, ConstraintKind, Network, WireId};
pub use self::ops::{BinaryOp, Op, Provenance};
pub use self::quiver::{Arrow, ArrowId, ArrowSpec, Event, InverseCandidate, Quiver, Settled};
pub use self::vm::Vm;
pub use quiver_core::{Complex, Error, ErrorCode, ErrorKind, Result};
