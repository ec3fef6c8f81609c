// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod common;
pub mod complex;

// Re-export key types from common
pub use common::{Error, ErrorCode, ErrorKind, Result};

pub use complex::Complex;
