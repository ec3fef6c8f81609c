// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Scripted diagram sessions: each command stands in for one user gesture.

use std::collections::HashMap;
use std::io::{self, Write};

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use quiver_engine::label::format_number;
use quiver_engine::quiver_core::{Error, ErrorCode, ErrorKind};
use quiver_engine::{ArrowId, ArrowSpec, BinaryOp, Complex, Drag, Quiver, SolverConfig};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Constant {
        at: Complex,
        label: Option<String>,
    },
    Variable {
        at: Complex,
        label: Option<String>,
    },
    Add {
        lhs: String,
        rhs: String,
        label: Option<String>,
    },
    Multiply {
        lhs: String,
        rhs: String,
        label: Option<String>,
    },
    Pin {
        arrow: String,
        #[serde(default = "enabled")]
        on: bool,
    },
    StayPinned {
        arrow: String,
        #[serde(default = "enabled")]
        on: bool,
    },
    /// Drag an arrow to `to`, letting the diagram settle before letting go.
    Drag {
        arrow: String,
        to: Complex,
    },
    /// Merge the named arrows, or every coincident cluster if none are named.
    Merge {
        #[serde(default)]
        arrows: Vec<String>,
    },
    Invert {
        arrow: String,
        op: BinaryOp,
        label: Option<String>,
    },
    Settle,
    Rename {
        arrow: String,
        label: String,
    },
    Eval {
        input: String,
        output: String,
        at: Complex,
    },
    Print,
}

fn enabled() -> bool {
    true
}

fn script_error(code: ErrorCode, details: String) -> Error {
    Error::new(ErrorKind::Script, code, Some(details))
}

pub struct Runner {
    quiver: Quiver,
    names: HashMap<String, ArrowId>,
}

impl Runner {
    pub fn new(config: SolverConfig) -> Self {
        let quiver = Quiver::new(config);
        let mut runner = Runner {
            quiver,
            names: HashMap::new(),
        };
        let standard: Vec<ArrowId> = runner.quiver.active_ids().to_vec();
        for id in standard {
            runner.define(id);
        }
        runner
    }

    fn define(&mut self, id: ArrowId) {
        if let Ok(Some(label)) = self.quiver.label(id) {
            self.names.insert(label.to_owned(), id);
        }
    }

    /// The arrow first given `name`, whether or not it has been merged.
    fn named(&self, name: &str) -> Result<ArrowId> {
        let id = self.names.get(name).copied().ok_or_else(|| {
            script_error(ErrorCode::DoesNotExist, format!("no arrow named '{name}'"))
        })?;
        Ok(id)
    }

    /// The active arrow `name` now stands for.
    fn lookup(&self, name: &str) -> Result<ArrowId> {
        Ok(self.quiver.resolve(self.named(name)?)?)
    }

    fn create(&mut self, spec: ArrowSpec, label: &Option<String>) -> Result<ArrowId> {
        let id = match label {
            Some(label) => self.quiver.add_labeled(spec, Some(label.clone()))?,
            None => self.quiver.add(spec)?,
        };
        self.define(id);
        Ok(id)
    }

    fn derive(
        &mut self,
        op: BinaryOp,
        lhs: &str,
        rhs: &str,
        label: &Option<String>,
    ) -> Result<ArrowId> {
        let (lhs, rhs) = (self.lookup(lhs)?, self.lookup(rhs)?);
        self.create(ArrowSpec::Derived(op, lhs, rhs), label)
    }

    pub fn apply(&mut self, command: &Command, out: &mut impl Write) -> Result<()> {
        match command {
            Command::Constant { at, label } => {
                self.create(ArrowSpec::Constant(*at), label)?;
            }
            Command::Variable { at, label } => {
                self.create(ArrowSpec::Variable(*at), label)?;
            }
            Command::Add { lhs, rhs, label } => {
                self.derive(BinaryOp::Add, lhs, rhs, label)?;
            }
            Command::Multiply { lhs, rhs, label } => {
                self.derive(BinaryOp::Multiply, lhs, rhs, label)?;
            }
            Command::Pin { arrow, on } => {
                let id = self.lookup(arrow)?;
                self.quiver.pin(id, *on)?;
            }
            Command::StayPinned { arrow, on } => {
                let id = self.lookup(arrow)?;
                self.quiver.set_stay_pinned(id, *on)?;
            }
            Command::Drag { arrow, to } => {
                let id = self.lookup(arrow)?;
                let drag = Drag::begin(&mut self.quiver, id)?;
                let offset = *to - self.quiver.position(id)?;
                drag.move_by(&mut self.quiver, offset)?;
                self.settle();
                drag.end(&mut self.quiver)?;
            }
            Command::Merge { arrows } if arrows.is_empty() => {
                let tolerance = self.quiver.config().merge_tolerance;
                let merged = self.quiver.merge_coincidences(tolerance)?;
                debug!(clusters = merged.len(), "merged coincidences");
            }
            Command::Merge { arrows } => {
                let ids = arrows
                    .iter()
                    .map(|name| self.lookup(name))
                    .collect::<Result<Vec<_>>>()?;
                self.quiver.merge(&ids)?;
            }
            Command::Invert { arrow, op, label } => {
                let id = self.lookup(arrow)?;
                let candidate = self
                    .quiver
                    .compute_inverse_candidates(*op)
                    .into_iter()
                    .find(|candidate| candidate.source == id)
                    .ok_or_else(|| {
                        script_error(
                            ErrorCode::BadScript,
                            format!("'{arrow}' has no {op} inverse"),
                        )
                    })?;
                let inverse = self.quiver.materialize_inverse(&candidate)?;
                if let Some(label) = label {
                    self.quiver.rename(inverse, label)?;
                }
                self.define(inverse);
            }
            Command::Settle => self.settle(),
            Command::Rename { arrow, label } => {
                let id = self.lookup(arrow)?;
                self.quiver.rename(id, label)?;
                self.names.insert(label.clone(), id);
            }
            // a merged output is still computed from its own operands
            Command::Eval { input, output, at } => {
                let f = self
                    .quiver
                    .as_function(self.lookup(input)?, self.named(output)?)?;
                writeln!(out, "{output}({at}) = {}", f.eval(*at))?;
            }
            Command::Print => self.print(out)?,
        }
        Ok(())
    }

    fn settle(&mut self) {
        let settled = self.quiver.settle();
        if !settled.converged {
            warn!(
                error = settled.error,
                steps = settled.steps,
                "diagram did not settle"
            );
        }
    }

    /// One row per active arrow: `label re im pinned`.
    pub fn print(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "label\tre\tim\tpinned")?;
        for arrow in self.quiver.active() {
            let pinned = self.quiver.is_pinned(arrow.id).unwrap_or(false);
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                arrow.label.as_deref().unwrap_or(""),
                format_number(arrow.at.re),
                format_number(arrow.at.im),
                pinned
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    fn run(script: &str) -> (Runner, String) {
        let commands: Vec<Command> = serde_json::from_str(script).unwrap();
        let mut runner = Runner::new(SolverConfig::default());
        let mut out = Vec::new();
        for command in commands.iter() {
            runner.apply(command, &mut out).unwrap();
        }
        (runner, String::from_utf8(out).unwrap())
    }

    #[test]
    fn commands_parse() {
        let commands: Vec<Command> = serde_json::from_str(
            r#"[
                {"cmd": "variable", "at": {"re": 1, "im": 0}},
                {"cmd": "pin", "arrow": "a"},
                {"cmd": "stay_pinned", "arrow": "a", "on": false},
                {"cmd": "invert", "arrow": "a", "op": "multiply"},
                {"cmd": "merge"},
                {"cmd": "settle"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            Command::Variable {
                at: Complex::ONE,
                label: None
            },
            commands[0]
        );
        assert_eq!(
            Command::Pin {
                arrow: "a".to_string(),
                on: true
            },
            commands[1]
        );
        assert_eq!(Command::Merge { arrows: vec![] }, commands[4]);
    }

    #[test]
    fn table_lists_active_arrows() {
        let (_, out) = run(
            r#"[
                {"cmd": "variable", "at": {"re": 1, "im": 2}},
                {"cmd": "variable", "at": {"re": 3, "im": 0}, "label": "w"},
                {"cmd": "add", "lhs": "a", "rhs": "w"},
                {"cmd": "print"}
            ]"#,
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!("label\tre\tim\tpinned", lines[0]);
        assert_eq!("0\t0\t0\ttrue", lines[1]);
        assert_eq!("-1\t-1\t0\ttrue", lines[3]);
        assert_eq!("a\t1\t2\tfalse", lines[4]);
        assert_eq!("w\t3\t0\tfalse", lines[5]);
        assert_eq!("a+w\t4\t2\tfalse", lines[6]);
    }

    #[test]
    fn merged_names_still_resolve() {
        let (runner, _) = run(
            r#"[
                {"cmd": "variable", "at": {"re": 2, "im": 0}},
                {"cmd": "constant", "at": {"re": 2, "im": 0}, "label": "two"},
                {"cmd": "merge", "arrows": ["a", "two"]},
                {"cmd": "multiply", "lhs": "a", "rhs": "a", "label": "sq"}
            ]"#,
        );
        let q = &runner.quiver;
        let two = runner.lookup("two").unwrap();
        assert_eq!(two, runner.lookup("a").unwrap());
        assert_eq!(Some("two = a"), q.label(two).unwrap());
        let square = runner.lookup("sq").unwrap();
        assert_eq!(Some((two, two)), q.arrow(square).unwrap().operands);
    }

    #[test]
    fn inverse_and_evaluation() {
        let (runner, out) = run(
            r#"[
                {"cmd": "variable", "at": {"re": 0, "im": 2}},
                {"cmd": "stay_pinned", "arrow": "a"},
                {"cmd": "invert", "arrow": "a", "op": "multiply", "label": "r"},
                {"cmd": "settle"},
                {"cmd": "multiply", "lhs": "a", "rhs": "a"},
                {"cmd": "eval", "input": "a", "output": "a^2", "at": {"re": 3, "im": 0}}
            ]"#,
        );
        let r = runner.quiver.position(runner.lookup("r").unwrap()).unwrap();
        assert!(approx_eq!(f64, 0.0, r.re, epsilon = 1e-2));
        assert!(approx_eq!(f64, -0.5, r.im, epsilon = 1e-2));
        assert_eq!("a^2(3+0i) = 9+0i\n", out);
    }

    #[test]
    fn merged_outputs_evaluate_their_own_arithmetic() {
        let (runner, out) = run(
            r#"[
                {"cmd": "variable", "at": {"re": 1.4, "im": 0}, "label": "x"},
                {"cmd": "multiply", "lhs": "x", "rhs": "x"},
                {"cmd": "constant", "at": {"re": 2, "im": 0}},
                {"cmd": "merge", "arrows": ["2", "x^2"]},
                {"cmd": "eval", "input": "x", "output": "x^2", "at": {"re": 3, "im": 1}}
            ]"#,
        );
        assert_eq!("x^2(3+1i) = 8+6i\n", out);
        assert_eq!(runner.lookup("2").unwrap(), runner.lookup("x^2").unwrap());
    }

    #[test]
    fn dragging_moves_dependents() {
        let (runner, _) = run(
            r#"[
                {"cmd": "variable", "at": {"re": 1, "im": 0}},
                {"cmd": "multiply", "lhs": "a", "rhs": "a"},
                {"cmd": "drag", "arrow": "a", "to": {"re": 0, "im": 1}}
            ]"#,
        );
        let q = &runner.quiver;
        let a = runner.lookup("a").unwrap();
        assert_eq!(Complex::I, q.position(a).unwrap());
        assert!(!q.is_pinned(a).unwrap());
        let square = q.position(runner.lookup("a^2").unwrap()).unwrap();
        assert!(approx_eq!(f64, -1.0, square.re, epsilon = 1e-2));
    }

    #[test]
    fn unknown_names_are_script_errors() {
        let mut runner = Runner::new(SolverConfig::default());
        let command = Command::Pin {
            arrow: "nope".to_string(),
            on: true,
        };
        let err = runner.apply(&command, &mut io::sink()).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert_eq!(ErrorKind::Script, err.kind);
        assert_eq!(ErrorCode::DoesNotExist, err.code);
    }
}
