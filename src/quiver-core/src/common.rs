// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,      // will never be produced
    DoesNotExist, // the named or numbered entity doesn't exist
    NotAnInput,
    ImmovableConstant,
    BadConfig,
    BadScript,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            DoesNotExist => "does_not_exist",
            NotAnInput => "not_an_input",
            ImmovableConstant => "immovable_constant",
            BadConfig => "bad_config",
            BadScript => "bad_script",
        };

        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Quiver,
    Config,
    Script,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Quiver => "QuiverError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Script => "ScriptError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! quiver_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Quiver, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Quiver, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! config_err(
    ($str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Config, ErrorCode::BadConfig, Some($str)))
    }}
);

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Quiver,
        ErrorCode::DoesNotExist,
        Some("arrow 7".to_string()),
    );
    assert_eq!("QuiverError{does_not_exist: arrow 7}", format!("{err}"));

    let err = Error::new(ErrorKind::Config, ErrorCode::BadConfig, None);
    assert_eq!("ConfigError{bad_config}", format!("{err}"));
}

#[test]
fn test_error_macros() {
    let r: Result<()> = quiver_err!(NotAnInput, "c".to_string());
    let err = r.unwrap_err();
    assert_eq!(ErrorKind::Quiver, err.kind);
    assert_eq!(ErrorCode::NotAnInput, err.code);
    assert_eq!(Some("c".to_string()), err.get_details());

    let r: Result<()> = config_err!("step_size must be positive".to_string());
    assert_eq!(ErrorCode::BadConfig, r.unwrap_err().code);
}
