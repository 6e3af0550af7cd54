// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::{error, fmt, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    // node mutation
    InvalidObject,
    IndexExceedsSize,
    InvalidAttributeValue,
    UnexpectedAttribute,
    OperationFailed,
    // formula lexing and parsing
    EmptyFormula,
    UnrecognizedToken,
    UnrecognizedEof,
    ExtraToken,
    ExpectedNumber,
    ExpectedIdent,
    AmbiguousLog,
    BadArgumentCount,
    BadLambdaArgument,
    UnsupportedSyntax,
    ExpressionTooDeep,
    // mathml
    XmlDeserialization,
    XmlSerialization,
    MissingMathElement,
    UnknownMathMLElement,
    BadMathMLElement,
    MathMLPrefixMismatch,
    BadNumber,
    UnknownExtensionKind,
    // units
    UnknownUnitKind,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            InvalidObject => "invalid_object",
            IndexExceedsSize => "index_exceeds_size",
            InvalidAttributeValue => "invalid_attribute_value",
            UnexpectedAttribute => "unexpected_attribute",
            OperationFailed => "operation_failed",
            EmptyFormula => "empty_formula",
            UnrecognizedToken => "unrecognized_token",
            UnrecognizedEof => "unrecognized_eof",
            ExtraToken => "extra_token",
            ExpectedNumber => "expected_number",
            ExpectedIdent => "expected_ident",
            AmbiguousLog => "ambiguous_log",
            BadArgumentCount => "bad_argument_count",
            BadLambdaArgument => "bad_lambda_argument",
            UnsupportedSyntax => "unsupported_syntax",
            ExpressionTooDeep => "expression_too_deep",
            XmlDeserialization => "xml_deserialization",
            XmlSerialization => "xml_serialization",
            MissingMathElement => "missing_math_element",
            UnknownMathMLElement => "unknown_mathml_element",
            BadMathMLElement => "bad_mathml_element",
            MathMLPrefixMismatch => "mathml_prefix_mismatch",
            BadNumber => "bad_number",
            UnknownExtensionKind => "unknown_extension_kind",
            UnknownUnitKind => "unknown_unit_kind",
        };

        write!(f, "{name}")
    }
}

/// FormulaError is a problem found while lexing or parsing infix text.
/// `start` and `end` are byte offsets into the formula.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormulaError {
    pub start: usize,
    pub end: usize,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl FormulaError {
    pub fn new(code: ErrorCode, start: usize, end: usize) -> Self {
        FormulaError {
            start,
            end,
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// 1-based (line, column) of the start of the error in `text`.
    pub fn line_column(&self, text: &str) -> (usize, usize) {
        line_column(text, self.start)
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref details) = self.details {
            write!(f, "{}:{}:{} -- {}", self.start, self.end, self.code, details)
        } else {
            write!(f, "{}:{}:{}", self.start, self.end, self.code)
        }
    }
}

impl error::Error for FormulaError {}

pub type FormulaResult<T> = result::Result<T, FormulaError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Ast,
    Formula,
    MathML,
    Units,
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
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Ast => "ast",
            ErrorKind::Formula => "formula",
            ErrorKind::MathML => "mathml",
            ErrorKind::Units => "units",
        };
        match self.details {
            Some(ref details) => write!(f, "{kind}:{}: {details}", self.code),
            None => write!(f, "{kind}:{}", self.code),
        }
    }
}

impl error::Error for Error {}

impl From<FormulaError> for Error {
    fn from(err: FormulaError) -> Self {
        Error {
            kind: ErrorKind::Formula,
            code: err.code,
            details: err.details,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! ast_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Ast, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Ast, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! formula_err(
    ($code:tt, $start:expr, $end:expr) => {{
        use $crate::common::{ErrorCode, FormulaError};
        Err(FormulaError::new(ErrorCode::$code, $start, $end))
    }}
);

/// 1-based line and column of byte offset `pos` in `text`.
pub fn line_column(text: &str, pos: usize) -> (usize, usize) {
    let pos = pos.min(text.len());
    let mut line = 1;
    let mut line_start = 0;
    for (i, c) in text.char_indices() {
        if i >= pos {
            break;
        }
        if c == '\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    let column = text
        .get(line_start..pos)
        .map(|s| s.chars().count())
        .unwrap_or(0)
        + 1;
    (line, column)
}

/// LoggedError is one diagnostic accumulated while reading formulas or
/// MathML.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedError {
    pub code: ErrorCode,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for LoggedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.line, self.column, self.code, self.message
        )
    }
}

/// ErrorLog accumulates diagnostics so that readers can keep going
/// after a problem instead of aborting the whole document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorLog {
    errors: Vec<LoggedError>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn log_error(&mut self, code: ErrorCode, line: usize, column: usize, message: &str) {
        self.errors.push(LoggedError {
            code,
            line,
            column,
            message: message.to_owned(),
        });
    }

    pub fn log_formula_error(&mut self, text: &str, err: &FormulaError) {
        let (line, column) = err.line_column(text);
        let message = match err.details {
            Some(ref details) => details.clone(),
            None => err.code.to_string(),
        };
        self.log_error(err.code, line, column, &message);
    }

    pub fn errors(&self) -> &[LoggedError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|err| err.code == code)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}

#[test]
fn test_line_column() {
    assert_eq!((1, 1), line_column("a + b", 0));
    assert_eq!((1, 5), line_column("a + b", 4));
    assert_eq!((2, 3), line_column("a +\n b * c", 6));
    // offsets past the end clamp to the end of the text
    assert_eq!((1, 4), line_column("abc", 10));
}

#[test]
fn test_error_display() {
    let err = FormulaError::new(ErrorCode::UnrecognizedToken, 2, 3);
    assert_eq!("2:3:unrecognized_token", format!("{err}"));

    let err = err.with_details("unexpected '&'");
    assert_eq!("2:3:unrecognized_token -- unexpected '&'", format!("{err}"));

    let err: Error = err.into();
    assert_eq!(ErrorKind::Formula, err.kind);
    assert_eq!(
        "formula:unrecognized_token: unexpected '&'",
        format!("{err}")
    );
}

#[test]
fn test_error_log() {
    let mut log = ErrorLog::new();
    assert!(log.is_empty());

    let text = "a +\n & b";
    let err = FormulaError::new(ErrorCode::UnrecognizedToken, 5, 6);
    log.log_formula_error(text, &err);

    assert_eq!(1, log.len());
    assert!(log.has_code(ErrorCode::UnrecognizedToken));
    assert!(!log.has_code(ErrorCode::ExtraToken));
    let logged = &log.errors()[0];
    assert_eq!((2, 2), (logged.line, logged.column));
    assert_eq!("2:2: unrecognized_token: unrecognized_token", logged.to_string());

    log.clear();
    assert!(log.is_empty());
}
