//! Controller dialect definitions.
//!
//! The two supported dialects differ in comment syntax (`;` to end of line
//! versus parentheses), variable syntax (`R<n>` versus `#<n>`) and in which
//! tokens may follow an address letter. Each dialect owns a fixed
//! [`Grammar`] of precompiled patterns.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::command::Axis;
use crate::error::{GcodeError, Result};

/// G-code controller dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Siemens Sinumerik: `;` comments, `R<n>` parameters, `X=expr` words.
    Siemens,
    /// Fanuc: `( )` comments, `#<n>` macro variables, plain numeric words.
    #[default]
    Fanuc,
}

/// Precompiled token patterns for one dialect.
pub(crate) struct Grammar {
    /// Variable reference; group 1 is the variable number.
    pub variable: Regex,
    /// Variable assignment; group 1 is the number, group 2 the expression.
    pub assignment: Regex,
    /// Axis words in [`Axis::ALL`] order; group 1 is the value expression.
    pub axes: [Regex; 5],
    /// Feed word.
    pub feed: Regex,
    /// Spindle word.
    pub spindle: Regex,
}

/// Number, `R<n>`, `#<n>` or `FUNC(...)` operand accepted in Siemens words.
const SIEMENS_OPERAND: &str = r"(?:\d+\.?\d*|\.\d+|R\d+|#\d+|(?:[A-Z]+\([^)]*\)))";
/// Operand accepted in Siemens feed/spindle words.
const SIEMENS_RATE_OPERAND: &str = r"(?:\d+\.?\d*|\.\d+|R\d+)";
/// Operand accepted in Fanuc words.
const FANUC_OPERAND: &str = r"(?:\d+\.?\d*|\.\d+|#\d+)";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("dialect pattern is a valid regex")
}

fn siemens_word(letter: char, operand: &str) -> Regex {
    compile(&format!(
        r"\b{letter}\s*=?\s*([-+]?{operand}(?:[+\-*/]{operand})*)"
    ))
}

fn fanuc_word(letter: char) -> Regex {
    compile(&format!(r"\b{letter}\s*([-+]?{FANUC_OPERAND})"))
}

static SIEMENS: LazyLock<Grammar> = LazyLock::new(|| Grammar {
    variable: compile(r"R(\d+)"),
    assignment: compile(r"\bR(\d+)\s*=\s*([^;\s]+)"),
    axes: Axis::ALL.map(|axis| siemens_word(axis.letter(), SIEMENS_OPERAND)),
    feed: siemens_word('F', SIEMENS_RATE_OPERAND),
    spindle: siemens_word('S', SIEMENS_RATE_OPERAND),
});

static FANUC: LazyLock<Grammar> = LazyLock::new(|| Grammar {
    variable: compile(r"#(\d+)"),
    assignment: compile(r"#(\d+)\s*=\s*(\S+)"),
    axes: Axis::ALL.map(|axis| fanuc_word(axis.letter())),
    feed: fanuc_word('F'),
    spindle: fanuc_word('S'),
});

static PAREN_COMMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"\(([^)]*)\)"));

impl Dialect {
    /// Parse a dialect name (`siemens`/`sinumerik` or `fanuc`, any case).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "siemens" | "sinumerik" => Ok(Dialect::Siemens),
            "fanuc" => Ok(Dialect::Fanuc),
            other => Err(GcodeError::UnknownDialect(other.to_string())),
        }
    }

    pub(crate) fn grammar(&self) -> &'static Grammar {
        match self {
            Dialect::Siemens => &SIEMENS,
            Dialect::Fanuc => &FANUC,
        }
    }

    /// Remove comments from a line and trim the rest.
    pub fn strip_comment<'a>(&self, line: &'a str) -> Cow<'a, str> {
        match self {
            Dialect::Siemens => {
                let code = line.split(';').next().unwrap_or_default();
                Cow::Borrowed(code.trim())
            }
            Dialect::Fanuc => match PAREN_COMMENT.replace_all(line, "") {
                Cow::Borrowed(code) => Cow::Borrowed(code.trim()),
                Cow::Owned(code) => Cow::Owned(code.trim().to_string()),
            },
        }
    }

    /// Comment text of a line (without delimiters), if it has one.
    ///
    /// Fanuc lines report only their first parenthesized comment.
    pub fn comment<'a>(&self, line: &'a str) -> Option<&'a str> {
        match self {
            Dialect::Siemens => line.split_once(';').map(|(_, comment)| comment.trim()),
            Dialect::Fanuc => PAREN_COMMENT
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim()),
        }
    }
}
