//! # Cellgraph Formulas
//!
//! Lexes spreadsheet formula text and extracts the reference-shaped operand
//! tokens a formula reads from: cell references, ranges, and defined-name
//! candidates. Evaluation is out of scope; this crate only answers "which
//! inputs does this formula mention, in what order".

mod extract;
mod lexer;

pub use extract::extract_inputs;

use thiserror::Error;

/// Errors raised while lexing or scanning formula text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("formula parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, FormulaError>;

/// Whether a raw cell value is formula text (leading `=`).
pub fn is_formula_text(raw: &str) -> bool {
    let trimmed = raw.trim_start();
    trimmed.starts_with('=') && trimmed.len() > 1
}
