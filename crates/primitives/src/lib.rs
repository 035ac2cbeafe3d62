//! # Cellgraph Primitives
//!
//! Core address types for spreadsheet dependency analysis: the column-letter
//! codec, A1-style cell and range parsing (sheet-qualified, `$`-anchored),
//! rectangular range expansion, and clamped tile windows.

mod address;
mod error;
mod range;
mod tile;

pub use address::{column_to_number, number_to_column, parse_address, CellAddress};
pub use error::{AddressError, Result};
pub use range::{expand_range, expand_range_with_limit, parse_range, DEFAULT_MAX_RANGE_CELLS};
pub use tile::{tile, Tile};

/// Largest addressable column (XFD in the workbook format's A1 notation).
pub const MAX_COLUMN: u32 = 16_384;

/// Largest addressable row.
pub const MAX_ROW: u32 = 1_048_576;
