//! # Cellgraph Workbook
//!
//! The workbook cell model and the dependency pipeline built on it: alias
//! resolution for defined names, the staged precedent/dependent rebuild,
//! the derived dependency graph with layer scheduling, and tile context
//! rendering for prompt construction.
//!
//! # Examples
//!
//! ```
//! use cellgraph_primitives::parse_address;
//! use cellgraph_workbook::{AliasTable, CellContent, Workbook};
//!
//! let mut workbook = Workbook::new("quote");
//! workbook.add_sheet("Sheet1").unwrap();
//! for (reference, raw) in [("A1", "5"), ("A2", "10"), ("A3", "=A1+A2")] {
//!     workbook
//!         .insert_cell("Sheet1", parse_address(reference).unwrap(), CellContent::parse(raw))
//!         .unwrap();
//! }
//!
//! let report = workbook.rebuild_dependencies(&AliasTable::default());
//! assert!(report.warnings.is_empty());
//!
//! let layers = workbook.layer_schedule().unwrap();
//! assert_eq!(layers.len(), 2);
//! assert!(layers[1].iter().any(|key| key.reference() == "A3"));
//! ```

mod alias;
mod cell;
mod error;
mod linker;
mod workbook;

/// Re-export alias table types.
pub use alias::{AliasTable, DefinedName};
/// Re-export the cell record and its content model.
pub use cell::{Cell, CellContent, CellKind, CellSnapshot, ScalarValue};
/// Re-export workbook error types.
pub use error::{Result, WorkbookError};
/// Re-export rebuild report types.
pub use linker::{LinkReport, LinkWarning};
/// Re-export the workbook container.
pub use workbook::{Sheet, Workbook};
