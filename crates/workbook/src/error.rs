use cellgraph_dag::GraphError;
use cellgraph_primitives::AddressError;
use thiserror::Error;

/// Errors that can occur during workbook operations
#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("duplicate cell address: {0}")]
    DuplicateCellAddress(String),

    #[error("sheet not found: {name}")]
    UnknownSheet { name: String },

    #[error("sheet already exists: {name}")]
    SheetAlreadyExists { name: String },

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, WorkbookError>;
