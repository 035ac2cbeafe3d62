use crate::cell::{Cell, CellContent};
use crate::error::{Result, WorkbookError};
use cellgraph_dag::NodeKey;
use cellgraph_primitives::{expand_range, parse_address, parse_range, tile, CellAddress};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Sparse cell storage for one sheet, keyed by (row, column).
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
}

impl Sheet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, address: &CellAddress) -> Option<&Cell> {
        self.cells.get(&(address.row, address.column))
    }

    pub(crate) fn get_mut(&mut self, address: &CellAddress) -> Option<&mut Cell> {
        self.cells.get_mut(&(address.row, address.column))
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.values_mut()
    }
}

/// A parsed workbook: ordered named sheets of sparse cells.
///
/// Built once from the external reader's output; cells are never deleted
/// individually, only the whole workbook is replaced.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    name: String,
    sheets: IndexMap<String, Sheet>,
}

impl Workbook {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            sheets: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_sheet(&mut self, name: &str) -> Result<()> {
        if self.sheets.contains_key(name) {
            return Err(WorkbookError::SheetAlreadyExists {
                name: name.to_string(),
            });
        }
        self.sheets.insert(
            name.to_string(),
            Sheet {
                name: name.to_string(),
                cells: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.keys().map(String::as_str).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name)
    }

    /// First sheet, the default for unqualified references.
    pub fn active_sheet(&self) -> Option<&str> {
        self.sheets.keys().next().map(String::as_str)
    }

    pub fn cell_count(&self) -> usize {
        self.sheets.values().map(Sheet::len).sum()
    }

    /// Insert a value or formula cell.
    ///
    /// The sheet must exist; the address is normalized onto it. Claiming an
    /// occupied address is a fatal [`WorkbookError::DuplicateCellAddress`].
    pub fn insert_cell(
        &mut self,
        sheet: &str,
        address: CellAddress,
        content: CellContent,
    ) -> Result<()> {
        let address = address.with_sheet(sheet);
        self.insert(sheet, Cell::new(address, content))
    }

    /// Insert a value-list cell, resolving its raw validation source
    /// (`"Sheet2!A1:A5"`, `"A1,B2"`, …) into member addresses.
    pub fn insert_value_list_cell(
        &mut self,
        sheet: &str,
        address: CellAddress,
        content: CellContent,
        source: &str,
    ) -> Result<()> {
        let members = resolve_value_list_source(sheet, source);
        let address = address.with_sheet(sheet);
        self.insert(sheet, Cell::with_value_list(address, content, members))
    }

    fn insert(&mut self, sheet: &str, cell: Cell) -> Result<()> {
        let entry = self
            .sheets
            .get_mut(sheet)
            .ok_or_else(|| WorkbookError::UnknownSheet {
                name: sheet.to_string(),
            })?;
        let slot = (cell.address().row, cell.address().column);
        if entry.cells.contains_key(&slot) {
            return Err(WorkbookError::DuplicateCellAddress(
                cell.node_key().as_str().to_string(),
            ));
        }
        entry.cells.insert(slot, cell);
        Ok(())
    }

    /// Exact lookup by sheet and address.
    pub fn get_cell(&self, sheet: &str, address: &CellAddress) -> Option<&Cell> {
        self.sheets.get(sheet).and_then(|s| s.get(address))
    }

    pub(crate) fn get_cell_mut(&mut self, sheet: &str, address: &CellAddress) -> Option<&mut Cell> {
        self.sheets.get_mut(sheet).and_then(|s| s.get_mut(address))
    }

    /// Lookup by graph node key.
    pub fn get_by_key(&self, key: &NodeKey) -> Option<&Cell> {
        let address = parse_address(key.reference()).ok()?;
        self.get_cell(key.sheet(), &address)
    }

    pub(crate) fn get_by_key_mut(&mut self, key: &NodeKey) -> Option<&mut Cell> {
        let address = parse_address(key.reference()).ok()?;
        self.get_cell_mut(key.sheet(), &address)
    }

    /// Compatibility lookup for historical data missing sheet tags: exact
    /// (sheet, reference) first, then the first cell anywhere whose bare
    /// reference matches. The fallback can resolve to the wrong sheet when
    /// references repeat across sheets — never use it for graph building.
    pub fn find_by_reference_compat(&self, sheet: &str, reference: &str) -> Option<&Cell> {
        let address = parse_address(reference).ok()?;
        if let Some(cell) = self.get_cell(sheet, &address) {
            return Some(cell);
        }
        self.sheets
            .values()
            .find_map(|s| s.get(&address))
    }

    /// All cells, sheets in workbook order, row-major within a sheet.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.sheets.values().flat_map(Sheet::cells)
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.sheets.values_mut().flat_map(Sheet::cells_mut)
    }

    /// Render the clamped neighborhood of `center` as a markdown table for
    /// prompt context: column-letter header, row-number labels, raw cell
    /// text, blanks for absent cells.
    pub fn tile_context(
        &self,
        sheet: &str,
        center: &CellAddress,
        radius: u32,
    ) -> Result<String> {
        let cells = self.sheet(sheet).ok_or_else(|| WorkbookError::UnknownSheet {
            name: sheet.to_string(),
        })?;

        let window = tile(center, radius);
        let mut lines = Vec::with_capacity(window.height() + 2);
        lines.push(format!("|   | {} |", window.column_letters().join(" | ")));
        lines.push(format!("|---|{}", "---|".repeat(window.width())));
        for row in window.rows() {
            let label = row.first().map_or(0, |addr| addr.row);
            let values: Vec<String> = row
                .iter()
                .map(|addr| {
                    cells
                        .get(addr)
                        .map(|cell| cell.content().display_text())
                        .unwrap_or_default()
                })
                .collect();
            lines.push(format!("| {} | {} |", label, values.join(" | ")));
        }
        Ok(lines.join("\n"))
    }
}

/// Resolve a raw value-list source into member addresses.
///
/// The source is a comma-separated list of options; each option may be a
/// sheet-qualified or bare cell or range reference. Options that do not
/// parse as references (plain literal choices) contribute no addresses.
fn resolve_value_list_source(default_sheet: &str, source: &str) -> Vec<CellAddress> {
    let mut members = Vec::new();
    for option in source.trim().trim_matches('"').split(',') {
        let option = option.trim();
        if option.is_empty() {
            continue;
        }
        if option.contains(':') {
            let expanded = parse_range(option).and_then(|(start, end)| expand_range(&start, &end));
            match expanded {
                Ok(addresses) => members.extend(
                    addresses
                        .into_iter()
                        .map(|addr| qualify(addr, default_sheet)),
                ),
                Err(err) => debug!(option, %err, "skipping unresolvable value-list option"),
            }
        } else if let Ok(address) = parse_address(option) {
            members.push(qualify(address, default_sheet));
        } else {
            debug!(option, "value-list option is a literal, not a reference");
        }
    }
    members
}

fn qualify(address: CellAddress, default_sheet: &str) -> CellAddress {
    if address.sheet.is_some() {
        address
    } else {
        address.with_sheet(default_sheet)
    }
}
