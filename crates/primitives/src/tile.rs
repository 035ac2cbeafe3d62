use crate::address::{number_to_column, CellAddress};
use crate::{MAX_COLUMN, MAX_ROW};
use serde::{Deserialize, Serialize};

/// A rectangular neighborhood of addresses around a center cell.
///
/// Rows are outer, columns inner, so the grid renders directly. Bounds are
/// clamped to the workbook limits independently per axis: a tile centered
/// near an edge shrinks instead of shifting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    rows: Vec<Vec<CellAddress>>,
}

impl Tile {
    /// Grid rows, top to bottom.
    pub fn rows(&self) -> &[Vec<CellAddress>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Column-letter labels for the tile's columns, left to right.
    pub fn column_letters(&self) -> Vec<String> {
        self.rows.first().map_or_else(Vec::new, |row| {
            row.iter()
                .map(|addr| number_to_column(addr.column).unwrap_or_default())
                .collect()
        })
    }

    /// Row-number labels for the tile's rows, top to bottom.
    pub fn row_numbers(&self) -> Vec<u32> {
        self.rows
            .iter()
            .filter_map(|row| row.first().map(|addr| addr.row))
            .collect()
    }
}

/// Build the tile of addresses within `radius` of `center`.
///
/// The center's sheet qualifier, if any, is propagated to every member.
pub fn tile(center: &CellAddress, radius: u32) -> Tile {
    let left = center.column.saturating_sub(radius).max(1);
    let right = center.column.saturating_add(radius).min(MAX_COLUMN);
    let top = center.row.saturating_sub(radius).max(1);
    let bottom = center.row.saturating_add(radius).min(MAX_ROW);

    let mut rows = Vec::with_capacity((bottom - top + 1) as usize);
    for row in top..=bottom {
        let mut cells = Vec::with_capacity((right - left + 1) as usize);
        for column in left..=right {
            let mut addr = CellAddress::new(column, row);
            addr.sheet = center.sheet.clone();
            cells.push(addr);
        }
        rows.push(cells);
    }
    Tile { rows }
}
