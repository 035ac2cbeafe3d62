use crate::address::{parse_address, CellAddress};
use crate::error::{AddressError, Result};

/// Default cap on the number of cells a single range may expand to.
pub const DEFAULT_MAX_RANGE_CELLS: u64 = 10_000;

/// Parse an `A1:B10`-style token into its two end addresses.
///
/// A sheet qualifier on the first end applies to both; qualifying the ends
/// with two different sheets is rejected.
pub fn parse_range(token: &str) -> Result<(CellAddress, CellAddress)> {
    let trimmed = token.trim();
    let mut parts = trimmed.splitn(2, ':');
    let (start_token, end_token) = match (parts.next(), parts.next()) {
        (Some(start), Some(end)) if !end.contains(':') => (start, end),
        _ => return Err(AddressError::InvalidRange(token.to_string())),
    };

    let start = parse_address(start_token)?;
    let mut end = parse_address(end_token)?;
    match (&start.sheet, &end.sheet) {
        (Some(sheet), None) => end.sheet = Some(sheet.clone()),
        (Some(a), Some(b)) if a != b => {
            return Err(AddressError::InvalidRange(token.to_string()));
        }
        _ => {}
    }
    Ok((start, end))
}

/// Expand a range into its member addresses using [`DEFAULT_MAX_RANGE_CELLS`].
pub fn expand_range(start: &CellAddress, end: &CellAddress) -> Result<Vec<CellAddress>> {
    expand_range_with_limit(start, end, DEFAULT_MAX_RANGE_CELLS)
}

/// Expand a range into every member address of its rectangular span.
///
/// Enumeration is column-outer/row-inner; downstream input lists rely on
/// this order. Members inherit the start end's sheet and anchor flags. A
/// range whose end precedes its start on either axis is invalid, and a span
/// of more than `max_cells` members is refused outright.
pub fn expand_range_with_limit(
    start: &CellAddress,
    end: &CellAddress,
    max_cells: u64,
) -> Result<Vec<CellAddress>> {
    if start.sheet.is_some() && end.sheet.is_some() && start.sheet != end.sheet {
        return Err(AddressError::InvalidRange(format!("{start}:{end}")));
    }
    if end.column < start.column || end.row < start.row {
        return Err(AddressError::InvalidRange(format!("{start}:{end}")));
    }

    let cells =
        u64::from(end.column - start.column + 1) * u64::from(end.row - start.row + 1);
    if cells > max_cells {
        return Err(AddressError::RangeTooLarge {
            cells,
            max: max_cells,
        });
    }

    let mut members = Vec::with_capacity(cells as usize);
    for column in start.column..=end.column {
        for row in start.row..=end.row {
            members.push(CellAddress {
                sheet: start.sheet.clone(),
                column,
                row,
                column_anchored: start.column_anchored,
                row_anchored: start.row_anchored,
            });
        }
    }
    Ok(members)
}
