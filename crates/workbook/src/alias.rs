use cellgraph_dag::NodeKey;
use cellgraph_primitives::{parse_address, CellAddress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One raw defined-name entry from the external workbook reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedName {
    pub name: String,
    pub sheet: String,
    /// Destination as the reader spells it, e.g. `$B$2` or `B2:C4`.
    pub reference: String,
}

impl DefinedName {
    pub fn new<N, S, R>(name: N, sheet: S, reference: R) -> Self
    where
        N: Into<String>,
        S: Into<String>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            sheet: sheet.into(),
            reference: reference.into(),
        }
    }
}

/// Bidirectional mapping between workbook-defined names and concrete
/// single-cell addresses.
///
/// Only single-cell destinations participate: range-valued defined names are
/// skipped at build time, not expanded. Duplicate definitions for the same
/// name are last-write-wins, and a given (sheet, address) keeps at most one
/// alias — a later name for the same destination displaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    forward: HashMap<String, (String, CellAddress)>,
    reverse: HashMap<NodeKey, String>,
}

impl AliasTable {
    /// Build the table from the reader's raw defined-names list.
    pub fn build(defined_names: &[DefinedName]) -> Self {
        let mut table = AliasTable::default();
        let mut skipped = 0usize;

        for entry in defined_names {
            if entry.reference.contains(':') {
                debug!(name = %entry.name, reference = %entry.reference, "skipping range-valued defined name");
                skipped += 1;
                continue;
            }
            let Ok(address) = parse_address(&entry.reference) else {
                debug!(name = %entry.name, reference = %entry.reference, "skipping unparseable defined name");
                skipped += 1;
                continue;
            };
            let sheet = address
                .sheet
                .clone()
                .unwrap_or_else(|| entry.sheet.clone());
            table.insert(&entry.name, &sheet, address);
        }

        debug!(
            aliases = table.len(),
            skipped, "alias table built from defined names"
        );
        table
    }

    fn insert(&mut self, name: &str, sheet: &str, address: CellAddress) {
        let key = NodeKey::new(sheet, &address);

        // Last write wins on both sides of the mapping.
        if let Some((old_sheet, old_address)) = self.forward.remove(name) {
            debug!(name, "overwriting earlier definition of alias");
            self.reverse.remove(&NodeKey::new(&old_sheet, &old_address));
        }
        if let Some(old_name) = self.reverse.remove(&key) {
            self.forward.remove(&old_name);
        }

        self.forward
            .insert(name.to_string(), (sheet.to_string(), address));
        self.reverse.insert(key, name.to_string());
    }

    /// Case-sensitive lookup of an alias token. `None` means "not an alias";
    /// the caller falls back to literal address parsing.
    pub fn resolve(&self, token: &str) -> Option<(&str, &CellAddress)> {
        self.forward
            .get(token)
            .map(|(sheet, address)| (sheet.as_str(), address))
    }

    /// Reverse lookup: the alias naming a concrete (sheet, address), if any.
    pub fn alias_for(&self, sheet: &str, address: &CellAddress) -> Option<&str> {
        self.reverse
            .get(&NodeKey::new(sheet, address))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
