use crate::alias::AliasTable;
use crate::error::Result;
use crate::workbook::Workbook;
use cellgraph_dag::{DependencyGraph, Layers, NodeKey};
use cellgraph_formulas::extract_inputs;
use cellgraph_primitives::{expand_range, parse_address, parse_range, CellAddress};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Non-fatal problems found while linking one workbook pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkWarning {
    /// A formula's inputs could not be extracted; the cell links as if it
    /// had none.
    FormulaParse { cell: NodeKey, message: String },
    /// One token of a formula resolved to neither an alias, a range, nor a
    /// single address. The rest of the formula still links.
    BadReference {
        cell: NodeKey,
        token: String,
        message: String,
    },
}

/// Outcome of a dependency rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    pub formula_cells: usize,
    pub edges: usize,
    pub dangling: usize,
    pub warnings: Vec<LinkWarning>,
}

#[derive(Debug, Default)]
struct StagedLinks {
    precedents: BTreeSet<NodeKey>,
    inputs: Vec<CellAddress>,
}

impl Workbook {
    /// Rebuild every cell's precedent/dependent sets from its current
    /// formula text.
    ///
    /// All edges are staged first and committed in one sweep, so readers
    /// never observe a half-linked workbook: the commit clears every cell's
    /// previous links and installs the staged sets. Per-formula and
    /// per-token failures degrade to [`LinkWarning`]s; a dangling reference
    /// (target cell absent) stays recorded as a precedent with no mirror.
    pub fn rebuild_dependencies(&mut self, aliases: &AliasTable) -> LinkReport {
        let mut report = LinkReport::default();
        let mut staged: BTreeMap<NodeKey, StagedLinks> = BTreeMap::new();
        let mut staged_dependents: BTreeMap<NodeKey, BTreeSet<NodeKey>> = BTreeMap::new();

        for cell in self.cells() {
            let Some(formula) = cell.formula() else {
                continue;
            };
            report.formula_cells += 1;
            let cell_key = cell.node_key();
            let own_sheet = cell.sheet().to_string();

            let tokens = match extract_inputs(formula) {
                Ok(tokens) => tokens,
                Err(err) => {
                    report.warnings.push(LinkWarning::FormulaParse {
                        cell: cell_key.clone(),
                        message: err.to_string(),
                    });
                    // Still stage an empty entry so stale links get cleared.
                    staged.entry(cell_key).or_default();
                    continue;
                }
            };

            let mut links = StagedLinks::default();
            for token in tokens {
                let addresses = match resolve_token(aliases, &own_sheet, &token) {
                    Ok(addresses) => addresses,
                    Err(message) => {
                        report.warnings.push(LinkWarning::BadReference {
                            cell: cell_key.clone(),
                            token,
                            message,
                        });
                        continue;
                    }
                };
                for address in addresses {
                    let sheet = address.sheet.as_deref().unwrap_or(&own_sheet);
                    let target = NodeKey::new(sheet, &address);
                    let first_sighting = links.precedents.insert(target.clone());
                    links.inputs.push(address);
                    if self.get_by_key(&target).is_some() {
                        staged_dependents
                            .entry(target)
                            .or_default()
                            .insert(cell_key.clone());
                    } else if first_sighting {
                        report.dangling += 1;
                    }
                }
            }
            staged.insert(cell_key, links);
        }

        // Commit: wipe previous links everywhere, then install staged sets.
        for cell in self.cells_mut() {
            cell.clear_links();
        }
        for (key, links) in staged {
            report.edges += links.precedents.len();
            if let Some(cell) = self.get_by_key_mut(&key) {
                cell.install_links(links.precedents, links.inputs);
            }
        }
        for (target, dependents) in staged_dependents {
            if let Some(cell) = self.get_by_key_mut(&target) {
                for dependent in dependents {
                    cell.add_dependent(dependent);
                }
            }
        }

        debug!(
            formula_cells = report.formula_cells,
            edges = report.edges,
            dangling = report.dangling,
            warnings = report.warnings.len(),
            "dependency rebuild committed"
        );
        report
    }

    /// Derive the dependency graph from the cells' committed edge sets.
    ///
    /// Each cell contributes its precedent and dependent halves separately;
    /// the graph's consistency check then proves the bidirectional invariant
    /// over the whole workbook. Dangling precedents become layer-0 nodes
    /// with a synthesized mirror, since they have no cell record to carry one.
    pub fn dependency_graph(&self) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::new();
        for cell in self.cells() {
            let key = cell.node_key();
            for precedent in cell.precedents() {
                if self.get_by_key(precedent).is_some() {
                    graph.record_precedent(&key, precedent.clone());
                } else {
                    graph.add_edge(precedent.clone(), key.clone());
                }
            }
            for dependent in cell.dependents() {
                graph.record_dependent(&key, dependent.clone());
            }
        }
        graph.validate_consistency()?;
        Ok(graph)
    }

    /// Ordered processing batches: every cell's precedents sit in strictly
    /// earlier layers. A cycle is a fatal error naming the unresolved cells.
    pub fn layer_schedule(&self) -> Result<Layers> {
        Ok(self.dependency_graph()?.layers()?)
    }
}

/// Resolve one extracted token to zero or more sheet-qualified addresses.
///
/// Resolution order: defined-name alias, then range, then single address.
/// Digit-only tokens are numeric noise and resolve to nothing. Errors are
/// messages for a [`LinkWarning::BadReference`].
fn resolve_token(
    aliases: &AliasTable,
    own_sheet: &str,
    token: &str,
) -> std::result::Result<Vec<CellAddress>, String> {
    if !token.is_empty() && token.chars().all(|ch| ch.is_ascii_digit()) {
        return Ok(Vec::new());
    }
    if let Some((sheet, address)) = aliases.resolve(token) {
        return Ok(vec![address.clone().with_sheet(sheet)]);
    }
    if token.contains(':') {
        let (start, end) = parse_range(token).map_err(|err| err.to_string())?;
        let members = expand_range(&start, &end).map_err(|err| err.to_string())?;
        return Ok(members
            .into_iter()
            .map(|address| qualify(address, own_sheet))
            .collect());
    }
    let address = parse_address(token).map_err(|err| err.to_string())?;
    Ok(vec![qualify(address, own_sheet)])
}

fn qualify(address: CellAddress, own_sheet: &str) -> CellAddress {
    if address.sheet.is_some() {
        address
    } else {
        address.with_sheet(own_sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::DefinedName;
    use crate::cell::CellContent;

    fn insert(workbook: &mut Workbook, sheet: &str, reference: &str, raw: &str) {
        workbook
            .insert_cell(
                sheet,
                cellgraph_primitives::parse_address(reference).unwrap(),
                CellContent::parse(raw),
            )
            .unwrap();
    }

    fn key(sheet: &str, reference: &str) -> NodeKey {
        NodeKey::from_reference(sheet, reference)
    }

    fn simple_workbook() -> Workbook {
        let mut workbook = Workbook::new("book");
        workbook.add_sheet("Sheet1").unwrap();
        insert(&mut workbook, "Sheet1", "A1", "5");
        insert(&mut workbook, "Sheet1", "A2", "10");
        insert(&mut workbook, "Sheet1", "A3", "=A1+A2");
        workbook
    }

    #[test]
    fn test_end_to_end_example() {
        let mut workbook = simple_workbook();
        let report = workbook.rebuild_dependencies(&AliasTable::default());
        assert_eq!(report.formula_cells, 1);
        assert_eq!(report.edges, 2);
        assert!(report.warnings.is_empty());

        let a3 = workbook.get_by_key(&key("Sheet1", "A3")).unwrap();
        assert_eq!(
            a3.precedents().iter().cloned().collect::<Vec<_>>(),
            [key("Sheet1", "A1"), key("Sheet1", "A2")]
        );
        let a1 = workbook.get_by_key(&key("Sheet1", "A1")).unwrap();
        assert_eq!(
            a1.dependents().iter().cloned().collect::<Vec<_>>(),
            [key("Sheet1", "A3")]
        );

        let layers = workbook.layer_schedule().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], [key("Sheet1", "A1"), key("Sheet1", "A2")].into());
        assert_eq!(layers[1], [key("Sheet1", "A3")].into());
    }

    #[test]
    fn test_edge_consistency_after_rebuild() {
        let mut workbook = Workbook::new("book");
        workbook.add_sheet("Sheet1").unwrap();
        workbook.add_sheet("Sheet2").unwrap();
        insert(&mut workbook, "Sheet1", "A1", "1");
        insert(&mut workbook, "Sheet1", "B1", "=A1*2");
        insert(&mut workbook, "Sheet2", "C1", "=Sheet1!B1+SUM(Sheet1!A1:A1)");
        workbook.rebuild_dependencies(&AliasTable::default());

        // dependency_graph runs validate_consistency internally.
        let graph = workbook.dependency_graph().unwrap();
        for cell in workbook.cells() {
            let cell_key = cell.node_key();
            for precedent in cell.precedents() {
                let target = workbook.get_by_key(precedent).unwrap();
                assert!(target.dependents().contains(&cell_key));
            }
            for dependent in cell.dependents() {
                let source = workbook.get_by_key(dependent).unwrap();
                assert!(source.precedents().contains(&cell_key));
            }
        }
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_range_expansion_preserves_input_order() {
        let mut workbook = Workbook::new("book");
        workbook.add_sheet("Sheet1").unwrap();
        insert(&mut workbook, "Sheet1", "D1", "=SUM(A1:B2)");
        workbook.rebuild_dependencies(&AliasTable::default());

        let cell = workbook.get_by_key(&key("Sheet1", "D1")).unwrap();
        let inputs: Vec<String> = cell
            .formula_inputs()
            .iter()
            .map(|address| address.reference())
            .collect();
        // Column-outer, row-inner expansion order.
        assert_eq!(inputs, ["A1", "A2", "B1", "B2"]);
    }

    #[test]
    fn test_alias_resolves_like_literal() {
        let aliases = AliasTable::build(&[DefinedName::new("Rate", "Sheet1", "$B$2")]);
        let mut by_alias = Workbook::new("book");
        by_alias.add_sheet("Sheet1").unwrap();
        insert(&mut by_alias, "Sheet1", "B2", "0.2");
        insert(&mut by_alias, "Sheet1", "C1", "=Rate*2");
        by_alias.rebuild_dependencies(&aliases);

        let mut by_literal = Workbook::new("book");
        by_literal.add_sheet("Sheet1").unwrap();
        insert(&mut by_literal, "Sheet1", "B2", "0.2");
        insert(&mut by_literal, "Sheet1", "C1", "=Sheet1!B2*2");
        by_literal.rebuild_dependencies(&aliases);

        let via_alias = by_alias.get_by_key(&key("Sheet1", "C1")).unwrap();
        let via_literal = by_literal.get_by_key(&key("Sheet1", "C1")).unwrap();
        assert_eq!(via_alias.precedents(), via_literal.precedents());
        assert_eq!(
            via_alias.precedents().iter().cloned().collect::<Vec<_>>(),
            [key("Sheet1", "B2")]
        );
    }

    #[test]
    fn test_dangling_reference_is_recorded_not_fatal() {
        let mut workbook = Workbook::new("book");
        workbook.add_sheet("Sheet1").unwrap();
        insert(&mut workbook, "Sheet1", "A1", "=Z99+1");
        let report = workbook.rebuild_dependencies(&AliasTable::default());
        assert_eq!(report.dangling, 1);
        assert!(report.warnings.is_empty());

        let cell = workbook.get_by_key(&key("Sheet1", "A1")).unwrap();
        assert!(cell.precedents().contains(&key("Sheet1", "Z99")));

        // The dangling precedent becomes a layer-0 node.
        let layers = workbook.layer_schedule().unwrap();
        assert!(layers[0].contains(&key("Sheet1", "Z99")));
        assert!(layers[1].contains(&key("Sheet1", "A1")));
    }

    #[test]
    fn test_malformed_formula_degrades_to_warning() {
        let mut workbook = Workbook::new("book");
        workbook.add_sheet("Sheet1").unwrap();
        insert(&mut workbook, "Sheet1", "A1", "1");
        insert(&mut workbook, "Sheet1", "B1", "=A1 ~ 2");
        insert(&mut workbook, "Sheet1", "C1", "=A1+1");
        let report = workbook.rebuild_dependencies(&AliasTable::default());

        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            LinkWarning::FormulaParse { cell, .. } if cell == &key("Sheet1", "B1")
        ));

        // The bad cell has no inputs; the rest of the workbook still links.
        let bad = workbook.get_by_key(&key("Sheet1", "B1")).unwrap();
        assert!(bad.precedents().is_empty());
        let good = workbook.get_by_key(&key("Sheet1", "C1")).unwrap();
        assert!(good.precedents().contains(&key("Sheet1", "A1")));
    }

    #[test]
    fn test_bad_token_is_local_to_the_token() {
        let aliases = AliasTable::default();
        let err = resolve_token(&aliases, "Sheet1", "NotARef").unwrap_err();
        assert!(err.contains("invalid cell address"));

        let mut workbook = Workbook::new("book");
        workbook.add_sheet("Sheet1").unwrap();
        insert(&mut workbook, "Sheet1", "A1", "1");
        insert(&mut workbook, "Sheet1", "B1", "=A1+Unknown");
        let report = workbook.rebuild_dependencies(&AliasTable::default());

        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            LinkWarning::BadReference { token, .. } if token == "Unknown"
        ));
        let cell = workbook.get_by_key(&key("Sheet1", "B1")).unwrap();
        assert!(cell.precedents().contains(&key("Sheet1", "A1")));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut workbook = simple_workbook();
        let first = workbook.rebuild_dependencies(&AliasTable::default());
        let snapshot: Vec<_> = workbook.cells().map(|cell| cell.snapshot()).collect();

        let second = workbook.rebuild_dependencies(&AliasTable::default());
        let again: Vec<_> = workbook.cells().map(|cell| cell.snapshot()).collect();

        assert_eq!(first, second);
        assert_eq!(snapshot, again);
    }

    #[test]
    fn test_cycle_fails_layering_with_named_cells() {
        let mut workbook = Workbook::new("book");
        workbook.add_sheet("Sheet1").unwrap();
        insert(&mut workbook, "Sheet1", "A1", "=B1");
        insert(&mut workbook, "Sheet1", "B1", "=A1");
        workbook.rebuild_dependencies(&AliasTable::default());

        let err = workbook.layer_schedule().unwrap_err();
        match err {
            crate::error::WorkbookError::Graph(
                cellgraph_dag::GraphError::CyclicDependency { unresolved },
            ) => {
                assert_eq!(unresolved, vec![key("Sheet1", "A1"), key("Sheet1", "B1")]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_range_cap_degrades_to_warning() {
        let mut workbook = Workbook::new("book");
        workbook.add_sheet("Sheet1").unwrap();
        insert(&mut workbook, "Sheet1", "A1", "=SUM(B1:B20000)");
        let report = workbook.rebuild_dependencies(&AliasTable::default());

        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            LinkWarning::BadReference { message, .. } if message.contains("range too large")
        ));
        let cell = workbook.get_by_key(&key("Sheet1", "A1")).unwrap();
        assert!(cell.precedents().is_empty());
    }
}
