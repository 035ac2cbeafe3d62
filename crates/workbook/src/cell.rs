use cellgraph_dag::NodeKey;
use cellgraph_formulas::is_formula_text;
use cellgraph_primitives::CellAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A concrete (non-formula) cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Int(i) => write!(f, "{i}"),
            ScalarValue::Float(fl) => write!(f, "{fl}"),
            ScalarValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Raw cell content as the external workbook reader delivered it.
///
/// A closed union: every consumer pattern-matches, nothing probes a dynamic
/// bag of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellContent {
    Empty,
    Scalar(ScalarValue),
    Formula(String),
}

impl CellContent {
    /// Parse a raw string with type inference: empty, formula (leading `=`),
    /// bool, int, float, then text.
    pub fn parse(raw: &str) -> CellContent {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellContent::Empty;
        }
        if is_formula_text(trimmed) {
            return CellContent::Formula(trimmed.to_string());
        }
        match trimmed.to_lowercase().as_str() {
            "true" => return CellContent::Scalar(ScalarValue::Bool(true)),
            "false" => return CellContent::Scalar(ScalarValue::Bool(false)),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellContent::Scalar(ScalarValue::Int(i));
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return CellContent::Scalar(ScalarValue::Float(f));
        }
        CellContent::Scalar(ScalarValue::Text(raw.to_string()))
    }

    /// The formula text, if this is a formula cell.
    pub fn formula(&self) -> Option<&str> {
        match self {
            CellContent::Formula(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula(_))
    }

    /// Raw display text: formula source for formulas, empty for empty cells.
    pub fn display_text(&self) -> String {
        match self {
            CellContent::Empty => String::new(),
            CellContent::Scalar(value) => value.to_string(),
            CellContent::Formula(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Value,
    ValueList,
    Formula,
}

/// One workbook cell record.
///
/// `precedents`/`dependents` are rebuilt wholesale on every dependency pass;
/// cells are never deleted individually, only the whole workbook is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    address: CellAddress,
    content: CellContent,
    kind: CellKind,
    value_list: Vec<CellAddress>,
    precedents: BTreeSet<NodeKey>,
    dependents: BTreeSet<NodeKey>,
    formula_inputs: Vec<CellAddress>,
}

impl Cell {
    /// Create a value or formula cell. The address must carry its sheet.
    pub fn new(address: CellAddress, content: CellContent) -> Self {
        let kind = if content.is_formula() {
            CellKind::Formula
        } else {
            CellKind::Value
        };
        Self {
            address,
            content,
            kind,
            value_list: Vec::new(),
            precedents: BTreeSet::new(),
            dependents: BTreeSet::new(),
            formula_inputs: Vec::new(),
        }
    }

    /// Create a value-list cell with its resolved member addresses.
    pub fn with_value_list(
        address: CellAddress,
        content: CellContent,
        value_list: Vec<CellAddress>,
    ) -> Self {
        let mut cell = Cell::new(address, content);
        cell.kind = CellKind::ValueList;
        cell.value_list = value_list;
        cell
    }

    pub fn address(&self) -> &CellAddress {
        &self.address
    }

    /// Owning sheet name.
    pub fn sheet(&self) -> &str {
        self.address.sheet.as_deref().unwrap_or_default()
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn formula(&self) -> Option<&str> {
        self.content.formula()
    }

    pub fn value_list(&self) -> &[CellAddress] {
        &self.value_list
    }

    pub fn precedents(&self) -> &BTreeSet<NodeKey> {
        &self.precedents
    }

    pub fn dependents(&self) -> &BTreeSet<NodeKey> {
        &self.dependents
    }

    /// Expanded input addresses in the order the formula mentions them.
    pub fn formula_inputs(&self) -> &[CellAddress] {
        &self.formula_inputs
    }

    pub fn node_key(&self) -> NodeKey {
        NodeKey::new(self.sheet(), &self.address)
    }

    pub(crate) fn clear_links(&mut self) {
        self.precedents.clear();
        self.dependents.clear();
        self.formula_inputs.clear();
    }

    pub(crate) fn install_links(
        &mut self,
        precedents: BTreeSet<NodeKey>,
        formula_inputs: Vec<CellAddress>,
    ) {
        self.precedents = precedents;
        self.formula_inputs = formula_inputs;
    }

    pub(crate) fn add_dependent(&mut self, dependent: NodeKey) {
        self.dependents.insert(dependent);
    }

    /// Serializable read view for the enrichment and persistence collaborators.
    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            sheet: self.sheet().to_string(),
            reference: self.address.reference(),
            kind: self.kind,
            content: self.content.clone(),
            formula: self.content.formula().map(str::to_string),
            precedents: self.precedents.clone(),
            dependents: self.dependents.clone(),
            value_list: self.value_list.clone(),
        }
    }
}

/// Point-in-time read view of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub sheet: String,
    pub reference: String,
    pub kind: CellKind,
    pub content: CellContent,
    pub formula: Option<String>,
    pub precedents: BTreeSet<NodeKey>,
    pub dependents: BTreeSet<NodeKey>,
    pub value_list: Vec<CellAddress>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgraph_primitives::parse_address;

    #[test]
    fn test_content_parse_inference() {
        assert_eq!(CellContent::parse(""), CellContent::Empty);
        assert_eq!(CellContent::parse("  "), CellContent::Empty);
        assert_eq!(
            CellContent::parse("=A1+B1"),
            CellContent::Formula("=A1+B1".to_string())
        );
        assert_eq!(
            CellContent::parse("true"),
            CellContent::Scalar(ScalarValue::Bool(true))
        );
        assert_eq!(
            CellContent::parse("42"),
            CellContent::Scalar(ScalarValue::Int(42))
        );
        assert_eq!(
            CellContent::parse("2.5"),
            CellContent::Scalar(ScalarValue::Float(2.5))
        );
        assert_eq!(
            CellContent::parse("hello"),
            CellContent::Scalar(ScalarValue::Text("hello".to_string()))
        );
    }

    #[test]
    fn test_kind_follows_content() {
        let addr = parse_address("Sheet1!A1").unwrap();
        assert_eq!(
            Cell::new(addr.clone(), CellContent::parse("5")).kind(),
            CellKind::Value
        );
        assert_eq!(
            Cell::new(addr.clone(), CellContent::parse("=B1")).kind(),
            CellKind::Formula
        );
        let list = Cell::with_value_list(addr, CellContent::Empty, Vec::new());
        assert_eq!(list.kind(), CellKind::ValueList);
    }

    #[test]
    fn test_node_key_uses_sheet_and_normalized_reference() {
        let cell = Cell::new(parse_address("Sheet1!$B$2").unwrap(), CellContent::Empty);
        assert_eq!(cell.node_key().as_str(), "Sheet1!B2");
    }

    #[test]
    fn test_snapshot_carries_formula_text() {
        let cell = Cell::new(
            parse_address("Sheet1!A3").unwrap(),
            CellContent::parse("=A1+A2"),
        );
        let snapshot = cell.snapshot();
        assert_eq!(snapshot.kind, CellKind::Formula);
        assert_eq!(snapshot.formula.as_deref(), Some("=A1+A2"));
        assert_eq!(snapshot.reference, "A3");
    }
}
