//! Semantic extractor: walks the generic parse tree into typed intermediate
//! structures ready for the type mapper. Everything here is transient and
//! owned exclusively by the import pipeline.

use super::structure::{DocumentKind, NodeValue, ParseNode, ScalarValue};
use indexmap::IndexMap;

/// Default metadata applied when the document omits a field.
pub const DEFAULT_NAME: &str = "untitled";
pub const DEFAULT_START_TIME: f64 = 0.0;
pub const DEFAULT_STOP_TIME: f64 = 10.0;
pub const DEFAULT_SOLVER: &str = "ode45";
pub const DEFAULT_FIXED_STEP: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub kind: DocumentKind,
    pub name: String,
    pub start_time: f64,
    pub stop_time: f64,
    /// External solver name, translated later by the type mapper.
    pub solver_name: String,
    pub fixed_step: f64,
    /// Named subsystem scopes; the first system is the root scope.
    pub systems: Vec<ParsedSystem>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedSystem {
    pub name: String,
    pub blocks: Vec<ParsedBlock>,
    pub lines: Vec<ParsedLine>,
}

#[derive(Debug, Clone)]
pub struct ParsedBlock {
    /// External block type name, exactly as written.
    pub block_type: String,
    pub name: String,
    /// Raw position array (typically `[l, t, r, b]`).
    pub position: Vec<f64>,
    /// All remaining scalar fields in document order.
    pub fields: IndexMap<String, ScalarValue>,
    /// Nested system bodies (subsystem contents), usually zero or one.
    pub systems: Vec<ParsedSystem>,
}

/// A line record: source/destination identify blocks by display name with
/// 1-indexed port numbers. A missing destination with branches present means
/// pure fan-out.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub src_block: Option<String>,
    pub src_port: usize,
    pub dst_block: Option<String>,
    pub dst_port: usize,
    pub branches: Vec<ParsedBranch>,
}

#[derive(Debug, Clone)]
pub struct ParsedBranch {
    pub dst_block: Option<String>,
    pub dst_port: usize,
    pub branches: Vec<ParsedBranch>,
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

/// Extract the typed intermediate document from the root parse node.
pub fn extract_document(kind: DocumentKind, root: &ParseNode) -> ParsedDocument {
    let mut systems: Vec<ParsedSystem> = root.list("Systems").iter().map(extract_system).collect();

    // Some documents place their blocks directly under the root node instead
    // of inside an explicit System wrapper.
    let root_blocks: Vec<ParsedBlock> = root.list("Blocks").iter().map(extract_block).collect();
    let root_lines: Vec<ParsedLine> = root.list("Lines").iter().map(extract_line).collect();
    if systems.is_empty() {
        systems.push(ParsedSystem {
            name: root.get_str("Name").unwrap_or(DEFAULT_NAME).to_string(),
            blocks: root_blocks,
            lines: root_lines,
        });
    } else if systems[0].blocks.is_empty() && !root_blocks.is_empty() {
        systems[0].blocks = root_blocks;
        if systems[0].lines.is_empty() {
            systems[0].lines = root_lines;
        }
    }

    ParsedDocument {
        kind,
        name: root.get_str("Name").unwrap_or(DEFAULT_NAME).to_string(),
        start_time: root.get_number("StartTime").unwrap_or(DEFAULT_START_TIME),
        stop_time: root.get_number("StopTime").unwrap_or(DEFAULT_STOP_TIME),
        solver_name: root
            .get_str("Solver")
            .or_else(|| root.get_str("SolverName"))
            .unwrap_or(DEFAULT_SOLVER)
            .to_string(),
        fixed_step: root.get_number("FixedStep").unwrap_or(DEFAULT_FIXED_STEP),
        systems,
    }
}

fn extract_system(node: &ParseNode) -> ParsedSystem {
    ParsedSystem {
        name: node.get_str("Name").unwrap_or_default().to_string(),
        blocks: node.list("Blocks").iter().map(extract_block).collect(),
        lines: node.list("Lines").iter().map(extract_line).collect(),
    }
}

fn extract_block(node: &ParseNode) -> ParsedBlock {
    let mut fields = IndexMap::new();
    for (key, value) in &node.entries {
        match (key.as_str(), value) {
            ("BlockType" | "Name" | "Position" | "Systems", _) => {}
            (_, NodeValue::Scalar(s)) => {
                fields.insert(key.clone(), s.clone());
            }
            // Nested non-system structures (port records etc.) carry no
            // parameters the mapper consumes.
            _ => {}
        }
    }

    let position = node
        .get_scalar("Position")
        .and_then(|s| s.as_num_array())
        .unwrap_or_default();

    ParsedBlock {
        block_type: node.get_str("BlockType").unwrap_or_default().to_string(),
        name: node.get_str("Name").unwrap_or_default().to_string(),
        position,
        fields,
        systems: node.list("Systems").iter().map(extract_system).collect(),
    }
}

fn extract_line(node: &ParseNode) -> ParsedLine {
    ParsedLine {
        src_block: node.get_str("SrcBlock").map(str::to_string),
        src_port: port_number(node, "SrcPort"),
        dst_block: node.get_str("DstBlock").map(str::to_string),
        dst_port: port_number(node, "DstPort"),
        branches: node.list("Branchs").iter().map(extract_branch).collect(),
    }
}

fn extract_branch(node: &ParseNode) -> ParsedBranch {
    ParsedBranch {
        dst_block: node.get_str("DstBlock").map(str::to_string),
        dst_port: port_number(node, "DstPort"),
        branches: node.list("Branchs").iter().map(extract_branch).collect(),
    }
}

/// Port numbers are 1-indexed in the format; absent or unparsable values
/// default to port 1.
fn port_number(node: &ParseNode, key: &str) -> usize {
    node.get_number(key)
        .map(|n| n.max(1.0) as usize)
        .unwrap_or(1)
}
