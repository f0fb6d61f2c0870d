//! Serializer: render a [`Model`] back into the brace-delimited interchange
//! format.
//!
//! Output is deterministic: blocks and parameters appear in stored order,
//! connections are grouped per source port (fan-out becomes branch records),
//! and nested scopes indent two spaces per level. A freshly imported model
//! exports to a structurally equivalent document.

use crate::block_types::{
    self, GENERIC_EXTERNAL_TYPE, GENERIC_TYPE, SOURCE_TYPE_PARAM, format_number,
};
use crate::model::{BlockInstance, Connection, Model};
use std::fmt::Write;

/// Serialize a model into interchange-format text.
pub fn export_document(model: &Model) -> String {
    let mut out = String::new();
    let mut w = Writer::new(&mut out);
    w.open("Model");
    w.field_quoted("Name", &model.metadata.name);
    w.field_quoted(
        "StartTime",
        &format_number(model.simulation_config.start_time),
    );
    w.field_quoted(
        "StopTime",
        &format_number(model.simulation_config.stop_time),
    );
    w.field_quoted(
        "Solver",
        &block_types::external_solver_for(&model.simulation_config.solver),
    );
    w.field_quoted(
        "FixedStep",
        &format_number(model.simulation_config.step_size),
    );
    write_system(
        &mut w,
        &model.metadata.name,
        &model.blocks,
        &model.connections,
    );
    w.close();
    out
}

fn write_system(w: &mut Writer<'_>, name: &str, blocks: &[BlockInstance], connections: &[Connection]) {
    w.open("System");
    w.field_quoted("Name", name);
    for block in blocks {
        write_block(w, block);
    }
    for group in group_by_source(connections) {
        write_line(w, blocks, &group);
    }
    w.close();
}

fn write_block(w: &mut Writer<'_>, block: &BlockInstance) {
    w.open("Block");
    w.field_atom("BlockType", &external_type_of(block));
    w.field_quoted("Name", &block.name);
    if block.position.len() == 4 {
        let coords: Vec<String> = block.position.iter().map(|v| format_number(*v)).collect();
        w.field_atom("Position", &format!("[{}]", coords.join(", ")));
    }

    if block.block_type == GENERIC_TYPE {
        // Generic placeholders re-emit their preserved raw fields verbatim.
        for (key, value) in &block.parameters {
            if key != SOURCE_TYPE_PARAM {
                w.field_quoted(key, &block_types::render_param(value));
            }
        }
    } else {
        for (key, value) in block_types::export_params(&block.block_type, &block.parameters) {
            w.field_quoted(&key, &value);
        }
    }

    if block.is_subsystem() {
        w.field_atom(
            "Ports",
            &format!("[{}, {}]", block.input_ports.len(), block.output_ports.len()),
        );
        let children = block.children.as_deref().unwrap_or(&[]);
        let child_connections = block.child_connections.as_deref().unwrap_or(&[]);
        write_system(w, &block.name, children, child_connections);
    }
    w.close();
}

/// External spelling for a block: registered external name, or the preserved
/// original spelling for generic placeholders.
fn external_type_of(block: &BlockInstance) -> String {
    if block.block_type == GENERIC_TYPE {
        return block
            .param(SOURCE_TYPE_PARAM)
            .and_then(|v| v.as_str())
            .unwrap_or(GENERIC_EXTERNAL_TYPE)
            .to_string();
    }
    block_types::external_type_for(&block.block_type).to_string()
}

/// Connections grouped by `(source block, source port)`, preserving order.
fn group_by_source(connections: &[Connection]) -> Vec<Vec<&Connection>> {
    let mut groups: Vec<Vec<&Connection>> = Vec::new();
    for conn in connections {
        match groups.iter_mut().find(|g| {
            g[0].source_block_id == conn.source_block_id
                && g[0].source_port_id == conn.source_port_id
        }) {
            Some(group) => group.push(conn),
            None => groups.push(vec![conn]),
        }
    }
    groups
}

/// Emit one line record for a source group. A single target writes inline;
/// fan-out writes one branch record per target. Endpoints that no longer
/// resolve are skipped.
fn write_line(w: &mut Writer<'_>, blocks: &[BlockInstance], group: &[&Connection]) {
    let first = group[0];
    let Some((src_name, src_port)) =
        endpoint_of(blocks, &first.source_block_id, &first.source_port_id, false)
    else {
        return;
    };
    let targets: Vec<(String, usize)> = group
        .iter()
        .filter_map(|c| endpoint_of(blocks, &c.target_block_id, &c.target_port_id, true))
        .collect();
    if targets.is_empty() {
        return;
    }

    w.open("Line");
    w.field_quoted("SrcBlock", &src_name);
    w.field_atom("SrcPort", &src_port.to_string());
    if targets.len() == 1 {
        w.field_quoted("DstBlock", &targets[0].0);
        w.field_atom("DstPort", &targets[0].1.to_string());
    } else {
        for (dst_name, dst_port) in &targets {
            w.open("Branch");
            w.field_quoted("DstBlock", dst_name);
            w.field_atom("DstPort", &dst_port.to_string());
            w.close();
        }
    }
    w.close();
}

/// Resolve `(block id, port id)` back to `(display name, 1-indexed port)`.
fn endpoint_of(
    blocks: &[BlockInstance],
    block_id: &str,
    port_id: &str,
    input: bool,
) -> Option<(String, usize)> {
    let block = blocks.iter().find(|b| b.id == block_id)?;
    let ports = if input {
        &block.input_ports
    } else {
        &block.output_ports
    };
    let idx = ports.iter().position(|p| p.id == port_id)?;
    Some((block.name.clone(), idx + 1))
}

// ────────────────────────────────────────────────────────────────────────────
// Indented record writer
// ────────────────────────────────────────────────────────────────────────────

struct Writer<'a> {
    out: &'a mut String,
    depth: usize,
}

impl<'a> Writer<'a> {
    fn new(out: &'a mut String) -> Self {
        Self { out, depth: 0 }
    }

    fn open(&mut self, key: &str) {
        let _ = writeln!(self.out, "{}{} {{", self.indent(), key);
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        let _ = writeln!(self.out, "{}}}", self.indent());
    }

    /// Quoted field; embedded quotes escape by doubling.
    fn field_quoted(&mut self, key: &str, value: &str) {
        let escaped = value.replace('"', "\"\"");
        let _ = writeln!(self.out, "{}{} \"{}\"", self.indent(), key, escaped);
    }

    /// Unquoted field for type names, port numbers and arrays.
    fn field_atom(&mut self, key: &str, value: &str) {
        let _ = writeln!(self.out, "{}{} {}", self.indent(), key, value);
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }
}
