//! Import pipeline for the brace-delimited interchange format.
//!
//! Sub-modules split the pipeline into focused stages:
//!
//! - [`tokenizer`] – Lexing raw text into a flat token stream
//! - [`structure`] – Recursive-descent parsing into a generic key→value tree
//! - [`extract`] – Semantic extraction into typed intermediate records
//! - [`library`] – Library import, block registry and dependency analysis
//!
//! The entry points here consume the staged output and assemble a typed
//! [`Model`], mapping external type names through the
//! [`block_types`](crate::block_types) tables and deriving ports via the
//! [`ports`](crate::ports) synthesizer. Only structural failures (missing
//! document keyword, unbalanced braces) abort the import; everything else
//! degrades to a collected warning.

pub mod extract;
pub mod library;
pub mod structure;
pub mod tokenizer;

pub use library::{
    DependencyReport, ExternalReference, LibraryImport, LibraryImportOptions, analyze_dependencies,
    import_library, lookup_library_block,
};

use crate::block_types::{self, GENERIC_TYPE};
use crate::dimensions::propagate_model;
use crate::model::{BlockInstance, Connection, Model, add_connection};
use crate::ports::synthesize_ports;
use anyhow::{Context, Result};
use extract::{ParsedBlock, ParsedBranch, ParsedDocument, ParsedLine, ParsedSystem};

/// A recoverable import condition. Collected, logged, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportWarning {
    /// An external block type with no registered mapping; the block was
    /// imported as a generic placeholder.
    UnknownType { block_name: String, external_type: String },
    /// A line referencing a block or port that does not exist; that single
    /// connection was dropped.
    DanglingConnection { system: String, detail: String },
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportWarning::UnknownType {
                block_name,
                external_type,
            } => write!(
                f,
                "unknown block type '{}' on '{}', imported as generic placeholder",
                external_type, block_name
            ),
            ImportWarning::DanglingConnection { system, detail } => {
                write!(f, "dropped dangling connection in '{}': {}", system, detail)
            }
        }
    }
}

/// Import a document into a [`Model`], logging any recoverable warnings.
///
/// Fails only when the document keyword is missing or the brace structure
/// cannot be closed; no partial model is returned in that case.
pub fn import_document(text: &str) -> Result<Model> {
    let (model, warnings) = import_document_with_warnings(text)?;
    for w in &warnings {
        log::warn!("{}", w);
    }
    Ok(model)
}

/// Like [`import_document`], additionally returning the collected warnings.
pub fn import_document_with_warnings(text: &str) -> Result<(Model, Vec<ImportWarning>)> {
    let doc = parse_to_intermediate(text)?;
    let mut warnings = Vec::new();
    let model = assemble_model(&doc, &mut warnings);
    Ok((model, warnings))
}

/// Run the tokenizer, structural parser and semantic extractor.
pub(crate) fn parse_to_intermediate(text: &str) -> Result<ParsedDocument> {
    let tokens = tokenizer::tokenize(text);
    let (kind, root) =
        structure::parse_document(&tokens).context("structural parse of document failed")?;
    Ok(extract::extract_document(kind, &root))
}

/// Assemble the typed model from the intermediate document: the first system
/// is the root scope. Dimensions are resolved before returning.
pub(crate) fn assemble_model(doc: &ParsedDocument, warnings: &mut Vec<ImportWarning>) -> Model {
    let mut model = Model::new(doc.name.clone());
    model.simulation_config.solver = block_types::internal_solver_for(&doc.solver_name);
    model.simulation_config.start_time = doc.start_time;
    model.simulation_config.stop_time = doc.stop_time;
    model.simulation_config.step_size = doc.fixed_step;

    if let Some(root_system) = doc.systems.first() {
        let (blocks, connections) = convert_system(root_system, warnings);
        model.blocks = blocks;
        model.connections = connections;
    }

    propagate_model(&mut model);
    model
}

/// Convert one parsed system scope into blocks and connections, recursing
/// into nested subsystem bodies.
pub(crate) fn convert_system(
    system: &ParsedSystem,
    warnings: &mut Vec<ImportWarning>,
) -> (Vec<BlockInstance>, Vec<Connection>) {
    let blocks: Vec<BlockInstance> = system
        .blocks
        .iter()
        .map(|pb| convert_block(pb, warnings))
        .collect();

    let mut connections = Vec::new();
    for line in &system.lines {
        convert_line(&system.name, line, &blocks, &mut connections, warnings);
    }
    (blocks, connections)
}

fn convert_block(parsed: &ParsedBlock, warnings: &mut Vec<ImportWarning>) -> BlockInstance {
    let internal_type = block_types::internal_type_for(&parsed.block_type);
    if internal_type == GENERIC_TYPE {
        warnings.push(ImportWarning::UnknownType {
            block_name: parsed.name.clone(),
            external_type: parsed.block_type.clone(),
        });
    }

    let mut block = BlockInstance::new(internal_type, parsed.name.clone());
    if parsed.position.len() == 4 {
        block.position = parsed.position.clone();
    }
    block.parameters = block_types::import_params(internal_type, parsed);

    // Subsystem bodies become the block's owned nested scope; ports must be
    // derived afterwards so boundary children are counted.
    if internal_type == "subsystem" {
        if let Some(body) = parsed.systems.first() {
            let (children, child_connections) = convert_system(body, warnings);
            block.children = Some(children);
            block.child_connections = Some(child_connections);
        } else {
            block.children = Some(Vec::new());
            block.child_connections = Some(Vec::new());
        }
    }

    synthesize_ports(&mut block);
    block
}

/// Resolve one line record (and its branch fan-out) into connections.
/// Endpoints are recorded by display name with 1-indexed port numbers.
fn convert_line(
    system_name: &str,
    line: &ParsedLine,
    blocks: &[BlockInstance],
    connections: &mut Vec<Connection>,
    warnings: &mut Vec<ImportWarning>,
) {
    let Some(src_name) = line.src_block.as_deref() else {
        warnings.push(ImportWarning::DanglingConnection {
            system: system_name.to_string(),
            detail: "line without source block".to_string(),
        });
        return;
    };
    let Some((src_id, src_port_id)) = resolve_endpoint(blocks, src_name, line.src_port, false)
    else {
        warnings.push(ImportWarning::DanglingConnection {
            system: system_name.to_string(),
            detail: format!("unknown source {}:{}", src_name, line.src_port),
        });
        return;
    };

    let mut targets: Vec<(String, usize)> = Vec::new();
    if let Some(dst) = line.dst_block.as_deref() {
        targets.push((dst.to_string(), line.dst_port));
    }
    collect_branch_targets(&line.branches, &mut targets);

    for (dst_name, dst_port) in targets {
        match resolve_endpoint(blocks, &dst_name, dst_port, true) {
            Some((dst_id, dst_port_id)) => {
                let conn = Connection::new(&src_id, &src_port_id, dst_id, dst_port_id);
                if !add_connection(connections, conn) {
                    warnings.push(ImportWarning::DanglingConnection {
                        system: system_name.to_string(),
                        detail: format!("fan-in rejected at {}:{}", dst_name, dst_port),
                    });
                }
            }
            None => {
                warnings.push(ImportWarning::DanglingConnection {
                    system: system_name.to_string(),
                    detail: format!("unknown target {}:{}", dst_name, dst_port),
                });
            }
        }
    }
}

fn collect_branch_targets(branches: &[ParsedBranch], targets: &mut Vec<(String, usize)>) {
    for branch in branches {
        if let Some(dst) = branch.dst_block.as_deref() {
            targets.push((dst.to_string(), branch.dst_port));
        }
        collect_branch_targets(&branch.branches, targets);
    }
}

/// Map a `(block name, 1-indexed port)` endpoint to `(block id, port id)`.
fn resolve_endpoint(
    blocks: &[BlockInstance],
    name: &str,
    port: usize,
    input: bool,
) -> Option<(String, String)> {
    let block = blocks.iter().find(|b| b.name == name)?;
    let ports = if input {
        &block.input_ports
    } else {
        &block.output_ports
    };
    let port = ports.get(port.checked_sub(1)?)?;
    Some((block.id.clone(), port.id.clone()))
}
