//! mdlink — a hierarchical block-diagram model core.
//!
//! Imports and exports the legacy brace-delimited interchange format used by
//! graphical dataflow tools, and provides the structural operations an editor
//! or analysis pass needs on top of the typed model:
//!
//! - [`parser`] – tokenizer, structural parser, semantic extractor, library
//!   import and dependency analysis
//! - [`model`] – the typed diagram: blocks, ports, connections, scopes
//! - [`block_types`] – external↔internal type and parameter mapping tables
//! - [`ports`] – port list synthesis from type and parameters
//! - [`dimensions`] – forward signal-shape propagation
//! - [`subsystem`] – subsystem composition and decomposition
//! - [`export`] – serialization back to the interchange format
//!
//! ```no_run
//! use mdlink::{export_document, import_document};
//!
//! # fn main() -> anyhow::Result<()> {
//! let text = std::fs::read_to_string("model.mdl")?;
//! let model = import_document(&text)?;
//! println!("{} blocks", model.blocks.len());
//! let round_tripped = export_document(&model);
//! # Ok(())
//! # }
//! ```

pub mod block_types;
pub mod dimensions;
pub mod export;
pub mod model;
pub mod parser;
pub mod ports;
pub mod subsystem;

pub use dimensions::{propagate_dimensions, propagate_model};
pub use export::export_document;
pub use model::{BlockInstance, Connection, Model, ParamValue, Port};
pub use parser::{
    DependencyReport, ImportWarning, LibraryImport, LibraryImportOptions, analyze_dependencies,
    import_document, import_document_with_warnings, import_library,
};
pub use ports::instantiate_block;
pub use subsystem::{compose_subsystem, decompose_subsystem};
