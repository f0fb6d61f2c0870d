//! Library import, the shared block registry and dependency analysis.
//!
//! A library document is structurally identical to a model document but its
//! top-level subsystem blocks are reusable definitions rather than parts of
//! one diagram. Importing a library can register those definitions in a
//! process-wide registry keyed `"library/block"`, from which later model
//! edits can instantiate pre-built subsystems by name.

use super::{assemble_model, parse_to_intermediate};
use crate::model::{BlockInstance, Model};
use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::RwLock;

/// Options controlling [`import_library`].
#[derive(Debug, Clone, Default)]
pub struct LibraryImportOptions {
    /// Register the library's subsystem blocks in the global registry.
    pub register_blocks: bool,
    /// Where the library text came from, recorded for diagnostics only.
    pub source_path: Option<String>,
}

/// Result of importing a library document.
#[derive(Debug, Clone)]
pub struct LibraryImport {
    /// The library parsed as an ordinary model; its root scope holds the
    /// reusable definitions.
    pub library: Model,
    /// Clones of the root-scope subsystem blocks, the reusable definitions.
    pub subsystem_blocks: Vec<BlockInstance>,
}

/// A reference from a document to a block defined in another library,
/// `scope/path...` split at the first separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    pub library: String,
    pub block_path: String,
    /// Name of the referencing block in the analyzed document.
    pub referenced_by: String,
}

/// External references found in a document, and which of the referenced
/// libraries are not resolvable.
#[derive(Debug, Clone, Default)]
pub struct DependencyReport {
    pub external_references: Vec<ExternalReference>,
    /// Distinct referenced library names (version suffix stripped) that are
    /// neither the document itself nor registered, in first-seen order.
    pub missing_libraries: Vec<String>,
}

static LIBRARY_REGISTRY: Lazy<RwLock<HashMap<String, BlockInstance>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Import a library document. Same tolerance as model import: warnings are
/// logged, only structural failures abort.
pub fn import_library(text: &str, options: LibraryImportOptions) -> Result<LibraryImport> {
    let doc = parse_to_intermediate(text)?;
    let mut warnings = Vec::new();
    let library = assemble_model(&doc, &mut warnings);
    for w in &warnings {
        match &options.source_path {
            Some(path) => log::warn!("{}: {}", path, w),
            None => log::warn!("{}", w),
        }
    }

    let subsystem_blocks: Vec<BlockInstance> = library
        .blocks
        .iter()
        .filter(|b| b.is_subsystem())
        .cloned()
        .collect();

    if options.register_blocks {
        let mut registry = match LIBRARY_REGISTRY.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for block in &subsystem_blocks {
            let key = format!("{}/{}", library.metadata.name, block.name);
            registry.insert(key, block.clone());
        }
    }

    Ok(LibraryImport {
        library,
        subsystem_blocks,
    })
}

/// Fetch a registered library block by `"library/block"` key. The clone gets
/// fresh identity when instantiated by the caller, not here.
pub fn lookup_library_block(key: &str) -> Option<BlockInstance> {
    let registry = match LIBRARY_REGISTRY.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    registry.get(key).cloned()
}

/// Names of every library with at least one registered block.
pub fn registered_library_names() -> Vec<String> {
    let registry = match LIBRARY_REGISTRY.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let mut names: Vec<String> = registry
        .keys()
        .filter_map(|k| k.split_once('/').map(|(lib, _)| lib.to_string()))
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Drop all registered library blocks. Test isolation hook.
pub fn clear_library_registry() {
    let mut registry = match LIBRARY_REGISTRY.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    registry.clear();
}

/// Scan a document for reference blocks pointing into other libraries.
///
/// References resolving to a scope defined in the same document are not
/// reported. Works on the parse stage output directly, so it stays cheap
/// enough to run over a whole directory of documents before deciding what
/// to load.
pub fn analyze_dependencies(text: &str) -> Result<DependencyReport> {
    let doc = parse_to_intermediate(text)?;

    let mut defined = vec![normalize_library_name(&doc.name)];
    for system in &doc.systems {
        collect_scope_names(system, &mut defined);
    }
    let registered = registered_library_names();

    let mut found = Vec::new();
    for system in &doc.systems {
        collect_references(&system.blocks, &mut found);
    }

    let mut report = DependencyReport::default();
    for reference in found {
        let lib = normalize_library_name(&reference.library);
        if defined.contains(&lib) {
            continue;
        }
        let resolvable = registered.iter().any(|r| normalize_library_name(r) == lib);
        if !resolvable && !report.missing_libraries.contains(&lib) {
            report.missing_libraries.push(lib.clone());
        }
        report.external_references.push(reference);
    }
    Ok(report)
}

fn collect_scope_names(system: &super::extract::ParsedSystem, out: &mut Vec<String>) {
    out.push(normalize_library_name(&system.name));
    for block in &system.blocks {
        for nested in &block.systems {
            collect_scope_names(nested, out);
        }
    }
}

fn collect_references(
    blocks: &[super::extract::ParsedBlock],
    out: &mut Vec<ExternalReference>,
) {
    for block in blocks {
        if block.block_type == "Reference" {
            let source = block
                .fields
                .get("SourceBlock")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if let Some((library, block_path)) = source.split_once('/') {
                out.push(ExternalReference {
                    library: library.to_string(),
                    block_path: block_path.to_string(),
                    referenced_by: block.name.clone(),
                });
            }
        }
        for nested in &block.systems {
            collect_references(&nested.blocks, out);
        }
    }
}

/// Strip a trailing version tag (`-1.2`, `_v3`) so `SigLib-1.2` and
/// `SigLib-1.3` resolve to the same library.
pub fn normalize_library_name(name: &str) -> String {
    if let Some(idx) = name.rfind(['-', '_']) {
        let tail = &name[idx + 1..];
        let digits = tail.strip_prefix('v').unwrap_or(tail);
        if !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
            && idx > 0
        {
            return name[..idx].to_string();
        }
    }
    name.to_string()
}
