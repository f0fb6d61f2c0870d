//! Library import, registry lookup and dependency analysis.

use mdlink::parser::{analyze_dependencies, import_library, lookup_library_block};
use mdlink::LibraryImportOptions;

fn library_text(name: &str) -> String {
    format!(
        r#"Library {{
          Name "{name}"
          System {{
            Name "{name}"
            Block {{
              BlockType SubSystem
              Name "Filter"
              System {{
                Name "Filter"
                Block {{ BlockType Inport Name "In1" Port "1" }}
                Block {{ BlockType Gain Name "G" Gain "0.1" }}
                Block {{ BlockType Outport Name "Out1" Port "1" }}
                Line {{ SrcBlock "In1" SrcPort 1 DstBlock "G" DstPort 1 }}
                Line {{ SrcBlock "G" SrcPort 1 DstBlock "Out1" DstPort 1 }}
              }}
            }}
            Block {{ BlockType Ground Name "NotReusable" }}
          }}
        }}"#
    )
}

#[test]
fn import_collects_subsystem_blocks() {
    let imported = import_library(
        &library_text("PlainLib"),
        LibraryImportOptions::default(),
    )
    .expect("import");

    assert_eq!(imported.library.metadata.name, "PlainLib");
    assert_eq!(imported.subsystem_blocks.len(), 1);
    let filter = &imported.subsystem_blocks[0];
    assert_eq!(filter.name, "Filter");
    assert_eq!(filter.input_ports.len(), 1);
    assert_eq!(filter.output_ports.len(), 1);

    // Without register_blocks nothing lands in the registry.
    assert!(lookup_library_block("PlainLib/Filter").is_none());
}

#[test]
fn registered_blocks_are_queryable_by_key() {
    import_library(
        &library_text("RegLib"),
        LibraryImportOptions {
            register_blocks: true,
            source_path: Some("reglib.mdl".to_string()),
        },
    )
    .expect("import");

    let block = lookup_library_block("RegLib/Filter").expect("registered block");
    assert_eq!(block.block_type, "subsystem");
    assert_eq!(block.children.as_ref().map(Vec::len), Some(3));
    assert!(lookup_library_block("RegLib/NotReusable").is_none());
    assert!(lookup_library_block("RegLib/Missing").is_none());
}

#[test]
fn reports_unresolved_external_references() {
    let text = r#"Model {
      Name "consumer"
      System {
        Name "consumer"
        Block {
          BlockType Reference
          Name "R1"
          SourceBlock "OtherLib/Foo"
        }
        Block {
          BlockType Reference
          Name "R2"
          SourceBlock "consumer/LocalThing"
        }
      }
    }"#;
    let report = analyze_dependencies(text).expect("analyze");
    // Only the unresolvable reference is reported; the in-document one is
    // silently fine.
    assert_eq!(report.external_references.len(), 1);
    assert_eq!(report.external_references[0].library, "OtherLib");
    assert_eq!(report.missing_libraries, vec!["OtherLib".to_string()]);
}

#[test]
fn registered_libraries_resolve_versioned_references() {
    import_library(
        &library_text("DepLibX"),
        LibraryImportOptions {
            register_blocks: true,
            source_path: None,
        },
    )
    .expect("import");

    let text = r#"Model {
      Name "consumer"
      System {
        Name "consumer"
        Block {
          BlockType Reference
          Name "R1"
          SourceBlock "DepLibX-1.2/Filter"
        }
      }
    }"#;
    let report = analyze_dependencies(text).expect("analyze");
    assert_eq!(report.external_references.len(), 1);
    assert!(report.missing_libraries.is_empty());
}

#[test]
fn references_inside_subsystems_are_found() {
    let text = r#"Model {
      Name "m"
      System {
        Name "m"
        Block {
          BlockType SubSystem
          Name "Wrapper"
          System {
            Name "Wrapper"
            Block {
              BlockType Reference
              Name "Deep"
              SourceBlock "BuriedLib/Thing"
            }
          }
        }
      }
    }"#;
    let report = analyze_dependencies(text).expect("analyze");
    assert_eq!(report.external_references.len(), 1);
    assert_eq!(report.external_references[0].referenced_by, "Deep");
    assert!(report
        .missing_libraries
        .contains(&"BuriedLib".to_string()));
}
