//! End-to-end import tests over small interchange documents.

use mdlink::model::ParamValue;
use mdlink::parser::ImportWarning;
use mdlink::{import_document, import_document_with_warnings};

#[test]
fn imports_minimal_model() {
    let text = r#"Model {
      Name "A"
      StartTime "0.0"
      StopTime "20"
      Solver "ode4"
      System {
        Name "A"
        Block {
          BlockType Constant
          Name "C1"
          Position [10, 10, 40, 40]
          Value "5"
        }
        Block {
          BlockType Scope
          Name "S"
          Position [100, 10, 130, 40]
        }
        Line {
          SrcBlock "C1"
          SrcPort 1
          DstBlock "S"
          DstPort 1
        }
      }
    }"#;
    let model = import_document(text).expect("import");

    assert_eq!(model.metadata.name, "A");
    assert_eq!(model.simulation_config.stop_time, 20.0);
    assert_eq!(model.simulation_config.solver, "rk4");
    assert_eq!(model.blocks.len(), 2);

    let c1 = &model.blocks[0];
    assert_eq!(c1.block_type, "constant");
    assert_eq!(c1.name, "C1");
    assert_eq!(c1.position, vec![10.0, 10.0, 40.0, 40.0]);
    assert_eq!(c1.param("value"), Some(&ParamValue::Number(5.0)));
    assert_eq!(c1.output_ports.len(), 1);

    assert_eq!(model.connections.len(), 1);
    let conn = &model.connections[0];
    assert_eq!(conn.source_block_id, c1.id);
    assert_eq!(conn.target_block_id, model.blocks[1].id);
}

#[test]
fn defaults_apply_when_header_fields_missing() {
    let model = import_document(r#"Model { System { Name "root" } }"#).expect("import");
    assert_eq!(model.metadata.name, "untitled");
    assert_eq!(model.simulation_config.start_time, 0.0);
    assert_eq!(model.simulation_config.stop_time, 10.0);
    assert_eq!(model.simulation_config.solver, "rk45");
    assert_eq!(model.simulation_config.step_size, 0.01);
}

#[test]
fn branch_fan_out_becomes_multiple_connections() {
    let text = r#"Model {
      Name "fanout"
      System {
        Name "fanout"
        Block { BlockType Constant Name "C" Value "1" }
        Block { BlockType Scope Name "S1" }
        Block { BlockType Scope Name "S2" }
        Line {
          SrcBlock "C"
          SrcPort 1
          Branch { DstBlock "S1" DstPort 1 }
          Branch { DstBlock "S2" DstPort 1 }
        }
      }
    }"#;
    let model = import_document(text).expect("import");
    assert_eq!(model.connections.len(), 2);
    assert_eq!(
        model.connections[0].source_port_id,
        model.connections[1].source_port_id
    );
    assert_ne!(
        model.connections[0].target_block_id,
        model.connections[1].target_block_id
    );
}

#[test]
fn unknown_type_imports_as_generic_with_warning() {
    let text = r#"Model {
      Name "m"
      System {
        Name "m"
        Block {
          BlockType VendorSpecificBlock99
          Name "X"
          Knob "3"
        }
      }
    }"#;
    let (model, warnings) = import_document_with_warnings(text).expect("import");

    let x = &model.blocks[0];
    assert_eq!(x.block_type, "generic");
    assert_eq!(
        x.param("source_type"),
        Some(&ParamValue::Str("VendorSpecificBlock99".to_string()))
    );
    assert_eq!(x.param("Knob"), Some(&ParamValue::Number(3.0)));
    // Generic blocks stay attachable.
    assert_eq!(x.input_ports.len(), 1);
    assert_eq!(x.output_ports.len(), 1);

    assert!(warnings.iter().any(|w| matches!(
        w,
        ImportWarning::UnknownType { external_type, .. } if external_type == "VendorSpecificBlock99"
    )));
}

#[test]
fn dangling_line_is_dropped_with_warning() {
    let text = r#"Model {
      Name "m"
      System {
        Name "m"
        Block { BlockType Constant Name "C" Value "1" }
        Line { SrcBlock "C" SrcPort 1 DstBlock "Nowhere" DstPort 1 }
      }
    }"#;
    let (model, warnings) = import_document_with_warnings(text).expect("import");
    assert!(model.connections.is_empty());
    assert!(warnings
        .iter()
        .any(|w| matches!(w, ImportWarning::DanglingConnection { .. })));
}

#[test]
fn fan_in_to_one_port_keeps_first_connection() {
    let text = r#"Model {
      Name "m"
      System {
        Name "m"
        Block { BlockType Constant Name "C1" Value "1" }
        Block { BlockType Constant Name "C2" Value "2" }
        Block { BlockType Scope Name "S" }
        Line { SrcBlock "C1" SrcPort 1 DstBlock "S" DstPort 1 }
        Line { SrcBlock "C2" SrcPort 1 DstBlock "S" DstPort 1 }
      }
    }"#;
    let (model, warnings) = import_document_with_warnings(text).expect("import");
    assert_eq!(model.connections.len(), 1);
    assert_eq!(model.connections[0].source_block_id, model.blocks[0].id);
    assert!(!warnings.is_empty());
}

#[test]
fn comments_and_meta_lines_are_ignored() {
    let text = r#"% header comment
    Model {
      $ObjectID 5
      Name "m"
      Simulink.ConfigSet {
        Opaque "x"
      }
      System {
        Name "m"
        % trailing comment
        Block { BlockType Ground Name "G" }
      }
    }"#;
    let model = import_document(text).expect("import");
    assert_eq!(model.blocks.len(), 1);
    assert_eq!(model.blocks[0].block_type, "ground");
}

#[test]
fn nested_subsystem_bodies_import_recursively() {
    let text = r#"Model {
      Name "m"
      System {
        Name "m"
        Block {
          BlockType SubSystem
          Name "Inner"
          System {
            Name "Inner"
            Block { BlockType Inport Name "In1" Port "1" }
            Block { BlockType Gain Name "G" Gain "2" }
            Block { BlockType Outport Name "Out1" Port "1" }
            Line { SrcBlock "In1" SrcPort 1 DstBlock "G" DstPort 1 }
            Line { SrcBlock "G" SrcPort 1 DstBlock "Out1" DstPort 1 }
          }
        }
      }
    }"#;
    let model = import_document(text).expect("import");
    let sub = &model.blocks[0];
    assert_eq!(sub.block_type, "subsystem");
    assert_eq!(sub.input_ports.len(), 1);
    assert_eq!(sub.output_ports.len(), 1);

    let children = sub.children.as_ref().expect("children");
    assert_eq!(children.len(), 3);
    assert_eq!(sub.child_connections.as_ref().map(Vec::len), Some(2));

    // Recursive walk sees the subsystem and all three nested blocks.
    let mut count = 0;
    model.walk_blocks(&mut |_| count += 1);
    assert_eq!(count, 4);
}

#[test]
fn array_constant_shape_propagates_on_import() {
    let text = r#"Model {
      Name "m"
      System {
        Name "m"
        Block { BlockType Constant Name "C" Value "[1 2 3]" }
        Block { BlockType Scope Name "S" }
        Line { SrcBlock "C" SrcPort 1 DstBlock "S" DstPort 1 }
      }
    }"#;
    let model = import_document(text).expect("import");
    assert_eq!(model.blocks[0].output_ports[0].dimensions, vec![3]);
    assert_eq!(model.blocks[1].input_ports[0].dimensions, vec![3]);
}

#[test]
fn missing_document_keyword_is_an_error() {
    assert!(import_document("NotADocument { }").is_err());
    assert!(import_document("Model { Name \"x\"").is_err());
}
