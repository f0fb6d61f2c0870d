//! Import → export → import stability.

use mdlink::{ParamValue, export_document, import_document};

const FIXTURE: &str = r#"Model {
  Name "loop"
  StartTime "0"
  StopTime "5"
  Solver "ode1"
  FixedStep "0.001"
  System {
    Name "loop"
    Block {
      BlockType Step
      Name "Src"
      Position [20, 20, 50, 50]
      Time "1"
      Before "0"
      After "2"
    }
    Block {
      BlockType Sum
      Name "Err"
      Position [100, 20, 130, 50]
      Inputs "+-"
    }
    Block {
      BlockType Gain
      Name "K"
      Position [180, 20, 210, 50]
      Gain "0.5"
    }
    Block {
      BlockType Integrator
      Name "Plant"
      Position [260, 20, 290, 50]
      LimitOutput "on"
    }
    Block {
      BlockType Scope
      Name "Out"
      Position [340, 20, 370, 50]
    }
    Line { SrcBlock "Src" SrcPort 1 DstBlock "Err" DstPort 1 }
    Line { SrcBlock "Err" SrcPort 1 DstBlock "K" DstPort 1 }
    Line { SrcBlock "K" SrcPort 1 DstBlock "Plant" DstPort 1 }
    Line {
      SrcBlock "Plant"
      SrcPort 1
      Branch { DstBlock "Out" DstPort 1 }
      Branch { DstBlock "Err" DstPort 2 }
    }
  }
}"#;

#[test]
fn export_reimports_equivalently() {
    let first = import_document(FIXTURE).expect("first import");
    let text = export_document(&first);
    let second = import_document(&text).expect("reimport");

    assert_eq!(second.metadata.name, first.metadata.name);
    assert_eq!(second.simulation_config.solver, first.simulation_config.solver);
    assert_eq!(second.simulation_config.stop_time, 5.0);
    assert_eq!(second.simulation_config.step_size, 0.001);

    let names =
        |m: &mdlink::Model| m.blocks.iter().map(|b| b.name.clone()).collect::<Vec<_>>();
    let types =
        |m: &mdlink::Model| m.blocks.iter().map(|b| b.block_type.clone()).collect::<Vec<_>>();
    assert_eq!(names(&second), names(&first));
    assert_eq!(types(&second), types(&first));
    for (a, b) in first.blocks.iter().zip(second.blocks.iter()) {
        assert_eq!(a.parameters, b.parameters, "parameters of '{}' changed", a.name);
    }
    assert_eq!(second.connections.len(), first.connections.len());

    // The feedback sum keeps its two-input shape through the cycle.
    let err = second.blocks.iter().find(|b| b.name == "Err").expect("Err");
    assert_eq!(err.input_ports.len(), 2);
}

#[test]
fn fan_out_exports_as_branches() {
    let model = import_document(FIXTURE).expect("import");
    let text = export_document(&model);
    assert_eq!(text.matches("Branch {").count(), 2);
    // Three single-target lines plus one branched line.
    assert_eq!(text.matches("Line {").count(), 4);
}

#[test]
fn subsystem_round_trips_with_ports() {
    let text = r#"Model {
      Name "m"
      System {
        Name "m"
        Block { BlockType Constant Name "C" Value "3" }
        Block {
          BlockType SubSystem
          Name "Twice"
          System {
            Name "Twice"
            Block { BlockType Inport Name "In1" Port "1" }
            Block { BlockType Gain Name "G" Gain "2" }
            Block { BlockType Outport Name "Out1" Port "1" }
            Line { SrcBlock "In1" SrcPort 1 DstBlock "G" DstPort 1 }
            Line { SrcBlock "G" SrcPort 1 DstBlock "Out1" DstPort 1 }
          }
        }
        Block { BlockType Scope Name "S" }
        Line { SrcBlock "C" SrcPort 1 DstBlock "Twice" DstPort 1 }
        Line { SrcBlock "Twice" SrcPort 1 DstBlock "S" DstPort 1 }
      }
    }"#;
    let first = import_document(text).expect("import");
    let exported = export_document(&first);
    assert!(exported.contains("Ports [1, 1]"));

    let second = import_document(&exported).expect("reimport");
    let sub = second.blocks.iter().find(|b| b.name == "Twice").expect("Twice");
    assert_eq!(sub.children.as_ref().map(Vec::len), Some(3));
    assert_eq!(sub.child_connections.as_ref().map(Vec::len), Some(2));
    assert_eq!(second.connections.len(), 2);
}

#[test]
fn array_parameters_survive_round_trip() {
    let text = r#"Model {
      Name "m"
      System {
        Name "m"
        Block {
          BlockType TransferFcn
          Name "TF"
          Numerator [1, 2]
          Denominator [1, 0.5, 1]
        }
        Block { BlockType Constant Name "C" Value [3, 4] }
      }
    }"#;
    let first = import_document(text).expect("import");
    let second = import_document(&export_document(&first)).expect("reimport");

    let tf = second.blocks.iter().find(|b| b.name == "TF").expect("TF");
    assert_eq!(
        tf.param("numerator"),
        Some(&ParamValue::NumArray(vec![1.0, 2.0]))
    );
    assert_eq!(
        tf.param("denominator"),
        Some(&ParamValue::NumArray(vec![1.0, 0.5, 1.0]))
    );
    let c = second.blocks.iter().find(|b| b.name == "C").expect("C");
    assert_eq!(c.param("value"), Some(&ParamValue::NumArray(vec![3.0, 4.0])));
}

#[test]
fn exported_file_round_trips_from_disk() {
    let model = import_document(FIXTURE).expect("import");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("loop.mdl");
    std::fs::write(&path, export_document(&model)).expect("write");

    let text = std::fs::read_to_string(&path).expect("read");
    let reloaded = import_document(&text).expect("reimport");
    assert_eq!(reloaded.blocks.len(), model.blocks.len());
}
