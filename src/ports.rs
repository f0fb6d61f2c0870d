//! Port synthesis: derive a block's ordered input/output port lists from its
//! internal type and resolved parameters.
//!
//! Port-list derivation is a pure function of `(type, parameters)` so it can
//! be recomputed on every parameter write. Regeneration is index-stable:
//! ports that keep their logical index keep their identity (and therefore
//! their connections); counts only grow or shrink at the tail.

use crate::model::{BlockInstance, ParamValue, Port};

/// Number of input and output ports a block of this type should carry.
///
/// Fixed-signature types are listed directly; variable-arity types derive
/// their count from a parameter (fan-in math blocks, multiplexers,
/// multi-trace recorders) or, for subsystems, from their boundary children.
pub fn port_counts(block: &BlockInstance) -> (usize, usize) {
    match block.block_type.as_str() {
        "constant" | "step" | "sine_wave" | "ground" | "inport" => (0, 1),
        "outport" | "terminator" => (1, 0),
        "gain" | "integrator" | "transfer_function" | "unit_delay" | "saturation" => (1, 1),
        "scope" => (count_param(block, "inputs", 1), 0),
        "sum" => (sum_fan_in(block), 1),
        "product" => (product_fan_in(block), 1),
        "mux" => (count_param(block, "inputs", 2), 1),
        "demux" => (1, count_param(block, "outputs", 2)),
        "subsystem" => subsystem_counts(block),
        // Generic placeholders and reference blocks get a 1-in/1-out shape so
        // surrounding connections remain attachable.
        _ => (1, 1),
    }
}

fn count_param(block: &BlockInstance, key: &str, default: usize) -> usize {
    block
        .param(key)
        .and_then(|v| v.as_number())
        .map(|n| n.max(0.0) as usize)
        .unwrap_or(default)
}

/// A sum block's fan-in is the number of sign characters in its operator
/// string (`"|+-"` has two), or a plain count when given numerically.
fn sum_fan_in(block: &BlockInstance) -> usize {
    match block.param("signs") {
        Some(ParamValue::Str(s)) => {
            let n = s.chars().filter(|c| matches!(c, '+' | '-')).count();
            n.max(1)
        }
        Some(v) => v.as_number().map(|n| n.max(1.0) as usize).unwrap_or(2),
        None => 2,
    }
}

/// Product blocks accept either a numeric count or an operator string like
/// `"**/"`.
fn product_fan_in(block: &BlockInstance) -> usize {
    match block.param("inputs") {
        Some(ParamValue::Str(s)) => {
            let n = s.chars().filter(|c| matches!(c, '*' | '/')).count();
            n.max(1)
        }
        Some(v) => v.as_number().map(|n| n.max(1.0) as usize).unwrap_or(2),
        None => 2,
    }
}

/// A subsystem's external ports mirror its boundary children.
fn subsystem_counts(block: &BlockInstance) -> (usize, usize) {
    match &block.children {
        Some(children) => {
            let ins = children.iter().filter(|c| c.block_type == "inport").count();
            let outs = children.iter().filter(|c| c.block_type == "outport").count();
            (ins, outs)
        }
        None => (0, 0),
    }
}

/// Instantiate fresh port lists for a newly created block.
pub fn synthesize_ports(block: &mut BlockInstance) {
    let (ins, outs) = port_counts(block);
    block.input_ports = (1..=ins).map(|i| Port::new(format!("in{}", i))).collect();
    block.output_ports = (1..=outs).map(|i| Port::new(format!("out{}", i))).collect();
}

/// Palette instantiation: a fresh block of the given type at a canvas
/// position, ports derived from its (still empty) parameter set.
pub fn instantiate_block(block_type: &str, name: &str, x: f64, y: f64) -> BlockInstance {
    let mut block = BlockInstance::new(block_type, name);
    block.position = vec![x, y, x + 40.0, y + 40.0];
    synthesize_ports(&mut block);
    block
}

/// Recompute the port lists after a parameter change, preserving the identity
/// of every port whose logical index still exists.
pub fn rederive_ports(block: &mut BlockInstance) {
    let (ins, outs) = port_counts(block);
    resize_ports(&mut block.input_ports, ins, "in");
    resize_ports(&mut block.output_ports, outs, "out");
}

fn resize_ports(ports: &mut Vec<Port>, target: usize, prefix: &str) {
    while ports.len() > target {
        ports.pop();
    }
    while ports.len() < target {
        let idx = ports.len() + 1;
        ports.push(Port::new(format!("{}{}", prefix, idx)));
    }
}
