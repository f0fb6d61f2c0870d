//! Forward dimension propagation.
//!
//! Pushes per-port signal shapes along the connection graph until a fixed
//! point is reached or the pass cap is hit. Ports only move from the default
//! scalar shape to a resolved shape, never back, which makes the whole pass
//! idempotent: re-running on a converged model performs zero assignments.
//! A non-convergent case (pathological parameter combinations, shape
//! conflicts through delay-free loops) is left unresolved, not an error.

use crate::model::{BlockInstance, Connection, ParamValue};

/// Upper bound on full propagation passes over one scope. Termination is not
/// formally guaranteed for malformed feedback graphs, so the walk is bounded.
const MAX_PASSES: usize = 10;

/// Propagate port dimensions across a scope's blocks and connections,
/// recursing into every subsystem. Mutates `dimensions` in place; safe to
/// call repeatedly.
pub fn propagate_dimensions(blocks: &mut [BlockInstance], connections: &[Connection]) {
    for _ in 0..MAX_PASSES {
        if !propagate_pass(blocks, connections) {
            break;
        }
    }
}

/// Convenience wrapper over the root scope of a model.
pub fn propagate_model(model: &mut crate::model::Model) {
    let connections = model.connections.clone();
    propagate_dimensions(&mut model.blocks, &connections);
}

/// One full pass: seed sources, recurse into subsystems, walk connections.
/// Returns true if any port dimension was assigned.
fn propagate_pass(blocks: &mut [BlockInstance], connections: &[Connection]) -> bool {
    let mut changed = false;

    // (1) Seed at sources: a constant's output shape is the literal shape of
    // its configured value.
    for block in blocks.iter_mut() {
        if block.block_type != "constant" {
            continue;
        }
        let dims = block.param("value").and_then(value_dimensions);
        if let Some(dims) = dims {
            if let Some(port) = block.output_ports.first_mut() {
                if port.has_default_dimensions() && dims != [1] {
                    port.dimensions = dims;
                    changed = true;
                }
            }
        }
    }

    // (2) Recurse into subsystem scopes and exchange shapes across their
    // boundaries.
    for block in blocks.iter_mut() {
        if block.is_subsystem() {
            changed |= propagate_subsystem(block);
        }
    }

    // (3) Walk connections: resolved source, still-default target.
    for conn in connections {
        let src = lookup_dims(blocks, &conn.source_block_id, &conn.source_port_id);
        let Some(dims) = src else { continue };
        if dims == [1] {
            continue;
        }
        if let Some(port) = lookup_port_mut(blocks, &conn.target_block_id, &conn.target_port_id) {
            if port.has_default_dimensions() {
                port.dimensions = dims;
                changed = true;
            }
        }
    }

    changed
}

/// Propagate inside one subsystem and across its boundary.
///
/// External input shapes are seeded onto the matching inport children before
/// the internal pass; after it, resolved inport/outport child shapes are
/// folded back onto the subsystem's own boundary ports.
fn propagate_subsystem(sub: &mut BlockInstance) -> bool {
    let mut changed = false;
    let Some(children) = sub.children.as_mut() else {
        return false;
    };
    let child_connections = sub.child_connections.clone().unwrap_or_default();

    // External input → internal inport output, by boundary ordinal.
    let inports = boundary_order(children, "inport");
    for (ordinal, &child_idx) in inports.iter().enumerate() {
        let Some(ext) = sub.input_ports.get(ordinal) else {
            continue;
        };
        if ext.has_default_dimensions() {
            continue;
        }
        let dims = ext.dimensions.clone();
        if let Some(port) = children[child_idx].output_ports.first_mut() {
            if port.has_default_dimensions() {
                port.dimensions = dims;
                changed = true;
            }
        }
    }

    changed |= propagate_pass(children, &child_connections);

    // Internal inport/outport → external boundary ports, after the internal
    // pass has run.
    for (ordinal, &child_idx) in inports.iter().enumerate() {
        let dims = children[child_idx]
            .output_ports
            .first()
            .map(|p| p.dimensions.clone());
        if let (Some(dims), Some(ext)) = (dims, sub.input_ports.get_mut(ordinal)) {
            if ext.has_default_dimensions() && dims != [1] {
                ext.dimensions = dims;
                changed = true;
            }
        }
    }
    let outports = boundary_order(children, "outport");
    for (ordinal, &child_idx) in outports.iter().enumerate() {
        let dims = children[child_idx]
            .input_ports
            .first()
            .map(|p| p.dimensions.clone());
        if let (Some(dims), Some(ext)) = (dims, sub.output_ports.get_mut(ordinal)) {
            if ext.has_default_dimensions() && dims != [1] {
                ext.dimensions = dims;
                changed = true;
            }
        }
    }

    changed
}

/// Indices of boundary children of the given type, ordered by their
/// `port_number` parameter (document order breaks ties).
fn boundary_order(children: &[BlockInstance], block_type: &str) -> Vec<usize> {
    let mut indexed: Vec<(usize, usize)> = children
        .iter()
        .enumerate()
        .filter(|(_, c)| c.block_type == block_type)
        .map(|(i, c)| {
            let number = c
                .param("port_number")
                .and_then(|v| v.as_number())
                .map(|n| n.max(1.0) as usize)
                .unwrap_or(i + 1);
            (number, i)
        })
        .collect();
    indexed.sort_by_key(|(number, _)| *number);
    indexed.into_iter().map(|(_, i)| i).collect()
}

/// Literal shape of a constant's configured value: scalar, explicit array, or
/// delimited list in string form.
fn value_dimensions(value: &ParamValue) -> Option<Vec<usize>> {
    match value {
        ParamValue::Number(_) | ParamValue::Bool(_) => Some(vec![1]),
        ParamValue::NumArray(items) => Some(vec![items.len().max(1)]),
        ParamValue::Str(s) => {
            let n = s
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .filter(|e| !e.trim().is_empty())
                .count();
            Some(vec![n.max(1)])
        }
    }
}

fn lookup_dims(blocks: &[BlockInstance], block_id: &str, port_id: &str) -> Option<Vec<usize>> {
    let block = blocks.iter().find(|b| b.id == block_id)?;
    block
        .output_ports
        .iter()
        .chain(block.input_ports.iter())
        .find(|p| p.id == port_id)
        .map(|p| p.dimensions.clone())
}

fn lookup_port_mut<'a>(
    blocks: &'a mut [BlockInstance],
    block_id: &str,
    port_id: &str,
) -> Option<&'a mut crate::model::Port> {
    let block = blocks.iter_mut().find(|b| b.id == block_id)?;
    block
        .input_ports
        .iter_mut()
        .chain(block.output_ports.iter_mut())
        .find(|p| p.id == port_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockInstance, Connection, ParamValue};
    use crate::ports::synthesize_ports;

    fn constant(value: ParamValue) -> BlockInstance {
        let mut b = BlockInstance::new("constant", "C");
        b.parameters.insert("value".to_string(), value);
        synthesize_ports(&mut b);
        b
    }

    #[test]
    fn seeds_array_constant_and_propagates_one_hop() {
        let c = constant(ParamValue::NumArray(vec![1.0, 2.0, 3.0]));
        let mut s = BlockInstance::new("scope", "S");
        synthesize_ports(&mut s);
        let conn = Connection::new(&c.id, &c.output_ports[0].id, &s.id, &s.input_ports[0].id);
        let mut blocks = vec![c, s];

        propagate_dimensions(&mut blocks, &[conn]);
        assert_eq!(blocks[0].output_ports[0].dimensions, vec![3]);
        assert_eq!(blocks[1].input_ports[0].dimensions, vec![3]);
    }

    #[test]
    fn string_value_shape_counts_delimited_elements() {
        assert_eq!(
            value_dimensions(&ParamValue::Str("[1, 2, 3]".to_string())),
            Some(vec![3])
        );
        assert_eq!(
            value_dimensions(&ParamValue::Str("7".to_string())),
            Some(vec![1])
        );
    }

    #[test]
    fn propagation_is_idempotent() {
        let c = constant(ParamValue::Str("[4 5]".to_string()));
        let mut g = BlockInstance::new("gain", "G");
        synthesize_ports(&mut g);
        let conn = Connection::new(&c.id, &c.output_ports[0].id, &g.id, &g.input_ports[0].id);
        let mut blocks = vec![c, g];

        propagate_dimensions(&mut blocks, &[conn.clone()]);
        let snapshot: Vec<Vec<usize>> = blocks[1].input_ports.iter().map(|p| p.dimensions.clone()).collect();
        propagate_dimensions(&mut blocks, &[conn]);
        let again: Vec<Vec<usize>> = blocks[1].input_ports.iter().map(|p| p.dimensions.clone()).collect();
        assert_eq!(snapshot, again);
        assert_eq!(snapshot, vec![vec![2]]);
    }

    #[test]
    fn folds_subsystem_boundary_dimensions() {
        // constant [1,2,3] → subsystem { inport → outport } → scope
        let c = constant(ParamValue::NumArray(vec![1.0, 2.0, 3.0]));

        let mut inport = BlockInstance::new("inport", "In1");
        inport
            .parameters
            .insert("port_number".to_string(), ParamValue::Number(1.0));
        synthesize_ports(&mut inport);
        let mut outport = BlockInstance::new("outport", "Out1");
        outport
            .parameters
            .insert("port_number".to_string(), ParamValue::Number(1.0));
        synthesize_ports(&mut outport);
        let inner = Connection::new(
            &inport.id,
            &inport.output_ports[0].id,
            &outport.id,
            &outport.input_ports[0].id,
        );

        let mut sub = BlockInstance::new("subsystem", "Sub");
        sub.children = Some(vec![inport, outport]);
        sub.child_connections = Some(vec![inner]);
        synthesize_ports(&mut sub);

        let mut scope = BlockInstance::new("scope", "S");
        synthesize_ports(&mut scope);

        let c_to_sub = Connection::new(&c.id, &c.output_ports[0].id, &sub.id, &sub.input_ports[0].id);
        let sub_to_scope = Connection::new(
            &sub.id,
            &sub.output_ports[0].id,
            &scope.id,
            &scope.input_ports[0].id,
        );
        let mut blocks = vec![c, sub, scope];

        propagate_dimensions(&mut blocks, &[c_to_sub, sub_to_scope]);
        assert_eq!(blocks[1].input_ports[0].dimensions, vec![3]);
        assert_eq!(blocks[1].output_ports[0].dimensions, vec![3]);
        assert_eq!(blocks[2].input_ports[0].dimensions, vec![3]);
    }
}
