//! Subsystem composition and decomposition.
//!
//! Compose extracts a selected block subset into a new subsystem block,
//! synthesizing Inport/Outport boundary children and rewiring every external
//! connection through the subsystem's boundary ports. Decompose is the
//! inverse: it re-inlines a subsystem's contents into the parent scope and
//! reconnects external signals directly. Both are pure functions over the
//! current scope's block/connection lists, so the same logic applies at any
//! nesting depth.

use crate::dimensions::propagate_dimensions;
use crate::model::{BlockInstance, Connection, Model, ParamValue, add_connection};
use crate::ports::synthesize_ports;
use std::collections::HashSet;

/// Compose the blocks named by `block_ids` into a new subsystem in the
/// model's root scope. Returns the new subsystem's block id, or `None` when
/// the selection is empty or no id resolves to a block.
pub fn compose_subsystem(model: &mut Model, block_ids: &[&str], name: Option<&str>) -> Option<String> {
    let selected: HashSet<&str> = block_ids
        .iter()
        .copied()
        .filter(|id| model.blocks.iter().any(|b| b.id == *id))
        .collect();
    if selected.is_empty() {
        return None;
    }

    // Classify every connection touching the selection.
    let mut internal = Vec::new();
    let mut incoming = Vec::new();
    let mut outgoing = Vec::new();
    let mut untouched = Vec::new();
    for conn in model.connections.drain(..) {
        let src_in = selected.contains(conn.source_block_id.as_str());
        let dst_in = selected.contains(conn.target_block_id.as_str());
        match (src_in, dst_in) {
            (true, true) => internal.push(conn),
            (false, true) => incoming.push(conn),
            (true, false) => outgoing.push(conn),
            (false, false) => untouched.push(conn),
        }
    }
    model.connections = untouched;

    // Pull the selected blocks out of the parent scope, keeping their
    // relative layout around the selection centroid.
    let mut children = Vec::new();
    let mut i = 0;
    while i < model.blocks.len() {
        if selected.contains(model.blocks[i].id.as_str()) {
            children.push(model.blocks.remove(i));
        } else {
            i += 1;
        }
    }
    let (cx, cy) = centroid(&children);
    for child in children.iter_mut() {
        child.translate(200.0 - cx, 200.0 - cy);
    }

    let mut child_connections = internal;

    // One Inport per distinct incoming (target block, target port) pair, in
    // encounter order; the boundary ordinal becomes its port number.
    let mut inport_ordinal = 0usize;
    let mut seen_targets: HashSet<(String, String)> = HashSet::new();
    // (ordinal, external source block/port) for rewiring after the subsystem
    // block exists.
    let mut external_in = Vec::new();
    for conn in incoming {
        let key = (conn.target_block_id.clone(), conn.target_port_id.clone());
        if !seen_targets.insert(key) {
            continue;
        }
        inport_ordinal += 1;
        let inport = make_boundary_block("inport", inport_ordinal, 50.0);
        child_connections.push(Connection::new(
            &inport.id,
            &inport.output_ports[0].id,
            &conn.target_block_id,
            &conn.target_port_id,
        ));
        children.push(inport);
        external_in.push((inport_ordinal, conn.source_block_id, conn.source_port_id));
    }

    // One Outport per distinct outgoing (source block, source port) pair;
    // fan-out to several external targets shares one boundary port.
    let mut outport_ordinal = 0usize;
    let mut seen_sources: HashSet<(String, String)> = HashSet::new();
    let mut external_out = Vec::new();
    for conn in outgoing {
        let key = (conn.source_block_id.clone(), conn.source_port_id.clone());
        let ordinal = if seen_sources.insert(key.clone()) {
            outport_ordinal += 1;
            let outport = make_boundary_block("outport", outport_ordinal, 400.0);
            child_connections.push(Connection::new(
                &conn.source_block_id,
                &conn.source_port_id,
                &outport.id,
                &outport.input_ports[0].id,
            ));
            children.push(outport);
            outport_ordinal
        } else {
            // Already synthesized for this source; reuse its ordinal.
            boundary_ordinal_for(&children, &child_connections, &key)
        };
        external_out.push((ordinal, conn.target_block_id, conn.target_port_id));
    }

    // Assemble the subsystem block; its external port lists derive from the
    // synthesized boundary children.
    let mut sub = BlockInstance::new("subsystem", name.unwrap_or("Subsystem"));
    sub.position = vec![cx - 30.0, cy - 30.0, cx + 30.0, cy + 30.0];
    sub.children = Some(children);
    sub.child_connections = Some(child_connections);
    synthesize_ports(&mut sub);
    let sub_id = sub.id.clone();

    // Rewire external connectivity through the new boundary ports.
    for (ordinal, src_block, src_port) in external_in {
        let port_id = sub.input_ports[ordinal - 1].id.clone();
        add_connection(
            &mut model.connections,
            Connection::new(src_block, src_port, &sub_id, port_id),
        );
    }
    for (ordinal, dst_block, dst_port) in external_out {
        let port_id = sub.output_ports[ordinal - 1].id.clone();
        add_connection(
            &mut model.connections,
            Connection::new(&sub_id, port_id, dst_block, dst_port),
        );
    }

    model.blocks.push(sub);

    // Resolve dimensions inside the new scope right away.
    let idx = model.blocks.len() - 1;
    propagate_dimensions(&mut model.blocks[idx..idx + 1], &[]);

    Some(sub_id)
}

/// Re-inline a subsystem's contents into the model's root scope. Returns
/// false (a no-op) when the id does not name a subsystem block.
pub fn decompose_subsystem(model: &mut Model, subsystem_id: &str) -> bool {
    let Some(idx) = model
        .blocks
        .iter()
        .position(|b| b.id == subsystem_id && b.is_subsystem())
    else {
        return false;
    };
    let sub = model.blocks.remove(idx);
    let mut children = sub.children.unwrap_or_default();
    let child_connections = sub.child_connections.unwrap_or_default();

    let inport_ids: Vec<String> = ordered_boundary_ids(&children, "inport");
    let outport_ids: Vec<String> = ordered_boundary_ids(&children, "outport");
    let boundary: HashSet<&str> = inport_ids
        .iter()
        .chain(outport_ids.iter())
        .map(String::as_str)
        .collect();

    // Rewire each boundary input: the external connection feeding the
    // subsystem's input port is redirected to whatever the inport fed
    // internally (possibly several targets). An inport wired straight to an
    // outport child is a passthrough: the external feed is stitched directly
    // to that outport's external consumers, since both boundary children are
    // about to be discarded.
    let mut new_connections = Vec::new();
    for (ordinal, inport_id) in inport_ids.iter().enumerate() {
        let ext_port = sub.input_ports.get(ordinal).map(|p| p.id.clone());
        let feed = ext_port.and_then(|pid| {
            model
                .connections
                .iter()
                .find(|c| c.target_block_id == sub.id && c.target_port_id == pid)
                .cloned()
        });
        let Some(feed) = feed else { continue };
        for inner in child_connections
            .iter()
            .filter(|c| c.source_block_id == *inport_id)
        {
            let passthrough = outport_ids
                .iter()
                .position(|oid| *oid == inner.target_block_id);
            match passthrough {
                Some(out_ordinal) => {
                    let Some(ext_out) = sub.output_ports.get(out_ordinal) else {
                        continue;
                    };
                    for consumer in model.connections.iter().filter(|c| {
                        c.source_block_id == sub.id && c.source_port_id == ext_out.id
                    }) {
                        new_connections.push(Connection::new(
                            &feed.source_block_id,
                            &feed.source_port_id,
                            &consumer.target_block_id,
                            &consumer.target_port_id,
                        ));
                    }
                }
                None => {
                    new_connections.push(Connection::new(
                        &feed.source_block_id,
                        &feed.source_port_id,
                        &inner.target_block_id,
                        &inner.target_port_id,
                    ));
                }
            }
        }
    }

    // Rewire each boundary output: every external consumer of the
    // subsystem's output port reconnects to the internal source. Outports fed
    // by an inport child were already stitched above.
    for (ordinal, outport_id) in outport_ids.iter().enumerate() {
        let Some(inner) = child_connections
            .iter()
            .find(|c| c.target_block_id == *outport_id)
        else {
            continue;
        };
        if inport_ids.iter().any(|iid| *iid == inner.source_block_id) {
            continue;
        }
        let Some(ext_port) = sub.output_ports.get(ordinal) else {
            continue;
        };
        for consumer in model
            .connections
            .iter()
            .filter(|c| c.source_block_id == sub.id && c.source_port_id == ext_port.id)
        {
            new_connections.push(Connection::new(
                &inner.source_block_id,
                &inner.source_port_id,
                &consumer.target_block_id,
                &consumer.target_port_id,
            ));
        }
    }

    // Every connection still referencing the removed subsystem or one of its
    // discarded boundary children is dropped.
    model.connections.retain(|c| {
        c.source_block_id != sub.id
            && c.target_block_id != sub.id
            && !boundary.contains(c.source_block_id.as_str())
            && !boundary.contains(c.target_block_id.as_str())
    });

    // Internal connections that never touched a boundary block survive.
    for conn in child_connections {
        if !boundary.contains(conn.source_block_id.as_str())
            && !boundary.contains(conn.target_block_id.as_str())
        {
            model.connections.push(conn);
        }
    }
    for conn in new_connections {
        add_connection(&mut model.connections, conn);
    }

    // Splice non-boundary children back in, re-centered on the vacated
    // subsystem position.
    children.retain(|c| !boundary.contains(c.id.as_str()));
    let (scx, scy) = center_of(&sub.position);
    let (ccx, ccy) = centroid(&children);
    for child in children.iter_mut() {
        child.translate(scx - ccx, scy - ccy);
    }
    model.blocks.extend(children);

    true
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn make_boundary_block(block_type: &str, ordinal: usize, x: f64) -> BlockInstance {
    let prefix = if block_type == "inport" { "In" } else { "Out" };
    let mut block = BlockInstance::new(block_type, format!("{}{}", prefix, ordinal));
    let y = 50.0 + (ordinal as f64 - 1.0) * 60.0;
    block.position = vec![x, y, x + 30.0, y + 14.0];
    block
        .parameters
        .insert("port_number".to_string(), ParamValue::Number(ordinal as f64));
    synthesize_ports(&mut block);
    block
}

/// IDs of boundary children of one type, ordered by their port number.
fn ordered_boundary_ids(children: &[BlockInstance], block_type: &str) -> Vec<String> {
    let mut indexed: Vec<(usize, String)> = children
        .iter()
        .enumerate()
        .filter(|(_, c)| c.block_type == block_type)
        .map(|(i, c)| {
            let number = c
                .param("port_number")
                .and_then(|v| v.as_number())
                .map(|n| n.max(1.0) as usize)
                .unwrap_or(i + 1);
            (number, c.id.clone())
        })
        .collect();
    indexed.sort_by_key(|(number, _)| *number);
    indexed.into_iter().map(|(_, id)| id).collect()
}

/// Find the ordinal of the outport already wired to the given internal
/// source, for fan-out sharing a boundary port.
fn boundary_ordinal_for(
    children: &[BlockInstance],
    child_connections: &[Connection],
    source: &(String, String),
) -> usize {
    let outport_id = child_connections
        .iter()
        .find(|c| c.source_block_id == source.0 && c.source_port_id == source.1)
        .map(|c| c.target_block_id.clone());
    let ids = ordered_boundary_ids(children, "outport");
    outport_id
        .and_then(|oid| ids.iter().position(|id| *id == oid))
        .map(|p| p + 1)
        .unwrap_or(1)
}

fn centroid(blocks: &[BlockInstance]) -> (f64, f64) {
    if blocks.is_empty() {
        return (0.0, 0.0);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for b in blocks {
        let (x, y) = b.center();
        cx += x;
        cy += y;
    }
    (cx / blocks.len() as f64, cy / blocks.len() as f64)
}

fn center_of(position: &[f64]) -> (f64, f64) {
    if position.len() == 4 {
        ((position[0] + position[2]) / 2.0, (position[1] + position[3]) / 2.0)
    } else {
        (0.0, 0.0)
    }
}
