use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// Generate a fresh process-wide unique identifier for blocks, ports and
/// connections. Uniqueness (not ordering) is the only guarantee callers rely
/// on, so a random v4 UUID is sufficient even across repeated
/// compose/decompose cycles.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Parameter values
// ────────────────────────────────────────────────────────────────────────────

/// A block parameter value.
///
/// The interchange format stores everything as text; during import the type
/// mapper coerces values into one of these variants. Export renders them back
/// to the textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Str(String),
    NumArray(Vec<f64>),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Port
// ────────────────────────────────────────────────────────────────────────────

/// A typed input or output port on a block.
///
/// `dimensions` holds the per-signal array shape. It defaults to a scalar
/// (`[1]`) and stays that way until the dimension propagator resolves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<usize>,
}

impl Port {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            data_type: "double".to_string(),
            dimensions: vec![1],
        }
    }

    /// True if the port still carries the default scalar dimension.
    pub fn has_default_dimensions(&self) -> bool {
        self.dimensions == [1]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connection
// ────────────────────────────────────────────────────────────────────────────

/// A directed signal connection between two ports.
///
/// Fan-out is allowed (one source port may drive many connections); fan-in is
/// not (a given target port appears in at most one connection). The invariant
/// is enforced by [`add_connection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub source_block_id: String,
    pub source_port_id: String,
    pub target_block_id: String,
    pub target_port_id: String,
}

impl Connection {
    pub fn new(
        source_block_id: impl Into<String>,
        source_port_id: impl Into<String>,
        target_block_id: impl Into<String>,
        target_port_id: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            source_block_id: source_block_id.into(),
            source_port_id: source_port_id.into(),
            target_block_id: target_block_id.into(),
            target_port_id: target_port_id.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BlockInstance
// ────────────────────────────────────────────────────────────────────────────

/// A block in the diagram.
///
/// A block with `children` is a subsystem: `children` and `child_connections`
/// form a nested scope owned exclusively by this block. For subsystems the
/// number of `inport`-typed children equals the number of external input
/// ports, and correspondingly for `outport` children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInstance {
    pub id: String,
    /// Internal block type name (e.g. "constant", "sum", "subsystem").
    pub block_type: String,
    pub name: String,
    /// Raw position rectangle `[left, top, right, bottom]` from the
    /// interchange format.
    pub position: Vec<f64>,
    pub parameters: IndexMap<String, ParamValue>,
    pub input_ports: Vec<Port>,
    pub output_ports: Vec<Port>,
    /// Nested blocks when this block is a subsystem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BlockInstance>>,
    /// Connections between nested blocks when this block is a subsystem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_connections: Option<Vec<Connection>>,
}

impl BlockInstance {
    pub fn new(block_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            block_type: block_type.into(),
            name: name.into(),
            position: vec![0.0, 0.0, 30.0, 30.0],
            parameters: IndexMap::new(),
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            children: None,
            child_connections: None,
        }
    }

    pub fn is_subsystem(&self) -> bool {
        self.children.is_some()
    }

    /// Look up a parameter value.
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    /// Update a parameter and re-derive the port lists. Existing port IDs are
    /// preserved for indices that survive so unrelated connections stay valid.
    pub fn set_param(&mut self, key: impl Into<String>, value: ParamValue) {
        self.parameters.insert(key.into(), value);
        crate::ports::rederive_ports(self);
    }

    /// Center of the position rectangle, used for layout when composing and
    /// decomposing subsystems.
    pub fn center(&self) -> (f64, f64) {
        if self.position.len() == 4 {
            (
                (self.position[0] + self.position[2]) / 2.0,
                (self.position[1] + self.position[3]) / 2.0,
            )
        } else {
            (0.0, 0.0)
        }
    }

    /// Shift the position rectangle by a delta.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        if self.position.len() == 4 {
            self.position[0] += dx;
            self.position[2] += dx;
            self.position[1] += dy;
            self.position[3] += dy;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
}

/// Simulation configuration handed to the (external) numerical engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Internal solver name (e.g. "rk45", "euler").
    pub solver: String,
    pub start_time: f64,
    pub stop_time: f64,
    pub step_size: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            solver: "rk45".to_string(),
            start_time: 0.0,
            stop_time: 10.0,
            step_size: 0.01,
        }
    }
}

/// The root scope of a diagram: top-level blocks and connections plus the
/// simulation configuration. Subsystem blocks own their nested scopes
/// recursively, forming a tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub metadata: ModelMetadata,
    pub blocks: Vec<BlockInstance>,
    pub connections: Vec<Connection>,
    pub simulation_config: SimulationConfig,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            metadata: ModelMetadata { name: name.into() },
            blocks: Vec::new(),
            connections: Vec::new(),
            simulation_config: SimulationConfig::default(),
        }
    }

    pub fn block(&self, id: &str) -> Option<&BlockInstance> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn block_mut(&mut self, id: &str) -> Option<&mut BlockInstance> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    /// Walk all blocks recursively, calling `cb` for every block at any depth.
    pub fn walk_blocks<F>(&self, cb: &mut F)
    where
        F: FnMut(&BlockInstance),
    {
        fn walk<F: FnMut(&BlockInstance)>(blocks: &[BlockInstance], cb: &mut F) {
            for blk in blocks {
                cb(blk);
                if let Some(children) = &blk.children {
                    walk(children, cb);
                }
            }
        }
        walk(&self.blocks, cb);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scope-level mutation helpers
// ────────────────────────────────────────────────────────────────────────────

/// Add a connection to a scope, rejecting fan-in: if the target port is
/// already driven by another connection the new one is refused and `false` is
/// returned.
pub fn add_connection(connections: &mut Vec<Connection>, conn: Connection) -> bool {
    let occupied = connections.iter().any(|c| {
        c.target_block_id == conn.target_block_id && c.target_port_id == conn.target_port_id
    });
    if occupied {
        return false;
    }
    connections.push(conn);
    true
}

/// Remove a block from a scope by id, cascading to every connection that
/// references one of its ports. Recurses into subsystem scopes so the block
/// is removed wherever it lives. Returns true if a block was removed.
pub fn remove_block(
    blocks: &mut Vec<BlockInstance>,
    connections: &mut Vec<Connection>,
    id: &str,
) -> bool {
    if let Some(idx) = blocks.iter().position(|b| b.id == id) {
        blocks.remove(idx);
        connections.retain(|c| c.source_block_id != id && c.target_block_id != id);
        return true;
    }
    for blk in blocks.iter_mut() {
        if let (Some(children), Some(child_conns)) =
            (blk.children.as_mut(), blk.child_connections.as_mut())
        {
            if remove_block(children, child_conns, id) {
                return true;
            }
        }
    }
    false
}
