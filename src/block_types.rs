//! Centralized block-type registry: the bidirectional table between external
//! interchange-format type names and internal block types, plus the per-type
//! parameter field mappings used by import and export.
//!
//! Import is many-to-one (several external spellings may map to the same
//! internal type); export is one-to-one via the canonical external name.
//! Unknown types degrade to the generic container type in both directions so
//! unrecognized content survives as an inert placeholder instead of aborting
//! the document.

use crate::model::ParamValue;
use crate::parser::extract::ParsedBlock;
use crate::parser::structure::ScalarValue;
use indexmap::IndexMap;

/// Internal type substituted for any external type without a registered
/// mapping.
pub const GENERIC_TYPE: &str = "generic";

/// External container type emitted for internal types without a registered
/// mapping.
pub const GENERIC_EXTERNAL_TYPE: &str = "SubSystem";

/// Parameter kept on generic placeholder blocks so export can restore the
/// original external spelling.
pub const SOURCE_TYPE_PARAM: &str = "source_type";

/// How an external text field is coerced into a [`ParamValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Number,
    /// `on`/`off` ↔ `true`/`false`.
    Bool,
    Text,
    NumArray,
    /// Number, then numeric array, then string — used for fields like a
    /// constant's value whose shape is data-dependent.
    Auto,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamMapping {
    pub external: &'static str,
    pub internal: &'static str,
    pub coerce: Coercion,
}

#[derive(Debug, Clone, Copy)]
pub struct BlockTypeMapping {
    /// Canonical external name, used on export.
    pub external: &'static str,
    pub internal: &'static str,
    /// Additional external spellings accepted on import.
    pub aliases: &'static [&'static str],
    pub params: &'static [ParamMapping],
}

macro_rules! p {
    ($ext:literal, $int:literal, $co:ident) => {
        ParamMapping {
            external: $ext,
            internal: $int,
            coerce: Coercion::$co,
        }
    };
}

/// The static type table. Order matters only for readability.
pub const BLOCK_TYPES: &[BlockTypeMapping] = &[
    BlockTypeMapping {
        external: "Constant",
        internal: "constant",
        aliases: &[],
        params: &[p!("Value", "value", Auto)],
    },
    BlockTypeMapping {
        external: "Gain",
        internal: "gain",
        aliases: &[],
        params: &[p!("Gain", "gain", Auto)],
    },
    BlockTypeMapping {
        external: "Sum",
        internal: "sum",
        aliases: &["Add"],
        params: &[p!("Inputs", "signs", Text)],
    },
    BlockTypeMapping {
        external: "Product",
        internal: "product",
        aliases: &[],
        params: &[p!("Inputs", "inputs", Auto)],
    },
    BlockTypeMapping {
        external: "Scope",
        internal: "scope",
        aliases: &[],
        params: &[p!("NumInputPorts", "inputs", Number)],
    },
    BlockTypeMapping {
        external: "Integrator",
        internal: "integrator",
        aliases: &[],
        params: &[
            p!("InitialCondition", "initial_condition", Auto),
            p!("LimitOutput", "limit_output", Bool),
        ],
    },
    BlockTypeMapping {
        external: "TransferFcn",
        internal: "transfer_function",
        aliases: &["TransferFunction"],
        params: &[
            p!("Numerator", "numerator", NumArray),
            p!("Denominator", "denominator", NumArray),
        ],
    },
    BlockTypeMapping {
        external: "UnitDelay",
        internal: "unit_delay",
        aliases: &[],
        params: &[
            p!("SampleTime", "sample_time", Number),
            p!("InitialCondition", "initial_condition", Auto),
        ],
    },
    BlockTypeMapping {
        external: "Step",
        internal: "step",
        aliases: &[],
        params: &[
            p!("Time", "step_time", Number),
            p!("Before", "initial_value", Number),
            p!("After", "final_value", Number),
        ],
    },
    BlockTypeMapping {
        external: "Sin",
        internal: "sine_wave",
        aliases: &["Sine", "SineWave"],
        params: &[
            p!("Amplitude", "amplitude", Number),
            p!("Frequency", "frequency", Number),
            p!("Phase", "phase", Number),
        ],
    },
    BlockTypeMapping {
        external: "Saturate",
        internal: "saturation",
        aliases: &["Saturation"],
        params: &[
            p!("UpperLimit", "upper_limit", Number),
            p!("LowerLimit", "lower_limit", Number),
        ],
    },
    BlockTypeMapping {
        external: "Mux",
        internal: "mux",
        aliases: &[],
        params: &[p!("Inputs", "inputs", Number)],
    },
    BlockTypeMapping {
        external: "Demux",
        internal: "demux",
        aliases: &[],
        params: &[p!("Outputs", "outputs", Number)],
    },
    BlockTypeMapping {
        external: "Inport",
        internal: "inport",
        aliases: &[],
        params: &[p!("Port", "port_number", Number)],
    },
    BlockTypeMapping {
        external: "Outport",
        internal: "outport",
        aliases: &[],
        params: &[p!("Port", "port_number", Number)],
    },
    BlockTypeMapping {
        external: "Terminator",
        internal: "terminator",
        aliases: &[],
        params: &[],
    },
    BlockTypeMapping {
        external: "Ground",
        internal: "ground",
        aliases: &[],
        params: &[],
    },
    BlockTypeMapping {
        external: "Reference",
        internal: "reference",
        aliases: &[],
        params: &[p!("SourceBlock", "source_block", Text)],
    },
    BlockTypeMapping {
        external: "SubSystem",
        internal: "subsystem",
        aliases: &["Subsystem"],
        params: &[],
    },
];

// ────────────────────────────────────────────────────────────────────────────
// Type name translation
// ────────────────────────────────────────────────────────────────────────────

/// Look up the mapping for an external type name, honoring aliases.
pub fn mapping_for_external(external: &str) -> Option<&'static BlockTypeMapping> {
    BLOCK_TYPES
        .iter()
        .find(|m| m.external == external || m.aliases.contains(&external))
}

pub fn mapping_for_internal(internal: &str) -> Option<&'static BlockTypeMapping> {
    BLOCK_TYPES.iter().find(|m| m.internal == internal)
}

/// External → internal type name; unknown types map to [`GENERIC_TYPE`].
pub fn internal_type_for(external: &str) -> &'static str {
    mapping_for_external(external).map_or(GENERIC_TYPE, |m| m.internal)
}

/// Internal → canonical external type name; unregistered types fall back to
/// the generic container type.
pub fn external_type_for(internal: &str) -> &'static str {
    mapping_for_internal(internal).map_or(GENERIC_EXTERNAL_TYPE, |m| m.external)
}

// ────────────────────────────────────────────────────────────────────────────
// Solver name translation
// ────────────────────────────────────────────────────────────────────────────

const SOLVERS: &[(&str, &str)] = &[
    ("ode45", "rk45"),
    ("ode23", "rk23"),
    ("ode4", "rk4"),
    ("ode2", "heun"),
    ("ode1", "euler"),
    ("VariableStepAuto", "rk45"),
    ("FixedStepAuto", "rk4"),
    ("FixedStepDiscrete", "discrete"),
];

pub fn internal_solver_for(external: &str) -> String {
    SOLVERS
        .iter()
        .find(|(e, _)| *e == external)
        .map(|(_, i)| i.to_string())
        .unwrap_or_else(|| "rk45".to_string())
}

pub fn external_solver_for(internal: &str) -> String {
    SOLVERS
        .iter()
        .find(|(_, i)| *i == internal)
        .map(|(e, _)| e.to_string())
        .unwrap_or_else(|| "ode45".to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Parameter import / export
// ────────────────────────────────────────────────────────────────────────────

/// Extract the internal parameter map for a parsed block of the given
/// internal type. Unknown (generic) blocks keep every raw field as text plus
/// the original external spelling, so nothing is lost.
pub fn import_params(internal_type: &str, parsed: &ParsedBlock) -> IndexMap<String, ParamValue> {
    let mut params = IndexMap::new();
    match mapping_for_internal(internal_type) {
        Some(mapping) => {
            for pm in mapping.params {
                if let Some(raw) = parsed.fields.get(pm.external) {
                    if let Some(v) = coerce_scalar(raw, pm.coerce) {
                        params.insert(pm.internal.to_string(), v);
                    }
                }
            }
        }
        None => {
            params.insert(
                SOURCE_TYPE_PARAM.to_string(),
                ParamValue::Str(parsed.block_type.clone()),
            );
            for (key, raw) in &parsed.fields {
                if let Some(v) = coerce_scalar(raw, Coercion::Auto) {
                    params.insert(key.clone(), v);
                }
            }
        }
    }
    params
}

/// Reverse side: render the internal parameters of a block back into external
/// `(field, text)` pairs in the registered order.
pub fn export_params(
    internal_type: &str,
    params: &IndexMap<String, ParamValue>,
) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    if let Some(mapping) = mapping_for_internal(internal_type) {
        for pm in mapping.params {
            if let Some(v) = params.get(pm.internal) {
                fields.push((pm.external.to_string(), render_param(v)));
            }
        }
    }
    fields
}

fn coerce_scalar(raw: &ScalarValue, coerce: Coercion) -> Option<ParamValue> {
    match coerce {
        Coercion::Number => raw.as_number().map(ParamValue::Number),
        Coercion::Bool => raw.as_str().map(|s| {
            ParamValue::Bool(s.eq_ignore_ascii_case("on") || s.eq_ignore_ascii_case("true"))
        }),
        Coercion::Text => Some(match raw {
            ScalarValue::Str(s) => ParamValue::Str(s.clone()),
            ScalarValue::Number(n) => ParamValue::Str(format_number(*n)),
            _ => return None,
        }),
        Coercion::NumArray => raw.as_num_array().map(ParamValue::NumArray),
        Coercion::Auto => Some(match raw {
            ScalarValue::Number(n) => ParamValue::Number(*n),
            ScalarValue::Array(_) => ParamValue::NumArray(raw.as_num_array()?),
            ScalarValue::Str(s) => match s.trim().parse::<f64>() {
                Ok(n) => ParamValue::Number(n),
                // Quoted arrays come back from the serializer as strings;
                // re-coerce them so parameters survive a round trip.
                Err(_) if s.trim().starts_with('[') => match raw.as_num_array() {
                    Some(items) => ParamValue::NumArray(items),
                    None => ParamValue::Str(s.clone()),
                },
                Err(_) => ParamValue::Str(s.clone()),
            },
            ScalarValue::Empty => return None,
        }),
    }
}

/// Render a parameter value as interchange-format text.
pub fn render_param(value: &ParamValue) -> String {
    match value {
        ParamValue::Number(n) => format_number(*n),
        ParamValue::Bool(b) => if *b { "on" } else { "off" }.to_string(),
        ParamValue::Str(s) => s.clone(),
        ParamValue::NumArray(items) => {
            let body: Vec<String> = items.iter().map(|n| format_number(*n)).collect();
            format!("[{}]", body.join(", "))
        }
    }
}

/// Integral values print without a trailing `.0` to match the source format.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
