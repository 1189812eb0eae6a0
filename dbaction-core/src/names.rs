//! Resolution of human-readable slot names to input ordinals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::query::Binding;

/// A page or application control as seen by the name resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub control_type: String,
}

impl Control {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            control_type: String::new(),
        }
    }
}

/// Looks controls up by id.
pub trait ControlNamespace {
    fn resolve(&self, id: &str) -> Option<&Control>;
}

impl ControlNamespace for HashMap<String, Control> {
    fn resolve(&self, id: &str) -> Option<&Control> {
        self.get(id)
    }
}

/// Normalises a dotted slot name: the second segment is lowercased and
/// stripped of spaces. `System.` names are returned verbatim.
pub fn normalise_slot_name(name: &str) -> String {
    if name.starts_with("System.") {
        return name.to_string();
    }
    let mut parts: Vec<String> = name.split('.').map(str::to_string).collect();
    if let Some(second) = parts.get_mut(1) {
        *second = second.to_lowercase().replace(' ', "");
    }
    parts.join(".")
}

fn register(index: &mut HashMap<String, usize>, name: &str, ordinal: usize) {
    index.insert(format!("\"{}\"", name), ordinal);
    if !name.contains(' ') {
        index.insert(name.to_string(), ordinal);
    }
}

/// Builds the lookup from slot names to input ordinals.
///
/// Keys for quoted slots include the surrounding double quotes. Later inputs
/// overwrite earlier ones that resolve to the same name. Inputs whose
/// control cannot be resolved get no entry.
pub fn build_name_index(
    inputs: &[Binding],
    namespace: &dyn ControlNamespace,
) -> HashMap<String, usize> {
    let mut index = HashMap::new();

    for (ordinal, input) in inputs.iter().enumerate() {
        if input.is_system() {
            index.insert(format!("\"{}\"", input.item_id), ordinal);
            continue;
        }

        let (control_id, properties) = match input.item_id.split_once('.') {
            Some((id, rest)) => (id, Some(rest)),
            None => (input.item_id.as_str(), None),
        };

        let Some(control) = namespace.resolve(control_id) else {
            tracing::debug!(
                "Control '{}' for input {} not found, no slot name registered",
                control_id,
                ordinal + 1
            );
            continue;
        };

        let mut name = control.name.clone();
        if let Some(properties) = properties {
            name.push('.');
            name.push_str(properties);
        }

        if let Some(field) = input.field() {
            register(&mut index, &control.name, ordinal);
            name.push('.');
            name.push_str(field);
        }

        register(&mut index, &normalise_slot_name(&name), ordinal);
    }

    index
}
