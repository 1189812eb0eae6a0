use std::collections::{BTreeSet, HashMap};

use crate::error::SlotResolutionError;
use crate::names::{build_name_index, normalise_slot_name, ControlNamespace};
use crate::query::Binding;
use crate::scanner::{scan_slots, statement_prefix, SlotKind};

/// For each slot occurrence in the SQL, the index of the declared input
/// it binds. Every entry is below the number of inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap(Vec<usize>);

impl ParameterMap {
    pub fn new(ordinals: Vec<usize>) -> Self {
        Self(ordinals)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.0.iter()
    }
}

fn is_stored_procedure_call(sql: &str) -> bool {
    statement_prefix(sql, 5) == "{call"
}

/// Resolves every slot in `sql` to an input ordinal.
///
/// Slots that resolve to nothing, or to an ordinal past the last input,
/// are dropped. Inputs nothing refers to are only an error for `{call ...}`
/// statements, where unreferenced inputs would be taken as outputs.
pub fn build_parameter_map(
    sql: &str,
    inputs: &[Binding],
    namespace: &dyn ControlNamespace,
) -> Result<ParameterMap, SlotResolutionError> {
    let slots = scan_slots(sql);

    let names: HashMap<String, usize> = if slots.iter().any(|s| s.is_named()) {
        build_name_index(inputs, namespace)
    } else {
        HashMap::new()
    };

    let mut unused: BTreeSet<usize> = (1..=inputs.len()).collect();
    let mut ordinals = Vec::with_capacity(slots.len());
    let mut anonymous = 0usize;

    for slot in &slots {
        let resolved = match &slot.kind {
            SlotKind::Anonymous => {
                let ordinal = anonymous;
                anonymous += 1;
                Some(ordinal)
            }
            SlotKind::Numbered(n) => n.checked_sub(1),
            SlotKind::Named { name, quoted } => {
                let normalised = normalise_slot_name(name);
                let key = if *quoted {
                    format!("\"{}\"", normalised)
                } else {
                    normalised
                };
                names.get(&key).copied()
            }
        };

        match resolved {
            Some(ordinal) if ordinal < inputs.len() => {
                unused.remove(&(ordinal + 1));
                ordinals.push(ordinal);
            }
            _ => {
                tracing::debug!("Slot '{}' does not resolve to a declared input", slot.raw);
            }
        }
    }

    if let Some(&index) = unused.iter().next() {
        if is_stored_procedure_call(sql) {
            return Err(SlotResolutionError::UnusedInput { index });
        }
    }

    Ok(ParameterMap(ordinals))
}
