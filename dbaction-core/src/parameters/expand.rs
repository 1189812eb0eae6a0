use super::{ParamValue, ParameterMap, Parameters};

/// Reorders per-input values into per-slot values.
///
/// A map shorter than the parameter list is stale (the query was edited
/// after the map was built), in which case the values are returned as they
/// are.
pub fn expand(map: &ParameterMap, params: &[ParamValue]) -> Parameters {
    if map.len() < params.len() {
        return params.to_vec();
    }
    map.iter()
        .map(|&ordinal| params.get(ordinal).cloned().unwrap_or(ParamValue::Null))
        .collect()
}
