use crate::context::RequestContext;
use crate::query::{Binding, Query};

use super::{ParamValue, Parameters};

/// Substring that marks an item id as a control id (`P1_C3`).
pub const DEFAULT_CONTROL_MARKER: &str = "_C";

fn from_input_table(ctx: &dyn RequestContext, row: usize, name: &str) -> ParamValue {
    ctx.input_table()
        .and_then(|table| table.value(row, name))
        .map(ParamValue::from)
        .unwrap_or(ParamValue::Null)
}

fn resolve_input(
    input: &Binding,
    row: usize,
    ctx: &dyn RequestContext,
    control_marker: &str,
) -> ParamValue {
    let dotted = input.dotted_name();

    if input.is_system() || input.item_id.contains(control_marker) {
        return match input.item_id.as_str() {
            "System.device" => ctx.device().map(ParamValue::from).unwrap_or(ParamValue::Null),
            "System.user name" => ctx
                .user_name()
                .map(ParamValue::from)
                .unwrap_or(ParamValue::Null),
            _ => from_input_table(ctx, row, &dotted),
        };
    }

    if ctx.has_page_variable(&input.item_id) {
        return from_input_table(ctx, row, &dotted);
    }

    ctx.session_attribute(&input.item_id)
        .unwrap_or(ParamValue::Null)
}

/// Resolves every declared input for one row of input data.
///
/// Values that cannot be found are `Null`.
pub fn materialise_row(
    inputs: &[Binding],
    row: usize,
    ctx: &dyn RequestContext,
    control_marker: &str,
) -> Parameters {
    inputs
        .iter()
        .map(|input| resolve_input(input, row, ctx, control_marker))
        .collect()
}

/// Number of parameter rows a query executes with: one per input row for
/// multi-row queries (at least one), otherwise one.
pub fn row_count(query: &Query, ctx: &dyn RequestContext) -> usize {
    if !query.multi_row {
        return 1;
    }
    ctx.input_table()
        .map(|table| table.rows.len())
        .unwrap_or(0)
        .max(1)
}
