//! dbaction core - driver-independent execution of database actions.
//!
//! A database action is a declarative query: free-form SQL with `?` slots,
//! named input bindings, and optional child queries whose results are
//! merged into the parent's rows. This crate turns such a definition into
//! parameterised driver calls and returns a [`TypedTable`], without any
//! storage or transport dependencies.
//!
//! # Main Components
//!
//! - **Scanner**: finds slots while ignoring comments and quoted literals
//! - **Names / Parameters**: resolve slots to inputs, materialise and expand values
//! - **Dispatch**: classifies SQL, runs it through a [`Driver`] and converts cells
//! - **Merge**: correlates child results with parent rows
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use dbaction_core::{
//!     expand, materialise_row, ActionRequest, Binding, CellFormat, Control, Dispatcher,
//!     InMemoryDriver, Query, DEFAULT_CONTROL_MARKER,
//! };
//!
//! let mut controls = HashMap::new();
//! controls.insert("P1_C1".to_string(), Control::new("P1_C1", "Amount"));
//!
//! let query = Query::new("update t set x = ?Amount").with_inputs(vec![Binding::new("P1_C1")]);
//! let map = query.parameter_map(&controls).unwrap();
//! let params = materialise_row(&query.inputs, 0, &ActionRequest::new(), DEFAULT_CONTROL_MARKER);
//!
//! let mut driver = InMemoryDriver::new().with_update("update t set x = ?", 1);
//! let format = CellFormat::default();
//! let table = Dispatcher::new(&format)
//!     .execute(&query, &[expand(map, &params)], &mut driver)
//!     .unwrap();
//! assert_eq!(table.columns, vec!["rows"]);
//! ```

pub mod context;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod merge;
pub mod names;
pub mod parameters;
pub mod query;
pub mod scanner;
pub mod table;

// Re-export main types for convenience
pub use context::{ActionRequest, RequestContext};
pub use dispatch::{
    classify, CellFormat, Dispatcher, StatementKind, DEFAULT_DATE_FORMAT,
    DEFAULT_DATE_TIME_FORMAT,
};
pub use driver::{ColumnMeta, ColumnType, Driver, DriverValue, InMemoryDriver, ResultSet};
pub use error::{ActionError, ActionResult, DriverError, SlotResolutionError};
pub use merge::{merge_children, ChildResult};
pub use names::{build_name_index, Control, ControlNamespace};
pub use parameters::{
    build_parameter_map, expand, fingerprint, materialise_row, row_count, InputTable,
    ParamValue, ParameterMap, Parameters, DEFAULT_CONTROL_MARKER,
};
pub use query::{Binding, Query};
pub use scanner::{scan_slots, strip_noise, unspecify_slots, Slot, SlotKind};
pub use table::{Cell, TypedTable};
