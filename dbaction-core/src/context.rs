//! The request a database action runs for.

use std::collections::{HashMap, HashSet};

use crate::parameters::{InputTable, ParamValue};

/// What a parameter can be read from while an action runs.
pub trait RequestContext {
    /// The authenticated user, never a client-supplied value.
    fn user_name(&self) -> Option<&str>;

    fn device(&self) -> Option<&str>;

    fn session_attribute(&self, key: &str) -> Option<ParamValue>;

    /// Input data sent by the caller, if any.
    fn input_table(&self) -> Option<&InputTable>;

    /// Whether the page the action belongs to declares this variable.
    fn has_page_variable(&self, name: &str) -> bool;
}

/// Owned request context built up by the host.
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    user_name: Option<String>,
    device: Option<String>,
    session: HashMap<String, ParamValue>,
    input: Option<InputTable>,
    page_variables: HashSet<String>,
}

impl ActionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_session_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Self {
        self.session.insert(key.into(), value.into());
        self
    }

    pub fn with_input(mut self, input: InputTable) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_page_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.page_variables.extend(names.into_iter().map(Into::into));
        self
    }
}

impl RequestContext for ActionRequest {
    fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    fn session_attribute(&self, key: &str) -> Option<ParamValue> {
        self.session.get(key).cloned()
    }

    fn input_table(&self) -> Option<&InputTable> {
        self.input.as_ref()
    }

    fn has_page_variable(&self, name: &str) -> bool {
        self.page_variables.contains(name)
    }
}
