//! Filter chains other code can register to extend the payload.
//!
//! Each chain runs its callbacks in registration order, feeding the output
//! of one into the next. An empty chain returns its input unchanged.

use serde_json::{Map, Value};

pub type Attributes = Map<String, Value>;

type CustomDataFilter = Box<dyn Fn(Attributes) -> Attributes + Send + Sync>;
type ActivatorFilter = Box<dyn Fn(String) -> String + Send + Sync>;
type CompanyFilter = Box<dyn Fn(Option<Attributes>) -> Option<Attributes> + Send + Sync>;

#[derive(Default)]
pub struct ExtensionHooks {
    custom_data: Vec<CustomDataFilter>,
    activator: Vec<ActivatorFilter>,
    company_data: Vec<CompanyFilter>,
}

impl ExtensionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_custom_data<F>(mut self, filter: F) -> Self
    where
        F: Fn(Attributes) -> Attributes + Send + Sync + 'static,
    {
        self.custom_data.push(Box::new(filter));
        self
    }

    pub fn on_activator<F>(mut self, filter: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        self.activator.push(Box::new(filter));
        self
    }

    pub fn on_company_data<F>(mut self, filter: F) -> Self
    where
        F: Fn(Option<Attributes>) -> Option<Attributes> + Send + Sync + 'static,
    {
        self.company_data.push(Box::new(filter));
        self
    }

    pub fn custom_data(&self, current: Attributes) -> Attributes {
        self.custom_data.iter().fold(current, |acc, f| f(acc))
    }

    /// Launcher selector; empty means the widget's default.
    pub fn activator_selector(&self) -> String {
        self.activator.iter().fold(String::new(), |acc, f| f(acc))
    }

    pub fn company_data(&self) -> Option<Attributes> {
        self.company_data.iter().fold(None, |acc, f| f(acc))
    }
}

impl std::fmt::Debug for ExtensionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionHooks")
            .field("custom_data", &self.custom_data.len())
            .field("activator", &self.activator.len())
            .field("company_data", &self.company_data.len())
            .finish()
    }
}
