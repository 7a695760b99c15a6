//! Per-call evaluation context.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shelf_core::Value;

use crate::error::{Result, ViewError};
use crate::registry::ViewRegistry;

/// Maximum nesting of named-view references during one evaluation.
pub const MAX_REFERENCE_DEPTH: usize = 32;

/// Parameters, registry access and a fixed clock for one evaluation.
///
/// The registry is borrowed, never owned. Build a fresh context for each
/// top-level call.
#[derive(Clone)]
pub struct ViewContext<'r> {
    params: BTreeMap<String, Value>,
    registry: Option<&'r ViewRegistry>,
    apply_defaults: bool,
    now: DateTime<Utc>,
    depth: usize,
}

impl<'r> ViewContext<'r> {
    pub fn new() -> Self {
        Self {
            params: BTreeMap::new(),
            registry: None,
            apply_defaults: true,
            now: Utc::now(),
            depth: 0,
        }
    }

    /// Context that resolves names through `registry`, taking its
    /// defaults setting.
    pub fn with_registry(registry: &'r ViewRegistry) -> Self {
        Self {
            registry: Some(registry),
            apply_defaults: registry.applies_defaults(),
            ..Self::new()
        }
    }

    /// Pin "now" for relative dates.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Whether declared parameter defaults are bound when compiling
    /// parameterized definitions.
    pub fn apply_defaults(mut self, apply: bool) -> Self {
        self.apply_defaults = apply;
        self
    }

    /// A new context with `params` merged over the current ones.
    pub fn with_params(&self, params: &BTreeMap<String, Value>) -> Self {
        let mut next = self.clone();
        next.params
            .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        next
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn registry(&self) -> Option<&'r ViewRegistry> {
        self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn defaults_enabled(&self) -> bool {
        self.apply_defaults
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enter a reference to `name`, failing once the chain is too deep.
    pub(crate) fn descend(&self, name: &str) -> Result<Self> {
        if self.depth >= MAX_REFERENCE_DEPTH {
            return Err(ViewError::RecursionLimit(name.to_string()));
        }
        let mut next = self.clone();
        next.depth += 1;
        Ok(next)
    }
}

impl Default for ViewContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ViewContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContext")
            .field("params", &self.params)
            .field("has_registry", &self.registry.is_some())
            .field("apply_defaults", &self.apply_defaults)
            .field("now", &self.now)
            .field("depth", &self.depth)
            .finish()
    }
}

type ConditionFn = dyn Fn(&ViewContext<'_>) -> bool + Send + Sync;

/// Branch selector for a conditional view.
#[derive(Clone)]
pub enum Condition {
    /// True when the named parameter is bound to a truthy value
    Param(String),
    Custom(Arc<ConditionFn>),
}

impl Condition {
    pub fn param(name: impl Into<String>) -> Self {
        Condition::Param(name.into())
    }

    pub fn custom<F>(func: F) -> Self
    where
        F: Fn(&ViewContext<'_>) -> bool + Send + Sync + 'static,
    {
        Condition::Custom(Arc::new(func))
    }

    pub fn holds(&self, ctx: &ViewContext<'_>) -> bool {
        match self {
            Condition::Param(name) => ctx.get_param(name).is_some_and(Value::is_truthy),
            Condition::Custom(func) => func(ctx),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Param(name) => f.debug_tuple("Param").field(name).finish(),
            Condition::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
