//! Named views
//!
//! The registry keeps two tables:
//! - compiled views, ready to evaluate
//! - raw definitions, parsed on demand with the caller's parameters
//!
//! A definition is compiled once and cached only when it declares no
//! parameters and the call supplied none. Anything else is compiled per
//! call so one caller's arguments never leak into another's view.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value as Json;
use shelf_core::{BookmarkStore, Value};
use tracing::{debug, info};

use crate::builtin::builtin_views;
use crate::config::ViewsConfig;
use crate::context::ViewContext;
use crate::error::{ParseError, Result, ViewError};
use crate::loader::{definition_files, read_document};
use crate::parser::parse_definition;
use crate::result::ViewResult;
use crate::view::View;

/// A declared definition parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamSpec {
    pub default: Option<Value>,
    pub description: Option<String>,
}

/// Descriptive data kept alongside a view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewMetadata {
    pub description: Option<String>,
    pub params: BTreeMap<String, ParamSpec>,
    pub builtin: bool,
}

impl ViewMetadata {
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    /// Declared defaults, for parameters that have one.
    pub fn defaults(&self) -> BTreeMap<String, Value> {
        self.params
            .iter()
            .filter_map(|(name, spec)| spec.default.clone().map(|d| (name.clone(), d)))
            .collect()
    }
}

/// Summary of one registered view.
#[derive(Debug, Clone, Serialize)]
pub struct ViewInfo {
    pub name: String,
    pub description: Option<String>,
    pub builtin: bool,
    pub has_params: bool,
    pub compiled: bool,
}

/// Registry summary.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryInfo {
    pub total: usize,
    pub builtin: usize,
    pub custom: usize,
    pub compiled: usize,
    pub pending: usize,
    pub views: Vec<ViewInfo>,
}

/// Registry of named views
#[derive(Debug)]
pub struct ViewRegistry {
    compiled: RwLock<HashMap<String, Arc<View>>>,
    definitions: HashMap<String, Json>,
    metadata: HashMap<String, ViewMetadata>,
    apply_defaults: bool,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
            definitions: HashMap::new(),
            metadata: HashMap::new(),
            apply_defaults: true,
        }
    }

    /// Create a registry with the builtin views registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for builtin in builtin_views() {
            let metadata = ViewMetadata {
                builtin: true,
                ..ViewMetadata::described(builtin.description)
            };
            registry.register(builtin.name, builtin.view, Some(metadata));
        }
        registry
    }

    /// Build a registry from configuration, loading every configured path.
    pub fn from_config(config: &ViewsConfig) -> Result<Self> {
        let mut registry = if config.builtins {
            Self::with_builtins()
        } else {
            Self::new()
        };
        registry.apply_defaults = config.apply_defaults;
        for path in &config.definition_paths {
            if path.is_dir() {
                registry.load_directory(path)?;
            } else {
                registry.load_file(path)?;
            }
        }
        Ok(registry)
    }

    /// Whether contexts created by this registry bind declared defaults.
    pub fn applies_defaults(&self) -> bool {
        self.apply_defaults
    }

    pub fn set_apply_defaults(&mut self, apply: bool) {
        self.apply_defaults = apply;
    }

    /// Register a compiled view, replacing any view or definition of the
    /// same name.
    pub fn register(&mut self, name: impl Into<String>, view: View, metadata: Option<ViewMetadata>) {
        let name = name.into();
        debug!(view = %name, kind = view.kind(), "registering view");
        self.definitions.remove(&name);
        self.compiled_mut().insert(name.clone(), Arc::new(view));
        self.metadata.insert(name, metadata.unwrap_or_default());
    }

    /// Register a raw definition for lazy compilation.
    ///
    /// `description` and `params` keys are hoisted into the metadata. The
    /// definition is test-parsed now, with stand-ins for parameters that
    /// have no default, so malformed definitions fail at registration.
    pub fn register_definition(
        &mut self,
        name: impl Into<String>,
        definition: Json,
        metadata: Option<ViewMetadata>,
    ) -> Result<()> {
        let name = name.into();
        let map = definition
            .as_object()
            .ok_or_else(|| ParseError::invalid("definition", "expected a table").in_view(&name))?;

        let mut metadata = metadata.unwrap_or_default();
        metadata.builtin = false;
        match map.get("description") {
            Some(Json::String(d)) => metadata.description = Some(d.clone()),
            Some(_) => {
                return Err(ParseError::invalid("description", "expected a string")
                    .in_view(&name)
                    .into())
            }
            None => {}
        }
        if let Some(params) = map.get("params") {
            let declared = parse_param_specs(params).map_err(|e| e.in_view(&name))?;
            metadata.params.extend(declared);
        }

        check_definition(&definition, &metadata).map_err(|e| e.in_view(&name))?;

        debug!(view = %name, params = metadata.params.len(), "registering definition");
        self.compiled_mut().remove(&name);
        self.definitions.insert(name.clone(), definition);
        self.metadata.insert(name, metadata);
        Ok(())
    }

    /// Remove a custom view. Builtins cannot be removed.
    pub fn unregister(&mut self, name: &str) -> Result<()> {
        match self.metadata.get(name) {
            None => Err(ViewError::NotFound(name.to_string())),
            Some(meta) if meta.builtin => Err(ViewError::InvalidOperation(format!(
                "cannot unregister builtin view '{}'",
                name
            ))),
            Some(_) => {
                self.metadata.remove(name);
                self.definitions.remove(name);
                self.compiled_mut().remove(name);
                Ok(())
            }
        }
    }

    /// Look up a view, compiling its definition with `params` if needed.
    pub fn get(&self, name: &str, params: &BTreeMap<String, Value>) -> Result<Arc<View>> {
        self.compile(name, params, self.apply_defaults)
    }

    /// Look up a view with the context's parameters and defaults setting.
    pub fn resolve(&self, name: &str, ctx: &ViewContext<'_>) -> Result<Arc<View>> {
        self.compile(name, ctx.params(), ctx.defaults_enabled())
    }

    fn compile(&self, name: &str, params: &BTreeMap<String, Value>, apply_defaults: bool) -> Result<Arc<View>> {
        if let Some(view) = self.compiled_ref().get(name) {
            return Ok(Arc::clone(view));
        }
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| ViewError::NotFound(name.to_string()))?;
        let metadata = self.metadata.get(name).cloned().unwrap_or_default();

        let mut bound = if apply_defaults {
            metadata.defaults()
        } else {
            BTreeMap::new()
        };
        bound.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        let view = Arc::new(parse_definition(definition, &bound).map_err(|e| e.in_view(name))?);

        // Cache only when no caller arguments could have shaped the view.
        if params.is_empty() && !metadata.has_params() {
            debug!(view = %name, "caching compiled definition");
            self.compiled_mut().insert(name.to_string(), Arc::clone(&view));
        }
        Ok(view)
    }

    pub fn has(&self, name: &str) -> bool {
        self.definitions.contains_key(name) || self.compiled_ref().contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn list(&self, include_builtins: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .metadata
            .iter()
            .filter(|(_, meta)| include_builtins || !meta.builtin)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn metadata(&self, name: &str) -> Option<&ViewMetadata> {
        self.metadata.get(name)
    }

    /// Evaluate a named view with a fresh context.
    pub fn evaluate(
        &self,
        name: &str,
        store: &dyn BookmarkStore,
        params: &BTreeMap<String, Value>,
    ) -> Result<ViewResult> {
        let ctx = ViewContext::with_registry(self).with_params(params);
        self.evaluate_in(name, store, &ctx)
    }

    /// Evaluate a named view in a caller-built context.
    pub fn evaluate_in(&self, name: &str, store: &dyn BookmarkStore, ctx: &ViewContext<'_>) -> Result<ViewResult> {
        let view = self.resolve(name, ctx)?;
        let result = view.evaluate(store, ctx)?;
        Ok(result.with_metadata("view", Json::String(name.to_string())))
    }

    /// Register every view in a definitions document.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let entries = read_document(path)?;
        let count = entries.len();
        for (name, definition) in entries {
            self.register_definition(name, definition, None)?;
        }
        debug!(path = %path.display(), count, "loaded view definitions");
        Ok(count)
    }

    /// Register every view found under `dir`, recursively, in path order.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        let mut count = 0;
        for file in definition_files(dir)? {
            count += self.load_file(&file)?;
        }
        info!(dir = %dir.display(), count, "loaded view definitions");
        Ok(count)
    }

    pub fn info(&self) -> RegistryInfo {
        let compiled = self.compiled_ref();
        let views: Vec<ViewInfo> = self
            .list(true)
            .into_iter()
            .map(|name| {
                let meta = self.metadata.get(&name).cloned().unwrap_or_default();
                ViewInfo {
                    compiled: compiled.contains_key(&name),
                    description: meta.description,
                    builtin: meta.builtin,
                    has_params: !meta.params.is_empty(),
                    name,
                }
            })
            .collect();
        let builtin = views.iter().filter(|v| v.builtin).count();
        RegistryInfo {
            total: views.len(),
            builtin,
            custom: views.len() - builtin,
            compiled: views.iter().filter(|v| v.compiled).count(),
            pending: views.iter().filter(|v| !v.compiled).count(),
            views,
        }
    }

    fn compiled_ref(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<View>>> {
        self.compiled.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn compiled_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<View>>> {
        self.compiled.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Above this many required parameters only uniform stand-ins are tried.
const MAX_EXHAUSTIVE_PARAMS: usize = 3;

/// One stand-in per value shape a definition key can require: numeric
/// text, integer, boolean and relative date.
fn stand_ins() -> [Value; 4] {
    [
        Value::from("1"),
        Value::Int(1),
        Value::Bool(true),
        Value::from("1 day ago"),
    ]
}

/// Parse a definition with its declared defaults bound and stand-ins for
/// every required parameter. Succeeds if any assignment parses; otherwise
/// returns the first error.
fn check_definition(definition: &Json, metadata: &ViewMetadata) -> std::result::Result<(), ParseError> {
    let required: Vec<&String> = metadata
        .params
        .iter()
        .filter(|(_, spec)| spec.default.is_none())
        .map(|(name, _)| name)
        .collect();
    let choices = stand_ins();
    let exhaustive = required.len() <= MAX_EXHAUSTIVE_PARAMS;
    let attempts = if exhaustive {
        choices.len().pow(required.len() as u32)
    } else {
        choices.len()
    };

    let mut first_error = None;
    for attempt in 0..attempts {
        let mut bound = metadata.defaults();
        let mut rest = attempt;
        for name in &required {
            let pick = if exhaustive {
                let pick = rest % choices.len();
                rest /= choices.len();
                pick
            } else {
                attempt
            };
            bound.insert((*name).clone(), choices[pick].clone());
        }
        match parse_definition(definition, &bound) {
            Ok(_) => return Ok(()),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// `params = { name = default }` or `params = { name = { default, description } }`.
fn parse_param_specs(value: &Json) -> std::result::Result<BTreeMap<String, ParamSpec>, ParseError> {
    let map = value
        .as_object()
        .ok_or_else(|| ParseError::invalid("params", "expected a table"))?;
    map.iter()
        .map(|(name, spec)| {
            let spec = match spec {
                Json::Object(fields) if fields.contains_key("default") || fields.contains_key("description") => {
                    ParamSpec {
                        default: fields.get("default").filter(|d| !d.is_null()).map(Value::from),
                        description: fields.get("description").and_then(Json::as_str).map(str::to_string),
                    }
                }
                Json::Null => ParamSpec::default(),
                other => ParamSpec {
                    default: Some(Value::from(other)),
                    description: None,
                },
            };
            Ok((name.clone(), spec))
        })
        .collect()
}
