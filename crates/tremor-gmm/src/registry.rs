//! Model registry.
//!
//! Maps model names (and aliases) to factories taking JSON parameters.
//! A registry is an explicit value constructed once per calculation and
//! passed where needed; there is no global.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;
use tremor_core::{HazardError, Result};

use crate::model::GroundMotionModel;
use crate::models::backbone::CrustalBackbone;
use crate::models::fixed::{FixedDistribution, FixedDistributionSpec};
use crate::models::table::{TableGmm, TableGmmSpec};

type Factory = fn(&Value) -> Result<Box<dyn GroundMotionModel>>;

/// A name → factory map with alias resolution.
pub struct GmmRegistry {
    factories: BTreeMap<String, Factory>,
    aliases: BTreeMap<String, String>,
}

impl std::fmt::Debug for GmmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmmRegistry")
            .field("models", &self.factories.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl GmmRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// A registry pre-populated with the built-in models.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(CrustalBackbone::NAME, |_| {
            Ok(Box::new(CrustalBackbone::new()?))
        });
        reg.register("TableGmm", |params| {
            let spec: TableGmmSpec = serde_json::from_value(params.clone())?;
            Ok(Box::new(TableGmm::new(spec)?))
        });
        reg.register("FixedDistribution", |params| {
            let spec: FixedDistributionSpec = serde_json::from_value(params.clone())?;
            Ok(Box::new(FixedDistribution::new(spec)?))
        });
        reg
    }

    /// Register a factory under a name. Re-registering replaces.
    pub fn register(&mut self, name: impl Into<String>, factory: Factory) {
        let _ = self.factories.insert(name.into(), factory);
    }

    /// Register an alias for an existing model name.
    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) -> Result<()> {
        let target = target.into();
        if !self.factories.contains_key(&target) {
            return Err(HazardError::Config(format!(
                "alias target `{target}` is not a registered model"
            )));
        }
        let _ = self.aliases.insert(alias.into(), target);
        Ok(())
    }

    /// Instantiate a model by name (or alias) with JSON parameters.
    ///
    /// Instantiating a deprecated or non-verified model succeeds but logs
    /// a warning.
    pub fn create(&self, name: &str, params: &Value) -> Result<Box<dyn GroundMotionModel>> {
        let resolved = self.aliases.get(name).map_or(name, String::as_str);
        let factory = self.factories.get(resolved).ok_or_else(|| {
            HazardError::Config(format!("unknown ground-motion model `{name}`"))
        })?;
        let model = factory(params)?;
        let caps = model.caps();
        if caps.deprecated {
            warn!(model = model.name(), "instantiated a deprecated ground-motion model");
        }
        if caps.non_verified {
            warn!(model = model.name(), "instantiated a non-verified ground-motion model");
        }
        Ok(model)
    }

    /// Registered model names (aliases not included).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for GmmRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
