//! Model configuration table and active-model selection.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identifier of the default model.
pub const DEFAULT_MODEL: &str = "STAND";

/// Per-model normalization and output scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model asset reference (opaque to the pipeline)
    pub asset: String,
    /// Divisor applied after per-window mean removal
    pub v10_sig: f32,
    /// Physical value mapped from a model output of -1
    pub gf_min: f32,
    /// Physical value mapped from a model output of +1
    pub gf_max: f32,
}

impl ModelConfig {
    /// Create a validated configuration.
    pub fn new(asset: impl Into<String>, v10_sig: f32, gf_min: f32, gf_max: f32) -> Result<Self> {
        let config = Self {
            asset: asset.into(),
            v10_sig,
            gf_min,
            gf_max,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check `v10_sig > 0` and `gf_max > gf_min`.
    pub fn validate(&self) -> Result<()> {
        if !(self.v10_sig.is_finite() && self.v10_sig > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "v10_sig must be a positive number, got {}",
                self.v10_sig
            )));
        }
        if !(self.gf_min.is_finite() && self.gf_max.is_finite() && self.gf_max > self.gf_min) {
            return Err(PipelineError::InvalidParameter(format!(
                "output range must satisfy gf_min < gf_max, got [{}, {}]",
                self.gf_min, self.gf_max
            )));
        }
        Ok(())
    }

    /// Width of the physical output range.
    pub fn span(&self) -> f32 {
        self.gf_max - self.gf_min
    }

    /// Physical value a model output of 0 maps to.
    pub fn midpoint(&self) -> f32 {
        (self.gf_min + self.gf_max) / 2.0
    }
}

/// Immutable mapping from model identifier to configuration.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<ModelConfig>>,
}

impl ModelRegistry {
    /// Registry holding the three reference models.
    pub fn builtin() -> Self {
        let entries = [
            ("STAND", "STAND.onnx", 0.203_235, -10.3082, 10.8904),
            ("DB", "DB.onnx", 0.118_293, -10.5323, 12.2708),
            ("SLEEP", "SLEEP.onnx", 0.082_249, -4.557_99, 3.616_11),
        ];

        let models = entries
            .into_iter()
            .map(|(id, asset, v10_sig, gf_min, gf_max)| {
                let config = ModelConfig {
                    asset: asset.to_string(),
                    v10_sig,
                    gf_min,
                    gf_max,
                };
                (id.to_string(), Arc::new(config))
            })
            .collect();

        Self { models }
    }

    /// Built-in models plus validated extra entries. Extras override built-ins.
    pub fn with_extra<I>(extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ModelConfig)>,
    {
        let mut registry = Self::builtin();
        for (id, config) in extra {
            config.validate()?;
            registry.models.insert(id, Arc::new(config));
        }
        Ok(registry)
    }

    /// Look up a model, failing with `UnknownModel` if absent.
    pub fn get(&self, id: &str) -> Result<Arc<ModelConfig>> {
        self.models
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownModel {
                model: id.to_string(),
            })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    /// Identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelConfig)> {
        self.models.iter().map(|(id, c)| (id.as_str(), c.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The model a session is currently bound to.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    registry: Arc<ModelRegistry>,
    active: Option<(String, Arc<ModelConfig>)>,
}

impl ModelSelector {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            active: None,
        }
    }

    /// Bind to `id`. Returns `true` if the selection changed.
    ///
    /// An unknown identifier leaves the current selection untouched.
    pub fn select(&mut self, id: &str) -> Result<bool> {
        if matches!(&self.active, Some((current, _)) if current == id) {
            tracing::info!(model = id, "model already selected");
            return Ok(false);
        }

        let config = self.registry.get(id)?;
        tracing::info!(
            model = id,
            asset = %config.asset,
            v10_sig = config.v10_sig,
            gf_min = config.gf_min,
            gf_max = config.gf_max,
            "model selected"
        );
        self.active = Some((id.to_string(), config));
        Ok(true)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn active(&self) -> Option<Arc<ModelConfig>> {
        self.active.as_ref().map(|(_, c)| Arc::clone(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_reference_values() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.len(), 3);

        let stand = registry.get("STAND").unwrap();
        assert_eq!(stand.v10_sig, 0.203235);
        assert_eq!(stand.gf_min, -10.3082);
        assert_eq!(stand.gf_max, 10.8904);

        let db = registry.get("DB").unwrap();
        assert_eq!(db.v10_sig, 0.118293);
        assert_eq!(db.gf_min, -10.5323);
        assert_eq!(db.gf_max, 12.2708);

        let sleep = registry.get("SLEEP").unwrap();
        assert_eq!(sleep.v10_sig, 0.082249);
        assert_eq!(sleep.gf_min, -4.55799);
        assert_eq!(sleep.gf_max, 3.61611);
    }

    #[test]
    fn test_builtin_entries_are_valid() {
        for (id, config) in ModelRegistry::builtin().iter() {
            assert!(config.validate().is_ok(), "{id} failed validation");
        }
    }

    #[test]
    fn test_unknown_model() {
        let err = ModelRegistry::builtin().get("WALK").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownModel { ref model } if model == "WALK"));
    }

    #[test]
    fn test_model_config_validation() {
        assert!(ModelConfig::new("x", 0.0, -1.0, 1.0).is_err());
        assert!(ModelConfig::new("x", -0.5, -1.0, 1.0).is_err());
        assert!(ModelConfig::new("x", 0.5, 1.0, 1.0).is_err());
        assert!(ModelConfig::new("x", 0.5, -1.0, 1.0).is_ok());
    }

    #[test]
    fn test_extra_models_override() {
        let custom = ModelConfig::new("stand_v2.onnx", 0.3, -5.0, 5.0).unwrap();
        let registry =
            ModelRegistry::with_extra(vec![("STAND".to_string(), custom.clone())]).unwrap();
        assert_eq!(*registry.get("STAND").unwrap(), custom);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_selector_replaces_only_on_change() {
        let mut selector = ModelSelector::new(Arc::new(ModelRegistry::builtin()));
        assert!(selector.active().is_none());

        assert!(selector.select("STAND").unwrap());
        assert!(!selector.select("STAND").unwrap());
        assert!(selector.select("DB").unwrap());
        assert_eq!(selector.active_id(), Some("DB"));
    }

    #[test]
    fn test_selector_unknown_keeps_previous() {
        let mut selector = ModelSelector::new(Arc::new(ModelRegistry::builtin()));
        selector.select("SLEEP").unwrap();
        assert!(selector.select("NOPE").is_err());
        assert_eq!(selector.active_id(), Some("SLEEP"));
        assert_eq!(selector.active().unwrap().asset, "SLEEP.onnx");
    }
}
