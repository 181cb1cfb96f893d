use rustc_hash::FxHashMap;

use super::ModelRegistry;
use crate::config::ModelConfig;

/// Model registry built from the `models` config section; keeps config order.
pub struct StaticModelRegistry {
    ids: Vec<String>,
    supports_images: FxHashMap<String, bool>,
}

impl StaticModelRegistry {
    #[must_use]
    pub fn new(models: &[ModelConfig]) -> Self {
        let mut ids = Vec::with_capacity(models.len());
        let mut supports_images = FxHashMap::default();
        for model in models {
            if supports_images
                .insert(model.id.clone(), model.supports_images)
                .is_none()
            {
                ids.push(model.id.clone());
            }
        }
        Self {
            ids,
            supports_images,
        }
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn exists(&self, model: &str) -> bool {
        self.supports_images.contains_key(model)
    }

    fn supports_images(&self, model: &str) -> bool {
        self.supports_images.get(model).copied().unwrap_or(false)
    }

    fn list_model_ids(&self) -> Vec<String> {
        self.ids.clone()
    }
}
