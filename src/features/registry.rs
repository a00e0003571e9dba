use super::{FeatureDescriptor, builtin};
use crate::config::CustomCommand;
use crate::config::custom_commands::CUSTOM_COMMAND_PREFIX;
use std::collections::HashMap;

/// Lookup table of every invocable feature, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct FeatureRegistry {
    features: HashMap<String, FeatureDescriptor>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, feature: FeatureDescriptor) {
        if self.features.contains_key(&feature.id) {
            tracing::warn!(feature = %feature.id, "replacing registered feature");
        }
        self.features.insert(feature.id.clone(), feature);
    }

    pub fn get(&self, id: &str) -> Option<&FeatureDescriptor> {
        self.features.get(id)
    }

    /// Replace all custom-command entries with `commands`.
    pub fn register_custom_commands(&mut self, commands: &[CustomCommand]) {
        self.features
            .retain(|id, _| !id.starts_with(CUSTOM_COMMAND_PREFIX));
        for command in commands {
            self.register(FeatureDescriptor::from_custom_command(command));
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.features.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn descriptors(&self) -> Vec<&FeatureDescriptor> {
        let mut all: Vec<&FeatureDescriptor> = self.features.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Registry with the built-in features and the given custom commands.
pub fn create_feature_registry(commands: &[CustomCommand]) -> FeatureRegistry {
    let mut registry = FeatureRegistry::new();
    for feature in builtin::builtin_features() {
        registry.register(feature);
    }
    registry.register_custom_commands(commands);
    registry
}
