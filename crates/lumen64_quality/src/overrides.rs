//! Per-scene forced quality baselines.

use std::collections::HashMap;

use lumen64_core::{QualityLevels, SceneId, SceneOverrideConfig};

/// Lookup table from scene to forced levels.
#[derive(Debug, Clone, Default)]
pub struct SceneOverrides {
    table: HashMap<SceneId, QualityLevels>,
}

impl SceneOverrides {
    /// Builds the table. Later entries for the same scene win.
    #[must_use]
    pub fn from_config(entries: &[SceneOverrideConfig]) -> Self {
        let table = entries
            .iter()
            .map(|entry| (SceneId::new(entry.scene.clone()), entry.levels()))
            .collect();
        Self { table }
    }

    /// Adds or replaces one override.
    pub fn insert(&mut self, scene: SceneId, levels: QualityLevels) {
        self.table.insert(scene, levels.clamped());
    }

    /// Forced levels for the scene, if any.
    #[must_use]
    pub fn resolve(&self, scene: Option<&SceneId>) -> Option<QualityLevels> {
        scene.and_then(|id| self.table.get(id).copied())
    }

    /// Number of scenes with an override.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when no scene is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen64_core::ShadowQuality;

    #[test]
    fn test_resolve() {
        let overrides = SceneOverrides::from_config(&[SceneOverrideConfig {
            scene: "cutscene".into(),
            particles: Some(1),
            shadows: Some(ShadowQuality::Baked),
            fog: None,
            detail: None,
        }]);
        let forced = overrides.resolve(Some(&SceneId::new("cutscene"))).expect("present");
        assert_eq!(forced.particles, 1);
        assert_eq!(forced.detail, QualityLevels::BEST.detail);
        assert!(overrides.resolve(Some(&SceneId::new("field"))).is_none());
        assert!(overrides.resolve(None).is_none());
    }
}
