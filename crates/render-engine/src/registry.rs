//! Type-tag to layer factory registry.

use std::collections::BTreeMap;

use pitwall_common::error::{PitwallError, PitwallResult};

use crate::layer::OverlayLayer;
use crate::layers::{Chart, GForceMeter, LapTimer, Speedometer, TextReadout, TrackMap};

/// Builds a configured layer from its `params` object.
pub type LayerFactory =
    Box<dyn Fn(&serde_json::Value) -> PitwallResult<Box<dyn OverlayLayer>> + Send + Sync>;

/// Maps layer type tags to factories.
///
/// Custom widgets are added with [`LayerRegistry::register`]; the stack and
/// compositor only ever see `Box<dyn OverlayLayer>`.
pub struct LayerRegistry {
    factories: BTreeMap<String, LayerFactory>,
}

impl LayerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every built-in layer.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("speedometer", |p| boxed(Speedometer::configure(p)));
        registry.register("g_force", |p| boxed(GForceMeter::configure(p)));
        registry.register("track_map", |p| boxed(TrackMap::configure(p)));
        registry.register("lap_timer", |p| boxed(LapTimer::configure(p)));
        registry.register("chart", |p| boxed(Chart::configure(p)));
        registry.register("readout", |p| boxed(TextReadout::configure(p)));
        registry
    }

    /// Add or replace the factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> PitwallResult<Box<dyn OverlayLayer>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(&self, kind: &str, params: &serde_json::Value) -> PitwallResult<Box<dyn OverlayLayer>> {
        let factory = self.factories.get(kind).ok_or_else(|| {
            PitwallError::invalid_layer(kind, format!("unknown layer type '{kind}'"))
        })?;
        factory(params)
    }
}

fn boxed<L: OverlayLayer + 'static>(layer: PitwallResult<L>) -> PitwallResult<Box<dyn OverlayLayer>> {
    Ok(Box::new(layer?))
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_kinds() {
        let registry = LayerRegistry::with_builtin();
        let kinds: Vec<&str> = registry.kinds().collect();
        assert_eq!(
            kinds,
            vec!["chart", "g_force", "lap_timer", "readout", "speedometer", "track_map"]
        );
    }

    #[test]
    fn test_unknown_kind_is_configuration_error() {
        let err = LayerRegistry::with_builtin()
            .build("tachometer", &json!({}))
            .err()
            .expect("expected an error for unknown kind");
        assert!(matches!(err, PitwallError::InvalidLayerConfig { .. }));
    }

    #[test]
    fn test_build_speedometer() {
        let layer = LayerRegistry::with_builtin()
            .build(
                "speedometer",
                &json!({ "channel": "speed", "max": 100.0, "placement": { "width": 50, "height": 50 } }),
            )
            .unwrap();
        assert_eq!(layer.kind(), "speedometer");
        assert_eq!(layer.channels(), vec!["speed".to_string()]);
    }
}
