//! Ordered set of configured overlay layers.

use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::LayerSpec;

use crate::layer::OverlayLayer;
use crate::registry::LayerRegistry;

/// One layer in the stack with its compositing attributes.
pub struct StackEntry {
    name: String,
    layer: Box<dyn OverlayLayer>,
    z_index: i32,
    enabled: bool,
    opacity: f32,
    seq: u64,
}

impl StackEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &'static str {
        self.layer.kind()
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Insertion sequence number; breaks `z_index` ties.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn layer(&self) -> &dyn OverlayLayer {
        self.layer.as_ref()
    }

    pub(crate) fn layer_mut(&mut self) -> &mut dyn OverlayLayer {
        self.layer.as_mut()
    }
}

impl std::fmt::Debug for StackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackEntry")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("z_index", &self.z_index)
            .field("enabled", &self.enabled)
            .field("opacity", &self.opacity)
            .finish()
    }
}

/// Layers kept in paint order: ascending `z_index`, ties by insertion.
#[derive(Debug, Default)]
pub struct LayerStack {
    entries: Vec<StackEntry>,
    next_seq: u64,
}

fn check_opacity(name: &str, opacity: f32) -> PitwallResult<()> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(PitwallError::invalid_layer(
            name,
            format!("opacity must be in [0, 1], got {opacity}"),
        ));
    }
    Ok(())
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every spec through `registry`, in order.
    pub fn from_specs(specs: &[LayerSpec], registry: &LayerRegistry) -> PitwallResult<Self> {
        let mut stack = Self::new();
        for (index, spec) in specs.iter().enumerate() {
            let name = spec
                .name
                .clone()
                .unwrap_or_else(|| format!("{}#{index}", spec.kind));
            let layer = registry
                .build(&spec.kind, &spec.params)
                .map_err(|e| match e {
                    PitwallError::InvalidLayerConfig { message, .. } => {
                        PitwallError::invalid_layer(name.clone(), message)
                    }
                    other => other,
                })?;
            stack.push(name, layer, spec.z_index, spec.enabled, spec.opacity)?;
        }
        tracing::debug!(layers = stack.len(), "Layer stack built");
        Ok(stack)
    }

    /// Insert a layer at its paint position.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        layer: Box<dyn OverlayLayer>,
        z_index: i32,
        enabled: bool,
        opacity: f32,
    ) -> PitwallResult<()> {
        let name = name.into();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(PitwallError::invalid_layer(name, "duplicate layer name"));
        }
        check_opacity(&name, opacity)?;

        let seq = self.next_seq;
        self.next_seq += 1;
        // Later insertions go after every entry with the same z_index.
        let at = self.entries.partition_point(|e| e.z_index <= z_index);
        self.entries.insert(
            at,
            StackEntry {
                name,
                layer,
                z_index,
                enabled,
                opacity,
                seq,
            },
        );
        Ok(())
    }

    fn entry_mut(&mut self, name: &str) -> PitwallResult<&mut StackEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| PitwallError::invalid_layer(name, "no such layer"))
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> PitwallResult<()> {
        self.entry_mut(name)?.enabled = enabled;
        Ok(())
    }

    pub fn set_opacity(&mut self, name: &str, opacity: f32) -> PitwallResult<()> {
        check_opacity(name, opacity)?;
        self.entry_mut(name)?.opacity = opacity;
        Ok(())
    }

    /// Every entry, enabled or not, in paint order.
    pub fn paint_order(&self) -> impl Iterator<Item = &StackEntry> {
        self.entries.iter()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [StackEntry] {
        &mut self.entries
    }

    /// Sorted, deduplicated union of every layer's channel bindings.
    pub fn bindings(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .entries
            .iter()
            .flat_map(|e| e.layer.channels())
            .collect();
        channels.sort();
        channels.dedup();
        channels
    }

    /// Like [`LayerStack::bindings`], restricted to enabled layers.
    pub fn enabled_bindings(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.enabled)
            .flat_map(|e| e.layer.channels())
            .collect();
        channels.sort();
        channels.dedup();
        channels
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn readout(channel: &str) -> serde_json::Value {
        json!({
            "placement": { "width": 40, "height": 20 },
            "lines": [{ "label": "V", "channel": channel }]
        })
    }

    fn names(stack: &LayerStack) -> Vec<&str> {
        stack.paint_order().map(|e| e.name()).collect()
    }

    #[test]
    fn test_paint_order_is_stable_by_z() {
        let specs = vec![
            LayerSpec::new("readout", readout("a")).named("top").with_z_index(5),
            LayerSpec::new("readout", readout("b")).named("first").with_z_index(1),
            LayerSpec::new("readout", readout("c")).named("second").with_z_index(1),
            LayerSpec::new("readout", readout("d")).named("base"),
        ];
        let stack = LayerStack::from_specs(&specs, &LayerRegistry::with_builtin()).unwrap();
        assert_eq!(names(&stack), vec!["base", "first", "second", "top"]);
        let seqs: Vec<u64> = stack.paint_order().map(|e| e.seq()).collect();
        assert_eq!(seqs, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_default_names_and_bindings() {
        let specs = vec![
            LayerSpec::new("readout", readout("speed")),
            LayerSpec::new("readout", readout("rpm")),
            LayerSpec::new("readout", readout("speed")),
        ];
        let stack = LayerStack::from_specs(&specs, &LayerRegistry::with_builtin()).unwrap();
        assert_eq!(names(&stack), vec!["readout#0", "readout#1", "readout#2"]);
        assert_eq!(stack.bindings(), vec!["rpm".to_string(), "speed".to_string()]);
    }

    #[test]
    fn test_enabled_bindings_skip_disabled_layers() {
        let specs = vec![
            LayerSpec::new("readout", readout("speed")).named("speed"),
            LayerSpec::new("readout", readout("rpm")).named("rpm"),
        ];
        let mut stack = LayerStack::from_specs(&specs, &LayerRegistry::with_builtin()).unwrap();
        stack.set_enabled("rpm", false).unwrap();
        assert_eq!(stack.enabled_bindings(), vec!["speed".to_string()]);
        assert_eq!(stack.bindings().len(), 2);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let specs = vec![
            LayerSpec::new("readout", readout("a")).named("hud"),
            LayerSpec::new("readout", readout("b")).named("hud"),
        ];
        let err = LayerStack::from_specs(&specs, &LayerRegistry::with_builtin()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_opacity_range() {
        let mut spec = LayerSpec::new("readout", readout("a")).named("hud");
        spec.opacity = 1.5;
        assert!(LayerStack::from_specs(&[spec], &LayerRegistry::with_builtin()).is_err());

        let ok = LayerSpec::new("readout", readout("a")).named("hud");
        let mut stack = LayerStack::from_specs(&[ok], &LayerRegistry::with_builtin()).unwrap();
        assert!(stack.set_opacity("hud", -0.1).is_err());
        assert!(stack.set_opacity("hud", f32::NAN).is_err());
        stack.set_opacity("hud", 0.25).unwrap();
        stack.set_enabled("hud", false).unwrap();
        assert_eq!(stack.enabled_count(), 0);
        assert!(stack.set_enabled("missing", true).is_err());
    }

    #[test]
    fn test_errors_name_the_layer() {
        let specs = vec![LayerSpec::new("readout", json!({ "lines": [] })).named("broken")];
        match LayerStack::from_specs(&specs, &LayerRegistry::with_builtin()).unwrap_err() {
            PitwallError::InvalidLayerConfig { layer, .. } => assert_eq!(layer, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
