//! Boundary to whatever draws the globe/map.
//!
//! The overlay code depends only on the four primitives of [`RenderSurface`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::camera::CameraTarget;
use crate::components::{TrackEntity, TrackStyle};
use crate::entity::EntityId;

/// The two overlay slots of the scene.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    Baseline,
    Mitigation,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Baseline => "baseline",
            LayerKind::Mitigation => "mitigation",
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait RenderSurface {
    /// Adds a named layer. Adding a layer that already exists replaces it.
    fn add_layer(&mut self, layer: LayerKind, entities: &[TrackEntity]);

    fn remove_layer(&mut self, layer: LayerKind);

    fn set_entity_style(&mut self, layer: LayerKind, entity: EntityId, style: TrackStyle);

    /// Starts a camera transition. Returns immediately; the transition is
    /// never awaited.
    fn fly_to(&mut self, target: CameraTarget);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    AddLayer { layer: LayerKind, entities: usize },
    RemoveLayer { layer: LayerKind },
    SetStyle { layer: LayerKind, entity: EntityId, style: TrackStyle },
    FlyTo(CameraTarget),
}

/// Surface that keeps the resulting scene in memory and logs every command.
///
/// Used headless (CLI) and as the observable surface in tests.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    layers: BTreeMap<LayerKind, Vec<TrackEntity>>,
    commands: Vec<SurfaceCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, layer: LayerKind) -> Option<&[TrackEntity]> {
        self.layers.get(&layer).map(Vec::as_slice)
    }

    pub fn commands(&self) -> &[SurfaceCommand] {
        &self.commands
    }

    pub fn drain_commands(&mut self) -> Vec<SurfaceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn fly_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::FlyTo(_)))
            .count()
    }
}

impl RenderSurface for RecordingSurface {
    fn add_layer(&mut self, layer: LayerKind, entities: &[TrackEntity]) {
        debug!(%layer, entities = entities.len(), "surface: add layer");
        self.layers.insert(layer, entities.to_vec());
        self.commands.push(SurfaceCommand::AddLayer {
            layer,
            entities: entities.len(),
        });
    }

    fn remove_layer(&mut self, layer: LayerKind) {
        debug!(%layer, "surface: remove layer");
        self.layers.remove(&layer);
        self.commands.push(SurfaceCommand::RemoveLayer { layer });
    }

    fn set_entity_style(&mut self, layer: LayerKind, entity: EntityId, style: TrackStyle) {
        if let Some(e) = self
            .layers
            .get_mut(&layer)
            .and_then(|entities| entities.iter_mut().find(|e| e.id == entity))
        {
            e.style = style;
        }
        self.commands.push(SurfaceCommand::SetStyle {
            layer,
            entity,
            style,
        });
    }

    fn fly_to(&mut self, target: CameraTarget) {
        debug!(
            lon = target.center.lon_deg,
            lat = target.center.lat_deg,
            altitude_m = target.altitude_m,
            "surface: fly to"
        );
        self.commands.push(SurfaceCommand::FlyTo(target));
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerKind, RecordingSurface, RenderSurface, SurfaceCommand};
    use crate::components::{TrackEntity, TrackGeometry, TrackStyle};
    use crate::entity::EntityId;

    #[test]
    fn style_updates_apply_to_stored_entities() {
        let mut s = RecordingSurface::new();
        let e = TrackEntity {
            id: EntityId(0),
            label: Some("IVAN".to_string()),
            geometry: TrackGeometry::Points(vec![]),
            intensity: 120.0,
            style: TrackStyle::default(),
        };
        s.add_layer(LayerKind::Baseline, &[e]);
        let dim = TrackStyle::new([1.0, 1.0, 1.0, 0.3], 1.0);
        s.set_entity_style(LayerKind::Baseline, EntityId(0), dim);
        assert_eq!(s.layer(LayerKind::Baseline).expect("layer")[0].style, dim);

        s.remove_layer(LayerKind::Baseline);
        assert!(s.layer(LayerKind::Baseline).is_none());
        assert_eq!(s.commands().len(), 3);
        assert!(matches!(
            s.drain_commands()[2],
            SurfaceCommand::RemoveLayer {
                layer: LayerKind::Baseline
            }
        ));
    }
}
