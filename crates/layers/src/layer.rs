use foundation::GeoExtent;
use runtime::Generation;
use scene::{LayerKind, RenderSurface, TrackEntity, entities_extent};

use crate::symbology::{Emphasis, Symbology};

/// A committed overlay: the entities handed to the surface plus the emphasis
/// they are currently drawn with.
///
/// Entities keep their base (opaque) style; emphasis is applied on the way to
/// the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    kind: LayerKind,
    entities: Vec<TrackEntity>,
    emphasis: Emphasis,
    extent: Option<GeoExtent>,
    stamp: Generation,
}

impl OverlayLayer {
    pub fn new(kind: LayerKind, entities: Vec<TrackEntity>, stamp: Generation) -> Self {
        let extent = entities_extent(&entities);
        Self {
            kind,
            entities,
            emphasis: Emphasis::Opaque,
            extent,
            stamp,
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn entities(&self) -> &[TrackEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn emphasis(&self) -> Emphasis {
        self.emphasis
    }

    pub fn extent(&self) -> Option<GeoExtent> {
        self.extent
    }

    /// Generation (or reload stamp) the layer was built under.
    pub fn stamp(&self) -> Generation {
        self.stamp
    }

    /// Adds the layer to the surface with `emphasis` already applied.
    pub fn install<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        symbology: &Symbology,
        emphasis: Emphasis,
    ) {
        self.emphasis = emphasis;
        if emphasis == Emphasis::Opaque {
            surface.add_layer(self.kind, &self.entities);
            return;
        }
        let styled: Vec<TrackEntity> = self
            .entities
            .iter()
            .map(|e| TrackEntity {
                style: symbology.emphasized(e.style, emphasis),
                ..e.clone()
            })
            .collect();
        surface.add_layer(self.kind, &styled);
    }

    /// Pushes per-entity style updates when the emphasis actually changes.
    /// Returns whether anything was sent.
    pub fn set_emphasis<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        symbology: &Symbology,
        emphasis: Emphasis,
    ) -> bool {
        if self.emphasis == emphasis {
            return false;
        }
        self.emphasis = emphasis;
        for e in &self.entities {
            surface.set_entity_style(
                self.kind,
                e.id,
                symbology.emphasized(e.style, emphasis),
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::OverlayLayer;
    use crate::symbology::{Emphasis, Symbology};
    use foundation::GeoPoint;
    use runtime::Generation;
    use scene::{
        EntityId, LayerKind, RecordingSurface, SurfaceCommand, TrackEntity, TrackGeometry,
        TrackStyle,
    };

    fn entity(i: u32, lon: f64) -> TrackEntity {
        TrackEntity {
            id: EntityId(i),
            label: None,
            geometry: TrackGeometry::Points(vec![GeoPoint::new(lon, 20.0)]),
            intensity: 90.0,
            style: TrackStyle::new([1.0, 0.0, 0.0, 1.0], 2.0),
        }
    }

    #[test]
    fn extent_covers_all_entities() {
        let layer = OverlayLayer::new(
            LayerKind::Baseline,
            vec![entity(0, -70.0), entity(1, -60.0)],
            Generation(3),
        );
        let e = layer.extent().expect("extent");
        assert_eq!(e.min.lon_deg, -70.0);
        assert_eq!(e.max.lon_deg, -60.0);
        assert_eq!(layer.stamp(), Generation(3));
    }

    #[test]
    fn dimmed_install_sends_receded_styles() {
        let sym = Symbology::default();
        let mut surface = RecordingSurface::new();
        let mut layer = OverlayLayer::new(LayerKind::Baseline, vec![entity(0, 0.0)], Generation(0));
        layer.install(&mut surface, &sym, Emphasis::Dimmed);
        let drawn = surface.layer(LayerKind::Baseline).expect("installed");
        assert_eq!(drawn[0].style.color[3], sym.dim_alpha);
        // The layer keeps the base style.
        assert_eq!(layer.entities()[0].style.color[3], 1.0);
    }

    #[test]
    fn emphasis_change_is_sent_once() {
        let sym = Symbology::default();
        let mut surface = RecordingSurface::new();
        let mut layer = OverlayLayer::new(
            LayerKind::Baseline,
            vec![entity(0, 0.0), entity(1, 1.0)],
            Generation(0),
        );
        layer.install(&mut surface, &sym, Emphasis::Opaque);
        assert!(layer.set_emphasis(&mut surface, &sym, Emphasis::Dimmed));
        assert!(!layer.set_emphasis(&mut surface, &sym, Emphasis::Dimmed));
        let styles = surface
            .commands()
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::SetStyle { .. }))
            .count();
        assert_eq!(styles, 2);
        assert_eq!(layer.emphasis(), Emphasis::Dimmed);
    }

    #[test]
    fn emphasis_updates_address_entity_ids() {
        let sym = Symbology::default();
        let mut surface = RecordingSurface::new();
        let mut layer = OverlayLayer::new(
            LayerKind::Mitigation,
            vec![entity(7, 0.0), entity(42, 1.0)],
            Generation(1),
        );
        layer.install(&mut surface, &sym, Emphasis::Opaque);
        surface.drain_commands();
        layer.set_emphasis(&mut surface, &sym, Emphasis::Dimmed);
        let targeted: Vec<EntityId> = surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                SurfaceCommand::SetStyle { entity, .. } => Some(*entity),
                _ => None,
            })
            .collect();
        assert_eq!(targeted, vec![EntityId(7), EntityId(42)]);
        let drawn = surface.layer(LayerKind::Mitigation).expect("installed");
        assert!(drawn.iter().all(|e| e.style.color[3] == sym.dim_alpha));
    }
}
