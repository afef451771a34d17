//! Overlay synchronizer: projects results and the baseline document onto the
//! two scene layers.
//!
//! Builds run concurrently with stream reading. Each build carries the stamp it
//! was started under and is checked against the current stamp only when it
//! completes; a build from a superseded run is dropped without touching the
//! surface. Builds are never aborted.

use std::sync::Arc;

use formats::TrackCollection;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use runtime::Generation;
use scene::{CameraPolicy, CameraTarget, LayerKind, RenderSurface, TrackEntity};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ingest::{GeometrySource, build_entities};
use crate::layer::OverlayLayer;
use crate::loader::{GeometryLoader, LoadError};
use crate::symbology::{Emphasis, Symbology};

/// A finished (not yet committed) overlay build.
#[derive(Debug)]
pub struct OverlayBuild {
    pub layer: LayerKind,
    pub stamp: Generation,
    pub result: Result<Vec<TrackEntity>, LoadError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed {
        layer: LayerKind,
        entities: usize,
        /// `None` when the layer has no extent to frame.
        camera: Option<CameraTarget>,
    },
    /// Superseded before it finished; nothing was touched.
    Stale {
        layer: LayerKind,
        stamp: Generation,
        current: Generation,
    },
    /// The build failed under the current stamp; the layer is now absent.
    Failed { layer: LayerKind, error: LoadError },
}

impl CommitOutcome {
    pub fn layer(&self) -> LayerKind {
        match self {
            CommitOutcome::Committed { layer, .. }
            | CommitOutcome::Stale { layer, .. }
            | CommitOutcome::Failed { layer, .. } => *layer,
        }
    }
}

fn entities_from(doc: &Value, symbology: &Symbology) -> Result<Vec<TrackEntity>, LoadError> {
    let collection = TrackCollection::from_geojson_value(doc)
        .map_err(|e| LoadError::Document(e.to_string()))?;
    if collection.skipped > 0 {
        debug!(skipped = collection.skipped, "ignored non-track features");
    }
    Ok(build_entities(&collection, symbology))
}

pub struct OverlaySynchronizer<S> {
    surface: S,
    loader: Arc<dyn GeometryLoader>,
    symbology: Arc<Symbology>,
    camera: CameraPolicy,
    baseline: Option<OverlayLayer>,
    mitigation: Option<OverlayLayer>,
    // Bumped by every baseline (re)load; independent of the run generation.
    baseline_stamp: Generation,
    pending: FuturesUnordered<BoxFuture<'static, OverlayBuild>>,
}

impl<S: RenderSurface> OverlaySynchronizer<S> {
    pub fn new(
        surface: S,
        loader: Arc<dyn GeometryLoader>,
        symbology: Symbology,
        camera: CameraPolicy,
    ) -> Self {
        Self {
            surface,
            loader,
            symbology: Arc::new(symbology),
            camera,
            baseline: None,
            mitigation: None,
            baseline_stamp: Generation::INITIAL,
            pending: FuturesUnordered::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn symbology(&self) -> &Symbology {
        &self.symbology
    }

    pub fn baseline(&self) -> Option<&OverlayLayer> {
        self.baseline.as_ref()
    }

    pub fn mitigation(&self) -> Option<&OverlayLayer> {
        self.mitigation.as_ref()
    }

    pub fn baseline_emphasis(&self) -> Emphasis {
        self.baseline
            .as_ref()
            .map(OverlayLayer::emphasis)
            .unwrap_or_default()
    }

    pub fn pending_builds(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Starts building the mitigation layer for a terminal result captured
    /// under `generation`.
    pub fn begin_mitigation(&mut self, generation: Generation, payload: &Value) {
        let source = GeometrySource::for_result(payload);
        info!(%generation, source = source_kind(&source), "mitigation build started");
        self.spawn_build(LayerKind::Mitigation, generation, source);
    }

    /// Starts (re)loading the baseline document. Any baseline load still in
    /// flight becomes stale.
    pub fn load_baseline(&mut self, location: &str) -> Generation {
        let stamp = self.baseline_stamp.advance();
        info!(%stamp, %location, "baseline load started");
        self.spawn_build(
            LayerKind::Baseline,
            stamp,
            GeometrySource::Location(location.to_string()),
        );
        stamp
    }

    fn spawn_build(&mut self, layer: LayerKind, stamp: Generation, source: GeometrySource) {
        let loader = Arc::clone(&self.loader);
        let symbology = Arc::clone(&self.symbology);
        let build = async move {
            let result = match source {
                GeometrySource::Empty => Ok(Vec::new()),
                GeometrySource::Inline(doc) => entities_from(&doc, &symbology),
                GeometrySource::Location(location) => match loader.load(&location).await {
                    Ok(doc) => entities_from(&doc, &symbology),
                    Err(e) => Err(e),
                },
            };
            OverlayBuild {
                layer,
                stamp,
                result,
            }
        };
        self.pending.push(build.boxed());
    }

    /// Next finished build, in completion order. `None` when nothing is in
    /// flight.
    pub async fn next_completed(&mut self) -> Option<OverlayBuild> {
        self.pending.next().await
    }

    /// Applies a finished build if its stamp is still current.
    ///
    /// Mitigation builds are checked against the run generation `current`;
    /// baseline builds against the latest baseline reload.
    pub fn commit(&mut self, build: OverlayBuild, current: Generation) -> CommitOutcome {
        match build.layer {
            LayerKind::Mitigation => self.commit_mitigation(build, current),
            LayerKind::Baseline => self.commit_baseline(build),
        }
    }

    fn commit_mitigation(&mut self, build: OverlayBuild, current: Generation) -> CommitOutcome {
        if !build.stamp.is_current(current) {
            debug!(stamp = %build.stamp, %current, "discarding stale mitigation build");
            return CommitOutcome::Stale {
                layer: LayerKind::Mitigation,
                stamp: build.stamp,
                current,
            };
        }
        let entities = match build.result {
            Ok(entities) => entities,
            Err(error) => {
                warn!(%error, generation = %current, "mitigation build failed");
                self.clear_mitigation();
                return CommitOutcome::Failed {
                    layer: LayerKind::Mitigation,
                    error,
                };
            }
        };

        // Whole-layer replace: the old layer is gone before the new one lands.
        if self.mitigation.take().is_some() {
            self.surface.remove_layer(LayerKind::Mitigation);
        }
        let mut layer = OverlayLayer::new(LayerKind::Mitigation, entities, build.stamp);
        layer.install(&mut self.surface, &self.symbology, Emphasis::Opaque);
        self.set_baseline_emphasis(Emphasis::Dimmed);

        let camera = layer
            .extent()
            .map(|extent| CameraTarget::framing(&extent, &self.camera));
        if let Some(target) = camera {
            self.surface.fly_to(target);
        }
        let count = layer.len();
        info!(generation = %current, entities = count, "mitigation layer committed");
        self.mitigation = Some(layer);
        CommitOutcome::Committed {
            layer: LayerKind::Mitigation,
            entities: count,
            camera,
        }
    }

    fn commit_baseline(&mut self, build: OverlayBuild) -> CommitOutcome {
        let current = self.baseline_stamp;
        if !build.stamp.is_current(current) {
            debug!(stamp = %build.stamp, %current, "discarding stale baseline load");
            return CommitOutcome::Stale {
                layer: LayerKind::Baseline,
                stamp: build.stamp,
                current,
            };
        }
        let entities = match build.result {
            Ok(entities) => entities,
            Err(error) => {
                // A failed reload keeps whatever baseline is already shown.
                warn!(%error, kept = self.baseline.is_some(), "baseline unavailable");
                return CommitOutcome::Failed {
                    layer: LayerKind::Baseline,
                    error,
                };
            }
        };
        if self.baseline.take().is_some() {
            self.surface.remove_layer(LayerKind::Baseline);
        }

        let emphasis = if self.mitigation.is_some() {
            Emphasis::Dimmed
        } else {
            Emphasis::Opaque
        };
        let mut layer = OverlayLayer::new(LayerKind::Baseline, entities, build.stamp);
        layer.install(&mut self.surface, &self.symbology, emphasis);

        // Frame the baseline only while nothing newer is on screen.
        let camera = match (self.mitigation.is_none(), layer.extent()) {
            (true, Some(extent)) => Some(CameraTarget::framing(&extent, &self.camera)),
            _ => None,
        };
        if let Some(target) = camera {
            self.surface.fly_to(target);
        }
        let count = layer.len();
        info!(stamp = %build.stamp, entities = count, emphasis = emphasis.as_str(), "baseline committed");
        self.baseline = Some(layer);
        CommitOutcome::Committed {
            layer: LayerKind::Baseline,
            entities: count,
            camera,
        }
    }

    /// Removes the mitigation layer and restores the baseline to opaque.
    pub fn clear_mitigation(&mut self) {
        if self.mitigation.take().is_some() {
            self.surface.remove_layer(LayerKind::Mitigation);
            debug!("mitigation layer removed");
        }
        self.set_baseline_emphasis(Emphasis::Opaque);
    }

    fn set_baseline_emphasis(&mut self, emphasis: Emphasis) {
        if let Some(baseline) = self.baseline.as_mut() {
            baseline.set_emphasis(&mut self.surface, &self.symbology, emphasis);
        }
    }
}

fn source_kind(source: &GeometrySource) -> &'static str {
    match source {
        GeometrySource::Inline(_) => "inline",
        GeometrySource::Location(_) => "location",
        GeometrySource::Empty => "empty",
    }
}
