//! Session controller: owns one run at a time and drives it cooperatively.
//!
//! All mutation happens on the task that calls [`SessionController::step`].
//! Stream reading and overlay builds are multiplexed there with `select!`, so
//! a slow overlay build never blocks frames of the next run and vice versa.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use layers::{CommitOutcome, DocumentLoader, GeometryLoader, OverlayBuild, OverlaySynchronizer};
use runtime::metrics::names;
use runtime::{Generation, Metrics};
use scene::RenderSurface;
use streaming::{
    ByteStream, EventFrame, FrameStream, HttpTransport, SimulationRequest, Transport,
    TransportError, frames,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::snapshot::{SessionId, SessionSnapshot};
use crate::state::{RunStatus, SimulationState, Transition};

pub const STREAM_CLOSED_EARLY: &str = "stream closed before a result was received";

enum Inflow {
    Idle,
    Connecting(BoxFuture<'static, Result<ByteStream, TransportError>>),
    Streaming(FrameStream<ByteStream>),
}

enum Input {
    Opened(Result<ByteStream, TransportError>),
    Frame(Option<Result<EventFrame, TransportError>>),
    Built(OverlayBuild),
}

/// What a single [`SessionController::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    Opened,
    Frame(Transition),
    TransportFailed(TransportError),
    /// The body ended. The run failed if no terminal frame had arrived.
    StreamEnded,
    Overlay(CommitOutcome),
}

async fn next_input(inflow: &mut Inflow) -> Input {
    match inflow {
        Inflow::Idle => std::future::pending().await,
        Inflow::Connecting(open) => Input::Opened(open.await),
        Inflow::Streaming(frames) => Input::Frame(frames.next().await),
    }
}

pub struct SessionController<S> {
    transport: Arc<dyn Transport>,
    overlays: OverlaySynchronizer<S>,
    state: SimulationState,
    generation: Generation,
    session_id: Option<SessionId>,
    inflow: Inflow,
    baseline_location: Option<String>,
    metrics: Metrics,
    publisher: watch::Sender<SessionSnapshot>,
}

impl<S: RenderSurface> SessionController<S> {
    pub fn new(transport: Arc<dyn Transport>, overlays: OverlaySynchronizer<S>) -> Self {
        let (publisher, _) = watch::channel(SessionSnapshot::default());
        Self {
            transport,
            overlays,
            state: SimulationState::new(),
            generation: Generation::INITIAL,
            session_id: None,
            inflow: Inflow::Idle,
            baseline_location: None,
            metrics: Metrics::new(),
            publisher,
        }
    }

    /// HTTP transport and document loader from `config`. The configured
    /// baseline, if any, starts loading immediately.
    pub fn from_config(config: &SessionConfig, surface: S) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.endpoint.clone()));
        let loader: Arc<dyn GeometryLoader> = Arc::new(DocumentLoader::new());
        let overlays = OverlaySynchronizer::new(
            surface,
            loader,
            config.symbology.clone(),
            config.camera.policy(),
        );
        let mut controller = Self::new(transport, overlays);
        if let Some(location) = &config.baseline {
            controller.load_baseline(location);
        }
        controller
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn status(&self) -> RunStatus {
        self.state.status()
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn overlays(&self) -> &OverlaySynchronizer<S> {
        &self.overlays
    }

    pub fn surface(&self) -> &S {
        self.overlays.surface()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Stream, connection attempt or overlay build still outstanding.
    pub fn is_busy(&self) -> bool {
        !matches!(self.inflow, Inflow::Idle) || self.overlays.has_pending()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            generation: self.generation,
            status: self.state.status(),
            percent: self.state.percent(),
            message: self.state.message().to_string(),
            analysis: self.state.analysis().cloned(),
            result: self.state.result().cloned(),
            error: self.state.error().map(str::to_string),
            malformed_frames: self.state.malformed(),
            baseline_entities: self.overlays.baseline().map(|l| l.len()),
            mitigation_entities: self.overlays.mitigation().map(|l| l.len()),
            baseline_emphasis: self.overlays.baseline_emphasis(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.publisher.subscribe()
    }

    fn publish(&mut self) {
        self.metrics
            .set_gauge(names::GENERATION, self.generation.0 as i64);
        self.publisher.send_replace(self.snapshot());
    }

    /// Starts a run, cancelling the active one first.
    pub fn run(&mut self, request: SimulationRequest) -> SessionId {
        if self.state.status().is_active() {
            self.cancel();
        }
        let started = self.state.start();
        debug_assert!(started.is_ok(), "{started:?}");

        let generation = self.generation.advance();
        let id = SessionId::new();
        self.session_id = Some(id);
        self.inflow = Inflow::Connecting(self.transport.open(&request));
        self.metrics.incr(names::RUNS_STARTED);
        info!(session = %id, %generation, investment = request.investment, "run started");
        self.publish();
        id
    }

    /// Cancels the active run. Returns `false` when nothing was running.
    ///
    /// The stream is dropped, which aborts the read; overlay builds keep
    /// running and are discarded when they complete.
    pub fn cancel(&mut self) -> bool {
        if self.state.cancel().is_err() {
            return false;
        }
        let generation = self.generation.advance();
        self.close_stream();
        self.metrics.incr(names::RUNS_CANCELLED);
        info!(%generation, "run cancelled");
        self.publish();
        true
    }

    /// Back to `Idle`: drops any stream, forgets the last result and removes
    /// the mitigation layer. The baseline stays.
    pub fn reset(&mut self) {
        self.close_stream();
        let generation = self.generation.advance();
        self.state.reset();
        self.session_id = None;
        self.overlays.clear_mitigation();
        info!(%generation, "session reset");
        self.publish();
    }

    /// Loads (or switches to) a baseline document.
    pub fn load_baseline(&mut self, location: &str) -> Generation {
        self.baseline_location = Some(location.to_string());
        let stamp = self.overlays.load_baseline(location);
        self.publish();
        stamp
    }

    /// Re-fetches the current baseline document, superseding any load still
    /// in flight. `None` when no baseline was ever configured.
    pub fn reload_baseline(&mut self) -> Option<Generation> {
        let location = self.baseline_location.clone()?;
        Some(self.load_baseline(&location))
    }

    fn close_stream(&mut self) {
        match std::mem::replace(&mut self.inflow, Inflow::Idle) {
            Inflow::Streaming(frames) => {
                let stats = frames.stats();
                self.metrics.add(names::CHUNKS_RECEIVED, stats.chunks);
                self.metrics.record(names::STREAM_BYTES, stats.bytes);
                debug!(
                    chunks = stats.chunks,
                    bytes = stats.bytes,
                    frames = stats.frames,
                    "stream closed"
                );
            }
            Inflow::Connecting(_) => debug!("connection attempt dropped"),
            Inflow::Idle => {}
        }
    }

    /// Waits for the next stream event or overlay completion and applies it.
    /// Returns `None` once nothing is outstanding.
    pub async fn step(&mut self) -> Option<StepEvent> {
        if !self.is_busy() {
            return None;
        }
        let has_pending = self.overlays.has_pending();
        let input = tokio::select! {
            input = next_input(&mut self.inflow) => input,
            Some(build) = self.overlays.next_completed(), if has_pending => Input::Built(build),
        };
        let event = self.handle(input);
        self.publish();
        Some(event)
    }

    /// Steps until nothing is outstanding. Returns the number of steps.
    pub async fn drive(&mut self) -> usize {
        let mut steps = 0;
        while self.step().await.is_some() {
            steps += 1;
        }
        steps
    }

    fn handle(&mut self, input: Input) -> StepEvent {
        match input {
            Input::Opened(Ok(body)) => {
                if let Err(err) = self.state.stream_opened() {
                    warn!(%err, "dropping unexpected stream");
                    self.inflow = Inflow::Idle;
                    return StepEvent::StreamEnded;
                }
                self.inflow = Inflow::Streaming(frames(body));
                debug!(generation = %self.generation, "stream open");
                StepEvent::Opened
            }
            Input::Opened(Err(err)) | Input::Frame(Some(Err(err))) => {
                warn!(%err, generation = %self.generation, "run failed");
                self.close_stream();
                if let Err(refused) = self.state.fail(err.to_string()) {
                    warn!(%refused, "transport failure outside an active run");
                }
                StepEvent::TransportFailed(err)
            }
            Input::Frame(Some(Ok(frame))) => self.apply_frame(frame),
            Input::Frame(None) => {
                self.close_stream();
                if self.state.status() == RunStatus::Running {
                    warn!(generation = %self.generation, "{STREAM_CLOSED_EARLY}");
                    if let Err(refused) = self.state.fail(STREAM_CLOSED_EARLY) {
                        warn!(%refused, "could not mark early close");
                    }
                }
                StepEvent::StreamEnded
            }
            Input::Built(build) => {
                let outcome = self.overlays.commit(build, self.generation);
                self.metrics.incr(match outcome {
                    CommitOutcome::Committed { .. } => names::OVERLAYS_COMMITTED,
                    CommitOutcome::Stale { .. } => names::OVERLAYS_STALE,
                    CommitOutcome::Failed { .. } => names::OVERLAYS_FAILED,
                });
                StepEvent::Overlay(outcome)
            }
        }
    }

    fn apply_frame(&mut self, frame: EventFrame) -> StepEvent {
        debug!(kind = frame.kind(), generation = %self.generation, "frame");
        let transition = self.state.apply(&frame);
        self.metrics.incr(match transition {
            Transition::Malformed => names::FRAMES_MALFORMED,
            Transition::Ignored => names::FRAMES_IGNORED,
            _ => names::FRAMES_APPLIED,
        });
        match transition {
            Transition::Succeeded => {
                self.close_stream();
                if let Some(payload) = self.state.result() {
                    self.overlays.begin_mitigation(self.generation, payload);
                }
                info!(generation = %self.generation, "run succeeded");
            }
            Transition::Failed => {
                self.close_stream();
                info!(
                    generation = %self.generation,
                    error = self.state.error().unwrap_or_default(),
                    "backend reported failure"
                );
            }
            _ => {}
        }
        StepEvent::Frame(transition)
    }
}
