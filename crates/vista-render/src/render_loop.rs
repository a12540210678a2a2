//! Invalidation-driven render scheduling.
//!
//! The loop never renders on its own. Something invalidates it, it asks the
//! host for one frame callback, and when the host calls back it renders
//! exactly once. Any number of invalidations before the callback share that
//! one render.

use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;
use vista_config::TelemetryConfig;
use vista_core::Emitter;
use vista_telemetry::{PerfSample, SampleExtra, Telemetry};

/// Identifies one requested frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// The environment presenting frames (a window's redraw request, a
/// display-link, a test clock).
pub trait FrameHost {
    /// Ask for a frame callback. The host later calls
    /// [`RenderLoop::on_frame`] with the returned token.
    fn request_frame(&mut self) -> FrameToken;

    /// Withdraw a requested callback. Callbacks that still arrive for it
    /// are ignored.
    fn cancel_frame(&mut self, token: FrameToken);
}

/// Draws a frame.
pub trait Renderer {
    fn render(&mut self);

    /// Extra fields merged into performance samples.
    fn stats(&self) -> SampleExtra {
        SampleExtra::new()
    }
}

/// Scheduler state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Idle,
    FrameScheduled,
}

/// Notifications emitted around each render.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderEvent {
    BeforeRender,
    AfterRender,
    /// Emitted at most once per sample interval.
    Perf(PerfSample),
}

/// Shared flag listeners can raise to request a redraw.
///
/// Event listeners cannot borrow the loop, so they raise this flag instead;
/// [`RenderLoop::pump`] turns a raised flag into an invalidation.
#[derive(Clone, Debug, Default)]
pub struct InvalidationFlag(Rc<Cell<bool>>);

impl InvalidationFlag {
    pub fn raise(&self) {
        self.0.set(true);
    }

    pub fn is_raised(&self) -> bool {
        self.0.get()
    }

    fn take(&self) -> bool {
        self.0.replace(false)
    }
}

pub struct RenderLoop<H: FrameHost, R: Renderer> {
    host: H,
    renderer: R,
    state: LoopState,
    pending: Option<FrameToken>,
    telemetry: Telemetry,
    sample_interval_ms: f64,
    last_sample_at: Option<f64>,
    render_count: u64,
    flag: InvalidationFlag,
    events: Emitter<RenderEvent>,
}

impl<H: FrameHost, R: Renderer> RenderLoop<H, R> {
    /// A stopped loop.
    pub fn new(host: H, renderer: R, telemetry: Telemetry, sample_interval_ms: f64) -> Self {
        Self {
            host,
            renderer,
            state: LoopState::Stopped,
            pending: None,
            telemetry,
            sample_interval_ms,
            last_sample_at: None,
            render_count: 0,
            flag: InvalidationFlag::default(),
            events: Emitter::new(),
        }
    }

    pub fn from_config(host: H, renderer: R, config: &TelemetryConfig) -> Self {
        Self::new(
            host,
            renderer,
            Telemetry::from_config(config),
            config.sample_interval_ms,
        )
    }

    pub fn start(&mut self) {
        if self.state == LoopState::Stopped {
            trace!("Render loop started");
            self.state = LoopState::Idle;
        }
    }

    /// Stop and withdraw any scheduled frame. Invalidations are dropped
    /// until the next [`start`](Self::start).
    pub fn stop(&mut self) {
        if let Some(token) = self.pending.take() {
            self.host.cancel_frame(token);
        }
        if self.state != LoopState::Stopped {
            trace!("Render loop stopped");
        }
        self.state = LoopState::Stopped;
        self.flag.take();
    }

    /// Schedule a render for the next frame unless one is already scheduled.
    pub fn invalidate(&mut self) {
        match self.state {
            LoopState::Stopped => trace!("Dropping invalidation while stopped"),
            LoopState::FrameScheduled => {}
            LoopState::Idle => {
                self.pending = Some(self.host.request_frame());
                self.state = LoopState::FrameScheduled;
                trace!("Frame scheduled");
            }
        }
    }

    pub fn render_on_next_frame(&mut self) {
        self.invalidate();
    }

    /// Handle for listeners that need to request a redraw.
    pub fn invalidation_flag(&self) -> InvalidationFlag {
        self.flag.clone()
    }

    /// Turn a raised [`InvalidationFlag`] into an invalidation.
    pub fn pump(&mut self) {
        if self.flag.take() {
            self.invalidate();
        }
    }

    /// Host frame callback. Renders once if `token` is the scheduled frame
    /// and returns whether it rendered.
    pub fn on_frame(&mut self, token: FrameToken, timestamp_ms: f64) -> bool {
        if self.state != LoopState::FrameScheduled || self.pending != Some(token) {
            trace!(token = token.0, "Ignoring stale frame callback");
            return false;
        }
        self.pending = None;
        self.state = LoopState::Idle;

        self.events.emit(&RenderEvent::BeforeRender);
        self.renderer.render();
        self.render_count += 1;
        self.telemetry.record_frame(timestamp_ms);
        self.events.emit(&RenderEvent::AfterRender);

        let due = self
            .last_sample_at
            .is_none_or(|last| timestamp_ms - last >= self.sample_interval_ms);
        if due {
            self.last_sample_at = Some(timestamp_ms);
            let sample = self.telemetry.sample(self.renderer.stats());
            self.events.emit(&RenderEvent::Perf(sample));
        }

        // Anything raised while rendering gets its own frame.
        self.pump();
        true
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != LoopState::Stopped
    }

    /// Renders since creation.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn events(&mut self) -> &mut Emitter<RenderEvent> {
        &mut self.events
    }
}
