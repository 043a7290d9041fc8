//! Display-rate frame loop with a capped composite rate.
//!
//! The scheduler fires once per display refresh. [`FrameThrottle`] accumulates
//! elapsed time and lets the expensive composite step through at most once
//! per interval, so the panorama turns at the same speed on a 60 Hz and a
//! 144 Hz display.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, trace};

use crate::host::{FrameHandle, FrameScheduler};
use crate::signal::lock;

/// Frame times longer than this are clamped before accumulation.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Display timestamps are nanosecond-rounded; sums may land just short.
const TIMESTAMP_TOLERANCE: f64 = 1e-9;

/// Accumulator gate between display frames and composited frames.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: f64,
    accumulator: f64,
    last_timestamp: Option<Duration>,
    frame_count: u64,
    composite_count: u64,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.as_secs_f64(),
            accumulator: 0.0,
            last_timestamp: None,
            frame_count: 0,
            composite_count: 0,
        }
    }

    /// Feed a display timestamp. Returns whether this frame should composite.
    pub fn advance(&mut self, timestamp: Duration) -> bool {
        let dt = match self.last_timestamp {
            Some(last) => timestamp.saturating_sub(last).as_secs_f64(),
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);
        self.tick(dt)
    }

    /// Feed an explicit frame time in seconds.
    pub fn tick(&mut self, frame_time: f64) -> bool {
        self.frame_count += 1;
        self.accumulator += frame_time.clamp(0.0, MAX_FRAME_TIME);
        if self.accumulator + TIMESTAMP_TOLERANCE < self.interval {
            return false;
        }
        // Keep the phase, drop whole intervals a long frame may have covered.
        self.accumulator = (self.accumulator - self.interval).max(0.0) % self.interval;
        self.composite_count += 1;
        true
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn composite_count(&self) -> u64 {
        self.composite_count
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }
}

type FrameHandler = Box<dyn FnMut(Duration) + Send>;

struct LoopState {
    pending: Option<FrameHandle>,
    stopped: bool,
}

struct LoopShared {
    scheduler: Arc<dyn FrameScheduler>,
    state: Mutex<LoopState>,
    handler: Mutex<FrameHandler>,
}

/// Self-rescheduling frame callback.
///
/// Each frame runs the handler and requests the next one. [`stop`](Self::stop)
/// cancels the outstanding request exactly once.
pub struct AnimationLoop {
    shared: Arc<LoopShared>,
}

impl AnimationLoop {
    pub fn start(
        scheduler: Arc<dyn FrameScheduler>,
        handler: impl FnMut(Duration) + Send + 'static,
    ) -> Self {
        let shared = Arc::new(LoopShared {
            scheduler,
            state: Mutex::new(LoopState {
                pending: None,
                stopped: false,
            }),
            handler: Mutex::new(Box::new(handler)),
        });
        schedule(&shared);
        debug!("animation loop started");
        Self { shared }
    }

    /// Cancel the pending frame. Returns `false` if already stopped.
    pub fn stop(&self) -> bool {
        let pending = {
            let mut state = lock(&self.shared.state);
            if state.stopped {
                return false;
            }
            state.stopped = true;
            state.pending.take()
        };
        if let Some(handle) = pending {
            self.shared.scheduler.cancel_frame(handle);
        }
        debug!("animation loop stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        !lock(&self.shared.state).stopped
    }
}

fn schedule(shared: &Arc<LoopShared>) {
    let next = Arc::clone(shared);
    let handle = shared
        .scheduler
        .request_frame(Box::new(move |timestamp| run_frame(&next, timestamp)));
    let mut state = lock(&shared.state);
    if state.stopped {
        drop(state);
        shared.scheduler.cancel_frame(handle);
        return;
    }
    state.pending = Some(handle);
}

fn run_frame(shared: &Arc<LoopShared>, timestamp: Duration) {
    {
        let mut state = lock(&shared.state);
        if state.stopped {
            return;
        }
        state.pending = None;
    }
    trace!(?timestamp, "frame");
    (lock(&shared.handler))(timestamp);
    schedule(shared);
}
