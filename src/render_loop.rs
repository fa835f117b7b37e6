//! A cancellable per-frame task.
//!
//! The window redraws continuously while the loop runs. Stopping goes
//! through a [`LoopHandle`], which can be cloned into callbacks or other
//! threads; the loop notices at its next frame boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Upper bound on a single frame step, so a stalled window does not make
/// animation jump.
const MAX_FRAME_DT: f32 = 0.25;

/// Result of advancing the loop by one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tick {
    /// Render this frame.
    Continue {
        /// Seconds since the previous frame, zero for the first.
        dt: f32,
        /// Zero-based index of this frame.
        frame: u64,
    },
    /// The loop was stopped; do not render.
    Stopped,
}

/// Stops a running [`RenderLoop`].
#[derive(Clone, Debug)]
pub struct LoopHandle {
    running: Arc<AtomicBool>,
}

impl LoopHandle {
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::info!("render loop stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct RenderLoop {
    running: Arc<AtomicBool>,
    frame: u64,
    last_frame: Option<Instant>,
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            frame: 0,
            last_frame: None,
        }
    }
}

impl RenderLoop {
    /// A loop that has not started yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the loop and returns a handle that stops it.
    pub fn start(&mut self) -> LoopHandle {
        self.running.store(true, Ordering::SeqCst);
        self.last_frame = None;
        log::info!("render loop started");
        self.handle()
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            running: Arc::clone(&self.running),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// Advances to the frame at `now`.
    pub fn tick(&mut self, now: Instant) -> Tick {
        if !self.is_running() {
            return Tick::Stopped;
        }

        let dt = self
            .last_frame
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0)
            .min(MAX_FRAME_DT);
        self.last_frame = Some(now);

        let frame = self.frame;
        self.frame += 1;
        Tick::Continue { dt, frame }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn not_started_loop_is_stopped() {
        let mut render_loop = RenderLoop::new();
        assert_eq!(render_loop.tick(Instant::now()), Tick::Stopped);
        assert_eq!(render_loop.frames(), 0);
    }

    #[test]
    fn ticks_report_elapsed_time() {
        let mut render_loop = RenderLoop::new();
        render_loop.start();
        let t0 = Instant::now();

        assert_eq!(render_loop.tick(t0), Tick::Continue { dt: 0.0, frame: 0 });
        match render_loop.tick(t0 + Duration::from_millis(16)) {
            Tick::Continue { dt, frame } => {
                assert!((dt - 0.016).abs() < 1e-6);
                assert_eq!(frame, 1);
            }
            Tick::Stopped => panic!("loop should still run"),
        }
    }

    #[test]
    fn long_stalls_are_capped() {
        let mut render_loop = RenderLoop::new();
        render_loop.start();
        let t0 = Instant::now();
        render_loop.tick(t0);
        let Tick::Continue { dt, .. } = render_loop.tick(t0 + Duration::from_secs(5)) else {
            panic!("loop should still run");
        };
        assert_eq!(dt, MAX_FRAME_DT);
    }

    #[test]
    fn handle_stops_at_next_frame() {
        let mut render_loop = RenderLoop::new();
        let handle = render_loop.start();
        let remote = handle.clone();

        assert!(matches!(render_loop.tick(Instant::now()), Tick::Continue { .. }));
        std::thread::spawn(move || remote.stop())
            .join()
            .unwrap();

        assert!(!handle.is_running());
        assert_eq!(render_loop.tick(Instant::now()), Tick::Stopped);
        assert_eq!(render_loop.frames(), 1);
    }
}
