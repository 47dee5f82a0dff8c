use std::time::{Duration, Instant};

use log::debug;

use crate::labels::LabelEvent;

/// Snapshot of the rolling buffer handed to the rendering collaborator.
#[derive(Clone, Debug, Default)]
pub struct PlotFrame {
    pub t_s: Vec<f64>,
    /// One (channel name, y series) pair per tracked channel.
    pub channels: Vec<(String, Vec<f64>)>,
    /// Label switches to mark on the time axis.
    pub marks: Vec<LabelEvent>,
}

/// Consumer of periodic buffer snapshots. Actual drawing lives outside the
/// core; implementations refresh on their own cadence.
pub trait Renderer {
    fn update(&mut self, frame: &PlotFrame);
}

/// Discards every frame.
#[derive(Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn update(&mut self, _frame: &PlotFrame) {}
}

/// Logs a one-line summary per frame, for headless runs.
#[derive(Default)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn update(&mut self, frame: &PlotFrame) {
        let span = match (frame.t_s.first(), frame.t_s.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };
        debug!(
            "frame: {} points over {:.1} s, {} channels, {} marks",
            frame.t_s.len(),
            span,
            frame.channels.len(),
            frame.marks.len()
        );
    }
}

/// Caps how often the renderer sees a new frame. The core must supply
/// up-to-date contents without forcing a redraw per record.
pub struct RenderThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RenderThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// True when enough time has passed since the previous accepted frame;
    /// accepting consumes the interval.
    pub fn ready(&mut self) -> bool {
        match self.last {
            Some(last) if last.elapsed() < self.min_interval => false,
            _ => {
                self.last = Some(Instant::now());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_is_always_ready() {
        let mut throttle = RenderThrottle::new(Duration::from_millis(100));
        assert!(throttle.ready());
    }

    #[test]
    fn back_to_back_frames_are_suppressed() {
        let mut throttle = RenderThrottle::new(Duration::from_millis(100));
        assert!(throttle.ready());
        assert!(!throttle.ready());
    }

    #[test]
    fn zero_interval_never_suppresses() {
        let mut throttle = RenderThrottle::new(Duration::ZERO);
        assert!(throttle.ready());
        assert!(throttle.ready());
    }
}
