use std::collections::VecDeque;

use super::join::JoinedPoint;

/// Bounded, arrival-ordered history of synchronized points.
///
/// Overflow is handled as a contiguous trim of the oldest block, mirroring how
/// the live plots keep their last-N window, rather than per-item eviction.
pub struct RollingBuffer {
    points: VecDeque<JoinedPoint>,
    capacity: usize,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: JoinedPoint) {
        self.points.push_back(point);
        if self.points.len() > self.capacity {
            let excess = self.points.len() - self.capacity;
            self.points.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&JoinedPoint> {
        self.points.back()
    }

    pub fn points(&self) -> impl Iterator<Item = &JoinedPoint> {
        self.points.iter()
    }

    /// Splits the contents into an x series plus one y series per channel,
    /// ready for the renderer.
    pub fn series(&self, num_channels: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
        let mut x = Vec::with_capacity(self.points.len());
        let mut ys = vec![Vec::with_capacity(self.points.len()); num_channels];
        for point in &self.points {
            x.push(point.t_s);
            for (channel, series) in ys.iter_mut().enumerate() {
                series.push(point.values.get(channel).copied().unwrap_or(f64::NAN));
            }
        }
        (x, ys)
    }
}
