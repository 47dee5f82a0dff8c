/// One synchronized point: the latest value from every tracked channel.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedPoint {
    pub t_s: f64,
    pub values: Vec<f64>,
}

/// Last-observation-carried-forward join across the tracked channels.
///
/// A tuple is emitted only once every tracked channel has reported at least
/// once; until then updates are recorded silently. The emitted tuple takes the
/// triggering update's timestamp and carries stale values forward for the
/// channels that did not just update.
pub struct ChannelJoin {
    channels: Vec<String>,
    last: Vec<Option<f64>>,
}

impl ChannelJoin {
    pub fn new(channels: Vec<String>) -> Self {
        let last = vec![None; channels.len()];
        Self { channels, last }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Records `value` for `channel`; returns a synchronized tuple when all
    /// tracked channels are covered. Untracked channels are ignored.
    pub fn update(&mut self, channel: &str, value: f64, t_s: f64) -> Option<JoinedPoint> {
        let idx = self.channels.iter().position(|c| c == channel)?;
        self.last[idx] = Some(value);
        let values: Option<Vec<f64>> = self.last.iter().copied().collect();
        values.map(|values| JoinedPoint { t_s, values })
    }
}
