use log::{debug, warn};

use super::lockin;

/// One sweep's raw samples, bracketed by SWEEP/ENDSWEEP markers.
#[derive(Clone, Debug)]
pub struct SweepSegment {
    pub freq_hz: f64,
    pub half_period_ms: u32,
    samples: Vec<Vec<(f64, f64)>>, // per tracked channel: (t_ms, value)
}

impl SweepSegment {
    fn new(freq_hz: f64, half_period_ms: u32, channels: usize) -> Self {
        Self {
            freq_hz,
            half_period_ms,
            samples: vec![Vec::new(); channels],
        }
    }

    fn len(&self) -> usize {
        self.samples.iter().map(Vec::len).sum()
    }
}

/// Amplitude recovered for one channel at one drive frequency.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepPoint {
    pub freq_hz: f64,
    pub amplitude: f64,
}

/// Groups sample lines between sweep markers and demodulates each segment.
///
/// `Idle` and `InSweep` collapse onto the `Option`-ness of the open segment.
/// Samples and ENDSWEEP markers outside a sweep are ignored.
pub struct SweepCollector {
    channels: Vec<String>,
    segment: Option<SweepSegment>,
    results: Vec<Vec<SweepPoint>>,
    abandoned_segments: usize,
}

impl SweepCollector {
    pub fn new(channels: Vec<String>) -> Self {
        let results = vec![Vec::new(); channels.len()];
        Self {
            channels,
            segment: None,
            results,
            abandoned_segments: 0,
        }
    }

    pub fn in_sweep(&self) -> bool {
        self.segment.is_some()
    }

    /// Segments dropped because a new SWEEP arrived before the previous
    /// ENDSWEEP. The firmware always closes segments, so this counts producer
    /// faults.
    pub fn abandoned_segments(&self) -> usize {
        self.abandoned_segments
    }

    pub fn start(&mut self, freq_hz: f64, half_period_ms: u32) {
        if let Some(prev) = self.segment.take() {
            warn!(
                "SWEEP at {freq_hz} Hz while the {} Hz segment (half period \
                 {} ms) is still open; dropping {} buffered samples",
                prev.freq_hz,
                prev.half_period_ms,
                prev.len()
            );
            self.abandoned_segments += 1;
        }
        self.segment = Some(SweepSegment::new(freq_hz, half_period_ms, self.channels.len()));
    }

    /// Appends a sample to the open segment. No-op while idle or for channels
    /// that are not tracked; a sample without an address cannot be attributed
    /// and is dropped as well.
    pub fn sample(&mut self, channel: Option<&str>, t_ms: f64, value: f64) {
        let Some(segment) = self.segment.as_mut() else {
            return;
        };
        let Some(channel) = channel else {
            return;
        };
        if let Some(idx) = self.channels.iter().position(|c| c == channel) {
            segment.samples[idx].push((t_ms, value));
        }
    }

    /// Closes the open segment: demodulates every tracked channel's series and
    /// discards the raw samples.
    pub fn end(&mut self) {
        let Some(segment) = self.segment.take() else {
            debug!("ENDSWEEP with no open segment; ignored");
            return;
        };
        for (idx, series) in segment.samples.iter().enumerate() {
            match lockin::demodulate(series, segment.freq_hz) {
                Some(amplitude) => self.results[idx].push(SweepPoint {
                    freq_hz: segment.freq_hz,
                    amplitude,
                }),
                None => debug!(
                    "channel {}: {} raw samples left after settling trim, \
                     omitting {} Hz",
                    self.channels[idx],
                    series.len(),
                    segment.freq_hz
                ),
            }
        }
    }

    /// Per-channel results sorted by drive frequency. Duplicate frequencies
    /// are kept as-is.
    pub fn results(&self) -> Vec<(String, Vec<SweepPoint>)> {
        self.channels
            .iter()
            .zip(&self.results)
            .map(|(channel, points)| {
                let mut points = points.clone();
                points.sort_by(|a, b| a.freq_hz.total_cmp(&b.freq_hz));
                (channel.clone(), points)
            })
            .collect()
    }
}
