use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::analysis::peak::{self, SpectralPeak};
use crate::analysis::sweep::{SweepCollector, SweepPoint};
use crate::config::Config;
use crate::labels::LabelTimeline;
use crate::recorder::CsvSink;
use crate::render::{PlotFrame, RenderThrottle, Renderer};
use crate::stream::{
    parse_line, ChannelJoin, LineSource, ProtocolConfig, Record, RollingBuffer, StreamError,
};

/// Cooperative cancellation shared between the loop and an interrupt handler.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One extracted spectral peak together with its provenance: the producer's
/// timestamp when the line carries one (falling back to the newest data
/// timestamp), the cycle id for cycle-indexed streams, and the sensor address
/// for addressed streams. Cycle ids are indices, never timestamps.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakSample {
    pub t_s: Option<f64>,
    pub cycle: Option<u32>,
    pub channel: Option<String>,
    pub peak: SpectralPeak,
}

/// Everything the processing loop mutates, threaded through explicitly
/// instead of living in globals: join state, rolling history, label timeline,
/// sweep collector, sink, and the observability counters.
pub struct Session {
    protocol: ProtocolConfig,
    join: ChannelJoin,
    buffer: RollingBuffer,
    labels: LabelTimeline,
    sweeps: SweepCollector,
    sink: Option<CsvSink>,
    renderer: Box<dyn Renderer>,
    throttle: RenderThrottle,
    bin_convention: peak::BinConvention,
    skipped_lines: u64,
    last_t_s: Option<f64>,
    latest_peak: Option<SpectralPeak>,
    // Addressed spectra keep one latest peak per sensor, matching how the
    // live FFT display holds the newest spectrum for each address.
    latest_peaks: HashMap<String, SpectralPeak>,
    peak_history: VecDeque<PeakSample>,
    peak_capacity: usize,
}

impl Session {
    pub fn new(
        config: &Config,
        labels: LabelTimeline,
        sink: Option<CsvSink>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            protocol: config.protocol(),
            join: ChannelJoin::new(config.channels.clone()),
            buffer: RollingBuffer::new(config.buffer_capacity),
            labels,
            sweeps: SweepCollector::new(config.channels.clone()),
            sink,
            renderer,
            throttle: RenderThrottle::new(Duration::from_millis(config.redraw_min_ms)),
            bin_convention: config.bin_convention,
            skipped_lines: 0,
            last_t_s: None,
            latest_peak: None,
            latest_peaks: HashMap::new(),
            peak_history: VecDeque::new(),
            peak_capacity: config.buffer_capacity.max(1),
        }
    }

    /// Consumes the source exactly once, in order, until end of stream or
    /// cancellation. On cancellation the source is terminated and any open
    /// sweep segment and undrained labels are dropped without partial results.
    pub fn run(
        &mut self,
        source: &mut dyn LineSource,
        cancel: &CancelFlag,
    ) -> Result<(), StreamError> {
        loop {
            if cancel.is_cancelled() {
                info!("cancelled; terminating acquisition");
                source.terminate();
                break;
            }
            let Some(line) = source.next_line()? else {
                break;
            };
            self.step(&line);
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.flush() {
                warn!("flushing sink: {err}");
            }
        }
        info!(
            "session finished: {} lines skipped, {} sweep segments abandoned",
            self.skipped_lines,
            self.sweeps.abandoned_segments()
        );
        Ok(())
    }

    /// One loop iteration: poll-then-drain the label queue, parse and dispatch
    /// the line, then hand the renderer a throttled snapshot.
    pub fn step(&mut self, line: &str) {
        // Labels queued since the previous iteration anchor to the data point
        // ingested back then, not to the line about to be dispatched.
        let drained = self.labels.drain(self.last_t_s);
        for event in &drained {
            if let Some(sink) = self.sink.as_mut() {
                if let Err(err) = sink.write_event(event.t_s, &event.label) {
                    warn!("persisting event row: {err}");
                }
            }
        }

        match parse_line(line, &self.protocol) {
            Ok(record) => self.dispatch(record),
            Err(rejection) => {
                // Skip-and-continue is deliberate; the counter keeps it
                // observable.
                self.skipped_lines += 1;
                debug!("skipping line: {rejection}");
            }
        }

        if !self.buffer.is_empty() && self.throttle.ready() {
            let frame = self.snapshot();
            self.renderer.update(&frame);
        }
    }

    fn dispatch(&mut self, record: Record) {
        match record {
            Record::Ratio {
                t_ms,
                channel,
                ratio,
            } => {
                let t_s = t_ms / 1000.0;
                if let Some(point) = self.join.update(&channel, ratio, t_s) {
                    self.buffer.push(point);
                }
                if let Some(sink) = self.sink.as_mut() {
                    if let Err(err) = sink.write_ratio(t_s, &channel, ratio, self.labels.current())
                    {
                        warn!("persisting ratio row: {err}");
                    }
                }
                self.last_t_s = Some(t_s);
            }
            Record::Data {
                t_ms,
                channel,
                reading,
            } => {
                let t_s = t_ms / 1000.0;
                if let Some(point) = self.join.update(&channel, reading.gas_ohm, t_s) {
                    self.buffer.push(point);
                }
                if let Some(sink) = self.sink.as_mut() {
                    if let Err(err) =
                        sink.write_env(t_s, &channel, &reading, self.labels.current())
                    {
                        warn!("persisting data row: {err}");
                    }
                }
                self.last_t_s = Some(t_s);
            }
            Record::Sample {
                t_ms,
                channel,
                value,
            } => {
                let t_s = t_ms / 1000.0;
                self.sweeps.sample(channel.as_deref(), t_ms, value);
                // A single-channel deployment leaves samples unaddressed; they
                // belong to the one tracked channel.
                let resolved = match channel {
                    Some(ch) => Some(ch),
                    None if self.join.channels().len() == 1 => {
                        Some(self.join.channels()[0].clone())
                    }
                    None => None,
                };
                if let Some(ch) = resolved {
                    if let Some(point) = self.join.update(&ch, value, t_s) {
                        self.buffer.push(point);
                    }
                }
                self.last_t_s = Some(t_s);
            }
            Record::SweepStart {
                half_period_ms,
                freq_hz,
                ..
            } => self.sweeps.start(freq_hz, half_period_ms),
            Record::SweepEnd => self.sweeps.end(),
            Record::Fft {
                t_ms,
                channel,
                cycle,
                fs_hz,
                magnitudes,
            } => match peak::find_peak(&magnitudes, fs_hz, self.bin_convention) {
                Ok(found) => {
                    let t_s = t_ms.map(|t| t / 1000.0).or(self.last_t_s);
                    if let Some(ch) = &channel {
                        self.latest_peaks.insert(ch.clone(), found);
                    }
                    self.latest_peak = Some(found);
                    self.peak_history.push_back(PeakSample {
                        t_s,
                        cycle,
                        channel,
                        peak: found,
                    });
                    if self.peak_history.len() > self.peak_capacity {
                        let excess = self.peak_history.len() - self.peak_capacity;
                        self.peak_history.drain(..excess);
                    }
                }
                Err(err) => debug!("spectrum discarded: {err}"),
            },
            Record::Header => {}
        }
    }

    fn snapshot(&self) -> PlotFrame {
        let (t_s, ys) = self.buffer.series(self.join.channels().len());
        let channels = self
            .join
            .channels()
            .iter()
            .cloned()
            .zip(ys)
            .collect();
        PlotFrame {
            t_s,
            channels,
            marks: self.labels.events().to_vec(),
        }
    }

    pub fn buffer(&self) -> &RollingBuffer {
        &self.buffer
    }

    pub fn labels(&self) -> &LabelTimeline {
        &self.labels
    }

    pub fn sweep_results(&self) -> Vec<(String, Vec<SweepPoint>)> {
        self.sweeps.results()
    }

    /// Most recent peak from any spectrum stream.
    pub fn latest_peak(&self) -> Option<SpectralPeak> {
        self.latest_peak
    }

    /// Latest peak of one addressed spectrum stream.
    pub fn latest_peak_for(&self, channel: &str) -> Option<SpectralPeak> {
        self.latest_peaks.get(channel).copied()
    }

    pub fn peak_history(&self) -> impl Iterator<Item = &PeakSample> {
        self.peak_history.iter()
    }

    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FftEncoding, SampleSchema};
    use crate::labels::LabelTimeline;
    use crate::render::NullRenderer;
    use crate::stream::ManualSource;
    use std::sync::mpsc;

    fn ratio_config() -> Config {
        Config {
            redraw_min_ms: 0,
            ..Config::default()
        }
    }

    fn sweep_config() -> Config {
        Config {
            sample_schema: SampleSchema::Sweep,
            fft_encoding: FftEncoding::CycleIndexed,
            redraw_min_ms: 0,
            ..Config::default()
        }
    }

    fn session(config: &Config) -> (mpsc::Sender<String>, Session) {
        let (tx, rx) = mpsc::channel();
        let labels = LabelTimeline::new(rx, "air".into());
        (tx, Session::new(config, labels, None, Box::new(NullRenderer)))
    }

    #[test]
    fn ratio_stream_joins_and_buffers() {
        let config = ratio_config();
        let (_tx, mut session) = session(&config);
        let mut source = ManualSource::new([
            "RATIO,1000,0x76,1.10",
            "RATIO,1000,0x77,0.95",
            "RATIO,2000,0x76,1.20",
            "not,a,line",
        ]);
        session.run(&mut source, &CancelFlag::new()).unwrap();
        assert_eq!(session.buffer().len(), 2);
        let last = session.buffer().last().unwrap();
        assert_eq!(last.t_s, 2.0);
        assert_eq!(last.values, vec![1.2, 0.95]);
        assert_eq!(session.skipped_lines(), 1);
    }

    #[test]
    fn labels_anchor_to_the_most_recent_data_point() {
        let config = ratio_config();
        let (tx, mut session) = session(&config);
        session.step("RATIO,1000,0x76,1.0");
        tx.send("ethanol".into()).unwrap();
        tx.send("acetone".into()).unwrap();
        session.step("RATIO,2000,0x77,0.9");
        let events = session.labels().events();
        assert_eq!(events.len(), 2);
        // Both labels landed between t=1.0 and t=2.0 and anchor at 2.0's
        // predecessor, never interpolated.
        assert!(events.iter().all(|e| e.t_s == 1.0));
        assert_eq!(session.labels().current(), "acetone");
    }

    #[test]
    fn sweep_stream_produces_one_point_per_channel() {
        let config = sweep_config();
        let (_tx, mut session) = session(&config);
        let mut lines = vec!["SWEEP,500,1.0,6,20.0".to_string()];
        for i in 0..240 {
            let t_ms = i as f64 * 50.0;
            let x = (2.0 * std::f64::consts::PI * t_ms / 1000.0).sin();
            lines.push(format!("{},0x76,320,{}", t_ms, 10000.0 + 500.0 * x));
            lines.push(format!("{},0x77,320,{}", t_ms, 20000.0 + 900.0 * x));
        }
        lines.push("ENDSWEEP,500".to_string());
        let mut source = ManualSource::new(lines);
        session.run(&mut source, &CancelFlag::new()).unwrap();
        let results = session.sweep_results();
        assert_eq!(results[0].1.len(), 1);
        assert_eq!(results[1].1.len(), 1);
        assert!((results[0].1[0].amplitude - 500.0).abs() / 500.0 < 0.05);
        assert!((results[1].1[0].amplitude - 900.0).abs() / 900.0 < 0.05);
    }

    #[test]
    fn cycle_indexed_fft_updates_the_peak() {
        let mut config = sweep_config();
        config.bin_convention = peak::BinConvention::FirstHarmonic;
        let (_tx, mut session) = session(&config);
        session.step("FFT,3,20.0,0.1,0.9,0.2,0.05");
        let found = session.latest_peak().unwrap();
        // Bin 2 of 4 printed bins, M = 8: 2 * 20 / 8 = 5 Hz.
        assert_eq!(found.freq_hz, 5.0);
        assert_eq!(found.magnitude, 0.9);
        let samples: Vec<&PeakSample> = session.peak_history().collect();
        assert_eq!(samples.len(), 1);
        // The cycle id stays an index; it must not masquerade as a timestamp,
        // and no data has arrived to borrow one from.
        assert_eq!(samples[0].cycle, Some(3));
        assert!(samples[0].t_s.is_none());
        assert!(samples[0].channel.is_none());
    }

    #[test]
    fn addressed_ffts_keep_one_peak_per_sensor() {
        let config = ratio_config();
        let (_tx, mut session) = session(&config);
        // Three bins imply a 4-point transform at Fs = 20 Hz.
        session.step("FFT,1000,0x76,20.0,0.0,5.0,1.0");
        session.step("FFT,1000,0x77,20.0,0.0,0.0,7.0");
        let p76 = session.latest_peak_for("0x76").unwrap();
        assert_eq!(p76.freq_hz, 5.0);
        assert_eq!(p76.magnitude, 5.0);
        let p77 = session.latest_peak_for("0x77").unwrap();
        assert_eq!(p77.freq_hz, 10.0);
        assert_eq!(p77.magnitude, 7.0);
        // The second sensor's spectrum does not clobber the first's.
        assert_eq!(session.latest_peak(), Some(p77));
        let channels: Vec<Option<&str>> = session
            .peak_history()
            .map(|s| s.channel.as_deref())
            .collect();
        assert_eq!(channels, vec![Some("0x76"), Some("0x77")]);
        assert!(session
            .peak_history()
            .all(|s| s.t_s == Some(1.0) && s.cycle.is_none()));
    }

    /// Keeps producing the same line until terminated, like a live child
    /// process would.
    struct EndlessSource {
        line: String,
        terminated: bool,
    }

    impl LineSource for EndlessSource {
        fn next_line(&mut self) -> Result<Option<String>, StreamError> {
            if self.terminated {
                Ok(None)
            } else {
                Ok(Some(self.line.clone()))
            }
        }

        fn terminate(&mut self) {
            self.terminated = true;
        }
    }

    #[test]
    fn cancellation_terminates_an_endless_source() {
        let config = ratio_config();
        let (_tx, mut session) = session(&config);
        let mut source = EndlessSource {
            line: "RATIO,1000,0x76,1.0".into(),
            terminated: false,
        };
        let cancel = CancelFlag::new();
        cancel.cancel();
        // Without the flag this source would feed the loop forever.
        session.run(&mut source, &cancel).unwrap();
        assert!(source.terminated);
        assert!(session.buffer().is_empty());
        assert_eq!(session.skipped_lines(), 0);
    }

    #[test]
    fn samples_and_endsweep_while_idle_are_ignored() {
        let config = sweep_config();
        let (_tx, mut session) = session(&config);
        session.step("0,0x76,320,10000.0");
        session.step("ENDSWEEP,500");
        for (_, points) in session.sweep_results() {
            assert!(points.is_empty());
        }
    }
}
