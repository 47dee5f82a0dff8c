use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Instant;

/// One label switch anchored to the data timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelEvent {
    pub t_s: f64,
    pub label: String,
}

/// Merges asynchronous label input with the data timeline.
///
/// A detached reader thread pushes trimmed, non-empty strings onto a channel;
/// the processing loop drains it non-blockingly once per iteration. Every
/// drained label becomes the current label and one recorded event, anchored at
/// the timestamp of the most recent data point. Labels arriving between two
/// data points therefore collapse onto the same anchor; they are never
/// interpolated.
pub struct LabelTimeline {
    rx: Receiver<String>,
    current: String,
    events: Vec<LabelEvent>,
    started: Instant,
}

impl LabelTimeline {
    pub fn new(rx: Receiver<String>, initial: String) -> Self {
        Self {
            rx,
            current: initial,
            events: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Spawns the stdin reader thread and returns a timeline fed by it.
    pub fn from_stdin(initial: String) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || read_stdin_labels(tx));
        Self::new(rx, initial)
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn events(&self) -> &[LabelEvent] {
        &self.events
    }

    /// Drains every queued label. `anchor` is the timestamp of the most recent
    /// data point; when no data has arrived yet the elapsed wall time stands
    /// in. Returns the newly recorded events so the caller can persist them.
    pub fn drain(&mut self, anchor: Option<f64>) -> Vec<LabelEvent> {
        let mut drained = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(label) => {
                    let t_s = anchor.unwrap_or_else(|| self.started.elapsed().as_secs_f64());
                    self.current = label.clone();
                    let event = LabelEvent { t_s, label };
                    self.events.push(event.clone());
                    drained.push(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }
}

fn read_stdin_labels(tx: Sender<String>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { return };
        let label = line.trim();
        if label.is_empty() {
            continue;
        }
        if tx.send(label.to_string()).is_err() {
            return;
        }
    }
}
