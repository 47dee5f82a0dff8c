mod analysis;
mod config;
mod labels;
mod recorder;
mod render;
mod session;
mod stream;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;

use config::Config;
use labels::LabelTimeline;
use recorder::CsvSink;
use render::LogRenderer;
use session::{CancelFlag, Session};
use stream::ProcessSource;

fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("moxstream.json"));
    let config = Config::load(&config_path)?;
    if config.command.is_empty() {
        bail!("config: `command` must name the acquisition program");
    }
    if config.channels.is_empty() {
        bail!("config: at least one tracked channel is required");
    }

    let mut source = ProcessSource::spawn(&config.command[0], &config.command[1..])
        .context("starting acquisition")?;
    let sink = match &config.csv_path {
        Some(path) => Some(
            CsvSink::create(path, config.csv_schema, config.csv_append)
                .with_context(|| format!("opening CSV sink {}", path.display()))?,
        ),
        None => None,
    };
    let labels = LabelTimeline::from_stdin(config.initial_label.clone());
    info!(
        "ingesting from `{}`; type a label and press enter to mark a switch",
        config.command.join(" ")
    );

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    // The loop observes the flag at the next line boundary; the producer
    // emits continuously, so shutdown stays prompt.
    ctrlc::set_handler(move || handler_flag.cancel())
        .context("installing interrupt handler")?;

    let mut session = Session::new(&config, labels, sink, Box::new(LogRenderer));
    session.run(&mut source, &cancel)?;

    for (channel, points) in session.sweep_results() {
        for point in points {
            println!(
                "{channel}  f={:.3} Hz  amp={:.3}",
                point.freq_hz, point.amplitude
            );
        }
    }
    let mut printed_peak = false;
    for channel in &config.channels {
        if let Some(found) = session.latest_peak_for(channel) {
            println!(
                "{channel}  last peak {:.2} Hz (magnitude {:.3})",
                found.freq_hz, found.magnitude
            );
            printed_peak = true;
        }
    }
    if !printed_peak {
        if let Some(found) = session.latest_peak() {
            println!("last peak: {:.2} Hz (magnitude {:.3})", found.freq_hz, found.magnitude);
        }
    }
    Ok(())
}
