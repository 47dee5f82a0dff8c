use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::Local;
use log::info;
use serde::{Deserialize, Serialize};

use crate::stream::record::EnvReading;

/// Which persisted row layout this deployment writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSchema {
    /// `type,wall_time,time_s,addr,ratio,label`
    Ratio,
    /// `row_type,wall_time,time_s,addr,gas_ohm,temp_C,hum_pct,press_Pa,status,label`
    #[default]
    Environmental,
}

impl RowSchema {
    fn header(self) -> &'static str {
        match self {
            RowSchema::Ratio => "type,wall_time,time_s,addr,ratio,label",
            RowSchema::Environmental => {
                "row_type,wall_time,time_s,addr,gas_ohm,temp_C,hum_pct,press_Pa,status,label"
            }
        }
    }

    /// Empty columns between `time_s` and `label` in an EVENT row.
    fn event_padding(self) -> &'static str {
        match self {
            RowSchema::Ratio => ",,",
            RowSchema::Environmental => ",,,,,,",
        }
    }
}

/// Append-only CSV sink for data and event rows.
pub struct CsvSink {
    writer: BufWriter<std::fs::File>,
    schema: RowSchema,
}

impl CsvSink {
    /// Opens `path`, writing the header only when starting a fresh file.
    pub fn create(path: &Path, schema: RowSchema, append: bool) -> io::Result<Self> {
        let file = if append {
            OpenOptions::new().create(true).append(true).open(path)?
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?
        };
        let fresh = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);
        if fresh {
            writeln!(writer, "{}", schema.header())?;
            writer.flush()?;
        }
        info!("recording {:?} rows to {}", schema, path.display());
        Ok(Self { writer, schema })
    }

    pub fn schema(&self) -> RowSchema {
        self.schema
    }

    pub fn write_ratio(&mut self, t_s: f64, addr: &str, ratio: f64, label: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "DATA,{},{:.3},{},{:.6},{}",
            wall_time(),
            t_s,
            addr,
            ratio,
            label
        )
    }

    pub fn write_env(
        &mut self,
        t_s: f64,
        addr: &str,
        reading: &EnvReading,
        label: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "DATA,{},{:.3},{},{:.2},{:.2},{:.2},{:.2},{},{}",
            wall_time(),
            t_s,
            addr,
            reading.gas_ohm,
            reading.temp_c,
            reading.hum_pct,
            reading.press_pa,
            reading.status,
            label
        )
    }

    /// Event rows reuse the data column set with the data fields left empty.
    pub fn write_event(&mut self, t_s: f64, label: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "EVENT,{},{:.3},{}{}",
            wall_time(),
            t_s,
            self.schema.event_padding(),
            label
        )
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn wall_time() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("moxstream_{}_{}.csv", name, std::process::id()))
    }

    #[test]
    fn ratio_rows_have_six_columns() {
        let path = temp_path("ratio");
        let mut sink = CsvSink::create(&path, RowSchema::Ratio, false).unwrap();
        sink.write_ratio(1.234, "0x76", 0.5, "air").unwrap();
        sink.write_event(1.234, "ethanol").unwrap();
        sink.flush().unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "type,wall_time,time_s,addr,ratio,label");
        for line in &lines[1..] {
            assert_eq!(line.split(',').count(), 6, "line: {line}");
        }
        assert!(lines[1].starts_with("DATA,"));
        assert!(lines[2].starts_with("EVENT,"));
        assert!(lines[2].ends_with(",ethanol"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn environmental_rows_have_ten_columns() {
        let path = temp_path("env");
        let mut sink = CsvSink::create(&path, RowSchema::Environmental, false).unwrap();
        let reading = EnvReading {
            gas_ohm: 10432.5,
            temp_c: 31.2,
            hum_pct: 45.8,
            press_pa: 101325.0,
            status: "0x80".into(),
        };
        sink.write_env(2.5, "0x77", &reading, "air").unwrap();
        sink.write_event(2.5, "acetone").unwrap();
        sink.flush().unwrap();
        let text = fs::read_to_string(&path).unwrap();
        for line in text.lines() {
            assert_eq!(line.split(',').count(), 10, "line: {line}");
        }
        fs::remove_file(&path).ok();
    }

    #[test]
    fn append_mode_skips_the_header() {
        let path = temp_path("append");
        {
            let mut sink = CsvSink::create(&path, RowSchema::Ratio, false).unwrap();
            sink.write_ratio(1.0, "0x76", 0.5, "air").unwrap();
            sink.flush().unwrap();
        }
        {
            let mut sink = CsvSink::create(&path, RowSchema::Ratio, true).unwrap();
            sink.write_ratio(2.0, "0x76", 0.6, "air").unwrap();
            sink.flush().unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        let headers = text.lines().filter(|l| l.starts_with("type,")).count();
        assert_eq!(headers, 1);
        assert_eq!(text.lines().count(), 3);
        fs::remove_file(&path).ok();
    }
}
