use std::fmt::Write as _;

/// One full environmental reading from an addressed sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvReading {
    pub gas_ohm: f64,
    pub temp_c: f64,
    pub hum_pct: f64,
    pub press_pa: f64,
    pub status: String,
}

/// Typed form of one protocol line.
///
/// `Fft` covers two incompatible encodings: the address-qualified form carries
/// `t_ms` and `channel`, the cycle-indexed form carries `cycle`. Which one a
/// deployment speaks is fixed by configuration, never inferred from the line.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Data {
        t_ms: f64,
        channel: String,
        reading: EnvReading,
    },
    Fft {
        t_ms: Option<f64>,
        channel: Option<String>,
        cycle: Option<u32>,
        fs_hz: f64,
        magnitudes: Vec<f64>,
    },
    Ratio {
        t_ms: f64,
        channel: String,
        ratio: f64,
    },
    SweepStart {
        half_period_ms: u32,
        freq_hz: f64,
        cycles: u32,
        fs_hz: f64,
    },
    SweepEnd,
    Sample {
        t_ms: f64,
        channel: Option<String>,
        value: f64,
    },
    Header,
}

impl Record {
    /// Renders the record back to its wire form.
    ///
    /// Floats use Rust's shortest round-trip formatting, so
    /// `parse_line(r.to_line())` reproduces `r` exactly for every variant
    /// (given a matching protocol configuration).
    pub fn to_line(&self) -> String {
        match self {
            Record::Data {
                t_ms,
                channel,
                reading,
            } => format!(
                "{},{},{},{},{},{},{}",
                t_ms,
                channel,
                reading.gas_ohm,
                reading.temp_c,
                reading.hum_pct,
                reading.press_pa,
                reading.status
            ),
            Record::Fft {
                t_ms,
                channel,
                cycle,
                fs_hz,
                magnitudes,
            } => {
                let mut line = match (t_ms, channel, cycle) {
                    (Some(t), Some(ch), _) => format!("FFT,{},{},{}", t, ch, fs_hz),
                    _ => format!("FFT,{},{}", (*cycle).unwrap_or(0), fs_hz),
                };
                for mag in magnitudes {
                    let _ = write!(line, ",{}", mag);
                }
                line
            }
            Record::Ratio {
                t_ms,
                channel,
                ratio,
            } => format!("RATIO,{},{},{}", t_ms, channel, ratio),
            Record::SweepStart {
                half_period_ms,
                freq_hz,
                cycles,
                fs_hz,
            } => format!("SWEEP,{},{},{},{}", half_period_ms, freq_hz, cycles, fs_hz),
            Record::SweepEnd => "ENDSWEEP".to_string(),
            Record::Sample {
                t_ms,
                channel,
                value,
            } => match channel {
                // Sweep-schema line; the heater column is not retained.
                Some(ch) => format!("{},{},0,{}", t_ms, ch, value),
                None => format!("{},{}", t_ms, value),
            },
            Record::Header => "t_ms,addr,gas_ohm,temp_C,hum_pct,press_Pa,status".to_string(),
        }
    }
}
