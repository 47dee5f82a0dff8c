use crate::config::{FftEncoding, SampleSchema};

use super::error::Rejection;
use super::record::{EnvReading, Record};

/// Column-name literals that open a banner line: the live-stream forms plus
/// the persisted-row headers seen when replaying a recorded CSV.
const HEADER_TOKENS: &[&str] = &["t_ms", "header", "row_type", "type"];

/// The slice of the deployment configuration the parser needs.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtocolConfig {
    pub fft_encoding: FftEncoding,
    pub sample_schema: SampleSchema,
}

/// Parses one protocol line into a typed [`Record`].
///
/// Pure and side-effect free. Every failure is a [`Rejection`], never a
/// process-ending fault.
pub fn parse_line(line: &str, cfg: &ProtocolConfig) -> Result<Record, Rejection> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Rejection::Empty);
    }
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let tag = fields[0];
    if HEADER_TOKENS.contains(&tag) {
        return Ok(Record::Header);
    }
    match tag {
        "FFT" => parse_fft(&fields, cfg.fft_encoding),
        "RATIO" => parse_ratio(&fields),
        "SWEEP" => parse_sweep(&fields),
        // Trailing fields (the half period in the original firmware) carry no
        // information the consumer uses.
        "ENDSWEEP" => Ok(Record::SweepEnd),
        _ if tag.parse::<f64>().is_ok() => parse_sample(&fields, cfg.sample_schema),
        _ => Err(Rejection::UnknownTag(tag.to_string())),
    }
}

fn parse_fft(fields: &[&str], encoding: FftEncoding) -> Result<Record, Rejection> {
    match encoding {
        FftEncoding::Addressed => {
            // FFT,t_ms,addr,Fs,mag0,...  (at least two magnitude bins)
            if fields.len() < 6 {
                return Err(Rejection::FieldCount {
                    tag: "FFT",
                    expected: "at least 6",
                    got: fields.len(),
                });
            }
            Ok(Record::Fft {
                t_ms: Some(num("t_ms", fields[1])?),
                channel: Some(fields[2].to_string()),
                cycle: None,
                fs_hz: num("Fs", fields[3])?,
                magnitudes: magnitudes(&fields[4..])?,
            })
        }
        FftEncoding::CycleIndexed => {
            // FFT,cycle_id,Fs,mag1,...
            if fields.len() < 4 {
                return Err(Rejection::FieldCount {
                    tag: "FFT",
                    expected: "at least 4",
                    got: fields.len(),
                });
            }
            Ok(Record::Fft {
                t_ms: None,
                channel: None,
                cycle: Some(int("cycle_id", fields[1])?),
                fs_hz: num("Fs", fields[2])?,
                magnitudes: magnitudes(&fields[3..])?,
            })
        }
    }
}

fn parse_ratio(fields: &[&str]) -> Result<Record, Rejection> {
    if fields.len() != 4 {
        return Err(Rejection::FieldCount {
            tag: "RATIO",
            expected: "exactly 4",
            got: fields.len(),
        });
    }
    Ok(Record::Ratio {
        t_ms: num("t_ms", fields[1])?,
        channel: fields[2].to_string(),
        ratio: num("ratio", fields[3])?,
    })
}

fn parse_sweep(fields: &[&str]) -> Result<Record, Rejection> {
    if fields.len() != 5 {
        return Err(Rejection::FieldCount {
            tag: "SWEEP",
            expected: "exactly 5",
            got: fields.len(),
        });
    }
    Ok(Record::SweepStart {
        half_period_ms: int("half_ms", fields[1])?,
        freq_hz: num("freq_hz", fields[2])?,
        cycles: int("cycles", fields[3])?,
        fs_hz: num("Fs", fields[4])?,
    })
}

fn parse_sample(fields: &[&str], schema: SampleSchema) -> Result<Record, Rejection> {
    match schema {
        // t_ms,value
        SampleSchema::Minimal => {
            if fields.len() < 2 {
                return Err(Rejection::FieldCount {
                    tag: "sample",
                    expected: "at least 2",
                    got: fields.len(),
                });
            }
            Ok(Record::Sample {
                t_ms: num("t_ms", fields[0])?,
                channel: None,
                value: num("value", fields[1])?,
            })
        }
        // t_ms,addr,heater_C,gas_ohm — the heater column is not retained.
        SampleSchema::Sweep => {
            if fields.len() != 4 {
                return Err(Rejection::FieldCount {
                    tag: "sample",
                    expected: "exactly 4",
                    got: fields.len(),
                });
            }
            Ok(Record::Sample {
                t_ms: num("t_ms", fields[0])?,
                channel: Some(fields[1].to_string()),
                value: num("gas_ohm", fields[3])?,
            })
        }
        // t_ms,addr,gas_ohm,temp_C,hum_pct,press_Pa,status
        SampleSchema::Environmental => {
            if fields.len() < 7 {
                return Err(Rejection::FieldCount {
                    tag: "sample",
                    expected: "at least 7",
                    got: fields.len(),
                });
            }
            Ok(Record::Data {
                t_ms: num("t_ms", fields[0])?,
                channel: fields[1].to_string(),
                reading: EnvReading {
                    gas_ohm: num("gas_ohm", fields[2])?,
                    temp_c: num("temp_C", fields[3])?,
                    hum_pct: num("hum_pct", fields[4])?,
                    press_pa: num("press_Pa", fields[5])?,
                    status: fields[6].to_string(),
                },
            })
        }
    }
}

fn num(field: &'static str, raw: &str) -> Result<f64, Rejection> {
    raw.parse().map_err(|_| Rejection::Numeric {
        field,
        value: raw.to_string(),
    })
}

fn int(field: &'static str, raw: &str) -> Result<u32, Rejection> {
    raw.parse().map_err(|_| Rejection::Numeric {
        field,
        value: raw.to_string(),
    })
}

fn magnitudes(fields: &[&str]) -> Result<Vec<f64>, Rejection> {
    fields.iter().map(|raw| num("mag", raw)).collect()
}
