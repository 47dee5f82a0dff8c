use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("spectrum is empty or contains no finite magnitude")]
    NoFiniteBins,
}

/// Mapping from spectral bin index to physical frequency.
///
/// The two firmware variants disagree: the address-qualified FFT stream prints
/// bins 0..K-1 of an N = 2(K-1)-point transform, while the cycle-indexed
/// stream prints bins 1..K of an M = 2K-point transform. The convention is
/// part of the deployment configuration and never inferred from the data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinConvention {
    /// Bins 0..K-1 including DC; transform length 2(K-1).
    #[default]
    DcAnchored,
    /// Bins 1..K, DC dropped by the producer; transform length 2K.
    FirstHarmonic,
}

impl BinConvention {
    /// Physical frequency of bin `index` within a `bins`-long spectrum.
    pub fn frequency(self, index: usize, bins: usize, fs_hz: f64) -> f64 {
        match self {
            BinConvention::DcAnchored => {
                let n = 2 * bins.saturating_sub(1).max(1);
                index as f64 * fs_hz / n as f64
            }
            BinConvention::FirstHarmonic => {
                let m = 2 * bins;
                (index + 1) as f64 * fs_hz / m as f64
            }
        }
    }
}

/// Location of the strongest spectral bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralPeak {
    pub freq_hz: f64,
    pub magnitude: f64,
}

/// Finds the maximum finite magnitude and maps its bin to a frequency.
pub fn find_peak(
    magnitudes: &[f64],
    fs_hz: f64,
    convention: BinConvention,
) -> Result<SpectralPeak, AnalysisError> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &mag) in magnitudes.iter().enumerate() {
        if !mag.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, current)| mag > current) {
            best = Some((index, mag));
        }
    }
    let (index, magnitude) = best.ok_or(AnalysisError::NoFiniteBins)?;
    Ok(SpectralPeak {
        freq_hz: convention.frequency(index, magnitudes.len(), fs_hz),
        magnitude,
    })
}
