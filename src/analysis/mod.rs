pub mod lockin;
pub mod peak;
pub mod sweep;

pub use peak::{find_peak, AnalysisError, BinConvention, SpectralPeak};
pub use sweep::{SweepCollector, SweepPoint, SweepSegment};
