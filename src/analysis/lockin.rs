/// Head of each segment discarded before demodulation, in seconds.
pub const SETTLE_SECS: f64 = 1.0;
/// Minimum samples required after settling for a usable estimate.
pub const MIN_SAMPLES: usize = 20;

/// Recovers the response amplitude at `freq_hz` from an ascending
/// (t_ms, value) series by quadrature correlation.
///
/// The series mean is removed first, then both quadratures are correlated and
/// combined, so the estimate does not depend on the drive phase. Assumes a
/// sinusoidal (or fundamental-harmonic) drive at a known frequency.
///
/// Returns `None` when fewer than [`MIN_SAMPLES`] samples survive the settling
/// trim; callers treat that as an omitted frequency point, not an error.
pub fn demodulate(series: &[(f64, f64)], freq_hz: f64) -> Option<f64> {
    if series.len() < MIN_SAMPLES {
        return None;
    }
    let t0_s = series[0].0 / 1000.0;
    let settled: Vec<(f64, f64)> = series
        .iter()
        .map(|&(t_ms, x)| (t_ms / 1000.0, x))
        .filter(|&(t_s, _)| t_s > t0_s + SETTLE_SECS)
        .collect();
    if settled.len() < MIN_SAMPLES {
        return None;
    }

    let origin = settled[0].0;
    let n = settled.len() as f64;
    let mean = settled.iter().map(|&(_, x)| x).sum::<f64>() / n;
    let w = 2.0 * std::f64::consts::PI * freq_hz;

    let mut s_acc = 0.0;
    let mut c_acc = 0.0;
    for &(t_s, x) in &settled {
        let t = t_s - origin;
        let x = x - mean;
        s_acc += x * (w * t).sin();
        c_acc += x * (w * t).cos();
    }
    let a_s = 2.0 * s_acc / n;
    let a_c = 2.0 * c_acc / n;
    Some((a_s * a_s + a_c * a_c).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sine_series(amp: f64, freq_hz: f64, phase: f64, ts_ms: f64, n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let t_ms = i as f64 * ts_ms;
                let t_s = t_ms / 1000.0;
                (t_ms, amp * (2.0 * std::f64::consts::PI * freq_hz * t_s + phase).sin())
            })
            .collect()
    }

    #[test]
    fn recovers_clean_sine_amplitude_within_one_percent() {
        // 6 s at 200 Hz; ~5 s (about 25 cycles) survive the settling trim.
        let series = sine_series(2.5, 5.0, 0.0, 5.0, 1201);
        let amp = demodulate(&series, 5.0).unwrap();
        assert!((amp - 2.5).abs() / 2.5 < 0.01, "amp = {amp}");
    }

    #[test]
    fn is_insensitive_to_drive_phase() {
        let a = demodulate(&sine_series(1.0, 5.0, 0.0, 5.0, 1201), 5.0).unwrap();
        let b = demodulate(&sine_series(1.0, 5.0, 1.3, 5.0, 1201), 5.0).unwrap();
        assert!((a - b).abs() < 0.02, "a = {a}, b = {b}");
    }

    #[test]
    fn uncorrelated_noise_demodulates_toward_zero() {
        let mut rng = StdRng::seed_from_u64(42);
        let series: Vec<(f64, f64)> = (0..20_000)
            .map(|i| (i as f64 * 5.0, rng.gen_range(-1.0..1.0)))
            .collect();
        let amp = demodulate(&series, 7.0).unwrap();
        assert!(amp < 0.05, "amp = {amp}");
    }

    #[test]
    fn short_series_is_omitted() {
        let series = sine_series(1.0, 5.0, 0.0, 5.0, 10);
        assert!(demodulate(&series, 5.0).is_none());
    }

    #[test]
    fn settling_trim_can_leave_too_little() {
        // 30 samples, but all within the first second.
        let series = sine_series(1.0, 5.0, 0.0, 10.0, 30);
        assert!(demodulate(&series, 5.0).is_none());
    }

    #[test]
    fn settling_trim_drops_the_first_second() {
        // A step that decays within the first second must not leak into the
        // estimate: the post-settling tail is a pure sine.
        let mut series = sine_series(1.0, 5.0, 0.0, 5.0, 1201);
        for (t_ms, x) in series.iter_mut() {
            if *t_ms < 800.0 {
                *x += 50.0;
            }
        }
        let amp = demodulate(&series, 5.0).unwrap();
        assert!((amp - 1.0).abs() < 0.02, "amp = {amp}");
    }
}
