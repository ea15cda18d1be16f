/// Sample Window
///
/// Fixed-capacity ring buffer of heartbeat round-trip times, in
/// milliseconds, backing the Phi-style suspicion score in
/// `liveness::LivenessMonitor`. See SPEC_FULL.md §4.2.
use std::collections::VecDeque;

const WINDOW_CAPACITY: usize = 100;
/// Floor applied to the estimated standard deviation so a perfectly quiet,
/// zero-jitter peer doesn't produce a divide-by-zero in the phi formula.
const MIN_STDDEV_MILLIS: f64 = 1.0;

#[derive(Debug, Default)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    /// Running aggregate over every sample ever observed, independent of
    /// the bounded window, kept for diagnostic logging.
    total_count: u64,
    total_sum: f64,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_CAPACITY),
            total_count: 0,
            total_sum: 0.0,
        }
    }

    /// Record one round-trip sample. `duration` is converted to
    /// milliseconds (the window's native unit).
    pub fn record(&mut self, duration: std::time::Duration) {
        let millis = duration.as_secs_f64() * 1000.0;
        if self.samples.len() == WINDOW_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(millis);
        self.total_count += 1;
        self.total_sum += millis;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn stddev(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / self.samples.len() as f64;
        variance.sqrt()
    }

    /// All-time mean, independent of the bounded window's eviction.
    pub fn total_mean(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.total_sum / self.total_count as f64
        }
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// `P(rtt >= x)` under a normal approximation of the window's empirical
    /// distribution, per the classic phi-accrual failure detector. Returns
    /// `1.0` when there isn't enough data yet to say otherwise (a silent
    /// peer with no heartbeat history is not suspicious on that basis
    /// alone — the status state machine's timeout handles that case).
    pub fn p_at_least(&self, x_millis: f64) -> f64 {
        if self.samples.is_empty() {
            return 1.0;
        }
        let mean = self.mean();
        let stddev = self.stddev().max(MIN_STDDEV_MILLIS);
        let z = (x_millis - mean) / (stddev * std::f64::consts::SQRT_2);
        0.5 * erfc(z)
    }

    /// `phi = -log10(p)`, `+inf` when `p == 0`.
    pub fn phi(&self, x_millis: f64) -> f64 {
        let p = self.p_at_least(x_millis);
        if p <= 0.0 {
            f64::INFINITY
        } else {
            -p.log10()
        }
    }
}

/// Complementary error function, Abramowitz & Stegun 7.1.26. Accurate to
/// ~1.5e-7, which is more than enough precision for a suspicion score that
/// is itself a heuristic.
fn erfc(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    1.0 - sign * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_window_has_zero_stats() {
        let window = SampleWindow::new();
        assert_eq!(window.mean(), 0.0);
        assert_eq!(window.stddev(), 0.0);
        assert!(window.is_empty());
    }

    #[test]
    fn evicts_oldest_sample_past_capacity() {
        let mut window = SampleWindow::new();
        for i in 0..150 {
            window.record(Duration::from_millis(i));
        }
        assert_eq!(window.len(), WINDOW_CAPACITY);
        assert_eq!(window.total_count(), 150);
    }

    #[test]
    fn mean_and_stddev_match_hand_computation() {
        let mut window = SampleWindow::new();
        for ms in [10, 20, 30] {
            window.record(Duration::from_millis(ms));
        }
        assert!((window.mean() - 20.0).abs() < 1e-9);
        // population stddev of [10,20,30] = sqrt(66.66..) ~ 8.16
        assert!((window.stddev() - 8.1649658).abs() < 1e-3);
    }

    #[test]
    fn phi_is_monotonic_in_elapsed_time() {
        let mut window = SampleWindow::new();
        for _ in 0..20 {
            window.record(Duration::from_millis(50));
        }
        let phi_10 = window.phi(10.0);
        let phi_100 = window.phi(100.0);
        let phi_1000 = window.phi(1000.0);
        assert!(phi_10 <= phi_100);
        assert!(phi_100 <= phi_1000);
    }

    #[test]
    fn phi_is_infinite_when_probability_collapses_to_zero() {
        let mut window = SampleWindow::new();
        for _ in 0..20 {
            window.record(Duration::from_millis(10));
        }
        assert!(window.phi(1_000_000.0).is_infinite());
    }
}
