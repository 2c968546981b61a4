use parking_lot::Mutex;
use rand::Rng;

/// A volatility reading on demand. Implementations may be mock feeds or
/// estimators fed from price ticks.
pub trait VolatilitySource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Uniform random volatility in `[min, max)`. Stands in for a live oracle
/// until real connectivity exists.
#[derive(Debug, Clone, Copy)]
pub struct MockVolatilityFeed {
    pub min: f64,
    pub max: f64,
}

impl Default for MockVolatilityFeed {
    fn default() -> Self {
        Self { min: 0.01, max: 0.2 }
    }
}

impl VolatilitySource for MockVolatilityFeed {
    fn sample(&self) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..self.max)
    }
}

/// Realized volatility from price ticks: an exponentially weighted moving
/// average of squared log returns. `sample()` reports the instantaneous
/// estimate, no annualization applied.
pub struct EwmaVolatility {
    lambda: f64,
    state: Mutex<EwmaState>,
}

#[derive(Default)]
struct EwmaState {
    last_price: Option<f64>,
    variance: f64,
}

impl EwmaVolatility {
    /// `lambda` is the decay weight on the previous variance; the
    /// RiskMetrics convention uses 0.94.
    pub fn new(lambda: f64) -> Self {
        Self { lambda: lambda.clamp(0.0, 1.0), state: Mutex::new(EwmaState::default()) }
    }

    /// Feed one price tick. Non-positive or non-finite prices are dropped,
    /// the log return is undefined for them.
    pub fn update(&self, price: f64) {
        if !price.is_finite() || price <= 0.0 {
            return;
        }
        let mut state = self.state.lock();
        if let Some(last) = state.last_price {
            let r = (price / last).ln();
            state.variance = self.lambda * state.variance + (1.0 - self.lambda) * r * r;
        }
        state.last_price = Some(price);
    }
}

impl Default for EwmaVolatility {
    fn default() -> Self {
        Self::new(0.94)
    }
}

impl VolatilitySource for EwmaVolatility {
    fn sample(&self) -> f64 {
        self.state.lock().variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_feed_stays_within_its_band() {
        let feed = MockVolatilityFeed::default();
        for _ in 0..200 {
            let v = feed.sample();
            assert!((0.01..0.2).contains(&v));
        }
    }

    #[test]
    fn degenerate_band_yields_the_lower_bound() {
        let feed = MockVolatilityFeed { min: 0.05, max: 0.05 };
        assert_eq!(feed.sample(), 0.05);
    }

    #[test]
    fn constant_prices_mean_zero_volatility() {
        let est = EwmaVolatility::default();
        for _ in 0..50 {
            est.update(100.0);
        }
        assert_eq!(est.sample(), 0.0);
    }

    #[test]
    fn oscillating_prices_raise_the_estimate() {
        let est = EwmaVolatility::default();
        for i in 0..50 {
            est.update(if i % 2 == 0 { 100.0 } else { 105.0 });
        }
        assert!(est.sample() > 0.01);
    }

    #[test]
    fn wider_swings_estimate_higher() {
        let calm = EwmaVolatility::default();
        let wild = EwmaVolatility::default();
        for i in 0..50 {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            calm.update(100.0 + sign);
            wild.update(100.0 + sign * 10.0);
        }
        assert!(wild.sample() > calm.sample());
    }

    #[test]
    fn bad_ticks_are_ignored() {
        let est = EwmaVolatility::default();
        est.update(100.0);
        est.update(f64::NAN);
        est.update(-5.0);
        est.update(0.0);
        est.update(100.0);
        assert_eq!(est.sample(), 0.0);
    }
}
