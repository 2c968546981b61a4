use parking_lot::Mutex;
use rand::Rng;

/// Bounded random walk over a price range. Stands in for live tick data in
/// the demo service.
pub struct MockPriceFeed {
    state: Mutex<f64>,
    step: f64,
    min: f64,
    max: f64,
}

impl MockPriceFeed {
    pub fn new(start: f64, step: f64, min: f64, max: f64) -> Self {
        Self { state: Mutex::new(start.clamp(min, max)), step, min, max }
    }

    /// Advance the walk by one tick and return the new price.
    pub fn next_tick(&self) -> f64 {
        let mut price = self.state.lock();
        let delta = rand::thread_rng().gen_range(-self.step..=self.step);
        *price = (*price + delta).clamp(self.min, self.max);
        *price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_never_leaves_its_bounds() {
        let feed = MockPriceFeed::new(1.5, 0.25, 0.05, 2.95);
        for _ in 0..1_000 {
            let p = feed.next_tick();
            assert!((0.05..=2.95).contains(&p));
        }
    }

    #[test]
    fn start_price_is_clamped_into_range() {
        let feed = MockPriceFeed::new(10.0, 0.1, 0.0, 3.0);
        assert!(feed.next_tick() <= 3.0);
    }
}
