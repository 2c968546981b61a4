// Feeds module entrypoint
pub mod price;      // mock price walk
pub mod router;     // feed-driven demo service
pub mod volatility; // volatility sources (mock oracle + realized EWMA)

/// One reading published by the feed task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedEvent {
    Price(f64),
    Volatility(f64),
}
