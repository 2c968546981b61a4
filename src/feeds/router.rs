// Orchestrates the demo service: one task publishes mock feed events, one
// applies them to the pool, one reports totals.
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use crate::config::DlmmConfig;
use crate::engine::shared::SharedPool;
use crate::feeds::price::MockPriceFeed;
use crate::feeds::volatility::{EwmaVolatility, MockVolatilityFeed, VolatilitySource};
use crate::feeds::FeedEvent;

pub async fn run_service(pool: SharedPool, cfg: DlmmConfig) {
    info!(strategy = %cfg.reallocation.strategy, "starting feed-driven service");

    let (tx, mut rx) = mpsc::channel::<FeedEvent>(1024);

    // 1) feed task: a price walk plus a mock volatility oracle on a timer
    let feed_cfg = cfg.feed;
    let feed_task = tokio::spawn(async move {
        let prices = MockPriceFeed::new(
            feed_cfg.price_start,
            feed_cfg.price_step,
            feed_cfg.price_min,
            feed_cfg.price_max,
        );
        let oracle = MockVolatilityFeed { min: feed_cfg.vol_min, max: feed_cfg.vol_max };
        let mut ticks = interval(Duration::from_millis(feed_cfg.interval_ms.max(1)));
        loop {
            ticks.tick().await;
            if tx.send(FeedEvent::Price(prices.next_tick())).await.is_err() {
                break;
            }
            if tx.send(FeedEvent::Volatility(oracle.sample())).await.is_err() {
                break;
            }
        }
    });

    // 2) apply task: probe swaps priced off realized volatility, and a
    //    reallocation whenever the oracle reading spikes
    let strategy = cfg.reallocation.strategy();
    let vol_threshold = cfg.reallocation.vol_threshold;
    let probe_amount = cfg.probe.amount;
    let apply_pool = pool.clone();
    let apply_task = tokio::spawn(async move {
        let realized = EwmaVolatility::default();
        while let Some(event) = rx.recv().await {
            match event {
                FeedEvent::Price(price) => {
                    realized.update(price);
                    match apply_pool.swap(price, probe_amount, realized.sample()) {
                        Ok((outcome, _)) => {
                            info!(price, bin_id = outcome.bin_id, fee = outcome.fee, "probe swap");
                        }
                        Err(err) => warn!(price, %err, "probe swap rejected"),
                    }
                }
                FeedEvent::Volatility(vol) => {
                    if vol > vol_threshold {
                        info!(vol, threshold = vol_threshold, "volatility spike, reallocating");
                        if let Err(err) = apply_pool.reallocate(strategy.as_ref(), vol) {
                            warn!(%err, "reallocation failed");
                        }
                    }
                }
            }
        }
    });

    // 3) summary task
    let summary_pool = pool.clone();
    let summary_task = tokio::spawn(async move {
        let mut ticks = interval(Duration::from_secs(1));
        loop {
            ticks.tick().await;
            let (total, lps) = {
                let pool = summary_pool.read();
                (pool.total_liquidity(), pool.lps().count())
            };
            info!(total_liquidity = total, lps, "pool summary");
        }
    });

    tokio::select! {
        _ = feed_task => info!("feed task completed"),
        _ = apply_task => info!("apply task completed"),
        _ = summary_task => info!("summary task completed"),
    }
}
