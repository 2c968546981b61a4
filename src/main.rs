use std::io::{self, Write};

use clap::{Parser, Subcommand};

use dlmm_rs::config::DlmmConfig;
use dlmm_rs::engine::fees::VolatilityFee;
use dlmm_rs::engine::pool::DlmmPool;
use dlmm_rs::engine::shared::SharedPool;
use dlmm_rs::feeds::router;
use dlmm_rs::feeds::volatility::{MockVolatilityFeed, VolatilitySource};
use dlmm_rs::persist::sled::SledStore;
use dlmm_rs::persist::{restore_then_replay, snapshot, SnapshotStore, WalOp, WalStore};
use dlmm_rs::telemetry;

#[derive(Parser)]
#[command(name = "dlmm-rs", version, about = "Bin-based DLMM liquidity engine")]
struct Cli {
    /// Tracing filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive pool console backed by snapshot + WAL persistence.
    Repl,
    /// Feed-driven demo: mock ticks, probe swaps, automatic reallocation.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log);
    telemetry::init_metrics();

    let cfg = dlmm_rs::config::load()?;
    match cli.command {
        Command::Repl => repl(cfg).await,
        Command::Run => {
            let pool = build_pool(&cfg)?;
            router::run_service(SharedPool::new(pool), cfg).await;
            Ok(())
        }
    }
}

fn build_pool(cfg: &DlmmConfig) -> anyhow::Result<DlmmPool> {
    Ok(DlmmPool::new(cfg.bins.build()?, cfg.pool.params(), Box::new(VolatilityFee))?)
}

async fn repl(cfg: DlmmConfig) -> anyhow::Result<()> {
    let mut store = SledStore::open(&cfg.persistence.data_dir)?;
    let mut pool = build_pool(&cfg)?;

    let outcome = restore_then_replay(&mut pool, &store, &store).await?;
    if outcome.is_empty() {
        println!("No persisted state, starting from the configured ladder");
    } else {
        println!(
            "Restored pool (snapshot {}), replayed {} WAL operations",
            if outcome.from_snapshot { "applied" } else { "absent" },
            outcome.replayed
        );
    }

    let vol_feed = MockVolatilityFeed { min: cfg.feed.vol_min, max: cfg.feed.vol_max };

    loop {
        print!("\ndlmm> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break; // EOF
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        match parts.as_slice() {
            ["help"] | ["h"] => print_help(),
            ["add", lp, bin, amount] => {
                match (bin.parse::<u32>(), amount.parse::<f64>()) {
                    (Ok(bin_id), Ok(amount)) => match pool.add_liquidity(lp, bin_id, amount) {
                        Ok(_) => {
                            store
                                .append_op(&WalOp::LiquidityAdded {
                                    lp: lp.to_string(),
                                    bin_id,
                                    amount,
                                })
                                .await?;
                            println!("Minted {amount} shares in bin {bin_id} for {lp}");
                        }
                        Err(err) => println!("Error: {err}"),
                    },
                    _ => println!("Usage: add <lp> <bin_id> <amount>"),
                }
            }
            ["remove", lp, bin, amount] => {
                match (bin.parse::<u32>(), amount.parse::<f64>()) {
                    (Ok(bin_id), Ok(amount)) => match pool.remove_liquidity(lp, bin_id, amount) {
                        Ok(_) => {
                            store
                                .append_op(&WalOp::LiquidityRemoved {
                                    lp: lp.to_string(),
                                    bin_id,
                                    amount,
                                })
                                .await?;
                            println!("Burned {amount} shares in bin {bin_id} for {lp}");
                        }
                        Err(err) => println!("Error: {err}"),
                    },
                    _ => println!("Usage: remove <lp> <bin_id> <amount>"),
                }
            }
            ["swap", price, amount] => {
                match (price.parse::<f64>(), amount.parse::<f64>()) {
                    (Ok(price), Ok(amount)) => {
                        let volatility = vol_feed.sample();
                        match pool.swap(price, amount, volatility) {
                            Ok((outcome, _)) => {
                                store
                                    .append_op(&WalOp::SwapExecuted {
                                        price,
                                        amount,
                                        fee: outcome.fee,
                                    })
                                    .await?;
                                println!(
                                    "Filled {} in bin {} (volatility {:.4}): fee {:.6}, received {:.6}",
                                    outcome.filled,
                                    outcome.bin_id,
                                    volatility,
                                    outcome.fee,
                                    outcome.received
                                );
                            }
                            Err(err) => println!("Error: {err}"),
                        }
                    }
                    _ => println!("Usage: swap <price> <amount>"),
                }
            }
            ["summary", lp] => match pool.lp_summary(lp) {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(err) => println!("Error: {err}"),
            },
            ["top"] => print_pool(&pool),
            ["rebalance"] => {
                let strategy = cfg.reallocation.strategy();
                let volatility = vol_feed.sample();
                // TODO: record shifts in the WAL so a rebalance survives a
                // restart without an explicit snapshot
                match pool.reallocate(strategy.as_ref(), volatility) {
                    Ok(events) => {
                        println!("Applied {} shifts at volatility {volatility:.4}", events.len());
                        print_pool(&pool);
                    }
                    Err(err) => println!("Error: {err}"),
                }
            }
            ["snapshot"] => {
                let snap = snapshot::from_pool(&pool);
                match store.save_snapshot(&snap).await {
                    Ok(()) => {
                        println!("Saved snapshot: {} bins, {} LPs", snap.bins.len(), snap.lps.len())
                    }
                    Err(err) => println!("Error: {err}"),
                }
            }
            ["restore"] => {
                let mut fresh = build_pool(&cfg)?;
                match restore_then_replay(&mut fresh, &store, &store).await {
                    Ok(outcome) if outcome.is_empty() => {
                        println!("Nothing persisted yet, nothing to restore")
                    }
                    Ok(outcome) => {
                        pool = fresh;
                        println!("Restored latest state, replayed {} WAL operations", outcome.replayed);
                        print_pool(&pool);
                    }
                    Err(err) => println!("Error: {err}"),
                }
            }
            ["quit"] | ["q"] | ["exit"] => break,
            [] => continue,
            _ => println!("Unknown command. Type 'help' for the command list."),
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_pool(pool: &DlmmPool) {
    println!("\n=== Pool State ===");
    for bin in pool.bins() {
        println!(
            "bin {:>3}  [{:>8.3}, {:>8.3})  liquidity {:>14.2}  holders {}",
            bin.id,
            bin.lower,
            bin.upper,
            bin.liquidity,
            bin.lp_shares.len()
        );
    }
    println!("total liquidity: {:.2}", pool.total_liquidity());
    println!("==================");
}

fn print_help() {
    println!("Available commands:");
    println!("  add <lp> <bin_id> <amount>     - Mint shares for an LP in a bin");
    println!("  remove <lp> <bin_id> <amount>  - Burn shares and withdraw liquidity");
    println!("  swap <price> <amount>          - Swap against the covering bin");
    println!("  summary <lp>                   - LP position and rewards report");
    println!("  top                            - Pool overview");
    println!("  rebalance                      - Run the configured reallocation strategy");
    println!("  snapshot                       - Persist the current pool state");
    println!("  restore                        - Reload the latest snapshot + WAL");
    println!("  quit, q                        - Exit");
}
