// Pool engine entrypoint
pub mod fees;     // fee models (volatility hook, flat, closures)
pub mod pool;     // DlmmPool core operations
pub mod shared;   // thread-safe pool handle
pub mod strategy; // reallocation strategies
pub mod types;    // bins, LP accounts, events, errors
