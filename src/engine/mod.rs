// 11.0: the order and margin engine. deterministic and single-threaded: all
// state lives in memory, time is a caller-driven logical clock, and every
// operation either completes or leaves no trace.

mod close;
mod config;
mod core;
mod jobs;
mod orders;
mod queries;
mod results;

pub use config::EngineConfig;
pub use core::Engine;
pub use orders::{OrderSize, OrderSpec};
pub use results::{
    CloseReceipt, ConversionSweepResult, EngineError, LiquidationRecord, MarginCorrection,
    OrderOutcome, PlacementReceipt, PoolSummary, PriceSweepResult, WalletSummary,
};
