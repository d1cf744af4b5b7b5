// bbook-core: B-book brokerage order and margin engine.
// wallet-consistency-first architecture: funds are reserved before a trade
// exists and released exactly once when it dies.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Money, Price, Qty, Segment, Side
//   2.x  hierarchy.rs: operator tree, leaf-to-root chain resolution
//   3.x  settings.rs: tri-state overrides, segment permissions, margin tables,
//        leverage menus
//   4.x  pricing.rs: fill prices, margin precedence ladder, exit charges
//   5.x  commission.rs: brokerage computation, ancestor caps, hierarchy
//        distribution
//   6.x  wallet.rs: the three segregated pools per user
//   7.x  trade.rs: trade record, P&L, trigger checks
//   8.x  ledger.rs: append-only audit trail
//   9.x  oracle.rs: market-hours and lot-size collaborator seams
//   10.x user.rs: end-user record
//   11.x engine/: the engine: orders, closes, sweeps, queries

// core domain modules
pub mod commission;
pub mod hierarchy;
pub mod pricing;
pub mod settings;
pub mod trade;
pub mod types;
pub mod wallet;

// engine and its collaborators
pub mod engine;
pub mod ledger;
pub mod oracle;
pub mod user;

// re exports for convenience
pub use commission::*;
pub use engine::*;
pub use hierarchy::*;
pub use ledger::*;
pub use oracle::*;
pub use pricing::*;
pub use settings::*;
pub use trade::*;
pub use types::*;
pub use user::*;
pub use wallet::*;
