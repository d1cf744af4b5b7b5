// 8.0: append-only ledger. every balance-affecting event lands here with the
// resulting balance snapshot. written for audit and reconciliation by the
// surrounding service layer; the engine itself never reads entries back.

use crate::types::{Money, OperatorId, Timestamp, TradeId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOwner {
    User(UserId),
    Operator(OperatorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerReason {
    Deposit,
    MarginBlock,
    MarginRelease,
    MarginAdjust,
    TradePnl,
    Liquidation,
    Conversion,
    Commission,
    CommissionShare,
    BookPnl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub owner: LedgerOwner,
    pub trade: Option<TradeId>,
    pub amount: Money,
    pub reason: LedgerReason,
    pub balance_after: Money,
    pub at: Timestamp,
}

/// Durable audit sink. Append-only by contract: implementations must never
/// mutate or drop accepted entries.
pub trait LedgerSink {
    fn append(&mut self, entry: LedgerEntry);
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Vec<LedgerEntry>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
}

impl LedgerSink for MemoryLedger {
    fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }
}
