// 11.0.2: result types and errors for engine operations.

use crate::settings::SettingsError;
use crate::trade::Trade;
use crate::types::{
    Money, PoolKind, Segment, TradeId, TradeStatus, UserId,
};
use crate::wallet::WalletError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Returned when an order opens or parks a new trade.
#[derive(Debug, Clone)]
pub struct PlacementReceipt {
    pub trade: Trade,
    pub margin_blocked: Money,
    pub commission: Money,
    pub available_after: Money,
}

/// Returned by the close path in all its guises.
#[derive(Debug, Clone)]
pub struct CloseReceipt {
    pub trade: Trade,
    pub net_pnl: Money,
    pub charges: Money,
}

#[derive(Debug, Clone)]
pub enum OrderOutcome {
    /// Market order filled and the trade is live.
    Opened(PlacementReceipt),
    /// Limit/stop order parked, funds reserved.
    Parked(PlacementReceipt),
    /// Market order netted an existing opposite position instead of opening.
    Netted(CloseReceipt),
}

#[derive(Debug, Clone, Default)]
pub struct PriceSweepResult {
    pub triggered: Vec<TradeId>,
    pub closed: Vec<TradeId>,
}

#[derive(Debug, Clone)]
pub struct LiquidationRecord {
    pub user_id: UserId,
    pub trade_id: TradeId,
    pub realized_pnl: Money,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionSweepResult {
    pub converted: Vec<TradeId>,
    pub partially_converted: Vec<TradeId>,
    pub closed: Vec<TradeId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolSummary {
    pub balance: Money,
    pub used_margin: Money,
    pub available: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub trading: PoolSummary,
    pub alt: PoolSummary,
    pub commodity: PoolSummary,
    pub unrealized_pnl: Money,
    pub open_trades: usize,
}

#[derive(Debug, Clone)]
pub struct MarginCorrection {
    pub pool: PoolKind,
    pub delta: Money,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("user {0:?} not found")]
    UserNotFound(UserId),

    #[error("user {0:?} is deactivated")]
    UserInactive(UserId),

    #[error("trade {0:?} not found")]
    TradeNotFound(TradeId),

    #[error("market closed for {segment:?}: {reason}")]
    MarketClosed { segment: Segment, reason: String },

    #[error("segment {0:?} is not enabled for this user")]
    SegmentDisabled(Segment),

    #[error("instrument {0} is blocked")]
    InstrumentBlocked(String),

    #[error("lot bounds violated: requested {requested} lots, allowed {min}..={max}")]
    LotBounds {
        requested: Decimal,
        min: u32,
        max: u32,
    },

    #[error("fractional quantity not permitted in {0:?}")]
    FractionalQuantity(Segment),

    #[error("no lot size known for {0}")]
    LotSizeUnavailable(String),

    #[error("no tradable price for {0}")]
    PricingUnavailable(String),

    #[error("trade {trade:?} does not belong to user {user:?}")]
    NotOrderOwner { trade: TradeId, user: UserId },

    #[error("trade {trade:?} is {status:?}, expected {expected:?}")]
    InvalidState {
        trade: TradeId,
        status: TradeStatus,
        expected: TradeStatus,
    },

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
