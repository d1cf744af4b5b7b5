// 7.0: trade record. one position/order against the operator's book. created
// Pending or Open, mutated only by price sweeps and the close path, terminal
// at Closed or Cancelled.
//
// invariant: margin_used is reserved in exactly one pool for the whole Open
// lifetime and released exactly once at close/cancel.

use crate::pricing::{notional, ALT_CONVERSION_RATE};
use crate::types::{
    CloseReason, InstrumentKind, Money, OperatorId, OrderKind, PoolKind, Price, ProductKind, Qty,
    Segment, Side, Timestamp, TradeId, TradeStatus, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// 7.1: record of lots closed early by the conversion path while the rest of
// the trade carried forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialClose {
    pub lots_closed: Decimal,
    pub qty_closed: Decimal,
    pub price: Price,
    pub realized_pnl: Money,
    pub at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub user_id: UserId,
    pub operator_id: OperatorId,
    pub segment: Segment,
    pub symbol: String,
    pub token: Option<String>,
    pub category: Option<String>,
    pub instrument: InstrumentKind,
    pub lot_size: u32,
    pub side: Side,
    pub product: ProductKind,
    pub order_kind: OrderKind,
    pub lots: Decimal,
    pub qty: Qty,
    // None while Pending; assigned at the trigger crossing
    pub entry_price: Option<Price>,
    // limit price or stop trigger level for Pending orders
    pub stated_price: Option<Price>,
    pub exit_price: Option<Price>,
    pub current_price: Option<Price>,
    pub spread: Decimal,
    pub margin_used: Money,
    pub leverage: Decimal,
    pub commission: Money,
    pub status: TradeStatus,
    pub stop_loss: Option<Price>,
    pub target: Option<Price>,
    pub book_kept: bool,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub realized_pnl: Money,
    pub unrealized_pnl: Money,
    // the operator's side of the book: negation of the user's net pnl
    pub book_pnl: Money,
    pub close_reason: Option<CloseReason>,
    pub partial_close: Option<PartialClose>,
}

impl Trade {
    pub fn pool(&self) -> PoolKind {
        self.segment.pool()
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn is_pending(&self) -> bool {
        self.status == TradeStatus::Pending
    }

    // 7.2: the pnl formula. (exit - entry) * side sign * lot-expanded qty,
    // converted to the reporting currency for alt-asset trades.
    pub fn gross_pnl(&self, exit: Price) -> Money {
        let Some(entry) = self.entry_price else {
            return Money::zero();
        };
        let raw = (exit.value() - entry.value()) * self.side.sign() * self.qty.value();
        match self.segment {
            Segment::AltAsset => Money::new(raw * ALT_CONVERSION_RATE),
            _ => Money::new(raw),
        }
    }

    pub fn mark_unrealized(&mut self, price: Price) {
        self.current_price = Some(price);
        if self.is_open() {
            self.unrealized_pnl = self.gross_pnl(price);
        }
    }

    pub fn turnover_at(&self, price: Price) -> Money {
        notional(self.segment, self.qty, price)
    }

    /// Pending-order trigger check. A limit order fills when price crosses the
    /// stated level in the order's favor; a stop order fills when price
    /// crosses the trigger adversely.
    pub fn pending_triggered(&self, ltp: Price) -> bool {
        let Some(level) = self.stated_price else {
            return false;
        };
        match (self.order_kind, self.side) {
            (OrderKind::Limit, Side::Long) => ltp <= level,
            (OrderKind::Limit, Side::Short) => ltp >= level,
            (OrderKind::Stop, Side::Long) => ltp >= level,
            (OrderKind::Stop, Side::Short) => ltp <= level,
            (OrderKind::Market, _) => false,
        }
    }

    pub fn stop_loss_hit(&self, ltp: Price) -> bool {
        match (self.stop_loss, self.side) {
            (Some(sl), Side::Long) => ltp <= sl,
            (Some(sl), Side::Short) => ltp >= sl,
            (None, _) => false,
        }
    }

    pub fn target_hit(&self, ltp: Price) -> bool {
        match (self.target, self.side) {
            (Some(t), Side::Long) => ltp >= t,
            (Some(t), Side::Short) => ltp <= t,
            (None, _) => false,
        }
    }
}
