// 11.2: order placement. one pass per order: resolve settings, validate
// against the snapshot, price the fill, compute margin and commission, reserve
// funds, persist the trade. any failure before the wallet write leaves no
// state behind.

use super::core::Engine;
use super::results::{EngineError, OrderOutcome, PlacementReceipt};
use crate::commission::{apply_caps, compute_commission};
use crate::ledger::{LedgerOwner, LedgerReason};
use crate::pricing::{self, entry_fill_price, required_margin, MarginInputs, MarginOutcome};
use crate::settings::{self, base_symbol, SettingsError};
use crate::trade::Trade;
use crate::types::{
    CloseReason, InstrumentKind, Money, OrderKind, PoolKind, Price, ProductKind, Qty, Segment,
    Side, TradeStatus, TwoSidedQuote, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderSize {
    /// Whole lots; the exchange lot size expands this to units.
    Lots(Decimal),
    /// Raw units; must divide evenly by the lot size outside the alt pool.
    Quantity(Decimal),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSpec {
    pub symbol: String,
    pub token: Option<String>,
    pub category: Option<String>,
    pub segment: Segment,
    pub instrument: InstrumentKind,
    pub side: Side,
    pub product: ProductKind,
    pub kind: OrderKind,
    pub size: OrderSize,
    pub quote: Option<TwoSidedQuote>,
    /// Limit price or stop trigger; ignored for market orders.
    pub stated_price: Option<Price>,
    pub requested_leverage: Decimal,
    pub stop_loss: Option<Price>,
    pub target: Option<Price>,
    pub book_kept: bool,
}

impl Engine {
    pub fn place_order(
        &mut self,
        user_id: UserId,
        spec: OrderSpec,
    ) -> Result<OrderOutcome, EngineError> {
        let user = self.require_user(user_id)?;
        if !user.active {
            return Err(EngineError::UserInactive(user_id));
        }
        let chain = self.operators.chain_for(user.operator_id);
        let resolved = settings::resolve(
            user_id,
            &user.settings,
            &chain,
            spec.segment,
            &spec.symbol,
            spec.category.as_deref(),
        )?;
        let direct = chain
            .direct()
            .ok_or(SettingsError::OperatorMissing(user_id))?;

        let status = self.oracle.is_open(spec.segment);
        if !status.open && !direct.policy.allow_after_hours {
            return Err(EngineError::MarketClosed {
                segment: spec.segment,
                reason: status.reason.unwrap_or_else(|| "outside market hours".into()),
            });
        }
        if !resolved.permission.trading_enabled {
            return Err(EngineError::SegmentDisabled(spec.segment));
        }
        if resolved.instrument_blocked(&spec.symbol) {
            return Err(EngineError::InstrumentBlocked(spec.symbol.clone()));
        }

        // size normalization: everything downstream works in lots + expanded qty
        let lookup = spec.token.as_deref().unwrap_or(&spec.symbol);
        let lot_size = self
            .catalog
            .lot_size(lookup, spec.segment)
            .ok_or_else(|| EngineError::LotSizeUnavailable(spec.symbol.clone()))?;
        let lot_size_dec = Decimal::from(lot_size);
        let lots = match spec.size {
            OrderSize::Lots(n) => n,
            OrderSize::Quantity(q) => q / lot_size_dec,
        };
        if spec.segment != Segment::AltAsset && !lots.fract().is_zero() {
            return Err(EngineError::FractionalQuantity(spec.segment));
        }
        let (min, max) = (resolved.min_lots(), resolved.max_lots());
        let bounds_err = EngineError::LotBounds {
            requested: lots,
            min,
            max,
        };
        if lots < Decimal::from(min) || lots > Decimal::from(max) {
            return Err(bounds_err.clone());
        }
        let qty = Qty::new(lots * lot_size_dec).ok_or(bounds_err)?;

        // a market order against an existing opposite position nets it out
        // instead of opening a hedge
        if spec.kind == OrderKind::Market {
            let target = self
                .trades
                .values()
                .find(|t| {
                    t.user_id == user_id
                        && t.is_open()
                        && t.symbol == spec.symbol
                        && t.side == spec.side.opposite()
                })
                .map(|t| (t.id, t.side));
            if let Some((trade_id, held_side)) = target {
                let quote = spec
                    .quote
                    .as_ref()
                    .ok_or_else(|| EngineError::PricingUnavailable(spec.symbol.clone()))?;
                let receipt =
                    self.close_at(trade_id, quote.exit_side(held_side), CloseReason::Netting)?;
                return Ok(OrderOutcome::Netted(receipt));
            }
        }

        let spread = resolved.spread();
        // market orders price off the quote; pending orders reserve at the
        // stated level and re-price nothing at trigger time
        let fill = entry_fill_price(
            spec.kind,
            spec.side,
            spec.quote.as_ref(),
            spec.stated_price,
            spread,
        )
        .ok_or_else(|| EngineError::PricingUnavailable(spec.symbol.clone()))?;

        let pool = spec.segment.pool();
        let notional = pricing::notional(spec.segment, qty, fill);
        let outcome = if pool == PoolKind::AltAsset {
            // alt trades pre-fund the full converted cost; no leverage
            MarginOutcome {
                margin: notional,
                leverage: Decimal::ONE,
            }
        } else {
            required_margin(
                &MarginInputs {
                    segment: spec.segment,
                    product: spec.product,
                    instrument: spec.instrument,
                    symbol_base: base_symbol(&spec.symbol),
                    category: spec.category.as_deref(),
                    lots,
                    qty,
                    fill_price: fill,
                    requested_leverage: spec.requested_leverage,
                },
                &resolved,
            )
        };

        let commission_spec = resolved.commission_spec();
        let raw = compute_commission(commission_spec, spec.instrument, lots, notional);
        let commission = apply_caps(raw, &resolved.caps, commission_spec.kind, lots, notional);

        let at = self.now();
        let operator_id = direct.id;
        let (available_after, balance_after) = {
            let user = self.require_user_mut(user_id)?;
            user.balances.reserve(pool, outcome.margin, commission)?;
            (user.balances.available(pool), user.balances.balance(pool))
        };

        let id = self.allocate_trade_id();
        let (trade_status, entry_price) = match spec.kind {
            OrderKind::Market => (TradeStatus::Open, Some(fill)),
            OrderKind::Limit | OrderKind::Stop => (TradeStatus::Pending, None),
        };
        let trade = Trade {
            id,
            user_id,
            operator_id,
            segment: spec.segment,
            symbol: spec.symbol,
            token: spec.token,
            category: spec.category,
            instrument: spec.instrument,
            lot_size,
            side: spec.side,
            product: spec.product,
            order_kind: spec.kind,
            lots,
            qty,
            entry_price,
            stated_price: spec.stated_price,
            exit_price: None,
            current_price: entry_price,
            spread,
            margin_used: outcome.margin,
            leverage: outcome.leverage,
            commission,
            status: trade_status,
            stop_loss: spec.stop_loss,
            target: spec.target,
            book_kept: spec.book_kept,
            opened_at: at,
            closed_at: None,
            realized_pnl: Money::zero(),
            unrealized_pnl: Money::zero(),
            book_pnl: Money::zero(),
            close_reason: None,
            partial_close: None,
        };
        self.trades.insert(id, trade.clone());

        self.record(
            LedgerOwner::User(user_id),
            Some(id),
            outcome.margin,
            LedgerReason::MarginBlock,
            available_after,
            at,
        );
        if !commission.is_zero() {
            self.record(
                LedgerOwner::User(user_id),
                Some(id),
                commission.negate(),
                LedgerReason::Commission,
                balance_after,
                at,
            );
        }

        let receipt = PlacementReceipt {
            trade,
            margin_blocked: outcome.margin,
            commission,
            available_after,
        };
        Ok(match spec.kind {
            OrderKind::Market => OrderOutcome::Opened(receipt),
            OrderKind::Limit | OrderKind::Stop => OrderOutcome::Parked(receipt),
        })
    }
}
