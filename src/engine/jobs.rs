// 11.4: price-driven and scheduled sweeps. every sweep is two-phase: collect
// the affected trade ids first, then execute against each id, so no wallet or
// trade mutation happens while the trade map is being scanned.

use super::core::Engine;
use super::results::{
    ConversionSweepResult, EngineError, LiquidationRecord, MarginCorrection, PriceSweepResult,
};
use crate::ledger::{LedgerOwner, LedgerReason};
use crate::pricing::{self, exit_fill_price, required_margin, MarginInputs};
use crate::settings::{self, base_symbol};
use crate::trade::PartialClose;
use crate::types::{
    CloseReason, Money, PoolKind, Price, ProductKind, Qty, Segment, Timestamp, TradeId,
    TradeStatus, TwoSidedQuote, UserId,
};
use rust_decimal::Decimal;

enum ConversionOutcome {
    Converted,
    PartiallyConverted,
    Closed,
    Skipped,
}

impl Engine {
    /// Feed one symbol's quote through the book: fire pending triggers, mark
    /// open positions, close anything whose protective level was crossed.
    pub fn on_price_update(&mut self, symbol: &str, quote: TwoSidedQuote) -> PriceSweepResult {
        let mut result = PriceSweepResult::default();
        let ids: Vec<TradeId> = self
            .trades
            .values()
            .filter(|t| t.symbol == symbol && (t.is_open() || t.is_pending()))
            .map(|t| t.id)
            .collect();

        for id in &ids {
            let Some(trade) = self.trades.get_mut(id) else {
                continue;
            };
            if !trade.is_pending() {
                continue;
            }
            let touch = quote.entry_side(trade.side);
            if trade.pending_triggered(touch) {
                // the order fills at its stated level; margin was already
                // reserved there at placement
                trade.entry_price = trade.stated_price;
                trade.status = TradeStatus::Open;
                trade.mark_unrealized(touch);
                result.triggered.push(*id);
            }
        }

        for id in &ids {
            let action = {
                let Some(trade) = self.trades.get_mut(id) else {
                    continue;
                };
                if !trade.is_open() {
                    continue;
                }
                let mark = quote.exit_side(trade.side);
                trade.mark_unrealized(mark);
                if trade.stop_loss_hit(mark) {
                    trade.stop_loss.map(|level| (level, CloseReason::StopLoss))
                } else if trade.target_hit(mark) {
                    trade.target.map(|level| (level, CloseReason::TargetHit))
                } else {
                    None
                }
            };
            if let Some((level, reason)) = action {
                match self.close_at(*id, level, reason) {
                    Ok(_) => result.closed.push(*id),
                    Err(err) => {
                        tracing::warn!(trade = id.0, error = %err, "protective close failed")
                    }
                }
            }
        }

        result
    }

    /// Forced liquidation: while a user's margin-pool equity (cash plus
    /// unrealized P&L) is at or below zero, close their worst open loser and
    /// re-check. Alt-asset positions are pre-funded and never liquidated.
    pub fn run_liquidation_sweep(&mut self) -> Vec<LiquidationRecord> {
        let mut records = Vec::new();
        let user_ids: Vec<UserId> = self.users.keys().copied().collect();

        for user_id in user_ids {
            loop {
                let Some(user) = self.users.get(&user_id) else {
                    break;
                };
                let cash = user
                    .balances
                    .balance(PoolKind::Trading)
                    .add(user.balances.balance(PoolKind::Commodity));
                let open: Vec<(TradeId, Option<Price>, Money)> = self
                    .trades
                    .values()
                    .filter(|t| {
                        t.user_id == user_id && t.is_open() && t.pool() != PoolKind::AltAsset
                    })
                    .map(|t| (t.id, t.current_price, t.unrealized_pnl))
                    .collect();
                if open.is_empty() {
                    break;
                }
                let unrealized: Money = open.iter().map(|(_, _, pnl)| *pnl).sum();
                if cash.add(unrealized).value() > Decimal::ZERO {
                    break;
                }
                let candidate = open
                    .iter()
                    .filter_map(|(id, mark, pnl)| mark.map(|m| (*id, m, *pnl)))
                    .min_by_key(|(_, _, pnl)| *pnl);
                let Some((trade_id, mark, _)) = candidate else {
                    break;
                };
                match self.close_at(trade_id, mark, CloseReason::Liquidation) {
                    Ok(receipt) => {
                        tracing::info!(
                            user = user_id.0,
                            trade = trade_id.0,
                            pnl = %receipt.net_pnl,
                            "forced liquidation"
                        );
                        records.push(LiquidationRecord {
                            user_id,
                            trade_id,
                            realized_pnl: receipt.net_pnl,
                        });
                    }
                    Err(err) => {
                        tracing::warn!(trade = trade_id.0, error = %err, "liquidation close failed");
                        break;
                    }
                }
            }
        }

        records
    }

    /// End-of-session conversion of intraday positions to carry-forward.
    pub fn run_conversion_sweep(&mut self, segment: Segment) -> ConversionSweepResult {
        let mut result = ConversionSweepResult::default();
        let ids: Vec<TradeId> = self
            .trades
            .values()
            .filter(|t| t.segment == segment && t.is_open() && t.product == ProductKind::Intraday)
            .map(|t| t.id)
            .collect();

        for id in ids {
            match self.convert_one(id) {
                Ok(ConversionOutcome::Converted) => result.converted.push(id),
                Ok(ConversionOutcome::PartiallyConverted) => result.partially_converted.push(id),
                Ok(ConversionOutcome::Closed) => result.closed.push(id),
                Ok(ConversionOutcome::Skipped) => {}
                Err(err) => {
                    tracing::warn!(trade = id.0, error = %err, "conversion failed, position left intraday")
                }
            }
        }

        result
    }

    fn convert_one(&mut self, id: TradeId) -> Result<ConversionOutcome, EngineError> {
        let trade = self.require_trade(id)?.clone();
        let Some(entry) = trade.entry_price else {
            return Ok(ConversionOutcome::Skipped);
        };
        let mark = trade.current_price.unwrap_or(entry);
        let at = self.now();
        let pool = trade.pool();

        let user = self.require_user(trade.user_id)?;
        let chain = self.operators.chain_for(user.operator_id);
        let resolved = settings::resolve(
            trade.user_id,
            &user.settings,
            &chain,
            trade.segment,
            &trade.symbol,
            trade.category.as_deref(),
        )?;
        let carry = required_margin(
            &MarginInputs {
                segment: trade.segment,
                product: ProductKind::CarryForward,
                instrument: trade.instrument,
                symbol_base: base_symbol(&trade.symbol),
                category: trade.category.as_deref(),
                lots: trade.lots,
                qty: trade.qty,
                fill_price: entry,
                requested_leverage: trade.leverage,
            },
            &resolved,
        );
        let new_req = carry.margin;

        // carry needs no more than what is already blocked: flip in place
        if new_req <= trade.margin_used {
            let t = self.trades.get_mut(&id).expect("existence checked above");
            t.product = ProductKind::CarryForward;
            t.leverage = carry.leverage;
            return Ok(ConversionOutcome::Converted);
        }

        let shortfall = new_req.sub(trade.margin_used);
        let profit = trade.unrealized_pnl.clamp_floor_zero();
        let available = user.balances.available(pool);

        if available.add(profit) >= shortfall {
            self.realize_and_block(id, pool, profit, shortfall, mark, new_req, carry.leverage, at)?;
            return Ok(ConversionOutcome::Converted);
        }

        // the user cannot carry the whole position: keep what the funds cover.
        // closing the rest realizes its P&L and exit charges first, so each
        // candidate lot count is checked against the funds left after that
        // close, not against today's balance.
        let per_lot = Money::new(new_req.value() / trade.lots);
        let exit = exit_fill_price(trade.side, mark, trade.spread)
            .ok_or_else(|| EngineError::PricingUnavailable(trade.symbol.clone()))?;
        let coverable = trade.margin_used.add(available).add(profit);
        let mut keep_lots = (coverable.value() / per_lot.value()).floor().min(trade.lots);
        while keep_lots > Decimal::ZERO {
            let qty_out = trade.qty.value() * (trade.lots - keep_lots) / trade.lots;
            let gross_out =
                Money::new((exit.value() - entry.value()) * trade.side.sign() * qty_out);
            let turnover_out =
                pricing::notional(trade.segment, Qty::new_unchecked(qty_out), exit);
            let net_out = gross_out.sub(self.config.charges.exit_charges(trade.segment, turnover_out));
            let kept_profit = trade
                .unrealized_pnl
                .mul(keep_lots / trade.lots)
                .clamp_floor_zero();
            let funds = trade.margin_used.add(available).add(net_out).add(kept_profit);
            if funds >= per_lot.mul(keep_lots) {
                break;
            }
            keep_lots -= Decimal::ONE;
        }
        if keep_lots <= Decimal::ZERO {
            self.close_at(id, mark, CloseReason::MarginInsufficient)?;
            return Ok(ConversionOutcome::Closed);
        }

        let closed_lots = trade.lots - keep_lots;
        let fraction = closed_lots / trade.lots;
        let qty_closed = trade.qty.value() * fraction;
        let gross = Money::new((exit.value() - entry.value()) * trade.side.sign() * qty_closed);
        let turnover =
            pricing::notional(trade.segment, Qty::new_unchecked(qty_closed), exit);
        let charges = self.config.charges.exit_charges(trade.segment, turnover);
        let net = gross.sub(charges);
        let released = trade.margin_used.mul(fraction);

        let (available_after, balance_after) = {
            let user = self.require_user_mut(trade.user_id)?;
            user.balances.release(pool, released, net);
            (user.balances.available(pool), user.balances.balance(pool))
        };
        self.record(
            LedgerOwner::User(trade.user_id),
            Some(id),
            released,
            LedgerReason::MarginRelease,
            available_after,
            at,
        );
        self.record(
            LedgerOwner::User(trade.user_id),
            Some(id),
            net,
            LedgerReason::Conversion,
            balance_after,
            at,
        );
        if trade.book_kept {
            let book_after = self.operators.find_mut(trade.operator_id).map(|op| {
                op.book_pnl = op.book_pnl.add(net.negate());
                op.book_pnl
            });
            if let Some(after) = book_after {
                self.record(
                    LedgerOwner::Operator(trade.operator_id),
                    Some(id),
                    net.negate(),
                    LedgerReason::BookPnl,
                    after,
                    at,
                );
            }
        }

        let remaining_profit = {
            let t = self.trades.get_mut(&id).expect("existence checked above");
            t.lots = keep_lots;
            t.qty = Qty::new_unchecked(t.qty.value() - qty_closed);
            t.margin_used = t.margin_used.sub(released);
            t.partial_close = Some(PartialClose {
                lots_closed: closed_lots,
                qty_closed,
                price: exit,
                realized_pnl: net,
                at,
            });
            t.mark_unrealized(mark);
            t.unrealized_pnl.clamp_floor_zero()
        };

        let remaining_req = per_lot.mul(keep_lots);
        let remaining_margin = trade.margin_used.sub(released);
        let remaining_shortfall = remaining_req.sub(remaining_margin).clamp_floor_zero();
        self.realize_and_block(
            id,
            pool,
            remaining_profit,
            remaining_shortfall,
            mark,
            remaining_req,
            carry.leverage,
            at,
        )?;
        Ok(ConversionOutcome::PartiallyConverted)
    }

    // realize any positive unrealized P&L into the balance (moving the entry
    // to the mark so it is not counted twice), block the shortfall, and flip
    // the product to carry-forward.
    #[allow(clippy::too_many_arguments)]
    fn realize_and_block(
        &mut self,
        id: TradeId,
        pool: PoolKind,
        profit: Money,
        shortfall: Money,
        mark: Price,
        new_req: Money,
        leverage: Decimal,
        at: Timestamp,
    ) -> Result<(), EngineError> {
        let user_id = self.require_trade(id)?.user_id;

        if !profit.is_zero() {
            let balance_after = {
                let user = self.require_user_mut(user_id)?;
                user.balances.credit(pool, profit);
                user.balances.balance(pool)
            };
            self.record(
                LedgerOwner::User(user_id),
                Some(id),
                profit,
                LedgerReason::TradePnl,
                balance_after,
                at,
            );
            let t = self.trades.get_mut(&id).expect("existence checked above");
            t.entry_price = Some(mark);
            t.mark_unrealized(mark);
        }

        if !shortfall.is_zero() {
            let available_after = {
                let user = self.require_user_mut(user_id)?;
                user.balances.block_additional_margin(pool, shortfall)?;
                user.balances.available(pool)
            };
            self.record(
                LedgerOwner::User(user_id),
                Some(id),
                shortfall,
                LedgerReason::MarginBlock,
                available_after,
                at,
            );
        }

        let t = self.trades.get_mut(&id).expect("existence checked above");
        t.product = ProductKind::CarryForward;
        t.margin_used = new_req;
        t.leverage = leverage;
        Ok(())
    }

    /// Recompute each margin pool's true blocked total from the trades that
    /// actually hold margin and repair any drift in the wallet figure.
    pub fn reconcile_margins(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<MarginCorrection>, EngineError> {
        self.require_user(user_id)?;
        let at = self.now();
        let mut corrections = Vec::new();

        for pool in [PoolKind::Trading, PoolKind::Commodity] {
            let true_total: Money = self
                .trades
                .values()
                .filter(|t| {
                    t.user_id == user_id && t.pool() == pool && (t.is_open() || t.is_pending())
                })
                .map(|t| t.margin_used)
                .sum();
            let (delta, available_after) = {
                let user = self.require_user_mut(user_id)?;
                let delta = user.balances.set_used_margin(pool, true_total);
                (delta, user.balances.available(pool))
            };
            if !delta.is_zero() {
                tracing::warn!(user = user_id.0, pool = %pool, delta = %delta, "margin drift repaired");
                self.record(
                    LedgerOwner::User(user_id),
                    None,
                    delta,
                    LedgerReason::MarginAdjust,
                    available_after,
                    at,
                );
                corrections.push(MarginCorrection { pool, delta });
            }
        }

        Ok(corrections)
    }
}
