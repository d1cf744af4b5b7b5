// 11.3: the close path. every terminal transition funnels through close_at so
// margin release, exit charges, book P&L, and commission distribution happen
// exactly once per trade, in that order.

use super::core::Engine;
use super::results::{CloseReceipt, EngineError};
use crate::commission::{distribute, CommissionCredit, SharingConfig};
use crate::ledger::{LedgerOwner, LedgerReason};
use crate::pricing::exit_fill_price;
use crate::trade::Trade;
use crate::types::{CloseReason, Money, OperatorId, Price, Timestamp, TradeId, TradeStatus, UserId};

impl Engine {
    /// Manual close at a caller-supplied exit price.
    pub fn close_trade(&mut self, trade_id: TradeId, exit: Price) -> Result<CloseReceipt, EngineError> {
        self.close_at(trade_id, exit, CloseReason::Manual)
    }

    /// Cancel a parked order: margin and commission come back in full, no P&L.
    /// Only the order's owner may cancel it.
    pub fn cancel_order(
        &mut self,
        trade_id: TradeId,
        user_id: UserId,
    ) -> Result<Trade, EngineError> {
        let at = self.now();
        let trade = self.require_trade(trade_id)?;
        if trade.user_id != user_id {
            return Err(EngineError::NotOrderOwner {
                trade: trade_id,
                user: user_id,
            });
        }
        if trade.status != TradeStatus::Pending {
            return Err(EngineError::InvalidState {
                trade: trade_id,
                status: trade.status,
                expected: TradeStatus::Pending,
            });
        }
        let (pool, margin, commission) = (trade.pool(), trade.margin_used, trade.commission);

        let (available_after, balance_after) = {
            let user = self.require_user_mut(user_id)?;
            user.balances.release(pool, margin, Money::zero());
            user.balances.credit(pool, commission);
            (user.balances.available(pool), user.balances.balance(pool))
        };

        let snapshot = {
            let trade = self.trades.get_mut(&trade_id).expect("existence checked above");
            trade.status = TradeStatus::Cancelled;
            trade.close_reason = Some(CloseReason::PendingCancelled);
            trade.closed_at = Some(at);
            trade.clone()
        };

        self.record(
            LedgerOwner::User(user_id),
            Some(trade_id),
            margin,
            LedgerReason::MarginRelease,
            available_after,
            at,
        );
        if !commission.is_zero() {
            self.record(
                LedgerOwner::User(user_id),
                Some(trade_id),
                commission,
                LedgerReason::Commission,
                balance_after,
                at,
            );
        }
        Ok(snapshot)
    }

    pub(crate) fn close_at(
        &mut self,
        trade_id: TradeId,
        raw: Price,
        reason: CloseReason,
    ) -> Result<CloseReceipt, EngineError> {
        let at = self.now();
        let trade = self.require_trade(trade_id)?;
        if trade.status != TradeStatus::Open {
            return Err(EngineError::InvalidState {
                trade: trade_id,
                status: trade.status,
                expected: TradeStatus::Open,
            });
        }
        let exit = exit_fill_price(trade.side, raw, trade.spread)
            .ok_or_else(|| EngineError::PricingUnavailable(trade.symbol.clone()))?;
        let gross = trade.gross_pnl(exit);
        let turnover = trade.turnover_at(exit);
        let charges = self.config.charges.exit_charges(trade.segment, turnover);
        let net = gross.sub(charges);
        let (pool, margin, commission, user_id, operator_id, book_kept) = (
            trade.pool(),
            trade.margin_used,
            trade.commission,
            trade.user_id,
            trade.operator_id,
            trade.book_kept,
        );

        let (available_after, balance_after) = {
            let user = self.require_user_mut(user_id)?;
            user.balances.release(pool, margin, net);
            (user.balances.available(pool), user.balances.balance(pool))
        };

        let snapshot = {
            let trade = self.trades.get_mut(&trade_id).expect("existence checked above");
            trade.status = TradeStatus::Closed;
            trade.exit_price = Some(exit);
            trade.current_price = Some(exit);
            trade.closed_at = Some(at);
            trade.realized_pnl = net;
            trade.unrealized_pnl = Money::zero();
            trade.book_pnl = if book_kept { net.negate() } else { Money::zero() };
            trade.close_reason = Some(reason);
            trade.clone()
        };

        self.record(
            LedgerOwner::User(user_id),
            Some(trade_id),
            margin,
            LedgerReason::MarginRelease,
            available_after,
            at,
        );
        let pnl_reason = match reason {
            CloseReason::Liquidation => LedgerReason::Liquidation,
            CloseReason::MarginInsufficient => LedgerReason::Conversion,
            _ => LedgerReason::TradePnl,
        };
        self.record(
            LedgerOwner::User(user_id),
            Some(trade_id),
            net,
            pnl_reason,
            balance_after,
            at,
        );

        // the operator is the counterparty of a book-kept trade; commission
        // only fans out across the hierarchy for trades held on the book
        if book_kept {
            let book_after = self.operators.find_mut(operator_id).map(|op| {
                op.book_pnl = op.book_pnl.add(net.negate());
                op.book_pnl
            });
            if let Some(after) = book_after {
                self.record(
                    LedgerOwner::Operator(operator_id),
                    Some(trade_id),
                    net.negate(),
                    LedgerReason::BookPnl,
                    after,
                    at,
                );
            }
            if !commission.is_zero() {
                self.distribute_commission(trade_id, operator_id, commission, at);
            }
        }

        Ok(CloseReceipt {
            trade: snapshot,
            net_pnl: net,
            charges,
        })
    }

    // commission fans out per the direct operator's sharing config. a
    // misconfigured share table must not block the close: log and credit the
    // direct operator in full.
    fn distribute_commission(
        &mut self,
        trade_id: TradeId,
        operator_id: OperatorId,
        total: Money,
        at: Timestamp,
    ) {
        let chain = self.operators.chain_for(operator_id);
        let sharing = chain
            .direct()
            .map(|op| op.policy.sharing.clone())
            .unwrap_or_else(SharingConfig::disabled);

        let credits = match distribute(total, &chain, &sharing) {
            Ok(credits) => credits,
            Err(err) => {
                tracing::warn!(
                    trade = trade_id.0,
                    operator = operator_id.0,
                    error = %err,
                    "commission sharing misconfigured, crediting direct operator in full"
                );
                match chain.direct() {
                    Some(direct) => vec![CommissionCredit {
                        operator_id: direct.id,
                        role: direct.role,
                        amount: total,
                    }],
                    None => Vec::new(),
                }
            }
        };

        for credit in credits {
            if credit.amount.is_zero() {
                continue;
            }
            let earned_after = self.operators.find_mut(credit.operator_id).map(|op| {
                op.commission_earned = op.commission_earned.add(credit.amount);
                op.commission_earned
            });
            if let Some(after) = earned_after {
                self.record(
                    LedgerOwner::Operator(credit.operator_id),
                    Some(trade_id),
                    credit.amount,
                    LedgerReason::CommissionShare,
                    after,
                    at,
                );
            }
        }
    }
}
