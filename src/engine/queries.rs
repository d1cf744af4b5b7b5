// 11.5: read-only views over engine state.

use super::core::Engine;
use super::results::{EngineError, PoolSummary, WalletSummary};
use crate::trade::Trade;
use crate::types::{Money, PoolKind, TradeStatus, UserId};

impl Engine {
    /// A user's trades, optionally filtered by status.
    pub fn positions(&self, user_id: UserId, status: Option<TradeStatus>) -> Vec<&Trade> {
        self.trades
            .values()
            .filter(|t| t.user_id == user_id && status.map_or(true, |s| t.status == s))
            .collect()
    }

    /// Settled trades, most recently closed first.
    pub fn trade_history(&self, user_id: UserId, limit: usize) -> Vec<&Trade> {
        let mut history: Vec<&Trade> = self
            .trades
            .values()
            .filter(|t| {
                t.user_id == user_id
                    && matches!(t.status, TradeStatus::Closed | TradeStatus::Cancelled)
            })
            .collect();
        history.sort_by_key(|t| std::cmp::Reverse(t.closed_at.map(|at| at.as_millis())));
        history.truncate(limit);
        history
    }

    pub fn wallet_summary(&self, user_id: UserId) -> Result<WalletSummary, EngineError> {
        let user = self.require_user(user_id)?;
        let open: Vec<&Trade> = self
            .trades
            .values()
            .filter(|t| t.user_id == user_id && t.is_open())
            .collect();
        let unrealized_pnl: Money = open.iter().map(|t| t.unrealized_pnl).sum();

        let pool = |kind: PoolKind| PoolSummary {
            balance: user.balances.balance(kind),
            used_margin: user.balances.used_margin(kind),
            available: user.balances.available(kind),
        };

        Ok(WalletSummary {
            trading: pool(PoolKind::Trading),
            alt: pool(PoolKind::AltAsset),
            commodity: pool(PoolKind::Commodity),
            unrealized_pnl,
            open_trades: open.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::{CommissionKind, CommissionSpec};
    use crate::engine::config::EngineConfig;
    use crate::engine::orders::{OrderSize, OrderSpec};
    use crate::hierarchy::{Operator, OperatorRole};
    use crate::settings::{OperatorPolicy, SegmentPermission};
    use crate::types::{
        InstrumentKind, OperatorId, OrderKind, Price, ProductKind, Segment, Side, TwoSidedQuote,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn setup() -> (Engine, UserId) {
        let mut policy = OperatorPolicy::default();
        policy.segments.insert(
            Segment::Futures,
            SegmentPermission {
                trading_enabled: true,
                commission: CommissionSpec::flat(CommissionKind::PerLot, dec!(20)),
                max_lots: 100,
                min_lots: 1,
                exposure_intraday: dec!(10),
                exposure_carry: dec!(5),
                spread: Decimal::ZERO,
                blocked_symbols: vec![],
            },
        );
        let mut engine = Engine::new(EngineConfig::zero_charges());
        engine.add_operator(Operator::new(
            OperatorId(1),
            "BRK".into(),
            OperatorRole::Broker,
            None,
            policy,
        ));
        let user = engine.create_user(OperatorId(1));
        engine
            .deposit(user, PoolKind::Trading, Money::new(dec!(100000)))
            .unwrap();
        (engine, user)
    }

    fn open(engine: &mut Engine, user: UserId, px: Decimal) -> crate::types::TradeId {
        let spec = OrderSpec {
            symbol: "NIFTY24AUGFUT".into(),
            token: None,
            category: None,
            segment: Segment::Futures,
            instrument: InstrumentKind::Future,
            side: Side::Long,
            product: ProductKind::Intraday,
            kind: OrderKind::Market,
            size: OrderSize::Lots(dec!(1)),
            quote: Some(TwoSidedQuote::new(
                Price::new_unchecked(px),
                Price::new_unchecked(px),
            )),
            stated_price: None,
            requested_leverage: dec!(10),
            stop_loss: None,
            target: None,
            book_kept: true,
        };
        match engine.place_order(user, spec).unwrap() {
            crate::engine::results::OrderOutcome::Opened(receipt) => receipt.trade.id,
            other => panic!("expected an open, got {other:?}"),
        }
    }

    #[test]
    fn positions_filter_by_status() {
        let (mut engine, user) = setup();
        let a = open(&mut engine, user, dec!(100));
        let b = open(&mut engine, user, dec!(100));
        engine.close_trade(a, Price::new_unchecked(dec!(105))).unwrap();

        let open_now = engine.positions(user, Some(TradeStatus::Open));
        assert_eq!(open_now.len(), 1);
        assert_eq!(open_now[0].id, b);
        assert_eq!(engine.positions(user, None).len(), 2);
    }

    #[test]
    fn history_is_most_recent_first() {
        let (mut engine, user) = setup();
        let a = open(&mut engine, user, dec!(100));
        let b = open(&mut engine, user, dec!(100));
        engine.close_trade(a, Price::new_unchecked(dec!(101))).unwrap();
        engine.advance_time(1_000);
        engine.close_trade(b, Price::new_unchecked(dec!(102))).unwrap();

        let history = engine.trade_history(user, 10);
        assert_eq!(history[0].id, b);
        assert_eq!(history[1].id, a);
        assert_eq!(engine.trade_history(user, 1).len(), 1);
    }

    #[test]
    fn wallet_summary_totals_open_exposure() {
        let (mut engine, user) = setup();
        open(&mut engine, user, dec!(100));
        engine.on_price_update(
            "NIFTY24AUGFUT",
            TwoSidedQuote::new(Price::new_unchecked(dec!(104)), Price::new_unchecked(dec!(104))),
        );

        let summary = engine.wallet_summary(user).unwrap();
        assert_eq!(summary.open_trades, 1);
        assert_eq!(summary.unrealized_pnl.value(), dec!(100));
        assert_eq!(summary.trading.used_margin.value(), dec!(250));
        assert_eq!(summary.alt.balance.value(), dec!(0));
    }
}
