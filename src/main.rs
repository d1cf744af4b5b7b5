//! B-Book Brokerage Engine Simulation.
//!
//! Walks the full order and margin lifecycle: placement, netting, pending
//! triggers, forced liquidation, intraday-to-carry conversion, and commission
//! distribution up the operator hierarchy.

use bbook_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn main() {
    println!("B-Book Brokerage Order & Margin Engine Simulation");
    println!("Segregated Wallets, Operator Hierarchy, Full Lifecycle\n");

    scenario_1_order_lifecycle();
    scenario_2_netting();
    scenario_3_pending_orders();
    scenario_4_commission_sharing();
    scenario_5_liquidation();
    scenario_6_carry_conversion();
    scenario_7_alt_asset_wallet();

    println!("\nAll simulations completed successfully.");
}

fn futures_permission() -> SegmentPermission {
    SegmentPermission {
        trading_enabled: true,
        commission: CommissionSpec::flat(CommissionKind::PerLot, dec!(20)),
        max_lots: 100,
        min_lots: 1,
        exposure_intraday: dec!(10),
        exposure_carry: dec!(5),
        spread: Decimal::ZERO,
        blocked_symbols: vec![],
    }
}

fn broker_policy() -> OperatorPolicy {
    let mut policy = OperatorPolicy::default();
    policy.segments.insert(Segment::Futures, futures_permission());
    policy
}

fn engine_with_broker(policy: OperatorPolicy) -> (Engine, UserId) {
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

fn quote(px: Decimal) -> TwoSidedQuote {
    TwoSidedQuote::new(Price::new_unchecked(px), Price::new_unchecked(px))
}

fn futures_order(side: Side, kind: OrderKind, lots: Decimal, px: Decimal) -> OrderSpec {
    OrderSpec {
        symbol: "NIFTY24AUGFUT".into(),
        token: None,
        category: None,
        segment: Segment::Futures,
        instrument: InstrumentKind::Future,
        side,
        product: ProductKind::Intraday,
        kind,
        size: OrderSize::Lots(lots),
        quote: match kind {
            OrderKind::Market => Some(quote(px)),
            _ => None,
        },
        stated_price: match kind {
            OrderKind::Market => None,
            _ => Some(Price::new_unchecked(px)),
        },
        requested_leverage: dec!(10),
        stop_loss: None,
        target: None,
        book_kept: true,
    }
}

/// Open, mark, close.
fn scenario_1_order_lifecycle() {
    println!("Scenario 1: Order Lifecycle\n");

    let (mut engine, user) = engine_with_broker(broker_policy());

    let OrderOutcome::Opened(receipt) = engine
        .place_order(user, futures_order(Side::Long, OrderKind::Market, dec!(2), dec!(100)))
        .unwrap()
    else {
        panic!("expected an open");
    };
    println!(
        "  Opened 2 lots long @ 100: margin {}, commission {}",
        receipt.margin_blocked, receipt.commission
    );

    engine.on_price_update("NIFTY24AUGFUT", quote(dec!(108)));
    let summary = engine.wallet_summary(user).unwrap();
    println!("  Marked @ 108: unrealized P&L {}", summary.unrealized_pnl);

    let close = engine
        .close_trade(receipt.trade.id, Price::new_unchecked(dec!(110)))
        .unwrap();
    println!("  Closed @ 110: net P&L {}", close.net_pnl);

    let summary = engine.wallet_summary(user).unwrap();
    println!(
        "  Trading wallet: balance {}, used margin {}",
        summary.trading.balance, summary.trading.used_margin
    );
    let op = engine.operator(OperatorId(1)).unwrap();
    println!("  Broker book P&L: {}\n", op.book_pnl);
}

/// An opposite market order closes the open position instead of hedging.
fn scenario_2_netting() {
    println!("Scenario 2: Netting\n");

    let (mut engine, user) = engine_with_broker(broker_policy());
    engine
        .place_order(user, futures_order(Side::Long, OrderKind::Market, dec!(2), dec!(100)))
        .unwrap();
    println!("  Opened 2 lots long @ 100");

    let outcome = engine
        .place_order(user, futures_order(Side::Short, OrderKind::Market, dec!(2), dec!(107)))
        .unwrap();
    match outcome {
        OrderOutcome::Netted(receipt) => println!(
            "  Short order netted the long: P&L {}, reason {:?}\n",
            receipt.net_pnl,
            receipt.trade.close_reason.unwrap()
        ),
        other => panic!("expected netting, got {other:?}"),
    }
}

/// Limit and stop orders park with margin reserved, then fire on a cross.
fn scenario_3_pending_orders() {
    println!("Scenario 3: Pending Orders\n");

    let (mut engine, user) = engine_with_broker(broker_policy());

    let mut spec = futures_order(Side::Long, OrderKind::Limit, dec!(2), dec!(95));
    spec.stop_loss = Some(Price::new_unchecked(dec!(90)));
    let OrderOutcome::Parked(receipt) = engine.place_order(user, spec).unwrap() else {
        panic!("expected a parked order");
    };
    println!("  Limit buy 2 lots @ 95 parked, margin {}", receipt.margin_blocked);

    let swept = engine.on_price_update("NIFTY24AUGFUT", quote(dec!(94)));
    println!("  Price touches 94: {} order(s) triggered", swept.triggered.len());

    let swept = engine.on_price_update("NIFTY24AUGFUT", quote(dec!(89)));
    println!("  Price falls to 89: {} trade(s) stopped out", swept.closed.len());
    let trade = engine.trade(receipt.trade.id).unwrap();
    println!(
        "  Exit @ {} ({:?}), P&L {}\n",
        trade.exit_price.unwrap(),
        trade.close_reason.unwrap(),
        trade.realized_pnl
    );
}

/// Commission fans out across a sparse operator chain.
fn scenario_4_commission_sharing() {
    println!("Scenario 4: Commission Sharing\n");

    let shares = HashMap::from([
        (OperatorRole::SubBroker, dec!(20)),
        (OperatorRole::Broker, dec!(30)),
        (OperatorRole::Admin, dec!(25)),
        (OperatorRole::SuperAdmin, dec!(25)),
    ]);
    let mut leaf_policy = broker_policy();
    leaf_policy.sharing = SharingConfig::percentage(shares);

    let mut engine = Engine::new(EngineConfig::zero_charges());
    engine.add_operator(Operator::new(
        OperatorId(1),
        "ROOT".into(),
        OperatorRole::SuperAdmin,
        None,
        OperatorPolicy::default(),
    ));
    engine.add_operator(Operator::new(
        OperatorId(2),
        "BRK".into(),
        OperatorRole::Broker,
        Some(OperatorId(1)),
        leaf_policy,
    ));
    let user = engine.create_user(OperatorId(2));
    engine
        .deposit(user, PoolKind::Trading, Money::new(dec!(100000)))
        .unwrap();

    let OrderOutcome::Opened(receipt) = engine
        .place_order(user, futures_order(Side::Long, OrderKind::Market, dec!(2), dec!(100)))
        .unwrap()
    else {
        panic!("expected an open");
    };
    engine
        .close_trade(receipt.trade.id, Price::new_unchecked(dec!(100)))
        .unwrap();

    println!("  Commission charged: {}", receipt.commission);
    println!(
        "  Broker earned {} (own 30% plus orphaned sub-broker 20%)",
        engine.operator(OperatorId(2)).unwrap().commission_earned
    );
    println!(
        "  Super-admin earned {} (own 25% plus orphaned admin 25%)\n",
        engine.operator(OperatorId(1)).unwrap().commission_earned
    );
}

/// Equity at or below zero triggers forced closes, worst loser first.
fn scenario_5_liquidation() {
    println!("Scenario 5: Forced Liquidation\n");

    let mut engine = Engine::new(EngineConfig::zero_charges());
    engine.add_operator(Operator::new(
        OperatorId(1),
        "BRK".into(),
        OperatorRole::Broker,
        None,
        broker_policy(),
    ));
    let user = engine.create_user(OperatorId(1));
    engine
        .deposit(user, PoolKind::Trading, Money::new(dec!(540)))
        .unwrap();

    engine
        .place_order(user, futures_order(Side::Long, OrderKind::Market, dec!(2), dec!(100)))
        .unwrap();
    println!("  Thin account: 2 lots long @ 100 on 540 deposit");

    for px in [dec!(97), dec!(93), dec!(90)] {
        engine.on_price_update("NIFTY24AUGFUT", quote(px));
        let records = engine.run_liquidation_sweep();
        if records.is_empty() {
            println!("  @ {px}: equity holds, no liquidation");
        } else {
            for record in records {
                println!(
                    "  @ {px}: trade {} liquidated, realized {}",
                    record.trade_id.0, record.realized_pnl
                );
            }
        }
    }
    let summary = engine.wallet_summary(user).unwrap();
    println!("  Final balance: {}\n", summary.trading.balance);
}

/// End of session: intraday positions convert to carry-forward, splitting
/// when funds only cover part of the position.
fn scenario_6_carry_conversion() {
    println!("Scenario 6: Intraday to Carry-Forward\n");

    // rich account converts whole; thin account keeps what it can fund
    for (label, deposit) in [("funded", dec!(100000)), ("thin", dec!(540))] {
        let mut engine = Engine::new(EngineConfig::zero_charges());
        engine.add_operator(Operator::new(
            OperatorId(1),
            "BRK".into(),
            OperatorRole::Broker,
            None,
            broker_policy(),
        ));
        let user = engine.create_user(OperatorId(1));
        engine
            .deposit(user, PoolKind::Trading, Money::new(deposit))
            .unwrap();
        engine
            .place_order(user, futures_order(Side::Long, OrderKind::Market, dec!(2), dec!(100)))
            .unwrap();

        let result = engine.run_conversion_sweep(Segment::Futures);
        let open = engine.positions(user, Some(TradeStatus::Open));
        println!(
            "  {label}: {} converted, {} split, {} closed; {} lot(s) carried",
            result.converted.len(),
            result.partially_converted.len(),
            result.closed.len(),
            open.first().map(|t| t.lots).unwrap_or(Decimal::ZERO)
        );
    }
    println!();
}

/// The alt-asset wallet pre-funds full converted cost, no margin.
fn scenario_7_alt_asset_wallet() {
    println!("Scenario 7: Alt-Asset Wallet\n");

    let mut policy = OperatorPolicy::default();
    let mut perm = futures_permission();
    perm.commission = CommissionSpec::free();
    perm.min_lots = 0;
    policy.segments.insert(Segment::AltAsset, perm);

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
        .deposit(user, PoolKind::AltAsset, Money::new(dec!(100000)))
        .unwrap();

    let spec = OrderSpec {
        symbol: "XAUUSD".into(),
        token: None,
        category: None,
        segment: Segment::AltAsset,
        instrument: InstrumentKind::Equity,
        side: Side::Long,
        product: ProductKind::Intraday,
        kind: OrderKind::Market,
        size: OrderSize::Lots(dec!(0.5)),
        quote: Some(quote(dec!(2000))),
        stated_price: None,
        requested_leverage: dec!(10),
        stop_loss: None,
        target: None,
        book_kept: true,
    };
    let OrderOutcome::Opened(receipt) = engine.place_order(user, spec).unwrap() else {
        panic!("expected an open");
    };
    println!(
        "  Bought 0.5 XAUUSD @ 2000: pre-funded cost {} (converted at {})",
        receipt.margin_blocked, ALT_CONVERSION_RATE
    );

    let close = engine
        .close_trade(receipt.trade.id, Price::new_unchecked(dec!(2010)))
        .unwrap();
    println!("  Closed @ 2010: P&L {}", close.net_pnl);
    let summary = engine.wallet_summary(user).unwrap();
    println!("  Alt wallet balance: {}", summary.alt.balance);
    println!("  Ledger entries recorded: {}", engine.ledger().entries().len());
}
