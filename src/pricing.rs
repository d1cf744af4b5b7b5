// 4.0: pricing and margin. converts an order's price/quantity/leverage/product
// into an effective fill price (spread-adjusted) and a blocked-margin figure.
//
// margin precedence, first non-zero rung wins:
//   1. fixed per-lot margin table {instrument group, product, contract kind}
//   2. segment exposure divisor: margin = notional / exposure
//   3. leverage fallback: margin = notional / leverage
// option buys always post the full premium (leverage 1). delivery products
// post full notional. alt-asset notional converts to the reporting currency
// at a fixed rate before any margin math.

use crate::settings::ResolvedSettings;
use crate::types::{
    InstrumentKind, Money, OrderKind, Price, ProductKind, Qty, Segment, Side, TwoSidedQuote,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ALT_CONVERSION_RATE: Decimal = dec!(84);

/// Fill price on entry. Market orders need a two-sided quote: buys lift the
/// ask plus spread, sells hit the bid minus spread. Limit and stop orders fill
/// at the stated price with no spread.
pub fn entry_fill_price(
    kind: OrderKind,
    side: Side,
    quote: Option<&TwoSidedQuote>,
    stated: Option<Price>,
    spread: Decimal,
) -> Option<Price> {
    match kind {
        OrderKind::Market => {
            let quote = quote?;
            let raw = quote.entry_side(side).value() + side.sign() * spread;
            Price::new(raw)
        }
        OrderKind::Limit | OrderKind::Stop => stated,
    }
}

/// Fill price on exit: spread applied in the opposite direction of entry.
pub fn exit_fill_price(side: Side, raw: Price, spread: Decimal) -> Option<Price> {
    Price::new(raw.value() - side.sign() * spread)
}

/// Notional in the reporting currency. Alt-asset quantities are quoted in a
/// foreign unit and convert at the fixed rate.
pub fn notional(segment: Segment, qty: Qty, price: Price) -> Money {
    let raw = qty.value() * price.value();
    match segment {
        Segment::AltAsset => Money::new(raw * ALT_CONVERSION_RATE),
        _ => Money::new(raw),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginOutcome {
    pub margin: Money,
    pub leverage: Decimal,
}

pub struct MarginInputs<'a> {
    pub segment: Segment,
    pub product: ProductKind,
    pub instrument: InstrumentKind,
    pub symbol_base: &'a str,
    pub category: Option<&'a str>,
    pub lots: Decimal,
    pub qty: Qty,
    pub fill_price: Price,
    pub requested_leverage: Decimal,
}

pub fn required_margin(inputs: &MarginInputs, settings: &ResolvedSettings) -> MarginOutcome {
    let notional = notional(inputs.segment, inputs.qty, inputs.fill_price);

    // rung 1: fixed per-lot table
    if let Some(per_lot) = settings.margin_table.per_lot(
        inputs.category,
        inputs.symbol_base,
        inputs.product,
        inputs.instrument,
    ) {
        return MarginOutcome {
            margin: Money::new(per_lot * inputs.lots),
            leverage: Decimal::ONE,
        };
    }

    // option buys post the full premium regardless of requested leverage
    if inputs.instrument == InstrumentKind::OptionBuy {
        return MarginOutcome {
            margin: notional,
            leverage: Decimal::ONE,
        };
    }

    // delivery products are fully funded
    if inputs.product == ProductKind::Delivery {
        return MarginOutcome {
            margin: notional,
            leverage: Decimal::ONE,
        };
    }

    // rung 2: exposure divisor
    let exposure = settings.permission.exposure(inputs.product);
    if exposure > Decimal::ZERO {
        return MarginOutcome {
            margin: Money::new(notional.value() / exposure),
            leverage: exposure,
        };
    }

    // rung 3: leverage menu fallback
    let leverage = settings
        .leverage
        .effective(inputs.requested_leverage, inputs.product);
    MarginOutcome {
        margin: Money::new(notional.value() / leverage),
        leverage,
    }
}

// 4.1: approximate exchange + statutory exit charges, in basis points of
// closing turnover. the entry side is covered by commission; these apply only
// on the close path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSchedule {
    rates_bps: HashMap<Segment, Decimal>,
}

impl Default for ChargeSchedule {
    fn default() -> Self {
        Self {
            rates_bps: HashMap::from([
                (Segment::Equity, dec!(10)),
                (Segment::Futures, dec!(2)),
                (Segment::Options, dec!(5)),
                (Segment::Commodity, dec!(3)),
                (Segment::AltAsset, dec!(1)),
            ]),
        }
    }
}

impl ChargeSchedule {
    pub fn free() -> Self {
        Self {
            rates_bps: HashMap::new(),
        }
    }

    pub fn set(&mut self, segment: Segment, bps: Decimal) {
        self.rates_bps.insert(segment, bps);
    }

    pub fn exit_charges(&self, segment: Segment, turnover: Money) -> Money {
        let bps = self
            .rates_bps
            .get(&segment)
            .copied()
            .unwrap_or(Decimal::ZERO);
        Money::new(turnover.value() * bps / dec!(10000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{
        FixedMarginTable, LeverageSet, ResolvedSettings, SegmentPermission,
    };
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn settings(exposure_intraday: Decimal, exposure_carry: Decimal) -> ResolvedSettings {
        let mut permission = SegmentPermission::conservative_default();
        permission.trading_enabled = true;
        permission.exposure_intraday = exposure_intraday;
        permission.exposure_carry = exposure_carry;
        ResolvedSettings {
            permission,
            instrument: None,
            caps: HashMap::new(),
            leverage: LeverageSet {
                intraday: vec![dec!(1), dec!(2), dec!(5), dec!(10)],
                carry: vec![dec!(1), dec!(2), dec!(5)],
            },
            margin_table: FixedMarginTable::default(),
        }
    }

    fn quote(bid: Decimal, ask: Decimal) -> TwoSidedQuote {
        TwoSidedQuote::new(Price::new_unchecked(bid), Price::new_unchecked(ask))
    }

    #[test]
    fn market_buy_fills_at_ask_plus_spread() {
        let q = quote(dec!(99), dec!(101));
        let p = entry_fill_price(OrderKind::Market, Side::Long, Some(&q), None, dec!(0.5)).unwrap();
        assert_eq!(p.value(), dec!(101.5));
    }

    #[test]
    fn market_sell_fills_at_bid_minus_spread() {
        let q = quote(dec!(99), dec!(101));
        let p = entry_fill_price(OrderKind::Market, Side::Short, Some(&q), None, dec!(0.5)).unwrap();
        assert_eq!(p.value(), dec!(98.5));
    }

    #[test]
    fn limit_fills_at_stated_price_no_spread() {
        let stated = Price::new_unchecked(dec!(100));
        let p = entry_fill_price(OrderKind::Limit, Side::Long, None, Some(stated), dec!(0.5)).unwrap();
        assert_eq!(p.value(), dec!(100));
    }

    #[test]
    fn market_without_quote_is_unpriceable() {
        assert!(entry_fill_price(OrderKind::Market, Side::Long, None, None, dec!(0)).is_none());
    }

    #[test]
    fn exit_spread_opposes_entry_direction() {
        let raw = Price::new_unchecked(dec!(110));
        let long_exit = exit_fill_price(Side::Long, raw, dec!(0.5)).unwrap();
        assert_eq!(long_exit.value(), dec!(109.5));
        let short_exit = exit_fill_price(Side::Short, raw, dec!(0.5)).unwrap();
        assert_eq!(short_exit.value(), dec!(110.5));
    }

    #[test]
    fn exposure_margin_matches_reference_scenario() {
        // 2 lots of 25 at 100 with exposure 10: notional 5000, margin 500
        let s = settings(dec!(10), dec!(5));
        let out = required_margin(
            &MarginInputs {
                segment: Segment::Futures,
                product: ProductKind::Intraday,
                instrument: InstrumentKind::Future,
                symbol_base: "NIFTY",
                category: None,
                lots: dec!(2),
                qty: Qty::new_unchecked(dec!(50)),
                fill_price: Price::new_unchecked(dec!(100)),
                requested_leverage: dec!(10),
            },
            &s,
        );
        assert_eq!(out.margin.value(), dec!(500));
        assert_eq!(out.leverage, dec!(10));
    }

    #[test]
    fn carry_forward_uses_carry_exposure() {
        let s = settings(dec!(10), dec!(5));
        let out = required_margin(
            &MarginInputs {
                segment: Segment::Futures,
                product: ProductKind::CarryForward,
                instrument: InstrumentKind::Future,
                symbol_base: "NIFTY",
                category: None,
                lots: dec!(2),
                qty: Qty::new_unchecked(dec!(50)),
                fill_price: Price::new_unchecked(dec!(100)),
                requested_leverage: dec!(10),
            },
            &s,
        );
        assert_eq!(out.margin.value(), dec!(1000));
    }

    #[test]
    fn fixed_table_wins_over_exposure() {
        let mut s = settings(dec!(10), dec!(5));
        s.margin_table.set(
            "NIFTY",
            ProductKind::Intraday,
            InstrumentKind::Future,
            dec!(12000),
        );
        let out = required_margin(
            &MarginInputs {
                segment: Segment::Futures,
                product: ProductKind::Intraday,
                instrument: InstrumentKind::Future,
                symbol_base: "NIFTY",
                category: None,
                lots: dec!(2),
                qty: Qty::new_unchecked(dec!(50)),
                fill_price: Price::new_unchecked(dec!(100)),
                requested_leverage: dec!(10),
            },
            &s,
        );
        assert_eq!(out.margin.value(), dec!(24000));
    }

    #[test]
    fn option_buy_posts_full_premium() {
        let s = settings(dec!(10), dec!(5));
        let out = required_margin(
            &MarginInputs {
                segment: Segment::Options,
                product: ProductKind::Intraday,
                instrument: InstrumentKind::OptionBuy,
                symbol_base: "NIFTY",
                category: None,
                lots: dec!(1),
                qty: Qty::new_unchecked(dec!(25)),
                fill_price: Price::new_unchecked(dec!(200)),
                requested_leverage: dec!(10),
            },
            &s,
        );
        // 25 * 200 = 5000 full premium, leverage forced to 1
        assert_eq!(out.margin.value(), dec!(5000));
        assert_eq!(out.leverage, dec!(1));
    }

    #[test]
    fn option_sell_margins_normally() {
        let s = settings(dec!(10), dec!(5));
        let out = required_margin(
            &MarginInputs {
                segment: Segment::Options,
                product: ProductKind::Intraday,
                instrument: InstrumentKind::OptionSell,
                symbol_base: "NIFTY",
                category: None,
                lots: dec!(1),
                qty: Qty::new_unchecked(dec!(25)),
                fill_price: Price::new_unchecked(dec!(200)),
                requested_leverage: dec!(10),
            },
            &s,
        );
        assert_eq!(out.margin.value(), dec!(500));
    }

    #[test]
    fn delivery_requires_full_notional() {
        let s = settings(dec!(0), dec!(0));
        let out = required_margin(
            &MarginInputs {
                segment: Segment::Equity,
                product: ProductKind::Delivery,
                instrument: InstrumentKind::Equity,
                symbol_base: "RELIANCE",
                category: None,
                lots: dec!(10),
                qty: Qty::new_unchecked(dec!(10)),
                fill_price: Price::new_unchecked(dec!(2500)),
                requested_leverage: dec!(5),
            },
            &s,
        );
        assert_eq!(out.margin.value(), dec!(25000));
        assert_eq!(out.leverage, dec!(1));
    }

    #[test]
    fn leverage_fallback_when_no_exposure() {
        let s = settings(dec!(0), dec!(0));
        let out = required_margin(
            &MarginInputs {
                segment: Segment::Futures,
                product: ProductKind::Intraday,
                instrument: InstrumentKind::Future,
                symbol_base: "NIFTY",
                category: None,
                lots: dec!(1),
                qty: Qty::new_unchecked(dec!(25)),
                fill_price: Price::new_unchecked(dec!(100)),
                requested_leverage: dec!(7),
            },
            &s,
        );
        // menu [1,2,5,10], request 7 -> 5x on 2500 notional
        assert_eq!(out.leverage, dec!(5));
        assert_eq!(out.margin.value(), dec!(500));
    }

    #[test]
    fn alt_asset_notional_converts_to_reporting_currency() {
        let n = notional(
            Segment::AltAsset,
            Qty::new_unchecked(dec!(0.5)),
            Price::new_unchecked(dec!(1000)),
        );
        assert_eq!(n.value(), dec!(500) * ALT_CONVERSION_RATE);
    }

    #[test]
    fn exit_charges_in_bps_of_turnover() {
        let schedule = ChargeSchedule::default();
        let charges = schedule.exit_charges(Segment::Futures, Money::new(dec!(100000)));
        // 2 bps of 100k = 20
        assert_eq!(charges.value(), dec!(20));
    }
}
