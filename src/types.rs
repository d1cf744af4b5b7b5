// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, money, prices, quantities, segments, sides. each is a newtype so the compiler
// catches type mixups, and Money rounds to 2 dp on construction so float-style drift
// can never compound across a calculation chain.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u64);

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

// 1.1: currency amount in the reporting currency. every constructor rounds to
// 2 decimal places, so any chain of Money operations stays on the currency grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn add(&self, other: Money) -> Self {
        Self::new(self.0 + other.0)
    }

    pub fn sub(&self, other: Money) -> Self {
        Self::new(self.0 - other.0)
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self::new(self.0 * factor)
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    // floor at zero. release paths use this so a negative balance is never stored.
    pub fn clamp_floor_zero(&self) -> Self {
        if self.0 < Decimal::ZERO {
            Self(Decimal::ZERO)
        } else {
            *self
        }
    }

    pub fn min(&self, other: Money) -> Self {
        if self.0 <= other.0 {
            *self
        } else {
            other
        }
    }

    pub fn max(&self, other: Money) -> Self {
        if self.0 >= other.0 {
            *self
        } else {
            other
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Money {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc.add(m))
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc.add(*m))
    }
}

// 1.2: price per unit. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: lot-expanded quantity. integral everywhere except the alt-asset pool,
// which allows fractional units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Qty(Decimal);

impl Qty {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_integral(&self) -> bool {
        self.0.fract().is_zero()
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: the canonical segment key set. every inbound segment string is mapped
// onto one of these exactly once, at the boundary. lookups inside the engine
// never match free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Equity,
    Futures,
    Options,
    Commodity,
    AltAsset,
}

impl Segment {
    // alias normalization. legacy names from upstream feeds map onto the
    // canonical set; "FNO" needs the instrument kind to disambiguate.
    // unmapped input yields None and the caller decides what that means.
    pub fn normalize(raw: &str, kind: InstrumentKind) -> Option<Segment> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "EQUITY" | "NSE-EQ" | "NSEEQ" | "EQ" => Some(Segment::Equity),
            "NSEFUT" | "FUTURES" | "FUT" => Some(Segment::Futures),
            "NSEOPT" | "OPTIONS" | "OPT" => Some(Segment::Options),
            "FNO" | "NFO" => {
                if kind.is_option() {
                    Some(Segment::Options)
                } else {
                    Some(Segment::Futures)
                }
            }
            "MCX" | "COMMODITY" | "MCXFUT" | "MCXOPT" => Some(Segment::Commodity),
            "CRYPTO" | "COMEX" | "FOREX" | "ALT" => Some(Segment::AltAsset),
            _ => None,
        }
    }

    pub fn pool(&self) -> PoolKind {
        PoolKind::for_segment(*self)
    }

    pub fn all() -> [Segment; 5] {
        [
            Segment::Equity,
            Segment::Futures,
            Segment::Options,
            Segment::Commodity,
            Segment::AltAsset,
        ]
    }
}

// 1.5: what kind of contract is being traded. drives the margin table key and
// the option-buy/sell commission branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    Equity,
    Future,
    OptionBuy,
    OptionSell,
}

impl InstrumentKind {
    pub fn is_option(&self) -> bool {
        matches!(self, InstrumentKind::OptionBuy | InstrumentKind::OptionSell)
    }
}

// 1.6: intraday squares off same session, carry-forward holds overnight at
// higher margin, delivery is fully funded with no leverage at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    Intraday,
    CarryForward,
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
}

// 1.7: the three segregated balance pools. a trade draws funds from exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolKind {
    Trading,
    AltAsset,
    Commodity,
}

impl PoolKind {
    pub fn for_segment(segment: Segment) -> PoolKind {
        match segment {
            Segment::AltAsset => PoolKind::AltAsset,
            Segment::Commodity => PoolKind::Commodity,
            Segment::Equity | Segment::Futures | Segment::Options => PoolKind::Trading,
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolKind::Trading => "trading",
            PoolKind::AltAsset => "alt-asset",
            PoolKind::Commodity => "commodity",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Pending,
    Open,
    Closed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Manual,
    Netting,
    StopLoss,
    TargetHit,
    Liquidation,
    MarginInsufficient,
    Conversion,
    PendingCancelled,
}

// 1.8: two-sided quote. market buys fill at the ask, market sells at the bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoSidedQuote {
    pub bid: Price,
    pub ask: Price,
}

impl TwoSidedQuote {
    pub fn new(bid: Price, ask: Price) -> Self {
        Self { bid, ask }
    }

    // market entries hit the far side of the book
    pub fn entry_side(&self, side: Side) -> Price {
        match side {
            Side::Long => self.ask,
            Side::Short => self.bid,
        }
    }

    // exits hit the near side: longs sell at the bid, shorts buy back at the ask
    pub fn exit_side(&self, side: Side) -> Price {
        match side {
            Side::Long => self.bid,
            Side::Short => self.ask,
        }
    }

    pub fn mid(&self) -> Price {
        Price::new_unchecked((self.bid.value() + self.ask.value()) / dec!(2))
    }
}

// 1.9: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}
