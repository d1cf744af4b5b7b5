// 3.0: settings resolution. a user may override segment permissions,
// instrument rules, and leverage arrays; anything not overridden inherits from
// the direct creating operator's policy. resolution happens once per order and
// produces an immutable snapshot, so administrative edits mid-calculation
// cannot shift the ground under an in-flight order.
//
// overrides are tri-state by construction: Setting::Custom is only ever set
// when someone actually edits a value, so precedence never has to guess
// whether an array "looks like" the factory default.

use crate::commission::{BrokerageCaps, CommissionKind, CommissionSpec, SharingConfig};
use crate::hierarchy::HierarchyChain;
use crate::types::{InstrumentKind, ProductKind, Segment, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// 3.1: a single inheritable setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Setting<T> {
    Inherited,
    Custom(T),
}

impl<T> Setting<T> {
    pub fn as_custom(&self) -> Option<&T> {
        match self {
            Setting::Inherited => None,
            Setting::Custom(v) => Some(v),
        }
    }
}

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Setting::Inherited
    }
}

// factory leverage menus. these are what a fresh user document carries; an
// untouched menu stays Inherited and falls through to the operator's policy.
pub fn factory_intraday_leverage() -> Vec<Decimal> {
    vec![dec!(1), dec!(2), dec!(5), dec!(10)]
}

pub fn factory_carry_leverage() -> Vec<Decimal> {
    vec![dec!(1), dec!(2), dec!(5)]
}

// 3.2: what a user may do in one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPermission {
    pub trading_enabled: bool,
    pub commission: CommissionSpec,
    pub max_lots: u32,
    pub min_lots: u32,
    // exposure divisors: margin = notional / exposure
    pub exposure_intraday: Decimal,
    pub exposure_carry: Decimal,
    pub spread: Decimal,
    pub blocked_symbols: Vec<String>,
}

impl SegmentPermission {
    /// Fallback for a segment nobody ever configured. Trading stays disabled:
    /// the default must never silently enable an unconfigured segment.
    pub fn conservative_default() -> Self {
        Self {
            trading_enabled: false,
            commission: CommissionSpec::free(),
            max_lots: 50,
            min_lots: 1,
            exposure_intraday: Decimal::ZERO,
            exposure_carry: Decimal::ZERO,
            spread: Decimal::ZERO,
            blocked_symbols: Vec::new(),
        }
    }

    pub fn exposure(&self, product: ProductKind) -> Decimal {
        match product {
            ProductKind::Intraday => self.exposure_intraday,
            ProductKind::CarryForward | ProductKind::Delivery => self.exposure_carry,
        }
    }
}

// 3.3: per-instrument rules. any field left None falls through to the segment
// permission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstrumentOverride {
    pub blocked: bool,
    pub commission: Option<CommissionSpec>,
    pub max_lots: Option<u32>,
    pub min_lots: Option<u32>,
    pub spread: Option<Decimal>,
}

// 3.4: fixed per-lot margin table. first rung of the margin precedence ladder.
// keyed by instrument group (category or base symbol), product, and contract
// kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedMarginTable {
    entries: HashMap<String, HashMap<(ProductKind, InstrumentKind), Decimal>>,
}

impl FixedMarginTable {
    pub fn set(
        &mut self,
        group: &str,
        product: ProductKind,
        kind: InstrumentKind,
        per_lot: Decimal,
    ) {
        self.entries
            .entry(group.to_string())
            .or_default()
            .insert((product, kind), per_lot);
    }

    pub fn per_lot(
        &self,
        category: Option<&str>,
        symbol_base: &str,
        product: ProductKind,
        kind: InstrumentKind,
    ) -> Option<Decimal> {
        let lookup = |group: &str| {
            self.entries
                .get(group)
                .and_then(|m| m.get(&(product, kind)))
                .copied()
                .filter(|v| !v.is_zero())
        };
        category.and_then(lookup).or_else(|| lookup(symbol_base))
    }
}

// 3.5: user-level overrides. map presence is the override marker for keyed
// settings; leverage menus use the explicit tri-state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    pub segments: HashMap<Segment, SegmentPermission>,
    pub instruments: HashMap<String, InstrumentOverride>,
    pub leverage_intraday: Setting<Vec<Decimal>>,
    pub leverage_carry: Setting<Vec<Decimal>>,
}

// 3.6: operator policy document. the inheritance root for every user the
// operator onboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorPolicy {
    pub segments: HashMap<Segment, SegmentPermission>,
    pub instruments: HashMap<String, InstrumentOverride>,
    pub margin_table: FixedMarginTable,
    pub leverage_intraday: Setting<Vec<Decimal>>,
    pub leverage_carry: Setting<Vec<Decimal>>,
    pub brokerage_caps: HashMap<CommissionKind, BrokerageCaps>,
    pub sharing: SharingConfig,
    pub allow_after_hours: bool,
}

impl Default for OperatorPolicy {
    fn default() -> Self {
        Self {
            segments: HashMap::new(),
            instruments: HashMap::new(),
            margin_table: FixedMarginTable::default(),
            leverage_intraday: Setting::Inherited,
            leverage_carry: Setting::Inherited,
            brokerage_caps: HashMap::new(),
            sharing: SharingConfig::disabled(),
            allow_after_hours: false,
        }
    }
}

// 3.7: resolved leverage menus, intraday and carry-forward independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageSet {
    pub intraday: Vec<Decimal>,
    pub carry: Vec<Decimal>,
}

impl LeverageSet {
    pub fn allowed(&self, product: ProductKind) -> &[Decimal] {
        match product {
            ProductKind::Intraday => &self.intraday,
            ProductKind::CarryForward | ProductKind::Delivery => &self.carry,
        }
    }

    /// Largest allowed leverage not exceeding the request; the smallest menu
    /// entry when the request is below the whole menu.
    pub fn effective(&self, requested: Decimal, product: ProductKind) -> Decimal {
        let menu = self.allowed(product);
        if menu.is_empty() {
            return Decimal::ONE;
        }
        menu.iter()
            .copied()
            .filter(|lv| *lv <= requested)
            .max()
            .unwrap_or_else(|| menu.iter().copied().min().unwrap_or(Decimal::ONE))
    }

    pub fn max(&self, product: ProductKind) -> Decimal {
        self.allowed(product)
            .iter()
            .copied()
            .max()
            .unwrap_or(Decimal::ONE)
    }
}

// 3.8: the per-order settings snapshot.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub permission: SegmentPermission,
    pub instrument: Option<InstrumentOverride>,
    pub caps: HashMap<CommissionKind, BrokerageCaps>,
    pub leverage: LeverageSet,
    pub margin_table: FixedMarginTable,
}

impl ResolvedSettings {
    pub fn commission_spec(&self) -> &CommissionSpec {
        self.instrument
            .as_ref()
            .and_then(|i| i.commission.as_ref())
            .unwrap_or(&self.permission.commission)
    }

    pub fn spread(&self) -> Decimal {
        self.instrument
            .as_ref()
            .and_then(|i| i.spread)
            .unwrap_or(self.permission.spread)
    }

    pub fn max_lots(&self) -> u32 {
        self.instrument
            .as_ref()
            .and_then(|i| i.max_lots)
            .unwrap_or(self.permission.max_lots)
    }

    pub fn min_lots(&self) -> u32 {
        self.instrument
            .as_ref()
            .and_then(|i| i.min_lots)
            .unwrap_or(self.permission.min_lots)
    }

    pub fn instrument_blocked(&self, symbol: &str) -> bool {
        if self.instrument.as_ref().is_some_and(|i| i.blocked) {
            return true;
        }
        self.permission
            .blocked_symbols
            .iter()
            .any(|b| b.eq_ignore_ascii_case(symbol))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("user {0:?} has no resolvable operator")]
    OperatorMissing(UserId),
}

/// Strip the expiry/strike suffix off a derivative symbol: everything from the
/// first digit onward. "NIFTY24AUG19500CE" -> "NIFTY", "M&M24SEPFUT" -> "M&M".
pub fn base_symbol(symbol: &str) -> &str {
    match symbol.find(|c: char| c.is_ascii_digit()) {
        Some(0) | None => symbol,
        Some(idx) => &symbol[..idx],
    }
}

fn lookup_instrument<'a>(
    map: &'a HashMap<String, InstrumentOverride>,
    category: Option<&str>,
    symbol: &str,
) -> Option<&'a InstrumentOverride> {
    // explicit category first, then the literal symbol, then the stripped base
    if let Some(cat) = category {
        if let Some(ov) = map.get(cat) {
            return Some(ov);
        }
    }
    if let Some(ov) = map.get(symbol) {
        return Some(ov);
    }
    map.get(base_symbol(symbol))
}

/// Resolve the effective settings for one order.
pub fn resolve(
    user_id: UserId,
    user: &UserSettings,
    chain: &HierarchyChain,
    segment: Segment,
    symbol: &str,
    category: Option<&str>,
) -> Result<ResolvedSettings, SettingsError> {
    let direct = chain
        .direct()
        .ok_or(SettingsError::OperatorMissing(user_id))?;

    let permission = user
        .segments
        .get(&segment)
        .or_else(|| direct.policy.segments.get(&segment))
        .cloned()
        .unwrap_or_else(SegmentPermission::conservative_default);

    let instrument = lookup_instrument(&user.instruments, category, symbol)
        .or_else(|| lookup_instrument(&direct.policy.instruments, category, symbol))
        .cloned();

    // nearest operator in the chain that imposes caps supplies them
    let caps = chain
        .iter()
        .map(|op| &op.policy.brokerage_caps)
        .find(|caps| !caps.is_empty())
        .cloned()
        .unwrap_or_default();

    let intraday = user
        .leverage_intraday
        .as_custom()
        .or_else(|| direct.policy.leverage_intraday.as_custom())
        .cloned()
        .unwrap_or_else(factory_intraday_leverage);
    let carry = user
        .leverage_carry
        .as_custom()
        .or_else(|| direct.policy.leverage_carry.as_custom())
        .cloned()
        .unwrap_or_else(factory_carry_leverage);

    Ok(ResolvedSettings {
        permission,
        instrument,
        caps,
        leverage: LeverageSet { intraday, carry },
        margin_table: direct.policy.margin_table.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::CommissionKind;
    use crate::hierarchy::{Operator, OperatorRole};
    use crate::types::OperatorId;
    use rust_decimal_macros::dec;

    fn enabled_permission() -> SegmentPermission {
        SegmentPermission {
            trading_enabled: true,
            commission: CommissionSpec::flat(CommissionKind::PerLot, dec!(20)),
            max_lots: 100,
            min_lots: 1,
            exposure_intraday: dec!(10),
            exposure_carry: dec!(5),
            spread: dec!(0.05),
            blocked_symbols: vec![],
        }
    }

    fn chain_with_policy(policy: OperatorPolicy) -> HierarchyChain {
        HierarchyChain::new(vec![Operator::new(
            OperatorId(1),
            "BRK".into(),
            OperatorRole::Broker,
            None,
            policy,
        )])
    }

    #[test]
    fn base_symbol_stripping() {
        assert_eq!(base_symbol("NIFTY24AUG19500CE"), "NIFTY");
        assert_eq!(base_symbol("BANKNIFTY24SEPFUT"), "BANKNIFTY");
        assert_eq!(base_symbol("M&M24SEPFUT"), "M&M");
        assert_eq!(base_symbol("RELIANCE"), "RELIANCE");
        assert_eq!(base_symbol("360ONE"), "360ONE");
    }

    #[test]
    fn unconfigured_segment_falls_back_disabled() {
        let chain = chain_with_policy(OperatorPolicy::default());
        let resolved = resolve(
            UserId(1),
            &UserSettings::default(),
            &chain,
            Segment::Options,
            "NIFTY24AUG19500CE",
            None,
        )
        .unwrap();

        assert!(!resolved.permission.trading_enabled);
        assert_eq!(resolved.permission.max_lots, 50);
        assert!(resolved.commission_spec().rate.is_zero());
    }

    #[test]
    fn user_segment_override_beats_operator_policy() {
        let mut policy = OperatorPolicy::default();
        let mut op_perm = enabled_permission();
        op_perm.max_lots = 100;
        policy.segments.insert(Segment::Futures, op_perm);
        let chain = chain_with_policy(policy);

        let mut user = UserSettings::default();
        let mut user_perm = enabled_permission();
        user_perm.max_lots = 10;
        user.segments.insert(Segment::Futures, user_perm);

        let resolved = resolve(
            UserId(1),
            &user,
            &chain,
            Segment::Futures,
            "NIFTY24AUGFUT",
            None,
        )
        .unwrap();
        assert_eq!(resolved.max_lots(), 10);
    }

    #[test]
    fn instrument_lookup_category_then_symbol_then_base() {
        let mut policy = OperatorPolicy::default();
        policy
            .segments
            .insert(Segment::Options, enabled_permission());
        policy.instruments.insert(
            "NIFTY".into(),
            InstrumentOverride {
                max_lots: Some(5),
                ..Default::default()
            },
        );
        policy.instruments.insert(
            "INDEX-OPT".into(),
            InstrumentOverride {
                max_lots: Some(3),
                ..Default::default()
            },
        );
        let chain = chain_with_policy(policy);
        let user = UserSettings::default();

        // category wins over everything
        let by_category = resolve(
            UserId(1),
            &user,
            &chain,
            Segment::Options,
            "NIFTY24AUG19500CE",
            Some("INDEX-OPT"),
        )
        .unwrap();
        assert_eq!(by_category.max_lots(), 3);

        // no category: strike-suffixed symbol resolves via its base
        let by_base = resolve(
            UserId(1),
            &user,
            &chain,
            Segment::Options,
            "NIFTY24AUG19500CE",
            None,
        )
        .unwrap();
        assert_eq!(by_base.max_lots(), 5);

        // unknown instrument: segment defaults apply
        let none = resolve(
            UserId(1),
            &user,
            &chain,
            Segment::Options,
            "FINNIFTY24AUG20000CE",
            None,
        )
        .unwrap();
        assert!(none.instrument.is_none());
        assert_eq!(none.max_lots(), 100);
    }

    #[test]
    fn inherited_leverage_falls_through_to_operator() {
        let mut policy = OperatorPolicy::default();
        policy.leverage_intraday = Setting::Custom(vec![dec!(1), dec!(20), dec!(40)]);
        let chain = chain_with_policy(policy);

        // user never touched their menu: operator's explicit menu wins
        let resolved = resolve(
            UserId(1),
            &UserSettings::default(),
            &chain,
            Segment::Futures,
            "NIFTY24AUGFUT",
            None,
        )
        .unwrap();
        assert_eq!(resolved.leverage.intraday, vec![dec!(1), dec!(20), dec!(40)]);
        // carry menu was never configured anywhere: factory default
        assert_eq!(resolved.leverage.carry, factory_carry_leverage());
    }

    #[test]
    fn custom_user_leverage_beats_operator() {
        let mut policy = OperatorPolicy::default();
        policy.leverage_intraday = Setting::Custom(vec![dec!(1), dec!(20)]);
        let chain = chain_with_policy(policy);

        let mut user = UserSettings::default();
        user.leverage_intraday = Setting::Custom(vec![dec!(1), dec!(3)]);

        let resolved = resolve(
            UserId(1),
            &user,
            &chain,
            Segment::Futures,
            "NIFTY24AUGFUT",
            None,
        )
        .unwrap();
        assert_eq!(resolved.leverage.intraday, vec![dec!(1), dec!(3)]);
    }

    #[test]
    fn caps_come_from_nearest_imposing_ancestor() {
        let mut parent_policy = OperatorPolicy::default();
        parent_policy.brokerage_caps.insert(
            CommissionKind::PerLot,
            BrokerageCaps {
                min: dec!(10),
                max: dec!(50),
            },
        );
        let chain = HierarchyChain::new(vec![
            Operator::new(
                OperatorId(2),
                "SUB".into(),
                OperatorRole::SubBroker,
                Some(OperatorId(1)),
                OperatorPolicy::default(),
            ),
            Operator::new(
                OperatorId(1),
                "BRK".into(),
                OperatorRole::Broker,
                None,
                parent_policy,
            ),
        ]);

        let resolved = resolve(
            UserId(1),
            &UserSettings::default(),
            &chain,
            Segment::Futures,
            "NIFTY24AUGFUT",
            None,
        )
        .unwrap();
        assert_eq!(
            resolved.caps.get(&CommissionKind::PerLot).unwrap().max,
            dec!(50)
        );
    }

    #[test]
    fn empty_chain_is_operator_missing() {
        let chain = HierarchyChain::new(vec![]);
        let err = resolve(
            UserId(7),
            &UserSettings::default(),
            &chain,
            Segment::Equity,
            "RELIANCE",
            None,
        );
        assert!(matches!(err, Err(SettingsError::OperatorMissing(UserId(7)))));
    }

    #[test]
    fn leverage_effective_picks_largest_not_exceeding() {
        let set = LeverageSet {
            intraday: vec![dec!(1), dec!(2), dec!(5), dec!(10)],
            carry: vec![dec!(1), dec!(2), dec!(5)],
        };
        assert_eq!(set.effective(dec!(7), ProductKind::Intraday), dec!(5));
        assert_eq!(set.effective(dec!(10), ProductKind::Intraday), dec!(10));
        assert_eq!(set.effective(dec!(0.5), ProductKind::Intraday), dec!(1));
        assert_eq!(set.effective(dec!(10), ProductKind::CarryForward), dec!(5));
    }

    #[test]
    fn margin_table_category_before_base() {
        let mut table = FixedMarginTable::default();
        table.set("GOLD", ProductKind::Intraday, InstrumentKind::Future, dec!(20000));
        table.set("BULLION", ProductKind::Intraday, InstrumentKind::Future, dec!(15000));

        let by_cat = table.per_lot(
            Some("BULLION"),
            "GOLD",
            ProductKind::Intraday,
            InstrumentKind::Future,
        );
        assert_eq!(by_cat, Some(dec!(15000)));

        let by_base = table.per_lot(None, "GOLD", ProductKind::Intraday, InstrumentKind::Future);
        assert_eq!(by_base, Some(dec!(20000)));

        let miss = table.per_lot(None, "SILVER", ProductKind::Intraday, InstrumentKind::Future);
        assert_eq!(miss, None);
    }
}
