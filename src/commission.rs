// 5.0: commission engine. computes brokerage from resolved settings, clamps it
// to ancestor-imposed caps, and fans the charged amount back up the operator
// hierarchy on trade close.
//
// three commission bases: per lot, per trade, per crore of turnover. caps are
// expressed in the same basis as the raw amount, so per-lot caps scale by lot
// count and per-crore caps scale by turnover before clamping.

use crate::hierarchy::{HierarchyChain, OperatorRole};
use crate::types::{InstrumentKind, Money, OperatorId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CRORE: Decimal = dec!(10_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommissionKind {
    PerLot,
    PerTrade,
    PerCrore,
}

// 5.1: a commission rate with optional option-leg branches. whichever source
// supplied the spec (instrument override or segment default) also supplies the
// option buy/sell split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionSpec {
    pub kind: CommissionKind,
    pub rate: Decimal,
    pub option_buy: Option<Decimal>,
    pub option_sell: Option<Decimal>,
}

impl CommissionSpec {
    pub fn flat(kind: CommissionKind, rate: Decimal) -> Self {
        Self {
            kind,
            rate,
            option_buy: None,
            option_sell: None,
        }
    }

    pub fn free() -> Self {
        Self::flat(CommissionKind::PerTrade, Decimal::ZERO)
    }

    pub fn rate_for(&self, instrument: InstrumentKind) -> Decimal {
        match instrument {
            InstrumentKind::OptionBuy => self.option_buy.unwrap_or(self.rate),
            InstrumentKind::OptionSell => self.option_sell.unwrap_or(self.rate),
            _ => self.rate,
        }
    }
}

// 5.2: raw commission before caps.
pub fn compute_commission(
    spec: &CommissionSpec,
    instrument: InstrumentKind,
    lots: Decimal,
    notional: Money,
) -> Money {
    let rate = spec.rate_for(instrument);
    match spec.kind {
        CommissionKind::PerLot => Money::new(rate * lots),
        CommissionKind::PerTrade => Money::new(rate),
        CommissionKind::PerCrore => Money::new(rate * notional.value() / CRORE),
    }
}

// 5.3: ancestor-imposed bounds, stated in the same basis as the commission
// kind they apply to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrokerageCaps {
    pub min: Decimal,
    pub max: Decimal,
}

pub fn apply_caps(
    raw: Money,
    caps: &HashMap<CommissionKind, BrokerageCaps>,
    kind: CommissionKind,
    lots: Decimal,
    notional: Money,
) -> Money {
    let Some(cap) = caps.get(&kind) else {
        return raw;
    };
    let scale = match kind {
        CommissionKind::PerLot => lots,
        CommissionKind::PerTrade => Decimal::ONE,
        CommissionKind::PerCrore => notional.value() / CRORE,
    };
    let floor = Money::new(cap.min * scale);
    let ceiling = Money::new(cap.max * scale);
    raw.max(floor).min(ceiling)
}

// 5.4: distribution of the charged commission across the hierarchy chain.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SharingMode {
    // each present role takes its percentage of what remains after the levels
    // below it; the top-most present role absorbs the rest
    Cascading,
    // fixed percentages of the original total; absent roles' shares move to
    // the nearest surviving ancestor
    Percentage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    pub enabled: bool,
    pub mode: SharingMode,
    pub shares: HashMap<OperatorRole, Decimal>,
}

impl SharingConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            mode: SharingMode::Percentage,
            shares: HashMap::new(),
        }
    }

    pub fn percentage(shares: HashMap<OperatorRole, Decimal>) -> Self {
        Self {
            enabled: true,
            mode: SharingMode::Percentage,
            shares,
        }
    }

    pub fn cascading(shares: HashMap<OperatorRole, Decimal>) -> Self {
        Self {
            enabled: true,
            mode: SharingMode::Cascading,
            shares,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionCredit {
    pub operator_id: OperatorId,
    pub role: OperatorRole,
    pub amount: Money,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DistributionError {
    #[error("hierarchy chain is empty")]
    EmptyChain,

    #[error("percentage shares sum to {0}, expected 100")]
    SharesDoNotSumTo100(Decimal),
}

/// Split `total` across the chain per the sharing config. Conservation holds
/// exactly: the credits always sum to `total` (the most senior credit takes
/// the rounding remainder).
pub fn distribute(
    total: Money,
    chain: &HierarchyChain,
    config: &SharingConfig,
) -> Result<Vec<CommissionCredit>, DistributionError> {
    let direct = chain.direct().ok_or(DistributionError::EmptyChain)?;

    if total.is_zero() {
        return Ok(Vec::new());
    }

    if !config.enabled {
        return Ok(vec![CommissionCredit {
            operator_id: direct.id,
            role: direct.role,
            amount: total,
        }]);
    }

    // present roles ordered junior to senior
    let present: Vec<(OperatorRole, OperatorId)> = OperatorRole::junior_to_senior()
        .into_iter()
        .filter_map(|role| chain.find_role(role).map(|op| (role, op.id)))
        .collect();

    if present.is_empty() {
        return Err(DistributionError::EmptyChain);
    }

    match config.mode {
        SharingMode::Cascading => Ok(distribute_cascading(total, &present, &config.shares)),
        SharingMode::Percentage => distribute_percentage(total, &present, &config.shares),
    }
}

fn distribute_cascading(
    total: Money,
    present: &[(OperatorRole, OperatorId)],
    shares: &HashMap<OperatorRole, Decimal>,
) -> Vec<CommissionCredit> {
    let mut credits = Vec::with_capacity(present.len());
    let mut remainder = total;

    for (i, (role, operator_id)) in present.iter().enumerate() {
        let amount = if i + 1 == present.len() {
            // top-most present role absorbs whatever is left
            remainder
        } else {
            let pct = shares.get(role).copied().unwrap_or(Decimal::ZERO);
            remainder.mul(pct / dec!(100))
        };
        remainder = remainder.sub(amount);
        credits.push(CommissionCredit {
            operator_id: *operator_id,
            role: *role,
            amount,
        });
    }

    credits
}

fn distribute_percentage(
    total: Money,
    present: &[(OperatorRole, OperatorId)],
    shares: &HashMap<OperatorRole, Decimal>,
) -> Result<Vec<CommissionCredit>, DistributionError> {
    let pct_sum: Decimal = OperatorRole::junior_to_senior()
        .into_iter()
        .map(|r| shares.get(&r).copied().unwrap_or(Decimal::ZERO))
        .sum();
    if pct_sum != dec!(100) {
        return Err(DistributionError::SharesDoNotSumTo100(pct_sum));
    }

    // each absent role's share is reassigned to its nearest surviving ancestor
    // (toward SuperAdmin). an absent role with no surviving ancestor above it
    // hands its share to the most senior present role.
    let mut effective: HashMap<OperatorRole, Decimal> = HashMap::new();
    for (role, _) in present {
        effective.insert(*role, shares.get(role).copied().unwrap_or(Decimal::ZERO));
    }

    let most_senior = present.last().map(|(r, _)| *r).expect("present is non-empty");

    for role in OperatorRole::junior_to_senior() {
        if present.iter().any(|(r, _)| *r == role) {
            continue;
        }
        let orphan_pct = shares.get(&role).copied().unwrap_or(Decimal::ZERO);
        if orphan_pct.is_zero() {
            continue;
        }
        let target = nearest_surviving_ancestor(role, present).unwrap_or(most_senior);
        *effective.entry(target).or_insert(Decimal::ZERO) += orphan_pct;
    }

    let mut credits = Vec::with_capacity(present.len());
    let mut distributed = Money::zero();

    for (i, (role, operator_id)) in present.iter().enumerate() {
        let amount = if i + 1 == present.len() {
            // rounding remainder lands on the most senior role so the credits
            // sum to the total exactly
            total.sub(distributed)
        } else {
            let pct = effective.get(role).copied().unwrap_or(Decimal::ZERO);
            total.mul(pct / dec!(100))
        };
        distributed = distributed.add(amount);
        credits.push(CommissionCredit {
            operator_id: *operator_id,
            role: *role,
            amount,
        });
    }

    Ok(credits)
}

fn nearest_surviving_ancestor(
    absent: OperatorRole,
    present: &[(OperatorRole, OperatorId)],
) -> Option<OperatorRole> {
    present
        .iter()
        .map(|(r, _)| *r)
        .filter(|r| r.seniority() > absent.seniority())
        .min_by_key(|r| r.seniority())
}
