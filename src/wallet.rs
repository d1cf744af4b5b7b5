// 6.0: wallet router. three segregated pools per user: the trading wallet
// (balance + blocked margin), the commodity wallet (same shape), and the
// alt-asset wallet (plain cash, trades fully pre-funded, no margin concept).
//
// every mutation is a relative increment with its precondition re-checked
// immediately before the write, and no operation leaves a pool partially
// mutated. release paths clamp at zero: a negative balance is never stored.

use crate::types::{Money, PoolKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginWallet {
    pub balance: Money,
    pub used_margin: Money,
}

impl MarginWallet {
    pub fn available(&self) -> Money {
        self.balance.sub(self.used_margin)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashWallet {
    pub balance: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserBalances {
    pub trading: MarginWallet,
    pub alt: CashWallet,
    pub commodity: MarginWallet,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("insufficient funds in {pool} pool: required {required}, available {available}")]
    InsufficientFunds {
        pool: PoolKind,
        required: Money,
        available: Money,
    },
}

impl UserBalances {
    pub fn available(&self, pool: PoolKind) -> Money {
        match pool {
            PoolKind::Trading => self.trading.available(),
            PoolKind::Commodity => self.commodity.available(),
            PoolKind::AltAsset => self.alt.balance,
        }
    }

    pub fn balance(&self, pool: PoolKind) -> Money {
        match pool {
            PoolKind::Trading => self.trading.balance,
            PoolKind::Commodity => self.commodity.balance,
            PoolKind::AltAsset => self.alt.balance,
        }
    }

    pub fn used_margin(&self, pool: PoolKind) -> Money {
        match pool {
            PoolKind::Trading => self.trading.used_margin,
            PoolKind::Commodity => self.commodity.used_margin,
            PoolKind::AltAsset => Money::zero(),
        }
    }

    pub fn deposit(&mut self, pool: PoolKind, amount: Money) {
        match pool {
            PoolKind::Trading => self.trading.balance = self.trading.balance.add(amount),
            PoolKind::Commodity => self.commodity.balance = self.commodity.balance.add(amount),
            PoolKind::AltAsset => self.alt.balance = self.alt.balance.add(amount),
        }
    }

    /// Reserve funds for a new trade: block `margin` and deduct `commission`.
    /// For the alt-asset pool `margin` is the full pre-funded cost and both
    /// amounts come straight off the balance.
    pub fn reserve(
        &mut self,
        pool: PoolKind,
        margin: Money,
        commission: Money,
    ) -> Result<(), WalletError> {
        let required = margin.add(commission);
        let available = self.available(pool);
        if available < required {
            return Err(WalletError::InsufficientFunds {
                pool,
                required,
                available,
            });
        }
        match pool {
            PoolKind::Trading => {
                self.trading.used_margin = self.trading.used_margin.add(margin);
                self.trading.balance = self.trading.balance.sub(commission);
            }
            PoolKind::Commodity => {
                self.commodity.used_margin = self.commodity.used_margin.add(margin);
                self.commodity.balance = self.commodity.balance.sub(commission);
            }
            PoolKind::AltAsset => {
                self.alt.balance = self.alt.balance.sub(required);
            }
        }
        Ok(())
    }

    /// Release a closed/cancelled trade's margin and settle its net P&L.
    pub fn release(&mut self, pool: PoolKind, margin: Money, pnl: Money) {
        match pool {
            PoolKind::Trading => {
                self.trading.used_margin =
                    self.trading.used_margin.sub(margin).clamp_floor_zero();
                self.trading.balance = self.trading.balance.add(pnl).clamp_floor_zero();
            }
            PoolKind::Commodity => {
                self.commodity.used_margin =
                    self.commodity.used_margin.sub(margin).clamp_floor_zero();
                self.commodity.balance = self.commodity.balance.add(pnl).clamp_floor_zero();
            }
            PoolKind::AltAsset => {
                // pre-funded cost comes back with the pnl
                self.alt.balance = self.alt.balance.add(margin).add(pnl).clamp_floor_zero();
            }
        }
    }

    /// Block additional margin on an already-open trade (conversion shortfall).
    pub fn block_additional_margin(
        &mut self,
        pool: PoolKind,
        delta: Money,
    ) -> Result<(), WalletError> {
        let available = self.available(pool);
        if available < delta {
            return Err(WalletError::InsufficientFunds {
                pool,
                required: delta,
                available,
            });
        }
        match pool {
            PoolKind::Trading => self.trading.used_margin = self.trading.used_margin.add(delta),
            PoolKind::Commodity => {
                self.commodity.used_margin = self.commodity.used_margin.add(delta)
            }
            PoolKind::AltAsset => self.alt.balance = self.alt.balance.sub(delta),
        }
        Ok(())
    }

    /// Credit a pool balance directly (profit realization outside close).
    pub fn credit(&mut self, pool: PoolKind, amount: Money) {
        match pool {
            PoolKind::Trading => {
                self.trading.balance = self.trading.balance.add(amount).clamp_floor_zero()
            }
            PoolKind::Commodity => {
                self.commodity.balance = self.commodity.balance.add(amount).clamp_floor_zero()
            }
            PoolKind::AltAsset => {
                self.alt.balance = self.alt.balance.add(amount).clamp_floor_zero()
            }
        }
    }

    /// Reconciliation repair: force a pool's used margin to the recomputed
    /// true figure. Returns the applied delta.
    pub fn set_used_margin(&mut self, pool: PoolKind, true_total: Money) -> Money {
        let clamped = true_total.clamp_floor_zero();
        match pool {
            PoolKind::Trading => {
                let delta = clamped.sub(self.trading.used_margin);
                self.trading.used_margin = clamped;
                delta
            }
            PoolKind::Commodity => {
                let delta = clamped.sub(self.commodity.used_margin);
                self.commodity.used_margin = clamped;
                delta
            }
            PoolKind::AltAsset => Money::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn funded() -> UserBalances {
        let mut b = UserBalances::default();
        b.deposit(PoolKind::Trading, Money::new(dec!(100000)));
        b.deposit(PoolKind::Commodity, Money::new(dec!(50000)));
        b.deposit(PoolKind::AltAsset, Money::new(dec!(20000)));
        b
    }

    #[test]
    fn reserve_blocks_margin_and_deducts_commission() {
        let mut b = funded();
        b.reserve(PoolKind::Trading, Money::new(dec!(500)), Money::new(dec!(20)))
            .unwrap();

        assert_eq!(b.trading.used_margin.value(), dec!(500));
        assert_eq!(b.trading.balance.value(), dec!(99980));
        assert_eq!(b.available(PoolKind::Trading).value(), dec!(99480));
    }

    #[test]
    fn reserve_rejects_insufficient_funds_without_mutation() {
        let mut b = funded();
        let before = b.clone();
        let err = b.reserve(
            PoolKind::Trading,
            Money::new(dec!(99990)),
            Money::new(dec!(20)),
        );
        assert!(matches!(
            err,
            Err(WalletError::InsufficientFunds {
                pool: PoolKind::Trading,
                ..
            })
        ));
        assert_eq!(b, before);
    }

    #[test]
    fn alt_pool_prefunds_cost_plus_commission() {
        let mut b = funded();
        b.reserve(PoolKind::AltAsset, Money::new(dec!(5000)), Money::new(dec!(50)))
            .unwrap();
        assert_eq!(b.alt.balance.value(), dec!(14950));

        // close at a 100 profit: cost comes back with the pnl
        b.release(PoolKind::AltAsset, Money::new(dec!(5000)), Money::new(dec!(100)));
        assert_eq!(b.alt.balance.value(), dec!(20050));
    }

    #[test]
    fn release_returns_margin_and_applies_pnl() {
        let mut b = funded();
        b.reserve(PoolKind::Trading, Money::new(dec!(500)), Money::zero())
            .unwrap();
        b.release(PoolKind::Trading, Money::new(dec!(500)), Money::new(dec!(480)));

        assert_eq!(b.trading.used_margin.value(), dec!(0));
        assert_eq!(b.trading.balance.value(), dec!(100480));
    }

    #[test]
    fn release_clamps_at_zero() {
        let mut b = UserBalances::default();
        b.deposit(PoolKind::Trading, Money::new(dec!(100)));
        b.reserve(PoolKind::Trading, Money::new(dec!(100)), Money::zero())
            .unwrap();

        // a loss larger than the balance floors at zero rather than going negative
        b.release(PoolKind::Trading, Money::new(dec!(100)), Money::new(dec!(-500)));
        assert_eq!(b.trading.balance.value(), dec!(0));
        assert_eq!(b.trading.used_margin.value(), dec!(0));
    }

    #[test]
    fn commodity_pool_is_segregated_from_trading() {
        let mut b = funded();
        b.reserve(PoolKind::Commodity, Money::new(dec!(1000)), Money::new(dec!(10)))
            .unwrap();

        assert_eq!(b.commodity.used_margin.value(), dec!(1000));
        assert_eq!(b.trading.used_margin.value(), dec!(0));
        assert_eq!(b.trading.balance.value(), dec!(100000));
    }

    #[test]
    fn block_additional_margin_checks_availability() {
        let mut b = funded();
        b.block_additional_margin(PoolKind::Trading, Money::new(dec!(40000)))
            .unwrap();
        assert_eq!(b.trading.used_margin.value(), dec!(40000));

        let err = b.block_additional_margin(PoolKind::Trading, Money::new(dec!(70000)));
        assert!(err.is_err());
        assert_eq!(b.trading.used_margin.value(), dec!(40000));
    }

    #[test]
    fn set_used_margin_reports_delta() {
        let mut b = funded();
        b.reserve(PoolKind::Trading, Money::new(dec!(500)), Money::zero())
            .unwrap();

        // drift: wallet says 500 but true total is 300
        let delta = b.set_used_margin(PoolKind::Trading, Money::new(dec!(300)));
        assert_eq!(delta.value(), dec!(-200));
        assert_eq!(b.trading.used_margin.value(), dec!(300));
    }
}
