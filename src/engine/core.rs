// 11.1: engine state and administrative operations. the engine owns all users,
// operators, and trades, runs on a caller-driven logical clock, and mutates
// nothing except through the operation methods in the sibling modules.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::hierarchy::{Operator, OperatorDirectory};
use crate::ledger::{LedgerEntry, LedgerOwner, LedgerReason, LedgerSink, MemoryLedger};
use crate::oracle::{AlwaysOpen, InstrumentCatalog, MarketOracle, StaticLotTable};
use crate::trade::Trade;
use crate::types::{Money, OperatorId, PoolKind, Timestamp, TradeId, UserId};
use crate::user::User;
use std::collections::BTreeMap;

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) operators: OperatorDirectory,
    pub(crate) trades: BTreeMap<TradeId, Trade>,
    pub(crate) ledger: MemoryLedger,
    pub(crate) oracle: Box<dyn MarketOracle>,
    pub(crate) catalog: Box<dyn InstrumentCatalog>,
    next_trade_id: u64,
    next_user_id: u64,
    clock: Timestamp,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_collaborators(config, Box::new(AlwaysOpen), Box::new(StaticLotTable::new()))
    }

    pub fn with_collaborators(
        config: EngineConfig,
        oracle: Box<dyn MarketOracle>,
        catalog: Box<dyn InstrumentCatalog>,
    ) -> Self {
        Self {
            config,
            users: BTreeMap::new(),
            operators: OperatorDirectory::new(),
            trades: BTreeMap::new(),
            ledger: MemoryLedger::new(),
            oracle,
            catalog,
            next_trade_id: 1,
            next_user_id: 1,
            clock: Timestamp::from_millis(0),
        }
    }

    // -- clock --------------------------------------------------------------

    pub fn now(&self) -> Timestamp {
        self.clock
    }

    pub fn set_time(&mut self, at: Timestamp) {
        self.clock = at;
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.clock = Timestamp::from_millis(self.clock.as_millis() + millis);
    }

    // -- operators ----------------------------------------------------------

    pub fn add_operator(&mut self, operator: Operator) {
        self.operators.insert(operator);
    }

    pub fn operator(&self, id: OperatorId) -> Option<&Operator> {
        self.operators.find(id)
    }

    // -- users --------------------------------------------------------------

    pub fn create_user(&mut self, operator_id: OperatorId) -> UserId {
        let id = UserId(self.next_user_id);
        self.next_user_id += 1;
        self.users.insert(id, User::new(id, operator_id, self.clock));
        id
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn deactivate_user(&mut self, id: UserId) -> Result<(), EngineError> {
        self.require_user_mut(id)?.active = false;
        Ok(())
    }

    /// Mutable access to a user's override document, for administrative edits.
    pub fn user_settings_mut(
        &mut self,
        id: UserId,
    ) -> Result<&mut crate::settings::UserSettings, EngineError> {
        Ok(&mut self.require_user_mut(id)?.settings)
    }

    pub fn deposit(
        &mut self,
        user_id: UserId,
        pool: PoolKind,
        amount: Money,
    ) -> Result<Money, EngineError> {
        let at = self.clock;
        let user = self.require_user_mut(user_id)?;
        user.balances.deposit(pool, amount);
        let after = user.balances.balance(pool);
        self.record(LedgerOwner::User(user_id), None, amount, LedgerReason::Deposit, after, at);
        Ok(after)
    }

    // -- trades -------------------------------------------------------------

    pub fn trade(&self, id: TradeId) -> Option<&Trade> {
        self.trades.get(&id)
    }

    pub(crate) fn allocate_trade_id(&mut self) -> TradeId {
        let id = TradeId(self.next_trade_id);
        self.next_trade_id += 1;
        id
    }

    // -- ledger -------------------------------------------------------------

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Replay every accepted entry into an external sink.
    pub fn export_ledger(&self, sink: &mut dyn LedgerSink) {
        for entry in self.ledger.entries() {
            sink.append(entry.clone());
        }
    }

    pub(crate) fn record(
        &mut self,
        owner: LedgerOwner,
        trade: Option<TradeId>,
        amount: Money,
        reason: LedgerReason,
        balance_after: Money,
        at: Timestamp,
    ) {
        LedgerSink::append(
            &mut self.ledger,
            LedgerEntry {
                owner,
                trade,
                amount,
                reason,
                balance_after,
                at,
            },
        );
    }

    // -- lookups with typed errors -------------------------------------------

    pub(crate) fn require_user(&self, id: UserId) -> Result<&User, EngineError> {
        self.users.get(&id).ok_or(EngineError::UserNotFound(id))
    }

    pub(crate) fn require_user_mut(&mut self, id: UserId) -> Result<&mut User, EngineError> {
        self.users.get_mut(&id).ok_or(EngineError::UserNotFound(id))
    }

    pub(crate) fn require_trade(&self, id: TradeId) -> Result<&Trade, EngineError> {
        self.trades.get(&id).ok_or(EngineError::TradeNotFound(id))
    }
}
