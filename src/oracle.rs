// 9.0: collaborator seams. the engine consumes a market-open oracle and an
// instrument catalog through traits so the surrounding service can wire real
// feeds; the impls here are the deterministic stand-ins used by tests and the
// simulator.

use crate::types::Segment;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketStatus {
    pub open: bool,
    pub reason: Option<String>,
}

impl MarketStatus {
    pub fn open() -> Self {
        Self {
            open: true,
            reason: None,
        }
    }

    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            open: false,
            reason: Some(reason.into()),
        }
    }
}

pub trait MarketOracle {
    fn is_open(&self, segment: Segment) -> MarketStatus;
}

/// Every segment open, always. Test and simulation default.
#[derive(Debug, Default, Clone)]
pub struct AlwaysOpen;

impl MarketOracle for AlwaysOpen {
    fn is_open(&self, _segment: Segment) -> MarketStatus {
        MarketStatus::open()
    }
}

/// Segments marked closed carry a reason; everything else is open.
#[derive(Debug, Default, Clone)]
pub struct ScheduleOracle {
    closed: HashMap<Segment, String>,
}

impl ScheduleOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close_segment(&mut self, segment: Segment, reason: impl Into<String>) {
        self.closed.insert(segment, reason.into());
    }

    pub fn open_segment(&mut self, segment: Segment) {
        self.closed.remove(&segment);
    }
}

impl MarketOracle for ScheduleOracle {
    fn is_open(&self, segment: Segment) -> MarketStatus {
        match self.closed.get(&segment) {
            Some(reason) => MarketStatus::closed(reason.clone()),
            None => MarketStatus::open(),
        }
    }
}

pub trait InstrumentCatalog {
    fn lot_size(&self, symbol_or_token: &str, segment: Segment) -> Option<u32>;
}

// 9.1: static lot-size fallback. explicit entries first, then ordered
// substring matching with mini-contract variants listed ahead of their
// standard counterparts so "GOLDM" never resolves through "GOLD".
#[derive(Debug, Clone)]
pub struct StaticLotTable {
    explicit: HashMap<String, u32>,
    substrings: Vec<(&'static str, u32)>,
}

impl Default for StaticLotTable {
    fn default() -> Self {
        Self {
            explicit: HashMap::new(),
            substrings: vec![
                ("GOLDPETAL", 1),
                ("GOLDM", 10),
                ("GOLD", 100),
                ("SILVERMIC", 1),
                ("SILVERM", 5),
                ("SILVER", 30),
                ("CRUDEOILM", 10),
                ("CRUDEOIL", 100),
                ("NATURALGAS", 1250),
                ("BANKNIFTY", 15),
                ("FINNIFTY", 25),
                ("MIDCPNIFTY", 50),
                ("NIFTY", 25),
            ],
        }
    }
}

impl StaticLotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, symbol: impl Into<String>, lot_size: u32) -> Self {
        self.explicit.insert(symbol.into(), lot_size);
        self
    }
}

impl InstrumentCatalog for StaticLotTable {
    fn lot_size(&self, symbol_or_token: &str, segment: Segment) -> Option<u32> {
        // alt-asset trades in fractional units; the lot concept collapses to 1
        if segment == Segment::AltAsset {
            return Some(1);
        }
        if let Some(size) = self.explicit.get(symbol_or_token) {
            return Some(*size);
        }
        let upper = symbol_or_token.to_ascii_uppercase();
        self.substrings
            .iter()
            .find(|(pat, _)| upper.contains(pat))
            .map(|(_, size)| *size)
    }
}
