// 10.0: end-user record. balances across the three pools, optional settings
// overrides, and the pointer to the direct creating operator that anchors the
// hierarchy chain.

use crate::settings::UserSettings;
use crate::types::{OperatorId, Timestamp, UserId};
use crate::wallet::UserBalances;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub operator_id: OperatorId,
    pub balances: UserBalances,
    pub settings: UserSettings,
    pub active: bool,
    pub created_at: Timestamp,
}

impl User {
    pub fn new(id: UserId, operator_id: OperatorId, timestamp: Timestamp) -> Self {
        Self {
            id,
            operator_id,
            balances: UserBalances::default(),
            settings: UserSettings::default(),
            active: true,
            created_at: timestamp,
        }
    }
}
