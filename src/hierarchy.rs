// 2.0: operator hierarchy. operators form a tree (super-admin at the root,
// sub-brokers at the leaves) and every user hangs off exactly one operator.
// the tree may skip roles for any given user, so chain walks never assume a
// level is present.

use crate::settings::OperatorPolicy;
use crate::types::{Money, OperatorId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorRole {
    SuperAdmin,
    Admin,
    Broker,
    SubBroker,
}

impl OperatorRole {
    // higher = closer to the root
    pub fn seniority(&self) -> u8 {
        match self {
            OperatorRole::SubBroker => 0,
            OperatorRole::Broker => 1,
            OperatorRole::Admin => 2,
            OperatorRole::SuperAdmin => 3,
        }
    }

    pub fn junior_to_senior() -> [OperatorRole; 4] {
        [
            OperatorRole::SubBroker,
            OperatorRole::Broker,
            OperatorRole::Admin,
            OperatorRole::SuperAdmin,
        ]
    }
}

// 2.1: operator record. the operator is the economic counterparty of every
// book-kept trade, so it carries running book P&L and commission tallies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub code: String,
    pub role: OperatorRole,
    pub parent: Option<OperatorId>,
    pub policy: OperatorPolicy,
    pub book_pnl: Money,
    pub commission_earned: Money,
}

impl Operator {
    pub fn new(
        id: OperatorId,
        code: String,
        role: OperatorRole,
        parent: Option<OperatorId>,
        policy: OperatorPolicy,
    ) -> Self {
        Self {
            id,
            code,
            role,
            parent,
            policy,
            book_pnl: Money::zero(),
            commission_earned: Money::zero(),
        }
    }
}

// 2.2: a resolved leaf-to-root chain, snapshotted at order time so
// administrative edits mid-calculation cannot shift the ground under an order.
#[derive(Debug, Clone)]
pub struct HierarchyChain {
    operators: Vec<Operator>,
}

impl HierarchyChain {
    pub fn new(operators: Vec<Operator>) -> Self {
        Self { operators }
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// The user's direct creating operator (leaf end of the chain).
    pub fn direct(&self) -> Option<&Operator> {
        self.operators.first()
    }

    /// Nearest operator in the chain holding the given role.
    pub fn find_role(&self, role: OperatorRole) -> Option<&Operator> {
        self.operators.iter().find(|op| op.role == role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operator> {
        self.operators.iter()
    }
}

// 2.3: all operators, indexed by id and code.
#[derive(Debug, Clone, Default)]
pub struct OperatorDirectory {
    by_id: HashMap<OperatorId, Operator>,
    code_index: HashMap<String, OperatorId>,
}

impl OperatorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, operator: Operator) {
        self.code_index.insert(operator.code.clone(), operator.id);
        self.by_id.insert(operator.id, operator);
    }

    pub fn find(&self, id: OperatorId) -> Option<&Operator> {
        self.by_id.get(&id)
    }

    pub fn find_mut(&mut self, id: OperatorId) -> Option<&mut Operator> {
        self.by_id.get_mut(&id)
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Operator> {
        self.code_index.get(code).and_then(|id| self.by_id.get(id))
    }

    /// Walk parent pointers from `start` to the root, cloning each record into
    /// a chain snapshot. A broken parent pointer or a cycle ends the walk at
    /// the last sound operator.
    pub fn chain_for(&self, start: OperatorId) -> HierarchyChain {
        let mut chain = Vec::new();
        let mut seen: Vec<OperatorId> = Vec::new();
        let mut cursor = Some(start);

        while let Some(id) = cursor {
            if seen.contains(&id) {
                break;
            }
            seen.push(id);
            match self.by_id.get(&id) {
                Some(op) => {
                    chain.push(op.clone());
                    cursor = op.parent;
                }
                None => break,
            }
        }

        HierarchyChain::new(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::OperatorPolicy;

    fn op(id: u32, role: OperatorRole, parent: Option<u32>) -> Operator {
        Operator::new(
            OperatorId(id),
            format!("OP{id}"),
            role,
            parent.map(OperatorId),
            OperatorPolicy::default(),
        )
    }

    fn directory() -> OperatorDirectory {
        let mut dir = OperatorDirectory::new();
        dir.insert(op(1, OperatorRole::SuperAdmin, None));
        dir.insert(op(2, OperatorRole::Admin, Some(1)));
        dir.insert(op(3, OperatorRole::Broker, Some(2)));
        dir.insert(op(4, OperatorRole::SubBroker, Some(3)));
        dir
    }

    #[test]
    fn chain_walks_leaf_to_root() {
        let dir = directory();
        let chain = dir.chain_for(OperatorId(4));

        let roles: Vec<OperatorRole> = chain.iter().map(|o| o.role).collect();
        assert_eq!(
            roles,
            vec![
                OperatorRole::SubBroker,
                OperatorRole::Broker,
                OperatorRole::Admin,
                OperatorRole::SuperAdmin,
            ]
        );
        assert_eq!(chain.direct().unwrap().id, OperatorId(4));
    }

    #[test]
    fn chain_with_missing_intermediate_roles() {
        let mut dir = OperatorDirectory::new();
        dir.insert(op(1, OperatorRole::SuperAdmin, None));
        // broker reports straight to superadmin; admin level skipped
        dir.insert(op(3, OperatorRole::Broker, Some(1)));

        let chain = dir.chain_for(OperatorId(3));
        assert!(chain.find_role(OperatorRole::Admin).is_none());
        assert!(chain.find_role(OperatorRole::Broker).is_some());
        assert!(chain.find_role(OperatorRole::SuperAdmin).is_some());
    }

    #[test]
    fn chain_survives_parent_cycle() {
        let mut dir = OperatorDirectory::new();
        dir.insert(op(1, OperatorRole::Admin, Some(2)));
        dir.insert(op(2, OperatorRole::Broker, Some(1)));

        let chain = dir.chain_for(OperatorId(1));
        assert_eq!(chain.iter().count(), 2);
    }

    #[test]
    fn find_by_code() {
        let dir = directory();
        assert_eq!(dir.find_by_code("OP3").unwrap().id, OperatorId(3));
        assert!(dir.find_by_code("NOPE").is_none());
    }
}
