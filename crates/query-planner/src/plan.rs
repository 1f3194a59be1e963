use crate::range_table::TargetEntry;
use query_core::Oid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    Result,
    SeqScan { scanrelid: u32 },
    AppendOnlyScan { scanrelid: u32 },
    ExternalScan { scanrelid: u32 },
    Append,
    NestLoop,
    HashJoin,
    Hash,
    Sort,
    Agg,
    Motion,
    Insert { relid: Oid },
}

/// Plan tree node. Only the target list and the two children matter to
/// catalog dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub node: PlanNode,
    pub target_list: Vec<TargetEntry>,
    pub lefttree: Option<Box<Plan>>,
    pub righttree: Option<Box<Plan>>,
}

impl Plan {
    pub fn new(node: PlanNode, target_list: Vec<TargetEntry>) -> Self {
        Self {
            node,
            target_list,
            lefttree: None,
            righttree: None,
        }
    }

    pub fn with_left(mut self, plan: Plan) -> Self {
        self.lefttree = Some(Box::new(plan));
        self
    }

    pub fn with_right(mut self, plan: Plan) -> Self {
        self.righttree = Some(Box::new(plan));
        self
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + self.lefttree.as_ref().map_or(0, |p| p.node_count())
            + self.righttree.as_ref().map_or(0, |p| p.node_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    #[test]
    fn test_plan_builder() {
        let scan = Plan::new(PlanNode::SeqScan { scanrelid: 1 }, Vec::new());
        let hash = Plan::new(PlanNode::Hash, Vec::new()).with_left(scan.clone());
        let join = Plan::new(
            PlanNode::HashJoin,
            vec![TargetEntry::new(Expr::int4(1), 1, None)],
        )
        .with_left(scan)
        .with_right(hash);

        assert_eq!(join.node_count(), 4);
        assert!(join.lefttree.is_some());
        assert_eq!(join.target_list.len(), 1);
    }
}
