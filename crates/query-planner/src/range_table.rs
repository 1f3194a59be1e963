use crate::expr::Expr;
use query_core::Oid;
use serde::{Deserialize, Serialize};

/// One output column of a query or plan node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub expr: Expr,
    pub resno: i16,
    pub resname: Option<String>,
    /// Internal column the executor needs but the client never sees
    pub resjunk: bool,
}

impl TargetEntry {
    pub fn new(expr: Expr, resno: i16, resname: Option<String>) -> Self {
        Self {
            expr,
            resno,
            resname,
            resjunk: false,
        }
    }

    pub fn junk(expr: Expr, resno: i16) -> Self {
        Self {
            expr,
            resno,
            resname: None,
            resjunk: true,
        }
    }
}

/// The parts of a parsed query the dispatcher walks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub rtable: Vec<RangeTblEntry>,
    pub target_list: Vec<TargetEntry>,
}

impl Query {
    pub fn new(rtable: Vec<RangeTblEntry>, target_list: Vec<TargetEntry>) -> Self {
        Self {
            rtable,
            target_list,
        }
    }
}

/// Range table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RangeTblEntry {
    /// Ordinary relation reference
    Relation { relid: Oid },
    /// Function call in FROM
    Function { funcexpr: Expr },
    /// Subquery in FROM
    Subquery { subquery: Box<Query> },
    /// VALUES (...), (...)
    Values { values_lists: Vec<Vec<Expr>> },
    Join,
    /// Entry left behind by a deleted range table slot
    Void,
    /// NEW/OLD placeholders of a rule action
    Special,
    /// Reference to a common table expression
    Cte { ctename: String },
    TableFunction { funcexpr: Expr },
}

impl RangeTblEntry {
    pub fn relation(relid: Oid) -> Self {
        RangeTblEntry::Relation { relid }
    }

    pub fn subquery(query: Query) -> Self {
        RangeTblEntry::Subquery {
            subquery: Box::new(query),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RangeTblEntry::Relation { .. } => "relation",
            RangeTblEntry::Function { .. } => "function",
            RangeTblEntry::Subquery { .. } => "subquery",
            RangeTblEntry::Values { .. } => "values",
            RangeTblEntry::Join => "join",
            RangeTblEntry::Void => "void",
            RangeTblEntry::Special => "special",
            RangeTblEntry::Cte { .. } => "common table expression",
            RangeTblEntry::TableFunction { .. } => "table function",
        }
    }
}
