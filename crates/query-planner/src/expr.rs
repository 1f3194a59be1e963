use query_core::oids::{NEXTVAL_FUNC, REGCLASS_TYPE};
use query_core::Oid;
use serde::{Deserialize, Serialize};

/// A constant value carried by a [`Expr::Const`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Oid(Oid),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

/// Expression tree as stored in default expressions and target lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Const {
        consttype: Oid,
        value: Datum,
    },
    Var {
        varno: u32,
        varattno: i16,
        vartype: Oid,
    },
    Param {
        paramid: u32,
        paramtype: Oid,
    },
    FuncExpr {
        funcid: Oid,
        funcresulttype: Oid,
        args: Vec<Expr>,
    },
    OpExpr {
        opno: Oid,
        opfuncid: Oid,
        args: Vec<Expr>,
    },
    BoolExpr {
        op: BoolOp,
        args: Vec<Expr>,
    },
    /// Binary-compatible cast
    RelabelType {
        arg: Box<Expr>,
        resulttype: Oid,
    },
    CaseExpr {
        arg: Option<Box<Expr>>,
        whens: Vec<(Expr, Expr)>,
        default: Option<Box<Expr>>,
    },
    NullTest {
        arg: Box<Expr>,
        is_null: bool,
    },
}

impl Expr {
    pub fn int4(value: i32) -> Self {
        Expr::Const {
            consttype: 23,
            value: Datum::Int32(value),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::Const {
            consttype: 25,
            value: Datum::Text(value.into()),
        }
    }

    /// `'relid'::regclass`
    pub fn regclass(relid: Oid) -> Self {
        Expr::Const {
            consttype: REGCLASS_TYPE,
            value: Datum::Oid(relid),
        }
    }

    /// `nextval(arg)`, usually with a [`Expr::regclass`] argument
    pub fn nextval(arg: Expr) -> Self {
        Expr::FuncExpr {
            funcid: NEXTVAL_FUNC,
            funcresulttype: 20,
            args: vec![arg],
        }
    }

    pub fn func(funcid: Oid, funcresulttype: Oid, args: Vec<Expr>) -> Self {
        Expr::FuncExpr {
            funcid,
            funcresulttype,
            args,
        }
    }

    /// Direct sub-expressions, in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Const { .. } | Expr::Var { .. } | Expr::Param { .. } => Vec::new(),
            Expr::FuncExpr { args, .. } | Expr::OpExpr { args, .. } | Expr::BoolExpr { args, .. } => {
                args.iter().collect()
            }
            Expr::RelabelType { arg, .. } | Expr::NullTest { arg, .. } => vec![arg.as_ref()],
            Expr::CaseExpr {
                arg,
                whens,
                default,
            } => {
                let mut out: Vec<&Expr> = Vec::new();
                if let Some(arg) = arg {
                    out.push(arg);
                }
                for (cond, result) in whens {
                    out.push(cond);
                    out.push(result);
                }
                if let Some(default) = default {
                    out.push(default);
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nextval_shape() {
        let expr = Expr::nextval(Expr::regclass(16500));
        match &expr {
            Expr::FuncExpr { funcid, args, .. } => {
                assert_eq!(*funcid, NEXTVAL_FUNC);
                assert_eq!(
                    args[0],
                    Expr::Const {
                        consttype: REGCLASS_TYPE,
                        value: Datum::Oid(16500)
                    }
                );
            }
            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn test_children_of_case() {
        let expr = Expr::CaseExpr {
            arg: None,
            whens: vec![(Expr::int4(1), Expr::text("one"))],
            default: Some(Box::new(Expr::nextval(Expr::regclass(16500)))),
        };
        assert_eq!(expr.children().len(), 3);
        assert!(Expr::int4(7).children().is_empty());
    }
}
