//! Builtin call table.
//!
//! Comparisons, superlatives, and array operations are all spelled as call
//! expressions in source (`gt(a,b)`, `max(a,b)`, `arr_new(n)`). The parser
//! stays uniform; the emitter dispatches on the entries here.

use crate::ir::Instr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Eq,
    Ne,
    Ge,
    Le,
}

impl CmpOp {
    /// Signed comparison, 1 for true and 0 for false. This is the same
    /// result the VM computes at runtime, so folded comparisons agree with
    /// executed ones.
    pub fn eval(self, lhs: i64, rhs: i64) -> i64 {
        let holds = match self {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Le => lhs <= rhs,
        };
        i64::from(holds)
    }

    pub fn instr(self) -> Instr {
        match self {
            CmpOp::Gt => Instr::CmpGt,
            CmpOp::Lt => Instr::CmpLt,
            CmpOp::Eq => Instr::CmpEq,
            CmpOp::Ne => Instr::CmpNe,
            CmpOp::Ge => Instr::CmpGe,
            CmpOp::Le => Instr::CmpLe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Max,
    Min,
    Cmp(CmpOp),
    EverExact,
    UtterlyInline,
    ArrNew,
    ArrGet,
    ArrSet,
    ArrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variadic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub kind: BuiltinKind,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "max",
        arity: Arity::Exact(2),
        kind: BuiltinKind::Max,
    },
    Builtin {
        name: "min",
        arity: Arity::Exact(2),
        kind: BuiltinKind::Min,
    },
    Builtin {
        name: "gt",
        arity: Arity::Exact(2),
        kind: BuiltinKind::Cmp(CmpOp::Gt),
    },
    Builtin {
        name: "lt",
        arity: Arity::Exact(2),
        kind: BuiltinKind::Cmp(CmpOp::Lt),
    },
    Builtin {
        name: "eq",
        arity: Arity::Exact(2),
        kind: BuiltinKind::Cmp(CmpOp::Eq),
    },
    Builtin {
        name: "ne",
        arity: Arity::Exact(2),
        kind: BuiltinKind::Cmp(CmpOp::Ne),
    },
    Builtin {
        name: "ge",
        arity: Arity::Exact(2),
        kind: BuiltinKind::Cmp(CmpOp::Ge),
    },
    Builtin {
        name: "le",
        arity: Arity::Exact(2),
        kind: BuiltinKind::Cmp(CmpOp::Le),
    },
    Builtin {
        name: "ever_exact",
        arity: Arity::Exact(1),
        kind: BuiltinKind::EverExact,
    },
    Builtin {
        name: "utterly_inline",
        arity: Arity::Exact(1),
        kind: BuiltinKind::UtterlyInline,
    },
    Builtin {
        name: "arr_new",
        arity: Arity::Exact(1),
        kind: BuiltinKind::ArrNew,
    },
    Builtin {
        name: "arr_get",
        arity: Arity::Exact(2),
        kind: BuiltinKind::ArrGet,
    },
    Builtin {
        name: "arr_set",
        arity: Arity::Exact(3),
        kind: BuiltinKind::ArrSet,
    },
    Builtin {
        name: "arr_of",
        arity: Arity::Variadic,
        kind: BuiltinKind::ArrOf,
    },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

/// True for the builtins whose result is an array handle. Used to infer the
/// type of an implicit `let` from its right-hand side.
pub fn returns_array(name: &str) -> bool {
    matches!(
        lookup(name).map(|builtin| builtin.kind),
        Some(BuiltinKind::ArrNew | BuiltinKind::ArrSet | BuiltinKind::ArrOf)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_builtins() {
        let max = lookup("max").expect("max is a builtin");
        assert_eq!(max.arity, Arity::Exact(2));
        assert_eq!(max.kind, BuiltinKind::Max);
        assert!(lookup("report").is_none());
    }

    #[test]
    fn array_constructors_return_arrays() {
        assert!(returns_array("arr_new"));
        assert!(returns_array("arr_set"));
        assert!(returns_array("arr_of"));
        assert!(!returns_array("arr_get"));
        assert!(!returns_array("max"));
    }

    #[test]
    fn comparison_eval_is_signed() {
        assert_eq!(CmpOp::Gt.eval(5, 3), 1);
        assert_eq!(CmpOp::Gt.eval(-1, 3), 0);
        assert_eq!(CmpOp::Le.eval(-1, -1), 1);
        assert_eq!(CmpOp::Ne.eval(2, 2), 0);
    }
}
