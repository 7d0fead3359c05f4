use minilang_dsl::ast::{BinOp, CmpOp};

/// Constraint term over integer symbols.
///
/// Arithmetic and comparison nodes reuse the source language's operators,
/// so a program expression maps onto one node per operator. Every
/// comparison, including `==`, is between integers.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    Var(String),
    Int(i64),
    Bool(bool),
    /// `Div` is Euclidean, matching SMT-LIB `div`.
    Arith(BinOp, Box<SmtTerm>, Box<SmtTerm>),
    Compare(CmpOp, Box<SmtTerm>, Box<SmtTerm>),
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::Int(n)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::Bool(b)
    }

    pub fn arith(op: BinOp, lhs: SmtTerm, rhs: SmtTerm) -> Self {
        SmtTerm::Arith(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn compare(op: CmpOp, lhs: SmtTerm, rhs: SmtTerm) -> Self {
        SmtTerm::Compare(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn add(self, rhs: SmtTerm) -> Self {
        Self::arith(BinOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: SmtTerm) -> Self {
        Self::arith(BinOp::Sub, self, rhs)
    }

    pub fn mul(self, rhs: SmtTerm) -> Self {
        Self::arith(BinOp::Mul, self, rhs)
    }

    pub fn div(self, rhs: SmtTerm) -> Self {
        Self::arith(BinOp::Div, self, rhs)
    }

    pub fn eq(self, rhs: SmtTerm) -> Self {
        Self::compare(CmpOp::Eq, self, rhs)
    }

    pub fn ne(self, rhs: SmtTerm) -> Self {
        Self::compare(CmpOp::Ne, self, rhs)
    }

    pub fn lt(self, rhs: SmtTerm) -> Self {
        Self::compare(CmpOp::Lt, self, rhs)
    }

    pub fn le(self, rhs: SmtTerm) -> Self {
        Self::compare(CmpOp::Le, self, rhs)
    }

    pub fn gt(self, rhs: SmtTerm) -> Self {
        Self::compare(CmpOp::Gt, self, rhs)
    }

    pub fn ge(self, rhs: SmtTerm) -> Self {
        Self::compare(CmpOp::Ge, self, rhs)
    }

    pub fn and(conjuncts: Vec<SmtTerm>) -> Self {
        SmtTerm::And(conjuncts)
    }

    pub fn or(disjuncts: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(disjuncts)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, consequent: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(consequent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_operators_map_to_single_nodes() {
        let t = SmtTerm::var("a").ne(SmtTerm::int(1));
        assert_eq!(
            t,
            SmtTerm::Compare(CmpOp::Ne, Box::new(SmtTerm::var("a")), Box::new(SmtTerm::Int(1)))
        );
        assert!(matches!(
            SmtTerm::var("a").div(SmtTerm::int(2)),
            SmtTerm::Arith(BinOp::Div, _, _)
        ));
    }
}
