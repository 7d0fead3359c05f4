/// Source span for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A whole program: the top-level statement sequence.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    /// True when no `for`/`while` appears anywhere, including inside branches.
    pub fn is_loop_free(&self) -> bool {
        self.statements.iter().all(Stmt::is_loop_free)
    }
}

/// Statement. `For` and `While` only exist before unrolling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Stmt {
    Assign {
        target: String,
        value: Expr,
        span: Span,
    },
    If {
        condition: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
        span: Span,
    },
    Assert {
        condition: Expr,
        span: Span,
    },
    For {
        init: Box<Stmt>,
        condition: Expr,
        update: Box<Stmt>,
        body: Vec<Stmt>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
}

impl Stmt {
    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            target: target.into(),
            value,
            span: Span::default(),
        }
    }

    pub fn if_then(condition: Expr, then_block: Vec<Stmt>, else_block: Option<Vec<Stmt>>) -> Self {
        Stmt::If {
            condition,
            then_block,
            else_block,
            span: Span::default(),
        }
    }

    pub fn assert(condition: Expr) -> Self {
        Stmt::Assert {
            condition,
            span: Span::default(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::For { span, .. }
            | Stmt::While { span, .. } => *span,
        }
    }

    pub fn is_loop_free(&self) -> bool {
        match self {
            Stmt::Assign { .. } | Stmt::Assert { .. } => true,
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                then_block.iter().all(Stmt::is_loop_free)
                    && else_block
                        .as_ref()
                        .map_or(true, |b| b.iter().all(Stmt::is_loop_free))
            }
            Stmt::For { .. } | Stmt::While { .. } => false,
        }
    }
}

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "<" => Some(CmpOp::Lt),
            ">" => Some(CmpOp::Gt),
            "<=" => Some(CmpOp::Le),
            ">=" => Some(CmpOp::Ge),
            "==" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            _ => None,
        }
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmpOp::Lt => write!(f, "<"),
            CmpOp::Gt => write!(f, ">"),
            CmpOp::Le => write!(f, "<="),
            CmpOp::Ge => write!(f, ">="),
            CmpOp::Eq => write!(f, "=="),
            CmpOp::Ne => write!(f, "!="),
        }
    }
}

/// Expression over variables of type `V`.
///
/// The front end produces `Expr<String>`; the SSA stage rewrites the same
/// shape over versioned names with [`Expr::map_vars`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Expr<V = String> {
    Int(i64),
    Var(V),
    Binary {
        op: BinOp,
        lhs: Box<Expr<V>>,
        rhs: Box<Expr<V>>,
    },
    Compare {
        op: CmpOp,
        lhs: Box<Expr<V>>,
        rhs: Box<Expr<V>>,
    },
}

impl<V> Expr<V> {
    pub fn int(n: i64) -> Self {
        Expr::Int(n)
    }

    pub fn binary(op: BinOp, lhs: Expr<V>, rhs: Expr<V>) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn compare(op: CmpOp, lhs: Expr<V>, rhs: Expr<V>) -> Self {
        Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Rebuild the expression with every variable replaced by `f(var)`.
    pub fn map_vars<W>(&self, f: &mut impl FnMut(&V) -> W) -> Expr<W> {
        match self {
            Expr::Int(n) => Expr::Int(*n),
            Expr::Var(v) => Expr::Var(f(v)),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.map_vars(f);
                let rhs = rhs.map_vars(f);
                Expr::binary(*op, lhs, rhs)
            }
            Expr::Compare { op, lhs, rhs } => {
                let lhs = lhs.map_vars(f);
                let rhs = rhs.map_vars(f);
                Expr::compare(*op, lhs, rhs)
            }
        }
    }

    /// Variables in left-to-right order, duplicates included.
    pub fn vars(&self) -> Vec<&V> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a V>) {
        match self {
            Expr::Int(_) => {}
            Expr::Var(v) => out.push(v),
            Expr::Binary { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, Expr::Compare { .. })
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Compare { .. } => 0,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Int(_) | Expr::Var(_) => 3,
        }
    }
}

impl Expr<String> {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }
}

impl<V: std::fmt::Display> Expr<V> {
    fn fmt_operand(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        parent: u8,
        right: bool,
    ) -> std::fmt::Result {
        let own = self.precedence();
        if own < parent || (right && own == parent) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl<V: std::fmt::Display> std::fmt::Display for Expr<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                lhs.fmt_operand(f, prec, false)?;
                write!(f, " {op} ")?;
                rhs.fmt_operand(f, prec, true)
            }
            Expr::Compare { op, lhs, rhs } => {
                lhs.fmt_operand(f, 1, false)?;
                write!(f, " {op} ")?;
                rhs.fmt_operand(f, 1, false)
            }
        }
    }
}
