//! Structural register-transfer netlist. A synthesized bin is one
//! [Module]: declared nets, continuous assignments, clocked processes with an
//! asynchronous active-low reset, and child instances.
//!
//! Expressions are unsigned and sized by their operands. Callers extend
//! operands explicitly so that every assignment is width-exact; sign
//! extension is spelled out with [Expr::replicate] and [Expr::concat].
use crate::Direction;
use linked_hash_map::LinkedHashMap;
use seqc_utils::{Id, math};
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    /// Bitwise inversion.
    Not,
    ReduceAnd,
    ReduceOr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    And,
    Or,
    Xor,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    Add,
    Sub,
    Mul,
    Shl,
}

impl BinOp {
    pub fn op_str(&self) -> &'static str {
        match self {
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Leq => "<=",
            BinOp::Gt => ">",
            BinOp::Geq => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Shl => "<<",
        }
    }

    /// Comparisons produce a single bit.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq
                | BinOp::Neq
                | BinOp::Lt
                | BinOp::Leq
                | BinOp::Gt
                | BinOp::Geq
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Const { val: u128, width: u64 },
    Net(Id),
    /// `net[hi:lo]`
    Slice { net: Id, hi: u64, lo: u64 },
    /// `net[index]` with a run-time index.
    Index { net: Id, index: Box<Expr> },
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `cond ? then : otherwise`
    Mux(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Most significant part first.
    Concat(Vec<Expr>),
    Replicate(u64, Box<Expr>),
}

impl Expr {
    pub fn constant(val: u128, width: u64) -> Self {
        Expr::Const {
            val: val & math::mask(width),
            width,
        }
    }

    pub fn bit(b: bool) -> Self {
        Expr::constant(b as u128, 1)
    }

    pub fn zero(width: u64) -> Self {
        Expr::constant(0, width)
    }

    pub fn ones(width: u64) -> Self {
        Expr::constant(math::mask(width), width)
    }

    pub fn net<S: Into<Id>>(name: S) -> Self {
        Expr::Net(name.into())
    }

    pub fn slice<S: Into<Id>>(net: S, hi: u64, lo: u64) -> Self {
        Expr::Slice {
            net: net.into(),
            hi,
            lo,
        }
    }

    pub fn index<S: Into<Id>>(net: S, index: Expr) -> Self {
        Expr::Index {
            net: net.into(),
            index: Box::new(index),
        }
    }

    pub fn is_const(&self, v: u128) -> bool {
        matches!(self, Expr::Const { val, .. } if *val == v)
    }

    fn binary(op: BinOp, l: Expr, r: Expr) -> Self {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }

    /// Single bit conjunction, folding constant operands.
    pub fn and(self, rhs: Expr) -> Self {
        if rhs.is_const(1) {
            self
        } else if self.is_const(1) {
            rhs
        } else if self.is_const(0) || rhs.is_const(0) {
            Expr::bit(false)
        } else if self == rhs {
            self
        } else {
            Expr::binary(BinOp::And, self, rhs)
        }
    }

    /// Single bit disjunction, folding constant operands.
    pub fn or(self, rhs: Expr) -> Self {
        if rhs.is_const(0) {
            self
        } else if self.is_const(0) {
            rhs
        } else if self == rhs {
            self
        } else {
            Expr::binary(BinOp::Or, self, rhs)
        }
    }

    /// OR of every expression, `1'd0` when there are none.
    pub fn any<I: IntoIterator<Item = Expr>>(es: I) -> Self {
        es.into_iter().fold(Expr::bit(false), |acc, e| acc | e)
    }

    /// AND of every expression, `1'd1` when there are none.
    pub fn all<I: IntoIterator<Item = Expr>>(es: I) -> Self {
        es.into_iter().fold(Expr::bit(true), |acc, e| acc & e)
    }

    pub fn xor(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Xor, self, rhs)
    }

    pub fn eq(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Eq, self, rhs)
    }

    pub fn neq(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Neq, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Lt, self, rhs)
    }

    pub fn le(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Leq, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Gt, self, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Geq, self, rhs)
    }

    pub fn add(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Add, self, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Sub, self, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Mul, self, rhs)
    }

    pub fn shl(self, rhs: Expr) -> Self {
        Expr::binary(BinOp::Shl, self, rhs)
    }

    pub fn reduce_and(self) -> Self {
        Expr::Unary(UnOp::ReduceAnd, Box::new(self))
    }

    pub fn reduce_or(self) -> Self {
        Expr::Unary(UnOp::ReduceOr, Box::new(self))
    }

    pub fn mux(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        if cond.is_const(1) {
            then
        } else if cond.is_const(0) {
            otherwise
        } else {
            Expr::Mux(Box::new(cond), Box::new(then), Box::new(otherwise))
        }
    }

    pub fn concat(parts: Vec<Expr>) -> Self {
        if parts.len() == 1 {
            parts.into_iter().next().unwrap_or(Expr::zero(1))
        } else {
            Expr::Concat(parts)
        }
    }

    pub fn replicate(n: u64, e: Expr) -> Self {
        Expr::Replicate(n, Box::new(e))
    }

    /// Width of the expression given the width of every net it reads.
    pub fn width<F>(&self, net_width: &F) -> u64
    where
        F: Fn(Id) -> u64,
    {
        match self {
            Expr::Const { width, .. } => *width,
            Expr::Net(n) => net_width(*n),
            Expr::Slice { hi, lo, .. } => hi - lo + 1,
            Expr::Index { .. } => 1,
            Expr::Unary(UnOp::Not, e) => e.width(net_width),
            Expr::Unary(_, _) => 1,
            Expr::Binary(op, l, r) => {
                if op.is_comparison() {
                    1
                } else if *op == BinOp::Shl {
                    l.width(net_width)
                } else {
                    l.width(net_width).max(r.width(net_width))
                }
            }
            Expr::Mux(_, t, e) => t.width(net_width).max(e.width(net_width)),
            Expr::Concat(parts) => parts.iter().map(|p| p.width(net_width)).sum(),
            Expr::Replicate(n, e) => n * e.width(net_width),
        }
    }

    /// Call `f` with every net the expression reads.
    pub fn for_each_net<F>(&self, f: &mut F)
    where
        F: FnMut(Id),
    {
        match self {
            Expr::Const { .. } => (),
            Expr::Net(n) | Expr::Slice { net: n, .. } => f(*n),
            Expr::Index { net, index } => {
                f(*net);
                index.for_each_net(f);
            }
            Expr::Unary(_, e) | Expr::Replicate(_, e) => e.for_each_net(f),
            Expr::Binary(_, l, r) => {
                l.for_each_net(f);
                r.for_each_net(f);
            }
            Expr::Mux(c, t, e) => {
                c.for_each_net(f);
                t.for_each_net(f);
                e.for_each_net(f);
            }
            Expr::Concat(parts) => parts.iter().for_each(|p| p.for_each_net(f)),
        }
    }
}

impl From<Id> for Expr {
    fn from(id: Id) -> Self {
        Expr::Net(id)
    }
}

impl BitAnd for Expr {
    type Output = Self;

    fn bitand(self, other: Self) -> Self::Output {
        self.and(other)
    }
}

impl BitOr for Expr {
    type Output = Self;

    fn bitor(self, other: Self) -> Self::Output {
        self.or(other)
    }
}

impl Not for Expr {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Expr::Const { val, width } => Expr::constant(!val, width),
            Expr::Unary(UnOp::Not, e) => *e,
            _ => Expr::Unary(UnOp::Not, Box::new(self)),
        }
    }
}

impl BitOrAssign for Expr {
    fn bitor_assign(&mut self, other: Self) {
        let old = std::mem::replace(self, Expr::bit(false));
        *self = old | other;
    }
}

impl BitAndAssign for Expr {
    fn bitand_assign(&mut self, other: Self) {
        let old = std::mem::replace(self, Expr::bit(true));
        *self = old & other;
    }
}

/// One arm of a `case` statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseArm {
    pub value: u128,
    /// Local parameter naming `value`, printed instead of the number.
    pub label: Option<Id>,
    pub body: Vec<Stmt>,
}

/// Statements of a clocked process. Every assignment is non-blocking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    Assign {
        dst: Id,
        src: Expr,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Case {
        sel: Expr,
        arms: Vec<CaseArm>,
    },
}

impl Stmt {
    pub fn assign<S: Into<Id>>(dst: S, src: Expr) -> Self {
        Stmt::Assign {
            dst: dst.into(),
            src,
        }
    }

    pub fn when(cond: Expr, then: Vec<Stmt>) -> Self {
        Stmt::If {
            cond,
            then,
            otherwise: vec![],
        }
    }

    pub fn if_else(cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt>) -> Self {
        Stmt::If {
            cond,
            then,
            otherwise,
        }
    }

    pub fn for_each_net<F>(&self, f: &mut F)
    where
        F: FnMut(Id),
    {
        match self {
            Stmt::Assign { dst, src } => {
                f(*dst);
                src.for_each_net(f);
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                cond.for_each_net(f);
                then.iter().chain(otherwise).for_each(|s| s.for_each_net(f));
            }
            Stmt::Case { sel, arms } => {
                sel.for_each_net(f);
                arms.iter()
                    .flat_map(|a| &a.body)
                    .for_each(|s| s.for_each_net(f));
            }
        }
    }
}

/// A clocked process: `reset` runs while `reset_n` is low, `body` on every
/// other rising clock edge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Process {
    pub comment: Option<String>,
    pub reset: Vec<Stmt>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetKind {
    Wire,
    Reg,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decl {
    pub name: Id,
    pub width: u64,
    pub signed: bool,
    pub kind: NetKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModulePort {
    pub name: Id,
    pub width: u64,
    pub signed: bool,
    pub dir: Direction,
    /// Output driven by a register of this module.
    pub reg: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    pub module: Id,
    pub name: Id,
    /// `(child port, parent net)`
    pub conns: Vec<(Id, Id)>,
}

/// Everything known about one net of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetInfo {
    pub width: u64,
    pub signed: bool,
    /// Driven from a clocked process.
    pub reg: bool,
    pub port: Option<Direction>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Module {
    pub name: Id,
    pub ports: Vec<ModulePort>,
    /// Local parameters naming dispatch indices.
    pub params: Vec<(Id, u128)>,
    pub decls: Vec<Decl>,
    pub assigns: Vec<(Id, Expr)>,
    pub processes: Vec<Process>,
    pub instances: Vec<Instance>,
}

impl Module {
    pub fn new<S: Into<Id>>(name: S) -> Self {
        Module {
            name: name.into(),
            ports: vec![],
            params: vec![],
            decls: vec![],
            assigns: vec![],
            processes: vec![],
            instances: vec![],
        }
    }

    pub fn port<S: Into<Id>>(&mut self, name: S, width: u64, dir: Direction, reg: bool) {
        self.ports.push(ModulePort {
            name: name.into(),
            width,
            signed: false,
            dir,
            reg,
        })
    }

    fn decl(&mut self, name: Id, width: u64, kind: NetKind) {
        self.decls.push(Decl {
            name,
            width,
            signed: false,
            kind,
        })
    }

    pub fn wire<S: Into<Id>>(&mut self, name: S, width: u64) -> Expr {
        let name = name.into();
        self.decl(name, width, NetKind::Wire);
        Expr::Net(name)
    }

    pub fn reg<S: Into<Id>>(&mut self, name: S, width: u64) -> Expr {
        let name = name.into();
        self.decl(name, width, NetKind::Reg);
        Expr::Net(name)
    }

    /// Declare a wire and drive it.
    pub fn define<S: Into<Id>>(&mut self, name: S, width: u64, src: Expr) -> Expr {
        let name = name.into();
        let net = self.wire(name, width);
        self.assigns.push((name, src));
        net
    }

    pub fn assign<S: Into<Id>>(&mut self, dst: S, src: Expr) {
        self.assigns.push((dst.into(), src));
    }

    pub fn param<S: Into<Id>>(&mut self, name: S, value: u128) {
        self.params.push((name.into(), value));
    }

    /// Every port and declared net by name, in declaration order.
    pub fn nets(&self) -> LinkedHashMap<Id, NetInfo> {
        let mut nets = LinkedHashMap::new();
        for p in &self.ports {
            nets.insert(
                p.name,
                NetInfo {
                    width: p.width,
                    signed: p.signed,
                    reg: p.reg,
                    port: Some(p.dir),
                },
            );
        }
        for d in &self.decls {
            nets.insert(
                d.name,
                NetInfo {
                    width: d.width,
                    signed: d.signed,
                    reg: d.kind == NetKind::Reg,
                    port: None,
                },
            );
        }
        nets
    }
}

/// A set of modules closed under instantiation, children first.
#[derive(Clone, Debug)]
pub struct Design {
    pub modules: LinkedHashMap<Id, Module>,
    pub top: Id,
}

impl Design {
    pub fn top(&self) -> Option<&Module> {
        self.modules.get(&self.top)
    }

    pub fn get(&self, name: Id) -> Option<&Module> {
        self.modules.get(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_folding() {
        let a = Expr::net("a_net");
        assert_eq!(a.clone() & Expr::bit(true), a);
        assert_eq!(Expr::bit(false) | a.clone(), a);
        assert_eq!(a.clone() & Expr::bit(false), Expr::bit(false));
        assert_eq!(!!a.clone(), a);
        assert_eq!(!Expr::ones(3), Expr::zero(3));
        assert_eq!(Expr::any(vec![]), Expr::bit(false));
        assert_eq!(Expr::mux(Expr::bit(true), a.clone(), Expr::zero(1)), a);
    }

    #[test]
    fn widths() {
        let w = |n: Id| if n == "wide" { 8 } else { 1 };
        let e = Expr::net("wide").add(Expr::constant(1, 2));
        assert_eq!(e.width(&w), 8);
        assert_eq!(Expr::net("wide").ge(Expr::zero(8)).width(&w), 1);
        assert_eq!(
            Expr::concat(vec![Expr::zero(3), Expr::slice("wide", 4, 0)]).width(&w),
            8
        );
        assert_eq!(Expr::replicate(4, Expr::net("x")).width(&w), 4);
        assert_eq!(Expr::net("wide").shl(Expr::net("i")).width(&w), 8);
    }

    #[test]
    fn nets_read() {
        let e = Expr::mux(
            Expr::net("c"),
            Expr::index("v", Expr::net("i")),
            Expr::slice("w", 3, 1),
        );
        let mut seen = vec![];
        e.for_each_net(&mut |n| seen.push(n));
        assert_eq!(seen, vec![Id::new("c"), Id::new("v"), Id::new("i"), Id::new("w")]);
    }
}
