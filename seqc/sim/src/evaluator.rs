//! Expressions and statements compiled against a flat net table.
//!
//! [compile_expr] resolves every net name of an [Expr] to a flat net index
//! and records the width of each subexpression; [CExpr::eval] then evaluates
//! two-state values held in a `u128`. [CStmt::exec] collects non-blocking
//! updates for the kernel to apply once every process has run.
use crate::error::{SimError, SimResult};
use seqc_ir::{
    Id,
    rtl::{BinOp, Expr, Stmt, UnOp},
};
use seqc_utils::math::mask;
use std::collections::HashMap;

/// Flat index of a net.
pub type NetIdx = usize;

/// Name to flat net, with the width of each net, for one module instance.
pub struct Scope<'a> {
    pub nets: &'a HashMap<Id, NetIdx>,
    pub widths: &'a [u64],
    pub prefix: &'a str,
}

impl Scope<'_> {
    fn lookup(&self, name: Id) -> SimResult<NetIdx> {
        self.nets
            .get(&name)
            .copied()
            .ok_or_else(|| SimError::UnknownNet(format!("{}{}", self.prefix, name)))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Const(u128),
    Net(NetIdx),
    Slice { net: NetIdx, lo: u64 },
    Index { net: NetIdx, index: Box<CExpr> },
    Unary(UnOp, Box<CExpr>),
    Binary(BinOp, Box<CExpr>, Box<CExpr>),
    Mux(Box<CExpr>, Box<CExpr>, Box<CExpr>),
    Concat(Vec<CExpr>),
    Replicate(u64, Box<CExpr>),
}

/// A compiled expression and its width.
#[derive(Debug, Clone)]
pub struct CExpr {
    node: Node,
    width: u64,
}

pub fn compile_expr(e: &Expr, scope: &Scope) -> SimResult<CExpr> {
    let boxed = |e: &Expr| compile_expr(e, scope).map(Box::new);
    let (node, width) = match e {
        Expr::Const { val, width } => (Node::Const(*val), *width),
        Expr::Net(n) => {
            let net = scope.lookup(*n)?;
            (Node::Net(net), scope.widths[net])
        }
        Expr::Slice { net, hi, lo } => (
            Node::Slice {
                net: scope.lookup(*net)?,
                lo: *lo,
            },
            hi - lo + 1,
        ),
        Expr::Index { net, index } => (
            Node::Index {
                net: scope.lookup(*net)?,
                index: boxed(index)?,
            },
            1,
        ),
        Expr::Unary(op, e) => {
            let e = boxed(e)?;
            let width = if *op == UnOp::Not { e.width } else { 1 };
            (Node::Unary(*op, e), width)
        }
        Expr::Binary(op, l, r) => {
            let (l, r) = (boxed(l)?, boxed(r)?);
            let width = if op.is_comparison() {
                1
            } else if *op == BinOp::Shl {
                l.width
            } else {
                l.width.max(r.width)
            };
            (Node::Binary(*op, l, r), width)
        }
        Expr::Mux(c, t, f) => {
            let (c, t, f) = (boxed(c)?, boxed(t)?, boxed(f)?);
            let width = t.width.max(f.width);
            (Node::Mux(c, t, f), width)
        }
        Expr::Concat(parts) => {
            let parts = parts
                .iter()
                .map(|p| compile_expr(p, scope))
                .collect::<SimResult<Vec<_>>>()?;
            let width = parts.iter().map(|p| p.width).sum();
            (Node::Concat(parts), width)
        }
        Expr::Replicate(n, e) => {
            let e = boxed(e)?;
            let width = n * e.width;
            (Node::Replicate(*n, e), width)
        }
    };
    Ok(CExpr { node, width })
}

impl CExpr {
    /// Every net the expression reads.
    pub fn nets(&self) -> Vec<NetIdx> {
        let mut out = vec![];
        self.collect_nets(&mut out);
        out
    }

    fn collect_nets(&self, out: &mut Vec<NetIdx>) {
        match &self.node {
            Node::Const(_) => {}
            Node::Net(n) | Node::Slice { net: n, .. } => out.push(*n),
            Node::Index { net, index } => {
                out.push(*net);
                index.collect_nets(out);
            }
            Node::Unary(_, e) | Node::Replicate(_, e) => e.collect_nets(out),
            Node::Binary(_, l, r) => {
                l.collect_nets(out);
                r.collect_nets(out);
            }
            Node::Mux(c, t, f) => {
                c.collect_nets(out);
                t.collect_nets(out);
                f.collect_nets(out);
            }
            Node::Concat(parts) => parts.iter().for_each(|p| p.collect_nets(out)),
        }
    }

    pub fn eval(&self, values: &[u128]) -> u128 {
        let m = mask(self.width);
        let v = match &self.node {
            Node::Const(v) => *v,
            Node::Net(n) => values[*n],
            Node::Slice { net, lo } => values[*net].checked_shr(*lo as u32).unwrap_or(0),
            Node::Index { net, index } => {
                let i = index.eval(values);
                if i >= 128 { 0 } else { values[*net] >> i }
            }
            Node::Unary(op, e) => {
                let x = e.eval(values);
                match op {
                    UnOp::Not => !x,
                    UnOp::ReduceAnd => u128::from(x == mask(e.width)),
                    UnOp::ReduceOr => u128::from(x != 0),
                }
            }
            Node::Binary(op, l, r) => {
                let (a, b) = (l.eval(values), r.eval(values));
                match op {
                    BinOp::And => a & b,
                    BinOp::Or => a | b,
                    BinOp::Xor => a ^ b,
                    BinOp::Eq => u128::from(a == b),
                    BinOp::Neq => u128::from(a != b),
                    BinOp::Lt => u128::from(a < b),
                    BinOp::Leq => u128::from(a <= b),
                    BinOp::Gt => u128::from(a > b),
                    BinOp::Geq => u128::from(a >= b),
                    BinOp::Add => a.wrapping_add(b),
                    BinOp::Sub => a.wrapping_sub(b),
                    BinOp::Mul => a.wrapping_mul(b),
                    BinOp::Shl => {
                        if b >= 128 {
                            0
                        } else {
                            a << b
                        }
                    }
                }
            }
            Node::Mux(c, t, f) => {
                if c.eval(values) & 1 == 1 {
                    t.eval(values)
                } else {
                    f.eval(values)
                }
            }
            Node::Concat(parts) => parts.iter().fold(0u128, |acc, p| {
                acc.checked_shl(p.width as u32).unwrap_or(0) | p.eval(values)
            }),
            Node::Replicate(n, e) => {
                let x = e.eval(values);
                (0..*n).fold(0u128, |acc, _| {
                    acc.checked_shl(e.width as u32).unwrap_or(0) | x
                })
            }
        };
        v & m
    }
}

/// A compiled statement.
#[derive(Debug, Clone)]
pub enum CStmt {
    Assign(NetIdx, CExpr),
    If(CExpr, Vec<CStmt>, Vec<CStmt>),
    Case(CExpr, Vec<(u128, Vec<CStmt>)>),
}

pub fn compile_stmts(stmts: &[Stmt], scope: &Scope) -> SimResult<Vec<CStmt>> {
    stmts.iter().map(|s| compile_stmt(s, scope)).collect()
}

fn compile_stmt(s: &Stmt, scope: &Scope) -> SimResult<CStmt> {
    Ok(match s {
        Stmt::Assign { dst, src } => {
            CStmt::Assign(scope.lookup(*dst)?, compile_expr(src, scope)?)
        }
        Stmt::If {
            cond,
            then,
            otherwise,
        } => CStmt::If(
            compile_expr(cond, scope)?,
            compile_stmts(then, scope)?,
            compile_stmts(otherwise, scope)?,
        ),
        Stmt::Case { sel, arms } => CStmt::Case(
            compile_expr(sel, scope)?,
            arms.iter()
                .map(|a| Ok((a.value, compile_stmts(&a.body, scope)?)))
                .collect::<SimResult<_>>()?,
        ),
    })
}

impl CStmt {
    /// Run the statement against `values`, pushing non-blocking updates.
    /// Later updates of the same net win.
    pub fn exec(&self, values: &[u128], updates: &mut Vec<(NetIdx, u128)>) {
        match self {
            CStmt::Assign(dst, src) => updates.push((*dst, src.eval(values))),
            CStmt::If(cond, then, otherwise) => {
                let branch = if cond.eval(values) & 1 == 1 {
                    then
                } else {
                    otherwise
                };
                branch.iter().for_each(|s| s.exec(values, updates));
            }
            CStmt::Case(sel, arms) => {
                let v = sel.eval(values);
                if let Some((_, body)) = arms.iter().find(|(a, _)| *a == v) {
                    body.iter().for_each(|s| s.exec(values, updates));
                }
            }
        }
    }
}
