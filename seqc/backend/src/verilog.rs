//! Verilog-2001 backend.
//!
//! Prints each synthesized [Module] as one self-contained module: ports,
//! local parameters for the dispatch indices, net declarations, continuous
//! assignments, one `always` block per clocked process and one instance per
//! child bin. Everything is printed in declaration order so that re-emitting
//! the same program gives the same text.
use crate::traits::{Backend, Unit};
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use seqc_ir::{
    Bin, Direction, Id,
    rtl::{Expr, Module, NetInfo, Process, Stmt, UnOp},
};
use seqc_utils::{Error, SeqResult};
use std::{collections::HashSet, io::Write};

/// Implements a Verilog backend: one `<bin>.v` file per bin.
#[derive(Default)]
pub struct VerilogBackend;

impl Backend for VerilogBackend {
    fn name(&self) -> &'static str {
        "verilog"
    }

    fn file_names(&self, bin: &Bin) -> Vec<String> {
        vec![format!("{}.v", bin.name)]
    }

    fn validate(&self, unit: &Unit) -> SeqResult<()> {
        validate_module(unit.synthesized()?)
    }

    fn emit(&self, unit: &Unit, _part: usize, out: &mut dyn Write) -> SeqResult<()> {
        emit_module(unit.synthesized()?, out)
    }
}

/// `[w-1:0] ` or nothing for a single bit.
pub(crate) fn range(width: u64) -> String {
    if width == 1 {
        String::new()
    } else {
        format!("[{}:0] ", width - 1)
    }
}

fn signed(s: bool) -> &'static str {
    if s { "signed " } else { "" }
}

fn for_each_write<F: FnMut(Id)>(stmt: &Stmt, f: &mut F) {
    match stmt {
        Stmt::Assign { dst, .. } => f(*dst),
        Stmt::If { then, otherwise, .. } => {
            then.iter().chain(otherwise).for_each(|s| for_each_write(s, f))
        }
        Stmt::Case { arms, .. } => arms
            .iter()
            .flat_map(|a| &a.body)
            .for_each(|s| for_each_write(s, f)),
    }
}

/// Structural checks on a module: every net is declared once, every net
/// read is declared, continuous assignments drive wires (once each) and
/// processes drive registers.
pub fn validate_module(module: &Module) -> SeqResult<()> {
    let within = |e: Error| e.within(format!("module `{}'", module.name));
    let mut seen = HashSet::new();
    let declared = module
        .ports
        .iter()
        .map(|p| p.name)
        .chain(module.decls.iter().map(|d| d.name));
    for name in declared {
        if !seen.insert(name) {
            return Err(within(Error::naming_conflict(format!(
                "net `{name}' declared twice"
            ))));
        }
    }

    let nets = module.nets();
    let mut missing = None;
    let mut check = |n: Id| {
        if missing.is_none() && !nets.contains_key(&n) {
            missing = Some(n);
        }
    };
    for (dst, src) in &module.assigns {
        check(*dst);
        src.for_each_net(&mut check);
    }
    for p in &module.processes {
        p.reset.iter().chain(&p.body).for_each(|s| s.for_each_net(&mut check));
    }
    for inst in &module.instances {
        inst.conns.iter().for_each(|(_, net)| check(*net));
    }
    if let Some(n) = missing {
        return Err(within(Error::not_found(format!("net `{n}' is not declared"))));
    }

    let mut driven = HashSet::new();
    for (dst, _) in &module.assigns {
        let info = &nets[dst];
        if info.reg || info.port == Some(Direction::Input) {
            return Err(within(Error::invalid_config(format!(
                "continuous assignment to `{dst}', which is not a wire"
            ))));
        }
        if !driven.insert(*dst) {
            return Err(within(Error::invalid_config(format!(
                "wire `{dst}' has more than one driver"
            ))));
        }
    }
    let mut bad = None;
    for p in &module.processes {
        p.reset.iter().chain(&p.body).for_each(|s| {
            for_each_write(s, &mut |n| {
                if bad.is_none() && !nets[&n].reg {
                    bad = Some(n);
                }
            })
        });
    }
    if let Some(n) = bad {
        return Err(within(Error::invalid_config(format!(
            "clocked write to `{n}', which is not a register"
        ))));
    }
    Ok(())
}

/// Prints expressions and statements of one module.
struct Printer {
    nets: LinkedHashMap<Id, NetInfo>,
}

impl Printer {
    fn width(&self, e: &Expr) -> u64 {
        e.width(&|n| self.nets.get(&n).map(|i| i.width).unwrap_or(1))
    }

    fn net(&self, n: Id) -> String {
        match self.nets.get(&n) {
            Some(info) if info.signed => format!("$unsigned({n})"),
            _ => n.to_string(),
        }
    }

    /// `e`, parenthesized unless it is a single term or a negation.
    fn operand(&self, e: &Expr) -> String {
        match e {
            Expr::Binary(..)
            | Expr::Mux(..)
            | Expr::Unary(UnOp::ReduceAnd | UnOp::ReduceOr, _) => {
                format!("({})", self.expr(e))
            }
            _ => self.expr(e),
        }
    }

    fn expr(&self, e: &Expr) -> String {
        match e {
            Expr::Const { val, width } => format!("{width}'d{val}"),
            Expr::Net(n) => self.net(*n),
            Expr::Slice { net, hi, lo } => {
                let whole = self.nets.get(net).map(|i| i.width) == Some(hi - lo + 1);
                if whole && *lo == 0 {
                    self.net(*net)
                } else if hi == lo {
                    format!("{net}[{hi}]")
                } else {
                    format!("{net}[{hi}:{lo}]")
                }
            }
            Expr::Index { net, index } => format!("{net}[{}]", self.expr(index)),
            Expr::Unary(op, inner) => {
                let sym = match op {
                    UnOp::Not if self.width(inner) == 1 => "!",
                    UnOp::Not => "~",
                    UnOp::ReduceAnd => "&",
                    UnOp::ReduceOr => "|",
                };
                format!("{sym}{}", self.operand(inner))
            }
            Expr::Binary(op, l, r) => {
                format!("{} {} {}", self.operand(l), op.op_str(), self.operand(r))
            }
            Expr::Mux(c, t, f) => format!(
                "{} ? {} : {}",
                self.operand(c),
                self.operand(t),
                self.operand(f)
            ),
            Expr::Concat(parts) => {
                format!("{{{}}}", parts.iter().map(|p| self.expr(p)).join(", "))
            }
            Expr::Replicate(n, inner) => format!("{{{n}{{{}}}}}", self.expr(inner)),
        }
    }

    fn stmts(&self, out: &mut dyn Write, stmts: &[Stmt], level: usize) -> SeqResult<()> {
        let ind = "    ".repeat(level);
        for s in stmts {
            match s {
                Stmt::Assign { dst, src } => {
                    writeln!(out, "{ind}{dst} <= {};", self.expr(src))?
                }
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    writeln!(out, "{ind}if ({}) begin", self.expr(cond))?;
                    self.stmts(out, then, level + 1)?;
                    let mut rest = otherwise;
                    // Chain `else if` while the else branch is a single `if`.
                    while let [Stmt::If {
                        cond,
                        then,
                        otherwise,
                    }] = rest.as_slice()
                    {
                        writeln!(out, "{ind}end else if ({}) begin", self.expr(cond))?;
                        self.stmts(out, then, level + 1)?;
                        rest = otherwise;
                    }
                    if !rest.is_empty() {
                        writeln!(out, "{ind}end else begin")?;
                        self.stmts(out, rest, level + 1)?;
                    }
                    writeln!(out, "{ind}end")?;
                }
                Stmt::Case { sel, arms } => {
                    let w = self.width(sel);
                    writeln!(out, "{ind}case ({})", self.expr(sel))?;
                    for arm in arms {
                        let label = match arm.label {
                            Some(l) => l.to_string(),
                            None => format!("{w}'d{}", arm.value),
                        };
                        if arm.body.is_empty() {
                            writeln!(out, "{ind}    {label}: ;")?;
                            continue;
                        }
                        writeln!(out, "{ind}    {label}: begin")?;
                        self.stmts(out, &arm.body, level + 2)?;
                        writeln!(out, "{ind}    end")?;
                    }
                    writeln!(out, "{ind}endcase")?;
                }
            }
        }
        Ok(())
    }

    fn process(&self, out: &mut dyn Write, p: &Process) -> SeqResult<()> {
        if let Some(c) = &p.comment {
            writeln!(out, "// {c}")?;
        }
        writeln!(out, "always @(posedge clk or negedge reset_n) begin")?;
        writeln!(out, "    if (!reset_n) begin")?;
        self.stmts(out, &p.reset, 2)?;
        writeln!(out, "    end else begin")?;
        self.stmts(out, &p.body, 2)?;
        writeln!(out, "    end")?;
        writeln!(out, "end")?;
        Ok(())
    }
}

pub fn emit_module(module: &Module, out: &mut dyn Write) -> SeqResult<()> {
    let printer = Printer {
        nets: module.nets(),
    };

    writeln!(out, "module {} (", module.name)?;
    let ports = module
        .ports
        .iter()
        .map(|p| {
            let (dir, kind) = match (p.dir, p.reg) {
                (Direction::Input, _) => ("input", "wire"),
                (Direction::Output, true) => ("output", "reg"),
                (Direction::Output, false) => ("output", "wire"),
            };
            format!("    {dir} {kind} {}{}{}", signed(p.signed), range(p.width), p.name)
        })
        .join(",\n");
    writeln!(out, "{ports}")?;
    writeln!(out, ");")?;
    writeln!(out)?;

    if !module.params.is_empty() {
        for (name, value) in &module.params {
            writeln!(out, "localparam {name} = {value};")?;
        }
        writeln!(out)?;
    }

    for d in &module.decls {
        let kind = match d.kind {
            seqc_ir::rtl::NetKind::Wire => "wire",
            seqc_ir::rtl::NetKind::Reg => "reg",
        };
        writeln!(out, "{kind} {}{}{};", signed(d.signed), range(d.width), d.name)?;
    }
    writeln!(out)?;

    for (dst, src) in &module.assigns {
        writeln!(out, "assign {dst} = {};", printer.expr(src))?;
    }
    writeln!(out)?;

    for p in &module.processes {
        printer.process(out, p)?;
        writeln!(out)?;
    }

    for inst in &module.instances {
        writeln!(out, "{} {} (", inst.module, inst.name)?;
        let conns = inst
            .conns
            .iter()
            .map(|(port, net)| format!("    .{port}({net})"))
            .join(",\n");
        writeln!(out, "{conns}")?;
        writeln!(out, ");")?;
        writeln!(out)?;
    }

    writeln!(out, "endmodule")?;
    writeln!(out)?;
    Ok(())
}
