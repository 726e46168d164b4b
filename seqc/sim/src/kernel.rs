//! Cycle-based simulation kernel with hierarchy flattening.
//!
//! [Simulator] flattens the module hierarchy at construction time: every
//! net of every instance gets one slot in a flat value table, except ports
//! of child instances, which alias the parent net they are connected to.
//! Continuous assignments are ordered once so that a single pass settles
//! them; clocked processes run on [Simulator::step].
use crate::error::{SimError, SimResult};
use crate::evaluator::{CExpr, CStmt, NetIdx, Scope, compile_expr, compile_stmts};
use petgraph::{algo::toposort, graphmap::DiGraphMap};
use seqc_ir::{
    Id,
    rtl::{Design, Module},
};
use seqc_utils::math::mask;
use std::collections::HashMap;

/// A clocked process bound to flat nets.
struct SimProcess {
    reset_n: NetIdx,
    reset: Vec<CStmt>,
    body: Vec<CStmt>,
}

/// A two-state, cycle-based simulator for a synthesized [Design].
pub struct Simulator {
    names: HashMap<String, NetIdx>,
    /// Hierarchical name of each flat net (first name wins for aliases).
    labels: Vec<String>,
    widths: Vec<u64>,
    values: Vec<u128>,
    /// Continuous assignments in evaluation order.
    assigns: Vec<(NetIdx, CExpr)>,
    processes: Vec<SimProcess>,
    cycle: u64,
}

impl Simulator {
    /// Flatten `design` starting at its top module.
    pub fn new(design: &Design) -> SimResult<Self> {
        let top = design
            .top()
            .ok_or_else(|| SimError::UnknownModule(design.top.to_string()))?;
        let mut sim = Simulator {
            names: HashMap::new(),
            labels: vec![],
            widths: vec![],
            values: vec![],
            assigns: vec![],
            processes: vec![],
            cycle: 0,
        };
        sim.flatten_module(design, top, "", HashMap::new())?;
        sim.order_assigns()?;
        sim.settle();
        log::debug!(
            "Flattened `{}`: {} nets, {} assigns, {} processes",
            design.top,
            sim.values.len(),
            sim.assigns.len(),
            sim.processes.len()
        );
        Ok(sim)
    }

    fn flatten_module(
        &mut self,
        design: &Design,
        module: &Module,
        prefix: &str,
        bound: HashMap<Id, NetIdx>,
    ) -> SimResult<()> {
        let mut nets = HashMap::new();
        for (name, info) in module.nets() {
            let label = format!("{prefix}{name}");
            if info.width > 128 {
                return Err(SimError::TooWide {
                    name: label,
                    width: info.width,
                });
            }
            let idx = match bound.get(&name) {
                Some(idx) => *idx,
                None => {
                    self.labels.push(label.clone());
                    self.widths.push(info.width);
                    self.values.push(0);
                    self.values.len() - 1
                }
            };
            self.names.insert(label, idx);
            nets.insert(name, idx);
        }

        let scope = Scope {
            nets: &nets,
            widths: &self.widths,
            prefix,
        };
        let mut assigns = vec![];
        for (dst, src) in &module.assigns {
            let dst = nets
                .get(dst)
                .copied()
                .ok_or_else(|| SimError::UnknownNet(format!("{prefix}{dst}")))?;
            assigns.push((dst, compile_expr(src, &scope)?));
        }
        let reset_n = nets
            .get(&Id::new("reset_n"))
            .copied()
            .ok_or_else(|| SimError::UnknownNet(format!("{prefix}reset_n")))?;
        let mut processes = vec![];
        for p in &module.processes {
            processes.push(SimProcess {
                reset_n,
                reset: compile_stmts(&p.reset, &scope)?,
                body: compile_stmts(&p.body, &scope)?,
            });
        }
        self.assigns.extend(assigns);
        self.processes.extend(processes);

        for inst in &module.instances {
            let child = design
                .get(inst.module)
                .ok_or_else(|| SimError::UnknownModule(inst.module.to_string()))?;
            let child_prefix = format!("{prefix}{}.", inst.name);
            let mut child_bound = HashMap::new();
            for (port, net) in &inst.conns {
                let idx = nets
                    .get(net)
                    .copied()
                    .ok_or_else(|| SimError::UnknownNet(format!("{prefix}{net}")))?;
                child_bound.insert(*port, idx);
            }
            self.flatten_module(design, child, &child_prefix, child_bound)?;
        }
        Ok(())
    }

    /// Sort continuous assignments so that every net is computed before it
    /// is read.
    fn order_assigns(&mut self) -> SimResult<()> {
        let mut drivers: HashMap<NetIdx, Vec<usize>> = HashMap::new();
        for (i, (dst, _)) in self.assigns.iter().enumerate() {
            drivers.entry(*dst).or_default().push(i);
        }
        let mut graph = DiGraphMap::<usize, ()>::new();
        for i in 0..self.assigns.len() {
            graph.add_node(i);
        }
        for (i, (_, src)) in self.assigns.iter().enumerate() {
            for net in src.nets() {
                for d in drivers.get(&net).into_iter().flatten() {
                    graph.add_edge(*d, i, ());
                }
            }
        }
        let order = toposort(&graph, None).map_err(|cycle| {
            let (dst, _) = &self.assigns[cycle.node_id()];
            SimError::CombinationalLoop(self.labels[*dst].clone())
        })?;
        let mut slots: Vec<Option<(NetIdx, CExpr)>> =
            std::mem::take(&mut self.assigns).into_iter().map(Some).collect();
        self.assigns = order.into_iter().filter_map(|i| slots[i].take()).collect();
        Ok(())
    }

    fn settle(&mut self) {
        for (dst, src) in &self.assigns {
            self.values[*dst] = src.eval(&self.values) & mask(self.widths[*dst]);
        }
    }

    fn net(&self, name: &str) -> SimResult<NetIdx> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownNet(name.to_string()))
    }

    /// Drive a net and propagate it through the continuous assignments.
    /// Child nets are named `u_<child>_.<net>`.
    pub fn poke(&mut self, name: &str, value: u128) -> SimResult<()> {
        let idx = self.net(name)?;
        self.values[idx] = value & mask(self.widths[idx]);
        self.settle();
        Ok(())
    }

    pub fn peek(&self, name: &str) -> SimResult<u128> {
        Ok(self.values[self.net(name)?])
    }

    /// One rising clock edge: every process reads the settled values, then
    /// all register updates land at once.
    pub fn step(&mut self) {
        let mut updates = vec![];
        for p in &self.processes {
            let stmts = if self.values[p.reset_n] & 1 == 0 {
                &p.reset
            } else {
                &p.body
            };
            stmts.iter().for_each(|s| s.exec(&self.values, &mut updates));
        }
        for (idx, v) in updates {
            self.values[idx] = v & mask(self.widths[idx]);
        }
        self.settle();
        self.cycle += 1;
    }

    /// Hold `reset_n` low for one clock edge, then release it.
    pub fn reset(&mut self) -> SimResult<()> {
        self.poke("reset_n", 0)?;
        self.step();
        self.poke("reset_n", 1)
    }

    /// Clock edges stepped so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linked_hash_map::LinkedHashMap;
    use seqc_ir::{
        Direction,
        rtl::{Expr, Instance, Process, Stmt},
    };

    fn counter() -> Module {
        let mut m = Module::new("counter");
        m.port("clk", 1, Direction::Input, false);
        m.port("reset_n", 1, Direction::Input, false);
        m.port("en", 1, Direction::Input, false);
        m.port("count", 4, Direction::Output, true);
        m.port("wrapped", 1, Direction::Output, false);
        let next = m.define("next_", 4, Expr::net("count").add(Expr::constant(1, 4)));
        m.assign("wrapped", Expr::net("count").eq(Expr::constant(15, 4)));
        m.processes.push(Process {
            comment: None,
            reset: vec![Stmt::assign("count", Expr::zero(4))],
            body: vec![Stmt::when(Expr::net("en"), vec![Stmt::assign("count", next)])],
        });
        m
    }

    fn design(modules: Vec<Module>, top: &str) -> Design {
        let mut map = LinkedHashMap::new();
        for m in modules {
            map.insert(m.name, m);
        }
        Design {
            modules: map,
            top: top.into(),
        }
    }

    #[test]
    fn registers_update_on_step() {
        let mut sim = Simulator::new(&design(vec![counter()], "counter")).unwrap();
        sim.reset().unwrap();
        sim.poke("en", 1).unwrap();
        for _ in 0..15 {
            sim.step();
        }
        assert_eq!(sim.peek("count").unwrap(), 15);
        assert_eq!(sim.peek("wrapped").unwrap(), 1);
        sim.step();
        assert_eq!(sim.peek("count").unwrap(), 0);
        assert_eq!(sim.cycle(), 17);
    }

    #[test]
    fn child_ports_alias_parent_nets() {
        let mut top = Module::new("top");
        top.port("clk", 1, Direction::Input, false);
        top.port("reset_n", 1, Direction::Input, false);
        top.port("go", 1, Direction::Input, false);
        top.wire("n_", 4);
        top.wire("w_", 1);
        top.instances.push(Instance {
            module: "counter".into(),
            name: "u_counter_".into(),
            conns: vec![
                ("clk".into(), "clk".into()),
                ("reset_n".into(), "reset_n".into()),
                ("en".into(), "go".into()),
                ("count".into(), "n_".into()),
                ("wrapped".into(), "w_".into()),
            ],
        });
        let mut sim = Simulator::new(&design(vec![counter(), top], "top")).unwrap();
        sim.reset().unwrap();
        sim.poke("go", 1).unwrap();
        sim.step();
        sim.step();
        assert_eq!(sim.peek("n_").unwrap(), 2);
        assert_eq!(sim.peek("u_counter_.count").unwrap(), 2);
        assert_eq!(sim.peek("u_counter_.next_").unwrap(), 3);
    }

    #[test]
    fn assigns_are_ordered() {
        let mut m = Module::new("chain");
        m.port("reset_n", 1, Direction::Input, false);
        m.port("a", 2, Direction::Input, false);
        // Declared in reverse dependency order.
        m.wire("c", 2);
        m.wire("b", 2);
        m.assign("c", Expr::net("b").add(Expr::constant(1, 2)));
        m.assign("b", Expr::net("a").add(Expr::constant(1, 2)));
        let mut sim = Simulator::new(&design(vec![m], "chain")).unwrap();
        sim.poke("a", 1).unwrap();
        assert_eq!(sim.peek("c").unwrap(), 3);
    }

    #[test]
    fn loops_are_rejected() {
        let mut m = Module::new("ring");
        m.port("reset_n", 1, Direction::Input, false);
        m.wire("x", 1);
        m.wire("y", 1);
        m.assign("x", !Expr::net("y"));
        m.assign("y", Expr::net("x"));
        let err = Simulator::new(&design(vec![m], "ring")).err().unwrap();
        assert!(matches!(err, SimError::CombinationalLoop(_)));
    }

    #[test]
    fn unknown_names() {
        let mut sim = Simulator::new(&design(vec![counter()], "counter")).unwrap();
        assert!(matches!(sim.peek("nope"), Err(SimError::UnknownNet(_))));
        assert!(sim.poke("u_x_.count", 1).is_err());
        let err = Simulator::new(&design(vec![], "missing")).err().unwrap();
        assert_eq!(err.to_string(), "design has no module `missing'");
    }
}
