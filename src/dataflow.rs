//! The dependency graph between variables whose types are being inferred.
//!
//! There is an edge from `a` to `b` when some instruction writing `a` reads `b`: the type of
//! `a` may depend on the type of `b`. Names outside of the inferred set are not tracked; their
//! types are fixed for the duration of inference.
use crate::common::{Graph, NodeIx};
use crate::kernel::Kernel;

use hashbrown::HashMap;
use log::trace;
use petgraph::algo::tarjan_scc;

pub(crate) struct DepGraph {
    nodes: HashMap<String, NodeIx>,
    graph: Graph<String, ()>,
    /// Position of each name in the order it was handed in. Members of a component are visited
    /// in this order.
    order: HashMap<String, usize>,
}

impl DepGraph {
    pub(crate) fn new(kernel: &Kernel, names: &[String]) -> DepGraph {
        let mut res = DepGraph {
            nodes: Default::default(),
            graph: Default::default(),
            order: names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.clone(), i))
                .collect(),
        };
        for name in names {
            res.get_node(name);
        }
        let writers = kernel.writer_map();
        for name in names {
            let ids = match writers.get(name) {
                Some(ids) => ids,
                None => continue,
            };
            for insn in ids.iter().filter_map(|id| kernel.insn_by_id(id)) {
                for read in insn.read_dependency_names() {
                    if res.order.contains_key(&read) {
                        res.add_dep(name, &read);
                    }
                }
            }
        }
        res
    }

    fn get_node(&mut self, name: &str) -> NodeIx {
        let graph = &mut self.graph;
        *self
            .nodes
            .entry(name.into())
            .or_insert_with(|| graph.add_node(name.into()))
    }

    fn add_dep(&mut self, dst: &str, src: &str) {
        let dst_ix = self.get_node(dst);
        let src_ix = self.get_node(src);
        if self.graph.find_edge(dst_ix, src_ix).is_none() {
            trace!("type of {} depends on {}", dst, src);
            self.graph.add_edge(dst_ix, src_ix, ());
        }
    }

    /// Strongly connected components, each before every component that depends on it.
    pub(crate) fn sccs(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|comp| {
                let mut names: Vec<String> =
                    comp.into_iter().map(|ix| self.graph[ix].clone()).collect();
                names.sort_by_key(|n| self.order.get(n).cloned().unwrap_or(usize::MAX));
                names
            })
            .collect()
    }

    pub(crate) fn has_self_edge(&self, name: &str) -> bool {
        match self.nodes.get(name) {
            Some(ix) => self.graph.find_edge(*ix, *ix).is_some(),
            None => false,
        }
    }
}
