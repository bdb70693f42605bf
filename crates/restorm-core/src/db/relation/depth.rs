use crate::model::Schema;
use std::collections::{BTreeMap, BTreeSet};

///
/// DepthMap
///
/// Dependency depth per entity type present in one batch. Roots sit at 0;
/// every other type is one deeper than its deepest in-batch principal.
/// Types on a foreign-key cycle share a single depth.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DepthMap {
    depths: BTreeMap<String, usize>,
}

impl DepthMap {
    /// Depth of `entity`; types outside the batch read as roots.
    #[must_use]
    pub fn depth(&self, entity: &str) -> usize {
        self.depths.get(entity).copied().unwrap_or_default()
    }

    /// Compute depths over the graph induced by `types`.
    ///
    /// Edges run dependent -> principal and only when both ends are in
    /// `types`. Self-references are dropped. Unregistered types have no
    /// outgoing edges.
    #[must_use]
    pub fn compute(schema: &Schema, types: &BTreeSet<&str>) -> Self {
        let nodes: Vec<&str> = types.iter().copied().collect();
        let position: BTreeMap<&str, usize> =
            nodes.iter().enumerate().map(|(i, name)| (*name, i)).collect();

        let edges: Vec<Vec<usize>> = nodes
            .iter()
            .map(|name| {
                schema
                    .get(name)
                    .map(|model| {
                        model
                            .foreign_keys
                            .iter()
                            .filter(|fk| fk.principal != *name)
                            .filter_map(|fk| position.get(fk.principal.as_str()).copied())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            })
            .collect();

        let components = Tarjan::run(&edges);

        // component of each node
        let mut owner = vec![0; nodes.len()];
        for (c, members) in components.iter().enumerate() {
            for &node in members {
                owner[node] = c;
            }
        }

        // Tarjan emits a component only after everything it reaches, so
        // principals are always settled first.
        let mut component_depth = vec![0usize; components.len()];
        for (c, members) in components.iter().enumerate() {
            if members.len() > 1 {
                let mut names: Vec<&str> = members.iter().map(|&n| nodes[n]).collect();
                names.sort_unstable();
                tracing::warn!(
                    entities = ?names,
                    "foreign key cycle in change set; cycle members share one depth"
                );
            }

            component_depth[c] = members
                .iter()
                .flat_map(|&n| edges[n].iter())
                .map(|&principal| owner[principal])
                .filter(|&other| other != c)
                .map(|other| component_depth[other] + 1)
                .max()
                .unwrap_or(0);
        }

        let depths = nodes
            .iter()
            .enumerate()
            .map(|(i, name)| ((*name).to_string(), component_depth[owner[i]]))
            .collect();

        Self { depths }
    }
}

///
/// Tarjan
/// Strongly connected components, emitted in reverse topological order.
///

struct Tarjan<'g> {
    edges: &'g [Vec<usize>],
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    components: Vec<Vec<usize>>,
}

impl<'g> Tarjan<'g> {
    fn run(edges: &'g [Vec<usize>]) -> Vec<Vec<usize>> {
        let n = edges.len();
        let mut tarjan = Self {
            edges,
            index: vec![None; n],
            low: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::with_capacity(n),
            next: 0,
            components: Vec::new(),
        };

        for v in 0..n {
            if tarjan.index[v].is_none() {
                tarjan.visit(v);
            }
        }

        tarjan.components
    }

    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next);
        self.low[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let edges = self.edges;
        for &w in &edges[v] {
            match self.index[w] {
                None => {
                    self.visit(w);
                    self.low[v] = self.low[v].min(self.low[w]);
                }
                Some(index) if self.on_stack[w] => {
                    self.low[v] = self.low[v].min(index);
                }
                Some(_) => {}
            }
        }

        if self.index[v] == Some(self.low[v]) {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
