use maestro_core::{Decomposition, MaestroError, MaestroResult, Subtask, SubtaskId};
use std::collections::HashMap;

/// Validated dependency graph over a task's subtasks.
///
/// Node order is the decomposition order; every wavefront lists its
/// subtasks in that order too.
#[derive(Debug, Clone)]
pub struct SubtaskGraph {
    order: Vec<SubtaskId>,
    index: HashMap<SubtaskId, usize>,
    /// `deps[i]` are the indices node `i` waits on.
    deps: Vec<Vec<usize>>,
}

impl SubtaskGraph {
    /// Build from `(id, dependencies)` pairs in decomposition order.
    pub fn build<'a, I>(nodes: I) -> MaestroResult<Self>
    where
        I: IntoIterator<Item = (&'a SubtaskId, &'a [SubtaskId])>,
    {
        let nodes: Vec<(&SubtaskId, &[SubtaskId])> = nodes.into_iter().collect();
        if nodes.is_empty() {
            return Err(MaestroError::Decomposition(
                "decomposition produced no subtasks".into(),
            ));
        }

        let mut index = HashMap::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());
        for (i, (id, _)) in nodes.iter().enumerate() {
            if index.insert((*id).clone(), i).is_some() {
                return Err(MaestroError::Decomposition(format!(
                    "duplicate subtask id {id}"
                )));
            }
            order.push((*id).clone());
        }

        let mut deps = Vec::with_capacity(nodes.len());
        for (id, dependencies) in &nodes {
            let mut resolved = Vec::with_capacity(dependencies.len());
            for dep in *dependencies {
                if dep == *id {
                    return Err(MaestroError::Decomposition(format!(
                        "subtask {id} depends on itself"
                    )));
                }
                let &j = index.get(dep).ok_or_else(|| {
                    MaestroError::Decomposition(format!(
                        "subtask {id} depends on unknown subtask {dep}"
                    ))
                })?;
                if !resolved.contains(&j) {
                    resolved.push(j);
                }
            }
            deps.push(resolved);
        }

        let graph = Self { order, index, deps };
        if let Some(node) = graph.find_cycle() {
            return Err(MaestroError::Decomposition(format!(
                "dependency cycle through subtask {}",
                graph.order[node]
            )));
        }
        Ok(graph)
    }

    pub fn from_subtasks(subtasks: &[Subtask]) -> MaestroResult<Self> {
        Self::build(subtasks.iter().map(|s| (&s.id, s.dependencies.as_slice())))
    }

    pub fn from_decomposition(decomposition: &Decomposition) -> MaestroResult<Self> {
        Self::build(
            decomposition
                .subtasks
                .iter()
                .map(|s| (&s.id, s.depends_on.as_slice())),
        )
    }

    /// Returns a node on a cycle, if any.
    fn find_cycle(&self) -> Option<usize> {
        let mut visited = vec![0u8; self.order.len()];
        (0..self.order.len()).find(|&i| self.dfs_cycle(i, &mut visited))
    }

    fn dfs_cycle(&self, node: usize, visited: &mut [u8]) -> bool {
        match visited[node] {
            1 => return true,  // back edge
            2 => return false, // finished
            _ => {}
        }
        visited[node] = 1;
        for &dep in &self.deps[node] {
            if self.dfs_cycle(dep, visited) {
                return true;
            }
        }
        visited[node] = 2;
        false
    }

    /// Topological layers (Kahn): layer `k` holds the subtasks whose
    /// dependencies all sit in layers `< k`.
    pub fn wavefronts(&self) -> Vec<Vec<SubtaskId>> {
        let n = self.order.len();
        let mut remaining: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, deps) in self.deps.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut layers = Vec::new();
        let mut current: Vec<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
        while !current.is_empty() {
            let mut next = Vec::new();
            for &node in &current {
                for &child in &dependents[node] {
                    remaining[child] -= 1;
                    if remaining[child] == 0 {
                        next.push(child);
                    }
                }
            }
            next.sort_unstable();
            layers.push(current.iter().map(|&i| self.order[i].clone()).collect());
            current = next;
        }
        layers
    }

    pub fn dependencies(&self, id: &SubtaskId) -> Vec<&SubtaskId> {
        self.index
            .get(id)
            .map(|&i| self.deps[i].iter().map(|&d| &self.order[d]).collect())
            .unwrap_or_default()
    }

    pub fn position(&self, id: &SubtaskId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn order(&self) -> &[SubtaskId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
