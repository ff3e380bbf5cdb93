use crate::domain::{
    port::{ForceBoundarySet, Port},
    Mesh,
};

use std::collections::{BTreeSet, VecDeque};

/// Sparsity pattern of the global system over the non-forced nodes
///
/// Two nodes are connected if they co-occur in an Element or on a Port. Port nodes form a full
/// clique since the modal admittance couples every pair of them.
#[derive(Clone, Debug)]
pub struct BandMatrixPattern {
    // free node IDs in ascending (natural) order
    nodes: Vec<usize>,
    // natural index of every free node, by node ID
    natural_index: Vec<Option<usize>>,
    // neighbours of each natural index (ascending, excluding itself)
    adjacency: Vec<Vec<usize>>,
}

impl BandMatrixPattern {
    pub fn build(mesh: &Mesh, ports: &[Port], forced: &ForceBoundarySet) -> Self {
        Self::from_groups(
            mesh.num_nodes(),
            mesh.elements
                .iter()
                .map(|element| element.nodes.as_slice())
                .chain(ports.iter().map(|port| port.nodes.as_slice())),
            forced,
        )
    }

    /// Pattern over node IDs `1..=num_nodes` where each group of node IDs is fully connected
    pub fn from_groups<'a>(
        num_nodes: usize,
        groups: impl Iterator<Item = &'a [usize]>,
        forced: &ForceBoundarySet,
    ) -> Self {
        let nodes: Vec<usize> = (1..=num_nodes).filter(|id| !forced.contains(*id)).collect();
        let mut natural_index = vec![None; num_nodes + 1];
        for (idx, id) in nodes.iter().enumerate() {
            natural_index[*id] = Some(idx);
        }

        let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nodes.len()];
        for group in groups {
            let free: Vec<usize> = group.iter().filter_map(|id| natural_index[*id]).collect();
            for (k, a) in free.iter().enumerate() {
                for b in free.iter().skip(k + 1) {
                    if a != b {
                        adjacency[*a].insert(*b);
                        adjacency[*b].insert(*a);
                    }
                }
            }
        }

        Self {
            nodes,
            natural_index,
            adjacency: adjacency
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect(),
        }
    }

    /// Number of unknowns (free nodes)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn connected(&self, a: usize, b: usize) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(ia), Some(ib)) => ia == ib || self.adjacency[ia].binary_search(&ib).is_ok(),
            _ => false,
        }
    }

    /// Unknowns in ascending node ID order
    pub fn natural_order(&self) -> UnknownOrder {
        UnknownOrder::new(self.nodes.clone(), self.natural_index.len())
    }

    /// (subdiagonal, superdiagonal) half-bandwidths of the pattern under an ordering
    pub fn half_bandwidths(&self, order: &UnknownOrder) -> (usize, usize) {
        let (mut kl, mut ku) = (0, 0);
        for (a, neighbours) in self.adjacency.iter().enumerate() {
            let row = order.position[self.nodes[a]];
            for b in neighbours.iter() {
                let col = order.position[self.nodes[*b]];
                if let (Some(row), Some(col)) = (row, col) {
                    if row > col {
                        kl = kl.max(row - col);
                    } else {
                        ku = ku.max(col - row);
                    }
                }
            }
        }
        (kl, ku)
    }

    fn index_of(&self, node_id: usize) -> Option<usize> {
        self.natural_index.get(node_id).copied().flatten()
    }
}

/// Equation ordering of the non-forced nodes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownOrder {
    // node ID of each equation
    node_ids: Vec<usize>,
    // equation of each node ID (None for forced nodes)
    position: Vec<Option<usize>>,
}

impl UnknownOrder {
    fn new(node_ids: Vec<usize>, id_capacity: usize) -> Self {
        let mut position = vec![None; id_capacity];
        for (eq, id) in node_ids.iter().enumerate() {
            position[*id] = Some(eq);
        }
        Self { node_ids, position }
    }

    /// Equation index of a node (`None` for forced nodes)
    pub fn equation_of(&self, node_id: usize) -> Option<usize> {
        self.position.get(node_id).copied().flatten()
    }

    /// Node ID solved for by an equation
    pub fn node_at(&self, equation: usize) -> usize {
        self.node_ids[equation]
    }

    pub fn node_ids(&self) -> &[usize] {
        &self.node_ids
    }

    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }
}

/// Breadth-first bandwidth reduction
///
/// Visits the pattern level by level starting from the lowest unvisited node (restarting on each
/// disconnected island). The result is only used if neither half-bandwidth grows compared to the
/// natural order.
pub fn reorder_unknowns(pattern: &BandMatrixPattern) -> UnknownOrder {
    let natural = pattern.natural_order();
    let n = pattern.len();

    let mut visited = vec![false; n];
    let mut sequence = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            sequence.push(pattern.nodes[current]);
            for next in pattern.adjacency[current].iter() {
                if !visited[*next] {
                    visited[*next] = true;
                    queue.push_back(*next);
                }
            }
        }
    }

    let reordered = UnknownOrder::new(sequence, pattern.natural_index.len());

    let (nat_kl, nat_ku) = pattern.half_bandwidths(&natural);
    let (new_kl, new_ku) = pattern.half_bandwidths(&reordered);

    if new_kl <= nat_kl && new_ku <= nat_ku {
        log::debug!(
            "Reordered {} unknowns; half-bandwidths ({}, {}) -> ({}, {})",
            n,
            nat_kl,
            nat_ku,
            new_kl,
            new_ku
        );
        reordered
    } else {
        log::warn!(
            "Reordering would grow the half-bandwidths ({}, {}) -> ({}, {}); keeping the natural order",
            nat_kl,
            nat_ku,
            new_kl,
            new_ku
        );
        natural
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_meshes::{straight_waveguide, WaveguideSpec};

    fn pattern(num_nodes: usize, groups: &[&[usize]], forced: &[usize]) -> BandMatrixPattern {
        BandMatrixPattern::from_groups(
            num_nodes,
            groups.iter().copied(),
            &ForceBoundarySet::new(forced.iter().copied()),
        )
    }

    #[test]
    fn scrambled_path_is_reordered() {
        let pat = pattern(5, &[&[1, 5], &[5, 2], &[2, 4], &[4, 3]], &[]);
        assert_eq!(pat.half_bandwidths(&pat.natural_order()), (4, 4));

        let order = reorder_unknowns(&pat);
        assert_eq!(order.node_ids(), &[1, 5, 2, 4, 3]);
        assert_eq!(pat.half_bandwidths(&order), (1, 1));
        assert_eq!(order.equation_of(5), Some(1));
        assert_eq!(order.node_at(3), 4);
    }

    #[test]
    fn growth_is_rejected() {
        // a star centred on node 3: breadth-first order would put node 5 three places from node 3
        let pat = pattern(5, &[&[3, 5], &[2, 3], &[1, 3], &[3, 4]], &[]);
        let order = reorder_unknowns(&pat);

        assert_eq!(order, pat.natural_order());
        assert_eq!(pat.half_bandwidths(&order), (2, 2));
    }

    #[test]
    fn islands_and_isolated_nodes() {
        let pat = pattern(6, &[&[1, 4], &[2, 5]], &[]);
        let order = reorder_unknowns(&pat);

        assert_eq!(order.len(), 6);
        let mut ids = order.node_ids().to_vec();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(pat.half_bandwidths(&order), (1, 1));
    }

    #[test]
    fn forced_nodes_are_excluded() {
        let pat = pattern(4, &[&[1, 2, 3], &[2, 3, 4]], &[2]);
        let order = reorder_unknowns(&pat);

        assert_eq!(pat.len(), 3);
        assert_eq!(order.equation_of(2), None);
        assert!(!pat.connected(1, 2));
        assert!(pat.connected(1, 3));
        assert!(!pat.connected(1, 4));
    }

    #[test]
    fn port_nodes_form_a_clique() {
        let parts = straight_waveguide(&WaveguideSpec::first_order(3, 4));
        let pat = BandMatrixPattern::build(&parts.mesh, &parts.ports, &parts.forced);

        // nodes 2 and 4 share the input port but no element
        assert!(pat.connected(2, 4));
        assert!(!pat.connected(1, 2));
    }

    #[test]
    fn bandwidth_never_grows_on_meshes() {
        for spec in [
            WaveguideSpec::first_order(6, 3),
            WaveguideSpec::first_order(2, 9),
            WaveguideSpec::second_order(3, 2),
        ] {
            let parts = straight_waveguide(&spec);
            let pat = BandMatrixPattern::build(&parts.mesh, &parts.ports, &parts.forced);
            let (nat_kl, nat_ku) = pat.half_bandwidths(&pat.natural_order());
            let (kl, ku) = pat.half_bandwidths(&reorder_unknowns(&pat));

            assert!(kl <= nat_kl && ku <= nat_ku);
        }
    }
}
