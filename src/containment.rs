//! Containment relationships between universes.
//!
//! Universes are shared: any number of cells and lattice elements may refer
//! to the same universe, so the nesting structure of a model is a directed
//! acyclic graph rather than a tree. This module builds that graph once, when
//! a geometry is finalised, and answers the two questions the rest of the
//! crate needs:
//!
//! - does any universe contain itself (directly or through nested fills)?
//! - how deep can point location recurse from the root?
//!
//! Queries never consult the graph; a model that passed the cycle check is
//! guaranteed to terminate every descent.

use crate::cell::{Cell, Fill, Universe};
use crate::geometry::UniverseId;
use crate::lattice::Lattice;

#[cfg(test)]
mod tests {

    use super::*;

    fn u(i: usize) -> UniverseId {
        UniverseId(i)
    }

    #[test]
    fn chain_depth() {
        let mut graph = ContainmentGraph::new(3);
        graph.add_child(u(0), u(1));
        graph.add_child(u(1), u(2));
        assert_eq!(graph.find_cycle(), None);
        assert_eq!(graph.depth(u(0)), 3);
        assert_eq!(graph.depth(u(2)), 1);
    }

    #[test]
    fn shared_universe_is_not_a_cycle() {
        // a diamond: 0 -> {1, 2} -> 3
        let mut graph = ContainmentGraph::new(4);
        graph.add_child(u(0), u(1));
        graph.add_child(u(0), u(2));
        graph.add_child(u(1), u(3));
        graph.add_child(u(2), u(3));
        assert_eq!(graph.find_cycle(), None);
        assert_eq!(graph.depth(u(0)), 3);
        assert_eq!(graph.children(u(0)), &[u(1), u(2)]);
    }

    #[test]
    fn cycle_is_found() {
        let mut graph = ContainmentGraph::new(4);
        graph.add_child(u(0), u(1));
        graph.add_child(u(1), u(2));
        graph.add_child(u(2), u(3));
        graph.add_child(u(3), u(1));
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle, vec![u(1), u(2), u(3)]);
    }

    #[test]
    fn self_containment_is_a_cycle() {
        let mut graph = ContainmentGraph::new(1);
        graph.add_child(u(0), u(0));
        assert_eq!(graph.find_cycle(), Some(vec![u(0)]));
    }

    #[test]
    #[should_panic]
    fn out_of_range_child() {
        let mut graph = ContainmentGraph::new(1);
        graph.add_child(u(0), u(5));
    }
}

/// Directed graph from each universe to the universes its cells contain.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentGraph {
    children: Vec<Vec<UniverseId>>, // Maps each universe to the universes nested in it
}

impl ContainmentGraph {
    /// Creates a graph for `num_universes` universes with no containment yet.
    pub fn new(num_universes: usize) -> Self {
        Self {
            children: vec![Vec::new(); num_universes],
        }
    }

    /// Builds the graph from the fills of every cell of every universe.
    pub fn from_model(
        universes: &[Universe],
        cells: &[Cell],
        lattices: &[Box<dyn Lattice>],
    ) -> Self {
        let mut graph = Self::new(universes.len());
        for (index, universe) in universes.iter().enumerate() {
            let parent = UniverseId(index);
            for cell in universe.cells() {
                match cells[cell.index()].fill {
                    Fill::Material(_) => {}
                    Fill::Universe(child) => graph.add_child(parent, child),
                    Fill::Lattice(lattice) => {
                        for child in lattices[lattice.index()].universes() {
                            graph.add_child(parent, child);
                        }
                    }
                }
            }
        }
        graph
    }

    /// Records that `child` is nested inside `parent`.
    pub fn add_child(&mut self, parent: UniverseId, child: UniverseId) {
        assert!(
            parent.index() < self.children.len(),
            "parent id is {}, but the containment graph only has space for {} universes",
            parent,
            self.children.len()
        );
        assert!(
            child.index() < self.children.len(),
            "child id is {}, but the containment graph only has space for {} universes",
            child,
            self.children.len()
        );
        let siblings = &mut self.children[parent.index()];
        if !siblings.contains(&child) {
            siblings.push(child);
        }
    }

    pub fn children(&self, universe: UniverseId) -> &[UniverseId] {
        &self.children[universe.index()]
    }

    /// Returns the universes of one containment cycle, starting from the
    /// universe first revisited, or `None` if the graph is acyclic.
    pub fn find_cycle(&self) -> Option<Vec<UniverseId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.children.len()];
        for start in 0..self.children.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // explicit stack of (universe, next child to visit)
            let mut path: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::OnPath;
            while let Some(&mut (node, ref mut next)) = path.last_mut() {
                match self.children[node].get(*next) {
                    Some(child) => {
                        *next += 1;
                        let child = child.index();
                        match marks[child] {
                            Mark::OnPath => {
                                let from = path.iter().position(|(n, _)| *n == child).unwrap_or(0);
                                return Some(
                                    path[from..].iter().map(|(n, _)| UniverseId(*n)).collect(),
                                );
                            }
                            Mark::Unvisited => {
                                marks[child] = Mark::OnPath;
                                path.push((child, 0));
                            }
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[node] = Mark::Done;
                        path.pop();
                    }
                }
            }
        }
        None
    }

    /// Number of universe levels on the longest descent from `root`,
    /// counting `root` itself. Assumes the graph is acyclic.
    pub fn depth(&self, root: UniverseId) -> usize {
        let mut memo = vec![0usize; self.children.len()];
        self.depth_of(root.index(), &mut memo)
    }

    fn depth_of(&self, node: usize, memo: &mut [usize]) -> usize {
        if memo[node] > 0 {
            return memo[node];
        }
        let deepest = self.children[node]
            .iter()
            .map(|child| self.depth_of(child.index(), memo))
            .max()
            .unwrap_or(0);
        memo[node] = deepest + 1;
        memo[node]
    }
}
