//! Lazy generation of the N best paths over a decoded lattice.
//!
//! The search runs A* from EOS towards BOS. The heuristic of a node is its
//! forward Viterbi cost, which is exact, so paths are emitted in order of
//! non-decreasing total cost.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::dictionary::ConnectionMatrix;
use crate::tokenizer::lattice::Lattice;
use crate::utils::FromU32;

// A partial path is a linked list stored in an arena:
//
// QueueItem -> SearchPath (node: n) -> SearchPath (node: n+1) -> ... -> SearchPath (node: EOS)
struct SearchPath {
    node: u32,
    prev: Option<u32>,
    // Cost from this node (exclusive of its word cost) to EOS.
    backward_cost: i64,
}

#[derive(Debug, Eq, PartialEq)]
struct QueueItem {
    priority: i64,
    // Whether the partial path follows the Viterbi back-pointers from EOS.
    is_best: bool,
    seq: u64,
    path: u32,
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap.
        other
            .priority
            .cmp(&self.priority)
            .then(self.is_best.cmp(&other.is_best))
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A complete path from BOS to EOS.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NbestPath {
    /// Node indices in order of the sentence, excluding BOS and EOS.
    pub nodes: Vec<u32>,
    /// Total cost of the path.
    pub cost: i64,
}

/// Iterator of paths in order of non-decreasing cost.
///
/// The first path is the one recovered by [`Lattice::decode`],
/// and every path is yielded at most once.
pub struct NbestGenerator<'a> {
    lattice: &'a Lattice,
    connector: &'a ConnectionMatrix,
    paths: Vec<SearchPath>,
    queue: BinaryHeap<QueueItem>,
    seq: u64,
}

impl<'a> NbestGenerator<'a> {
    /// Creates a generator over a lattice already decoded with `connector`.
    ///
    /// Nothing is generated when EOS is unreachable.
    pub fn new(lattice: &'a Lattice, connector: &'a ConnectionMatrix) -> Self {
        let mut generator = Self {
            lattice,
            connector,
            paths: vec![],
            queue: BinaryHeap::new(),
            seq: 0,
        };
        if let Some(eos_idx) = lattice.eos_idx() {
            let eos = lattice.node(eos_idx);
            if eos.is_connected_to_bos() {
                generator.push(
                    SearchPath {
                        node: eos_idx,
                        prev: None,
                        backward_cost: 0,
                    },
                    eos.min_cost,
                    true,
                );
            }
        }
        generator
    }

    fn push(&mut self, path: SearchPath, priority: i64, is_best: bool) {
        let idx = self.paths.len() as u32;
        self.paths.push(path);
        self.queue.push(QueueItem {
            priority,
            is_best,
            seq: self.seq,
            path: idx,
        });
        self.seq += 1;
    }

    fn collect_nodes(&self, bos_path: u32) -> Vec<u32> {
        let mut nodes = vec![];
        let mut cur = self.paths[usize::from_u32(bos_path)].prev;
        while let Some(idx) = cur {
            let path = &self.paths[usize::from_u32(idx)];
            if self.lattice.node(path.node).is_eos() {
                break;
            }
            nodes.push(path.node);
            cur = path.prev;
        }
        nodes
    }
}

impl Iterator for NbestGenerator<'_> {
    type Item = NbestPath;

    fn next(&mut self) -> Option<Self::Item> {
        let lattice = self.lattice;
        let connector = self.connector;
        while let Some(item) = self.queue.pop() {
            let path = &self.paths[usize::from_u32(item.path)];
            let backward_cost = path.backward_cost;
            let cur = lattice.node(path.node);

            if cur.is_bos() {
                return Some(NbestPath {
                    nodes: self.collect_nodes(item.path),
                    cost: item.priority,
                });
            }

            let word_cost = i64::from(cur.word_cost);
            for &prev_idx in lattice.ends(cur.start) {
                let prev = lattice.node(prev_idx);
                if !prev.is_connected_to_bos() {
                    continue;
                }
                let new_backward_cost = backward_cost
                    + i64::from(connector.cost(prev.right_id, cur.left_id))
                    + word_cost;
                let priority = new_backward_cost + prev.min_cost;
                let is_best = item.is_best && cur.min_idx == Some(prev_idx);
                self.push(
                    SearchPath {
                        node: prev_idx,
                        prev: Some(item.path),
                        backward_cost: new_backward_cost,
                    },
                    priority,
                    is_best,
                );
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::dictionary::{LexType, WordIdx, WordParam};
    use crate::tokenizer::lattice::NodeKind;

    fn known(word_id: u32) -> NodeKind {
        NodeKind::Known(WordIdx::new(LexType::System, word_id))
    }

    fn spans(lattice: &Lattice, path: &NbestPath) -> Vec<(usize, usize)> {
        path.nodes
            .iter()
            .map(|&i| (lattice.node(i).start, lattice.node(i).end))
            .collect()
    }

    fn zero_matrix() -> ConnectionMatrix {
        let mut conn = ConnectionMatrix::new(2, 2);
        for r in 0..2 {
            for l in 0..2 {
                conn.set_cost(r, l, 0);
            }
        }
        conn
    }

    #[test]
    fn test_all_paths_in_order() {
        let conn = zero_matrix();
        let mut lattice = Lattice::default();
        lattice.reset(2);
        lattice.insert_node(0, 2, known(0), WordParam::new(1, 1, 10));
        lattice.insert_node(0, 1, known(1), WordParam::new(1, 1, 3));
        lattice.insert_node(0, 1, known(2), WordParam::new(1, 1, 5));
        lattice.insert_node(1, 2, known(3), WordParam::new(1, 1, 4));
        lattice.insert_eos();
        lattice.decode(&conn).unwrap();

        let paths: Vec<_> = NbestGenerator::new(&lattice, &conn).collect();
        let got: Vec<_> = paths.iter().map(|p| (spans(&lattice, p), p.cost)).collect();
        assert_eq!(
            got,
            vec![
                (vec![(0, 1), (1, 2)], 7),
                (vec![(0, 1), (1, 2)], 9),
                (vec![(0, 2)], 10),
            ]
        );
        assert_eq!(lattice.node(paths[0].nodes[0]).kind, known(1));
        assert_eq!(lattice.node(paths[1].nodes[0]).kind, known(2));
    }

    #[test]
    fn test_first_is_viterbi_on_tie() {
        let conn = zero_matrix();
        let mut lattice = Lattice::default();
        lattice.reset(1);
        lattice.insert_node(0, 1, known(0), WordParam::new(1, 1, 3));
        lattice.insert_node(0, 1, known(1), WordParam::new(1, 1, 3));
        lattice.insert_eos();
        lattice.decode(&conn).unwrap();

        let mut top = vec![];
        lattice.append_top_nodes(&mut top);
        let paths: Vec<_> = NbestGenerator::new(&lattice, &conn).collect();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].nodes, top);
        assert_eq!(paths[0].cost, paths[1].cost);
        assert_ne!(paths[0].nodes, paths[1].nodes);
    }

    #[test]
    fn test_empty_sentence() {
        let conn = zero_matrix();
        let mut lattice = Lattice::default();
        lattice.reset(0);
        lattice.insert_eos();
        lattice.decode(&conn).unwrap();
        let paths: Vec<_> = NbestGenerator::new(&lattice, &conn).collect();
        assert_eq!(
            paths,
            vec![NbestPath {
                nodes: vec![],
                cost: 0
            }]
        );
    }

    #[test]
    fn test_unreachable() {
        let conn = zero_matrix();
        let mut lattice = Lattice::default();
        lattice.reset(2);
        lattice.insert_node(0, 1, known(0), WordParam::new(1, 1, 0));
        lattice.insert_eos();
        assert!(lattice.decode(&conn).is_err());
        assert_eq!(NbestGenerator::new(&lattice, &conn).count(), 0);
    }
}
