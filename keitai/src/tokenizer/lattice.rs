use crate::common::BOS_EOS_CONNECTION_ID;
use crate::dictionary::lexicon::WordParam;
use crate::dictionary::{ConnectionMatrix, LexType, WordIdx};
use crate::errors::{KeitaiError, Result};
use crate::utils::FromU32;

pub(crate) const MAX_COST: i64 = i64::MAX;

/// Kind of a lattice node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    /// Beginning of the sentence.
    Bos,
    /// End of the sentence.
    Eos,
    /// A word in the system or user lexicon.
    Known(WordIdx),
    /// An unknown word identified by its entry id.
    Unknown(u32),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub start: usize,
    pub end: usize,
    pub left_id: u16,
    pub right_id: u16,
    pub word_cost: i16,
    // Cost of the best path from BOS through this node.
    pub min_cost: i64,
    pub min_idx: Option<u32>,
}

impl Node {
    #[inline(always)]
    pub fn word_idx(&self) -> Option<WordIdx> {
        match self.kind {
            NodeKind::Known(word_idx) => Some(word_idx),
            NodeKind::Unknown(word_id) => Some(WordIdx::new(LexType::Unknown, word_id)),
            NodeKind::Bos | NodeKind::Eos => None,
        }
    }

    #[inline(always)]
    pub const fn is_bos(&self) -> bool {
        matches!(self.kind, NodeKind::Bos)
    }

    #[inline(always)]
    pub const fn is_eos(&self) -> bool {
        matches!(self.kind, NodeKind::Eos)
    }

    #[inline(always)]
    pub const fn is_connected_to_bos(&self) -> bool {
        self.min_cost != MAX_COST
    }
}

/// Arena of candidate words over a sentence.
///
/// `begins[i]` and `ends[i]` hold the indices of nodes starting and ending
/// at character position `i`, in insertion order.
#[derive(Default)]
pub struct Lattice {
    nodes: Vec<Node>,
    begins: Vec<Vec<u32>>,
    ends: Vec<Vec<u32>>,
    eos: Option<u32>,
    len_char: usize,
}

impl Lattice {
    pub fn reset(&mut self, new_len_char: usize) {
        Self::reset_vec(&mut self.begins, new_len_char + 1);
        Self::reset_vec(&mut self.ends, new_len_char + 1);
        self.nodes.clear();
        self.len_char = new_len_char;
        self.eos = None;
        self.insert_bos();
    }

    fn reset_vec<T>(data: &mut Vec<Vec<T>>, new_len: usize) {
        for v in data.iter_mut() {
            v.clear();
        }
        let cur_len = data.len();
        if cur_len <= new_len {
            data.reserve(new_len - cur_len);
            for _ in cur_len..new_len {
                data.push(Vec::with_capacity(16))
            }
        }
    }

    /// Returns the number of characters of the set sentence.
    #[inline(always)]
    pub const fn len_char(&self) -> usize {
        self.len_char
    }

    fn push_node(&mut self, node: Node) -> u32 {
        let idx = self.nodes.len() as u32;
        if !node.is_eos() {
            self.ends[node.end].push(idx);
        }
        if !node.is_bos() {
            self.begins[node.start].push(idx);
        }
        self.nodes.push(node);
        idx
    }

    fn insert_bos(&mut self) {
        self.push_node(Node {
            kind: NodeKind::Bos,
            start: 0,
            end: 0,
            left_id: BOS_EOS_CONNECTION_ID,
            right_id: BOS_EOS_CONNECTION_ID,
            word_cost: 0,
            min_cost: 0,
            min_idx: None,
        });
    }

    pub fn insert_eos(&mut self) {
        let len_char = self.len_char;
        let idx = self.push_node(Node {
            kind: NodeKind::Eos,
            start: len_char,
            end: len_char,
            left_id: BOS_EOS_CONNECTION_ID,
            right_id: BOS_EOS_CONNECTION_ID,
            word_cost: 0,
            min_cost: MAX_COST,
            min_idx: None,
        });
        self.eos = Some(idx);
    }

    pub fn insert_node(&mut self, start: usize, end: usize, kind: NodeKind, word_param: WordParam) {
        debug_assert!(start < end);
        debug_assert!(end <= self.len_char);
        self.push_node(Node {
            kind,
            start,
            end,
            left_id: word_param.left_id,
            right_id: word_param.right_id,
            word_cost: word_param.word_cost,
            min_cost: MAX_COST,
            min_idx: None,
        });
    }

    /// Checks if there exist at least one node at the word end boundary.
    #[inline(always)]
    pub fn has_previous_node(&self, i: usize) -> bool {
        self.ends.get(i).map(|d| !d.is_empty()).unwrap_or(false)
    }

    /// Computes the best path to every node.
    ///
    /// When several predecessors give the same cost, the earliest inserted one is kept.
    ///
    /// # Errors
    ///
    /// [`KeitaiError::NoPath`] is returned when EOS is unreachable.
    pub fn decode(&mut self, connector: &ConnectionMatrix) -> Result<()> {
        for pos in 0..=self.len_char {
            for bi in 0..self.begins[pos].len() {
                let idx = usize::from_u32(self.begins[pos][bi]);
                let left_id = self.nodes[idx].left_id;

                let mut min_idx = None;
                let mut min_cost = MAX_COST;
                for &pi in &self.ends[pos] {
                    let prev = &self.nodes[usize::from_u32(pi)];
                    if !prev.is_connected_to_bos() {
                        continue;
                    }
                    let new_cost = prev.min_cost + i64::from(connector.cost(prev.right_id, left_id));
                    if new_cost < min_cost {
                        min_idx = Some(pi);
                        min_cost = new_cost;
                    }
                }

                let node = &mut self.nodes[idx];
                if let Some(min_idx) = min_idx {
                    node.min_idx = Some(min_idx);
                    node.min_cost = min_cost + i64::from(node.word_cost);
                }
            }
        }

        match self.eos_node() {
            Some(eos) if eos.is_connected_to_bos() => Ok(()),
            _ => Err(KeitaiError::NoPath {
                len: self.len_char,
            }),
        }
    }

    /// Appends the indices of nodes on the best path, in order of the sentence.
    pub fn append_top_nodes(&self, top_nodes: &mut Vec<u32>) {
        let start = top_nodes.len();
        let Some(eos) = self.eos_node() else {
            return;
        };
        let mut cur = eos.min_idx;
        while let Some(idx) = cur {
            let node = self.node(idx);
            if node.is_bos() {
                break;
            }
            top_nodes.push(idx);
            cur = node.min_idx;
        }
        top_nodes[start..].reverse();
    }

    #[inline(always)]
    pub fn node(&self, idx: u32) -> &Node {
        &self.nodes[usize::from_u32(idx)]
    }

    #[inline(always)]
    pub fn eos_idx(&self) -> Option<u32> {
        self.eos
    }

    #[inline(always)]
    pub fn eos_node(&self) -> Option<&Node> {
        self.eos.map(|idx| self.node(idx))
    }

    /// Indices of nodes ending at `pos`, excluding EOS.
    #[inline(always)]
    pub fn ends(&self, pos: usize) -> &[u32] {
        &self.ends[pos]
    }

    /// Indices of nodes starting at `pos`, excluding BOS.
    #[inline(always)]
    pub fn begins(&self, pos: usize) -> &[u32] {
        &self.begins[pos]
    }

    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

impl std::fmt::Debug for Lattice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Lattice {{ eos: {:?}, nodes: [", &self.eos)?;
        for (i, n) in self.nodes.iter().enumerate() {
            writeln!(f, "{} => {:?}", i, n)?;
        }
        writeln!(f, "]}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(word_id: u32) -> NodeKind {
        NodeKind::Known(WordIdx::new(LexType::System, word_id))
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
    fn test_decode_min_cost() {
        let conn = zero_matrix();
        let mut lattice = Lattice::default();
        lattice.reset(2);
        lattice.insert_node(0, 2, known(0), WordParam::new(1, 1, 10));
        lattice.insert_node(0, 1, known(1), WordParam::new(1, 1, 3));
        lattice.insert_node(1, 2, known(2), WordParam::new(1, 1, 4));
        lattice.insert_eos();
        lattice.decode(&conn).unwrap();

        assert_eq!(lattice.eos_node().unwrap().min_cost, 7);
        let mut top = vec![];
        lattice.append_top_nodes(&mut top);
        let spans: Vec<_> = top
            .iter()
            .map(|&i| (lattice.node(i).start, lattice.node(i).end))
            .collect();
        assert_eq!(spans, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_decode_tie_prefers_earliest() {
        let conn = zero_matrix();
        let mut lattice = Lattice::default();
        lattice.reset(1);
        lattice.insert_node(0, 1, known(5), WordParam::new(1, 1, 3));
        lattice.insert_node(0, 1, known(6), WordParam::new(1, 1, 3));
        lattice.insert_eos();
        lattice.decode(&conn).unwrap();

        let mut top = vec![];
        lattice.append_top_nodes(&mut top);
        assert_eq!(top.len(), 1);
        assert_eq!(lattice.node(top[0]).kind, known(5));
    }

    #[test]
    fn test_connection_cost() {
        let mut conn = zero_matrix();
        conn.set_cost(0, 1, 100);
        let mut lattice = Lattice::default();
        lattice.reset(1);
        lattice.insert_node(0, 1, known(0), WordParam::new(1, 0, 0));
        lattice.insert_node(0, 1, known(1), WordParam::new(0, 0, 50));
        lattice.insert_eos();
        lattice.decode(&conn).unwrap();

        let mut top = vec![];
        lattice.append_top_nodes(&mut top);
        assert_eq!(lattice.node(top[0]).kind, known(1));
        assert_eq!(lattice.eos_node().unwrap().min_cost, 50);
    }

    #[test]
    fn test_no_path() {
        let conn = zero_matrix();
        let mut lattice = Lattice::default();
        lattice.reset(2);
        lattice.insert_node(0, 1, known(0), WordParam::new(1, 1, 0));
        lattice.insert_eos();
        let result = lattice.decode(&conn);
        assert!(matches!(result, Err(KeitaiError::NoPath { len: 2 })));
    }
}
