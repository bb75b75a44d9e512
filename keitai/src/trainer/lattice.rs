//! Lattice of a training example and its forward-backward computation.
use std::num::NonZeroU32;

use hashbrown::HashMap;

use crate::errors::Result;
use crate::utils::FromU32;

/// Label of BOS and EOS.
///
/// Its unigram features are empty and every bigram feature has id 0.
pub(crate) const BOS_EOS_LABEL: u32 = 0;

/// Features of a label.
#[derive(Clone, Debug, Default)]
pub(crate) struct FeatureSet {
    pub unigram: Vec<NonZeroU32>,
    pub left: Vec<Option<NonZeroU32>>,
    pub right: Vec<Option<NonZeroU32>>,
}

fn right_feature(feature_sets: &[FeatureSet], label: u32, i: usize) -> Option<u32> {
    if label == BOS_EOS_LABEL {
        return Some(0);
    }
    feature_sets[usize::from_u32(label)]
        .right
        .get(i)
        .copied()
        .flatten()
        .map(NonZeroU32::get)
}

fn left_feature(feature_sets: &[FeatureSet], label: u32, i: usize) -> Option<u32> {
    if label == BOS_EOS_LABEL {
        return Some(0);
    }
    feature_sets[usize::from_u32(label)]
        .left
        .get(i)
        .copied()
        .flatten()
        .map(NonZeroU32::get)
}

#[inline(always)]
fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

#[derive(Clone, Copy, Debug)]
struct RawNode {
    start: usize,
    end: usize,
    label: u32,
}

/// Collector of the nodes of a training lattice.
pub(crate) struct LatticeBuilder {
    len_char: usize,
    nodes: Vec<RawNode>,
    num_gold: usize,
    // The gold edge starting at each position.
    gold: Vec<Option<(usize, u32)>>,
    reachable: Vec<bool>,
}

impl LatticeBuilder {
    pub fn new(len_char: usize) -> Self {
        let mut reachable = vec![false; len_char + 1];
        reachable[0] = true;
        Self {
            len_char,
            nodes: vec![],
            num_gold: 0,
            gold: vec![None; len_char + 1],
            reachable,
        }
    }

    /// Appends the next node of the gold path.
    /// Gold nodes must be added first, from the beginning of the sentence.
    pub fn add_gold(&mut self, start: usize, end: usize, label: u32) {
        debug_assert_eq!(self.nodes.len(), self.num_gold);
        self.nodes.push(RawNode { start, end, label });
        self.num_gold += 1;
        self.gold[start] = Some((end, label));
        self.reachable[end] = true;
    }

    /// Adds a candidate unless it is identical to the gold one.
    pub fn add_candidate(&mut self, start: usize, end: usize, label: u32) {
        if self.gold[start] == Some((end, label)) {
            return;
        }
        self.nodes.push(RawNode { start, end, label });
        self.reachable[end] = true;
    }

    #[inline(always)]
    pub fn is_reachable(&self, pos: usize) -> bool {
        self.reachable[pos]
    }

    /// Connects the nodes.
    ///
    /// Pairs of bigram features are registered in `pair_ids` on first sight,
    /// so lattices must be built in a fixed order to obtain reproducible ids.
    pub fn build(
        self,
        feature_sets: &[FeatureSet],
        num_templates: usize,
        pair_ids: &mut HashMap<(u32, u32), u32>,
    ) -> Result<Lattice> {
        // BOS, the nodes sorted by start positions, and EOS.
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by_key(|&i| self.nodes[i].start);
        let mut new_idx = vec![0u32; self.nodes.len()];
        let mut nodes = Vec::with_capacity(self.nodes.len() + 2);
        nodes.push(RawNode {
            start: 0,
            end: 0,
            label: BOS_EOS_LABEL,
        });
        for &i in &order {
            new_idx[i] = u32::try_from(nodes.len())?;
            nodes.push(self.nodes[i]);
        }
        let eos_idx = u32::try_from(nodes.len())?;
        nodes.push(RawNode {
            start: self.len_char,
            end: self.len_char,
            label: BOS_EOS_LABEL,
        });

        let mut ends = vec![vec![]; self.len_char + 1];
        ends[0].push(0u32);

        let mut labels = Vec::with_capacity(nodes.len());
        let mut edge_offsets = vec![0];
        let mut edge_prev = vec![];
        let mut pair_offsets = vec![0];
        let mut pairs = vec![];
        for (k, node) in nodes.iter().enumerate() {
            labels.push(node.label);
            if k != 0 {
                for &prev in &ends[node.start] {
                    let prev_label = nodes[usize::from_u32(prev)].label;
                    for i in 0..num_templates {
                        let r = right_feature(feature_sets, prev_label, i);
                        let l = left_feature(feature_sets, node.label, i);
                        if let (Some(r), Some(l)) = (r, l) {
                            let new_id = u32::try_from(pair_ids.len())?;
                            pairs.push(*pair_ids.entry((r, l)).or_insert(new_id));
                        }
                    }
                    edge_prev.push(prev);
                    pair_offsets.push(pairs.len());
                }
            }
            edge_offsets.push(edge_prev.len());
            if k != 0 && usize::from_u32(eos_idx) != k {
                ends[node.end].push(u32::try_from(k)?);
            }
        }

        let mut gold_nodes = vec![0];
        gold_nodes.extend(new_idx[..self.num_gold].iter().copied());
        gold_nodes.push(eos_idx);
        let mut gold_edges = vec![];
        for w in gold_nodes.windows(2) {
            let next = usize::from_u32(w[1]);
            let e = (edge_offsets[next]..edge_offsets[next + 1])
                .find(|&e| edge_prev[e] == w[0])
                .unwrap_or(edge_offsets[next]);
            gold_edges.push(e);
        }

        Ok(Lattice {
            labels,
            edge_offsets,
            edge_prev,
            pair_offsets,
            pairs,
            gold_nodes,
            gold_edges,
        })
    }
}

/// Training lattice whose nodes are topologically sorted.
pub(crate) struct Lattice {
    labels: Vec<u32>,
    // Incoming edges of node k are edge_offsets[k]..edge_offsets[k + 1].
    edge_offsets: Vec<usize>,
    edge_prev: Vec<u32>,
    // Bigram pair ids of edge e are pairs[pair_offsets[e]..pair_offsets[e + 1]].
    pair_offsets: Vec<usize>,
    pairs: Vec<u32>,
    gold_nodes: Vec<u32>,
    gold_edges: Vec<usize>,
}

impl Lattice {
    #[inline(always)]
    fn incoming(&self, k: usize) -> std::ops::Range<usize> {
        self.edge_offsets[k]..self.edge_offsets[k + 1]
    }

    #[inline(always)]
    fn edge_pairs(&self, e: usize) -> &[u32] {
        &self.pairs[self.pair_offsets[e]..self.pair_offsets[e + 1]]
    }

    /// Computes the negative log-likelihood of the gold path and adds its
    /// gradient to `grad`.
    ///
    /// The weights of unigram feature `f` and bigram pair `p` are
    /// `weights[f - 1]` and `weights[bigram_offset + p]`.
    pub fn accumulate_gradient(
        &self,
        feature_sets: &[FeatureSet],
        weights: &[f64],
        bigram_offset: usize,
        grad: &mut HashMap<usize, f64>,
    ) -> f64 {
        let num_nodes = self.labels.len();
        let node_scores: Vec<f64> = self
            .labels
            .iter()
            .map(|&label| {
                feature_sets[usize::from_u32(label)]
                    .unigram
                    .iter()
                    .map(|f| weights[usize::from_u32(f.get()) - 1])
                    .sum()
            })
            .collect();
        let edge_scores: Vec<f64> = (0..self.edge_prev.len())
            .map(|e| {
                self.edge_pairs(e)
                    .iter()
                    .map(|&p| weights[bigram_offset + usize::from_u32(p)])
                    .sum()
            })
            .collect();

        let mut alpha = vec![f64::NEG_INFINITY; num_nodes];
        alpha[0] = 0.0;
        for k in 1..num_nodes {
            let mut acc = f64::NEG_INFINITY;
            for e in self.incoming(k) {
                let prev = usize::from_u32(self.edge_prev[e]);
                acc = log_add(acc, alpha[prev] + edge_scores[e]);
            }
            alpha[k] = acc + node_scores[k];
        }
        let log_z = alpha[num_nodes - 1];

        let mut beta = vec![f64::NEG_INFINITY; num_nodes];
        beta[num_nodes - 1] = 0.0;
        for k in (1..num_nodes).rev() {
            let b = beta[k] + node_scores[k];
            if b == f64::NEG_INFINITY {
                continue;
            }
            for e in self.incoming(k) {
                let prev = usize::from_u32(self.edge_prev[e]);
                beta[prev] = log_add(beta[prev], b + edge_scores[e]);
            }
        }

        // Expected counts.
        for k in 1..num_nodes {
            let b = beta[k] + node_scores[k];
            let node_marginal = (alpha[k] + beta[k] - log_z).exp();
            if node_marginal > 0.0 {
                for f in &feature_sets[usize::from_u32(self.labels[k])].unigram {
                    *grad.entry(usize::from_u32(f.get()) - 1).or_insert(0.0) += node_marginal;
                }
            }
            for e in self.incoming(k) {
                let prev = usize::from_u32(self.edge_prev[e]);
                let edge_marginal = (alpha[prev] + edge_scores[e] + b - log_z).exp();
                if edge_marginal > 0.0 {
                    for &p in self.edge_pairs(e) {
                        *grad.entry(bigram_offset + usize::from_u32(p)).or_insert(0.0) +=
                            edge_marginal;
                    }
                }
            }
        }

        // Gold counts.
        let mut gold_score = 0.0;
        for &k in &self.gold_nodes {
            let k = usize::from_u32(k);
            gold_score += node_scores[k];
            for f in &feature_sets[usize::from_u32(self.labels[k])].unigram {
                *grad.entry(usize::from_u32(f.get()) - 1).or_insert(0.0) -= 1.0;
            }
        }
        for &e in &self.gold_edges {
            gold_score += edge_scores[e];
            for &p in self.edge_pairs(e) {
                *grad.entry(bigram_offset + usize::from_u32(p)).or_insert(0.0) -= 1.0;
            }
        }

        log_z - gold_score
    }

    /// Returns the number of nodes including BOS and EOS.
    #[cfg(test)]
    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }
}
