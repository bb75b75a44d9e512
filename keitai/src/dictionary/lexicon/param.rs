use bincode::{Decode, Encode};

use crate::dictionary::ConnectionMatrix;

/// Parameters of a word: context ids and the emission cost.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Decode, Encode)]
pub struct WordParam {
    /// Left context id.
    pub left_id: u16,
    /// Right context id.
    pub right_id: u16,
    /// Emission cost.
    pub word_cost: i16,
}

impl WordParam {
    /// Creates a new instance.
    #[inline(always)]
    pub const fn new(left_id: u16, right_id: u16, word_cost: i16) -> Self {
        Self {
            left_id,
            right_id,
            word_cost,
        }
    }

    /// Checks if the context ids are defined in the matrix.
    #[inline(always)]
    pub fn is_valid_for(&self, conn: &ConnectionMatrix) -> bool {
        usize::from(self.left_id) < conn.num_left() && usize::from(self.right_id) < conn.num_right()
    }
}

#[derive(Decode, Encode)]
pub struct WordParams {
    params: Vec<WordParam>,
}

impl WordParams {
    pub fn new<I>(params: I) -> Self
    where
        I: IntoIterator<Item = WordParam>,
    {
        Self {
            params: params.into_iter().collect(),
        }
    }

    #[inline(always)]
    pub fn get(&self, word_id: usize) -> WordParam {
        self.params[word_id]
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.params.len()
    }
}
