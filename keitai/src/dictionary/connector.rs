mod builder;

use bincode::{Decode, Encode};

use crate::common::DISALLOWED_CONNECTION_COST;

/// Matrix of connection costs.
///
/// The cost `cost(right_id, left_id)` is charged when a morpheme whose right
/// context is `right_id` is followed by a morpheme whose left context is `left_id`.
#[derive(Clone, Debug, Decode, Encode)]
pub struct ConnectionMatrix {
    data: Vec<i16>,
    num_right: usize,
    num_left: usize,
}

impl ConnectionMatrix {
    /// Creates a matrix whose pairs are all disallowed.
    pub fn new(num_right: usize, num_left: usize) -> Self {
        Self {
            data: vec![DISALLOWED_CONNECTION_COST; num_right * num_left],
            num_right,
            num_left,
        }
    }

    #[inline(always)]
    fn index(&self, right_id: u16, left_id: u16) -> usize {
        debug_assert!(usize::from(right_id) < self.num_right);
        debug_assert!(usize::from(left_id) < self.num_left);
        let index = usize::from(left_id) * self.num_right + usize::from(right_id);
        debug_assert!(index < self.data.len());
        index
    }

    /// Returns the number of right connection ids.
    #[inline(always)]
    pub const fn num_right(&self) -> usize {
        self.num_right
    }

    /// Returns the number of left connection ids.
    #[inline(always)]
    pub const fn num_left(&self) -> usize {
        self.num_left
    }

    /// Checks if the pair of ids is within the matrix.
    #[inline(always)]
    pub fn contains(&self, right_id: u16, left_id: u16) -> bool {
        usize::from(right_id) < self.num_right && usize::from(left_id) < self.num_left
    }

    /// Gets the value of the connection matrix.
    #[inline(always)]
    pub fn cost(&self, right_id: u16, left_id: u16) -> i32 {
        let index = self.index(right_id, left_id);
        i32::from(self.data[index])
    }

    pub(crate) fn set_cost(&mut self, right_id: u16, left_id: u16, cost: i16) {
        let index = self.index(right_id, left_id);
        self.data[index] = cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_disallowed() {
        let conn = ConnectionMatrix::new(2, 3);
        assert_eq!(conn.num_right(), 2);
        assert_eq!(conn.num_left(), 3);
        assert_eq!(conn.cost(1, 2), i32::from(DISALLOWED_CONNECTION_COST));
        assert!(conn.contains(1, 2));
        assert!(!conn.contains(2, 2));
        assert!(!conn.contains(1, 3));
    }

    #[test]
    fn test_set_cost() {
        let mut conn = ConnectionMatrix::new(2, 2);
        conn.set_cost(1, 0, -5);
        assert_eq!(conn.cost(1, 0), -5);
        assert_eq!(conn.cost(0, 1), i32::from(DISALLOWED_CONNECTION_COST));
    }
}
