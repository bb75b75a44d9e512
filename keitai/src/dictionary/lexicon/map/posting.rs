use bincode::{Decode, Encode};

use crate::errors::Result;
use crate::utils::FromU32;

/// Concatenated lists of word ids, each prefixed by its length.
#[derive(Decode, Encode)]
pub struct Postings {
    data: Vec<u32>,
}

impl Postings {
    #[inline(always)]
    pub fn ids(&self, i: usize) -> impl Iterator<Item = u32> + '_ {
        let len = usize::from_u32(self.data[i]);
        self.data[i + 1..i + 1 + len].iter().cloned()
    }
}

#[derive(Default)]
pub struct PostingsBuilder {
    data: Vec<u32>,
}

impl PostingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn push(&mut self, ids: &[u32]) -> Result<usize> {
        let offset = self.data.len();
        self.data.push(ids.len().try_into()?);
        self.data.extend_from_slice(ids);
        Ok(offset)
    }

    pub fn build(self) -> Postings {
        Postings { data: self.data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postings() {
        let mut builder = PostingsBuilder::new();
        let a = builder.push(&[3, 1]).unwrap();
        let b = builder.push(&[]).unwrap();
        let c = builder.push(&[7]).unwrap();
        let postings = builder.build();
        assert_eq!(postings.ids(a).collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(postings.ids(b).count(), 0);
        assert_eq!(postings.ids(c).collect::<Vec<_>>(), vec![7]);
    }
}
