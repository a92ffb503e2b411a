// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Array shapes

use std::fmt;

use crate::element::ELEMENT_SIZE;
use crate::{RegistryError, Result};

/// Ordered array extents (rank = length)
///
/// Trailing singleton extents carry no information: `[4, 4]` and
/// `[4, 4, 1, 1]` describe the same array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Dims(Vec<usize>);

impl Dims {
    pub fn new(extents: impl Into<Vec<usize>>) -> Self {
        Self(extents.into())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Product of the extents (1 for rank 0)
    pub fn element_count(&self) -> Result<usize> {
        self.0
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| RegistryError::SizeOverflow(self.clone()))
    }

    /// `element_count * ELEMENT_SIZE`
    pub fn byte_size(&self) -> Result<usize> {
        self.element_count()?
            .checked_mul(ELEMENT_SIZE)
            .ok_or_else(|| RegistryError::SizeOverflow(self.clone()))
    }

    /// Shape equality ignoring trailing singleton extents
    pub fn same_shape(&self, other: &Dims) -> bool {
        self.significant() == other.significant()
    }

    fn significant(&self) -> &[usize] {
        let end = self
            .0
            .iter()
            .rposition(|&d| d != 1)
            .map_or(0, |i| i + 1);
        &self.0[..end]
    }
}

impl From<Vec<usize>> for Dims {
    fn from(extents: Vec<usize>) -> Self {
        Self(extents)
    }
}

impl From<&[usize]> for Dims {
    fn from(extents: &[usize]) -> Self {
        Self(extents.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Dims {
    fn from(extents: [usize; N]) -> Self {
        Self(extents.to_vec())
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count_and_bytes() {
        let dims = Dims::from([128, 128, 1, 8]);
        assert_eq!(dims.element_count().unwrap(), 131_072);
        assert_eq!(dims.byte_size().unwrap(), 1_048_576);
    }

    #[test]
    fn test_rank_zero_is_scalar() {
        assert_eq!(Dims::default().element_count().unwrap(), 1);
    }

    #[test]
    fn test_overflow_detected() {
        let dims = Dims::from([usize::MAX, 2]);
        assert!(matches!(
            dims.element_count(),
            Err(RegistryError::SizeOverflow(_))
        ));
        let dims = Dims::from([usize::MAX / 4]);
        assert!(dims.byte_size().is_err());
    }

    #[test]
    fn test_trailing_singletons_ignored() {
        assert!(Dims::from([4, 4]).same_shape(&Dims::from([4, 4, 1, 1])));
        assert!(Dims::from([1, 1]).same_shape(&Dims::default()));
        assert!(!Dims::from([4, 1, 4]).same_shape(&Dims::from([4, 4])));
    }

    #[test]
    fn test_display() {
        assert_eq!(Dims::from([2, 3]).to_string(), "[2, 3]");
    }
}
