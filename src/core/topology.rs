//! Topology represents an N-dimensional space through a list of dimensions and corresponding stride values.
//! The struct provides methods to convert between linear indices and coordinates in this N-dimensional space,
//! and offers iterators over the neighborhood of a given center index, either clipped at the borders
//! or wrapping around them.
//!
//! In the HTM context, both the input space and the column space are N-dimensional.
//! The Spatial Pooler uses neighborhoods to draw potential pools from the input space and to run
//! local inhibition and duty cycle comparisons in the column space.

use serde::{Deserialize, Serialize};

/// The shape of an N-dimensional space, along with precomputed stride values for
/// linear index conversions. The first dimension is the most significant one (row-major).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    dims: Vec<usize>,
    strides: Vec<usize>,
}

impl Topology {
    /// Creates a new `Topology` from a slice of dimension sizes.
    #[inline]
    pub fn new(dimensions: &[usize]) -> Self {
        let dims = dimensions.to_vec();
        let strides = Self::strides(&dims);

        Self { dims, strides }
    }

    /// Computes the stride of each dimension: the product of all less significant dimension sizes.
    #[inline]
    fn strides(dims: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; dims.len()];

        for i in (0..dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * dims[i + 1];
        }

        strides
    }

    /// The size of every dimension.
    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements in the space.
    #[inline]
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Converts a linear index into its coordinates, one per dimension, in order.
    #[inline]
    pub fn coordinates(&self, index: usize) -> Vec<usize> {
        let mut remainder = index;

        self.strides
            .iter()
            .map(|&stride| {
                let coord = remainder / stride;
                remainder %= stride;
                coord
            })
            .collect()
    }

    /// Converts coordinates into a linear index.
    /// The length of `coords` must match the number of dimensions in the topology.
    #[inline]
    pub fn index_from_coordinates(&self, coords: &[usize]) -> usize {
        coords.iter().zip(&self.strides).map(|(&c, &s)| c * s).sum()
    }

    /// Iterates the indices within `radius` of `center`, clipped at the borders of every dimension.
    /// Indices come out in ascending order and include the center.
    #[inline]
    pub fn neighborhood(&self, center: usize, radius: usize) -> NeighborhoodIter<'_> {
        let axes = self
            .coordinates(center)
            .into_iter()
            .zip(&self.dims)
            .map(|(c, &dim)| {
                let low = c.saturating_sub(radius);
                let high = c.saturating_add(radius).min(dim - 1);
                (low..=high).collect()
            })
            .collect();

        NeighborhoodIter::new(self, axes)
    }

    /// Iterates the indices within `radius` of `center`, wrapping around the borders of every
    /// dimension as on a torus. Along each dimension the coordinates run from `c - radius` to
    /// `c + radius` modulo the dimension size, so the output is not sorted: in a 1-D space of
    /// 100 elements, center 0 and radius 1 yield 99, 0, 1.
    ///
    /// A radius that reaches around a whole dimension collapses to that entire dimension,
    /// without duplicates, in ascending order `0..dim` rather than starting at
    /// `(c - radius) mod dim`. Potential pools are sampled by position in this list, so the
    /// ordering is part of what a seed reproduces.
    #[inline]
    pub fn wrapping_neighborhood(&self, center: usize, radius: usize) -> NeighborhoodIter<'_> {
        let axes = self
            .coordinates(center)
            .into_iter()
            .zip(&self.dims)
            .map(|(c, &dim)| {
                if radius >= dim {
                    return (0..dim).collect();
                }

                let (c, r, d) = (c as isize, radius as isize, dim as isize);
                let mut seen = vec![false; dim];
                (c - r..=c + r)
                    .map(|v| v.rem_euclid(d) as usize)
                    .filter(|&v| !std::mem::replace(&mut seen[v], true))
                    .collect()
            })
            .collect();

        NeighborhoodIter::new(self, axes)
    }
}

/// An iterator over the Cartesian product of per-dimension coordinate lists, yielding linear indices.
/// The last dimension varies fastest.
pub struct NeighborhoodIter<'a> {
    topology: &'a Topology,
    axes: Vec<Vec<usize>>,
    current: Option<Vec<usize>>,
    remaining: usize,
}

impl<'a> NeighborhoodIter<'a> {
    fn new(topology: &'a Topology, axes: Vec<Vec<usize>>) -> Self {
        let remaining = axes.iter().map(Vec::len).product();
        let current = (remaining > 0).then(|| vec![0; axes.len()]);

        Self {
            topology,
            axes,
            current,
            remaining,
        }
    }
}

impl Iterator for NeighborhoodIter<'_> {
    type Item = usize;

    /// Returns the next index within the neighborhood. When all indices have been visited, it returns `None`.
    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.as_mut()?;

        let coords: Vec<usize> = current
            .iter()
            .zip(&self.axes)
            .map(|(&pos, axis)| axis[pos])
            .collect();
        let result = self.topology.index_from_coordinates(&coords);
        self.remaining -= 1;

        for i in (0..current.len()).rev() {
            if current[i] + 1 < self.axes[i].len() {
                current[i] += 1;
                current.iter_mut().skip(i + 1).for_each(|pos| *pos = 0);
                return Some(result);
            }
        }

        self.current.take();

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for NeighborhoodIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_round_trip() {
        let topology = Topology::new(&[3, 4, 5]);
        assert_eq!(topology.num_elements(), 60);
        assert_eq!(topology.coordinates(0), vec![0, 0, 0]);
        assert_eq!(topology.coordinates(59), vec![2, 3, 4]);
        assert_eq!(topology.coordinates(23), vec![1, 0, 3]);
        assert_eq!(topology.index_from_coordinates(&[1, 0, 3]), 23);

        for i in 0..60 {
            assert_eq!(topology.index_from_coordinates(&topology.coordinates(i)), i);
        }
    }

    #[test]
    fn zero_radius_is_the_center() {
        let topology = Topology::new(&[10, 10]);
        assert_eq!(topology.neighborhood(42, 0).collect::<Vec<_>>(), vec![42]);
        assert_eq!(
            topology.wrapping_neighborhood(42, 0).collect::<Vec<_>>(),
            vec![42]
        );
    }

    #[test]
    fn neighborhood_1d_clips_at_borders() {
        let topology = Topology::new(&[10]);
        assert_eq!(
            topology.neighborhood(5, 2).collect::<Vec<_>>(),
            vec![3, 4, 5, 6, 7]
        );
        assert_eq!(topology.neighborhood(0, 2).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(topology.neighborhood(9, 3).collect::<Vec<_>>(), vec![6, 7, 8, 9]);
    }

    #[test]
    fn neighborhood_2d_is_ascending() {
        let topology = Topology::new(&[5, 5]);
        let hood: Vec<usize> = topology.neighborhood(0, 1).collect();
        assert_eq!(hood, vec![0, 1, 5, 6]);

        let hood: Vec<usize> = topology.neighborhood(12, 1).collect();
        assert_eq!(hood, vec![6, 7, 8, 11, 12, 13, 16, 17, 18]);
        assert!(hood.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn wrapping_neighborhood_1d() {
        let topology = Topology::new(&[100]);
        assert_eq!(
            topology.wrapping_neighborhood(0, 1).collect::<Vec<_>>(),
            vec![99, 0, 1]
        );
        assert_eq!(
            topology.wrapping_neighborhood(99, 2).collect::<Vec<_>>(),
            vec![97, 98, 99, 0, 1]
        );
    }

    #[test]
    fn wrapping_neighborhood_2d() {
        let topology = Topology::new(&[4, 4]);
        let hood: Vec<usize> = topology.wrapping_neighborhood(0, 1).collect();
        assert_eq!(hood, vec![15, 12, 13, 3, 0, 1, 7, 4, 5]);
    }

    #[test]
    fn large_radius_covers_dimension_once() {
        let topology = Topology::new(&[5]);
        assert_eq!(
            topology.wrapping_neighborhood(2, 7).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(
            topology.neighborhood(2, 7).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );

        // 2 * radius + 1 exceeds the dimension without reaching the whole way around.
        assert_eq!(
            topology.wrapping_neighborhood(0, 3).collect::<Vec<_>>(),
            vec![2, 3, 4, 0, 1]
        );
    }

    #[test]
    fn size_hint_tracks_consumption() {
        let topology = Topology::new(&[6, 6]);
        let mut hood = topology.neighborhood(14, 1);
        assert_eq!(hood.len(), 9);
        hood.next();
        hood.next();
        assert_eq!(hood.len(), 7);
        assert_eq!(hood.count(), 7);
    }
}
