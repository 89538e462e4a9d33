//! Property tests for N-dimensional index arithmetic and neighborhoods.
//!
//! Run with: `cargo test --test topology`

use htm_core::core::Topology;
use proptest::prelude::*;

fn topology_and_index() -> impl Strategy<Value = (Vec<usize>, usize)> {
    prop::collection::vec(1usize..8, 1..4).prop_flat_map(|dims| {
        let n: usize = dims.iter().product();
        (Just(dims), 0..n)
    })
}

// ============================================================================
// Index conversions
// ============================================================================

mod conversions {
    use super::*;

    proptest! {
        #[test]
        fn coordinates_round_trip((dims, index) in topology_and_index()) {
            let t = Topology::new(&dims);
            let coords = t.coordinates(index);
            prop_assert_eq!(coords.len(), dims.len());
            for (coord, dim) in coords.iter().zip(&dims) {
                prop_assert!(coord < dim);
            }
            prop_assert_eq!(t.index_from_coordinates(&coords), index);
        }

        #[test]
        fn last_dimension_varies_fastest((dims, index) in topology_and_index()) {
            let t = Topology::new(&dims);
            let last = dims.len() - 1;
            let mut coords = t.coordinates(index);
            if coords[last] + 1 < dims[last] {
                coords[last] += 1;
                prop_assert_eq!(t.index_from_coordinates(&coords), index + 1);
            }
        }
    }
}

// ============================================================================
// Neighborhoods
// ============================================================================

mod neighborhoods {
    use super::*;

    proptest! {
        #[test]
        fn zero_radius_is_the_center((dims, index) in topology_and_index()) {
            let t = Topology::new(&dims);
            prop_assert_eq!(t.neighborhood(index, 0).collect::<Vec<_>>(), vec![index]);
            prop_assert_eq!(t.wrapping_neighborhood(index, 0).collect::<Vec<_>>(), vec![index]);
        }

        #[test]
        fn clipped_neighborhood_is_sorted_and_bounded(
            (dims, index) in topology_and_index(),
            radius in 0usize..5,
        ) {
            let t = Topology::new(&dims);
            let hood: Vec<usize> = t.neighborhood(index, radius).collect();

            prop_assert!(hood.contains(&index));
            prop_assert!(hood.windows(2).all(|w| w[0] < w[1]));

            let center = t.coordinates(index);
            for &n in &hood {
                prop_assert!(n < t.num_elements());
                for (a, b) in t.coordinates(n).iter().zip(&center) {
                    prop_assert!(a.abs_diff(*b) <= radius);
                }
            }
        }

        #[test]
        fn wrapping_neighborhood_has_no_duplicates(
            (dims, index) in topology_and_index(),
            radius in 0usize..10,
        ) {
            let t = Topology::new(&dims);
            let mut hood: Vec<usize> = t.wrapping_neighborhood(index, radius).collect();
            let expected: usize = dims.iter().map(|&d| (2 * radius + 1).min(d)).product();

            prop_assert_eq!(hood.len(), expected);
            prop_assert!(hood.contains(&index));
            hood.sort_unstable();
            hood.dedup();
            prop_assert_eq!(hood.len(), expected);
        }

        #[test]
        fn wrapping_covers_at_least_the_clipped_neighborhood(
            (dims, index) in topology_and_index(),
            radius in 0usize..5,
        ) {
            let t = Topology::new(&dims);
            let wrapped: Vec<usize> = t.wrapping_neighborhood(index, radius).collect();
            for n in t.neighborhood(index, radius) {
                prop_assert!(wrapped.contains(&n));
            }
        }
    }
}
