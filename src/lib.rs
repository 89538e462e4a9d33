//! Hierarchical Temporal Memory (HTM) in Rust.
//!
//! The crate provides the two algorithms at the heart of HTM:
//! - the Spatial Pooler, which turns a binary input vector into a sparse set of active columns,
//! - the Temporal Memory, which learns sequences over those columns with per-cell dendritic segments.
//!
//! Both operate on a shared [`core::connections::Connections`] store that owns every column, cell,
//! segment and synapse, the per-column statistics and the seeded random number generator.
//!
//! ```
//! use htm_core::core::{Connections, Parameters, SpatialPooler, TemporalMemory};
//!
//! let params = Parameters {
//!     input_dimensions: vec![32],
//!     column_dimensions: vec![64],
//!     cells_per_column: 4,
//!     global_inhibition: true,
//!     num_active_columns_per_inh_area: 4,
//!     ..Default::default()
//! };
//! let mut c = Connections::new(params).unwrap();
//! SpatialPooler::init(&mut c).unwrap();
//! TemporalMemory::init(&mut c).unwrap();
//!
//! let mut input = vec![false; 32];
//! input[..8].iter_mut().for_each(|bit| *bit = true);
//! let mut active = vec![false; 64];
//! let columns = SpatialPooler::compute(&mut c, &input, &mut active, true).unwrap();
//! let cycle = TemporalMemory::compute(&mut c, &columns, true).unwrap();
//! assert!(!cycle.active_cells.is_empty());
//! ```

pub mod core;
pub mod error;

pub use error::{HtmError, Result};
