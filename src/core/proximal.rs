//! Proximal dendrites: the potential pools connecting columns to the input space.
//!
//! A proximal synapse links one input bit to one column. If its permanence is at least the
//! connected threshold the synapse is "connected" and counts toward the column's overlap score.
//! During learning, permanences of winning columns are increased or decreased depending on
//! whether the corresponding input bit was active.
//!
//! The `ProximalPool` stores the potential synapses of all columns in a single contiguous vec.
//! Each column's synapses occupy a contiguous subrange; within it the connected synapses are kept
//! at the front, so overlap computation only walks the connected prefix.
//! The size of every potential pool is fixed when the column is initialized. Only permanences
//! change afterwards.

use super::{parameters::Parameters, random::Random};
use crate::error::{HtmError, Result};
use collect_slice::CollectSlice;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A synapse connecting an input bit with an associated permanence value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximalSynapse {
    /// The input bit this synapse connects to.
    pub input: usize,

    /// The strength of the connection between the column and the input bit.
    pub permanence: f64,
}

/// Options governing how proximal permanences are adjusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermanenceOptions {
    pub inactive_decrement: f64,
    pub active_increment: f64,
    pub connected: f64,
    pub below_stimulus_increment: f64,
    pub min: f64,
    pub max: f64,
    pub trim_threshold: f64,
}

impl From<&Parameters> for PermanenceOptions {
    fn from(params: &Parameters) -> Self {
        Self {
            inactive_decrement: params.syn_perm_inactive_dec,
            active_increment: params.syn_perm_active_inc,
            connected: params.syn_perm_connected,
            below_stimulus_increment: params.syn_perm_below_stimulus_inc,
            min: params.syn_perm_min,
            max: params.syn_perm_max,
            trim_threshold: params.syn_perm_trim_threshold,
        }
    }
}

/// A flat pool of potential synapses for all columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProximalPool {
    /// All potential synapses, column after column.
    synapses: Vec<ProximalSynapse>,

    /// Start of every column's subrange, plus the end of the last one.
    offsets: Vec<usize>,

    /// The number of connected synapses for each column after pivot sorting.
    connected_counts: Vec<usize>,
}

impl ProximalPool {
    /// Creates an empty pool. Columns are added in index order with `init_column`.
    pub fn new(num_columns: usize) -> Self {
        let mut offsets = Vec::with_capacity(num_columns + 1);
        offsets.push(0);
        Self {
            synapses: Vec::new(),
            offsets,
            connected_counts: Vec::with_capacity(num_columns),
        }
    }

    /// Number of columns initialized so far.
    pub fn num_columns(&self) -> usize {
        self.connected_counts.len()
    }

    /// Appends the potential pool of the next column from the given input indices.
    /// Each permanence is drawn at random: with probability `init_connected_pct` uniformly from
    /// `[connected, max]`, otherwise uniformly from `[0, connected)`, rounded to five decimals.
    pub fn init_column(
        &mut self,
        column: usize,
        potential: &[usize],
        init_connected_pct: f64,
        options: &PermanenceOptions,
        rng: &mut Random,
    ) {
        assert_eq!(
            column,
            self.num_columns(),
            "columns must be initialized in index order"
        );

        let start = self.synapses.len();
        self.synapses
            .resize(start + potential.len(), ProximalSynapse::default());

        let written = potential
            .iter()
            .map(|&input| {
                let random = if rng.random::<f64>() <= init_connected_pct {
                    options.connected + (options.max - options.connected) * rng.random::<f64>()
                } else {
                    options.connected * rng.random::<f64>()
                };

                ProximalSynapse {
                    input,
                    permanence: (random * 100_000.0).round() / 100_000.0,
                }
            })
            .collect_slice(&mut self.synapses[start..]);
        debug_assert_eq!(written, potential.len());

        self.offsets.push(self.synapses.len());
        self.connected_counts.push(0);
        self.sort_column(column, options.connected);
    }

    /// Reorders the synapses in a column so that those with permanence ≥ `connected_threshold` come first.
    pub fn sort_column(&mut self, column: usize, connected_threshold: f64) {
        let range = self.col_range(column);
        let slice = &mut self.synapses[range];

        let mut pivot = 0;

        for i in 0..slice.len() {
            if slice[i].permanence >= connected_threshold {
                slice.swap(i, pivot);
                pivot += 1;
            }
        }

        self.connected_counts[column] = pivot;
    }

    /// Updates permanence values in a column:
    /// - if `raise_permanences` is true, first raise values until `stimulus_threshold` synapses are connected,
    /// - then clamp values to [options.min, options.max] and snap values at or below the trim threshold to 0,
    /// - finally re-sort the column so that connected synapses come first.
    pub fn update_column_permanences(
        &mut self,
        column: usize,
        raise_permanences: bool,
        stimulus_threshold: f64,
        options: &PermanenceOptions,
    ) -> Result<()> {
        if raise_permanences {
            self.raise_column_permanences(column, stimulus_threshold, options)?;
        }

        for syn in self.column_mut(column) {
            syn.permanence = syn.permanence.clamp(options.min, options.max);
            if syn.permanence <= options.trim_threshold {
                syn.permanence = 0.0;
            }
        }

        self.sort_column(column, options.connected);
        Ok(())
    }

    /// Raises every permanence in a column by `below_stimulus_increment` until at least
    /// `stimulus_threshold` synapses are connected. Fails when the pool is too small to ever get there.
    pub fn raise_column_permanences(
        &mut self,
        column: usize,
        stimulus_threshold: f64,
        options: &PermanenceOptions,
    ) -> Result<()> {
        let slice = self.column_mut(column);

        if (slice.len() as f64) < stimulus_threshold {
            return Err(HtmError::IllegalState(format!(
                "potential pool of column {column} has {} synapses, fewer than the stimulus threshold {stimulus_threshold}",
                slice.len()
            )));
        }

        for syn in slice.iter_mut() {
            syn.permanence = syn.permanence.clamp(options.min, options.max);
        }

        while (slice
            .iter()
            .filter(|syn| syn.permanence >= options.connected)
            .count() as f64)
            < stimulus_threshold
        {
            for syn in slice.iter_mut() {
                syn.permanence += options.below_stimulus_increment;
            }
        }

        Ok(())
    }

    /// Adds `delta` to the permanence of every potential synapse of a column.
    pub fn bump_column(&mut self, column: usize, delta: f64) {
        for syn in self.column_mut(column) {
            syn.permanence += delta;
        }
    }

    /// Hebbian step for a winning column: increments synapses on active input bits, decrements the rest.
    /// Bounds are restored by the following `update_column_permanences`.
    pub fn reinforce_column(&mut self, column: usize, input: &[bool], options: &PermanenceOptions) {
        for syn in self.column_mut(column) {
            if input[syn.input] {
                syn.permanence += options.active_increment;
            } else {
                syn.permanence -= options.inactive_decrement;
            }
        }
    }

    /// Number of connected synapses of a column whose input bit is on.
    #[inline]
    pub fn overlap(&self, column: usize, input: &[bool]) -> usize {
        self.column_connected(column)
            .iter()
            .filter(|syn| input[syn.input])
            .count()
    }

    /// Returns the index range corresponding to the synapses stored for the given column.
    fn col_range(&self, column: usize) -> Range<usize> {
        self.offsets[column]..self.offsets[column + 1]
    }

    /// Returns an immutable slice for all synapses in the given column.
    pub fn column(&self, column: usize) -> &[ProximalSynapse] {
        &self.synapses[self.col_range(column)]
    }

    /// Returns a mutable slice for all synapses in the given column.
    pub fn column_mut(&mut self, column: usize) -> &mut [ProximalSynapse] {
        let range = self.col_range(column);
        &mut self.synapses[range]
    }

    /// Returns an immutable slice for the connected synapses in the given column.
    pub fn column_connected(&self, column: usize) -> &[ProximalSynapse] {
        let start = self.offsets[column];
        &self.synapses[start..start + self.connected_counts[column]]
    }

    /// The number of connected synapses of a column.
    pub fn connected_count(&self, column: usize) -> usize {
        self.connected_counts[column]
    }

    /// The input indices of a column's potential pool, ascending.
    pub fn potential(&self, column: usize) -> Vec<usize> {
        let mut inputs: Vec<usize> = self.column(column).iter().map(|syn| syn.input).collect();
        inputs.sort_unstable();
        inputs
    }

    /// `(input, permanence)` for every potential synapse of a column, ascending by input.
    pub fn permanences(&self, column: usize) -> Vec<(usize, f64)> {
        let mut perms: Vec<(usize, f64)> = self
            .column(column)
            .iter()
            .map(|syn| (syn.input, syn.permanence))
            .collect();
        perms.sort_unstable_by_key(|&(input, _)| input);
        perms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> PermanenceOptions {
        PermanenceOptions::from(&Parameters::default())
    }

    fn pool_with(perms: &[f64]) -> ProximalPool {
        let mut pool = ProximalPool::new(1);
        let inputs: Vec<usize> = (0..perms.len()).collect();
        pool.init_column(0, &inputs, 0.5, &options(), &mut Random::new(1));
        for syn in pool.column_mut(0) {
            syn.permanence = perms[syn.input];
        }
        pool.sort_column(0, options().connected);
        pool
    }

    #[test]
    fn init_respects_connected_split() {
        let opts = options();
        let mut pool = ProximalPool::new(2);
        let mut rng = Random::new(3);
        pool.init_column(0, &[0, 1, 2, 3, 4, 5, 6, 7], 1.0, &opts, &mut rng);
        pool.init_column(1, &[2, 4, 6], 0.0, &opts, &mut rng);

        assert_eq!(pool.connected_count(0), 8);
        assert!(pool
            .column(0)
            .iter()
            .all(|s| s.permanence >= opts.connected && s.permanence <= opts.max));
        assert_eq!(pool.connected_count(1), 0);
        assert!(pool.column(1).iter().all(|s| s.permanence < opts.connected));
        assert_eq!(pool.potential(1), vec![2, 4, 6]);
    }

    #[test]
    fn connected_synapses_are_sorted_first() {
        let pool = pool_with(&[0.05, 0.2, 0.0, 0.5]);
        assert_eq!(pool.connected_count(0), 2);
        let mut connected: Vec<usize> =
            pool.column_connected(0).iter().map(|s| s.input).collect();
        connected.sort_unstable();
        assert_eq!(connected, vec![1, 3]);
    }

    #[test]
    fn raise_reaches_stimulus_threshold() {
        let mut pool = pool_with(&[0.0, 0.02, 0.05, 0.08]);
        pool.update_column_permanences(0, true, 3.0, &options())
            .unwrap();
        assert!(pool.connected_count(0) >= 3);
    }

    #[test]
    fn raise_fails_for_small_pool() {
        let mut pool = pool_with(&[0.0, 0.02]);
        let err = pool.update_column_permanences(0, true, 3.0, &options());
        assert!(matches!(err, Err(HtmError::IllegalState(_))));
    }

    #[test]
    fn update_clips_and_trims() {
        let mut pool = pool_with(&[1.3, -0.2, 0.02, 0.025, 0.3]);
        pool.update_column_permanences(0, false, 0.0, &options())
            .unwrap();
        let perms: Vec<f64> = pool.permanences(0).into_iter().map(|(_, p)| p).collect();
        assert_eq!(perms, vec![1.0, 0.0, 0.0, 0.0, 0.3]);
    }

    #[test]
    fn overlap_counts_connected_active_inputs() {
        let pool = pool_with(&[0.5, 0.05, 0.5, 0.5]);
        let input = [true, true, false, true];
        assert_eq!(pool.overlap(0, &input), 2);
    }

    #[test]
    fn reinforce_moves_towards_input() {
        let mut pool = pool_with(&[0.3, 0.3]);
        pool.reinforce_column(0, &[true, false], &options());
        let perms = pool.permanences(0);
        assert!((perms[0].1 - 0.35).abs() < 1e-9);
        assert!((perms[1].1 - 0.292).abs() < 1e-9);
    }
}
