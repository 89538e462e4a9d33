//! The `SpatialPooler` is a core component of HTM that:
//! - Initializes a potential pool for every column: a random subset of the input bits around the column's center.
//! - Computes an "overlap" score for each column based on how many connected synapses match the current input.
//! - Enforces sparse activity via inhibition, allowing only a subset of top columns to become "winner columns."
//! - Learns to increase/decrease synapse permanence (strength) values if the connected input bit was active/inactive.
//!
//! Each column selectively "tunes" its connections to represent frequently encountered input patterns, leading to SDRs.
//!
//! What are duty cycles?
//! - They are rolling metrics that measure how often each column is meeting certain criteria over time.
//! - The SP tracks: overlap duty cycles (ODC) and active duty cycles (ADC).
//! - ODC tracks how frequently a column has a non-zero overlap score with the input.
//! - ADC tracks how frequently a column is chosen as a winner after inhibition.
//! - By comparing these metrics to thresholds, the SP can decide whether to boost columns.
//! - This prevents columns from becoming inactive or uncompetitive over time.
//!
//! The pooler itself holds no state. Everything it reads and writes lives in [`Connections`],
//! so one region's state can be inspected, persisted or handed to the Temporal Memory as a whole.

use super::{connections::Connections, proximal::ProximalPool, random::Random};
use crate::error::{HtmError, Result};
use log::{debug, trace};
use rand::Rng;

/// The Spatial Pooler algorithm, operating on a [`Connections`] store.
pub struct SpatialPooler;

impl SpatialPooler {
    /// Initializes the Spatial Pooler state of `c`:
    /// - Validates the inhibition parameters.
    /// - Builds the potential pool of every column and draws its initial permanences.
    /// - Raises permanences until every column has `stimulus_threshold` connected synapses.
    /// - Computes the initial inhibition radius.
    pub fn init(c: &mut Connections) -> Result<()> {
        Self::validate_inhibition(c)?;
        if c.is_pooler_initialized() {
            return Err(HtmError::IllegalState(
                "spatial pooler is already initialized".into(),
            ));
        }

        Self::connect_and_configure_inputs(c)?;
        c.inhibition_radius = Self::compute_inhibition_radius(c);

        debug!(
            "spatial pooler initialized: {} inputs, {} columns, inhibition radius {}",
            c.num_inputs(),
            c.num_columns(),
            c.inhibition_radius
        );
        Ok(())
    }

    /// Either a fixed number of active columns per inhibition area or a local area density in
    /// `(0, 0.5]` must be configured.
    pub fn validate_inhibition(c: &Connections) -> Result<()> {
        let p = c.params();
        if p.num_active_columns_per_inh_area == 0
            && (p.local_area_density <= 0.0 || p.local_area_density > 0.5)
        {
            return Err(HtmError::invalid(
                "local_area_density",
                format!(
                    "{} is not in (0, 0.5] and num_active_columns_per_inh_area is 0",
                    p.local_area_density
                ),
            ));
        }
        Ok(())
    }

    /// Processes the current `input`:
    /// - Updates iteration counters.
    /// - Calculates overlaps between columns and input subsets.
    /// - Applies boosting if learning is enabled.
    /// - Performs inhibition to pick winner columns and marks them in `active_array`.
    ///
    /// If learning is enabled:
    /// - Updates synapse permanence values.
    /// - Updates duty cycles, bumps weak columns and recomputes boost factors.
    /// - Recomputes the inhibition radius and minimum duty cycles every `update_period` iterations.
    ///
    /// Returns the winner columns in ascending order.
    pub fn compute(
        c: &mut Connections,
        input: &[bool],
        active_array: &mut [bool],
        learn: bool,
    ) -> Result<Vec<usize>> {
        if input.len() != c.num_inputs() {
            return Err(HtmError::InputLengthMismatch {
                expected: c.num_inputs(),
                actual: input.len(),
            });
        }
        if active_array.len() != c.num_columns() {
            return Err(HtmError::invalid(
                "active_array",
                format!(
                    "has length {} but there are {} columns",
                    active_array.len(),
                    c.num_columns()
                ),
            ));
        }
        if !c.is_pooler_initialized() {
            return Err(HtmError::IllegalState(
                "spatial pooler compute called before init".into(),
            ));
        }

        Self::update_iteration_number(c, learn);

        c.overlaps = Self::calculate_overlaps(c, input);
        c.boosted_overlaps = if learn {
            c.overlaps
                .iter()
                .zip(&c.boost_factors)
                .map(|(overlap, boost)| overlap * boost)
                .collect()
        } else {
            c.overlaps.clone()
        };

        let winners = Self::inhibit_columns(c, &c.boosted_overlaps);

        if learn {
            Self::adapt_synapses(c, input, &winners)?;
            Self::update_duty_cycles(c, &winners);
            Self::bump_up_weak_columns(c)?;
            Self::update_boost_factors(c);
            if c.iteration_num % c.params().update_period == 0 {
                Self::update_inhibition_radius(c);
                Self::update_min_duty_cycles(c);
            }
        }

        active_array.fill(false);
        for &column in &winners {
            active_array[column] = true;
        }

        trace!(
            "sp iteration {}: {} active columns",
            c.iteration_num,
            winners.len()
        );

        c.active_columns.clone_from(&winners);
        Ok(winners)
    }

    /// Increments the global iteration counter, and the learning counter if `learn` is true.
    #[inline]
    pub fn update_iteration_number(c: &mut Connections, learn: bool) {
        c.iteration_num += 1;
        if learn {
            c.iteration_learn_num += 1;
        }
    }

    /// The raw overlap of every column: how many of its connected synapses map to an active input bit.
    #[inline]
    pub fn calculate_overlaps(c: &Connections, input: &[bool]) -> Vec<f64> {
        (0..c.num_columns())
            .map(|column| c.proximal.overlap(column, input) as f64)
            .collect()
    }

    /// Selects the winner columns for the given (boosted) overlaps, ascending.
    ///
    /// Global inhibition is used when configured or when the inhibition radius exceeds the column space,
    /// otherwise every column competes only with its neighbors within the inhibition radius.
    pub fn inhibit_columns(c: &Connections, overlaps: &[f64]) -> Vec<usize> {
        let density = Self::inhibition_density(c);
        let max_dimension = c.column_topology().dimensions().iter().copied().max().unwrap_or(0);

        if c.params().global_inhibition || c.inhibition_radius > max_dimension {
            Self::inhibit_columns_global(c, overlaps, density)
        } else {
            Self::inhibit_columns_local(c, overlaps, density)
        }
    }

    /// The target fraction of active columns per inhibition area.
    ///
    /// A configured `local_area_density` wins. Otherwise the density is derived from
    /// `num_active_columns_per_inh_area` and the area covered by the inhibition radius, capped at 0.5.
    pub fn inhibition_density(c: &Connections) -> f64 {
        let p = c.params();
        if p.local_area_density > 0.0 {
            return p.local_area_density;
        }

        let diameter = (2 * c.inhibition_radius + 1) as f64;
        let inhibition_area = diameter
            .powi(p.column_dimensions.len() as i32)
            .min(c.num_columns() as f64);
        (p.num_active_columns_per_inh_area as f64 / inhibition_area).min(0.5)
    }

    /// Global inhibition, columns are sorted by overlap, and the top fraction are selected:
    /// - Sorts every column by overlap descending. The sort is stable, so equal overlaps favor lower indices.
    /// - Keeps the first `round(density * num_columns)`.
    /// - Drops columns from the bottom while their overlap is below `stimulus_threshold`.
    #[inline]
    pub fn inhibit_columns_global(c: &Connections, overlaps: &[f64], density: f64) -> Vec<usize> {
        let num_active = (density * c.num_columns() as f64).round() as usize;
        let stimulus_threshold = c.params().stimulus_threshold;

        let mut winners: Vec<usize> = (0..c.num_columns()).collect();
        winners.sort_by(|&a, &b| overlaps[b].total_cmp(&overlaps[a]));
        winners.truncate(num_active);

        while winners
            .last()
            .is_some_and(|&column| overlaps[column] < stimulus_threshold)
        {
            winners.pop();
        }

        winners.sort_unstable();
        winners
    }

    /// Local inhibition: a column with overlap ≥ `stimulus_threshold` wins if fewer than
    /// `0.5 + density * neighborhood_size` of its neighbors have a strictly greater overlap.
    ///
    /// Columns are visited in ascending order. Every winner's overlap is raised by a small amount
    /// (a thousandth of the largest overlap) right after it wins, so among equal overlaps the
    /// earlier column takes precedence over later ones.
    pub fn inhibit_columns_local(c: &Connections, overlaps: &[f64], density: f64) -> Vec<usize> {
        let stimulus_threshold = c.params().stimulus_threshold;
        let max_overlap = overlaps.iter().copied().fold(0.0, f64::max);
        let add_to_winners = if max_overlap > 0.0 {
            max_overlap / 1000.0
        } else {
            0.001
        };

        let mut tie_broken_overlaps = overlaps.to_vec();
        let mut winners = Vec::new();

        for column in 0..c.num_columns() {
            if overlaps[column] < stimulus_threshold {
                continue;
            }

            let neighborhood = Self::column_neighborhood(c, column, c.inhibition_radius);
            let num_bigger = neighborhood
                .iter()
                .filter(|&&neighbor| tie_broken_overlaps[neighbor] > overlaps[column])
                .count();
            let num_active = (0.5 + density * neighborhood.len() as f64) as usize;

            if num_bigger < num_active {
                winners.push(column);
                tie_broken_overlaps[column] += add_to_winners;
            }
        }

        winners
    }

    /// Columns within `radius` of `column` in column space (the column included), wrapping if configured.
    #[inline]
    pub fn column_neighborhood(c: &Connections, column: usize, radius: usize) -> Vec<usize> {
        let topology = c.column_topology();
        if c.params().wrap_around {
            topology.wrapping_neighborhood(column, radius).collect()
        } else {
            topology.neighborhood(column, radius).collect()
        }
    }

    /// Adjusts synapses for each winner column after an input is processed:
    /// - Increments permanence of synapses whose input bit was active.
    /// - Decrements permanence of synapses whose input bit was inactive.
    /// - Ensures permanence values remain within valid bounds, trims small ones and re-sorts connected synapses.
    ///
    /// Implements Hebbian-like learning that shapes columns towards frequently active inputs.
    #[inline]
    pub fn adapt_synapses(c: &mut Connections, input: &[bool], winners: &[usize]) -> Result<()> {
        let options = c.permanence_options();
        let stimulus_threshold = c.params().stimulus_threshold;

        for &column in winners {
            c.proximal.reinforce_column(column, input, &options);
            c.proximal
                .update_column_permanences(column, true, stimulus_threshold, &options)?;
        }
        Ok(())
    }

    /// Updates the rolling duty cycles for overlap and active states.
    ///
    /// Both are moving averages over `min(duty_cycle_period, iteration_num)` iterations: the new value
    /// is `(old * (period - 1) + value) / period`, where value is 1 if the column had a non-zero raw
    /// overlap (resp. won) this iteration.
    #[inline]
    pub fn update_duty_cycles(c: &mut Connections, winners: &[usize]) {
        let period = c.params().duty_cycle_period.min(c.iteration_num).max(1) as f64;

        let mut active = vec![false; c.num_columns()];
        for &column in winners {
            active[column] = true;
        }

        for (duty, &overlap) in c.overlap_duty_cycles.iter_mut().zip(&c.overlaps) {
            let value = if overlap > 0.0 { 1.0 } else { 0.0 };
            *duty = (*duty * (period - 1.0) + value) / period;
        }
        for (duty, &is_active) in c.active_duty_cycles.iter_mut().zip(&active) {
            let value = if is_active { 1.0 } else { 0.0 };
            *duty = (*duty * (period - 1.0) + value) / period;
        }
    }

    /// Increases permanence on "weak" columns that have low overlap duty cycles:
    /// - For each column whose overlap duty cycle is below its minimum, bumps all its synapses’ permanence.
    /// - Then clips, trims and re-sorts that column’s synapses, so that connected synapses come first.
    ///
    /// Prevents columns from perpetually remaining low-overlap, giving them a chance to learn and stay relevant.
    #[inline]
    pub fn bump_up_weak_columns(c: &mut Connections) -> Result<()> {
        let options = c.permanence_options();
        let stimulus_threshold = c.params().stimulus_threshold;

        let weak: Vec<usize> = (0..c.num_columns())
            .filter(|&column| c.overlap_duty_cycles[column] < c.min_overlap_duty_cycles[column])
            .collect();

        for column in weak {
            c.proximal
                .bump_column(column, options.below_stimulus_increment);
            c.proximal
                .update_column_permanences(column, false, stimulus_threshold, &options)?;
        }
        Ok(())
    }

    /// Recalculates each column’s boost factor based on its active duty cycle:
    /// - If a column’s activity is at or below its minimum, the factor falls linearly from
    ///   `max_boost` (no activity) towards 1.0 (activity equal to the minimum).
    /// - If its activity exceeds the minimum, its boost factor is reset to 1.0.
    ///
    /// Nothing changes while every minimum active duty cycle is still zero.
    #[inline]
    pub fn update_boost_factors(c: &mut Connections) {
        if !c.min_active_duty_cycles.iter().any(|&min| min > 0.0) {
            return;
        }

        let max_boost = c.params().max_boost;
        for ((boost, &min), &active) in c
            .boost_factors
            .iter_mut()
            .zip(&c.min_active_duty_cycles)
            .zip(&c.active_duty_cycles)
        {
            *boost = if active > min {
                1.0
            } else {
                ((1.0 - max_boost) / min.max(f64::EPSILON)) * active + max_boost
            };
        }
    }

    /// Recomputes the inhibition radius and logs when it changes.
    pub fn update_inhibition_radius(c: &mut Connections) {
        let radius = Self::compute_inhibition_radius(c);
        if radius != c.inhibition_radius {
            debug!(
                "inhibition radius changed from {} to {} at iteration {}",
                c.inhibition_radius, radius, c.iteration_num
            );
            c.inhibition_radius = radius;
        }
    }

    /// The inhibition radius: the largest column dimension under global inhibition. Otherwise the
    /// average connected span of the columns (in input space) is converted to column space and
    /// halved, with a minimum of 1.
    pub fn compute_inhibition_radius(c: &Connections) -> usize {
        let max_dimension = c.column_topology().dimensions().iter().copied().max().unwrap_or(0);
        if c.params().global_inhibition {
            return max_dimension;
        }

        let num_columns = c.num_columns() as f64;
        let avg_connected_span = (0..c.num_columns())
            .map(|column| Self::avg_connected_span_for_column(c, column))
            .sum::<f64>()
            / num_columns;

        let diameter = avg_connected_span * Self::avg_columns_per_input(c);
        let radius = ((diameter - 1.0) / 2.0).max(1.0);
        (radius + 0.5) as usize
    }

    /// The mean, over the input dimensions, of the extent covered by a column's connected synapses.
    /// Zero for a column without connected synapses.
    pub fn avg_connected_span_for_column(c: &Connections, column: usize) -> f64 {
        let connected = c.proximal.column_connected(column);
        if connected.is_empty() {
            return 0.0;
        }

        let dims = c.input_topology().dimensions().len();
        let mut min = vec![usize::MAX; dims];
        let mut max = vec![0; dims];
        for syn in connected {
            let coords = c.input_topology().coordinates(syn.input);
            for (d, &coord) in coords.iter().enumerate() {
                min[d] = min[d].min(coord);
                max[d] = max[d].max(coord);
            }
        }

        let total: usize = min.iter().zip(&max).map(|(lo, hi)| hi - lo + 1).sum();
        total as f64 / dims as f64
    }

    /// The mean ratio of column dimension to input dimension.
    pub fn avg_columns_per_input(c: &Connections) -> f64 {
        let columns = c.column_topology().dimensions();
        let inputs = c.input_topology().dimensions();
        let total: f64 = columns
            .iter()
            .zip(inputs)
            .map(|(&col_dim, &in_dim)| col_dim as f64 / in_dim as f64)
            .sum();
        total / columns.len() as f64
    }

    /// Updates the minimum duty cycles:
    /// - Globally (global inhibition, or a radius larger than the input): a fraction of the largest duty cycle of all columns.
    /// - Locally: a fraction of the largest duty cycle within each column's inhibition neighborhood.
    ///
    /// Ensures columns remain competitive, preventing "dead" columns.
    pub fn update_min_duty_cycles(c: &mut Connections) {
        let pct_overlap = c.params().min_pct_overlap_duty_cycles;
        let pct_active = c.params().min_pct_active_duty_cycles;

        if c.params().global_inhibition || c.inhibition_radius > c.num_inputs() {
            let max_overlap = c.overlap_duty_cycles.iter().copied().fold(0.0, f64::max);
            let max_active = c.active_duty_cycles.iter().copied().fold(0.0, f64::max);
            c.min_overlap_duty_cycles.fill(pct_overlap * max_overlap);
            c.min_active_duty_cycles.fill(pct_active * max_active);
            return;
        }

        let (min_overlap, min_active): (Vec<f64>, Vec<f64>) = (0..c.num_columns())
            .map(|column| {
                let neighborhood = Self::column_neighborhood(c, column, c.inhibition_radius);
                let max_overlap = neighborhood
                    .iter()
                    .map(|&n| c.overlap_duty_cycles[n])
                    .fold(0.0, f64::max);
                let max_active = neighborhood
                    .iter()
                    .map(|&n| c.active_duty_cycles[n])
                    .fold(0.0, f64::max);
                (pct_overlap * max_overlap, pct_active * max_active)
            })
            .unzip();

        c.min_overlap_duty_cycles = min_overlap;
        c.min_active_duty_cycles = min_active;
    }

    /// Builds every column's potential pool:
    /// - Calls `map_potential()` for each column to select which input indices are in its pool.
    /// - Initializes the synapses with random permanence values based on `init_connected_pct`.
    /// - Raises permanences until the column meets `stimulus_threshold`.
    ///
    /// The pools and the random stream are committed to `c` only once every column succeeded.
    pub fn connect_and_configure_inputs(c: &mut Connections) -> Result<()> {
        let options = c.permanence_options();
        let init_connected_pct = c.params().init_connected_pct;
        let stimulus_threshold = c.params().stimulus_threshold;

        let mut rng = c.rng.clone();
        let mut pool = ProximalPool::new(c.num_columns());

        for column in 0..c.num_columns() {
            let potential = Self::map_potential(c, column, &mut rng);
            pool.init_column(column, &potential, init_connected_pct, &options, &mut rng);
            pool.update_column_permanences(column, true, stimulus_threshold, &options)?;
        }

        c.proximal = pool;
        c.rng = rng;
        Ok(())
    }

    /// Samples which input bits fall within a column’s potential radius:
    /// - Determines the center input index for the column via `map_column()`.
    /// - Gathers all input indices within `potential_radius` of that center, wrapping if configured.
    /// - Draws `potential_pct` of them without replacement.
    ///
    /// Returns the selected input indices, ascending.
    pub fn map_potential(c: &Connections, column: usize, rng: &mut Random) -> Vec<usize> {
        let center = Self::map_column(c, column);
        let radius = c.params().potential_radius;
        let mut candidates: Vec<usize> = if c.params().wrap_around {
            c.input_topology()
                .wrapping_neighborhood(center, radius)
                .collect()
        } else {
            c.input_topology().neighborhood(center, radius).collect()
        };

        let num_potential = Self::potential_synapses(c, candidates.len());
        let mut sample = Vec::with_capacity(num_potential);
        for _ in 0..num_potential {
            let pick = rng.random_range(0..candidates.len());
            sample.push(candidates.remove(pick));
        }

        sample.sort_unstable();
        sample
    }

    /// Calculates how many potential synapses a column should have, given its neighborhood size.
    #[inline]
    pub fn potential_synapses(c: &Connections, neighborhood_size: usize) -> usize {
        (neighborhood_size as f64 * c.params().potential_pct + 0.5) as usize
    }

    /// Maps a column index to the "center" input index in the input space:
    /// - Proportionally maps the column’s coordinates to the input grid coordinates.
    /// - Offset by half a cell for better distribution.
    /// - Clamps the result to the valid input range.
    #[inline]
    pub fn map_column(c: &Connections, column: usize) -> usize {
        let coords: Vec<usize> = c
            .column_topology()
            .coordinates(column)
            .into_iter()
            .zip(c.column_topology().dimensions())
            .zip(c.input_topology().dimensions())
            .map(|((index, &col_dim), &in_dim)| {
                let mapped = ((index as f64 / col_dim as f64) * in_dim as f64
                    + (in_dim as f64 / col_dim as f64) * 0.5) as usize;
                mapped.min(in_dim - 1)
            })
            .collect();
        c.input_topology().index_from_coordinates(&coords)
    }
}
