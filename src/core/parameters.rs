//! Configuration of a region: the Spatial Pooler and Temporal Memory parameters in one struct.
//!
//! Every field is public and named; build a configuration with struct update syntax
//! (`Parameters { column_dimensions: vec![1024], ..Default::default() }`) and hand it to
//! `Connections::new`, which validates it.

use crate::error::{HtmError, Result};
use serde::{Deserialize, Serialize};

/// All tunable parameters of the Spatial Pooler and the Temporal Memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// The shape of the input space.
    pub input_dimensions: Vec<usize>,

    /// The shape of the column space. Must have as many dimensions as the input space.
    pub column_dimensions: Vec<usize>,

    /// Number of cells in every column.
    pub cells_per_column: usize,

    /// Radius (in input space) around a column's center from which its potential pool is drawn.
    pub potential_radius: usize,

    /// Fraction of the inputs within `potential_radius` that end up in a column's potential pool.
    pub potential_pct: f64,

    /// If true, all columns compete globally instead of within their inhibition radius.
    pub global_inhibition: bool,

    /// Target fraction of active columns per inhibition area. Values `<= 0` mean "unset", in which
    /// case `num_active_columns_per_inh_area` controls sparsity.
    pub local_area_density: f64,

    /// Target number of active columns per inhibition area, used when `local_area_density` is unset.
    pub num_active_columns_per_inh_area: usize,

    /// Minimum overlap a column needs to be considered during inhibition.
    pub stimulus_threshold: f64,

    /// Permanence decrement for synapses of winning columns whose input bit was off.
    pub syn_perm_inactive_dec: f64,

    /// Permanence increment for synapses of winning columns whose input bit was on.
    pub syn_perm_active_inc: f64,

    /// A proximal synapse is connected iff its permanence is at least this value.
    pub syn_perm_connected: f64,

    /// Increment applied to every potential synapse of a column that is below its stimulus threshold
    /// or whose overlap duty cycle is too low.
    pub syn_perm_below_stimulus_inc: f64,

    /// Proximal permanences at or below this value are snapped to zero.
    pub syn_perm_trim_threshold: f64,

    /// Lower bound for proximal permanences.
    pub syn_perm_min: f64,

    /// Upper bound for proximal permanences.
    pub syn_perm_max: f64,

    /// Fraction of each potential pool that starts out connected.
    pub init_connected_pct: f64,

    /// Fraction of the neighborhood's maximum overlap duty cycle below which a column is "weak".
    pub min_pct_overlap_duty_cycles: f64,

    /// Fraction of the neighborhood's maximum active duty cycle below which a column gets boosted.
    pub min_pct_active_duty_cycles: f64,

    /// Window (in iterations) of the duty cycle moving averages.
    pub duty_cycle_period: u32,

    /// Boost factor applied to a column whose active duty cycle is zero.
    pub max_boost: f64,

    /// Every `update_period` iterations the inhibition radius and minimum duty cycles are recomputed.
    pub update_period: u32,

    /// If true, neighborhoods wrap around the borders of the input and column spaces.
    pub wrap_around: bool,

    /// Seed of the region's random number generator.
    pub seed: u64,

    /// A segment is active if at least this many of its connected synapses are active.
    pub activation_threshold: usize,

    /// A segment is matching if at least this many of its synapses (connected or not) are active.
    pub min_threshold: usize,

    /// Maximum number of synapses grown on a segment per learning step.
    pub max_new_synapse_count: usize,

    /// Maximum number of segments on one cell.
    pub max_segments_per_cell: usize,

    /// Maximum number of synapses on one segment.
    pub max_synapses_per_segment: usize,

    /// Permanence of newly grown distal synapses.
    pub initial_permanence: f64,

    /// A distal synapse is connected iff its permanence is at least this value.
    pub connected_permanence: f64,

    /// Distal permanence increment for synapses to previously active cells.
    pub permanence_increment: f64,

    /// Distal permanence decrement for synapses to previously inactive cells.
    pub permanence_decrement: f64,

    /// Decrement applied to matching segments in columns that did not become active.
    pub predicted_segment_decrement: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            input_dimensions: vec![64],
            column_dimensions: vec![2048],
            cells_per_column: 32,
            potential_radius: 16,
            potential_pct: 0.5,
            global_inhibition: false,
            local_area_density: -1.0,
            num_active_columns_per_inh_area: 10,
            stimulus_threshold: 0.0,
            syn_perm_inactive_dec: 0.008,
            syn_perm_active_inc: 0.05,
            syn_perm_connected: 0.10,
            syn_perm_below_stimulus_inc: 0.01,
            syn_perm_trim_threshold: 0.025,
            syn_perm_min: 0.0,
            syn_perm_max: 1.0,
            init_connected_pct: 0.5,
            min_pct_overlap_duty_cycles: 0.001,
            min_pct_active_duty_cycles: 0.001,
            duty_cycle_period: 1000,
            max_boost: 10.0,
            update_period: 50,
            wrap_around: true,
            seed: 42,
            activation_threshold: 13,
            min_threshold: 10,
            max_new_synapse_count: 20,
            max_segments_per_cell: 255,
            max_synapses_per_segment: 255,
            initial_permanence: 0.21,
            connected_permanence: 0.5,
            permanence_increment: 0.10,
            permanence_decrement: 0.10,
            predicted_segment_decrement: 0.0,
        }
    }
}

impl Parameters {
    /// Total number of inputs: the product of the input dimensions.
    pub fn num_inputs(&self) -> usize {
        self.input_dimensions.iter().product()
    }

    /// Total number of columns: the product of the column dimensions.
    pub fn num_columns(&self) -> usize {
        self.column_dimensions.iter().product()
    }

    /// Checks the constraints that do not depend on which algorithm runs.
    /// Inhibition settings are checked by `SpatialPooler::init`.
    pub fn validate(&self) -> Result<()> {
        check_dimensions("input_dimensions", &self.input_dimensions)?;
        check_dimensions("column_dimensions", &self.column_dimensions)?;
        if self.input_dimensions.len() != self.column_dimensions.len() {
            return Err(HtmError::invalid(
                "column_dimensions",
                format!(
                    "has {} dimensions but the input space has {}",
                    self.column_dimensions.len(),
                    self.input_dimensions.len()
                ),
            ));
        }
        if self.cells_per_column == 0 {
            return Err(HtmError::invalid("cells_per_column", "must be positive"));
        }
        if !(self.potential_pct > 0.0 && self.potential_pct <= 1.0) {
            return Err(HtmError::invalid("potential_pct", "must be in (0, 1]"));
        }
        if self.stimulus_threshold < 0.0 {
            return Err(HtmError::invalid("stimulus_threshold", "must not be negative"));
        }
        if !(self.syn_perm_min <= self.syn_perm_connected
            && self.syn_perm_connected <= self.syn_perm_max)
        {
            return Err(HtmError::invalid(
                "syn_perm_connected",
                "must lie within [syn_perm_min, syn_perm_max]",
            ));
        }
        if self.syn_perm_below_stimulus_inc <= 0.0 {
            return Err(HtmError::invalid(
                "syn_perm_below_stimulus_inc",
                "must be positive",
            ));
        }
        if self.syn_perm_trim_threshold >= self.syn_perm_connected {
            return Err(HtmError::invalid(
                "syn_perm_trim_threshold",
                "must be below syn_perm_connected",
            ));
        }
        if !(0.0..=1.0).contains(&self.init_connected_pct) {
            return Err(HtmError::invalid("init_connected_pct", "must be in [0, 1]"));
        }
        if self.duty_cycle_period == 0 {
            return Err(HtmError::invalid("duty_cycle_period", "must be positive"));
        }
        if self.update_period == 0 {
            return Err(HtmError::invalid("update_period", "must be positive"));
        }
        if self.max_boost < 1.0 {
            return Err(HtmError::invalid("max_boost", "must be at least 1.0"));
        }
        if !(0.0..=1.0).contains(&self.connected_permanence)
            || !(0.0..=1.0).contains(&self.initial_permanence)
        {
            return Err(HtmError::invalid(
                "connected_permanence",
                "distal permanences must lie within [0, 1]",
            ));
        }
        if self.max_segments_per_cell == 0 || self.max_synapses_per_segment == 0 {
            return Err(HtmError::invalid(
                "max_segments_per_cell",
                "segment and synapse capacities must be positive",
            ));
        }
        Ok(())
    }
}

fn check_dimensions(name: &'static str, dims: &[usize]) -> Result<()> {
    if dims.is_empty() {
        return Err(HtmError::invalid(name, "cannot be empty"));
    }
    if dims.contains(&0) {
        return Err(HtmError::invalid(name, format!("{dims:?} contains a zero size")));
    }
    Ok(())
}
