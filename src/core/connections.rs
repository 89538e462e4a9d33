//! `Connections` is the shared state store of an HTM region.
//!
//! It owns everything the Spatial Pooler and the Temporal Memory read and write:
//! - the configuration and the input/column topologies,
//! - the columns with their proximal potential pools and per-column statistics
//!   (overlaps, duty cycles, boost factors) and the inhibition radius,
//! - the distal graph: cells, dendritic segments and synapses,
//! - the cell and segment sets carried from one time step to the next,
//! - the seeded random number generator.
//!
//! The distal graph is an arena. Segments and synapses live in flat vecs owned by `Connections`
//! and refer to each other and to cells by index. A segment knows its cell, a synapse knows its
//! segment and its presynaptic cell, and every cell keeps the list of synapses it feeds (its
//! "receptors") so that activity can be computed from the active cells alone.
//! Destroyed slots are recycled through free lists.

use super::{
    column::Column,
    parameters::Parameters,
    proximal::{PermanenceOptions, ProximalPool},
    random::Random,
    topology::Topology,
};
use crate::error::{HtmError, Result};
use serde::{Deserialize, Serialize};

/// Index of a segment in the arena.
pub type SegmentIdx = usize;

/// Index of a distal synapse in the arena.
pub type SynapseIdx = usize;

/// Tolerance used when comparing distal permanences against thresholds.
pub const EPSILON: f64 = 0.00001;

/// A dendritic segment on a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistalSegment {
    /// The cell that owns this segment.
    pub cell: usize,

    /// Creation order of the segment, unique over the lifetime of the region.
    pub ordinal: u64,

    /// The Temporal Memory iteration in which the segment was last active (or created).
    pub last_used_iteration: u64,

    synapses: Vec<SynapseIdx>,
    destroyed: bool,
}

/// A synapse from a presynaptic cell onto a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistalSynapse {
    /// The segment this synapse belongs to.
    pub segment: SegmentIdx,

    /// The cell whose activity this synapse reads.
    pub presynaptic_cell: usize,

    /// The strength of the connection, in `[0, 1]`.
    pub permanence: f64,

    destroyed: bool,
}

/// The outcome of [`Connections::compute_activity`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentActivity {
    /// Segments with enough active connected synapses, sorted by cell then creation order.
    pub active: Vec<SegmentIdx>,

    /// Segments with enough active potential synapses, sorted by cell then creation order.
    pub matching: Vec<SegmentIdx>,

    /// Per segment index: number of active synapses at or above the connected permanence.
    pub num_active_connected: Vec<usize>,

    /// Per segment index: number of active synapses at or above the minimum permanence.
    pub num_active_potential: Vec<usize>,
}

/// The state store shared by the Spatial Pooler and the Temporal Memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connections {
    params: Parameters,
    num_inputs: usize,
    num_columns: usize,
    num_cells: usize,
    input_topology: Topology,
    column_topology: Topology,
    columns: Vec<Column>,

    // Spatial Pooler state.
    pub(crate) proximal: ProximalPool,
    pub(crate) overlaps: Vec<f64>,
    pub(crate) boosted_overlaps: Vec<f64>,
    pub(crate) overlap_duty_cycles: Vec<f64>,
    pub(crate) active_duty_cycles: Vec<f64>,
    pub(crate) min_overlap_duty_cycles: Vec<f64>,
    pub(crate) min_active_duty_cycles: Vec<f64>,
    pub(crate) boost_factors: Vec<f64>,
    pub(crate) inhibition_radius: usize,
    pub(crate) iteration_num: u32,
    pub(crate) iteration_learn_num: u32,
    pub(crate) active_columns: Vec<usize>,

    // Distal graph.
    cell_segments: Vec<Vec<SegmentIdx>>,
    segments: Vec<DistalSegment>,
    free_segments: Vec<SegmentIdx>,
    synapses: Vec<DistalSynapse>,
    free_synapses: Vec<SynapseIdx>,
    receptors: Vec<Vec<SynapseIdx>>,
    next_segment_ordinal: u64,
    pub(crate) tm_iteration: u64,

    // Temporal Memory state of the most recent time step.
    pub(crate) active_cells: Vec<usize>,
    pub(crate) winner_cells: Vec<usize>,
    pub(crate) active_segments: Vec<SegmentIdx>,
    pub(crate) matching_segments: Vec<SegmentIdx>,

    pub(crate) rng: Random,
}

impl Connections {
    /// Creates the state store for the given configuration: topologies, columns, cells, empty
    /// statistics (boost factors start at 1.0) and the seeded random number generator.
    /// Potential pools are built by `SpatialPooler::init`.
    pub fn new(params: Parameters) -> Result<Self> {
        params.validate()?;

        let num_inputs = params.num_inputs();
        let num_columns = params.num_columns();
        let num_cells = num_columns * params.cells_per_column;
        let columns = (0..num_columns)
            .map(|index| Column::new(index, params.cells_per_column))
            .collect();

        Ok(Self {
            input_topology: Topology::new(&params.input_dimensions),
            column_topology: Topology::new(&params.column_dimensions),
            num_inputs,
            num_columns,
            num_cells,
            columns,
            proximal: ProximalPool::new(num_columns),
            overlaps: vec![0.0; num_columns],
            boosted_overlaps: vec![0.0; num_columns],
            overlap_duty_cycles: vec![0.0; num_columns],
            active_duty_cycles: vec![0.0; num_columns],
            min_overlap_duty_cycles: vec![0.0; num_columns],
            min_active_duty_cycles: vec![0.0; num_columns],
            boost_factors: vec![1.0; num_columns],
            inhibition_radius: 0,
            iteration_num: 0,
            iteration_learn_num: 0,
            active_columns: Vec::new(),
            cell_segments: vec![Vec::new(); num_cells],
            segments: Vec::new(),
            free_segments: Vec::new(),
            synapses: Vec::new(),
            free_synapses: Vec::new(),
            receptors: vec![Vec::new(); num_cells],
            next_segment_ordinal: 0,
            tm_iteration: 0,
            active_cells: Vec::new(),
            winner_cells: Vec::new(),
            active_segments: Vec::new(),
            matching_segments: Vec::new(),
            rng: Random::new(params.seed),
            params,
        })
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// The configuration of this region.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Changes tunable parameters in place. The structural ones (dimensions, cells per column,
    /// seed) are fixed once the region exists; changing them is rejected, as is any change that
    /// fails validation. On error nothing is modified.
    ///
    /// A new `syn_perm_connected` re-partitions every potential pool, so overlaps count exactly
    /// the synapses connected under the new threshold.
    pub fn update_params(&mut self, update: impl FnOnce(&mut Parameters)) -> Result<()> {
        let mut params = self.params.clone();
        update(&mut params);

        if params.input_dimensions != self.params.input_dimensions
            || params.column_dimensions != self.params.column_dimensions
        {
            return Err(HtmError::invalid(
                "column_dimensions",
                "dimensions cannot change after construction",
            ));
        }
        if params.cells_per_column != self.params.cells_per_column {
            return Err(HtmError::invalid(
                "cells_per_column",
                "cannot change after construction",
            ));
        }
        if params.seed != self.params.seed {
            return Err(HtmError::invalid("seed", "cannot change after construction"));
        }

        params.validate()?;
        let connected_changed = params.syn_perm_connected != self.params.syn_perm_connected;
        self.params = params;

        if connected_changed {
            let connected = self.params.syn_perm_connected;
            for column in 0..self.proximal.num_columns() {
                self.proximal.sort_column(column, connected);
            }
        }
        Ok(())
    }

    pub(crate) fn permanence_options(&self) -> PermanenceOptions {
        PermanenceOptions::from(&self.params)
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn cells_per_column(&self) -> usize {
        self.params.cells_per_column
    }

    pub fn input_topology(&self) -> &Topology {
        &self.input_topology
    }

    pub fn column_topology(&self) -> &Topology {
        &self.column_topology
    }

    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The column owning a cell.
    #[inline]
    pub fn column_for_cell(&self, cell: usize) -> usize {
        Column::index_of_cell(cell, self.params.cells_per_column)
    }

    /// The region's random number generator.
    pub fn random(&mut self) -> &mut Random {
        &mut self.rng
    }

    // ------------------------------------------------------------------
    // Spatial Pooler state
    // ------------------------------------------------------------------

    /// The proximal potential pools of all columns.
    pub fn proximal(&self) -> &ProximalPool {
        &self.proximal
    }

    /// True once `SpatialPooler::init` has built every potential pool.
    pub fn is_pooler_initialized(&self) -> bool {
        self.proximal.num_columns() == self.num_columns
    }

    /// Input indices in the potential pool of a column, ascending.
    pub fn potential_pool(&self, column: usize) -> Vec<usize> {
        self.proximal.potential(column)
    }

    /// `(input, permanence)` pairs of a column's potential pool, ascending by input.
    pub fn proximal_permanences(&self, column: usize) -> Vec<(usize, f64)> {
        self.proximal.permanences(column)
    }

    /// Connected synapse count of every column.
    pub fn connected_counts(&self) -> Vec<usize> {
        (0..self.proximal.num_columns())
            .map(|column| self.proximal.connected_count(column))
            .collect()
    }

    /// Raw overlaps of the last Spatial Pooler step.
    pub fn overlaps(&self) -> &[f64] {
        &self.overlaps
    }

    /// Overlaps after boosting (identical to the raw ones when not learning).
    pub fn boosted_overlaps(&self) -> &[f64] {
        &self.boosted_overlaps
    }

    pub fn overlap_duty_cycles(&self) -> &[f64] {
        &self.overlap_duty_cycles
    }

    pub fn overlap_duty_cycles_mut(&mut self) -> &mut [f64] {
        &mut self.overlap_duty_cycles
    }

    pub fn active_duty_cycles(&self) -> &[f64] {
        &self.active_duty_cycles
    }

    pub fn active_duty_cycles_mut(&mut self) -> &mut [f64] {
        &mut self.active_duty_cycles
    }

    pub fn min_overlap_duty_cycles(&self) -> &[f64] {
        &self.min_overlap_duty_cycles
    }

    pub fn min_overlap_duty_cycles_mut(&mut self) -> &mut [f64] {
        &mut self.min_overlap_duty_cycles
    }

    pub fn min_active_duty_cycles(&self) -> &[f64] {
        &self.min_active_duty_cycles
    }

    pub fn min_active_duty_cycles_mut(&mut self) -> &mut [f64] {
        &mut self.min_active_duty_cycles
    }

    pub fn boost_factors(&self) -> &[f64] {
        &self.boost_factors
    }

    pub fn boost_factors_mut(&mut self) -> &mut [f64] {
        &mut self.boost_factors
    }

    pub fn inhibition_radius(&self) -> usize {
        self.inhibition_radius
    }

    pub fn set_inhibition_radius(&mut self, radius: usize) {
        self.inhibition_radius = radius;
    }

    /// Number of Spatial Pooler steps so far, learning or not.
    pub fn iteration_num(&self) -> u32 {
        self.iteration_num
    }

    /// Number of Spatial Pooler steps with learning enabled.
    pub fn iteration_learn_num(&self) -> u32 {
        self.iteration_learn_num
    }

    /// Winning columns of the last Spatial Pooler step, ascending.
    pub fn active_columns(&self) -> &[usize] {
        &self.active_columns
    }

    // ------------------------------------------------------------------
    // Distal graph
    // ------------------------------------------------------------------

    /// Creates a segment on `cell`. A cell already holding `max_segments_per_cell` segments first
    /// loses its least recently used one.
    pub fn create_segment(&mut self, cell: usize) -> SegmentIdx {
        while self.cell_segments[cell].len() >= self.params.max_segments_per_cell {
            let least_used = self.cell_segments[cell]
                .iter()
                .copied()
                .min_by_key(|&seg| self.segments[seg].last_used_iteration);
            match least_used {
                Some(seg) => self.destroy_segment(seg),
                None => break,
            }
        }

        let data = DistalSegment {
            cell,
            ordinal: self.next_segment_ordinal,
            last_used_iteration: self.tm_iteration,
            synapses: Vec::new(),
            destroyed: false,
        };
        self.next_segment_ordinal += 1;

        let segment = match self.free_segments.pop() {
            Some(reuse) => {
                self.segments[reuse] = data;
                reuse
            }
            None => {
                self.segments.push(data);
                self.segments.len() - 1
            }
        };

        self.cell_segments[cell].push(segment);
        segment
    }

    /// Destroys a segment together with all its synapses.
    pub fn destroy_segment(&mut self, segment: SegmentIdx) {
        if self.segments[segment].destroyed {
            return;
        }

        for synapse in std::mem::take(&mut self.segments[segment].synapses) {
            self.release_synapse(synapse);
        }

        let cell = self.segments[segment].cell;
        self.cell_segments[cell].retain(|&seg| seg != segment);
        self.segments[segment].destroyed = true;
        self.free_segments.push(segment);
    }

    /// Creates a synapse from `presynaptic_cell` onto `segment`, permanence clamped to `[0, 1]`.
    pub fn create_synapse(
        &mut self,
        segment: SegmentIdx,
        presynaptic_cell: usize,
        permanence: f64,
    ) -> SynapseIdx {
        let data = DistalSynapse {
            segment,
            presynaptic_cell,
            permanence: permanence.clamp(0.0, 1.0),
            destroyed: false,
        };

        let synapse = match self.free_synapses.pop() {
            Some(reuse) => {
                self.synapses[reuse] = data;
                reuse
            }
            None => {
                self.synapses.push(data);
                self.synapses.len() - 1
            }
        };

        self.segments[segment].synapses.push(synapse);
        self.receptors[presynaptic_cell].push(synapse);
        synapse
    }

    /// Destroys a synapse, detaching it from its segment and its presynaptic cell.
    pub fn destroy_synapse(&mut self, synapse: SynapseIdx) {
        if self.synapses[synapse].destroyed {
            return;
        }
        let segment = self.synapses[synapse].segment;
        self.segments[segment].synapses.retain(|&syn| syn != synapse);
        self.release_synapse(synapse);
    }

    fn release_synapse(&mut self, synapse: SynapseIdx) {
        let presynaptic_cell = self.synapses[synapse].presynaptic_cell;
        let receptors = &mut self.receptors[presynaptic_cell];
        if let Some(pos) = receptors.iter().position(|&syn| syn == synapse) {
            receptors.swap_remove(pos);
        }
        self.synapses[synapse].destroyed = true;
        self.free_synapses.push(synapse);
    }

    /// Sets a synapse's permanence, clamped to `[0, 1]`.
    pub fn update_synapse_permanence(&mut self, synapse: SynapseIdx, permanence: f64) {
        self.synapses[synapse].permanence = permanence.clamp(0.0, 1.0);
    }

    /// Segments of a cell, in creation order.
    pub fn segments_for_cell(&self, cell: usize) -> &[SegmentIdx] {
        &self.cell_segments[cell]
    }

    /// Synapses of a segment, in creation order.
    pub fn synapses_for_segment(&self, segment: SegmentIdx) -> &[SynapseIdx] {
        &self.segments[segment].synapses
    }

    pub fn segment(&self, segment: SegmentIdx) -> &DistalSegment {
        &self.segments[segment]
    }

    pub fn synapse(&self, synapse: SynapseIdx) -> &DistalSynapse {
        &self.synapses[synapse]
    }

    pub fn cell_for_segment(&self, segment: SegmentIdx) -> usize {
        self.segments[segment].cell
    }

    pub fn column_for_segment(&self, segment: SegmentIdx) -> usize {
        self.column_for_cell(self.segments[segment].cell)
    }

    /// False once the segment has been destroyed (its slot may be reused later).
    pub fn is_segment_alive(&self, segment: SegmentIdx) -> bool {
        self.segments.get(segment).is_some_and(|seg| !seg.destroyed)
    }

    /// Presynaptic cells of a segment's synapses, in synapse creation order.
    pub fn presynaptic_cells_for_segment(&self, segment: SegmentIdx) -> Vec<usize> {
        self.segments[segment]
            .synapses
            .iter()
            .map(|&syn| self.synapses[syn].presynaptic_cell)
            .collect()
    }

    /// Number of live segments.
    pub fn num_segments(&self) -> usize {
        self.segments.len() - self.free_segments.len()
    }

    pub fn num_segments_on_cell(&self, cell: usize) -> usize {
        self.cell_segments[cell].len()
    }

    /// Number of live synapses.
    pub fn num_synapses(&self) -> usize {
        self.synapses.len() - self.free_synapses.len()
    }

    pub fn num_synapses_on_segment(&self, segment: SegmentIdx) -> usize {
        self.segments[segment].synapses.len()
    }

    /// Upper bound (exclusive) of segment indices, for per-segment scratch arrays.
    pub fn segment_flat_list_length(&self) -> usize {
        self.segments.len()
    }

    /// Orders segments by owning cell, then by creation. Since cells are numbered column by
    /// column this also groups segments by column in ascending order.
    pub fn segment_sort_key(&self, segment: SegmentIdx) -> (usize, u64) {
        let data = &self.segments[segment];
        (data.cell, data.ordinal)
    }

    /// Computes the activity of every segment given the currently active presynaptic cells.
    ///
    /// For each segment two counts are taken over the synapses whose presynaptic cell is active:
    /// those with permanence ≥ `connected_permanence`, and those with permanence ≥ `min_permanence`.
    /// A segment is active if the first count reaches `activation_threshold`, matching if the
    /// second reaches `min_threshold`. Both lists come back sorted by owning cell (and thus column).
    pub fn compute_activity(
        &self,
        active_cells: &[usize],
        connected_permanence: f64,
        activation_threshold: usize,
        min_permanence: f64,
        min_threshold: usize,
    ) -> SegmentActivity {
        let mut num_active_connected = vec![0; self.segments.len()];
        let mut num_active_potential = vec![0; self.segments.len()];

        let connected = connected_permanence - EPSILON;
        let potential = min_permanence - EPSILON;

        for &cell in active_cells {
            for &synapse in &self.receptors[cell] {
                let data = &self.synapses[synapse];
                if data.permanence >= potential {
                    num_active_potential[data.segment] += 1;
                }
                if data.permanence >= connected {
                    num_active_connected[data.segment] += 1;
                }
            }
        }

        let alive = |seg: &usize| !self.segments[*seg].destroyed;
        let mut active: Vec<SegmentIdx> = (0..self.segments.len())
            .filter(alive)
            .filter(|&seg| num_active_connected[seg] >= activation_threshold)
            .collect();
        let mut matching: Vec<SegmentIdx> = (0..self.segments.len())
            .filter(alive)
            .filter(|&seg| num_active_potential[seg] >= min_threshold)
            .collect();

        active.sort_unstable_by_key(|&seg| self.segment_sort_key(seg));
        matching.sort_unstable_by_key(|&seg| self.segment_sort_key(seg));

        SegmentActivity {
            active,
            matching,
            num_active_connected,
            num_active_potential,
        }
    }

    pub(crate) fn record_segment_activity(&mut self, segment: SegmentIdx) {
        self.segments[segment].last_used_iteration = self.tm_iteration;
    }

    // ------------------------------------------------------------------
    // Temporal Memory state
    // ------------------------------------------------------------------

    /// Active cells of the most recent time step, ascending.
    pub fn active_cells(&self) -> &[usize] {
        &self.active_cells
    }

    /// Winner cells of the most recent time step, ascending.
    pub fn winner_cells(&self) -> &[usize] {
        &self.winner_cells
    }

    /// Segments that were active (predicting) in the most recent time step.
    pub fn active_segments(&self) -> &[SegmentIdx] {
        &self.active_segments
    }

    /// Segments that were matching in the most recent time step.
    pub fn matching_segments(&self) -> &[SegmentIdx] {
        &self.matching_segments
    }

    /// Number of Temporal Memory learning iterations so far.
    pub fn tm_iteration(&self) -> u64 {
        self.tm_iteration
    }

    /// Forgets the carried-over cell and segment sets.
    pub(crate) fn clear_sequence_state(&mut self) {
        self.active_cells.clear();
        self.winner_cells.clear();
        self.active_segments.clear();
        self.matching_segments.clear();
    }
}
