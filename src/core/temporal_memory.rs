//! The `TemporalMemory` module implements a core component of HTM that learns and predicts temporal sequences.
//!
//! At a high level, it models a set of columns, where each column contains multiple cells.
//! Each cell can form multiple dendritic segments, which in turn consist of synapses.
//!
//! Column:
//! - A group of cells that share common input.
//! - Each column processes feed-forward signals and contributes to forming sparse distributed representations.
//!
//! Cell:
//! - An individual processing unit within a column.
//! - Cells are responsible for representing different contexts of the same input.
//!
//! Dendritic Segment (Segment):
//! - A cluster of synapses on a cell that detects patterns of activity from other cells.
//! - Each segment learns to recognize sequences by forming connections to presynaptic cells.
//!
//! Synapse:
//! - A connection from a presynaptic cell (i.e., a cell that provided input) to a dendritic segment.
//! - Each synapse has a permanence value that indicates the strength of the connection and determines if the connection is active.
//!
//! Bursting:
//! - When a column becomes active due to feed-forward input but no cell was correctly predicted, all cells in the column are activated.
//! - This process allows the system to learn new sequences and is called bursting.
//!
//! Winner Cells:
//! - Cells that have been selected based on their predictive state or through bursting, which then guide the learning process.
//!
//! How It Works:
//! - The Temporal Memory processes input in discrete time steps.
//! - For each time step, it receives a set of active (feed-forward) columns.
//! - Segment activity is computed from the cells that were active in the previous step.
//! - In each active column, it checks if any cell was correctly predicted by an active dendritic segment.
//! - If so, those cells are activated; otherwise, the column bursts.
//! - Matching segments in inactive columns predicted wrongly and may be punished.
//! - New synapses are grown towards the previous winner cells, so the next occurrence of the same transition is predicted.
//!
//! All state lives in [`Connections`]: the segments and synapses in its arena, and the active/winner
//! cells and active/matching segments of the most recent step.

use super::{
    column::Column,
    connections::{Connections, SegmentActivity, SegmentIdx},
};
use crate::error::{HtmError, Result};
use fxhash::FxHashSet;
use log::{debug, trace};
use rand::Rng;
use std::ops::Range;

/// Synapses whose permanence drops below this value are destroyed.
const MIN_PERMANENCE: f64 = 0.000_000_1;

/// The outcome of one Temporal Memory time step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputeCycle {
    /// Cells that became active, ascending.
    pub active_cells: Vec<usize>,

    /// Cells selected for learning, ascending.
    pub winner_cells: Vec<usize>,

    /// Cells predicted to become active in the next step, ascending.
    pub predictive_cells: Vec<usize>,

    /// Segments that were active in this step (computed from the previous active cells).
    pub active_segments: Vec<SegmentIdx>,

    /// Segments that were matching in this step.
    pub matching_segments: Vec<SegmentIdx>,

    /// Active columns that contained a correctly predicted cell, ascending.
    pub predicted_active_columns: Vec<usize>,
}

impl ComputeCycle {
    /// Columns owning at least one predictive cell, ascending.
    pub fn predictive_columns(&self, cells_per_column: usize) -> Vec<usize> {
        let mut columns: Vec<usize> = self
            .predictive_cells
            .iter()
            .map(|&cell| Column::index_of_cell(cell, cells_per_column))
            .collect();
        columns.dedup();
        columns
    }
}

/// One column visited by [`ExcitedColumns`]: whether it is active, and the ranges of the
/// active and matching segment lists that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcitedColumn {
    pub column: usize,
    pub is_active: bool,
    pub active_segments: Range<usize>,
    pub matching_segments: Range<usize>,
}

/// Merges three ascending streams of column keys (active columns, the columns of the active
/// segments, the columns of the matching segments) and yields every column that appears in any
/// of them once, in ascending order.
pub struct ExcitedColumns<'a> {
    active_columns: &'a [usize],
    active_segment_columns: &'a [usize],
    matching_segment_columns: &'a [usize],
    next_active: usize,
    next_active_segment: usize,
    next_matching_segment: usize,
}

impl<'a> ExcitedColumns<'a> {
    pub fn new(
        active_columns: &'a [usize],
        active_segment_columns: &'a [usize],
        matching_segment_columns: &'a [usize],
    ) -> Self {
        Self {
            active_columns,
            active_segment_columns,
            matching_segment_columns,
            next_active: 0,
            next_active_segment: 0,
            next_matching_segment: 0,
        }
    }
}

fn take_group(keys: &[usize], cursor: &mut usize, column: usize) -> Range<usize> {
    let start = *cursor;
    while keys.get(*cursor) == Some(&column) {
        *cursor += 1;
    }
    start..*cursor
}

impl Iterator for ExcitedColumns<'_> {
    type Item = ExcitedColumn;

    fn next(&mut self) -> Option<ExcitedColumn> {
        let column = [
            self.active_columns.get(self.next_active),
            self.active_segment_columns.get(self.next_active_segment),
            self.matching_segment_columns.get(self.next_matching_segment),
        ]
        .into_iter()
        .flatten()
        .min()
        .copied()?;

        let active = take_group(self.active_columns, &mut self.next_active, column);
        Some(ExcitedColumn {
            column,
            is_active: !active.is_empty(),
            active_segments: take_group(
                self.active_segment_columns,
                &mut self.next_active_segment,
                column,
            ),
            matching_segments: take_group(
                self.matching_segment_columns,
                &mut self.next_matching_segment,
                column,
            ),
        })
    }
}

/// Inputs of one step shared by the per-column phases.
struct StepContext<'a> {
    prev_active_cells: &'a FxHashSet<usize>,
    prev_winner_cells: &'a [usize],
    num_active_potential: &'a [usize],
    learn: bool,
}

/// Implements the Temporal Memory algorithm which models the activation and learning of temporal sequences.
///
/// The Temporal Memory processes feed-forward input by activating columns and cells, predicting future activity
/// based on past patterns, and adapting synapse permanences through Hebbian-like learning rules. It operates in
/// discrete time steps and incorporates phases such as activating predicted cells, bursting columns without predictions,
/// and punishing erroneous predictions to gradually learn the temporal structure of the input data.
pub struct TemporalMemory;

impl TemporalMemory {
    /// Checks the Temporal Memory parameters and starts with an empty sequence state.
    pub fn init(c: &mut Connections) -> Result<()> {
        let p = c.params();
        if p.activation_threshold == 0 {
            return Err(HtmError::invalid("activation_threshold", "must be positive"));
        }
        if p.min_threshold == 0 {
            return Err(HtmError::invalid("min_threshold", "must be positive"));
        }

        debug!(
            "temporal memory initialized: {} columns x {} cells",
            c.num_columns(),
            c.cells_per_column()
        );
        c.clear_sequence_state();
        Ok(())
    }

    /// Executes one time step of the Temporal Memory algorithm.
    ///
    /// - Computes active and matching segments from the previous step's active cells.
    /// - Walks every column that is active or has active/matching segments in ascending order:
    ///   - **Activate:** an active column with active segments activates the cells owning them.
    ///   - **Burst:** an active column without active segments activates all its cells.
    ///   - **Punish:** an inactive column with matching segments weakens them (when learning).
    /// - Stores the new active/winner cells and the segments of this step in `c`.
    pub fn compute(
        c: &mut Connections,
        active_columns: &[usize],
        learn: bool,
    ) -> Result<ComputeCycle> {
        if let Some(&column) = active_columns.iter().find(|&&col| col >= c.num_columns()) {
            return Err(HtmError::ColumnOutOfRange {
                column,
                num_columns: c.num_columns(),
            });
        }

        let mut columns = active_columns.to_vec();
        columns.sort_unstable();
        columns.dedup();

        let prev_active_cells = std::mem::take(&mut c.active_cells);
        let mut prev_winner_cells = std::mem::take(&mut c.winner_cells);
        prev_winner_cells.sort_unstable();
        let prev_active_set: FxHashSet<usize> = prev_active_cells.iter().copied().collect();

        let activity = Self::activate_dendrites(c, &prev_active_cells, learn);
        let active_keys: Vec<usize> = activity
            .active
            .iter()
            .map(|&seg| c.column_for_segment(seg))
            .collect();
        let matching_keys: Vec<usize> = activity
            .matching
            .iter()
            .map(|&seg| c.column_for_segment(seg))
            .collect();
        let ordinals: Vec<u64> = (0..c.segment_flat_list_length())
            .map(|seg| c.segment(seg).ordinal)
            .collect();

        let ctx = StepContext {
            prev_active_cells: &prev_active_set,
            prev_winner_cells: &prev_winner_cells,
            num_active_potential: &activity.num_active_potential,
            learn,
        };

        let mut cycle = ComputeCycle::default();
        let mut num_bursting = 0;

        for excited in ExcitedColumns::new(&columns, &active_keys, &matching_keys) {
            let active_segments = &activity.active[excited.active_segments];
            let matching_segments = &activity.matching[excited.matching_segments];

            if excited.is_active {
                if !active_segments.is_empty() {
                    cycle.predicted_active_columns.push(excited.column);
                    Self::activate_predicted_column(c, &mut cycle, active_segments, &ctx);
                } else {
                    num_bursting += 1;
                    Self::burst_column(c, &mut cycle, excited.column, matching_segments, &ctx);
                }
            } else if learn {
                Self::punish_predicted_column(c, matching_segments, &prev_active_set);
            }
        }

        // Segments destroyed during learning, or whose slot was reused, are no longer part of this step.
        let still_alive = |c: &Connections, segments: &[SegmentIdx]| -> Vec<SegmentIdx> {
            segments
                .iter()
                .copied()
                .filter(|&seg| c.is_segment_alive(seg) && c.segment(seg).ordinal == ordinals[seg])
                .collect()
        };
        cycle.active_segments = still_alive(&*c, &activity.active);
        cycle.matching_segments = still_alive(&*c, &activity.matching);

        c.active_cells.clone_from(&cycle.active_cells);
        c.winner_cells.clone_from(&cycle.winner_cells);
        c.active_segments.clone_from(&cycle.active_segments);
        c.matching_segments.clone_from(&cycle.matching_segments);

        cycle.predictive_cells = Self::predictive_cells(c);

        trace!(
            "tm: {} active columns, {} bursting, {} active cells, {} predictive cells, {} segments",
            columns.len(),
            num_bursting,
            cycle.active_cells.len(),
            cycle.predictive_cells.len(),
            c.num_segments()
        );

        Ok(cycle)
    }

    /// Computes segment activity against `prev_active_cells`. When learning, the active segments
    /// are marked as used in the current iteration, then the iteration counter advances.
    fn activate_dendrites(
        c: &mut Connections,
        prev_active_cells: &[usize],
        learn: bool,
    ) -> SegmentActivity {
        let p = c.params();
        let activity = c.compute_activity(
            prev_active_cells,
            p.connected_permanence,
            p.activation_threshold,
            0.0,
            p.min_threshold,
        );

        if learn {
            for &segment in &activity.active {
                c.record_segment_activity(segment);
            }
            c.tm_iteration += 1;
        }
        activity
    }

    /// The cells that the current active cells predict for the next step, ascending.
    /// Nothing is modified.
    pub fn predictive_cells(c: &Connections) -> Vec<usize> {
        let p = c.params();
        let activity = c.compute_activity(
            c.active_cells(),
            p.connected_permanence,
            p.activation_threshold,
            0.0,
            p.min_threshold,
        );

        let mut cells: Vec<usize> = activity
            .active
            .iter()
            .map(|&seg| c.cell_for_segment(seg))
            .collect();
        cells.dedup();
        cells
    }

    /// Signals a sequence boundary: the next step starts without previous active or winner cells,
    /// so nothing is predicted and nothing learns from the previous sequence.
    pub fn reset(c: &mut Connections) {
        trace!("tm reset");
        c.clear_sequence_state();
    }

    /// Activates cells in a column that were predicted in the previous time step:
    /// - Every cell owning one of the column's active segments becomes active and a winner.
    ///
    /// If learning is enabled, for each active segment:
    /// - Reinforces synapses to previously active cells and weakens the others.
    /// - Grows synapses to previous winner cells until the segment has `max_new_synapse_count`
    ///   active potential synapses.
    fn activate_predicted_column(
        c: &mut Connections,
        cycle: &mut ComputeCycle,
        active_segments: &[SegmentIdx],
        ctx: &StepContext<'_>,
    ) {
        let p = c.params();
        let (increment, decrement) = (p.permanence_increment, p.permanence_decrement);
        let max_new = p.max_new_synapse_count;

        for &segment in active_segments {
            let cell = c.cell_for_segment(segment);
            if cycle.active_cells.last() != Some(&cell) {
                cycle.active_cells.push(cell);
                cycle.winner_cells.push(cell);
            }

            if ctx.learn {
                Self::adapt_segment(c, segment, ctx.prev_active_cells, increment, decrement);

                let n_grow = max_new.saturating_sub(ctx.num_active_potential[segment]);
                if n_grow > 0 && c.is_segment_alive(segment) {
                    Self::grow_synapses(c, segment, ctx.prev_winner_cells, n_grow);
                }
            }
        }
    }

    /// Bursts a column when no cell in the column was predicted to become active:
    /// - Marks all cells in the column as active.
    /// - With matching segments, the one with the most active potential synapses picks the winner
    ///   cell (the first one wins ties). It is adapted and grows new synapses when learning.
    /// - Otherwise the least used cell wins, and when learning a new segment connected to the
    ///   previous winner cells is grown on it.
    fn burst_column(
        c: &mut Connections,
        cycle: &mut ComputeCycle,
        column: usize,
        matching_segments: &[SegmentIdx],
        ctx: &StepContext<'_>,
    ) {
        cycle.active_cells.extend(c.column(column).cells());

        let p = c.params();
        let (increment, decrement) = (p.permanence_increment, p.permanence_decrement);
        let max_new = p.max_new_synapse_count;

        let best_matching = matching_segments.iter().copied().reduce(|best, seg| {
            if ctx.num_active_potential[seg] > ctx.num_active_potential[best] {
                seg
            } else {
                best
            }
        });

        let winner = match best_matching {
            Some(segment) => {
                let cell = c.cell_for_segment(segment);
                if ctx.learn {
                    Self::adapt_segment(c, segment, ctx.prev_active_cells, increment, decrement);

                    let n_grow = max_new.saturating_sub(ctx.num_active_potential[segment]);
                    if n_grow > 0 && c.is_segment_alive(segment) {
                        Self::grow_synapses(c, segment, ctx.prev_winner_cells, n_grow);
                    }
                }
                cell
            }
            None => {
                let cell = Self::least_used_cell(c, column);
                if ctx.learn {
                    let n_grow = max_new.min(ctx.prev_winner_cells.len());
                    if n_grow > 0 {
                        let segment = c.create_segment(cell);
                        Self::grow_synapses(c, segment, ctx.prev_winner_cells, n_grow);
                    }
                }
                cell
            }
        };

        cycle.winner_cells.push(winner);
    }

    /// Punishes segments in a column that were predicted (matching) but did not become active:
    /// synapses to previously active cells lose `predicted_segment_decrement`.
    fn punish_predicted_column(
        c: &mut Connections,
        matching_segments: &[SegmentIdx],
        prev_active_cells: &FxHashSet<usize>,
    ) {
        let decrement = c.params().predicted_segment_decrement;
        if decrement <= 0.0 {
            return;
        }

        for &segment in matching_segments {
            Self::adapt_segment(c, segment, prev_active_cells, -decrement, 0.0);
        }
    }

    /// Adds `increment` to synapses from previously active cells and subtracts `decrement` from the rest.
    /// Permanences are capped at 1.0. Synapses that fall below a tiny minimum are destroyed,
    /// and so is the segment if it has no synapses left.
    pub fn adapt_segment(
        c: &mut Connections,
        segment: SegmentIdx,
        prev_active_cells: &FxHashSet<usize>,
        increment: f64,
        decrement: f64,
    ) {
        for synapse in c.synapses_for_segment(segment).to_vec() {
            let data = c.synapse(synapse);
            let mut permanence = data.permanence;
            if prev_active_cells.contains(&data.presynaptic_cell) {
                permanence += increment;
            } else {
                permanence -= decrement;
            }

            permanence = permanence.min(1.0);
            if permanence < MIN_PERMANENCE {
                c.destroy_synapse(synapse);
            } else {
                c.update_synapse_permanence(synapse, permanence);
            }
        }

        if c.num_synapses_on_segment(segment) == 0 {
            c.destroy_segment(segment);
        }
    }

    /// Identifies the cell with the fewest segments within a column.
    /// If multiple cells have the same minimum count, one is chosen at random.
    pub fn least_used_cell(c: &mut Connections, column: usize) -> usize {
        let cells = c.column(column).cells();
        let fewest = cells
            .clone()
            .map(|cell| c.num_segments_on_cell(cell))
            .min()
            .unwrap_or(0);
        let least_used: Vec<usize> = cells
            .filter(|&cell| c.num_segments_on_cell(cell) == fewest)
            .collect();

        least_used[c.rng.random_range(0..least_used.len())]
    }

    /// Grows up to `n_desired` new synapses on `segment` to previous winner cells it is not yet connected to.
    ///
    /// - Candidates are the previous winners in ascending order, with the already connected ones
    ///   swapped out to the end of the list, visiting the segment's synapses in order.
    /// - If the segment would exceed `max_synapses_per_segment`, its weakest synapses to non-candidates are destroyed first.
    /// - New presynaptic cells are drawn uniformly from the shrinking eligible prefix (a partial Fisher–Yates shuffle).
    pub fn grow_synapses(
        c: &mut Connections,
        segment: SegmentIdx,
        prev_winner_cells: &[usize],
        n_desired: usize,
    ) {
        let mut candidates = prev_winner_cells.to_vec();
        candidates.sort_unstable();

        let mut eligible = candidates.len();
        for presynaptic in c.presynaptic_cells_for_segment(segment) {
            if let Some(index) = candidates[..eligible]
                .iter()
                .position(|&cell| cell == presynaptic)
            {
                candidates.swap(index, eligible - 1);
                eligible -= 1;
            }
        }

        let max_synapses = c.params().max_synapses_per_segment;
        let mut n_actual = n_desired.min(eligible);

        let overrun = (c.num_synapses_on_segment(segment) + n_actual).saturating_sub(max_synapses);
        if overrun > 0 {
            Self::destroy_min_permanence_synapses(c, segment, overrun, prev_winner_cells);
        }
        n_actual = n_actual.min(max_synapses.saturating_sub(c.num_synapses_on_segment(segment)));

        let initial_permanence = c.params().initial_permanence;
        for _ in 0..n_actual {
            let pick = c.rng.random_range(0..eligible);
            c.create_synapse(segment, candidates[pick], initial_permanence);
            candidates[pick] = candidates[eligible - 1];
            eligible -= 1;
        }
    }

    /// Destroys the `n_destroy` weakest synapses of a segment whose presynaptic cell is not in `exclude`.
    /// Equal permanences are destroyed in synapse creation order.
    fn destroy_min_permanence_synapses(
        c: &mut Connections,
        segment: SegmentIdx,
        n_destroy: usize,
        exclude: &[usize],
    ) {
        let exclude: FxHashSet<usize> = exclude.iter().copied().collect();
        let mut destroy_candidates: Vec<_> = c
            .synapses_for_segment(segment)
            .iter()
            .copied()
            .filter(|&syn| !exclude.contains(&c.synapse(syn).presynaptic_cell))
            .collect();
        destroy_candidates
            .sort_by(|&a, &b| c.synapse(a).permanence.total_cmp(&c.synapse(b).permanence));

        for synapse in destroy_candidates.into_iter().take(n_destroy) {
            c.destroy_synapse(synapse);
        }
    }
}
