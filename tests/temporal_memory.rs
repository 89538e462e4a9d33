//! Temporal Memory sequence learning through the public API.
//!
//! Run with: `cargo test --test temporal_memory`

use anyhow::Result;
use htm_core::core::{
    compute_raw_anomaly_score, Column, ComputeCycle, Connections, Parameters, SpatialPooler,
    TemporalMemory,
};

const CELLS_PER_COLUMN: usize = 8;

fn region(seed: u64) -> Result<Connections> {
    let mut c = Connections::new(Parameters {
        input_dimensions: vec![50],
        column_dimensions: vec![50],
        cells_per_column: CELLS_PER_COLUMN,
        activation_threshold: 3,
        min_threshold: 2,
        max_new_synapse_count: 5,
        initial_permanence: 0.21,
        connected_permanence: 0.5,
        permanence_increment: 0.1,
        permanence_decrement: 0.1,
        predicted_segment_decrement: 0.0,
        seed,
        ..Default::default()
    })?;
    TemporalMemory::init(&mut c)?;
    Ok(c)
}

fn sequence() -> Vec<Vec<usize>> {
    (0..4).map(|i| (i * 5..i * 5 + 5).collect()).collect()
}

fn train(c: &mut Connections, repetitions: usize) -> Result<()> {
    for _ in 0..repetitions {
        for columns in sequence() {
            TemporalMemory::compute(c, &columns, true)?;
        }
        TemporalMemory::reset(c);
    }
    Ok(())
}

fn predictive_columns(cycle: &ComputeCycle) -> Vec<usize> {
    cycle.predictive_columns(CELLS_PER_COLUMN)
}

// ============================================================================
// Sequence learning
// ============================================================================

#[test]
fn predicts_every_transition_after_training() -> Result<()> {
    let mut c = region(42)?;
    train(&mut c, 10)?;

    let steps = sequence();
    let first = TemporalMemory::compute(&mut c, &steps[0], false)?;
    assert!(first.predicted_active_columns.is_empty());
    assert_eq!(first.active_cells.len(), 5 * CELLS_PER_COLUMN);
    assert_eq!(predictive_columns(&first), steps[1]);

    for i in 1..steps.len() {
        let cycle = TemporalMemory::compute(&mut c, &steps[i], false)?;
        assert_eq!(cycle.predicted_active_columns, steps[i]);
        assert_eq!(cycle.active_cells.len(), steps[i].len());
        let expected_next = steps.get(i + 1).cloned().unwrap_or_default();
        assert_eq!(predictive_columns(&cycle), expected_next);
    }
    Ok(())
}

#[test]
fn anomaly_drops_once_the_sequence_is_learned() -> Result<()> {
    let mut untrained = region(1)?;
    let mut trained = region(1)?;
    train(&mut trained, 10)?;

    let steps = sequence();
    let score = |c: &mut Connections| -> Result<f64> {
        let mut predicted = Vec::new();
        let mut total = 0.0;
        for columns in &steps[..3] {
            let cycle = TemporalMemory::compute(c, columns, false)?;
            total += compute_raw_anomaly_score(columns, &predicted);
            predicted = predictive_columns(&cycle);
        }
        Ok(total)
    };

    // The first element of a sequence is always unexpected.
    assert_eq!(score(&mut untrained)?, 3.0);
    assert_eq!(score(&mut trained)?, 1.0);
    Ok(())
}

#[test]
fn reset_forgets_the_context() -> Result<()> {
    let mut c = region(7)?;
    train(&mut c, 10)?;
    let steps = sequence();

    TemporalMemory::compute(&mut c, &steps[0], false)?;
    TemporalMemory::reset(&mut c);
    assert!(c.active_cells().is_empty());
    assert!(c.winner_cells().is_empty());

    let cycle = TemporalMemory::compute(&mut c, &steps[1], false)?;
    assert!(cycle.predicted_active_columns.is_empty());
    assert_eq!(cycle.active_cells.len(), 5 * CELLS_PER_COLUMN);
    Ok(())
}

#[test]
fn inference_does_not_change_the_region() -> Result<()> {
    let mut c = region(3)?;
    train(&mut c, 5)?;
    let segments = c.num_segments();
    let synapses = c.num_synapses();

    for columns in sequence() {
        TemporalMemory::compute(&mut c, &columns, false)?;
    }
    assert_eq!(c.num_segments(), segments);
    assert_eq!(c.num_synapses(), synapses);
    Ok(())
}

// ============================================================================
// Invariants of a single step
// ============================================================================

#[test]
fn burst_without_history_grows_nothing() -> Result<()> {
    let mut c = region(5)?;
    let cycle = TemporalMemory::compute(&mut c, &[3], true)?;

    assert_eq!(cycle.active_cells, Column::new(3, CELLS_PER_COLUMN).cells().collect::<Vec<_>>());
    assert_eq!(cycle.winner_cells.len(), 1);
    assert_eq!(c.num_segments(), 0);
    assert!(cycle.predictive_cells.is_empty());
    Ok(())
}

#[test]
fn active_cells_belong_to_active_columns() -> Result<()> {
    let mut c = region(9)?;
    train(&mut c, 6)?;

    for columns in sequence() {
        let cycle = TemporalMemory::compute(&mut c, &columns, true)?;
        for &cell in &cycle.active_cells {
            assert!(columns.contains(&c.column_for_cell(cell)));
        }
        for &cell in &cycle.winner_cells {
            assert!(cycle.active_cells.contains(&cell));
        }
        for column in &columns {
            let winners = cycle
                .winner_cells
                .iter()
                .filter(|&&cell| c.column_for_cell(cell) == *column)
                .count();
            assert!(winners >= 1);
        }
    }
    Ok(())
}

#[test]
fn same_seed_same_cycles() -> Result<()> {
    let mut a = region(11)?;
    let mut b = region(11)?;
    for _ in 0..4 {
        for columns in sequence() {
            assert_eq!(
                TemporalMemory::compute(&mut a, &columns, true)?,
                TemporalMemory::compute(&mut b, &columns, true)?
            );
        }
    }
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn out_of_range_column_is_rejected() -> Result<()> {
    let mut c = region(2)?;
    assert!(TemporalMemory::compute(&mut c, &[50], true).is_err());
    assert!(c.active_cells().is_empty());
    Ok(())
}

// ============================================================================
// Spatial Pooler feeding the Temporal Memory
// ============================================================================

#[test]
fn pooler_output_drives_the_memory() -> Result<()> {
    let mut c = Connections::new(Parameters {
        input_dimensions: vec![60],
        column_dimensions: vec![120],
        cells_per_column: 4,
        potential_radius: 8,
        global_inhibition: true,
        num_active_columns_per_inh_area: 6,
        activation_threshold: 3,
        min_threshold: 2,
        max_new_synapse_count: 6,
        seed: 21,
        ..Default::default()
    })?;
    SpatialPooler::init(&mut c)?;
    TemporalMemory::init(&mut c)?;

    let inputs: Vec<Vec<bool>> = (0..3)
        .map(|k| (0..60).map(|i| (k * 20..k * 20 + 10).contains(&i)).collect())
        .collect();
    let mut active_array = vec![false; 120];

    for _ in 0..30 {
        for input in &inputs {
            let columns = SpatialPooler::compute(&mut c, input, &mut active_array, true)?;
            let cycle = TemporalMemory::compute(&mut c, &columns, true)?;
            assert!(cycle.active_cells.len() >= columns.len());
            assert!(cycle.active_cells.len() <= columns.len() * 4);
        }
    }
    assert!(c.num_segments() > 0);
    Ok(())
}
