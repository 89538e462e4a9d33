//! Spatial Pooler behavior through the public API.
//!
//! Run with: `cargo test --test spatial_pooler`

use anyhow::Result;
use htm_core::core::{Connections, Parameters, SpatialPooler};
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn pattern(num_inputs: usize, active: std::ops::Range<usize>) -> Vec<bool> {
    (0..num_inputs).map(|i| active.contains(&i)).collect()
}

fn run(c: &mut Connections, input: &[bool], learn: bool) -> Result<Vec<usize>> {
    let mut active = vec![false; c.num_columns()];
    Ok(SpatialPooler::compute(c, input, &mut active, learn)?)
}

fn overlap_fraction(a: &[usize], b: &[usize]) -> f64 {
    let shared = a.iter().filter(|col| b.contains(col)).count();
    shared as f64 / a.len().max(b.len()).max(1) as f64
}

#[test]
fn learns_stable_distinct_representations() -> Result<()> {
    let mut c = Connections::new(Parameters {
        input_dimensions: vec![50],
        column_dimensions: vec![100],
        potential_radius: 5,
        potential_pct: 1.0,
        global_inhibition: true,
        num_active_columns_per_inh_area: 10,
        wrap_around: false,
        seed: 1956,
        ..Default::default()
    })?;
    SpatialPooler::init(&mut c)?;

    let inputs = [pattern(50, 0..10), pattern(50, 10..20), pattern(50, 20..30)];

    for i in 0..500 {
        run(&mut c, &inputs[i % 3], true)?;
    }

    let mut representations = Vec::new();
    for input in &inputs {
        let first = run(&mut c, input, false)?;
        let second = run(&mut c, input, false)?;
        assert_eq!(first, second, "representation changed between presentations");
        assert!(!first.is_empty());
        representations.push(first);
    }

    for i in 0..3 {
        for j in i + 1..3 {
            let overlap = overlap_fraction(&representations[i], &representations[j]);
            assert!(
                overlap < 0.2,
                "inputs {i} and {j} share {overlap} of their columns: {:?} / {:?}",
                representations[i],
                representations[j]
            );
        }
    }
    Ok(())
}

#[test]
fn same_seed_same_columns() -> Result<()> {
    let params = Parameters {
        input_dimensions: vec![40],
        column_dimensions: vec![80],
        potential_radius: 10,
        global_inhibition: false,
        num_active_columns_per_inh_area: 4,
        update_period: 10,
        seed: 7,
        ..Default::default()
    };

    let mut a = Connections::new(params.clone())?;
    let mut b = Connections::new(params)?;
    SpatialPooler::init(&mut a)?;
    SpatialPooler::init(&mut b)?;

    let mut inputs = StdRng::seed_from_u64(99);
    for _ in 0..60 {
        let input: Vec<bool> = (0..40).map(|_| inputs.random_bool(0.2)).collect();
        assert_eq!(run(&mut a, &input, true)?, run(&mut b, &input, true)?);
    }
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn different_seeds_build_different_pools() -> Result<()> {
    let params = Parameters {
        input_dimensions: vec![40],
        column_dimensions: vec![80],
        seed: 1,
        ..Default::default()
    };
    let mut a = Connections::new(params.clone())?;
    let mut b = Connections::new(Parameters { seed: 2, ..params })?;
    SpatialPooler::init(&mut a)?;
    SpatialPooler::init(&mut b)?;

    let differs = (0..80).any(|col| a.proximal_permanences(col) != b.proximal_permanences(col));
    assert!(differs);
    Ok(())
}

#[test]
fn local_inhibition_on_a_2d_sheet() -> Result<()> {
    let mut c = Connections::new(Parameters {
        input_dimensions: vec![16, 16],
        column_dimensions: vec![16, 16],
        potential_radius: 3,
        global_inhibition: false,
        num_active_columns_per_inh_area: 3,
        seed: 3,
        ..Default::default()
    })?;
    SpatialPooler::init(&mut c)?;
    assert!(c.inhibition_radius() >= 1);

    let mut inputs = StdRng::seed_from_u64(5);
    for _ in 0..20 {
        let input: Vec<bool> = (0..256).map(|_| inputs.random_bool(0.1)).collect();
        let active = run(&mut c, &input, true)?;
        assert!(!active.is_empty());
        assert!(active.len() < 256 / 2);
        assert!(active.windows(2).all(|w| w[0] < w[1]));
    }
    Ok(())
}

#[test]
fn duty_cycles_and_boosts_stay_in_range() -> Result<()> {
    let mut c = Connections::new(Parameters {
        input_dimensions: vec![32],
        column_dimensions: vec![64],
        global_inhibition: true,
        num_active_columns_per_inh_area: 5,
        update_period: 5,
        seed: 11,
        ..Default::default()
    })?;
    SpatialPooler::init(&mut c)?;

    let mut inputs = StdRng::seed_from_u64(12);
    for _ in 0..40 {
        let input: Vec<bool> = (0..32).map(|_| inputs.random_bool(0.3)).collect();
        run(&mut c, &input, true)?;
    }

    let max_boost = c.params().max_boost;
    for col in 0..64 {
        assert!((0.0..=1.0).contains(&c.overlap_duty_cycles()[col]));
        assert!((0.0..=1.0).contains(&c.active_duty_cycles()[col]));
        let boost = c.boost_factors()[col];
        assert!((1.0..=max_boost).contains(&boost), "boost {boost}");
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn global_inhibition_selects_top_k(
        k in 1usize..10,
        bits in prop::collection::vec(any::<bool>(), 32),
    ) {
        let mut c = Connections::new(Parameters {
            input_dimensions: vec![32],
            column_dimensions: vec![64],
            global_inhibition: true,
            num_active_columns_per_inh_area: k,
            seed: 17,
            ..Default::default()
        }).unwrap();
        SpatialPooler::init(&mut c).unwrap();

        let active = run(&mut c, &bits, true).unwrap();
        prop_assert!(active.len() <= k);

        let boosted = c.boosted_overlaps();
        let weakest_winner = active.iter().map(|&col| boosted[col]).fold(f64::INFINITY, f64::min);
        for col in (0..64).filter(|col| !active.contains(col)) {
            prop_assert!(boosted[col] <= weakest_winner);
        }
    }

    #[test]
    fn permanences_stay_bounded_and_trimmed(
        seed in 0u64..1000,
        steps in 1usize..25,
    ) {
        let mut c = Connections::new(Parameters {
            input_dimensions: vec![24],
            column_dimensions: vec![48],
            potential_radius: 6,
            global_inhibition: seed % 2 == 0,
            num_active_columns_per_inh_area: 4,
            update_period: 7,
            seed,
            ..Default::default()
        }).unwrap();
        SpatialPooler::init(&mut c).unwrap();

        let mut inputs = StdRng::seed_from_u64(seed);
        let p = c.params().clone();
        for _ in 0..steps {
            let input: Vec<bool> = (0..24).map(|_| inputs.random_bool(0.25)).collect();
            run(&mut c, &input, true).unwrap();

            for col in 0..48 {
                for (_, perm) in c.proximal_permanences(col) {
                    prop_assert!(perm >= p.syn_perm_min && perm <= p.syn_perm_max);
                    prop_assert!(perm == 0.0 || perm > p.syn_perm_trim_threshold);
                }
            }
        }
    }
}
