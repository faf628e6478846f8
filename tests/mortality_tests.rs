use proptest::prelude::*;
use rstest::rstest;
use stockforge::config::{CategoryConfig, MeanWeightConfig, PenaltyConfig};
use stockforge::error::ConfigErrors;
use stockforge::model::partition::Partition;
use stockforge::penalties::Penalty;
use stockforge::processes::{BuildContext, ExecutionContext, MortalityEventBiomass, Process};
use stockforge::selectivities::Selectivity;

const YEAR: u32 = 2000;

struct Fishery {
    process: MortalityEventBiomass,
    partition: Partition,
    selectivities: Vec<Selectivity>,
    penalties: Vec<Penalty>,
}

impl Fishery {
    fn new(abundance: &[f64], catch: f64, u_max: f64) -> Self {
        let mut errors = ConfigErrors::new();
        let category = CategoryConfig {
            name: "stock".to_string(),
            min_age: 1,
            max_age: abundance.len() as u32,
            initial_abundance: abundance.to_vec(),
            mean_weight: MeanWeightConfig::Constant(vec![1.0; abundance.len()]),
        };
        let partition = Partition::from_config(&[category], 1, &mut errors);
        let selectivities = vec![Selectivity::constant("One", 1.0)];
        let penalties = vec![Penalty::new(
            &PenaltyConfig {
                label: "CatchPenalty".to_string(),
                multiplier: 1.0,
                log_scale: false,
            },
            &mut errors,
        )];

        let mut process = MortalityEventBiomass::new(
            "Fishing",
            &["stock".to_string()],
            &["One".to_string()],
            &[YEAR],
            &[catch],
            u_max,
            Some("CatchPenalty"),
            &[YEAR],
            &mut errors,
        )
        .expect("fishery should validate");

        let ctx = BuildContext {
            partition: &partition,
            selectivities: &selectivities,
            penalties: &penalties,
            model_years: &[YEAR],
        };
        process.build(&ctx, &mut errors);
        assert!(errors.is_empty(), "{}", errors);

        Self {
            process,
            partition,
            selectivities,
            penalties,
        }
    }

    fn run(&mut self, initialising: bool) {
        let mut ctx = ExecutionContext {
            year: YEAR,
            time_step: 0,
            initialising,
            selectivities: &self.selectivities,
            penalties: &mut self.penalties,
        };
        self.process.execute(&mut self.partition, &mut ctx);
    }

    fn abundance(&self) -> &[f64] {
        &self.partition.category(0).data
    }
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
}

#[test]
fn test_catch_equal_to_vulnerable_biomass_is_capped() {
    // 240 vulnerable, 240 requested: exploitation would be 1.0
    let mut fishery = Fishery::new(&[100.0, 80.0, 60.0], 240.0, 0.99);
    fishery.run(false);

    assert_close(fishery.process.exploitation_by_year()[&YEAR], 0.99);
    assert_close(fishery.process.actual_catches()[&YEAR], 237.6);

    let expected = [1.0, 0.8, 0.6];
    for (got, want) in fishery.abundance().iter().zip(expected) {
        assert_close(*got, want);
    }

    let flagged = fishery.penalties[0].flagged();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].source, "Fishing");
    assert_close(flagged[0].shortfall(), 0.01 * 240.0);
    assert_close(fishery.penalties[0].score(), 2.4 * 2.4);
}

#[test]
fn test_catch_below_cap_is_taken_in_full() {
    let mut fishery = Fishery::new(&[100.0, 80.0, 60.0], 120.0, 0.99);
    fishery.run(false);

    assert_close(fishery.process.exploitation_by_year()[&YEAR], 0.5);
    assert_close(fishery.process.actual_catches()[&YEAR], 120.0);
    for (got, want) in fishery.abundance().iter().zip([50.0, 40.0, 30.0]) {
        assert_close(*got, want);
    }
    assert!(fishery.penalties[0].flagged().is_empty());
}

#[test]
fn test_empty_partition_is_capped_not_divided_by_zero() {
    let mut fishery = Fishery::new(&[0.0, 0.0, 0.0], 10.0, 0.99);
    fishery.run(false);

    let u = fishery.process.exploitation_by_year()[&YEAR];
    assert!(u.is_finite());
    assert_close(u, 0.99);
    assert_close(fishery.process.actual_catches()[&YEAR], 0.0);
    assert!(fishery.abundance().iter().all(|n| *n == 0.0));
    assert_eq!(fishery.penalties[0].flagged().len(), 1);
}

#[test]
fn test_nothing_happens_while_initialising() {
    let mut fishery = Fishery::new(&[100.0, 80.0, 60.0], 120.0, 0.99);
    fishery.run(true);
    assert_eq!(fishery.abundance(), &[100.0, 80.0, 60.0]);
    assert!(fishery.process.actual_catches().is_empty());
}

#[test]
fn test_reset_clears_results() {
    let mut fishery = Fishery::new(&[100.0, 80.0, 60.0], 120.0, 0.99);
    fishery.run(false);
    fishery.process.reset();
    assert!(fishery.process.actual_catches().is_empty());
    assert!(fishery.process.exploitation_by_year().is_empty());
}

#[test]
fn test_report_lines() {
    let mut fishery = Fishery::new(&[100.0, 80.0, 60.0], 120.0, 0.99);
    fishery.run(false);
    let mut cache = String::new();
    fishery.process.fill_report_cache(&mut cache);
    assert!(cache.contains("years: 2000"));
    assert!(cache.contains("actual_catches: 120"));
    assert!(cache.contains("exploitation_rate: 0.5"));
}

#[rstest]
#[case(0.0)]
#[case(1.0)]
#[case(-0.1)]
#[case(1.5)]
fn test_u_max_outside_unit_interval_is_rejected(#[case] u_max: f64) {
    let mut errors = ConfigErrors::new();
    let built = MortalityEventBiomass::new(
        "Fishing",
        &["stock".to_string()],
        &["One".to_string()],
        &[YEAR],
        &[10.0],
        u_max,
        None,
        &[YEAR],
        &mut errors,
    );
    assert!(built.is_none());
    assert!(errors.to_string().contains("u_max"));
}

#[test]
fn test_configuration_problems_are_collected_together() {
    let mut errors = ConfigErrors::new();
    let built = MortalityEventBiomass::new(
        "Fishing",
        &["stock".to_string(), "other".to_string()],
        &["One".to_string()],
        &[YEAR, YEAR, 1900],
        &[10.0, -1.0],
        0.9,
        None,
        &[YEAR],
        &mut errors,
    );
    assert!(built.is_none());
    // selectivity count, catch count, duplicate year, year outside model, negative catch
    assert_eq!(errors.len(), 5, "{}", errors);
}

proptest! {
    #[test]
    fn prop_exploitation_never_exceeds_u_max(
        abundance in prop::collection::vec(0.0f64..1000.0, 1..6),
        catch in 0.001f64..5000.0,
        u_max in 0.05f64..0.99,
    ) {
        let mut fishery = Fishery::new(&abundance, catch, u_max);
        fishery.run(false);

        let u = fishery.process.exploitation_by_year()[&YEAR];
        prop_assert!(u >= 0.0);
        prop_assert!(u <= u_max + 1e-12);
        for (after, before) in fishery.abundance().iter().zip(&abundance) {
            prop_assert!(*after >= 0.0);
            prop_assert!(*after <= *before);
        }

        let taken = fishery.process.actual_catches()[&YEAR];
        prop_assert!(taken <= catch * (1.0 + 1e-12));
        prop_assert_eq!(fishery.penalties[0].flagged().is_empty(), taken == catch);
    }
}
