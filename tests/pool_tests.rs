mod common;

use proptest::prelude::*;
use stockforge::model::RunMode;
use stockforge::threadpool::{CandidateEvaluator, EvaluationPool, Worker};

fn sequential_scores(candidates: &[Vec<f64>]) -> Vec<f64> {
    let mut model = common::model(RunMode::Estimation);
    model.evaluate_batch(candidates)
}

#[test]
fn test_batch_larger_than_pool_keeps_submission_order() {
    let candidates = common::r0_candidates(10);
    let expected = sequential_scores(&candidates);

    let mut pool = EvaluationPool::new(common::models(RunMode::Estimation, 3)).unwrap();
    assert_eq!(pool.size(), 3);
    assert_eq!(pool.active_threads(), 3);

    let scores = pool.run_batch(&candidates);
    assert_eq!(scores.len(), 10);
    for (got, want) in scores.iter().zip(&expected) {
        assert_eq!(got.to_bits(), want.to_bits(), "pool score {} != {}", got, want);
    }

    let evaluations: u64 = pool.workers().iter().map(|w| w.evaluations()).sum();
    assert_eq!(evaluations, 10);

    pool.terminate_all();
    assert_eq!(pool.active_threads(), 0);
}

#[test]
fn test_batch_smaller_than_pool() {
    let candidates = common::r0_candidates(2);
    let expected = sequential_scores(&candidates);

    let mut pool = EvaluationPool::new(common::models(RunMode::Estimation, 4)).unwrap();
    let scores = pool.run_batch(&candidates);
    assert_eq!(scores, expected);
}

#[test]
fn test_empty_batch() {
    let mut pool = EvaluationPool::new(common::models(RunMode::Estimation, 2)).unwrap();
    assert!(pool.run_batch(&[]).is_empty());
}

#[test]
fn test_pool_is_reusable_across_batches() {
    let mut pool = EvaluationPool::new(common::models(RunMode::Estimation, 2)).unwrap();
    let first = pool.run_batch(&common::r0_candidates(5));
    let second = pool.run_batch(&common::r0_candidates(5));
    assert_eq!(first, second);
}

#[test]
fn test_terminate_all_is_idempotent() {
    let mut pool = EvaluationPool::new(common::models(RunMode::Estimation, 2)).unwrap();
    pool.terminate_all();
    pool.terminate_all();
    assert_eq!(pool.active_threads(), 0);
}

#[test]
fn test_shutdown_through_evaluator_trait() {
    let mut evaluator: Box<dyn CandidateEvaluator> =
        Box::new(EvaluationPool::new(common::models(RunMode::Estimation, 2)).unwrap());
    let scores = evaluator.evaluate_batch(&common::r0_candidates(3));
    assert_eq!(scores.len(), 3);
    evaluator.shutdown();
}

#[test]
fn test_worker_idle_protocol() {
    let mut worker = Worker::launch(1, common::model(RunMode::Estimation)).unwrap();
    assert!(worker.is_idle());

    let candidate = common::r0_candidates(1).remove(0);
    let expected = sequential_scores(std::slice::from_ref(&candidate))[0];

    worker.submit(candidate);
    // Busy is set before submit returns.
    assert!(!worker.is_idle());
    let score = worker.wait_until_idle();
    assert!(worker.is_idle());
    assert_eq!(score, expected);
    assert_eq!(worker.score(), expected);
    assert_eq!(worker.evaluations(), 1);

    worker.terminate();
    assert!(worker.join());
    assert!(worker.is_joined());
    assert!(!worker.join());
}

#[test]
#[should_panic(expected = "terminated abnormally")]
fn test_faulted_worker_is_reported() {
    let worker = Worker::launch(1, common::model(RunMode::Estimation)).unwrap();
    // Two values for a model with one estimate panics inside the worker thread.
    worker.submit(vec![1.0, 2.0]);
    worker.wait_until_idle();
}

#[test]
#[should_panic(expected = "terminated abnormally")]
fn test_pool_surfaces_worker_fault() {
    let mut pool = EvaluationPool::new(common::models(RunMode::Estimation, 2)).unwrap();
    pool.run_batch(&[vec![7.0], vec![1.0, 2.0], vec![6.0]]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_scores_follow_candidates(
        values in prop::collection::vec(4.7f64..9.2, 1..12),
        threads in 1usize..5
    ) {
        let candidates: Vec<Vec<f64>> = values.iter().map(|v| vec![*v]).collect();
        let expected = sequential_scores(&candidates);

        let mut pool = EvaluationPool::new(common::models(RunMode::Estimation, threads)).unwrap();
        let scores = pool.run_batch(&candidates);
        pool.terminate_all();

        prop_assert_eq!(scores.len(), expected.len());
        for (got, want) in scores.iter().zip(&expected) {
            prop_assert_eq!(got.to_bits(), want.to_bits());
        }
        prop_assert_eq!(pool.active_threads(), 0);
    }
}
