use hypothesis_lab::models::StopReason;
use hypothesis_lab::supervisor::{is_plateau, StopPolicy};
use proptest::prelude::*;

fn aggregates(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..=10.0, 0..max_len)
}

proptest! {
    /// Property: a plateau is never detected before two completed iterations
    #[test]
    fn prop_no_plateau_before_two_iterations(
        first in prop::option::of(0.0f64..=10.0),
        threshold in 0.0f64..=10.0,
        window in 1usize..=10,
    ) {
        let history: Vec<f64> = first.into_iter().collect();
        prop_assert!(!is_plateau(&history, threshold, window));
    }

    /// Property: without a threshold the policy stops exactly at max_iterations
    #[test]
    fn prop_exhaustion_only_at_cap(
        history in aggregates(30),
        max_iterations in 1usize..=20,
    ) {
        let policy = StopPolicy { max_iterations, threshold: None, window: 2 };
        let verdict = policy.evaluate(&history);
        if history.len() >= max_iterations {
            prop_assert_eq!(verdict, Some(StopReason::ExhaustedIterations));
        } else {
            prop_assert_eq!(verdict, None);
        }
    }

    /// Property: strictly improving histories by more than the threshold never plateau
    #[test]
    fn prop_steady_improvement_never_plateaus(
        start in 0.0f64..=1.0,
        step in 0.6f64..=1.0,
        len in 2usize..=9,
        window in 1usize..=5,
    ) {
        let history: Vec<f64> = (0..len).map(|i| start + step * i as f64).collect();
        prop_assert!(!is_plateau(&history, 0.5, window));
    }

    /// Property: a flat tail at least `window` deltas long is always a plateau
    #[test]
    fn prop_flat_tail_plateaus(
        prefix in aggregates(6),
        value in 0.0f64..=10.0,
        window in 1usize..=5,
        threshold in 0.01f64..=2.0,
    ) {
        let mut history = prefix;
        history.extend(std::iter::repeat(value).take(window + 1));
        prop_assert!(is_plateau(&history, threshold, window));
    }

    /// Property: evaluate only ever reports plateau or exhaustion
    #[test]
    fn prop_evaluate_reasons(
        history in aggregates(15),
        threshold in prop::option::of(0.0f64..=3.0),
        window in 1usize..=4,
    ) {
        let policy = StopPolicy { max_iterations: 10, threshold, window };
        match policy.evaluate(&history) {
            None | Some(StopReason::ExhaustedIterations) | Some(StopReason::Plateau) => {}
            Some(other) => prop_assert!(false, "unexpected stop reason {:?}", other),
        }
        if threshold.is_none() {
            prop_assert_ne!(policy.evaluate(&history), Some(StopReason::Plateau));
        }
    }
}
