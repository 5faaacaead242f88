//! Property tests: TreeSHAP against brute-force Shapley enumeration on random
//! ensembles.

use proptest::prelude::*;

use aislow::testing::{brute_force_shapley, random_forest, random_population};
use aislow::{base_value, Parallelism, TreeExplainer};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn additive_and_matches_brute_force(
        seed in 0u64..10_000,
        n_features in 1usize..7,
        n_trees in 1usize..6,
        max_depth in 1usize..5,
        row in 0usize..32,
    ) {
        let forest = random_forest(seed, n_features, n_trees, max_depth);
        let population = random_population(seed ^ 0x5eed, forest.schema(), 32);
        let explainer = TreeExplainer::new(&forest, &population, Parallelism::Sequential).unwrap();

        let instance = population.row(row);
        let attribution = explainer.explain(&instance).unwrap();
        prop_assert!(
            attribution.is_exact(1e-3),
            "residual {} for seed {}",
            attribution.residual(),
            seed
        );

        let reference = brute_force_shapley(&forest, &population, &instance);
        for (feature, expected) in attribution.features().iter().zip(&reference) {
            prop_assert!((feature.impact - expected).abs() < 1e-6, "{}: {} vs {}", feature.name, feature.impact, expected);
        }
    }

    #[test]
    fn out_of_population_instances_are_exact(
        seed in 0u64..10_000,
        n_trees in 1usize..8,
    ) {
        let forest = random_forest(seed, 5, n_trees, 4);
        let population = random_population(seed, forest.schema(), 40);
        let other = random_population(seed.wrapping_add(1), forest.schema(), 4);
        let explainer = TreeExplainer::new(&forest, &population, Parallelism::Sequential).unwrap();

        for instance in other.rows() {
            let attribution = explainer.explain(&instance).unwrap();
            prop_assert!(attribution.is_exact(1e-3));
        }
    }

    #[test]
    fn parallel_matches_sequential(seed in 0u64..10_000) {
        let forest = random_forest(seed, 6, 12, 4);
        let population = random_population(seed, forest.schema(), 24);
        let sequential = TreeExplainer::new(&forest, &population, Parallelism::Sequential).unwrap();
        let parallel = TreeExplainer::new(&forest, &population, Parallelism::Parallel).unwrap();

        let instance = population.row((seed % 24) as usize);
        prop_assert_eq!(
            sequential.explain(&instance).unwrap(),
            parallel.explain(&instance).unwrap()
        );
    }
}

#[test]
fn base_value_is_population_mean() {
    let forest = random_forest(3, 4, 10, 3);
    let population = random_population(4, forest.schema(), 50);
    let mean = population
        .rows()
        .map(|r| forest.predict(&r).unwrap())
        .sum::<f64>()
        / population.n_samples() as f64;
    approx::assert_abs_diff_eq!(base_value(&forest, &population).unwrap(), mean, epsilon = 1e-9);
}
