use mpp_core::Extent;
use mpp_kernel::{
    birth_accept_prob, death_accept_prob, BirthDeathProbs, KernelProposer, KernelWeights,
    SamplerConfig,
};
use proptest::prelude::*;

fn every_kernel() -> KernelProposer {
    let config = SamplerConfig {
        kernels: KernelWeights {
            birth: 1,
            death: 1,
            birth_and_kill: 1,
            merge: 1,
            split: 1,
            exchange: 1,
            replace: 1,
        },
        ..SamplerConfig::default()
    };
    KernelProposer::from_config(&config)
}

fn any_ratio() -> impl Strategy<Value = f64> {
    prop_oneof![
        0.0f64..10.0,
        Just(0.0),
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        Just(f64::MAX),
        -5.0f64..0.0,
    ]
}

proptest! {
    #[test]
    fn every_kernel_returns_a_probability(
        existing in 0usize..40,
        proposed in 0usize..40,
        intensity in 0.0f64..2.0,
        x in 1usize..64,
        y in 1usize..64,
        ratio in any_ratio(),
    ) {
        let mut kernels = every_kernel();
        let extent = Extent::planar(x, y);
        let p = kernels
            .initial_mut()
            .calc_accept_prob(existing, proposed, intensity, &extent, ratio);
        prop_assert!((0.0..=1.0).contains(&p));
        for index in 0..kernels.len() {
            let kernel = kernels.kernel_mut(index).expect("kernel");
            let p = kernel.calc_accept_prob(existing, proposed, intensity, &extent, ratio);
            prop_assert!((0.0..=1.0).contains(&p), "{} gave {}", kernel.kind(), p);
        }
    }

    #[test]
    fn birth_death_formulas_stay_bounded_for_any_asymmetry(
        prob_birth in 0.0f64..=1.0,
        prob_death in 0.0f64..=1.0,
        size in 0usize..100,
        intensity in 0.0f64..1.0,
        ratio in any_ratio(),
    ) {
        let probs = BirthDeathProbs { prob_birth, prob_death };
        let extent = Extent::planar(32, 32);
        let up = birth_accept_prob(&probs, size, intensity, &extent, ratio);
        let down = death_accept_prob(&probs, size, intensity, &extent, ratio);
        prop_assert!((0.0..=1.0).contains(&up));
        prop_assert!((0.0..=1.0).contains(&down));
    }
}

#[test]
fn every_kernel_kind_is_registered() {
    let kernels = every_kernel();
    assert_eq!(kernels.len(), 7);
}
