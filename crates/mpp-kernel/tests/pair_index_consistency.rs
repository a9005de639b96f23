mod common;

use common::{cfg_nrg, disc, stack, Harness};
use mpp_kernel::{KernelProposer, KernelWeights, PairCollection, SamplerConfig};
use mpp_mark::{ContrastOverlapEnergy, NrgContext};
use proptest::prelude::*;

fn all_kernels() -> KernelProposer {
    KernelProposer::from_config(&SamplerConfig {
        kernels: KernelWeights {
            birth: 1,
            death: 1,
            birth_and_kill: 1,
            merge: 2,
            split: 1,
            exchange: 2,
            replace: 1,
        },
        ..SamplerConfig::default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn accepting_every_proposal_keeps_the_index_exact(seed in any::<u64>()) {
        let stack = stack();
        let scheme = ContrastOverlapEnergy::default();
        let nrg = NrgContext::new(&stack, &scheme);
        let mut state = cfg_nrg(
            vec![
                disc(0, 12.0, 12.0, 4.0),
                disc(1, 15.0, 13.0, 3.0),
                disc(2, 34.0, 30.0, 5.0),
                disc(3, 36.0, 33.0, 4.0),
            ],
            nrg,
        );
        let mut harness = Harness::new(seed);
        harness.init(&state, nrg);
        let mut kernels = all_kernels();

        for _ in 0..40 {
            let index = kernels.select(&mut harness.rng).expect("kernel");
            let kernel = kernels.kernel_mut(index).expect("kernel");
            let outcome = harness.propose(kernel, Some(&state), nrg);
            prop_assert!(!outcome.is_fatal());
            let Some(proposed) = outcome.proposed() else {
                continue;
            };
            let kernel = kernels.kernel_mut(index).expect("kernel");
            harness
                .accept(kernel, Some(&state), &proposed, nrg)
                .expect("update");
            state = proposed;
            prop_assert_eq!(harness.pairs(), &PairCollection::rebuild(&state, nrg));
            let recomputed = state.recompute_total(nrg).expect("energy");
            prop_assert!((recomputed - state.total()).abs() < 1e-6);
        }
    }
}
