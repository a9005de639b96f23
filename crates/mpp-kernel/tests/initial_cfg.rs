mod common;

use common::{cfg_nrg, disc, id, stack, BarrenCfgProposer, Harness};
use mpp_core::{Extent, MppError};
use mpp_kernel::{
    InitialCfgKernel, Kernel, ProposalOutcome, RandomMarkProposer, UniformCfgProposer,
};
use mpp_mark::{ContrastOverlapEnergy, NrgContext};

#[test]
fn proposer_producing_nothing_is_fatal() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let mut harness = Harness::new(3);
    let mut kernel = InitialCfgKernel::new(Box::new(BarrenCfgProposer));

    match harness.propose(&mut kernel, None, nrg) {
        ProposalOutcome::Fatal(MppError::Proposal(info)) => {
            assert_eq!(info.code, "empty-proposal");
        }
        other => panic!("expected fatal proposal error, got {other:?}"),
    }
    assert!(kernel.changed_mark_ids().is_empty());

    let err = harness
        .accept(&mut kernel, None, &Default::default(), nrg)
        .expect_err("nothing to update");
    assert_eq!(err.info().code, "no-pending-proposal");
}

#[test]
fn reseeding_ignores_the_prior_state() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let prior = cfg_nrg(vec![disc(0, 12.0, 12.0, 4.0)], nrg);
    let mut harness = Harness::new(5);
    harness.init(&prior, nrg);

    let mut kernel = InitialCfgKernel::new(Box::new(UniformCfgProposer::new(
        3,
        Box::new(RandomMarkProposer::default()),
    )));
    let proposed = harness
        .propose(&mut kernel, Some(&prior), nrg)
        .proposed()
        .expect("initial proposal");
    assert_eq!(proposed.len(), 3);
    assert!(proposed.index_of(id(0)).is_none());
    assert_eq!(kernel.changed_mark_ids(), proposed.cfg().ids().as_slice());
    assert_eq!(
        kernel.calc_accept_prob(1, 3, 0.0, &Extent::planar(48, 48), 0.0),
        1.0
    );
}
