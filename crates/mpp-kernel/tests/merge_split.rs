mod common;

use common::{cfg_nrg, disc, id, stack, Harness};
use mpp_core::MppError;
use mpp_kernel::{
    CentroidMergeProposer, Kernel, MajorAxisSplitProposer, MergeKernel, PairCollection,
    SplitKernel, UniformMarkSelector, PAIR_COLLECTION,
};
use mpp_mark::{CfgNrg, ContrastOverlapEnergy, MarkBounds, NrgContext};

fn wide_bounds() -> MarkBounds {
    MarkBounds {
        min_radius: 1.0,
        max_radius: 12.0,
    }
}

fn overlapping_pair(nrg: NrgContext<'_>) -> CfgNrg {
    cfg_nrg(
        vec![
            disc(0, 20.0, 20.0, 5.0),
            disc(1, 24.0, 20.0, 5.0),
            disc(2, 40.0, 40.0, 3.0),
        ],
        nrg,
    )
}

#[test]
fn merge_replaces_an_indexed_pair_with_one_mark() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = overlapping_pair(nrg);
    let mut harness = Harness::new(21);
    harness.init(&existing, nrg);
    assert_eq!(harness.pairs().len(), 1);

    let mut kernel = MergeKernel::new(
        Box::new(CentroidMergeProposer::new(wide_bounds())),
        PAIR_COLLECTION,
    );
    let proposed = harness
        .propose(&mut kernel, Some(&existing), nrg)
        .proposed()
        .expect("merge proposal");
    assert_eq!(proposed.len(), existing.len() - 1);

    let changed = kernel.changed_mark_ids().to_vec();
    assert_eq!(changed.len(), 3);
    assert_eq!(&changed[..2], &[id(0), id(1)]);
    let merged = changed[2];
    assert!(existing.index_of(merged).is_none());
    assert!(proposed.index_of(merged).is_some());
    assert!(proposed.index_of(id(0)).is_none());
    assert!(proposed.index_of(id(1)).is_none());
    assert!(proposed.index_of(id(2)).is_some());

    harness
        .accept(&mut kernel, Some(&existing), &proposed, nrg)
        .expect("update");
    assert_eq!(*harness.pairs(), PairCollection::rebuild(&proposed, nrg));
}

#[test]
fn merge_without_overlapping_pairs_is_no_change() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = cfg_nrg(
        vec![disc(0, 10.0, 10.0, 3.0), disc(1, 30.0, 30.0, 3.0)],
        nrg,
    );
    let mut harness = Harness::new(4);
    harness.init(&existing, nrg);

    let mut kernel = MergeKernel::new(
        Box::new(CentroidMergeProposer::new(wide_bounds())),
        PAIR_COLLECTION,
    );
    assert!(harness
        .propose(&mut kernel, Some(&existing), nrg)
        .is_no_change());
    assert!(kernel.last_pair().is_none());
}

#[test]
fn merge_of_a_pair_whose_mark_left_the_configuration_is_no_change() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = overlapping_pair(nrg);
    let mut harness = Harness::new(21);
    harness.init(&existing, nrg);
    assert_eq!(harness.pairs().len(), 1);

    // The index still holds (0, 1) but mark 1 is gone.
    let mut stale = existing.shallow_copy();
    stale.remove_by_id(id(1), nrg).expect("remove");
    let before_total = stale.total();
    let before_ids = stale.cfg().ids();

    let mut kernel = MergeKernel::new(
        Box::new(CentroidMergeProposer::new(wide_bounds())),
        PAIR_COLLECTION,
    );
    assert!(harness
        .propose(&mut kernel, Some(&stale), nrg)
        .is_no_change());
    assert!(kernel.last_pair().is_none());
    assert!(kernel.changed_mark_ids().is_empty());
    assert!(harness.errors.messages().iter().any(|m| m.contains("stale pair")));
    assert_eq!(stale.cfg().ids(), before_ids);
    assert_eq!(stale.total(), before_total);
    assert_eq!(harness.pairs().len(), 1);
}

#[test]
fn merge_against_a_missing_index_is_fatal() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = overlapping_pair(nrg);
    let mut harness = Harness::new(4);
    harness.init(&existing, nrg);

    let mut kernel = MergeKernel::new(
        Box::new(CentroidMergeProposer::new(wide_bounds())),
        "not-registered",
    );
    match harness.propose(&mut kernel, Some(&existing), nrg) {
        mpp_kernel::ProposalOutcome::Fatal(MppError::Index(info)) => {
            assert_eq!(info.code, "missing-pair-collection");
        }
        other => panic!("expected fatal index error, got {other:?}"),
    }
}

#[test]
fn split_replaces_one_mark_with_two() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = cfg_nrg(
        vec![disc(0, 24.0, 24.0, 6.0), disc(1, 8.0, 40.0, 3.0)],
        nrg,
    );
    let mut harness = Harness::new(9);
    harness.init(&existing, nrg);

    let mut kernel = SplitKernel::new(
        Box::new(UniformMarkSelector),
        Box::new(MajorAxisSplitProposer::new(wide_bounds())),
    );
    let proposed = harness
        .propose(&mut kernel, Some(&existing), nrg)
        .proposed()
        .expect("split proposal");
    assert_eq!(proposed.len(), existing.len() + 1);

    let changed = kernel.changed_mark_ids().to_vec();
    assert_eq!(changed.len(), 3);
    let (removed, a, b) = (changed[0], changed[1], changed[2]);
    assert!(existing.index_of(removed).is_some());
    assert!(proposed.index_of(removed).is_none());
    assert_ne!(a, b);
    for child in [a, b] {
        assert!(existing.index_of(child).is_none());
        assert!(proposed.index_of(child).is_some());
    }

    harness
        .accept(&mut kernel, Some(&existing), &proposed, nrg)
        .expect("update");
    assert_eq!(*harness.pairs(), PairCollection::rebuild(&proposed, nrg));
}

#[test]
fn split_of_empty_configuration_is_no_change() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let mut harness = Harness::new(9);
    let mut kernel = SplitKernel::new(
        Box::new(UniformMarkSelector),
        Box::new(MajorAxisSplitProposer::new(wide_bounds())),
    );
    assert!(harness.propose(&mut kernel, None, nrg).is_no_change());
    let empty = CfgNrg::empty();
    assert!(harness
        .propose(&mut kernel, Some(&empty), nrg)
        .is_no_change());
}
