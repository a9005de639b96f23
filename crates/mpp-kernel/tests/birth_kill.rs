mod common;

use common::{cfg_nrg, disc, disc_shape, id, stack, FixedMarkProposer, Harness};
use mpp_kernel::{
    BirthAndKillConfig, BirthAndKillKernel, BirthDeathProbs, Kernel, PairCollection,
    RandomMarkProposer,
};
use mpp_mark::{CfgNrg, ContrastOverlapEnergy, Mark, MarkShape, NrgContext, VoxelizedMarkMemo};

fn kernel_at(shape: MarkShape, config: BirthAndKillConfig) -> BirthAndKillKernel {
    BirthAndKillKernel::new(
        Box::new(FixedMarkProposer { shape }),
        BirthDeathProbs::default(),
        config,
    )
}

fn no_extra_birth(threshold: f64) -> BirthAndKillConfig {
    BirthAndKillConfig {
        overlap_ratio_threshold: threshold,
        additional_birth_attempts: 0,
        enable_additional_birth: false,
    }
}

fn abc(b_radius: f64) -> Vec<Mark> {
    vec![
        disc(0, 10.0, 10.0, 4.0),
        disc(1, 30.0, 30.0, b_radius),
        disc(2, 38.0, 10.0, 4.0),
    ]
}

#[test]
fn new_mark_kills_only_the_mark_it_covers() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = cfg_nrg(abc(4.0), nrg);
    let mut harness = Harness::new(17);
    harness.init(&existing, nrg);

    // Covers A exactly and misses B and C.
    let mut kernel = kernel_at(disc_shape(10.0, 10.0, 4.0), no_extra_birth(0.1));
    let proposed = harness
        .propose(&mut kernel, Some(&existing), nrg)
        .proposed()
        .expect("birth-and-kill proposal");

    assert_eq!(proposed.len(), 3);
    assert!(proposed.index_of(id(0)).is_none());
    assert!(proposed.index_of(id(1)).is_some());
    assert!(proposed.index_of(id(2)).is_some());

    let changed = kernel.changed_mark_ids().to_vec();
    assert_eq!(changed.len(), 2);
    assert_eq!(changed[0], id(0));
    assert!(existing.index_of(changed[1]).is_none());
    assert!(proposed.index_of(changed[1]).is_some());

    harness
        .accept(&mut kernel, Some(&existing), &proposed, nrg)
        .expect("update");
    assert_eq!(*harness.pairs(), PairCollection::rebuild(&proposed, nrg));
}

#[test]
fn survivors_stay_under_the_threshold_and_victims_exceed_it() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = cfg_nrg(
        vec![
            disc(0, 10.0, 10.0, 4.0),
            disc(1, 30.0, 30.0, 6.0),
            disc(2, 38.0, 10.0, 4.0),
            disc(3, 20.0, 24.0, 5.0),
            disc(4, 12.0, 38.0, 7.0),
        ],
        nrg,
    );
    let threshold = 0.1;
    let ratio = |a: &VoxelizedMarkMemo, b: &VoxelizedMarkMemo| {
        let overlap = a.overlap_with(b, &stack) as f64;
        (overlap / a.size(&stack) as f64).max(overlap / b.size(&stack) as f64)
    };

    for seed in 0..16 {
        let mut harness = Harness::new(seed);
        harness.init(&existing, nrg);
        let mut kernel = BirthAndKillKernel::new(
            Box::new(RandomMarkProposer::default()),
            BirthDeathProbs::default(),
            no_extra_birth(threshold),
        );
        let Some(proposed) = harness.propose(&mut kernel, Some(&existing), nrg).proposed() else {
            continue;
        };
        let changed = kernel.changed_mark_ids().to_vec();
        let born_id = *changed.last().expect("born id");
        let born = proposed.memo_for_id(born_id).expect("born memo");
        for memo in existing.memos() {
            if proposed.index_of(memo.id()).is_some() {
                assert!(ratio(born, memo) <= threshold, "seed {seed}: {} survived", memo.id());
            } else {
                assert!(changed.contains(&memo.id()));
                assert!(ratio(born, memo) > threshold, "seed {seed}: {} killed", memo.id());
            }
        }
    }
}

#[test]
fn threshold_of_one_kills_nothing_with_voxels() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = cfg_nrg(abc(4.0), nrg);
    let mut harness = Harness::new(17);
    harness.init(&existing, nrg);

    let mut kernel = kernel_at(disc_shape(30.0, 30.0, 4.0), no_extra_birth(1.0));
    let proposed = harness
        .propose(&mut kernel, Some(&existing), nrg)
        .proposed()
        .expect("birth-and-kill proposal");
    assert_eq!(proposed.len(), 4);
    assert_eq!(kernel.changed_mark_ids().len(), 1);

    harness
        .accept(&mut kernel, Some(&existing), &proposed, nrg)
        .expect("update");
    assert_eq!(harness.pairs().len(), 1);
    assert_eq!(*harness.pairs(), PairCollection::rebuild(&proposed, nrg));
}

#[test]
fn marks_without_voxels_are_always_killed() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let mut marks = abc(4.0);
    marks.push(disc(3, -50.0, -50.0, 2.0));
    let existing = cfg_nrg(marks, nrg);
    let mut harness = Harness::new(2);
    harness.init(&existing, nrg);

    let mut kernel = kernel_at(disc_shape(22.0, 40.0, 2.0), no_extra_birth(0.1));
    let proposed = harness
        .propose(&mut kernel, Some(&existing), nrg)
        .proposed()
        .expect("birth-and-kill proposal");
    assert!(proposed.index_of(id(3)).is_none());
    assert_eq!(proposed.len(), 4);
    assert_eq!(kernel.changed_mark_ids()[0], id(3));
}

#[test]
fn new_mark_without_voxels_is_no_change() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = cfg_nrg(abc(4.0), nrg);
    let mut harness = Harness::new(2);
    harness.init(&existing, nrg);

    let mut kernel = kernel_at(disc_shape(-100.0, -100.0, 3.0), no_extra_birth(0.1));
    assert!(harness
        .propose(&mut kernel, Some(&existing), nrg)
        .is_no_change());
    assert!(!harness.errors.is_empty());
}

#[test]
fn freed_area_receives_an_additional_mark() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let existing = cfg_nrg(abc(5.0), nrg);
    let mut harness = Harness::new(29);
    harness.init(&existing, nrg);

    let config = BirthAndKillConfig {
        overlap_ratio_threshold: 0.1,
        additional_birth_attempts: 64,
        enable_additional_birth: true,
    };
    let mut kernel = kernel_at(disc_shape(30.0, 30.0, 2.0), config);
    let proposed = harness
        .propose(&mut kernel, Some(&existing), nrg)
        .proposed()
        .expect("birth-and-kill proposal");

    assert!(proposed.index_of(id(1)).is_none());
    assert_eq!(proposed.len(), 4);
    let changed = kernel.changed_mark_ids().to_vec();
    assert_eq!(changed.len(), 3);
    assert_eq!(changed[0], id(1));
    assert_ne!(changed[1], changed[2]);

    harness
        .accept(&mut kernel, Some(&existing), &proposed, nrg)
        .expect("update");
    assert_eq!(*harness.pairs(), PairCollection::rebuild(&proposed, nrg));
}

#[test]
fn empty_start_only_births() {
    let stack = stack();
    let scheme = ContrastOverlapEnergy::default();
    let nrg = NrgContext::new(&stack, &scheme);
    let mut harness = Harness::new(6);
    let mut kernel = kernel_at(disc_shape(24.0, 24.0, 3.0), no_extra_birth(0.1));
    let proposed = harness
        .propose(&mut kernel, None, nrg)
        .proposed()
        .expect("birth-and-kill proposal");
    assert_eq!(proposed.len(), 1);

    let empty = CfgNrg::empty();
    let again = harness
        .propose(&mut kernel, Some(&empty), nrg)
        .proposed()
        .expect("birth-and-kill proposal");
    assert_eq!(again.len(), 1);
}
