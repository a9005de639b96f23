use mpp_core::{Extent, MarkId, Voxel};
use mpp_mark::{Ellipse, EnergyStack, Mark, MarkShape, PointList, VoxelizedMarkMemo};

fn flat_stack() -> EnergyStack {
    EnergyStack::from_fn(Extent::planar(30, 30), |_| 0.5)
}

fn square(id: u64, x0: i64, y0: i64, side: i64) -> Mark {
    let points = (x0..x0 + side)
        .flat_map(|x| (y0..y0 + side).map(move |y| Voxel::new(x, y, 0)))
        .collect();
    Mark::new(MarkId::from_raw(id), MarkShape::PointList(PointList::new(points)))
}

#[test]
fn overlap_counts_shared_interior_voxels() {
    let stack = flat_stack();
    let a = VoxelizedMarkMemo::new(square(0, 0, 0, 4));
    let b = VoxelizedMarkMemo::new(square(1, 2, 2, 4));
    assert_eq!(a.size(&stack), 16);
    assert_eq!(a.overlap_with(&b, &stack), 4);
    assert_eq!(b.overlap_with(&a, &stack), 4);
}

#[test]
fn mutation_invalidates_cache() {
    let stack = flat_stack();
    let mut memo = VoxelizedMarkMemo::new(Mark::new(
        MarkId::from_raw(3),
        MarkShape::Ellipse(Ellipse {
            cx: 10.0,
            cy: 10.0,
            a: 2.0,
            b: 2.0,
            angle: 0.0,
        }),
    ));
    assert_eq!(memo.size(&stack), 13);
    assert!(memo.is_computed());

    let shared = memo.clone();
    if let MarkShape::Ellipse(e) = memo.mark_mut().shape_mut() {
        e.a = 3.0;
        e.b = 3.0;
    }
    assert!(!memo.is_computed());
    assert_eq!(memo.size(&stack), 29);
    // the clone taken before mutation keeps the old mark and cache
    assert!(shared.is_computed());
    assert_eq!(shared.size(&stack), 13);
}

#[test]
fn marks_outside_scene_are_empty() {
    let stack = flat_stack();
    let memo = VoxelizedMarkMemo::new(square(4, 100, 100, 3));
    assert_eq!(memo.size(&stack), 0);
}
