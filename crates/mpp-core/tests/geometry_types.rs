use mpp_core::{BoundingBox, Extent, Voxel};

#[test]
fn extent_offsets_are_x_fastest() {
    let extent = Extent::new(4, 3, 2);
    assert_eq!(extent.volume(), 24);
    assert_eq!(extent.offset(&Voxel::new(0, 0, 0)), Some(0));
    assert_eq!(extent.offset(&Voxel::new(1, 0, 0)), Some(1));
    assert_eq!(extent.offset(&Voxel::new(0, 1, 0)), Some(4));
    assert_eq!(extent.offset(&Voxel::new(0, 0, 1)), Some(12));
    assert_eq!(extent.offset(&Voxel::new(4, 0, 0)), None);
    assert_eq!(extent.offset(&Voxel::new(-1, 0, 0)), None);
}

#[test]
fn box_intersection_and_iteration() {
    let a = BoundingBox::new(Voxel::new(0, 0, 0), Voxel::new(3, 3, 0));
    let b = BoundingBox::new(Voxel::new(2, 2, 0), Voxel::new(5, 5, 0));
    let both = a.intersect(&b);
    assert_eq!(both.volume(), 4);
    assert_eq!(both.voxels().count(), 4);

    let far = BoundingBox::new(Voxel::new(10, 10, 0), Voxel::new(12, 12, 0));
    let none = a.intersect(&far);
    assert!(none.is_empty());
    assert_eq!(none.volume(), 0);
    assert_eq!(none.voxels().count(), 0);
}
