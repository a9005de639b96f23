use mpp_core::{
    Extent, MarkId, Point3, RegionMembership, Voxel, FLAG_INSIDE, FLAG_SHELL, REGION_INSIDE,
    REGION_SHELL,
};
use mpp_mark::{BinaryValues, Ellipse, Ellipsoid, Mark, MarkGeometry, MarkShape, PointList};

fn ellipse(cx: f64, cy: f64, a: f64, b: f64) -> Mark {
    Mark::new(
        MarkId::from_raw(1),
        MarkShape::Ellipse(Ellipse {
            cx,
            cy,
            a,
            b,
            angle: 0.0,
        }),
    )
}

#[test]
fn ellipse_flags_cover_body_and_shell() {
    let mark = ellipse(10.0, 10.0, 4.0, 2.0);
    assert_eq!(mark.eval_point_inside(&Point3::new(10.0, 10.0, 0.0)), FLAG_INSIDE);
    assert_eq!(mark.eval_point_inside(&Point3::new(14.0, 10.0, 0.0)), FLAG_INSIDE);
    assert_eq!(mark.eval_point_inside(&Point3::new(15.0, 10.0, 0.0)), FLAG_SHELL);
    assert_eq!(mark.eval_point_inside(&Point3::new(17.0, 10.0, 0.0)), 0);
    assert_eq!(mark.eval_point_inside(&Point3::new(10.0, 10.0, 1.0)), 0);
}

#[test]
fn bounding_boxes_clip_to_scene() {
    let extent = Extent::planar(12, 12);
    let mark = ellipse(1.0, 1.0, 4.0, 4.0);
    let inside = mark.bounding_box(&extent, REGION_INSIDE);
    assert_eq!(inside.min, Voxel::new(0, 0, 0));
    assert_eq!(inside.max, Voxel::new(5, 5, 0));
    let shell = mark.bounding_box(&extent, REGION_SHELL);
    assert_eq!(shell.max, Voxel::new(7, 7, 0));
}

#[test]
fn mask_matches_point_evaluation() {
    let extent = Extent::planar(20, 20);
    let mark = ellipse(10.0, 10.0, 3.0, 3.0);
    let (mask, props) = mark.calc_mask(&extent, RegionMembership::inside(), BinaryValues::default());
    assert_eq!(mask.count_on(), props.voxel_count);
    // a radius-3 disc on the integer grid holds 29 voxels
    assert_eq!(props.voxel_count, 29);
    let cog = props.center_of_gravity.unwrap();
    assert!((cog.x - 10.0).abs() < 1e-9 && (cog.y - 10.0).abs() < 1e-9);
    assert!(mask.is_on(&Voxel::new(10, 10, 0)));
    assert!(!mask.is_on(&Voxel::new(14, 10, 0)));
}

#[test]
fn ellipsoid_body_size_and_membership() {
    let mark = Mark::new(
        MarkId::from_raw(2),
        MarkShape::Ellipsoid(Ellipsoid {
            center: Point3::new(5.0, 5.0, 5.0),
            radii: [3.0, 2.0, 1.0],
            angles: [0.0, 0.0, std::f64::consts::FRAC_PI_2],
        }),
    );
    // rotated 90 degrees about z: the 3-voxel axis now runs along y
    assert_eq!(mark.eval_point_inside(&Point3::new(5.0, 8.0, 5.0)), FLAG_INSIDE);
    assert_ne!(mark.eval_point_inside(&Point3::new(8.0, 5.0, 5.0)), FLAG_INSIDE);
    let expected = 4.0 / 3.0 * std::f64::consts::PI * 6.0;
    assert!((mark.body_size() - expected).abs() < 1e-9);
}

#[test]
fn point_list_shell_is_one_voxel_ring() {
    let mark = Mark::new(
        MarkId::from_raw(3),
        MarkShape::PointList(PointList::new(vec![Voxel::new(4, 4, 0), Voxel::new(5, 4, 0)])),
    );
    assert_eq!(mark.eval_point_inside(&Point3::new(4.0, 4.0, 0.0)), FLAG_INSIDE);
    assert_eq!(mark.eval_point_inside(&Point3::new(6.0, 5.0, 0.0)), FLAG_SHELL);
    assert_eq!(mark.eval_point_inside(&Point3::new(8.0, 4.0, 0.0)), 0);
    let extent = Extent::planar(10, 10);
    let (_, props) = mark.calc_mask(&extent, RegionMembership::shell(), BinaryValues::default());
    assert_eq!(props.voxel_count, 10);
}

#[test]
fn duplicate_is_independent() {
    let mark = ellipse(3.0, 3.0, 2.0, 2.0);
    let mut copy = mark.duplicate();
    copy.shape_mut().set_center(Point3::new(7.0, 7.0, 0.0));
    assert_eq!(copy.id(), mark.id());
    assert_eq!(mark.center_point(), Point3::new(3.0, 3.0, 0.0));
    assert_eq!(copy.center_point(), Point3::new(7.0, 7.0, 0.0));
}

#[test]
fn every_shape_survives_json() {
    let marks = [
        ellipse(7.0, 9.0, 4.0, 2.5),
        Mark::new(
            MarkId::from_raw(2),
            MarkShape::Ellipsoid(Ellipsoid {
                center: Point3::new(5.0, 6.0, 7.0),
                radii: [3.0, 2.0, 1.0],
                angles: [0.5, 0.25, 0.125],
            }),
        ),
        Mark::new(
            MarkId::from_raw(3),
            MarkShape::PointList(PointList::new(vec![
                Voxel::new(4, 4, 0),
                Voxel::new(1, 2, 0),
                Voxel::new(4, 4, 0),
            ])),
        ),
    ];
    for mark in &marks {
        let text = serde_json::to_string(mark).expect("serialize");
        let back: Mark = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(&back, mark);
        assert_eq!(back.kind(), mark.kind());
    }

    let text = serde_json::to_string(&marks[0]).expect("serialize");
    assert!(text.contains("\"kind\":\"ellipse\""), "{text}");
}
