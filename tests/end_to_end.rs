//! End-to-end scenarios: plotting, images, volumes, timers, colormaps.

use sciviz::gpu::colormap::build_lut;
use sciviz::prelude::*;
use sciviz::scene::figure::FigureRegistry;

#[test]
fn plot_a_line_populates_one_axes_with_five_vertices() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut reg = FigureRegistry::new();
    let fig = reg.figure(None);
    let mut f = fig.borrow_mut();
    let line = f
        .add_wobject(ObjectKind::Line(
            Line::from_y(&[1.0, 2.0, 3.0, 1.0, 4.0]).unwrap(),
        ))
        .unwrap();
    let axes = f.current_axes().unwrap();

    match &f.scene().get(line).unwrap().kind {
        ObjectKind::Line(l) => assert_eq!(l.len(), 5),
        _ => panic!("expected a line"),
    }
    let limits = f.scene().axes_limits(axes).unwrap();
    assert_eq!((limits.x.min, limits.x.max), (0.0, 4.0));
    assert_eq!((limits.y.min, limits.y.max), (1.0, 4.0));

    // A screenshot carries non-background pixels along the polyline.
    f.draw_now().unwrap();
    let frame = f.getframe();
    let line_color = [0u8, 0, 255];
    let hits = frame
        .data
        .chunks_exact(4)
        .filter(|px| px[0] == line_color[0] && px[1] == line_color[1] && px[2] == line_color[2])
        .count();
    assert!(hits > 20, "polyline pixels missing: {hits}");
}

#[test]
fn imshow_conventions_flip_y_and_center_pixel_centers() {
    let mut reg = FigureRegistry::new();
    let fig = reg.figure(None);
    let mut f = fig.borrow_mut();
    f.set_logical_size(512, 512);
    let field = ScalarField::from_2d(vec![0.25; 512 * 512], 512, 512).unwrap();
    let tex = f
        .add_wobject(ObjectKind::Texture2D(Texture2D::new(field).unwrap()))
        .unwrap();
    let axes = f.current_axes().unwrap();
    if let ObjectKind::Axes(ref mut a) = f.scene_mut().get_mut(axes).unwrap().kind {
        a.set_y_flipped(true);
        assert!(a.daspect[1] < 0.0);
    }
    f.draw_now().unwrap();

    let limits = f.scene().axes_limits(axes).unwrap();
    assert_eq!((limits.x.min, limits.x.max), (-0.5, 511.5));
    assert_eq!((limits.y.min, limits.y.max), (-0.5, 511.5));

    // A click in the middle lands near pixel (255.5, 255.5).
    let hits = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    {
        let hits = hits.clone();
        f.scene_mut()
            .get_mut(tex)
            .unwrap()
            .events
            .mouse_down
            .bind(move |args| {
                hits.borrow_mut().push((args.x2d, args.y2d));
                true
            });
    }
    f.process_mouse_down(256.0, 256.0, MouseButton::Left, Modifiers::NONE);
    let hits = hits.borrow();
    assert_eq!(hits.len(), 1);
    assert!((hits[0].0 - 255.5).abs() < 2.0, "x2d = {}", hits[0].0);
    assert!((hits[0].1 - 255.5).abs() < 2.0, "y2d = {}", hits[0].1);
}

#[test]
fn volume_mip_projects_a_single_voxel() {
    let mut data = vec![0.0f32; 64 * 64 * 64];
    let (x, y, z) = (10usize, 20usize, 30usize);
    data[(z * 64 + y) * 64 + x] = 1.0;
    let field = ScalarField::from_3d(data, 64, 64, 64).unwrap();
    let mut vol = Texture3D::new(field).unwrap();
    vol.set_render_style(RenderStyle::Mip).unwrap();

    let proj = vol.mip_reference_z();
    let hot: Vec<usize> = proj
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > 0.0)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(hot, vec![y * 64 + x], "exactly one hot projected pixel");

    // Rotating 180 degrees about y mirrors x and z; the projected hot
    // set is the reflection of the original.
    let mut mirrored = vec![0.0f32; 64 * 64 * 64];
    mirrored[((63 - z) * 64 + y) * 64 + (63 - x)] = 1.0;
    let vol2 =
        Texture3D::new(ScalarField::from_3d(mirrored, 64, 64, 64).unwrap()).unwrap();
    let proj2 = vol2.mip_reference_z();
    let hot2: Vec<usize> = proj2
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > 0.0)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(hot2, vec![y * 64 + (63 - x)]);
}

#[test]
fn volume_in_a_scene_builds_backface_box_geometry() {
    let mut reg = FigureRegistry::new();
    let fig = reg.figure(None);
    let mut f = fig.borrow_mut();
    let field = ScalarField::from_3d(vec![0.0; 8 * 8 * 8], 8, 8, 8).unwrap();
    let vol = f
        .add_wobject(ObjectKind::Texture3D(Texture3D::new(field).unwrap()))
        .unwrap();
    let axes = f.current_axes().unwrap();
    if let ObjectKind::Axes(ref mut a) = f.scene_mut().get_mut(axes).unwrap().kind {
        a.set_camera_type("3d").unwrap();
    }
    f.draw_now().unwrap();

    match &f.scene().get(vol).unwrap().kind {
        ObjectKind::Texture3D(v) => {
            assert_eq!(v.bbox_corners().len(), 8);
            assert_eq!(Texture3D::bbox_indices().len(), 36);
            let (min, max) = v.bounds();
            assert_eq!(min, glam::Vec3::ZERO);
            assert_eq!(max, glam::Vec3::splat(7.0));
        }
        _ => panic!("expected a volume"),
    }
}

#[test]
fn nolag_timer_fires_exactly_n_times_in_n_intervals() {
    use std::time::{Duration, Instant};
    let count = std::rc::Rc::new(std::cell::Cell::new(0u32));
    let c = count.clone();
    let timer = Timer::new(move || c.set(c.get() + 1));
    timer.set_nolag(true);
    timer.start(100, false);

    // A drift-free timer advances its deadline by exactly one interval,
    // so sweeping a virtual clock over 10 s at 100 ms yields 100 fires
    // even when individual sweeps are late.
    let t0 = Instant::now();
    let mut t = t0;
    while t < t0 + Duration::from_secs(10) {
        t += Duration::from_millis(37); // deliberately off-beat
        sciviz::events::timer::sweep_at(t);
    }
    let final_count = count.get();
    assert!(
        (99..=101).contains(&final_count),
        "expected ~100 fires, got {final_count}"
    );
    timer.destroy();
}

#[test]
fn grayscale_lut_is_an_identity_ramp() {
    let spec = ColormapSpec::Stops(vec![
        glam::Vec4::new(0.0, 0.0, 0.0, 1.0),
        glam::Vec4::new(1.0, 1.0, 1.0, 1.0),
    ]);
    let lut = build_lut(&spec).unwrap();
    for (i, entry) in lut.iter().enumerate() {
        let expected = i as f32 / 255.0;
        for ch in 0..3 {
            assert!((entry[ch] - expected).abs() < 1e-5);
        }
    }
}

#[test]
fn stl_tetrahedron_roundtrip_preserves_vertex_and_face_sets() {
    use std::collections::BTreeSet;
    let mut mesh = sciviz::objects::mesh::tetrahedron();
    mesh.calculate_normals();
    for n in mesh.normals().unwrap() {
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    let mut buf = Vec::new();
    sciviz::io::stl::write_binary(&mut buf, &mesh).unwrap();
    let back = sciviz::io::stl::read(&buf[..]).unwrap();

    let key = |p: &Point| {
        (
            (p.x() * 1e6) as i64,
            (p.y() * 1e6) as i64,
            (p.z() * 1e6) as i64,
        )
    };
    let set_a: BTreeSet<_> = mesh.vertices().iter().map(|p| key(&p)).collect();
    let set_b: BTreeSet<_> = back.vertices().iter().map(|p| key(&p)).collect();
    assert_eq!(set_a, set_b);
    assert_eq!(back.face_count(), 4);

    // Face set compared as unordered triangles of quantized vertices.
    let face_set = |m: &Mesh| -> BTreeSet<BTreeSet<(i64, i64, i64)>> {
        (0..m.face_count())
            .map(|f| {
                m.face_indices(f)
                    .iter()
                    .map(|&i| key(&m.vertices().get(i as usize).unwrap()))
                    .collect()
            })
            .collect()
    };
    assert_eq!(face_set(&mesh), face_set(&back));
}
