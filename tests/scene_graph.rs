//! Scene-graph invariants exercised through the public API.

use sciviz::prelude::*;
use sciviz::scene::figure::FigureRegistry;

fn figure_with_axes() -> (sciviz::scene::FigureHandle, ObjId) {
    let mut reg = FigureRegistry::new();
    let fig = reg.figure(None);
    let axes = fig.borrow_mut().add_axes().unwrap();
    (fig, axes)
}

#[test]
fn every_node_is_in_its_parents_children() {
    let (fig, _) = figure_with_axes();
    let mut f = fig.borrow_mut();
    let line = f
        .add_wobject(ObjectKind::Line(Line::from_y(&[0.0, 1.0, 2.0]).unwrap()))
        .unwrap();
    let scene = f.scene_mut();
    let mut cursor = Some(line);
    while let Some(id) = cursor {
        let parent = scene.get(id).unwrap().parent;
        if let Some(p) = parent {
            assert!(scene.get(p).unwrap().children.contains(&id));
        }
        cursor = parent;
    }
}

#[test]
fn textures_in_an_axes_have_negative_strictly_decreasing_depth() {
    let (fig, _) = figure_with_axes();
    let mut f = fig.borrow_mut();
    let mut depths = Vec::new();
    for _ in 0..4 {
        let field = ScalarField::from_2d(vec![0.0; 16], 4, 4).unwrap();
        let id = f
            .add_wobject(ObjectKind::Texture2D(Texture2D::new(field).unwrap()))
            .unwrap();
        if let ObjectKind::Texture2D(t) = &f.scene().get(id).unwrap().kind {
            depths.push(t.z_offset);
        }
    }
    for w in depths.windows(2) {
        assert!(w[0] < 0.0 && w[1] < 0.0);
        assert!(w[1] < w[0], "later texture must sit deeper: {depths:?}");
    }
}

#[test]
fn camera_reset_centers_the_data() {
    let (fig, axes) = figure_with_axes();
    let mut f = fig.borrow_mut();
    f.set_logical_size(640, 480);
    f.add_wobject(ObjectKind::Line(
        Line::from_y(&[5.0, -3.0, 12.0, 7.0]).unwrap(),
    ))
    .unwrap();
    f.draw_now().unwrap();

    let limits = f.scene().axes_limits(axes).unwrap();
    let center = limits.center();
    let camera = match &f.scene().get(axes).unwrap().kind {
        ObjectKind::Axes(a) => a.camera(),
        _ => unreachable!(),
    };
    let screen = camera.borrow().world_to_screen(center);
    assert!(screen.x > 0.0 && screen.x < 640.0);
    assert!(screen.y > 0.0 && screen.y < 480.0);
    // Reset leaves the data center in the middle of the viewport.
    assert!((screen.x - 320.0).abs() < 1.0);
    assert!((screen.y - 240.0).abs() < 1.0);
}

#[test]
fn handlers_fire_reverse_bound_order_until_handled() {
    let (fig, _) = figure_with_axes();
    let mut f = fig.borrow_mut();
    let line = f
        .add_wobject(ObjectKind::Line(Line::from_y(&[0.0, 1.0]).unwrap()))
        .unwrap();
    f.draw_now().unwrap();

    let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    for i in 1..=3 {
        let order = order.clone();
        f.scene_mut()
            .get_mut(line)
            .unwrap()
            .events
            .mouse_down
            .bind(move |_| {
                order.borrow_mut().push(i);
                i == 2
            });
    }
    let (w, h) = f.framebuffer_size();
    f.process_mouse_down(
        w as f32 / 2.0,
        h as f32 / 2.0,
        MouseButton::Left,
        Modifiers::NONE,
    );
    assert_eq!(*order.borrow(), vec![3, 2]);
}

#[test]
fn destroy_cascades_and_stale_handles_fail() {
    let (fig, axes) = figure_with_axes();
    let mut f = fig.borrow_mut();
    let line = f
        .add_wobject(ObjectKind::Line(Line::from_y(&[0.0, 1.0]).unwrap()))
        .unwrap();
    f.destroy_object(axes).unwrap();
    assert!(matches!(
        f.scene().get(line),
        Err(sciviz::Error::ObjectDestroyed)
    ));
    assert!(matches!(
        f.scene().get(axes),
        Err(sciviz::Error::ObjectDestroyed)
    ));
}

#[test]
fn picking_disjoint_objects_resolves_the_right_one() {
    let (fig, _) = figure_with_axes();
    let mut f = fig.borrow_mut();
    f.set_logical_size(400, 400);
    // Two disjoint lines: left half and right half of the data range.
    let a = f
        .add_wobject(ObjectKind::Line(
            Line::new(PointSet::from_xy(&[0.0, 1.0], &[0.0, 1.0]).unwrap()).unwrap(),
        ))
        .unwrap();
    let b = f
        .add_wobject(ObjectKind::Line(
            Line::new(PointSet::from_xy(&[10.0, 11.0], &[0.0, 1.0]).unwrap()).unwrap(),
        ))
        .unwrap();
    f.draw_now().unwrap();

    let hit_a = std::rc::Rc::new(std::cell::Cell::new(false));
    let hit_b = std::rc::Rc::new(std::cell::Cell::new(false));
    {
        let hit_a = hit_a.clone();
        f.scene_mut()
            .get_mut(a)
            .unwrap()
            .events
            .mouse_down
            .bind(move |_| {
                hit_a.set(true);
                true
            });
    }
    {
        let hit_b = hit_b.clone();
        f.scene_mut()
            .get_mut(b)
            .unwrap()
            .events
            .mouse_down
            .bind(move |_| {
                hit_b.set(true);
                true
            });
    }
    // The data spans x in [0, 11]; x = 0.5 sits in A's screen box only.
    let x_px = (0.5 / 11.0) * 400.0;
    f.process_mouse_down(x_px, 200.0, MouseButton::Left, Modifiers::NONE);
    assert!(hit_a.get(), "left line must receive the click");
    assert!(!hit_b.get(), "right line must not");
}

#[test]
fn linked_views_share_camera_state() {
    let mut reg = FigureRegistry::new();
    let fig = reg.figure(None);
    let mut f = fig.borrow_mut();
    let axes1 = f.add_axes().unwrap();
    let axes2 = f.add_axes().unwrap();

    let shared = match &f.scene().get(axes1).unwrap().kind {
        ObjectKind::Axes(a) => a.camera(),
        _ => unreachable!(),
    };
    if let ObjectKind::Axes(ref mut a) = f.scene_mut().get_mut(axes2).unwrap().kind {
        a.share_camera("2d", shared.clone()).unwrap();
    }
    // Drag through one view...
    shared.borrow_mut().on_mouse_drag(
        MouseButton::Left,
        glam::Vec2::new(25.0, 0.0),
        (100, 100),
        Modifiers::NONE,
    );
    // ...and the other axes sees the same camera state.
    if let ObjectKind::Axes(a) = &f.scene().get(axes2).unwrap().kind {
        let cam = a.camera();
        let cam = cam.borrow();
        if let Camera::TwoD(c) = &*cam {
            assert!(c.bounds_x.min < 0.0, "pan must have shifted the bounds");
        } else {
            panic!("expected the shared 2d camera");
        }
    }
}
