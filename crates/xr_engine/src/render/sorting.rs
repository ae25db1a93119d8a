//! Draw-list ordering
//!
//! All sorts are stable so objects with equal keys keep their submission
//! order from frame to frame.

use super::pass::{RenderObject, SortMode};
use super::view::RenderView;
use crate::dfatal;
use crate::foundation::math::{translation_of, Vec3};
use std::cmp::Ordering;

fn world_position(object: &RenderObject) -> Vec3 {
    translation_of(&object.world_from_entity)
}

fn order_key(object: &RenderObject) -> (i32, u128) {
    (object.group_offset, object.sort_order.0)
}

/// Sort by a mode that does not depend on the views
///
/// View-dependent modes are a contract violation here and leave the order
/// untouched.
pub fn sort_objects(objects: &mut [RenderObject], mode: SortMode) {
    match mode {
        SortMode::None => {}
        SortMode::SortOrderIncreasing => objects.sort_by_key(order_key),
        SortMode::SortOrderDecreasing => objects.sort_by(|a, b| order_key(b).cmp(&order_key(a))),
        SortMode::WorldSpaceZBackToFront => {
            // -z is forward, so the farthest objects have the smallest z.
            objects.sort_by(|a, b| world_position(a).z.total_cmp(&world_position(b).z));
        }
        SortMode::WorldSpaceZFrontToBack => {
            objects.sort_by(|a, b| world_position(b).z.total_cmp(&world_position(a).z));
        }
        SortMode::WorldSpaceZBackToFrontXOutToMiddle => objects.sort_by(|a, b| {
            let (pa, pb) = (world_position(a), world_position(b));
            pa.z.total_cmp(&pb.z).then_with(|| pb.x.abs().total_cmp(&pa.x.abs()))
        }),
        SortMode::Optimized => objects.sort_by_key(|object| {
            let shader = object.material.borrow().shader().map_or(0, |shader| shader.id());
            (shader, object.mesh.id())
        }),
        SortMode::AverageSpaceOriginFrontToBack | SortMode::AverageSpaceOriginBackToFront => {
            dfatal!("Sort mode {mode:?} needs views");
        }
    }
}

/// Sort using the averaged position and forward axis of `views`
///
/// Each object's key is its offset from the average view position projected
/// on the average view z axis. View-independent modes fall through to
/// [`sort_objects`].
pub fn sort_objects_using_view(objects: &mut [RenderObject], mode: SortMode, views: &[RenderView]) {
    if mode.is_view_independent() {
        sort_objects(objects, mode);
        return;
    }
    if views.is_empty() {
        dfatal!("Must have at least 1 view.");
        return;
    }

    let count = views.len() as f32;
    let average_position = views
        .iter()
        .fold(Vec3::zeros(), |sum, view| sum + view.world_position())
        / count;
    let average_z = views
        .iter()
        .fold(Vec3::zeros(), |sum, view| sum + view.world_z_axis())
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vec3::z);

    let depth = |object: &RenderObject| (world_position(object) - average_position).dot(&average_z);
    let compare = |a: &RenderObject, b: &RenderObject| -> Ordering { depth(a).total_cmp(&depth(b)) };

    match mode {
        SortMode::AverageSpaceOriginBackToFront => objects.sort_by(compare),
        SortMode::AverageSpaceOriginFrontToBack => objects.sort_by(|a, b| compare(b, a)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Entity;
    use crate::foundation::math::Mat4;
    use crate::render::assets::{Asset, MeshData, MeshPtr};
    use crate::render::culling::Aabb;
    use crate::render::material::Material;
    use crate::render::sort_order::RenderSortOrder;
    use crate::render::state::StencilMode;

    fn mesh() -> MeshPtr {
        Asset::loaded(
            "mesh",
            MeshData {
                submesh_count: 1,
                aabb: Aabb::default(),
            },
        )
    }

    fn object(id: u32, position: Vec3, sort_order: u128) -> RenderObject {
        RenderObject {
            entity: Entity::from_raw(id),
            mesh: mesh(),
            material: Material::default().into_ptr(),
            world_from_entity: Mat4::new_translation(&position),
            sort_order: RenderSortOrder(sort_order),
            group_offset: 0,
            submesh: None,
            stencil_mode: StencilMode::Disabled,
            stencil_value: 0,
        }
    }

    fn ids(objects: &[RenderObject]) -> Vec<u32> {
        objects.iter().map(|object| object.entity.id()).collect()
    }

    fn view_at(position: Vec3) -> RenderView {
        let world_from_eye = Mat4::new_translation(&position);
        RenderView {
            world_from_eye,
            eye_from_world: world_from_eye.try_inverse().unwrap(),
            ..RenderView::default()
        }
    }

    #[test]
    fn test_sort_order_modes_are_stable() {
        let mut objects = vec![
            object(1, Vec3::zeros(), 3),
            object(2, Vec3::zeros(), 1),
            object(3, Vec3::zeros(), 3),
            object(4, Vec3::zeros(), 2),
        ];
        sort_objects(&mut objects, SortMode::SortOrderIncreasing);
        assert_eq!(ids(&objects), vec![2, 4, 1, 3]);

        sort_objects(&mut objects, SortMode::SortOrderDecreasing);
        assert_eq!(ids(&objects), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_group_offset_dominates_sort_order() {
        let mut objects = vec![object(1, Vec3::zeros(), 1), object(2, Vec3::zeros(), 2)];
        objects[0].group_offset = 1;
        sort_objects(&mut objects, SortMode::SortOrderIncreasing);
        assert_eq!(ids(&objects), vec![2, 1]);
    }

    #[test]
    fn test_world_space_z_modes() {
        let mut objects = vec![
            object(1, Vec3::new(0.0, 0.0, -1.0), 0),
            object(2, Vec3::new(0.0, 0.0, -5.0), 0),
            object(3, Vec3::new(0.0, 0.0, -3.0), 0),
        ];
        sort_objects(&mut objects, SortMode::WorldSpaceZBackToFront);
        assert_eq!(ids(&objects), vec![2, 3, 1]);
        sort_objects(&mut objects, SortMode::WorldSpaceZFrontToBack);
        assert_eq!(ids(&objects), vec![1, 3, 2]);
    }

    #[test]
    fn test_x_out_to_middle() {
        let mut objects = vec![
            object(1, Vec3::new(0.5, 0.0, -2.0), 0),
            object(2, Vec3::new(-3.0, 0.0, -2.0), 0),
            object(3, Vec3::new(0.0, 0.0, -4.0), 0),
            object(4, Vec3::new(2.0, 0.0, -2.0), 0),
        ];
        sort_objects(&mut objects, SortMode::WorldSpaceZBackToFrontXOutToMiddle);
        assert_eq!(ids(&objects), vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_average_space_origin() {
        let mut objects = vec![
            object(1, Vec3::new(0.0, 0.0, -2.0), 0),
            object(2, Vec3::new(0.0, 0.0, -8.0), 0),
            object(3, Vec3::new(0.0, 0.0, -4.0), 0),
        ];
        let views = [view_at(Vec3::new(-0.03, 0.0, 0.0)), view_at(Vec3::new(0.03, 0.0, 0.0))];

        sort_objects_using_view(&mut objects, SortMode::AverageSpaceOriginFrontToBack, &views);
        assert_eq!(ids(&objects), vec![1, 3, 2]);

        sort_objects_using_view(&mut objects, SortMode::AverageSpaceOriginBackToFront, &views);
        assert_eq!(ids(&objects), vec![2, 3, 1]);
    }

    #[test]
    fn test_view_sort_uses_camera_position() {
        // Camera behind the objects, looking down +z
        let mut objects = vec![object(1, Vec3::new(0.0, 0.0, -2.0), 0), object(2, Vec3::new(0.0, 0.0, -8.0), 0)];
        let turned = Mat4::new_translation(&Vec3::new(0.0, 0.0, -10.0))
            * Mat4::from_euler_angles(0.0, std::f32::consts::PI, 0.0);
        let view = RenderView {
            world_from_eye: turned,
            eye_from_world: turned.try_inverse().unwrap(),
            ..RenderView::default()
        };
        sort_objects_using_view(&mut objects, SortMode::AverageSpaceOriginFrontToBack, &[view]);
        assert_eq!(ids(&objects), vec![2, 1]);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "at least 1 view"))]
    fn test_view_sort_without_views() {
        let mut objects = vec![object(1, Vec3::zeros(), 0), object(2, Vec3::new(0.0, 0.0, -1.0), 0)];
        sort_objects_using_view(&mut objects, SortMode::AverageSpaceOriginBackToFront, &[]);
        assert_eq!(ids(&objects), vec![1, 2]);
    }
}
