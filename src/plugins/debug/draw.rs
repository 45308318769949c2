use bevy::{
    math::Vec4Swizzles, prelude::*, render::camera::CameraProjection,
    render::camera::Projection,
};
use bevy_prototype_debug_lines::DebugLines;

use crate::plugins::portal::{Portal, PortalViewCamera};

#[derive(Debug)]
/// Draws the placement basis of each portal and the frustum of each portal
/// view camera.
pub struct DebugDrawPlugin;

impl Plugin for DebugDrawPlugin {
    fn build(&self, app: &mut App) {
        app.add_system(draw_portal_bases)
            .add_system(draw_portal_camera_frustums);
    }
}

fn draw_portal_bases(portals: Query<&Portal>, mut lines: ResMut<DebugLines>) {
    for portal in &portals {
        if !portal.has_been_placed() {
            continue;
        }
        let origin = portal.position();
        lines.line_colored(origin, origin + portal.face_direction(), 0., Color::BLUE);
        lines.line_colored(origin, origin + portal.up_direction(), 0., Color::GREEN);
        lines.line_colored(origin, origin + portal.right_direction(), 0., Color::RED);
    }
}

fn draw_portal_camera_frustums(
    cameras: Query<(&GlobalTransform, &Projection), With<PortalViewCamera>>,
    mut lines: ResMut<DebugLines>,
) {
    for (transform, projection) in &cameras {
        draw_camera_frustum(
            transform.compute_matrix(),
            projection.get_projection_matrix(),
            &mut lines,
        );
    }
}

fn draw_camera_frustum(cam_matrix: Mat4, projection: Mat4, lines: &mut ResMut<DebugLines>) {
    const NEAR_COLOR: Color = Color::BLACK;
    const FAR_COLOR: Color = Color::WHITE;

    let inv_viewprojection = (projection * cam_matrix.inverse()).inverse();

    let frustum_corners_world = [
        Vec4::new(-1., -1., 0., 1.),
        Vec4::new(1., -1., 0., 1.),
        Vec4::new(-1., 1., 0., 1.),
        Vec4::new(1., 1., 0., 1.),
        Vec4::new(-1., -1., 1., 1.),
        Vec4::new(1., -1., 1., 1.),
        Vec4::new(-1., 1., 1., 1.),
        Vec4::new(1., 1., 1., 1.),
    ]
    .into_iter()
    .map(|v| {
        let vh = inv_viewprojection * v;
        vh.xyz() / vh.w
    })
    .collect::<Vec<_>>();

    // Depth lines
    lines.line_gradient(frustum_corners_world[0], frustum_corners_world[4], 0., NEAR_COLOR, FAR_COLOR);
    lines.line_gradient(frustum_corners_world[1], frustum_corners_world[5], 0., NEAR_COLOR, FAR_COLOR);
    lines.line_gradient(frustum_corners_world[2], frustum_corners_world[6], 0., NEAR_COLOR, FAR_COLOR);
    lines.line_gradient(frustum_corners_world[3], frustum_corners_world[7], 0., NEAR_COLOR, FAR_COLOR);

    // Near plane
    lines.line_gradient(frustum_corners_world[0], frustum_corners_world[1], 0., NEAR_COLOR, NEAR_COLOR);
    lines.line_gradient(frustum_corners_world[0], frustum_corners_world[2], 0., NEAR_COLOR, NEAR_COLOR);
    lines.line_gradient(frustum_corners_world[1], frustum_corners_world[3], 0., NEAR_COLOR, NEAR_COLOR);
    lines.line_gradient(frustum_corners_world[2], frustum_corners_world[3], 0., NEAR_COLOR, NEAR_COLOR);

    // Far plane
    lines.line_gradient(frustum_corners_world[4], frustum_corners_world[5], 0., FAR_COLOR, FAR_COLOR);
    lines.line_gradient(frustum_corners_world[4], frustum_corners_world[6], 0., FAR_COLOR, FAR_COLOR);
    lines.line_gradient(frustum_corners_world[5], frustum_corners_world[7], 0., FAR_COLOR, FAR_COLOR);
    lines.line_gradient(frustum_corners_world[6], frustum_corners_world[7], 0., FAR_COLOR, FAR_COLOR);
}
