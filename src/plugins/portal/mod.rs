//! Portal plugin: the paired portal entities, their placement on level
//! geometry, the frame/hole meshes and frame segment colliders kept in
//! lockstep with the portal basis, the render-to-texture portal view cameras,
//! and the teleport integration for entities crossing a portal.

use std::f32::consts::FRAC_PI_4;

use bevy::{
    prelude::*,
    reflect::FromReflect,
    render::{
        camera::{Projection, RenderTarget},
        mesh::Indices,
        render_resource::{
            Extent3d, PrimitiveTopology, TextureDescriptor, TextureDimension, TextureFormat,
            TextureUsages,
        },
        view::RenderLayers,
    },
};
use bevy_rapier3d::prelude::*;
use iyes_loopless::prelude::*;
use leafwing_input_manager::prelude::ActionState;

mod material;
mod orientation;
mod warp;

use material::{ClosedPortalMaterial, ClosedPortalUniform, OpenPortalMaterial};
use orientation::reorient;
pub use warp::{integrate_portal_crossings, warp_view, PortalTeleport};

use super::{
    first_person_controller::{FirstPersonCamera, FirstPersonController},
    input::Actions,
    physics::*,
};

/// Half extents of the portal opening.
pub const PORTAL_GUT_WIDTH: f32 = 0.6;
pub const PORTAL_GUT_HEIGHT: f32 = 1.0;

const PORTAL_FRAME_WIDTH: f32 = 4. * PORTAL_GUT_WIDTH;
const PORTAL_FRAME_HEIGHT: f32 = 2.4 * PORTAL_GUT_HEIGHT;
/// Forward offsets keeping the meshes clear of the mounting wall (and the
/// hole clear of the frame), preventing Z fighting.
const FRAME_MESH_OFFSET: f32 = 0.02;
const HOLE_MESH_OFFSET: f32 = 0.01;
const FRAME_SEGMENT_VERTICAL_OFFSET: f32 = 2. * PORTAL_GUT_HEIGHT;
const FRAME_SEGMENT_LATERAL_OFFSET: f32 = 2. * PORTAL_GUT_WIDTH;
const FRAME_SEGMENT_THICKNESS: f32 = 0.05;
/// Unplaced portals and their colliders sit here, far below the play space.
const UNPLACED_PARKING: Vec3 = Vec3::new(0., -1000., 0.);
const HOLE_MESH_SIDES: usize = 24;

#[derive(Debug)]
pub struct PortalPlugin;

#[derive(Debug, SystemLabel)]
pub enum PortalLabels {
    ShootPortals,
    UpdateMainCamera,
    CreateCameras,
    SyncPlacement,
    SyncCameras,
    TeleportEntities,
}

/// One of the four solid bars around the portal opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect, FromReflect)]
pub enum FrameSegment {
    Top,
    Bottom,
    Left,
    Right,
}

impl FrameSegment {
    pub const ALL: [FrameSegment; 4] = [
        FrameSegment::Top,
        FrameSegment::Bottom,
        FrameSegment::Left,
        FrameSegment::Right,
    ];

    /// World-space offset of this segment from the portal position, given the
    /// portal's current basis.
    pub fn local_offset(self, up: Vec3, right: Vec3) -> Vec3 {
        match self {
            FrameSegment::Top => up * FRAME_SEGMENT_VERTICAL_OFFSET,
            FrameSegment::Bottom => up * -FRAME_SEGMENT_VERTICAL_OFFSET,
            FrameSegment::Left => right * -FRAME_SEGMENT_LATERAL_OFFSET,
            FrameSegment::Right => right * FRAME_SEGMENT_LATERAL_OFFSET,
        }
    }

    /// Collider shape of this segment. The horizontal bars span the full
    /// frame width, the vertical bars only the gap left between them.
    pub fn collider(self) -> Collider {
        match self {
            FrameSegment::Top | FrameSegment::Bottom => Collider::cuboid(
                3. * PORTAL_GUT_WIDTH,
                PORTAL_GUT_HEIGHT,
                FRAME_SEGMENT_THICKNESS,
            ),
            FrameSegment::Left | FrameSegment::Right => Collider::cuboid(
                PORTAL_GUT_WIDTH,
                PORTAL_GUT_HEIGHT,
                FRAME_SEGMENT_THICKNESS,
            ),
        }
    }
}

/// A placeable portal. Owns the pose from which all dependent transforms
/// (frame mesh, hole mesh, frame segments) are derived; `place_at` is the
/// only mutator of that pose.
#[derive(Debug, Clone, Component, Reflect, FromReflect)]
#[reflect(Component)]
pub struct Portal {
    position: Vec3,
    face_direction: Vec3,
    /// Rest-state facing, fixed at construction. Every placement's rotation
    /// is measured against this anchor, never against the previous
    /// orientation, so placements are absolute rather than incremental.
    origin_face_direction: Vec3,
    up_direction: Vec3,
    right_direction: Vec3,
    rotation_angle: f32,
    rotation_axis: Vec3,
    has_been_placed: bool,
    /// Non-owning back-reference to the paired portal; the scene owns both
    /// entities.
    paired_portal: Option<Entity>,
}

impl Default for Portal {
    fn default() -> Self {
        Portal {
            position: UNPLACED_PARKING,
            face_direction: Vec3::Z,
            origin_face_direction: Vec3::Z,
            up_direction: Vec3::Y,
            right_direction: Vec3::NEG_X,
            rotation_angle: 0.,
            rotation_axis: Vec3::Y,
            has_been_placed: false,
            paired_portal: None,
        }
    }
}

impl Portal {
    /// Place the portal at `position` on a surface with the given outward
    /// normal. Returns `false` (and changes nothing) when the requested pose
    /// is identical to the current one.
    pub fn place_at(&mut self, position: Vec3, surface_normal: Vec3) -> bool {
        if self.has_been_placed
            && position == self.position
            && surface_normal == self.face_direction
        {
            return false;
        }

        let orientation = reorient(self.origin_face_direction, surface_normal);
        self.position = position;
        self.face_direction = orientation.forward;
        self.up_direction = orientation.up;
        self.right_direction = orientation.right;
        self.rotation_angle = orientation.angle;
        self.rotation_axis = orientation.axis;
        self.has_been_placed = true;
        true
    }

    /// Store the back-reference to the paired portal. Symmetry is the
    /// caller's responsibility.
    pub fn set_pair(&mut self, other: Entity) {
        self.paired_portal = Some(other);
    }

    pub fn paired_portal(&self) -> Option<Entity> {
        self.paired_portal
    }

    pub fn has_been_placed(&self) -> bool {
        self.has_been_placed
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn face_direction(&self) -> Vec3 {
        self.face_direction
    }

    pub fn up_direction(&self) -> Vec3 {
        self.up_direction
    }

    pub fn right_direction(&self) -> Vec3 {
        self.right_direction
    }

    /// True only when this portal and its paired portal have both been
    /// placed. `paired` is the resolved component behind `paired_portal`.
    pub fn is_link_active(&self, paired: Option<&Portal>) -> bool {
        match (self.paired_portal, paired) {
            (Some(_), Some(paired)) => self.has_been_placed && paired.has_been_placed,
            _ => false,
        }
    }

    /// Placement rotation applied to every dependent transform.
    pub fn rotation(&self) -> Quat {
        Quat::from_axis_angle(self.rotation_axis, self.rotation_angle)
    }

    /// Placement of the opening an observer passes through.
    pub fn hole_transform(&self) -> Transform {
        Transform {
            translation: self.position + self.face_direction * HOLE_MESH_OFFSET,
            rotation: self.rotation(),
            scale: Vec3::ONE,
        }
    }

    /// Placement of the visual border mesh.
    pub fn frame_transform(&self) -> Transform {
        Transform {
            translation: self.position + self.face_direction * FRAME_MESH_OFFSET,
            rotation: self.rotation(),
            scale: Vec3::ONE,
        }
    }

    /// Placement of one of the four frame segment colliders.
    pub fn segment_transform(&self, segment: FrameSegment) -> Transform {
        Transform {
            translation: self.position
                + segment.local_offset(self.up_direction, self.right_direction),
            rotation: self.rotation(),
            scale: Vec3::ONE,
        }
    }

    /// Warp a view matrix through this portal to the paired portal. When the
    /// pair reference cannot be resolved the input is returned unchanged and
    /// the teleport is simply skipped.
    pub fn convert_view(&self, view: Mat4, paired: Option<&Portal>) -> Mat4 {
        match paired {
            Some(paired) => warp_view(
                view,
                self.hole_transform().compute_matrix(),
                paired.hole_transform().compute_matrix(),
            ),
            None => {
                error!("trying to convert a portal view without a valid paired portal");
                view
            }
        }
    }
}

/// Entities of the two portals, in firing-slot order.
#[derive(Debug, Resource)]
pub struct PortalEntities {
    pub portals: [Entity; 2],
}

#[derive(Debug, Default, Resource)]
struct PortalResources {
    render_targets: [Handle<Image>; 2],
    open_materials: [Handle<OpenPortalMaterial>; 2],
    closed_materials: [Handle<ClosedPortalMaterial>; 2],
    frame_materials: [Handle<StandardMaterial>; 2],
    frame_mesh: Handle<Mesh>,
    hole_mesh: Handle<Mesh>,
    main_camera: Option<Entity>,
    cameras: [Option<Entity>; 2],
    link_open: bool,
}

/// Visual border mesh of a portal.
#[derive(Debug, Component)]
struct PortalFrameMesh {
    portal: Entity,
}

/// Visual opening mesh of a portal.
#[derive(Debug, Component)]
struct PortalHoleMesh {
    portal: Entity,
    slot: usize,
}

/// One static collider bar of a portal's frame.
#[derive(Debug, Component)]
struct PortalFrameSegment {
    portal: Entity,
    segment: FrameSegment,
}

/// Camera rendering the view through one portal into its render target.
#[derive(Debug, Component)]
pub struct PortalViewCamera {
    pub slot: usize,
}

impl Plugin for PortalPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugin(MaterialPlugin::<OpenPortalMaterial>::default())
            .add_plugin(MaterialPlugin::<ClosedPortalMaterial>::default())
            .register_type::<Portal>()
            .register_type::<PortalTeleport>()
            .add_startup_system(setup_portal_assets)
            .add_system_set(
                ConditionSet::new()
                    .run_if_resource_exists::<PortalResources>()
                    .run_unless_resource_exists::<PortalEntities>()
                    .with_system(spawn_portals)
                    .into(),
            )
            .add_system_set(
                ConditionSet::new()
                    .run_if_resource_exists::<PortalResources>()
                    .label(PortalLabels::UpdateMainCamera)
                    .with_system(update_main_camera)
                    .into(),
            )
            .add_system_set(
                ConditionSet::new()
                    .run_if_resource_exists::<PortalEntities>()
                    .label(PortalLabels::ShootPortals)
                    .with_system(fire_portals)
                    .into(),
            )
            .add_system(
                sync_portal_placement
                    .label(PortalLabels::SyncPlacement)
                    .after(PortalLabels::ShootPortals),
            )
            .add_system_set(
                ConditionSet::new()
                    .run_if_resource_exists::<PortalResources>()
                    .label(PortalLabels::CreateCameras)
                    .after(PortalLabels::UpdateMainCamera)
                    .with_system(create_portal_cameras)
                    .into(),
            )
            .add_system_set(
                ConditionSet::new()
                    .run_if_resource_exists::<PortalEntities>()
                    .label(PortalLabels::SyncCameras)
                    .after(PortalLabels::CreateCameras)
                    .after(PortalLabels::SyncPlacement)
                    .with_system(sync_portal_cameras)
                    .with_system(update_portal_materials)
                    .into(),
            )
            .add_system(
                integrate_portal_crossings
                    .label(PortalLabels::TeleportEntities)
                    .after(PortalLabels::SyncCameras),
            );
    }
}

/// Create the meshes, render targets and materials shared by both portals.
fn setup_portal_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
    mut open_materials: ResMut<Assets<OpenPortalMaterial>>,
    mut closed_materials: ResMut<Assets<ClosedPortalMaterial>>,
    mut std_materials: ResMut<Assets<StandardMaterial>>,
) {
    let frame_mesh = meshes.add(
        shape::Quad {
            size: Vec2::new(PORTAL_FRAME_WIDTH, PORTAL_FRAME_HEIGHT),
            flip: false,
        }
        .into(),
    );
    let hole_mesh = meshes.add(generate_hole_mesh(PORTAL_GUT_WIDTH, PORTAL_GUT_HEIGHT));

    let tints = [Color::ORANGE, Color::rgb(0.2, 0.5, 1.)];
    let mut render_targets: [Handle<Image>; 2] = default();
    let mut open: [Handle<OpenPortalMaterial>; 2] = default();
    let mut closed: [Handle<ClosedPortalMaterial>; 2] = default();
    let mut frames: [Handle<StandardMaterial>; 2] = default();
    for slot in 0..2 {
        let tex_size = Extent3d {
            width: 1280,
            height: 720,
            ..default()
        };
        let mut image = Image {
            texture_descriptor: TextureDescriptor {
                label: None,
                size: tex_size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: TextureFormat::Bgra8UnormSrgb,
                usage: TextureUsages::TEXTURE_BINDING
                    | TextureUsages::COPY_DST
                    | TextureUsages::RENDER_ATTACHMENT,
            },
            ..default()
        };
        image.resize(tex_size);
        render_targets[slot] = images.add(image);

        open[slot] = open_materials.add(OpenPortalMaterial {
            texture: render_targets[slot].clone(),
        });
        closed[slot] = closed_materials.add(ClosedPortalMaterial {
            uniform: ClosedPortalUniform { color: tints[slot] },
        });
        frames[slot] = std_materials.add(StandardMaterial {
            base_color: tints[slot],
            perceptual_roughness: 0.8,
            ..default()
        });
    }

    commands.insert_resource(PortalResources {
        render_targets,
        open_materials: open,
        closed_materials: closed,
        frame_materials: frames,
        frame_mesh,
        hole_mesh,
        main_camera: None,
        cameras: [None, None],
        link_open: false,
    });
}

/// Spawn the two persistent portals, their meshes and their frame segment
/// colliders, and link them as a pair. Everything starts parked out of the
/// play space until first placement.
fn spawn_portals(mut commands: Commands, portal_res: Res<PortalResources>) {
    let entity_a = commands.spawn_empty().id();
    let entity_b = commands.spawn_empty().id();

    for (slot, (entity, other)) in [(entity_a, entity_b), (entity_b, entity_a)]
        .into_iter()
        .enumerate()
    {
        let mut portal = Portal::default();
        portal.set_pair(other);

        commands.spawn((
            PbrBundle {
                mesh: portal_res.frame_mesh.clone(),
                material: portal_res.frame_materials[slot].clone(),
                transform: portal.frame_transform(),
                visibility: Visibility { is_visible: false },
                ..default()
            },
            RenderLayers::layer(1),
            PortalFrameMesh { portal: entity },
            Name::from(format!("Portal {} frame", slot)),
        ));
        commands.spawn((
            MaterialMeshBundle {
                mesh: portal_res.hole_mesh.clone(),
                material: portal_res.closed_materials[slot].clone(),
                transform: portal.hole_transform(),
                visibility: Visibility { is_visible: false },
                ..default()
            },
            RenderLayers::layer(1),
            PortalHoleMesh {
                portal: entity,
                slot,
            },
            Name::from(format!("Portal {} hole", slot)),
        ));
        for segment in FrameSegment::ALL {
            commands.spawn((
                TransformBundle::from(portal.segment_transform(segment)),
                segment.collider(),
                CollisionGroups::new(PORTAL_FRAME_GROUP, PLAYER_GROUP | PROPS_GROUP),
                PortalFrameSegment {
                    portal: entity,
                    segment,
                },
                Name::from(format!("Portal {} frame segment {:?}", slot, segment)),
            ));
        }

        commands
            .entity(entity)
            .insert((portal, Name::from(format!("Portal {}", slot))));
    }

    commands.insert_resource(PortalEntities {
        portals: [entity_a, entity_b],
    });
    info!("spawned portal pair {:?} <-> {:?}", entity_a, entity_b);
}

/// Obtain the main camera if not already present in the resources, and let it
/// render the portal meshes layer.
fn update_main_camera(
    mut commands: Commands,
    cameras_query: Query<(&Camera, Entity), With<FirstPersonCamera>>,
    windows: Res<Windows>,
    mut portal_res: ResMut<PortalResources>,
) {
    if portal_res.main_camera.is_some() {
        return;
    }
    let Some(primary) = windows.get_primary() else {
        return;
    };
    if let Ok((camera, entity)) = cameras_query.get_single() {
        if camera.target == RenderTarget::Window(primary.id()) {
            commands
                .entity(entity)
                .insert(RenderLayers::default().with(1));
            info!("updating main camera to entity {:?}", entity);
            portal_res.main_camera = Some(entity);
        }
    }
}

/// On the fire actions, cast the player's look ray against the static level
/// geometry and re-place the corresponding portal at the hit.
fn fire_portals(
    player_query: Query<&ActionState<Actions>, With<FirstPersonController>>,
    camera_query: Query<&GlobalTransform, With<FirstPersonCamera>>,
    slots: Res<PortalEntities>,
    mut portals: Query<&mut Portal>,
    rapier: Res<RapierContext>,
) {
    let (Ok(actions), Ok(camera)) = (player_query.get_single(), camera_query.get_single()) else {
        return;
    };
    for (action, slot) in [
        (Actions::FirePrimaryPortal, 0),
        (Actions::FireSecondaryPortal, 1),
    ] {
        if !actions.just_pressed(action) {
            continue;
        }
        let Some((point, normal)) = portal_surface_hit(camera, &rapier) else {
            continue;
        };
        let Ok(mut portal) = portals.get_mut(slots.portals[slot]) else {
            continue;
        };
        if portal.place_at(point, normal) {
            info!("portal {} placed at {} facing {}", slot, point, normal);
        } else {
            debug!("portal {} placement unchanged", slot);
        }
    }
}

/// Cast the camera's look ray against surfaces portals may be mounted on.
fn portal_surface_hit(camera: &GlobalTransform, rapier: &RapierContext) -> Option<(Vec3, Vec3)> {
    let (_entity, intersection) = rapier.cast_ray_and_get_normal(
        camera.translation(),
        camera.forward(),
        Real::MAX,
        true,
        QueryFilter {
            groups: Some(CollisionGroups::new(RAYCAST_GROUP, WALLS_GROUP | GROUND_GROUP).into()),
            ..default()
        },
    )?;
    Some((intersection.point, intersection.normal))
}

/// Push a re-placed portal's pose out to its frame mesh, hole mesh and frame
/// segment colliders.
fn sync_portal_placement(
    portals: Query<(&Portal, Entity), Changed<Portal>>,
    mut frame_meshes: Query<
        (&PortalFrameMesh, &mut Transform, &mut Visibility),
        (Without<PortalHoleMesh>, Without<PortalFrameSegment>),
    >,
    mut hole_meshes: Query<
        (&PortalHoleMesh, &mut Transform, &mut Visibility),
        (Without<PortalFrameMesh>, Without<PortalFrameSegment>),
    >,
    mut segments: Query<
        (&PortalFrameSegment, &mut Transform),
        (Without<PortalFrameMesh>, Without<PortalHoleMesh>),
    >,
) {
    for (portal, portal_entity) in &portals {
        for (frame, mut transform, mut visibility) in &mut frame_meshes {
            if frame.portal == portal_entity {
                *transform = portal.frame_transform();
                visibility.is_visible = portal.has_been_placed();
            }
        }
        for (hole, mut transform, mut visibility) in &mut hole_meshes {
            if hole.portal == portal_entity {
                *transform = portal.hole_transform();
                visibility.is_visible = portal.has_been_placed();
            }
        }
        for (segment, mut transform) in &mut segments {
            if segment.portal == portal_entity {
                *transform = portal.segment_transform(segment.segment);
            }
        }
    }
}

/// Spawn one render-to-texture camera per portal once the main camera is
/// known.
fn create_portal_cameras(mut commands: Commands, mut portal_res: ResMut<PortalResources>) {
    if portal_res.main_camera.is_none() {
        return;
    }
    for slot in 0..2 {
        if portal_res.cameras[slot].is_some() {
            continue;
        }
        let camera = commands
            .spawn((
                Camera3dBundle {
                    camera: Camera {
                        // Render before the main camera.
                        priority: -1 - slot as isize,
                        target: RenderTarget::Image(portal_res.render_targets[slot].clone()),
                        ..default()
                    },
                    projection: Projection::Perspective(PerspectiveProjection {
                        fov: FRAC_PI_4,
                        aspect_ratio: 16. / 9.,
                        near: 0.1,
                        far: 1000.,
                    }),
                    ..default()
                },
                PortalViewCamera { slot },
                Name::from(format!("Portal camera {}", slot)),
            ))
            .id();
        portal_res.cameras[slot] = Some(camera);
        info!("created portal camera for slot {}", slot);
    }
}

/// Position each portal camera by warping the main camera's view through its
/// portal, so the render target shows the paired portal's perspective.
fn sync_portal_cameras(
    slots: Res<PortalEntities>,
    portals: Query<&Portal>,
    main_camera: Query<&GlobalTransform, (With<FirstPersonCamera>, Without<PortalViewCamera>)>,
    mut cameras: Query<(&PortalViewCamera, &mut Transform)>,
) {
    let Ok(main_camera) = main_camera.get_single() else {
        return;
    };
    let Ok([portal_a, portal_b]) = portals.get_many(slots.portals) else {
        return;
    };
    if !portal_a.is_link_active(Some(portal_b)) {
        return;
    }
    let view = main_camera.compute_matrix().inverse();
    for (camera, mut transform) in &mut cameras {
        let (source, destination) = if camera.slot == 0 {
            (portal_a, portal_b)
        } else {
            (portal_b, portal_a)
        };
        let warped = source.convert_view(view, Some(destination));
        *transform = Transform::from_matrix(warped.inverse());
    }
}

/// Swap the hole materials between the closed tint and the live render target
/// when the link state changes.
fn update_portal_materials(
    mut commands: Commands,
    slots: Res<PortalEntities>,
    portals: Query<&Portal>,
    holes: Query<(&PortalHoleMesh, Entity)>,
    mut portal_res: ResMut<PortalResources>,
) {
    let Ok([portal_a, portal_b]) = portals.get_many(slots.portals) else {
        return;
    };
    let link_active = portal_a.is_link_active(Some(portal_b));
    if link_active == portal_res.link_open {
        return;
    }
    portal_res.link_open = link_active;
    for (hole, entity) in &holes {
        if link_active {
            commands
                .entity(entity)
                .remove::<Handle<ClosedPortalMaterial>>()
                .insert(portal_res.open_materials[hole.slot].clone());
        } else {
            commands
                .entity(entity)
                .remove::<Handle<OpenPortalMaterial>>()
                .insert(portal_res.closed_materials[hole.slot].clone());
        }
    }
    info!(
        "portal link {}",
        if link_active { "active" } else { "inactive" }
    );
}

/// Elliptical fan mesh for the portal opening.
fn generate_hole_mesh(radius_x: f32, radius_y: f32) -> Mesh {
    use std::f32::consts::TAU;

    let mut positions = Vec::with_capacity(HOLE_MESH_SIDES + 2);
    let mut normals = Vec::with_capacity(HOLE_MESH_SIDES + 2);
    let mut uvs = Vec::with_capacity(HOLE_MESH_SIDES + 2);
    positions.push([0., 0., 0.]);
    normals.push([0., 0., 1.]);
    uvs.push([0.5, 0.5]);
    for i in 0..=HOLE_MESH_SIDES {
        let angle = i as f32 / HOLE_MESH_SIDES as f32 * TAU;
        let (sin, cos) = angle.sin_cos();
        positions.push([cos * radius_x, sin * radius_y, 0.]);
        normals.push([0., 0., 1.]);
        uvs.push([0.5 + cos * 0.5, 0.5 - sin * 0.5]);
    }

    let mut indices = Vec::with_capacity(HOLE_MESH_SIDES * 3);
    for i in 1..=HOLE_MESH_SIDES as u32 {
        indices.extend_from_slice(&[0, i, i + 1]);
    }

    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.set_indices(Some(Indices::U32(indices)));
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-4;

    #[test]
    fn repeated_identical_placement_is_a_no_op() {
        let mut portal = Portal::default();
        let position = Vec3::new(2., 1., -3.);
        let normal = Vec3::X;
        assert!(portal.place_at(position, normal));
        assert!(!portal.place_at(position, normal));
        // A different pose places again.
        assert!(portal.place_at(position, Vec3::Y));
    }

    #[test]
    fn placement_on_the_origin_facing_reproduces_the_rest_state() {
        let mut portal = Portal::default();
        assert!(portal.place_at(Vec3::new(1., 2., 3.), Vec3::Z));
        assert!(portal.rotation_angle.abs() < TOLERANCE);
        assert!(portal.up_direction().abs_diff_eq(Vec3::Y, TOLERANCE));
        assert!(portal.right_direction().abs_diff_eq(Vec3::NEG_X, TOLERANCE));
        assert!(portal.rotation().abs_diff_eq(Quat::IDENTITY, TOLERANCE));
    }

    #[test]
    fn placement_updates_the_basis_and_pose() {
        let mut portal = Portal::default();
        assert!(portal.place_at(Vec3::new(0., 1., -5.), Vec3::X));
        assert!(portal.has_been_placed());
        assert_eq!(portal.position(), Vec3::new(0., 1., -5.));
        assert!(portal.face_direction().abs_diff_eq(Vec3::X, TOLERANCE));
        // The rotation maps the rest facing onto the new facing.
        let rotated = portal.rotation() * Vec3::Z;
        assert!(rotated.abs_diff_eq(Vec3::X, TOLERANCE));
    }

    #[test]
    fn link_activates_once_both_portals_are_placed() {
        let mut a = Portal::default();
        let mut b = Portal::default();

        // Unpaired portals never report an active link.
        a.place_at(Vec3::ZERO, Vec3::Z);
        b.place_at(Vec3::X * 10., Vec3::NEG_Z);
        assert!(!a.is_link_active(None));

        let mut a = Portal::default();
        let mut b = Portal::default();
        a.set_pair(Entity::from_raw(1));
        b.set_pair(Entity::from_raw(0));
        assert!(!a.is_link_active(Some(&b)));
        a.place_at(Vec3::ZERO, Vec3::Z);
        assert!(!a.is_link_active(Some(&b)));
        b.place_at(Vec3::X * 10., Vec3::NEG_Z);
        assert!(a.is_link_active(Some(&b)));
        assert!(b.is_link_active(Some(&a)));
    }

    #[test]
    fn convert_view_without_a_pair_returns_the_input() {
        let mut portal = Portal::default();
        portal.place_at(Vec3::ZERO, Vec3::Z);
        let view = Transform::from_xyz(0., 0., 5.).compute_matrix().inverse();
        let converted = portal.convert_view(view, None);
        assert!(converted.abs_diff_eq(view, TOLERANCE));
    }

    #[test]
    fn frame_segments_follow_the_hole_rotation() {
        let mut portal = Portal::default();
        let position = Vec3::new(4., 2., -1.);
        let normal = Vec3::new(1., 0., 1.).normalize();
        assert!(portal.place_at(position, normal));

        let rotation = portal.rotation();
        assert!(portal
            .hole_transform()
            .rotation
            .abs_diff_eq(rotation, TOLERANCE));
        for segment in FrameSegment::ALL {
            let expected = Transform {
                translation: position
                    + segment.local_offset(portal.up_direction(), portal.right_direction()),
                rotation,
                scale: Vec3::ONE,
            };
            let actual = portal.segment_transform(segment);
            assert!(actual
                .translation
                .abs_diff_eq(expected.translation, TOLERANCE));
            assert!(actual.rotation.abs_diff_eq(expected.rotation, TOLERANCE));
        }
    }
}
