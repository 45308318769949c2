//! This module contains the first person controller plugin.
//!
//! TODO features:
//!
//! * Crouching
//! * Climbing slopes and stairs

use bevy::{prelude::*, reflect::FromReflect, render::camera::Projection};
use bevy_rapier3d::prelude::*;
use euclid::Angle;
use leafwing_input_manager::prelude::*;

use crate::plugins::{
    game::settings::GameSettings, input::default_input_map, physics::*, portal::PortalTeleport,
};

use super::input::Actions;

#[derive(Debug)]
/// First person controller plugin, which registers the required systems to use the first person
/// controller also provided by this module.
pub struct FirstPersonControllerPlugin;

impl Plugin for FirstPersonControllerPlugin {
    fn build(&self, app: &mut App) {
        app.add_system(spawn_controller.label(FirstPersonLabels::SpawnControllers))
            .add_system(process_controller_inputs.label(FirstPersonLabels::ProcessInputs));
    }
}

#[derive(Debug, SystemLabel)]
/// Labels for the first person controller systems.
pub enum FirstPersonLabels {
    SpawnControllers,
    ProcessInputs,
}

const PLAYER_HEIGHT: f32 = 1.8;
const EYE_HEIGHT: f32 = 1.25;
const CAPSULE_RADIUS: f32 = 0.4;
/// How far below the capsule the ground probe may hit before the controller
/// counts as airborne.
const GROUND_PROBE_SLACK: f32 = 0.1;

const GROUNDED_DAMPING: f32 = 0.9;
const AIRBORNE_DAMPING: f32 = 0.1;

#[derive(Debug, Component)]
/// First person controller component.
pub struct FirstPersonController {
    pub theta: Angle<f32>,
    pub phi: Angle<f32>,
    pub camera_anchor: Entity,
}

#[derive(Debug, Default, Component, Reflect, FromReflect)]
#[reflect(Component)]
/// Marker trait for first person cameras
pub struct FirstPersonCamera;

#[derive(Debug, Component, Default, Reflect, FromReflect)]
#[reflect(Component)]
pub struct FirstPersonControllerSpawner {}

#[derive(Debug, Bundle, Default)]
pub struct FirstPersonControllerBundle {
    #[bundle]
    pub spatial: SpatialBundle,
    pub spawner: FirstPersonControllerSpawner,
}

fn spawn_controller(
    mut commands: Commands,
    spawners_query: Query<(&FirstPersonControllerSpawner, Entity)>,
) {
    for (_spawner, id) in &spawners_query {
        const CAMERA_OFFSET: Vec3 = Vec3::new(0., EYE_HEIGHT - PLAYER_HEIGHT / 2., 0.);

        let player_root = commands
            .entity(id)
            .insert(InputManagerBundle {
                action_state: ActionState::default(),
                input_map: default_input_map(),
            })
            .insert((
                RigidBody::Dynamic,
                Collider::capsule_y(PLAYER_HEIGHT / 2., CAPSULE_RADIUS),
                LockedAxes::ROTATION_LOCKED_X | LockedAxes::ROTATION_LOCKED_Z,
                Velocity::default(),
                ExternalImpulse::default(),
                Damping {
                    linear_damping: GROUNDED_DAMPING,
                    angular_damping: 0.,
                },
                Ccd::enabled(),
                Name::from("Player"),
                CollisionGroups::new(PLAYER_GROUP, ALL_GROUPS),
                PortalTeleport::default(),
            ))
            .id();

        let camera_anchor = commands
            .spawn(SpatialBundle::from(Transform::from_translation(
                CAMERA_OFFSET,
            )))
            .insert(Name::from("Camera anchor"))
            .id();

        let camera = commands
            .spawn(Camera3dBundle {
                projection: Projection::Perspective(PerspectiveProjection {
                    fov: std::f32::consts::FRAC_PI_4,
                    // TODO: make the portal cameras use the main camera FOV so we can change this
                    aspect_ratio: 16. / 9.,
                    near: 0.1,
                    far: 1000.,
                }),
                ..default()
            })
            .insert((Name::from("Player camera"), FirstPersonCamera))
            .id();

        commands.entity(camera_anchor).push_children(&[camera]);

        commands
            .entity(player_root)
            .add_child(camera_anchor)
            .insert(FirstPersonController {
                theta: Angle::zero(),
                phi: Angle::zero(),
                camera_anchor,
            });

        commands.entity(id).remove::<FirstPersonControllerSpawner>();
    }
}

const MOUSE_ANGVEL_MULTIPLIER: f32 = -75.;

fn process_controller_inputs(
    settings: Res<GameSettings>,
    rapier: Res<RapierContext>,
    mut player_query: Query<(
        Entity,
        &ActionState<Actions>,
        &mut FirstPersonController,
        &mut Velocity,
        &mut ExternalImpulse,
        &mut Damping,
        &Transform,
    )>,
    mut camera_query: Query<&mut Transform, Without<FirstPersonController>>,
) {
    for (entity, input_state, mut controller, mut velocity, mut impulse, mut damping, transform) in
        &mut player_query
    {
        let grounded = ground_probe(&rapier, entity, transform);
        damping.linear_damping = if grounded {
            GROUNDED_DAMPING
        } else {
            AIRBORNE_DAMPING
        };

        let mut new_velocities = Vec3::ZERO;

        // Process movement on the forward axis
        let forward = transform.forward();
        match (
            input_state.pressed(Actions::Forward),
            input_state.pressed(Actions::Backwards),
            input_state.pressed(Actions::Sprint),
        ) {
            (true, false, sprint) => {
                let k = if sprint { settings.sprint_multiplier } else { 1. };
                new_velocities.x = settings.player_speed * k * forward.x;
                new_velocities.z = settings.player_speed * k * forward.z;
            }
            (false, true, sprint) => {
                let k = if sprint { settings.sprint_multiplier } else { 1. };
                new_velocities.x = -settings.player_speed * k * forward.x;
                new_velocities.z = -settings.player_speed * k * forward.z;
            }
            _ => {}
        }

        // Process movement on the lateral axis
        let left = transform.left();
        match (
            input_state.pressed(Actions::StrafeLeft),
            input_state.pressed(Actions::StrafeRight),
            input_state.pressed(Actions::Sprint),
        ) {
            (true, false, sprint) => {
                let k = if sprint { settings.sprint_multiplier } else { 1. };
                new_velocities.x += settings.player_speed * k * left.x;
                new_velocities.z += settings.player_speed * k * left.z;
            }
            (false, true, sprint) => {
                let k = if sprint { settings.sprint_multiplier } else { 1. };
                new_velocities.x += -settings.player_speed * k * left.x;
                new_velocities.z += -settings.player_speed * k * left.z;
            }
            _ => {}
        }

        // Gravity and jumps own the vertical axis.
        velocity.linvel.x = new_velocities.x;
        velocity.linvel.z = new_velocities.z;

        if grounded && input_state.just_pressed(Actions::Jump) {
            impulse.impulse = Vec3::Y * settings.jump_impulse;
        }

        // Process mouse movement. We handle the rotation components separately:
        // * Rotation around the vertical axis (e.g. aiming left or right) is applied to the
        //   player root node.
        // * Rotation around the horizontal axis (e.g. aiming up or down) is applied directly to
        //   the perspective camera in order to keep the vertical orientation neutral on the root
        //   node.
        if let Some(mouse_movement) = input_state.axis_pair(Actions::Aim) {
            controller.theta += Angle::radians(mouse_movement.x()) * settings.mouse_sensitivity;
            controller.phi += Angle::radians(mouse_movement.y() * settings.mouse_sensitivity);
            controller.phi.radians = controller
                .phi
                .radians
                .clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2);

            let v_rotation = Quat::from_axis_angle(Vec3::X, -controller.phi.radians);
            velocity.angvel.y =
                mouse_movement.x() * settings.mouse_sensitivity * MOUSE_ANGVEL_MULTIPLIER;

            if let Ok(mut camera_transform) = camera_query.get_mut(controller.camera_anchor) {
                camera_transform.rotation = v_rotation;
            }
        } else {
            velocity.angvel.y = 0.;
        }
    }
}

/// Cast a short ray below the capsule to tell whether the controller stands
/// on something.
fn ground_probe(rapier: &RapierContext, entity: Entity, transform: &Transform) -> bool {
    let probe_length = PLAYER_HEIGHT / 2. + CAPSULE_RADIUS + GROUND_PROBE_SLACK;
    rapier
        .cast_ray(
            transform.translation,
            Vec3::NEG_Y,
            probe_length,
            true,
            QueryFilter::default().exclude_collider(entity),
        )
        .is_some()
}
