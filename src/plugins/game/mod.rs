use std::f32::consts::*;

use crate::{
    plugins::*,
    util::scenes::{make_test_arena, spawn_prop_cubes},
};

use bevy::{prelude::*, window::WindowDescriptor};
use bevy_rapier3d::prelude::*;

use super::first_person_controller::FirstPersonControllerBundle;

pub mod settings;

use self::settings::GameSettings;

#[derive(Debug)]
/// Main game plugin, responsible for loading the other game plugins and bootstrapping the game.
pub struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            window: WindowDescriptor {
                title: "Portal Prototype".to_string(),
                width: 1280.,
                height: 720.,
                ..default()
            },
            ..default()
        }));

        #[cfg(feature = "devel")]
        {
            app.add_plugins(debug::DeveloperPlugins);
        }

        app.insert_resource(GameSettings::load_or_default("assets/settings.json"));

        app.add_plugin(RapierPhysicsPlugin::<NoUserData>::default());
        app.add_plugin(physics::PhysicsPlugin);
        app.add_plugin(input::InputPlugin);
        app.add_plugin(first_person_controller::FirstPersonControllerPlugin);
        app.add_plugin(portal::PortalPlugin);

        app.add_startup_system(setup);
    }
}

/// Perform game initialization
fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    make_test_arena(&mut commands, &mut meshes, &mut materials, 20., 3.);
    spawn_prop_cubes(&mut commands, &mut meshes, &mut materials);

    // Light
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            color: Color::ANTIQUE_WHITE,
            illuminance: 20_000.,
            shadows_enabled: true,
            ..default()
        },
        transform: Transform {
            translation: Vec3::Y * 5.,
            rotation: Quat::from_euler(EulerRot::YXZ, FRAC_PI_4, FRAC_PI_4, 0.),
            scale: Vec3::ONE,
        },
        ..default()
    });

    // Spawn player
    commands.spawn(FirstPersonControllerBundle {
        spatial: SpatialBundle::from_transform(Transform::from_xyz(0., 1.5, 5.)),
        ..default()
    });
}
