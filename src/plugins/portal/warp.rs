//! View warp transform and teleport integration.
//!
//! The warp is a single composition: express the observer in the source
//! portal's hole space, flip 180° around the vertical (entering a portal's
//! front means exiting facing away from the paired portal's front), then
//! re-express the result in world space through the paired portal's hole
//! transform. The teleport integrator applies the same warp to rigid bodies
//! crossing a portal and runs the traversal state machine.

use std::f32::consts::PI;

use bevy::{prelude::*, reflect::FromReflect};
use bevy_rapier3d::prelude::*;

use crate::plugins::physics::*;

use super::Portal;

/// Distance from a portal hole at which an entity is considered to be
/// approaching it.
const PROXIMITY_THRESHOLD: f32 = 1.0;
/// Offset applied along the destination face direction after a warp, so the
/// exit position does not immediately re-trigger the crossing detector.
const REENTRY_OFFSET: f32 = 0.1;
/// Distance an entity must put between itself and its exit portal before it
/// may start a new traversal.
const COOLDOWN_DISTANCE: f32 = 1.5;

/// Warp a view matrix through a portal pair.
///
/// `view` is a world-to-eye matrix; the holes are the world placement
/// transforms of the source and destination portal openings. The result is
/// the view an observer would have after passing through the source portal.
pub fn warp_view(view: Mat4, source_hole: Mat4, destination_hole: Mat4) -> Mat4 {
    view * source_hole * Mat4::from_rotation_y(PI) * destination_hole.inverse()
}

/// The same warp expressed on world transforms: `W' = portal_to_portal(A, B) * W`
/// moves an observer world pose `W` at portal A to the equivalent pose at
/// portal B.
pub fn portal_to_portal(source_hole: &Transform, destination_hole: &Transform) -> Transform {
    let flip = Transform::from_rotation(Quat::from_rotation_y(PI));
    *destination_hole
        * flip
        * Transform::from_matrix(source_hole.compute_matrix().inverse())
}

/// Traversal state of a single entity with respect to the portal pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Reflect, FromReflect)]
pub enum TraversalPhase {
    /// Not interacting with any portal.
    #[default]
    Approaching,
    /// Inside the proximity zone in front of a portal, collision with the
    /// static world relaxed so the entity can pass through the mounting wall.
    Crossing { portal: Entity },
    /// Warped to the paired portal this frame.
    Warped { exit_portal: Entity },
    /// Re-entry suppressed until the entity moves away from the exit portal.
    Cooldown { exit_portal: Entity },
}

/// Marks an entity as able to traverse portals and tracks its progress.
#[derive(Debug, Component, Clone, Default, Reflect, FromReflect)]
#[reflect(Component)]
pub struct PortalTeleport {
    pub phase: TraversalPhase,
}

/// Advance the traversal state machine for every teleportable entity and
/// apply the warp to the ones that cross a portal plane this frame.
pub fn integrate_portal_crossings(
    portals: Query<(&Portal, Entity)>,
    mut travelers: Query<(
        &mut Transform,
        &mut Velocity,
        &mut PortalTeleport,
        &mut CollisionGroups,
    )>,
) {
    for (mut transform, mut velocity, mut teleport, mut groups) in &mut travelers {
        match teleport.phase {
            TraversalPhase::Approaching => {
                for (portal, portal_entity) in &portals {
                    if !portal.has_been_placed() {
                        continue;
                    }
                    let paired = portal
                        .paired_portal()
                        .and_then(|entity| portals.get(entity).ok());
                    if !portal.is_link_active(paired.map(|(p, _)| p)) {
                        continue;
                    }
                    let to_entity = transform.translation - portal.position();
                    if to_entity.length() < PROXIMITY_THRESHOLD
                        && to_entity.dot(portal.face_direction()) > 0.
                    {
                        debug!("entity entering portal proximity zone");
                        teleport.phase = TraversalPhase::Crossing {
                            portal: portal_entity,
                        };
                        // Let the entity pass through the wall the portal is
                        // mounted on; the frame segments still block it.
                        groups.filters = PLAYER_GROUP | PROPS_GROUP | PORTAL_FRAME_GROUP;
                        break;
                    }
                }
            }
            TraversalPhase::Crossing { portal } => {
                let Ok((portal, _)) = portals.get(portal) else {
                    groups.filters = ALL_GROUPS;
                    teleport.phase = TraversalPhase::Approaching;
                    continue;
                };
                let to_entity = transform.translation - portal.position();
                if to_entity.length() > PROXIMITY_THRESHOLD {
                    groups.filters = ALL_GROUPS;
                    teleport.phase = TraversalPhase::Approaching;
                } else if to_entity.dot(portal.face_direction()) <= 0. {
                    let Some((paired, paired_entity)) = portal
                        .paired_portal()
                        .and_then(|entity| portals.get(entity).ok())
                    else {
                        error!("portal crossed without a valid paired portal, skipping teleport");
                        groups.filters = ALL_GROUPS;
                        teleport.phase = TraversalPhase::Approaching;
                        continue;
                    };
                    let warp = portal_to_portal(&portal.hole_transform(), &paired.hole_transform());
                    *transform = warp.mul_transform(*transform);
                    transform.translation += paired.face_direction() * REENTRY_OFFSET;
                    velocity.linvel = warp.rotation.mul_vec3(velocity.linvel);
                    velocity.angvel = warp.rotation.mul_vec3(velocity.angvel);
                    // Restore the filters in the same frame, or the entity
                    // would ignore the walls at the destination for one tick.
                    groups.filters = ALL_GROUPS;
                    info!("teleported entity to {}", transform.translation);
                    teleport.phase = TraversalPhase::Warped {
                        exit_portal: paired_entity,
                    };
                }
            }
            TraversalPhase::Warped { exit_portal } => {
                teleport.phase = TraversalPhase::Cooldown { exit_portal };
            }
            TraversalPhase::Cooldown { exit_portal } => {
                let far_enough = match portals.get(exit_portal) {
                    Ok((portal, _)) => {
                        (transform.translation - portal.position()).length() > COOLDOWN_DISTANCE
                    }
                    Err(_) => true,
                };
                if far_enough {
                    teleport.phase = TraversalPhase::Approaching;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-4;

    fn placed_pair() -> (Portal, Portal) {
        let mut a = Portal::default();
        let mut b = Portal::default();
        assert!(a.place_at(Vec3::ZERO, Vec3::Z));
        assert!(b.place_at(Vec3::new(100., 0., 0.), Vec3::NEG_Z));
        (a, b)
    }

    #[test]
    fn warp_round_trip_is_identity() {
        let (a, b) = placed_pair();
        let hole_a = a.hole_transform().compute_matrix();
        let hole_b = b.hole_transform().compute_matrix();

        let view = Transform::from_xyz(3., 1.5, 8.)
            .looking_at(Vec3::new(0., 1., 0.), Vec3::Y)
            .compute_matrix()
            .inverse();
        let there = warp_view(view, hole_a, hole_b);
        let back_again = warp_view(there, hole_b, hole_a);
        assert!(back_again.abs_diff_eq(view, TOLERANCE));
    }

    #[test]
    fn portal_to_portal_matches_view_warp() {
        let (a, b) = placed_pair();
        let observer = Transform::from_xyz(0.5, 0.2, 2.);
        let warp = portal_to_portal(&a.hole_transform(), &b.hole_transform());

        let view = observer.compute_matrix().inverse();
        let warped_view = warp_view(
            view,
            a.hole_transform().compute_matrix(),
            b.hole_transform().compute_matrix(),
        );
        let warped_world = warp.mul_transform(observer).compute_matrix();
        assert!(warped_world.abs_diff_eq(warped_view.inverse(), TOLERANCE));
    }

    #[test]
    fn observer_emerges_from_the_paired_portal() {
        let (a, b) = placed_pair();
        // Observer five units in front of portal A, looking straight at it.
        let observer = Transform::from_xyz(0., 0., 5.);
        let view = observer.compute_matrix().inverse();

        let warped = a.convert_view(view, Some(&b));
        let emerged = Transform::from_matrix(warped.inverse());

        assert!((emerged.translation - Vec3::new(100., 0., 5.)).length() < 0.5);
        assert!(emerged.forward().abs_diff_eq(Vec3::NEG_Z, 1e-3));
    }

    #[test]
    fn traversal_state_machine_warps_and_cools_down() {
        let mut app = App::new();
        app.add_system(integrate_portal_crossings);

        let mut portal_a = Portal::default();
        let mut portal_b = Portal::default();
        assert!(portal_a.place_at(Vec3::ZERO, Vec3::Z));
        assert!(portal_b.place_at(Vec3::new(100., 0., 0.), Vec3::NEG_Z));
        let entity_a = app.world.spawn_empty().id();
        let entity_b = app.world.spawn_empty().id();
        portal_a.set_pair(entity_b);
        portal_b.set_pair(entity_a);
        app.world.entity_mut(entity_a).insert(portal_a);
        app.world.entity_mut(entity_b).insert(portal_b);

        let traveler = app
            .world
            .spawn((
                Transform::from_xyz(0., 0., 0.5),
                Velocity {
                    linvel: Vec3::NEG_Z * 2.,
                    ..default()
                },
                PortalTeleport::default(),
                CollisionGroups::new(PROPS_GROUP, ALL_GROUPS),
            ))
            .id();

        // In front of portal A and inside the proximity zone.
        app.update();
        let teleport = app.world.get::<PortalTeleport>(traveler).unwrap();
        assert_eq!(
            teleport.phase,
            TraversalPhase::Crossing { portal: entity_a }
        );
        let groups = app.world.get::<CollisionGroups>(traveler).unwrap();
        assert_eq!(
            groups.filters,
            PLAYER_GROUP | PROPS_GROUP | PORTAL_FRAME_GROUP
        );

        // Push the traveler behind the portal plane; it must come out of B
        // moving along B's face direction.
        app.world.get_mut::<Transform>(traveler).unwrap().translation = Vec3::new(0., 0., -0.05);
        app.update();
        let transform = *app.world.get::<Transform>(traveler).unwrap();
        assert!((transform.translation.x - 100.).abs() < 1.);
        // B faces -Z, so the exit velocity still points along -Z: away from
        // B's plane, preserving speed.
        let velocity = app.world.get::<Velocity>(traveler).unwrap();
        assert!(velocity.linvel.abs_diff_eq(Vec3::NEG_Z * 2., 1e-3));
        let teleport = app.world.get::<PortalTeleport>(traveler).unwrap();
        assert_eq!(
            teleport.phase,
            TraversalPhase::Warped {
                exit_portal: entity_b
            }
        );
        // The filters must come back in the warp frame itself, never leaving
        // a tick where the entity ignores the walls at the destination.
        let groups = app.world.get::<CollisionGroups>(traveler).unwrap();
        assert_eq!(groups.filters, ALL_GROUPS);

        // The cooldown starts next frame; staying near the exit portal must
        // not re-trigger a traversal.
        app.update();
        let teleport = app.world.get::<PortalTeleport>(traveler).unwrap();
        assert_eq!(
            teleport.phase,
            TraversalPhase::Cooldown {
                exit_portal: entity_b
            }
        );
        app.update();
        let teleport = app.world.get::<PortalTeleport>(traveler).unwrap();
        assert_eq!(
            teleport.phase,
            TraversalPhase::Cooldown {
                exit_portal: entity_b
            }
        );

        // Moving away from the exit portal ends the cooldown.
        app.world.get_mut::<Transform>(traveler).unwrap().translation = Vec3::new(90., 0., 5.);
        app.update();
        let teleport = app.world.get::<PortalTeleport>(traveler).unwrap();
        assert_eq!(teleport.phase, TraversalPhase::Approaching);
    }
}
