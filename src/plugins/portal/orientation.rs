//! Portal orientation solver.
//!
//! Given the portal's fixed rest-state facing and a new surface-hit normal,
//! computes the absolute rotation (angle + axis) between the two and derives
//! the right-handed orthonormal basis the portal adopts after placement.
//! Placements are anchored on the rest-state facing, not on the previous
//! orientation, so repeated placements are absolute rotations.

use bevy::prelude::*;

/// How small the cross product of the reference and target directions may get
/// before the rotation axis is considered degenerate.
const DEGENERATE_CROSS_LENGTH: f32 = 1e-6;

/// Result of reorienting a portal towards a new surface normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reorientation {
    /// Rotation angle from the reference direction to the new facing, in radians.
    pub angle: f32,
    /// Unit rotation axis. Deterministic even for parallel/anti-parallel inputs.
    pub axis: Vec3,
    /// New outward facing of the portal plane.
    pub forward: Vec3,
    /// New up direction. Equal to the rotation axis.
    pub up: Vec3,
    /// New right direction, completing the orthonormal triple.
    pub right: Vec3,
}

/// Compute the rotation taking `reference` onto `new_direction` and the basis
/// a portal facing `new_direction` adopts.
///
/// Both inputs must be unit length. The dot product is clamped to the arccos
/// domain so accumulated floating point drift can never produce a NaN angle,
/// and a degenerate cross product (parallel or anti-parallel directions) falls
/// back to a stable axis orthogonal to `reference`.
pub fn reorient(reference: Vec3, new_direction: Vec3) -> Reorientation {
    let angle = reference.dot(new_direction).clamp(-1., 1.).acos();

    let cross = reference.cross(new_direction);
    let axis = if cross.length_squared() > DEGENERATE_CROSS_LENGTH {
        cross.normalize()
    } else {
        fallback_axis(reference)
    };

    let up = axis;
    let right = new_direction.cross(up).normalize();

    Reorientation {
        angle,
        axis,
        forward: new_direction,
        up,
        right,
    }
}

/// Stable rotation axis for the degenerate case where the target direction is
/// parallel or anti-parallel to the reference. Prefers the world up vector
/// projected into the plane orthogonal to `reference`, so portals placed on
/// walls keep their natural vertical; for floors and ceilings any orthonormal
/// vector will do.
fn fallback_axis(reference: Vec3) -> Vec3 {
    let projected = Vec3::Y - reference * reference.y;
    if projected.length_squared() > DEGENERATE_CROSS_LENGTH {
        projected.normalize()
    } else {
        reference.any_orthonormal_vector()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-4;

    fn assert_orthonormal(basis: &Reorientation) {
        assert!((basis.forward.length() - 1.).abs() < TOLERANCE);
        assert!((basis.up.length() - 1.).abs() < TOLERANCE);
        assert!((basis.right.length() - 1.).abs() < TOLERANCE);
        assert!(basis.forward.dot(basis.up).abs() < TOLERANCE);
        assert!(basis.forward.dot(basis.right).abs() < TOLERANCE);
        assert!(basis.up.dot(basis.right).abs() < TOLERANCE);
    }

    #[test]
    fn identity_reorientation_has_zero_angle() {
        let rest = Vec3::Z;
        let result = reorient(rest, rest);
        assert!(result.angle.abs() < TOLERANCE);
        assert!(result.forward.abs_diff_eq(Vec3::Z, TOLERANCE));
        // Rest-state basis of a portal facing +Z.
        assert!(result.up.abs_diff_eq(Vec3::Y, TOLERANCE));
        assert!(result.right.abs_diff_eq(Vec3::NEG_X, TOLERANCE));
        assert_orthonormal(&result);
    }

    #[test]
    fn reorientation_basis_is_orthonormal() {
        let reference = Vec3::Z;
        let targets = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::new(1., 1., 1.).normalize(),
            Vec3::new(-0.3, 0.8, 0.2).normalize(),
            Vec3::new(0.1, -0.9, 0.4).normalize(),
        ];
        for target in targets {
            let result = reorient(reference, target);
            assert_orthonormal(&result);
            assert!(result.forward.abs_diff_eq(target, TOLERANCE));
            // The axis rotates the reference onto the target.
            let rotated = Quat::from_axis_angle(result.axis, result.angle) * reference;
            assert!(rotated.abs_diff_eq(target, TOLERANCE));
        }
    }

    #[test]
    fn anti_parallel_target_uses_fallback_axis() {
        let result = reorient(Vec3::Z, Vec3::NEG_Z);
        assert!(!result.axis.is_nan());
        assert!((result.angle - std::f32::consts::PI).abs() < TOLERANCE);
        assert!(result.axis.abs_diff_eq(Vec3::Y, TOLERANCE));
        assert_orthonormal(&result);
    }

    #[test]
    fn vertical_reference_still_produces_a_valid_axis() {
        let result = reorient(Vec3::Y, Vec3::NEG_Y);
        assert!(!result.axis.is_nan());
        assert!(result.axis.dot(Vec3::Y).abs() < TOLERANCE);
        assert_orthonormal(&result);
    }

    #[test]
    fn drifted_unit_vectors_do_not_produce_nan() {
        // A dot product slightly outside [-1, 1] must be clamped.
        let drifted = Vec3::new(0., 0., 1.000_001);
        let result = reorient(Vec3::Z, drifted);
        assert!(!result.angle.is_nan());
        assert!(result.angle.abs() < 1e-2);
    }
}
