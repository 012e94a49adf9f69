//! # Shared gait logic
//!
//! Everything the gait variants have in common: the movement inputs, circle based foot targeting
//! and the swing path planner. The variants only add their phase tables on top.
//!
//! ## Foot targeting
//!
//! Each foot may move within a circle of `step_radius_mm` around its neutral foothold. A swing
//! leg reaches from the circle's centre to its boundary along the requested direction. A stance
//! leg pushes from wherever it currently is to the boundary in the opposite direction, which is
//! what moves the body over it. The direction is expressed in each leg's own frame using the
//! leg's mount angle, so one body direction gives the right push for every leg around the body.
//!
//! ## Swing paths
//!
//! Swing legs lift, travel and lower. The lift and lower segments are diagonal, with a slope of
//! `leg_lift_incline`, so the foot does not stop dead at the top of a vertical lift. Short moves
//! flatten the arc rather than lifting the full distance.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use log::{debug, trace};
use util::maths::clamp;

use super::{Direction, GaitError, GaitParams, GaitPhase, GaitState, LegPath};
use crate::geometry::{angle_between, rotate, to_2d, to_3d, Vector2D, Vector3D, VectorExt};
use crate::robot::{LegPositionSource, NUM_LEGS};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Margin keeping a clamped direction strictly inside the circle.
const DIRECTION_CLAMP_EPSILON: f64 = 0.005;

/// Angle from collinear within which the law of sines is not used.
///
/// Units: degrees
const COLLINEAR_TOLERANCE_DEG: f64 = 0.1;

/// Height deficit below which a swing is treated as level.
///
/// Units: millimeters
const LEVEL_HEIGHT_TOLERANCE_MM: f64 = 2.0;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Transition graph of a gait, each phase maps to its successors.
pub type PhaseGraph = HashMap<GaitPhase, Vec<GaitPhase>>;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State and behaviour shared by every gait.
#[derive(Debug, Clone)]
pub struct GaitCore {
    params: GaitParams,

    /// Body-frame travel direction, magnitude up to 1.
    direction_input: Vector2D,

    /// Rotation demand in `[-1, 1]`, positive is clockwise.
    rotation_input: f64,

    leg_paths: Vec<LegPath>,

    graph: PhaseGraph,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GaitCore {
    pub fn new(params: GaitParams) -> Self {
        Self {
            params,
            direction_input: Vector2D::zeros(),
            rotation_input: 0.0,
            leg_paths: vec![LegPath::default(); NUM_LEGS],
            graph: PhaseGraph::new(),
        }
    }

    pub fn params(&self) -> &GaitParams {
        &self.params
    }

    pub(crate) fn set_graph(&mut self, graph: PhaseGraph) {
        self.graph = graph;
    }

    pub fn graph(&self) -> &PhaseGraph {
        &self.graph
    }

    /// The phase following `phase`.
    pub fn next_phase(&self, phase: GaitPhase) -> Result<GaitPhase, GaitError> {
        self.graph
            .get(&phase)
            .and_then(|next| next.first())
            .copied()
            .ok_or(GaitError::InvalidPhase(phase))
    }

    pub fn direction_input(&self) -> Vector2D {
        self.direction_input
    }

    pub fn rotation_input(&self) -> f64 {
        self.rotation_input
    }

    /// Set the travel direction and rotation. Rotation is clamped to `[-1, 1]`.
    pub fn set_direction(&mut self, direction: Direction, rotation: f64) {
        self.direction_input = direction.as_vector();
        self.rotation_input = if rotation.is_finite() {
            clamp(rotation, -1.0, 1.0)
        } else {
            0.0
        };

        debug!(
            "Gait direction ({:.3}, {:.3}) rotation {:.3}",
            self.direction_input.x, self.direction_input.y, self.rotation_input
        );
    }

    pub fn is_rotating(&self) -> bool {
        self.rotation_input != 0.0
    }

    /// True if any translation or rotation is requested.
    pub fn has_movement_input(&self) -> bool {
        self.direction_input.norm() != 0.0 || self.is_rotating()
    }

    pub fn leg_path(&self, leg_index: usize) -> Option<&LegPath> {
        self.leg_paths.get(leg_index)
    }

    pub fn leg_path_mut(&mut self, leg_index: usize) -> Option<&mut LegPath> {
        self.leg_paths.get_mut(leg_index)
    }

    /// Express a body-frame vector in the given leg's frame.
    ///
    /// The leg's `+y` axis points outward at its mount angle and `+x` is 90° clockwise from it.
    pub fn to_leg_frame(&self, leg_index: usize, v: &Vector2D) -> Result<Vector2D, GaitError> {
        let mount_angle = *self
            .params
            .leg_mount_angles_deg
            .get(leg_index)
            .ok_or(GaitError::InvalidLegIndex(leg_index))?;

        let outward = rotate(&Vector2D::x(), mount_angle);
        let lateral = rotate(&outward, -90.0);

        Ok(Vector2D::new(v.dot(&lateral), v.dot(&outward)))
    }

    /// Direction the given leg moves in, in its own frame, before the stance inversion.
    fn leg_direction(&self, leg_index: usize) -> Result<Vector2D, GaitError> {
        let translation = self.to_leg_frame(leg_index, &self.direction_input)?;

        let rotation = if self.rotation_input > 0.0 {
            Vector2D::new(1.0, 0.0)
        } else if self.rotation_input < 0.0 {
            Vector2D::new(-1.0, 0.0)
        } else {
            Vector2D::zeros()
        };

        Ok(translation + rotation)
    }

    /// Target foot position of a leg at the end of the current phase.
    pub fn calculate_leg_target(
        &self,
        positions: &dyn LegPositionSource,
        leg_index: usize,
        is_swing: bool,
    ) -> Result<Vector3D, GaitError> {
        if leg_index >= NUM_LEGS {
            return Err(GaitError::InvalidLegIndex(leg_index));
        }

        let current = positions.leg_position(leg_index);
        let z = -self.params.stance_height_mm;

        if !self.has_movement_input() {
            return Ok(Vector3D::new(current.x, current.y, z));
        }

        let direction = self.leg_direction(leg_index)?;
        let (origin, direction) = if is_swing {
            (Vector2D::zeros(), direction)
        } else {
            (to_2d(&current), direction.inverse())
        };

        let target = if self.is_rotating() {
            direction.normalized_or_zero() * self.params.step_radius_mm * self.rotation_input.abs()
        } else {
            project_point_to_circle(self.params.step_radius_mm, &origin, &direction)
        };

        trace!(
            "Leg {} {} target ({:.2}, {:.2}, {:.2})",
            leg_index,
            if is_swing { "swing" } else { "stance" },
            target.x,
            target.y,
            z
        );

        Ok(to_3d(&target, z))
    }

    /// Plan the path of a leg from its current position to `target`.
    ///
    /// Stance legs slide straight to the target. Swing legs lift, travel and lower; see the
    /// module documentation.
    pub fn calculate_leg_path(
        &mut self,
        positions: &dyn LegPositionSource,
        leg_index: usize,
        target: Vector3D,
        is_swing: bool,
    ) -> Result<&LegPath, GaitError> {
        if leg_index >= NUM_LEGS {
            return Err(GaitError::InvalidLegIndex(leg_index));
        }

        let current = positions.leg_position(leg_index);
        let lift = self.params.leg_lift_distance_mm;
        let incline = self.params.leg_lift_incline;

        let mut path = LegPath::new(vec![current]);

        if is_swing && !self.has_movement_input() {
            // Marching in place
            path.add_waypoint(Vector3D::new(current.x, current.y, current.z + lift));
        } else if is_swing && self.is_rotating() {
            path.add_waypoint(Vector3D::new(target.x, target.y, current.z + lift));
        } else if is_swing {
            let to_target_xy = to_2d(&(target - current));

            let missing_height = target.z + lift - current.z;
            let lift_xy = missing_height.abs() / incline;
            let lower_xy = lift / incline;
            let direct_xy = to_target_xy.norm();

            if lift_xy + lower_xy < direct_xy && missing_height.abs() > LEVEL_HEIGHT_TOLERANCE_MM {
                // Diagonal lift, travel at height, diagonal lower
                let lift_xy_pos = to_2d(&current) + to_target_xy.normalized_or_zero() * lift_xy;
                path.add_waypoint(to_3d(&lift_xy_pos, current.z + missing_height));
                path.add_waypoint(Vector3D::new(target.x, target.y, current.z + lift));
            } else {
                let step_height = if missing_height < LEVEL_HEIGHT_TOLERANCE_MM {
                    lift - ((lift_xy + lower_xy - direct_xy) / 2.0) * incline
                } else {
                    direct_xy * incline
                };
                path.add_waypoint(Vector3D::new(target.x, target.y, current.z + step_height));
            }
        }

        path.add_waypoint(target);

        trace!("Leg {} path {:?}", leg_index, path.waypoints());

        self.leg_paths[leg_index] = path;
        Ok(&self.leg_paths[leg_index])
    }

    /// Compute the target and path of every leg for the given state.
    pub fn plan_phase(
        &mut self,
        positions: &dyn LegPositionSource,
        state: &GaitState,
    ) -> Result<(), GaitError> {
        for leg_index in 0..NUM_LEGS {
            let is_swing = state.is_swing(leg_index);
            let target = self.calculate_leg_target(positions, leg_index, is_swing)?;
            self.calculate_leg_path(positions, leg_index, target, is_swing)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Move `point` along `direction` until it reaches the circle of `radius` around the origin.
///
/// Solved with the law of sines on the triangle formed by the origin, `point` and the result.
/// A zero direction leaves the point where it is. A point at the origin, or on the line of the
/// direction, goes straight to `normalize(direction) * radius`.
pub fn project_point_to_circle(radius: f64, point: &Vector2D, direction: &Vector2D) -> Vector2D {
    if direction.norm() == 0.0 {
        return *point;
    }

    let unit_dir = direction.normalized_or_zero();
    let unit_point = point.normalized_or_zero();

    if point.norm() == 0.0 || unit_point == unit_dir || unit_point == -unit_dir {
        return unit_dir * radius;
    }

    let direction = if direction.norm() >= radius {
        unit_dir * (radius - DIRECTION_CLAMP_EPSILON)
    } else {
        *direction
    };

    let length_c = point.norm();
    let beta = 180.0 - angle_between(&direction, point);

    if beta < COLLINEAR_TOLERANCE_DEG || beta > 180.0 - COLLINEAR_TOLERANCE_DEG {
        return unit_dir * radius;
    }

    let sin_beta = beta.to_radians().sin();
    let gamma = clamp(length_c * sin_beta / radius, -1.0, 1.0).asin().to_degrees();
    let alpha = 180.0 - beta - gamma;
    let projection_length = radius * alpha.to_radians().sin() / sin_beta;

    point + unit_dir * projection_length
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::gait::NamedDirection;
    use crate::robot::LegPositions;

    const TOL: f64 = 1e-6;

    fn core() -> GaitCore {
        GaitCore::new(GaitParams::default())
    }

    fn origin_positions() -> LegPositions {
        [Vector3D::zeros(); NUM_LEGS]
    }

    #[test]
    fn test_projection_from_origin_reaches_radius() {
        for radius in [1.0, 12.5, 30.0, 100.0].iter() {
            for i in 0..36 {
                let angle = i as f64 * 10.0;
                let dir = rotate(&Vector2D::x(), angle) * (radius * 0.9);

                let p = project_point_to_circle(*radius, &Vector2D::zeros(), &dir);
                assert!((p.norm() - radius).abs() < TOL);
                assert!(angle_between(&p, &dir) < 1e-3);
            }
        }
    }

    #[test]
    fn test_projection_from_inside_reaches_radius() {
        let radius = 30.0;
        let points = [
            Vector2D::new(10.0, 5.0),
            Vector2D::new(-20.0, 3.0),
            Vector2D::new(0.0, -29.0),
        ];

        for point in points.iter() {
            for i in 0..12 {
                let dir = rotate(&Vector2D::new(0.5, 0.0), i as f64 * 30.0 + 7.0);
                let p = project_point_to_circle(radius, point, &dir);

                assert!((p.norm() - radius).abs() < 1e-6, "{:?} along {:?}", point, dir);

                // Moved along the direction, not against it
                assert!((p - point).dot(&dir) > 0.0);
            }
        }
    }

    #[test]
    fn test_projection_zero_direction() {
        let p = Vector2D::new(3.0, -4.0);
        assert_eq!(project_point_to_circle(30.0, &p, &Vector2D::zeros()), p);
        assert_eq!(
            project_point_to_circle(30.0, &Vector2D::zeros(), &Vector2D::zeros()),
            Vector2D::zeros()
        );
    }

    #[test]
    fn test_projection_collinear() {
        let dir = Vector2D::new(0.0, 1.0);

        let p = project_point_to_circle(30.0, &Vector2D::new(0.0, 10.0), &dir);
        assert!((p - Vector2D::new(0.0, 30.0)).norm() < TOL);

        // Anti-parallel goes straight to the far side
        let p = project_point_to_circle(30.0, &Vector2D::new(0.0, -10.0), &dir);
        assert!((p - Vector2D::new(0.0, 30.0)).norm() < TOL);

        // Large directions are clamped without changing the result
        let p = project_point_to_circle(30.0, &Vector2D::new(5.0, 0.0), &(dir * 100.0));
        assert!((p.norm() - 30.0).abs() < TOL);
    }

    #[test]
    fn test_leg_frame() -> Result<(), GaitError> {
        let core = core();
        let forward = Vector2D::new(0.0, 1.0);

        // Leg 0 points along +x, forward is along its -x (lateral) axis
        let v = core.to_leg_frame(0, &forward)?;
        assert!((v - Vector2D::new(-1.0, 0.0)).norm() < TOL);

        // Leg 1 at 60°
        let v = core.to_leg_frame(1, &forward)?;
        assert!((v - Vector2D::new(-0.5, 0.866_025_403_784)).norm() < 1e-9);

        // Leg 3 points along -x, forward is along its +x axis
        let v = core.to_leg_frame(3, &forward)?;
        assert!((v - Vector2D::new(1.0, 0.0)).norm() < TOL);

        assert!(matches!(
            core.to_leg_frame(6, &forward),
            Err(GaitError::InvalidLegIndex(6))
        ));

        Ok(())
    }

    #[test]
    fn test_hold_position_without_input() -> Result<(), GaitError> {
        let mut core = core();
        core.set_direction(NamedDirection::Stop.into(), 0.0);

        let mut positions = origin_positions();
        positions[2] = Vector3D::new(4.0, -3.0, 7.0);

        let target = core.calculate_leg_target(&positions, 2, true)?;
        assert_eq!(target, Vector3D::new(4.0, -3.0, 0.0));

        Ok(())
    }

    #[test]
    fn test_swing_and_stance_targets() -> Result<(), GaitError> {
        let mut core = core();
        core.set_direction(NamedDirection::Forward.into(), 0.0);
        let positions = origin_positions();

        for leg in 0..NUM_LEGS {
            let swing = core.calculate_leg_target(&positions, leg, true)?;
            let stance = core.calculate_leg_target(&positions, leg, false)?;

            assert!((to_2d(&swing).norm() - 30.0).abs() < TOL);
            assert_eq!(swing.z, 0.0);

            // From the origin the stance leg pushes the opposite way
            assert!((to_2d(&swing) + to_2d(&stance)).norm() < TOL);
        }

        Ok(())
    }

    #[test]
    fn test_rotation_targets() -> Result<(), GaitError> {
        let mut core = core();
        core.set_direction(NamedDirection::Stop.into(), 0.5);
        let positions = origin_positions();

        for leg in 0..NUM_LEGS {
            let swing = core.calculate_leg_target(&positions, leg, true)?;
            assert!((swing - Vector3D::new(15.0, 0.0, 0.0)).norm() < TOL);

            let stance = core.calculate_leg_target(&positions, leg, false)?;
            assert!((stance - Vector3D::new(-15.0, 0.0, 0.0)).norm() < TOL);
        }

        // Counter-clockwise and clamped
        core.set_direction(NamedDirection::Stop.into(), -3.0);
        assert_eq!(core.rotation_input(), -1.0);
        let swing = core.calculate_leg_target(&positions, 0, true)?;
        assert!((swing - Vector3D::new(-30.0, 0.0, 0.0)).norm() < TOL);

        Ok(())
    }

    #[test]
    fn test_stance_height() -> Result<(), GaitError> {
        let mut core = GaitCore::new(GaitParams {
            stance_height_mm: 12.0,
            ..Default::default()
        });
        core.set_direction(NamedDirection::Left.into(), 0.0);

        let target = core.calculate_leg_target(&origin_positions(), 4, false)?;
        assert_eq!(target.z, -12.0);

        Ok(())
    }

    #[test]
    fn test_stance_path() -> Result<(), GaitError> {
        let mut core = core();
        core.set_direction(NamedDirection::Forward.into(), 0.0);
        let positions = origin_positions();

        let target = Vector3D::new(0.0, -30.0, 0.0);
        let path = core.calculate_leg_path(&positions, 1, target, false)?;
        assert_eq!(path.waypoints(), &[Vector3D::zeros(), target]);

        Ok(())
    }

    #[test]
    fn test_full_swing_path() -> Result<(), GaitError> {
        let mut core = core();
        core.set_direction(NamedDirection::Forward.into(), 0.0);
        let positions = origin_positions();

        let target = Vector3D::new(-30.0, 0.0, 0.0);
        let path = core.calculate_leg_path(&positions, 0, target, true)?.clone();

        // Start, diagonal lift, travel at height, target
        assert_eq!(path.len(), 4);
        let w = path.waypoints();
        assert_eq!(w[0], Vector3D::zeros());
        assert!((w[1] - Vector3D::new(-5.0, 0.0, 10.0)).norm() < TOL);
        assert!((w[2] - Vector3D::new(-30.0, 0.0, 10.0)).norm() < TOL);
        assert_eq!(w[3], target);

        Ok(())
    }

    #[test]
    fn test_short_swing_path_flattens() -> Result<(), GaitError> {
        let mut core = core();
        core.set_direction(NamedDirection::Forward.into(), 0.0);
        let positions = origin_positions();

        // Lift and lower need 10 mm horizontally but the move is 6 mm
        let target = Vector3D::new(0.0, 6.0, 0.0);
        let path = core.calculate_leg_path(&positions, 0, target, true)?.clone();

        assert_eq!(path.len(), 3);
        let travel = path.waypoints()[1];
        assert_eq!((travel.x, travel.y), (0.0, 6.0));
        assert!((travel.z - 12.0).abs() < TOL);

        Ok(())
    }

    #[test]
    fn test_level_swing_path() -> Result<(), GaitError> {
        let mut core = core();
        core.set_direction(NamedDirection::Forward.into(), 0.0);

        // Starting lifted, the target is within 2 mm of the lift height
        let mut positions = origin_positions();
        positions[0] = Vector3D::new(0.0, 0.0, 9.0);

        let target = Vector3D::new(0.0, 30.0, 0.0);
        let path = core.calculate_leg_path(&positions, 0, target, true)?.clone();

        assert_eq!(path.len(), 3);
        // missing 1 mm: lift 0.5 + lower 5 - direct 30, halved, times the incline
        let expected = 9.0 + 10.0 - ((0.5 + 5.0 - 30.0) / 2.0) * 2.0;
        assert!((path.waypoints()[1].z - expected).abs() < TOL);

        Ok(())
    }

    #[test]
    fn test_rotating_swing_path() -> Result<(), GaitError> {
        let mut core = core();
        core.set_direction(NamedDirection::Stop.into(), 1.0);
        let positions = origin_positions();

        let target = core.calculate_leg_target(&positions, 3, true)?;
        let path = core.calculate_leg_path(&positions, 3, target, true)?;

        assert_eq!(path.len(), 3);
        assert_eq!(path.waypoints()[1], Vector3D::new(target.x, target.y, 10.0));

        Ok(())
    }

    #[test]
    fn test_marching_in_place() -> Result<(), GaitError> {
        let mut core = core();
        let mut positions = origin_positions();
        positions[5] = Vector3D::new(2.0, 3.0, 0.0);

        let target = core.calculate_leg_target(&positions, 5, true)?;
        let path = core.calculate_leg_path(&positions, 5, target, true)?;

        assert_eq!(
            path.waypoints(),
            &[
                Vector3D::new(2.0, 3.0, 0.0),
                Vector3D::new(2.0, 3.0, 10.0),
                Vector3D::new(2.0, 3.0, 0.0)
            ]
        );

        Ok(())
    }
}
