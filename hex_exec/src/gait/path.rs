//! Waypoint paths followed by a single leg during a phase

use log::warn;

use crate::geometry::Vector3D;

/// An ordered list of foot positions and a cursor onto the one currently targeted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegPath {
    waypoints: Vec<Vector3D>,
    cursor: usize,
}

impl LegPath {
    pub fn new(waypoints: Vec<Vector3D>) -> Self {
        Self {
            waypoints,
            cursor: 0,
        }
    }

    pub fn add_waypoint(&mut self, waypoint: Vector3D) {
        self.waypoints.push(waypoint);
    }

    pub fn waypoints(&self) -> &[Vector3D] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The waypoint under the cursor.
    ///
    /// An empty path gives the zero vector, which should never be commanded.
    pub fn current_target(&self) -> Vector3D {
        match self.waypoints.get(self.cursor) {
            Some(w) => *w,
            None => {
                warn!("Requested target of an empty leg path");
                Vector3D::zeros()
            }
        }
    }

    /// Move the cursor to the next waypoint. Returns false, without moving, on the last one.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.waypoints.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn last(&self) -> Option<&Vector3D> {
        self.waypoints.last()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_advance() {
        let mut path = LegPath::new(vec![Vector3D::zeros(), Vector3D::new(0.0, 0.0, 10.0)]);

        assert_eq!(path.current_target(), Vector3D::zeros());
        assert!(path.advance());
        assert_eq!(path.current_target(), Vector3D::new(0.0, 0.0, 10.0));

        // Stays on the last waypoint
        assert!(!path.advance());
        assert_eq!(path.cursor(), 1);

        path.reset();
        assert_eq!(path.cursor(), 0);
    }

    #[test]
    fn test_empty_path() {
        let mut path = LegPath::default();

        assert!(path.is_empty());
        assert_eq!(path.current_target(), Vector3D::zeros());
        assert!(!path.advance());
        assert_eq!(path.cursor(), 0);
    }
}
