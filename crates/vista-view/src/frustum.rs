//! Half-space visibility test against planes extracted from a view-projection matrix.

use glam::{DMat4, DVec3, DVec4};

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
/// The plane through the eye perpendicular to the view direction (`w = 0`).
const CAMERA: usize = 4;

/// Four side planes plus the camera plane, normals pointing inward.
///
/// There are no near or far planes: tiles live on the unit sphere, cube or
/// image plane, all at a fixed distance from the eye.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [DVec4; 5],
}

impl Frustum {
    /// Extract the planes from a combined view-projection matrix using the
    /// Griggs-Hartmann method. Works with perspective and orthographic
    /// projections; for the latter the camera plane accepts everything.
    #[must_use]
    pub fn from_view_projection(vp: &DMat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [DVec4::ZERO; 5];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[CAMERA] = rows[3];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Signed distance of `point` to each plane, positive inside.
    #[must_use]
    pub fn distances(&self, point: DVec3) -> [f64; 5] {
        self.planes.map(|plane| plane.truncate().dot(point) + plane.w)
    }

    /// True if `point` lies inside every plane.
    #[must_use]
    pub fn contains(&self, point: DVec3) -> bool {
        self.distances(point).iter().all(|&d| d >= 0.0)
    }

    /// Test a convex volume given by its vertices.
    ///
    /// The volume is rejected only if all of its vertices lie outside the
    /// same plane. This may accept volumes near frustum corners that are not
    /// actually visible, but never rejects a visible one.
    #[must_use]
    pub fn intersects(&self, vertices: &[DVec3]) -> bool {
        if vertices.is_empty() {
            return false;
        }
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            vertices.iter().any(|v| normal.dot(*v) + plane.w >= 0.0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_neg_z() -> Frustum {
        let proj = DMat4::perspective_rh(std::f64::consts::FRAC_PI_2, 1.0, 0.01, 100.0);
        Frustum::from_view_projection(&proj)
    }

    #[test]
    fn test_point_ahead_is_inside() {
        let f = looking_down_neg_z();
        assert!(f.contains(DVec3::new(0.0, 0.0, -1.0)));
        assert!(f.contains(DVec3::new(0.9, -0.9, -1.0)));
        assert!(!f.contains(DVec3::new(1.1, 0.0, -1.0)));
        assert!(!f.contains(DVec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_side_planes_pass_through_eye() {
        let f = looking_down_neg_z();
        let d = f.distances(DVec3::ZERO);
        for side in [LEFT, RIGHT, BOTTOM, TOP, CAMERA] {
            assert!(d[side].abs() < 1e-12);
        }
    }

    #[test]
    fn test_volume_behind_camera_rejected() {
        let f = looking_down_neg_z();
        let quad = [
            DVec3::new(-1.0, -1.0, 1.0),
            DVec3::new(1.0, -1.0, 1.0),
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(-1.0, 1.0, 1.0),
        ];
        assert!(!f.intersects(&quad));
    }

    #[test]
    fn test_volume_straddling_camera_plane_accepted() {
        let f = looking_down_neg_z();
        let quad = [
            DVec3::new(-1.0, 0.0, 1.0),
            DVec3::new(1.0, 0.0, 1.0),
            DVec3::new(1.0, 0.0, -1.0),
            DVec3::new(-1.0, 0.0, -1.0),
        ];
        assert!(f.intersects(&quad));
    }

    #[test]
    fn test_large_volume_surrounding_view_accepted() {
        // No vertex is inside the frustum, yet the quad covers it entirely.
        let f = looking_down_neg_z();
        let quad = [
            DVec3::new(-5.0, -5.0, -1.0),
            DVec3::new(5.0, -5.0, -1.0),
            DVec3::new(5.0, 5.0, -1.0),
            DVec3::new(-5.0, 5.0, -1.0),
        ];
        assert!(quad.iter().all(|v| !f.contains(*v)));
        assert!(f.intersects(&quad));
    }

    #[test]
    fn test_volume_off_to_the_side_rejected() {
        let f = looking_down_neg_z();
        let quad = [
            DVec3::new(2.0, -0.5, -1.0),
            DVec3::new(3.0, -0.5, -1.0),
            DVec3::new(3.0, 0.5, -1.0),
            DVec3::new(2.0, 0.5, -1.0),
        ];
        assert!(!f.intersects(&quad));
        assert!(!f.intersects(&[]));
    }

    #[test]
    fn test_orthographic_has_no_camera_cut() {
        let proj = DMat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        let f = Frustum::from_view_projection(&proj);
        assert!(f.contains(DVec3::new(0.5, 0.5, -1.0)));
        assert!(!f.contains(DVec3::new(1.5, 0.5, -1.0)));
    }
}
