use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Smallest accepted room dimension, in feet.
pub const MIN_DIMENSION_FT: f32 = 1.0;

/// Margins keep particles off the surfaces. The floor margin is larger so
/// that particles never appear to settle on the floor.
pub const FLOOR_MARGIN_FT: f32 = 0.5;
pub const CEILING_MARGIN_FT: f32 = 0.1;
pub const WALL_MARGIN_FT: f32 = 0.1;

/// Which room corner sits at `offset`.
///
/// Axes follow the scene: x runs along the width, y is up, z runs along the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotCorner {
    /// Minimum x and minimum z at the offset.
    #[default]
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
    /// Floor centre at the offset.
    Center,
}

/// Room dimensions (feet) and placement (world units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomGeometry {
    pub width: f32,
    pub length: f32,
    pub height: f32,
    #[serde(default)]
    pub pivot: PivotCorner,
    #[serde(default)]
    pub offset: Vec3,
}

impl Default for RoomGeometry {
    fn default() -> Self {
        Self {
            width: 30.0,
            length: 30.0,
            height: 10.0,
            pivot: PivotCorner::FrontLeft,
            offset: Vec3::ZERO,
        }
    }
}

fn sanitize_dimension(value: f32) -> f32 {
    if value.is_finite() {
        value.max(MIN_DIMENSION_FT)
    } else {
        MIN_DIMENSION_FT
    }
}

impl RoomGeometry {
    pub fn new(width: f32, length: f32, height: f32) -> Self {
        Self {
            width,
            length,
            height,
            ..Self::default()
        }
        .sanitized()
    }

    pub fn with_pivot(mut self, pivot: PivotCorner, offset: Vec3) -> Self {
        self.pivot = pivot;
        self.offset = offset;
        self
    }

    /// Clamps NaN, infinite, or too-small dimensions to `MIN_DIMENSION_FT`.
    pub fn sanitized(self) -> Self {
        let offset = if self.offset.is_finite() { self.offset } else { Vec3::ZERO };
        Self {
            width: sanitize_dimension(self.width),
            length: sanitize_dimension(self.length),
            height: sanitize_dimension(self.height),
            pivot: self.pivot,
            offset,
        }
    }

    /// Room volume in cubic feet.
    pub fn volume_cubic_feet(&self) -> f64 {
        self.width as f64 * self.length as f64 * self.height as f64
    }

    /// Largest horizontal extent in feet.
    pub fn span_ft(&self) -> f32 {
        self.width.max(self.length)
    }

    /// Axis-aligned box in world units.
    pub fn world_box(&self, units_per_foot: f32) -> (Vec3, Vec3) {
        let size = Vec3::new(self.width, self.height, self.length) * units_per_foot;
        let min = match self.pivot {
            PivotCorner::FrontLeft => self.offset,
            PivotCorner::FrontRight => self.offset - Vec3::new(size.x, 0.0, 0.0),
            PivotCorner::BackLeft => self.offset - Vec3::new(0.0, 0.0, size.z),
            PivotCorner::BackRight => self.offset - Vec3::new(size.x, 0.0, size.z),
            PivotCorner::Center => self.offset - Vec3::new(size.x * 0.5, 0.0, size.z * 0.5),
        };
        (min, min + size)
    }

    /// The six bounding half-spaces, outward normals.
    pub fn planes(&self, units_per_foot: f32) -> [Plane; 6] {
        let (min, max) = self.world_box(units_per_foot);
        [
            Plane::new(Vec3::NEG_Y, min, PlaneKind::Floor),
            Plane::new(Vec3::Y, max, PlaneKind::Ceiling),
            Plane::new(Vec3::NEG_X, min, PlaneKind::Wall),
            Plane::new(Vec3::X, max, PlaneKind::Wall),
            Plane::new(Vec3::NEG_Z, min, PlaneKind::Wall),
            Plane::new(Vec3::Z, max, PlaneKind::Wall),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaneKind {
    Floor,
    Ceiling,
    Wall,
}

impl PlaneKind {
    pub fn margin_ft(self) -> f32 {
        match self {
            PlaneKind::Floor => FLOOR_MARGIN_FT,
            PlaneKind::Ceiling => CEILING_MARGIN_FT,
            PlaneKind::Wall => WALL_MARGIN_FT,
        }
    }
}

/// Half-space `normal · p <= constant`, with `normal` pointing out of the room.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f32,
    pub kind: PlaneKind,
}

impl Plane {
    pub fn new(normal: Vec3, point_on_plane: Vec3, kind: PlaneKind) -> Self {
        Self {
            normal,
            constant: normal.dot(point_on_plane),
            kind,
        }
    }

    /// Positive outside the room, negative inside.
    #[inline(always)]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.constant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clamps_bad_dimensions() {
        let room = RoomGeometry::new(-4.0, f32::NAN, 0.2);
        assert_eq!(room.width, MIN_DIMENSION_FT);
        assert_eq!(room.length, MIN_DIMENSION_FT);
        assert_eq!(room.height, MIN_DIMENSION_FT);
    }

    #[test]
    fn test_pivot_moves_box() {
        let room = RoomGeometry::new(10.0, 20.0, 8.0);
        let (min, max) = room.world_box(1.0);
        assert_eq!(min, Vec3::ZERO);
        assert_eq!(max, Vec3::new(10.0, 8.0, 20.0));

        let centred = room.with_pivot(PivotCorner::Center, Vec3::new(1.0, 2.0, 3.0));
        let (min, max) = centred.world_box(1.0);
        assert_eq!(min, Vec3::new(-4.0, 2.0, -7.0));
        assert_eq!(max, Vec3::new(6.0, 10.0, 13.0));

        let back_right = room.with_pivot(PivotCorner::BackRight, Vec3::ZERO);
        let (min, _) = back_right.world_box(0.5);
        assert_eq!(min, Vec3::new(-5.0, 0.0, -10.0));
    }

    #[test]
    fn test_planes_contain_centre() {
        let room = RoomGeometry::new(12.0, 9.0, 8.0);
        let (min, max) = room.world_box(0.3048);
        let centre = (min + max) * 0.5;
        for plane in room.planes(0.3048) {
            assert!(plane.signed_distance(centre) < 0.0);
        }
        let floor = room.planes(0.3048)[0];
        assert_eq!(floor.kind, PlaneKind::Floor);
        assert!(floor.signed_distance(Vec3::new(centre.x, -1.0, centre.z)) > 0.0);
    }

    #[test]
    fn test_volume() {
        assert_eq!(RoomGeometry::new(30.0, 30.0, 10.0).volume_cubic_feet(), 9000.0);
    }
}
