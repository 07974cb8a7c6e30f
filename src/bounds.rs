use airborne_common::{Plane, RoomGeometry};
use glam::{Affine3A, Vec3};

/// The six room planes in world units, with each plane's margin resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomBounds {
    planes: [Plane; 6],
    margins: [f32; 6],
    inner_min: Vec3,
    inner_max: Vec3,
}

/// Outcome of testing a point against the room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsCheck {
    pub in_bounds: bool,
    /// Outward normal of the first plane whose margin was crossed.
    pub violated_normal: Option<Vec3>,
    /// How far past that margin the point lies (positive).
    pub penetration: Option<f32>,
}

impl BoundsCheck {
    const INSIDE: BoundsCheck = BoundsCheck {
        in_bounds: true,
        violated_normal: None,
        penetration: None,
    };
}

impl RoomBounds {
    pub fn new(room: &RoomGeometry, units_per_foot: f32) -> Self {
        let planes = room.planes(units_per_foot);
        let margins = planes.map(|plane| plane.kind.margin_ft() * units_per_foot);

        // Planes come in (min, max) pairs along y, x, z; see RoomGeometry::planes.
        let (min, max) = room.world_box(units_per_foot);
        let inner_min = min + Vec3::new(margins[2], margins[0], margins[4]);
        let inner_max = max - Vec3::new(margins[3], margins[1], margins[5]);

        Self {
            planes,
            margins,
            inner_min,
            inner_max,
        }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// The region particles may occupy: the room inset by every margin.
    pub fn inner_box(&self) -> (Vec3, Vec3) {
        (self.inner_min, self.inner_max)
    }

    pub fn centre(&self) -> Vec3 {
        (self.inner_min + self.inner_max) * 0.5
    }
}

/// Tests `position` against the six planes (margins included).
pub fn check_bounds(bounds: &RoomBounds, position: Vec3) -> BoundsCheck {
    for (plane, &margin) in bounds.planes.iter().zip(bounds.margins.iter()) {
        let past_margin = plane.signed_distance(position) + margin;
        if past_margin > 0.0 {
            return BoundsCheck {
                in_bounds: false,
                violated_normal: Some(plane.normal),
                penetration: Some(past_margin),
            };
        }
    }
    BoundsCheck::INSIDE
}

/// Axis-aligned box in a mesh's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Smallest box holding every point, or `None` for an empty set.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    #[inline(always)]
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Static scene obstacle, tested by its local bounding box only.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMesh {
    world_to_local: Affine3A,
    local_bounds: Aabb,
}

impl StaticMesh {
    /// `transform` maps the mesh's local frame into the world.
    pub fn new(transform: Affine3A, local_bounds: Aabb) -> Self {
        Self {
            world_to_local: transform.inverse(),
            local_bounds,
        }
    }

    pub fn from_vertices(transform: Affine3A, vertices: &[Vec3]) -> Option<Self> {
        Aabb::from_points(vertices).map(|bounds| Self::new(transform, bounds))
    }

    pub fn contains(&self, position: Vec3) -> bool {
        self.local_bounds
            .contains(self.world_to_local.transform_point3(position))
    }
}

/// True when `position` lies inside any mesh's bounding box.
pub fn check_collision(position: Vec3, meshes: &[StaticMesh]) -> bool {
    meshes.iter().any(|mesh| mesh.contains(position))
}
