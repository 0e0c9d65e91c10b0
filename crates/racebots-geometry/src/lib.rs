//! Geometry primitives shared by track walls, gates, and sensor rays.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use glam::Vec2;

/// Relative determinant magnitude below which two segments count as parallel.
pub const PARALLEL_EPSILON: f32 = 1e-6;
/// Squared length below which a segment is treated as a point.
pub const DEGENERATE_LENGTH_SQ: f32 = 1e-10;

/// Errors emitted when constructing geometry that cannot take part in queries.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// Both endpoints of the segment coincide.
    #[error("segment endpoints coincide at ({x}, {y})")]
    DegenerateSegment { x: f32, y: f32 },
}

/// Straight line segment between two endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start: Vec2,
    pub end: Vec2,
}

/// Point where two segments meet, with the parametric position along each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub point: Vec2,
    /// Fraction of the way along the first segment, in `[0, 1]`.
    pub t: f32,
    /// Fraction of the way along the second segment, in `[0, 1]`.
    pub u: f32,
}

impl Segment {
    /// Construct a segment without validating its length.
    #[must_use]
    pub const fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    /// Construct a segment, rejecting coincident endpoints.
    pub fn try_new(start: Vec2, end: Vec2) -> Result<Self, GeometryError> {
        let segment = Self::new(start, end);
        if segment.is_degenerate() {
            return Err(GeometryError::DegenerateSegment {
                x: start.x,
                y: start.y,
            });
        }
        Ok(segment)
    }

    /// Shorthand for building a segment from raw coordinates.
    #[must_use]
    pub const fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(Vec2::new(x1, y1), Vec2::new(x2, y2))
    }

    #[must_use]
    pub fn vector(&self) -> Vec2 {
        self.end - self.start
    }

    #[must_use]
    pub fn length(&self) -> f32 {
        self.vector().length()
    }

    #[must_use]
    pub fn midpoint(&self) -> Vec2 {
        (self.start + self.end) * 0.5
    }

    /// Whether the endpoints are too close for the segment to have a direction.
    /// Non-finite endpoints also count as degenerate.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let length_sq = self.vector().length_squared();
        !length_sq.is_finite() || length_sq <= DEGENERATE_LENGTH_SQ
    }

    /// Intersect with `other`.
    ///
    /// Parallel, collinear, and degenerate inputs report no intersection rather
    /// than dividing by a vanishing determinant.
    #[must_use]
    pub fn intersection(&self, other: &Segment) -> Option<Intersection> {
        if self.is_degenerate() || other.is_degenerate() {
            return None;
        }
        let r = self.vector();
        let s = other.vector();
        let denom = r.perp_dot(s);
        if denom.abs() <= PARALLEL_EPSILON * r.length() * s.length() {
            return None;
        }
        let offset = other.start - self.start;
        let t = offset.perp_dot(s) / denom;
        let u = offset.perp_dot(r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(Intersection {
                point: self.start + r * t,
                t,
                u,
            })
        } else {
            None
        }
    }

    /// Whether the two segments touch anywhere.
    #[must_use]
    pub fn intersects(&self, other: &Segment) -> bool {
        self.intersection(other).is_some()
    }
}

/// Free-function form of [`Segment::intersection`].
#[must_use]
pub fn segment_intersection(a: &Segment, b: &Segment) -> Option<Intersection> {
    a.intersection(b)
}

/// Probe fired from an origin along a fixed direction for a bounded length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec2,
    pub direction: Vec2,
    pub length: f32,
}

/// Result of casting a ray against a segment index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance from the origin to the terminal point, within `[0, length]`.
    pub distance: f32,
    pub point: Vec2,
    /// Index of the segment that stopped the ray, if any.
    pub segment: Option<usize>,
}

impl Ray {
    /// Ray pointing along `angle` radians (counter-clockwise from +x).
    #[must_use]
    pub fn from_angle(origin: Vec2, angle: f32, length: f32) -> Self {
        Self {
            origin,
            direction: Vec2::from_angle(angle),
            length,
        }
    }

    /// Far endpoint reached when nothing blocks the ray.
    #[must_use]
    pub fn far_point(&self) -> Vec2 {
        self.origin + self.direction * self.length
    }

    #[must_use]
    pub fn segment(&self) -> Segment {
        Segment::new(self.origin, self.far_point())
    }

    /// Cast against `index`, stopping at the nearest segment.
    #[must_use]
    pub fn cast(&self, index: &dyn SegmentIndex) -> RayHit {
        let length = self.length.max(0.0);
        match index.nearest_hit(&self.segment()) {
            Some(hit) => {
                let distance = (hit.intersection.t * length).clamp(0.0, length);
                RayHit {
                    distance,
                    point: self.origin + self.direction * distance,
                    segment: Some(hit.segment),
                }
            }
            None => RayHit {
                distance: length,
                point: self.far_point(),
                segment: None,
            },
        }
    }
}

/// Intersection between a query and a stored segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    pub segment: usize,
    pub intersection: Intersection,
}

/// Common behaviour exposed by segment lookup structures.
pub trait SegmentIndex {
    /// Rebuild internal structures from the supplied segments.
    fn rebuild(&mut self, segments: &[Segment]) -> Result<(), GeometryError>;

    /// Visit every stored segment crossed by `query`.
    fn visit_hits(&self, query: &Segment, visitor: &mut dyn FnMut(SegmentHit));

    /// Closest crossing measured from the query's start point.
    fn nearest_hit(&self, query: &Segment) -> Option<SegmentHit> {
        let mut best: Option<SegmentHit> = None;
        self.visit_hits(query, &mut |hit| {
            let closer = best.is_none_or(|current| {
                OrderedFloat(hit.intersection.t) < OrderedFloat(current.intersection.t)
            });
            if closer {
                best = Some(hit);
            }
        });
        best
    }
}

/// Brute-force index testing every stored segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearSegmentIndex {
    segments: Vec<Segment>,
}

impl LinearSegmentIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over `segments`, rejecting degenerate entries.
    pub fn from_segments(segments: &[Segment]) -> Result<Self, GeometryError> {
        let mut index = Self::new();
        index.rebuild(segments)?;
        Ok(index)
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl SegmentIndex for LinearSegmentIndex {
    fn rebuild(&mut self, segments: &[Segment]) -> Result<(), GeometryError> {
        if let Some(bad) = segments.iter().find(|segment| segment.is_degenerate()) {
            return Err(GeometryError::DegenerateSegment {
                x: bad.start.x,
                y: bad.start.y,
            });
        }
        self.segments.clear();
        self.segments.extend_from_slice(segments);
        Ok(())
    }

    fn visit_hits(&self, query: &Segment, visitor: &mut dyn FnMut(SegmentHit)) {
        for (segment, stored) in self.segments.iter().enumerate() {
            if let Some(intersection) = query.intersection(stored) {
                visitor(SegmentHit {
                    segment,
                    intersection,
                });
            }
        }
    }
}

/// Rectangle rotated by `heading` around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Vec2,
    pub heading: f32,
    pub half_extents: Vec2,
}

impl OrientedBox {
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        // Rotate into the box frame.
        let local = Vec2::from_angle(-self.heading).rotate(point - self.center);
        local.x.abs() <= self.half_extents.x && local.y.abs() <= self.half_extents.y
    }

    /// Corner points in counter-clockwise order.
    #[must_use]
    pub fn corners(&self) -> [Vec2; 4] {
        let rotation = Vec2::from_angle(self.heading);
        let (hx, hy) = (self.half_extents.x, self.half_extents.y);
        [
            Vec2::new(hx, hy),
            Vec2::new(-hx, hy),
            Vec2::new(-hx, -hy),
            Vec2::new(hx, -hy),
        ]
        .map(|corner| self.center + rotation.rotate(corner))
    }
}
