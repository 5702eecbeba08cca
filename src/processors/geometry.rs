//! Geometric utilities for skew estimation.
//!
//! This module provides a point type, a convex hull and the minimum area rectangle
//! of a point set, found with rotating calipers over the hull.

use image::GrayImage;
use itertools::Itertools;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A set of points, e.g. the foreground of a mask.
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    /// The points of the set.
    pub points: Vec<Point>,
}

impl PointSet {
    /// Creates a new point set from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Collects the foreground (non-zero) pixels of `mask` that can lie on its convex hull.
    ///
    /// Only the leftmost and rightmost foreground pixel of each row is kept; every other
    /// pixel of the row lies between them and therefore strictly inside the hull, so the
    /// hull and the minimum area rectangle are the same as for the full pixel set.
    pub fn hull_candidates(mask: &GrayImage) -> Self {
        let width = mask.width() as usize;
        let mut points = Vec::new();
        if width == 0 {
            return Self { points };
        }
        for (y, row) in mask.as_raw().chunks_exact(width).enumerate() {
            let first = row.iter().position(|&v| v > 0);
            let last = row.iter().rposition(|&v| v > 0);
            if let (Some(first), Some(last)) = (first, last) {
                points.push(Point::new(first as f32, y as f32));
                if last != first {
                    points.push(Point::new(last as f32, y as f32));
                }
            }
        }
        Self { points }
    }

    /// Convex hull by Andrew's monotone chain, without collinear points.
    ///
    /// Sets with fewer than 3 distinct points are returned as they are.
    pub fn convex_hull(&self) -> PointSet {
        let mut sorted = self.points.clone();
        sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        sorted.dedup();
        if sorted.len() < 3 {
            return PointSet::new(sorted);
        }

        let lower = half_hull(sorted.iter());
        let upper = half_hull(sorted.iter().rev());
        // Each chain ends where the other starts.
        let hull = lower[..lower.len() - 1]
            .iter()
            .chain(&upper[..upper.len() - 1])
            .copied()
            .collect();
        PointSet::new(hull)
    }

    /// Smallest rectangle enclosing the set, by rotating calipers over the hull.
    ///
    /// Returns `None` for an empty set. A hull that degenerates to a segment or a point
    /// yields the axis-aligned extent with a zero angle.
    pub fn min_area_rect(&self) -> Option<MinAreaRect> {
        let (min_x, max_x) = self.points.iter().map(|p| p.x).minmax().into_option()?;
        let (min_y, max_y) = self.points.iter().map(|p| p.y).minmax().into_option()?;

        let hull = self.convex_hull().points;
        if hull.len() < 3 {
            return Some(MinAreaRect {
                center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
                width: max_x - min_x,
                height: max_y - min_y,
                angle: 0.0,
            });
        }

        hull.iter()
            .circular_tuple_windows()
            .filter_map(|(a, b)| caliper_box(&hull, *a, *b))
            .min_by(|l, r| l.area().total_cmp(&r.area()))
    }
}

/// Positive when `a -> b -> c` turns counter-clockwise, zero when collinear.
fn turn(a: Point, b: Point, c: Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// One chain of the monotone-chain hull over points sorted along x.
fn half_hull<'a>(points: impl Iterator<Item = &'a Point>) -> Vec<Point> {
    let mut chain: Vec<Point> = Vec::new();
    for &p in points {
        while let [.., a, b] = chain[..] {
            if turn(a, b, p) > 0.0 {
                break;
            }
            chain.pop();
        }
        chain.push(p);
    }
    chain
}

/// Rectangle with one side on the hull edge `a -> b`, enclosing `hull`.
fn caliper_box(hull: &[Point], a: Point, b: Point) -> Option<MinAreaRect> {
    let length = (b.x - a.x).hypot(b.y - a.y);
    if length < f32::EPSILON {
        return None;
    }
    let (ux, uy) = ((b.x - a.x) / length, (b.y - a.y) / length);

    let (along_min, along_max) = hull
        .iter()
        .map(|p| (p.x - a.x) * ux + (p.y - a.y) * uy)
        .minmax()
        .into_option()?;
    let (across_min, across_max) = hull
        .iter()
        .map(|p| (p.y - a.y) * ux - (p.x - a.x) * uy)
        .minmax()
        .into_option()?;

    let along_mid = (along_min + along_max) / 2.0;
    let across_mid = (across_min + across_max) / 2.0;
    Some(MinAreaRect {
        center: Point::new(
            a.x + along_mid * ux - across_mid * uy,
            a.y + along_mid * uy + across_mid * ux,
        ),
        width: along_max - along_min,
        height: across_max - across_min,
        angle: uy.atan2(ux).to_degrees(),
    })
}

/// A rotated rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinAreaRect {
    /// Center of the rectangle.
    pub center: Point,
    /// Extent along the edge direction.
    pub width: f32,
    /// Extent perpendicular to the edge direction.
    pub height: f32,
    /// Direction of the supporting edge in degrees, in image coordinates (y down).
    pub angle: f32,
}

impl MinAreaRect {
    /// Tilt of the rectangle relative to the image axes, in degrees within [-45, 45).
    ///
    /// A rectangle's sides are only defined modulo 90°, so the edge direction is folded
    /// onto the axis it is closest to. Positive values mean the sides descend to the
    /// right (clockwise on screen).
    pub fn tilt(&self) -> f32 {
        let mut tilt = self.angle % 90.0;
        if tilt >= 45.0 {
            tilt -= 90.0;
        } else if tilt < -45.0 {
            tilt += 90.0;
        }
        tilt
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}
