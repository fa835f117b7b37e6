//! Planar shapes: outline flattening, solid/hole sorting and triangulation.

use earcutr::earcut;
use glam::Vec2;

use crate::typeface::PathCommand;

/// Points closer than this are merged while flattening.
const MERGE_EPSILON: f32 = 1e-6;

/// A filled region: one counter-clockwise outline and any number of
/// clockwise holes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    pub outline: Vec<Vec2>,
    pub holes: Vec<Vec<Vec2>>,
}

impl Shape {
    /// Outline followed by holes, the order [`triangulate`](Self::triangulate)
    /// indexes into.
    pub fn contours(&self) -> impl Iterator<Item = &Vec<Vec2>> {
        std::iter::once(&self.outline).chain(self.holes.iter())
    }

    pub fn point_count(&self) -> usize {
        self.contours().map(Vec::len).sum()
    }

    /// Triangles over [`contours`](Self::contours) concatenated, each wound
    /// counter-clockwise.
    pub fn triangulate(&self) -> Vec<[u32; 3]> {
        let mut coords: Vec<f64> = Vec::with_capacity(self.point_count() * 2);
        let mut hole_indices: Vec<usize> = Vec::with_capacity(self.holes.len());
        let mut points: Vec<Vec2> = Vec::with_capacity(self.point_count());

        for (i, contour) in self.contours().enumerate() {
            if i > 0 {
                hole_indices.push(points.len());
            }
            for &p in contour {
                coords.push(p.x as f64);
                coords.push(p.y as f64);
                points.push(p);
            }
        }

        let indices = match earcut(&coords, &hole_indices, 2) {
            Ok(ix) => ix,
            Err(e) => {
                log::warn!("triangulation failed: {:?}", e);
                return Vec::new();
            }
        };

        indices
            .chunks_exact(3)
            .map(|t| {
                let [a, b, c] = [t[0], t[1], t[2]];
                if signed_area(&[points[a], points[b], points[c]]) < 0.0 {
                    [a as u32, c as u32, b as u32]
                } else {
                    [a as u32, b as u32, c as u32]
                }
            })
            .collect()
    }
}

/// Shoelace area; positive for counter-clockwise contours.
pub fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    let twice: f32 = (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum();
    twice * 0.5
}

/// Even-odd point-in-polygon test.
pub fn contains_point(polygon: &[Vec2], p: Vec2) -> bool {
    let mut inside = false;
    let n = polygon.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Turns outline commands into closed polylines.
///
/// Every point is mapped by `p * scale + offset`. Curves are split into
/// `curve_segments` straight pieces.
pub fn flatten(
    commands: &[PathCommand],
    scale: f32,
    offset: Vec2,
    curve_segments: u32,
) -> Vec<Vec<Vec2>> {
    let segments = curve_segments.max(1);
    let map = |p: Vec2| p * scale + offset;

    let mut contours = Vec::new();
    let mut current: Vec<Vec2> = Vec::new();
    let mut pen = Vec2::ZERO;

    for command in commands {
        match *command {
            PathCommand::MoveTo(p) => {
                finish_contour(&mut current, &mut contours);
                pen = p;
                push_point(&mut current, map(p));
            }
            PathCommand::LineTo(p) => {
                pen = p;
                push_point(&mut current, map(p));
            }
            PathCommand::QuadTo { ctrl, to } => {
                let from = pen;
                for i in 1..=segments {
                    let t = i as f32 / segments as f32;
                    let u = 1.0 - t;
                    let p = from * (u * u) + ctrl * (2.0 * u * t) + to * (t * t);
                    push_point(&mut current, map(p));
                }
                pen = to;
            }
            PathCommand::CubicTo { ctrl1, ctrl2, to } => {
                let from = pen;
                for i in 1..=segments {
                    let t = i as f32 / segments as f32;
                    let u = 1.0 - t;
                    let p = from * (u * u * u)
                        + ctrl1 * (3.0 * u * u * t)
                        + ctrl2 * (3.0 * u * t * t)
                        + to * (t * t * t);
                    push_point(&mut current, map(p));
                }
                pen = to;
            }
        }
    }
    finish_contour(&mut current, &mut contours);
    contours
}

fn push_point(contour: &mut Vec<Vec2>, p: Vec2) {
    if contour
        .last()
        .is_none_or(|last| last.distance_squared(p) > MERGE_EPSILON * MERGE_EPSILON)
    {
        contour.push(p);
    }
}

fn finish_contour(current: &mut Vec<Vec2>, contours: &mut Vec<Vec<Vec2>>) {
    let mut contour = std::mem::take(current);
    let closed = match (contour.first(), contour.last()) {
        (Some(first), Some(last)) if contour.len() > 1 => {
            first.distance_squared(*last) <= MERGE_EPSILON * MERGE_EPSILON
        }
        _ => false,
    };
    if closed {
        contour.pop();
    }
    if contour.len() >= 3 {
        contours.push(contour);
    }
}

/// Groups closed contours into shapes by nesting depth.
///
/// Contours at even depth (not inside anything, or inside a hole) are
/// outlines; contours at odd depth are holes of the smallest outline that
/// contains them. Orientation of the input does not matter.
pub fn classify(contours: Vec<Vec<Vec2>>) -> Vec<Shape> {
    let mut contours: Vec<(Vec<Vec2>, f32)> = contours
        .into_iter()
        .map(|c| {
            let area = signed_area(&c);
            (c, area)
        })
        .filter(|(_, area)| area.abs() > MERGE_EPSILON)
        .collect();

    // Largest first, so every container precedes what it contains.
    contours.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

    let mut shapes: Vec<Shape> = Vec::new();
    // For each contour already placed: (shape index, is hole).
    let mut placed: Vec<(usize, bool)> = Vec::with_capacity(contours.len());

    for i in 0..contours.len() {
        let probe = contours[i].0[0];
        let containers: Vec<usize> = (0..i)
            .filter(|&j| contains_point(&contours[j].0, probe))
            .collect();

        let depth = containers.len();
        let innermost = containers.last().copied();
        let (points, area) = &contours[i];

        match innermost {
            Some(parent) if depth % 2 == 1 && !placed[parent].1 => {
                let shape = placed[parent].0;
                let mut hole = points.clone();
                if *area > 0.0 {
                    hole.reverse();
                }
                shapes[shape].holes.push(hole);
                placed.push((shape, true));
            }
            _ => {
                let mut outline = points.clone();
                if *area < 0.0 {
                    outline.reverse();
                }
                shapes.push(Shape {
                    outline,
                    holes: Vec::new(),
                });
                placed.push((shapes.len() - 1, false));
            }
        }
    }

    shapes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f32, max: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(min, min),
            Vec2::new(max, min),
            Vec2::new(max, max),
            Vec2::new(min, max),
        ]
    }

    #[test]
    fn signed_area_sign_follows_winding() {
        let ccw = square(0.0, 2.0);
        assert_eq!(signed_area(&ccw), 4.0);
        let cw: Vec<Vec2> = ccw.into_iter().rev().collect();
        assert_eq!(signed_area(&cw), -4.0);
    }

    #[test]
    fn flatten_drops_closing_duplicate() {
        let commands = [
            PathCommand::MoveTo(Vec2::new(0.0, 0.0)),
            PathCommand::LineTo(Vec2::new(10.0, 0.0)),
            PathCommand::LineTo(Vec2::new(10.0, 10.0)),
            PathCommand::LineTo(Vec2::new(0.0, 0.0)),
        ];
        let contours = flatten(&commands, 0.1, Vec2::new(5.0, 0.0), 12);
        assert_eq!(contours.len(), 1);
        assert_eq!(
            contours[0],
            vec![Vec2::new(5.0, 0.0), Vec2::new(6.0, 0.0), Vec2::new(6.0, 1.0)]
        );
    }

    #[test]
    fn curves_are_split_into_segments() {
        let commands = [
            PathCommand::MoveTo(Vec2::ZERO),
            PathCommand::QuadTo {
                ctrl: Vec2::new(5.0, 10.0),
                to: Vec2::new(10.0, 0.0),
            },
        ];
        let contours = flatten(&commands, 1.0, Vec2::ZERO, 4);
        // start + 4 curve points
        assert_eq!(contours[0].len(), 5);
        // midpoint of the curve is half-way to the control point
        assert_eq!(contours[0][2], Vec2::new(5.0, 5.0));
        assert_eq!(contours[0][4], Vec2::new(10.0, 0.0));
    }

    #[test]
    fn short_contours_are_discarded() {
        let commands = [
            PathCommand::MoveTo(Vec2::ZERO),
            PathCommand::LineTo(Vec2::X),
        ];
        assert!(flatten(&commands, 1.0, Vec2::ZERO, 12).is_empty());
    }

    #[test]
    fn nested_contours_become_holes() {
        // Clockwise outer, as TrueType-derived fonts store them.
        let outer: Vec<Vec2> = square(0.0, 10.0).into_iter().rev().collect();
        let inner = square(2.0, 8.0);
        let island = square(4.0, 6.0);
        let separate = square(20.0, 30.0);

        let shapes = classify(vec![inner, separate, island, outer]);
        assert_eq!(shapes.len(), 3);

        let ring = shapes
            .iter()
            .find(|s| s.outline.contains(&Vec2::ZERO))
            .unwrap();
        assert_eq!(ring.holes.len(), 1);
        assert!(signed_area(&ring.outline) > 0.0);
        assert!(signed_area(&ring.holes[0]) < 0.0);

        let island_shape = shapes
            .iter()
            .find(|s| s.outline.contains(&Vec2::new(4.0, 4.0)))
            .unwrap();
        assert!(island_shape.holes.is_empty());
    }

    #[test]
    fn triangulation_covers_ring_counter_clockwise() {
        let shape = Shape {
            outline: square(0.0, 10.0),
            holes: vec![square(2.0, 8.0).into_iter().rev().collect()],
        };
        let triangles = shape.triangulate();
        assert_eq!(triangles.len(), 8);

        let points: Vec<Vec2> = shape.contours().flatten().copied().collect();
        let mut area = 0.0;
        for t in &triangles {
            let tri = [points[t[0] as usize], points[t[1] as usize], points[t[2] as usize]];
            let a = signed_area(&tri);
            assert!(a > 0.0);
            area += a;
        }
        assert!((area - (100.0 - 36.0)).abs() < 1e-3);
    }

    #[test]
    fn contains_point_handles_concave_polygons() {
        let l_shape = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 4.0),
            Vec2::new(0.0, 4.0),
        ];
        assert!(contains_point(&l_shape, Vec2::new(0.5, 3.0)));
        assert!(!contains_point(&l_shape, Vec2::new(3.0, 3.0)));
    }
}
