//! Extruded, optionally bevelled 3D text.
//!
//! Text is laid out glyph by glyph from a [`Typeface`], flattened into
//! [`Shape`]s and extruded along +Z. With a bevel the solid grows
//! `bevel_thickness` beyond both faces and its rim is rounded over
//! `bevel_segments` steps:
//!
//! ```text
//!   z = thickness * cos(t * pi/2)
//!   offset = bevel_size * sin(t * pi/2) + bevel_offset      t in [0, 1)
//! ```
//!
//! The front face sits at `depth + bevel_thickness` facing +Z, the back face
//! at `-bevel_thickness` facing -Z.

use std::f32::consts::FRAC_PI_2;

use glam::{Vec2, Vec3};

use crate::geometry::RawGeometry;
use crate::mesh::Vertex3d;
use crate::shape::{Shape, classify, flatten};
use crate::typeface::Typeface;

/// Miter vectors are capped at this many times the bevel size.
const MITER_LIMIT: f32 = 4.0;

/// Layout and extrusion parameters.
///
/// The defaults are one-unit-high text, a tenth of a unit deep, with a thin
/// five-step bevel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextGeometryParams {
    /// Em height in world units.
    pub size: f32,
    /// Extrusion depth, not counting the bevel.
    pub depth: f32,
    pub curve_segments: u32,
    pub bevel_enabled: bool,
    pub bevel_thickness: f32,
    pub bevel_size: f32,
    pub bevel_offset: f32,
    pub bevel_segments: u32,
}

impl Default for TextGeometryParams {
    fn default() -> Self {
        Self {
            size: 1.0,
            depth: 0.1,
            curve_segments: 12,
            bevel_enabled: true,
            bevel_thickness: 0.03,
            bevel_size: 0.02,
            bevel_offset: 0.0,
            bevel_segments: 5,
        }
    }
}

impl TextGeometryParams {
    pub fn size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    pub fn curve_segments(mut self, segments: u32) -> Self {
        self.curve_segments = segments;
        self
    }

    pub fn bevel(mut self, thickness: f32, size: f32, offset: f32, segments: u32) -> Self {
        self.bevel_enabled = true;
        self.bevel_thickness = thickness;
        self.bevel_size = size;
        self.bevel_offset = offset;
        self.bevel_segments = segments;
        self
    }

    pub fn no_bevel(mut self) -> Self {
        self.bevel_enabled = false;
        self
    }

    /// Extrusion profile: `(z, outward offset)` per ring, back to front.
    fn layers(&self) -> Vec<(f32, f32)> {
        let (thickness, size, offset, segments) = if self.bevel_enabled {
            (
                self.bevel_thickness,
                self.bevel_size,
                self.bevel_offset,
                self.bevel_segments,
            )
        } else {
            (0.0, 0.0, 0.0, 0)
        };

        let ring = |b: u32| {
            let t = b as f32 / segments as f32;
            (
                thickness * (t * FRAC_PI_2).cos(),
                size * (t * FRAC_PI_2).sin() + offset,
            )
        };

        let mut layers = Vec::with_capacity(2 * segments as usize + 2);
        for b in 0..segments {
            let (z, bs) = ring(b);
            layers.push((-z, bs));
        }
        layers.push((0.0, size + offset));
        layers.push((self.depth, size + offset));
        for b in (0..segments).rev() {
            let (z, bs) = ring(b);
            layers.push((self.depth + z, bs));
        }
        layers
    }
}

/// Lays out `text` as flat shapes, left-aligned at the origin with the
/// first baseline on y = 0.
///
/// `\n` starts a new line below. Characters missing from the font are
/// drawn as `?`.
pub fn text_shapes(font: &Typeface, text: &str, params: &TextGeometryParams) -> Vec<Shape> {
    let scale = font.scale(params.size);
    let line_height = font.line_height(params.size);
    let mut pen = Vec2::ZERO;
    let mut shapes = Vec::new();

    for c in text.chars() {
        if c == '\n' {
            pen = Vec2::new(0.0, pen.y - line_height);
            continue;
        }
        let Some(glyph) = font.glyph_or_fallback(c) else {
            continue;
        };

        let contours = flatten(&glyph.commands, scale, pen, params.curve_segments);
        shapes.extend(classify(contours));
        pen.x += glyph.advance * scale;
    }

    shapes
}

/// Extrudes flat shapes into a closed solid.
pub fn extrude(shapes: &[Shape], params: &TextGeometryParams) -> RawGeometry {
    let layers = params.layers();
    let mut geometry = RawGeometry::default();

    for shape in shapes {
        let triangles = shape.triangulate();
        if triangles.is_empty() {
            continue;
        }

        let contours: Vec<(&Vec<Vec2>, Vec<Vec2>)> = shape
            .contours()
            .map(|contour| (contour, miter_directions(contour)))
            .collect();

        let ring_at = |layer: (f32, f32)| -> Vec<Vec3> {
            contours
                .iter()
                .flat_map(|(points, dirs)| {
                    points
                        .iter()
                        .zip(dirs)
                        .map(move |(p, d)| (*p + *d * layer.1).extend(layer.0))
                })
                .collect()
        };

        // Caps
        let (Some(&back), Some(&front)) = (layers.first(), layers.last()) else {
            continue;
        };
        add_cap(&mut geometry, &ring_at(front), &triangles, Vec3::Z);
        add_cap(&mut geometry, &ring_at(back), &triangles, Vec3::NEG_Z);

        // Walls
        for (points, dirs) in &contours {
            for band in layers.windows(2) {
                let ring = |(z, bs): (f32, f32)| -> Vec<Vec3> {
                    points
                        .iter()
                        .zip(dirs)
                        .map(|(p, d)| (*p + *d * bs).extend(z))
                        .collect()
                };
                add_wall(&mut geometry, &ring(band[0]), &ring(band[1]));
            }
        }
    }

    geometry
}

/// Builds the complete text mesh.
///
/// ```no_run
/// use diorama::{TextGeometryParams, Typeface, text_geometry};
///
/// let font = Typeface::load("assets/helvetiker_regular.typeface.json")?;
/// let mesh = text_geometry(&font, "Hello, Three.js!", &TextGeometryParams::default());
/// assert!(!mesh.is_empty());
/// # Ok::<(), diorama::LoadError>(())
/// ```
pub fn text_geometry(font: &Typeface, text: &str, params: &TextGeometryParams) -> RawGeometry {
    let shapes = text_shapes(font, text, params);
    let geometry = extrude(&shapes, params);
    log::debug!(
        "text {:?}: {} shapes, {} triangles",
        text,
        shapes.len(),
        geometry.triangle_count()
    );
    geometry
}

/// Per-vertex offset directions pointing away from the filled side.
///
/// Outlines run counter-clockwise and holes clockwise, so the right-hand
/// normal `(dy, -dx)` of each edge always points out of the solid.
fn miter_directions(contour: &[Vec2]) -> Vec<Vec2> {
    let n = contour.len();
    (0..n)
        .map(|i| {
            let prev = contour[(i + n - 1) % n];
            let here = contour[i];
            let next = contour[(i + 1) % n];

            let n1 = edge_normal(prev, here);
            let n2 = edge_normal(here, next);
            let m = n1 + n2;
            if m.length_squared() < 1e-12 {
                return n1;
            }
            let m = m.normalize();
            let cos = m.dot(n1);
            if cos <= 1.0 / MITER_LIMIT {
                m * MITER_LIMIT
            } else {
                m / cos
            }
        })
        .collect()
}

fn edge_normal(from: Vec2, to: Vec2) -> Vec2 {
    let d = to - from;
    Vec2::new(d.y, -d.x).normalize_or_zero()
}

fn add_cap(geometry: &mut RawGeometry, ring: &[Vec3], triangles: &[[u32; 3]], normal: Vec3) {
    let base = geometry.vertices.len() as u32;
    geometry.vertices.extend(
        ring.iter()
            .map(|p| Vertex3d::new(p.to_array(), normal.to_array(), [p.x, p.y])),
    );

    let facing_back = normal.z < 0.0;
    for t in triangles {
        let [a, b, c] = t.map(|i| base + i);
        if facing_back {
            geometry.indices.extend_from_slice(&[a, c, b]);
        } else {
            geometry.indices.extend_from_slice(&[a, b, c]);
        }
    }
}

/// One band of quads between two rings of the same contour, flat shaded.
fn add_wall(geometry: &mut RawGeometry, lower: &[Vec3], upper: &[Vec3]) {
    let n = lower.len();
    for i in 0..n {
        let j = (i + 1) % n;
        let (a, b, c, d) = (lower[i], lower[j], upper[j], upper[i]);

        let edge = b - a;
        let fallback = Vec3::new(edge.y, -edge.x, 0.0).normalize_or(Vec3::Z);
        let normal = (c - a).cross(d - b).normalize_or(fallback);

        let along_x = (b.y - a.y).abs() < (b.x - a.x).abs();
        let uv = |p: Vec3| {
            if along_x {
                [p.x, 1.0 - p.z]
            } else {
                [p.y, 1.0 - p.z]
            }
        };

        let base = geometry.vertices.len() as u32;
        for p in [a, b, c, d] {
            geometry
                .vertices
                .push(Vertex3d::new(p.to_array(), normal.to_array(), uv(p)));
        }
        geometry
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeface::tests::TEST_FONT;

    fn font() -> Typeface {
        Typeface::from_json(TEST_FONT).unwrap()
    }

    fn position(geom: &RawGeometry, index: u32) -> Vec3 {
        Vec3::from(geom.vertices[index as usize].position)
    }

    fn flat(depth: f32) -> TextGeometryParams {
        TextGeometryParams::default().depth(depth).no_bevel()
    }

    #[test]
    fn default_layers_span_bevelled_depth() {
        let params = TextGeometryParams::default();
        let layers = params.layers();

        // 5 back bevel rings, 2 body rings, 5 front bevel rings
        assert_eq!(layers.len(), 12);
        assert!((layers[0].0 + 0.03).abs() < 1e-6);
        assert_eq!(layers[0].1, 0.0);
        assert!((layers[11].0 - 0.13).abs() < 1e-6);
        assert!((layers[5].1 - 0.02).abs() < 1e-6);

        for pair in layers.windows(2) {
            assert!(pair[1].0 >= pair[0].0);
        }
    }

    #[test]
    fn triangle_glyph_without_bevel() {
        let geom = text_geometry(&font(), "A", &flat(1.0));

        // two caps of 3 vertices, three wall quads of 4
        assert_eq!(geom.vertices.len(), 3 + 3 + 12);
        assert_eq!(geom.triangle_count(), 1 + 1 + 6);

        let (min, max) = geom.bounds().unwrap();
        assert_eq!(min.z, 0.0);
        assert_eq!(max.z, 1.0);
        assert!((max.x - 0.8).abs() < 1e-6);
        assert!((max.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bevel_grows_beyond_both_faces() {
        let geom = text_geometry(&font(), "A", &TextGeometryParams::default());
        let (min, max) = geom.bounds().unwrap();
        assert!((min.z + 0.03).abs() < 1e-5);
        assert!((max.z - 0.13).abs() < 1e-5);
        // the widest ring is pushed out by the bevel size
        assert!(min.y < -0.019);
    }

    #[test]
    fn wall_normals_point_outward() {
        let geom = text_geometry(&font(), "A", &flat(1.0));
        let center = Vec3::new(0.4, 1.0 / 3.0, 0.5);

        for tri in geom.indices.chunks_exact(3) {
            let v = geom.vertices[tri[0] as usize];
            let n = Vec3::from(v.normal);
            if n.z.abs() > 0.5 {
                continue;
            }
            let p = Vec3::from(v.position);
            assert!(n.dot(p - center) > 0.0, "inward wall normal {:?} at {:?}", n, p);
        }
    }

    #[test]
    fn cap_winding_matches_normals() {
        let geom = text_geometry(&font(), "O", &flat(0.5));
        for tri in geom.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| position(&geom, i));
            let n = Vec3::from(geom.vertices[tri[0] as usize].normal);
            let face = (b - a).cross(c - a);
            if face.length() > 1e-9 {
                assert!(face.dot(n) > 0.0);
            }
        }
    }

    #[test]
    fn glyph_with_hole_keeps_hole_open() {
        let shapes = text_shapes(&font(), "O", &flat(0.1));
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].holes.len(), 1);

        let geom = text_geometry(&font(), "O", &flat(0.1));
        // front cap area: 1 - 0.25 for the unit square with a half-size hole
        let mut area = 0.0;
        for tri in geom.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| position(&geom, i));
            if geom.vertices[tri[0] as usize].normal == [0.0, 0.0, 1.0] {
                area += (b - a).cross(c - a).z * 0.5;
            }
        }
        assert!((area - 0.75).abs() < 1e-4);
    }

    #[test]
    fn glyphs_advance_and_lines_drop() {
        let params = flat(0.1);
        let shapes = text_shapes(&font(), "A A", &params);
        assert_eq!(shapes.len(), 2);
        // "A" (0.8) + " " (0.3)
        let left = shapes[1].outline.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        assert!((left - 1.1).abs() < 1e-5);

        let lines = text_shapes(&font(), "A\nA", &params);
        let lowest = lines[1].outline.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        assert!((lowest + 1.25).abs() < 1e-5);
    }

    #[test]
    fn missing_characters_render_as_fallback() {
        let shapes = text_shapes(&font(), "é", &flat(0.1));
        assert_eq!(shapes.len(), 1);
        let max_x = shapes[0].outline.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        assert!((max_x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_text_is_empty_geometry() {
        assert!(text_geometry(&font(), "", &TextGeometryParams::default()).is_empty());
        assert!(text_geometry(&font(), "   ", &TextGeometryParams::default()).is_empty());
    }
}
