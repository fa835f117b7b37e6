//! Bitmap font atlases for screen-space overlay text.
//!
//! Rasterizing happens on the CPU ([`FontAtlasData::rasterize`]), so it can
//! run on a loader thread; the result is uploaded on the event-loop thread
//! with [`FontAtlas::upload`].

use std::collections::HashMap;
use std::path::Path;

use fontdue::{Font, FontSettings};

use crate::geometry::LoadError;
use crate::gpu::GpuContext;
use crate::texture::Texture;
use crate::typeface::FontError;

/// Printable ASCII, pre-rasterized into every atlas.
const ATLAS_CHARS: std::ops::RangeInclusive<u8> = 32..=126;
const PADDING: u32 = 1;
const INITIAL_SIZE: u32 = 256;

/// Information about a single glyph in the atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphInfo {
    /// UV rectangle in the atlas: `[x, y, width, height]`, normalized.
    pub uv: [f32; 4],
    pub width: u32,
    pub height: u32,
    /// Left bearing in pixels.
    pub offset_x: f32,
    /// Distance from the baseline to the bitmap bottom, in pixels.
    pub offset_y: f32,
    pub advance: f32,
}

/// Per-glyph placement data, shared by the CPU and GPU atlas.
#[derive(Clone, Debug, Default)]
pub struct FontMetrics {
    glyphs: HashMap<char, GlyphInfo>,
    size: f32,
    line_height: f32,
    ascent: f32,
}

impl FontMetrics {
    pub(crate) fn new(
        glyphs: HashMap<char, GlyphInfo>,
        size: f32,
        line_height: f32,
        ascent: f32,
    ) -> Self {
        Self {
            glyphs,
            size,
            line_height,
            ascent,
        }
    }

    pub fn glyph(&self, c: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&c)
    }

    /// Pixel size the glyphs were rasterized at.
    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Baseline distance below the top of a line.
    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    /// Horizontal advance for `c`; half the pixel size for unknown glyphs.
    pub fn advance(&self, c: char) -> f32 {
        self.glyphs
            .get(&c)
            .map(|g| g.advance)
            .unwrap_or(self.size * 0.5)
    }

    /// Advance width of `text` in pixels.
    pub fn measure(&self, text: &str) -> f32 {
        text.chars().map(|c| self.advance(c)).sum()
    }
}

/// Where each rectangle landed in a row-packed atlas.
#[derive(Clone, Debug, PartialEq)]
pub struct Packing {
    pub width: u32,
    pub height: u32,
    /// Top-left corner per input rectangle, in input order.
    pub positions: Vec<(u32, u32)>,
}

/// Packs `sizes` left to right in rows, doubling the smaller atlas side
/// until everything fits.
pub fn pack_rows(sizes: &[(u32, u32)], padding: u32, initial: u32) -> Packing {
    let mut width = initial.max(1);
    let mut height = initial.max(1);

    loop {
        if let Some(positions) = try_pack(sizes, padding, width, height) {
            return Packing {
                width,
                height,
                positions,
            };
        }
        if width <= height {
            width *= 2;
        } else {
            height *= 2;
        }
    }
}

fn try_pack(sizes: &[(u32, u32)], padding: u32, width: u32, height: u32) -> Option<Vec<(u32, u32)>> {
    let mut positions = Vec::with_capacity(sizes.len());
    let mut x = padding;
    let mut y = padding;
    let mut row_height = 0u32;

    for &(w, h) in sizes {
        if w + 2 * padding > width {
            return None;
        }
        if x + w + padding > width {
            x = padding;
            y += row_height + padding;
            row_height = 0;
        }
        if y + h + padding > height {
            return None;
        }
        positions.push((x, y));
        x += w + padding;
        row_height = row_height.max(h);
    }
    Some(positions)
}

/// A rasterized single-channel atlas that has not been uploaded yet.
#[derive(Clone, Debug)]
pub struct FontAtlasData {
    pub metrics: FontMetrics,
    pub width: u32,
    pub height: u32,
    /// `width * height` coverage bytes.
    pub pixels: Vec<u8>,
}

impl FontAtlasData {
    /// Rasterizes printable ASCII from TTF/OTF bytes at `size` pixels.
    pub fn rasterize(font_data: &[u8], size: f32) -> Result<Self, FontError> {
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| FontError::Rasterizer(e.to_string()))?;

        let rasterized: Vec<(char, fontdue::Metrics, Vec<u8>)> = ATLAS_CHARS
            .map(char::from)
            .map(|c| {
                let (metrics, bitmap) = font.rasterize(c, size);
                (c, metrics, bitmap)
            })
            .collect();

        let sizes: Vec<(u32, u32)> = rasterized
            .iter()
            .map(|(_, m, _)| (m.width as u32, m.height as u32))
            .collect();
        let packing = pack_rows(&sizes, PADDING, INITIAL_SIZE);
        let (atlas_w, atlas_h) = (packing.width, packing.height);

        let mut pixels = vec![0u8; (atlas_w * atlas_h) as usize];
        let mut glyphs = HashMap::with_capacity(rasterized.len());

        for ((c, metrics, bitmap), &(x, y)) in rasterized.iter().zip(&packing.positions) {
            let (glyph_w, glyph_h) = (metrics.width as u32, metrics.height as u32);

            for gy in 0..glyph_h {
                let src = (gy * glyph_w) as usize;
                let dst = ((y + gy) * atlas_w + x) as usize;
                pixels[dst..dst + glyph_w as usize]
                    .copy_from_slice(&bitmap[src..src + glyph_w as usize]);
            }

            glyphs.insert(
                *c,
                GlyphInfo {
                    uv: [
                        x as f32 / atlas_w as f32,
                        y as f32 / atlas_h as f32,
                        glyph_w as f32 / atlas_w as f32,
                        glyph_h as f32 / atlas_h as f32,
                    ],
                    width: glyph_w,
                    height: glyph_h,
                    offset_x: metrics.xmin as f32,
                    offset_y: metrics.ymin as f32,
                    advance: metrics.advance_width,
                },
            );
        }

        let line_metrics = font.horizontal_line_metrics(size);
        let line_height = line_metrics.map(|m| m.new_line_size).unwrap_or(size * 1.2);
        let ascent = line_metrics.map(|m| m.ascent).unwrap_or(size);

        log::debug!(
            "rasterized {} glyphs at {}px into a {}x{} atlas",
            glyphs.len(),
            size,
            atlas_w,
            atlas_h
        );

        Ok(Self {
            metrics: FontMetrics::new(glyphs, size, line_height, ascent),
            width: atlas_w,
            height: atlas_h,
            pixels,
        })
    }

    /// Reads a font file and rasterizes it.
    pub fn load(path: impl AsRef<Path>, size: f32) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        Self::rasterize(&bytes, size).map_err(|e| LoadError::parse(path, e))
    }
}

/// A font atlas resident on the GPU.
pub struct FontAtlas {
    pub texture: Texture,
    metrics: FontMetrics,
}

impl FontAtlas {
    pub fn upload(gpu: &GpuContext, data: &FontAtlasData) -> Self {
        Self {
            texture: Texture::coverage(gpu, "Font Atlas", (data.width, data.height), &data.pixels),
            metrics: data.metrics.clone(),
        }
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }
}
