//! Typeface JSON fonts: glyph outlines as compact command strings.
//!
//! The format stores each glyph as an advance width (`ha`), horizontal
//! extents and an outline string `o` made of commands:
//!
//! | Command | Operands             | Meaning                              |
//! |---------|----------------------|--------------------------------------|
//! | `m`     | `x y`                | start a new contour                  |
//! | `l`     | `x y`                | straight line                        |
//! | `q`     | `x y cx cy`          | quadratic curve, end point first     |
//! | `b`     | `x y c1x c1y c2x c2y`| cubic curve, end point first         |
//!
//! Coordinates are in font units; `resolution` units make one em.

use std::collections::HashMap;
use std::path::Path;

use glam::Vec2;
use serde::Deserialize;

use crate::geometry::LoadError;

/// Why a typeface could not be parsed.
#[derive(Debug)]
pub enum FontError {
    /// The JSON document is malformed or misses required fields.
    Json(serde_json::Error),
    /// A glyph outline string is malformed.
    Outline { glyph: char, message: String },
    /// Font-wide metrics are unusable.
    Metrics(String),
    /// Binary font data was rejected by the rasterizer.
    Rasterizer(String),
}

impl std::fmt::Display for FontError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontError::Json(e) => write!(f, "invalid typeface JSON: {}", e),
            FontError::Outline { glyph, message } => {
                write!(f, "bad outline for glyph {:?}: {}", glyph, message)
            }
            FontError::Metrics(msg) => write!(f, "bad font metrics: {}", msg),
            FontError::Rasterizer(msg) => write!(f, "font rejected: {}", msg),
        }
    }
}

impl std::error::Error for FontError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FontError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FontError {
    fn from(e: serde_json::Error) -> Self {
        FontError::Json(e)
    }
}

/// One outline drawing command, in font units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo { ctrl: Vec2, to: Vec2 },
    CubicTo { ctrl1: Vec2, ctrl2: Vec2, to: Vec2 },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Glyph {
    /// Horizontal advance in font units.
    pub advance: f32,
    pub x_min: f32,
    pub x_max: f32,
    pub commands: Vec<PathCommand>,
}

#[derive(Deserialize)]
struct RawGlyph {
    ha: f32,
    #[serde(default)]
    x_min: f32,
    #[serde(default)]
    x_max: f32,
    #[serde(default)]
    o: Option<String>,
}

#[derive(Deserialize, Default, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    #[serde(default)]
    pub x_min: f32,
    #[serde(default)]
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTypeface {
    glyphs: HashMap<String, RawGlyph>,
    resolution: f32,
    bounding_box: BoundingBox,
    #[serde(default)]
    underline_thickness: f32,
    #[serde(default)]
    family_name: Option<String>,
}

/// A parsed typeface font.
#[derive(Clone, Debug)]
pub struct Typeface {
    pub family_name: Option<String>,
    /// Font units per em.
    pub resolution: f32,
    pub bounding_box: BoundingBox,
    pub underline_thickness: f32,
    glyphs: HashMap<char, Glyph>,
}

impl Typeface {
    pub fn from_json(json: &str) -> Result<Self, FontError> {
        let raw: RawTypeface = serde_json::from_str(json)?;

        if raw.resolution.is_nan() || raw.resolution <= 0.0 {
            return Err(FontError::Metrics(format!(
                "resolution must be positive, got {}",
                raw.resolution
            )));
        }

        let mut glyphs = HashMap::with_capacity(raw.glyphs.len());
        for (key, glyph) in raw.glyphs {
            // Keys are single characters; anything else is not addressable.
            let mut chars = key.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                log::debug!("skipping multi-character glyph key {:?}", key);
                continue;
            };

            let commands = match glyph.o.as_deref() {
                Some(outline) => parse_outline(outline).map_err(|message| FontError::Outline {
                    glyph: c,
                    message,
                })?,
                None => Vec::new(),
            };

            glyphs.insert(
                c,
                Glyph {
                    advance: glyph.ha,
                    x_min: glyph.x_min,
                    x_max: glyph.x_max,
                    commands,
                },
            );
        }

        Ok(Self {
            family_name: raw.family_name,
            resolution: raw.resolution,
            bounding_box: raw.bounding_box,
            underline_thickness: raw.underline_thickness,
            glyphs,
        })
    }

    /// Reads and parses a `.typeface.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_json(&json).map_err(|e| LoadError::parse(path, e))
    }

    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs.get(&c)
    }

    /// The glyph for `c`, or `?` when the font lacks it.
    pub fn glyph_or_fallback(&self, c: char) -> Option<&Glyph> {
        self.glyph(c).or_else(|| {
            log::warn!(
                "character {:?} not in font {}, using '?'",
                c,
                self.family_name.as_deref().unwrap_or("<unnamed>")
            );
            self.glyph('?')
        })
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Font units to world units for text of height `size`.
    pub fn scale(&self, size: f32) -> f32 {
        size / self.resolution
    }

    /// Vertical distance between baselines at `size`.
    pub fn line_height(&self, size: f32) -> f32 {
        let bb = &self.bounding_box;
        (bb.y_max - bb.y_min + self.underline_thickness) * self.scale(size)
    }
}

/// Parses an outline command string.
pub fn parse_outline(outline: &str) -> Result<Vec<PathCommand>, String> {
    let mut tokens = outline.split_whitespace();
    let mut commands = Vec::new();

    while let Some(op) = tokens.next() {
        let command = match op {
            "m" => PathCommand::MoveTo(next_point(&mut tokens, op)?),
            "l" => PathCommand::LineTo(next_point(&mut tokens, op)?),
            "q" => {
                let to = next_point(&mut tokens, op)?;
                let ctrl = next_point(&mut tokens, op)?;
                PathCommand::QuadTo { ctrl, to }
            }
            "b" => {
                let to = next_point(&mut tokens, op)?;
                let ctrl1 = next_point(&mut tokens, op)?;
                let ctrl2 = next_point(&mut tokens, op)?;
                PathCommand::CubicTo { ctrl1, ctrl2, to }
            }
            // Contours close implicitly.
            "z" => continue,
            other => return Err(format!("unknown command '{}'", other)),
        };
        commands.push(command);
    }

    Ok(commands)
}

fn next_point(tokens: &mut std::str::SplitWhitespace, op: &str) -> Result<Vec2, String> {
    let mut number = || {
        let token = tokens
            .next()
            .ok_or_else(|| format!("'{}' is missing an operand", op))?;
        token
            .parse::<f32>()
            .map_err(|_| format!("'{}' is not a number", token))
    };
    let x = number()?;
    let y = number()?;
    Ok(Vec2::new(x, y))
}
