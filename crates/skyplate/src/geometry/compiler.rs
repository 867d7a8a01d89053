//! Resolves catalog constellation lines against solved annotations and
//! turns both into drawing primitives.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::Serialize;

use super::catalog::Catalog;
use super::names::matches_pattern;
use super::overlay::{Color, DrawPrimitive, LabelBackground, MarkerShape, Point, TextAnchor};
use crate::client::AnnotationRecord;

/// Annotations with a radius above this are drawn as fitted circles.
pub const CIRCLE_RADIUS_THRESHOLD: f64 = 5.0;

const DEFAULT_MARKER_SIZE: f64 = 20.0;
const BRIGHT_MARKER_SIZE: f64 = 50.0;
const LABEL_OFFSET: f64 = 10.0;
const LINE_WIDTH: f64 = 1.5;
const LINE_ALPHA: f64 = 0.7;

/// A constellation line whose endpoints were both found in the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstellationEdge {
    pub constellation: String,
    pub from: String,
    pub to: String,
    pub from_px: Point,
    pub to_px: Point,
    pub pixel_distance: f64,
    /// Degrees. Absent without a pixel scale.
    pub angular_separation: Option<f64>,
    /// Light-years. Needs the angle and both catalog distances.
    pub physical_separation: Option<f64>,
}

impl ConstellationEdge {
    /// Midpoint label: angle, plus distance when known.
    pub fn label(&self) -> Option<String> {
        let angle = self.angular_separation?;
        let mut text = format!("{:.1}°", angle);
        if let Some(ly) = self.physical_separation {
            text.push_str(&format!("\n{:.0} ly", ly));
        }
        Some(text)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompiledOverlay {
    pub edges: Vec<ConstellationEdge>,
    pub primitives: Vec<DrawPrimitive>,
    /// Catalog patterns that matched no annotation, sorted.
    pub unresolved: Vec<String>,
    /// Lines skipped because an endpoint was unresolved.
    pub dropped_edges: usize,
    /// `(constellation, lines drawn)` in catalog order.
    pub lines_per_constellation: Vec<(String, usize)>,
}

/// Three-dimensional separation of two stars at `d1` and `d2` seen
/// `theta_deg` degrees apart.
pub fn physical_separation(d1: f64, d2: f64, theta_deg: f64) -> f64 {
    let theta = theta_deg.to_radians();
    (d1 * d1 + d2 * d2 - 2.0 * d1 * d2 * theta.cos())
        .max(0.0)
        .sqrt()
}

/// First annotation, by annotation order then alias order, with an alias
/// matching `pattern`.
pub fn resolve<'a>(pattern: &str, annotations: &'a [AnnotationRecord]) -> Option<&'a AnnotationRecord> {
    annotations
        .iter()
        .find(|a| a.names.iter().any(|alias| matches_pattern(pattern, alias)))
}

pub struct GeometryCompiler {
    catalog: Catalog,
}

impl GeometryCompiler {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Builds annotation markers and constellation lines.
    ///
    /// `degrees_per_pixel` comes from the solve calibration. Without it, lines
    /// are still drawn but carry no separation labels.
    pub fn compile(
        &self,
        annotations: &[AnnotationRecord],
        degrees_per_pixel: Option<f64>,
    ) -> CompiledOverlay {
        let scale = degrees_per_pixel.filter(|s| {
            let usable = s.is_finite() && *s > 0.0;
            if !usable {
                warn!("Ignoring unusable pixel scale {}", s);
            }
            usable
        });

        let valid: Vec<AnnotationRecord> =
            annotations.iter().filter(|a| a.is_valid()).cloned().collect();
        if valid.len() < annotations.len() {
            warn!(
                "Ignoring {} annotation(s) with invalid coordinates",
                annotations.len() - valid.len()
            );
        }

        let mut overlay = CompiledOverlay::default();
        for annotation in &valid {
            annotation_primitives(annotation, &mut overlay.primitives);
        }

        let mut lookups: HashMap<&str, Option<Point>> = HashMap::new();
        for figure in &self.catalog.constellations {
            let mut drawn = 0;
            for (from, to) in &figure.lines {
                let from_px = *lookups
                    .entry(from.as_str())
                    .or_insert_with(|| resolve(from, &valid).map(position));
                let to_px = *lookups
                    .entry(to.as_str())
                    .or_insert_with(|| resolve(to, &valid).map(position));

                let (Some(from_px), Some(to_px)) = (from_px, to_px) else {
                    overlay.dropped_edges += 1;
                    continue;
                };

                let edge = self.edge(&figure.name, from, to, from_px, to_px, scale);
                edge_primitives(&edge, figure.color, &mut overlay.primitives);
                overlay.edges.push(edge);
                drawn += 1;
            }

            if drawn > 0 {
                info!("Drew {} line(s) for {}", drawn, figure.name);
            }
            overlay
                .lines_per_constellation
                .push((figure.name.clone(), drawn));
        }

        let mut unresolved: Vec<String> = lookups
            .into_iter()
            .filter(|(_, point)| point.is_none())
            .map(|(pattern, _)| pattern.to_string())
            .collect();
        unresolved.sort();
        if !unresolved.is_empty() {
            debug!("Unresolved catalog stars: {}", unresolved.join(", "));
        }
        overlay.unresolved = unresolved;
        info!(
            "Drew {} of {} catalog line(s)",
            overlay.edges.len(),
            self.catalog.line_count()
        );

        overlay
    }

    fn edge(
        &self,
        constellation: &str,
        from: &str,
        to: &str,
        from_px: Point,
        to_px: Point,
        scale: Option<f64>,
    ) -> ConstellationEdge {
        let pixel_distance = from_px.distance_to(&to_px);
        let angular_separation = scale.map(|s| pixel_distance * s);
        let physical_separation = angular_separation.and_then(|theta| {
            let d1 = self.catalog.distance_ly(from)?;
            let d2 = self.catalog.distance_ly(to)?;
            Some(physical_separation(d1, d2, theta))
        });

        ConstellationEdge {
            constellation: constellation.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            from_px,
            to_px,
            pixel_distance,
            angular_separation,
            physical_separation,
        }
    }
}

fn position(annotation: &AnnotationRecord) -> Point {
    Point::new(annotation.pixel_x, annotation.pixel_y)
}

fn annotation_primitives(annotation: &AnnotationRecord, out: &mut Vec<DrawPrimitive>) {
    let (color, shape, size) = match annotation.kind.as_str() {
        "ngc" | "ic" => {
            let size = if annotation.radius > 0.0 {
                annotation.radius
            } else {
                DEFAULT_MARKER_SIZE
            };
            (Color::Cyan, MarkerShape::Circle, size)
        }
        "bright" => (Color::Yellow, MarkerShape::Star, BRIGHT_MARKER_SIZE),
        _ => (Color::Red, MarkerShape::Cross, DEFAULT_MARKER_SIZE),
    };

    let at = position(annotation);
    if annotation.radius > CIRCLE_RADIUS_THRESHOLD {
        out.push(DrawPrimitive::Circle {
            center: at,
            radius: annotation.radius,
            color,
            line_width: LINE_WIDTH,
        });
    } else {
        out.push(DrawPrimitive::Marker {
            at,
            shape,
            size,
            color,
        });
    }

    out.push(DrawPrimitive::Text {
        at: at.offset(LABEL_OFFSET, LABEL_OFFSET),
        text: annotation.label().to_string(),
        color,
        font_size: 12.0,
        bold: true,
        anchor: TextAnchor::Start,
        background: Some(LabelBackground {
            color: Color::Black,
            alpha: 0.5,
        }),
    });
}

fn edge_primitives(edge: &ConstellationEdge, color: Color, out: &mut Vec<DrawPrimitive>) {
    out.push(DrawPrimitive::Line {
        from: edge.from_px,
        to: edge.to_px,
        color,
        line_width: LINE_WIDTH,
        alpha: LINE_ALPHA,
    });

    if let Some(text) = edge.label() {
        out.push(DrawPrimitive::Text {
            at: edge.from_px.midpoint(&edge.to_px),
            text,
            color: Color::White,
            font_size: 9.0,
            bold: false,
            anchor: TextAnchor::Center,
            background: Some(LabelBackground {
                color: Color::Black,
                alpha: 0.6,
            }),
        });
    }
}
