use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use suggestion_map_shared::{
    ClickHandler, GeoBounds, GeoPoint, LabelPlacement, LabelScene, MapGeometry, Region,
    ScreenBounds, ScreenPoint, TextExtent,
};

use crate::config::{DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, MAX_VIEWPORT_EDGE};

const LABEL_CLASS: &str = "map-text-label";
const VIEWPORT_PADDING: f64 = 8.0;
/// Average glyph advance as a fraction of the font size.
const GLYPH_ADVANCE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

impl Viewport {
    pub fn is_valid(&self) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
            && self.width <= MAX_VIEWPORT_EDGE
            && self.height <= MAX_VIEWPORT_EDGE
    }
}

/// Equirectangular projection fitted to a geographic extent.
///
/// Longitudes are scaled by the cosine of the extent's middle latitude so the
/// shapes keep roughly the right aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    extent: GeoBounds,
    lon_factor: f64,
    scale: f64,
    offset: ScreenPoint,
}

impl Projection {
    pub fn fit(extent: GeoBounds, viewport: Viewport) -> Self {
        let mid_lat = (extent.min_lat() + extent.max_lat()) / 2.0;
        let lon_factor = mid_lat.to_radians().cos().max(0.1);
        let span_x = ((extent.max_lon() - extent.min_lon()) * lon_factor).max(f64::EPSILON);
        let span_y = (extent.max_lat() - extent.min_lat()).max(f64::EPSILON);
        let avail_w = (viewport.width - 2.0 * VIEWPORT_PADDING).max(1.0);
        let avail_h = (viewport.height - 2.0 * VIEWPORT_PADDING).max(1.0);
        let scale = (avail_w / span_x).min(avail_h / span_y);
        let offset = ScreenPoint::new(
            (viewport.width - span_x * scale) / 2.0,
            (viewport.height - span_y * scale) / 2.0,
        );
        Self {
            extent,
            lon_factor,
            scale,
            offset,
        }
    }

    pub fn project(&self, point: GeoPoint) -> ScreenPoint {
        ScreenPoint::new(
            self.offset.x + (point.lon - self.extent.min_lon()) * self.lon_factor * self.scale,
            self.offset.y + (self.extent.max_lat() - point.lat) * self.scale,
        )
    }
}

/// Region geometry reduced to projected bounding boxes.
#[derive(Debug, Clone)]
pub struct BboxGeometry {
    bounds: HashMap<String, GeoBounds>,
    extent: Option<GeoBounds>,
    projection: Option<Projection>,
}

impl BboxGeometry {
    pub fn new(bounds: Vec<(String, GeoBounds)>, viewport: Viewport) -> Self {
        let extent = bounds
            .iter()
            .map(|(_, b)| *b)
            .reduce(|acc, b| acc.union(&b));
        let projection = extent.map(|extent| Projection::fit(extent, viewport));
        Self {
            bounds: bounds.into_iter().collect(),
            extent,
            projection,
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.projection = self.extent.map(|extent| Projection::fit(extent, viewport));
    }
}

impl MapGeometry for BboxGeometry {
    fn project(&self, point: GeoPoint) -> Option<ScreenPoint> {
        self.projection.map(|projection| projection.project(point))
    }

    fn centroid(&self, region: &Region) -> Option<ScreenPoint> {
        self.bounds(region).map(|bounds| bounds.center())
    }

    fn bounds(&self, region: &Region) -> Option<ScreenBounds> {
        let projection = self.projection?;
        let geo = self.bounds.get(&region.id)?;
        Some(ScreenBounds {
            min: projection.project(GeoPoint {
                lon: geo.min_lon(),
                lat: geo.max_lat(),
            }),
            max: projection.project(GeoPoint {
                lon: geo.max_lon(),
                lat: geo.min_lat(),
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SvgLabel {
    region_id: String,
    text: String,
    position: ScreenPoint,
    font_size: f64,
    href: Option<String>,
}

/// Text-only SVG layer drawn over the map.
#[derive(Debug, Clone, Default)]
pub struct SvgScene {
    viewport: Viewport,
    labels: Vec<SvgLabel>,
}

impl SvgScene {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            labels: Vec::new(),
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn link_count(&self) -> usize {
        self.labels.iter().filter(|label| label.href.is_some()).count()
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(256 + self.labels.len() * 160);
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.viewport.width,
            h = self.viewport.height,
        );
        for label in &self.labels {
            let text = format!(
                r#"<text class="{LABEL_CLASS}" data-region="{id}" x="{x:.1}" y="{y:.1}" style="font-size: {size}px">{body}</text>"#,
                id = html_escape::encode_double_quoted_attribute(&label.region_id),
                x = label.position.x,
                y = label.position.y,
                size = label.font_size,
                body = html_escape::encode_text(&label.text),
            );
            match &label.href {
                Some(href) => {
                    let _ = write!(
                        out,
                        r#"<a href="{}" target="_blank" rel="noopener">{text}</a>"#,
                        html_escape::encode_double_quoted_attribute(href),
                    );
                }
                None => out.push_str(&text),
            }
        }
        out.push_str("</svg>");
        out
    }
}

impl LabelScene for SvgScene {
    fn clear_labels(&mut self) {
        self.labels.clear();
    }

    fn measure(&self, text: &str, font_size: f64) -> TextExtent {
        TextExtent {
            width: text.chars().count() as f64 * font_size * GLYPH_ADVANCE,
            height: font_size,
        }
    }

    fn draw_label(
        &mut self,
        region: &Region,
        label: &LabelPlacement,
        on_click: Option<&ClickHandler>,
    ) {
        self.labels.push(SvgLabel {
            region_id: label.region_id.clone(),
            text: label.text.clone(),
            position: label.position,
            font_size: label.font_size,
            href: on_click.and_then(|handler| handler(region)),
        });
    }
}
