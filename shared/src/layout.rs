//! Label placement for region overlays.
//!
//! Regions are labelled at the center of their screen bounding box, shifted by
//! half of the rendered text extent so the text (not its corner) is centered.
//! A fixed cluster of small regions is instead stacked as a legend below a
//! projected anchor point, and a static table of per-region nudges is applied
//! last.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::region::Region;
use crate::suggestion::SuggestionResult;

pub const DEFAULT_FONT_SIZE: f64 = 13.0;
pub const DEFAULT_CLUSTER_GAP: f64 = 5.0;

/// Region id -> chosen suggestion, rebuilt on every search.
pub type LabelAssignment = BTreeMap<String, SuggestionResult>;

/// Region id -> full suggestion text opened on click.
pub type ClickQueries = BTreeMap<String, String>;

/// Resolves the action for a clicked label; `None` means the click does nothing.
pub type ClickHandler = Arc<dyn Fn(&Region) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenBounds {
    pub min: ScreenPoint,
    pub max: ScreenPoint,
}

impl ScreenBounds {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextExtent {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// Rendering-side geometry for the regions on a map.
pub trait MapGeometry {
    fn project(&self, point: GeoPoint) -> Option<ScreenPoint>;
    fn centroid(&self, region: &Region) -> Option<ScreenPoint>;
    fn bounds(&self, region: &Region) -> Option<ScreenBounds>;
}

/// Scene graph holding the drawn label nodes.
pub trait LabelScene {
    fn clear_labels(&mut self);
    fn measure(&self, text: &str, font_size: f64) -> TextExtent;
    fn draw_label(
        &mut self,
        region: &Region,
        label: &LabelPlacement,
        on_click: Option<&ClickHandler>,
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Adjustment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl Adjustment {
    pub const fn new(x: Option<f64>, y: Option<f64>) -> Self {
        Self { x, y }
    }

    fn apply(&self, point: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(
            point.x + self.x.unwrap_or(0.0),
            point.y + self.y.unwrap_or(0.0),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmallRegionCluster {
    pub anchor: GeoPoint,
    pub gap: f64,
    pub members: Vec<String>,
}

impl SmallRegionCluster {
    pub fn empty() -> Self {
        Self {
            anchor: GeoPoint { lon: 0.0, lat: 0.0 },
            gap: DEFAULT_CLUSTER_GAP,
            members: Vec::new(),
        }
    }

    pub fn index_of(&self, region_id: &str) -> Option<usize> {
        self.members.iter().position(|id| id == region_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub font_size: f64,
    pub cluster: SmallRegionCluster,
    pub adjustments: HashMap<String, Adjustment>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::world()
    }
}

impl LayoutConfig {
    /// Tables tuned for the national subdivision map.
    pub fn national() -> Self {
        let members = ["VT", "NH", "MA", "RI", "CT", "NJ", "DE", "MD", "DC"]
            .into_iter()
            .map(str::to_string)
            .collect();
        let adjustments = [
            ("CA", Adjustment::new(Some(-50.0), None)),
            ("FL", Adjustment::new(Some(40.0), None)),
            ("WV", Adjustment::new(Some(-20.0), Some(10.0))),
            ("ID", Adjustment::new(Some(-20.0), Some(60.0))),
            ("LA", Adjustment::new(Some(-20.0), Some(20.0))),
            ("MI", Adjustment::new(Some(20.0), Some(50.0))),
        ]
        .into_iter()
        .map(|(id, adjustment)| (id.to_string(), adjustment))
        .collect();

        Self {
            font_size: DEFAULT_FONT_SIZE,
            cluster: SmallRegionCluster {
                // Off the Mid-Atlantic seaboard.
                anchor: GeoPoint {
                    lon: -70.0,
                    lat: 41.5,
                },
                gap: DEFAULT_CLUSTER_GAP,
                members,
            },
            adjustments,
        }
    }

    pub fn world() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            cluster: SmallRegionCluster::empty(),
            adjustments: HashMap::new(),
        }
    }

    pub fn for_scope(scope: &crate::region::MapScope) -> Self {
        match scope {
            crate::region::MapScope::National => Self::national(),
            _ => Self::world(),
        }
    }
}

pub struct LabelOptions {
    pub font_size: f64,
    pub click_handler: Option<ClickHandler>,
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            click_handler: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPlacement {
    pub region_id: String,
    pub text: String,
    pub position: ScreenPoint,
    pub font_size: f64,
    pub stacked: bool,
}

/// Draw one label per region with a non-empty highlight.
///
/// Previously drawn labels are always removed first. Returns the placements
/// that were drawn, in region order.
pub fn place<G, S>(
    regions: &[Region],
    assignment: &LabelAssignment,
    options: &LabelOptions,
    config: &LayoutConfig,
    geometry: &G,
    scene: &mut S,
) -> Vec<LabelPlacement>
where
    G: MapGeometry + ?Sized,
    S: LabelScene + ?Sized,
{
    scene.clear_labels();

    let font_size = options.font_size;
    let cluster_origin = geometry.project(config.cluster.anchor);
    let mut placements = Vec::new();

    for region in regions {
        let Some(result) = assignment.get(&region.id).filter(|r| !r.is_empty()) else {
            continue;
        };

        let cluster_index = config.cluster.index_of(&region.id);
        let text = match cluster_index {
            Some(_) => format!("{}:  {}", region.id, result.highlight),
            None => result.highlight.clone(),
        };

        let position = match cluster_index {
            Some(index) => cluster_origin
                .map(|origin| stacked_position(origin, index, config.cluster.gap, font_size)),
            None => centered_position(geometry, region, scene.measure(&text, font_size)),
        };
        let Some(position) = position else {
            continue;
        };
        let position = match config.adjustments.get(&region.id) {
            Some(adjustment) => adjustment.apply(position),
            None => position,
        };

        let placement = LabelPlacement {
            region_id: region.id.clone(),
            text,
            position,
            font_size,
            stacked: cluster_index.is_some(),
        };
        scene.draw_label(region, &placement, options.click_handler.as_ref());
        placements.push(placement);
    }

    placements
}

fn stacked_position(origin: ScreenPoint, index: usize, gap: f64, font_size: f64) -> ScreenPoint {
    ScreenPoint::new(origin.x, origin.y + index as f64 * (gap + font_size))
}

fn centered_position<G>(geometry: &G, region: &Region, extent: TextExtent) -> Option<ScreenPoint>
where
    G: MapGeometry + ?Sized,
{
    if let Some(bounds) = geometry.bounds(region) {
        return Some(ScreenPoint::new(
            bounds.min.x + (bounds.width() - extent.width) / 2.0,
            bounds.min.y + (bounds.height() - extent.height) / 2.0,
        ));
    }
    geometry.centroid(region).map(|centroid| {
        ScreenPoint::new(
            centroid.x - extent.width / 2.0,
            centroid.y - extent.height / 2.0,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::MapScope;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct GridGeometry {
        bounds: HashMap<String, ScreenBounds>,
        centroids: HashMap<String, ScreenPoint>,
    }

    impl GridGeometry {
        fn new() -> Self {
            let mut bounds = HashMap::new();
            bounds.insert(
                "TX".to_string(),
                ScreenBounds {
                    min: ScreenPoint::new(100.0, 200.0),
                    max: ScreenPoint::new(300.0, 320.0),
                },
            );
            bounds.insert(
                "CA".to_string(),
                ScreenBounds {
                    min: ScreenPoint::new(0.0, 0.0),
                    max: ScreenPoint::new(80.0, 160.0),
                },
            );
            let mut centroids = HashMap::new();
            centroids.insert("TX".to_string(), ScreenPoint::new(150.0, 290.0));
            centroids.insert("HI".to_string(), ScreenPoint::new(40.0, 500.0));
            Self { bounds, centroids }
        }
    }

    impl MapGeometry for GridGeometry {
        fn project(&self, point: GeoPoint) -> Option<ScreenPoint> {
            Some(ScreenPoint::new(point.lon * -10.0, point.lat * 2.0))
        }

        fn centroid(&self, region: &Region) -> Option<ScreenPoint> {
            self.centroids.get(&region.id).copied()
        }

        fn bounds(&self, region: &Region) -> Option<ScreenBounds> {
            self.bounds.get(&region.id).copied()
        }
    }

    #[derive(Default)]
    struct RecordingScene {
        labels: Vec<(LabelPlacement, Option<String>)>,
        listeners: usize,
        clears: usize,
    }

    impl LabelScene for RecordingScene {
        fn clear_labels(&mut self) {
            self.labels.clear();
            self.listeners = 0;
            self.clears += 1;
        }

        fn measure(&self, text: &str, font_size: f64) -> TextExtent {
            TextExtent {
                width: text.chars().count() as f64 * 10.0,
                height: font_size,
            }
        }

        fn draw_label(
            &mut self,
            region: &Region,
            label: &LabelPlacement,
            on_click: Option<&ClickHandler>,
        ) {
            let action = on_click.and_then(|handler| {
                self.listeners += 1;
                handler(region)
            });
            self.labels.push((label.clone(), action));
        }
    }

    fn region(id: &str) -> Region {
        Region {
            id: id.to_string(),
            name: id.to_string(),
        }
    }

    fn result(highlight: &str) -> SuggestionResult {
        SuggestionResult {
            highlight: highlight.to_string(),
            suggestion: format!("full {highlight}"),
        }
    }

    fn assignment(pairs: &[(&str, &str)]) -> LabelAssignment {
        pairs
            .iter()
            .map(|(id, highlight)| (id.to_string(), result(highlight)))
            .collect()
    }

    #[test]
    fn bounds_center_minus_half_text_extent() {
        let regions = vec![region("TX")];
        let mut scene = RecordingScene::default();
        let placed = place(
            &regions,
            &assignment(&[("TX", "bbq")]),
            &LabelOptions::default(),
            &LayoutConfig::national(),
            &GridGeometry::new(),
            &mut scene,
        );

        // bounds 200x120 at (100,200); text 30x13
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].position, ScreenPoint::new(185.0, 253.5));
        assert_ne!(placed[0].position, ScreenPoint::new(150.0, 290.0));
        assert!(!placed[0].stacked);
    }

    #[test]
    fn centroid_is_fallback_without_bounds() {
        let regions = vec![region("HI")];
        let mut scene = RecordingScene::default();
        let placed = place(
            &regions,
            &assignment(&[("HI", "poke")]),
            &LabelOptions::default(),
            &LayoutConfig::world(),
            &GridGeometry::new(),
            &mut scene,
        );
        assert_eq!(placed[0].position, ScreenPoint::new(20.0, 493.5));
    }

    #[test]
    fn regions_without_any_geometry_are_skipped() {
        let regions = vec![region("ZZ")];
        let mut scene = RecordingScene::default();
        let placed = place(
            &regions,
            &assignment(&[("ZZ", "x")]),
            &LabelOptions::default(),
            &LayoutConfig::world(),
            &GridGeometry::new(),
            &mut scene,
        );
        assert!(placed.is_empty());
        assert!(scene.labels.is_empty());
    }

    #[test]
    fn adjustment_is_added_after_placement() {
        let regions = vec![region("CA")];
        let mut scene = RecordingScene::default();
        let placed = place(
            &regions,
            &assignment(&[("CA", "ab")]),
            &LabelOptions::default(),
            &LayoutConfig::national(),
            &GridGeometry::new(),
            &mut scene,
        );
        // center placement (30, 73.5), then x - 50
        assert_eq!(placed[0].position, ScreenPoint::new(-20.0, 73.5));
    }

    #[test]
    fn cluster_members_stack_in_configured_order() {
        let ids = ["DC", "VT", "MA", "NJ"];
        let regions: Vec<Region> = ids.iter().map(|id| region(id)).collect();
        let pairs: Vec<(&str, &str)> = ids.iter().map(|id| (*id, "x")).collect();
        let options = LabelOptions {
            font_size: 20.0,
            click_handler: None,
        };
        let config = LayoutConfig::national();
        let mut scene = RecordingScene::default();
        let placed = place(
            &regions,
            &assignment(&pairs),
            &options,
            &config,
            &GridGeometry::new(),
            &mut scene,
        );

        let mut by_cluster_order: Vec<&LabelPlacement> = placed.iter().collect();
        by_cluster_order.sort_by_key(|p| config.cluster.index_of(&p.region_id));
        let step = config.cluster.gap + options.font_size;
        for pair in by_cluster_order.windows(2) {
            let a = config.cluster.index_of(&pair[0].region_id).unwrap_or(0);
            let b = config.cluster.index_of(&pair[1].region_id).unwrap_or(0);
            assert!(pair[1].position.y > pair[0].position.y);
            assert_eq!(pair[1].position.y - pair[0].position.y, (b - a) as f64 * step);
            assert_eq!(pair[0].position.x, pair[1].position.x);
        }

        let vt = placed.iter().find(|p| p.region_id == "VT").expect("VT placed");
        assert_eq!(vt.position, ScreenPoint::new(700.0, 83.0));
        assert_eq!(vt.text, "VT:  x");
        assert!(vt.stacked);
    }

    #[test]
    fn empty_highlight_draws_nothing_and_attaches_no_listener() {
        let regions = vec![region("TX"), region("CA")];
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&clicks);
        let handler: ClickHandler = Arc::new(move |r: &Region| {
            counter.fetch_add(1, Ordering::Relaxed);
            Some(format!("open {}", r.id))
        });
        let options = LabelOptions {
            font_size: DEFAULT_FONT_SIZE,
            click_handler: Some(handler),
        };
        let mut scene = RecordingScene::default();
        place(
            &regions,
            &assignment(&[("TX", ""), ("CA", "gold")]),
            &options,
            &LayoutConfig::national(),
            &GridGeometry::new(),
            &mut scene,
        );

        assert_eq!(scene.labels.len(), 1);
        assert_eq!(scene.listeners, 1);
        assert_eq!(scene.labels[0].0.region_id, "CA");
        assert_eq!(scene.labels[0].1.as_deref(), Some("open CA"));
        assert_eq!(clicks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn previous_labels_are_cleared_on_every_pass() {
        let regions = vec![region("TX")];
        let geometry = GridGeometry::new();
        let config = LayoutConfig::national();
        let mut scene = RecordingScene::default();
        place(
            &regions,
            &assignment(&[("TX", "a")]),
            &LabelOptions::default(),
            &config,
            &geometry,
            &mut scene,
        );
        place(
            &regions,
            &LabelAssignment::new(),
            &LabelOptions::default(),
            &config,
            &geometry,
            &mut scene,
        );
        assert_eq!(scene.clears, 2);
        assert!(scene.labels.is_empty());
    }

    #[test]
    fn layout_is_deterministic() {
        let regions = vec![region("TX"), region("CA"), region("VT")];
        let labels = assignment(&[("TX", "a"), ("CA", "b"), ("VT", "c")]);
        let geometry = GridGeometry::new();
        let config = LayoutConfig::national();
        let mut scene = RecordingScene::default();
        let a = place(&regions, &labels, &LabelOptions::default(), &config, &geometry, &mut scene);
        let b = place(&regions, &labels, &LabelOptions::default(), &config, &geometry, &mut scene);
        assert_eq!(a, b);
    }

    #[test]
    fn scope_tables() {
        assert_eq!(LayoutConfig::for_scope(&MapScope::National).cluster.members.len(), 9);
        let world = LayoutConfig::for_scope(&MapScope::World);
        assert!(world.cluster.members.is_empty());
        assert!(world.adjustments.is_empty());
        assert_eq!(world.font_size, 13.0);
    }
}
