pub mod layout;
pub mod links;
pub mod query;
pub mod region;
pub mod suggestion;

pub use layout::{
    Adjustment, ClickHandler, ClickQueries, GeoPoint, LabelAssignment, LabelOptions,
    LabelPlacement, LabelScene, LayoutConfig, MapGeometry, ScreenBounds, ScreenPoint,
    SmallRegionCluster, TextExtent,
};
pub use region::{GeoBounds, MapScope, Region, RegionCatalog, Topology};
pub use suggestion::{RawEntry, Sanitizer, SuggestionResult};
