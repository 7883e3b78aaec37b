use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
}

/// Geographic extent `[min_lon, min_lat, max_lon, max_lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds(pub [f64; 4]);

impl GeoBounds {
    pub fn min_lon(&self) -> f64 {
        self.0[0]
    }

    pub fn min_lat(&self) -> f64 {
        self.0[1]
    }

    pub fn max_lon(&self) -> f64 {
        self.0[2]
    }

    pub fn max_lat(&self) -> f64 {
        self.0[3]
    }

    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        GeoBounds([
            self.min_lon().min(other.min_lon()),
            self.min_lat().min(other.min_lat()),
            self.max_lon().max(other.max_lon()),
            self.max_lat().max(other.max_lat()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapScope {
    National,
    World,
    Other(String),
}

impl MapScope {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "national" | "usa" => Self::National,
            "world" => Self::World,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::National => "national",
            Self::World => "world",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for MapScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub objects: TopologyObjects,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyObjects {
    #[serde(default, alias = "usa")]
    pub national: Option<GeometryCollection>,
    #[serde(default)]
    pub world: Option<GeometryCollection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeometryCollection {
    #[serde(default)]
    pub geometries: Vec<TopologyGeometry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopologyGeometry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: GeometryProperties,
    #[serde(default)]
    pub bbox: Option<GeoBounds>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeometryProperties {
    #[serde(default)]
    pub name: Option<String>,
}

impl Topology {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn collection(&self, scope: &MapScope) -> Option<&GeometryCollection> {
        match scope {
            MapScope::National => self.objects.national.as_ref(),
            MapScope::World => self.objects.world.as_ref(),
            MapScope::Other(_) => None,
        }
    }

    /// Per-region geographic extents for one scope, in geometry order.
    pub fn bounds_for_scope(&self, scope: &MapScope) -> Vec<(String, GeoBounds)> {
        self.collection(scope)
            .map(|collection| {
                collection
                    .geometries
                    .iter()
                    .filter_map(|geo| Some((geo.id.clone()?, geo.bbox?)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Region sets for the known map scopes, derived once from the topology.
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    national: Vec<Region>,
    world: Vec<Region>,
}

impl RegionCatalog {
    pub fn from_topology(topology: &Topology) -> Self {
        Self {
            national: regions_from(topology.objects.national.as_ref()),
            world: regions_from(topology.objects.world.as_ref()),
        }
    }

    pub fn regions_for_scope(&self, scope: &MapScope) -> &[Region] {
        match scope {
            MapScope::National => &self.national,
            MapScope::World => &self.world,
            MapScope::Other(_) => &[],
        }
    }
}

fn regions_from(collection: Option<&GeometryCollection>) -> Vec<Region> {
    let Some(collection) = collection else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    collection
        .geometries
        .iter()
        .filter_map(|geo| {
            let id = geo.id.as_deref()?.trim();
            if id.is_empty() || !seen.insert(id.to_string()) {
                return None;
            }
            let name = geo
                .properties
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(id);
            Some(Region {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}
