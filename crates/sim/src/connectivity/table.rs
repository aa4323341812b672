//! Raw, grid-indexed inputs consumed by the linear model builder.
//!
//! Both inputs are produced by external tooling (particle-tracking output
//! and the circulation model's grid mask) and are read from JSON.

use crate::errors::ConnectivityError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Position of a cell in the circulation model grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub nx: i32,
    pub ny: i32,
}

impl GridCoord {
    pub const fn new(nx: i32, ny: i32) -> Self {
        Self { nx, ny }
    }
}

/// Grid coordinate reserved for the sink. No real grid cell can have it.
pub const SINK_COORD: GridCoord = GridCoord::new(-1, -1);

/// Geographic position of a patch, kept for reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lon: f64,
    pub lat: f64,
}

/// Dispersal statistics observed for one origin patch.
///
/// `to_nx`, `to_ny` and `to_count` are parallel lists: the `i`th destination
/// received `to_count[i]` of the `launched` propagules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginRecord {
    pub nx: i32,
    pub ny: i32,
    pub launched: u64,
    pub to_nx: Vec<i32>,
    pub to_ny: Vec<i32>,
    pub to_count: Vec<u64>,
}

impl OriginRecord {
    /// Build a record from `(destination, count)` pairs.
    pub fn new(origin: GridCoord, launched: u64, destinations: &[(GridCoord, u64)]) -> Self {
        Self {
            nx: origin.nx,
            ny: origin.ny,
            launched,
            to_nx: destinations.iter().map(|(c, _)| c.nx).collect(),
            to_ny: destinations.iter().map(|(c, _)| c.ny).collect(),
            to_count: destinations.iter().map(|(_, n)| *n).collect(),
        }
    }

    pub fn origin(&self) -> GridCoord {
        GridCoord::new(self.nx, self.ny)
    }
}

/// Sparse patch-to-patch connectivity keyed by grid coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityTable {
    pub origins: Vec<OriginRecord>,
}

impl ConnectivityTable {
    pub fn new(origins: Vec<OriginRecord>) -> Self {
        Self { origins }
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConnectivityError> {
        read_json(path.as_ref())
    }
}

/// One cell of the grid mask.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaskCell {
    pub nx: i32,
    pub ny: i32,
    pub lon: f64,
    pub lat: f64,
}

/// Lookup from grid coordinate to geographic position.
#[derive(Debug, Clone, Default)]
pub struct GridMask {
    positions: HashMap<GridCoord, GeoCoord>,
}

impl GridMask {
    pub fn from_cells(cells: impl IntoIterator<Item = MaskCell>) -> Self {
        let positions = cells
            .into_iter()
            .map(|c| {
                (
                    GridCoord::new(c.nx, c.ny),
                    GeoCoord {
                        lon: c.lon,
                        lat: c.lat,
                    },
                )
            })
            .collect();
        Self { positions }
    }

    /// A mask that places every coordinate at `(lon, lat) = (nx, ny)`.
    ///
    /// Handy for synthetic habitats that have no real geography.
    pub fn identity<'a>(coords: impl IntoIterator<Item = &'a GridCoord>) -> Self {
        Self::from_cells(coords.into_iter().map(|c| MaskCell {
            nx: c.nx,
            ny: c.ny,
            lon: c.nx as f64,
            lat: c.ny as f64,
        }))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConnectivityError> {
        let cells: Vec<MaskCell> = read_json(path.as_ref())?;
        Ok(Self::from_cells(cells))
    }

    pub fn position(&self, coord: GridCoord) -> Option<GeoCoord> {
        self.positions.get(&coord).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConnectivityError> {
    let file = File::open(path).map_err(|source| ConnectivityError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ConnectivityError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_origin_record_from_pairs() {
        let rec = OriginRecord::new(
            GridCoord::new(3, 4),
            10,
            &[(GridCoord::new(3, 4), 2), (GridCoord::new(5, 6), 7)],
        );
        assert_eq!(rec.origin(), GridCoord::new(3, 4));
        assert_eq!(rec.to_nx, vec![3, 5]);
        assert_eq!(rec.to_ny, vec![4, 6]);
        assert_eq!(rec.to_count, vec![2, 7]);
    }

    #[test]
    fn test_table_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"origins": [{{"nx": 1, "ny": 2, "launched": 5,
                "to_nx": [1], "to_ny": [2], "to_count": [3]}}]}}"#
        )
        .unwrap();

        let table = ConnectivityTable::from_json_file(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.origins[0].launched, 5);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ConnectivityTable::from_json_file("/nonexistent/metapop.json").unwrap_err();
        assert!(matches!(err, ConnectivityError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/metapop.json"));
    }

    #[test]
    fn test_mask_lookup() {
        let mask = GridMask::from_cells([MaskCell {
            nx: 7,
            ny: 8,
            lon: -70.5,
            lat: 41.25,
        }]);
        assert_eq!(
            mask.position(GridCoord::new(7, 8)),
            Some(GeoCoord {
                lon: -70.5,
                lat: 41.25
            })
        );
        assert_eq!(mask.position(GridCoord::new(8, 7)), None);
    }
}
