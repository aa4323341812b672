//! Indexed linear model compiled from a connectivity table.

use super::table::{ConnectivityTable, GeoCoord, GridCoord, GridMask, SINK_COORD};
use crate::errors::ConnectivityError;
use std::collections::HashMap;
use std::path::Path;

/// Dispersal record for one origin patch.
///
/// `destinations`, `counts` and `cumulative` are parallel. The cumulative
/// sequence is non-decreasing and ends at exactly 1.0, unless the origin
/// never delivered anything, in which case it is all zeros and the record
/// is never sampled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectivityRecord {
    destinations: Vec<usize>,
    counts: Vec<u64>,
    frac_return: f64,
    cumulative: Vec<f64>,
}

impl ConnectivityRecord {
    /// Compile a record from linear destination indices and their counts.
    ///
    /// `launched == 0` and any non-finite fraction both yield a zero
    /// `frac_return`; fractions above one are clamped.
    pub fn new(destinations: Vec<usize>, counts: Vec<u64>, launched: u64) -> Self {
        debug_assert_eq!(destinations.len(), counts.len());

        let total: u64 = counts.iter().sum();
        let frac_return = if launched == 0 {
            0.0
        } else {
            let frac = total as f64 / launched as f64;
            if frac.is_finite() {
                frac.clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        let mut cumulative = Vec::with_capacity(counts.len());
        if total > 0 {
            let mut running = 0u64;
            for &count in &counts {
                running += count;
                cumulative.push(running as f64 / total as f64);
            }
            if let Some(last) = cumulative.last_mut() {
                *last = 1.0;
            }
        } else {
            cumulative.resize(counts.len(), 0.0);
        }

        Self {
            destinations,
            counts,
            frac_return,
            cumulative,
        }
    }

    pub fn destinations(&self) -> &[usize] {
        &self.destinations
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Fraction of launched propagules that reached any patch.
    pub fn frac_return(&self) -> f64 {
        self.frac_return
    }

    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// True when the origin delivered no propagules anywhere.
    pub fn is_degenerate(&self) -> bool {
        !matches!(self.cumulative.last(), Some(&c) if c > 0.0)
    }

    /// Map a uniform draw `u` in `[0, 1)` to a destination.
    ///
    /// Picks the first destination whose cumulative value is at least `u`.
    /// Zero-weight destinations are stepped over, so a draw landing on their
    /// (repeated) cumulative value goes to the next weighted one. Returns
    /// `None` for degenerate records.
    #[inline]
    pub fn sample(&self, u: f64) -> Option<usize> {
        if self.is_degenerate() {
            return None;
        }
        let last = self.destinations.len() - 1;
        let mut k = self.cumulative.partition_point(|&c| c < u).min(last);
        while k < last && self.counts[k] == 0 {
            k += 1;
        }
        Some(self.destinations[k])
    }
}

/// Immutable, linearly indexed habitat with per-origin dispersal records.
///
/// Patches `0..patch_count()` are the origins of the connectivity table in
/// input order; index `patch_count()` is the sink.
#[derive(Debug, Clone)]
pub struct LinearModel {
    records: Vec<ConnectivityRecord>,
    coords: Vec<GridCoord>,
    geo: Vec<GeoCoord>,
    index: HashMap<GridCoord, usize>,
}

impl LinearModel {
    /// Compile `table` into a linear model, locating each origin in `mask`.
    pub fn build(table: &ConnectivityTable, mask: &GridMask) -> Result<Self, ConnectivityError> {
        if table.is_empty() {
            return Err(ConnectivityError::EmptyTable);
        }

        let n = table.len();
        let mut index = HashMap::with_capacity(n + 1);
        let mut coords = Vec::with_capacity(n + 1);
        let mut geo = Vec::with_capacity(n);

        for origin in &table.origins {
            let coord = origin.origin();
            if coord == SINK_COORD || index.insert(coord, coords.len()).is_some() {
                return Err(ConnectivityError::DuplicateOrigin {
                    nx: coord.nx,
                    ny: coord.ny,
                });
            }
            let position = mask
                .position(coord)
                .ok_or(ConnectivityError::MissingPosition {
                    nx: coord.nx,
                    ny: coord.ny,
                })?;
            coords.push(coord);
            geo.push(position);
        }
        index.insert(SINK_COORD, n);
        coords.push(SINK_COORD);

        let mut records = Vec::with_capacity(n + 1);
        for origin in &table.origins {
            let len = origin.to_count.len();
            if origin.to_nx.len() != len || origin.to_ny.len() != len {
                return Err(ConnectivityError::LengthMismatch {
                    nx: origin.nx,
                    ny: origin.ny,
                    destinations: origin.to_nx.len().max(origin.to_ny.len()),
                    counts: len,
                });
            }

            let destinations = origin
                .to_nx
                .iter()
                .zip(&origin.to_ny)
                .map(|(&to_nx, &to_ny)| {
                    index.get(&GridCoord::new(to_nx, to_ny)).copied().ok_or(
                        ConnectivityError::UnknownDestination {
                            nx: origin.nx,
                            ny: origin.ny,
                            to_nx,
                            to_ny,
                        },
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;

            records.push(ConnectivityRecord::new(
                destinations,
                origin.to_count.clone(),
                origin.launched,
            ));
        }
        records.push(ConnectivityRecord::default());

        let degenerate = records[..n].iter().filter(|r| r.is_degenerate()).count();
        tracing::info!(patches = n, degenerate, "Built connectivity model");

        Ok(Self {
            records,
            coords,
            geo,
            index,
        })
    }

    /// Read both inputs from JSON and build the model.
    pub fn from_json_files(
        connectivity: impl AsRef<Path>,
        mask: impl AsRef<Path>,
    ) -> Result<Self, ConnectivityError> {
        let table = ConnectivityTable::from_json_file(connectivity)?;
        let mask = GridMask::from_json_file(mask)?;
        Self::build(&table, &mask)
    }

    /// Number of linear indices, sink included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of real (non-sink) patches.
    pub fn patch_count(&self) -> usize {
        self.records.len() - 1
    }

    /// Linear index of the sink.
    pub fn sink(&self) -> usize {
        self.patch_count()
    }

    pub fn index_of(&self, coord: GridCoord) -> Option<usize> {
        self.index.get(&coord).copied()
    }

    pub fn coord_of(&self, index: usize) -> Option<GridCoord> {
        self.coords.get(index).copied()
    }

    /// Geographic position of a real patch; `None` for the sink.
    pub fn geo_of(&self, index: usize) -> Option<GeoCoord> {
        self.geo.get(index).copied()
    }

    pub fn record(&self, index: usize) -> &ConnectivityRecord {
        &self.records[index]
    }

    pub fn records(&self) -> &[ConnectivityRecord] {
        &self.records
    }

    /// Destination of a propagule leaving `origin` with uniform draw `u`.
    #[inline]
    pub fn sample_destination(&self, origin: usize, u: f64) -> Option<usize> {
        self.records.get(origin).and_then(|r| r.sample(u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::table::OriginRecord;

    fn c(nx: i32, ny: i32) -> GridCoord {
        GridCoord::new(nx, ny)
    }

    fn build(origins: Vec<OriginRecord>) -> Result<LinearModel, ConnectivityError> {
        let coords: Vec<GridCoord> = origins.iter().map(|o| o.origin()).collect();
        LinearModel::build(&ConnectivityTable::new(origins), &GridMask::identity(&coords))
    }

    #[test]
    fn test_bijection_has_sink() {
        let model = build(vec![
            OriginRecord::new(c(0, 0), 10, &[(c(1, 0), 5)]),
            OriginRecord::new(c(1, 0), 10, &[(c(2, 0), 5)]),
            OriginRecord::new(c(2, 0), 10, &[(c(0, 0), 5)]),
        ])
        .unwrap();

        assert_eq!(model.len(), 4);
        assert_eq!(model.patch_count(), 3);
        assert_eq!(model.sink(), 3);
        assert_eq!(model.index_of(SINK_COORD), Some(3));
        for i in 0..model.len() {
            assert_eq!(model.index_of(model.coord_of(i).unwrap()), Some(i));
        }
        assert!(model.geo_of(model.sink()).is_none());
        assert_eq!(model.geo_of(2), Some(GeoCoord { lon: 2.0, lat: 0.0 }));
    }

    #[test]
    fn test_frac_return_and_cumulative() {
        let model = build(vec![
            OriginRecord::new(c(0, 0), 100, &[(c(0, 0), 30), (c(1, 1), 10)]),
            OriginRecord::new(c(1, 1), 0, &[]),
        ])
        .unwrap();

        let rec = model.record(0);
        assert!((rec.frac_return() - 0.4).abs() < 1e-12);
        assert_eq!(rec.destinations(), &[0, 1]);
        assert!((rec.cumulative()[0] - 0.75).abs() < 1e-12);
        assert_eq!(rec.cumulative()[1], 1.0);
    }

    #[test]
    fn test_zero_launch_guard() {
        let model = build(vec![OriginRecord::new(c(0, 0), 0, &[(c(0, 0), 0)])]).unwrap();
        let rec = model.record(0);
        assert_eq!(rec.frac_return(), 0.0);
        assert!(!rec.frac_return().is_nan());
        assert!(rec.is_degenerate());
        assert_eq!(rec.sample(0.5), None);
    }

    #[test]
    fn test_frac_return_clamped() {
        let rec = ConnectivityRecord::new(vec![0], vec![12], 10);
        assert_eq!(rec.frac_return(), 1.0);
    }

    #[test]
    fn test_sampling_skips_zero_weight() {
        let rec = ConnectivityRecord::new(vec![7, 8, 9], vec![0, 1, 0], 1);
        for u in [0.0, 0.3, 0.999_999] {
            assert_eq!(rec.sample(u), Some(8));
        }
    }

    #[test]
    fn test_sampling_tie_goes_to_lower_destination() {
        let rec = ConnectivityRecord::new(vec![10, 11], vec![1, 1], 2);
        assert_eq!(rec.sample(0.5), Some(10));
        assert_eq!(rec.sample(0.500_001), Some(11));

        // A tie on a zero-weight entry's cumulative value moves past it.
        let rec = ConnectivityRecord::new(vec![1, 2, 3], vec![1, 0, 1], 2);
        assert_eq!(rec.sample(0.5), Some(1));
        assert_eq!(rec.sample(0.75), Some(3));
    }

    #[test]
    fn test_sampling_clamps_round_off() {
        let rec = ConnectivityRecord::new(vec![4, 5], vec![1, 2], 3);
        assert_eq!(rec.sample(1.0), Some(5));
        assert_eq!(rec.sample(0.2), Some(4));
        assert_eq!(rec.sample(0.5), Some(5));
    }

    #[test]
    fn test_sink_destination_accepted() {
        let model = build(vec![OriginRecord::new(
            c(5, 5),
            4,
            &[(c(5, 5), 1), (SINK_COORD, 3)],
        )])
        .unwrap();
        assert_eq!(model.record(0).destinations(), &[0, 1]);
        assert_eq!(model.sample_destination(0, 0.9), Some(model.sink()));
        assert_eq!(model.sample_destination(model.sink(), 0.1), None);
    }

    #[test]
    fn test_unknown_destination_rejected() {
        let err = build(vec![OriginRecord::new(c(0, 0), 1, &[(c(9, 9), 1)])]).unwrap_err();
        assert!(matches!(
            err,
            ConnectivityError::UnknownDestination { to_nx: 9, to_ny: 9, .. }
        ));
    }

    #[test]
    fn test_duplicate_origin_rejected() {
        let err = build(vec![
            OriginRecord::new(c(0, 0), 1, &[]),
            OriginRecord::new(c(0, 0), 1, &[]),
        ])
        .unwrap_err();
        assert!(matches!(err, ConnectivityError::DuplicateOrigin { nx: 0, ny: 0 }));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut origin = OriginRecord::new(c(0, 0), 1, &[(c(0, 0), 1)]);
        origin.to_ny.push(3);
        let err = build(vec![origin]).unwrap_err();
        assert!(matches!(err, ConnectivityError::LengthMismatch { .. }));
    }

    #[test]
    fn test_missing_mask_position() {
        let table = ConnectivityTable::new(vec![OriginRecord::new(c(0, 0), 1, &[])]);
        let err = LinearModel::build(&table, &GridMask::default()).unwrap_err();
        assert!(matches!(err, ConnectivityError::MissingPosition { .. }));
    }

    #[test]
    fn test_empty_table_rejected() {
        let err = LinearModel::build(&ConnectivityTable::default(), &GridMask::default());
        assert!(matches!(err, Err(ConnectivityError::EmptyTable)));
    }
}
