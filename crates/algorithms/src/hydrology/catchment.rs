//! Station-relative partitioning of a flow direction map
//!
//! Both operations attach station ids to cells through the flow network:
//! [`ldd_cluster`] looks downstream from every cell, [`catchment`] spreads
//! ids upstream from every pit.

use serde::{Deserialize, Serialize};

use flowgrid_core::raster::Raster;
use flowgrid_core::{Cell, Result};

use super::ldd::{traverse_ldd, traverse_ldd_upstream, FlowCode, Ldd};

/// Nodata value of id rasters that had none
pub const NODATA_ID: i32 = -9999;

/// Which station id wins when stations are nested along a flow path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchmentMode {
    /// The most downstream station claims its whole upstream area
    #[default]
    Outermost,
    /// Every station claims the area up to the next station upstream
    Nested,
}

/// Parameters for catchment delineation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatchmentParams {
    pub mode: CatchmentMode,
}

fn is_station(stations: &Raster<i32>, cell: Cell) -> bool {
    !stations.is_nodata_cell(cell) && stations[cell] != 0
}

fn id_raster(ids: &Raster<i32>) -> Raster<i32> {
    ids.like(0).with_nodata(Some(ids.nodata().unwrap_or(NODATA_ID)))
}

/// Label every cell with the id of the first station on its flow path.
///
/// Station cells (nonzero ids) keep their own id. Cells without a flow
/// direction are nodata; cells whose path reaches a pit without meeting a
/// station are 0.
pub fn ldd_cluster(ldd: &Raster<u8>, ids: &Raster<i32>) -> Result<Raster<i32>> {
    ldd.ensure_same_shape(ids)?;

    let view = Ldd::new(ldd);
    let mut result = id_raster(ids);

    for cell in ldd.cells() {
        if is_station(ids, cell) {
            result[cell] = ids[cell];
            continue;
        }

        if view.is_nodata(cell) {
            result.mark_as_nodata(cell);
            continue;
        }

        traverse_ldd(cell, &view, |_, dest| {
            if is_station(ids, dest) {
                result[cell] = ids[dest];
                return false;
            }
            true
        })?;
    }

    Ok(result)
}

/// Delineate station catchments, see [`catchment_with_progress`]
pub fn catchment(
    ldd: &Raster<u8>,
    stations: &Raster<i32>,
    params: CatchmentParams,
) -> Result<Raster<i32>> {
    catchment_with_progress(ldd, stations, params, |_| {})
}

/// Delineate station catchments.
///
/// Starting at every pit, ids are spread upstream: once a path upstream of
/// a pit has met a station, every cell further upstream gets that station's
/// id. With [`CatchmentMode::Nested`] a station met further upstream takes
/// over from there on. Cells not upstream of any station stay 0, cells
/// without a flow direction are nodata.
///
/// `progress` receives the fraction of cells processed so far.
pub fn catchment_with_progress<P>(
    ldd: &Raster<u8>,
    stations: &Raster<i32>,
    params: CatchmentParams,
    mut progress: P,
) -> Result<Raster<i32>>
where
    P: FnMut(f32),
{
    ldd.ensure_same_shape(stations)?;

    let view = Ldd::new(ldd);
    let mut result = id_raster(stations);
    let total = ldd.len() as f32;

    for (processed, cell) in ldd.cells().enumerate() {
        progress((processed + 1) as f32 / total);

        match view.code(cell) {
            Ok(FlowCode::NoData) => {
                result.mark_as_nodata(cell);
                continue;
            }
            Ok(FlowCode::Pit) => {}
            _ => continue,
        }

        let pit_id = is_station(stations, cell).then(|| stations[cell]);
        if let Some(id) = pit_id {
            result[cell] = id;
        }

        traverse_ldd_upstream(cell, &view, pit_id, |upstream, carried| {
            let carried = match carried {
                Some(id) if params.mode == CatchmentMode::Outermost || !is_station(stations, upstream) => {
                    Some(id)
                }
                _ if is_station(stations, upstream) => Some(stations[upstream]),
                other => other,
            };
            if let Some(id) = carried {
                result[upstream] = id;
            }
            carried
        });
    }

    Ok(result)
}
