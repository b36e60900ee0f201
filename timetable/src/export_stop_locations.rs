use std::{io::Write, path::Path};

use crate::error::{Result, TimetableError};
use crate::table::ColumnTable;
use crate::Container;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StopLocations {
    pub stops: Vec<StopInfo>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StopInfo {
    pub id: String,
    pub name: String,
    pub latitude: f32,
    pub longitude: f32,
}

pub fn stop_locations(container: &Container) -> StopLocations {
    let pool = container.pool();
    let stop_points = container.stop_points();
    let stops = (0..stop_points.len())
        .filter_map(|stop| {
            let stop = stop as u16;
            let coord = stop_points.coord(stop)?;
            Some(StopInfo {
                id: stop_points.id(pool, stop)?.to_string(),
                name: stop_points.name(pool, stop).unwrap_or_default().to_string(),
                latitude: coord.lat,
                longitude: coord.lon,
            })
        })
        .collect();
    StopLocations { stops }
}

pub fn export_stop_locations(container: &Container, output_path: &Path) -> Result<()> {
    let result = stop_locations(container);
    log::info!(
        "Writing {} stop locations to {:?}",
        result.stops.len(),
        output_path
    );
    let json = serde_json::to_string_pretty(&result)
        .map_err(|e| TimetableError::io(output_path, e.into()))?;
    let mut file =
        std::fs::File::create(output_path).map_err(|e| TimetableError::io(output_path, e))?;
    file.write_all(json.as_bytes())
        .map_err(|e| TimetableError::io(output_path, e))?;
    Ok(())
}
