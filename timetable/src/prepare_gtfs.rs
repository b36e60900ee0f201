//! Import stage: builds a [`Container`] from a GTFS feed.
//!
//! Agencies become operators, route types become physical and commercial
//! modes, every GTFS route becomes a line with one route, stations become
//! stop areas and trips sharing the same stop sequence become one journey
//! pattern.

use std::collections::HashMap;
use std::path::Path;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use gtfs_structures::{
    Availability, BikesAllowedType, Exception, LocationType, PickupDropOffType, RawStopTime,
    RawTrip, RouteType,
};
use indicatif::{ProgressFinish, ProgressIterator, ProgressStyle};
use ustr::{ustr, Ustr};

use crate::error::{Result, TimetableError};
use crate::index::*;
use crate::table::ColumnTable;
use crate::tables::*;
use crate::Container;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// First day of the active-day masks. Defaults to the earliest service
    /// date of the feed.
    pub calendar_start: Option<NaiveDate>,
    /// Days covered by the active-day masks, at most 32.
    pub n_days: u32,
    /// UTC offset of the feed's timezone in seconds.
    pub utc_offset: i32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            calendar_start: None,
            n_days: Calendar::BITS,
            utc_offset: 0,
        }
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {human_pos:>7}/{human_len:7} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Numeric GTFS code and display name of a route type.
fn route_type_code(route_type: &RouteType) -> (i16, &'static str) {
    match route_type {
        RouteType::Tramway => (0, "Tramway"),
        RouteType::Subway => (1, "Subway"),
        RouteType::Rail => (2, "Rail"),
        RouteType::Bus => (3, "Bus"),
        RouteType::Ferry => (4, "Ferry"),
        RouteType::CableCar => (5, "Cable car"),
        RouteType::Gondola => (6, "Gondola"),
        RouteType::Funicular => (7, "Funicular"),
        RouteType::Coach => (200, "Coach"),
        RouteType::Air => (1100, "Air"),
        RouteType::Taxi => (1500, "Taxi"),
        RouteType::Other(code) => (*code, "Other"),
    }
}

fn weekday_flag(calendar: &gtfs_structures::Calendar, weekday: Weekday) -> bool {
    match weekday {
        Weekday::Mon => calendar.monday,
        Weekday::Tue => calendar.tuesday,
        Weekday::Wed => calendar.wednesday,
        Weekday::Thu => calendar.thursday,
        Weekday::Fri => calendar.friday,
        Weekday::Sat => calendar.saturday,
        Weekday::Sun => calendar.sunday,
    }
}

/// Journey patterns are keyed by everything their points store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PatternKey {
    line: LineIdx,
    stops: Vec<StopIdx>,
    attributes: Vec<u8>,
    headsign: Ustr,
}

/// A trip resolved against the stop table, times in seconds since midnight.
struct ResolvedTrip<'a> {
    trip: &'a RawTrip,
    arrivals: Vec<u32>,
    departures: Vec<u32>,
}

pub fn import_gtfs(gtfs_folder_path: &Path, options: &ImportOptions) -> Result<Container> {
    log::info!("Loading GTFS data from {:?}", gtfs_folder_path);
    if !gtfs_folder_path.exists() {
        return Err(TimetableError::NotFound(gtfs_folder_path.to_path_buf()));
    }
    // Vehicle journeys store their UTC offset in 15 minute units.
    let time_offset = i8::try_from(options.utc_offset / 900).map_err(|_| {
        TimetableError::InvalidReference(format!(
            "UTC offset of {}s is out of range",
            options.utc_offset
        ))
    })?;
    let gtfs = gtfs_structures::RawGtfs::from_path(gtfs_folder_path)?;
    let agencies = gtfs.agencies?;
    let stops = gtfs.stops?;
    let routes = gtfs.routes?;
    let trips = gtfs.trips?;
    let stop_times = gtfs.stop_times?;
    let calendars = gtfs.calendar.transpose()?.unwrap_or_default();
    let calendar_dates = gtfs.calendar_dates.transpose()?.unwrap_or_default();
    let transfers = gtfs.transfers.transpose()?.unwrap_or_default();

    let mut container = Container::new();
    let style = progress_style();

    log::info!("Preparing operators.");
    let operator_rows: Vec<NewOperator<'_>> = agencies
        .iter()
        .map(|agency| NewOperator {
            id: agency.id.as_deref().unwrap_or(""),
            url: &agency.url,
            name: &agency.name,
        })
        .collect();
    container.add_operators(&operator_rows)?;
    let operator_by_id: HashMap<Ustr, OperatorIdx> = agencies
        .iter()
        .enumerate()
        .filter_map(|(i, agency)| Some((ustr(agency.id.as_deref()?), i as OperatorIdx)))
        .collect();
    let feed_timezone = agencies
        .first()
        .map(|agency| agency.timezone.as_str())
        .unwrap_or("UTC");

    log::info!("Preparing modes.");
    let mut mode_by_code: HashMap<i16, u8> = HashMap::new();
    let mut mode_codes: Vec<(String, &'static str)> = Vec::new();
    for route in &routes {
        let (code, name) = route_type_code(&route.route_type);
        if !mode_by_code.contains_key(&code) {
            mode_by_code.insert(code, mode_codes.len() as u8);
            mode_codes.push((code.to_string(), name));
        }
    }
    let physical_rows: Vec<NewPhysicalMode<'_>> = mode_codes
        .iter()
        .map(|(id, name)| NewPhysicalMode { id, name })
        .collect();
    container.add_physical_modes(&physical_rows)?;
    let commercial_rows: Vec<NewCommercialMode<'_>> = mode_codes
        .iter()
        .map(|(id, name)| NewCommercialMode { id, name })
        .collect();
    container.add_commercial_modes(&commercial_rows)?;

    log::info!("Preparing lines.");
    let colors: Vec<(String, String)> = routes
        .iter()
        .map(|route| {
            let hex = |c: &gtfs_structures::Route, text: bool| {
                let color = if text { c.text_color } else { c.color };
                format!("{:02X}{:02X}{:02X}", color.r, color.g, color.b)
            };
            (hex(route, false), hex(route, true))
        })
        .collect();
    let mut line_rows = Vec::with_capacity(routes.len());
    for (route, (color, text_color)) in routes.iter().zip(&colors) {
        let operator = match route.agency_id.as_deref() {
            Some(agency_id) => operator_by_id.get(&ustr(agency_id)).copied(),
            None if agencies.len() == 1 => Some(0),
            None => None,
        }
        .ok_or_else(|| {
            TimetableError::InvalidReference(format!(
                "route {} refers to an unknown agency",
                route.id
            ))
        })?;
        let (code, _) = route_type_code(&route.route_type);
        line_rows.push(NewLine {
            id: &route.id,
            code: route.short_name.as_deref().unwrap_or(""),
            name: route.long_name.as_deref().unwrap_or(""),
            color,
            text_color,
            operator,
            physical_mode: mode_by_code.get(&code).copied().unwrap_or_default(),
        });
    }
    container.add_lines(&line_rows)?;
    let line_indices: Vec<LineIdx> = (0..line_rows.len()).map(|i| i as LineIdx).collect();
    container.add_routes(&line_indices)?;
    let line_by_route_id: HashMap<Ustr, LineIdx> = routes
        .iter()
        .zip(&line_indices)
        .map(|(route, &line)| (ustr(&route.id), line))
        .collect();
    let mode_by_line: Vec<u8> = line_rows.iter().map(|line| line.physical_mode).collect();

    log::info!("Preparing stops.");
    let stations: Vec<&gtfs_structures::Stop> = stops
        .iter()
        .filter(|stop| matches!(stop.location_type, LocationType::StopArea))
        .collect();
    let stop_points: Vec<&gtfs_structures::Stop> = stops
        .iter()
        .filter(|stop| matches!(stop.location_type, LocationType::StopPoint))
        .collect();
    let coord_of = |stop: &gtfs_structures::Stop| {
        LatLon::new(
            stop.latitude.unwrap_or_default() as f32,
            stop.longitude.unwrap_or_default() as f32,
        )
    };

    let mut area_rows: Vec<NewStopArea<'_>> = Vec::new();
    let mut area_by_station_id: HashMap<Ustr, StopIdx> = HashMap::new();
    for station in &stations {
        area_by_station_id.insert(ustr(&station.id), area_rows.len() as StopIdx);
        area_rows.push(NewStopArea {
            id: &station.id,
            name: station.name.as_deref().unwrap_or(""),
            coord: coord_of(*station),
            timezone: station.timezone.as_deref().unwrap_or(feed_timezone),
        });
    }
    // Stop points without a known parent station form their own area.
    let mut area_of_stop = Vec::with_capacity(stop_points.len());
    for stop in &stop_points {
        let parent = stop
            .parent_station
            .as_deref()
            .and_then(|parent| area_by_station_id.get(&ustr(parent)).copied());
        let area = match parent {
            Some(area) => area,
            None => {
                let area = StopIdx::from_usize(area_rows.len()).ok_or(
                    TimetableError::IndexOverflow {
                        table: StopAreas::NAME,
                        max: StopIdx::MAX as usize,
                        requested: area_rows.len() + 1,
                    },
                )?;
                area_rows.push(NewStopArea {
                    id: &stop.id,
                    name: stop.name.as_deref().unwrap_or(""),
                    coord: coord_of(*stop),
                    timezone: stop.timezone.as_deref().unwrap_or(feed_timezone),
                });
                area
            }
        };
        area_of_stop.push(area);
    }
    container.add_stop_areas(&area_rows)?;

    let stop_by_id: HashMap<Ustr, StopIdx> = stop_points
        .iter()
        .enumerate()
        .map(|(i, stop)| (ustr(&stop.id), i as StopIdx))
        .collect();

    log::info!("Preparing transfers.");
    let mut transfers_by_stop: Vec<Vec<NewTransfer>> = vec![Vec::new(); stop_points.len()];
    let mut wait_times: Vec<RTime> = vec![0; stop_points.len()];
    for transfer in &transfers {
        let (Some(&from), Some(&to)) = (
            stop_by_id.get(&ustr(&transfer.from_stop_id)),
            stop_by_id.get(&ustr(&transfer.to_stop_id)),
        ) else {
            continue;
        };
        let duration = rtime_from_seconds(transfer.min_transfer_time.unwrap_or(0));
        if from == to {
            wait_times[from as usize] = duration;
        } else {
            transfers_by_stop[from as usize].push(NewTransfer {
                target_stop: to,
                duration,
            });
        }
    }
    let mut stop_rows = Vec::with_capacity(stop_points.len());
    let mut transfers_offset: usize = 0;
    for (i, stop) in stop_points.iter().enumerate() {
        stop_rows.push(NewStopPoint {
            id: &stop.id,
            name: stop.name.as_deref().unwrap_or(""),
            platform_code: stop.platform_code.as_deref().unwrap_or(""),
            coord: coord_of(*stop),
            wait_time: wait_times[i],
            attributes: 0,
            stop_area: area_of_stop[i],
            transfers_offset: TransferIdx::from_usize(transfers_offset).ok_or(
                TimetableError::IndexOverflow {
                    table: Transfers::NAME,
                    max: TransferIdx::MAX as usize,
                    requested: transfers_offset,
                },
            )?,
        });
        transfers_offset += transfers_by_stop[i].len();
    }
    container.add_stop_points(&stop_rows)?;
    for outgoing in &transfers_by_stop {
        container.add_transfers(outgoing)?;
    }

    log::info!("Preparing calendars.");
    let calendar_start = match options.calendar_start {
        Some(start) => start,
        None => calendars
            .iter()
            .map(|calendar| calendar.start_date)
            .chain(calendar_dates.iter().map(|date| date.date))
            .min()
            .ok_or_else(|| {
                TimetableError::InvalidReference(
                    "the feed has no calendar and no calendar dates".to_string(),
                )
            })?,
    };
    let n_days = options.n_days.min(Calendar::BITS);
    let day_of = |date: NaiveDate| {
        let day = (date - calendar_start).num_days();
        (0..n_days as i64).contains(&day).then_some(day as u32)
    };
    let mut active_by_service: HashMap<Ustr, Calendar> = HashMap::new();
    for calendar in &calendars {
        let mut mask: Calendar = 0;
        for day in 0..n_days {
            let Some(date) = calendar_start.checked_add_days(Days::new(day as u64)) else {
                break;
            };
            if date >= calendar.start_date
                && date <= calendar.end_date
                && weekday_flag(calendar, date.weekday())
            {
                mask |= 1 << day;
            }
        }
        active_by_service.insert(ustr(&calendar.id), mask);
    }
    for calendar_date in &calendar_dates {
        let Some(day) = day_of(calendar_date.date) else {
            continue;
        };
        let mask = active_by_service
            .entry(ustr(&calendar_date.service_id))
            .or_default();
        match calendar_date.exception_type {
            Exception::Added => *mask |= 1 << day,
            Exception::Deleted => *mask &= !(1 << day),
        }
    }

    let stop_times_by_trip = group_stop_times(&stop_times, &style);
    let resolved = resolve_trips(&trips, &stop_times_by_trip, &stop_by_id, &style);

    log::info!("Grouping {} trips into journey patterns.", resolved.len());
    let mut pattern_order: Vec<PatternKey> = Vec::new();
    let mut trips_by_pattern: HashMap<PatternKey, Vec<ResolvedTrip<'_>>> = HashMap::new();
    let mut skipped = 0usize;
    for (trip, stops_of_trip, attributes, times) in resolved {
        let Some(&line) = line_by_route_id.get(&ustr(&trip.route_id)) else {
            skipped += 1;
            continue;
        };
        let key = PatternKey {
            line,
            stops: stops_of_trip,
            attributes,
            headsign: ustr(trip.trip_headsign.as_deref().unwrap_or("")),
        };
        let (arrivals, departures) = times;
        trips_by_pattern
            .entry(key.clone())
            .or_insert_with(|| {
                pattern_order.push(key);
                Vec::new()
            })
            .push(ResolvedTrip {
                trip,
                arrivals,
                departures,
            });
    }
    if skipped > 0 {
        log::warn!("Skipped {skipped} trips of unknown routes");
    }

    for key in pattern_order
        .iter()
        .progress_with_style(style.clone())
        .with_message("Build journey patterns.")
        .with_finish(ProgressFinish::AndLeave)
    {
        let Some(mut pattern_trips) = trips_by_pattern.remove(key) else {
            continue;
        };
        pattern_trips.sort_by_key(|resolved| resolved.departures[0]);
        let n_stops = u16::try_from(key.stops.len()).map_err(|_| {
            TimetableError::IndexOverflow {
                table: JourneyPatterns::NAME,
                max: u16::MAX as usize,
                requested: key.stops.len(),
            }
        })?;
        let point_rows: Vec<NewJourneyPatternPoint<'_>> = key
            .stops
            .iter()
            .zip(&key.attributes)
            .map(|(&stop_point, &attributes)| NewJourneyPatternPoint {
                stop_point,
                headsign: key.headsign.as_str(),
                attributes,
            })
            .collect();

        // A pattern counts its vehicle journeys in 16 bits; larger groups
        // are split into several patterns over the same points.
        for chunk in pattern_trips.chunks(u16::MAX as usize) {
            let point_offset = container.add_journey_pattern_points(&point_rows)?;
            let mut pattern_attributes = 0;
            let mut vj_rows = Vec::with_capacity(chunk.len());
            for resolved in chunk {
                let base = resolved.arrivals[0];
                let stop_time_rows: Vec<NewStopTime> = resolved
                    .arrivals
                    .iter()
                    .zip(&resolved.departures)
                    .map(|(&arrival, &departure)| NewStopTime {
                        arrival: rtime_from_seconds(arrival.saturating_sub(base)),
                        departure: rtime_from_seconds(departure.saturating_sub(base)),
                    })
                    .collect();
                let stop_times_offset = container.add_stop_times(&stop_time_rows)?;
                let attributes = vehicle_journey_attributes(resolved.trip);
                pattern_attributes |= attributes;
                vj_rows.push(NewVehicleJourney {
                    id: &resolved.trip.id,
                    stop_times_offset,
                    begin_time: rtime_from_seconds(base),
                    attributes,
                    active: active_by_service
                        .get(&ustr(&resolved.trip.service_id))
                        .copied()
                        .unwrap_or(0),
                    time_offset,
                    transfers_forward_offset: 0,
                    n_transfers_forward: 0,
                    transfers_backward_offset: 0,
                    n_transfers_backward: 0,
                });
            }
            let vehicle_journey_offset = container.add_vehicle_journeys(&vj_rows)?;
            container.add_journey_patterns(&[NewJourneyPattern {
                point_offset,
                n_stops,
                vehicle_journey_offset,
                n_vehicle_journeys: chunk.len() as u16,
                attributes: pattern_attributes,
                route: key.line,
                commercial_mode: mode_by_line[key.line as usize],
            }])?;
        }
    }

    let calendar_start_time = calendar_start
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp())
        .and_then(|seconds| u64::try_from(seconds).ok())
        .unwrap_or(0);
    container.set_calendar(calendar_start_time, n_days)?;
    container.set_timezone(feed_timezone, options.utc_offset)?;

    log::info!("Indexing journey patterns at stops.");
    container.build_journey_patterns_at_stop()?;

    for (name, size) in container.table_sizes() {
        log::info!("{name}: {size}");
    }
    Ok(container)
}

fn vehicle_journey_attributes(trip: &RawTrip) -> u16 {
    let mut attributes = vj_attributes::NONE;
    if matches!(trip.wheelchair_accessible, Availability::Available) {
        attributes |= vj_attributes::WHEELCHAIR_ACCESSIBLE;
    }
    if matches!(trip.bikes_allowed, BikesAllowedType::AtLeastOneBike) {
        attributes |= vj_attributes::BIKE_ACCEPTED;
    }
    attributes
}

fn group_stop_times<'a>(
    stop_times: &'a [RawStopTime],
    style: &ProgressStyle,
) -> HashMap<Ustr, Vec<&'a RawStopTime>> {
    let mut stop_times_by_trip: HashMap<Ustr, Vec<&RawStopTime>> = HashMap::new();
    for stop_time in stop_times
        .iter()
        .progress_with_style(style.clone())
        .with_message("Find stop times for each trip.")
        .with_finish(ProgressFinish::AndLeave)
    {
        stop_times_by_trip
            .entry(ustr(&stop_time.trip_id))
            .or_default()
            .push(stop_time);
    }
    for trip_stop_times in stop_times_by_trip.values_mut() {
        trip_stop_times.sort_by_key(|stop_time| stop_time.stop_sequence);
    }
    stop_times_by_trip
}

type Resolved<'a> = (&'a RawTrip, Vec<StopIdx>, Vec<u8>, (Vec<u32>, Vec<u32>));

/// Resolves each trip's stops, boarding rules and times. Trips with fewer
/// than two stops, unknown stops or missing times are dropped.
fn resolve_trips<'a>(
    trips: &'a [RawTrip],
    stop_times_by_trip: &HashMap<Ustr, Vec<&RawStopTime>>,
    stop_by_id: &HashMap<Ustr, StopIdx>,
    style: &ProgressStyle,
) -> Vec<Resolved<'a>> {
    let mut resolved = Vec::with_capacity(trips.len());
    let mut dropped = 0usize;
    for trip in trips
        .iter()
        .progress_with_style(style.clone())
        .with_message("Resolve trips.")
        .with_finish(ProgressFinish::AndLeave)
    {
        match resolve_trip(trip, stop_times_by_trip, stop_by_id) {
            Some(item) => resolved.push(item),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        log::warn!("Dropped {dropped} trips with unusable stop times");
    }
    resolved
}

fn resolve_trip<'a>(
    trip: &'a RawTrip,
    stop_times_by_trip: &HashMap<Ustr, Vec<&RawStopTime>>,
    stop_by_id: &HashMap<Ustr, StopIdx>,
) -> Option<Resolved<'a>> {
    let trip_stop_times = stop_times_by_trip.get(&ustr(&trip.id))?;
    if trip_stop_times.len() < 2 {
        return None;
    }
    let last = trip_stop_times.len() - 1;
    let mut stops = Vec::with_capacity(trip_stop_times.len());
    let mut attributes = Vec::with_capacity(trip_stop_times.len());
    let mut arrivals = Vec::with_capacity(trip_stop_times.len());
    let mut departures = Vec::with_capacity(trip_stop_times.len());
    for (i, stop_time) in trip_stop_times.iter().enumerate() {
        stops.push(*stop_by_id.get(&ustr(&stop_time.stop_id))?);
        let arrival = stop_time.arrival_time.or(stop_time.departure_time)?;
        let departure = stop_time.departure_time.unwrap_or(arrival);
        arrivals.push(arrival);
        departures.push(departure);

        let mut point = 0;
        if i != last && !matches!(stop_time.pickup_type, PickupDropOffType::NotAvailable) {
            point |= point_attributes::BOARDING;
        }
        if i != 0 && !matches!(stop_time.drop_off_type, PickupDropOffType::NotAvailable) {
            point |= point_attributes::ALIGHTING;
        }
        attributes.push(point);
    }
    Some((trip, stops, attributes, (arrivals, departures)))
}
