use std::ops::RangeInclusive;

use chrono::{NaiveDate, NaiveTime};
use nom::{
    character::complete::{char, digit1},
    combinator::opt,
    sequence::{preceded, tuple},
};
use tracing::debug;

use super::{
    fields::{number, parse_all, unsigned_decimal},
    nmea::Sentence,
    NavSentence,
};
use crate::{
    config::YearAnchor,
    coord::{dm_to_decimal, Axis, Hemisphere},
    Error, NFResult,
};

/// RMC - Recommended Minimum Specific GNSS Data.
///
/// ```text
///        0      1 2         3 4          5 6     7     8      9     10 11 12
/// $GPRMC,hhmmss,A,ddmm.mmmm,N,dddmm.mmmm,E,sss.s,ccc.c,ddmmyy,vvv.v,W, A, V*hh
/// ```
///
/// | idx | field                                   | empty allowed |
/// |-----|-----------------------------------------|---------------|
/// | 0   | UTC time of day, `hhmmss[.fff]`         | yes           |
/// | 1   | status, `A` valid / `V` void            | no            |
/// | 2,3 | latitude, N/S                           | yes           |
/// | 4,5 | longitude, E/W                          | yes           |
/// | 6   | speed over ground, knots                | yes           |
/// | 7   | course over ground, degrees true        | yes           |
/// | 8   | date, `ddmmyy`                          | no            |
/// | 9,10| magnetic variation, degrees E/W         | yes           |
/// | 11  | FAA mode indicator (NMEA 2.3)           | yes / missing |
/// | 12  | navigational status (NMEA 4.1), ignored | yes / missing |
#[derive(Debug, Clone, PartialEq)]
pub struct Rmc {
    pub time: Option<NaiveTime>,
    pub status: Status,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_knots: Option<f64>,
    pub course_deg: Option<f64>,
    pub date: NaiveDate,
    /// West is negative.
    pub magnetic_variation: Option<f64>,
    pub mode: Option<FaaMode>,
}

pub const FIELD_COUNT: RangeInclusive<usize> = 11..=13;

const TIME: usize = 0;
const STATUS: usize = 1;
const LAT: usize = 2;
const LON: usize = 4;
const SPEED: usize = 6;
const COURSE: usize = 7;
const DATE: usize = 8;
const MAG_VAR: usize = 9;
const MAG_VAR_DIR: usize = 10;
const MODE: usize = 11;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Valid,
    Void,
}

impl Status {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "A" => Some(Status::Valid),
            "V" => Some(Status::Void),
            _ => None,
        }
    }
}

/// Positioning system mode indicator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaaMode {
    Autonomous,
    Differential,
    Estimated,
    FloatRtk,
    Manual,
    NotValid,
    Precise,
    Rtk,
    Simulator,
}

impl FaaMode {
    pub fn parse(token: &str) -> Option<Self> {
        let mode = match token {
            "A" => FaaMode::Autonomous,
            "D" => FaaMode::Differential,
            "E" => FaaMode::Estimated,
            "F" => FaaMode::FloatRtk,
            "M" => FaaMode::Manual,
            "N" => FaaMode::NotValid,
            "P" => FaaMode::Precise,
            "R" => FaaMode::Rtk,
            "S" => FaaMode::Simulator,
            _ => return None,
        };
        Some(mode)
    }
}

impl NavSentence for Rmc {
    const FORMATTER: &'static str = "RMC";

    fn decode(sentence: &Sentence<'_>, year_anchor: YearAnchor) -> NFResult<Self> {
        let tag = sentence.tag;
        let fields = &sentence.fields;
        let err = |idx: usize| {
            debug!("{} field {} rejected: {:?}", tag, idx, fields.get(idx));
            Error::decode(tag, idx)
        };
        if !FIELD_COUNT.contains(&fields.len()) {
            debug!("{} has {} fields, expected {:?}", tag, fields.len(), FIELD_COUNT);
            return Err(Error::decode(tag, fields.len()));
        }

        let time = optional(fields[TIME], parse_time).ok_or_else(|| err(TIME))?;
        let status = Status::parse(fields[STATUS]).ok_or_else(|| err(STATUS))?;
        let latitude = coordinate(fields, LAT, Axis::Latitude).map_err(err)?;
        let longitude = coordinate(fields, LON, Axis::Longitude).map_err(err)?;
        let speed_knots = optional(fields[SPEED], |f| parse_all(unsigned_decimal, f))
            .ok_or_else(|| err(SPEED))?;
        let course_deg = optional(fields[COURSE], |f| parse_all(unsigned_decimal, f))
            .ok_or_else(|| err(COURSE))?;
        let date = parse_date(fields[DATE], year_anchor).ok_or_else(|| err(DATE))?;
        let magnetic_variation = magnetic_variation(fields).map_err(err)?;
        let mode = match fields.get(MODE) {
            Some(token) => optional(token, FaaMode::parse).ok_or_else(|| err(MODE))?,
            None => None,
        };

        Ok(Rmc {
            time,
            status,
            latitude,
            longitude,
            speed_knots,
            course_deg,
            date,
            magnetic_variation,
            mode,
        })
    }
}

/// Empty field -> `Some(None)`, parsed field -> `Some(Some(v))`, garbage -> `None`.
fn optional<T>(field: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<Option<T>> {
    if field.is_empty() {
        Some(None)
    } else {
        parse(field).map(Some)
    }
}

/// Value at `idx`, hemisphere at `idx + 1`. Errors carry the offending field index.
fn coordinate(fields: &[&str], idx: usize, axis: Axis) -> Result<Option<f64>, usize> {
    let value = fields[idx];
    if value.is_empty() {
        return Ok(None);
    }
    let hemisphere = Hemisphere::parse(fields[idx + 1])
        .filter(|h| h.axis() == axis)
        .ok_or(idx + 1)?;
    dm_to_decimal(value, hemisphere).map(Some).map_err(|_| idx)
}

fn magnetic_variation(fields: &[&str]) -> Result<Option<f64>, usize> {
    let value = fields[MAG_VAR];
    if value.is_empty() {
        return Ok(None);
    }
    let degrees = parse_all(unsigned_decimal, value).ok_or(MAG_VAR)?;
    let hemisphere = Hemisphere::parse(fields[MAG_VAR_DIR])
        .filter(|h| h.axis() == Axis::Longitude)
        .ok_or(MAG_VAR_DIR)?;
    Ok(Some(degrees * hemisphere.sign()))
}

/// `hhmmss` with an optional fraction of any length, kept to nanosecond precision. A leap
/// second (`ss` = 60) is folded into chrono's leap representation.
fn parse_time(field: &str) -> Option<NaiveTime> {
    let (hh, mm, ss, fraction) = parse_all(
        tuple((
            number(2),
            number(2),
            number(2),
            opt(preceded(char('.'), digit1)),
        )),
        field,
    )?;
    let nanos = match fraction {
        Some(digits) => {
            let digits = &digits[..digits.len().min(9)];
            digits.parse::<u32>().ok()? * 10u32.pow(9 - digits.len() as u32)
        }
        None => 0,
    };
    if ss == 60 {
        NaiveTime::from_hms_nano_opt(hh, mm, 59, 1_000_000_000 + nanos)
    } else {
        NaiveTime::from_hms_nano_opt(hh, mm, ss, nanos)
    }
}

/// `ddmmyy`, century from `year_anchor`.
fn parse_date(field: &str, year_anchor: YearAnchor) -> Option<NaiveDate> {
    let (dd, mm, yy) = parse_all(tuple((number(2), number(2), number(2))), field)?;
    NaiveDate::from_ymd_opt(year_anchor.resolve(yy as u8), mm, dd)
}
