/// Coordinate types and utilities.
///
/// NMEA encodes positions as fixed-width degrees followed by decimal minutes, `DDMM.MMMM` for
/// latitude and `DDDMM.MMMM` for longitude, with the sign carried by a separate hemisphere
/// letter.
use nom::sequence::pair;

use crate::{
    protocol::fields::{fixed_decimal, number, parse_all},
    Error, NFResult,
};

/// Decimal places kept on converted coordinates (~0.11 m).
pub const COORD_DECIMALS: i32 = 6;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Width of the whole-degree prefix.
    pub fn degree_width(self) -> usize {
        match self {
            Axis::Latitude => 2,
            Axis::Longitude => 3,
        }
    }

    /// Shortest encoded value: the degree prefix plus two whole-minute digits.
    pub fn min_width(self) -> usize {
        self.degree_width() + 2
    }

    fn max_degrees(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "N" => Some(Hemisphere::North),
            "S" => Some(Hemisphere::South),
            "E" => Some(Hemisphere::East),
            "W" => Some(Hemisphere::West),
            _ => None,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Hemisphere::North | Hemisphere::South => Axis::Latitude,
            Hemisphere::East | Hemisphere::West => Axis::Longitude,
        }
    }

    /// South and west are negative.
    pub fn sign(self) -> f64 {
        match self {
            Hemisphere::North | Hemisphere::East => 1.0,
            Hemisphere::South | Hemisphere::West => -1.0,
        }
    }
}

/// Convert a degrees+minutes value to signed decimal degrees, rounded to [`COORD_DECIMALS`].
///
/// `4807.038` N is 48 + 7.038 / 60 = 48.1173. The axis, and so the width of the degree prefix,
/// comes from the hemisphere.
pub fn dm_to_decimal(value: &str, hemisphere: Hemisphere) -> NFResult<f64> {
    let axis = hemisphere.axis();
    let invalid = || Error::InvalidCoord(format!("{value} {hemisphere:?}"));
    if value.len() < axis.min_width() {
        return Err(invalid());
    }

    let (degrees, minutes) = parse_all(
        pair(number(axis.degree_width()), fixed_decimal(2)),
        value,
    )
    .ok_or_else(invalid)?;
    if minutes >= 60.0 {
        return Err(invalid());
    }

    let decimal = degrees as f64 + minutes / 60.0;
    if decimal > axis.max_degrees() {
        return Err(invalid());
    }
    Ok(round_decimals(decimal, COORD_DECIMALS) * hemisphere.sign())
}

fn round_decimals(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
