/// Navigation fix records handed to consumers, plus a longitude-based local time estimate.
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::protocol::rmc::{FaaMode, Rmc, Status};

/// One position/velocity/time solution. Built from a decoded RMC sentence and never modified
/// afterwards; absent values were empty on the wire.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FixRecord {
    valid: bool,
    latitude: Option<f64>,
    longitude: Option<f64>,
    speed_knots: Option<f64>,
    course_deg: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
    magnetic_variation: Option<f64>,
    mode: Option<FaaMode>,
}

impl From<Rmc> for FixRecord {
    fn from(rmc: Rmc) -> Self {
        let timestamp = rmc
            .time
            .map(|time| Utc.from_utc_datetime(&rmc.date.and_time(time)));
        Self {
            valid: rmc.status == Status::Valid,
            latitude: rmc.latitude,
            longitude: rmc.longitude,
            speed_knots: rmc.speed_knots,
            course_deg: rmc.course_deg,
            timestamp,
            magnetic_variation: rmc.magnetic_variation,
            mode: rmc.mode,
        }
    }
}

impl FixRecord {
    /// Receiver status was `A`. A void fix still carries whatever fields the receiver sent.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Decimal degrees, south negative.
    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    /// Decimal degrees, west negative.
    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    pub fn speed_knots(&self) -> Option<f64> {
        self.speed_knots
    }

    /// Course over ground, degrees true.
    pub fn course_deg(&self) -> Option<f64> {
        self.course_deg
    }

    /// UTC date and time of the fix. Absent when the sentence had no time of day.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Degrees, west negative.
    pub fn magnetic_variation(&self) -> Option<f64> {
        self.magnetic_variation
    }

    pub fn mode(&self) -> Option<FaaMode> {
        self.mode
    }

    /// Fix time shifted by [`approx_offset_hours`] of the fix longitude.
    ///
    /// This is solar-ish time from longitude alone, not civil time: political time zones and
    /// daylight saving are ignored.
    pub fn approx_local_time(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(approx_offset_hours(self.longitude?) * 3600)?;
        Some(self.timestamp?.with_timezone(&offset))
    }
}

/// Whole hours east of UTC estimated from longitude, `floor(longitude / 15)`. An approximation
/// only, see [`FixRecord::approx_local_time`].
pub fn approx_offset_hours(longitude: f64) -> i32 {
    (longitude / 15.0).floor() as i32
}

/// `utc_hour` shifted by [`approx_offset_hours`], wrapped into `0..24`.
pub fn approx_local_hour(utc_hour: u32, longitude: f64) -> u32 {
    (utc_hour as i32 + approx_offset_hours(longitude)).rem_euclid(24) as u32
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::YearAnchor,
        lazy_init_tracing,
        protocol::{nmea::validate, NavSentence},
    };
    use chrono::{NaiveDate, Timelike};

    fn fix(text: &str) -> FixRecord {
        Rmc::decode(&validate(text).unwrap(), YearAnchor::default())
            .unwrap()
            .into()
    }

    #[test]
    fn test_assemble_reference_fix() {
        lazy_init_tracing();
        let f = fix("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A");
        assert!(f.is_valid());
        assert_eq!(f.latitude(), Some(48.1173));
        assert_eq!(f.longitude(), Some(11.516667));
        assert_eq!(f.speed_knots(), Some(22.4));
        assert_eq!(f.course_deg(), Some(84.4));
        assert_eq!(f.magnetic_variation(), Some(-3.1));
        assert_eq!(
            f.timestamp(),
            Some(Utc.from_utc_datetime(
                &NaiveDate::from_ymd_opt(1994, 3, 23)
                    .unwrap()
                    .and_hms_opt(12, 35, 19)
                    .unwrap()
            ))
        );
        assert_eq!(
            f.timestamp().unwrap().to_rfc3339(),
            "1994-03-23T12:35:19+00:00"
        );
    }

    #[test]
    fn test_void_fix_keeps_fields() {
        lazy_init_tracing();
        let valid = fix("$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A");
        let void = fix("$GPRMC,123519,V,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*7D");
        assert!(!void.is_valid());
        assert_eq!(void.latitude(), valid.latitude());
        assert_eq!(void.longitude(), valid.longitude());
        assert_eq!(void.speed_knots(), valid.speed_knots());
        assert_eq!(void.course_deg(), valid.course_deg());
        assert_eq!(void.timestamp(), valid.timestamp());
    }

    #[test]
    fn test_missing_time_means_no_timestamp() {
        let f = fix("$GPRMC,,V,,,,,,,230394,,*3E");
        assert_eq!(f.timestamp(), None);
        assert_eq!(f.approx_local_time(), None);
    }

    #[test]
    fn test_approx_offset_hours() {
        let test_cases = [
            (0.0, 0),
            (11.516667, 0),
            (15.0, 1),
            (-0.5, -1),
            (-122.7, -9),
            (179.9, 11),
            (180.0, 12),
            (-180.0, -12),
        ];
        for (lon, expected) in test_cases.iter() {
            assert_eq!(approx_offset_hours(*lon), *expected, "lon {}", lon);
        }
    }

    #[test]
    fn test_approx_local_hour_wraps() {
        let test_cases = [
            (12, 11.5, 12),
            (3, -122.7, 18),
            (0, -0.5, 23),
            (23, 30.0, 1),
            (22, 180.0, 10),
        ];
        for (utc, lon, expected) in test_cases.iter() {
            assert_eq!(approx_local_hour(*utc, *lon), *expected, "{} @ {}", utc, lon);
        }
    }

    #[test]
    fn test_approx_local_time() {
        lazy_init_tracing();
        let f = fix("$GPRMC,023519,A,4807.038,N,12231.000,W,022.4,084.4,230394,003.1,W*78");
        let local = f.approx_local_time().unwrap();
        assert_eq!(local.offset().local_minus_utc(), -9 * 3600);
        assert_eq!(local.hour(), 17);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(1994, 3, 22).unwrap());
        assert_eq!(local.hour(), approx_local_hour(2, -122.516667));
    }
}
