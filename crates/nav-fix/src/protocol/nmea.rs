use nom::{
    bytes::complete::{take_till, take_while_m_n},
    character::complete::char,
    combinator::{eof, map_res},
    sequence::terminated,
    IResult,
};
use thiserror::Error;

pub const START_MARKER: char = '$';
pub const CHECKSUM_DELIMITER: char = '*';
pub const FIELD_SEPARATOR: char = ',';

/// NMEA 0183 sentence envelope:
///
/// ```text
/// $<tag>,<field 0>,<field 1>,...,<field n>*<checksum>
/// ```
///
/// The tag is a two character talker ID followed by a three character sentence formatter
/// (`GP` + `RMC`). The checksum is two hex digits, the XOR of every byte between `$` and `*`.
/// An empty field means the value is absent, not zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence<'a> {
    pub tag: &'a str,
    pub fields: Vec<&'a str>,
    pub raw: &'a str,
    pub checksum: u8,
}

impl<'a> Sentence<'a> {
    /// Sentence formatter with the talker ID stripped, e.g. `RMC` for `GNRMC`.
    pub fn formatter(&self) -> &'a str {
        self.tag
            .get(self.tag.len().saturating_sub(3)..)
            .unwrap_or_default()
    }
}

/// Reason a frame was not accepted as a sentence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum Reject {
    #[error("missing '$' start marker")]
    NoStartMarker,
    #[error("expected exactly one '*' checksum delimiter")]
    NoChecksumDelimiter,
    #[error("checksum is not two hex digits")]
    BadChecksumHex,
    #[error("checksum mismatch: declared {declared:02X}, computed {computed:02X}")]
    ChecksumMismatch { declared: u8, computed: u8 },
}

/// Check one frame's markers and checksum and split it into tag and fields.
///
/// Surrounding whitespace is ignored. Checks run in order: start marker, a single checksum
/// delimiter, two hex digits after it, then the checksum itself.
pub fn validate(text: &str) -> Result<Sentence<'_>, Reject> {
    let raw = text.trim();
    let (rest, _) = start_marker(raw).map_err(|_| Reject::NoStartMarker)?;
    let (rest, data) = data_portion(rest).map_err(|_| Reject::NoChecksumDelimiter)?;
    if rest.contains(CHECKSUM_DELIMITER) {
        return Err(Reject::NoChecksumDelimiter);
    }
    let (_, declared) = checksum_hex(rest).map_err(|_| Reject::BadChecksumHex)?;
    let computed = checksum(data.as_bytes());
    if declared != computed {
        return Err(Reject::ChecksumMismatch { declared, computed });
    }

    let mut parts = data.split(FIELD_SEPARATOR);
    let tag = parts.next().unwrap_or_default();
    Ok(Sentence {
        tag,
        fields: parts.collect(),
        raw,
        checksum: declared,
    })
}

fn start_marker(input: &str) -> IResult<&str, char> {
    char(START_MARKER)(input)
}

fn data_portion(input: &str) -> IResult<&str, &str> {
    terminated(take_till(|c| c == CHECKSUM_DELIMITER), char(CHECKSUM_DELIMITER))(input)
}

fn checksum_hex(input: &str) -> IResult<&str, u8> {
    terminated(
        map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |hex| {
            u8::from_str_radix(hex, 16)
        }),
        eof,
    )(input)
}

/// NMEA checksum: bytewise XOR.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Build a checksummed sentence (without line delimiter) from a tag and its fields.
pub fn encode(tag: &str, fields: &[&str]) -> String {
    let mut data = String::from(tag);
    for field in fields {
        data.push(FIELD_SEPARATOR);
        data.push_str(field);
    }
    let csum = checksum(data.as_bytes());
    format!("{START_MARKER}{data}{CHECKSUM_DELIMITER}{csum:02X}")
}
