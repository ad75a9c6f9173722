pub(crate) mod fields;
pub mod nmea;
pub mod rmc;

use crate::{config::YearAnchor, NFResult};
use nmea::Sentence;
use rmc::Rmc;

/// Trait implemented by each decodable sentence type.
pub trait NavSentence: Sized {
    /// Sentence formatter this type decodes, without talker ID.
    const FORMATTER: &'static str;

    fn decode(sentence: &Sentence<'_>, year_anchor: YearAnchor) -> NFResult<Self>;
}

/// Every sentence type this crate decodes.
#[derive(Debug, Clone, PartialEq)]
pub enum NavMessage {
    Rmc(Rmc),
}

/// Decode a validated sentence. Types without a decoder yield `Ok(None)`; they are skipped,
/// not errors.
pub fn decode(sentence: &Sentence<'_>, year_anchor: YearAnchor) -> NFResult<Option<NavMessage>> {
    match sentence.formatter() {
        Rmc::FORMATTER => Rmc::decode(sentence, year_anchor).map(|rmc| Some(NavMessage::Rmc(rmc))),
        _ => Ok(None),
    }
}
