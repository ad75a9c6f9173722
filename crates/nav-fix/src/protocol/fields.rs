/// nom building blocks for NMEA field values.
use nom::{
    bytes::complete::take_while_m_n,
    character::complete::{char, digit0, digit1},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::pair,
    IResult,
};

/// Exactly `n` ASCII digits.
pub(crate) fn digits<'a>(n: usize) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    take_while_m_n(n, n, |c: char| c.is_ascii_digit())
}

/// Fixed-width unsigned integer, e.g. the `HH` of `HHMMSS`.
pub(crate) fn number<'a>(n: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    map_res(digits(n), |s: &str| s.parse::<u32>())
}

/// Exactly `n` whole digits with an optional fraction, e.g. the `07.038` minutes of `4807.038`.
pub(crate) fn fixed_decimal<'a>(n: usize) -> impl FnMut(&'a str) -> IResult<&'a str, f64> {
    map_res(
        recognize(pair(digits(n), opt(pair(char('.'), digit0)))),
        |s: &str| s.parse::<f64>(),
    )
}

/// `123` or `123.45`. No sign, exponent or special values.
pub(crate) fn unsigned_decimal(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

/// Run `parser` over the whole field; trailing input is a failure.
pub(crate) fn parse_all<'a, O, F>(parser: F, input: &'a str) -> Option<O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    all_consuming(parser)(input).ok().map(|(_, out)| out)
}
