use std::{error::Error, num::ParseFloatError, time::Duration};

use miette::{GraphicalReportHandler, GraphicalTheme};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1},
    combinator::{map, map_res, opt, recognize, value},
    error::{FromExternalError, ParseError},
    multi::many1,
    sequence::{pair, tuple},
    IResult,
};
use nom_locate::LocatedSpan;
use nom_supreme::{
    error::{BaseErrorKind, ErrorTree, GenericErrorTree},
    final_parser::final_parser,
};

pub type Span<'a> = LocatedSpan<&'a str>;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MIN: u64 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MIN;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid duration {input:?}: {reason}")]
pub struct DurationError {
    pub input: String,
    pub reason: String,
}

#[derive(thiserror::Error, Debug, miette::Diagnostic)]
#[error("bad duration")]
struct BadInput {
    #[source_code]
    src: String,

    #[label("{kind}")]
    bad_bit: miette::SourceSpan,

    kind: BaseErrorKind<&'static str, Box<dyn Error + Send + Sync>>,
}

/// Parses a duration in the `1h30m` / `1.5h` / `250ms` notation.
///
/// Accepted units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `0` is
/// the only unitless value accepted.
pub fn parse_duration(src: &str) -> Result<Duration, DurationError> {
    let nanos = final_parser(parse_nanos::<ErrorTree<Span>>)(Span::new(src)).map_err(|e| {
        DurationError {
            input: src.to_string(),
            reason: render_error(src, e),
        }
    })?;

    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Err(DurationError {
            input: src.to_string(),
            reason: "duration out of range".to_string(),
        });
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Adapter for clap's `value_parser`.
pub fn parse_duration_arg(src: &str) -> Result<Duration, String> {
    parse_duration(src).map_err(|e| e.to_string())
}

fn parse_nanos<'a, E>(i: Span<'a>) -> IResult<Span<'a>, f64, E>
where
    E: ParseError<Span<'a>> + FromExternalError<Span<'a>, ParseFloatError>,
{
    alt((
        map(many1(parse_component::<E>), |parts: Vec<f64>| parts.iter().sum::<f64>()),
        value(0.0, tag("0")),
    ))(i)
}

fn parse_component<'a, E>(i: Span<'a>) -> IResult<Span<'a>, f64, E>
where
    E: ParseError<Span<'a>> + FromExternalError<Span<'a>, ParseFloatError>,
{
    let (input, (amount, unit)) = tuple((parse_amount::<E>, parse_unit::<E>))(i)?;
    Ok((input, amount * unit as f64))
}

fn parse_amount<'a, E>(i: Span<'a>) -> IResult<Span<'a>, f64, E>
where
    E: ParseError<Span<'a>> + FromExternalError<Span<'a>, ParseFloatError>,
{
    map_res(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        |amount: Span<'a>| amount.fragment().parse::<f64>(),
    )(i)
}

fn parse_unit<'a, E: ParseError<Span<'a>>>(i: Span<'a>) -> IResult<Span<'a>, u64, E> {
    // `ms` has to be tried before `m`
    alt((
        value(1, tag("ns")),
        value(NANOS_PER_MICRO, tag("us")),
        value(NANOS_PER_MICRO, tag("µs")),
        value(NANOS_PER_MICRO, tag("μs")),
        value(NANOS_PER_MILLI, tag("ms")),
        value(NANOS_PER_SEC, tag("s")),
        value(NANOS_PER_MIN, tag("m")),
        value(NANOS_PER_HOUR, tag("h")),
    ))(i)
}

/// Renders every leaf of the error tree as a miette report pointing into `src_input`.
pub fn render_error(src_input: &str, e: ErrorTree<Span>) -> String {
    let mut rendered = Vec::new();
    collect_base_errors(src_input, e, &mut rendered);
    rendered.join("\n")
}

fn collect_base_errors(src_input: &str, e: ErrorTree<Span>, rendered: &mut Vec<String>) {
    match e {
        GenericErrorTree::Base { location, kind } => {
            rendered.push(render_base_error(src_input, location, kind));
        }
        GenericErrorTree::Stack { base, .. } => collect_base_errors(src_input, *base, rendered),
        GenericErrorTree::Alt(alternatives) => {
            for alternative in alternatives {
                collect_base_errors(src_input, alternative, rendered);
            }
        }
    }
}

fn render_base_error(
    src_input: &str,
    location: Span,
    kind: BaseErrorKind<&'static str, Box<dyn Error + Send + Sync>>,
) -> String {
    let offset = location.location_offset().into();
    let err = BadInput {
        src: src_input.to_string(),
        bad_bit: miette::SourceSpan::new(offset, 0.into()),
        kind,
    };
    let mut s = String::new();
    match GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        .render_report(&mut s, &err)
    {
        Ok(()) => s,
        Err(_) => format!("{} at offset {}", err.kind, location.location_offset()),
    }
}
