#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the operator REPL.
//!
//! The lexer uses `regal` to produce a bounded token stream and the parser
//! composes `winnow` combinators over those tokens to build [`Command`]
//! values. Nothing here allocates, so the pipeline stays `no_std`.

use core::fmt;
use core::ops::Range;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::combinator::opt;
use winnow::error::{ErrMode, ModalResult, ParserError};
use winnow::prelude::*;

use super::catalog::{self, CommandTag};
use crate::config::{BlindTarget, Khz, LoBand, Polarization, Tenths};
use crate::diseqc::{Direction, DriveUnit};
use crate::engine::SecOperation;

/// Maximum number of tokens produced per REPL line. Commands remain short and bounded.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Symbol rate used when `tune` does not name one, in symbols per second.
pub const DEFAULT_SYMBOL_RATE: u32 = 27_500_000;

/// Largest longitude accepted by `gotox`, in tenths of a degree.
const MAX_LONGITUDE_TENTHS: u32 = 1_800;

/// Lexical token kinds recognized by the REPL grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Number with a decimal fraction, e.g. `11778.5`.
    #[regex(r"[0-9]+\.[0-9]+", priority = 2)]
    Decimal,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    /// Equals sign for key/value assignments.
    #[token("=")]
    Equals,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidNumber {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidNumber { span } => {
                write!(f, "invalid number at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_number(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidNumber {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

type Parsed<'src, T> = ModalResult<T, GrammarError<'src>>;

impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    type Inner = Self;

    fn from_input(input: &Input<'src, 'slice>) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn into_inner(self) -> Result<Self::Inner, Self> {
        Ok(self)
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Tune(TuneCommand),
    Probe(Option<TuneCommand>),
    Blind(BlindTarget),
    Positioner(SecOperation),
    Status,
    Help(HelpCommand<'a>),
}

/// Transponder named on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TuneCommand {
    pub frequency: Khz,
    pub polarization: Polarization,
    /// Symbols per second.
    pub symbol_rate: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command.parse_next(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        if buffer
            .push(Token {
                kind: record.token,
                lexeme,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let end = start + partial.fragment.len();
        if buffer
            .push(Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span: start..end,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    Ok(buffer)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a REPL command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    for token in tokens.iter() {
        if token.kind == TokenKind::Error {
            return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
        }
    }

    let (command, mut rest) =
        parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src>(input: &mut Input<'src, '_>) -> Parsed<'src, Command<'src>> {
    let snapshot = *input;
    let head = expect_kind(input, TokenKind::Ident, "command keyword")?;
    let Some(spec) = catalog::find(head.lexeme) else {
        *input = snapshot;
        return Err(ErrMode::Backtrack(GrammarError::unexpected(
            "command keyword",
            Some(&head),
        )));
    };

    match spec.tag {
        CommandTag::Tune => {
            let mut tune = transponder(input)?;
            if let Some((key, value)) = opt(assignment).parse_next(input)? {
                if !key.lexeme.eq_ignore_ascii_case("sr") {
                    return Err(ErrMode::Cut(GrammarError::unexpected("sr", Some(&key))));
                }
                let ksyms = integer::<u32>(&value)?;
                tune.symbol_rate = ksyms
                    .checked_mul(1_000)
                    .ok_or_else(|| ErrMode::Cut(GrammarError::invalid_number(&value)))?;
            }
            Ok(Command::Tune(tune))
        }
        CommandTag::Probe => opt(transponder).parse_next(input).map(Command::Probe),
        CommandTag::Blind => {
            let polarization = polarization(input)?;
            let band = keyword(input, &["low", "high"], "low or high")?;
            Ok(Command::Blind(BlindTarget {
                polarization,
                band: if band == 0 { LoBand::Low } else { LoBand::High },
            }))
        }
        CommandTag::Stop => Ok(Command::Positioner(SecOperation::Stop)),
        CommandTag::Limits => {
            let operation = match keyword(input, &["on", "off"], "on or off")? {
                0 => SecOperation::LimitsOn,
                _ => SecOperation::LimitsOff,
            };
            Ok(Command::Positioner(operation))
        }
        CommandTag::Limit => {
            let direction = direction(input)?;
            Ok(Command::Positioner(SecOperation::StoreLimit(direction)))
        }
        CommandTag::Nudge => {
            let direction = direction(input)?;
            let unit = match opt(assignment).parse_next(input)? {
                None => DriveUnit::Continuous,
                Some((key, value)) if key.lexeme.eq_ignore_ascii_case("steps") => {
                    DriveUnit::Steps(integer(&value)?)
                }
                Some((key, value)) if key.lexeme.eq_ignore_ascii_case("seconds") => {
                    DriveUnit::Seconds(integer(&value)?)
                }
                Some((key, _)) => {
                    return Err(ErrMode::Cut(GrammarError::unexpected(
                        "steps or seconds",
                        Some(&key),
                    )));
                }
            };
            Ok(Command::Positioner(SecOperation::Nudge { direction, unit }))
        }
        CommandTag::Goto => {
            let slot = expect_kind(input, TokenKind::Integer, "position")?;
            Ok(Command::Positioner(SecOperation::GotoStored(integer(&slot)?)))
        }
        CommandTag::Gotox => {
            let degrees = number(input, "longitude")?;
            let tenths = scaled(&degrees, 1)
                .filter(|tenths| *tenths <= MAX_LONGITUDE_TENTHS)
                .and_then(|tenths| Tenths::try_from(tenths).ok())
                .ok_or_else(|| ErrMode::Cut(GrammarError::invalid_number(&degrees)))?;
            let longitude = match direction(input)? {
                Direction::East => tenths,
                Direction::West => -tenths,
            };
            Ok(Command::Positioner(SecOperation::GotoAngular(longitude)))
        }
        CommandTag::Store => {
            let slot = expect_kind(input, TokenKind::Integer, "position")?;
            Ok(Command::Positioner(SecOperation::StorePosition(integer(&slot)?)))
        }
        CommandTag::Status => Ok(Command::Status),
        CommandTag::Help => {
            let topic = opt(topic).parse_next(input)?;
            Ok(Command::Help(HelpCommand {
                topic: topic.map(|token| token.lexeme),
            }))
        }
    }
}

fn transponder<'src>(input: &mut Input<'src, '_>) -> Parsed<'src, TuneCommand> {
    let megahertz = number(input, "frequency")?;
    let frequency =
        scaled(&megahertz, 3).ok_or_else(|| ErrMode::Cut(GrammarError::invalid_number(&megahertz)))?;
    let polarization = polarization(input)?;
    Ok(TuneCommand {
        frequency,
        polarization,
        symbol_rate: DEFAULT_SYMBOL_RATE,
    })
}

fn topic<'src>(input: &mut Input<'src, '_>) -> Parsed<'src, Token<'src>> {
    expect_kind(input, TokenKind::Ident, "topic")
}

fn polarization<'src>(input: &mut Input<'src, '_>) -> Parsed<'src, Polarization> {
    const NAMES: [&str; 8] = ["h", "v", "l", "r", "horizontal", "vertical", "left", "right"];
    Ok(match keyword(input, &NAMES, "polarization")? % 4 {
        0 => Polarization::Horizontal,
        1 => Polarization::Vertical,
        2 => Polarization::CircularLeft,
        _ => Polarization::CircularRight,
    })
}

fn direction<'src>(input: &mut Input<'src, '_>) -> Parsed<'src, Direction> {
    Ok(match keyword(input, &["east", "west"], "east or west")? {
        0 => Direction::East,
        _ => Direction::West,
    })
}

/// `key=value` pair with an integer value.
fn assignment<'src>(input: &mut Input<'src, '_>) -> Parsed<'src, (Token<'src>, Token<'src>)> {
    let key = expect_kind(input, TokenKind::Ident, "option")?;
    expect_kind(input, TokenKind::Equals, "=")?;
    let value = expect_kind(input, TokenKind::Integer, "integer")?;
    Ok((key, value))
}

/// Matches one of `options` and returns its index.
fn keyword<'src>(
    input: &mut Input<'src, '_>,
    options: &[&str],
    label: &'static str,
) -> Parsed<'src, usize> {
    let token = expect_kind(input, TokenKind::Ident, label)?;
    options
        .iter()
        .position(|option| option.eq_ignore_ascii_case(token.lexeme))
        .ok_or_else(|| ErrMode::Backtrack(GrammarError::unexpected(label, Some(&token))))
}

fn number<'src>(input: &mut Input<'src, '_>, label: &'static str) -> Parsed<'src, Token<'src>> {
    match input.split_first() {
        Some((token, rest)) if matches!(token.kind, TokenKind::Integer | TokenKind::Decimal) => {
            *input = rest;
            Ok(token.clone())
        }
        other => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            other.map(|(token, _)| token),
        ))),
    }
}

fn expect_kind<'src>(
    input: &mut Input<'src, '_>,
    kind: TokenKind,
    label: &'static str,
) -> Parsed<'src, Token<'src>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn integer<'src, T: core::str::FromStr>(token: &Token<'src>) -> Parsed<'src, T> {
    token
        .lexeme
        .parse::<T>()
        .map_err(|_| ErrMode::Cut(GrammarError::invalid_number(token)))
}

/// Parses a decimal literal into an integer with `digits` implied fraction digits.
fn scaled(token: &Token<'_>, digits: u32) -> Option<u32> {
    let (whole, fraction) = token.lexeme.split_once('.').unwrap_or((token.lexeme, ""));
    let fraction_digits = u32::try_from(fraction.len()).ok()?;
    if fraction_digits > digits {
        return None;
    }
    let mut value = whole.parse::<u32>().ok()?.checked_mul(10u32.pow(digits))?;
    if !fraction.is_empty() {
        let fraction = fraction.parse::<u32>().ok()?;
        value = value.checked_add(fraction * 10u32.pow(digits - fraction_digits))?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_tune_with_symbol_rate() {
        assert_eq!(
            parse_ok("tune 11778.5 v sr=22000"),
            Command::Tune(TuneCommand {
                frequency: 11_778_500,
                polarization: Polarization::Vertical,
                symbol_rate: 22_000_000,
            })
        );
    }

    #[test]
    fn tune_defaults_symbol_rate() {
        assert_eq!(
            parse_ok("tune 12000 h\n"),
            Command::Tune(TuneCommand {
                frequency: 12_000_000,
                polarization: Polarization::Horizontal,
                symbol_rate: DEFAULT_SYMBOL_RATE,
            })
        );
    }

    #[test]
    fn probe_target_is_optional() {
        assert_eq!(parse_ok("probe"), Command::Probe(None));
        assert!(matches!(
            parse_ok("probe 10714 l"),
            Command::Probe(Some(TuneCommand {
                frequency: 10_714_000,
                polarization: Polarization::CircularLeft,
                ..
            }))
        ));
    }

    #[test]
    fn parses_blind_band() {
        assert_eq!(
            parse_ok("blind H high"),
            Command::Blind(BlindTarget {
                polarization: Polarization::Horizontal,
                band: LoBand::High,
            })
        );
    }

    #[test]
    fn parses_positioner_commands() {
        assert_eq!(parse_ok("stop"), Command::Positioner(SecOperation::Stop));
        assert_eq!(parse_ok("limits off"), Command::Positioner(SecOperation::LimitsOff));
        assert_eq!(
            parse_ok("limit west"),
            Command::Positioner(SecOperation::StoreLimit(Direction::West))
        );
        assert_eq!(
            parse_ok("nudge east steps=4"),
            Command::Positioner(SecOperation::Nudge {
                direction: Direction::East,
                unit: DriveUnit::Steps(4),
            })
        );
        assert_eq!(
            parse_ok("nudge west"),
            Command::Positioner(SecOperation::Nudge {
                direction: Direction::West,
                unit: DriveUnit::Continuous,
            })
        );
        assert_eq!(parse_ok("goto 7"), Command::Positioner(SecOperation::GotoStored(7)));
        assert_eq!(
            parse_ok("gotox 19.2 east"),
            Command::Positioner(SecOperation::GotoAngular(192))
        );
        assert_eq!(
            parse_ok("gotox 30 west"),
            Command::Positioner(SecOperation::GotoAngular(-300))
        );
        assert_eq!(parse_ok("store 3"), Command::Positioner(SecOperation::StorePosition(3)));
    }

    #[test]
    fn parses_status_and_help() {
        assert_eq!(parse_ok("status"), Command::Status);
        assert_eq!(parse_ok("help"), Command::Help(HelpCommand { topic: None }));
        assert_eq!(
            parse_ok("help gotox"),
            Command::Help(HelpCommand {
                topic: Some("gotox"),
            })
        );
    }

    #[test]
    fn rejects_excess_precision_and_range() {
        assert!(matches!(
            parse("gotox 19.25 east"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::InvalidNumber { .. }
            }))
        ));
        assert!(matches!(
            parse("gotox 181 east"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::InvalidNumber { .. }
            }))
        ));
        assert!(matches!(
            parse("goto 300"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::InvalidNumber { .. }
            }))
        ));
    }

    #[test]
    fn rejects_unknown_option() {
        assert!(parse("nudge east turns=2").is_err());
        assert!(parse("tune 12000 h bw=3").is_err());
    }

    #[test]
    fn rejects_trailing_tokens() {
        match parse("stop now") {
            Err(ParseError::Grammar(err)) => assert!(matches!(
                err.kind,
                GrammarErrorKind::UnexpectedToken {
                    expected: "end of command",
                    ..
                }
            )),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_token() {
        match parse("goto 3$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn supports_case_insensitive_keywords() {
        assert_eq!(parse_ok("LiMiTs On"), Command::Positioner(SecOperation::LimitsOn));
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("stop$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }

    #[test]
    fn lexer_separates_decimals_from_integers() {
        let tokens = lex("tune 11778.5 v").expect("lexing should succeed");
        let kinds: HeaplessVec<TokenKind, 4> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds.as_slice(),
            &[TokenKind::Ident, TokenKind::Decimal, TokenKind::Ident]
        );
    }
}
