//! Console grammar for the link emulator.
//!
//! Commands are single lines of whitespace-separated words parsed with
//! `winnow` combinators. Keywords are case-insensitive.

use std::fmt;
use std::time::Duration;

use link_core::debounce::ButtonId;
use link_core::session::Role;
use winnow::ascii::{Caseless, alpha1, dec_uint, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::prelude::*;

/// Structured commands produced by [`parse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Press and release a button.
    Press { button: ButtonId },
    /// Press with contact chatter before the level settles.
    Bounce { button: ButtonId },
    Tick(Duration),
    /// Drop every n-th ranging exchange (`0` disables loss).
    Loss(u32),
    /// Move the servo directly to a pulse width in microseconds.
    Servo(u16),
    Neutral,
    Status(Option<Role>),
    Help { topic: Option<&'a str> },
}

/// Parse failure with the byte offset where the grammar stopped matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised input at column {}", self.offset + 1)
    }
}

/// Parses one console line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError> {
    command
        .parse(line.trim())
        .map_err(|err| ParseError {
            offset: err.offset(),
        })
}

fn command<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    alt((
        press,
        bounce,
        preceded((Caseless("tick"), space1), duration).map(Command::Tick),
        preceded((Caseless("loss"), space1), dec_uint).map(Command::Loss),
        preceded((Caseless("servo"), space1), dec_uint).map(Command::Servo),
        Caseless("neutral").value(Command::Neutral),
        preceded(Caseless("status"), opt(preceded(space1, role))).map(Command::Status),
        preceded(Caseless("help"), opt(preceded(space1, alpha1)))
            .map(|topic| Command::Help { topic }),
    ))
    .parse_next(input)
}

fn press<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(Caseless("press"), opt(preceded(space1, button)))
        .map(|button| Command::Press {
            button: button.unwrap_or(ButtonId::Sw1),
        })
        .parse_next(input)
}

fn bounce<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(Caseless("bounce"), opt(preceded(space1, button)))
        .map(|button| Command::Bounce {
            button: button.unwrap_or(ButtonId::Sw1),
        })
        .parse_next(input)
}

fn button(input: &mut &str) -> ModalResult<ButtonId> {
    alt((
        Caseless("sw1").value(ButtonId::Sw1),
        Caseless("sw2").value(ButtonId::Sw2),
    ))
    .parse_next(input)
}

fn role(input: &mut &str) -> ModalResult<Role> {
    alt((
        alt((Caseless("initiator"), Caseless("init"))).value(Role::Initiator),
        alt((Caseless("responder"), Caseless("resp"))).value(Role::Responder),
    ))
    .parse_next(input)
}

/// `<n>`, `<n>ms` or `<n>s`; bare numbers are milliseconds.
fn duration(input: &mut &str) -> ModalResult<Duration> {
    (
        dec_uint::<_, u64, _>,
        opt(alt((Caseless("ms").value(1_u64), Caseless("s").value(1_000)))),
    )
        .map(|(value, scale)| Duration::from_millis(value.saturating_mul(scale.unwrap_or(1))))
        .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(line: &str) -> Command<'_> {
        parse(line).unwrap_or_else(|err| panic!("`{line}` failed: {err}"))
    }

    #[test]
    fn press_defaults_to_first_button() {
        assert_eq!(
            parse_ok("press"),
            Command::Press {
                button: ButtonId::Sw1
            }
        );
        assert_eq!(
            parse_ok("PRESS sw2"),
            Command::Press {
                button: ButtonId::Sw2
            }
        );
        assert!(parse("press hold").is_err());
    }

    #[test]
    fn tick_accepts_units() {
        assert_eq!(parse_ok("tick 250"), Command::Tick(Duration::from_millis(250)));
        assert_eq!(parse_ok("tick 40ms"), Command::Tick(Duration::from_millis(40)));
        assert_eq!(parse_ok("tick 3s"), Command::Tick(Duration::from_secs(3)));
    }

    #[test]
    fn numeric_arguments() {
        assert_eq!(parse_ok("loss 3"), Command::Loss(3));
        assert_eq!(parse_ok("servo 1250"), Command::Servo(1_250));
        assert!(parse("servo 70000").is_err());
        assert!(parse("servo").is_err());
    }

    #[test]
    fn status_takes_optional_role() {
        assert_eq!(parse_ok("status"), Command::Status(None));
        assert_eq!(
            parse_ok("status responder"),
            Command::Status(Some(Role::Responder))
        );
        assert_eq!(
            parse_ok("status init"),
            Command::Status(Some(Role::Initiator))
        );
    }

    #[test]
    fn help_topic_is_borrowed() {
        assert_eq!(parse_ok("help"), Command::Help { topic: None });
        assert_eq!(
            parse_ok("help press"),
            Command::Help {
                topic: Some("press")
            }
        );
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let err = parse("neutral now").expect_err("extra word");
        assert_eq!(err.offset, 7);
        assert!(parse("bounce sw3").is_err());
        assert!(parse("launch").is_err());
    }
}
