//! Error types for the display connection, event translation and the application loop

use thiserror::Error;

/// Failures talking to the X server.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("could not open display {0:?}")]
    CouldNotOpenDisplay(String, #[source] x11rb::errors::ConnectError),

    #[error("required extension is missing: {0}")]
    MissingExtension(String),

    #[error("could not read attributes of window {0:#x}")]
    BadWindowAttributes(u32),

    /// The server answered one of our requests with an error packet.
    #[error("X server error {name} (code {code}) for request opcode {major_opcode}, resource {bad_value:#x}")]
    Protocol {
        code: u8,
        name: &'static str,
        major_opcode: u8,
        bad_value: u32,
    },

    #[error("connection to the X server failed")]
    Connection(#[from] x11rb::errors::ConnectionError),

    #[error("X server reply failed")]
    Reply(#[from] x11rb::errors::ReplyError),

    #[error("could not allocate an X resource id")]
    Id(#[from] x11rb::errors::ReplyOrIdError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reasons a raw server event did not become a toolkit event.
///
/// None of these are fatal: the translator turns every one of them into an
/// ignored placeholder event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("event not supported: {0}")]
    EventNotSupported(String),

    #[error("event targets window {0:#x} which is not managed by this application")]
    ForeignWindow(u32),

    #[error("failed to get extension event data")]
    FailedToGetEventData,

    #[error("event ignored: {0}")]
    EventIgnored(&'static str),
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("application has been terminated and cannot run again")]
    Terminated,

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error("run loop failed")]
    RunLoop(#[source] std::io::Error),
}

/// Symbolic name for a core protocol error code.
pub fn error_code_name(code: u8) -> &'static str {
    match code {
        1 => "BadRequest",
        2 => "BadValue",
        3 => "BadWindow",
        4 => "BadPixmap",
        5 => "BadAtom",
        6 => "BadCursor",
        7 => "BadFont",
        8 => "BadMatch",
        9 => "BadDrawable",
        10 => "BadAccess",
        11 => "BadAlloc",
        12 => "BadColor",
        13 => "BadGC",
        14 => "BadIDChoice",
        15 => "BadName",
        16 => "BadLength",
        17 => "BadImplementation",
        _ => "UnknownError",
    }
}
