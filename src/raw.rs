//! Raw server events as handed to the translator

use x11rb::protocol::xproto::{GeGenericEvent, GE_GENERIC_EVENT};
use x11rb::x11_utils::TryParse;

use crate::error::TranslateError;
use crate::xi2::Xi2Event;

/// Core protocol events the toolkit reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    Expose { window: u32, count: u16 },
    Configure { window: u32, x: i16, y: i16, width: u16, height: u16 },
    ClientMessage { window: u32, message_type: u32, format: u8, data: [u32; 5] },
    Map { window: u32 },
    Unmap { window: u32 },
    MappingNotify { keyboard: bool },
    Other { response_type: u8, window: Option<u32> },
}

impl CoreEvent {
    pub fn window(&self) -> Option<u32> {
        match *self {
            Self::Expose { window, .. }
            | Self::Configure { window, .. }
            | Self::ClientMessage { window, .. }
            | Self::Map { window }
            | Self::Unmap { window } => Some(window),
            Self::MappingNotify { .. } => None,
            Self::Other { window, .. } => window,
        }
    }
}

/// An extension event whose payload has to be fetched before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericEventCookie {
    extension: u8,
    evtype: u16,
    bytes: Vec<u8>,
}

impl GenericEventCookie {
    /// Wrap a complete GenericEvent packet. Returns `None` for anything
    /// else.
    pub fn from_wire(bytes: Vec<u8>) -> Option<Self> {
        if bytes.first().map(|b| b & 0x7f) != Some(GE_GENERIC_EVENT) {
            return None;
        }
        let (header, _) = GeGenericEvent::try_parse(&bytes).ok()?;
        Some(Self {
            extension: header.extension,
            evtype: header.event_type,
            bytes,
        })
    }

    /// Major opcode of the extension that sent the event.
    pub fn extension(&self) -> u8 {
        self.extension
    }

    pub fn evtype(&self) -> u16 {
        self.evtype
    }

    /// Decode the payload as an XInput2 event. The result owns its data.
    pub fn fetch_data(&self) -> Result<Xi2Event, TranslateError> {
        Xi2Event::parse(self.evtype, &self.bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Core(CoreEvent),
    Generic(GenericEventCookie),
}
