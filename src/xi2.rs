//! XInput2 generic event payloads
//!
//! Cookie payloads are parsed with x11rb's typed `xinput` events. Key,
//! pointer and crossing events each share one layout across their event
//! types.

use x11rb::protocol::xinput;
use x11rb::x11_utils::TryParse;

use crate::error::TranslateError;

/// A fetched XInput2 payload.
#[derive(Debug, Clone)]
pub enum Xi2Event {
    /// Key press or release.
    Key(xinput::KeyPressEvent),
    /// Button press, button release or motion.
    Pointer(xinput::ButtonPressEvent),
    /// Enter, leave, focus in or focus out.
    Crossing(xinput::EnterEvent),
    Other(u16),
}

impl Xi2Event {
    /// Parse the payload of a cookie whose XInput2 event type is `evtype`.
    pub fn parse(evtype: u16, bytes: &[u8]) -> Result<Self, TranslateError> {
        let event = match evtype {
            xinput::KEY_PRESS_EVENT | xinput::KEY_RELEASE_EVENT => Self::Key(parse(bytes)?),
            xinput::BUTTON_PRESS_EVENT | xinput::BUTTON_RELEASE_EVENT | xinput::MOTION_EVENT => {
                Self::Pointer(parse(bytes)?)
            }
            xinput::ENTER_EVENT
            | xinput::LEAVE_EVENT
            | xinput::FOCUS_IN_EVENT
            | xinput::FOCUS_OUT_EVENT => Self::Crossing(parse(bytes)?),
            other => Self::Other(other),
        };
        Ok(event)
    }

    pub fn evtype(&self) -> u16 {
        match self {
            Self::Key(ev) => ev.event_type,
            Self::Pointer(ev) => ev.event_type,
            Self::Crossing(ev) => ev.event_type,
            Self::Other(evtype) => *evtype,
        }
    }
}

fn parse<T: TryParse>(bytes: &[u8]) -> Result<T, TranslateError> {
    T::try_parse(bytes)
        .map(|(event, _)| event)
        .map_err(|_| TranslateError::FailedToGetEventData)
}

pub fn fp1616_to_f64(value: xinput::Fp1616) -> f64 {
    f64::from(value) / f64::from(1 << 16)
}
