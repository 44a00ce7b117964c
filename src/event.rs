//! Portable toolkit events
//!
//! Everything the display server produces is normalized into an [`Event`]
//! before it reaches the queue. Events are plain values: once posted they
//! are only read.

use std::time::Duration;

use bitflags::bitflags;

use crate::error::TranslateError;
use crate::geometry::Point;

/// Index of a toolkit window inside the application's window list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowNumber(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    None = 0,
    LeftMouseDown = 1,
    LeftMouseUp = 2,
    RightMouseDown = 3,
    RightMouseUp = 4,
    MouseMoved = 5,
    LeftMouseDragged = 6,
    RightMouseDragged = 7,
    MouseEntered = 8,
    MouseExited = 9,
    KeyDown = 10,
    KeyUp = 11,
    FlagsChanged = 12,
    ToolkitDefined = 13,
    SystemDefined = 14,
    ApplicationDefined = 15,
    ScrollWheel = 22,
    OtherMouseDown = 25,
    OtherMouseUp = 26,
    OtherMouseDragged = 27,
}

impl EventType {
    pub fn mask(self) -> EventTypeMask {
        EventTypeMask::from_bits_retain(1 << self as u8)
    }

    pub fn is_mouse(self) -> bool {
        EventTypeMask::ANY_MOUSE.contains(self.mask())
    }

    pub fn is_mouse_down(self) -> bool {
        EventTypeMask::ANY_MOUSE_DOWN.contains(self.mask())
    }

    pub fn is_mouse_up(self) -> bool {
        EventTypeMask::ANY_MOUSE_UP.contains(self.mask())
    }

    pub fn is_keyboard(self) -> bool {
        EventTypeMask::ANY_KEYBOARD.contains(self.mask())
    }
}

bitflags! {
    /// One bit per [`EventType`], bit index equal to the type's value.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EventTypeMask: u64 {
        const NONE = 1 << 0;
        const LEFT_MOUSE_DOWN = 1 << 1;
        const LEFT_MOUSE_UP = 1 << 2;
        const RIGHT_MOUSE_DOWN = 1 << 3;
        const RIGHT_MOUSE_UP = 1 << 4;
        const MOUSE_MOVED = 1 << 5;
        const LEFT_MOUSE_DRAGGED = 1 << 6;
        const RIGHT_MOUSE_DRAGGED = 1 << 7;
        const MOUSE_ENTERED = 1 << 8;
        const MOUSE_EXITED = 1 << 9;
        const KEY_DOWN = 1 << 10;
        const KEY_UP = 1 << 11;
        const FLAGS_CHANGED = 1 << 12;
        const TOOLKIT_DEFINED = 1 << 13;
        const SYSTEM_DEFINED = 1 << 14;
        const APPLICATION_DEFINED = 1 << 15;
        const SCROLL_WHEEL = 1 << 22;
        const OTHER_MOUSE_DOWN = 1 << 25;
        const OTHER_MOUSE_UP = 1 << 26;
        const OTHER_MOUSE_DRAGGED = 1 << 27;

        const ANY_MOUSE_DOWN = Self::LEFT_MOUSE_DOWN.bits()
            | Self::RIGHT_MOUSE_DOWN.bits()
            | Self::OTHER_MOUSE_DOWN.bits();
        const ANY_MOUSE_UP = Self::LEFT_MOUSE_UP.bits()
            | Self::RIGHT_MOUSE_UP.bits()
            | Self::OTHER_MOUSE_UP.bits();
        const ANY_MOUSE_DRAGGED = Self::LEFT_MOUSE_DRAGGED.bits()
            | Self::RIGHT_MOUSE_DRAGGED.bits()
            | Self::OTHER_MOUSE_DRAGGED.bits();
        const ANY_MOUSE = Self::ANY_MOUSE_DOWN.bits()
            | Self::ANY_MOUSE_UP.bits()
            | Self::ANY_MOUSE_DRAGGED.bits()
            | Self::MOUSE_MOVED.bits()
            | Self::MOUSE_ENTERED.bits()
            | Self::MOUSE_EXITED.bits()
            | Self::SCROLL_WHEEL.bits();
        const ANY_KEYBOARD = Self::KEY_DOWN.bits()
            | Self::KEY_UP.bits()
            | Self::FLAGS_CHANGED.bits();
        const ANY = !0;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ModifierFlags: u32 {
        const CAPS_LOCK = 1 << 16;
        const SHIFT = 1 << 17;
        const CONTROL = 1 << 18;
        const OPTION = 1 << 19;
        const COMMAND = 1 << 20;
        const NUMERIC_PAD = 1 << 21;
        const HELP = 1 << 22;
        const FUNCTION = 1 << 23;

        const DEVICE_INDEPENDENT = Self::CAPS_LOCK.bits()
            | Self::SHIFT.bits()
            | Self::CONTROL.bits()
            | Self::OPTION.bits()
            | Self::COMMAND.bits()
            | Self::NUMERIC_PAD.bits()
            | Self::HELP.bits()
            | Self::FUNCTION.bits();
    }
}

impl ModifierFlags {
    /// Map a core protocol key-button state mask (Shift, Lock, Control,
    /// Mod1, Mod2, Mod4) onto toolkit modifiers.
    pub fn from_x11_state(state: u32) -> Self {
        let mut flags = Self::empty();
        if state & 0x01 != 0 {
            flags |= Self::SHIFT;
        }
        if state & 0x02 != 0 {
            flags |= Self::CAPS_LOCK;
        }
        if state & 0x04 != 0 {
            flags |= Self::CONTROL;
        }
        if state & 0x08 != 0 {
            flags |= Self::OPTION;
        }
        if state & 0x10 != 0 {
            flags |= Self::NUMERIC_PAD;
        }
        if state & 0x40 != 0 {
            flags |= Self::COMMAND;
        }
        flags
    }
}

/// Sub-classification of toolkit-defined events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSubtype {
    None,
    WindowMapped,
    WindowUnmapped,
    WindowExposed,
    ConfigurationChanged,
    WindowDeleteRequest,
    WindowSyncRequest,
    Message,
    /// Placeholder for a server event that could not be translated.
    IgnoredDisplayServerEvent,
    /// Synthesized when the application is no longer running.
    Terminate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub(crate) event_type: EventType,
    pub(crate) subtype: EventSubtype,
    pub(crate) window_number: Option<WindowNumber>,
    pub(crate) timestamp: Duration,
    pub(crate) location_in_window: Point,
    pub(crate) modifier_flags: ModifierFlags,
    pub(crate) button_number: u32,
    pub(crate) click_count: u32,
    pub(crate) delta_x: f64,
    pub(crate) delta_y: f64,
    pub(crate) scrolling_delta_x: f64,
    pub(crate) scrolling_delta_y: f64,
    pub(crate) key_code: u32,
    pub(crate) characters: Option<String>,
    pub(crate) is_repeat: bool,
    pub(crate) sync_counter: i64,
}

impl Event {
    fn blank(event_type: EventType) -> Self {
        Self {
            event_type,
            subtype: EventSubtype::None,
            window_number: None,
            timestamp: Duration::ZERO,
            location_in_window: Point::new(f64::NAN, f64::NAN),
            modifier_flags: ModifierFlags::empty(),
            button_number: 0,
            click_count: 0,
            delta_x: 0.0,
            delta_y: 0.0,
            scrolling_delta_x: 0.0,
            scrolling_delta_y: 0.0,
            key_code: 0,
            characters: None,
            is_repeat: false,
            sync_counter: 0,
        }
    }

    /// Pointer event. Rejects types that carry no pointer location.
    pub fn mouse(
        event_type: EventType,
        location_in_window: Point,
        modifier_flags: ModifierFlags,
        window_number: WindowNumber,
        timestamp: Duration,
    ) -> Result<Self, TranslateError> {
        if !event_type.is_mouse() {
            return Err(TranslateError::EventNotSupported(format!(
                "{event_type:?} is not a mouse event type"
            )));
        }
        let mut event = Self::blank(event_type);
        event.location_in_window = location_in_window;
        event.modifier_flags = modifier_flags;
        event.window_number = Some(window_number);
        event.timestamp = timestamp;
        Ok(event)
    }

    pub fn keyboard(
        event_type: EventType,
        key_code: u32,
        characters: Option<String>,
        is_repeat: bool,
        modifier_flags: ModifierFlags,
        window_number: WindowNumber,
        timestamp: Duration,
    ) -> Result<Self, TranslateError> {
        if !event_type.is_keyboard() {
            return Err(TranslateError::EventNotSupported(format!(
                "{event_type:?} is not a keyboard event type"
            )));
        }
        let mut event = Self::blank(event_type);
        event.key_code = key_code;
        event.characters = characters;
        event.is_repeat = is_repeat;
        event.modifier_flags = modifier_flags;
        event.window_number = Some(window_number);
        event.timestamp = timestamp;
        Ok(event)
    }

    pub fn toolkit(subtype: EventSubtype, window_number: Option<WindowNumber>) -> Self {
        let mut event = Self::blank(EventType::ToolkitDefined);
        event.subtype = subtype;
        event.window_number = window_number;
        event
    }

    pub fn ignored() -> Self {
        Self::toolkit(EventSubtype::IgnoredDisplayServerEvent, None)
    }

    pub fn terminate() -> Self {
        Self::toolkit(EventSubtype::Terminate, None)
    }

    pub fn with_button_number(mut self, button_number: u32) -> Self {
        self.button_number = button_number;
        self
    }

    pub fn with_scrolling_delta(mut self, dx: f64, dy: f64) -> Self {
        self.scrolling_delta_x = dx;
        self.scrolling_delta_y = dy;
        self
    }

    pub fn with_delta(mut self, dx: f64, dy: f64) -> Self {
        self.delta_x = dx;
        self.delta_y = dy;
        self
    }

    pub fn with_sync_counter(mut self, counter: i64) -> Self {
        self.sync_counter = counter;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn subtype(&self) -> EventSubtype {
        self.subtype
    }

    pub fn window_number(&self) -> Option<WindowNumber> {
        self.window_number
    }

    /// Time since application start.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Logical pixels, top-left origin. NaN for non-pointer events.
    pub fn location_in_window(&self) -> Point {
        self.location_in_window
    }

    pub fn modifier_flags(&self) -> ModifierFlags {
        self.modifier_flags
    }

    pub fn button_number(&self) -> u32 {
        self.button_number
    }

    pub fn click_count(&self) -> u32 {
        self.click_count
    }

    /// For configuration changes: the new logical size.
    pub fn delta_x(&self) -> f64 {
        self.delta_x
    }

    pub fn delta_y(&self) -> f64 {
        self.delta_y
    }

    pub fn scrolling_delta_x(&self) -> f64 {
        self.scrolling_delta_x
    }

    pub fn scrolling_delta_y(&self) -> f64 {
        self.scrolling_delta_y
    }

    pub fn key_code(&self) -> u32 {
        self.key_code
    }

    pub fn characters(&self) -> Option<&str> {
        self.characters.as_deref()
    }

    pub fn is_repeat(&self) -> bool {
        self.is_repeat
    }

    pub fn sync_counter(&self) -> i64 {
        self.sync_counter
    }

    pub fn matches(&self, mask: EventTypeMask) -> bool {
        mask.contains(self.event_type.mask())
    }

    pub fn is_ignored(&self) -> bool {
        self.event_type == EventType::ToolkitDefined
            && self.subtype == EventSubtype::IgnoredDisplayServerEvent
    }

    pub fn is_terminate(&self) -> bool {
        self.event_type == EventType::ToolkitDefined && self.subtype == EventSubtype::Terminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bit_matches_type_value() {
        assert_eq!(EventType::LeftMouseDown.mask(), EventTypeMask::LEFT_MOUSE_DOWN);
        assert_eq!(EventType::ScrollWheel.mask().bits(), 1 << 22);
        assert_eq!(EventType::OtherMouseDragged.mask().bits(), 1 << 27);
    }

    #[test]
    fn test_type_classification() {
        assert!(EventType::RightMouseDown.is_mouse_down());
        assert!(!EventType::ScrollWheel.is_mouse_down());
        assert!(EventType::ScrollWheel.is_mouse());
        assert!(EventType::FlagsChanged.is_keyboard());
        assert!(!EventType::ToolkitDefined.is_mouse());
    }

    #[test]
    fn test_mouse_constructor_rejects_keyboard_type() {
        let result = Event::mouse(
            EventType::KeyDown,
            Point::origin(),
            ModifierFlags::empty(),
            WindowNumber(0),
            Duration::ZERO,
        );
        assert!(matches!(result, Err(TranslateError::EventNotSupported(_))));
    }

    #[test]
    fn test_mouse_events_carry_no_click_count() {
        for event_type in [EventType::LeftMouseDown, EventType::RightMouseUp, EventType::MouseMoved] {
            let event = Event::mouse(
                event_type,
                Point::new(4.0, 2.0),
                ModifierFlags::empty(),
                WindowNumber(0),
                Duration::ZERO,
            )
            .unwrap();
            assert_eq!(event.click_count(), 0);
        }
    }

    #[test]
    fn test_toolkit_events_have_nan_location() {
        let event = Event::toolkit(EventSubtype::WindowExposed, Some(WindowNumber(3)));
        assert!(event.location_in_window().x.is_nan());
        assert!(event.matches(EventTypeMask::TOOLKIT_DEFINED));
        assert!(!event.is_ignored());
        assert!(Event::ignored().is_ignored());
        assert!(Event::terminate().is_terminate());
    }

    #[test]
    fn test_modifiers_from_core_state() {
        let flags = ModifierFlags::from_x11_state(0x01 | 0x04 | 0x40);
        assert_eq!(
            flags,
            ModifierFlags::SHIFT | ModifierFlags::CONTROL | ModifierFlags::COMMAND
        );
    }
}
