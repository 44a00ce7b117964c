//! Input state - pointer buttons, modifier keys and the keyboard map

use crate::event::{Event, EventType, ModifierFlags, WindowNumber};

/// Pointer button in toolkit numbering (left=1, right=2, middle=3).
///
/// The server numbers middle as 2 and right as 3; [`MouseButton::from_wire`]
/// and [`MouseButton::wire_detail`] convert between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseButton {
    #[default]
    None,
    Left,
    Right,
    Middle,
    ScrollUp,
    ScrollDown,
    Other(u32),
}

impl MouseButton {
    pub fn from_wire(detail: u32) -> Self {
        match detail {
            0 => Self::None,
            1 => Self::Left,
            2 => Self::Middle,
            3 => Self::Right,
            4 => Self::ScrollUp,
            5 => Self::ScrollDown,
            n => Self::Other(n),
        }
    }

    pub fn wire_detail(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Left => 1,
            Self::Middle => 2,
            Self::Right => 3,
            Self::ScrollUp => 4,
            Self::ScrollDown => 5,
            Self::Other(n) => n,
        }
    }

    pub fn from_number(number: u32) -> Self {
        match number {
            0 => Self::None,
            1 => Self::Left,
            2 => Self::Right,
            3 => Self::Middle,
            4 => Self::ScrollUp,
            5 => Self::ScrollDown,
            n => Self::Other(n),
        }
    }

    /// Toolkit button number carried by events.
    pub fn number(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Left => 1,
            Self::Right => 2,
            Self::Middle => 3,
            Self::ScrollUp => 4,
            Self::ScrollDown => 5,
            Self::Other(n) => n,
        }
    }

    pub fn is_scroll(self) -> bool {
        matches!(self, Self::ScrollUp | Self::ScrollDown)
    }

    pub fn down_event_type(self) -> EventType {
        match self {
            Self::None => EventType::None,
            Self::Left => EventType::LeftMouseDown,
            Self::Right => EventType::RightMouseDown,
            Self::ScrollUp | Self::ScrollDown => EventType::ScrollWheel,
            Self::Middle | Self::Other(_) => EventType::OtherMouseDown,
        }
    }

    pub fn up_event_type(self) -> EventType {
        match self {
            Self::None | Self::ScrollUp | Self::ScrollDown => EventType::None,
            Self::Left => EventType::LeftMouseUp,
            Self::Right => EventType::RightMouseUp,
            Self::Middle | Self::Other(_) => EventType::OtherMouseUp,
        }
    }

    /// Motion while this button is held.
    pub fn move_event_type(self) -> EventType {
        match self {
            Self::None => EventType::MouseMoved,
            Self::Left => EventType::LeftMouseDragged,
            Self::Right => EventType::RightMouseDragged,
            _ => EventType::OtherMouseDragged,
        }
    }
}

/// The single button whose press started the current drag, and the window
/// it went down in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonTrackingState {
    pressed: MouseButton,
    window: Option<WindowNumber>,
}

impl ButtonTrackingState {
    pub fn pressed(&self) -> MouseButton {
        self.pressed
    }

    /// Update from a translated event. Only the first button down is
    /// tracked; only its own release clears it.
    pub fn track(&mut self, event: &Event) {
        let event_type = event.event_type();
        let button = MouseButton::from_number(event.button_number());
        if event_type.is_mouse_down() && self.pressed == MouseButton::None {
            self.pressed = button;
            self.window = event.window_number();
        } else if event_type.is_mouse_up() && self.pressed == button {
            self.reset();
        }
    }

    /// Drop the tracked button if it went down in `window`.
    pub fn forget_window(&mut self, window: WindowNumber) {
        if self.window == Some(window) {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.pressed = MouseButton::None;
        self.window = None;
    }
}

// modifier keysyms (X11/keysymdef.h)
pub mod keysym {
    pub const NO_SYMBOL: u32 = 0;
    pub const BACKSPACE: u32 = 0xff08;
    pub const TAB: u32 = 0xff09;
    pub const RETURN: u32 = 0xff0d;
    pub const ESCAPE: u32 = 0xff1b;
    pub const DELETE: u32 = 0xffff;
    pub const KP_ENTER: u32 = 0xff8d;
    pub const KP_MULTIPLY: u32 = 0xffaa;
    pub const KP_0: u32 = 0xffb0;
    pub const KP_9: u32 = 0xffb9;
    pub const MODE_SWITCH: u32 = 0xff7e;
    pub const ISO_LEVEL3_SHIFT: u32 = 0xfe03;
    pub const SHIFT_L: u32 = 0xffe1;
    pub const SHIFT_R: u32 = 0xffe2;
    pub const CONTROL_L: u32 = 0xffe3;
    pub const CONTROL_R: u32 = 0xffe4;
    pub const CAPS_LOCK: u32 = 0xffe5;
    pub const SHIFT_LOCK: u32 = 0xffe6;
    pub const META_L: u32 = 0xffe7;
    pub const META_R: u32 = 0xffe8;
    pub const ALT_L: u32 = 0xffe9;
    pub const ALT_R: u32 = 0xffea;
    pub const SUPER_L: u32 = 0xffeb;
    pub const SUPER_R: u32 = 0xffec;
    pub const HYPER_L: u32 = 0xffed;
    pub const HYPER_R: u32 = 0xffee;
}

/// Keys that change modifier state instead of producing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKey {
    Shift,
    Control,
    CapsLock,
    Alt,
    Meta,
    Super,
    Hyper,
    ModeSwitch,
    Level3Shift,
}

impl ModifierKey {
    pub fn from_keysym(sym: u32) -> Option<Self> {
        match sym {
            keysym::SHIFT_L | keysym::SHIFT_R | keysym::SHIFT_LOCK => Some(Self::Shift),
            keysym::CONTROL_L | keysym::CONTROL_R => Some(Self::Control),
            keysym::CAPS_LOCK => Some(Self::CapsLock),
            keysym::ALT_L | keysym::ALT_R => Some(Self::Alt),
            keysym::META_L | keysym::META_R => Some(Self::Meta),
            keysym::SUPER_L | keysym::SUPER_R => Some(Self::Super),
            keysym::HYPER_L | keysym::HYPER_R => Some(Self::Hyper),
            keysym::MODE_SWITCH => Some(Self::ModeSwitch),
            keysym::ISO_LEVEL3_SHIFT => Some(Self::Level3Shift),
            _ => None,
        }
    }

    pub fn flags(self) -> ModifierFlags {
        match self {
            Self::Shift => ModifierFlags::SHIFT,
            Self::Control => ModifierFlags::CONTROL,
            Self::CapsLock => ModifierFlags::CAPS_LOCK,
            Self::Alt | Self::ModeSwitch | Self::Level3Shift => ModifierFlags::OPTION,
            Self::Super => ModifierFlags::COMMAND,
            Self::Meta | Self::Hyper => ModifierFlags::empty(),
        }
    }
}

/// Modifier flags accumulated from key transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    flags: ModifierFlags,
}

impl ModifierState {
    pub fn flags(&self) -> ModifierFlags {
        self.flags
    }

    /// Caps lock toggles on press and ignores release; the other modifiers
    /// are held while pressed.
    pub fn apply(&mut self, key: ModifierKey, pressed: bool) -> ModifierFlags {
        let flags = key.flags();
        match (key, pressed) {
            (ModifierKey::CapsLock, true) => self.flags.toggle(flags),
            (ModifierKey::CapsLock, false) => {}
            (_, true) => self.flags.insert(flags),
            (_, false) => self.flags.remove(flags),
        }
        self.flags
    }

    /// Replace with the server's view, e.g. after keys changed while the
    /// pointer was outside our windows.
    pub fn resync(&mut self, flags: ModifierFlags) {
        self.flags = flags;
    }
}

/// Keycode to keysym table as returned by GetKeyboardMapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keymap {
    min_keycode: u8,
    keysyms_per_keycode: u8,
    keysyms: Vec<u32>,
}

impl Keymap {
    pub fn new(min_keycode: u8, keysyms_per_keycode: u8, keysyms: Vec<u32>) -> Self {
        Self {
            min_keycode,
            keysyms_per_keycode,
            keysyms,
        }
    }

    /// Keysym at shift `level` (0 unshifted, 1 shifted). Falls back to the
    /// unshifted symbol when the shifted column is empty.
    pub fn keysym(&self, keycode: u32, level: usize) -> u32 {
        let per = self.keysyms_per_keycode as usize;
        if per == 0 || keycode < self.min_keycode as u32 {
            return keysym::NO_SYMBOL;
        }
        let base = (keycode - self.min_keycode as u32) as usize * per;
        let Some(column) = self.keysyms.get(base..base + per) else {
            return keysym::NO_SYMBOL;
        };
        let shifted = column.get(level).copied().unwrap_or(keysym::NO_SYMBOL);
        if shifted != keysym::NO_SYMBOL {
            return shifted;
        }
        let unshifted = column[0];
        // single-case letters only list the lowercase form
        if level == 1 {
            if let Some(upper) = char::from_u32(unshifted)
                .filter(char::is_ascii_lowercase)
                .map(|c| c.to_ascii_uppercase())
            {
                return upper as u32;
            }
        }
        unshifted
    }
}

/// Text produced by a keysym, if any.
pub fn keysym_to_char(sym: u32) -> Option<char> {
    match sym {
        0x20..=0x7e | 0xa0..=0xff => char::from_u32(sym),
        0x0100_0000..=0x0110_ffff => char::from_u32(sym - 0x0100_0000),
        keysym::BACKSPACE => Some('\u{8}'),
        keysym::TAB => Some('\t'),
        keysym::RETURN | keysym::KP_ENTER => Some('\r'),
        keysym::ESCAPE => Some('\u{1b}'),
        keysym::DELETE => Some('\u{7f}'),
        keysym::KP_MULTIPLY => Some('*'),
        keysym::KP_0..=keysym::KP_9 => char::from_digit(sym - keysym::KP_0, 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use std::time::Duration;

    fn button_event(event_type: EventType, button: MouseButton) -> Event {
        Event::mouse(
            event_type,
            Point::new(1.0, 1.0),
            ModifierFlags::empty(),
            WindowNumber(0),
            Duration::ZERO,
        )
        .unwrap()
        .with_button_number(button.number())
    }

    #[test]
    fn test_wire_and_toolkit_numbering() {
        assert_eq!(MouseButton::from_wire(2), MouseButton::Middle);
        assert_eq!(MouseButton::from_wire(3), MouseButton::Right);
        assert_eq!(MouseButton::Right.number(), 2);
        assert_eq!(MouseButton::Middle.number(), 3);
        for detail in 0..10 {
            assert_eq!(MouseButton::from_wire(detail).wire_detail(), detail);
        }
    }

    #[test]
    fn test_button_event_types() {
        assert_eq!(MouseButton::Middle.down_event_type(), EventType::OtherMouseDown);
        assert_eq!(MouseButton::ScrollDown.down_event_type(), EventType::ScrollWheel);
        assert_eq!(MouseButton::ScrollUp.up_event_type(), EventType::None);
        assert_eq!(MouseButton::None.move_event_type(), EventType::MouseMoved);
        assert_eq!(MouseButton::Other(8).move_event_type(), EventType::OtherMouseDragged);
    }

    #[test]
    fn test_tracking_first_button_wins() {
        let mut state = ButtonTrackingState::default();
        state.track(&button_event(EventType::LeftMouseDown, MouseButton::Left));
        state.track(&button_event(EventType::RightMouseDown, MouseButton::Right));
        assert_eq!(state.pressed(), MouseButton::Left);

        // releasing another button does not clear tracking
        state.track(&button_event(EventType::RightMouseUp, MouseButton::Right));
        assert_eq!(state.pressed(), MouseButton::Left);

        state.track(&button_event(EventType::LeftMouseUp, MouseButton::Left));
        assert_eq!(state.pressed(), MouseButton::None);
    }

    #[test]
    fn test_forget_window_only_clears_its_own_press() {
        let mut state = ButtonTrackingState::default();
        state.track(&button_event(EventType::LeftMouseDown, MouseButton::Left));
        state.forget_window(WindowNumber(1));
        assert_eq!(state.pressed(), MouseButton::Left);
        state.forget_window(WindowNumber(0));
        assert_eq!(state.pressed(), MouseButton::None);

        // a new press after the window went away is tracked again
        state.track(&button_event(EventType::RightMouseDown, MouseButton::Right));
        assert_eq!(state.pressed(), MouseButton::Right);
    }

    #[test]
    fn test_scroll_does_not_track() {
        let mut state = ButtonTrackingState::default();
        state.track(&button_event(EventType::ScrollWheel, MouseButton::ScrollUp));
        assert_eq!(state.pressed(), MouseButton::None);
    }

    #[test]
    fn test_modifier_press_release() {
        let mut state = ModifierState::default();
        state.apply(ModifierKey::Shift, true);
        state.apply(ModifierKey::Control, true);
        assert_eq!(state.flags(), ModifierFlags::SHIFT | ModifierFlags::CONTROL);
        state.apply(ModifierKey::Shift, false);
        assert_eq!(state.flags(), ModifierFlags::CONTROL);
    }

    #[test]
    fn test_caps_lock_toggles_on_press() {
        let mut state = ModifierState::default();
        state.apply(ModifierKey::CapsLock, true);
        state.apply(ModifierKey::CapsLock, false);
        assert!(state.flags().contains(ModifierFlags::CAPS_LOCK));
        state.apply(ModifierKey::CapsLock, true);
        assert!(!state.flags().contains(ModifierFlags::CAPS_LOCK));
    }

    #[test]
    fn test_modifier_keysyms() {
        assert_eq!(ModifierKey::from_keysym(keysym::SHIFT_R), Some(ModifierKey::Shift));
        assert_eq!(ModifierKey::from_keysym(keysym::SUPER_L), Some(ModifierKey::Super));
        assert_eq!(ModifierKey::from_keysym('a' as u32), None);
        assert_eq!(ModifierKey::Super.flags(), ModifierFlags::COMMAND);
    }

    #[test]
    fn test_keymap_lookup() {
        // keycode 38 -> a/A, keycode 39 -> s (no shifted column)
        let keymap = Keymap::new(38, 2, vec!['a' as u32, 'A' as u32, 's' as u32, 0]);
        assert_eq!(keymap.keysym(38, 0), 'a' as u32);
        assert_eq!(keymap.keysym(38, 1), 'A' as u32);
        assert_eq!(keymap.keysym(39, 1), 'S' as u32);
        assert_eq!(keymap.keysym(40, 0), keysym::NO_SYMBOL);
        assert_eq!(keymap.keysym(8, 0), keysym::NO_SYMBOL);
    }

    #[test]
    fn test_keysym_to_char() {
        assert_eq!(keysym_to_char('q' as u32), Some('q'));
        assert_eq!(keysym_to_char(0xe9), Some('é'));
        assert_eq!(keysym_to_char(0x0100_20ac), Some('€'));
        assert_eq!(keysym_to_char(keysym::RETURN), Some('\r'));
        assert_eq!(keysym_to_char(keysym::KP_0 + 7), Some('7'));
        assert_eq!(keysym_to_char(keysym::SHIFT_L), None);
    }
}
