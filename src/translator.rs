//! Raw server event to portable event translation
//!
//! One [`RawEvent`] in, one [`Event`] out. The translator owns the state that
//! spans events: which button started the current drag and which modifier
//! keys are down.

use std::time::Duration;

use tracing::{debug, trace};
use x11rb::protocol::xinput;

use crate::error::TranslateError;
use crate::event::{Event, EventSubtype, EventType, ModifierFlags, WindowNumber};
use crate::geometry::Point;
use crate::input::{
    keysym, keysym_to_char, ButtonTrackingState, Keymap, ModifierKey, ModifierState, MouseButton,
};
use crate::raw::{CoreEvent, GenericEventCookie, RawEvent};
use crate::registry::WindowRegistry;
use crate::xi2::{fp1616_to_f64, Xi2Event};

const SCROLL_STEP: f64 = 0.1;

/// Protocol atoms needed to decode client messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolAtoms {
    pub delete_window: u32,
    pub sync_request: u32,
}

/// Connection-owned lookups the translator reads while decoding.
pub struct TranslationContext<'a> {
    pub windows: &'a WindowRegistry,
    pub scale: f64,
    pub xinput_opcode: u8,
    pub atoms: ProtocolAtoms,
    pub keymap: Option<&'a Keymap>,
}

impl TranslationContext<'_> {
    fn resolve(&self, native: u32) -> Result<WindowNumber, TranslateError> {
        self.windows
            .lookup(native)
            .map(|w| w.number)
            .ok_or(TranslateError::ForeignWindow(native))
    }

    fn logical(&self, x: f64, y: f64) -> Point {
        Point::new(x / self.scale, y / self.scale)
    }
}

#[derive(Debug, Default)]
pub struct EventTranslator {
    buttons: ButtonTrackingState,
    modifiers: ModifierState,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_button(&self) -> MouseButton {
        self.buttons.pressed()
    }

    pub fn modifier_flags(&self) -> ModifierFlags {
        self.modifiers.flags()
    }

    /// Translate and update button tracking. `timestamp` is the time since
    /// application start at which the event was read.
    pub fn translate(
        &mut self,
        raw: &RawEvent,
        cx: &TranslationContext<'_>,
        timestamp: Duration,
    ) -> Result<Event, TranslateError> {
        let mut event = match raw {
            RawEvent::Generic(cookie) if cookie.extension() == cx.xinput_opcode => {
                self.translate_cookie(cookie, cx)?
            }
            RawEvent::Generic(cookie) => {
                return Err(TranslateError::EventNotSupported(format!(
                    "generic event from extension opcode {}",
                    cookie.extension()
                )))
            }
            RawEvent::Core(core) => self.translate_core(core, cx)?,
        };
        event.timestamp = timestamp;
        self.buttons.track(&event);
        Ok(event)
    }

    /// Like [`translate`](Self::translate), substituting an ignored event for
    /// anything that cannot be translated.
    pub fn translate_or_ignore(
        &mut self,
        raw: &RawEvent,
        cx: &TranslationContext<'_>,
        timestamp: Duration,
    ) -> Event {
        match self.translate(raw, cx, timestamp) {
            Ok(event) => event,
            Err(err) => {
                debug!(%err, "display server event ignored");
                Event::ignored().with_timestamp(timestamp)
            }
        }
    }

    /// Stop injecting a held button into motion if it went down in
    /// `window`. Its release will never reach us once the window is gone.
    pub fn forget_window(&mut self, window: WindowNumber) {
        self.buttons.forget_window(window);
    }

    fn translate_cookie(
        &mut self,
        cookie: &GenericEventCookie,
        cx: &TranslationContext<'_>,
    ) -> Result<Event, TranslateError> {
        let mut decoded = cookie.fetch_data()?;
        if let Xi2Event::Pointer(motion) = &mut decoded {
            // XI2 motion carries no button; drags need the one being held
            if motion.event_type == xinput::MOTION_EVENT {
                motion.detail = self.buttons.pressed().wire_detail();
            }
        }

        match decoded {
            Xi2Event::Key(key) => self.translate_key_event(&key, cx),
            Xi2Event::Pointer(pointer) => self.translate_pointer_event(&pointer, cx),
            Xi2Event::Crossing(crossing) => self.translate_crossing_event(&crossing, cx),
            Xi2Event::Other(evtype) => Err(TranslateError::EventNotSupported(format!(
                "XInput2 event type {evtype}"
            ))),
        }
    }

    fn translate_pointer_event(
        &mut self,
        pointer: &xinput::ButtonPressEvent,
        cx: &TranslationContext<'_>,
    ) -> Result<Event, TranslateError> {
        let button = MouseButton::from_wire(pointer.detail);
        let event_type = match pointer.event_type {
            xinput::BUTTON_PRESS_EVENT => button.down_event_type(),
            xinput::BUTTON_RELEASE_EVENT => button.up_event_type(),
            _ => button.move_event_type(),
        };
        if event_type == EventType::None {
            return Err(TranslateError::EventNotSupported(format!(
                "XInput2 event type {} with detail {}",
                pointer.event_type, pointer.detail
            )));
        }

        let registered = cx
            .windows
            .lookup(pointer.event)
            .ok_or(TranslateError::ForeignWindow(pointer.event))?;

        if event_type == EventType::MouseMoved && !registered.accepts_mouse_moved_events {
            return Err(TranslateError::EventIgnored(
                "window does not accept mouse moved events",
            ));
        }

        let flags = self.modifiers.flags();
        let location = cx.logical(fp1616_to_f64(pointer.event_x), fp1616_to_f64(pointer.event_y));
        let mut event = Event::mouse(event_type, location, flags, registered.number, Duration::ZERO)?
            .with_button_number(button.number());

        if button.is_scroll() {
            let step = if button == MouseButton::ScrollUp {
                -SCROLL_STEP
            } else {
                SCROLL_STEP
            };
            event = if flags.contains(ModifierFlags::SHIFT) {
                event.with_scrolling_delta(step, 0.0)
            } else {
                event.with_scrolling_delta(0.0, step)
            };
        }

        trace!(?event_type, window = pointer.event, x = location.x, y = location.y, "pointer event");
        Ok(event)
    }

    fn translate_key_event(
        &mut self,
        key: &xinput::KeyPressEvent,
        cx: &TranslationContext<'_>,
    ) -> Result<Event, TranslateError> {
        let window = cx.resolve(key.event)?;
        let pressed = key.event_type == xinput::KEY_PRESS_EVENT;
        let event_type = if pressed { EventType::KeyDown } else { EventType::KeyUp };
        let key_code = key.detail;
        let is_repeat = key.flags.contains(xinput::KeyEventFlags::KEY_REPEAT);

        let Some(keymap) = cx.keymap else {
            // no keyboard map: key codes only, no text
            return Event::keyboard(
                event_type,
                key_code,
                None,
                is_repeat,
                self.modifiers.flags(),
                window,
                Duration::ZERO,
            );
        };

        let sym = keymap.keysym(key_code, 0);
        if sym == keysym::NO_SYMBOL {
            return Err(TranslateError::EventIgnored("keyboard event without key symbol"));
        }

        if let Some(modifier) = ModifierKey::from_keysym(sym) {
            let flags = self.modifiers.apply(modifier, pressed);
            return Event::keyboard(
                EventType::FlagsChanged,
                key_code,
                None,
                false,
                flags,
                window,
                Duration::ZERO,
            );
        }

        let flags = self.modifiers.flags();
        let shifted = flags.contains(ModifierFlags::SHIFT) ^ flags.contains(ModifierFlags::CAPS_LOCK);
        let text_sym = keymap.keysym(key_code, usize::from(shifted));
        let characters = keysym_to_char(text_sym).map(String::from);

        Event::keyboard(event_type, key_code, characters, is_repeat, flags, window, Duration::ZERO)
    }

    fn translate_crossing_event(
        &mut self,
        crossing: &xinput::EnterEvent,
        cx: &TranslationContext<'_>,
    ) -> Result<Event, TranslateError> {
        let event_type = match crossing.event_type {
            xinput::ENTER_EVENT => EventType::MouseEntered,
            xinput::LEAVE_EVENT => EventType::MouseExited,
            other => {
                return Err(TranslateError::EventNotSupported(format!(
                    "XInput2 event type {other}"
                )))
            }
        };
        let window = cx.resolve(crossing.event)?;

        // keys may have changed while the pointer was elsewhere
        self.modifiers
            .resync(ModifierFlags::from_x11_state(crossing.mods.effective));

        let location = cx.logical(fp1616_to_f64(crossing.event_x), fp1616_to_f64(crossing.event_y));
        Event::mouse(event_type, location, self.modifiers.flags(), window, Duration::ZERO)
    }

    fn translate_core(
        &mut self,
        core: &CoreEvent,
        cx: &TranslationContext<'_>,
    ) -> Result<Event, TranslateError> {
        let native = core.window().ok_or_else(|| {
            TranslateError::EventNotSupported(format!("window-less core event {core:?}"))
        })?;
        let window = cx.resolve(native)?;

        let event = match *core {
            CoreEvent::Map { .. } => Event::toolkit(EventSubtype::WindowMapped, Some(window)),
            CoreEvent::Unmap { .. } => Event::toolkit(EventSubtype::WindowUnmapped, Some(window)),
            CoreEvent::Expose { .. } => Event::toolkit(EventSubtype::WindowExposed, Some(window)),
            CoreEvent::Configure { width, height, .. } => {
                Event::toolkit(EventSubtype::ConfigurationChanged, Some(window))
                    .with_delta(width as f64 / cx.scale, height as f64 / cx.scale)
            }
            CoreEvent::ClientMessage { data, .. } => {
                let protocol = data[0];
                if protocol == 0 {
                    Event::toolkit(EventSubtype::Message, Some(window))
                } else if protocol == cx.atoms.delete_window {
                    Event::toolkit(EventSubtype::WindowDeleteRequest, Some(window))
                } else if protocol == cx.atoms.sync_request {
                    let counter = ((data[3] as i32 as i64) << 32) | data[2] as i64;
                    Event::toolkit(EventSubtype::WindowSyncRequest, Some(window))
                        .with_sync_counter(counter)
                } else {
                    Event::toolkit(EventSubtype::Message, Some(window))
                }
            }
            CoreEvent::MappingNotify { .. } | CoreEvent::Other { .. } => {
                return Err(TranslateError::EventNotSupported(format!("core event {core:?}")))
            }
        };
        Ok(event)
    }
}
