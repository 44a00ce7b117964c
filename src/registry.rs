//! Native window id to toolkit window lookup

use std::collections::HashMap;

use crate::event::WindowNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredWindow {
    pub number: WindowNumber,
    pub accepts_mouse_moved_events: bool,
}

/// Windows created by this application, keyed by server window id.
///
/// Entries are removed before the native window is destroyed so late
/// events for it resolve to nothing.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: HashMap<u32, RegisteredWindow>,
}

impl WindowRegistry {
    pub fn insert(&mut self, native: u32, number: WindowNumber) {
        self.windows.insert(
            native,
            RegisteredWindow {
                number,
                accepts_mouse_moved_events: false,
            },
        );
    }

    pub fn remove(&mut self, native: u32) -> Option<WindowNumber> {
        self.windows.remove(&native).map(|w| w.number)
    }

    pub fn lookup(&self, native: u32) -> Option<RegisteredWindow> {
        self.windows.get(&native).copied()
    }

    pub fn set_accepts_mouse_moved_events(&mut self, native: u32, accepts: bool) {
        if let Some(window) = self.windows.get_mut(&native) {
            window.accepts_mouse_moved_events = accepts;
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
