//! Display server seam
//!
//! The application talks to the window system only through [`DisplayServer`].
//! [`crate::connection::Connection`] is the X11 implementation.

use std::time::Instant;

use crate::error::DisplayError;
use crate::event::WindowNumber;
use crate::geometry::Rect;
use crate::queue::EventQueue;
use crate::runloop::RunLoop;
use crate::translator::EventTranslator;

/// Handle to a server-side window.
///
/// Owned by the toolkit window that created it. Destroying goes through
/// [`DisplayServer::destroy_native_window`]; the root window is never
/// destroyed.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeWindow {
    pub id: u32,
    pub screen: usize,
    pub scale: f64,
    pub is_root: bool,
}

pub trait DisplayServer {
    /// Start signalling `run_loop` when server data is pending.
    fn attach(&mut self, run_loop: &RunLoop) -> Result<(), DisplayError>;

    /// Stop the readiness wait. Called before the connection goes away.
    fn detach(&mut self);

    /// Create and map a window for a logical `rect`.
    fn create_native_window(&mut self, rect: Rect, title: &str)
        -> Result<NativeWindow, DisplayError>;

    /// Forget the window's id mapping, then destroy it.
    fn destroy_native_window(&mut self, window: &NativeWindow) -> Result<(), DisplayError>;

    fn register_window(&mut self, window: &NativeWindow, number: WindowNumber);

    fn set_accepts_mouse_moved_events(&mut self, window: &NativeWindow, accepts: bool);

    /// Current logical frame, asked from the server every time.
    fn window_frame(&self, window: &NativeWindow) -> Result<Rect, DisplayError>;

    fn set_title(&mut self, window: &NativeWindow, title: &str) -> Result<(), DisplayError>;

    /// Translate every pending server event onto `queue`. Errors are
    /// session-fatal.
    fn service_events(
        &mut self,
        translator: &mut EventTranslator,
        queue: &mut EventQueue,
        start: Instant,
    ) -> Result<(), DisplayError>;
}
