//! x11kit - X11 event ingestion and dispatch for a desktop toolkit
//!
//! Server events are read on the main thread after a background polling
//! thread signals that the connection is readable. Each one is translated
//! into a portable [`Event`], queued, and delivered through a per-window
//! responder chain.
//!
//! ```text
//! Connection ──fd──▶ RawEventSource ──wake──▶ RunLoop
//!     │                                          │
//!     └── raw events ──▶ EventTranslator ──▶ EventQueue ──▶ Application::send
//!                                                              │
//!                                 Window ─▶ hit test / first responder chain
//! ```
//!
//! # Example
//!
//! ```no_run
//! use x11kit::{Application, ApplicationDelegate, DisplayConfig, Rect};
//!
//! struct Quit;
//!
//! impl ApplicationDelegate for Quit {
//!     fn did_finish_launching(&mut self, app: &mut Application) {
//!         let _ = app.create_window(Rect::new(0.0, 0.0, 320.0, 200.0), "hello");
//!     }
//!
//!     fn should_terminate_after_last_window_closed(&mut self, _app: &mut Application) -> bool {
//!         true
//!     }
//! }
//!
//! let mut app = Application::connect(&DisplayConfig::from_env())?;
//! app.set_delegate(Box::new(Quit));
//! app.run()?;
//! # Ok::<(), x11kit::ApplicationError>(())
//! ```

pub mod application;
pub mod atom;
pub mod config;
pub mod connection;
pub mod control;
pub mod controller;
pub mod display;
pub mod error;
pub mod event;
pub mod geometry;
pub mod input;
pub mod queue;
pub mod raw;
pub mod registry;
pub mod responder;
pub mod runloop;
pub mod source;
pub mod translator;
pub mod view;
pub mod window;
pub mod xi2;

pub use application::{Application, ApplicationDelegate, TerminateReply};
pub use config::DisplayConfig;
pub use connection::Connection;
pub use control::{Control, ControlEvent, ControlState};
pub use controller::ViewController;
pub use display::{DisplayServer, NativeWindow};
pub use error::{ApplicationError, DisplayError, TranslateError};
pub use event::{Event, EventSubtype, EventType, EventTypeMask, ModifierFlags, WindowNumber};
pub use geometry::{Point, Rect, Size, Transform};
pub use responder::{Dispatch, EventContext, PlainView, Responder, ResponderId};
pub use view::{ControllerId, ViewId, ViewTree};
pub use window::{Window, WindowDelegate};
