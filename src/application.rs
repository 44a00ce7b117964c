//! Application object and the dispatch loop
//!
//! One [`Application`] per process. It owns the display connection, the run
//! loop, the translator and the event queue, and drives them from a single
//! thread: `run` pulls events with [`Application::next_event`] and hands each
//! one to its window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::config::DisplayConfig;
use crate::connection::Connection;
use crate::display::DisplayServer;
use crate::error::{ApplicationError, DisplayError};
use crate::event::{Event, EventTypeMask, WindowNumber};
use crate::geometry::Rect;
use crate::queue::EventQueue;
use crate::runloop::{Fired, RunLoop, TimerId, WAKE_TOKEN};
use crate::translator::EventTranslator;
use crate::window::{Window, WindowResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReply {
    Now,
    Cancel,
    /// The delegate will call [`Application::reply_to_should_terminate`].
    Later,
}

/// Lifecycle hooks supplied by the host program.
///
/// The delegate is detached from the application while one of its hooks
/// runs, so re-entrant calls from a hook see no delegate.
#[allow(unused_variables)]
pub trait ApplicationDelegate {
    fn will_finish_launching(&mut self, app: &mut Application) {}

    fn did_finish_launching(&mut self, app: &mut Application) {}

    fn should_terminate_after_last_window_closed(&mut self, app: &mut Application) -> bool {
        false
    }

    fn should_terminate(&mut self, app: &mut Application) -> TerminateReply {
        TerminateReply::Now
    }

    fn will_terminate(&mut self, app: &mut Application) {}
}

type TimerCallback = Box<dyn FnMut(&mut Application)>;

pub struct Application {
    // dropped first: the polling thread has to stop before the loop goes away
    display: Box<dyn DisplayServer>,
    run_loop: RunLoop,
    translator: EventTranslator,
    queue: EventQueue,
    windows: Vec<Option<Window>>,
    delegate: Option<Box<dyn ApplicationDelegate>>,
    timers: HashMap<TimerId, TimerCallback>,
    is_running: bool,
    is_terminated: bool,
    did_launch: bool,
    start: Instant,
    current_event: Option<Event>,
}

impl Application {
    pub fn new(mut display: Box<dyn DisplayServer>) -> Result<Self, ApplicationError> {
        let run_loop = RunLoop::new().map_err(ApplicationError::RunLoop)?;
        display.attach(&run_loop)?;
        Ok(Self {
            display,
            run_loop,
            translator: EventTranslator::new(),
            queue: EventQueue::new(),
            windows: Vec::new(),
            delegate: None,
            timers: HashMap::new(),
            is_running: false,
            is_terminated: false,
            did_launch: false,
            start: Instant::now(),
            current_event: None,
        })
    }

    /// Open the X11 connection described by `config`.
    pub fn connect(config: &DisplayConfig) -> Result<Self, ApplicationError> {
        let connection = Connection::open(config)?;
        Self::new(Box::new(connection))
    }

    pub fn set_delegate(&mut self, delegate: Box<dyn ApplicationDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_terminated(&self) -> bool {
        self.is_terminated
    }

    /// The event being dispatched by [`send`](Self::send), if any.
    pub fn current_event(&self) -> Option<&Event> {
        self.current_event.as_ref()
    }

    pub fn display(&self) -> &dyn DisplayServer {
        self.display.as_ref()
    }

    /// Time since the application was created; event timestamps use the
    /// same origin.
    pub fn uptime(&self) -> Duration {
        self.start.elapsed()
    }

    fn with_delegate<T>(
        &mut self,
        default: T,
        f: impl FnOnce(&mut dyn ApplicationDelegate, &mut Self) -> T,
    ) -> T {
        let Some(mut delegate) = self.delegate.take() else {
            return default;
        };
        let result = f(delegate.as_mut(), self);
        if self.delegate.is_none() {
            self.delegate = Some(delegate);
        }
        result
    }

    /// Launch and dispatch events until stopped or terminated.
    ///
    /// # Panics
    ///
    /// Without a delegate.
    pub fn run(&mut self) -> Result<(), ApplicationError> {
        if self.delegate.is_none() {
            panic!("Application::run called without a delegate");
        }
        if self.is_terminated {
            return Err(ApplicationError::Terminated);
        }

        self.is_running = true;
        if !self.did_launch {
            self.did_launch = true;
            self.with_delegate((), |d, app| d.will_finish_launching(app));
            self.with_delegate((), |d, app| d.did_finish_launching(app));
        }
        info!(windows = self.window_count(), "application running");

        while self.is_running {
            let Some(event) = self.next_event(EventTypeMask::ANY, None, true) else {
                break;
            };
            // a posted terminate only ends this run; terminate() is what
            // rejects the next one
            if event.is_terminate() {
                break;
            }
            self.send(&event);
        }

        info!(terminated = self.is_terminated, "application loop finished");
        Ok(())
    }

    /// Leave the current `run` after the event in flight. `run` may be
    /// called again.
    pub fn stop(&mut self) {
        self.is_running = false;
    }

    /// Ask the delegate, then shut down for good unless it objects.
    pub fn terminate(&mut self) {
        let reply = self.with_delegate(TerminateReply::Now, |d, app| d.should_terminate(app));
        debug!(?reply, "termination requested");
        if reply == TerminateReply::Now {
            self.reply_to_should_terminate(true);
        }
    }

    pub fn reply_to_should_terminate(&mut self, should_terminate: bool) {
        if !should_terminate || self.is_terminated {
            return;
        }
        self.with_delegate((), |d, app| d.will_terminate(app));
        self.is_terminated = true;
        self.is_running = false;

        let numbers: Vec<WindowNumber> = self.windows().map(Window::number).collect();
        for number in numbers {
            if let Err(err) = self.close_window(number) {
                warn!(%err, window = number.0, "failed to close window during termination");
            }
        }
        info!("application terminated");
    }

    // server errors leave the protocol state unknown; no delegate veto
    fn abort_session(&mut self, err: DisplayError) {
        error!(%err, "display connection failed, terminating");
        self.reply_to_should_terminate(true);
    }

    pub fn post(&mut self, event: Event, at_front: bool) {
        self.queue.post(event, at_front);
    }

    /// Drop queued events older than `event`. Returns how many went.
    pub fn discard_events_before(&mut self, event: &Event) -> usize {
        let discarded = self.queue.discard_before(event);
        if discarded > 0 {
            trace!(discarded, "stale events discarded");
        }
        discarded
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Next queued event whose type is in `mask`, spinning the run loop
    /// until one arrives.
    ///
    /// Ignored placeholders are dropped on the way. Returns a terminate
    /// event once the application is no longer running, and `None` when
    /// `until` passes first.
    pub fn next_event(
        &mut self,
        mask: EventTypeMask,
        until: Option<Instant>,
        dequeue: bool,
    ) -> Option<Event> {
        loop {
            if !self.is_running {
                return Some(Event::terminate().with_timestamp(self.uptime()));
            }

            // timers and wakes that are already due
            self.spin(Some(Duration::ZERO));
            // replies may have pulled events into the client buffer without
            // the socket turning readable again
            self.service_display();
            if !self.is_running {
                continue;
            }

            if let Some(index) = self.queue.position(mask) {
                let ignored = self.queue.get(index).is_some_and(Event::is_ignored);
                let event = if dequeue || ignored {
                    self.queue.remove(index)
                } else {
                    self.queue.get(index).cloned()
                };
                if ignored {
                    continue;
                }
                return event;
            }

            let timeout = match until {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            self.spin(timeout);
        }
    }

    fn spin(&mut self, timeout: Option<Duration>) {
        let fired = match self.run_loop.run_once(timeout) {
            Ok(fired) => fired,
            Err(err) => {
                error!(%err, "run loop failed, terminating");
                self.reply_to_should_terminate(true);
                return;
            }
        };
        for source in fired {
            match source {
                Fired::Source(WAKE_TOKEN) => self.service_display(),
                Fired::Source(token) => trace!(?token, "unknown run loop source"),
                Fired::Timer(id) => self.fire_timer(id),
            }
        }
    }

    fn service_display(&mut self) {
        if self.is_terminated {
            return;
        }
        let result = self
            .display
            .service_events(&mut self.translator, &mut self.queue, self.start);
        if let Err(err) = result {
            self.abort_session(err);
        }
    }

    /// Deliver `event` to its window and act on the window's response.
    pub fn send(&mut self, event: &Event) {
        let previous = self.current_event.replace(event.clone());
        match event.window_number() {
            Some(number) => self.send_to_window(number, event),
            None => trace!(event_type = ?event.event_type(), "application event"),
        }
        self.current_event = previous;
    }

    fn send_to_window(&mut self, number: WindowNumber, event: &Event) {
        let Some(window) = self.window_mut(number) else {
            debug!(window = number.0, event_type = ?event.event_type(), "event for closed window dropped");
            return;
        };
        let WindowResponse {
            close,
            track,
            update_surface,
        } = window.send_event(event);

        if update_surface {
            self.update_window_surface(number);
        }
        if let Some(mask) = track {
            self.track_mouse(number, mask);
        }
        if close {
            if let Err(err) = self.close_window(number) {
                warn!(%err, window = number.0, "failed to close window");
            }
        }
    }

    fn update_window_surface(&mut self, number: WindowNumber) {
        let Some(native) = self.window(number).map(|w| w.native().clone()) else {
            return;
        };
        match self.display.window_frame(&native) {
            Ok(frame) => {
                if let Some(window) = self.window_mut(number) {
                    window.update_surface(frame);
                }
            }
            Err(err) => warn!(%err, window = number.0, "could not read window frame"),
        }
    }

    /// Nested loop after a mouse-down: only this button's drags and its up
    /// are dispatched until the up arrives.
    fn track_mouse(&mut self, number: WindowNumber, mask: EventTypeMask) {
        trace!(window = number.0, ?mask, "mouse tracking started");
        while self.window(number).is_some() {
            let Some(event) = self.next_event(mask, None, true) else {
                break;
            };
            if event.is_terminate() {
                break;
            }
            self.send(&event);
            if event.event_type().is_mouse_up() {
                self.discard_events_before(&event);
                break;
            }
        }
        trace!(window = number.0, "mouse tracking finished");
    }

    /// Create a native window for the logical `rect` and start routing its
    /// events.
    pub fn create_window(&mut self, rect: Rect, title: &str) -> Result<WindowNumber, DisplayError> {
        let native = self.display.create_native_window(rect, title)?;
        let number = WindowNumber(self.windows.len());
        self.display.register_window(&native, number);
        info!(window = number.0, native = native.id, title, "window created");
        self.windows.push(Some(Window::new(number, native, rect, title)));
        Ok(number)
    }

    /// Destroy a window. Closing the last one while running asks the
    /// delegate whether to terminate.
    pub fn close_window(&mut self, number: WindowNumber) -> Result<(), DisplayError> {
        let Some(window) = self.windows.get_mut(number.0).and_then(Option::take) else {
            return Ok(());
        };
        let result = self.display.destroy_native_window(window.native());
        drop(window);
        self.translator.forget_window(number);
        info!(window = number.0, "window closed");

        if self.window_count() == 0 && self.is_running && !self.is_terminated {
            let terminate = self.with_delegate(false, |d, app| {
                d.should_terminate_after_last_window_closed(app)
            });
            if terminate {
                self.terminate();
            }
        }
        result
    }

    pub fn window(&self, number: WindowNumber) -> Option<&Window> {
        self.windows.get(number.0).and_then(Option::as_ref)
    }

    pub fn window_mut(&mut self, number: WindowNumber) -> Option<&mut Window> {
        self.windows.get_mut(number.0).and_then(Option::as_mut)
    }

    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter().flatten()
    }

    pub fn window_count(&self) -> usize {
        self.windows().count()
    }

    pub fn set_accepts_mouse_moved_events(&mut self, number: WindowNumber, accepts: bool) {
        let Some(window) = self.windows.get_mut(number.0).and_then(Option::as_mut) else {
            return;
        };
        window.set_accepts_mouse_moved_events(accepts);
        self.display
            .set_accepts_mouse_moved_events(window.native(), accepts);
    }

    pub fn set_window_title(&mut self, number: WindowNumber, title: &str) -> Result<(), DisplayError> {
        let Some(window) = self.windows.get_mut(number.0).and_then(Option::as_mut) else {
            return Ok(());
        };
        self.display.set_title(window.native(), title)?;
        window.set_title(title);
        Ok(())
    }

    /// Run `callback` on the main thread every `interval` (or once).
    pub fn add_timer(
        &mut self,
        interval: Duration,
        repeats: bool,
        callback: impl FnMut(&mut Application) + 'static,
    ) -> TimerId {
        let id = self.run_loop.add_timer(interval, repeats);
        self.timers.insert(id, Box::new(callback));
        id
    }

    pub fn invalidate_timer(&mut self, id: TimerId) {
        self.run_loop.invalidate_timer(id);
        self.timers.remove(&id);
    }

    fn fire_timer(&mut self, id: TimerId) {
        let Some(mut callback) = self.timers.remove(&id) else {
            return;
        };
        callback(self);
        if self.run_loop.is_timer_valid(id) {
            self.timers.insert(id, callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{Control, ControlEvent};
    use crate::display::NativeWindow;
    use crate::event::{EventSubtype, EventType};
    use crate::raw::{CoreEvent, GenericEventCookie, RawEvent};
    use crate::registry::WindowRegistry;
    use crate::translator::{ProtocolAtoms, TranslationContext};
    use crate::responder::{Dispatch, EventContext, Responder};
    use crate::window::WindowDelegate;
    use crate::xi2::testing::device_event;
    use x11rb::protocol::xinput;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    const OPCODE: u8 = 131;
    const DELETE_WINDOW: u32 = 300;

    #[derive(Default)]
    struct Script {
        pending: VecDeque<RawEvent>,
        destroyed: Vec<u32>,
        fail: bool,
    }

    /// In-memory server: hands out window ids and replays scripted raw
    /// events through the real translator.
    struct ScriptedDisplay {
        windows: WindowRegistry,
        frames: HashMap<u32, Rect>,
        next_id: u32,
        script: Rc<RefCell<Script>>,
    }

    impl DisplayServer for ScriptedDisplay {
        fn attach(&mut self, _run_loop: &RunLoop) -> Result<(), DisplayError> {
            Ok(())
        }

        fn detach(&mut self) {}

        fn create_native_window(&mut self, rect: Rect, _title: &str) -> Result<NativeWindow, DisplayError> {
            let id = self.next_id;
            self.next_id += 1;
            self.frames.insert(id, rect);
            Ok(NativeWindow {
                id,
                screen: 0,
                scale: 1.0,
                is_root: false,
            })
        }

        fn destroy_native_window(&mut self, window: &NativeWindow) -> Result<(), DisplayError> {
            self.windows.remove(window.id);
            self.script.borrow_mut().destroyed.push(window.id);
            Ok(())
        }

        fn register_window(&mut self, window: &NativeWindow, number: WindowNumber) {
            self.windows.insert(window.id, number);
        }

        fn set_accepts_mouse_moved_events(&mut self, window: &NativeWindow, accepts: bool) {
            self.windows.set_accepts_mouse_moved_events(window.id, accepts);
        }

        fn window_frame(&self, window: &NativeWindow) -> Result<Rect, DisplayError> {
            Ok(self.frames.get(&window.id).copied().unwrap_or_default())
        }

        fn set_title(&mut self, _window: &NativeWindow, _title: &str) -> Result<(), DisplayError> {
            Ok(())
        }

        fn service_events(
            &mut self,
            translator: &mut EventTranslator,
            queue: &mut EventQueue,
            start: Instant,
        ) -> Result<(), DisplayError> {
            let mut script = self.script.borrow_mut();
            if script.fail {
                return Err(DisplayError::MissingExtension("XInputExtension".into()));
            }
            let cx = TranslationContext {
                windows: &self.windows,
                scale: 1.0,
                xinput_opcode: OPCODE,
                atoms: ProtocolAtoms {
                    delete_window: DELETE_WINDOW,
                    sync_request: 301,
                },
                keymap: None,
            };
            while let Some(raw) = script.pending.pop_front() {
                queue.post(translator.translate_or_ignore(&raw, &cx, start.elapsed()), false);
            }
            Ok(())
        }
    }

    fn app() -> (Application, Rc<RefCell<Script>>) {
        let script = Rc::new(RefCell::new(Script::default()));
        let display = ScriptedDisplay {
            windows: WindowRegistry::default(),
            frames: HashMap::new(),
            next_id: 0x600001,
            script: Rc::clone(&script),
        };
        (Application::new(Box::new(display)).unwrap(), script)
    }

    fn pointer(evtype: u16, window: u32, detail: u32, x: f64, y: f64) -> RawEvent {
        RawEvent::Generic(GenericEventCookie::from_wire(device_event(OPCODE, evtype, window, detail, x, y, 0)).unwrap())
    }

    fn key_press(window: u32, key_code: u32) -> RawEvent {
        let bytes = device_event(OPCODE, xinput::KEY_PRESS_EVENT, window, key_code, 0.0, 0.0, 0);
        RawEvent::Generic(GenericEventCookie::from_wire(bytes).unwrap())
    }

    /// Window-level responder counting the key downs it is handed.
    struct KeyCounter(Rc<Cell<u32>>);

    impl Responder for KeyCounter {
        fn key_down(&mut self, _cx: &mut EventContext<'_>, _event: &Event) -> Dispatch {
            self.0.set(self.0.get() + 1);
            Dispatch::Handled
        }
    }

    impl WindowDelegate for KeyCounter {}

    fn delete_request(window: u32) -> RawEvent {
        RawEvent::Core(CoreEvent::ClientMessage {
            window,
            message_type: 0,
            format: 32,
            data: [DELETE_WINDOW, 0, 0, 0, 0],
        })
    }

    #[derive(Default)]
    struct Recorder {
        launched: Rc<Cell<u32>>,
        will_terminate: Rc<Cell<u32>>,
        reply: Option<TerminateReply>,
        quit_after_last_window: bool,
        terminate_on_launch: bool,
    }

    impl ApplicationDelegate for Recorder {
        fn did_finish_launching(&mut self, app: &mut Application) {
            self.launched.set(self.launched.get() + 1);
            if self.terminate_on_launch {
                app.terminate();
            }
        }

        fn should_terminate_after_last_window_closed(&mut self, _app: &mut Application) -> bool {
            self.quit_after_last_window
        }

        fn should_terminate(&mut self, _app: &mut Application) -> TerminateReply {
            self.reply.unwrap_or(TerminateReply::Now)
        }

        fn will_terminate(&mut self, _app: &mut Application) {
            self.will_terminate.set(self.will_terminate.get() + 1);
        }
    }

    #[test]
    #[should_panic(expected = "without a delegate")]
    fn test_run_without_delegate_panics() {
        let (mut app, _) = app();
        let _ = app.run();
    }

    #[test]
    fn test_click_drag_and_close_last_window() {
        let (mut app, script) = app();
        let will_terminate = Rc::new(Cell::new(0));
        app.set_delegate(Box::new(Recorder {
            will_terminate: Rc::clone(&will_terminate),
            quit_after_last_window: true,
            ..Recorder::default()
        }));

        let number = app.create_window(Rect::new(0.0, 0.0, 200.0, 100.0), "test").unwrap();
        let native = app.window(number).unwrap().native().id;
        let actions = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&actions);
        let mut control = Control::new();
        control.add_action(ControlEvent::ALL, move |_, fired| sink.borrow_mut().push(fired));
        let window = app.window_mut(number).unwrap();
        let root = window.root_view();
        window.add_view(root, Rect::new(10.0, 10.0, 50.0, 20.0), Box::new(control));

        script.borrow_mut().pending.extend([
            RawEvent::Core(CoreEvent::Map { window: native }),
            RawEvent::Core(CoreEvent::Expose { window: native, count: 0 }),
            pointer(xinput::BUTTON_PRESS_EVENT, native, 1, 20.0, 15.0),
            pointer(xinput::MOTION_EVENT, native, 0, 25.0, 18.0),
            pointer(xinput::BUTTON_RELEASE_EVENT, native, 1, 25.0, 18.0),
            delete_request(native),
        ]);

        app.run().unwrap();

        assert_eq!(
            *actions.borrow(),
            vec![
                ControlEvent::MOUSE_DOWN,
                ControlEvent::MOUSE_DRAG_INSIDE,
                ControlEvent::MOUSE_UP_INSIDE,
            ]
        );
        assert_eq!(script.borrow().destroyed, vec![native]);
        assert!(app.is_terminated());
        assert_eq!(will_terminate.get(), 1);
        assert_eq!(app.window_count(), 0);
        assert!(matches!(app.run(), Err(ApplicationError::Terminated)));
    }

    #[test]
    fn test_terminate_during_launch_ends_run() {
        let (mut app, _) = app();
        let launched = Rc::new(Cell::new(0));
        app.set_delegate(Box::new(Recorder {
            launched: Rc::clone(&launched),
            terminate_on_launch: true,
            ..Recorder::default()
        }));
        app.run().unwrap();
        assert_eq!(launched.get(), 1);
        assert!(app.is_terminated());
        assert!(!app.is_running());
    }

    #[test]
    fn test_terminate_while_running_stops_dispatch() {
        let (mut app, script) = app();
        app.set_delegate(Box::new(Recorder::default()));
        let number = app.create_window(Rect::new(0.0, 0.0, 50.0, 50.0), "test").unwrap();
        let native = app.window(number).unwrap().native().id;
        let delivered = Rc::new(Cell::new(0));
        app.window_mut(number)
            .unwrap()
            .set_delegate(Box::new(KeyCounter(Rc::clone(&delivered))));
        script
            .borrow_mut()
            .pending
            .extend([key_press(native, 38), key_press(native, 39), key_press(native, 40)]);

        // runs between loop iterations; terminates once the first key is in
        let seen = Rc::clone(&delivered);
        app.add_timer(Duration::ZERO, true, move |app| {
            if seen.get() > 0 {
                app.terminate();
            }
        });

        app.run().unwrap();
        assert_eq!(delivered.get(), 1);
        assert!(app.is_terminated());
        assert!(!app.is_running());
        assert!(matches!(app.run(), Err(ApplicationError::Terminated)));
    }

    #[test]
    fn test_closing_window_releases_held_button() {
        let (mut app, script) = app();
        app.is_running = true;
        let number = app.create_window(Rect::new(0.0, 0.0, 50.0, 50.0), "test").unwrap();
        let native = app.window(number).unwrap().native().id;
        script
            .borrow_mut()
            .pending
            .push_back(pointer(xinput::BUTTON_PRESS_EVENT, native, 1, 5.0, 5.0));

        let down = app.next_event(EventTypeMask::ANY, None, true).unwrap();
        assert_eq!(down.event_type(), EventType::LeftMouseDown);
        assert_eq!(app.translator.tracked_button(), crate::input::MouseButton::Left);

        app.close_window(number).unwrap();
        assert_eq!(app.translator.tracked_button(), crate::input::MouseButton::None);
    }

    #[test]
    fn test_terminate_cancel_and_later() {
        let (mut app, _) = app();
        let will_terminate = Rc::new(Cell::new(0));
        app.set_delegate(Box::new(Recorder {
            will_terminate: Rc::clone(&will_terminate),
            reply: Some(TerminateReply::Cancel),
            ..Recorder::default()
        }));
        app.terminate();
        assert!(!app.is_terminated());

        app.set_delegate(Box::new(Recorder {
            will_terminate: Rc::clone(&will_terminate),
            reply: Some(TerminateReply::Later),
            ..Recorder::default()
        }));
        app.terminate();
        assert!(!app.is_terminated());
        app.reply_to_should_terminate(true);
        app.reply_to_should_terminate(true);
        assert!(app.is_terminated());
        assert_eq!(will_terminate.get(), 1);
    }

    #[test]
    fn test_next_event_skips_ignored_and_foreign() {
        let (mut app, script) = app();
        let number = app.create_window(Rect::new(0.0, 0.0, 50.0, 50.0), "test").unwrap();
        let native = app.window(number).unwrap().native().id;
        script.borrow_mut().pending.extend([
            RawEvent::Core(CoreEvent::Map { window: 0xdead }),
            RawEvent::Core(CoreEvent::Map { window: native }),
        ]);
        app.is_running = true;

        let event = app.next_event(EventTypeMask::ANY, None, true).unwrap();
        assert_eq!(event.subtype(), EventSubtype::WindowMapped);
        assert_eq!(event.window_number(), Some(number));
        assert_eq!(app.pending_events(), 0);
    }

    #[test]
    fn test_next_event_peek_and_mask() {
        let (mut app, _) = app();
        app.is_running = true;
        app.post(Event::toolkit(EventSubtype::Message, None), false);
        app.post(Event::toolkit(EventSubtype::WindowExposed, None), true);

        let peeked = app.next_event(EventTypeMask::ANY, None, false).unwrap();
        assert_eq!(peeked.subtype(), EventSubtype::WindowExposed);
        assert_eq!(app.pending_events(), 2);

        let deadline = Instant::now() + Duration::from_millis(10);
        assert!(app.next_event(EventTypeMask::KEY_DOWN, Some(deadline), true).is_none());
        assert_eq!(app.pending_events(), 2);
    }

    #[test]
    fn test_next_event_after_stop_is_terminate() {
        let (mut app, _) = app();
        app.post(Event::toolkit(EventSubtype::Message, None), false);
        let event = app.next_event(EventTypeMask::ANY, None, true).unwrap();
        assert!(event.is_terminate());
        assert_eq!(app.pending_events(), 1);
    }

    #[test]
    fn test_timer_callback_posts_event() {
        let (mut app, _) = app();
        app.is_running = true;
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        app.add_timer(Duration::from_millis(1), false, move |app| {
            counter.set(counter.get() + 1);
            app.post(Event::toolkit(EventSubtype::Message, None), false);
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let event = app
            .next_event(EventTypeMask::TOOLKIT_DEFINED, Some(deadline), true)
            .unwrap();
        assert_eq!(event.subtype(), EventSubtype::Message);
        assert_eq!(fired.get(), 1);
        assert!(app.timers.is_empty());
    }

    #[test]
    fn test_server_error_terminates() {
        let (mut app, script) = app();
        app.set_delegate(Box::new(Recorder {
            reply: Some(TerminateReply::Cancel),
            ..Recorder::default()
        }));
        script.borrow_mut().fail = true;
        app.is_running = true;
        let event = app.next_event(EventTypeMask::ANY, None, true).unwrap();
        assert!(event.is_terminate());
        assert!(app.is_terminated());
    }

    #[test]
    fn test_events_for_closed_window_are_dropped() {
        let (mut app, script) = app();
        let number = app.create_window(Rect::new(0.0, 0.0, 50.0, 50.0), "test").unwrap();
        app.close_window(number).unwrap();
        assert_eq!(script.borrow().destroyed.len(), 1);
        app.send(&Event::toolkit(EventSubtype::WindowExposed, Some(number)));
        assert!(app.window(number).is_none());
        // numbers are never reused
        let next = app.create_window(Rect::new(0.0, 0.0, 50.0, 50.0), "again").unwrap();
        assert_ne!(next, number);
    }

    #[test]
    fn test_tracking_discards_stale_events() {
        let (mut app, _) = app();
        app.is_running = true;
        let number = app.create_window(Rect::new(0.0, 0.0, 50.0, 50.0), "test").unwrap();
        let at = |ms: u64, event_type: EventType| {
            Event::mouse(
                event_type,
                crate::geometry::Point::new(5.0, 5.0),
                Default::default(),
                number,
                Duration::from_millis(ms),
            )
            .unwrap()
            .with_button_number(1)
        };
        app.post(at(2, EventType::MouseMoved), false);
        app.post(at(3, EventType::LeftMouseDragged), false);
        app.post(at(4, EventType::LeftMouseUp), false);
        app.post(at(9, EventType::MouseMoved), false);

        app.send(&at(1, EventType::LeftMouseDown));
        let remaining: Vec<Duration> = app.queue.iter().map(Event::timestamp).collect();
        assert_eq!(remaining, vec![Duration::from_millis(9)]);
    }
}
