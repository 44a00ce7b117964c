//! Toolkit windows and event delivery
//!
//! A [`Window`] owns its view arena and is the top of the per-window
//! responder chain. Pointer events go to the hit-tested view (or, for drags
//! and ups, to the view that took the matching down); keyboard events walk
//! the chain from the first responder.

use tracing::{debug, trace};

use crate::controller::ViewController;
use crate::display::NativeWindow;
use crate::event::{Event, EventSubtype, EventType, EventTypeMask, WindowNumber};
use crate::geometry::{Point, Rect};
use crate::responder::{route, Dispatch, EventContext, FirstResponderRequest, Responder, ResponderId};
use crate::view::{ControllerId, ViewId, ViewTree};

/// The window's own place in the responder chain.
pub trait WindowDelegate: Responder {
    /// Asked on a server delete request. Returning false keeps the window open.
    fn window_should_close(&mut self) -> bool {
        true
    }
}

/// What the application has to do after a window consumed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowResponse {
    pub close: bool,
    /// Dragged/up mask for the button class whose down was just delivered.
    pub track: Option<EventTypeMask>,
    /// Frame must be re-read from the server.
    pub update_surface: bool,
}

/// Index into the per-button-class mouse-down targets.
#[derive(Debug, Clone, Copy)]
enum ButtonClass {
    Left = 0,
    Right = 1,
    Other = 2,
}

impl ButtonClass {
    fn of(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::LeftMouseDown | EventType::LeftMouseDragged | EventType::LeftMouseUp => {
                Some(Self::Left)
            }
            EventType::RightMouseDown | EventType::RightMouseDragged | EventType::RightMouseUp => {
                Some(Self::Right)
            }
            EventType::OtherMouseDown | EventType::OtherMouseDragged | EventType::OtherMouseUp => {
                Some(Self::Other)
            }
            _ => None,
        }
    }

    fn tracking_mask(self) -> EventTypeMask {
        match self {
            Self::Left => EventTypeMask::LEFT_MOUSE_DRAGGED | EventTypeMask::LEFT_MOUSE_UP,
            Self::Right => EventTypeMask::RIGHT_MOUSE_DRAGGED | EventTypeMask::RIGHT_MOUSE_UP,
            Self::Other => EventTypeMask::OTHER_MOUSE_DRAGGED | EventTypeMask::OTHER_MOUSE_UP,
        }
    }
}

pub struct Window {
    number: WindowNumber,
    native: NativeWindow,
    title: String,
    tree: ViewTree,
    delegate: Option<Box<dyn WindowDelegate>>,
    first_responder: Option<ResponderId>,
    root_view_controller: Option<ControllerId>,
    needs_root_controller_setup: bool,
    is_mapped: bool,
    accepts_mouse_moved_events: bool,
    mouse_down_targets: [Option<ResponderId>; 3],
    sync_counter: Option<i64>,
}

impl Window {
    /// `frame` is the logical content rect the native window was created with.
    pub fn new(number: WindowNumber, native: NativeWindow, frame: Rect, title: impl Into<String>) -> Self {
        Self {
            number,
            native,
            title: title.into(),
            tree: ViewTree::new(Rect::with_size(frame.size)),
            delegate: None,
            first_responder: None,
            root_view_controller: None,
            needs_root_controller_setup: false,
            is_mapped: false,
            accepts_mouse_moved_events: false,
            mouse_down_targets: [None; 3],
            sync_counter: None,
        }
    }

    pub fn number(&self) -> WindowNumber {
        self.number
    }

    pub fn native(&self) -> &NativeWindow {
        &self.native
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ViewTree {
        &mut self.tree
    }

    pub fn root_view(&self) -> ViewId {
        self.tree.root()
    }

    pub fn bounds(&self) -> Rect {
        self.tree.bounds(self.tree.root())
    }

    pub fn set_delegate(&mut self, delegate: Box<dyn WindowDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn is_mapped(&self) -> bool {
        self.is_mapped
    }

    pub fn accepts_mouse_moved_events(&self) -> bool {
        self.accepts_mouse_moved_events
    }

    pub(crate) fn set_accepts_mouse_moved_events(&mut self, accepts: bool) {
        self.accepts_mouse_moved_events = accepts;
    }

    /// Last `_NET_WM_SYNC_REQUEST` counter value received.
    pub fn sync_counter(&self) -> Option<i64> {
        self.sync_counter
    }

    pub fn first_responder(&self) -> Option<ResponderId> {
        self.first_responder
    }

    /// Add a view behavior as a subview of `parent`.
    pub fn add_view(&mut self, parent: ViewId, frame: Rect, responder: Box<dyn Responder>) -> ViewId {
        let view = self.tree.add_view(frame, responder);
        self.tree.add_subview(parent, view);
        view
    }

    /// Destroy a view subtree and drop every reference the window held to it.
    pub fn remove_view(&mut self, view: ViewId) {
        self.tree.remove_view(view);
        self.forget_dead_responders();
    }

    fn forget_dead_responders(&mut self) {
        let tree = &self.tree;
        let alive = |id: &ResponderId| match *id {
            ResponderId::View(view) => tree.contains(view),
            _ => true,
        };
        if self.first_responder.as_ref().is_some_and(|r| !alive(r)) {
            debug!(window = self.number.0, "first responder removed");
            self.first_responder = None;
        }
        for target in &mut self.mouse_down_targets {
            if target.as_ref().is_some_and(|r| !alive(r)) {
                *target = None;
            }
        }
    }

    pub fn root_view_controller(&self) -> Option<ControllerId> {
        self.root_view_controller
    }

    /// Replace the root view controller. The previous one disappears and
    /// every root subview is detached.
    pub fn set_root_view_controller(&mut self, controller: Option<Box<dyn ViewController>>) -> Option<ControllerId> {
        if let Some(old) = self.root_view_controller.take() {
            self.tree.begin_appearance_transition(old, false, false);
            if let Some(view) = self.tree.controller_view(old) {
                self.tree.remove_from_superview(view);
            }
            self.tree.end_appearance_transition(old, false);
        }
        let root = self.tree.root();
        for view in self.tree.subviews(root).to_vec() {
            self.tree.remove_from_superview(view);
        }

        let id = controller.map(|c| self.tree.add_controller(c));
        self.root_view_controller = id;
        if self.is_mapped {
            self.setup_root_view_controller();
        }
        id
    }

    fn setup_root_view_controller(&mut self) {
        let Some(controller) = self.root_view_controller else {
            return;
        };
        self.tree.begin_appearance_transition(controller, true, false);
        if let Some(view) = self.tree.load_view_if_needed(controller) {
            self.tree.set_frame(view, self.bounds());
            let root = self.tree.root();
            self.tree.add_subview(root, view);
        }
        self.tree.end_appearance_transition(controller, false);
    }

    /// Adopt a new logical frame read back from the server.
    pub fn update_surface(&mut self, frame: Rect) {
        let root = self.tree.root();
        self.tree.set_bounds(root, Rect::with_size(frame.size));
        self.tree.set_center(root, Rect::with_size(frame.size).center());
        if let Some(view) = self.root_view_controller.and_then(|c| self.tree.controller_view(c)) {
            self.tree.set_frame(view, Rect::with_size(frame.size));
        }
        self.tree.set_needs_display(root);
    }

    /// Deliver `event`, which must belong to this window.
    pub fn send_event(&mut self, event: &Event) -> WindowResponse {
        let event_type = event.event_type();
        match event_type {
            EventType::ToolkitDefined => self.handle_toolkit_event(event),
            EventType::LeftMouseDown | EventType::RightMouseDown | EventType::OtherMouseDown => {
                let target = self.hit_test(event.location_in_window());
                let mut response = WindowResponse::default();
                if let Some(class) = ButtonClass::of(event_type) {
                    self.mouse_down_targets[class as usize] = Some(target);
                    response.track = Some(class.tracking_mask());
                }
                self.send_along_chain(target, event);
                response
            }
            EventType::LeftMouseDragged
            | EventType::RightMouseDragged
            | EventType::OtherMouseDragged
            | EventType::LeftMouseUp
            | EventType::RightMouseUp
            | EventType::OtherMouseUp => {
                let Some(class) = ButtonClass::of(event_type) else {
                    return WindowResponse::default();
                };
                let slot = &mut self.mouse_down_targets[class as usize];
                let target = if event_type.is_mouse_up() { slot.take() } else { *slot };
                match target {
                    Some(target) => {
                        self.send_along_chain(target, event);
                    }
                    None => trace!(?event_type, "no mouse-down target"),
                }
                WindowResponse::default()
            }
            EventType::MouseMoved
            | EventType::MouseEntered
            | EventType::MouseExited
            | EventType::ScrollWheel => {
                let target = self.hit_test(event.location_in_window());
                self.send_along_chain(target, event);
                WindowResponse::default()
            }
            EventType::KeyDown | EventType::KeyUp | EventType::FlagsChanged => {
                let start = self.first_responder.unwrap_or(ResponderId::Window);
                self.send_along_chain(start, event);
                WindowResponse::default()
            }
            EventType::None | EventType::SystemDefined | EventType::ApplicationDefined => {
                WindowResponse::default()
            }
        }
    }

    fn handle_toolkit_event(&mut self, event: &Event) -> WindowResponse {
        let mut response = WindowResponse::default();
        match event.subtype() {
            EventSubtype::WindowMapped => {
                self.is_mapped = true;
                self.needs_root_controller_setup = true;
            }
            EventSubtype::WindowUnmapped => {
                self.is_mapped = false;
            }
            EventSubtype::WindowExposed => {
                if self.is_mapped && self.needs_root_controller_setup {
                    self.setup_root_view_controller();
                    self.needs_root_controller_setup = false;
                }
                response.update_surface = self.is_mapped;
            }
            EventSubtype::ConfigurationChanged => {
                let bounds = self.bounds();
                let resized = bounds.size.width != event.delta_x() || bounds.size.height != event.delta_y();
                response.update_surface = self.is_mapped && resized;
            }
            EventSubtype::WindowDeleteRequest => {
                response.close = match self.delegate.as_mut() {
                    Some(delegate) => delegate.window_should_close(),
                    None => true,
                };
            }
            EventSubtype::WindowSyncRequest => {
                self.sync_counter = Some(event.sync_counter());
            }
            EventSubtype::None
            | EventSubtype::Message
            | EventSubtype::IgnoredDisplayServerEvent
            | EventSubtype::Terminate => {}
        }
        response
    }

    fn hit_test(&self, location: Point) -> ResponderId {
        self.tree
            .hit_test(self.tree.root(), location)
            .map_or(ResponderId::Window, ResponderId::View)
    }

    /// Next link after `id`: a view's controller, then its superview; a
    /// controller's view's superview, then its parent controller. The root
    /// view hands over to the window, the window to the application.
    pub fn next_responder(&self, id: ResponderId) -> Option<ResponderId> {
        match id {
            ResponderId::View(view) => {
                if let Some(controller) = self.tree.view_controller(view) {
                    Some(ResponderId::Controller(controller))
                } else if let Some(superview) = self.tree.superview(view) {
                    Some(ResponderId::View(superview))
                } else if view == self.tree.root() {
                    Some(ResponderId::Window)
                } else {
                    None
                }
            }
            ResponderId::Controller(controller) => {
                let view = self.tree.controller_view(controller);
                if let Some(superview) = view.and_then(|v| self.tree.superview(v)) {
                    Some(ResponderId::View(superview))
                } else {
                    self.tree
                        .parent_controller(controller)
                        .map(ResponderId::Controller)
                }
            }
            ResponderId::Window => Some(ResponderId::Application),
            ResponderId::Application => None,
        }
    }

    /// Walk from `start` until someone handles `event`. Returns
    /// [`Dispatch::Forward`] when it falls off the window's end of the chain.
    pub fn send_along_chain(&mut self, start: ResponderId, event: &Event) -> Dispatch {
        let mut current = Some(start);
        while let Some(id) = current {
            if id == ResponderId::Application {
                break;
            }
            if self.invoke(id, event) == Dispatch::Handled {
                return Dispatch::Handled;
            }
            current = self.next_responder(id);
        }
        trace!(window = self.number.0, event_type = ?event.event_type(), "event not handled by window chain");
        Dispatch::Forward
    }

    fn invoke(&mut self, id: ResponderId, event: &Event) -> Dispatch {
        let (dispatch, request) = match id {
            ResponderId::View(view) => {
                let Some(mut responder) = self.tree.take_responder(view) else {
                    return Dispatch::Forward;
                };
                let mut cx = EventContext::new(&mut self.tree, id);
                let dispatch = route(responder.as_mut(), &mut cx, event);
                let request = cx.take_request();
                self.tree.restore_responder(view, responder);
                (dispatch, request)
            }
            ResponderId::Controller(controller) => {
                let Some(mut behavior) = self.tree.take_controller(controller) else {
                    return Dispatch::Forward;
                };
                let mut cx = EventContext::new(&mut self.tree, id);
                let dispatch = route(behavior.as_mut(), &mut cx, event);
                let request = cx.take_request();
                self.tree.restore_controller(controller, behavior);
                (dispatch, request)
            }
            ResponderId::Window => {
                let Some(mut delegate) = self.delegate.take() else {
                    return Dispatch::Forward;
                };
                let mut cx = EventContext::new(&mut self.tree, id);
                let dispatch = route(delegate.as_mut(), &mut cx, event);
                let request = cx.take_request();
                self.delegate = Some(delegate);
                (dispatch, request)
            }
            ResponderId::Application => return Dispatch::Forward,
        };

        self.forget_dead_responders();
        match request {
            Some(FirstResponderRequest::Become) => {
                self.make_first_responder(Some(id));
            }
            Some(FirstResponderRequest::Resign) if self.first_responder == Some(id) => {
                self.make_first_responder(None);
            }
            _ => {}
        }
        dispatch
    }

    fn with_responder<T>(&mut self, id: ResponderId, f: impl FnOnce(&mut dyn Responder) -> T) -> Option<T> {
        match id {
            ResponderId::View(view) => {
                let mut responder = self.tree.take_responder(view)?;
                let result = f(responder.as_mut());
                self.tree.restore_responder(view, responder);
                Some(result)
            }
            ResponderId::Controller(controller) => {
                let mut behavior = self.tree.take_controller(controller)?;
                let result = f(behavior.as_mut());
                self.tree.restore_controller(controller, behavior);
                Some(result)
            }
            ResponderId::Window => {
                let delegate = self.delegate.as_deref_mut()?;
                Some(f(delegate))
            }
            ResponderId::Application => None,
        }
    }

    /// Hand first responder status to `responder`, or clear it with `None`.
    ///
    /// The candidate must accept; the current holder is then asked to
    /// resign exactly once and may refuse. Returns whether the change
    /// happened.
    pub fn make_first_responder(&mut self, responder: Option<ResponderId>) -> bool {
        if self.first_responder == responder {
            return true;
        }
        if let Some(candidate) = responder {
            let accepts = self
                .with_responder(candidate, |r| r.accepts_first_responder())
                .unwrap_or(false);
            if !accepts {
                return false;
            }
        }
        if let Some(current) = self.first_responder {
            let resigned = self
                .with_responder(current, |r| r.resign_first_responder())
                .unwrap_or(true);
            if !resigned {
                debug!(window = self.number.0, ?current, "first responder refused to resign");
                return false;
            }
        }
        self.first_responder = responder;
        if let Some(installed) = responder {
            self.with_responder(installed, |r| r.did_become_first_responder());
        }
        true
    }
}
