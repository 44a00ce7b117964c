//! Responder capability and event routing
//!
//! Every handler defaults to [`Dispatch::Forward`], so an event nobody
//! overrides walks the whole chain and ends at the application.

use std::any::Any;

use crate::event::{Event, EventType};
use crate::geometry::Point;
use crate::view::{ControllerId, ViewId, ViewTree};

/// A link in a window's responder chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponderId {
    View(ViewId),
    Controller(ControllerId),
    Window,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FirstResponderRequest {
    Become,
    Resign,
}

/// What a handler may touch while it runs.
///
/// First-responder changes are recorded here and applied by the window once
/// the handler returns.
pub struct EventContext<'a> {
    tree: &'a mut ViewTree,
    responder: ResponderId,
    request: Option<FirstResponderRequest>,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(tree: &'a mut ViewTree, responder: ResponderId) -> Self {
        Self {
            tree,
            responder,
            request: None,
        }
    }

    pub fn responder(&self) -> ResponderId {
        self.responder
    }

    pub fn tree(&self) -> &ViewTree {
        &*self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ViewTree {
        &mut *self.tree
    }

    /// The responder's own view, or its controller's view.
    pub fn view(&self) -> Option<ViewId> {
        match self.responder {
            ResponderId::View(view) => Some(view),
            ResponderId::Controller(controller) => self.tree.controller_view(controller),
            ResponderId::Window => Some(self.tree.root()),
            ResponderId::Application => None,
        }
    }

    /// Event location converted into this responder's view coordinates.
    pub fn location_in_view(&self, event: &Event) -> Point {
        match self.view() {
            Some(view) => self.tree.convert_from_window(view, event.location_in_window()),
            None => event.location_in_window(),
        }
    }

    pub fn point_inside(&self, point: &Point) -> bool {
        self.view()
            .is_some_and(|view| self.tree.point_inside(view, point))
    }

    pub fn set_needs_display(&mut self) {
        if let Some(view) = self.view() {
            self.tree.set_needs_display(view);
        }
    }

    pub fn become_first_responder(&mut self) {
        self.request = Some(FirstResponderRequest::Become);
    }

    pub fn resign_first_responder(&mut self) {
        self.request = Some(FirstResponderRequest::Resign);
    }

    pub(crate) fn take_request(&mut self) -> Option<FirstResponderRequest> {
        self.request.take()
    }
}

#[allow(unused_variables)]
pub trait Responder: Any {
    fn mouse_down(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn mouse_dragged(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn mouse_up(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn mouse_moved(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn mouse_entered(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn mouse_exited(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn right_mouse_down(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn right_mouse_dragged(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn right_mouse_up(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn other_mouse_down(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn other_mouse_dragged(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn other_mouse_up(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn scroll_wheel(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn key_down(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn key_up(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn flags_changed(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        Dispatch::Forward
    }

    fn accepts_first_responder(&self) -> bool {
        false
    }

    /// Return false to refuse giving up first responder status.
    fn resign_first_responder(&mut self) -> bool {
        true
    }

    fn did_become_first_responder(&mut self) {}
}

/// Call the handler for `event`'s category.
pub(crate) fn route<R: Responder + ?Sized>(
    responder: &mut R,
    cx: &mut EventContext<'_>,
    event: &Event,
) -> Dispatch {
    match event.event_type() {
        EventType::LeftMouseDown => responder.mouse_down(cx, event),
        EventType::LeftMouseDragged => responder.mouse_dragged(cx, event),
        EventType::LeftMouseUp => responder.mouse_up(cx, event),
        EventType::MouseMoved => responder.mouse_moved(cx, event),
        EventType::MouseEntered => responder.mouse_entered(cx, event),
        EventType::MouseExited => responder.mouse_exited(cx, event),
        EventType::RightMouseDown => responder.right_mouse_down(cx, event),
        EventType::RightMouseDragged => responder.right_mouse_dragged(cx, event),
        EventType::RightMouseUp => responder.right_mouse_up(cx, event),
        EventType::OtherMouseDown => responder.other_mouse_down(cx, event),
        EventType::OtherMouseDragged => responder.other_mouse_dragged(cx, event),
        EventType::OtherMouseUp => responder.other_mouse_up(cx, event),
        EventType::ScrollWheel => responder.scroll_wheel(cx, event),
        EventType::KeyDown => responder.key_down(cx, event),
        EventType::KeyUp => responder.key_up(cx, event),
        EventType::FlagsChanged => responder.flags_changed(cx, event),
        EventType::None
        | EventType::ToolkitDefined
        | EventType::SystemDefined
        | EventType::ApplicationDefined => Dispatch::Forward,
    }
}

/// A view with no behavior of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainView;

impl Responder for PlainView {}
