//! Target-action controls
//!
//! A [`Control`] is a view behavior that turns pointer gestures into
//! [`ControlEvent`]s and hands them to every registered action whose mask
//! intersects.

use std::collections::HashMap;

use bitflags::bitflags;
use tracing::trace;

use crate::event::Event;
use crate::geometry::Point;
use crate::responder::{Dispatch, EventContext, Responder};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlState: u32 {
        const HIGHLIGHTED = 1 << 0;
        const DISABLED = 1 << 1;
        const SELECTED = 1 << 2;
        const FOCUSED = 1 << 3;
        const APPLICATION = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlEvent: u64 {
        const MOUSE_DOWN = 1 << 1;
        const MOUSE_DOWN_REPEAT = 1 << 2;
        const MOUSE_DRAG_INSIDE = 1 << 3;
        const MOUSE_DRAG_OUTSIDE = 1 << 4;
        const MOUSE_DRAG_ENTER = 1 << 5;
        const MOUSE_DRAG_EXIT = 1 << 6;
        const MOUSE_UP_INSIDE = 1 << 7;
        const MOUSE_UP_OUTSIDE = 1 << 8;
        const MOUSE_CANCEL = 1 << 9;

        const RIGHT_MOUSE_DOWN = 1 << 10;
        const RIGHT_MOUSE_DOWN_REPEAT = 1 << 11;
        const RIGHT_MOUSE_DRAG_INSIDE = 1 << 12;
        const RIGHT_MOUSE_DRAG_OUTSIDE = 1 << 13;
        const RIGHT_MOUSE_DRAG_ENTER = 1 << 14;
        const RIGHT_MOUSE_DRAG_EXIT = 1 << 15;
        const RIGHT_MOUSE_UP_INSIDE = 1 << 16;
        const RIGHT_MOUSE_UP_OUTSIDE = 1 << 17;
        const RIGHT_MOUSE_CANCEL = 1 << 18;

        const OTHER_MOUSE_DOWN = 1 << 19;
        const OTHER_MOUSE_DOWN_REPEAT = 1 << 20;
        const OTHER_MOUSE_DRAG_INSIDE = 1 << 21;
        const OTHER_MOUSE_DRAG_OUTSIDE = 1 << 22;
        const OTHER_MOUSE_DRAG_ENTER = 1 << 23;
        const OTHER_MOUSE_DRAG_EXIT = 1 << 24;
        const OTHER_MOUSE_UP_INSIDE = 1 << 25;
        const OTHER_MOUSE_UP_OUTSIDE = 1 << 26;
        const OTHER_MOUSE_CANCEL = 1 << 27;

        const VALUE_CHANGED = 1 << 28;
        const PRIMARY_ACTION_TRIGGERED = 1 << 29;
        const EDITING_DID_BEGIN = 1 << 30;
        const EDITING_CHANGED = 1 << 31;
        const EDITING_DID_END = 1 << 32;
        const EDITING_DID_END_ON_EXIT = 1 << 33;

        const APPLICATION_RESERVED = 1 << 36;
        const SYSTEM_RESERVED = 1 << 37;

        const ALL = u64::MAX;
    }
}

/// One button class's slice of the control-event space.
struct Family {
    down: ControlEvent,
    drag_inside: ControlEvent,
    drag_outside: ControlEvent,
    drag_enter: ControlEvent,
    drag_exit: ControlEvent,
    up_inside: ControlEvent,
    up_outside: ControlEvent,
    highlights: bool,
}

const LEFT: Family = Family {
    down: ControlEvent::MOUSE_DOWN,
    drag_inside: ControlEvent::MOUSE_DRAG_INSIDE,
    drag_outside: ControlEvent::MOUSE_DRAG_OUTSIDE,
    drag_enter: ControlEvent::MOUSE_DRAG_ENTER,
    drag_exit: ControlEvent::MOUSE_DRAG_EXIT,
    up_inside: ControlEvent::MOUSE_UP_INSIDE,
    up_outside: ControlEvent::MOUSE_UP_OUTSIDE,
    highlights: true,
};

const RIGHT: Family = Family {
    down: ControlEvent::RIGHT_MOUSE_DOWN,
    drag_inside: ControlEvent::RIGHT_MOUSE_DRAG_INSIDE,
    drag_outside: ControlEvent::RIGHT_MOUSE_DRAG_OUTSIDE,
    drag_enter: ControlEvent::RIGHT_MOUSE_DRAG_ENTER,
    drag_exit: ControlEvent::RIGHT_MOUSE_DRAG_EXIT,
    up_inside: ControlEvent::RIGHT_MOUSE_UP_INSIDE,
    up_outside: ControlEvent::RIGHT_MOUSE_UP_OUTSIDE,
    highlights: false,
};

const OTHER: Family = Family {
    down: ControlEvent::OTHER_MOUSE_DOWN,
    drag_inside: ControlEvent::OTHER_MOUSE_DRAG_INSIDE,
    drag_outside: ControlEvent::OTHER_MOUSE_DRAG_OUTSIDE,
    drag_enter: ControlEvent::OTHER_MOUSE_DRAG_ENTER,
    drag_exit: ControlEvent::OTHER_MOUSE_DRAG_EXIT,
    up_inside: ControlEvent::OTHER_MOUSE_UP_INSIDE,
    up_outside: ControlEvent::OTHER_MOUSE_UP_OUTSIDE,
    highlights: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(u64);

pub type Action = Box<dyn FnMut(&Event, ControlEvent)>;

struct Registered {
    id: ActionId,
    events: ControlEvent,
    action: Action,
}

#[derive(Default)]
pub struct Control {
    state: ControlState,
    last_locations: HashMap<u32, Point>,
    actions: Vec<Registered>,
    next_action: u64,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        !self.state.contains(ControlState::DISABLED)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.set(ControlState::DISABLED, !enabled);
    }

    pub fn is_selected(&self) -> bool {
        self.state.contains(ControlState::SELECTED)
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.state.set(ControlState::SELECTED, selected);
    }

    pub fn is_highlighted(&self) -> bool {
        self.state.contains(ControlState::HIGHLIGHTED)
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.state.set(ControlState::HIGHLIGHTED, highlighted);
    }

    /// Whether a gesture for `button_number` is in progress.
    pub fn is_tracking(&self, button_number: u32) -> bool {
        self.last_locations.contains_key(&button_number)
    }

    pub fn add_action(
        &mut self,
        events: ControlEvent,
        action: impl FnMut(&Event, ControlEvent) + 'static,
    ) -> ActionId {
        let id = ActionId(self.next_action);
        self.next_action += 1;
        self.actions.push(Registered {
            id,
            events,
            action: Box::new(action),
        });
        id
    }

    /// Stop `id` firing for `events`, or for everything with `None`.
    /// The action is dropped once no events remain.
    pub fn remove_action(&mut self, id: ActionId, events: Option<ControlEvent>) {
        for registered in self.actions.iter_mut().filter(|r| r.id == id) {
            match events {
                Some(events) => registered.events.remove(events),
                None => registered.events = ControlEvent::empty(),
            }
        }
        self.actions.retain(|r| !r.events.is_empty());
    }

    /// Events some action is registered for.
    pub fn all_control_events(&self) -> ControlEvent {
        self.actions
            .iter()
            .fold(ControlEvent::empty(), |all, r| all | r.events)
    }

    pub fn send_actions(&mut self, events: ControlEvent, event: &Event) {
        trace!(?events, "control actions");
        for registered in &mut self.actions {
            if registered.events.intersects(events) {
                (registered.action)(event, events);
            }
        }
    }

    fn highlight(&mut self, cx: &mut EventContext<'_>, family: &Family, highlighted: bool) {
        if family.highlights && self.is_highlighted() != highlighted {
            self.set_highlighted(highlighted);
            cx.set_needs_display();
        }
    }

    fn down(&mut self, cx: &mut EventContext<'_>, event: &Event, family: &Family) -> Dispatch {
        if !self.is_enabled() {
            return Dispatch::Forward;
        }
        let location = cx.location_in_view(event);
        self.last_locations.insert(event.button_number(), location);
        self.highlight(cx, family, true);
        self.send_actions(family.down, event);
        Dispatch::Handled
    }

    fn dragged(&mut self, cx: &mut EventContext<'_>, event: &Event, family: &Family) -> Dispatch {
        if !self.is_enabled() {
            return Dispatch::Forward;
        }
        let location = cx.location_in_view(event);
        let previous = self
            .last_locations
            .insert(event.button_number(), location)
            .unwrap_or(Point::new(f64::NAN, f64::NAN));
        let was_inside = cx.point_inside(&previous);

        let control_event = if cx.point_inside(&location) {
            self.highlight(cx, family, true);
            if was_inside {
                family.drag_inside
            } else {
                family.drag_enter
            }
        } else {
            self.highlight(cx, family, false);
            if was_inside {
                family.drag_exit
            } else {
                family.drag_outside
            }
        };
        self.send_actions(control_event, event);
        Dispatch::Handled
    }

    fn up(&mut self, cx: &mut EventContext<'_>, event: &Event, family: &Family) -> Dispatch {
        if !self.is_enabled() {
            return Dispatch::Forward;
        }
        let location = cx.location_in_view(event);
        let control_event = if cx.point_inside(&location) {
            family.up_inside
        } else {
            family.up_outside
        };
        self.send_actions(control_event, event);
        self.last_locations.remove(&event.button_number());
        self.highlight(cx, family, false);
        Dispatch::Handled
    }
}

impl Responder for Control {
    fn mouse_down(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.down(cx, event, &LEFT)
    }

    fn mouse_dragged(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.dragged(cx, event, &LEFT)
    }

    fn mouse_up(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.up(cx, event, &LEFT)
    }

    fn right_mouse_down(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.down(cx, event, &RIGHT)
    }

    fn right_mouse_dragged(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.dragged(cx, event, &RIGHT)
    }

    fn right_mouse_up(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.up(cx, event, &RIGHT)
    }

    fn other_mouse_down(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.down(cx, event, &OTHER)
    }

    fn other_mouse_dragged(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.dragged(cx, event, &OTHER)
    }

    fn other_mouse_up(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        self.up(cx, event, &OTHER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, ModifierFlags, WindowNumber};
    use crate::geometry::Rect;
    use crate::responder::{route, PlainView, ResponderId};
    use crate::view::{ViewId, ViewTree};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn mouse(event_type: EventType, x: f64, y: f64, button: u32) -> Event {
        Event::mouse(
            event_type,
            Point::new(x, y),
            ModifierFlags::empty(),
            WindowNumber(0),
            Duration::ZERO,
        )
        .unwrap()
        .with_button_number(button)
    }

    /// A 100x100 window with a 20x20 control at (10,10).
    fn setup() -> (ViewTree, ViewId) {
        let mut tree = ViewTree::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        let root = tree.root();
        let view = tree.add_view(Rect::new(10.0, 10.0, 20.0, 20.0), Box::new(PlainView));
        tree.add_subview(root, view);
        (tree, view)
    }

    fn recorder(control: &mut Control, events: ControlEvent) -> Rc<RefCell<Vec<ControlEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        control.add_action(events, move |_, fired| sink.borrow_mut().push(fired));
        log
    }

    fn send(control: &mut Control, tree: &mut ViewTree, view: ViewId, event: &Event) -> Dispatch {
        let mut cx = EventContext::new(tree, ResponderId::View(view));
        route(control, &mut cx, event)
    }

    #[test]
    fn test_click_inside() {
        let (mut tree, view) = setup();
        let mut control = Control::new();
        let log = recorder(&mut control, ControlEvent::ALL);

        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDown, 15.0, 15.0, 1));
        assert!(control.is_highlighted());
        assert!(control.is_tracking(1));
        assert!(tree.needs_display(view));

        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseUp, 16.0, 16.0, 1));
        assert!(!control.is_highlighted());
        assert!(!control.is_tracking(1));
        assert_eq!(
            *log.borrow(),
            vec![ControlEvent::MOUSE_DOWN, ControlEvent::MOUSE_UP_INSIDE]
        );
    }

    #[test]
    fn test_drag_out_and_back() {
        let (mut tree, view) = setup();
        let mut control = Control::new();
        let log = recorder(&mut control, ControlEvent::ALL);

        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDown, 15.0, 15.0, 1));
        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDragged, 16.0, 16.0, 1));
        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDragged, 60.0, 60.0, 1));
        assert!(!control.is_highlighted());
        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDragged, 70.0, 70.0, 1));
        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDragged, 20.0, 20.0, 1));
        assert!(control.is_highlighted());
        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDragged, 80.0, 20.0, 1));
        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseUp, 80.0, 20.0, 1));

        assert_eq!(
            *log.borrow(),
            vec![
                ControlEvent::MOUSE_DOWN,
                ControlEvent::MOUSE_DRAG_INSIDE,
                ControlEvent::MOUSE_DRAG_EXIT,
                ControlEvent::MOUSE_DRAG_OUTSIDE,
                ControlEvent::MOUSE_DRAG_ENTER,
                ControlEvent::MOUSE_DRAG_EXIT,
                ControlEvent::MOUSE_UP_OUTSIDE,
            ]
        );
        assert!(!control.is_highlighted());
    }

    #[test]
    fn test_right_button_family_does_not_highlight() {
        let (mut tree, view) = setup();
        let mut control = Control::new();
        let log = recorder(&mut control, ControlEvent::ALL);

        send(&mut control, &mut tree, view, &mouse(EventType::RightMouseDown, 15.0, 15.0, 2));
        assert!(!control.is_highlighted());
        send(&mut control, &mut tree, view, &mouse(EventType::RightMouseUp, 15.0, 15.0, 2));
        send(&mut control, &mut tree, view, &mouse(EventType::OtherMouseDown, 15.0, 15.0, 3));
        send(&mut control, &mut tree, view, &mouse(EventType::OtherMouseUp, 50.0, 15.0, 3));
        assert_eq!(
            *log.borrow(),
            vec![
                ControlEvent::RIGHT_MOUSE_DOWN,
                ControlEvent::RIGHT_MOUSE_UP_INSIDE,
                ControlEvent::OTHER_MOUSE_DOWN,
                ControlEvent::OTHER_MOUSE_UP_OUTSIDE,
            ]
        );
    }

    #[test]
    fn test_only_matching_actions_fire() {
        let (mut tree, view) = setup();
        let mut control = Control::new();
        let ups = recorder(&mut control, ControlEvent::MOUSE_UP_INSIDE);
        let downs = recorder(&mut control, ControlEvent::MOUSE_DOWN | ControlEvent::RIGHT_MOUSE_DOWN);

        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDown, 15.0, 15.0, 1));
        send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseUp, 15.0, 15.0, 1));
        assert_eq!(*ups.borrow(), vec![ControlEvent::MOUSE_UP_INSIDE]);
        assert_eq!(*downs.borrow(), vec![ControlEvent::MOUSE_DOWN]);
    }

    #[test]
    fn test_remove_action_per_mask() {
        let mut control = Control::new();
        let id = control.add_action(ControlEvent::MOUSE_DOWN | ControlEvent::MOUSE_UP_INSIDE, |_, _| {});
        control.remove_action(id, Some(ControlEvent::MOUSE_DOWN));
        assert_eq!(control.all_control_events(), ControlEvent::MOUSE_UP_INSIDE);
        control.remove_action(id, Some(ControlEvent::MOUSE_UP_INSIDE));
        assert!(control.all_control_events().is_empty());

        let other = control.add_action(ControlEvent::VALUE_CHANGED, |_, _| {});
        control.remove_action(other, None);
        assert!(control.all_control_events().is_empty());
    }

    #[test]
    fn test_disabled_control_forwards() {
        let (mut tree, view) = setup();
        let mut control = Control::new();
        let log = recorder(&mut control, ControlEvent::ALL);
        control.set_enabled(false);

        let dispatch = send(&mut control, &mut tree, view, &mouse(EventType::LeftMouseDown, 15.0, 15.0, 1));
        assert_eq!(dispatch, Dispatch::Forward);
        assert!(log.borrow().is_empty());
        assert!(!control.is_highlighted());
    }
}
