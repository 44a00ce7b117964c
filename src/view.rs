//! Per-window view arena
//!
//! Views and view controllers live in flat vectors owned by the window and
//! refer to each other through [`ViewId`] / [`ControllerId`] handles. Slots
//! are never reused, so a handle to a removed view simply stops resolving.
//!
//! A view's position in window space is `center`, `bounds` and an affine
//! `transform` around the center, composed with its superview's. That
//! composition is cached per view and dropped for a whole subtree whenever
//! any input changes.

use std::any::Any;
use std::cell::Cell;

use tracing::trace;

use crate::controller::ViewController;
use crate::geometry::{identity, translation, Point, Rect, Size, Transform};
use crate::responder::{PlainView, Responder};

/// Views with lower alpha are invisible to hit-testing.
const MIN_HIT_ALPHA: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(usize);

struct ViewNode {
    bounds: Rect,
    center: Point,
    transform: Transform,
    hidden: bool,
    alpha: f64,
    user_interaction_enabled: bool,
    superview: Option<ViewId>,
    subviews: Vec<ViewId>,
    controller: Option<ControllerId>,
    responder: Option<Box<dyn Responder>>,
    needs_display: Option<Rect>,
    to_window: Cell<Option<Transform>>,
}

impl ViewNode {
    fn new(frame: Rect, responder: Box<dyn Responder>) -> Self {
        Self {
            bounds: Rect::with_size(frame.size),
            center: frame.center(),
            transform: identity(),
            hidden: false,
            alpha: 1.0,
            user_interaction_enabled: true,
            superview: None,
            subviews: Vec::new(),
            controller: None,
            responder: Some(responder),
            needs_display: None,
            to_window: Cell::new(None),
        }
    }
}

struct ControllerNode {
    behavior: Option<Box<dyn ViewController>>,
    view: Option<ViewId>,
    parent: Option<ControllerId>,
    children: Vec<ControllerId>,
    /// `Some(appearing)` between begin and end of an appearance transition.
    transition: Option<bool>,
}

pub struct ViewTree {
    views: Vec<Option<ViewNode>>,
    controllers: Vec<Option<ControllerNode>>,
    root: ViewId,
}

impl ViewTree {
    /// A tree whose root view covers `frame` and maps 1:1 to window space.
    pub fn new(frame: Rect) -> Self {
        Self {
            views: vec![Some(ViewNode::new(Rect::with_size(frame.size), Box::new(PlainView)))],
            controllers: Vec::new(),
            root: ViewId(0),
        }
    }

    pub fn root(&self) -> ViewId {
        self.root
    }

    fn node(&self, id: ViewId) -> Option<&ViewNode> {
        self.views.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: ViewId) -> Option<&mut ViewNode> {
        self.views.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.node(id).is_some()
    }

    /// Create a detached view with `frame` in its future superview's space.
    pub fn add_view(&mut self, frame: Rect, responder: Box<dyn Responder>) -> ViewId {
        let id = ViewId(self.views.len());
        self.views.push(Some(ViewNode::new(frame, responder)));
        id
    }

    /// Append `child` as the front-most subview of `parent`.
    pub fn add_subview(&mut self, parent: ViewId, child: ViewId) {
        let index = self.node(parent).map_or(0, |p| p.subviews.len());
        self.insert_subview(parent, child, index);
    }

    pub fn insert_subview(&mut self, parent: ViewId, child: ViewId, index: usize) {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return;
        }
        if self.is_descendant(parent, child) {
            return;
        }
        self.remove_from_superview(child);
        if let Some(p) = self.node_mut(parent) {
            let index = index.min(p.subviews.len());
            p.subviews.insert(index, child);
        }
        if let Some(c) = self.node_mut(child) {
            c.superview = Some(parent);
        }
        self.invalidate_transforms(child);
    }

    pub fn remove_from_superview(&mut self, child: ViewId) {
        let Some(parent) = self.node(child).and_then(|c| c.superview) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.subviews.retain(|&s| s != child);
        }
        if let Some(c) = self.node_mut(child) {
            c.superview = None;
        }
        self.invalidate_transforms(child);
    }

    /// Destroy `id` and its whole subtree. Returns every removed id.
    /// The root view cannot be removed.
    pub fn remove_view(&mut self, id: ViewId) -> Vec<ViewId> {
        if id == self.root || !self.contains(id) {
            return Vec::new();
        }
        self.remove_from_superview(id);

        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.views.get_mut(next.0).and_then(Option::take) {
                if let Some(controller) = node.controller {
                    if let Some(c) = self.controller_node_mut(controller) {
                        c.view = None;
                    }
                }
                pending.extend(node.subviews);
                removed.push(next);
            }
        }
        trace!(count = removed.len(), "views removed");
        removed
    }

    /// True if `view` is `ancestor` or lies below it.
    pub fn is_descendant(&self, view: ViewId, ancestor: ViewId) -> bool {
        let mut current = Some(view);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.superview(id);
        }
        false
    }

    pub fn superview(&self, id: ViewId) -> Option<ViewId> {
        self.node(id).and_then(|n| n.superview)
    }

    pub fn subviews(&self, id: ViewId) -> &[ViewId] {
        self.node(id).map_or(&[], |n| n.subviews.as_slice())
    }

    /// Controller whose view this is.
    pub fn view_controller(&self, id: ViewId) -> Option<ControllerId> {
        self.node(id).and_then(|n| n.controller)
    }

    pub fn bounds(&self, id: ViewId) -> Rect {
        self.node(id).map_or(Rect::zero(), |n| n.bounds)
    }

    pub fn center(&self, id: ViewId) -> Point {
        self.node(id).map_or(Point::origin(), |n| n.center)
    }

    pub fn transform(&self, id: ViewId) -> Transform {
        self.node(id).map_or(identity(), |n| n.transform)
    }

    /// Bounding box in the superview's space.
    pub fn frame(&self, id: ViewId) -> Rect {
        let Some(node) = self.node(id) else {
            return Rect::zero();
        };
        let size = Rect::with_size(node.bounds.size)
            .applying(&node.transform)
            .size;
        Rect::new(
            node.center.x - size.width / 2.0,
            node.center.y - size.height / 2.0,
            size.width,
            size.height,
        )
    }

    pub fn set_frame(&mut self, id: ViewId, frame: Rect) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let size = if node.transform == identity() {
            frame.size
        } else {
            let inverse = node.transform.try_inverse().unwrap_or_else(identity);
            Rect::with_size(frame.size).applying(&inverse).size
        };
        node.bounds.size = size;
        node.center = frame.center();
        self.invalidate_transforms(id);
    }

    pub fn set_bounds(&mut self, id: ViewId, bounds: Rect) {
        if let Some(node) = self.node_mut(id) {
            node.bounds = bounds;
            self.invalidate_transforms(id);
        }
    }

    pub fn set_size(&mut self, id: ViewId, size: Size) {
        if let Some(node) = self.node_mut(id) {
            node.bounds.size = size;
            self.invalidate_transforms(id);
        }
    }

    pub fn set_center(&mut self, id: ViewId, center: Point) {
        if let Some(node) = self.node_mut(id) {
            node.center = center;
            self.invalidate_transforms(id);
        }
    }

    pub fn set_transform(&mut self, id: ViewId, transform: Transform) {
        if let Some(node) = self.node_mut(id) {
            node.transform = transform;
            self.invalidate_transforms(id);
        }
    }

    pub fn is_hidden(&self, id: ViewId) -> bool {
        self.node(id).is_some_and(|n| n.hidden)
    }

    pub fn set_hidden(&mut self, id: ViewId, hidden: bool) {
        if let Some(node) = self.node_mut(id) {
            node.hidden = hidden;
        }
    }

    pub fn alpha(&self, id: ViewId) -> f64 {
        self.node(id).map_or(0.0, |n| n.alpha)
    }

    pub fn set_alpha(&mut self, id: ViewId, alpha: f64) {
        if let Some(node) = self.node_mut(id) {
            node.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    pub fn is_user_interaction_enabled(&self, id: ViewId) -> bool {
        self.node(id).is_some_and(|n| n.user_interaction_enabled)
    }

    pub fn set_user_interaction_enabled(&mut self, id: ViewId, enabled: bool) {
        if let Some(node) = self.node_mut(id) {
            node.user_interaction_enabled = enabled;
        }
    }

    fn invalidate_transforms(&self, id: ViewId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.node(next) {
                node.to_window.set(None);
                pending.extend_from_slice(&node.subviews);
            }
        }
    }

    /// View space to window space. Detached views and the root map 1:1.
    pub fn transform_to_window(&self, id: ViewId) -> Transform {
        let Some(node) = self.node(id) else {
            return identity();
        };
        if let Some(cached) = node.to_window.get() {
            return cached;
        }
        let transform = match node.superview {
            None => identity(),
            Some(parent) => {
                let (half_w, half_h) = (node.bounds.size.width / 2.0, node.bounds.size.height / 2.0);
                self.transform_to_window(parent)
                    * translation(node.center.x - half_w, node.center.y - half_h)
                    * translation(half_w, half_h)
                    * node.transform
                    * translation(-half_w, -half_h)
                    * translation(-node.bounds.origin.x, -node.bounds.origin.y)
            }
        };
        node.to_window.set(Some(transform));
        transform
    }

    pub fn transform_from_window(&self, id: ViewId) -> Transform {
        self.transform_to_window(id)
            .try_inverse()
            .unwrap_or_else(identity)
    }

    pub fn convert_to_window(&self, id: ViewId, point: Point) -> Point {
        self.transform_to_window(id).transform_point(&point)
    }

    pub fn convert_from_window(&self, id: ViewId, point: Point) -> Point {
        self.transform_from_window(id).transform_point(&point)
    }

    /// Convert between two views' spaces; `None` means window space.
    pub fn convert_point(&self, point: Point, from: Option<ViewId>, to: Option<ViewId>) -> Point {
        let in_window = match from {
            Some(from) => self.convert_to_window(from, point),
            None => point,
        };
        match to {
            Some(to) => self.convert_from_window(to, in_window),
            None => in_window,
        }
    }

    pub fn point_inside(&self, id: ViewId, point: &Point) -> bool {
        self.node(id).is_some_and(|n| n.bounds.contains(point))
    }

    /// Deepest view under `point` (in `start`'s space), front-most first.
    ///
    /// Hidden, input-disabled and transparent subviews are skipped along
    /// with everything below them.
    pub fn hit_test(&self, start: ViewId, point: Point) -> Option<ViewId> {
        if !self.point_inside(start, &point) {
            return None;
        }
        let mut result = start;
        let mut interest = point;
        'descend: loop {
            for &sub in self.subviews(result).iter().rev() {
                let Some(node) = self.node(sub) else {
                    continue;
                };
                if !node.user_interaction_enabled || node.hidden || node.alpha < MIN_HIT_ALPHA {
                    continue;
                }
                let converted = self.convert_point(interest, Some(result), Some(sub));
                if self.point_inside(sub, &converted) {
                    result = sub;
                    interest = converted;
                    continue 'descend;
                }
            }
            return Some(result);
        }
    }

    pub fn set_needs_display(&mut self, id: ViewId) {
        let bounds = self.bounds(id);
        self.set_needs_display_in(id, bounds);
    }

    pub fn set_needs_display_in(&mut self, id: ViewId, rect: Rect) {
        if let Some(node) = self.node_mut(id) {
            node.needs_display = Some(match node.needs_display {
                Some(dirty) => dirty.union(&rect),
                None => rect,
            });
        }
    }

    pub fn needs_display(&self, id: ViewId) -> bool {
        self.node(id).is_some_and(|n| n.needs_display.is_some())
    }

    /// Dirty rect accumulated since the last call, for the renderer.
    pub fn take_needs_display(&mut self, id: ViewId) -> Option<Rect> {
        self.node_mut(id).and_then(|n| n.needs_display.take())
    }

    /// Typed access to a view's responder behavior.
    pub fn responder_mut<T: Responder>(&mut self, id: ViewId) -> Option<&mut T> {
        let responder: &mut dyn Responder = self.node_mut(id)?.responder.as_deref_mut()?;
        let any: &mut dyn Any = responder;
        any.downcast_mut::<T>()
    }

    pub(crate) fn take_responder(&mut self, id: ViewId) -> Option<Box<dyn Responder>> {
        self.node_mut(id).and_then(|n| n.responder.take())
    }

    pub(crate) fn restore_responder(&mut self, id: ViewId, responder: Box<dyn Responder>) {
        if let Some(node) = self.node_mut(id) {
            node.responder = Some(responder);
        }
    }

    fn controller_node(&self, id: ControllerId) -> Option<&ControllerNode> {
        self.controllers.get(id.0).and_then(Option::as_ref)
    }

    fn controller_node_mut(&mut self, id: ControllerId) -> Option<&mut ControllerNode> {
        self.controllers.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn add_controller(&mut self, controller: Box<dyn ViewController>) -> ControllerId {
        let id = ControllerId(self.controllers.len());
        self.controllers.push(Some(ControllerNode {
            behavior: Some(controller),
            view: None,
            parent: None,
            children: Vec::new(),
            transition: None,
        }));
        id
    }

    /// The controller's view, if it has been loaded.
    pub fn controller_view(&self, id: ControllerId) -> Option<ViewId> {
        self.controller_node(id).and_then(|c| c.view)
    }

    pub fn is_view_loaded(&self, id: ControllerId) -> bool {
        self.controller_view(id).is_some()
    }

    /// Load the controller's view on first use.
    pub fn load_view_if_needed(&mut self, id: ControllerId) -> Option<ViewId> {
        let node = self.controller_node_mut(id)?;
        if let Some(view) = node.view {
            return Some(view);
        }
        let mut behavior = node.behavior.take();
        let view = match behavior.as_mut() {
            Some(controller) => controller.load_view(self, Rect::zero()),
            None => self.add_view(Rect::zero(), Box::new(PlainView)),
        };
        if let Some(v) = self.node_mut(view) {
            v.controller = Some(id);
        }
        if let Some(c) = self.controller_node_mut(id) {
            c.view = Some(view);
        }
        if let Some(controller) = behavior.as_mut() {
            controller.view_did_load(self, view);
        }
        if let (Some(c), Some(behavior)) = (self.controller_node_mut(id), behavior) {
            c.behavior = Some(behavior);
        }
        Some(view)
    }

    pub fn parent_controller(&self, id: ControllerId) -> Option<ControllerId> {
        self.controller_node(id).and_then(|c| c.parent)
    }

    pub fn child_controllers(&self, id: ControllerId) -> &[ControllerId] {
        self.controller_node(id)
            .map_or(&[], |c| c.children.as_slice())
    }

    pub fn add_child_controller(&mut self, parent: ControllerId, child: ControllerId) {
        if parent == child || self.controller_node(parent).is_none() {
            return;
        }
        self.remove_controller_from_parent(child);
        if let Some(c) = self.controller_node_mut(child) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.controller_node_mut(parent) {
            p.children.push(child);
        }
    }

    pub fn remove_controller_from_parent(&mut self, child: ControllerId) {
        let Some(parent) = self.controller_node_mut(child).and_then(|c| c.parent.take()) else {
            return;
        };
        if let Some(p) = self.controller_node_mut(parent) {
            p.children.retain(|&c| c != child);
        }
    }

    pub fn begin_appearance_transition(&mut self, id: ControllerId, appearing: bool, animated: bool) {
        let Some(node) = self.controller_node_mut(id) else {
            return;
        };
        node.transition = Some(appearing);
        if let Some(controller) = node.behavior.as_mut() {
            if appearing {
                controller.view_will_appear(animated);
            } else {
                controller.view_will_disappear(animated);
            }
        }
    }

    /// # Panics
    ///
    /// Without a matching [`begin_appearance_transition`](Self::begin_appearance_transition).
    pub fn end_appearance_transition(&mut self, id: ControllerId, animated: bool) {
        let Some(node) = self.controller_node_mut(id) else {
            return;
        };
        let Some(appearing) = node.transition.take() else {
            panic!("unbalanced end_appearance_transition for view controller {id:?}");
        };
        if let Some(controller) = node.behavior.as_mut() {
            if appearing {
                controller.view_did_appear(animated);
            } else {
                controller.view_did_disappear(animated);
            }
        }
    }

    pub fn controller_mut<T: ViewController>(&mut self, id: ControllerId) -> Option<&mut T> {
        let controller: &mut dyn ViewController = self.controller_node_mut(id)?.behavior.as_deref_mut()?;
        let any: &mut dyn Any = controller;
        any.downcast_mut::<T>()
    }

    pub(crate) fn take_controller(&mut self, id: ControllerId) -> Option<Box<dyn ViewController>> {
        self.controller_node_mut(id).and_then(|c| c.behavior.take())
    }

    pub(crate) fn restore_controller(&mut self, id: ControllerId, controller: Box<dyn ViewController>) {
        if let Some(node) = self.controller_node_mut(id) {
            node.behavior = Some(controller);
        }
    }
}
