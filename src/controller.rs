//! View controllers

use crate::geometry::Rect;
use crate::responder::{PlainView, Responder};
use crate::view::{ViewId, ViewTree};

/// Owns a view subtree and sits between that view and its superview in the
/// responder chain.
///
/// Appearance hooks are driven by
/// [`ViewTree::begin_appearance_transition`] and
/// [`ViewTree::end_appearance_transition`].
#[allow(unused_variables)]
pub trait ViewController: Responder {
    /// Create the controller's view. The default is an empty view.
    fn load_view(&mut self, tree: &mut ViewTree, frame: Rect) -> ViewId {
        tree.add_view(frame, Box::new(PlainView))
    }

    fn view_did_load(&mut self, tree: &mut ViewTree, view: ViewId) {}

    fn view_will_appear(&mut self, animated: bool) {}

    fn view_did_appear(&mut self, animated: bool) {}

    fn view_will_disappear(&mut self, animated: bool) {}

    fn view_did_disappear(&mut self, animated: bool) {}
}
