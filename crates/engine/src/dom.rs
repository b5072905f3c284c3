//! The DOM-access seam (spec.md §4.3): every pipeline in this crate is
//! written against this trait, never against a concrete browser binding,
//! so it can run against a fake implementation in ordinary `cargo test`
//! and against a real `web_sys`-backed implementation on `wasm32`.
//!
//! Uses native async-fn-in-trait rather than `#[async_trait]` — every
//! method here is a single host round-trip with no need for dynamic
//! dispatch across implementations at runtime.

use std::time::Duration;

use crate::honeypot::{BoundingBox, ElementSnapshot};

/// A key or mouse event kind to synthesize, matching the dispatch
/// sequence spec.md §4.3 step 8 requires (`mousedown -> mouseup -> click`,
/// optionally `dblclick`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Move,
    Down,
    Up,
    Click,
    DblClick,
}

/// A keyboard event kind, mirroring the four-phase dispatch in
/// `human.type` (spec.md §4.3: "dispatches keydown and... keypress...
/// dispatches input... dispatches keyup").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Press,
    Up,
}

/// A single synthesized key event's payload.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: String,
    pub code: String,
    pub key_code: u32,
    pub char_code: u32,
    pub modifiers: Modifiers,
}

/// Tracked modifier state (spec.md §4.3: "tracked across calls via
/// keyDown/keyUp actions and propagated into every event").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Every DOM operation the human-interaction pipelines need, abstracted
/// over a host-supplied element reference type `Element`.
pub trait DomAccess {
    type Element: Clone;

    /// Resolve a CSS selector to at most one element, scoped to `within`
    /// if given (spec.md §4.3: `querySelectorWithin`).
    fn query_selector(
        &self,
        selector: &str,
        within: Option<&Self::Element>,
    ) -> impl std::future::Future<Output = Option<Self::Element>>;

    /// Read everything the honeypot/trap chain needs about `el` in one
    /// round trip.
    fn snapshot(
        &self,
        el: &Self::Element,
    ) -> impl std::future::Future<Output = ElementSnapshot>;

    /// Whether `el` matches any of `selectors` (`Element.matches`),
    /// backing avoid-ruleset selector checks.
    fn matches_any(
        &self,
        el: &Self::Element,
        selectors: &[String],
    ) -> impl std::future::Future<Output = bool>;

    fn bounding_box(
        &self,
        el: &Self::Element,
    ) -> impl std::future::Future<Output = Option<BoundingBox>>;

    /// `document.elementFromPoint(x, y)`, falling back to `document.body`
    /// per spec.md §4.3 step 5's dispatch target rule.
    fn element_from_point(
        &self,
        x: f64,
        y: f64,
    ) -> impl std::future::Future<Output = Option<Self::Element>>;

    fn dispatch_mouse_event(
        &self,
        el: &Self::Element,
        kind: MouseEventKind,
        x: f64,
        y: f64,
    ) -> impl std::future::Future<Output = ()>;

    fn dispatch_key_event(
        &self,
        event: KeyEvent,
    ) -> impl std::future::Future<Output = ()>;

    fn focus(&self, el: &Self::Element) -> impl std::future::Future<Output = ()>;

    /// Mutate the element's value via the platform's native value setter
    /// (spec.md §4.3: "so virtual-DOM frameworks observe the change").
    fn set_native_value(
        &self,
        el: &Self::Element,
        value: &str,
    ) -> impl std::future::Future<Output = ()>;

    fn set_selection_range(
        &self,
        el: &Self::Element,
        start: usize,
        end: usize,
    ) -> impl std::future::Future<Output = ()>;

    fn smooth_scroll_into_view(
        &self,
        el: &Self::Element,
    ) -> impl std::future::Future<Output = ()>;

    /// Smooth-scroll `target` (or the window if `None`) by `(dx, dy)`.
    fn smooth_scroll_by(
        &self,
        target: Option<&Self::Element>,
        dx: f64,
        dy: f64,
    ) -> impl std::future::Future<Output = ()>;

    fn viewport_size(&self) -> impl std::future::Future<Output = (f64, f64)>;

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// A trivial in-memory element: an index into [`FakeDom`]'s table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FakeElement(pub u32);

    #[derive(Debug, Clone, Default)]
    pub struct FakeElementState {
        pub selector: String,
        pub snapshot: ElementSnapshot,
        pub bounding_box: Option<BoundingBox>,
        pub value: String,
    }

    /// A single-threaded, fully inspectable stand-in for the real DOM,
    /// recording every dispatched event so pipeline tests can assert on
    /// dispatch order and targets.
    #[derive(Default)]
    pub struct FakeDom {
        pub elements: RefCell<HashMap<u32, FakeElementState>>,
        pub next_id: RefCell<u32>,
        pub mouse_events: RefCell<Vec<(FakeElement, MouseEventKind, f64, f64)>>,
        pub key_events: RefCell<Vec<KeyEvent>>,
        pub focused: RefCell<Option<FakeElement>>,
        pub point_target: RefCell<Option<FakeElement>>,
        pub scroll_calls: RefCell<u32>,
        pub viewport: RefCell<(f64, f64)>,
    }

    impl FakeDom {
        pub fn new() -> Self {
            Self {
                viewport: RefCell::new((1280.0, 720.0)),
                ..Default::default()
            }
        }

        pub fn insert(&self, state: FakeElementState) -> FakeElement {
            let mut next = self.next_id.borrow_mut();
            let id = *next;
            *next += 1;
            self.elements.borrow_mut().insert(id, state);
            FakeElement(id)
        }
    }

    impl DomAccess for FakeDom {
        type Element = FakeElement;

        async fn query_selector(
            &self,
            selector: &str,
            _within: Option<&Self::Element>,
        ) -> Option<Self::Element> {
            self.elements
                .borrow()
                .iter()
                .find(|(_, s)| s.selector == selector)
                .map(|(id, _)| FakeElement(*id))
        }

        async fn snapshot(&self, el: &Self::Element) -> ElementSnapshot {
            self.elements
                .borrow()
                .get(&el.0)
                .map(|s| s.snapshot.clone())
                .unwrap_or_default()
        }

        async fn matches_any(&self, el: &Self::Element, selectors: &[String]) -> bool {
            self.elements
                .borrow()
                .get(&el.0)
                .is_some_and(|s| selectors.iter().any(|sel| sel == &s.selector))
        }

        async fn bounding_box(&self, el: &Self::Element) -> Option<BoundingBox> {
            self.elements.borrow().get(&el.0).and_then(|s| s.bounding_box)
        }

        async fn element_from_point(&self, _x: f64, _y: f64) -> Option<Self::Element> {
            *self.point_target.borrow()
        }

        async fn dispatch_mouse_event(
            &self,
            el: &Self::Element,
            kind: MouseEventKind,
            x: f64,
            y: f64,
        ) {
            self.mouse_events.borrow_mut().push((*el, kind, x, y));
        }

        async fn dispatch_key_event(&self, event: KeyEvent) {
            self.key_events.borrow_mut().push(event);
        }

        async fn focus(&self, el: &Self::Element) {
            *self.focused.borrow_mut() = Some(*el);
        }

        async fn set_native_value(&self, el: &Self::Element, value: &str) {
            if let Some(state) = self.elements.borrow_mut().get_mut(&el.0) {
                state.value = value.to_string();
            }
        }

        async fn set_selection_range(&self, _el: &Self::Element, _start: usize, _end: usize) {}

        async fn smooth_scroll_into_view(&self, _el: &Self::Element) {
            *self.scroll_calls.borrow_mut() += 1;
        }

        async fn smooth_scroll_by(&self, _target: Option<&Self::Element>, _dx: f64, _dy: f64) {
            *self.scroll_calls.borrow_mut() += 1;
        }

        async fn viewport_size(&self) -> (f64, f64) {
            *self.viewport.borrow()
        }

        async fn sleep(&self, _duration: Duration) {}
    }
}
