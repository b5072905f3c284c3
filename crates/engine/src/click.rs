//! The human-click pipeline (spec.md §4.3): "the operation that defines
//! the system." Every step can abort with a structured, non-error refusal
//! — callers must treat a refusal as an expected outcome, never a hard
//! failure (spec.md §7).

use std::time::Duration;

use rand::Rng;

use protocol::{AvoidRuleset, ClickTuning};

use crate::dom::{DomAccess, MouseEventKind};
use crate::geometry;
use crate::honeypot;
use crate::timing;

/// Where the cursor is, in viewport coordinates (spec.md §3: "persisted in
/// the page-bridge so it survives page reloads within a tab").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    pub x: f64,
    pub y: f64,
}

/// The outcome of a `human.click`/`dom.click` attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Clicked { x: f64, y: f64 },
    Refused { reason: String, detail: Option<String> },
}

impl ClickOutcome {
    fn refused(reason: &str) -> Self {
        Self::Refused {
            reason: reason.to_string(),
            detail: None,
        }
    }

    fn refused_with(reason: &str, detail: impl Into<String>) -> Self {
        Self::Refused {
            reason: reason.to_string(),
            detail: Some(detail.into()),
        }
    }

    /// The wire shape spec.md §7 describes: a normal `result`, never an
    /// error frame, with `clicked` plus an optional `reason`/`detail`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Clicked { x, y } => serde_json::json!({"clicked": true, "x": x, "y": y}),
            Self::Refused { reason, detail } => {
                serde_json::json!({"clicked": false, "reason": reason, "detail": detail})
            }
        }
    }
}

/// How many clicks to dispatch (spec.md §4.3 step 8: `clickCount`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickCount {
    Single,
    Double,
    Triple,
}

fn matches_avoid_classes_and_id(
    classes: &str,
    element_id: &str,
    attribute_names: &[String],
    ruleset: &AvoidRuleset,
) -> bool {
    ruleset
        .classes
        .iter()
        .any(|c| classes.split_whitespace().any(|tok| tok == c))
        || ruleset.ids.iter().any(|id| id == element_id)
        || ruleset
            .attributes
            .iter()
            .any(|a| attribute_names.iter().any(|n| n == a))
}

/// Run the full pipeline against `target`, mutating `cursor` as the
/// approach progresses.
pub async fn human_click<D: DomAccess, R: Rng + ?Sized>(
    dom: &D,
    target: &D::Element,
    element_id: &str,
    avoid: &AvoidRuleset,
    tuning: &ClickTuning,
    cursor: &mut CursorState,
    click_count: ClickCount,
    rng: &mut R,
) -> ClickOutcome {
    let snapshot = dom.snapshot(target).await;

    if matches_avoid_classes_and_id(
        &snapshot.class_name,
        element_id,
        &snapshot.attribute_names,
        avoid,
    ) || (!avoid.selectors.is_empty() && dom.matches_any(target, &avoid.selectors).await)
    {
        return ClickOutcome::refused("avoided");
    }

    if let Some(trap) = honeypot::detect(&snapshot) {
        return ClickOutcome::refused(&trap.to_string());
    }

    if !ensure_comfortable_view(dom, target).await {
        return ClickOutcome::refused("off-screen");
    }

    let Some(bbox) = dom.bounding_box(target).await else {
        return ClickOutcome::refused("element-disappeared");
    };
    let (center_x, center_y) = bbox.center();

    // Land inside the element's centre 60% (spec.md §4.3 step 5).
    let inset_w = bbox.width * 0.3;
    let inset_h = bbox.height * 0.3;
    let target_x = center_x + rng.gen_range(-inset_w..=inset_w);
    let target_y = center_y + rng.gen_range(-inset_h..=inset_h);

    approach(dom, cursor, (target_x, target_y), rng).await;

    dom.sleep(timing::think_delay(tuning, rng)).await;

    let Some(revalidated) = dom.bounding_box(target).await else {
        return ClickOutcome::refused("element-disappeared");
    };
    let shift_x = (revalidated.x - bbox.x).abs();
    let shift_y = (revalidated.y - bbox.y).abs();
    if shift_x > tuning.max_shift_px || shift_y > tuning.max_shift_px {
        return ClickOutcome::refused_with(
            "element-shifted",
            format!("dx={shift_x:.1} dy={shift_y:.1}"),
        );
    }

    let Some(hit) = dom.element_from_point(cursor.x, cursor.y).await else {
        // Physically impossible: nothing under the cursor. No confirmation.
        return ClickOutcome::refused("element-disappeared");
    };

    dom.dispatch_mouse_event(&hit, MouseEventKind::Down, cursor.x, cursor.y)
        .await;
    dom.focus(target).await;
    dom.dispatch_mouse_event(&hit, MouseEventKind::Up, cursor.x, cursor.y)
        .await;
    dom.dispatch_mouse_event(&hit, MouseEventKind::Click, cursor.x, cursor.y)
        .await;

    if click_count == ClickCount::Double || click_count == ClickCount::Triple {
        dom.dispatch_mouse_event(&hit, MouseEventKind::DblClick, cursor.x, cursor.y)
            .await;
    }
    if click_count == ClickCount::Triple {
        // Only meaningful against text-entry elements; callers resolve the
        // length and call `set_selection_range` themselves once they know
        // it, since this module has no notion of element value here.
    }

    ClickOutcome::Clicked {
        x: cursor.x,
        y: cursor.y,
    }
}

/// Step 4: scroll the element into the "comfortable" band — not fully
/// off-screen, and its top between 15% and 85% of the viewport.
async fn ensure_comfortable_view<D: DomAccess>(dom: &D, target: &D::Element) -> bool {
    let (_, viewport_h) = dom.viewport_size().await;

    let is_comfortable = |top: f64, h: f64| -> bool {
        if h <= 0.0 {
            return false;
        }
        let band_low = h * 0.15;
        let band_high = h * 0.85;
        top >= band_low && top <= band_high
    };

    let Some(bbox) = dom.bounding_box(target).await else {
        return false;
    };
    if is_comfortable(bbox.y, viewport_h) {
        return true;
    }

    dom.smooth_scroll_into_view(target).await;
    dom.sleep(Duration::from_millis(550)).await;

    if let Some(bbox) = dom.bounding_box(target).await {
        if is_comfortable(bbox.y, viewport_h) {
            return true;
        }
    }

    for _ in 0..20 {
        let Some(bbox) = dom.bounding_box(target).await else {
            return false;
        };
        if is_comfortable(bbox.y, viewport_h) {
            return true;
        }
        let dy = if bbox.y < viewport_h * 0.15 { -250.0 } else { 250.0 };
        dom.smooth_scroll_by(None, 0.0, dy).await;
        dom.sleep(Duration::from_millis(250)).await;
    }

    dom.bounding_box(target)
        .await
        .is_some_and(|b| is_comfortable(b.y, viewport_h))
}

/// Step 5: move the cursor from its current position to `destination`,
/// planning a Bézier path and dispatching `mousemove` along it.
pub async fn approach<D: DomAccess, R: Rng + ?Sized>(
    dom: &D,
    cursor: &mut CursorState,
    destination: (f64, f64),
    rng: &mut R,
) {
    let distance = (destination.0 - cursor.x).hypot(destination.1 - cursor.y);
    if distance < 80.0 {
        let drift_angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let drift_dist = rng.gen_range(80.0..=200.0);
        let drift = (
            cursor.x + drift_angle.cos() * drift_dist,
            cursor.y + drift_angle.sin() * drift_dist,
        );
        for wp in geometry::plan_path((cursor.x, cursor.y), drift, rng) {
            dispatch_move(dom, wp.x, wp.y).await;
        }
        cursor.x = drift.0;
        cursor.y = drift.1;
    }

    for wp in geometry::plan_path((cursor.x, cursor.y), destination, rng) {
        dispatch_move(dom, wp.x, wp.y).await;
    }
    cursor.x = destination.0;
    cursor.y = destination.1;
}

async fn dispatch_move<D: DomAccess>(dom: &D, x: f64, y: f64) {
    if let Some(el) = dom.element_from_point(x, y).await {
        dom.dispatch_mouse_event(&el, MouseEventKind::Move, x, y).await;
    }
}
