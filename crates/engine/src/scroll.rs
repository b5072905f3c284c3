//! Human-scroll pipeline and its non-human fallback (spec.md §4.3).

use std::time::Duration;

use protocol::ScrollTuning;
use rand::Rng;
use serde::Serialize;

use crate::dom::DomAccess;
use crate::timing;

const FLICK_MIN: f64 = 150.0;
const FLICK_MAX: f64 = 350.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HumanScrollResult {
    pub scrolled: bool,
    pub amount: f64,
}

/// `human.scroll`: breaks `amount` (or a random pick in tuning's range)
/// into flicks of 150-350px with inter-flick pauses, an occasional small
/// corrective back-scroll, and a settle pause at the end.
pub async fn human_scroll<D: DomAccess, R: Rng + ?Sized>(
    dom: &D,
    target: Option<&D::Element>,
    requested_amount: Option<f64>,
    direction: f64,
    tuning: &ScrollTuning,
    rng: &mut R,
) -> HumanScrollResult {
    let total = requested_amount.unwrap_or_else(|| timing::scroll_amount(tuning, rng));
    let sign = direction.signum();
    let mut remaining = total;

    while remaining > 0.0 {
        let flick = rng.gen_range(FLICK_MIN..=FLICK_MAX).min(remaining);
        dom.smooth_scroll_by(target, 0.0, sign * flick).await;
        remaining -= flick;
        dom.sleep(Duration::from_millis(rng.gen_range(150..=400))).await;

        if let Some(back) = timing::maybe_back_scroll(tuning, rng) {
            dom.sleep(Duration::from_millis(rng.gen_range(200..=300))).await;
            dom.smooth_scroll_by(target, 0.0, -sign * back).await;
        }
    }

    dom.sleep(Duration::from_millis(500)).await;

    HumanScrollResult {
        scrolled: total > 0.0,
        amount: total,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollResult {
    pub scrolled: bool,
    pub before: f64,
    pub after: f64,
}

/// `dom.scroll`: the non-human variant — scrolls by an exact amount and
/// reports before/after so callers can detect bottom-of-content.
pub async fn scroll_exact<D: DomAccess>(
    dom: &D,
    target: Option<&D::Element>,
    before: f64,
    amount: f64,
) -> ScrollResult {
    dom.smooth_scroll_by(target, 0.0, amount).await;
    let after = before + amount;
    ScrollResult {
        scrolled: (after - before).abs() > f64::EPSILON,
        before,
        after,
    }
}
