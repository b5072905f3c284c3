//! `human.clearInput` (spec.md §4.3): focus via a human click, triple-click
//! with human pauses to select all, then a brief pause and `Backspace`.

use std::time::Duration;

use protocol::{AvoidRuleset, ClickTuning};
use rand::Rng;

use crate::click::{self, ClickCount, ClickOutcome, CursorState};
use crate::dom::{DomAccess, KeyEvent, KeyEventKind, Modifiers};

#[derive(Debug, Clone, PartialEq)]
pub enum ClearOutcome {
    Cleared,
    Refused { reason: String },
}

impl ClearOutcome {
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Cleared => serde_json::json!({"cleared": true}),
            Self::Refused { reason } => serde_json::json!({"cleared": false, "reason": reason}),
        }
    }
}

pub async fn human_clear_input<D: DomAccess, R: Rng + ?Sized>(
    dom: &D,
    target: &D::Element,
    element_id: &str,
    avoid: &AvoidRuleset,
    tuning: &ClickTuning,
    cursor: &mut CursorState,
    rng: &mut R,
) -> ClearOutcome {
    let first = click::human_click(
        dom,
        target,
        element_id,
        avoid,
        tuning,
        cursor,
        ClickCount::Single,
        rng,
    )
    .await;
    if let ClickOutcome::Refused { reason, .. } = first {
        return ClearOutcome::Refused { reason };
    }

    dom.sleep(Duration::from_millis(rng.gen_range(60..=140))).await;

    let second = click::human_click(
        dom,
        target,
        element_id,
        avoid,
        tuning,
        cursor,
        ClickCount::Triple,
        rng,
    )
    .await;
    if let ClickOutcome::Refused { reason, .. } = second {
        return ClearOutcome::Refused { reason };
    }

    dom.set_selection_range(target, 0, usize::MAX).await;
    dom.sleep(Duration::from_millis(rng.gen_range(80..=160))).await;

    dom.dispatch_key_event(KeyEvent {
        kind: KeyEventKind::Down,
        key: "Backspace".into(),
        code: "Backspace".into(),
        key_code: 8,
        char_code: 0,
        modifiers: Modifiers::default(),
    })
    .await;
    dom.set_native_value(target, "").await;
    dom.dispatch_key_event(KeyEvent {
        kind: KeyEventKind::Up,
        key: "Backspace".into(),
        code: "Backspace".into(),
        key_code: 8,
        char_code: 0,
        modifiers: Modifiers::default(),
    })
    .await;

    ClearOutcome::Cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fake::{FakeDom, FakeElementState};
    use crate::honeypot::{BoundingBox, ElementSnapshot};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(13)
    }

    #[tokio::test]
    async fn clears_value_after_focus_and_select_all() {
        let fake = FakeDom::new();
        let snapshot = ElementSnapshot {
            has_offset_parent: true,
            opacity: 1.0,
            style_width: 150.0,
            style_height: 30.0,
            bounding_box: BoundingBox {
                x: 20.0,
                y: 250.0,
                width: 150.0,
                height: 30.0,
            },
            ..Default::default()
        };
        let el = fake.insert(FakeElementState {
            snapshot: snapshot.clone(),
            bounding_box: Some(snapshot.bounding_box),
            value: "existing text".into(),
            ..Default::default()
        });
        *fake.point_target.borrow_mut() = Some(el);
        let mut cursor = CursorState { x: 0.0, y: 0.0 };
        let outcome = human_clear_input(
            &fake,
            &el,
            "",
            &AvoidRuleset::default(),
            &ClickTuning::default(),
            &mut cursor,
            &mut rng(),
        )
        .await;
        assert_eq!(outcome, ClearOutcome::Cleared);
        assert_eq!(fake.elements.borrow().get(&el.0).unwrap().value, "");
    }

    #[tokio::test]
    async fn refusal_on_initial_click_short_circuits_clear() {
        let fake = FakeDom::new();
        let snapshot = ElementSnapshot {
            has_offset_parent: true,
            opacity: 0.0,
            bounding_box: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 30.0,
            },
            ..Default::default()
        };
        let el = fake.insert(FakeElementState {
            snapshot: snapshot.clone(),
            bounding_box: Some(snapshot.bounding_box),
            ..Default::default()
        });
        let mut cursor = CursorState { x: 0.0, y: 0.0 };
        let outcome = human_clear_input(
            &fake,
            &el,
            "",
            &AvoidRuleset::default(),
            &ClickTuning::default(),
            &mut cursor,
            &mut rng(),
        )
        .await;
        assert_eq!(
            outcome,
            ClearOutcome::Refused {
                reason: "opacity-zero".into()
            }
        );
    }
}
