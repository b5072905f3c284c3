//! The human-type pipeline (spec.md §4.3): focuses the target via the
//! human-click pipeline if needed, then dispatches per-token key events
//! with human-ish inter-token delays.

use protocol::{AvoidRuleset, ClickTuning, TypeTuning};
use rand::Rng;

use crate::click::{self, ClickCount, ClickOutcome, CursorState};
use crate::dom::DomAccess;
use crate::keyboard::{self, ModifierTracker, Token};
use crate::timing;

/// The outcome of a `human.type`/`dom.type` attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeOutcome {
    Typed { final_value: String },
    Refused { reason: String },
}

impl TypeOutcome {
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Typed { final_value } => {
                serde_json::json!({"typed": true, "value": final_value})
            }
            Self::Refused { reason } => serde_json::json!({"typed": false, "reason": reason}),
        }
    }
}

/// Whether `target` already has focus; callers supply this since only the
/// host knows the real focus owner.
pub async fn human_type<D: DomAccess, R: Rng + ?Sized>(
    dom: &D,
    target: &D::Element,
    element_id: &str,
    already_focused: bool,
    text: &str,
    avoid: &AvoidRuleset,
    click_tuning: &ClickTuning,
    type_tuning: &TypeTuning,
    cursor: &mut CursorState,
    modifiers: &mut ModifierTracker,
    current_value: &str,
    rng: &mut R,
) -> TypeOutcome {
    if !already_focused {
        let outcome = click::human_click(
            dom,
            target,
            element_id,
            avoid,
            click_tuning,
            cursor,
            ClickCount::Single,
            rng,
        )
        .await;
        if let ClickOutcome::Refused { reason, .. } = outcome {
            return TypeOutcome::Refused { reason };
        }
    }

    let mut value = current_value.to_string();
    let tokens = keyboard::tokenize(text);

    for token in &tokens {
        keyboard::dispatch_token(dom, token, modifiers.current()).await;

        match token {
            Token::Char(c) => {
                value.push(*c);
                dom.set_native_value(target, &value).await;
            }
            Token::Special(name) => apply_special_key(dom, target, name, &mut value).await,
        }

        let delay = timing::key_delay(type_tuning, rng);
        dom.sleep(delay).await;
        if let Some(pause) = timing::maybe_typing_pause(type_tuning, rng) {
            dom.sleep(pause).await;
        }
    }

    TypeOutcome::Typed { final_value: value }
}

async fn apply_special_key<D: DomAccess>(
    dom: &D,
    target: &D::Element,
    name: &str,
    value: &mut String,
) {
    match name {
        "Backspace" => {
            value.pop();
            dom.set_native_value(target, value).await;
        }
        "Delete" => {
            // Caret-aware deletion needs real selection state; without it,
            // Delete behaves like Backspace against the tail.
            value.pop();
            dom.set_native_value(target, value).await;
        }
        "Enter" | "Tab" | "Escape" | "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight" => {
            // No value mutation; these are structural/navigation keys the
            // page's own handlers (or `<select>`'s native behaviour) react
            // to via the dispatched keydown/keyup pair alone.
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fake::{FakeDom, FakeElementState};
    use crate::honeypot::{BoundingBox, ElementSnapshot};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(5)
    }

    fn focused_input(fake: &FakeDom) -> crate::dom::fake::FakeElement {
        let snapshot = ElementSnapshot {
            has_offset_parent: true,
            opacity: 1.0,
            style_width: 200.0,
            style_height: 30.0,
            bounding_box: BoundingBox {
                x: 10.0,
                y: 300.0,
                width: 200.0,
                height: 30.0,
            },
            ..Default::default()
        };
        fake.insert(FakeElementState {
            snapshot,
            bounding_box: Some(BoundingBox {
                x: 10.0,
                y: 300.0,
                width: 200.0,
                height: 30.0,
            }),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn typing_appends_each_character_to_value() {
        let fake = FakeDom::new();
        let el = focused_input(&fake);
        let mut cursor = CursorState { x: 0.0, y: 0.0 };
        let mut modifiers = ModifierTracker::new();
        let outcome = human_type(
            &fake,
            &el,
            "",
            true,
            "hi",
            &AvoidRuleset::default(),
            &ClickTuning::default(),
            &TypeTuning::default(),
            &mut cursor,
            &mut modifiers,
            "",
            &mut rng(),
        )
        .await;
        assert_eq!(
            outcome,
            TypeOutcome::Typed {
                final_value: "hi".into()
            }
        );
        assert_eq!(fake.key_events.borrow().len(), 6); // (keydown+keypress+keyup) x 2 chars
    }

    #[tokio::test]
    async fn backspace_pops_last_character() {
        let fake = FakeDom::new();
        let el = focused_input(&fake);
        let mut cursor = CursorState { x: 0.0, y: 0.0 };
        let mut modifiers = ModifierTracker::new();
        let outcome = human_type(
            &fake,
            &el,
            "",
            true,
            "ab{Backspace}",
            &AvoidRuleset::default(),
            &ClickTuning::default(),
            &TypeTuning::default(),
            &mut cursor,
            &mut modifiers,
            "",
            &mut rng(),
        )
        .await;
        assert_eq!(
            outcome,
            TypeOutcome::Typed {
                final_value: "a".into()
            }
        );
    }

    #[tokio::test]
    async fn not_focused_and_click_refused_short_circuits_typing() {
        let fake = FakeDom::new();
        let mut snapshot = ElementSnapshot {
            has_offset_parent: true,
            opacity: 0.0,
            ..Default::default()
        };
        snapshot.bounding_box = BoundingBox {
            x: 10.0,
            y: 300.0,
            width: 100.0,
            height: 30.0,
        };
        let el = fake.insert(FakeElementState {
            snapshot: snapshot.clone(),
            bounding_box: Some(snapshot.bounding_box),
            ..Default::default()
        });
        let mut cursor = CursorState { x: 0.0, y: 0.0 };
        let mut modifiers = ModifierTracker::new();
        let outcome = human_type(
            &fake,
            &el,
            "",
            false,
            "text",
            &AvoidRuleset::default(),
            &ClickTuning::default(),
            &TypeTuning::default(),
            &mut cursor,
            &mut modifiers,
            "",
            &mut rng(),
        )
        .await;
        assert_eq!(
            outcome,
            TypeOutcome::Refused {
                reason: "opacity-zero".into()
            }
        );
        assert!(fake.key_events.borrow().is_empty());
    }
}
