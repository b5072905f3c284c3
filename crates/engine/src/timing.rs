//! Human-timing distributions driving the click/type/scroll pipelines
//! (spec.md §4.3): a "think" pause before committing to a click, per-
//! keystroke delay with occasional longer pauses, and scroll-flick sizing
//! with an occasional small back-scroll correction.

use std::time::Duration;

use rand::Rng;

use protocol::{ClickTuning, ScrollTuning, TypeTuning};

/// How long to pause before moving the cursor toward a click target.
pub fn think_delay<R: Rng + ?Sized>(tuning: &ClickTuning, rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(tuning.think_delay_min..=tuning.think_delay_max))
}

/// Delay before the next keystroke, drawn from `[baseDelayMin,
/// baseDelayMax]` and perturbed by `variance` as a fraction of that delay.
pub fn key_delay<R: Rng + ?Sized>(tuning: &TypeTuning, rng: &mut R) -> Duration {
    let base = rng.gen_range(tuning.base_delay_min..=tuning.base_delay_max) as f64;
    let jitter = base * tuning.variance * rng.gen_range(-1.0..=1.0);
    Duration::from_millis((base + jitter).max(0.0) as u64)
}

/// Whether this keystroke should be followed by a longer "thinking" pause,
/// and if so, how long.
pub fn maybe_typing_pause<R: Rng + ?Sized>(
    tuning: &TypeTuning,
    rng: &mut R,
) -> Option<Duration> {
    if rng.gen_bool(tuning.pause_chance.clamp(0.0, 1.0)) {
        Some(Duration::from_millis(
            rng.gen_range(tuning.pause_min..=tuning.pause_max),
        ))
    } else {
        None
    }
}

/// Size of the next scroll flick, in pixels.
pub fn scroll_amount<R: Rng + ?Sized>(tuning: &ScrollTuning, rng: &mut R) -> f64 {
    rng.gen_range(tuning.amount_min..=tuning.amount_max)
}

/// Whether this flick should be followed by a small corrective
/// back-scroll, and if so, by how many pixels (opposite the flick's
/// direction).
pub fn maybe_back_scroll<R: Rng + ?Sized>(tuning: &ScrollTuning, rng: &mut R) -> Option<f64> {
    if rng.gen_bool(tuning.back_scroll_chance.clamp(0.0, 1.0)) {
        Some(rng.gen_range(tuning.back_scroll_min..=tuning.back_scroll_max))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn think_delay_within_bounds() {
        let tuning = ClickTuning::default();
        for _ in 0..50 {
            let d = think_delay(&tuning, &mut rng());
            assert!(d.as_millis() as u64 >= tuning.think_delay_min);
            assert!(d.as_millis() as u64 <= tuning.think_delay_max);
        }
    }

    #[test]
    fn key_delay_is_never_negative() {
        let tuning = TypeTuning::default();
        let mut r = rng();
        for _ in 0..200 {
            let _ = key_delay(&tuning, &mut r);
        }
    }

    #[test]
    fn typing_pause_respects_zero_chance() {
        let mut tuning = TypeTuning::default();
        tuning.pause_chance = 0.0;
        let mut r = rng();
        for _ in 0..50 {
            assert!(maybe_typing_pause(&tuning, &mut r).is_none());
        }
    }

    #[test]
    fn typing_pause_respects_certain_chance() {
        let mut tuning = TypeTuning::default();
        tuning.pause_chance = 1.0;
        let mut r = rng();
        let pause = maybe_typing_pause(&tuning, &mut r).unwrap();
        assert!(pause.as_millis() as u64 >= tuning.pause_min);
        assert!(pause.as_millis() as u64 <= tuning.pause_max);
    }

    #[test]
    fn scroll_amount_within_bounds() {
        let tuning = ScrollTuning::default();
        let mut r = rng();
        for _ in 0..50 {
            let amount = scroll_amount(&tuning, &mut r);
            assert!(amount >= tuning.amount_min && amount <= tuning.amount_max);
        }
    }

    #[test]
    fn back_scroll_respects_zero_chance() {
        let mut tuning = ScrollTuning::default();
        tuning.back_scroll_chance = 0.0;
        let mut r = rng();
        assert!(maybe_back_scroll(&tuning, &mut r).is_none());
    }
}
