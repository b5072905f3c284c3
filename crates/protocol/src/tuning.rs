use serde::{Deserialize, Serialize};

/// Handle-registry sweep tuning (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandlesTuning {
    pub ttl_ms: u64,
    pub cleanup_interval_ms: u64,
}

impl Default for HandlesTuning {
    fn default() -> Self {
        Self {
            ttl_ms: 15 * 60 * 1000,
            cleanup_interval_ms: 60 * 1000,
        }
    }
}

/// Debug-overlay tuning (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DebugTuning {
    pub cursor: bool,
    pub devtools: bool,
    pub session_log: bool,
}

impl Default for DebugTuning {
    fn default() -> Self {
        Self {
            cursor: true,
            devtools: false,
            session_log: false,
        }
    }
}

/// Human-click tuning (spec.md §3, §4.3 step 5-7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClickTuning {
    pub think_delay_min: u64,
    pub think_delay_max: u64,
    pub max_shift_px: f64,
}

impl Default for ClickTuning {
    fn default() -> Self {
        Self {
            think_delay_min: 150,
            think_delay_max: 400,
            max_shift_px: 50.0,
        }
    }
}

/// Human-type tuning (spec.md §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypeTuning {
    pub base_delay_min: u64,
    pub base_delay_max: u64,
    pub variance: f64,
    pub pause_chance: f64,
    pub pause_min: u64,
    pub pause_max: u64,
}

impl Default for TypeTuning {
    fn default() -> Self {
        Self {
            base_delay_min: 50,
            base_delay_max: 150,
            variance: 0.3,
            pause_chance: 0.12,
            pause_min: 300,
            pause_max: 900,
        }
    }
}

/// Human-scroll tuning (spec.md §3, §4.3 "flicks").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrollTuning {
    pub amount_min: f64,
    pub amount_max: f64,
    pub back_scroll_chance: f64,
    pub back_scroll_min: f64,
    pub back_scroll_max: f64,
}

impl Default for ScrollTuning {
    fn default() -> Self {
        Self {
            amount_min: 200.0,
            amount_max: 800.0,
            back_scroll_chance: 0.15,
            back_scroll_min: 15.0,
            back_scroll_max: 60.0,
        }
    }
}

/// The avoid ruleset (spec.md §3, §4.1: "merges global+per-request by
/// union").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidRuleset {
    pub selectors: Vec<String>,
    pub classes: Vec<String>,
    pub ids: Vec<String>,
    pub attributes: Vec<String>,
}

impl AvoidRuleset {
    /// Union-merge `self` (the global ruleset) with `other` (a per-request
    /// ruleset), deduplicating entries.
    #[must_use]
    pub fn union(&self, other: &AvoidRuleset) -> AvoidRuleset {
        AvoidRuleset {
            selectors: union_dedup(&self.selectors, &other.selectors),
            classes: union_dedup(&self.classes, &other.classes),
            ids: union_dedup(&self.ids, &other.ids),
            attributes: union_dedup(&self.attributes, &other.attributes),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
            && self.classes.is_empty()
            && self.ids.is_empty()
            && self.attributes.is_empty()
    }
}

fn union_dedup(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for item in b {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// The complete runtime-tuning record (spec.md §3, §9: "the only global
/// mutable state"). Owned by the broker, copied into every command's
/// params at injection time — never read live by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeTuning {
    pub handles: HandlesTuning,
    pub debug: DebugTuning,
    pub click: ClickTuning,
    #[serde(rename = "type")]
    pub typing: TypeTuning,
    pub scroll: ScrollTuning,
    pub avoid: AvoidRuleset,
}

impl RuntimeTuning {
    /// Merge a partial override (as parsed from `framework.setConfig`'s
    /// params, or a JSON blob from `--tuning-json`) into `self`, returning
    /// the merged record. Per-field: the override's value replaces the
    /// current value wherever the override's JSON object sets that key;
    /// `avoid` is unioned rather than replaced, matching §4.1's
    /// request/global merge behaviour so that `setConfig` calls are
    /// additive for avoid rules, not destructive.
    #[must_use]
    pub fn merge(&self, override_json: &serde_json::Value) -> RuntimeTuning {
        let mut merged = self.clone();
        if let Some(handles) = override_json.get("handles") {
            if let Ok(h) = serde_json::from_value::<PartialHandles>(handles.clone()) {
                h.apply(&mut merged.handles);
            }
        }
        if let Some(debug) = override_json.get("debug") {
            if let Ok(d) = serde_json::from_value::<PartialDebug>(debug.clone()) {
                d.apply(&mut merged.debug);
            }
        }
        if let Some(click) = override_json.get("click") {
            if let Ok(c) = serde_json::from_value::<ClickTuning>(merge_onto(&merged.click, click))
            {
                merged.click = c;
            }
        }
        if let Some(typing) = override_json.get("type") {
            if let Ok(t) = serde_json::from_value::<TypeTuning>(merge_onto(&merged.typing, typing))
            {
                merged.typing = t;
            }
        }
        if let Some(scroll) = override_json.get("scroll") {
            if let Ok(s) =
                serde_json::from_value::<ScrollTuning>(merge_onto(&merged.scroll, scroll))
            {
                merged.scroll = s;
            }
        }
        if let Some(avoid) = override_json.get("avoid") {
            if let Ok(a) = serde_json::from_value::<AvoidRuleset>(avoid.clone()) {
                merged.avoid = merged.avoid.union(&a);
            }
        }
        merged
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct PartialHandles {
    ttl_ms: Option<u64>,
    cleanup_interval_ms: Option<u64>,
}

impl PartialHandles {
    fn apply(&self, into: &mut HandlesTuning) {
        if let Some(v) = self.ttl_ms {
            into.ttl_ms = v;
        }
        if let Some(v) = self.cleanup_interval_ms {
            into.cleanup_interval_ms = v;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct PartialDebug {
    cursor: Option<bool>,
    devtools: Option<bool>,
    session_log: Option<bool>,
}

impl PartialDebug {
    fn apply(&self, into: &mut DebugTuning) {
        if let Some(v) = self.cursor {
            into.cursor = v;
        }
        if let Some(v) = self.devtools {
            into.devtools = v;
        }
        if let Some(v) = self.session_log {
            into.session_log = v;
        }
    }
}

/// Serialize `current` to JSON, merge `incoming`'s keys on top, and hand
/// back a `Value` that round-trips through the target struct's `Deserialize`
/// even when `incoming` only names a subset of fields.
fn merge_onto<T: Serialize>(current: &T, incoming: &serde_json::Value) -> serde_json::Value {
    let mut base = serde_json::to_value(current).unwrap_or(serde_json::Value::Null);
    if let (Some(base_obj), Some(incoming_obj)) = (base.as_object_mut(), incoming.as_object()) {
        for (k, v) in incoming_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
