use protocol::{receives_avoid_ruleset, receives_tuning_injection, RuntimeTuning};
use serde_json::Value;

/// Attach `__frameworkConfig` to `params` for `dom.*`/`human.*` actions
/// (spec.md §4.1). `human.*` actions additionally get the avoid-ruleset
/// unioned (global ∪ request) and per-behaviour config defaults overlaid,
/// with the request's own config values taking priority over the global
/// tuning record.
#[must_use]
pub fn inject(action: &str, params: Value, tuning: &RuntimeTuning) -> Value {
    if !receives_tuning_injection(action) {
        return params;
    }

    let mut params = match params {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };

    let Some(obj) = params.as_object_mut() else {
        return params;
    };

    let mut config = serde_json::to_value(tuning).unwrap_or(Value::Null);

    if receives_avoid_ruleset(action) {
        let request_avoid = obj
            .get("avoid")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let merged_avoid = tuning.avoid.union(&request_avoid);
        if let Some(config_obj) = config.as_object_mut() {
            config_obj.insert(
                "avoid".to_string(),
                serde_json::to_value(&merged_avoid).unwrap_or(Value::Null),
            );
        }

        // Per-behaviour request config overlays the global defaults: any
        // key the caller already set under e.g. `params.click` wins over
        // the broker's `tuning.click`.
        for group in ["click", "type", "scroll"] {
            if let Some(request_group) = obj.get(group).and_then(Value::as_object) {
                if let Some(config_group) = config
                    .get_mut(group)
                    .and_then(|v| v.as_object_mut())
                {
                    for (k, v) in request_group {
                        config_group.insert(k.clone(), v.clone());
                    }
                }
            }
        }
    }

    obj.insert("__frameworkConfig".to_string(), config);
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_dom_non_human_actions_are_untouched() {
        let tuning = RuntimeTuning::default();
        let params = json!({"url": "https://example.com"});
        let out = inject("tabs.navigate", params.clone(), &tuning);
        assert_eq!(out, params);
    }

    #[test]
    fn dom_actions_get_framework_config_without_avoid_merge() {
        let tuning = RuntimeTuning::default();
        let out = inject("dom.click", json!({"handleId": "el_1"}), &tuning);
        assert!(out.get("__frameworkConfig").is_some());
        assert!(out["__frameworkConfig"].get("avoid").is_some());
    }

    #[test]
    fn human_actions_union_avoid_ruleset() {
        let mut tuning = RuntimeTuning::default();
        tuning.avoid.selectors.push("a.global-avoid".into());
        let out = inject(
            "human.click",
            json!({"handleId": "el_1", "avoid": {"selectors": ["a.request-avoid"]}}),
            &tuning,
        );
        let merged: Vec<String> = out["__frameworkConfig"]["avoid"]["selectors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(merged, vec!["a.global-avoid", "a.request-avoid"]);
    }

    #[test]
    fn request_behaviour_config_overrides_global_defaults() {
        let tuning = RuntimeTuning::default();
        let out = inject(
            "human.click",
            json!({"handleId": "el_1", "click": {"maxShiftPx": 5.0}}),
            &tuning,
        );
        assert_eq!(out["__frameworkConfig"]["click"]["maxShiftPx"], 5.0);
        // untouched sibling key keeps the global default
        assert_eq!(
            out["__frameworkConfig"]["click"]["thinkDelayMin"],
            tuning.click.think_delay_min
        );
    }
}
