//! Raw bindings to the `chrome.tabs`/`chrome.cookies`/`chrome.webNavigation`/
//! `chrome.windows` extension APIs (spec.md §6 "Tab"/"Cookies"/"Frames"
//! actions). Declared directly with `#[wasm_bindgen(js_namespace = ...)]`
//! rather than pulling in an external bindings crate, matching how
//! `bindings.rs` talks to `web_sys` directly instead of wrapping it further.
//!
//! Every extern here returns the native MV3 promise (no callback argument
//! passed), awaited through [`wasm_bindgen_futures::JsFuture`] by the
//! `call` helper below.
#![cfg(target_arch = "wasm32")]

use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = query)]
    fn tabs_query(query_info: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = get)]
    fn tabs_get(tab_id: f64) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = update)]
    fn tabs_update(tab_id: f64, update_props: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = create)]
    fn tabs_create(create_props: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = remove)]
    fn tabs_remove(tab_id: f64) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = reload)]
    fn tabs_reload(tab_id: f64) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = captureVisibleTab)]
    fn tabs_capture_visible_tab(window_id: f64, options: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "cookies"], js_name = getAll)]
    fn cookies_get_all(details: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "cookies"], js_name = set)]
    fn cookies_set(details: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "webNavigation"], js_name = getAllFrames)]
    fn web_navigation_get_all_frames(details: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "windows"], js_name = update)]
    fn windows_update(window_id: f64, info: &JsValue) -> js_sys::Promise;
}

/// Await a `chrome.*` promise and convert its resolved value to JSON,
/// mapping a JS rejection (typically `chrome.runtime.lastError`'s message)
/// to a plain string error the dispatcher can fold into a `{id, error}`
/// response.
async fn call(promise: js_sys::Promise) -> Result<Value, String> {
    let resolved = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| js_error_message(&e))?;
    serde_wasm_bindgen::from_value(resolved).map_err(|e| e.to_string())
}

fn js_error_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .unwrap_or_else(|| format!("{value:?}"))
}

fn to_js(value: &Value) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

pub async fn tabs_list(query_info: &Value) -> Result<Value, String> {
    call(tabs_query(&to_js(query_info))).await
}

pub async fn tabs_get_tab(tab_id: i64) -> Result<Value, String> {
    call(tabs_get(tab_id as f64)).await
}

pub async fn tabs_navigate(tab_id: i64, url: &str) -> Result<Value, String> {
    call(tabs_update(tab_id as f64, &to_js(&serde_json::json!({"url": url})))).await
}

pub async fn tabs_create_tab(url: Option<&str>) -> Result<Value, String> {
    let props = match url {
        Some(u) => serde_json::json!({"url": u}),
        None => serde_json::json!({}),
    };
    call(tabs_create(&to_js(&props))).await
}

pub async fn tabs_close(tab_id: i64) -> Result<Value, String> {
    call(tabs_remove(tab_id as f64)).await
}

pub async fn tabs_activate_tab(tab_id: i64) -> Result<Value, String> {
    call(tabs_update(tab_id as f64, &to_js(&serde_json::json!({"active": true})))).await
}

pub async fn tabs_reload_tab(tab_id: i64) -> Result<Value, String> {
    call(tabs_reload(tab_id as f64)).await
}

pub async fn tabs_set_viewport(window_id: i64, width: i64, height: i64) -> Result<Value, String> {
    call(windows_update(
        window_id as f64,
        &to_js(&serde_json::json!({"width": width, "height": height})),
    ))
    .await
}

pub async fn tabs_screenshot(window_id: i64, format: &str) -> Result<Value, String> {
    call(tabs_capture_visible_tab(
        window_id as f64,
        &to_js(&serde_json::json!({"format": format})),
    ))
    .await
}

pub async fn cookies_all(details: &Value) -> Result<Value, String> {
    call(cookies_get_all(&to_js(details))).await
}

pub async fn cookies_set_one(details: &Value) -> Result<Value, String> {
    call(cookies_set(&to_js(details))).await
}

pub async fn frames_list(tab_id: i64) -> Result<Value, String> {
    call(web_navigation_get_all_frames(&to_js(&serde_json::json!({"tabId": tab_id})))).await
}
