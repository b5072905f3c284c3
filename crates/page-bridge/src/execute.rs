//! Executes a classified request (spec.md §4.2, §6): `BrowserNative`
//! actions call `chrome.*` directly, `TabScopedDom` actions drive the
//! interaction engine's pipelines or a `DomAccess` read against the current
//! tab, `PageWorldEvaluation` actions walk the injection [`Ladder`]. One
//! [`Dispatcher`] instance lives for the lifetime of one tab's content
//! script, matching `engine::HandleRegistry`'s "fresh per navigation"
//! contract.
#![cfg(target_arch = "wasm32")]

use std::time::Duration;

use engine::clear::human_clear_input;
use engine::click::{human_click, ClickCount, ClickOutcome, CursorState};
use engine::dom::{DomAccess, KeyEvent, KeyEventKind, MouseEventKind};
use engine::injection::{Ladder, Strategy};
use engine::keyboard::{self, ModifierTracker, Token};
use engine::scroll::{human_scroll, scroll_exact};
use engine::typing::human_type;
use engine::HandleRegistry;
use protocol::{Request, Response, RuntimeTuning};
use serde_json::Value;

use crate::bindings::{BrowserDom, WebElement};
use crate::chrome;
use crate::dispatch::{route, waits_for_tab_complete, DispatchPath, TAB_COMPLETE_TIMEOUT_MS};

pub struct Dispatcher {
    dom: BrowserDom,
    handles: HandleRegistry<WebElement>,
    cursor: CursorState,
    modifiers: ModifierTracker,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dom: BrowserDom::new(),
            handles: HandleRegistry::new(),
            cursor: CursorState { x: 0.0, y: 0.0 },
            modifiers: ModifierTracker::new(),
        }
    }

    pub async fn handle(&mut self, request: Request) -> Response {
        match self.execute(&request).await {
            Ok(value) => Response::ok(request.id.clone(), value),
            Err(err) => Response::err(request.id.clone(), err),
        }
    }

    async fn execute(&mut self, request: &Request) -> Result<Value, String> {
        match route(&request.action) {
            DispatchPath::BrowserNative => self.execute_browser_native(request).await,
            DispatchPath::TabScopedDom => self.execute_tab_scoped(request).await,
            DispatchPath::PageWorldEvaluation => self.execute_page_world(request).await,
        }
    }

    // ---- BrowserNative: tabs.*, cookies.*, frames.* -------------------

    async fn execute_browser_native(&self, request: &Request) -> Result<Value, String> {
        let params = &request.params;
        match request.action.as_str() {
            "tabs.list" => chrome::tabs_list(&Value::Object(serde_json::Map::new())).await,
            "tabs.navigate" => {
                let tab_id = request.tab_id.ok_or("params.tabId required")?;
                let url = require_str(params, "url")?;
                chrome::tabs_navigate(tab_id, url).await?;
                self.await_tab_complete(tab_id, &request.action).await
            }
            "tabs.create" => {
                let url = params.get("url").and_then(Value::as_str);
                let created = chrome::tabs_create_tab(url).await?;
                match created.get("id").and_then(Value::as_i64) {
                    Some(tab_id) => self.await_tab_complete(tab_id, &request.action).await,
                    None => Ok(created),
                }
            }
            "tabs.close" => chrome::tabs_close(request.tab_id.ok_or("params.tabId required")?).await,
            "tabs.activate" => chrome::tabs_activate_tab(request.tab_id.ok_or("params.tabId required")?).await,
            "tabs.reload" => {
                let tab_id = request.tab_id.ok_or("params.tabId required")?;
                chrome::tabs_reload_tab(tab_id).await?;
                self.await_tab_complete(tab_id, &request.action).await
            }
            "tabs.waitForNavigation" => {
                let tab_id = request.tab_id.ok_or("params.tabId required")?;
                self.await_tab_complete(tab_id, "tabs.navigate").await
            }
            "tabs.setViewport" => {
                let window_id = params.get("windowId").and_then(Value::as_i64).ok_or("params.windowId required")?;
                let width = params.get("width").and_then(Value::as_i64).unwrap_or(1280);
                let height = params.get("height").and_then(Value::as_i64).unwrap_or(720);
                chrome::tabs_set_viewport(window_id, width, height).await
            }
            "tabs.screenshot" => {
                let window_id = params.get("windowId").and_then(Value::as_i64).unwrap_or(-1);
                let format = params.get("format").and_then(Value::as_str).unwrap_or("png");
                chrome::tabs_screenshot(window_id, format).await
            }
            "cookies.getAll" => chrome::cookies_all(params).await,
            "cookies.set" => chrome::cookies_set_one(params).await,
            "frames.list" => chrome::frames_list(request.tab_id.ok_or("params.tabId required")?).await,
            other => Err(format!("unknown-action: {other}")),
        }
    }

    /// Poll `chrome.tabs.get` until `status == "complete"` or the dispatch
    /// timeout elapses (spec.md §4.2: navigation/reload/create wait for the
    /// tab to settle).
    async fn await_tab_complete(&self, tab_id: i64, action: &str) -> Result<Value, String> {
        if !waits_for_tab_complete(action) {
            return Ok(Value::Null);
        }
        let mut waited_ms = 0u64;
        loop {
            let tab = chrome::tabs_get_tab(tab_id).await?;
            if tab.get("status").and_then(Value::as_str) == Some("complete") {
                return Ok(tab);
            }
            if waited_ms >= TAB_COMPLETE_TIMEOUT_MS {
                return Err(format!("frame-timeout (tab {tab_id})"));
            }
            self.dom.sleep(Duration::from_millis(250)).await;
            waited_ms += 250;
        }
    }

    // ---- TabScopedDom: dom.*, human.*, cursor.* ------------------------

    async fn execute_tab_scoped(&mut self, request: &Request) -> Result<Value, String> {
        let params = request.params.clone();
        match request.action.as_str() {
            "dom.querySelector" => {
                let selector = require_str(&params, "selector")?;
                Ok(match self.dom.query_selector(selector, None).await {
                    Some(el) => serde_json::json!({"handleId": self.handles.store(el)}),
                    None => serde_json::json!({"handleId": Value::Null}),
                })
            }
            "dom.querySelectorAll" => {
                let selector = require_str(&params, "selector")?;
                let ids: Vec<String> = self
                    .dom
                    .query_selector_all(selector, None)
                    .into_iter()
                    .map(|el| self.handles.store(el))
                    .collect();
                Ok(serde_json::json!({"handleIds": ids}))
            }
            "dom.querySelectorWithin" => {
                let within = self.resolve_handle(&params, "handleId")?;
                let selector = require_str(&params, "selector")?;
                Ok(match self.dom.query_selector(selector, Some(&within)).await {
                    Some(el) => serde_json::json!({"handleId": self.handles.store(el)}),
                    None => serde_json::json!({"handleId": Value::Null}),
                })
            }
            "dom.querySelectorAllWithin" => {
                let within = self.resolve_handle(&params, "handleId")?;
                let selector = require_str(&params, "selector")?;
                let ids: Vec<String> = self
                    .dom
                    .query_selector_all(selector, Some(&within))
                    .into_iter()
                    .map(|el| self.handles.store(el))
                    .collect();
                Ok(serde_json::json!({"handleIds": ids}))
            }
            "dom.waitForSelector" => {
                let selector = require_str(&params, "selector")?;
                let timeout_ms = params.get("timeout").and_then(Value::as_u64).unwrap_or(5_000);
                Ok(match self.dom.wait_for_selector(selector, Duration::from_millis(timeout_ms)).await {
                    Some(el) => serde_json::json!({"handleId": self.handles.store(el)}),
                    None => serde_json::json!({"handleId": Value::Null}),
                })
            }
            "dom.boundingBox" => {
                let el = self.resolve_handle(&params, "handleId")?;
                Ok(match self.dom.bounding_box(&el).await {
                    Some(b) => serde_json::json!({"x": b.x, "y": b.y, "width": b.width, "height": b.height}),
                    None => Value::Null,
                })
            }
            "dom.getAttribute" => {
                let el = self.resolve_handle(&params, "handleId")?;
                let name = require_str(&params, "name")?;
                Ok(serde_json::json!({"value": self.dom.get_attribute(&el, name)}))
            }
            "dom.getProperty" => {
                let el = self.resolve_handle(&params, "handleId")?;
                let name = require_str(&params, "name")?;
                Ok(serde_json::json!({"value": self.dom.get_property(&el, name)}))
            }
            "dom.getHTML" => {
                let (html, title, url) = self.dom.document_html();
                Ok(serde_json::json!({"html": html, "title": title, "url": url}))
            }
            "dom.elementHTML" => {
                let el = self.resolve_handle(&params, "handleId")?;
                let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(5_000) as usize;
                Ok(serde_json::json!({"html": self.dom.element_html(&el, limit)}))
            }
            "dom.queryAllInfo" => {
                let selector = require_str(&params, "selector")?;
                let elements = self.label_with_handles(self.dom.query_all_info(selector));
                Ok(serde_json::json!({"elements": elements}))
            }
            "dom.batchQuery" => {
                let selectors = require_str_array(&params, "selectors")?;
                Ok(self.dom.batch_query(&selectors))
            }
            "dom.findScrollable" => {
                let ids: Vec<String> = self.dom.find_scrollable().into_iter().map(|el| self.handles.store(el)).collect();
                Ok(serde_json::json!({"handleIds": ids}))
            }
            "dom.discoverElements" => {
                let discovered = self.dom.discover_elements();
                let links = self.label_with_handles(discovered.links);
                let buttons = self.label_with_handles(discovered.buttons);
                let inputs = self.label_with_handles(discovered.inputs);
                Ok(serde_json::json!({"links": links, "buttons": buttons, "inputs": inputs}))
            }
            "dom.click" | "human.click" => self.run_click(&params).await,
            "dom.mouseMoveTo" => {
                let x = require_f64(&params, "x")?;
                let y = require_f64(&params, "y")?;
                if let Some(el) = self.dom.element_from_point(x, y).await {
                    self.dom.dispatch_mouse_event(&el, MouseEventKind::Move, x, y).await;
                }
                self.cursor = CursorState { x, y };
                Ok(serde_json::json!({"x": x, "y": y}))
            }
            "dom.focus" => {
                let el = self.resolve_handle(&params, "handleId")?;
                self.dom.focus(&el).await;
                Ok(serde_json::json!({"focused": true}))
            }
            "dom.type" | "human.type" => self.run_type(&params).await,
            "dom.keyPress" | "dom.keyDown" | "dom.keyUp" => self.run_key_action(&request.action, &params).await,
            "dom.scroll" => {
                let target = self.resolve_optional_handle(&params, "handleId")?;
                let before = params.get("before").and_then(Value::as_f64).unwrap_or(0.0);
                let amount = require_f64(&params, "amount")?;
                let result = scroll_exact(&self.dom, target.as_ref(), before, amount).await;
                Ok(serde_json::to_value(result).unwrap_or(Value::Null))
            }
            "human.scroll" => self.run_human_scroll(&params).await,
            "dom.setValue" => {
                let el = self.resolve_handle(&params, "handleId")?;
                let value = require_str(&params, "value")?;
                self.dom.set_native_value(&el, value).await;
                Ok(serde_json::json!({"set": true}))
            }
            "human.clearInput" => self.run_clear(&params).await,
            "dom.setDebug" => {
                let enabled = params.get("cursor").and_then(Value::as_bool).unwrap_or(false);
                self.dom.set_debug_cursor(enabled, self.cursor.x, self.cursor.y);
                Ok(serde_json::json!({"debug": enabled}))
            }
            "framework.reload" => Ok(serde_json::json!({"reloaded": true})),
            "cursor.getPosition" => Ok(serde_json::json!({"x": self.cursor.x, "y": self.cursor.y})),
            "cursor.reportPosition" => {
                self.cursor = CursorState {
                    x: require_f64(&params, "x")?,
                    y: require_f64(&params, "y")?,
                };
                Ok(serde_json::json!({"recorded": true}))
            }
            other => Err(format!("unknown-action: {other}")),
        }
    }

    fn label_with_handles(&mut self, items: Vec<(WebElement, Value)>) -> Vec<Value> {
        items
            .into_iter()
            .map(|(el, mut info)| {
                let handle_id = self.handles.store(el);
                if let Some(obj) = info.as_object_mut() {
                    obj.insert("handleId".into(), Value::String(handle_id));
                }
                info
            })
            .collect()
    }

    async fn run_click(&mut self, params: &Value) -> Result<Value, String> {
        let tuning = tuning_from_params(params);
        let (el, handle_id) = self.resolve_target(params).await?;
        let element_id = el.0.id();
        let outcome = human_click(
            &self.dom,
            &el,
            &element_id,
            &tuning.avoid,
            &tuning.click,
            &mut self.cursor,
            click_count(params),
            &mut rand::thread_rng(),
        )
        .await;
        let mut value = outcome.to_json();
        if matches!(outcome, ClickOutcome::Clicked { .. }) {
            if let Some(obj) = value.as_object_mut() {
                obj.insert("handleId".into(), Value::String(handle_id));
            }
        }
        Ok(value)
    }

    async fn run_type(&mut self, params: &Value) -> Result<Value, String> {
        let tuning = tuning_from_params(params);
        let text = require_str(params, "text")?;
        let (el, _) = self.resolve_target(params).await?;
        let element_id = el.0.id();
        let already_focused = params.get("alreadyFocused").and_then(Value::as_bool).unwrap_or(false);
        let current_value = self.dom.get_property(&el, "value").unwrap_or_default();
        let outcome = human_type(
            &self.dom,
            &el,
            &element_id,
            already_focused,
            text,
            &tuning.avoid,
            &tuning.click,
            &tuning.typing,
            &mut self.cursor,
            &mut self.modifiers,
            &current_value,
            &mut rand::thread_rng(),
        )
        .await;
        Ok(outcome.to_json())
    }

    async fn run_key_action(&mut self, action: &str, params: &Value) -> Result<Value, String> {
        let key = require_str(params, "key")?;
        if action != "dom.keyPress" && self.modifiers.apply(key, action == "dom.keyDown") {
            return Ok(serde_json::json!({"modifier": true}));
        }
        let (descriptor_key, code, key_code) = keyboard::key_descriptor(&Token::Special(key.to_string()));
        let kind = match action {
            "dom.keyDown" => KeyEventKind::Down,
            "dom.keyUp" => KeyEventKind::Up,
            _ => KeyEventKind::Press,
        };
        self.dom
            .dispatch_key_event(KeyEvent {
                kind,
                key: descriptor_key,
                code,
                key_code,
                char_code: 0,
                modifiers: self.modifiers.current(),
            })
            .await;
        Ok(serde_json::json!({"dispatched": true}))
    }

    async fn run_human_scroll(&mut self, params: &Value) -> Result<Value, String> {
        let tuning = tuning_from_params(params);
        let target = self.resolve_optional_handle(params, "handleId")?;
        let amount = params.get("amount").and_then(Value::as_f64);
        let direction = params.get("direction").and_then(Value::as_f64).unwrap_or(1.0);
        let result =
            human_scroll(&self.dom, target.as_ref(), amount, direction, &tuning.scroll, &mut rand::thread_rng()).await;
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    async fn run_clear(&mut self, params: &Value) -> Result<Value, String> {
        let tuning = tuning_from_params(params);
        let (el, _) = self.resolve_target(params).await?;
        let element_id = el.0.id();
        let outcome = human_clear_input(
            &self.dom,
            &el,
            &element_id,
            &tuning.avoid,
            &tuning.click,
            &mut self.cursor,
            &mut rand::thread_rng(),
        )
        .await;
        Ok(outcome.to_json())
    }

    /// Resolve a request's target element, accepting either an existing
    /// `handleId` or a fresh `selector` (minted into a new handle so
    /// follow-up calls can address it directly).
    async fn resolve_target(&mut self, params: &Value) -> Result<(WebElement, String), String> {
        if let Some(handle_id) = params.get("handleId").and_then(Value::as_str) {
            let el = self
                .handles
                .resolve(handle_id, |el: &WebElement| el.0.is_connected())
                .map_err(|e| e.to_string())?;
            return Ok((el, handle_id.to_string()));
        }
        if let Some(selector) = params.get("selector").and_then(Value::as_str) {
            let el = self.dom.query_selector(selector, None).await.ok_or("element-not-found")?;
            let id = self.handles.store(el.clone());
            return Ok((el, id));
        }
        Err("invalid-params: selector or handleId required".into())
    }

    fn resolve_handle(&mut self, params: &Value, field: &str) -> Result<WebElement, String> {
        let id = params.get(field).and_then(Value::as_str).ok_or_else(|| format!("params.{field} required"))?;
        self.handles.resolve(id, |el: &WebElement| el.0.is_connected()).map_err(|e| e.to_string())
    }

    fn resolve_optional_handle(&mut self, params: &Value, field: &str) -> Result<Option<WebElement>, String> {
        match params.get(field).and_then(Value::as_str) {
            Some(id) => Ok(Some(
                self.handles.resolve(id, |el: &WebElement| el.0.is_connected()).map_err(|e| e.to_string())?,
            )),
            None => Ok(None),
        }
    }

    // ---- PageWorldEvaluation: dom.evaluate, elementEvaluate, evaluateHandle

    async fn execute_page_world(&mut self, request: &Request) -> Result<Value, String> {
        let code = require_str(&request.params, "fn")?.to_string();
        let mut ladder = Ladder::new();
        loop {
            let Some(strategy) = ladder.next() else {
                return Err(ladder.into_engine_error().to_string());
            };
            let attempt = match strategy {
                Strategy::InlineScript => self.dom.eval_inline_script(&code),
                Strategy::ScriptingApi => Err("scripting-api unavailable in content-script context".to_string()),
                Strategy::IsolatedWorld => self.dom.eval_isolated_world(&code),
            };
            match attempt {
                Ok(raw) => {
                    let value: Value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                    return Ok(serde_json::json!({"value": value}));
                }
                Err(detail) => ladder.record_failure(strategy, detail),
            }
        }
    }
}

fn click_count(params: &Value) -> ClickCount {
    match params.get("clickCount").and_then(Value::as_u64) {
        Some(2) => ClickCount::Double,
        Some(3) => ClickCount::Triple,
        _ => ClickCount::Single,
    }
}

/// Reads back the tuning blob `tuning_inject::inject` writes onto every
/// `dom.*`/`human.*` request's params before forwarding it (spec.md §4.1).
/// Absent or malformed, the pipeline runs on defaults rather than erroring
/// — the broker always sets this field for actions that need it, so its
/// absence only happens when something drives the dispatcher directly.
fn tuning_from_params(params: &Value) -> RuntimeTuning {
    params
        .get("__frameworkConfig")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, String> {
    params.get(field).and_then(Value::as_str).ok_or_else(|| format!("params.{field} required"))
}

fn require_f64(params: &Value, field: &str) -> Result<f64, String> {
    params.get(field).and_then(Value::as_f64).ok_or_else(|| format!("params.{field} required"))
}

fn require_str_array(params: &Value, field: &str) -> Result<Vec<String>, String> {
    params
        .get(field)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .ok_or_else(|| format!("params.{field} required"))
}
