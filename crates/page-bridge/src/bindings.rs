//! The real `web_sys`-backed [`engine::DomAccess`] implementation. Only
//! compiled for `wasm32-unknown-unknown`, where it runs inside the
//! extension's content-script isolated world. Everything this module
//! touches is exercised indirectly through `engine`'s pipelines, which are
//! unit-tested against `engine::dom::fake::FakeDom` instead — there is no
//! DOM to drive in a native `cargo test` run.
#![cfg(target_arch = "wasm32")]

use std::time::Duration;

use engine::dom::{DomAccess, KeyEvent, KeyEventKind, MouseEventKind};
use engine::{BoundingBox, ElementSnapshot};
use wasm_bindgen::JsCast;
use web_sys::{window, Document, Element, KeyboardEvent, KeyboardEventInit, MouseEvent, MouseEventInit};

/// A cloneable handle to a live DOM element. `web_sys::Element` is itself
/// cheap to clone (it wraps a `JsValue`), matching the `T: Clone` bound
/// `engine::HandleRegistry` needs.
#[derive(Clone)]
pub struct WebElement(pub Element);

/// `dom.discoverElements`'s three categories, each element paired with its
/// derived-selector/text summary (spec.md §6).
pub struct DiscoveredElements {
    pub links: Vec<(WebElement, serde_json::Value)>,
    pub buttons: Vec<(WebElement, serde_json::Value)>,
    pub inputs: Vec<(WebElement, serde_json::Value)>,
}

pub struct BrowserDom {
    document: Document,
}

impl BrowserDom {
    pub fn new() -> Self {
        let document = window().expect("window").document().expect("document");
        Self { document }
    }
}

impl Default for BrowserDom {
    fn default() -> Self {
        Self::new()
    }
}

fn class_list_string(el: &Element) -> String {
    el.class_name()
}

fn computed_style(el: &Element) -> Option<web_sys::CssStyleDeclaration> {
    window()?.get_computed_style(el).ok().flatten()
}

fn style_prop(style: &web_sys::CssStyleDeclaration, prop: &str) -> String {
    style.get_property_value(prop).unwrap_or_default()
}

fn attribute_names(el: &Element) -> Vec<String> {
    let attrs = el.attributes();
    let mut names = Vec::with_capacity(attrs.length() as usize);
    for i in 0..attrs.length() {
        if let Some(attr) = attrs.item(i) {
            names.push(attr.name());
        }
    }
    names
}

impl DomAccess for BrowserDom {
    type Element = WebElement;

    async fn query_selector(
        &self,
        selector: &str,
        within: Option<&Self::Element>,
    ) -> Option<Self::Element> {
        let found = match within {
            Some(w) => w.0.query_selector(selector).ok().flatten(),
            None => self.document.query_selector(selector).ok().flatten(),
        };
        found.map(WebElement)
    }

    async fn snapshot(&self, el: &Self::Element) -> ElementSnapshot {
        let element = &el.0;
        let rect = element.get_bounding_client_rect();
        let style = computed_style(element);
        let opacity = style
            .as_ref()
            .map(|s| style_prop(s, "opacity").parse::<f64>().unwrap_or(1.0))
            .unwrap_or(1.0);
        let visibility_hidden = style
            .as_ref()
            .map(|s| style_prop(s, "visibility") == "hidden")
            .unwrap_or(false);
        let display_is_contents = style
            .as_ref()
            .map(|s| style_prop(s, "display") == "contents")
            .unwrap_or(false);
        let in_svg_subtree = element.namespace_uri().as_deref() == Some("http://www.w3.org/2000/svg")
            || element
                .closest("svg")
                .ok()
                .flatten()
                .is_some();
        let aria_hidden = element.get_attribute("aria-hidden").as_deref() == Some("true");
        let has_offset_parent = element
            .dyn_ref::<web_sys::HtmlElement>()
            .and_then(web_sys::HtmlElement::offset_parent)
            .is_some();

        ElementSnapshot {
            in_svg_subtree,
            aria_hidden,
            has_offset_parent,
            display_is_contents,
            class_name: class_list_string(element),
            opacity,
            visibility_hidden,
            style_width: rect.width(),
            style_height: rect.height(),
            bounding_box: BoundingBox {
                x: rect.x(),
                y: rect.y(),
                width: rect.width(),
                height: rect.height(),
            },
            attribute_names: attribute_names(element),
        }
    }

    async fn matches_any(&self, el: &Self::Element, selectors: &[String]) -> bool {
        selectors.iter().any(|s| el.0.matches(s).unwrap_or(false))
    }

    async fn bounding_box(&self, el: &Self::Element) -> Option<BoundingBox> {
        let rect = el.0.get_bounding_client_rect();
        if rect.width() == 0.0 && rect.height() == 0.0 && rect.x() == 0.0 && rect.y() == 0.0 {
            return None;
        }
        Some(BoundingBox {
            x: rect.x(),
            y: rect.y(),
            width: rect.width(),
            height: rect.height(),
        })
    }

    async fn element_from_point(&self, x: f64, y: f64) -> Option<Self::Element> {
        self.document
            .element_from_point(x as f32, y as f32)
            .map(WebElement)
            .or_else(|| self.document.body().map(|b| WebElement(b.into())))
    }

    async fn dispatch_mouse_event(&self, el: &Self::Element, kind: MouseEventKind, x: f64, y: f64) {
        let name = match kind {
            MouseEventKind::Move => "mousemove",
            MouseEventKind::Down => "mousedown",
            MouseEventKind::Up => "mouseup",
            MouseEventKind::Click => "click",
            MouseEventKind::DblClick => "dblclick",
        };
        let mut init = MouseEventInit::new();
        init.client_x(x as i32).client_y(y as i32).bubbles(true).cancelable(true);
        if let Ok(event) = MouseEvent::new_with_mouse_event_init_dict(name, &init) {
            let _ = el.0.dispatch_event(&event);
        }
    }

    async fn dispatch_key_event(&self, event: KeyEvent) {
        let name = match event.kind {
            KeyEventKind::Down => "keydown",
            KeyEventKind::Press => "keypress",
            KeyEventKind::Up => "keyup",
        };
        let mut init = KeyboardEventInit::new();
        init.key(&event.key)
            .code(&event.code)
            .shift_key(event.modifiers.shift)
            .ctrl_key(event.modifiers.control)
            .alt_key(event.modifiers.alt)
            .meta_key(event.modifiers.meta)
            .bubbles(true)
            .cancelable(true);
        if let Ok(keyboard_event) = KeyboardEvent::new_with_keyboard_event_init_dict(name, &init) {
            if let Some(target) = self.document.active_element() {
                let _ = target.dispatch_event(&keyboard_event);
            }
        }
    }

    async fn focus(&self, el: &Self::Element) {
        if let Some(html_el) = el.0.dyn_ref::<web_sys::HtmlElement>() {
            let _ = html_el.focus();
        }
    }

    async fn set_native_value(&self, el: &Self::Element, value: &str) {
        // Use the platform's native value setter so frameworks relying on
        // a property descriptor (React, etc.) observe the mutation.
        if let Some(input) = el.0.dyn_ref::<web_sys::HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(textarea) = el.0.dyn_ref::<web_sys::HtmlTextAreaElement>() {
            textarea.set_value(value);
        }
        if let Ok(event) = web_sys::Event::new("input") {
            let _ = el.0.dispatch_event(&event);
        }
    }

    async fn set_selection_range(&self, el: &Self::Element, start: usize, end: usize) {
        if let Some(input) = el.0.dyn_ref::<web_sys::HtmlInputElement>() {
            let _ = input.set_selection_range(start as u32, end as u32);
        } else if let Some(textarea) = el.0.dyn_ref::<web_sys::HtmlTextAreaElement>() {
            let _ = textarea.set_selection_range(start as u32, end as u32);
        }
    }

    async fn smooth_scroll_into_view(&self, el: &Self::Element) {
        let mut opts = web_sys::ScrollIntoViewOptions::new();
        opts.behavior(web_sys::ScrollBehavior::Smooth);
        opts.block(web_sys::ScrollLogicalPosition::Center);
        el.0.scroll_into_view_with_scroll_into_view_options(&opts);
    }

    async fn smooth_scroll_by(&self, target: Option<&Self::Element>, dx: f64, dy: f64) {
        let mut opts = web_sys::ScrollToOptions::new();
        opts.left(dx).top(dy).behavior(web_sys::ScrollBehavior::Smooth);
        match target {
            Some(el) => el.0.scroll_by_with_scroll_to_options(&opts),
            None => {
                if let Some(win) = window() {
                    win.scroll_by_with_scroll_to_options(&opts);
                }
            }
        }
    }

    async fn viewport_size(&self) -> (f64, f64) {
        let win = window().expect("window");
        let w = win.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        let h = win.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        (w, h)
    }

    async fn sleep(&self, duration: Duration) {
        let millis = duration.as_millis() as i32;
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let win = window().expect("window");
            let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis);
        });
        let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
    }
}

/// Extra host operations the dispatcher's DOM-read/evaluation actions need
/// (spec.md §6 "DOM read"/"DOM code") that aren't part of [`DomAccess`]
/// because `engine`'s pipelines never call them.
impl BrowserDom {
    #[must_use]
    pub fn query_selector_all(&self, selector: &str, within: Option<&WebElement>) -> Vec<WebElement> {
        let list = match within {
            Some(w) => w.0.query_selector_all(selector).ok(),
            None => self.document.query_selector_all(selector).ok(),
        };
        let Some(list) = list else { return Vec::new() };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .map(WebElement)
            .collect()
    }

    #[must_use]
    pub fn get_attribute(&self, el: &WebElement, name: &str) -> Option<String> {
        el.0.get_attribute(name)
    }

    /// Reads a JS property off the live element via `Reflect`, stringifying
    /// anything that isn't already a string (spec.md §6 `dom.getProperty`).
    #[must_use]
    pub fn get_property(&self, el: &WebElement, name: &str) -> Option<String> {
        let value = js_sys::Reflect::get(&el.0, &wasm_bindgen::JsValue::from_str(name)).ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
        value.as_string().or_else(|| js_sys::JSON::stringify(&value).ok().map(String::from))
    }

    /// `dom.getHTML`: the whole document, immune to CSP since it never
    /// evaluates anything.
    #[must_use]
    pub fn document_html(&self) -> (String, String, String) {
        let html = self
            .document
            .document_element()
            .map(|e| e.outer_html())
            .unwrap_or_default();
        let title = self.document.title();
        let url = self.document.url().unwrap_or_default();
        (html, title, url)
    }

    /// `dom.elementHTML`: outer HTML truncated to `limit` chars.
    #[must_use]
    pub fn element_html(&self, el: &WebElement, limit: usize) -> String {
        let html = el.0.outer_html();
        html.chars().take(limit).collect()
    }

    /// `dom.queryAllInfo`: short summaries for every match of `selector`.
    /// Returns the element alongside its summary rather than minting a
    /// handle itself, since only the dispatcher owns a `HandleRegistry`.
    #[must_use]
    pub fn query_all_info(&self, selector: &str) -> Vec<(WebElement, serde_json::Value)> {
        self.query_selector_all(selector, None)
            .into_iter()
            .map(|el| {
                let info = serde_json::json!({
                    "tag": el.0.tag_name().to_lowercase(),
                    "id": el.0.id(),
                    "cls": class_list_string(&el.0),
                    "text": el.0.text_content().unwrap_or_default().chars().take(120).collect::<String>(),
                    "label": el.0.get_attribute("aria-label").unwrap_or_default(),
                });
                (el, info)
            })
            .collect()
    }

    /// `dom.batchQuery`: existence map for several selectors in one round
    /// trip.
    #[must_use]
    pub fn batch_query(&self, selectors: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for selector in selectors {
            let found = self.document.query_selector(selector).ok().flatten().is_some();
            map.insert(selector.clone(), serde_json::Value::Bool(found));
        }
        serde_json::Value::Object(map)
    }

    /// `dom.findScrollable`: every element whose content overflows its box
    /// and isn't clipped to `visible`.
    #[must_use]
    pub fn find_scrollable(&self) -> Vec<WebElement> {
        self.query_selector_all("*", None)
            .into_iter()
            .filter(|el| {
                let overflows = el.0.scroll_height() > el.0.client_height() + 20;
                let not_visible_overflow = computed_style(&el.0)
                    .map(|s| style_prop(&s, "overflow-y") != "visible")
                    .unwrap_or(false);
                overflows && not_visible_overflow
            })
            .collect()
    }

    /// `dom.discoverElements`: a categorised, CSP-safe inventory of links,
    /// buttons, and form inputs with short derived selectors. Like
    /// [`Self::query_all_info`], hands back elements paired with their
    /// summaries rather than handle ids.
    #[must_use]
    pub fn discover_elements(&self) -> DiscoveredElements {
        let categorize = |selector: &str| -> Vec<(WebElement, serde_json::Value)> {
            self.query_selector_all(selector, None)
                .into_iter()
                .map(|el| {
                    let derived_selector = if !el.0.id().is_empty() {
                        format!("#{}", el.0.id())
                    } else {
                        format!("{}.{}", el.0.tag_name().to_lowercase(), class_list_string(&el.0).replace(' ', "."))
                    };
                    let info = serde_json::json!({
                        "selector": derived_selector,
                        "text": el.0.text_content().unwrap_or_default().trim().chars().take(80).collect::<String>(),
                    });
                    (el, info)
                })
                .collect()
        };
        DiscoveredElements {
            links: categorize("a[href]"),
            buttons: categorize("button, [role=button], input[type=button], input[type=submit]"),
            inputs: categorize("input, textarea, select"),
        }
    }

    /// `dom.setDebug` (`cursor` flag only — the session-log/devtools flags
    /// are framework-level concerns the broker already owns): shows or
    /// hides a fixed-position marker div tracking the last reported cursor
    /// position.
    pub fn set_debug_cursor(&self, enabled: bool, x: f64, y: f64) {
        const MARKER_ID: &str = "__human_browser_debug_cursor__";
        let marker = self.document.get_element_by_id(MARKER_ID).or_else(|| {
            let el = self.document.create_element("div").ok()?;
            el.set_id(MARKER_ID);
            if let Some(html_el) = el.dyn_ref::<web_sys::HtmlElement>() {
                let style = html_el.style();
                let _ = style.set_property("position", "fixed");
                let _ = style.set_property("width", "8px");
                let _ = style.set_property("height", "8px");
                let _ = style.set_property("margin", "-4px 0 0 -4px");
                let _ = style.set_property("border-radius", "50%");
                let _ = style.set_property("background", "red");
                let _ = style.set_property("z-index", "2147483647");
                let _ = style.set_property("pointer-events", "none");
            }
            self.document.body()?.append_child(&el).ok()?;
            Some(el)
        });
        let Some(marker) = marker else { return };
        if let Some(html_el) = marker.dyn_ref::<web_sys::HtmlElement>() {
            let style = html_el.style();
            let _ = style.set_property("display", if enabled { "block" } else { "none" });
            let _ = style.set_property("left", &format!("{x}px"));
            let _ = style.set_property("top", &format!("{y}px"));
        }
    }

    /// `dom.waitForSelector`: poll via a mutation observer substitute (plain
    /// interval polling, no separate observer wiring needed for a fixed
    /// timeout) — returns `None` on timeout rather than erroring (spec.md
    /// §4.3).
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Option<WebElement> {
        let start = js_sys::Date::now();
        loop {
            if let Some(el) = self.document.query_selector(selector).ok().flatten() {
                return Some(WebElement(el));
            }
            if js_sys::Date::now() - start >= timeout.as_millis() as f64 {
                return None;
            }
            self.sleep_ms(100).await;
        }
    }

    async fn sleep_ms(&self, millis: i32) {
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let win = window().expect("window");
            let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis);
        });
        let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
    }

    /// The first rung of the evaluation ladder (spec.md §4.5): inject an
    /// inline `<script>` that runs `code` in the page's main world and
    /// writes its JSON-stringified result onto a hidden marker element's
    /// attribute, since the isolated content-script world can read the DOM
    /// but not the main world's JS globals directly. Fails (and the caller
    /// falls to the next rung) when CSP blocks the inline script from
    /// executing at all.
    pub fn eval_inline_script(&self, code: &str) -> Result<String, String> {
        const MARKER_ID: &str = "__human_browser_eval_marker__";
        if let Some(stale) = self.document.get_element_by_id(MARKER_ID) {
            stale.remove();
        }
        let body = self.document.body().ok_or("no-document-body")?;

        let holder = self
            .document
            .create_element("div")
            .map_err(|_| "dom-error".to_string())?;
        holder.set_id(MARKER_ID);
        if let Some(html_el) = holder.dyn_ref::<web_sys::HtmlElement>() {
            let _ = html_el.style().set_property("display", "none");
        }
        body.append_child(&holder).map_err(|_| "dom-error".to_string())?;

        let script = self
            .document
            .create_element("script")
            .map_err(|_| "dom-error".to_string())?;
        let wrapped = format!(
            "(function(){{try{{var r=(function(){{{code}}})();\
             document.getElementById('{MARKER_ID}').setAttribute('data-result',JSON.stringify(r===undefined?null:r));\
             document.getElementById('{MARKER_ID}').setAttribute('data-done','1');\
             }}catch(e){{document.getElementById('{MARKER_ID}').setAttribute('data-error',String(e));}}}})();",
        );
        script.set_text_content(Some(&wrapped));
        body.append_child(&script).map_err(|_| "dom-error".to_string())?;
        script.remove();

        let done = holder.get_attribute("data-done");
        let error = holder.get_attribute("data-error");
        let result = holder.get_attribute("data-result");
        holder.remove();

        if let Some(err) = error {
            return Err(err);
        }
        if done.is_none() {
            return Err("csp-blocked-inline".into());
        }
        Ok(result.unwrap_or_else(|| "null".to_string()))
    }

    /// The isolated-world rung (spec.md §4.5): evaluates in the content
    /// script's own JS context, which survives any CSP but cannot see the
    /// page's own globals.
    pub fn eval_isolated_world(&self, code: &str) -> Result<String, String> {
        let wrapped = format!("(function(){{{code}}})()");
        let result = js_sys::eval(&wrapped).map_err(|e| {
            e.dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
                .unwrap_or_else(|| "isolated-world-eval-failed".to_string())
        })?;
        Ok(js_sys::JSON::stringify(&result)
            .map(String::from)
            .unwrap_or_else(|_| "null".to_string()))
    }
}
