//! TriggerEditor: wasm-bindgen facade over [`TriggerSurface`]
//!
//! The host wires DOM events to these methods and renders `renderHtml()` or
//! `segments()` into a mirror element behind its textarea. Host callbacks
//! are invoked after each call, once the surface is no longer borrowed, so a
//! callback may call back into the editor.
//!
//! ```javascript,ignore
//! const editor = new TriggerEditor({ tooltipDelayMs: 250 });
//! editor.onValidationChange((summary) => submit.disabled = summary.has_blocking_error);
//! editor.onTextChange((text) => textarea.value = text);
//! await editor.loadConfigurationAsync(fetch('/triggers.json').then((r) => r.json()));
//! textarea.addEventListener('input', () => editor.setText(textarea.value, textarea.selectionStart));
//! ```

use instant::Instant;
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use crate::config::EngineConfig;
use crate::scanner::interaction::{Key, KeyOutcome, MenuFocus};
use crate::scanner::placement::{Rect, Size};
use crate::scanner::surface::{SurfaceEvent, TriggerSurface};

#[derive(Default, Clone)]
struct Callbacks {
    on_hover: Option<js_sys::Function>,
    on_select: Option<js_sys::Function>,
    on_validation_change: Option<js_sys::Function>,
    on_text_change: Option<js_sys::Function>,
}

/// Engine options as written by JS callers
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct JsOptions {
    tooltip_delay_ms: Option<u64>,
    auto_open_menus: Option<bool>,
    separator: Option<char>,
    change_detection: Option<crate::config::ChangeDetection>,
    affordance_margin: Option<f64>,
    max_menu_height: Option<f64>,
}

impl JsOptions {
    fn into_config(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            tooltip_delay_ms: self.tooltip_delay_ms.unwrap_or(defaults.tooltip_delay_ms),
            auto_open_menus: self.auto_open_menus.unwrap_or(defaults.auto_open_menus),
            separator: self.separator.unwrap_or(defaults.separator),
            change_detection: self.change_detection.unwrap_or(defaults.change_detection),
            affordance_margin: self.affordance_margin.unwrap_or(defaults.affordance_margin),
            max_menu_height: self.max_menu_height.unwrap_or(defaults.max_menu_height),
        }
    }
}

fn to_js<T: serde::Serialize + ?Sized>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

fn call(callback: &Option<js_sys::Function>, name: &str, args: &[JsValue]) {
    let Some(f) = callback else {
        return;
    };
    let result = match args {
        [a] => f.call1(&JsValue::NULL, a),
        [a, b] => f.call2(&JsValue::NULL, a, b),
        _ => f.call0(&JsValue::NULL),
    };
    if let Err(e) = result {
        log::warn!("[TriggerEditor] {} callback threw: {:?}", name, e);
    }
}

/// Drain queued events and hand them to the host callbacks
fn dispatch(surface: &RefCell<TriggerSurface>, callbacks: &RefCell<Callbacks>) {
    let events = surface.borrow_mut().drain_events();
    if events.is_empty() {
        return;
    }
    let callbacks = callbacks.borrow().clone();
    for event in events {
        match event {
            SurfaceEvent::Hover { snapshot } => {
                call(&callbacks.on_hover, "onHover", &[to_js(&snapshot)]);
            }
            SurfaceEvent::Select { snapshot, option } => {
                call(
                    &callbacks.on_select,
                    "onSelect",
                    &[to_js(&snapshot), to_js(&option)],
                );
            }
            SurfaceEvent::ValidationChange { summary } => {
                call(
                    &callbacks.on_validation_change,
                    "onValidationChange",
                    &[to_js(&summary)],
                );
            }
            SurfaceEvent::TextReplaced { text, selection } => {
                call(
                    &callbacks.on_text_change,
                    "onTextChange",
                    &[JsValue::from_str(&text), to_js(&selection)],
                );
            }
        }
    }
}

fn warning_strings(warnings: &[crate::scanner::rules::ConfigError]) -> JsValue {
    let messages: Vec<String> = warnings.iter().map(|w| w.to_string()).collect();
    to_js(&messages)
}

// =============================================================================
// TriggerEditor
// =============================================================================

#[wasm_bindgen]
pub struct TriggerEditor {
    surface: Rc<RefCell<TriggerSurface>>,
    callbacks: Rc<RefCell<Callbacks>>,
}

impl TriggerEditor {
    fn flush(&self) {
        dispatch(&self.surface, &self.callbacks);
    }

    fn with_surface<R>(&self, f: impl FnOnce(&mut TriggerSurface) -> R) -> R {
        let result = f(&mut self.surface.borrow_mut());
        self.flush();
        result
    }
}

#[wasm_bindgen]
impl TriggerEditor {
    /// Create an editor; `options` may be null/undefined for defaults
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<TriggerEditor, JsValue> {
        let options: JsOptions = if options.is_null() || options.is_undefined() {
            JsOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)
                .map_err(|e| JsValue::from_str(&format!("Failed to parse options: {}", e)))?
        };
        Ok(Self {
            surface: Rc::new(RefCell::new(TriggerSurface::new(options.into_config()))),
            callbacks: Rc::new(RefCell::new(Callbacks::default())),
        })
    }

    // ---------------------------------------------------------------------
    // Callbacks
    // ---------------------------------------------------------------------

    #[wasm_bindgen(js_name = "onHover")]
    pub fn on_hover(&self, callback: Option<js_sys::Function>) {
        self.callbacks.borrow_mut().on_hover = callback;
    }

    #[wasm_bindgen(js_name = "onSelect")]
    pub fn on_select(&self, callback: Option<js_sys::Function>) {
        self.callbacks.borrow_mut().on_select = callback;
    }

    #[wasm_bindgen(js_name = "onValidationChange")]
    pub fn on_validation_change(&self, callback: Option<js_sys::Function>) {
        self.callbacks.borrow_mut().on_validation_change = callback;
    }

    #[wasm_bindgen(js_name = "onTextChange")]
    pub fn on_text_change(&self, callback: Option<js_sys::Function>) {
        self.callbacks.borrow_mut().on_text_change = callback;
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    /// Load a trigger document object. Returns the absorbed warnings as strings.
    #[wasm_bindgen(js_name = "loadConfiguration")]
    pub fn load_configuration(&self, document: JsValue) -> Result<JsValue, JsValue> {
        let doc: Value = serde_wasm_bindgen::from_value(document)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse trigger document: {}", e)))?;
        let warnings = self.with_surface(|s| s.load_configuration(&doc));
        Ok(warning_strings(&warnings))
    }

    /// Load a trigger document from JSON text. Invalid JSON keeps the current configuration.
    #[wasm_bindgen(js_name = "loadConfigurationJson")]
    pub fn load_configuration_json(&self, json: &str) -> Result<JsValue, JsValue> {
        let warnings = self
            .with_surface(|s| s.load_configuration_str(json))
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(warning_strings(&warnings))
    }

    /// Load from a promise resolving to the document. Scans yield nothing until it resolves.
    #[wasm_bindgen(js_name = "loadConfigurationAsync")]
    pub fn load_configuration_async(&self, document: js_sys::Promise) -> js_sys::Promise {
        let surface = Rc::clone(&self.surface);
        let callbacks = Rc::clone(&self.callbacks);

        future_to_promise(async move {
            let resolved = JsFuture::from(document).await?;
            let doc: Value = serde_wasm_bindgen::from_value(resolved).map_err(|e| {
                JsValue::from_str(&format!("Failed to parse trigger document: {}", e))
            })?;
            let warnings = surface.borrow_mut().load_configuration(&doc);
            dispatch(&surface, &callbacks);
            Ok(warning_strings(&warnings))
        })
    }

    #[wasm_bindgen(js_name = "isReady")]
    pub fn is_ready(&self) -> bool {
        self.surface.borrow().is_ready()
    }

    #[wasm_bindgen(js_name = "stateName")]
    pub fn state_name(&self) -> String {
        self.surface.borrow().state_name().to_string()
    }

    #[wasm_bindgen(js_name = "stats")]
    pub fn stats(&self) -> JsValue {
        to_js(&self.surface.borrow().stats())
    }

    // ---------------------------------------------------------------------
    // Text
    // ---------------------------------------------------------------------

    /// `caret` is the field's `selectionStart` after the change, when known
    #[wasm_bindgen(js_name = "setText")]
    pub fn set_text(&self, text: &str, caret: Option<u32>) {
        self.with_surface(|s| s.set_text_at(text, caret.map(|c| c as usize)));
    }

    #[wasm_bindgen(js_name = "getText")]
    pub fn get_text(&self) -> String {
        self.surface.borrow().text().to_string()
    }

    #[wasm_bindgen(js_name = "setSelection")]
    pub fn set_selection(&self, start: u32, end: u32) {
        self.surface
            .borrow_mut()
            .set_selection(start as usize, end as usize);
    }

    #[wasm_bindgen(js_name = "getSelection")]
    pub fn get_selection(&self) -> JsValue {
        to_js(&self.surface.borrow().selection())
    }

    #[wasm_bindgen(js_name = "matches")]
    pub fn matches(&self) -> JsValue {
        to_js(self.surface.borrow().matches())
    }

    #[wasm_bindgen(js_name = "segments")]
    pub fn segments(&self) -> JsValue {
        to_js(&self.surface.borrow().segments())
    }

    #[wasm_bindgen(js_name = "renderHtml")]
    pub fn render_html(&self) -> String {
        self.surface.borrow().render_html()
    }

    /// Summary of the current matches
    #[wasm_bindgen(js_name = "summary")]
    pub fn summary(&self) -> JsValue {
        to_js(&self.surface.borrow().current_summary())
    }

    #[wasm_bindgen(js_name = "session")]
    pub fn session(&self) -> JsValue {
        to_js(&self.surface.borrow().session())
    }

    // ---------------------------------------------------------------------
    // Gestures
    // ---------------------------------------------------------------------

    /// Returns the tooltip delay in ms when a tooltip was scheduled; call `tick()` after it
    #[wasm_bindgen(js_name = "pointerEnter")]
    pub fn pointer_enter(&self, match_index: u32) -> Option<f64> {
        let now = Instant::now();
        let due = self.with_surface(|s| s.pointer_enter(match_index as usize, now))?;
        Some((due - now).as_secs_f64() * 1000.0)
    }

    #[wasm_bindgen(js_name = "pointerLeave")]
    pub fn pointer_leave(&self, match_index: u32) {
        self.surface.borrow_mut().pointer_leave(match_index as usize);
    }

    #[wasm_bindgen(js_name = "tooltipPointerLeave")]
    pub fn tooltip_pointer_leave(&self) {
        self.surface.borrow_mut().tooltip_pointer_leave();
    }

    /// Timer callback. Returns the match index whose tooltip opened.
    #[wasm_bindgen(js_name = "tick")]
    pub fn tick(&self) -> Option<u32> {
        self.with_surface(|s| s.tick(Instant::now()))
            .map(|i| i as u32)
    }

    /// Milliseconds until the pending tooltip is due, if one is pending
    #[wasm_bindgen(js_name = "nextTimerDelay")]
    pub fn next_timer_delay(&self) -> Option<f64> {
        let due = self.surface.borrow().next_timer_due()?;
        let now = Instant::now();
        Some(if due > now {
            (due - now).as_secs_f64() * 1000.0
        } else {
            0.0
        })
    }

    #[wasm_bindgen(js_name = "click")]
    pub fn click(&self, match_index: u32) -> bool {
        self.with_surface(|s| s.click(match_index as usize))
    }

    /// Returns true when the host should call `preventDefault()`
    #[wasm_bindgen(js_name = "keyDown")]
    pub fn key_down(&self, key: &str) -> bool {
        let outcome = self.with_surface(|s| s.key(Key::from_dom(key)));
        !matches!(outcome, KeyOutcome::Ignored)
    }

    #[wasm_bindgen(js_name = "setFilter")]
    pub fn set_filter(&self, filter_text: &str) {
        self.surface.borrow_mut().set_filter(filter_text);
    }

    #[wasm_bindgen(js_name = "setFreeformText")]
    pub fn set_freeform_text(&self, text: &str) {
        self.surface.borrow_mut().set_freeform_text(text);
    }

    /// `target` is "list", "filter" or "freeform"
    #[wasm_bindgen(js_name = "focusMenu")]
    pub fn focus_menu(&self, target: &str) -> Result<(), JsValue> {
        let focus = match target {
            "list" => MenuFocus::List,
            "filter" => MenuFocus::Filter,
            "freeform" => MenuFocus::Freeform,
            other => return Err(JsValue::from_str(&format!("Unknown menu focus `{}`", other))),
        };
        self.surface.borrow_mut().focus_menu(focus);
        Ok(())
    }

    #[wasm_bindgen(js_name = "highlight")]
    pub fn highlight(&self, visible_pos: u32) {
        self.surface.borrow_mut().highlight(visible_pos as usize);
    }

    /// Click on a visible option. True when a commit happened.
    #[wasm_bindgen(js_name = "choose")]
    pub fn choose(&self, visible_pos: u32) -> bool {
        self.with_surface(|s| s.choose(visible_pos as usize)).is_some()
    }

    #[wasm_bindgen(js_name = "dismiss")]
    pub fn dismiss(&self) {
        self.surface.borrow_mut().dismiss();
    }

    #[wasm_bindgen(js_name = "outsideClick")]
    pub fn outside_click(&self) {
        self.surface.borrow_mut().outside_click();
    }

    #[wasm_bindgen(js_name = "blur")]
    pub fn blur(&self, focus_in_menu: bool) {
        self.surface.borrow_mut().blur(focus_in_menu);
    }

    /// Position the open affordance. Each argument is a plain `{x, y, width, height}` / `{width, height}` object.
    #[wasm_bindgen(js_name = "placeAffordance")]
    pub fn place_affordance(
        &self,
        anchor: JsValue,
        popup: JsValue,
        viewport: JsValue,
    ) -> Result<JsValue, JsValue> {
        let anchor: Rect = serde_wasm_bindgen::from_value(anchor)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse anchor: {}", e)))?;
        let popup: Size = serde_wasm_bindgen::from_value(popup)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse popup size: {}", e)))?;
        let viewport: Size = serde_wasm_bindgen::from_value(viewport)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse viewport: {}", e)))?;
        Ok(to_js(&self.surface.borrow().place(anchor, popup, viewport)))
    }

    /// Release session state and callbacks. The editor stays usable.
    #[wasm_bindgen(js_name = "destroy")]
    pub fn destroy(&self) {
        self.surface.borrow_mut().teardown();
        *self.callbacks.borrow_mut() = Callbacks::default();
    }
}
