//! TextLens: Trigger Scanner + Annotated Overlay
//!
//! A Rust/WASM engine that turns a plain text field into an annotated
//! surface: live text is scanned against declarative triggers, rendered
//! with highlighted spans aligned char-for-char with the raw text, and
//! driven by a tooltip/menu interaction layer that can rewrite the text.
//!
//! # Architecture
//!
//! ## Scanner Components
//! - `rules.rs` - TriggerIndex: Compiles the trigger document into ordered rules
//! - `matcher.rs` - Scanner: Line-addressed, conflict-free matching
//! - `overlay.rs` - OverlayProjector: Plain/annotated segments + HTML mirror
//! - `interaction.rs` - InteractionStateMachine: Tooltip and menu sessions
//! - `validation.rs` - ValidationAggregator: Change-only validation summaries
//! - `edit.rs` - Text edits and caret/selection mapping
//! - `placement.rs` - Clamped affordance positioning
//! - `surface.rs` - TriggerSurface: One editing surface, owned by the host
//! - `wasm.rs` - TriggerEditor: wasm-bindgen facade
//!
//! ## Ambient
//! - `config.rs` - Engine options and defaults
//! - `logging.rs` - `log` backend writing to the browser console
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { TriggerEditor } from 'textlens';
//!
//! await init();
//!
//! const editor = new TriggerEditor(null);
//! editor.loadConfiguration({
//!   info: [{ type: 'match', match: ['@client'],
//!            handler: { options: [{ label: 'Blackrock', 'on-select': { display: 'Blackrock' } }] } }]
//! });
//!
//! editor.setText('ping @client now');
//! mirror.innerHTML = editor.renderHtml();
//! editor.keyDown('Enter');     // commits "Blackrock"
//! console.log(editor.getText()); // "ping Blackrock now"
//! ```

pub mod config;
pub mod logging;
pub mod scanner;

pub use config::*;
pub use scanner::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Panic hook and console logging for the browser
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Info);
}

/// Change the console log level ("off", "error", "warn", "info", "debug", "trace")
#[wasm_bindgen(js_name = "setLogLevel")]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let filter = logging::parse_level(level)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown log level `{}`", level)))?;
    logging::init(filter);
    Ok(())
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("textlens v{}", env!("CARGO_PKG_VERSION"))
}

/// Lay out an affordance without an editor instance
#[wasm_bindgen(js_name = "placeAffordance")]
pub fn place_affordance_js(
    anchor: JsValue,
    popup: JsValue,
    viewport: JsValue,
    margin: f64,
) -> Result<JsValue, JsValue> {
    let anchor: scanner::Rect = serde_wasm_bindgen::from_value(anchor)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse anchor: {}", e)))?;
    let popup: scanner::Size = serde_wasm_bindgen::from_value(popup)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse popup size: {}", e)))?;
    let viewport: scanner::Size = serde_wasm_bindgen::from_value(viewport)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse viewport: {}", e)))?;
    let placement = scanner::place_affordance(anchor, popup, viewport, margin);
    serde_wasm_bindgen::to_value(&placement).map_err(|e| JsValue::from_str(&e.to_string()))
}
