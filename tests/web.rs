//! Browser smoke tests for the TriggerEditor facade
//!
//! Run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use textlens::TriggerEditor;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn editor() -> TriggerEditor {
    let editor = TriggerEditor::new(JsValue::NULL).unwrap();
    let doc = js_sys::JSON::parse(
        r#"{"info": [{"type": "match", "match": ["@client"], "handler": {"options": [
            {"label": "Blackrock", "on-select": {"display": "Blackrock"}}
        ]}}]}"#,
    )
    .unwrap();
    editor.load_configuration(doc).unwrap();
    editor
}

#[wasm_bindgen_test]
fn commit_through_facade() {
    let editor = editor();
    assert!(editor.is_ready());

    editor.set_text("ping @client now", None);
    assert!(editor.render_html().contains("tl-trigger"));
    assert!(editor.key_down("Enter"));
    assert_eq!(editor.get_text(), "ping Blackrock now");
}

#[wasm_bindgen_test]
fn invalid_json_is_rejected() {
    let editor = editor();
    assert!(editor.load_configuration_json("{ nope").is_err());
    assert_eq!(editor.state_name(), "loaded");
}

#[wasm_bindgen_test]
fn destroy_clears_text() {
    let editor = editor();
    editor.set_text("@client", None);
    editor.destroy();
    assert_eq!(editor.get_text(), "");
}
