//! Page-side script templates.
//!
//! Each builder returns a self-invoking expression evaluated in the chat
//! tab. The shapes these scripts return are a wire contract: the driver
//! deserializes them field-for-field, so changes here must stay in sync
//! with `driver::RawObservation` and `driver::ChatMessages`.
//!
//! User text and selectors cross into script source only as JSON string
//! literals, never by hand-escaping characters.

use chatpilot_core::ChatConfig;
use serde_json::Value;

/// Quote a Rust string as a JavaScript string literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Count of assistant message elements currently in the document.
pub fn count_assistant(config: &ChatConfig) -> String {
    format!(
        "document.querySelectorAll({sel}).length",
        sel = js_string(&config.assistant_selector)
    )
}

/// Locate the input field, set its content, and fire a bubbling `input`
/// event so the page's reactive state picks up the change.
pub fn inject_input(config: &ChatConfig, text: &str) -> String {
    format!(
        r#"(function() {{
    var field = document.querySelector({input});
    if (!field) return {{ error: "input field not found" }};
    field.innerHTML = '<p>' + {text} + '</p>';
    field.dispatchEvent(new Event('input', {{ bubbles: true }}));
    return {{ success: true }};
}})()"#,
        input = js_string(&config.input_selector),
        text = js_string(text),
    )
}

/// Locate and activate the send control.
pub fn click_send(config: &ChatConfig) -> String {
    format!(
        r#"(function() {{
    var btn = document.querySelector({send});
    if (btn) {{ btn.click(); return {{ success: true }}; }}
    return {{ error: "send control not found" }};
}})()"#,
        send = js_string(&config.send_button_selector),
    )
}

/// One poll tick: message count, the last assistant body's outerHTML
/// (converted to markdown on our side), a plain-text fallback, and any
/// non-inline image references in document order.
pub fn observe(config: &ChatConfig) -> String {
    format!(
        r#"(function() {{
    var msgs = document.querySelectorAll({assistant});
    if (msgs.length === 0) return {{ count: 0, html: "", text: "", images: [] }};
    var last = msgs[msgs.length - 1];
    var body = last.querySelector({body});
    var images = [];
    last.querySelectorAll('img').forEach(function(img) {{
        var src = img.src || img.getAttribute('src');
        if (src && !src.startsWith('data:')) {{
            images.push({{ src: src, alt: img.alt || '' }});
        }}
    }});
    return {{
        count: msgs.length,
        html: body ? body.outerHTML : "",
        text: last.innerText,
        images: images
    }};
}})()"#,
        assistant = js_string(&config.assistant_selector),
        body = js_string(&config.body_selector),
    )
}

/// Snapshot of the whole conversation as plain text, both roles.
pub fn messages(config: &ChatConfig) -> String {
    format!(
        r#"(function() {{
    var result = {{ user: [], assistant: [] }};
    document.querySelectorAll({user}).forEach(function(el) {{
        var bubble = el.querySelector({bubble});
        result.user.push(bubble ? bubble.innerText : el.innerText);
    }});
    document.querySelectorAll({assistant}).forEach(function(el) {{
        var body = el.querySelector({body});
        result.assistant.push(body ? body.innerText : el.innerText);
    }});
    return result;
}})()"#,
        user = js_string(&config.user_selector),
        bubble = js_string(&config.user_bubble_selector),
        assistant = js_string(&config.assistant_selector),
        body = js_string(&config.body_selector),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes_and_newlines() {
        assert_eq!(js_string(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(js_string("a\nb"), r#""a\nb""#);
        assert_eq!(js_string("back\\slash"), r#""back\\slash""#);
    }

    #[test]
    fn test_inject_input_embeds_text_as_literal() {
        let config = ChatConfig::default();
        let hostile = "'); document.body.remove(); //\n\"quoted\"";
        let script = inject_input(&config, hostile);
        // The payload must appear only as one escaped JSON literal; the
        // raw text (real newline, unescaped quotes) must not.
        assert!(script.contains(&js_string(hostile)));
        assert!(!script.contains(hostile));
    }

    #[test]
    fn test_inject_input_uses_configured_selector() {
        let config = ChatConfig {
            input_selector: "#custom-input".to_string(),
            ..ChatConfig::default()
        };
        let script = inject_input(&config, "hello");
        assert!(script.contains(r##""#custom-input""##));
    }

    #[test]
    fn test_observe_returns_contract_fields() {
        let script = observe(&ChatConfig::default());
        for field in ["count:", "html:", "text:", "images:"] {
            assert!(script.contains(field), "missing field {field}");
        }
        assert!(script.contains("data:"));
        assert!(script.contains("outerHTML"));
    }

    #[test]
    fn test_count_uses_assistant_selector() {
        let script = count_assistant(&ChatConfig::default());
        assert!(script.contains("data-message-author-role"));
        assert!(script.ends_with(".length"));
    }

    #[test]
    fn test_messages_covers_both_roles() {
        let script = messages(&ChatConfig::default());
        assert!(script.contains("user: []"));
        assert!(script.contains("assistant: []"));
        assert!(script.contains(".whitespace-pre-wrap"));
        assert!(script.contains(".markdown"));
    }
}
