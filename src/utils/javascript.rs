use crate::errors::{Result, SeleneError};
use crate::types::{ElementId, ScriptArg};
use serde_json::{json, Value};

/// Key marking an element reference crossing the page boundary.
pub const ELEMENT_KEY: &str = "__selene_element";

/// Builds page expressions and decodes their results.
///
/// Every call runs `body` as a function with `arguments` bound to the
/// encoded arguments. Element references are kept in a page-side registry
/// (`window.__selene`) that holds nodes weakly; a reference whose node left
/// the document raises a stale error and is dropped from the registry. The expression always evaluates to a JSON string, either
/// `{"ok": value}` or `{"err": kind, "message": text}`.
pub struct JavaScriptRunner;

impl JavaScriptRunner {
    pub fn wrap(body: &str, args: &[ScriptArg]) -> Result<String> {
        let encoded: Vec<Value> = args.iter().map(Self::encode_arg).collect();
        let args = serde_json::to_string(&encoded)?;
        Ok(format!(
            r#"(function() {{
    const registry = window.__selene || (window.__selene = {{ seq: 0, nodes: {{}}, ids: new WeakMap() }});
    const lookup = (id) => {{
        const node = registry.nodes[id] && registry.nodes[id].deref();
        if (!node || !node.isConnected) {{
            delete registry.nodes[id];
            throw {{ selene: 'stale', message: id }};
        }}
        return node;
    }};
    const register = (node) => {{
        let id = registry.ids.get(node);
        if (!id) {{
            id = 'selene-' + (++registry.seq);
            registry.ids.set(node, id);
        }}
        registry.nodes[id] = new WeakRef(node);
        return id;
    }};
    const encode = (value) => {{
        if (value instanceof Element) return {{ {key}: register(value) }};
        if (value instanceof NodeList || value instanceof HTMLCollection || Array.isArray(value)) {{
            return Array.from(value).map(encode);
        }}
        return value === undefined ? null : value;
    }};
    const decode = (arg) => (arg && typeof arg === 'object' && arg.{key}) ? lookup(arg.{key}) : arg;
    try {{
        const args = {args}.map(decode);
        const result = (function() {{
{body}
        }}).apply(null, args);
        return JSON.stringify({{ ok: encode(result) }});
    }} catch (e) {{
        if (e && e.selene) return JSON.stringify({{ err: e.selene, message: String(e.message) }});
        return JSON.stringify({{ err: 'javascript', message: String(e && e.message || e) }});
    }}
}})()"#,
            key = ELEMENT_KEY,
            args = args,
            body = body,
        ))
    }

    /// Decodes the JSON envelope returned by a wrapped expression.
    pub fn unwrap(raw: &str) -> Result<Value> {
        let mut envelope: Value = serde_json::from_str(raw)?;
        if let Some(value) = envelope.get_mut("ok") {
            return Ok(value.take());
        }
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Err(match envelope.get("err").and_then(Value::as_str) {
            Some("stale") => SeleneError::StaleElement(message),
            Some("no_such_element") => SeleneError::NoSuchElement(message),
            Some("not_interactable") => SeleneError::NotInteractable(message),
            Some("invalid_selector") => SeleneError::InvalidSelector(message),
            Some(_) => SeleneError::JavaScript(message),
            None => SeleneError::JavaScript(format!("unexpected script result: {}", raw)),
        })
    }

    pub fn encode_arg(arg: &ScriptArg) -> Value {
        match arg {
            ScriptArg::Value(value) => value.clone(),
            ScriptArg::Element(id) => json!({ ELEMENT_KEY: id.as_str() }),
        }
    }

    pub fn element_id(value: &Value) -> Option<ElementId> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementId(id.to_string()))
    }

    pub fn element_ids(value: &Value) -> Result<Vec<ElementId>> {
        let items = value
            .as_array()
            .ok_or_else(|| SeleneError::JavaScript(format!("expected element list, got {}", value)))?;
        items
            .iter()
            .map(|item| {
                Self::element_id(item).ok_or_else(|| {
                    SeleneError::JavaScript(format!("expected element reference, got {}", item))
                })
            })
            .collect()
    }
}

/// Function bodies run through [`JavaScriptRunner::wrap`].
pub mod scripts {
    pub const FIND_ELEMENTS: &str = r#"
const root = arguments[0] || document;
const strategy = arguments[1];
const value = arguments[2];
const visibleText = (node) => (node.innerText || node.textContent || '').replace(/\s+/g, ' ').trim();
try {
    switch (strategy) {
        case 'css': return Array.from(root.querySelectorAll(value));
        case 'id': return Array.from(root.querySelectorAll('#' + CSS.escape(value)));
        case 'name': return Array.from(root.querySelectorAll('[name=' + JSON.stringify(value) + ']'));
        case 'tag': return Array.from(root.getElementsByTagName(value));
        case 'class': return Array.from(root.getElementsByClassName(value));
        case 'link_text': return Array.from(root.querySelectorAll('a')).filter((a) => visibleText(a) === value);
        case 'partial_link_text': return Array.from(root.querySelectorAll('a')).filter((a) => visibleText(a).includes(value));
        case 'xpath': {
            const snapshot = document.evaluate(value, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            const found = [];
            for (let i = 0; i < snapshot.snapshotLength; i++) {
                const node = snapshot.snapshotItem(i);
                if (node instanceof Element) found.push(node);
            }
            return found;
        }
        default: throw { selene: 'invalid_selector', message: 'unknown strategy ' + strategy };
    }
} catch (e) {
    if (e && e.selene) throw e;
    throw { selene: 'invalid_selector', message: String(e && e.message || e) };
}
"#;

    pub const TEXT: &str = r#"
const el = arguments[0];
return (el.innerText === undefined ? el.textContent : el.innerText).replace(/[ \t\r\n\f]+/g, ' ').trim();
"#;

    pub const TAG_NAME: &str = "return arguments[0].tagName.toLowerCase();";

    pub const ATTRIBUTE: &str = r#"
const el = arguments[0];
const name = arguments[1];
if (name === 'value' && 'value' in el) return String(el.value);
if (el.hasAttribute(name)) return el.getAttribute(name);
const property = el[name];
if (property === undefined || property === null || typeof property === 'object' || typeof property === 'function') return null;
if (property === false) return null;
return String(property);
"#;

    pub const CSS_VALUE: &str =
        "return window.getComputedStyle(arguments[0]).getPropertyValue(arguments[1]);";

    pub const IS_DISPLAYED: &str = r#"
const el = arguments[0];
const style = window.getComputedStyle(el);
if (style.visibility === 'hidden' || style.visibility === 'collapse') return false;
return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
"#;

    pub const IS_ENABLED: &str = "return !arguments[0].disabled;";

    pub const IS_SELECTED: &str = "return !!(arguments[0].checked || arguments[0].selected);";

    pub const RECT: &str = r#"
const rect = arguments[0].getBoundingClientRect();
return { x: rect.left + window.scrollX, y: rect.top + window.scrollY, width: rect.width, height: rect.height };
"#;

    /// Viewport-relative box, after scrolling the element into view.
    pub const VIEWPORT_RECT: &str = r#"
const el = arguments[0];
el.scrollIntoView({ block: 'center', inline: 'center' });
const rect = el.getBoundingClientRect();
return { x: rect.left, y: rect.top, width: rect.width, height: rect.height };
"#;

    pub const SCROLL_INTO_VIEW: &str =
        "arguments[0].scrollIntoView({ block: 'center', inline: 'center' }); return null;";

    pub const CLICK: &str = r#"
const el = arguments[0];
el.scrollIntoView({ block: 'center', inline: 'center' });
el.click();
return null;
"#;

    pub const DOUBLE_CLICK: &str = r#"
const el = arguments[0];
el.scrollIntoView({ block: 'center', inline: 'center' });
el.click();
el.click();
el.dispatchEvent(new MouseEvent('dblclick', { bubbles: true, cancelable: true, view: window }));
return null;
"#;

    pub const HOVER: &str = r#"
const el = arguments[0];
el.scrollIntoView({ block: 'center', inline: 'center' });
['mouseover', 'mouseenter', 'mousemove'].forEach((type) =>
    el.dispatchEvent(new MouseEvent(type, { bubbles: type !== 'mouseenter', cancelable: true, view: window })));
return null;
"#;

    pub const CLEAR: &str = r#"
const el = arguments[0];
if (el.readOnly || el.disabled) throw { selene: 'not_interactable', message: 'element is read-only or disabled' };
el.focus();
if ('value' in el) { el.value = ''; } else if (el.isContentEditable) { el.textContent = ''; }
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return null;
"#;

    /// Focuses the element with the caret at the end of its current value.
    pub const FOCUS_END: &str = r#"
const el = arguments[0];
if (el.disabled) throw { selene: 'not_interactable', message: 'element is disabled' };
el.focus();
if (document.activeElement !== el) throw { selene: 'not_interactable', message: 'element cannot be focused' };
try {
    const end = (el.value || '').length;
    el.setSelectionRange(end, end);
} catch (e) {}
return null;
"#;

    pub const SUBMIT: &str = r#"
const el = arguments[0];
const form = el.form || el.closest('form');
if (!form) throw { selene: 'not_interactable', message: 'element is not inside a form' };
if (form.requestSubmit) { form.requestSubmit(); } else { form.submit(); }
return null;
"#;

    pub const TITLE: &str = "return document.title;";

    pub const PAGE_SOURCE: &str = "return document.documentElement.outerHTML;";

    pub const BACK: &str = "window.history.back(); return null;";

    pub const FORWARD: &str = "window.history.forward(); return null;";

    pub const WINDOW_SIZE: &str = "return [window.innerWidth, window.innerHeight];";

    pub const COOKIES: &str = r#"
return document.cookie.split(';')
    .map((cookie) => cookie.trim())
    .filter((cookie) => cookie.length > 0)
    .map((cookie) => {
        const index = cookie.indexOf('=');
        return index < 0
            ? { name: cookie, value: '' }
            : { name: cookie.slice(0, index), value: cookie.slice(index + 1) };
    });
"#;

    pub const SET_COOKIE: &str = "document.cookie = arguments[0]; return null;";

    pub const DELETE_COOKIE: &str =
        "document.cookie = arguments[0] + '=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/'; return null;";

    pub const DELETE_ALL_COOKIES: &str = r#"
document.cookie.split(';').forEach((cookie) => {
    const name = cookie.split('=')[0].trim();
    if (name) document.cookie = name + '=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/';
});
return null;
"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_embeds_body_and_encoded_arguments() {
        let expression = JavaScriptRunner::wrap(
            "return arguments[1];",
            &[ScriptArg::Element(ElementId("selene-7".into())), json!("x").into()],
        )
        .unwrap();
        assert!(expression.contains("return arguments[1];"));
        assert!(expression.contains(r#"[{"__selene_element":"selene-7"},"x"]"#));
    }

    #[test]
    fn test_registry_holds_nodes_weakly() {
        let expression = JavaScriptRunner::wrap("return null;", &[]).unwrap();
        assert!(expression.contains("registry.nodes[id] = new WeakRef(node);"));
        assert!(expression.contains("delete registry.nodes[id];"));
    }

    #[test]
    fn test_window_size_reads_the_viewport() {
        assert!(scripts::WINDOW_SIZE.contains("innerWidth"));
        assert!(!scripts::WINDOW_SIZE.contains("outer"));
    }

    #[test]
    fn test_unwrap_ok_value() {
        let value = JavaScriptRunner::unwrap(r#"{"ok":{"a":[1,2]}}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
        assert_eq!(JavaScriptRunner::unwrap(r#"{"ok":null}"#).unwrap(), Value::Null);
    }

    #[test]
    fn test_unwrap_maps_error_kinds() {
        let stale = JavaScriptRunner::unwrap(r#"{"err":"stale","message":"selene-1"}"#);
        assert!(matches!(stale, Err(SeleneError::StaleElement(id)) if id == "selene-1"));

        let invalid = JavaScriptRunner::unwrap(r#"{"err":"invalid_selector","message":"bad"}"#);
        assert!(matches!(invalid, Err(SeleneError::InvalidSelector(_))));

        let thrown = JavaScriptRunner::unwrap(r#"{"err":"javascript","message":"boom"}"#);
        assert!(matches!(thrown, Err(SeleneError::JavaScript(m)) if m == "boom"));
    }

    #[test]
    fn test_element_ids_from_list() {
        let ids = JavaScriptRunner::element_ids(&json!([
            {"__selene_element": "selene-1"},
            {"__selene_element": "selene-2"}
        ]))
        .unwrap();
        assert_eq!(ids, vec![ElementId("selene-1".into()), ElementId("selene-2".into())]);
        assert!(JavaScriptRunner::element_ids(&json!([1])).is_err());
    }
}
