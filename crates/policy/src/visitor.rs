//! String-leaf traversal over JSON values.
//!
//! Detection and redaction both walk the same shape: objects and arrays are
//! descended, every string leaf is handed to a callback, numbers/bools/null
//! are left alone. Object keys are not visited.

use serde_json::Value;
use std::ops::ControlFlow;

/// Visit every string leaf, stopping at the first `Break`.
pub fn visit_strings<B>(
    value: &Value,
    f: &mut impl FnMut(&str) -> ControlFlow<B>,
) -> ControlFlow<B> {
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => {
            for item in items {
                visit_strings(item, f)?;
            }
            ControlFlow::Continue(())
        }
        Value::Object(map) => {
            for v in map.values() {
                visit_strings(v, f)?;
            }
            ControlFlow::Continue(())
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => ControlFlow::Continue(()),
    }
}

/// Rewrite every string leaf in place.
pub fn rewrite_strings(value: &mut Value, f: &mut impl FnMut(&str) -> String) {
    match value {
        Value::String(s) => *s = f(s),
        Value::Array(items) => items.iter_mut().for_each(|item| rewrite_strings(item, f)),
        Value::Object(map) => map.values_mut().for_each(|v| rewrite_strings(v, f)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
