//! Standard libraries bundled with the engine.

mod builtin;
mod collections;
mod string;

pub use builtin::builtin;
pub use collections::collections;
pub use string::string;

use robotkernel_core_types::Value;

use crate::errors::{KeywordFailure, KeywordResult};
use crate::library::CallContext;
use crate::variables::parse_index;
use robotkernel_event_bus::VariableScope;

pub(crate) fn text(args: &[Value], idx: usize) -> String {
    args.get(idx).map(ToString::to_string).unwrap_or_default()
}

/// Optional custom failure message; `None` and empty values mean absent.
pub(crate) fn custom_message(args: &[Value], idx: usize) -> Option<String> {
    match args.get(idx) {
        None | Some(Value::None) => None,
        Some(value) => {
            let message = value.to_string();
            (!message.is_empty() && message.to_lowercase() != "none").then_some(message)
        }
    }
}

pub(crate) fn fail_with(args: &[Value], idx: usize, default: String) -> KeywordFailure {
    KeywordFailure::new(custom_message(args, idx).unwrap_or(default))
}

pub(crate) fn to_list(value: &Value, what: &str) -> KeywordResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.clone()),
        other => Err(KeywordFailure::new(format!(
            "Expected argument '{what}' to be a list, got {}.",
            other.type_name()
        ))),
    }
}

pub(crate) fn to_dict(value: &Value, what: &str) -> KeywordResult<Vec<(String, Value)>> {
    match value {
        Value::Dict(entries) => Ok(entries.clone()),
        other => Err(KeywordFailure::new(format!(
            "Expected argument '{what}' to be a dictionary, got {}.",
            other.type_name()
        ))),
    }
}

pub(crate) fn to_integer(value: &Value) -> KeywordResult<i64> {
    match value {
        Value::Integer(number) => Ok(*number),
        Value::Float(number) if number.fract() == 0.0 => Ok(*number as i64),
        Value::Bool(flag) => Ok(i64::from(*flag)),
        other => {
            let raw = other.to_string();
            raw.trim().parse().map_err(|_| {
                KeywordFailure::new(format!("'{raw}' cannot be converted to an integer."))
            })
        }
    }
}

pub(crate) fn index_into(items: &[Value], index: &Value) -> KeywordResult<Value> {
    let raw = to_integer(index)?.to_string();
    parse_index(&raw, items.len())
        .map(|idx| items[idx].clone())
        .ok_or_else(|| {
            KeywordFailure::new(format!(
                "Given index {raw} is out of the range 0-{}.",
                items.len().saturating_sub(1)
            ))
        })
}

/// `${name}` for a raw variable argument, accepting `\${name}` and bare names.
pub(crate) fn variable_name(raw: &Value) -> KeywordResult<String> {
    let name = raw.to_string();
    let name = name.trim_start_matches('\\');
    let decorated = if robotkernel_suite::is_variable(name) {
        format!("${{{}}}", &name[2..name.len() - 1])
    } else if !name.is_empty() && !name.contains(['{', '}']) {
        format!("${{{name}}}")
    } else {
        return Err(KeywordFailure::new(format!("Invalid variable name '{name}'.")));
    };
    Ok(decorated)
}

/// Reads the variable named by `raw`, transforms it and stores the result.
pub(crate) fn update_variable<F>(
    ctx: &mut CallContext<'_>,
    raw: &Value,
    update: F,
) -> KeywordResult<Value>
where
    F: FnOnce(Value) -> KeywordResult<Value>,
{
    let name = variable_name(raw)?;
    let current = ctx
        .variable(&name)
        .cloned()
        .ok_or_else(|| KeywordFailure::new(format!("Variable '{name}' not found.")))?;
    let updated = update(current)?;
    ctx.set_variable(&name, updated.clone(), VariableScope::Local);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_names_are_normalized() {
        assert_eq!(variable_name(&"\\${x}".into()).unwrap(), "${x}");
        assert_eq!(variable_name(&"@{items}".into()).unwrap(), "${items}");
        assert_eq!(variable_name(&"plain".into()).unwrap(), "${plain}");
        assert!(variable_name(&"${broken".into()).is_err());
    }

    #[test]
    fn index_into_supports_negative_indexes() {
        let items = vec![Value::from("a"), Value::from("b")];
        assert_eq!(index_into(&items, &"-1".into()).unwrap(), Value::from("b"));
        assert!(index_into(&items, &"2".into()).is_err());
    }
}
