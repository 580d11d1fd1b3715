use robotkernel_core_types::Value;
use robotkernel_event_bus::VariableScope;

use super::{custom_message, fail_with, text, to_integer, variable_name};
use crate::errors::{KeywordFailure, KeywordResult};
use crate::library::{is_truthy, CallContext, Library};

const LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "ERROR", "HTML"];

pub fn builtin() -> Library {
    Library::new(
        "BuiltIn",
        "Generic keywords that are always available.",
    )
    .keyword(
        "Log",
        &["message", "level=INFO", "html=False", "console=False"],
        "Logs the given message with the given level.\n\n\
         With `html=True` the message is rendered as HTML in the log file.",
        log,
    )
    .keyword(
        "Log To Console",
        &["message"],
        "Writes the given message to the console.",
        |ctx, args| {
            ctx.console(&text(args, 0));
            Ok(Value::None)
        },
    )
    .keyword(
        "Log Many",
        &["*messages"],
        "Logs the given messages as separate entries.",
        |ctx, args| {
            for message in args {
                ctx.log("INFO", message.to_string());
            }
            Ok(Value::None)
        },
    )
    .keyword("No Operation", &[], "Does absolutely nothing.", |_, _| {
        Ok(Value::None)
    })
    .keyword(
        "Fail",
        &["msg=None"],
        "Fails the test with the given message.",
        |_, args| Err(fail_with(args, 0, "AssertionError".into())),
    )
    .keyword(
        "Set Variable",
        &["*values"],
        "Returns the given values; several values are returned as a list.",
        |_, args| {
            Ok(match args {
                [] => Value::String(String::new()),
                [single] => single.clone(),
                many => Value::List(many.to_vec()),
            })
        },
    )
    .variable_keyword(
        "Set Test Variable",
        &["name", "*values"],
        "Makes a variable available everywhere within the running test.",
        |ctx, args| set_scoped(ctx, args, VariableScope::Test),
    )
    .variable_keyword(
        "Set Suite Variable",
        &["name", "*values"],
        "Makes a variable available everywhere within the running suite.",
        |ctx, args| set_scoped(ctx, args, VariableScope::Suite),
    )
    .variable_keyword(
        "Set Global Variable",
        &["name", "*values"],
        "Makes a variable available globally.",
        |ctx, args| set_scoped(ctx, args, VariableScope::Global),
    )
    .keyword(
        "Should Be Equal",
        &["first", "second", "msg=None"],
        "Fails if the given objects are unequal.",
        |_, args| {
            let (first, second) = (&args[0], &args[1]);
            if first == second {
                return Ok(Value::None);
            }
            Err(fail_with(args, 2, inequality(first, second)))
        },
    )
    .keyword(
        "Should Not Be Equal",
        &["first", "second", "msg=None"],
        "Fails if the given objects are equal.",
        |_, args| {
            if args[0] != args[1] {
                return Ok(Value::None);
            }
            Err(fail_with(args, 2, format!("{} == {}", args[0], args[1])))
        },
    )
    .keyword(
        "Should Contain",
        &["container", "item", "msg=None"],
        "Fails if `container` does not contain `item`.",
        |_, args| {
            if contains(&args[0], &args[1]) {
                return Ok(Value::None);
            }
            Err(fail_with(
                args,
                2,
                format!("'{}' does not contain '{}'", args[0], args[1]),
            ))
        },
    )
    .keyword(
        "Should Be Empty",
        &["item", "msg=None"],
        "Verifies that the given item is empty.",
        |_, args| {
            if length(&args[0])? == 0 {
                return Ok(Value::None);
            }
            Err(fail_with(args, 1, format!("'{}' should be empty.", args[0])))
        },
    )
    .keyword(
        "Should Not Be Empty",
        &["item", "msg=None"],
        "Verifies that the given item is not empty.",
        |_, args| {
            if length(&args[0])? > 0 {
                return Ok(Value::None);
            }
            Err(fail_with(args, 1, format!("'{}' should not be empty.", args[0])))
        },
    )
    .keyword(
        "Create List",
        &["*items"],
        "Returns a list containing the given items.",
        |_, args| Ok(Value::List(args.to_vec())),
    )
    .keyword(
        "Create Dictionary",
        &["*items"],
        "Creates a dictionary from `key=value` items.",
        |_, args| {
            let mut entries: Vec<(String, Value)> = Vec::new();
            for item in args {
                let raw = item.to_string();
                let Some((key, value)) = raw.split_once('=') else {
                    return Err(KeywordFailure::new(format!(
                        "Invalid dictionary item '{raw}': expected 'key=value'."
                    )));
                };
                let value = Value::from(value);
                match entries.iter_mut().find(|(existing, _)| existing == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key.to_string(), value)),
                }
            }
            Ok(Value::Dict(entries))
        },
    )
    .keyword(
        "Catenate",
        &["*items"],
        "Catenates the given items with a space, or with `SEPARATOR=<sep>` given first.",
        |_, args| {
            let mut items: Vec<String> = args.iter().map(ToString::to_string).collect();
            let separator = match items.first().and_then(|first| first.strip_prefix("SEPARATOR=")) {
                Some(separator) => {
                    let separator = separator.to_string();
                    items.remove(0);
                    separator
                }
                None => " ".to_string(),
            };
            Ok(Value::String(items.join(&separator)))
        },
    )
    .keyword(
        "Get Length",
        &["item"],
        "Returns the length of the given item.",
        |_, args| Ok(Value::Integer(length(&args[0])? as i64)),
    )
    .keyword(
        "Length Should Be",
        &["item", "length", "msg=None"],
        "Verifies that the length of the given item is correct.",
        |_, args| {
            let actual = length(&args[0])? as i64;
            let expected = to_integer(&args[1])?;
            if actual == expected {
                return Ok(Value::None);
            }
            Err(fail_with(
                args,
                2,
                format!(
                    "Length of '{}' should be {expected} but is {actual}.",
                    args[0]
                ),
            ))
        },
    )
    .keyword(
        "Convert To Integer",
        &["item", "base=None"],
        "Converts the given item to an integer number.",
        |_, args| {
            let Some(base) = custom_message(args, 1) else {
                return to_integer(&args[0]).map(Value::Integer);
            };
            let radix: u32 = base
                .parse()
                .map_err(|_| KeywordFailure::new(format!("Invalid base '{base}'.")))?;
            let raw = args[0].to_string();
            let digits = raw
                .trim()
                .trim_start_matches("0x")
                .trim_start_matches("0b")
                .trim_start_matches("0o");
            i64::from_str_radix(digits, radix)
                .map(Value::Integer)
                .map_err(|_| {
                    KeywordFailure::new(format!(
                        "'{raw}' cannot be converted to an integer in base {radix}."
                    ))
                })
        },
    )
    .keyword(
        "Convert To String",
        &["item"],
        "Converts the given item to a Unicode string.",
        |_, args| Ok(Value::String(args[0].to_string())),
    )
    .keyword(
        "Import Library",
        &["name", "*args"],
        "Imports a library with the given name during execution.",
        |ctx, args| {
            let name = text(args, 0);
            let rest = args[1..].iter().map(ToString::to_string).collect();
            ctx.import_library(&name, rest);
            Ok(Value::None)
        },
    )
}

fn log(ctx: &mut CallContext<'_>, args: &[Value]) -> KeywordResult<Value> {
    let message = text(args, 0);
    let mut level = text(args, 1).to_uppercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(KeywordFailure::new(format!("Invalid log level '{level}'.")));
    }
    let html = level == "HTML" || args.get(2).is_some_and(is_truthy);
    if level == "HTML" {
        level = "INFO".into();
    }
    if args.get(3).is_some_and(is_truthy) {
        ctx.console(&message);
    }
    if html {
        ctx.log_html(&level, message);
    } else {
        ctx.log(&level, message);
    }
    Ok(Value::None)
}

fn set_scoped(
    ctx: &mut CallContext<'_>,
    args: &[Value],
    scope: VariableScope,
) -> KeywordResult<Value> {
    let name = variable_name(&args[0])?;
    let values = &args[1..];
    let value = match values {
        [] => ctx
            .variable(&name)
            .cloned()
            .ok_or_else(|| KeywordFailure::new(format!("Variable '{name}' not found.")))?,
        [single] => single.clone(),
        many => Value::List(many.to_vec()),
    };
    ctx.log("INFO", format!("{name} = {value}"));
    ctx.set_variable(&name, value, scope);
    Ok(Value::None)
}

fn inequality(first: &Value, second: &Value) -> String {
    if first.to_string() == second.to_string() {
        format!(
            "{first} ({}) != {second} ({})",
            first.type_name(),
            second.type_name()
        )
    } else {
        format!("{first} != {second}")
    }
}

fn contains(container: &Value, item: &Value) -> bool {
    match container {
        Value::String(text) => text.contains(&item.to_string()),
        Value::List(items) => items.iter().any(|candidate| candidate == item),
        Value::Dict(entries) => {
            let key = item.to_string();
            entries.iter().any(|(existing, _)| *existing == key)
        }
        Value::Bytes(bytes) => {
            let needle = item.to_string().into_bytes();
            !needle.is_empty() && bytes.windows(needle.len()).any(|window| window == needle)
        }
        _ => false,
    }
}

fn length(item: &Value) -> KeywordResult<usize> {
    item.len().ok_or_else(|| {
        KeywordFailure::new(format!(
            "Could not get length of '{item}' ({}).",
            item.type_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inequality_mentions_types_when_text_matches() {
        assert_eq!(
            inequality(&Value::Integer(1), &Value::from("1")),
            "1 (integer) != 1 (string)"
        );
        assert_eq!(inequality(&"a".into(), &"b".into()), "a != b");
    }

    #[test]
    fn contains_handles_strings_lists_and_dicts() {
        assert!(contains(&"robot".into(), &"bot".into()));
        assert!(contains(&Value::List(vec!["a".into()]), &"a".into()));
        assert!(contains(&Value::Dict(vec![("k".into(), Value::None)]), &"k".into()));
        assert!(!contains(&Value::Integer(1), &"1".into()));
    }
}
