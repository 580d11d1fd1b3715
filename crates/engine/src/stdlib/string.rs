use robotkernel_core_types::Value;

use super::{custom_message, fail_with, text, to_integer};
use crate::errors::KeywordFailure;
use crate::library::Library;

pub fn string() -> Library {
    Library::new("String", "Keywords for manipulating strings.")
        .keyword(
            "Convert To Upper Case",
            &["string"],
            "Converts string to upper case.",
            |_, args| Ok(Value::String(text(args, 0).to_uppercase())),
        )
        .keyword(
            "Convert To Lower Case",
            &["string"],
            "Converts string to lower case.",
            |_, args| Ok(Value::String(text(args, 0).to_lowercase())),
        )
        .keyword(
            "Split String",
            &["string", "separator=None", "max_split=-1"],
            "Splits the `string` using `separator` as a delimiter string.\n\n\
             Without a separator the string is split on whitespace.",
            |_, args| {
                let source = text(args, 0);
                let max_split = to_integer(&args[2])?;
                let parts: Vec<String> = match custom_message(args, 1) {
                    Some(separator) if max_split >= 0 => source
                        .splitn(max_split as usize + 1, separator.as_str())
                        .map(str::to_string)
                        .collect(),
                    Some(separator) => source
                        .split(separator.as_str())
                        .map(str::to_string)
                        .collect(),
                    None if max_split >= 0 => split_whitespace_n(&source, max_split as usize),
                    None => source.split_whitespace().map(str::to_string).collect(),
                };
                Ok(Value::List(parts.into_iter().map(Value::String).collect()))
            },
        )
        .keyword(
            "Replace String",
            &["string", "search_for", "replace_with", "count=-1"],
            "Replaces `search_for` in the given `string` with `replace_with`.",
            |_, args| {
                let source = text(args, 0);
                let (from, to) = (text(args, 1), text(args, 2));
                let count = to_integer(&args[3])?;
                let replaced = if count < 0 {
                    source.replace(&from, &to)
                } else {
                    source.replacen(&from, &to, count as usize)
                };
                Ok(Value::String(replaced))
            },
        )
        .keyword(
            "Should Start With",
            &["str1", "str2", "msg=None"],
            "Fails if the string `str1` does not start with the string `str2`.",
            |_, args| {
                let (value, prefix) = (text(args, 0), text(args, 1));
                if value.starts_with(&prefix) {
                    return Ok(Value::None);
                }
                Err(fail_with(
                    args,
                    2,
                    format!("'{value}' does not start with '{prefix}'"),
                ))
            },
        )
        .keyword(
            "Strip String",
            &["string", "mode=both", "characters=None"],
            "Removes leading and/or trailing whitespace or the given characters.",
            |_, args| {
                let source = text(args, 0);
                let characters: Option<Vec<char>> =
                    custom_message(args, 2).map(|chars| chars.chars().collect());
                let strip = |c: char| match &characters {
                    Some(chars) => chars.contains(&c),
                    None => c.is_whitespace(),
                };
                let stripped = match text(args, 1).to_lowercase().as_str() {
                    "left" => source.trim_start_matches(strip),
                    "right" => source.trim_end_matches(strip),
                    "none" => source.as_str(),
                    "both" => source.trim_matches(strip),
                    other => {
                        return Err(KeywordFailure::new(format!(
                            "Invalid mode '{other}'."
                        )))
                    }
                };
                Ok(Value::String(stripped.to_string()))
            },
        )
}

fn split_whitespace_n(source: &str, max_split: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = source.trim_start();
    while parts.len() < max_split {
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            None => break,
        }
    }
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}
