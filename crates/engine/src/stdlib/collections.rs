use robotkernel_core_types::Value;

use super::{fail_with, index_into, to_dict, to_list, update_variable};
use crate::errors::KeywordFailure;
use crate::library::{is_truthy, Library};

pub fn collections() -> Library {
    Library::new(
        "Collections",
        "Keywords for handling lists and dictionaries.",
    )
    .keyword(
        "Get From List",
        &["list_", "index"],
        "Returns the value specified with an `index` from `list`.\n\n\
         Negative indexes count from the end.",
        |_, args| index_into(&to_list(&args[0], "list_")?, &args[1]),
    )
    .variable_keyword(
        "Append To List",
        &["list_", "*values"],
        "Adds `values` to the end of `list`.",
        |ctx, args| {
            let values = args[1..].to_vec();
            update_variable(ctx, &args[0], |current| {
                let mut items = to_list(&current, "list_")?;
                items.extend(values);
                Ok(Value::List(items))
            })?;
            Ok(Value::None)
        },
    )
    .keyword(
        "Get Index From List",
        &["list_", "value"],
        "Returns the index of the first occurrence of `value`, or -1.",
        |_, args| {
            let items = to_list(&args[0], "list_")?;
            let index = items
                .iter()
                .position(|item| item == &args[1])
                .map_or(-1, |idx| idx as i64);
            Ok(Value::Integer(index))
        },
    )
    .keyword(
        "List Should Contain Value",
        &["list_", "value", "msg=None"],
        "Fails if `value` is not found from `list`.",
        |_, args| {
            let items = to_list(&args[0], "list_")?;
            if items.contains(&args[1]) {
                return Ok(Value::None);
            }
            Err(fail_with(
                args,
                2,
                format!("{} does not contain value '{}'.", args[0], args[1]),
            ))
        },
    )
    .variable_keyword(
        "Sort List",
        &["list_"],
        "Sorts the given list in place by the string form of its items.",
        |ctx, args| {
            update_variable(ctx, &args[0], |current| {
                let mut items = to_list(&current, "list_")?;
                items.sort_by_key(ToString::to_string);
                Ok(Value::List(items))
            })?;
            Ok(Value::None)
        },
    )
    .keyword(
        "Get From Dictionary",
        &["dictionary", "key"],
        "Returns a value from the given dictionary based on the given key.",
        |_, args| {
            let key = args[1].to_string();
            to_dict(&args[0], "dictionary")?
                .into_iter()
                .find(|(existing, _)| *existing == key)
                .map(|(_, value)| value)
                .ok_or_else(|| KeywordFailure::new(format!("Dictionary does not contain key '{key}'.")))
        },
    )
    .variable_keyword(
        "Set To Dictionary",
        &["dictionary", "*key_value_pairs"],
        "Adds the given key/value pairs to the dictionary.",
        |ctx, args| {
            let pairs = args[1..].to_vec();
            if pairs.len() % 2 != 0 {
                return Err(KeywordFailure::new(
                    "Adding data to a dictionary failed. There should be even number of key-value-pairs.",
                ));
            }
            update_variable(ctx, &args[0], |current| {
                let mut entries = to_dict(&current, "dictionary")?;
                for pair in pairs.chunks(2) {
                    let key = pair[0].to_string();
                    match entries.iter_mut().find(|(existing, _)| *existing == key) {
                        Some(entry) => entry.1 = pair[1].clone(),
                        None => entries.push((key, pair[1].clone())),
                    }
                }
                Ok(Value::Dict(entries))
            })
        },
    )
    .keyword(
        "Get Dictionary Keys",
        &["dictionary", "sort_keys=True"],
        "Returns keys of the given dictionary as a list, sorted by default.",
        |_, args| {
            let mut keys: Vec<String> = to_dict(&args[0], "dictionary")?
                .into_iter()
                .map(|(key, _)| key)
                .collect();
            if is_truthy(&args[1]) {
                keys.sort();
            }
            Ok(Value::List(keys.into_iter().map(Value::String).collect()))
        },
    )
}
