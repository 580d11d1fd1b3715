//! Scoped variable storage and `${...}` substitution.

use std::collections::BTreeMap;
use std::path::Path;

use robotkernel_core_types::Value;
use robotkernel_suite::variable_key;

use crate::errors::{KeywordFailure, KeywordResult};

type ScopeMap = BTreeMap<String, (String, Value)>;

/// Global, suite and per-call frames; lookups check the innermost frame,
/// then the suite scope, then the global scope.
#[derive(Clone, Debug, Default)]
pub struct VariableStore {
    global: ScopeMap,
    suite: ScopeMap,
    frames: Vec<ScopeMap>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the built-in variables of a run.
    pub fn with_builtins(output_dir: &Path, curdir: &Path, suite_name: &str) -> Self {
        let mut store = Self::new();
        let builtins = [
            ("${EMPTY}", Value::String(String::new())),
            ("${SPACE}", Value::String(" ".into())),
            ("${TRUE}", Value::Bool(true)),
            ("${FALSE}", Value::Bool(false)),
            ("${NONE}", Value::None),
            ("${OUTPUT_DIR}", Value::String(output_dir.display().to_string())),
            ("${CURDIR}", Value::String(curdir.display().to_string())),
            ("${SUITE_NAME}", Value::String(suite_name.to_string())),
        ];
        for (name, value) in builtins {
            store.set_global(name, value);
        }
        store
    }

    pub fn push_frame(&mut self) {
        self.frames.push(ScopeMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let key = variable_key(name);
        self.frames
            .last()
            .and_then(|frame| frame.get(&key))
            .or_else(|| self.suite.get(&key))
            .or_else(|| self.global.get(&key))
            .map(|(_, value)| value)
    }

    /// Assigns in the innermost frame, or the suite scope outside any frame.
    pub fn set_local(&mut self, name: &str, value: Value) {
        let entry = (display_name(name), value);
        match self.frames.last_mut() {
            Some(frame) => frame.insert(variable_key(name), entry),
            None => self.suite.insert(variable_key(name), entry),
        };
    }

    /// Assigns in the outermost frame, which belongs to the running test.
    pub fn set_test(&mut self, name: &str, value: Value) {
        let key = variable_key(name);
        let entry = (display_name(name), value);
        if let Some(frame) = self.frames.first_mut() {
            frame.insert(key.clone(), entry.clone());
        }
        self.shadow_top(&key, &entry);
        if self.frames.is_empty() {
            self.suite.insert(key, entry);
        }
    }

    pub fn set_suite(&mut self, name: &str, value: Value) {
        let key = variable_key(name);
        let entry = (display_name(name), value);
        self.shadow_top(&key, &entry);
        self.suite.insert(key, entry);
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        let key = variable_key(name);
        let entry = (display_name(name), value);
        self.shadow_top(&key, &entry);
        self.global.insert(key, entry);
    }

    fn shadow_top(&mut self, key: &str, entry: &(String, Value)) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.contains_key(key) {
                frame.insert(key.to_string(), entry.clone());
            }
        }
    }

    /// Every visible variable by decorated name; inner scopes win.
    pub fn visible(&self) -> Vec<(String, Value)> {
        let mut merged = self.global.clone();
        merged.extend(self.suite.clone());
        if let Some(frame) = self.frames.last() {
            merged.extend(frame.clone());
        }
        merged.into_values().collect()
    }

    /// Resolves one argument. A token that is exactly one variable keeps the
    /// variable's type; anything else becomes a string.
    pub fn resolve(&self, token: &str) -> KeywordResult<Value> {
        if let Some(expr) = whole_expression(token) {
            if expr.sigil != '%' {
                return self.evaluate(&expr);
            }
        }
        self.replace_string(token).map(Value::String)
    }

    /// Resolves arguments, expanding `@{list}` tokens in place.
    pub fn resolve_args(&self, tokens: &[String]) -> KeywordResult<Vec<Value>> {
        let mut values = Vec::with_capacity(tokens.len());
        for token in tokens {
            match whole_expression(token) {
                Some(expr) if expr.sigil == '@' && expr.items.is_empty() => {
                    match self.evaluate(&expr)? {
                        Value::List(items) => values.extend(items),
                        other => values.push(other),
                    }
                }
                _ => values.push(self.resolve(token)?),
            }
        }
        Ok(values)
    }

    /// Substitutes every variable in `text` with its string form.
    pub fn replace_string(&self, text: &str) -> KeywordResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some((start, expr)) = next_expression(rest) {
            let (before, _) = rest.split_at(start);
            if let Some(stripped) = before.strip_suffix('\\') {
                out.push_str(stripped);
                out.push_str(&rest[start..start + expr.len]);
            } else {
                out.push_str(before);
                out.push_str(&self.evaluate(&expr)?.to_string());
            }
            rest = &rest[start + expr.len..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn evaluate(&self, expr: &Expression) -> KeywordResult<Value> {
        let inner = if expr.inner.contains('{') {
            self.replace_string(&expr.inner)?
        } else {
            expr.inner.clone()
        };
        let decorated = format!("{}{{{}}}", expr.sigil, inner);
        let mut value = self.base_value(expr.sigil, &inner, &decorated)?;
        for item in &expr.items {
            let index = self.replace_string(item)?;
            value = item_of(&decorated, value, &index)?;
        }
        Ok(value)
    }

    fn base_value(&self, sigil: char, inner: &str, decorated: &str) -> KeywordResult<Value> {
        if sigil == '%' {
            return std::env::var(inner).map(Value::String).map_err(|_| {
                KeywordFailure::new(format!("Environment variable '{decorated}' not found."))
            });
        }
        let value = match self.get(decorated) {
            Some(value) => value.clone(),
            None => literal(inner).ok_or_else(|| {
                KeywordFailure::new(format!("Variable '{decorated}' not found."))
            })?,
        };
        match (sigil, value) {
            ('@', Value::String(text)) if text.is_empty() => Ok(Value::List(Vec::new())),
            ('@', value @ Value::List(_)) => Ok(value),
            ('@', _) => Err(KeywordFailure::new(format!(
                "Value of variable '{decorated}' is not list or list-like."
            ))),
            ('&', Value::String(text)) if text.is_empty() => Ok(Value::Dict(Vec::new())),
            ('&', value @ Value::Dict(_)) => Ok(value),
            ('&', _) => Err(KeywordFailure::new(format!(
                "Value of variable '{decorated}' is not dictionary or dictionary-like."
            ))),
            (_, value) => Ok(value),
        }
    }
}

fn display_name(name: &str) -> String {
    name.trim_end_matches('=').trim_end().to_string()
}

fn literal(inner: &str) -> Option<Value> {
    let compact: String = inner.chars().filter(|c| *c != '_' && *c != ' ').collect();
    if let Ok(number) = compact.parse::<i64>() {
        return Some(Value::Integer(number));
    }
    if compact.contains('.') {
        if let Ok(number) = compact.parse::<f64>() {
            return Some(Value::Float(number));
        }
    }
    None
}

fn item_of(decorated: &str, value: Value, index: &str) -> KeywordResult<Value> {
    match value {
        Value::List(items) => {
            let idx = parse_index(index, items.len()).ok_or_else(|| {
                KeywordFailure::new(format!(
                    "List '{decorated}' has no item in index {index}."
                ))
            })?;
            Ok(items[idx].clone())
        }
        Value::Dict(entries) => entries
            .into_iter()
            .find(|(key, _)| key == index)
            .map(|(_, item)| item)
            .ok_or_else(|| {
                KeywordFailure::new(format!("Dictionary '{decorated}' has no key '{index}'."))
            }),
        Value::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            parse_index(index, chars.len())
                .map(|idx| Value::String(chars[idx].to_string()))
                .ok_or_else(|| {
                    KeywordFailure::new(format!(
                        "String '{decorated}' has no item in index {index}."
                    ))
                })
        }
        other => Err(KeywordFailure::new(format!(
            "Variable '{decorated}' is {} and not subscriptable.",
            other.type_name()
        ))),
    }
}

/// Index into a sequence of `len` items; negative values count from the end.
pub(crate) fn parse_index(raw: &str, len: usize) -> Option<usize> {
    let idx: i64 = raw.trim().parse().ok()?;
    let idx = if idx < 0 { len as i64 + idx } else { idx };
    (0..len as i64).contains(&idx).then_some(idx as usize)
}

#[derive(Debug, PartialEq)]
struct Expression {
    sigil: char,
    inner: String,
    items: Vec<String>,
    /// Byte length of the whole expression including item access.
    len: usize,
}

fn whole_expression(token: &str) -> Option<Expression> {
    match next_expression(token) {
        Some((0, expr)) if expr.len == token.len() => Some(expr),
        _ => None,
    }
}

/// Finds the next `${...}`, `@{...}`, `&{...}` or `%{...}` expression and
/// returns its byte offset.
fn next_expression(text: &str) -> Option<(usize, Expression)> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while start + 1 < bytes.len() {
        if matches!(bytes[start], b'$' | b'@' | b'&' | b'%') && bytes[start + 1] == b'{' {
            if let Some(close) = matching(bytes, start + 1, b'{', b'}') {
                let inner = &text[start + 2..close];
                if !inner.is_empty() {
                    let mut end = close + 1;
                    let mut items = Vec::new();
                    if bytes[start] != b'%' {
                        while end < bytes.len() && bytes[end] == b'[' {
                            let Some(item_close) = matching(bytes, end, b'[', b']') else {
                                break;
                            };
                            items.push(text[end + 1..item_close].to_string());
                            end = item_close + 1;
                        }
                    }
                    return Some((
                        start,
                        Expression {
                            sigil: bytes[start] as char,
                            inner: inner.to_string(),
                            items,
                            len: end - start,
                        },
                    ));
                }
            }
        }
        start += 1;
    }
    None
}

fn matching(bytes: &[u8], open_at: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, byte) in bytes.iter().enumerate().skip(open_at) {
        if *byte == open {
            depth += 1;
        } else if *byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}
