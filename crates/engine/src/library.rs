//! Keyword libraries, the registry they are imported from and the context
//! handed to every library keyword call.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use robotkernel_core_types::{normalize_name, ArgSpec, KeywordDoc, LibraryDoc, Value};
use robotkernel_event_bus::{
    Connection, ConnectionEvent, ListenerSet, VariableEvent, VariableScope,
};

use crate::errors::{KeywordFailure, KeywordResult};
use crate::result::Message;
use crate::variables::VariableStore;

pub type KeywordFn =
    Arc<dyn Fn(&mut CallContext<'_>, &[Value]) -> KeywordResult<Value> + Send + Sync>;

#[derive(Clone)]
pub struct LibraryKeyword {
    pub doc: KeywordDoc,
    pub run: KeywordFn,
    /// The first argument names a variable and is passed unresolved.
    pub takes_variable: bool,
}

impl fmt::Debug for LibraryKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryKeyword")
            .field("name", &self.doc.name)
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Library {
    pub name: String,
    pub doc: String,
    pub version: String,
    pub keywords: Vec<LibraryKeyword>,
}

impl Library {
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            keywords: Vec::new(),
        }
    }

    /// Adds a keyword; `args` uses the `name`, `name=default`, `*rest` forms.
    pub fn keyword<F>(mut self, name: &str, args: &[&str], doc: &str, run: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> KeywordResult<Value> + Send + Sync + 'static,
    {
        self.keywords.push(LibraryKeyword {
            doc: KeywordDoc::new(name, args, doc),
            run: Arc::new(run),
            takes_variable: false,
        });
        self
    }

    /// Adds a keyword whose first argument is a variable name such as
    /// `${items}` rather than the variable's value.
    pub fn variable_keyword<F>(mut self, name: &str, args: &[&str], doc: &str, run: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> KeywordResult<Value> + Send + Sync + 'static,
    {
        self.keywords.push(LibraryKeyword {
            doc: KeywordDoc::new(name, args, doc),
            run: Arc::new(run),
            takes_variable: true,
        });
        self
    }

    pub fn find(&self, name: &str) -> Option<&LibraryKeyword> {
        let wanted = normalize_name(name);
        self.keywords
            .iter()
            .find(|keyword| normalize_name(&keyword.doc.name) == wanted)
    }

    pub fn to_doc(&self) -> LibraryDoc {
        LibraryDoc {
            name: self.name.clone(),
            doc: self.doc.clone(),
            version: self.version.clone(),
            keywords: self.keywords.iter().map(|kw| kw.doc.clone()).collect(),
        }
    }
}

/// Libraries that can be imported by name.
#[derive(Clone, Debug, Default)]
pub struct LibraryRegistry {
    libraries: BTreeMap<String, Arc<Library>>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `BuiltIn`, `Collections` and `String`.
    pub fn with_stdlib() -> Self {
        let mut registry = Self::new();
        registry.register(crate::stdlib::builtin());
        registry.register(crate::stdlib::collections());
        registry.register(crate::stdlib::string());
        registry
    }

    /// Registers a library, replacing one with the same name.
    pub fn register(&mut self, library: Library) {
        self.libraries
            .insert(normalize_name(&library.name), Arc::new(library));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Library>> {
        self.libraries.get(&normalize_name(name)).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.libraries.values().map(|lib| lib.name.clone()).collect()
    }
}

/// Runtime services available to a library keyword.
pub struct CallContext<'a> {
    pub(crate) variables: &'a mut VariableStore,
    pub(crate) listeners: &'a ListenerSet,
    pub(crate) console: &'a mut dyn Write,
    pub(crate) output_dir: &'a Path,
    pub(crate) messages: Vec<Message>,
    pub(crate) pending_imports: Vec<(String, Vec<String>)>,
    pub(crate) in_user_keyword: bool,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        variables: &'a mut VariableStore,
        listeners: &'a ListenerSet,
        console: &'a mut dyn Write,
        output_dir: &'a Path,
        in_user_keyword: bool,
    ) -> Self {
        Self {
            variables,
            listeners,
            console,
            output_dir,
            messages: Vec::new(),
            pending_imports: Vec::new(),
            in_user_keyword,
        }
    }

    pub fn log(&mut self, level: &str, text: impl Into<String>) {
        self.messages.push(Message::new(level, text, false));
    }

    /// Logs a message rendered as HTML in the log file.
    pub fn log_html(&mut self, level: &str, html: impl Into<String>) {
        self.messages.push(Message::new(level, html, true));
    }

    pub fn console(&mut self, text: &str) {
        // Console output is best effort.
        let _ = writeln!(self.console, "{text}");
    }

    pub fn output_dir(&self) -> &Path {
        self.output_dir
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Sets a variable in the given scope and notifies variable listeners.
    pub fn set_variable(&mut self, name: &str, value: Value, scope: VariableScope) {
        match scope {
            VariableScope::Local => self.variables.set_local(name, value.clone()),
            VariableScope::Test => self.variables.set_test(name, value.clone()),
            VariableScope::Suite => self.variables.set_suite(name, value.clone()),
            VariableScope::Global => self.variables.set_global(name, value.clone()),
        }
        self.listeners.variable(&VariableEvent {
            name: name.trim_end_matches('=').trim_end().to_string(),
            value,
            scope,
            in_user_keyword: self.in_user_keyword,
        });
    }

    /// Registers a runtime connection with the connection listeners.
    pub fn open_connection(&mut self, kind: &str, handle: Arc<dyn Connection>) {
        self.log("INFO", format!("Opened {kind} connection."));
        self.listeners.connection(&ConnectionEvent {
            kind: kind.to_string(),
            handle,
        });
    }

    /// Imports a library once the current keyword returns.
    pub fn import_library(&mut self, name: &str, args: Vec<String>) {
        self.pending_imports.push((name.to_string(), args));
    }
}

/// Matches call arguments to a keyword's argument spec.
///
/// `raw` holds the unresolved tokens used to recognise `name=value` named
/// arguments; `values` holds the resolved values with `@{list}` expanded.
/// The result has one value per declared non-variadic argument, defaults
/// filled in, followed by the variadic values.
pub fn bind_arguments(
    keyword: &str,
    spec: &[ArgSpec],
    raw: &[String],
    values: Vec<Value>,
    resolve_default: &dyn Fn(&str) -> KeywordResult<Value>,
) -> KeywordResult<Vec<Value>> {
    let fixed: Vec<&ArgSpec> = spec.iter().filter(|arg| !arg.is_varargs()).collect();
    let variadic = spec.iter().any(ArgSpec::is_varargs);

    let mut positional = Vec::new();
    let mut named: BTreeMap<usize, Value> = BTreeMap::new();
    let counts_match = raw.len() == values.len();
    for (idx, value) in values.into_iter().enumerate() {
        let slot = if counts_match {
            raw[idx]
                .split_once('=')
                .and_then(|(name, _)| fixed.iter().position(|arg| arg.identifier == name))
        } else {
            None
        };
        match slot {
            Some(slot) if !variadic && (slot < positional.len() || named.contains_key(&slot)) => {
                return Err(KeywordFailure::new(format!(
                    "Keyword '{keyword}' got multiple values for argument '{}'.",
                    fixed[slot].identifier
                )));
            }
            Some(slot) if !variadic || slot >= positional.len() => {
                let text = value.to_string();
                let tail = text.split_once('=').map_or(text.as_str(), |(_, tail)| tail);
                named.insert(slot, Value::String(tail.to_string()));
            }
            _ if !named.is_empty() => {
                return Err(KeywordFailure::new(format!(
                    "Keyword '{keyword}' got positional argument after named arguments."
                )));
            }
            _ => positional.push(value),
        }
    }

    let required = fixed.iter().filter(|arg| arg.default.is_none()).count();
    let given = positional.len() + named.len();
    if (!variadic && positional.len() > fixed.len()) || given < required {
        let expected = match (variadic, required == fixed.len()) {
            (true, _) => format!("at least {required}"),
            (false, true) => required.to_string(),
            (false, false) => format!("{required} to {}", fixed.len()),
        };
        let noun = if expected == "1" { "argument" } else { "arguments" };
        return Err(KeywordFailure::new(format!(
            "Keyword '{keyword}' expected {expected} {noun}, got {given}."
        )));
    }

    let mut bound = Vec::with_capacity(positional.len().max(fixed.len()));
    let mut positional = positional.into_iter();
    for (slot, arg) in fixed.iter().enumerate() {
        if let Some(value) = named.remove(&slot) {
            bound.push(value);
        } else if let Some(value) = positional.next() {
            bound.push(value);
        } else if let Some(default) = &arg.default {
            bound.push(resolve_default(default)?);
        } else {
            return Err(KeywordFailure::new(format!(
                "Keyword '{keyword}' missing value for argument '{}'.",
                arg.name
            )));
        }
    }
    bound.extend(positional);
    Ok(bound)
}

/// Truth value of an argument: `false`, `no`, `off`, `0`, `none` and empty
/// strings are false, case-insensitively.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::None => false,
        Value::Bool(flag) => *flag,
        Value::Integer(number) => *number != 0,
        Value::Float(number) => *number != 0.0,
        Value::String(text) => !matches!(
            text.trim().to_lowercase().as_str(),
            "" | "false" | "no" | "off" | "0" | "none"
        ),
        other => !other.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(args: &[&str]) -> Vec<ArgSpec> {
        args.iter().map(|arg| ArgSpec::parse(arg)).collect()
    }

    fn strings(items: &[&str]) -> (Vec<String>, Vec<Value>) {
        (
            items.iter().map(|s| s.to_string()).collect(),
            items.iter().map(|s| Value::from(*s)).collect(),
        )
    }

    fn literal(text: &str) -> KeywordResult<Value> {
        Ok(Value::from(text))
    }

    #[test]
    fn fills_defaults_and_named_arguments() {
        let (raw, values) = strings(&["hello", "html=True"]);
        let bound = bind_arguments(
            "Log",
            &spec(&["message", "level=INFO", "html=False"]),
            &raw,
            values,
            &literal,
        )
        .unwrap();
        assert_eq!(bound, vec!["hello".into(), "INFO".into(), "True".into()]);
    }

    #[test]
    fn collects_varargs() {
        let (raw, values) = strings(&["a", "b", "c"]);
        let bound = bind_arguments("Create List", &spec(&["*items"]), &raw, values, &literal)
            .unwrap();
        assert_eq!(bound.len(), 3);
    }

    #[test]
    fn reports_arity_errors() {
        let (raw, values) = strings(&["only"]);
        let err = bind_arguments(
            "Should Be Equal",
            &spec(&["first", "second"]),
            &raw,
            values,
            &literal,
        )
        .unwrap_err();
        assert_eq!(err.message, "Keyword 'Should Be Equal' expected 2 arguments, got 1.");
    }

    #[test]
    fn rejects_named_argument_for_filled_slot() {
        let (raw, values) = strings(&["first", "a=second"]);
        let err = bind_arguments("Pair", &spec(&["${a}", "${b}"]), &raw, values, &literal)
            .unwrap_err();
        assert_eq!(err.message, "Keyword 'Pair' got multiple values for argument 'a'.");

        let (raw, values) = strings(&["b=second", "a=first"]);
        let bound = bind_arguments("Pair", &spec(&["${a}", "${b}"]), &raw, values, &literal)
            .unwrap();
        assert_eq!(bound, vec!["first".into(), "second".into()]);
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&"True".into()));
        assert!(!is_truthy(&"no".into()));
        assert!(!is_truthy(&Value::None));
        assert!(is_truthy(&Value::List(vec![Value::None])));
    }

    #[test]
    fn registry_lookup_is_normalized() {
        let registry = LibraryRegistry::with_stdlib();
        assert!(registry.get("builtin").is_some());
        assert!(registry.get("Collections").unwrap().find("get_from_list").is_some());
        assert_eq!(registry.names(), vec!["BuiltIn", "Collections", "String"]);
    }
}
