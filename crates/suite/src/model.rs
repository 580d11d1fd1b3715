//! Long-lived running model accumulated from successive units.

use std::path::PathBuf;

use robotkernel_core_types::{normalize_name, ArgSpec, KeywordDoc, RpaMode};

/// Items deduplicated by name.
pub trait Named {
    fn name(&self) -> &str;

    fn key(&self) -> String {
        normalize_name(self.name())
    }
}

/// The accumulated specification of a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Suite {
    pub name: String,
    pub source: PathBuf,
    pub doc: String,
    pub metadata: Vec<(String, String)>,
    pub setup: Option<Step>,
    pub teardown: Option<Step>,
    pub tests: Vec<TestItem>,
    pub resource: Resource,
    pub rpa: RpaMode,
}

impl Suite {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn has_items(&self) -> bool {
        !self.tests.is_empty()
    }

    /// Drops executable items; keywords, variables and imports survive.
    pub fn clear_tests(&mut self) {
        self.tests.clear();
    }

    pub fn keyword(&self, name: &str) -> Option<&UserKeyword> {
        let wanted = normalize_name(name);
        self.resource.keywords.iter().find(|kw| kw.key() == wanted)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    pub imports: Vec<Import>,
    pub variables: Vec<VariableDef>,
    pub keywords: Vec<UserKeyword>,
}

impl Resource {
    /// Library names in import order, without duplicates.
    pub fn library_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for import in &self.imports {
            if import.kind == ImportKind::Library && !names.contains(&import.name.as_str()) {
                names.push(&import.name);
            }
        }
        names
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportKind {
    Library,
    Resource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    pub kind: ImportKind,
    pub name: String,
    pub args: Vec<String>,
    pub alias: Option<String>,
    pub line: usize,
}

impl Import {
    pub fn same_target(&self, other: &Import) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.args == other.args
            && self.alias == other.alias
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableDef {
    /// Decorated name such as `${name}` or `@{items}`, without `=`.
    pub name: String,
    pub values: Vec<String>,
    pub line: usize,
}

impl VariableDef {
    pub fn is_list(&self) -> bool {
        self.name.starts_with('@')
    }

    pub fn is_dict(&self) -> bool {
        self.name.starts_with('&')
    }
}

impl Named for VariableDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self) -> String {
        variable_key(&self.name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserKeyword {
    pub name: String,
    pub args: Vec<ArgSpec>,
    pub doc: String,
    pub tags: Vec<String>,
    pub body: Vec<Step>,
    pub returns: Vec<String>,
    pub teardown: Option<Step>,
    /// Resource file the keyword came from, `None` for unit definitions.
    pub origin: Option<String>,
    pub line: usize,
}

impl UserKeyword {
    pub fn to_doc(&self) -> KeywordDoc {
        KeywordDoc {
            name: self.name.clone(),
            args: self.args.clone(),
            doc: self.doc.clone(),
            tags: self.tags.clone(),
        }
    }
}

impl Named for UserKeyword {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestItem {
    pub name: String,
    pub doc: String,
    pub tags: Vec<String>,
    pub setup: Option<Step>,
    pub teardown: Option<Step>,
    pub body: Vec<Step>,
    pub line: usize,
}

impl Named for TestItem {
    fn name(&self) -> &str {
        &self.name
    }
}

/// One keyword invocation, optionally assigning its result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Step {
    pub assign: Vec<String>,
    pub name: String,
    pub args: Vec<String>,
    pub line: usize,
}

impl Step {
    /// Splits leading `${var}=` tokens from the keyword name and arguments.
    pub fn from_tokens(tokens: &[String], line: usize) -> Option<Self> {
        let mut assign = Vec::new();
        let mut idx = 0;
        while idx + 1 < tokens.len() && is_assignment(&tokens[idx]) {
            assign.push(tokens[idx].trim_end_matches('=').trim_end().to_string());
            idx += 1;
        }
        let name = tokens.get(idx)?.clone();
        Some(Self {
            assign,
            name,
            args: tokens[idx + 1..].to_vec(),
            line,
        })
    }

    pub fn is_return(&self) -> bool {
        self.name == "RETURN"
    }
}

/// `true` for a decorated variable name such as `${x}` or `@{xs}=`.
pub fn is_variable(token: &str) -> bool {
    let token = token.trim_end_matches('=').trim_end();
    token.len() > 3
        && matches!(token.as_bytes()[0], b'$' | b'@' | b'&' | b'%')
        && token.as_bytes()[1] == b'{'
        && token.ends_with('}')
}

fn is_assignment(token: &str) -> bool {
    is_variable(token) && !token.starts_with('%')
}

/// Storage key of a decorated variable: sigil, braces, case, spaces and
/// underscores are insignificant.
pub fn variable_key(name: &str) -> String {
    let name = name.trim_end_matches('=').trim_end();
    let inner = if is_variable(name) {
        &name[2..name.len() - 1]
    } else {
        name
    };
    normalize_name(inner)
}

/// Keeps one item per key: the last definition, placed where the name first
/// appeared. Returns the names whose earlier definitions were replaced.
pub fn strip_duplicates<T: Named>(items: &mut Vec<T>) -> Vec<String> {
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    let mut keys: Vec<String> = Vec::with_capacity(items.len());
    let mut replaced = Vec::new();
    for item in items.drain(..) {
        let key = item.key();
        match keys.iter().position(|existing| *existing == key) {
            Some(pos) => {
                replaced.push(item.name().to_string());
                kept[pos] = item;
            }
            None => {
                keys.push(key);
                kept.push(item);
            }
        }
    }
    *items = kept;
    replaced
}

/// Suite-level defaults applied to tests built after they are declared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestDefaults {
    pub setup: Option<Step>,
    pub teardown: Option<Step>,
    pub tags: Vec<String>,
    pub default_tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword(name: &str, marker: &str) -> UserKeyword {
        UserKeyword {
            name: name.into(),
            doc: marker.into(),
            ..UserKeyword::default()
        }
    }

    #[test]
    fn strip_duplicates_keeps_last_definition_in_first_position() {
        let mut items = vec![
            keyword("Head", "first"),
            keyword("Tail", "tail"),
            keyword("head", "second"),
        ];
        let replaced = strip_duplicates(&mut items);
        assert_eq!(replaced, vec!["head".to_string()]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].doc, "second");
        assert_eq!(items[1].name, "Tail");
    }

    #[test]
    fn step_splits_assignments() {
        let tokens: Vec<String> = ["${a}", "${b} =", "Split String", "x y"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let step = Step::from_tokens(&tokens, 4).unwrap();
        assert_eq!(step.assign, vec!["${a}", "${b}"]);
        assert_eq!(step.name, "Split String");
        assert_eq!(step.args, vec!["x y"]);
    }

    #[test]
    fn lone_variable_is_a_keyword_name() {
        let tokens = vec!["${kw}".to_string()];
        let step = Step::from_tokens(&tokens, 1).unwrap();
        assert!(step.assign.is_empty());
        assert_eq!(step.name, "${kw}");
    }

    #[test]
    fn variable_keys_ignore_sigil_and_case() {
        assert_eq!(variable_key("${My Var}="), "myvar");
        assert_eq!(variable_key("@{my_var}"), "myvar");
        assert!(is_variable("&{d}"));
        assert!(!is_variable("plain"));
    }
}
