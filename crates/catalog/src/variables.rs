//! Variable names seen across executed cells.

use once_cell::sync::Lazy;
use regex::Regex;

static VARIABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$@&%]\{[^{}\s][^{}]*\}").unwrap());

/// Decorated variable names in `text`, in order of appearance.
pub fn find_variables(text: &str) -> Vec<String> {
    VARIABLE_RE
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect()
}

/// Ordered, duplicate-free variable names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableHistory {
    names: Vec<String>,
}

impl VariableHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History rebuilt from the given cell sources, oldest first.
    pub fn from_sources<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut history = Self::new();
        for source in sources {
            history.extend_from(source);
        }
        history
    }

    pub fn extend_from(&mut self, text: &str) {
        for name in find_variables(text) {
            self.push(name);
        }
    }

    pub fn push(&mut self, name: String) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_sigils() {
        let found = find_variables("${a}=  Set Variable  @{items}  &{map}  %{HOME}  ${}");
        assert_eq!(found, vec!["${a}", "@{items}", "&{map}", "%{HOME}"]);
    }

    #[test]
    fn history_is_ordered_and_unique() {
        let history = VariableHistory::from_sources(["${b}  ${a}", "${a}  ${c}"]);
        assert_eq!(history.names(), ["${b}", "${a}", "${c}"]);
    }
}
