//! Interactive triggers: a cell that only defines keywords offers one
//! trigger per new keyword, which runs it later with user-supplied values.

use std::collections::HashMap;

use robotkernel_core_types::{ArgSpec, DisplayId, RpaMode};
use robotkernel_suite::UserKeyword;
use serde::{Deserialize, Serialize};

use crate::frontend::{bundle, Frontend, MimeBundle, TRIGGER_MIME};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTrigger {
    pub name: String,
    pub arguments: Vec<ArgSpec>,
    pub display_id: DisplayId,
}

impl KeywordTrigger {
    pub fn from_keyword(keyword: &UserKeyword, display_id: DisplayId) -> Self {
        Self {
            name: keyword.name.clone(),
            arguments: keyword.args.clone(),
            display_id,
        }
    }

    /// One-item unit calling the keyword. Values are looked up by argument
    /// identifier and fall back to the declared default.
    pub fn unit(&self, mode: RpaMode, values: &HashMap<String, String>) -> String {
        let args: Vec<&str> = self
            .arguments
            .iter()
            .map(|arg| {
                values
                    .get(&arg.identifier)
                    .map(String::as_str)
                    .or(arg.default.as_deref())
                    .unwrap_or_default()
            })
            .collect();
        let mut call = format!("    {}", self.name);
        for arg in args {
            call.push_str("  ");
            call.push_str(if arg.is_empty() { "${EMPTY}" } else { arg });
        }
        format!(
            "\n*** {} ***\n\n{}\n{}\n",
            mode.section_header(),
            self.name,
            call
        )
    }

    pub fn publish(&self, frontend: &dyn Frontend) {
        let payload = serde_json::to_value(self).unwrap_or_default();
        frontend.send_display_data(
            bundle(TRIGGER_MIME, payload),
            MimeBundle::new(),
            Some(&self.display_id),
        );
    }
}

/// Keywords present in `current` but not (identically) in `previous`.
pub fn new_keywords<'a>(previous: &[UserKeyword], current: &'a [UserKeyword]) -> Vec<&'a UserKeyword> {
    current
        .iter()
        .filter(|keyword| !previous.contains(keyword))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{FrontendMessage, RecordingFrontend};

    fn greet() -> UserKeyword {
        UserKeyword {
            name: "Greet".into(),
            args: vec![ArgSpec::parse("${name}"), ArgSpec::parse("${greeting}=Hello")],
            ..UserKeyword::default()
        }
    }

    #[test]
    fn unit_uses_values_then_defaults() {
        let trigger = KeywordTrigger::from_keyword(&greet(), DisplayId("d".into()));
        let values = HashMap::from([("name".to_string(), "Robot".to_string())]);
        assert_eq!(
            trigger.unit(RpaMode::Tasks, &values),
            "\n*** Tasks ***\n\nGreet\n    Greet  Robot  Hello\n"
        );
        let unit = trigger.unit(RpaMode::Unknown, &HashMap::new());
        assert!(unit.contains("*** Test Cases ***"));
        assert!(unit.ends_with("    Greet  ${EMPTY}  Hello\n"));
    }

    #[test]
    fn changed_keywords_count_as_new() {
        let previous = vec![greet()];
        let mut changed = greet();
        changed.doc = "Says hello.".into();
        let current = vec![changed, UserKeyword { name: "Other".into(), ..UserKeyword::default() }];
        assert_eq!(new_keywords(&previous, &current).len(), 2);
        assert!(new_keywords(&current, &current).is_empty());
    }

    #[test]
    fn publish_sends_trigger_payload() {
        let frontend = RecordingFrontend::new();
        KeywordTrigger::from_keyword(&greet(), DisplayId("d".into())).publish(&frontend);
        let FrontendMessage::DisplayData { data, display_id, .. } = &frontend.messages()[0] else {
            panic!("expected display data");
        };
        assert_eq!(display_id.as_deref(), Some("d"));
        assert_eq!(data[TRIGGER_MIME]["name"], "Greet");
    }
}
