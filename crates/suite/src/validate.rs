use robotkernel_core_types::normalize_name;

use crate::ast::{Block, File, Node, Section, SectionKind, Statement};
use crate::errors::{DataError, DataResult};
use crate::model::is_variable;

pub(crate) const SUITE_SETTINGS: &[&str] = &[
    "Documentation",
    "Metadata",
    "Library",
    "Resource",
    "Suite Setup",
    "Suite Teardown",
    "Test Setup",
    "Test Teardown",
    "Task Setup",
    "Task Teardown",
    "Test Tags",
    "Task Tags",
    "Force Tags",
    "Default Tags",
    "Test Timeout",
    "Task Timeout",
];

const TEST_SETTINGS: &[&str] = &["Documentation", "Tags", "Setup", "Teardown", "Timeout"];

const KEYWORD_SETTINGS: &[&str] = &[
    "Arguments",
    "Return",
    "Documentation",
    "Tags",
    "Teardown",
    "Timeout",
];

/// Walks a parsed unit and fails on the first structural error.
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn visit(file: &File) -> DataResult<()> {
        for section in &file.sections {
            Self::visit_section(section)?;
        }
        Ok(())
    }

    fn visit_section(section: &Section) -> DataResult<()> {
        match section.kind {
            SectionKind::Invalid => {
                return Err(DataError::syntax(
                    section.line,
                    format!(
                        "Unrecognized section header '{}'. Valid sections: 'Settings', \
                         'Variables', 'Test Cases', 'Tasks', 'Keywords' and 'Comments'.",
                        section.header
                    ),
                ))
            }
            SectionKind::Implicit => {
                if let Some(line) = first_line(&section.body) {
                    return Err(DataError::syntax(
                        line,
                        "Data must follow a section header such as '*** Test Cases ***'.",
                    ));
                }
            }
            _ => {}
        }

        for node in &section.body {
            match node {
                Node::Error(issue) => {
                    return Err(DataError::syntax(issue.line, issue.message.clone()))
                }
                Node::Statement(statement) => match section.kind {
                    SectionKind::Settings => Self::visit_setting(statement)?,
                    SectionKind::Variables => Self::visit_variable(statement)?,
                    _ => {}
                },
                Node::Block(block) => {
                    let allowed = if section.kind == SectionKind::Keywords {
                        KEYWORD_SETTINGS
                    } else {
                        TEST_SETTINGS
                    };
                    Self::visit_block(block, section.kind, allowed)?;
                }
            }
        }
        Ok(())
    }

    fn visit_setting(statement: &Statement) -> DataResult<()> {
        let name = statement.head();
        if !is_known(name, SUITE_SETTINGS) {
            return Err(DataError::syntax(
                statement.line,
                format!("Non-existing setting '{name}'."),
            ));
        }
        let needs_value = matches!(
            normalize_name(name).as_str(),
            "library" | "resource" | "metadata"
        );
        if needs_value && statement.rest().is_empty() {
            return Err(DataError::syntax(
                statement.line,
                format!("Setting '{name}' requires a value."),
            ));
        }
        Ok(())
    }

    fn visit_variable(statement: &Statement) -> DataResult<()> {
        let name = statement.head();
        if !is_variable(name) || name.starts_with('%') {
            return Err(DataError::syntax(
                statement.line,
                format!("Invalid variable name '{name}'."),
            ));
        }
        Ok(())
    }

    fn visit_block(block: &Block, kind: SectionKind, allowed: &[&str]) -> DataResult<()> {
        let what = match kind {
            SectionKind::Keywords => "User keyword",
            SectionKind::Tasks => "Task",
            _ => "Test",
        };
        if block.name.trim().is_empty() {
            return Err(DataError::syntax(block.line, format!("{what} name cannot be empty.")));
        }
        let mut has_steps = false;
        for statement in &block.body {
            match statement.block_setting() {
                Some(setting) if !is_known(setting, allowed) => {
                    return Err(DataError::syntax(
                        statement.line,
                        format!("Non-existing setting '{setting}'."),
                    ));
                }
                Some(_) => {}
                None => has_steps = true,
            }
        }
        if !has_steps {
            return Err(DataError::syntax(
                block.line,
                format!("{what} '{}' cannot be empty.", block.name),
            ));
        }
        Ok(())
    }
}

fn is_known(name: &str, known: &[&str]) -> bool {
    let wanted = normalize_name(name);
    known.iter().any(|candidate| normalize_name(candidate) == wanted)
}

fn first_line(body: &[Node]) -> Option<usize> {
    body.first().map(|node| match node {
        Node::Statement(statement) => statement.line,
        Node::Block(block) => block.line,
        Node::Error(issue) => issue.line,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::parser::{PlainTextParser, UnitParser};

    fn check(source: &str) -> DataResult<()> {
        ErrorReporter::visit(&PlainTextParser.parse(source, Path::new(".")))
    }

    #[test]
    fn accepts_well_formed_unit() {
        check("*** Settings ***\nLibrary  Collections\n*** Test Cases ***\nT\n    Log  hi\n")
            .unwrap();
    }

    #[test]
    fn rejects_unknown_section() {
        let err = check("*** Bogus ***\nx\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn rejects_unknown_setting() {
        let err = check("*** Settings ***\nLibary  Collections\n").unwrap_err();
        assert!(err.to_string().contains("Non-existing setting 'Libary'"));
    }

    #[test]
    fn rejects_data_before_first_section() {
        let err = check("Log  hello\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn rejects_empty_keyword() {
        let err = check("*** Keywords ***\nNothing\n    [Documentation]  only docs\n").unwrap_err();
        assert!(err.to_string().contains("User keyword 'Nothing' cannot be empty"));
    }

    #[test]
    fn rejects_bad_variable_name() {
        let err = check("*** Variables ***\nname  value\n").unwrap_err();
        assert!(err.to_string().contains("Invalid variable name 'name'"));
    }
}
