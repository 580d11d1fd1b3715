//! Suite accumulator: merges one parsed unit into the long-lived suite.

use std::fs;
use std::path::{Path, PathBuf};

use robotkernel_core_types::{normalize_name, ArgSpec, RpaMode};
use tracing::debug;

use crate::ast::{Block, File, SectionKind, Statement};
use crate::errors::{DataError, DataResult};
use crate::model::{
    strip_duplicates, Import, ImportKind, Step, Suite, TestDefaults, TestItem, UserKeyword,
    VariableDef,
};
use crate::parser::{PlainTextParser, UnitParser};
use crate::validate::ErrorReporter;

/// What a merge changed, used for logging and listener bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub tests_added: usize,
    pub replaced_keywords: Vec<String>,
    pub replaced_variables: Vec<String>,
    pub mode: RpaMode,
}

/// Merges `code` into `suite` with the plain-text parser.
pub fn populate_suite(
    code: &str,
    suite: &mut Suite,
    defaults: &mut TestDefaults,
) -> DataResult<MergeOutcome> {
    populate_suite_with(&PlainTextParser, code, suite, defaults)
}

/// Merges `code` into `suite`. All-or-nothing: on error neither the suite
/// nor the defaults are modified.
pub fn populate_suite_with(
    parser: &dyn UnitParser,
    code: &str,
    suite: &mut Suite,
    defaults: &mut TestDefaults,
) -> DataResult<MergeOutcome> {
    let curdir = suite_dir(&suite.source);
    let file = parser.parse(code, &curdir);
    ErrorReporter::visit(&file)?;

    let mode = rpa_mode(&file)?;
    if mode.is_known() && suite.has_items() && suite.rpa.is_known() && suite.rpa != mode {
        return Err(DataError::ModeConflict {
            pending: suite.rpa,
            unit: mode,
        });
    }

    let mut staged = suite.clone();
    let mut staged_defaults = defaults.clone();
    let tests_before = staged.tests.len();
    {
        let mut builder = SuiteBuilder {
            parser,
            suite: &mut staged,
            defaults: &mut staged_defaults,
            visited: Vec::new(),
        };
        builder.apply_settings(&file)?;
        builder.apply_body(&file, None)?;
    }

    let replaced_keywords = strip_duplicates(&mut staged.resource.keywords);
    let replaced_variables = strip_duplicates(&mut staged.resource.variables);
    dedupe_imports(&mut staged.resource.imports);
    if mode.is_known() {
        staged.rpa = mode;
    }

    let outcome = MergeOutcome {
        tests_added: staged.tests.len() - tests_before,
        replaced_keywords,
        replaced_variables,
        mode: staged.rpa,
    };
    debug!(
        tests = outcome.tests_added,
        keywords = staged.resource.keywords.len(),
        variables = staged.resource.variables.len(),
        replaced = outcome.replaced_keywords.len(),
        "merged unit into suite"
    );

    *suite = staged;
    *defaults = staged_defaults;
    Ok(outcome)
}

/// Task/test mode of a unit; mixing both kinds of sections is an error.
pub fn rpa_mode(file: &File) -> DataResult<RpaMode> {
    let flags = file.item_section_flags();
    let Some(&(first, _)) = flags.first() else {
        return Ok(RpaMode::Unknown);
    };
    if let Some(&(_, line)) = flags.iter().find(|(tasks, _)| *tasks != first) {
        return Err(DataError::MixedMode { line });
    }
    Ok(RpaMode::from_flag(Some(first)))
}

fn suite_dir(source: &Path) -> PathBuf {
    if source.is_file() {
        source.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        source.to_path_buf()
    }
}

fn dedupe_imports(imports: &mut Vec<Import>) {
    let mut kept: Vec<Import> = Vec::with_capacity(imports.len());
    for import in imports.drain(..) {
        if !kept.iter().any(|existing| existing.same_target(&import)) {
            kept.push(import);
        }
    }
    *imports = kept;
}

struct SuiteBuilder<'a> {
    parser: &'a dyn UnitParser,
    suite: &'a mut Suite,
    defaults: &'a mut TestDefaults,
    visited: Vec<PathBuf>,
}

impl SuiteBuilder<'_> {
    fn apply_settings(&mut self, file: &File) -> DataResult<()> {
        for section in &file.sections {
            if section.kind != SectionKind::Settings {
                continue;
            }
            for statement in section.statements() {
                self.apply_setting(statement, &file.curdir)?;
            }
        }
        Ok(())
    }

    fn apply_setting(&mut self, statement: &Statement, curdir: &Path) -> DataResult<()> {
        let rest = statement.rest();
        match normalize_name(statement.head()).as_str() {
            "documentation" => self.suite.doc = rest.join(" "),
            "metadata" => {
                let value = rest.get(1..).unwrap_or_default().join(" ");
                self.suite.metadata.push((rest[0].clone(), value));
            }
            "library" => self.suite.resource.imports.push(library_import(statement)),
            "resource" => self.import_resource(statement, curdir)?,
            "suitesetup" => self.suite.setup = fixture(rest, statement.line),
            "suiteteardown" => self.suite.teardown = fixture(rest, statement.line),
            "testsetup" | "tasksetup" => self.defaults.setup = fixture(rest, statement.line),
            "testteardown" | "taskteardown" => {
                self.defaults.teardown = fixture(rest, statement.line)
            }
            "testtags" | "tasktags" | "forcetags" => {
                for tag in rest {
                    if !self.defaults.tags.contains(tag) {
                        self.defaults.tags.push(tag.clone());
                    }
                }
            }
            "defaulttags" => self.defaults.default_tags = rest.to_vec(),
            other => debug!(setting = other, "ignoring setting without runtime effect"),
        }
        Ok(())
    }

    fn import_resource(&mut self, statement: &Statement, curdir: &Path) -> DataResult<()> {
        let raw = &statement.rest()[0];
        let expanded = raw.replace("${CURDIR}", &curdir.to_string_lossy());
        let path = {
            let candidate = PathBuf::from(&expanded);
            if candidate.is_absolute() {
                candidate
            } else {
                curdir.join(candidate)
            }
        };
        let resource_error = |reason: String| DataError::Resource {
            line: statement.line,
            path: path.display().to_string(),
            reason,
        };

        if self.visited.contains(&path) {
            debug!(path = %path.display(), "resource already imported in this unit");
            return Ok(());
        }
        let source = fs::read_to_string(&path).map_err(|err| resource_error(err.to_string()))?;
        let resource_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let file = self.parser.parse(&source, &resource_dir);
        ErrorReporter::visit(&file).map_err(|err| resource_error(err.to_string()))?;
        if let Some(section) = file.sections.iter().find(|s| s.kind.tasks().is_some()) {
            return Err(resource_error(format!(
                "resource files cannot contain '{}' sections",
                section.header.trim_matches(|c: char| c == '*' || c.is_whitespace())
            )));
        }

        self.visited.push(path.clone());
        self.suite.resource.imports.push(Import {
            kind: ImportKind::Resource,
            name: expanded,
            args: Vec::new(),
            alias: None,
            line: statement.line,
        });
        let origin = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        self.apply_settings(&file)?;
        self.apply_body(&file, origin)
    }

    fn apply_body(&mut self, file: &File, origin: Option<String>) -> DataResult<()> {
        for section in &file.sections {
            match section.kind {
                SectionKind::Variables => {
                    for statement in section.statements() {
                        self.suite.resource.variables.push(VariableDef {
                            name: statement.head().trim_end_matches('=').trim_end().to_string(),
                            values: statement.rest().to_vec(),
                            line: statement.line,
                        });
                    }
                }
                SectionKind::Keywords => {
                    for block in section.blocks() {
                        let mut keyword = build_keyword(block);
                        keyword.origin = origin.clone();
                        self.suite.resource.keywords.push(keyword);
                    }
                }
                SectionKind::TestCases | SectionKind::Tasks => {
                    for block in section.blocks() {
                        let test = build_test(block, self.defaults);
                        self.suite.tests.push(test);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn library_import(statement: &Statement) -> Import {
    let rest = statement.rest();
    let mut args = rest[1..].to_vec();
    let mut alias = None;
    if let Some(pos) = args
        .iter()
        .position(|arg| arg == "WITH NAME" || arg == "AS")
    {
        alias = args.get(pos + 1).cloned();
        args.truncate(pos);
    }
    Import {
        kind: ImportKind::Library,
        name: rest[0].clone(),
        args,
        alias,
        line: statement.line,
    }
}

fn fixture(tokens: &[String], line: usize) -> Option<Step> {
    match tokens.first() {
        None => None,
        Some(name) if name.eq_ignore_ascii_case("NONE") => None,
        Some(name) => Some(Step {
            assign: Vec::new(),
            name: name.clone(),
            args: tokens[1..].to_vec(),
            line,
        }),
    }
}

fn build_keyword(block: &Block) -> UserKeyword {
    let mut keyword = UserKeyword {
        name: block.name.clone(),
        line: block.line,
        ..UserKeyword::default()
    };
    for statement in &block.body {
        let rest = statement.rest();
        match statement.block_setting().map(normalize_name).as_deref() {
            Some("arguments") => keyword.args = rest.iter().map(|arg| ArgSpec::parse(arg)).collect(),
            Some("return") => keyword.returns = rest.to_vec(),
            Some("documentation") => keyword.doc = rest.join(" "),
            Some("tags") => keyword.tags = rest.to_vec(),
            Some("teardown") => keyword.teardown = fixture(rest, statement.line),
            Some(_) => {}
            None => keyword
                .body
                .extend(Step::from_tokens(&statement.tokens, statement.line)),
        }
    }
    keyword
}

fn build_test(block: &Block, defaults: &TestDefaults) -> TestItem {
    let mut test = TestItem {
        name: block.name.clone(),
        line: block.line,
        setup: defaults.setup.clone(),
        teardown: defaults.teardown.clone(),
        ..TestItem::default()
    };
    let mut own_tags = None;
    for statement in &block.body {
        let rest = statement.rest();
        match statement.block_setting().map(normalize_name).as_deref() {
            Some("documentation") => test.doc = rest.join(" "),
            Some("tags") => own_tags = Some(rest.to_vec()),
            Some("setup") => test.setup = fixture(rest, statement.line),
            Some("teardown") => test.teardown = fixture(rest, statement.line),
            Some(_) => {}
            None => test
                .body
                .extend(Step::from_tokens(&statement.tokens, statement.line)),
        }
    }
    let mut tags = own_tags.unwrap_or_else(|| defaults.default_tags.clone());
    for tag in &defaults.tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    test.tags = tags;
    test
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_alias_is_split_from_arguments() {
        let statement = Statement {
            line: 1,
            tokens: ["Library", "Remote", "http://x", "AS", "R"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        let import = library_import(&statement);
        assert_eq!(import.args, vec!["http://x"]);
        assert_eq!(import.alias.as_deref(), Some("R"));
    }

    #[test]
    fn test_defaults_apply_to_later_tests() {
        let mut suite = Suite::new("Defaults", ".");
        let mut defaults = TestDefaults::default();
        populate_suite(
            "*** Settings ***\nTest Setup  Log  before\nTest Tags  smoke\n\
             *** Test Cases ***\nFirst\n    No Operation\nSecond\n    [Setup]  NONE\n    [Tags]  own\n    No Operation\n",
            &mut suite,
            &mut defaults,
        )
        .unwrap();
        assert_eq!(suite.tests[0].setup.as_ref().unwrap().name, "Log");
        assert_eq!(suite.tests[0].tags, vec!["smoke"]);
        assert!(suite.tests[1].setup.is_none());
        assert_eq!(suite.tests[1].tags, vec!["own", "smoke"]);
    }

    #[test]
    fn duplicate_library_imports_collapse() {
        let mut suite = Suite::new("Imports", ".");
        let mut defaults = TestDefaults::default();
        for _ in 0..2 {
            populate_suite(
                "*** Settings ***\nLibrary  Collections\n",
                &mut suite,
                &mut defaults,
            )
            .unwrap();
        }
        assert_eq!(suite.resource.library_names(), vec!["Collections"]);
        assert_eq!(suite.resource.imports.len(), 1);
    }
}
