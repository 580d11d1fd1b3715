//! Executes a suite: keyword resolution, argument binding, assignments and
//! status reporting.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use robotkernel_core_types::{normalize_name, Value};
use robotkernel_event_bus::{
    ListenerSet, ReturnValueEvent, Scope, Status, StatusEvent, VariableEvent, VariableScope,
};
use robotkernel_suite::{Named, Step, Suite, TestItem, UserKeyword, VariableDef};
use tracing::{debug, warn};

use crate::console::ConsoleReport;
use crate::errors::{EngineError, EngineResult, KeywordFailure, KeywordResult};
use crate::library::{bind_arguments, CallContext, Library, LibraryKeyword, LibraryRegistry};
use crate::result::{timestamp, BodyItem, KeywordRecord, Message, SuiteRecord, TestRecord};
use crate::variables::VariableStore;

/// Nesting limit for keyword calls; recursive keywords fail here instead of
/// exhausting the stack.
const MAX_KEYWORD_DEPTH: usize = 100;

struct Imported {
    name: String,
    library: Arc<Library>,
}

enum Target<'s> {
    User(&'s UserKeyword),
    Library { library: String, keyword: LibraryKeyword },
}

pub(crate) struct Runner<'a> {
    suite: &'a Suite,
    registry: &'a LibraryRegistry,
    listeners: &'a ListenerSet,
    console: &'a mut dyn Write,
    output_dir: &'a Path,
    variables: VariableStore,
    libraries: Vec<Imported>,
    depth: usize,
    user_depth: usize,
}

impl<'a> Runner<'a> {
    pub(crate) fn new(
        suite: &'a Suite,
        registry: &'a LibraryRegistry,
        listeners: &'a ListenerSet,
        console: &'a mut dyn Write,
        output_dir: &'a Path,
    ) -> Self {
        let curdir = if suite.source.is_dir() {
            suite.source.as_path()
        } else {
            suite.source.parent().unwrap_or(Path::new("."))
        };
        Self {
            suite,
            registry,
            listeners,
            console,
            output_dir,
            variables: VariableStore::with_builtins(output_dir, curdir, &suite.name),
            libraries: Vec::new(),
            depth: 0,
            user_depth: 0,
        }
    }

    pub(crate) fn run(mut self) -> EngineResult<SuiteRecord> {
        let suite = self.suite;
        let start = timestamp();
        self.listeners
            .status(&StatusEvent::started(Scope::Suite, &suite.name, 0));
        self.report(|console| console.suite_start(&suite.name, &suite.doc));

        self.import_library("BuiltIn", None)?;
        for import in suite.resource.imports.iter() {
            if import.kind == robotkernel_suite::ImportKind::Library {
                self.import_library(&import.name, import.alias.as_deref())?;
            }
        }
        self.listeners.suite_built(suite);

        for (name, value) in self.listeners.restored_variables() {
            self.variables.set_suite(&name, value);
        }
        for variable in &suite.resource.variables {
            if let Err(err) = self.define_variable(variable) {
                warn!(variable = %variable.name, error = %err, "skipping suite variable");
            }
        }

        let mut setup_failure = None;
        let setup = suite.setup.as_ref().map(|step| {
            let (record, result) = self.run_step(step, "SETUP");
            if let Err(err) = result {
                setup_failure = Some(err.message);
            }
            record
        });

        let tests: Vec<TestRecord> = suite
            .tests
            .iter()
            .map(|test| self.run_test(test, setup_failure.as_deref()))
            .collect();

        let mut teardown_failure = None;
        let teardown = suite.teardown.as_ref().map(|step| {
            let (record, result) = self.run_step(step, "TEARDOWN");
            if let Err(err) = result {
                teardown_failure = Some(err.message);
            }
            record
        });

        let mut message = String::new();
        if let Some(failure) = &setup_failure {
            message = format!("Suite setup failed:\n{failure}");
        }
        if let Some(failure) = &teardown_failure {
            if !message.is_empty() {
                message.push_str("\n\n");
            }
            message.push_str(&format!("Suite teardown failed:\n{failure}"));
        }
        let failed = tests.iter().any(|test| !test.passed()) || !message.is_empty();
        let status = if failed { Status::Fail } else { Status::Pass };

        let record = SuiteRecord {
            name: suite.name.clone(),
            source: suite.source.display().to_string(),
            doc: suite.doc.clone(),
            metadata: suite.metadata.clone(),
            rpa: suite.rpa,
            setup,
            tests,
            teardown,
            status,
            message,
            start,
            end: timestamp(),
        };
        let stats = record.statistics();
        self.report(|console| console.suite_end(&record.name, status, &record.message, &stats));
        self.listeners.status(&StatusEvent::ended(
            Scope::Suite,
            &suite.name,
            0,
            status,
            &record.message,
        ));
        Ok(record)
    }

    fn report<F>(&mut self, write: F)
    where
        F: FnOnce(&mut ConsoleReport<'_>) -> io::Result<()>,
    {
        let mut console = ConsoleReport::new(&mut *self.console);
        if let Err(err) = write(&mut console) {
            warn!(error = %err, "console write failed");
        }
    }

    fn import_library(&mut self, name: &str, alias: Option<&str>) -> EngineResult<()> {
        let library = self.registry.get(name).ok_or_else(|| {
            EngineError::import(name, "No library with this name is registered.")
        })?;
        let imported_as = alias.unwrap_or(&library.name).to_string();
        let key = normalize_name(&imported_as);
        if self
            .libraries
            .iter()
            .any(|imported| normalize_name(&imported.name) == key)
        {
            return Ok(());
        }
        let mut doc = library.to_doc();
        doc.name = imported_as.clone();
        debug!(library = %imported_as, keywords = doc.keywords.len(), "library imported");
        self.libraries.push(Imported {
            name: imported_as,
            library,
        });
        self.listeners.library_imported(&doc);
        Ok(())
    }

    fn define_variable(&mut self, variable: &VariableDef) -> KeywordResult<()> {
        let value = if variable.is_list() {
            Value::List(self.variables.resolve_args(&variable.values)?)
        } else if variable.is_dict() {
            let mut entries = Vec::new();
            for item in &variable.values {
                let Some((key, raw)) = item.split_once('=') else {
                    return Err(KeywordFailure::new(format!(
                        "Invalid dictionary variable item '{item}'."
                    )));
                };
                entries.push((self.variables.replace_string(key)?, self.variables.resolve(raw)?));
            }
            Value::Dict(entries)
        } else {
            match variable.values.as_slice() {
                [] => Value::String(String::new()),
                [single] => self.variables.resolve(single)?,
                many => Value::String(
                    many.iter()
                        .map(|item| self.variables.replace_string(item))
                        .collect::<KeywordResult<Vec<_>>>()?
                        .join(" "),
                ),
            }
        };
        self.variables.set_suite(&variable.name, value);
        Ok(())
    }

    fn run_test(&mut self, test: &TestItem, parent_failure: Option<&str>) -> TestRecord {
        let start = timestamp();
        self.listeners
            .status(&StatusEvent::started(Scope::Test, &test.name, 0));
        self.variables.push_frame();
        self.variables
            .set_local("${TEST_NAME}", Value::String(test.name.clone()));

        let mut record = TestRecord {
            name: test.name.clone(),
            doc: test.doc.clone(),
            tags: test.tags.clone(),
            setup: None,
            body: Vec::new(),
            teardown: None,
            status: Status::Pass,
            message: String::new(),
            start,
            end: String::new(),
        };

        let mut failure: Option<String> = parent_failure
            .map(|message| format!("Parent suite setup failed:\n{message}"));

        if failure.is_none() {
            if let Some(step) = &test.setup {
                let (setup, result) = self.run_step(step, "SETUP");
                record.setup = Some(setup);
                if let Err(err) = result {
                    failure = Some(format!("Setup failed:\n{}", err.message));
                }
            }
        }
        if failure.is_none() {
            for step in &test.body {
                let (keyword, result) = self.run_step(step, "KEYWORD");
                record.body.push(keyword);
                if let Err(err) = result {
                    failure = Some(err.message);
                    break;
                }
            }
        }
        if parent_failure.is_none() {
            if let Some(step) = &test.teardown {
                let (teardown, result) = self.run_step(step, "TEARDOWN");
                record.teardown = Some(teardown);
                if let Err(err) = result {
                    failure = Some(match failure {
                        Some(previous) => {
                            format!("{previous}\n\nAlso teardown failed:\n{}", err.message)
                        }
                        None => format!("Teardown failed:\n{}", err.message),
                    });
                }
            }
        }

        self.variables.pop_frame();
        if let Some(message) = failure {
            record.status = Status::Fail;
            record.message = message;
        }
        record.end = timestamp();
        let (name, status, message) = (record.name.clone(), record.status, record.message.clone());
        self.report(|console| console.test_end(&name, status, &message));
        self.listeners.status(&StatusEvent::ended(
            Scope::Test,
            &record.name,
            0,
            record.status,
            &record.message,
        ));
        record
    }

    fn run_step(&mut self, step: &Step, kind: &'static str) -> (KeywordRecord, KeywordResult<Value>) {
        self.depth += 1;
        let depth = self.depth;
        let mut record = KeywordRecord::new(&step.name, kind, &step.assign, &step.args);
        self.listeners
            .status(&StatusEvent::started(Scope::Keyword, &step.name, depth));

        let result = self.execute_step(step, &mut record);

        match &result {
            Ok(value) => {
                record.finish(Status::Pass, "");
                self.listeners.return_value(&ReturnValueEvent {
                    keyword: step.name.clone(),
                    depth,
                    value: value.clone(),
                });
            }
            Err(err) => {
                record.body.push(BodyItem::Message(Message::new(
                    "FAIL",
                    &err.message,
                    false,
                )));
                record.finish(Status::Fail, err.message.clone());
            }
        }
        self.listeners.status(&StatusEvent::ended(
            Scope::Keyword,
            &step.name,
            depth,
            record.status,
            &record.message,
        ));
        self.depth -= 1;
        (record, result)
    }

    fn execute_step(&mut self, step: &Step, record: &mut KeywordRecord) -> KeywordResult<Value> {
        if self.depth > MAX_KEYWORD_DEPTH {
            return Err(KeywordFailure::new(
                "Maximum limit of started keywords exceeded.",
            ));
        }
        let name = self.resolve_name(&step.name)?;
        let value = self.dispatch(&name, step, record)?;
        self.assign(&step.assign, value.clone(), record)?;
        Ok(value)
    }

    /// Keyword names may themselves contain variables.
    fn resolve_name(&self, name: &str) -> KeywordResult<String> {
        if name.contains('{') {
            self.variables.replace_string(name)
        } else {
            Ok(name.to_string())
        }
    }

    fn dispatch(
        &mut self,
        name: &str,
        step: &Step,
        record: &mut KeywordRecord,
    ) -> KeywordResult<Value> {
        match self.find_keyword(name)? {
            Target::User(keyword) => {
                record.library = Some(
                    keyword
                        .origin
                        .clone()
                        .unwrap_or_else(|| self.suite.name.clone()),
                );
                self.run_user_keyword(keyword, &step.args, record)
            }
            Target::Library { library, keyword } => {
                record.name = keyword.doc.name.clone();
                record.library = Some(library);
                self.run_library_keyword(&keyword, &step.args, record)
            }
        }
    }

    fn find_keyword(&self, name: &str) -> KeywordResult<Target<'a>> {
        let suite = self.suite;
        let wanted = normalize_name(name);

        for (dot, _) in name.match_indices('.') {
            let (owner, keyword) = (&name[..dot], &name[dot + 1..]);
            let owner = normalize_name(owner);
            let keyword_key = normalize_name(keyword);
            if let Some(found) = suite.resource.keywords.iter().find(|kw| {
                kw.key() == keyword_key
                    && normalize_name(kw.origin.as_deref().unwrap_or(&suite.name)) == owner
            }) {
                return Ok(Target::User(found));
            }
            if let Some(imported) = self
                .libraries
                .iter()
                .find(|imported| normalize_name(&imported.name) == owner)
            {
                if let Some(keyword) = imported.library.find(keyword) {
                    return Ok(Target::Library {
                        library: imported.name.clone(),
                        keyword: keyword.clone(),
                    });
                }
            }
        }

        if let Some(found) = suite.resource.keywords.iter().find(|kw| kw.key() == wanted) {
            return Ok(Target::User(found));
        }

        let matches: Vec<(&Imported, &LibraryKeyword)> = self
            .libraries
            .iter()
            .filter_map(|imported| imported.library.find(name).map(|kw| (imported, kw)))
            .collect();
        let preferred: Vec<&(&Imported, &LibraryKeyword)> = matches
            .iter()
            .filter(|(imported, _)| imported.library.name != "BuiltIn")
            .collect();
        let chosen = match preferred.as_slice() {
            [only] => Some(**only),
            [] => matches.first().copied(),
            many => {
                let names: Vec<String> = many
                    .iter()
                    .map(|(imported, kw)| format!("    {}.{}", imported.name, kw.doc.name))
                    .collect();
                return Err(KeywordFailure::new(format!(
                    "Multiple keywords with name '{name}' found. Give the full name of the \
                     keyword you want to use:\n{}",
                    names.join("\n")
                )));
            }
        };
        chosen
            .map(|(imported, keyword)| Target::Library {
                library: imported.name.clone(),
                keyword: keyword.clone(),
            })
            .ok_or_else(|| KeywordFailure::new(format!("No keyword with name '{name}' found.")))
    }

    fn run_library_keyword(
        &mut self,
        keyword: &LibraryKeyword,
        args: &[String],
        record: &mut KeywordRecord,
    ) -> KeywordResult<Value> {
        let mut values = Vec::with_capacity(args.len());
        let mut rest = args;
        if keyword.takes_variable {
            if let Some((first, tail)) = args.split_first() {
                values.push(Value::String(first.clone()));
                rest = tail;
            }
        }
        values.extend(self.variables.resolve_args(rest)?);
        let variables = &self.variables;
        let bound = bind_arguments(
            &keyword.doc.name,
            &keyword.doc.args,
            args,
            values,
            &|default| variables.resolve(default),
        )?;

        let mut ctx = CallContext::new(
            &mut self.variables,
            self.listeners,
            &mut *self.console,
            self.output_dir,
            self.user_depth > 0,
        );
        let result = (keyword.run)(&mut ctx, &bound);
        let CallContext {
            messages,
            pending_imports,
            ..
        } = ctx;
        record
            .body
            .extend(messages.into_iter().map(BodyItem::Message));

        for (name, _args) in pending_imports {
            self.import_library(&name, None)
                .map_err(|err| KeywordFailure::new(err.to_string()))?;
        }
        result
    }

    fn run_user_keyword(
        &mut self,
        keyword: &'a UserKeyword,
        args: &[String],
        record: &mut KeywordRecord,
    ) -> KeywordResult<Value> {
        let values = self.variables.resolve_args(args)?;
        let variables = &self.variables;
        let bound = bind_arguments(
            &keyword.name,
            &keyword.args,
            args,
            values,
            &|default| variables.resolve(default),
        )?;

        self.variables.push_frame();
        self.user_depth += 1;
        let fixed = keyword.args.iter().filter(|arg| !arg.is_varargs()).count();
        for (spec, value) in keyword.args.iter().filter(|arg| !arg.is_varargs()).zip(&bound) {
            self.variables.set_local(&spec.name, value.clone());
        }
        if let Some(varargs) = keyword.args.iter().find(|arg| arg.is_varargs()) {
            let rest = bound.get(fixed..).unwrap_or_default().to_vec();
            self.variables.set_local(&varargs.name, Value::List(rest));
        }

        let mut outcome: KeywordResult<Option<Value>> = Ok(None);
        for step in &keyword.body {
            if step.is_return() {
                outcome = self.return_value(&step.args).map(Some);
                break;
            }
            let (child, result) = self.run_step(step, "KEYWORD");
            record.body.push(BodyItem::Keyword(child));
            if let Err(err) = result {
                outcome = Err(err);
                break;
            }
        }
        let mut outcome = match outcome {
            Ok(None) if !keyword.returns.is_empty() => self.return_value(&keyword.returns),
            Ok(value) => Ok(value.unwrap_or(Value::None)),
            Err(err) => Err(err),
        };

        if let Some(step) = &keyword.teardown {
            let (child, result) = self.run_step(step, "TEARDOWN");
            record.body.push(BodyItem::Keyword(child));
            if let Err(err) = result {
                outcome = Err(match outcome {
                    Err(previous) => KeywordFailure::new(format!(
                        "{}\n\nAlso keyword teardown failed:\n{}",
                        previous.message, err.message
                    )),
                    Ok(_) => KeywordFailure::new(format!(
                        "Keyword teardown failed:\n{}",
                        err.message
                    )),
                });
            }
        }

        self.user_depth -= 1;
        self.variables.pop_frame();
        outcome
    }

    fn return_value(&self, tokens: &[String]) -> KeywordResult<Value> {
        match tokens {
            [] => Ok(Value::None),
            [single] => self.variables.resolve(single),
            many => Ok(Value::List(self.variables.resolve_args(many)?)),
        }
    }

    fn assign(
        &mut self,
        targets: &[String],
        value: Value,
        record: &mut KeywordRecord,
    ) -> KeywordResult<()> {
        let pairs: Vec<(String, Value)> = match targets {
            [] => return Ok(()),
            [single] => {
                check_assignable(single, &value)?;
                vec![(single.clone(), value)]
            }
            many => {
                let Value::List(items) = value else {
                    return Err(KeywordFailure::new(format!(
                        "Cannot set variables: Expected list-like value, got {}.",
                        value.type_name()
                    )));
                };
                split_for_targets(many, items)?
            }
        };
        for (target, value) in pairs {
            let name = target.trim_end_matches('=').trim_end().to_string();
            record.body.push(BodyItem::Message(Message::new(
                "INFO",
                format!("{name} = {value}"),
                false,
            )));
            self.variables.set_local(&name, value.clone());
            self.listeners.variable(&VariableEvent {
                name,
                value,
                scope: VariableScope::Local,
                in_user_keyword: self.user_depth > 0,
            });
        }
        Ok(())
    }
}

fn check_assignable(target: &str, value: &Value) -> KeywordResult<()> {
    let target = target.trim_end_matches('=').trim_end();
    match (target.chars().next(), value) {
        (Some('@'), Value::List(_)) | (Some('&'), Value::Dict(_)) => Ok(()),
        (Some('@'), other) => Err(KeywordFailure::new(format!(
            "Cannot set variable '{target}': Expected list-like value, got {}.",
            other.type_name()
        ))),
        (Some('&'), other) => Err(KeywordFailure::new(format!(
            "Cannot set variable '{target}': Expected dictionary-like value, got {}.",
            other.type_name()
        ))),
        _ => Ok(()),
    }
}

fn split_for_targets(targets: &[String], items: Vec<Value>) -> KeywordResult<Vec<(String, Value)>> {
    let starred = targets
        .last()
        .is_some_and(|last| last.starts_with('@'));
    let fixed = if starred { targets.len() - 1 } else { targets.len() };
    if items.len() < fixed || (!starred && items.len() != fixed) {
        let expected = if starred {
            format!("{fixed} or more")
        } else {
            fixed.to_string()
        };
        return Err(KeywordFailure::new(format!(
            "Cannot set variables: Expected {expected} return values, got {}.",
            items.len()
        )));
    }
    let mut items = items.into_iter();
    let mut pairs: Vec<(String, Value)> = targets[..fixed]
        .iter()
        .cloned()
        .zip(items.by_ref())
        .collect();
    if starred {
        pairs.push((targets[fixed].clone(), Value::List(items.collect())));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacks_into_several_targets() {
        let targets = vec!["${a}".to_string(), "@{rest}=".to_string()];
        let pairs = split_for_targets(&targets, vec!["1".into(), "2".into(), "3".into()]).unwrap();
        assert_eq!(pairs[0].1, Value::from("1"));
        assert_eq!(pairs[1].1, Value::List(vec!["2".into(), "3".into()]));
    }

    #[test]
    fn rejects_mismatched_unpacking() {
        let targets = vec!["${a}".to_string(), "${b}".to_string()];
        let err = split_for_targets(&targets, vec!["1".into()]).unwrap_err();
        assert_eq!(
            err.message,
            "Cannot set variables: Expected 2 return values, got 1."
        );
        assert!(check_assignable("@{x}=", &Value::from("text")).is_err());
    }
}
