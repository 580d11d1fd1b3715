use std::any::Any;
use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use robotkernel_core_types::Value;
use robotkernel_engine::{Engine, EngineError, Interpreter, Library, RunOptions, LOG_FILE};
use robotkernel_event_bus::{
    Connection, ConnectionEvent, ConnectionObserver, Listener, ListenerResult, ListenerSet,
    ReturnValueEvent, ReturnValueObserver, VariableEvent, VariableObserver,
};
use robotkernel_suite::{populate_suite, Suite, TestDefaults};

const TEST_SUITE: &str = "\
*** Settings ***

Library  Collections

*** Keywords ***

Head
    [Arguments]  ${list}
    ${value}=  Get from list  ${list}  0
    [Return]  ${value}

*** Tasks ***

Get head
    ${array}=  Create list  1  2  3  4  5
    ${head}=  Head  ${array}
    Should be equal  ${head}  1
";

#[derive(Default)]
struct Recorder {
    returns: Mutex<Vec<ReturnValueEvent>>,
    variables: Mutex<Vec<VariableEvent>>,
    connections: Mutex<Vec<String>>,
    kinds: Vec<String>,
}

impl ReturnValueObserver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_return_value(&self, event: &ReturnValueEvent) -> ListenerResult {
        self.returns.lock().push(event.clone());
        Ok(())
    }
}

impl VariableObserver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_variable(&self, event: &VariableEvent) -> ListenerResult {
        self.variables.lock().push(event.clone());
        Ok(())
    }
}

impl ConnectionObserver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn kinds(&self) -> &[String] {
        &self.kinds
    }

    fn on_connection(&self, event: &ConnectionEvent) -> ListenerResult {
        self.connections.lock().push(event.kind.clone());
        Ok(())
    }
}

fn listeners(recorder: &Arc<Recorder>) -> ListenerSet {
    ListenerSet::new(vec![
        Listener::ReturnValue(recorder.clone()),
        Listener::Variable(recorder.clone()),
        Listener::Connection(recorder.clone()),
    ])
}

fn build(code: &str) -> Suite {
    let mut suite = Suite::new("Robocode Lab", ".");
    let mut defaults = TestDefaults::default();
    populate_suite(code, &mut suite, &mut defaults).unwrap();
    suite
}

#[test]
fn head_task_passes_and_returns_first_item() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let mut console = Vec::new();

    let outcome = Interpreter::new()
        .run(
            &build(TEST_SUITE),
            &RunOptions::new(dir.path()),
            &listeners(&recorder),
            &mut console,
        )
        .unwrap();

    assert_eq!(outcome.statistics.total, 1);
    assert_eq!(outcome.statistics.failed, 0);
    let returns = recorder.returns.lock();
    let top_level: Vec<&Value> = returns
        .iter()
        .filter(|event| event.depth == 1 && event.value != Value::None)
        .map(|event| &event.value)
        .collect();
    assert_eq!(top_level.last(), Some(&&Value::from("1")));

    let console = String::from_utf8(console).unwrap();
    assert!(console.contains("| PASS |"));
    assert!(console.contains("1 task, 1 passed, 0 failed"));

    let xml = fs::read_to_string(&outcome.output).unwrap();
    assert!(xml.contains(r#"<kw name="Get From List" library="Collections">"#));
    assert!(xml.contains(r#"rpa="true""#));
}

#[test]
fn failing_assertion_reports_message() {
    let dir = tempfile::tempdir().unwrap();
    let mut console = Vec::new();
    let suite = build("*** Test Cases ***\nCompare\n    Should Be Equal  1  2\n    Log  never\n");

    let outcome = Interpreter::new()
        .run(&suite, &RunOptions::new(dir.path()), &ListenerSet::default(), &mut console)
        .unwrap();

    assert_eq!(outcome.statistics.failed, 1);
    let test = &outcome.result.tests[0];
    assert_eq!(test.message, "1 != 2");
    assert_eq!(test.body.len(), 1);
    let console = String::from_utf8(console).unwrap();
    assert!(console.contains("| FAIL |"));
    assert!(console.contains("1 test, 0 passed, 1 failed"));
}

#[test]
fn recursive_keyword_fails_at_depth_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut console = Vec::new();
    let suite = build(
        "*** Keywords ***\nLoop\n    Loop\n\n*** Tasks ***\nSpin\n    Loop\n\nAfter\n    No Operation\n",
    );

    let outcome = Interpreter::new()
        .run(&suite, &RunOptions::new(dir.path()), &ListenerSet::default(), &mut console)
        .unwrap();

    assert_eq!(outcome.statistics.total, 2);
    assert_eq!(outcome.statistics.failed, 1);
    assert_eq!(
        outcome.result.tests[0].message,
        "Maximum limit of started keywords exceeded."
    );
    assert!(outcome.result.tests[1].passed());
}

#[test]
fn html_messages_are_escaped_in_output() {
    let dir = tempfile::tempdir().unwrap();
    let suite = build(
        "*** Tasks ***\nShot\n    Log  <img src=\"shot.png\" width=\"800px\">  html=True\n",
    );
    let outcome = Interpreter::new()
        .run(&suite, &RunOptions::new(dir.path()), &ListenerSet::default(), &mut Vec::new())
        .unwrap();

    let xml = fs::read_to_string(&outcome.output).unwrap();
    assert!(xml.contains(r#"html="true">&lt;img src="shot.png" width="800px"&gt;</msg>"#));

    let log = dir.path().join(LOG_FILE);
    Interpreter::new()
        .write_log(&outcome.output, &log, "Robocode Lab", true)
        .unwrap();
    assert!(fs::read_to_string(log)
        .unwrap()
        .contains(r#""reportURL":"report.html""#));
}

#[test]
fn variable_events_flag_user_keyword_scope() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let suite = build(
        "*** Keywords ***\nInner\n    ${inside}=  Set Variable  a\n\
         *** Test Cases ***\nT\n    ${outside}=  Set Variable  b\n    Inner\n",
    );
    Interpreter::new()
        .run(&suite, &RunOptions::new(dir.path()), &listeners(&recorder), &mut Vec::new())
        .unwrap();

    let events = recorder.variables.lock();
    let flags: Vec<(&str, bool)> = events
        .iter()
        .map(|event| (event.name.as_str(), event.in_user_keyword))
        .collect();
    assert_eq!(flags, vec![("${outside}", false), ("${inside}", true)]);
}

#[test]
fn unknown_library_is_an_import_error() {
    let dir = tempfile::tempdir().unwrap();
    let suite = build("*** Settings ***\nLibrary  NoSuchLibrary\n*** Test Cases ***\nT\n    No Operation\n");
    let err = Interpreter::new()
        .run(&suite, &RunOptions::new(dir.path()), &ListenerSet::default(), &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::Import { .. }));
    assert_eq!(err.kind(), "ImportError");
}

#[derive(Debug)]
struct FakeBrowser;

impl Connection for FakeBrowser {
    fn kind(&self) -> &str {
        "browser"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn custom_library_connections_reach_matching_observers() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Interpreter::new();
    engine.register(Library::new("Browser", "Fake browser.").keyword(
        "Open Browser",
        &["url"],
        "Opens a fake browser.",
        |ctx, _| {
            ctx.open_connection("browser", Arc::new(FakeBrowser));
            Ok(Value::None)
        },
    ));
    let recorder = Arc::new(Recorder {
        kinds: vec!["desktop".into()],
        ..Recorder::default()
    });
    let browser_recorder = Arc::new(Recorder {
        kinds: vec!["browser".into()],
        ..Recorder::default()
    });
    let set = ListenerSet::new(vec![
        Listener::Connection(recorder.clone()),
        Listener::Connection(browser_recorder.clone()),
    ]);
    let suite = build(
        "*** Settings ***\nLibrary  Browser\n*** Tasks ***\nOpen\n    Open Browser  https://example.com\n",
    );

    let outcome = engine
        .run(&suite, &RunOptions::new(dir.path()), &set, &mut Vec::new())
        .unwrap();

    assert_eq!(outcome.statistics.failed, 0);
    assert!(recorder.connections.lock().is_empty());
    assert_eq!(*browser_recorder.connections.lock(), vec!["browser".to_string()]);
}

#[test]
fn collections_and_strings_work_together() {
    let dir = tempfile::tempdir().unwrap();
    let suite = build(
        "*** Settings ***\nLibrary  Collections\nLibrary  String\n\
         *** Variables ***\n@{WORDS}  b  a\n\
         *** Test Cases ***\nT\n    Append To List  ${WORDS}  c\n    Sort List  ${WORDS}\n\
         \x20   ${joined}=  Catenate  SEPARATOR=-  @{WORDS}\n    Should Be Equal  ${joined}  a-b-c\n\
         \x20   ${upper}=  Convert To Upper Case  ${joined}\n    Should Start With  ${upper}  A-B\n\
         \x20   ${first}  @{rest}=  Split String  ${joined}  -\n    Length Should Be  ${rest}  2\n",
    );
    let outcome = Interpreter::new()
        .run(&suite, &RunOptions::new(dir.path()), &ListenerSet::default(), &mut Vec::new())
        .unwrap();
    assert_eq!(outcome.result.tests[0].message, "");
    assert_eq!(outcome.statistics.passed, 1);
}
