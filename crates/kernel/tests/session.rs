use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use robotkernel_core_types::Value;
use robotkernel_engine::{Interpreter, KeywordFailure, Library};
use robotkernel_event_bus::{Connection, ListenerError};
use robotkernel_kernel::frontend::TRIGGER_MIME;
use robotkernel_kernel::{
    CellMetadata, EvaluationContext, EvaluationError, Evaluator, ExecuteReply, FrontendMessage,
    KernelConfig, RecordingFrontend, Session,
};

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

fn session_with(interpreter: Interpreter) -> (Session, Arc<RecordingFrontend>) {
    let frontend = Arc::new(RecordingFrontend::new());
    let session = Session::new(KernelConfig::default(), Arc::new(interpreter), frontend.clone());
    (session, frontend)
}

fn session() -> (Session, Arc<RecordingFrontend>) {
    session_with(Interpreter::new())
}

fn ename(reply: &ExecuteReply) -> &str {
    match reply {
        ExecuteReply::Error { ename, .. } => ename,
        ExecuteReply::Ok { .. } => "",
    }
}

#[test]
fn head_suite_runs_and_renders_return_value() {
    let (mut session, frontend) = session();

    let reply = session.execute(TEST_SUITE, false);

    assert_eq!(reply, ExecuteReply::ok(1));
    let run = session.last_run().expect("a run happened");
    assert_eq!(run.statistics.failed, 0);
    assert_eq!(run.return_values.last(), Some(&Value::from("1")));

    let results = frontend.of_type("execute_result");
    let [FrontendMessage::ExecuteResult { data, .. }] = results.as_slice() else {
        panic!("expected one execute result, got {results:?}");
    };
    assert_eq!(data["text/plain"], "1");
    assert!(!frontend.of_type("update_display_data").is_empty());

    assert!(session.suite().tests.is_empty());
    assert_eq!(session.suite().resource.keywords.len(), 1);
    assert!(session.catalog().read().lookup("Head").is_some());
}

#[test]
fn completion_grows_with_imported_libraries() {
    let (mut session, _) = session();
    assert!(session.complete("coll", None).matches.is_empty());

    assert!(session.execute("*** Settings ***\nLibrary  Collections\n", true).is_ok());

    let reply = session.complete("coll", None);
    assert!(reply
        .matches
        .contains(&"Collections.Get From List".to_string()));
    assert_eq!(reply.cursor_start, 0);
    assert_eq!(reply.cursor_end, 4);
    assert!(session.complete("", None).matches.is_empty());
}

#[test]
fn inspection_requires_exact_name() {
    let (mut session, _) = session();
    session.execute("*** Settings ***\nLibrary  Collections\n", true);

    let found = session.inspect("get from list", None);
    assert!(found.found);
    assert!(found.data.contains_key("text/plain"));
    assert!(found.data.contains_key("text/markdown"));

    assert!(!session.inspect("get from lis", None).found);
}

#[test]
fn failed_run_replies_with_console_traceback() {
    let (mut session, frontend) = session();
    let code = "*** Tasks ***\nBroken\n    Fail  boom\n";

    let reply = session.execute(code, false);

    let ExecuteReply::Error { ename, traceback, .. } = &reply else {
        panic!("expected an error reply");
    };
    assert!(ename.is_empty());
    assert!(traceback.iter().any(|line| line.contains("FAIL")));
    assert_eq!(frontend.of_type("error").len(), 1);
    assert_eq!(session.history().count(), 0);
    assert!(session.suite().tests.is_empty());
}

#[test]
fn recursive_keyword_replies_with_error() {
    let (mut session, _) = session();
    let code = "*** Keywords ***\nLoop\n    Loop\n\n*** Tasks ***\nSpin\n    Loop\n";

    let reply = session.execute(code, true);

    assert!(!reply.is_ok());
    assert_eq!(session.execution_count(), 1);
}

#[test]
fn variables_cross_cells_and_suite_definitions_win() {
    let (mut session, _) = session();

    let first = "*** Tasks ***\nSet\n    ${greeting}=  Set Variable  hello\n";
    assert!(session.execute(first, true).is_ok());
    assert!(session.suite_variables().get("${greeting}").is_some());

    let second = "*** Tasks ***\nUse\n    Should Be Equal  ${greeting}  hello\n";
    assert!(session.execute(second, true).is_ok());

    let redefined = "\
*** Variables ***
${greeting}    bye

*** Tasks ***
Check
    Should Be Equal  ${greeting}  bye
";
    assert!(session.execute(redefined, true).is_ok());

    let reply = session.complete("${gre", None);
    assert_eq!(reply.matches, vec!["${greeting}".to_string()]);
}

#[test]
fn deleted_cells_leave_the_variable_history() {
    let (mut session, _) = session();
    session.init_metadata(&CellMetadata {
        cell_id: Some("a".into()),
        deleted_cells: Vec::new(),
    });
    assert!(session.execute("*** Variables ***\n${greeting}    hi\n", true).is_ok());
    session.init_metadata(&CellMetadata {
        cell_id: Some("b".into()),
        deleted_cells: Vec::new(),
    });
    session.execute("*** Variables ***\n${other}    1\n", true);
    assert!(session.variable_history().names().contains(&"${greeting}".to_string()));

    session.init_metadata(&CellMetadata {
        cell_id: Some("c".into()),
        deleted_cells: vec!["a".into()],
    });
    session.execute("*** Variables ***\n${third}    3\n", true);

    let names = session.variable_history().names();
    assert!(!names.contains(&"${greeting}".to_string()));
    assert!(names.contains(&"${other}".to_string()));
}

#[test]
fn mixed_mode_leaves_suite_unchanged() {
    let (mut session, _) = session();
    session.execute("*** Keywords ***\nNoop\n    No Operation\n", true);
    let before = session.suite().clone();

    let reply = session.execute(
        "*** Keywords ***\nOther\n    No Operation\n\n*** Tasks ***\nA\n    Noop\n\n*** Test Cases ***\nB\n    Noop\n",
        true,
    );

    assert_eq!(ename(&reply), "DataError");
    assert_eq!(session.suite(), &before);
}

#[test]
fn unknown_library_is_rolled_back() {
    let (mut session, frontend) = session();

    let reply = session.execute("*** Settings ***\nLibrary  NoSuchLibrary\n", false);

    assert_eq!(ename(&reply), "ImportError");
    assert!(session.suite().resource.imports.is_empty());
    assert_eq!(frontend.of_type("error").len(), 1);
}

#[test]
fn keyword_cells_publish_triggers() {
    let (mut session, frontend) = session();
    let code = "\
*** Keywords ***
Greet
    [Arguments]  ${name}  ${greeting}=Hello
    Log To Console  ${greeting} ${name}
";
    assert!(session.execute(code, false).is_ok());

    let displays = frontend.take();
    assert!(displays.iter().any(|message| matches!(
        message,
        FrontendMessage::DisplayData { data, .. } if data.contains_key(TRIGGER_MIME)
    )));
    assert!(session.trigger("greet").is_some());

    // Re-running an unchanged definition offers nothing new.
    session.execute(code, false);
    assert!(frontend.take().is_empty());

    let values = HashMap::from([("name".to_string(), "Robot".to_string())]);
    let reply = session.invoke_trigger("Greet", &values);
    assert!(reply.is_ok());
    let run = session.last_run().expect("trigger ran");
    assert!(run.stdout.contains("Hello Robot"));
    assert!(session.suite().tests.is_empty());
    assert!(frontend.messages().iter().any(|message| matches!(
        message,
        FrontendMessage::DisplayData { data, .. } if data.contains_key("text/html")
    )));

    assert_eq!(ename(&session.invoke_trigger("Missing", &HashMap::new())), "KeyError");
}

struct Echo;

impl Evaluator for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn evaluate(
        &self,
        _context: &mut EvaluationContext,
        code: &str,
    ) -> Result<Option<Value>, EvaluationError> {
        Ok(Some(Value::from(code.trim())))
    }
}

#[test]
fn module_cells_need_an_evaluator() {
    let (mut session, frontend) = session();
    let code = "%%module Scratch\nanswer = 42\n";

    assert_eq!(ename(&session.execute(code, false)), "EvaluationError");

    session.set_evaluator(Arc::new(Echo));
    assert!(session.execute(code, false).is_ok());
    let results = frontend.of_type("execute_result");
    let [FrontendMessage::ExecuteResult { data, .. }] = results.as_slice() else {
        panic!("expected one execute result");
    };
    assert_eq!(data["text/plain"], "answer = 42");
    assert_eq!(session.modules().context("Scratch").map(|ctx| ctx.evaluations), Some(1));
}

#[derive(Debug)]
struct Browser {
    closed: Arc<AtomicUsize>,
}

impl Connection for Browser {
    fn kind(&self) -> &str {
        "browser"
    }

    fn is_closable(&self) -> bool {
        true
    }

    fn close(&self) -> Result<(), ListenerError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn shutdown_closes_connections_once() {
    let closed = Arc::new(AtomicUsize::new(0));
    let interpreter = Interpreter::new();
    let counter = closed.clone();
    interpreter.register(Library::new("Browser", "Test browser.").keyword(
        "Open Browser",
        &[],
        "Opens a browser.",
        move |ctx, _| {
            ctx.open_connection(
                "browser",
                Arc::new(Browser {
                    closed: counter.clone(),
                }),
            );
            Ok(Value::None)
        },
    ));
    let (mut session, _) = session_with(interpreter);
    session.track_connections("browser");

    let code = "*** Settings ***\nLibrary  Browser\n\n*** Tasks ***\nOpen\n    Open Browser\n";
    assert!(session.execute(code, true).is_ok());
    assert_eq!(session.connections().len(), 1);

    assert_eq!(session.shutdown(), 1);
    assert_eq!(session.shutdown(), 0);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(session.history().count(), 0);
    assert!(session.variable_history().is_empty());
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}

#[test]
fn screenshots_are_embedded_and_displayed() {
    let interpreter = Interpreter::new();
    interpreter.register(Library::new("Camera", "Test screenshots.").keyword(
        "Take Screenshot",
        &[],
        "Saves a screenshot next to the result log.",
        |ctx, _| {
            let path = ctx.output_dir().join("shot.png");
            fs::write(&path, png(4, 2)).map_err(|err| KeywordFailure::new(err.to_string()))?;
            ctx.log_html("INFO", r#"<a href="shot.png"><img src="shot.png" width="800px"></a>"#);
            Ok(Value::None)
        },
    ));
    let (mut session, frontend) = session_with(interpreter);

    let code = "*** Settings ***\nLibrary  Camera\n\n*** Tasks ***\nShoot\n    Take Screenshot\n";
    assert!(session.execute(code, false).is_ok());

    let run = session.last_run().expect("a run happened");
    assert_eq!(run.reduction.images.len(), 1);
    assert_eq!(run.reduction.images[0].mime, "image/png");
    assert_eq!(run.reduction.images[0].width, 4);
    assert!(!String::from_utf8_lossy(&run.log).contains(r#""reportURL":"report.html""#));

    let image = frontend.messages().into_iter().find_map(|message| match message {
        FrontendMessage::DisplayData { data, metadata, .. } if data.contains_key("image/png") => {
            Some(metadata)
        }
        _ => None,
    });
    let metadata = image.expect("screenshot displayed");
    assert_eq!(metadata["image/png"]["height"], 2);
}
