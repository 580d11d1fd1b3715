//! `output.xml` and `log.html` writers.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde_json::json;

use crate::errors::{EngineError, EngineResult};
use crate::result::{BodyItem, KeywordRecord, Message, SuiteRecord, TestRecord};

/// Escapes text content: `&`, `<` and `>`.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(text: &str) -> String {
    escape_text(text)
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
}

/// Serializes a run into the machine-readable result log.
pub fn render_output(suite: &SuiteRecord, generated: &str) -> String {
    let mut xml = String::new();
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        xml,
        r#"<robot generator="robotkernel {}" generated="{}" rpa="{}" schemaversion="4">"#,
        env!("CARGO_PKG_VERSION"),
        escape_attr(generated),
        suite.rpa.is_tasks()
    );
    write_suite(&mut xml, suite);
    let stats = suite.statistics();
    let _ = writeln!(xml, "<statistics>");
    let _ = writeln!(
        xml,
        r#"<total><stat pass="{}" fail="{}" skip="0">{}</stat></total>"#,
        stats.passed,
        stats.failed,
        stats.total_label()
    );
    let _ = writeln!(xml, "</statistics>");
    let _ = writeln!(xml, "<errors>\n</errors>");
    let _ = writeln!(xml, "</robot>");
    xml
}

fn write_suite(xml: &mut String, suite: &SuiteRecord) {
    let _ = writeln!(
        xml,
        r#"<suite id="s1" name="{}" source="{}">"#,
        escape_attr(&suite.name),
        escape_attr(&suite.source)
    );
    if let Some(setup) = &suite.setup {
        write_keyword(xml, setup, Some("SETUP"));
    }
    for (idx, test) in suite.tests.iter().enumerate() {
        write_test(xml, test, idx + 1);
    }
    if let Some(teardown) = &suite.teardown {
        write_keyword(xml, teardown, Some("TEARDOWN"));
    }
    if !suite.doc.is_empty() {
        let _ = writeln!(xml, "<doc>{}</doc>", escape_text(&suite.doc));
    }
    for (name, value) in &suite.metadata {
        let _ = writeln!(
            xml,
            r#"<meta name="{}">{}</meta>"#,
            escape_attr(name),
            escape_text(value)
        );
    }
    write_status(xml, suite.status.as_str(), &suite.message, &suite.start, &suite.end);
    let _ = writeln!(xml, "</suite>");
}

fn write_test(xml: &mut String, test: &TestRecord, index: usize) {
    let _ = writeln!(
        xml,
        r#"<test id="s1-t{index}" name="{}">"#,
        escape_attr(&test.name)
    );
    if let Some(setup) = &test.setup {
        write_keyword(xml, setup, Some("SETUP"));
    }
    for keyword in &test.body {
        write_keyword(xml, keyword, None);
    }
    if let Some(teardown) = &test.teardown {
        write_keyword(xml, teardown, Some("TEARDOWN"));
    }
    if !test.doc.is_empty() {
        let _ = writeln!(xml, "<doc>{}</doc>", escape_text(&test.doc));
    }
    for tag in &test.tags {
        let _ = writeln!(xml, "<tag>{}</tag>", escape_text(tag));
    }
    write_status(xml, test.status.as_str(), &test.message, &test.start, &test.end);
    let _ = writeln!(xml, "</test>");
}

fn write_keyword(xml: &mut String, keyword: &KeywordRecord, kind: Option<&str>) {
    let _ = write!(xml, r#"<kw name="{}""#, escape_attr(&keyword.name));
    if let Some(library) = &keyword.library {
        let _ = write!(xml, r#" library="{}""#, escape_attr(library));
    }
    if let Some(kind) = kind {
        let _ = write!(xml, r#" type="{kind}""#);
    }
    let _ = writeln!(xml, ">");
    for var in &keyword.assign {
        let _ = writeln!(xml, "<var>{}</var>", escape_text(var));
    }
    for arg in &keyword.args {
        let _ = writeln!(xml, "<arg>{}</arg>", escape_text(arg));
    }
    for item in &keyword.body {
        match item {
            BodyItem::Keyword(child) => write_keyword(xml, child, None),
            BodyItem::Message(message) => write_message(xml, message),
        }
    }
    write_status(
        xml,
        keyword.status.as_str(),
        &keyword.message,
        &keyword.start,
        &keyword.end,
    );
    let _ = writeln!(xml, "</kw>");
}

fn write_message(xml: &mut String, message: &Message) {
    let html = if message.html { r#" html="true""# } else { "" };
    let _ = writeln!(
        xml,
        r#"<msg timestamp="{}" level="{}"{html}>{}</msg>"#,
        escape_attr(&message.timestamp),
        escape_attr(&message.level),
        escape_text(&message.text)
    );
}

fn write_status(xml: &mut String, status: &str, message: &str, start: &str, end: &str) {
    let _ = write!(
        xml,
        r#"<status status="{status}" starttime="{}" endtime="{}""#,
        escape_attr(start),
        escape_attr(end)
    );
    if message.is_empty() {
        let _ = writeln!(xml, "/>");
    } else {
        let _ = writeln!(xml, ">{}</status>", escape_text(message));
    }
}

pub fn write_output(path: &Path, suite: &SuiteRecord, generated: &str) -> EngineResult<()> {
    fs::write(path, render_output(suite, generated)).map_err(|source| EngineError::Output {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders a self-contained HTML log embedding the result log.
pub fn render_log(output_xml: &str, title: &str, rpa: bool) -> String {
    let settings = json!({
        "title": title,
        "rpa": rpa,
        "reportURL": "report.html",
        "background": {"pass": "#97bd61", "fail": "#ce3e01"},
    });
    // `</script` inside the payload would end the embedding element early.
    let embedded = output_xml.replace("</script", "<\\/script");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title} Log</title>
<script type="text/javascript">
window.settings = {settings};
</script>
<script type="text/xml" id="output">
{embedded}
</script>
</head>
<body>
<div id="log">
<h1>{title} Log</h1>
<pre id="output-view"></pre>
</div>
<script type="text/javascript">
document.getElementById("output-view").textContent =
  document.getElementById("output").textContent;
</script>
</body>
</html>
"#,
        title = escape_text(title),
    )
}

pub fn write_log(output: &Path, log: &Path, title: &str, rpa: bool) -> EngineResult<()> {
    let xml = fs::read_to_string(output).map_err(|source| EngineError::Input {
        path: output.to_path_buf(),
        source,
    })?;
    fs::write(log, render_log(&xml, title, rpa)).map_err(|source| EngineError::Output {
        path: log.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_in_text() {
        assert_eq!(
            escape_text(r#"<img src="a.png"> & more"#),
            r#"&lt;img src="a.png"&gt; &amp; more"#
        );
        assert_eq!(escape_attr(r#"say "hi""#), "say &quot;hi&quot;");
    }

    #[test]
    fn log_embeds_report_url() {
        let html = render_log("<robot></robot>", "Lab", true);
        assert!(html.contains(r#""reportURL":"report.html""#));
        assert!(html.contains("<robot></robot>"));
    }
}
