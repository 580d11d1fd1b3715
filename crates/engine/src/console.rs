//! Plain-text console report written while a run progresses.

use std::io::{self, Write};

use robotkernel_event_bus::Status;

use crate::result::Statistics;

pub const WIDTH: usize = 78;

pub(crate) struct ConsoleReport<'a> {
    out: &'a mut dyn Write,
}

impl<'a> ConsoleReport<'a> {
    pub(crate) fn new(out: &'a mut dyn Write) -> Self {
        Self { out }
    }

    pub(crate) fn suite_start(&mut self, name: &str, doc: &str) -> io::Result<()> {
        writeln!(self.out, "{}", "=".repeat(WIDTH))?;
        if doc.is_empty() {
            writeln!(self.out, "{name}")?;
        } else {
            let first = doc.lines().next().unwrap_or_default();
            writeln!(self.out, "{}", fit(&format!("{name} :: {first}"), WIDTH))?;
        }
        writeln!(self.out, "{}", "=".repeat(WIDTH))
    }

    pub(crate) fn test_end(&mut self, name: &str, status: Status, message: &str) -> io::Result<()> {
        self.status_line(name, status)?;
        if !message.is_empty() {
            writeln!(self.out, "{message}")?;
        }
        writeln!(self.out, "{}", "-".repeat(WIDTH))
    }

    pub(crate) fn suite_end(
        &mut self,
        name: &str,
        status: Status,
        message: &str,
        stats: &Statistics,
    ) -> io::Result<()> {
        self.status_line(name, status)?;
        if !message.is_empty() {
            writeln!(self.out, "{message}")?;
        }
        writeln!(self.out, "{}", stats.summary())?;
        writeln!(self.out, "{}", "=".repeat(WIDTH))
    }

    pub(crate) fn output_file(&mut self, label: &str, path: &str) -> io::Result<()> {
        writeln!(self.out, "{label:<8}{path}")
    }

    fn status_line(&mut self, name: &str, status: Status) -> io::Result<()> {
        let marker = format!("| {} |", status.as_str());
        let room = WIDTH.saturating_sub(marker.chars().count() + 1);
        writeln!(self.out, "{:<room$} {marker}", fit(name, room))
    }
}

fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_is_right_aligned() {
        let mut buffer = Vec::new();
        ConsoleReport::new(&mut buffer)
            .test_end("Get head", Status::Pass, "")
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(first.chars().count(), WIDTH);
        assert!(first.starts_with("Get head"));
        assert!(first.ends_with("| PASS |"));
    }
}
