use std::sync::Arc;

use parking_lot::Mutex;
use robotkernel_core_types::DisplayId;
use robotkernel_event_bus::{Phase, Scope, Status, StatusEvent};

use crate::frontend::{bundle, Frontend, MimeBundle};

#[derive(Debug, Default)]
struct ProgressState {
    shown: bool,
    suite: String,
    test: Option<String>,
    keywords: Vec<String>,
    passed: usize,
    failed: usize,
}

/// Live progress element of a run, updated in place from status events.
pub struct ProgressUpdater {
    frontend: Arc<dyn Frontend>,
    display_id: DisplayId,
    state: Mutex<ProgressState>,
}

impl ProgressUpdater {
    pub fn new(frontend: Arc<dyn Frontend>, display_id: DisplayId) -> Self {
        Self {
            frontend,
            display_id,
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn update(&self, event: &StatusEvent) {
        let mut state = self.state.lock();
        match (event.scope, event.phase) {
            (Scope::Suite, Phase::Start) => state.suite = event.name.clone(),
            (Scope::Suite, Phase::End) => {
                state.test = None;
                state.keywords.clear();
            }
            (Scope::Test, Phase::Start) => {
                state.test = Some(event.name.clone());
                state.keywords.clear();
            }
            (Scope::Test, Phase::End) => {
                match event.status {
                    Some(Status::Pass) => state.passed += 1,
                    Some(Status::Fail) => state.failed += 1,
                    _ => {}
                }
                state.test = None;
            }
            (Scope::Keyword, Phase::Start) => state.keywords.push(event.name.clone()),
            (Scope::Keyword, Phase::End) => {
                state.keywords.pop();
            }
        }

        let data = bundle("text/html", render(&state));
        if state.shown {
            self.frontend
                .send_update_display_data(data, MimeBundle::new(), &self.display_id);
        } else {
            state.shown = true;
            self.frontend
                .send_display_data(data, MimeBundle::new(), Some(&self.display_id));
        }
    }
}

fn render(state: &ProgressState) -> String {
    let mut trail = vec![escape(&state.suite)];
    trail.extend(state.test.iter().map(|test| escape(test)));
    trail.extend(state.keywords.iter().map(|kw| escape(kw)));
    format!(
        "<div class=\"robotkernel-progress\"><span>{}</span> \
         <span style=\"color:green\">{} passed</span> \
         <span style=\"color:red\">{} failed</span></div>",
        trail.join(" › "),
        state.passed,
        state.failed
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
