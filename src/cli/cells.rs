//! Cell files: plain text split into cells by `# %%` marker lines.
//!
//! A marker may carry a cell id (`# %% [setup]`); cells without one are
//! numbered by position. Text before the first marker is a cell of its own
//! when it is not blank.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

const MARKER: &str = "# %%";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub id: String,
    pub source: String,
}

pub fn split_cell_file(text: &str) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut id: Option<String> = None;
    let mut source = String::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(MARKER) {
            push_cell(&mut cells, id.take(), &source);
            source.clear();
            id = cell_id(rest);
            continue;
        }
        source.push_str(line);
        source.push('\n');
    }
    push_cell(&mut cells, id, &source);
    cells
}

pub async fn read_cell_file(path: &Path) -> Result<Vec<Cell>> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(split_cell_file(&text)
        .into_iter()
        .map(|cell| Cell {
            id: format!("{stem}:{}", cell.id),
            source: cell.source,
        })
        .collect())
}

fn cell_id(marker_rest: &str) -> Option<String> {
    let rest = marker_rest.trim();
    rest.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .map(str::trim)
        .filter(|inner| !inner.is_empty())
        .map(str::to_string)
}

fn push_cell(cells: &mut Vec<Cell>, id: Option<String>, source: &str) {
    if source.trim().is_empty() {
        return;
    }
    let id = id.unwrap_or_else(|| (cells.len() + 1).to_string());
    cells.push(Cell {
        id,
        source: source.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_markers_and_skips_blank_cells() {
        let text = "\
# %% [setup]
*** Settings ***
Library  Collections
# %%

# %%
*** Tasks ***
Noop
    No Operation
";
        let cells = split_cell_file(text);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].id, "setup");
        assert!(cells[0].source.starts_with("*** Settings ***"));
        assert_eq!(cells[1].id, "2");
        assert!(cells[1].source.contains("No Operation"));
    }

    #[test]
    fn text_without_markers_is_one_cell() {
        let cells = split_cell_file("*** Keywords ***\nNoop\n    No Operation\n");
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].id, "1");
    }
}
