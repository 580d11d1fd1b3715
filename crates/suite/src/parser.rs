use std::path::Path;

use crate::ast::{Block, File, Node, ParseIssue, Section, SectionKind, Statement};

/// Turns unit source text into an AST.
///
/// Parsers never fail: problems are recorded in the tree and surfaced by the
/// validation pass so that every error carries a line number.
pub trait UnitParser: Send + Sync {
    fn parse(&self, source: &str, curdir: &Path) -> File;
}

/// Space, tab and pipe separated plain-text format.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextParser;

impl UnitParser for PlainTextParser {
    fn parse(&self, source: &str, curdir: &Path) -> File {
        let mut file = File {
            curdir: curdir.to_path_buf(),
            sections: Vec::new(),
        };
        let mut current = Section {
            kind: SectionKind::Implicit,
            header: String::new(),
            line: 0,
            body: Vec::new(),
        };

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let mut cells = split_cells(raw);
            if cells.iter().all(String::is_empty) {
                continue;
            }

            if cells[0].starts_with('*') {
                let next = Section {
                    kind: SectionKind::from_header(&cells[0]),
                    header: cells[0].clone(),
                    line,
                    body: Vec::new(),
                };
                let finished = std::mem::replace(&mut current, next);
                if finished.kind != SectionKind::Implicit || !finished.body.is_empty() {
                    file.sections.push(finished);
                }
                continue;
            }

            if matches!(current.kind, SectionKind::Comments | SectionKind::Invalid) {
                continue;
            }

            let indented = cells[0].is_empty();
            if indented {
                cells.remove(0);
            }

            if cells.first().map(String::as_str) == Some("...") {
                cells.remove(0);
                if !continue_statement(&mut current, cells) {
                    current.body.push(Node::Error(ParseIssue {
                        line,
                        message: "Invalid syntax: no data to continue with '...'.".into(),
                    }));
                }
                continue;
            }

            if current.kind.holds_blocks() {
                if !indented {
                    let name = cells.remove(0);
                    let mut block = Block {
                        name,
                        line,
                        body: Vec::new(),
                    };
                    if !cells.is_empty() {
                        block.body.push(Statement {
                            line,
                            tokens: cells,
                        });
                    }
                    current.body.push(Node::Block(block));
                } else if let Some(Node::Block(block)) = current.body.last_mut() {
                    block.body.push(Statement {
                        line,
                        tokens: cells,
                    });
                } else {
                    current.body.push(Node::Error(ParseIssue {
                        line,
                        message: "Statement must be inside a test, task or keyword definition."
                            .into(),
                    }));
                }
            } else {
                current.body.push(Node::Statement(Statement {
                    line,
                    tokens: cells,
                }));
            }
        }

        if current.kind != SectionKind::Implicit || !current.body.is_empty() {
            file.sections.push(current);
        }
        file
    }
}

fn continue_statement(section: &mut Section, cells: Vec<String>) -> bool {
    let target = match section.body.last_mut() {
        Some(Node::Statement(statement)) => Some(statement),
        Some(Node::Block(block)) => block.body.last_mut(),
        _ => None,
    };
    match target {
        Some(statement) => {
            statement.tokens.extend(cells);
            true
        }
        None => false,
    }
}

/// Splits one physical line into data cells.
///
/// The first cell is empty when the line is indented. Comment cells and
/// everything after them are dropped.
pub fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let raw = if line.starts_with("| ") || line == "|" {
        split_pipes(line)
    } else {
        split_spaces(line)
    };

    let mut cells = Vec::with_capacity(raw.len());
    for (idx, cell) in raw.into_iter().enumerate() {
        if cell.starts_with('#') {
            break;
        }
        if cell.is_empty() && idx > 0 {
            continue;
        }
        cells.push(cell);
    }
    while cells.len() > 1 && cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    cells
}

fn split_pipes(line: &str) -> Vec<String> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix(" |").unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    let mut cells: Vec<String> = inner.split(" | ").map(|c| c.trim().to_string()).collect();
    if cells.first().is_some_and(|c| !c.is_empty()) && inner.starts_with("  ") {
        cells.insert(0, String::new());
    }
    cells
}

fn split_spaces(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut cells = Vec::new();
    if chars.first().is_some_and(|c| c.is_whitespace()) {
        cells.push(String::new());
    }
    let mut current = String::new();
    let mut idx = 0;
    while idx < chars.len() {
        let c = chars[idx];
        let next = chars.get(idx + 1).copied();
        let is_separator = c == '\t'
            || (c == ' ' && matches!(next, Some(' ') | Some('\t')))
            || (c == ' ' && next == Some('|') && matches!(chars.get(idx + 2), Some(' ') | None));
        if is_separator {
            if !current.trim().is_empty() {
                cells.push(current.trim().to_string());
            }
            current.clear();
            idx += 1;
            while idx < chars.len() {
                match chars[idx] {
                    ' ' | '\t' => idx += 1,
                    '|' if chars[idx - 1] == ' '
                        && matches!(chars.get(idx + 1), Some(' ') | None) =>
                    {
                        idx += 1
                    }
                    _ => break,
                }
            }
            continue;
        }
        current.push(c);
        idx += 1;
    }
    if !current.trim().is_empty() {
        cells.push(current.trim().to_string());
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_double_spaces_and_tabs() {
        assert_eq!(
            split_cells("${x}=  Set Variable\thello world"),
            vec!["${x}=", "Set Variable", "hello world"]
        );
    }

    #[test]
    fn indented_line_has_empty_first_cell() {
        assert_eq!(split_cells("    Log  hi"), vec!["", "Log", "hi"]);
    }

    #[test]
    fn comment_cells_are_dropped() {
        assert_eq!(split_cells("    Log  hi  # note"), vec!["", "Log", "hi"]);
        assert!(split_cells("# whole line").is_empty());
    }

    #[test]
    fn pipe_separated_lines() {
        assert_eq!(split_cells("| Log | hi |"), vec!["Log", "hi"]);
        assert_eq!(split_cells("| ${x}= | Set Variable | 1 |"), vec!["${x}=", "Set Variable", "1"]);
    }

    #[test]
    fn parses_sections_blocks_and_continuations() {
        let source = "\
*** Keywords ***
Head
    [Arguments]  ${list}
    ${value}=  Get from list
    ...  ${list}  0
    [Return]  ${value}

*** Tasks ***
Get head  Log  inline
";
        let file = PlainTextParser.parse(source, Path::new("."));
        assert_eq!(file.sections.len(), 2);
        let keyword = file.sections[0].blocks().next().unwrap();
        assert_eq!(keyword.name, "Head");
        assert_eq!(keyword.body.len(), 3);
        assert_eq!(keyword.body[1].tokens, vec!["${value}=", "Get from list", "${list}", "0"]);
        let task = file.sections[1].blocks().next().unwrap();
        assert_eq!(task.body[0].tokens, vec!["Log", "inline"]);
    }

    #[test]
    fn stray_statement_is_recorded_as_issue() {
        let file = PlainTextParser.parse("*** Test Cases ***\n    Log  orphan\n", Path::new("."));
        assert!(matches!(file.sections[0].body[0], Node::Error(ref issue) if issue.line == 2));
    }
}
