//! Workflow Document Parser
//!
//! Reads markdown workflow documents and splits them into steps.
//!
//! Step boundaries are `### Step N: Title` headings. Everything up to the
//! next such heading belongs to the step, including headings, fences and
//! markers that appear inside fenced code: while any fenced block is open
//! no header or marker is recognised.
//!
//! Two single-line markers change a step's kind:
//!
//! - `<!-- workflow:name -->` makes it a nested-workflow reference
//! - `<!-- loop:var -->` makes it a loop; the fenced block right after the
//!   marker holds the discovery command

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::model::{StepKind, WorkflowStep};
use crate::error::{Error, Result};

/// File extension of workflow documents.
pub const DOCUMENT_EXTENSION: &str = "md";

static STEP_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^###[ \t]+Step[ \t]+(\d+):[ \t]*(.+?)[ \t]*$").unwrap());

static WORKFLOW_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*<!--\s*workflow:\s*([A-Za-z0-9_./-]+)\s*-->\s*$").unwrap()
});

static LOOP_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*<!--\s*loop:\s*([A-Za-z_][A-Za-z0-9_]*)\s*-->\s*$").unwrap());

/// Tracks how deep we are inside fenced code blocks.
///
/// Each open block is remembered by its fence character and run length.
/// A bare fence closes the innermost open block that uses the same
/// character and is no longer than the fence, along with any blocks
/// opened inside it. Every other fence line opens a new block, so a
/// shorter or different-character fence inside a block never closes it.
#[derive(Debug, Default, Clone)]
pub struct FenceTracker {
    open: Vec<(char, usize)>,
}

impl FenceTracker {
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn is_inside(&self) -> bool {
        !self.open.is_empty()
    }

    /// Updates the open blocks for `line`. Returns true if the line is a fence.
    pub fn observe(&mut self, line: &str) -> bool {
        let Some(fence) = parse_fence(line) else {
            return false;
        };

        let closed = if fence.info.is_empty() {
            self.open
                .iter()
                .rposition(|&(ch, len)| ch == fence.ch && fence.run >= len)
        } else {
            None
        };

        match closed {
            Some(index) => self.open.truncate(index),
            None => self.open.push((fence.ch, fence.run)),
        }
        true
    }
}

/// A ``` or ~~~ fence line.
struct Fence<'a> {
    ch: char,
    run: usize,
    info: &'a str,
}

fn parse_fence(line: &str) -> Option<Fence<'_>> {
    let trimmed = line.trim_start();
    for ch in ['`', '~'] {
        let run = trimmed.chars().take_while(|c| *c == ch).count();
        if run >= 3 {
            return Some(Fence {
                ch,
                run,
                info: trimmed[run..].trim(),
            });
        }
    }
    None
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    description: Option<String>,
}

/// A parsed workflow document.
#[derive(Debug, Clone)]
pub struct WorkflowDocument {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

/// Accumulates one step while scanning.
struct StepBuilder {
    step: WorkflowStep,
    lines: Vec<String>,
    has_marker: bool,
}

impl StepBuilder {
    fn new(title: &str, workflow: &str, line_number: usize) -> Self {
        Self {
            step: WorkflowStep::new(title, workflow, line_number),
            lines: Vec::new(),
            has_marker: false,
        }
    }

    fn set_kind(&mut self, kind: StepKind) -> Result<()> {
        if self.has_marker {
            return Err(Error::MarkerConflict {
                workflow: self.step.source_workflow.clone(),
                step: self.step.name.clone(),
                line: self.step.line_number,
            });
        }
        self.has_marker = true;
        self.step.kind = kind;
        Ok(())
    }

    fn finish(self) -> WorkflowStep {
        let start = self.lines.iter().position(|l| !l.trim().is_empty());
        let end = self.lines.iter().rposition(|l| !l.trim().is_empty());

        let body = match (start, end) {
            (Some(start), Some(end)) => self.lines[start..=end].join("\n"),
            _ => String::new(),
        };

        self.step.with_body(body)
    }
}

/// Parses the text of a workflow document.
///
/// # Example
///
/// ```
/// use workflat::workflow::parser::parse_document;
/// use workflat::workflow::StepKind;
///
/// let doc = parse_document("release", "### Step 1: Build\nRun the build.\n").unwrap();
/// assert_eq!(doc.steps.len(), 1);
/// assert_eq!(doc.steps[0].kind, StepKind::Task);
/// assert_eq!(doc.steps[0].body, "Run the build.");
/// ```
pub fn parse_document(name: &str, content: &str) -> Result<WorkflowDocument> {
    let lines: Vec<&str> = content.lines().collect();
    let (description, start) = split_front_matter(name, &lines);

    let mut steps = Vec::new();
    let mut current: Option<StepBuilder> = None;
    let mut fence = FenceTracker::default();
    let mut i = start;

    while i < lines.len() {
        let line = lines[i];

        if !fence.is_inside() {
            if let Some(caps) = STEP_HEADER.captures(line) {
                if let Some(builder) = current.take() {
                    steps.push(builder.finish());
                }
                debug!("{}:{}: step {} '{}'", name, i + 1, &caps[1], &caps[2]);
                current = Some(StepBuilder::new(&caps[2], name, i + 1));
                i += 1;
                continue;
            }

            if let Some(builder) = current.as_mut() {
                if let Some(caps) = WORKFLOW_MARKER.captures(line) {
                    builder.set_kind(StepKind::NestedWorkflow {
                        target: caps[1].to_string(),
                    })?;
                    i += 1;
                    continue;
                }

                if let Some(caps) = LOOP_MARKER.captures(line) {
                    let (command, next) = read_command_block(&lines, i + 1);
                    if command.is_none() {
                        warn!(
                            "{}:{}: loop marker without a command block",
                            name,
                            i + 1
                        );
                    }
                    builder.set_kind(StepKind::Loop {
                        command: command.unwrap_or_default(),
                        variable: caps[1].to_string(),
                    })?;
                    i = next;
                    continue;
                }
            }
        }

        fence.observe(line);
        if let Some(builder) = current.as_mut() {
            builder.lines.push(line.to_string());
        }
        i += 1;
    }

    if let Some(builder) = current.take() {
        steps.push(builder.finish());
    }

    if fence.is_inside() {
        warn!("Workflow '{}' ends inside an unclosed code fence", name);
    }

    Ok(WorkflowDocument {
        name: name.to_string(),
        description,
        steps,
    })
}

/// Splits off a leading `---` front matter block.
///
/// Returns the description (if any) and the index of the first content line.
fn split_front_matter(name: &str, lines: &[&str]) -> (Option<String>, usize) {
    if lines.first().map(|l| l.trim()) != Some("---") {
        return (None, 0);
    }

    let Some(end) = lines.iter().skip(1).position(|l| l.trim() == "---") else {
        return (None, 0);
    };
    let end = end + 1;

    // A leading `---` may just be a horizontal rule; only a YAML mapping
    // counts as front matter.
    let yaml = lines[1..end].join("\n");
    let mapping = match serde_yaml::from_str::<serde_yaml::Value>(&yaml) {
        Ok(value @ serde_yaml::Value::Mapping(_)) => value,
        _ => {
            debug!("'{}' starts with a rule, not front matter", name);
            return (None, 0);
        }
    };

    let front_matter: FrontMatter = serde_yaml::from_value(mapping).unwrap_or_else(|e| {
        warn!("Ignoring malformed front matter in '{}': {}", name, e);
        FrontMatter::default()
    });

    (front_matter.description, end + 1)
}

/// Reads the fenced command block following a loop marker.
///
/// Blank lines between the marker and the fence are skipped. Returns the
/// command text and the index of the line after the closing fence. When
/// no fence follows, returns `None` and leaves `from` unconsumed.
fn read_command_block(lines: &[&str], from: usize) -> (Option<String>, usize) {
    let mut i = from;
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }

    if i >= lines.len() || parse_fence(lines[i]).is_none() {
        return (None, from);
    }

    let mut fence = FenceTracker::default();
    fence.observe(lines[i]);
    i += 1;

    let mut command = Vec::new();
    while i < lines.len() {
        let line = lines[i];
        i += 1;
        fence.observe(line);
        if !fence.is_inside() {
            break;
        }
        command.push(line);
    }

    (Some(command.join("\n").trim().to_string()), i)
}

/// Summary of one document in the library.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSummary {
    pub name: String,
    pub description: Option<String>,
    pub path: PathBuf,
}

/// A directory of `<name>.md` workflow documents.
#[derive(Debug, Clone)]
pub struct WorkflowLibrary {
    root: PathBuf,
}

impl WorkflowLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document backing `name`.
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, DOCUMENT_EXTENSION))
    }

    /// Reads and parses the document for `name`.
    pub fn load(&self, name: &str) -> Result<WorkflowDocument> {
        let path = self.document_path(name);

        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::DocumentNotFound {
                name: name.to_string(),
                path: path.clone(),
            },
            _ => Error::DocumentRead {
                path: path.clone(),
                source: e,
            },
        })?;

        debug!("Read {} ({} bytes)", path.display(), content.len());

        let document = parse_document(name, &content)?;
        debug!("Workflow '{}': {} steps", name, document.steps.len());
        Ok(document)
    }

    /// Parses `name` into its ordered steps.
    pub fn parse(&self, name: &str) -> Result<Vec<WorkflowStep>> {
        Ok(self.load(name)?.steps)
    }

    /// Lists every workflow document, sorted by name.
    ///
    /// A missing root directory yields an empty list.
    pub fn list(&self) -> Result<Vec<WorkflowSummary>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Workflow directory {} does not exist", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::DocumentRead {
                    path: self.root.clone(),
                    source: e,
                })
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION)
            {
                continue;
            }

            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let description = match fs::read_to_string(&path) {
                Ok(content) => {
                    let lines: Vec<&str> = content.lines().collect();
                    split_front_matter(name, &lines).0
                }
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    None
                }
            };

            summaries.push(WorkflowSummary {
                name: name.to_string(),
                description,
                path: path.clone(),
            });
        }

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        info!(
            "Found {} workflows in {}",
            summaries.len(),
            self.root.display()
        );
        Ok(summaries)
    }
}
