use std::backtrace::Backtrace;
use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
  pub func: Option<String>,
  pub file: Option<String>,
  pub line: Option<u32>,
  pub column: Option<u32>,
}

/// A parsed trace, split the way the diagnostics contract names the halves.
/// Native backtraces span the whole task, so `inside_task` stays `None` and
/// everything lands in `outside_task`.
#[derive(Debug, Clone, Default)]
pub struct ParsedStack {
  pub inside_task: Option<Vec<StackFrame>>,
  pub outside_task: Vec<StackFrame>,
}

impl ParsedStack {
  /// Frames in reporting order: outside first, then the task-inside slice.
  pub fn concatenated(&self) -> Vec<StackFrame> {
    let mut frames = self.outside_task.clone();
    if let Some(inside) = &self.inside_task {
      frames.extend(inside.iter().cloned());
    }
    frames
  }

  /// The slice diagnostics should prefer for a source location.
  pub fn best_frames(&self) -> &[StackFrame] {
    self.inside_task.as_deref().unwrap_or(&self.outside_task)
  }
}

/// Runs `f` under a named sentinel frame; stack parsing truncates here so
/// framework internals below the boundary never reach diagnostics.
#[inline(never)]
pub fn call_at_boundary<F, R>(f: F) -> R
where
  F: FnOnce() -> R,
{
  let result = f();
  // An empty observable keeps the frame from being folded into the caller.
  std::hint::black_box(&result);
  result
}

const BOUNDARY_MARKER: &str = "call_at_boundary";

static SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").unwrap());
static LOCATION_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\s+at\s+(.+?):(\d+)(?::(\d+))?\s*$").unwrap());

fn is_capture_machinery(func: &str) -> bool {
  func.starts_with("std::backtrace")
    || func.contains("backtrace::backtrace")
    || func.contains("isolink_buildmessage::stack::parse")
}

/// Parses the display form of a captured backtrace into frames, dropping the
/// capture machinery on top and truncating at the boundary marker.
pub fn parse_rendered(rendered: &str) -> ParsedStack {
  let mut frames = Vec::new();
  let mut current: Option<StackFrame> = None;
  let mut truncated = false;

  for line in rendered.lines() {
    if truncated {
      break;
    }
    if let Some(captures) = SYMBOL_RE.captures(line) {
      if let Some(frame) = current.take() {
        frames.push(frame);
      }
      let func = captures[1].to_string();
      if func.contains(BOUNDARY_MARKER) {
        truncated = true;
        continue;
      }
      if frames.is_empty() && is_capture_machinery(&func) {
        continue;
      }
      current = Some(StackFrame { func: Some(func), ..StackFrame::default() });
    } else if let Some(captures) = LOCATION_RE.captures(line) {
      if let Some(frame) = &mut current {
        frame.file = Some(captures[1].to_string());
        frame.line = captures[2].parse().ok();
        frame.column = captures.get(3).and_then(|c| c.as_str().parse().ok());
      }
    }
  }
  if let Some(frame) = current.take() {
    frames.push(frame);
  }
  ParsedStack { inside_task: None, outside_task: frames }
}

pub fn parse_current() -> ParsedStack {
  parse_rendered(&Backtrace::force_capture().to_string())
}

/// Best-effort parse of the backtrace an error carries. Empty when capture
/// was disabled at error-creation time.
pub fn parse_error(error: &anyhow::Error) -> ParsedStack {
  parse_rendered(&error.backtrace().to_string())
}
