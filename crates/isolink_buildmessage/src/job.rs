use std::sync::{Arc, Mutex};

use rustc_hash::FxHashSet;

use crate::stack::StackFrame;

#[derive(Debug, Clone, Default)]
pub struct JobOptions {
  pub title: Option<String>,
  /// Paths under this root render project-relative in formatted output.
  pub root_path: Option<String>,
}

impl JobOptions {
  pub fn title(title: impl Into<String>) -> Self {
    Self { title: Some(title.into()), root_path: None }
  }
}

impl From<&str> for JobOptions {
  fn from(title: &str) -> Self {
    Self::title(title)
  }
}

impl From<String> for JobOptions {
  fn from(title: String) -> Self {
    Self::title(title)
  }
}

/// One structured diagnostic inside a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildMessage {
  pub message: String,
  pub file: Option<String>,
  pub line: Option<u32>,
  pub column: Option<u32>,
  pub func: Option<String>,
  pub stack: Vec<StackFrame>,
  pub tags: Vec<String>,
}

struct JobInner {
  title: Option<String>,
  root_path: Option<String>,
  state: Mutex<JobState>,
}

#[derive(Default)]
struct JobState {
  messages: Vec<BuildMessage>,
  children: Vec<Job>,
}

/// Shared handle to one node of the job tree. Messages append in call order;
/// children in the order their jobs were entered.
#[derive(Clone)]
pub struct Job(Arc<JobInner>);

impl Job {
  pub(crate) fn new(options: &JobOptions) -> Self {
    Self(Arc::new(JobInner {
      title: options.title.clone(),
      root_path: options.root_path.clone(),
      state: Mutex::new(JobState::default()),
    }))
  }

  pub fn title(&self) -> &str {
    self.0.title.as_deref().unwrap_or("building")
  }

  pub fn root_path(&self) -> Option<&str> {
    self.0.root_path.as_deref()
  }

  pub(crate) fn add_child(&self, child: Job) {
    self.0.state.lock().unwrap().children.push(child);
  }

  pub fn push_message(&self, message: BuildMessage) {
    self.0.state.lock().unwrap().messages.push(message);
  }

  pub fn own_messages(&self) -> Vec<BuildMessage> {
    self.0.state.lock().unwrap().messages.clone()
  }

  pub fn children(&self) -> Vec<Job> {
    self.0.state.lock().unwrap().children.clone()
  }

  pub fn has_own_messages(&self) -> bool {
    !self.0.state.lock().unwrap().messages.is_empty()
  }

  /// Whether this job or any descendant carries a message.
  pub fn has_messages(&self) -> bool {
    if self.has_own_messages() {
      return true;
    }
    self.children().iter().any(Job::has_messages)
  }
}

impl std::fmt::Debug for Job {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Job")
      .field("title", &self.0.title)
      .field("messages", &self.own_messages().len())
      .field("children", &self.children().len())
      .finish()
  }
}

/// Ordered collection of every job a capture saw, flat, in entry order.
#[derive(Clone, Default, Debug)]
pub struct MessageSet {
  jobs: Arc<Mutex<Vec<Job>>>,
}

impl MessageSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn push_job(&self, job: Job) {
    self.jobs.lock().unwrap().push(job);
  }

  pub fn jobs(&self) -> Vec<Job> {
    self.jobs.lock().unwrap().clone()
  }

  pub fn has_messages(&self) -> bool {
    self.jobs().iter().any(Job::has_own_messages)
  }

  /// Takes every job of `other` into this set. The donor is only read, and
  /// must not be mutated afterwards.
  pub fn merge(&self, other: &MessageSet) {
    let mut jobs = self.jobs.lock().unwrap();
    jobs.extend(other.jobs());
  }

  pub fn format_messages(&self) -> String {
    let mut out = String::new();
    for job in self.jobs() {
      let messages = job.own_messages();
      if messages.is_empty() {
        continue;
      }
      out.push_str("While ");
      out.push_str(job.title());
      out.push_str(":\n");
      let mut seen: FxHashSet<String> = FxHashSet::default();
      for message in &messages {
        let rendered = render_message(message, job.root_path());
        if seen.insert(rendered.clone()) {
          out.push_str(&rendered);
        }
      }
      out.push('\n');
    }
    out
  }
}

fn render_message(message: &BuildMessage, root_path: Option<&str>) -> String {
  let mut rendered = String::from("  ");
  match &message.file {
    Some(file) => {
      rendered.push_str(&display_path(file, root_path));
      if let Some(line) = message.line {
        rendered.push_str(&format!(":{line}"));
        if let Some(column) = message.column {
          rendered.push_str(&format!(":{column}"));
        }
      }
      rendered.push_str(": ");
    }
    None => rendered.push_str("error: "),
  }
  rendered.push_str(&message.message);
  rendered.push('\n');
  if message.stack.len() > 1 {
    for frame in &message.stack {
      rendered.push_str(&format!(
        "  at {} ({}:{}:{})\n",
        frame.func.as_deref().unwrap_or("<anonymous>"),
        frame.file.as_deref().map(|f| display_path(f, root_path)).unwrap_or_default(),
        frame.line.unwrap_or(0),
        frame.column.unwrap_or(0),
      ));
    }
  }
  rendered
}

fn display_path(file: &str, root_path: Option<&str>) -> String {
  if let Some(root) = root_path {
    if let Some(rest) = file.strip_prefix(root) {
      return rest.trim_start_matches('/').to_string();
    }
  }
  file.to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn message(text: &str, file: Option<&str>, line: Option<u32>, column: Option<u32>) -> BuildMessage {
    BuildMessage {
      message: text.into(),
      file: file.map(str::to_string),
      line,
      column,
      ..BuildMessage::default()
    }
  }

  #[test]
  fn formats_positioned_fileless_and_file_only_messages() {
    let set = MessageSet::new();
    let job = Job::new(&JobOptions::title("processing files"));
    set.push_job(job.clone());
    job.push_message(message("Unexpected token", Some("a.js"), Some(3), Some(7)));
    job.push_message(message("no line info", Some("b.js"), None, None));
    job.push_message(message("something broke", None, None, None));

    assert_eq!(
      set.format_messages(),
      "While processing files:\n  a.js:3:7: Unexpected token\n  b.js: no line info\n  error: something broke\n\n",
    );
  }

  #[test]
  fn suppresses_exact_duplicates_within_one_job() {
    let set = MessageSet::new();
    let job = Job::new(&JobOptions::title("linking"));
    set.push_job(job.clone());
    job.push_message(message("dup", Some("a.js"), Some(1), None));
    job.push_message(message("dup", Some("a.js"), Some(1), None));
    job.push_message(message("dup", Some("a.js"), Some(2), None));

    let formatted = set.format_messages();
    assert_eq!(formatted.matches("a.js:1: dup").count(), 1);
    assert_eq!(formatted.matches("a.js:2: dup").count(), 1);
  }

  #[test]
  fn jobs_without_messages_are_invisible() {
    let set = MessageSet::new();
    set.push_job(Job::new(&JobOptions::title("quiet")));
    assert_eq!(set.format_messages(), "");
    assert!(!set.has_messages());
  }

  #[test]
  fn root_path_relativizes_files() {
    let set = MessageSet::new();
    let job = Job::new(&JobOptions {
      title: Some("compiling".into()),
      root_path: Some("/home/app".into()),
    });
    set.push_job(job.clone());
    job.push_message(message("bad", Some("/home/app/client/main.js"), Some(1), Some(1)));
    assert!(set.format_messages().contains("  client/main.js:1:1: bad\n"));
  }

  #[test]
  fn merge_takes_donor_jobs_in_order() {
    let donor = MessageSet::new();
    let job = Job::new(&JobOptions::title("inner"));
    job.push_message(message("oops", None, None, None));
    donor.push_job(job);

    let target = MessageSet::new();
    target.merge(&donor);
    assert!(target.has_messages());
    assert_eq!(target.jobs().len(), 1);
  }

  #[test]
  fn has_messages_is_transitive_over_children() {
    let parent = Job::new(&JobOptions::title("parent"));
    let child = Job::new(&JobOptions::title("child"));
    parent.add_child(child.clone());
    assert!(!parent.has_messages());
    child.push_message(message("deep", None, None, None));
    assert!(parent.has_messages());
    assert!(!parent.has_own_messages());
  }
}
