//! Error-accumulation and progress substrate for the linker. Work happens
//! inside nested jobs; diagnostics append to the current job instead of
//! aborting, and a capture at the outer boundary collects everything that
//! surfaced while it ran.

mod job;
mod progress;
pub mod stack;

pub use job::{BuildMessage, Job, JobOptions, MessageSet};
pub use progress::{Progress, ProgressState};
pub use stack::{ParsedStack, StackFrame};

use std::future::Future;
use std::sync::LazyLock;

use isolink_error::SourceParseError;

tokio::task_local! {
  static SCOPE: Scope;
}

/// The four dynamically-scoped values of the framework. A fresh value is
/// installed around every capture/job body; the task-local mechanism
/// restores the outer value on every exit path, panics included.
#[derive(Clone)]
struct Scope {
  message_set: Option<MessageSet>,
  current_job: Option<Job>,
  nesting_level: u32,
  progress: Progress,
}

impl Scope {
  fn current() -> Scope {
    SCOPE.try_with(Clone::clone).unwrap_or_else(|_| Scope {
      message_set: None,
      current_job: None,
      nesting_level: 0,
      progress: Progress::root().clone(),
    })
  }
}

static DEBUG_BUILD: LazyLock<bool> =
  LazyLock::new(|| std::env::var("METEOR_DEBUG_BUILD").is_ok_and(|v| !v.is_empty()));

/// Marks the progress task done and emits the `done` debug line no matter
/// how the job body exits.
struct JobGuard {
  progress: Progress,
  label: String,
  level: u32,
}

impl JobGuard {
  fn enter(progress: Progress, label: String, level: u32) -> Self {
    if *DEBUG_BUILD {
      let pad = "  ".repeat(level as usize);
      tracing::debug!("{pad}start {label}");
    }
    Self { progress, label, level }
  }
}

impl Drop for JobGuard {
  fn drop(&mut self) {
    self.progress.report_progress_done();
    if *DEBUG_BUILD {
      let pad = "  ".repeat(self.level as usize);
      tracing::debug!("{pad}done {}", self.label);
    }
  }
}

/// Runs `f` under a fresh message set and returns it together with `f`'s
/// value. An `Err` from `f` propagates after scope teardown, the same way an
/// exception would.
pub async fn capture<F, Fut, T>(
  options: impl Into<JobOptions>,
  f: F,
) -> anyhow::Result<(T, MessageSet)>
where
  F: FnOnce() -> Fut,
  Fut: Future<Output = anyhow::Result<T>>,
{
  let options = options.into();
  let outer = Scope::current();
  let message_set = MessageSet::new();
  let current_job = options.title.as_ref().map(|_| {
    let job = Job::new(&options);
    message_set.push_job(job.clone());
    job
  });
  let progress = outer.progress.add_child_task(options.title.clone());
  let label = options.title.unwrap_or_else(|| "(capture)".into());
  let scope = Scope {
    message_set: Some(message_set.clone()),
    current_job,
    nesting_level: outer.nesting_level + 1,
    progress: progress.clone(),
  };
  let guard = JobGuard::enter(progress, label, outer.nesting_level);
  let result = SCOPE.scope(scope, f()).await;
  drop(guard);
  result.map(|value| (value, message_set))
}

fn child_scope(options: &JobOptions, outer: &Scope, progress: &Progress) -> Scope {
  match &outer.message_set {
    // No capture in effect: nothing records messages, so only the progress
    // subtree and nesting level advance.
    None => Scope {
      message_set: None,
      current_job: None,
      nesting_level: outer.nesting_level + 1,
      progress: progress.clone(),
    },
    Some(set) => {
      let job = Job::new(options);
      if let Some(parent) = &outer.current_job {
        parent.add_child(job.clone());
      }
      set.push_job(job.clone());
      Scope {
        message_set: Some(set.clone()),
        current_job: Some(job),
        nesting_level: outer.nesting_level + 1,
        progress: progress.clone(),
      }
    }
  }
}

/// Runs `f` inside a child job of the current one and returns its value.
pub async fn enter_job<F, Fut, T>(options: impl Into<JobOptions>, f: F) -> T
where
  F: FnOnce() -> Fut,
  Fut: Future<Output = T>,
{
  let options = options.into();
  let outer = Scope::current();
  let progress = outer.progress.add_child_task(options.title.clone());
  let scope = child_scope(&options, &outer, &progress);
  let label = options.title.unwrap_or_else(|| "(job)".into());
  let guard = JobGuard::enter(progress, label, outer.nesting_level);
  let result = SCOPE.scope(scope, f()).await;
  drop(guard);
  result
}

/// Synchronous `enter_job` for job bodies with no suspension points.
pub fn enter_job_sync<F, T>(options: impl Into<JobOptions>, f: F) -> T
where
  F: FnOnce() -> T,
{
  let options = options.into();
  let outer = Scope::current();
  let progress = outer.progress.add_child_task(options.title.clone());
  let scope = child_scope(&options, &outer, &progress);
  let label = options.title.unwrap_or_else(|| "(job)".into());
  let guard = JobGuard::enter(progress, label, outer.nesting_level);
  let result = SCOPE.sync_scope(scope, f);
  drop(guard);
  result
}

#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
  pub file: Option<String>,
  pub line: Option<u32>,
  pub column: Option<u32>,
  pub func: Option<String>,
  /// Drop silently when the current job already surfaced something; cascade
  /// errors add noise, not signal.
  pub secondary: bool,
  /// Lowercase the first character, for messages spliced mid-sentence.
  pub downcase: bool,
  /// Take position info from the caller's stack, skipping this many extra
  /// frames beyond the framework's own two.
  pub use_my_caller: Option<usize>,
  pub tags: Vec<String>,
}

fn downcase_first(text: &mut String) {
  if let Some(first) = text.chars().next() {
    if first.is_uppercase() {
      let lowered: String = first.to_lowercase().collect();
      text.replace_range(..first.len_utf8(), &lowered);
    }
  }
}

/// Appends a message to the current job. Calling this outside a job is an
/// API-misuse invariant breach and panics.
pub fn error(message: impl Into<String>, options: MessageOptions) {
  let scope = Scope::current();
  let Some(job) = scope.current_job else {
    panic!("buildmessage::error called outside a job");
  };
  if options.secondary && job.has_messages() {
    return;
  }
  let mut text = message.into();
  if options.downcase {
    downcase_first(&mut text);
  }
  let mut message = BuildMessage {
    message: text,
    file: options.file,
    line: options.line,
    column: options.column,
    func: options.func,
    stack: Vec::new(),
    tags: options.tags,
  };
  if let Some(skip) = options.use_my_caller {
    let frames: Vec<StackFrame> =
      stack::parse_current().concatenated().into_iter().skip(2 + skip).collect();
    if let Some(top) = frames.first() {
      message.file = top.file.clone();
      message.line = top.line;
      message.column = top.column;
      message.func = top.func.clone();
    }
    message.stack = frames;
  }
  job.push_message(message);
}

/// Records a caught error against the current job. With no job active the
/// error comes back to the caller to rethrow, parse failures wrapped into a
/// located message first.
pub fn exception(error: anyhow::Error) -> anyhow::Result<()> {
  let scope = Scope::current();
  let Some(job) = scope.current_job else {
    if let Some(parse) = error.downcast_ref::<SourceParseError>() {
      let file = parse.file.as_deref().unwrap_or("<unknown>").to_string();
      let (line, column, text) = (parse.line, parse.column, parse.message.clone());
      return Err(anyhow::anyhow!("{file}:{line}:{column}: {text}"));
    }
    return Err(error);
  };

  let frames = stack::parse_error(&error).best_frames().to_vec();
  let top = frames.first().cloned();
  let message = match error.downcast_ref::<SourceParseError>() {
    Some(parse) => BuildMessage {
      message: parse.message.clone(),
      file: parse.file.clone(),
      line: Some(parse.line),
      column: Some(parse.column),
      func: top.as_ref().and_then(|frame| frame.func.clone()),
      stack: frames,
      tags: Vec::new(),
    },
    None => BuildMessage {
      message: error.to_string(),
      file: top.as_ref().and_then(|frame| frame.file.clone()),
      line: top.as_ref().and_then(|frame| frame.line),
      column: top.as_ref().and_then(|frame| frame.column),
      func: top.as_ref().and_then(|frame| frame.func.clone()),
      stack: frames,
      tags: Vec::new(),
    },
  };
  job.push_message(message);
  Ok(())
}

pub fn current_job() -> Option<Job> {
  Scope::current().current_job
}

pub fn current_message_set() -> Option<MessageSet> {
  Scope::current().message_set
}

/// Whether the current job (or any job under it) carries a message.
pub fn job_has_messages() -> bool {
  Scope::current().current_job.is_some_and(|job| job.has_messages())
}

pub fn assert_in_job() {
  assert!(Scope::current().current_job.is_some(), "expected to be in a buildmessage job");
}

pub fn assert_in_capture() {
  assert!(Scope::current().message_set.is_some(), "expected to be in a buildmessage capture");
}

/// Folds another capture's messages into the current capture, attaching the
/// donor's jobs under the current job. The donor must not be mutated after
/// the merge.
pub fn merge_messages_into_current_job(other: &MessageSet) {
  let scope = Scope::current();
  if let Some(set) = &scope.message_set {
    set.merge(other);
  }
  if let Some(job) = &scope.current_job {
    for donor_job in other.jobs() {
      job.add_child(donor_job);
    }
  }
}

/// Tags `f` so stack parsing truncates at its frame, keeping framework
/// internals out of reported traces.
pub fn mark_boundary<F, R>(f: F) -> impl FnOnce() -> R
where
  F: FnOnce() -> R,
{
  move || stack::call_at_boundary(f)
}

#[derive(Debug, Clone, Default)]
pub struct ForkJoinOptions {
  pub job: JobOptions,
  pub parallel: bool,
}

impl From<&str> for ForkJoinOptions {
  fn from(title: &str) -> Self {
    Self { job: JobOptions::title(title), parallel: true }
  }
}

impl From<JobOptions> for ForkJoinOptions {
  fn from(job: JobOptions) -> Self {
    Self { job, parallel: true }
  }
}

impl ForkJoinOptions {
  pub fn serial(title: impl Into<String>) -> Self {
    Self { job: JobOptions::title(title), parallel: false }
  }
}

/// Runs `f` over every element under a parent job, one child job each.
/// Parallel mode interleaves the children on this task; serial mode finishes
/// each element before the next starts. Errors are collected without
/// cancelling siblings, and the first one is raised once every child has
/// settled; otherwise results come back in input order.
pub async fn fork_join<I, T, F, Fut>(
  options: impl Into<ForkJoinOptions>,
  items: I,
  f: F,
) -> anyhow::Result<Vec<T>>
where
  I: IntoIterator,
  F: Fn(I::Item, usize) -> Fut,
  Fut: Future<Output = anyhow::Result<T>>,
{
  let options = options.into();
  let parallel = options.parallel;
  let child_options = options.job.clone();
  let f = &f;
  enter_job(options.job, || async move {
    let results: Vec<anyhow::Result<T>> = if parallel {
      futures::future::join_all(items.into_iter().enumerate().map(|(index, item)| {
        let child_options = child_options.clone();
        enter_job(child_options, move || f(item, index))
      }))
      .await
    } else {
      let mut collected = Vec::new();
      for (index, item) in items.into_iter().enumerate() {
        collected.push(enter_job(child_options.clone(), move || f(item, index)).await);
      }
      collected
    };

    let mut values = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
      match result {
        Ok(value) => values.push(value),
        Err(error) => {
          if first_error.is_none() {
            first_error = Some(error);
          }
        }
      }
    }
    match first_error {
      Some(error) => Err(error),
      None => Ok(values),
    }
  })
  .await
}
