use std::sync::{Arc, LazyLock, Mutex};

/// Reported completion state of one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
  pub current: u64,
  pub end: Option<u64>,
  pub done: bool,
}

struct ProgressInner {
  title: Option<String>,
  state: Mutex<ProgressState>,
  children: Mutex<Vec<Progress>>,
}

/// Node of the process-wide progress tree. Jobs add a child task on entry
/// and mark it done on every exit path.
#[derive(Clone)]
pub struct Progress(Arc<ProgressInner>);

static ROOT: LazyLock<Progress> = LazyLock::new(|| Progress::new(None));

impl Progress {
  fn new(title: Option<String>) -> Self {
    Self(Arc::new(ProgressInner {
      title,
      state: Mutex::new(ProgressState::default()),
      children: Mutex::new(Vec::new()),
    }))
  }

  pub fn root() -> &'static Progress {
    &ROOT
  }

  pub fn add_child_task(&self, title: Option<String>) -> Progress {
    let child = Progress::new(title);
    self.0.children.lock().unwrap().push(child.clone());
    child
  }

  pub fn title(&self) -> Option<&str> {
    self.0.title.as_deref()
  }

  pub fn report_progress(&self, state: ProgressState) {
    *self.0.state.lock().unwrap() = state;
  }

  pub fn report_progress_done(&self) {
    self.0.state.lock().unwrap().done = true;
  }

  pub fn state(&self) -> ProgressState {
    *self.0.state.lock().unwrap()
  }

  pub fn is_done(&self) -> bool {
    self.state().done
  }

  pub fn children(&self) -> Vec<Progress> {
    self.0.children.lock().unwrap().clone()
  }
}

impl std::fmt::Debug for Progress {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Progress")
      .field("title", &self.0.title)
      .field("state", &self.state())
      .field("children", &self.children().len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tracks_a_task_tree() {
    let root = Progress::new(None);
    let scan = root.add_child_task(Some("scanning".into()));
    let link = root.add_child_task(Some("linking".into()));
    scan.report_progress(ProgressState { current: 3, end: Some(10), done: false });

    assert_eq!(root.children().len(), 2);
    assert_eq!(scan.state().current, 3);
    assert!(!link.is_done());
    link.report_progress_done();
    assert!(link.is_done());
  }
}
