//! Progress indicators for long waits
//!
//! Uses `linya` for allocation-free progress bars. The only long wait in a
//! release is the distribution bot building the pull request.

use linya::{Bar, Progress};

/// Bar counting status polls against the configured maximum
pub struct PollProgress {
  progress: Progress,
  bar: Bar,
}

impl PollProgress {
  pub fn new(max_polls: u32, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(max_polls as usize, label.into());
    Self { progress, bar }
  }

  /// Record one completed poll
  pub fn inc(&mut self) {
    self.progress.inc_and_draw(&self.bar, 1);
  }

  /// Fill the bar once a result arrived early
  pub fn finish(&mut self, max_polls: u32) {
    self.progress.set_and_draw(&self.bar, max_polls as usize);
  }
}
