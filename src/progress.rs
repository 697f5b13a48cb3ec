//! Progress indicators for glrecon.

use crate::ui;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{ChangeResult, ProgressCallback};
use std::time::Duration;

/// Spinner for work of unknown length
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Progress bar over the changes of an apply
#[derive(Default)]
pub struct ApplyProgress {
    bar: Option<ProgressBar>,
}

impl ApplyProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_batch_start(&mut self, count: usize) {
        let pb = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(pb);
    }

    fn on_change_start(&mut self, address: &str, action: &str) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("{action} {address}"));
        }
    }

    fn on_change_complete(&mut self, address: &str, result: &ChangeResult) {
        let line = format!(
            "  {} {} {}",
            ui::result_symbol(result),
            address,
            ui::result_label(result)
        );
        match &self.bar {
            Some(pb) => {
                pb.println(line);
                pb.inc(1);
            }
            None => println!("{line}"),
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}
