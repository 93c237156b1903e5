use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// 连通性检测期间的等待动画，关闭时所有方法都是空操作
pub struct ProbeSpinner {
    bar: Option<ProgressBar>,
}

impl ProbeSpinner {
    pub fn new(enabled: bool, message: String) -> Self {
        if !enabled {
            return Self { bar: None };
        }

        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar: Some(bar) }
    }

    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for ProbeSpinner {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_is_inert() {
        let spinner = ProbeSpinner::new(false, "检测中".to_string());
        assert!(!spinner.is_enabled());
        spinner.finish();
    }

    #[test]
    fn test_enabled_spinner_finishes() {
        let spinner = ProbeSpinner::new(true, "检测中".to_string());
        assert!(spinner.is_enabled());
        spinner.finish();
    }
}
