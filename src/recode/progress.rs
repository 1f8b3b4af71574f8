use log::info;

/// Receives the completed fraction of a recode, between 0 and 1
#[cfg_attr(test, mockall::automock)]
pub trait ProgressSink {
    fn report(&mut self, fraction: f64);
}

/// Logs progress at `info`, once per whole percent
#[derive(Debug, Default)]
pub struct LogProgress {
    last_percent: Option<u32>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn report(&mut self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u32;
        if self.last_percent != Some(percent) {
            info!("recode {}% complete", percent);
            self.last_percent = Some(percent);
        }
    }
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _fraction: f64) {}
}
