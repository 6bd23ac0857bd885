use crate::core::{Stage, StageReport};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Runs pipeline stages in order, stopping at the first stage that errors.
pub struct EtlEngine {
    stages: Vec<Box<dyn Stage>>,
    monitor: SystemMonitor,
}

impl EtlEngine {
    pub fn new() -> Self {
        Self::new_with_monitoring(false)
    }

    pub fn new_with_monitoring(monitor_enabled: bool) -> Self {
        Self {
            stages: Vec::new(),
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self) -> Result<Vec<(&'static str, StageReport)>> {
        tracing::info!("🚀 Starting pipeline with {} stage(s)", self.stages.len());
        self.monitor.log_stats("Start");

        let mut reports = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            tracing::info!("▶️  Stage '{}' started", stage.name());

            let report = stage.run().await.inspect_err(|e| {
                tracing::error!("❌ Stage '{}' aborted: {}", stage.name(), e);
            })?;

            tracing::info!(
                "✅ Stage '{}' finished: {} processed, {} succeeded, {} failed",
                stage.name(),
                report.processed,
                report.succeeded,
                report.failed
            );
            self.monitor.log_stats(stage.name());
            reports.push((stage.name(), report));
        }

        self.monitor.log_final_stats();
        Ok(reports)
    }
}

impl Default for EtlEngine {
    fn default() -> Self {
        Self::new()
    }
}
