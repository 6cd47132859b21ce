//! Per-process CPU and memory sampling via `ps`.

use std::sync::Arc;

use serde::Serialize;

use crate::core::diagnostics::{Degradation, Diagnostics};
use crate::platform::CommandRunner;

/// Instantaneous usage percentages. Zero means "no reading", not "idle".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceSample {
    /// `%cpu` as reported by `ps`.
    pub cpu_percent: f64,
    /// `%mem` as reported by `ps`.
    pub mem_percent: f64,
}

/// Samples CPU/memory for a pid through the OS process-accounting tool.
pub struct ResourceSampler {
    runner: Arc<dyn CommandRunner>,
    diagnostics: Arc<Diagnostics>,
}

impl ResourceSampler {
    /// Sampler that runs `ps` through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            runner,
            diagnostics,
        }
    }

    /// One reading, no retry. Unparsable output reports `(0, 0)`.
    #[must_use]
    pub fn sample(&self, pid: u32) -> ResourceSample {
        let output = self.runner.run(&format!("ps -p {pid} -o %cpu,%mem"));
        if let Some(sample) = parse_ps_output(&output) {
            return sample;
        }
        self.diagnostics.record(Degradation::ResourceUnparsable);
        tracing::debug!(pid, "no usable resource reading; reporting zero");
        ResourceSample::default()
    }
}

/// First two numeric fields of the last non-empty line.
///
/// The header line (`%CPU %MEM`) alone does not parse, which is what `ps`
/// prints for a pid that no longer exists.
#[must_use]
pub fn parse_ps_output(output: &str) -> Option<ResourceSample> {
    let last = output.lines().rev().find(|line| !line.trim().is_empty())?;
    let mut fields = last.split_whitespace().map(parse_percent);
    let cpu_percent = fields.next()??;
    let mem_percent = fields.next()??;
    Some(ResourceSample {
        cpu_percent,
        mem_percent,
    })
}

/// Accepts both `1.5` and locale-formatted `1,5`.
fn parse_percent(field: &str) -> Option<f64> {
    field
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}
