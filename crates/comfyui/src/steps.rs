//! Per-node step weighting for workflow progress.
//!
//! ComfyUI reports progress per node as a raw `(value, max)` pair, which
//! is meaningless to a user when a workflow chains several step-bearing
//! nodes. [`StepTable`] pre-computes each node's expected step count from
//! the workflow definition so that observed progress can be rescaled into
//! one aggregate percentage.

use std::collections::HashMap;

use serde_json::Value;

/// Expected and observed step counts for one submitted workflow.
#[derive(Debug, Clone)]
pub struct StepTable {
    /// Expected step count per node id.
    node_steps: HashMap<String, f64>,
    /// Sum of all expected steps.
    total_steps: f64,
    /// Latest observed step count per node, clamped to that node's total.
    node_progress: HashMap<String, f64>,
}

impl StepTable {
    /// Analyze a workflow definition and build the weighting table.
    ///
    /// Every node with a finite positive `inputs.steps` contributes to a
    /// generic table. Sampler-class nodes (`class_type` matching
    /// `ksampler`, case-insensitive) additionally contribute to a
    /// sampler-only table. When the sampler-only total is positive it is
    /// authoritative — the samplers are the nodes doing the iterative
    /// work, and counting loaders or upscalers alongside them skews the
    /// percentage. Otherwise the generic table is used.
    pub fn from_workflow(workflow: &Value) -> Self {
        let mut node_steps = HashMap::new();
        let mut sampler_steps = HashMap::new();
        let mut total = 0.0;
        let mut sampler_total = 0.0;

        if let Some(nodes) = workflow.as_object() {
            for (node_id, node) in nodes {
                let Some(steps) = node
                    .get("inputs")
                    .and_then(|i| i.get("steps"))
                    .and_then(|s| s.as_f64())
                    .filter(|s| s.is_finite() && *s > 0.0)
                else {
                    continue;
                };

                node_steps.insert(node_id.clone(), steps);
                total += steps;

                let is_sampler = node
                    .get("class_type")
                    .and_then(|c| c.as_str())
                    .is_some_and(|c| c.to_lowercase().contains("ksampler"));
                if is_sampler {
                    sampler_steps.insert(node_id.clone(), steps);
                    sampler_total += steps;
                }
            }
        }

        let (node_steps, total_steps) = if sampler_total > 0.0 {
            (sampler_steps, sampler_total)
        } else {
            (node_steps, total)
        };

        Self {
            node_steps,
            total_steps,
            node_progress: HashMap::new(),
        }
    }

    /// Sum of all expected steps in the authoritative table.
    pub fn total_steps(&self) -> f64 {
        self.total_steps
    }

    /// Expected step count for a node, if it is weighted.
    pub fn node_total(&self, node_id: &str) -> Option<f64> {
        self.node_steps.get(node_id).copied()
    }

    /// Record an observed `(value, max)` progress pair for a node and
    /// return the new aggregate percentage.
    ///
    /// The observed value is rescaled to the node's expected step count
    /// (`value / max * node_total`) and clamped to `[0, node_total]`.
    /// Returns `None` when the node is not in the weighted table, the
    /// value is not finite, or the table has no steps at all — callers
    /// then fall back to the raw `value / max` ratio.
    pub fn record(&mut self, node_id: &str, value: f64, max: f64) -> Option<f64> {
        let node_total = self.node_total(node_id)?;
        if !value.is_finite() {
            return None;
        }

        let normalized = if max.is_finite() && max > 0.0 && max != node_total {
            value / max * node_total
        } else {
            value
        };
        let clamped = normalized.clamp(0.0, node_total);
        self.node_progress.insert(node_id.to_string(), clamped);

        if self.total_steps <= 0.0 {
            return None;
        }
        let done: f64 = self.node_progress.values().sum();
        Some(done / self.total_steps * 100.0)
    }
}
