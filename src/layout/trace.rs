use std::env;
use std::fs;

use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::geometry::Point;
use crate::graph::VertexId;

use super::async_::Outcome;

/// Setting this to a file path makes every asynchronous pass dump its
/// per-iteration positions as JSON on completion.
pub const TRACE_ENV_VAR: &str = "NETLAY_TRACE_JSON";

#[derive(Serialize)]
struct LocationRecord {
    vertex: usize,
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct IterationRecord {
    iteration: usize,
    locations: Vec<LocationRecord>,
}

/// Collects iteration snapshots during a pass; inert unless the trace env var
/// is set, so the recording cost in the normal path is one `Option` check.
pub(crate) struct IterationTrace {
    path: Option<String>,
    iterations: Vec<IterationRecord>,
}

impl IterationTrace {
    pub(crate) fn from_env() -> Self {
        IterationTrace {
            path: env::var(TRACE_ENV_VAR).ok(),
            iterations: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, iteration: usize, locations: &[(VertexId, Point)]) {
        if self.path.is_none() {
            return;
        }
        self.iterations.push(IterationRecord {
            iteration,
            locations: locations
                .iter()
                .map(|(id, point)| LocationRecord {
                    vertex: id.index(),
                    x: point.x,
                    y: point.y,
                })
                .collect(),
        });
    }

    pub(crate) fn write(&mut self, outcome: &Outcome) {
        let Some(path) = self.path.take() else {
            return;
        };
        let outcome_label = match outcome {
            Outcome::Completed => "completed".to_string(),
            Outcome::Cancelled => "cancelled".to_string(),
            Outcome::Failed(error) => format!("failed: {error}"),
        };
        let trace_json = json!({
            "outcome": outcome_label,
            "iterations": self.iterations,
        });
        match serde_json::to_string_pretty(&trace_json) {
            Ok(serialized) => {
                if let Err(error) = fs::write(&path, serialized) {
                    warn!(%path, %error, "failed to write layout trace");
                }
            }
            Err(error) => warn!(%error, "failed to serialize layout trace"),
        }
    }
}
