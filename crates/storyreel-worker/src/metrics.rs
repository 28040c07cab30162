//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API process installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, histogram};
use storyreel_models::{AssetKind, AssetStatus};

/// Metric names as constants for consistency.
pub mod names {
    pub const STORIES_SUBMITTED_TOTAL: &str = "storyreel_stories_submitted_total";
    pub const STORIES_COMPLETED_TOTAL: &str = "storyreel_stories_completed_total";
    pub const STORIES_FAILED_TOTAL: &str = "storyreel_stories_failed_total";
    pub const SCENE_ASSETS_TOTAL: &str = "storyreel_scene_assets_total";
    pub const GENERATION_ATTEMPTS_TOTAL: &str = "storyreel_generation_attempts_total";
    pub const GENERATION_DURATION_SECONDS: &str = "storyreel_generation_duration_seconds";
    pub const BUDGET_REFUSALS_TOTAL: &str = "storyreel_budget_refusals_total";
}

pub fn record_story_submitted() {
    counter!(names::STORIES_SUBMITTED_TOTAL).increment(1);
}

pub fn record_story_completed(scene_count: u32) {
    let labels = [("scenes", scene_bucket(scene_count).to_string())];
    counter!(names::STORIES_COMPLETED_TOTAL, &labels).increment(1);
}

pub fn record_story_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::STORIES_FAILED_TOTAL, &labels).increment(1);
}

/// Record the terminal outcome of one scene asset.
pub fn record_asset_outcome(kind: AssetKind, status: AssetStatus) {
    let labels = [
        ("asset", kind.as_str().to_string()),
        ("status", status.as_str().to_string()),
    ];
    counter!(names::SCENE_ASSETS_TOTAL, &labels).increment(1);
}

/// Record one logical generation call and how many attempts it took.
pub fn record_generation(operation: &str, attempts: u32, succeeded: bool, duration_secs: f64) {
    let labels = [
        ("operation", operation.to_string()),
        ("outcome", if succeeded { "success" } else { "failure" }.to_string()),
    ];
    counter!(names::GENERATION_ATTEMPTS_TOTAL, &labels).increment(u64::from(attempts));
    histogram!(names::GENERATION_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_budget_refusal(capability: &str) {
    let labels = [("capability", capability.to_string())];
    counter!(names::BUDGET_REFUSALS_TOTAL, &labels).increment(1);
}

/// Coarse label so scene counts do not explode label cardinality.
fn scene_bucket(scene_count: u32) -> &'static str {
    match scene_count {
        0..=5 => "1-5",
        6..=10 => "6-10",
        11..=20 => "11-20",
        _ => "21+",
    }
}
