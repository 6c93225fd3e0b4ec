use serde::{Deserialize, Serialize};

/// WebSocket path pushing per-core CPU snapshots.
pub const CPUS_ENDPOINT: &str = "/realtime/cpus";
/// WebSocket path pushing RAM snapshots.
pub const RAM_ENDPOINT: &str = "/realtime/ram";

/// Instantaneous utilization percentage per logical core, in order.
///
/// Serialized as a bare JSON array of numbers, one frame per sample.
pub type CpuSnapshot = Vec<f32>;

/// Memory usage at a point in time, in bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RamSnapshot {
    pub used: u64,
    pub total: u64,
}
