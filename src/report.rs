use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub source_format: String,
    pub target_format: String,
    pub input_bytes: u64,
    pub output_bytes: u64,
    /// Name the converter gave its output inside the scratch dir.
    pub output_name: String,
    pub converter_ms: u64,
    pub total_ms: u64,
}
