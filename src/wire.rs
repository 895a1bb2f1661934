//! Subscriber wire format
//!
//! One JSON object per metric sample, every field encoded as a string:
//!
//! ```json
//! {"msg_num":"3","delta":"0.003","count":"2","mean":"0.003","std_dev":"0.001"}
//! ```
//!
//! Integers are written in decimal; reals are fixed to three places.

use serde::{Deserialize, Serialize};

use crate::stats::MetricSample;

/// Decimal places for real-valued fields
pub const DECIMAL_PLACES: usize = 3;

/// Format a real with the fixed wire precision
#[must_use]
pub fn fixed(value: f64) -> String {
    format!("{:.*}", DECIMAL_PLACES, value)
}

/// Outbound message, one per [`MetricSample`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub msg_num: String,
    pub delta: String,
    pub count: String,
    pub mean: String,
    pub std_dev: String,
}

impl From<&MetricSample> for WireMessage {
    fn from(sample: &MetricSample) -> Self {
        Self {
            msg_num: sample.sequence_number.to_string(),
            delta: fixed(sample.delta),
            count: sample.count.to_string(),
            mean: fixed(sample.mean),
            std_dev: fixed(sample.std_dev),
        }
    }
}

impl WireMessage {
    /// Serialize to the JSON text frame sent to the subscriber
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a frame produced by [`to_json`](Self::to_json)
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Encode a sample straight to its JSON frame
pub fn encode(sample: &MetricSample) -> Result<String, serde_json::Error> {
    WireMessage::from(sample).to_json()
}
