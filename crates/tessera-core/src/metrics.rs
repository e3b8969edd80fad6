//! Codec metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the host
//! installs a recorder.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::handler::HandlerKind;

/// Encode calls, by protocol, format and outcome.
pub const ENCODE_TOTAL: &str = "tessera_encode_total";

/// Decode calls, by protocol, format and outcome.
pub const DECODE_TOTAL: &str = "tessera_decode_total";

/// Encode/decode duration histogram.
pub const CODEC_DURATION: &str = "tessera_codec_duration_seconds";

/// Lookups that matched no handler.
pub const RESOLUTION_MISS: &str = "tessera_resolution_miss_total";

static DESCRIBED: OnceLock<()> = OnceLock::new();

/// Registers metric descriptions. Repeated calls are no-ops.
pub fn describe_metrics() {
    DESCRIBED.get_or_init(|| {
        describe_counter!(ENCODE_TOTAL, "Total dataset encode calls");
        describe_counter!(DECODE_TOTAL, "Total dataset decode calls");
        describe_histogram!(CODEC_DURATION, "Duration of encode/decode calls in seconds");
        describe_counter!(RESOLUTION_MISS, "Total handler lookups without a match");
    });
}

/// Outcome label for a codec call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handler returned a value.
    Success,
    /// No handler matched.
    Unresolved,
    /// The handler failed.
    Failure,
}

impl Outcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unresolved => "unresolved",
            Self::Failure => "failure",
        }
    }
}

/// Records one encode or decode call.
pub fn record_codec_call(
    kind: HandlerKind,
    protocol: &str,
    format: &str,
    outcome: Outcome,
    elapsed: Duration,
) {
    let name = match kind {
        HandlerKind::Encoder => ENCODE_TOTAL,
        HandlerKind::Decoder => DECODE_TOTAL,
    };
    let labels = [
        ("protocol", protocol.to_string()),
        ("format", format.to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];
    counter!(name, &labels).increment(1);
    histogram!(CODEC_DURATION, "op" => kind.as_str()).record(elapsed.as_secs_f64());
}

/// Records a lookup miss.
pub fn record_resolution_miss(kind: HandlerKind) {
    counter!(RESOLUTION_MISS, "kind" => kind.as_str()).increment(1);
}
