use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

lazy_static! {
    pub static ref SYSTEMATIC_PAYLOADS: IntCounter = register_int_counter!(
        "rlnc_systematic_payloads_total",
        "Number of uncoded payloads written by encoders"
    )
    .unwrap();
    pub static ref CODED_PAYLOADS: IntCounter = register_int_counter!(
        "rlnc_coded_payloads_total",
        "Number of coded payloads written by encoders"
    )
    .unwrap();
    pub static ref PAYLOADS_READ: IntCounter = register_int_counter!(
        "rlnc_payloads_read_total",
        "Number of payloads accepted by decoders"
    )
    .unwrap();
    pub static ref DEPENDENT_PAYLOADS: IntCounter = register_int_counter!(
        "rlnc_dependent_payloads_total",
        "Number of linearly dependent payloads discarded by decoders"
    )
    .unwrap();
    pub static ref FRAMING_ERRORS: IntCounter = register_int_counter!(
        "rlnc_framing_errors_total",
        "Number of payloads rejected at parse time"
    )
    .unwrap();
    pub static ref DECODES_COMPLETED: IntCounter = register_int_counter!(
        "rlnc_decodes_completed_total",
        "Number of decoders that reached full rank"
    )
    .unwrap();
}

/// Renders the default registry in the prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
