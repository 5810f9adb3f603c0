// QuicFuscate RLNC Library
//
// Block-based random linear network coding: finite-field arithmetic,
// coding-vector generation, payload framing and the incremental
// encoder/decoder pair, plus the configuration, logging and metrics
// plumbing shared with the rest of the project.

pub mod app_config;
pub mod error;
pub mod fec;
pub mod logger;
pub mod telemetry;

pub use app_config::AppConfig;
pub use error::{Result, RlncError};
pub use fec::{
    CodecConfig, CodingVectorFormat, Decoder, Encoder, EncoderState, Field, PayloadCodec,
    PayloadHeader,
};
