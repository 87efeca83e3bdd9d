//! AMF (Action Message Format) encoding
//!
//! AMF is Adobe's binary serialization format used in RTMP for encoding
//! command parameters and metadata. This module implements the encoders
//! for both AMF0 (original format) and AMF3 (ActionScript 3.0 format).
//!
//! Top-level items are AMF0 items; under [`ObjectEncoding::Amf3`] each one
//! is the avmplus-object escape (0x11) followed by the AMF3 encoding.
//! Reference tables live in an [`EncodingContext`] scoped to one message
//! body, so back-reference indices never cross message boundaries.

pub mod amf0;
pub mod amf3;
pub mod context;
pub mod value;

pub use amf0::Amf0Encoder;
pub use amf3::Amf3Encoder;
pub use context::{Amf3Settings, EncodingContext, ObjectEncoding};
pub use value::{AmfObject, AmfValue, AmfVector};
