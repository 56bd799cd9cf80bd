//! Data models for MuXolotl.
//!
//! Core enums and small value types shared across the crate:
//! - Stream and conversion mode enums
//! - Codec/hwaccel selection choices
//! - Speed profiles and audio quality levels

mod enums;

pub use enums::{
    AudioQuality, CodecChoice, CodecFamily, ConversionMode, GpuVendor, HwaccelChoice,
    SpeedProfile, StreamKind,
};
