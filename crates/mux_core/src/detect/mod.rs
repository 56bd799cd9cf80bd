//! Capability and hardware detection.
//!
//! [`Capabilities`] asks FFmpeg what it can do; [`GpuInfo`] asks the
//! operating system what hardware is present. The convert layer combines
//! both to elect encoders.

mod capabilities;
mod gpu;

pub use capabilities::Capabilities;
pub use gpu::GpuInfo;
