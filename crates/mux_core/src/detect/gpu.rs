//! GPU detection for hardware encoder selection.
//!
//! Queries the platform's device listing tool (wmic on Windows, lspci
//! on Linux, system_profiler on macOS) and matches vendor keywords.
//! The result drives encoder priority lists and the default hwaccel
//! recommendation.

use std::process::Command;

use crate::models::{CodecFamily, GpuVendor};

/// Detected GPUs and their model strings.
#[derive(Debug, Clone, Default)]
pub struct GpuInfo {
    pub nvidia: bool,
    pub amd: bool,
    pub intel: bool,
    pub apple: bool,
    pub nvidia_model: Option<String>,
    pub amd_model: Option<String>,
    pub intel_model: Option<String>,
}

impl GpuInfo {
    /// Detect GPUs on the current system.
    pub fn detect() -> Self {
        let mut info = GpuInfo::default();

        match std::env::consts::OS {
            "windows" => info.detect_windows(),
            "macos" => info.detect_macos(),
            "linux" => info.detect_linux(),
            _ => {}
        }

        let detected = info.detected_vendors();
        if detected.is_empty() {
            tracing::warn!("no discrete GPU detected");
        } else {
            let names: Vec<String> = detected.iter().map(|v| v.to_string()).collect();
            tracing::info!("detected GPUs: {}", names.join(", "));
        }

        info
    }

    fn detect_windows(&mut self) {
        let Some(output) = run_tool("wmic", &["path", "win32_VideoController", "get", "name"])
        else {
            tracing::debug!("wmic detection failed");
            return;
        };

        let lowered = output.to_ascii_lowercase();

        if ["nvidia", "geforce", "quadro", "rtx"]
            .iter()
            .any(|k| lowered.contains(k))
        {
            self.nvidia = true;
            self.nvidia_model =
                find_model_line(&output, &["nvidia", "geforce", "rtx", "gtx"], |_| true);
        }

        if ["amd", "radeon", "rx "].iter().any(|k| lowered.contains(k)) {
            self.amd = true;
            self.amd_model = find_model_line(&output, &["amd", "radeon", "rx "], |_| true);
        }

        if (lowered.contains("intel") && lowered.contains("hd"))
            || lowered.contains("iris")
            || lowered.contains("arc")
        {
            self.intel = true;
            self.intel_model = find_model_line(&output, &["intel"], |_| true);
        }
    }

    fn detect_linux(&mut self) {
        let Some(output) = run_tool("lspci", &[]) else {
            tracing::debug!("lspci detection failed");
            return;
        };

        let lowered = output.to_ascii_lowercase();

        if lowered.contains("nvidia") {
            self.nvidia = true;
            self.nvidia_model = find_model_line(&output, &["nvidia"], is_vga_line)
                .map(|line| device_name_from_lspci(&line));
        }

        if lowered.contains("amd") || lowered.contains("radeon") {
            self.amd = true;
            self.amd_model = find_model_line(&output, &["amd", "radeon"], is_vga_line)
                .map(|line| device_name_from_lspci(&line));
        }

        if lowered.contains("intel") {
            self.intel = true;
        }
    }

    fn detect_macos(&mut self) {
        let Some(output) = run_tool("system_profiler", &["SPDisplaysDataType"]) else {
            return;
        };

        let lowered = output.to_ascii_lowercase();

        self.amd = lowered.contains("amd") || lowered.contains("radeon");
        self.nvidia = lowered.contains("nvidia");
        self.intel = lowered.contains("intel");
        self.apple = ["apple", "m1", "m2", "m3"].iter().any(|k| lowered.contains(k));
    }

    /// All vendors that were detected.
    pub fn detected_vendors(&self) -> Vec<GpuVendor> {
        let mut vendors = Vec::new();
        if self.nvidia {
            vendors.push(GpuVendor::Nvidia);
        }
        if self.amd {
            vendors.push(GpuVendor::Amd);
        }
        if self.intel {
            vendors.push(GpuVendor::Intel);
        }
        if self.apple {
            vendors.push(GpuVendor::Apple);
        }
        vendors
    }

    /// Whether any hardware encoding vendor is present.
    pub fn has_hardware(&self) -> bool {
        self.nvidia || self.amd || self.intel || self.apple
    }

    /// Encoder names for a codec family, ordered hardware-first by
    /// detected vendor, always ending with the software fallback.
    pub fn encoder_priority(&self, family: CodecFamily) -> Vec<&'static str> {
        let mut encoders = Vec::new();

        match family {
            CodecFamily::H264 => {
                if self.nvidia {
                    encoders.push("h264_nvenc");
                }
                if self.amd {
                    encoders.push("h264_amf");
                }
                if self.intel {
                    encoders.push("h264_qsv");
                }
                if self.apple {
                    encoders.push("h264_videotoolbox");
                }
                encoders.push("libx264");
            }
            CodecFamily::Hevc => {
                if self.nvidia {
                    encoders.push("hevc_nvenc");
                }
                if self.amd {
                    encoders.push("hevc_amf");
                }
                if self.intel {
                    encoders.push("hevc_qsv");
                }
                if self.apple {
                    encoders.push("hevc_videotoolbox");
                }
                encoders.push("libx265");
            }
            CodecFamily::Vp9 => {
                if self.intel {
                    encoders.push("vp9_qsv");
                }
                encoders.push("libvpx-vp9");
            }
            CodecFamily::Av1 => {
                if self.nvidia {
                    encoders.push("av1_nvenc");
                }
                if self.intel {
                    encoders.push("av1_qsv");
                }
                if self.amd {
                    encoders.push("av1_amf");
                }
                encoders.push("libsvtav1");
                encoders.push("libaom-av1");
            }
        }

        encoders
    }

    /// Recommended decode acceleration for the detected hardware.
    pub fn recommended_hwaccel(&self) -> Option<&'static str> {
        if self.nvidia {
            return Some("cuda");
        }
        if self.intel {
            return Some("qsv");
        }
        if self.amd {
            // d3d11va handles AMD decode better than vaapi on Windows
            if cfg!(target_os = "windows") {
                return Some("d3d11va");
            }
            return Some("vaapi");
        }
        if self.apple {
            return Some("videotoolbox");
        }
        None
    }

    /// Human-readable GPU summary.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.nvidia {
            parts.push(format!(
                "NVIDIA: {}",
                self.nvidia_model.as_deref().unwrap_or("GPU")
            ));
        }
        if self.amd {
            parts.push(format!("AMD: {}", self.amd_model.as_deref().unwrap_or("GPU")));
        }
        if self.intel {
            parts.push(format!(
                "Intel: {}",
                self.intel_model.as_deref().unwrap_or("iGPU")
            ));
        }
        if self.apple {
            parts.push("Apple Silicon".to_string());
        }

        if parts.is_empty() {
            return "CPU only".to_string();
        }

        parts.join(" | ")
    }
}

/// Run a detection tool, returning stdout on success.
fn run_tool(name: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(name).args(args).output().ok()?;
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Find the first line matching any of the keywords (case-insensitive)
/// and an additional line predicate.
fn find_model_line(output: &str, keywords: &[&str], extra: fn(&str) -> bool) -> Option<String> {
    output
        .lines()
        .find(|line| {
            let lowered = line.to_ascii_lowercase();
            keywords.iter().any(|k| lowered.contains(k)) && extra(&lowered)
        })
        .map(|line| line.trim().to_string())
}

fn is_vga_line(line: &str) -> bool {
    line.contains("vga")
}

/// Extract the device name from an lspci line (text after the last colon).
fn device_name_from_lspci(line: &str) -> String {
    line.rsplit(':').next().unwrap_or(line).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_priority_nvidia() {
        let info = GpuInfo {
            nvidia: true,
            ..Default::default()
        };
        assert_eq!(
            info.encoder_priority(CodecFamily::H264),
            vec!["h264_nvenc", "libx264"]
        );
        assert_eq!(
            info.encoder_priority(CodecFamily::Av1),
            vec!["av1_nvenc", "libsvtav1", "libaom-av1"]
        );
    }

    #[test]
    fn encoder_priority_cpu_only() {
        let info = GpuInfo::default();
        assert_eq!(info.encoder_priority(CodecFamily::H264), vec!["libx264"]);
        assert_eq!(info.encoder_priority(CodecFamily::Hevc), vec!["libx265"]);
        assert_eq!(info.encoder_priority(CodecFamily::Vp9), vec!["libvpx-vp9"]);
    }

    #[test]
    fn encoder_priority_multi_vendor_order() {
        let info = GpuInfo {
            nvidia: true,
            intel: true,
            ..Default::default()
        };
        assert_eq!(
            info.encoder_priority(CodecFamily::Hevc),
            vec!["hevc_nvenc", "hevc_qsv", "libx265"]
        );
    }

    #[test]
    fn recommended_hwaccel_prefers_nvidia() {
        let info = GpuInfo {
            nvidia: true,
            intel: true,
            ..Default::default()
        };
        assert_eq!(info.recommended_hwaccel(), Some("cuda"));

        let info = GpuInfo {
            intel: true,
            ..Default::default()
        };
        assert_eq!(info.recommended_hwaccel(), Some("qsv"));

        let info = GpuInfo::default();
        assert_eq!(info.recommended_hwaccel(), None);
    }

    #[test]
    fn summary_cpu_only() {
        let info = GpuInfo::default();
        assert_eq!(info.summary(), "CPU only");
        assert!(!info.has_hardware());
    }

    #[test]
    fn lspci_device_name_extraction() {
        let line = "01:00.0 VGA compatible controller: NVIDIA Corporation GA104 [GeForce RTX 3070]";
        assert_eq!(
            device_name_from_lspci(line),
            "NVIDIA Corporation GA104 [GeForce RTX 3070]"
        );
    }
}
