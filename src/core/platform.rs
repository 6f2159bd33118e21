// ─── Platform ───
// Operating system family and CPU architecture of the running machine,
// expressed in the vocabulary used by version manifests.

use std::fmt;

use crate::core::error::{LauncherError, LauncherResult};

/// OS families recognised by manifest rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Linux,
    Osx,
}

impl OsFamily {
    /// Map a Rust `target_os` string onto a manifest OS family.
    pub fn from_target_os(os: &str) -> LauncherResult<Self> {
        match os {
            "windows" => Ok(OsFamily::Windows),
            "linux" => Ok(OsFamily::Linux),
            "macos" => Ok(OsFamily::Osx),
            other => Err(LauncherError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Name used by the `os.name` predicate of manifest rules.
    pub fn manifest_name(self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Linux => "linux",
            OsFamily::Osx => "osx",
        }
    }

    /// Whether a rule's `os.name` refers to this family.
    pub fn matches_name(self, name: &str) -> bool {
        let name = name.trim().to_ascii_lowercase();
        match self {
            OsFamily::Osx => name == "osx" || name == "macos",
            _ => name == self.manifest_name(),
        }
    }

    /// Classifier buckets that carry natives for this family in legacy manifests.
    pub fn native_classifiers(self) -> &'static [&'static str] {
        match self {
            OsFamily::Windows => &["natives-windows-32", "natives-windows-64", "natives-windows"],
            OsFamily::Linux => &["natives-linux"],
            OsFamily::Osx => &["natives-osx", "natives-macos"],
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_name())
    }
}

/// The platform a launch is staged for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: OsFamily,
    /// Raw CPU architecture string (e.g. `x86_64`, `aarch64`).
    pub arch: String,
}

impl Platform {
    pub fn new(os: OsFamily, arch: impl Into<String>) -> Self {
        Self {
            os,
            arch: arch.into(),
        }
    }

    /// Detect the running platform. Fails for operating systems no manifest targets.
    pub fn current() -> LauncherResult<Self> {
        let os = OsFamily::from_target_os(std::env::consts::OS)?;
        Ok(Self::new(os, std::env::consts::ARCH))
    }

    pub fn is_arm(&self) -> bool {
        let arch = self.arch.to_ascii_lowercase();
        arch.contains("arm") || arch.contains("aarch")
    }

    pub fn is_x86_64(&self) -> bool {
        let arch = self.arch.to_ascii_lowercase();
        arch.contains("x86_64") || arch.contains("amd64")
    }

    /// Compare a rule's `os.arch` value against this platform.
    ///
    /// `x86` means 32-bit x86 in manifests, so it never matches a 64-bit CPU.
    pub fn matches_arch(&self, rule_arch: &str) -> bool {
        let rule_arch = rule_arch.trim().to_ascii_lowercase();
        let arch = self.arch.to_ascii_lowercase();
        match rule_arch.as_str() {
            "x86" => arch == "x86" || arch == "i386" || arch == "i686",
            "x86_64" | "amd64" => self.is_x86_64(),
            "arm64" | "aarch64" => arch == "aarch64" || arch == "arm64",
            "arm" => arch.starts_with("arm"),
            other => arch == other,
        }
    }

    /// Native artifacts are told apart by an `arm`/`aarch` marker in their name.
    /// ARM natives only run on ARM CPUs and vice versa.
    pub fn accepts_native(&self, library_name: &str) -> bool {
        let name = library_name.to_ascii_lowercase();
        let is_arm_native = name.contains("arm") || name.contains("aarch");
        is_arm_native == self.is_arm()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operating_systems_are_rejected() {
        let err = OsFamily::from_target_os("solaris").unwrap_err();
        assert!(matches!(err, LauncherError::UnsupportedPlatform(ref os) if os == "solaris"));
    }

    #[test]
    fn macos_alias_matches_osx() {
        assert!(OsFamily::Osx.matches_name("osx"));
        assert!(OsFamily::Osx.matches_name("macos"));
        assert!(!OsFamily::Linux.matches_name("osx"));
    }

    #[test]
    fn native_arch_heuristic() {
        let arm = Platform::new(OsFamily::Linux, "aarch64");
        let intel = Platform::new(OsFamily::Linux, "x86_64");

        assert!(arm.accepts_native("org.lwjgl:lwjgl:3.3.1:natives-linux-arm64"));
        assert!(!arm.accepts_native("org.lwjgl:lwjgl:3.3.1:natives-linux"));
        assert!(intel.accepts_native("org.lwjgl:lwjgl:3.3.1:natives-linux"));
        assert!(!intel.accepts_native("org.lwjgl:lwjgl:3.3.1:natives-linux-arm32"));
    }

    #[test]
    fn x86_rule_arch_is_32_bit_only() {
        assert!(!Platform::new(OsFamily::Windows, "x86_64").matches_arch("x86"));
        assert!(Platform::new(OsFamily::Windows, "x86").matches_arch("x86"));
    }
}
