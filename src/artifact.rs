//! Artifact identity types.
//!
//! An artifact is either a VS Code editor binary or a marketplace extension
//! package. This module defines the closed platform/build sets, the
//! [`Version`] token, and the task/resolution records that flow from the
//! config walker through the resolver to the writer.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::download::sanitize_filename;

/// Editor installation platform accepted by the update service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// 64-bit Windows system installer.
    Win64Admin,
    /// 64-bit Windows user installer.
    Win64User,
    /// 64-bit Windows zip archive.
    Win64Zip,
    /// 32-bit Windows system installer.
    Win32Admin,
    /// 32-bit Windows user installer.
    Win32User,
    /// 32-bit Windows zip archive.
    Win32Zip,
    /// 64-bit Debian package.
    Linux64Deb,
    /// 64-bit RPM package.
    Linux64Rpm,
    /// 64-bit tarball.
    Linux64TarGz,
    /// macOS archive.
    Osx,
}

impl Platform {
    /// Every supported platform, in display order.
    pub const ALL: [Platform; 10] = [
        Platform::Win64Admin,
        Platform::Win64User,
        Platform::Win64Zip,
        Platform::Win32Admin,
        Platform::Win32User,
        Platform::Win32Zip,
        Platform::Linux64Deb,
        Platform::Linux64Rpm,
        Platform::Linux64TarGz,
        Platform::Osx,
    ];

    /// Returns the wire string used by the update service.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win64Admin => "win32-x64",
            Self::Win64User => "win32-x64-user",
            Self::Win64Zip => "win32-x64-archive",
            Self::Win32Admin => "win32",
            Self::Win32User => "win32-user",
            Self::Win32Zip => "win32-archive",
            Self::Linux64Deb => "linux-deb-x64",
            Self::Linux64Rpm => "linux-rpm-x64",
            Self::Linux64TarGz => "linux-x64",
            Self::Osx => "darwin",
        }
    }

    /// Returns the human-facing option label shown by `list-opts`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Win64Admin => "WIN64_ADMIN",
            Self::Win64User => "WIN64_USER",
            Self::Win64Zip => "WIN64_ZIP",
            Self::Win32Admin => "WIN32_ADMIN",
            Self::Win32User => "WIN32_USER",
            Self::Win32Zip => "WIN32_ZIP",
            Self::Linux64Deb => "LINUX64_DEB",
            Self::Linux64Rpm => "LINUX64_RPM",
            Self::Linux64TarGz => "LINUX64_TAR_GZ",
            Self::Osx => "OSX",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str() == value)
            .ok_or_else(|| ConfigError::unknown_platform(value))
    }
}

/// Editor release channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Build {
    /// Monthly stable releases.
    #[default]
    Stable,
    /// Nightly insider builds.
    Insider,
}

impl Build {
    /// Every supported build, in display order.
    pub const ALL: [Build; 2] = [Build::Stable, Build::Insider];

    /// Returns the wire string used by the update service.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Insider => "insider",
        }
    }

    /// Returns the human-facing option label shown by `list-opts`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Stable => "STABLE",
            Self::Insider => "INSIDER",
        }
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Build {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|build| build.as_str() == value)
            .ok_or_else(|| ConfigError::unknown_build(value))
    }
}

/// Requested version of an artifact.
///
/// `Latest` always costs one metadata lookup at resolution time; `Pinned`
/// versions are used as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// Whatever the service currently publishes.
    #[default]
    Latest,
    /// An explicit version string.
    Pinned(String),
}

impl Version {
    /// Token used in configuration documents for [`Version::Latest`].
    pub const LATEST_TOKEN: &'static str = "latest";

    /// Parses a version token from configuration input.
    ///
    /// `"latest"` (any case) maps to [`Version::Latest`]; anything else is pinned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyVersion`] for blank tokens.
    pub fn parse(token: &str, context: &str) -> Result<Self, ConfigError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ConfigError::empty_version(context));
        }
        if token.eq_ignore_ascii_case(Self::LATEST_TOKEN) {
            Ok(Self::Latest)
        } else {
            Ok(Self::Pinned(token.to_string()))
        }
    }

    /// Returns the token form of this version.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Latest => Self::LATEST_TOKEN,
            Self::Pinned(version) => version,
        }
    }

    /// Returns true for [`Version::Pinned`].
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        matches!(self, Self::Pinned(_))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marketplace extension identifier in `publisher.name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionId {
    publisher: String,
    name: String,
}

impl ExtensionId {
    /// Parses a `publisher.name` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidExtensionId`] unless the value has exactly
    /// two non-empty dot-separated parts made of identifier characters.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let Some((publisher, name)) = value.split_once('.') else {
            return Err(ConfigError::invalid_extension_id(
                value,
                "expected `publisher.name`",
            ));
        };
        if publisher.is_empty() || name.is_empty() {
            return Err(ConfigError::invalid_extension_id(
                value,
                "publisher and name must both be non-empty",
            ));
        }
        if name.contains('.') {
            return Err(ConfigError::invalid_extension_id(
                value,
                "expected exactly one `.` separator",
            ));
        }
        let valid_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        if !publisher.chars().all(valid_char) || !name.chars().all(valid_char) {
            return Err(ConfigError::invalid_extension_id(
                value,
                "only ASCII letters, digits, `-` and `_` are allowed",
            ));
        }
        Ok(Self {
            publisher: publisher.to_string(),
            name: name.to_string(),
        })
    }

    /// Publisher part of the identifier.
    #[must_use]
    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Extension name part of the identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.publisher, self.name)
    }
}

/// A marketplace extension request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionRef {
    /// Which extension.
    pub extension_id: ExtensionId,
    /// Requested version.
    pub version: Version,
}

/// An editor binary request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryRef {
    /// Installation platform.
    pub platform: Platform,
    /// Release channel.
    pub build: Build,
    /// Requested version.
    pub version: Version,
}

/// Identity of a downloadable unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactDescriptor {
    /// Marketplace extension package.
    Extension(ExtensionRef),
    /// Editor installer or archive.
    Binary(BinaryRef),
}

impl ArtifactDescriptor {
    /// Returns the requested version token.
    #[must_use]
    pub fn version(&self) -> &Version {
        match self {
            Self::Extension(ext) => &ext.version,
            Self::Binary(bin) => &bin.version,
        }
    }

    /// Short identifier used in logs and failure reports.
    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            Self::Extension(ext) => ext.extension_id.to_string(),
            Self::Binary(bin) => format!("{}/{}", bin.platform, bin.build),
        }
    }
}

/// One unit of work produced by walking the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Directory segments below the output root, root first.
    pub destination_path: Vec<String>,
    /// What to download there.
    pub descriptor: ArtifactDescriptor,
}

impl DownloadTask {
    /// Destination segments joined with `/` for display.
    #[must_use]
    pub fn destination_display(&self) -> String {
        self.destination_path.join("/")
    }
}

/// A task with its version and download location settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// The originating task.
    pub task: DownloadTask,
    /// Concrete version string (never `"latest"` for extensions).
    pub concrete_version: String,
    /// Where the bytes are fetched from.
    pub source_uri: String,
    /// File name written under the destination directory.
    pub target_filename: String,
}

/// Builds the `{extension_id}-{version}.vsix` file name.
#[must_use]
pub fn extension_filename(extension_id: &ExtensionId, version: &str) -> String {
    sanitize_filename(&format!("{extension_id}-{version}.vsix"))
}
