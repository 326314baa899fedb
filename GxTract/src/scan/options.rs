//! Scan options, loadable from TOML
//!
//! ```toml
//! dry_run = false
//! mips = true
//! max_depth = 4
//! threads = 8
//! ```

use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options shared by every scan stage.
///
/// Fields missing from a TOML file take their default value.
///
/// # Example
///
/// ```
/// use gxtract::scan::ScanOptions;
///
/// let options = ScanOptions::new()
///     .with_mips(true)
///     .with_threads(4);
/// assert!(options.dolphin_mip_detection);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Walk and decode everything, but write nothing.
    pub dry_run: bool,
    /// Also write mip levels of extracted textures.
    pub mips: bool,
    /// Also copy raw texture containers under `~Raw`.
    pub raw: bool,
    /// Treat single-level textures with a non-zero max LOD as mipmapped,
    /// matching how Dolphin names them.
    pub dolphin_mip_detection: bool,
    /// Detect hand-made mip chains and always write them.
    pub arbitrary_mipmap_detection: bool,
    /// Maximum archive/compression nesting; 0 is unlimited.
    pub max_depth: u32,
    /// Try every decompressor on unrecognized data.
    pub force: bool,
    /// Worker threads; 0 uses the available parallelism.
    pub threads: usize,
    /// Replace existing export destinations when unpacking.
    pub overwrite: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            mips: false,
            raw: false,
            dolphin_mip_detection: true,
            arbitrary_mipmap_detection: true,
            max_depth: 0,
            force: false,
            threads: 0,
            overwrite: false,
        }
    }
}

impl ScanOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML text.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`](crate::Error::ConfigError) on invalid TOML or field types.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    /// Returns an IO error if the file cannot be read, or a config error if
    /// it does not parse.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Serialize to pretty TOML.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`](crate::Error::ConfigError) if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_mips(mut self, mips: bool) -> Self {
        self.mips = mips;
        self
    }

    #[must_use]
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    #[must_use]
    pub fn with_dolphin_mip_detection(mut self, enabled: bool) -> Self {
        self.dolphin_mip_detection = enabled;
        self
    }

    #[must_use]
    pub fn with_arbitrary_mipmap_detection(mut self, enabled: bool) -> Self {
        self.arbitrary_mipmap_detection = enabled;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Number of worker threads to use.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        }
    }

    /// Whether a container at nesting `depth` may still be opened.
    #[must_use]
    pub fn allows_depth(&self, depth: u32) -> bool {
        self.max_depth == 0 || depth < self.max_depth
    }
}
