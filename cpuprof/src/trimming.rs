//! Runtime frame trimming for keeping stacks focused on user code.
//!
//! Sampled stacks include frames that belong to the runtime's scheduler
//! rather than to the program: the goroutine/thread entry trampoline at the
//! bottom of every stack, and for non-CPU profiles the runtime machinery
//! sitting above the user frame that triggered the sample. This module
//! removes those frames by function name.
//!
//! # Trimming Rules
//!
//! 1. **Drop patterns** - frames matching [`TrimConfig::drop`] are removed
//!    wherever they appear
//! 2. **Leading patterns** - frames matching [`TrimConfig::drop_leading`] are
//!    removed from the innermost end only, and only for non-CPU profiles
//!    (CPU time spent inside the runtime is real CPU time)
//! 3. **Never empty** - if nothing would remain, the outermost frame is kept
//! 4. **Collapse** - a location that removal leaves next to itself becomes
//!    one frame; repeats already in the stack (recursion) are kept
//! 5. **Merge** - samples that end up identical are merged, values summed
//!
//! Unsymbolized frames never match. Locations and functions are never
//! modified; only which locations a sample references.

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::domain::{ConfigError, LocationId};
use crate::profile::Profile;

// =============================================================================
// PATTERNS AND CONFIGURATION
// =============================================================================

/// Function-name pattern: `name` matches exactly, `prefix*` matches by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FramePattern {
    Exact(String),
    Prefix(String),
}

impl FramePattern {
    /// Parse a pattern string.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidPattern`] for an empty pattern, a bare
    /// `*`, or a `*` anywhere but at the end.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidPattern(pattern.to_string());
        match pattern.strip_suffix('*') {
            _ if pattern.is_empty() => Err(invalid()),
            Some(prefix) if prefix.is_empty() || prefix.contains('*') => Err(invalid()),
            Some(prefix) => Ok(Self::Prefix(prefix.to_string())),
            None if pattern.contains('*') => Err(invalid()),
            None => Ok(Self::Exact(pattern.to_string())),
        }
    }

    #[must_use]
    pub fn matches(&self, function: &str) -> bool {
        match self {
            Self::Exact(name) => function == name,
            Self::Prefix(prefix) => function.starts_with(prefix.as_str()),
        }
    }
}

impl TryFrom<String> for FramePattern {
    type Error = ConfigError;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Self::parse(&pattern)
    }
}

impl From<FramePattern> for String {
    fn from(pattern: FramePattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for FramePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => write!(f, "{name}"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// Goroutine entry/exit trampoline at the outermost end of every stack
const DEFAULT_DROP: &[&str] = &["runtime.goexit"];

/// Runtime frames above the user frame in allocation/blocking profiles
const DEFAULT_DROP_LEADING: &[&str] = &["runtime.*"];

/// Which frames the trimmer removes
///
/// Loaded from JSON such as:
///
/// ```json
/// { "drop": ["runtime.goexit"], "drop_leading": ["runtime.*"] }
/// ```
///
/// Missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrimConfig {
    /// Removed wherever they appear.
    pub drop: Vec<FramePattern>,
    /// Removed from the innermost end of non-CPU profiles.
    pub drop_leading: Vec<FramePattern>,
}

impl Default for TrimConfig {
    fn default() -> Self {
        let parse = |patterns: &[&str]| -> Vec<FramePattern> {
            patterns.iter().filter_map(|p| FramePattern::parse(p).ok()).collect()
        };
        Self { drop: parse(DEFAULT_DROP), drop_leading: parse(DEFAULT_DROP_LEADING) }
    }
}

impl TrimConfig {
    /// A configuration that trims nothing.
    #[must_use]
    pub fn none() -> Self {
        Self { drop: Vec::new(), drop_leading: Vec::new() }
    }

    /// # Errors
    /// Returns an error for malformed JSON, unknown keys or invalid patterns.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    #[must_use]
    pub fn is_dropped(&self, function: &str) -> bool {
        self.drop.iter().any(|p| p.matches(function))
    }

    #[must_use]
    pub fn is_dropped_leading(&self, function: &str) -> bool {
        self.drop_leading.iter().any(|p| p.matches(function))
    }
}

// =============================================================================
// TRIMMER
// =============================================================================

/// Counts from one trimming pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimStats {
    /// Frames removed by patterns or collapsing, over all samples.
    pub frames_removed: usize,
    /// Samples that lost every frame and kept only the outermost one.
    pub outermost_retained: usize,
    /// Samples folded into an identical earlier sample.
    pub samples_merged: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct FrameClass {
    drop: bool,
    leading: bool,
}

pub struct RuntimeFrameTrimmer<'a> {
    config: &'a TrimConfig,
}

impl<'a> RuntimeFrameTrimmer<'a> {
    #[must_use]
    pub fn new(config: &'a TrimConfig) -> Self {
        Self { config }
    }

    /// Trim every sample of a symbolized profile, then re-merge samples.
    pub fn trim(&self, profile: &mut Profile) -> TrimStats {
        let mut stats = TrimStats::default();
        let trim_leading = !profile.is_cpu();
        let classes = self.classify_locations(profile);
        let class_of = |id: LocationId| {
            id.index().and_then(|i| classes.get(i)).copied().unwrap_or_default()
        };

        for sample in &mut profile.samples {
            let Some(&outermost) = sample.locations.last() else {
                continue;
            };

            let skip = if trim_leading {
                sample.locations.iter().take_while(|&&id| class_of(id).leading).count()
            } else {
                0
            };

            let mut kept: Vec<LocationId> = Vec::with_capacity(sample.locations.len() - skip);
            let mut removed_since_kept = false;
            for &id in &sample.locations[skip..] {
                if class_of(id).drop {
                    removed_since_kept = true;
                } else if removed_since_kept && kept.last() == Some(&id) {
                    removed_since_kept = false;
                } else {
                    kept.push(id);
                    removed_since_kept = false;
                }
            }
            if kept.is_empty() {
                kept.push(outermost);
                stats.outermost_retained += 1;
            }

            stats.frames_removed += sample.locations.len() - kept.len();
            sample.locations = kept;
        }

        stats.samples_merged = profile.merge_duplicate_samples();
        info!(
            "Trimmed {} runtime frames, merged {} samples ({} samples remain)",
            stats.frames_removed,
            stats.samples_merged,
            profile.samples.len()
        );
        stats
    }

    /// Match each location's function name against the configured patterns.
    fn classify_locations(&self, profile: &Profile) -> Vec<FrameClass> {
        profile
            .locations
            .iter()
            .map(|location| match profile.function_name(location.id) {
                Some(name) => FrameClass {
                    drop: self.config.is_dropped(name),
                    leading: self.config.is_dropped_leading(name),
                },
                None => FrameClass::default(),
            })
            .collect()
    }
}
