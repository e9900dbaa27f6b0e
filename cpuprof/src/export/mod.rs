//! Profile export
//!
//! The core never picks a wire format. A finished [`Profile`] is handed to a
//! [`ProfileWriter`]; the surrounding tool decides what that writer does.
//! [`JsonProfileWriter`] is the one writer shipped here, for inspection and
//! for tools that consume JSON.

pub mod json;

pub use json::JsonProfileWriter;

use crate::domain::ExportError;
use crate::profile::Profile;

/// Sink for finished profiles.
pub trait ProfileWriter {
    /// # Errors
    /// Returns an error if the profile cannot be encoded or written.
    fn write_profile(&mut self, profile: &Profile) -> Result<(), ExportError>;
}
