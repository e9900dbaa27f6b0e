use serde::Serialize;
use std::io::Write;

use super::ProfileWriter;
use crate::domain::ExportError;
use crate::profile::Profile;

/// Writes profiles as JSON
///
/// Each profile is one JSON object followed by a newline, so several
/// profiles written to the same sink form a JSON Lines stream when `pretty`
/// is off.
pub struct JsonProfileWriter<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonProfileWriter<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer, pretty: false }
    }

    /// Indented output.
    #[must_use]
    pub fn pretty(writer: W) -> Self {
        Self { writer, pretty: true }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// JSON container with the totals a viewer shows first
#[derive(Serialize)]
struct JsonProfile<'a> {
    #[serde(flatten)]
    profile: &'a Profile,
    totals: Vec<i64>,
}

impl<W: Write> ProfileWriter for JsonProfileWriter<W> {
    fn write_profile(&mut self, profile: &Profile) -> Result<(), ExportError> {
        let doc = JsonProfile {
            profile,
            totals: (0..profile.sample_types.len()).map(|i| profile.total(i)).collect(),
        };

        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &doc)?;
        } else {
            serde_json::to_writer(&mut self.writer, &doc)?;
        }
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
