//! Transfer summaries
// (c) 2024 Ross Younger

use std::path::PathBuf;
use std::time::Duration;

use human_repr::{HumanCount as _, HumanDuration as _, HumanThroughput as _};

use crate::cli::styles::{header, success, RESET};
use crate::transfer::TransferPath;
use crate::util::TimeFormat;

/// What the client learned about one file it received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    /// The name the client asked for
    pub file_name: String,
    /// Where the content was written
    pub destination: PathBuf,
    /// Content length, as announced by the server
    pub size: u32,
    /// Modification time on the server, POSIX seconds
    pub last_modified: u32,
    /// How the body was moved
    pub path: TransferPath,
    /// Wall clock time from request to trailer
    pub elapsed: Duration,
}

impl TransferSummary {
    /// Renders this summary as a framed block for the terminal.
    ///
    /// ```text
    /// ┌─ report.txt
    /// │ size           1500 bytes (1.5kB)
    /// │ last modified  Tue Nov 14 22:13:20 2023
    /// │ saved to       ./report.txt
    /// └─ received in 2ms (750kB/s)
    /// ```
    #[must_use]
    pub fn render(&self, time_format: TimeFormat) -> String {
        let secs = self.elapsed.as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let rate = if secs > 0.0 {
            (f64::from(self.size) / secs).human_throughput_bytes().to_string()
        } else {
            "instant".to_string()
        };
        format!(
            "{HEADER}┌─ {name}{RESET}\n\
             │ size           {size} bytes ({human})\n\
             │ last modified  {modified}\n\
             │ saved to       {dest}\n\
             {SUCCESS}└─ received in {elapsed} ({rate}){RESET}",
            HEADER = header(),
            SUCCESS = success(),
            name = self.file_name,
            size = self.size,
            human = self.size.human_count_bytes(),
            modified = time_format.render_timestamp(self.last_modified),
            dest = self.destination.display(),
            elapsed = self.elapsed.human_duration(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::TransferSummary;
    use crate::transfer::TransferPath;
    use crate::util::TimeFormat;

    use assertables::assert_contains;
    use std::time::Duration;

    #[test]
    fn render() {
        let s = TransferSummary {
            file_name: "report.txt".into(),
            destination: "./report.txt".into(),
            size: 1500,
            last_modified: 1_700_000_000,
            path: TransferPath::Chunked(2),
            elapsed: Duration::from_millis(2),
        };
        let out = console::strip_ansi_codes(&s.render(TimeFormat::Utc)).to_string();
        assert_contains!(out, "report.txt");
        assert_contains!(out, "1500 bytes");
        assert_contains!(out, "Tue Nov 14 22:13:20 2023");
        assert_contains!(out, "./report.txt");
    }

    #[test]
    fn zero_elapsed() {
        let s = TransferSummary {
            file_name: "empty".into(),
            destination: "empty".into(),
            size: 0,
            last_modified: 0,
            path: TransferPath::SingleShot,
            elapsed: Duration::ZERO,
        };
        assert_contains!(s.render(TimeFormat::Rfc3339), "1970-01-01T00:00:00+00:00");
    }
}
