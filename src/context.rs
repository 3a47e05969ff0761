//! Per-invocation run context

use chrono::{DateTime, Utc};

const RUN_ID_FORMAT: &str = "%Y%m%dT%H%M%S%6fZ";

/// Created once per CLI invocation and handed to every stage.
///
/// All partitions written by one invocation share `started_at`, so they land
/// in the same `ingestion_date` directory with the same file tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub started_at: DateTime<Utc>,
    pub run_id: String,
}

impl RunContext {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Context pinned to a given instant.
    pub fn at(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: format!("run-{}", started_at.format(RUN_ID_FORMAT)),
            started_at,
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_id_follows_start_instant() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 5).unwrap();
        let ctx = RunContext::at(at);
        assert_eq!(ctx.started_at, at);
        assert_eq!(ctx.run_id, "run-20240115T143005000000Z");
    }
}
