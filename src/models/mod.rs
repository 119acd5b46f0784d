mod job;
mod series;

pub use job::{
    cancel_failed_line, terminal_line, JobLogEntry, JobPhase, JobStatus, JobView, CANCELLED_LINE,
    COMPLETED_LINE, STARTING_LINE,
};
pub use series::{parse_fecha, Series, SeriesId, SeriesPoint, SummaryStats, INITIAL_VALUE_KEY};
