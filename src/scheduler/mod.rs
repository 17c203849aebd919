//! Deferred deployments: the schedule record store, the runner that
//! executes due records, and the polling loop that triggers it.

pub mod engine;
pub mod record;
pub mod runner;
pub mod store;

pub use self::engine::run_scheduler_loop;
pub use self::record::{NewSchedule, ScheduleRecord, ScheduleRequest, ScheduleStatus};
pub use self::runner::{RunSummary, Runner};
pub use self::store::ScheduleStore;
