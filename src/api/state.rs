use crate::publish::Providers;
use crate::scheduler::ScheduleStore;

#[derive(Clone)]
pub struct AppState {
    pub store: ScheduleStore,
    pub providers: Providers,
}
