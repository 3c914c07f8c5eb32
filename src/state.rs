use std::sync::Arc;

use crate::clock::Clock;
use crate::config::PollConfig;
use crate::poll::PollManager;
use crate::roster::{Enrollment, SessionDirectory};
use crate::store::AttendanceStore;
use crate::submission::SubmissionCoordinator;

pub struct AppState {
    pub polls: PollManager,
    pub submissions: SubmissionCoordinator,
    pub enrollment: Arc<dyn Enrollment>,
}

impl AppState {
    /// Wire every component to one backend that also answers roster queries.
    pub fn new<B>(backend: Arc<B>, clock: Arc<dyn Clock>, poll_config: PollConfig) -> Arc<Self>
    where
        B: AttendanceStore + SessionDirectory + Enrollment + 'static,
    {
        let polls = PollManager::new(backend.clone(), backend.clone(), clock.clone(), poll_config);
        let submissions =
            SubmissionCoordinator::new(backend.clone(), backend.clone(), backend.clone(), clock);

        Arc::new(Self {
            polls,
            submissions,
            enrollment: backend,
        })
    }
}
