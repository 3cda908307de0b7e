use std::sync::Arc;

use rep_models::Registry;
use rep_solve::InterruptFlag;
use rep_store::{Clock, SystemClock};

use crate::config::RunnerConfig;
use crate::logging::RunLog;

/// Everything a run reads from its environment.
///
/// Time, the collaborator registry and the interrupt flag are injected so a
/// run can be reproduced exactly in tests.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Process-wide settings.
    pub config: RunnerConfig,
    /// Datasets and models selectable by name.
    pub registry: Arc<Registry>,
    /// Source of timestamps for directory, log and snapshot names.
    pub clock: Arc<dyn Clock>,
    /// Raised by a signal handler to stop an iterative solve early.
    pub interrupt: InterruptFlag,
    /// Log file sink, attached once the output directory is known.
    pub run_log: Option<RunLog>,
}

impl RunContext {
    /// Context with the builtin registry and the wall clock.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(Registry::builtin()),
            clock: Arc::new(SystemClock),
            interrupt: InterruptFlag::new(),
            run_log: None,
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the registry.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Routes debug output of the run into a log file in its output directory.
    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }
}
