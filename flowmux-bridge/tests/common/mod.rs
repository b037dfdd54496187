//! Shared scripted engine for integration tests
//!
//! The engine's behavior is fixed up front by a [`Script`]; everything it
//! does is recorded in an [`EngineLog`] the test keeps a handle to. The
//! engine itself moves into the multiplexer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowmux_common::{
    EngineHost, EngineStatus, Finished, TransferEngine, TransferStatus, TransferToken, Wakeup,
};

/// What the engine should do
#[derive(Default)]
pub struct Script {
    /// Tokens the engine refuses to admit, with the refusal status
    pub refuse: HashMap<TransferToken, EngineStatus>,
    /// Polling deadline requested at every admission (`None` = never poll)
    pub poll_delay: Option<Duration>,
    /// Transfers to mark finished once they are running and a poll occurs
    pub finish_on_poll: Vec<(TransferToken, TransferStatus)>,
    /// Fail every action call with this engine status
    pub fail_poll: Option<EngineStatus>,
}

/// Observable engine activity
#[derive(Default)]
pub struct EngineLog {
    pub admitted: Vec<TransferToken>,
    pub stopped: Vec<TransferToken>,
    pub polls: usize,
}

pub struct ScriptedEngine {
    script: Script,
    log: Arc<Mutex<EngineLog>>,
    running: HashSet<TransferToken>,
    finished: VecDeque<Finished>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> (Self, Arc<Mutex<EngineLog>>) {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let engine = Self {
            script,
            log: Arc::clone(&log),
            running: HashSet::new(),
            finished: VecDeque::new(),
        };
        (engine, log)
    }
}

impl TransferEngine for ScriptedEngine {
    fn begin_tracking(&mut self, token: TransferToken, host: &mut dyn EngineHost) -> EngineStatus {
        if let Some(status) = self.script.refuse.get(&token) {
            return *status;
        }
        if let Some(delay) = self.script.poll_delay {
            host.set_deadline(Some(delay));
        }
        self.running.insert(token);
        self.log.lock().unwrap().admitted.push(token);
        EngineStatus::Ok
    }

    fn stop_tracking(&mut self, token: TransferToken, _host: &mut dyn EngineHost) {
        self.running.remove(&token);
        self.log.lock().unwrap().stopped.push(token);
    }

    fn perform(&mut self, _wakeup: Wakeup, _host: &mut dyn EngineHost) -> Result<u32, EngineStatus> {
        self.log.lock().unwrap().polls += 1;
        if let Some(status) = self.script.fail_poll {
            return Err(status);
        }
        // Finish whatever is both scripted and running; entries for
        // transfers not admitted yet stay scripted for a later poll.
        let due = std::mem::take(&mut self.script.finish_on_poll);
        for (token, status) in due {
            if self.running.remove(&token) {
                self.finished.push_back(Finished { token, status });
            } else {
                self.script.finish_on_poll.push((token, status));
            }
        }
        Ok(self.running.len() as u32)
    }

    fn next_finished(&mut self) -> Option<Finished> {
        self.finished.pop_front()
    }
}
