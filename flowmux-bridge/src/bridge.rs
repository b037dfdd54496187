//! The host surface handed to the engine
//!
//! Every engine entry point receives `&mut dyn EngineHost` and may call
//! back through it synchronously, including from inside the call that
//! admits a transfer. The bridge therefore lives in its own struct,
//! separate from the engine value, so the event pump can borrow both at
//! once: the engine as the callee, the bridge as the callback target.

use std::time::Duration;

use tokio::sync::mpsc;

use flowmux_common::{EngineHost, Interest, SocketId, SocketRequest};

use crate::socket::{ReadyEvent, SocketRegistry};
use crate::timer::TimerBridge;

/// Registry + timer, addressable as one `EngineHost`
pub(crate) struct EngineBridge {
    pub(crate) registry: SocketRegistry,
    pub(crate) timer: TimerBridge,
}

impl EngineBridge {
    pub(crate) fn new(events: mpsc::UnboundedSender<ReadyEvent>) -> Self {
        Self {
            registry: SocketRegistry::new(events),
            timer: TimerBridge::new(),
        }
    }
}

impl EngineHost for EngineBridge {
    fn open_socket(&mut self, request: SocketRequest) -> Option<SocketId> {
        self.registry.open(request)
    }

    fn close_socket(&mut self, socket: SocketId) -> bool {
        self.registry.close(socket)
    }

    fn update_interest(&mut self, socket: SocketId, interest: Interest) {
        self.registry.update_interest(socket, interest);
    }

    fn set_deadline(&mut self, deadline: Option<Duration>) {
        match deadline {
            Some(delay) => self.timer.set(delay),
            None => self.timer.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> EngineBridge {
        let (tx, _rx) = mpsc::unbounded_channel();
        EngineBridge::new(tx)
    }

    #[tokio::test]
    async fn test_deadline_arms_and_clears_timer() {
        let mut bridge = bridge();
        bridge.set_deadline(Some(Duration::from_millis(5)));
        assert!(bridge.timer.is_armed());
        bridge.set_deadline(None);
        assert!(!bridge.timer.is_armed());
    }

    #[tokio::test]
    async fn test_socket_requests_reach_registry() {
        let mut bridge = bridge();
        let id = bridge
            .open_socket(SocketRequest::ipv4_stream())
            .expect("ipv4 stream open should succeed");
        assert_eq!(bridge.registry.len(), 1);

        bridge.update_interest(id, Interest::Read);
        assert!(bridge.close_socket(id));
        assert!(!bridge.close_socket(id));
        assert_eq!(bridge.registry.len(), 0);
    }
}
