//! Connection registry (C7): a concurrent map from remote address to a
//! shutdown signal, used only so `Shutdown` can force-close every
//! in-flight connection (§4.6, §9 — "an alternative is context/cancellation
//! tokens threaded through each goroutine, equivalent in effect").

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    conns: Mutex<HashMap<SocketAddr, Arc<Notify>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `remote_addr`, returning the `Notify` the connection task
    /// should select on alongside its reads to learn it must close.
    pub fn register(&self, remote_addr: SocketAddr) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.conns.lock().unwrap().insert(remote_addr, notify.clone());
        notify
    }

    pub fn deregister(&self, remote_addr: SocketAddr) {
        self.conns.lock().unwrap().remove(&remote_addr);
    }

    /// Wakes every registered connection's shutdown signal. Does not wait
    /// for them to actually close.
    pub fn close_all(&self) {
        for notify in self.conns.lock().unwrap().values() {
            notify.notify_waiters();
        }
    }

    pub fn len(&self) -> usize {
        self.conns.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
