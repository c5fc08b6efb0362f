//! In-memory ServerQuery double for tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use tsmunin_sdk::{
    Connector, InstanceId, QueryError, QuerySession, ServerStats, VirtualServer,
};

#[derive(Debug, Default)]
struct MockState {
    stats: HashMap<InstanceId, ServerStats>,
    servers: Vec<VirtualServer>,
    rejected_login: Option<String>,
    unreachable: bool,
    calls: Vec<String>,
}

/// Scripted connector. Clones share state, so a test can keep one handle to
/// inspect the command log after handing another to the plugin.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Rc<RefCell<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(self, id: u32, stats: ServerStats) -> Self {
        self.state.borrow_mut().stats.insert(instance(id), stats);
        self
    }

    pub fn with_server(self, id: u32, name: &str) -> Self {
        self.state.borrow_mut().servers.push(VirtualServer {
            id: instance(id),
            name: name.to_string(),
        });
        self
    }

    pub fn rejecting_login(self, message: &str) -> Self {
        self.state.borrow_mut().rejected_login = Some(message.to_string());
        self
    }

    pub fn unreachable(self) -> Self {
        self.state.borrow_mut().unreachable = true;
        self
    }

    /// Commands seen so far, in ServerQuery syntax.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }
}

fn instance(id: u32) -> InstanceId {
    InstanceId::new(id).expect("mock instance ids are non-zero")
}

impl Connector for MockConnector {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn QuerySession>, QueryError> {
        let address = format!("{}:{}", host, port);
        if self.state.borrow().unreachable {
            return Err(QueryError::Connection {
                address,
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }

        self.state
            .borrow_mut()
            .calls
            .push(format!("connect {}", address));
        Ok(Box::new(MockSession {
            state: Rc::clone(&self.state),
            selected: None,
        }))
    }
}

struct MockSession {
    state: Rc<RefCell<MockState>>,
    selected: Option<InstanceId>,
}

impl MockSession {
    fn record(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl QuerySession for MockSession {
    fn authenticate(&mut self, username: &str, _password: &str) -> Result<(), QueryError> {
        self.record(format!("login {}", username));
        match self.state.borrow().rejected_login.clone() {
            Some(message) => Err(QueryError::Auth { message }),
            None => Ok(()),
        }
    }

    fn select_instance(&mut self, id: InstanceId) -> Result<(), QueryError> {
        self.record(format!("use sid={}", id));
        self.selected = Some(id);
        Ok(())
    }

    fn instance_info(&mut self) -> Result<ServerStats, QueryError> {
        self.record("serverinfo".to_string());
        let state = self.state.borrow();
        self.selected
            .and_then(|id| state.stats.get(&id).cloned())
            .ok_or_else(|| QueryError::Command {
                command: "serverinfo".to_string(),
                id: 1024,
                message: "invalid serverID".to_string(),
            })
    }

    fn list_instances(&mut self) -> Result<Vec<VirtualServer>, QueryError> {
        self.record("serverlist".to_string());
        Ok(self.state.borrow().servers.clone())
    }

    fn close(&mut self) -> Result<(), QueryError> {
        self.record("quit".to_string());
        Ok(())
    }
}

/// A complete `serverinfo` response with the given client counters.
pub fn sample_stats(clients_online: u64, query_clients: u64) -> ServerStats {
    let mut stats: ServerStats = [
        ("connection_bytes_received_total", "1048576"),
        ("connection_bytes_sent_total", "2097152"),
        ("connection_filetransfer_bytes_received_total", "4096"),
        ("connection_filetransfer_bytes_sent_total", "8192"),
        ("virtualserver_uptime", "86400"),
        ("virtualserver_total_ping", "31.5000"),
        ("virtualserver_total_packetloss_speech", "0.0100"),
        ("virtualserver_total_packetloss_keepalive", "0.0200"),
        ("virtualserver_total_packetloss_control", "0.0000"),
        ("virtualserver_total_packetloss_total", "0.0300"),
        ("virtualserver_name", "Lobby"),
    ]
    .into_iter()
    .collect();
    stats.insert(tsmunin_sdk::CLIENTS_ONLINE, clients_online.to_string());
    stats.insert(tsmunin_sdk::QUERY_CLIENTS_ONLINE, query_clients.to_string());
    stats
}
