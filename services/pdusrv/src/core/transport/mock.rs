//! Mock Transport for Testing
//!
//! [`MockTransport`] drives a [`ConsoleSimulator`]: every line written to
//! the transport is recorded and answered the way the PDU console would
//! answer it (prompts, echo, login screen, canned reports). Tests keep a
//! [`MockHandle`] to inspect the recorded lines after the transport has
//! been moved into a session.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::trace;

use super::traits::{Transport, TransportError, TransportStats};
use crate::core::console::Prompts;

const LINE_END: &str = "\r\n";

/// Scripted PDU console
#[derive(Debug, Clone)]
pub struct ConsoleSimulator {
    prompts: Prompts,
    accounts: Vec<(String, String)>,
    reports: HashMap<String, String>,
    user: Option<String>,
    pending_user: Option<String>,
}

impl ConsoleSimulator {
    pub fn new(prompts: Prompts) -> Self {
        Self {
            prompts,
            accounts: Vec::new(),
            reports: HashMap::new(),
            user: None,
            pending_user: None,
        }
    }

    /// Accept `username` / `password` at the login screen
    pub fn with_account(mut self, username: &str, password: &str) -> Self {
        self.accounts
            .push((username.to_string(), password.to_string()));
        self
    }

    /// Reply body for `command` (without echo or prompt)
    pub fn with_report(mut self, command: &str, body: &str) -> Self {
        self.reports.insert(command.to_string(), body.to_string());
        self
    }

    /// Start with a session already open for `username`
    pub fn logged_in_as(mut self, username: &str) -> Self {
        self.user = Some(username.to_string());
        self
    }

    pub fn current_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Produce the console output for one input line
    pub fn handle_line(&mut self, line: &str) -> String {
        let Some(user) = self.user.clone() else {
            return self.handle_login_screen(line);
        };

        match line {
            "" => format!("{LINE_END}{}", self.prompts.ready),
            // The console prints no prompt after logging out
            "Logout" => {
                self.user = None;
                format!("Logout{LINE_END}")
            },
            "Whoami" => format!(
                "Whoami{LINE_END}Current User: {user}{LINE_END}{}",
                self.prompts.ready
            ),
            command => {
                let body = self.reports.get(command).cloned().unwrap_or_default();
                format!("{command}{LINE_END}{body}{LINE_END}{}", self.prompts.ready)
            },
        }
    }

    fn handle_login_screen(&mut self, line: &str) -> String {
        if let Some(username) = self.pending_user.take() {
            let accepted = self
                .accounts
                .iter()
                .any(|(u, p)| *u == username && p == line);
            if accepted {
                self.user = Some(username);
                return format!("{LINE_END}{}", self.prompts.ready);
            }
            return format!(
                "{LINE_END}{}{LINE_END}{}",
                self.prompts.invalid, self.prompts.username
            );
        }

        if line.is_empty() {
            return format!("{LINE_END}{}", self.prompts.username);
        }

        self.pending_user = Some(line.to_string());
        format!("{line}{LINE_END}{}", self.prompts.password)
    }
}

#[derive(Debug)]
struct MockState {
    connected: bool,
    device: ConsoleSimulator,
    output: VecDeque<u8>,
    partial_line: String,
    sent_lines: Vec<String>,
    muted: bool,
    fail_receive: bool,
    read_size: Option<usize>,
    stats: TransportStats,
}

/// Inspection handle shared with a [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Every complete line written so far, in order
    pub async fn sent_lines(&self) -> Vec<String> {
        self.state.lock().await.sent_lines.clone()
    }

    /// Queue raw console output, bypassing the simulator
    pub async fn push_output(&self, data: &str) {
        self.state.lock().await.output.extend(data.as_bytes());
    }

    pub async fn current_user(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .device
            .current_user()
            .map(str::to_string)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    /// Record input lines but let the simulator stay silent
    pub async fn set_muted(&self, muted: bool) {
        self.state.lock().await.muted = muted;
    }

    /// Deliver at most `bytes` per read
    pub async fn set_read_size(&self, bytes: usize) {
        self.state.lock().await.read_size = Some(bytes.max(1));
    }

    /// Make subsequent reads fail with a hard receive error
    pub async fn set_receive_failure(&self, should_fail: bool) {
        self.state.lock().await.fail_receive = should_fail;
    }
}

/// Mock transport implementation
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(device: ConsoleSimulator) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                connected: false,
                device,
                output: VecDeque::new(),
                partial_line: String::new(),
                sent_lines: Vec::new(),
                muted: false,
                fail_receive: false,
                read_size: None,
                stats: TransportStats::new(),
            })),
        }
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn transport_type(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Console"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.stats.record_connection_attempt();
        state.connected = true;
        state.stats.record_successful_connection();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.connected = false;
        state.stats.record_disconnection();
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(TransportError::SendFailed("Not connected".to_string()));
        }

        state.partial_line.push_str(&String::from_utf8_lossy(data));
        while let Some(pos) = state.partial_line.find(LINE_END) {
            let line: String = state.partial_line.drain(..pos + LINE_END.len()).collect();
            let line = line.trim_end_matches(LINE_END).to_string();
            trace!(line = %line, "Mock console input");

            if !state.muted {
                let reply = state.device.handle_line(&line);
                state.output.extend(reply.as_bytes());
            }
            state.sent_lines.push(line);
        }

        state.stats.record_bytes_sent(data.len());
        Ok(data.len())
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, TransportError> {
        {
            let mut state = self.state.lock().await;
            if !state.connected {
                return Err(TransportError::ReceiveFailed("Not connected".to_string()));
            }
            if state.fail_receive {
                return Err(TransportError::ReceiveFailed(
                    "Mock receive failure".to_string(),
                ));
            }

            if !state.output.is_empty() {
                let limit = state.read_size.unwrap_or(buffer.len()).min(buffer.len());
                let n = state.output.len().min(limit);
                for (slot, byte) in buffer.iter_mut().zip(state.output.drain(..n)) {
                    *slot = byte;
                }
                state.stats.record_bytes_received(n);
                return Ok(n);
            }
            state.stats.record_idle_read();
        }

        let wait = timeout.unwrap_or(Duration::from_millis(300));
        tokio::time::sleep(wait).await;
        Err(TransportError::Timeout(format!("No data within {wait:?}")))
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    async fn stats(&self) -> TransportStats {
        self.state.lock().await.stats.clone()
    }
}
