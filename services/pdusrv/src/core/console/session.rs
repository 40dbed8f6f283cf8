//! Console session
//!
//! Turns the console byte stream into a request/response API. Every
//! exchange starts with a blank line to flush stray prompt state, then
//! reads with a short per-read deadline, feeding the accumulated text to
//! a step function that decides what to send next and when the exchange
//! is complete. An expired read deadline only means "nothing yet".
//!
//! One exchange runs at a time: the transport sits behind the command
//! lock.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::prompts::Prompts;
use crate::core::transport::{Transport, TransportStats};
use crate::error::{PduError, Result};

/// Command the console answers without a trailing prompt
pub const LOGOUT_COMMAND: &str = "Logout";

const LINE_END: &str = "\r\n";
const READ_CHUNK: usize = 2048;

/// Timing of a console session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Per-read idle deadline, not a request deadline
    pub read_timeout: Duration,
    /// Pause after logging out before the console accepts input again
    pub logout_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(300),
            logout_grace: Duration::from_millis(500),
        }
    }
}

/// Decision taken after each chunk of console output
#[derive(Debug, PartialEq)]
enum Step {
    /// Keep reading
    Pending,
    /// Write a line and start a fresh buffer
    Send(String),
    /// Exchange finished with this output
    Done(String),
}

#[derive(Debug)]
pub struct ConsoleSession {
    transport: Mutex<Box<dyn Transport>>,
    prompts: Prompts,
    options: SessionOptions,
}

impl ConsoleSession {
    pub fn new(transport: Box<dyn Transport>, prompts: Prompts, options: SessionOptions) -> Self {
        Self {
            transport: Mutex::new(transport),
            prompts,
            options,
        }
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub async fn connect(&self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.connect().await?;
        info!(
            "Console session open: {} ({})",
            transport.name(),
            transport.transport_type()
        );
        Ok(())
    }

    /// Release the transport; safe to call more than once
    pub async fn disconnect(&self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.disconnect().await?;
        Ok(())
    }

    pub async fn stats(&self) -> TransportStats {
        self.transport.lock().await.stats().await
    }

    /// Run one command and return its output without echo or prompt
    ///
    /// Fails with [`PduError::LoginRequired`] if the console answers with
    /// its login screen.
    pub async fn execute(&self, command: &str) -> Result<String> {
        let started = Instant::now();
        let mut transport = self.transport.lock().await;

        let prompts = &self.prompts;
        let is_logout = command == LOGOUT_COMMAND;
        let mut sent = false;

        let result = self
            .converse(&mut **transport, |buffer| {
                if buffer.ends_with(&prompts.ready) {
                    if !sent {
                        sent = true;
                        return Ok(Step::Send(command.to_string()));
                    }
                    let body = buffer.strip_suffix(prompts.ready.as_str()).unwrap_or(buffer);
                    let body = body.trim_start();
                    let body = body.strip_prefix(command).unwrap_or(body);
                    return Ok(Step::Done(body.trim().to_string()));
                }

                // After logging out the console echoes the command and stops
                if sent
                    && is_logout
                    && (buffer.trim() == command || buffer.ends_with(&prompts.username))
                {
                    return Ok(Step::Done(String::new()));
                }

                if prompts.at_login_screen(buffer) {
                    return Err(PduError::LoginRequired);
                }

                Ok(Step::Pending)
            })
            .await;

        if is_logout && result.is_ok() {
            tokio::time::sleep(self.options.logout_grace).await;
        }
        drop(transport);

        match &result {
            Ok(output) => debug!(
                command,
                took_ms = started.elapsed().as_millis() as u64,
                result_len = output.len(),
                "Executed PDU command"
            ),
            Err(e) => debug!(
                command,
                took_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "Executed PDU command"
            ),
        }
        result
    }

    /// Drive the login screen until the ready prompt appears
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        let mut transport = self.transport.lock().await;

        let prompts = &self.prompts;
        let mut sent_username = false;
        let mut sent_password = false;

        self.converse(&mut **transport, |buffer| {
            if sent_username && sent_password && buffer.contains(&prompts.invalid) {
                return Err(PduError::InvalidPassword);
            }
            if buffer.ends_with(&prompts.ready) {
                return Ok(Step::Done(String::new()));
            }
            if buffer.ends_with(&prompts.username) {
                sent_username = true;
                return Ok(Step::Send(username.to_string()));
            }
            if buffer.ends_with(&prompts.password) {
                sent_password = true;
                return Ok(Step::Send(password.to_string()));
            }
            Ok(Step::Pending)
        })
        .await
        .inspect_err(|e| warn!("Console login as {} failed: {}", username, e))?;

        Ok(())
    }

    async fn converse<F>(&self, transport: &mut dyn Transport, mut step: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<Step> + Send,
    {
        send_line(transport, "").await?;

        // Raw bytes; a UTF-8 sequence may straddle two reads
        let mut received: Vec<u8> = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = match transport
                .receive(&mut chunk, Some(self.options.read_timeout))
                .await
            {
                Ok(n) => n,
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                continue;
            }

            received.extend_from_slice(&chunk[..n]);
            let next = step(&*String::from_utf8_lossy(&received))?;
            match next {
                Step::Pending => {},
                Step::Send(line) => {
                    send_line(transport, &line).await?;
                    received.clear();
                },
                Step::Done(output) => return Ok(output),
            }
        }
    }
}

async fn send_line(transport: &mut dyn Transport, line: &str) -> Result<()> {
    let data = format!("{line}{LINE_END}");
    transport.send(data.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::core::transport::{ConsoleSimulator, MockHandle, MockTransport, TransportError};
    use tracing_test::traced_test;

    async fn session(device: ConsoleSimulator) -> (ConsoleSession, MockHandle) {
        let transport = MockTransport::new(device);
        let handle = transport.handle();
        let session = ConsoleSession::new(
            Box::new(transport),
            Prompts::default(),
            SessionOptions::default(),
        );
        session.connect().await.unwrap();
        (session, handle)
    }

    fn device() -> ConsoleSimulator {
        ConsoleSimulator::new(Prompts::default()).with_account("admin", "secret")
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_execute_strips_echo_and_prompt() {
        let (session, handle) = session(
            device()
                .logged_in_as("admin")
                .with_report("Temp", "Int. Temp:  77.0 F"),
        )
        .await;

        let output = session.execute("Temp").await.unwrap();
        assert_eq!(output, "Int. Temp:  77.0 F");
        assert_eq!(handle.sent_lines().await, vec!["", "Temp"]);
        assert!(logs_contain("Executed PDU command"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_decodes_characters_split_across_reads() {
        let (session, handle) = session(
            device()
                .logged_in_as("admin")
                .with_report("Temp", "Int. Temp:  25.0 °C"),
        )
        .await;
        handle.set_read_size(1).await;

        let output = session.execute("Temp").await.unwrap();
        assert_eq!(output, "Int. Temp:  25.0 °C");
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_at_login_screen_requires_login() {
        let (session, _handle) = session(device()).await;
        assert_eq!(
            session.execute("Status").await.unwrap_err(),
            PduError::LoginRequired
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_survives_idle_reads() {
        let (session, handle) = session(device().logged_in_as("admin")).await;
        handle.set_muted(true).await;

        // A slow console: several read deadlines pass before each reply
        let slow_console = {
            let handle = handle.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                handle.push_output("\r\nMMP-14>").await;
                tokio::time::sleep(Duration::from_secs(1)).await;
                handle.push_output("Clear\r\nMaximum currents cleared\r\nMMP-14>").await;
            })
        };

        let output = session.execute("Clear").await.unwrap();
        assert_eq!(output, "Maximum currents cleared");
        assert_eq!(handle.sent_lines().await, vec!["", "Clear"]);
        assert!(session.stats().await.idle_reads >= 2);
        slow_console.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_echo_without_prompt_succeeds() {
        let (session, handle) = session(device().logged_in_as("admin")).await;

        let output = session.execute(LOGOUT_COMMAND).await.unwrap();
        assert_eq!(output, "");
        assert_eq!(handle.current_user().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_handshake() {
        let (session, handle) = session(device()).await;

        session.authenticate("admin", "secret").await.unwrap();
        assert_eq!(handle.current_user().await.as_deref(), Some("admin"));
        assert_eq!(handle.sent_lines().await, vec!["", "admin", "secret"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_rejects_bad_password() {
        let (session, _handle) = session(device()).await;
        assert_eq!(
            session.authenticate("admin", "nope").await.unwrap_err(),
            PduError::InvalidPassword
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_receive_error_propagates() {
        let (session, handle) = session(device().logged_in_as("admin")).await;
        handle.set_receive_failure(true).await;
        assert!(matches!(
            session.execute("Status").await.unwrap_err(),
            PduError::Transport(TransportError::ReceiveFailed(_))
        ));
    }
}
