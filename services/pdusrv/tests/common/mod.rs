//! Shared fixtures: console transcripts and a line-oriented fake console
//! served over TCP.

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const READY: &str = "MMP-14>";
pub const USERNAME_PROMPT: &str = "Enter user name: ";
pub const PASSWORD_PROMPT: &str = "Enter Password: ";
pub const INVALID: &str = "Invalid user/password!";

/// `Status` report: 86 °F, three breaker rows, four group rows
pub const STATUS_REPORT: &str = "\
Int. Temp:   86.0 F\r
Total kW-h: 1234\r
Switch 1: Closed 2: Open\r
\r
| Breaker         | True RMS  | Peak RMS  |\r
| Input A         |  3.5 Amps |  4.1 Amps |\r
| CKT1            |  2.0 Amps |  2.5 Amps |\r
| CKT2            |  1.5 Amps |  1.9 Amps |\r
\r
| Group           | True RMS  | Peak RMS  | True RMS     | Average    | Volt-   |\r
| Circuit M1      |  1.0 Amps |  1.2 Amps | 120.0 Volts  | 120 Watts  | 125 VA  |\r
| Circuit M2      |  1.0 Amps |  1.1 Amps | 120.0 Volts  | 118 Watts  | 121 VA  |\r
| Circuit M3      |  0.5 Amps |  0.7 Amps | 119.5 Volts  |  60 Watts  |  62 VA  |\r
| Circuit M4      |  1.0 Amps |  1.4 Amps | 119.5 Volts  | 119 Watts  | 122 VA  |\r
";

/// Same report without the breaker table
pub const STATUS_REPORT_NO_BREAKERS: &str = "\
Int. Temp:   86.0 F\r
Total kW-h: 1234\r
Switch 1: Closed 2: Open\r
\r
| Group           | True RMS  | Peak RMS  | True RMS     | Average    | Volt-   |\r
| Circuit M1      |  1.0 Amps |  1.2 Amps | 120.0 Volts  | 120 Watts  | 125 VA  |\r
";

/// `Ostatus` report: outlets 1..=7
pub const OSTATUS_REPORT: &str = "\
| Outlet Name     | True RMS | Peak RMS | True RMS | Average | Volt-  |           |\r
|                 | Current  | Current  | Voltage  | Power   | Amps   | State     |\r
| Outlet 1        |   0.5 A  |   0.9 A  | 120.0 V  |   60 W  |  62 VA | On        |\r
| Outlet 2        |   0.0 A  |   0.0 A  | 120.0 V  |    0 W  |   0 VA | Off       |\r
| Outlet 3        |   0.2 A  |   0.3 A  | 120.0 V  |   24 W  |  25 VA | On        |\r
| Outlet 4        |   0.0 A  |   0.0 A  | 120.0 V  |    0 W  |   0 VA | Off Locked|\r
| Outlet 5        |   0.0 A  |   0.0 A  | 120.0 V  |    0 W  |   0 VA | Off       |\r
| storage-a       |   1.0 A  |   1.2 A  | 120.0 V  |  120 W  | 124 VA | On Locked |\r
| storage-b       |   0.9 A  |   1.1 A  | 120.0 V  |  108 W  | 110 VA | On        |\r
";

struct ConsoleState {
    account: (String, String),
    user: Option<String>,
    pending_user: Option<String>,
    lines: Vec<String>,
}

impl ConsoleState {
    fn reply(&mut self, line: &str) -> String {
        self.lines.push(line.to_string());

        let Some(user) = self.user.clone() else {
            return self.login_screen(line);
        };

        match line {
            "" => format!("\r\n{READY}"),
            "Logout" => {
                self.user = None;
                "Logout\r\n".to_string()
            },
            "Whoami" => format!("Whoami\r\nCurrent User: {user}\r\n\r\n{READY}"),
            "Status" => format!("Status\r\n{STATUS_REPORT}\r\n{READY}"),
            "Ostatus" => format!("Ostatus\r\n{OSTATUS_REPORT}\r\n{READY}"),
            "Temp" => format!("Temp\r\nInt. Temp:   86.0 F\r\n{READY}"),
            other => format!("{other}\r\n\r\n{READY}"),
        }
    }

    fn login_screen(&mut self, line: &str) -> String {
        if line.is_empty() {
            self.pending_user = None;
            return format!("\r\n{USERNAME_PROMPT}");
        }
        match self.pending_user.take() {
            None => {
                self.pending_user = Some(line.to_string());
                format!("{line}\r\n{PASSWORD_PROMPT}")
            },
            Some(user) if user == self.account.0 && line == self.account.1 => {
                self.user = Some(user);
                format!("\r\n{READY}")
            },
            Some(_) => format!("\r\n{INVALID}\r\n{USERNAME_PROMPT}"),
        }
    }
}

/// Lines received by a [`spawn_console`] server
#[derive(Clone)]
pub struct ConsoleLog(Arc<Mutex<ConsoleState>>);

impl ConsoleLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().lines.clone()
    }

    pub fn current_user(&self) -> Option<String> {
        self.0.lock().unwrap().user.clone()
    }
}

/// Serve one console connection on an ephemeral port
///
/// Returns the `tcp://` address and the line log.
pub async fn spawn_console(username: &str, password: &str) -> (String, ConsoleLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("tcp://{}", listener.local_addr().unwrap());
    let state = Arc::new(Mutex::new(ConsoleState {
        account: (username.to_string(), password.to_string()),
        user: None,
        pending_user: None,
        lines: Vec::new(),
    }));
    let log = ConsoleLog(Arc::clone(&state));

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut pending = String::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            pending.push_str(&String::from_utf8_lossy(&buf[..n]));
            while let Some(pos) = pending.find("\r\n") {
                let line: String = pending.drain(..pos + 2).collect();
                let reply = state.lock().unwrap().reply(line.trim_end_matches("\r\n"));
                if stream.write_all(reply.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    });

    (address, log)
}
