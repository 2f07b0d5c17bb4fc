//! Console pairing approval.

use hub_core::auth_grant::Approver;
use hub_core::secrets::short_id;

use models::AuthRequest;

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin, stdin};
use tokio::sync::Mutex;

/// Matches the lifetime of an auth-grant record.
pub const APPROVAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Asks the operator on the terminal. One prompt at a time; no answer
/// within the timeout is a denial.
pub struct ConsoleApprover<R> {
    lines: Mutex<Lines<R>>,
    timeout: Duration,
}

impl ConsoleApprover<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(stdin()), APPROVAL_TIMEOUT)
    }
}

impl<R: AsyncBufRead + Unpin + Send> ConsoleApprover<R> {
    pub fn new(reader: R, timeout: Duration) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            timeout,
        }
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Approver for ConsoleApprover<R> {
    async fn approve(&self, request: &AuthRequest) -> bool {
        let answer = tokio::time::timeout(self.timeout, async {
            let mut lines = self.lines.lock().await;
            println!(
                "Pairing request from '{}' with code {}. Approve? [y/N]",
                request.hostname, request.otp
            );
            lines.next_line().await
        })
        .await;

        let approved = match answer {
            Ok(Ok(Some(line))) => is_affirmative(&line),
            Ok(Ok(None)) => {
                warn!("Console closed; denying pairing request");
                false
            }
            Ok(Err(e)) => {
                warn!("Failed to read approval: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    "No answer for pairing request {} within {:?}",
                    short_id(&request.session_id),
                    self.timeout
                );
                false
            }
        };

        info!(
            "Pairing request {} from {}: {}",
            short_id(&request.session_id),
            request.hostname,
            if approved { "approved" } else { "denied" }
        );
        approved
    }
}
