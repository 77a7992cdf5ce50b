//! Interactive authorization prompt.

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::api::BoxFuture;
use crate::error::{CalendarError, CalendarResult};

/// Shows the authorization URL to the user and reads back what they paste.
///
/// This is the only place where the tool waits on a human. No timeout is
/// applied; callers wanting one should wrap the credential request in
/// `tokio::time::timeout`.
pub trait CodePrompt: Send + Sync {
    /// Presents `auth_url` and returns one line of user input.
    fn ask<'a>(&'a self, auth_url: &'a str) -> BoxFuture<'a, CalendarResult<String>>;
}

/// Prompt on the terminal: URL on stderr, one line read from stdin.
#[derive(Debug, Clone)]
pub struct StdinPrompt {
    open_browser: bool,
}

impl StdinPrompt {
    /// Creates a terminal prompt that also tries to open the browser.
    pub fn new() -> Self {
        Self { open_browser: true }
    }

    /// Enables or disables opening the URL in the default browser.
    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl CodePrompt for StdinPrompt {
    fn ask<'a>(&'a self, auth_url: &'a str) -> BoxFuture<'a, CalendarResult<String>> {
        Box::pin(async move {
            eprintln!("\nAuthorize this app by visiting this url:\n\n{}\n", auth_url);

            if self.open_browser {
                match open::that(auth_url) {
                    Ok(()) => debug!("opened authorization URL in browser"),
                    Err(e) => warn!(error = %e, "failed to open browser"),
                }
            }

            eprint!("Enter the code (or the full redirect URL) from that page here: ");
            let _ = std::io::stderr().flush();

            let mut line = String::new();
            let read = BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .map_err(|e| {
                    CalendarError::authorization(format!("failed to read authorization code: {}", e))
                        .with_source(e)
                })?;

            if read == 0 {
                return Err(CalendarError::authorization(
                    "input closed before an authorization code was entered",
                ));
            }
            Ok(line)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdin_prompt_browser_toggle() {
        let prompt = StdinPrompt::default();
        assert!(prompt.open_browser);
        assert!(!prompt.with_open_browser(false).open_browser);
    }
}
