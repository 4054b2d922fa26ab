use log::{debug, error, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::InputErrorPolicy;
use crate::error::{InputError, SessionError};
use crate::model::ChatCompletion;

pub const BANNER: &str = "ChatGPT CLI - Type 'exit' to quit";
pub const PROMPT: &str = "You: ";
pub const FAREWELL: &str = "Ending chat....";
const EXIT_SENTINEL: &str = "exit";

/// Interactive read/complete/print loop.
pub struct Session<R, W> {
    input: R,
    output: W,
    on_input_error: InputErrorPolicy,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W, on_input_error: InputErrorPolicy) -> Self {
        Self {
            input,
            output,
            on_input_error,
        }
    }

    /// Runs until the user types `exit` (returns `Ok`) or a turn fails.
    ///
    /// A failed completion ends the session; there is no retry.
    pub async fn run<C>(&mut self, client: &C) -> Result<(), SessionError>
    where
        C: ChatCompletion + Sync + ?Sized,
    {
        self.write_line(BANNER).await?;

        loop {
            self.write_line(PROMPT).await?;

            let line = match self.read_line().await {
                Ok(line) => line,
                Err(InputError::Closed) => return Err(InputError::Closed.into()),
                Err(e) => match self.on_input_error {
                    InputErrorPolicy::Reprompt => {
                        error!("{}", e);
                        self.write_line(&e.to_string()).await?;
                        continue;
                    }
                    InputErrorPolicy::Exit => return Err(e.into()),
                },
            };

            if is_exit(&line) {
                info!("Exit requested");
                self.write_line(FAREWELL).await?;
                return Ok(());
            }

            let text = strip_line_ending(&line);
            debug!("Forwarding {} bytes of user input", text.len());

            let reply = client.complete(text).await?;
            self.write_line(&format!("assistant: {}", reply)).await?;
        }
    }

    /// Reads one line including its terminator.
    pub async fn read_line(&mut self) -> Result<String, InputError> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .await
            .map_err(InputError::Io)?;
        if read == 0 {
            return Err(InputError::Closed);
        }
        Ok(line)
    }

    async fn write_line(&mut self, text: &str) -> Result<(), SessionError> {
        self.output
            .write_all(format!("{}\n", text).as_bytes())
            .await
            .map_err(SessionError::Output)?;
        self.output.flush().await.map_err(SessionError::Output)
    }
}

/// True for any casing of `exit` surrounded by whitespace.
pub fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXIT_SENTINEL)
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
