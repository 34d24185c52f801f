//! Publish one message body to every configured topic

use crate::config::ConnectOptions;
use crate::error::{CliError, CliResult};
use crate::transport::Session;
use bytes::Bytes;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::debug;

/// Positional value meaning "read the body from stdin"
pub const STDIN_MARKER: &str = "-";

/// Where the message body comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    /// One line of standard input
    Stdin,
    /// Whole contents of a UTF-8 file
    File(PathBuf),
    /// Text given on the command line
    Inline(String),
}

impl BodySource {
    /// Pick the source from the positional argument and `--message`
    pub fn from_args(positional: &str, message: Option<String>) -> Self {
        match message {
            Some(text) => BodySource::Inline(text),
            None if positional == STDIN_MARKER => BodySource::Stdin,
            None => BodySource::File(PathBuf::from(positional)),
        }
    }

    /// Read the body. `None` means stdin was already at end of input.
    pub fn resolve<R: BufRead>(&self, stdin: &mut R) -> CliResult<Option<String>> {
        match self {
            BodySource::Stdin => {
                let mut line = String::new();
                let read = stdin
                    .read_line(&mut line)
                    .map_err(|e| CliError::body_read("stdin", e))?;
                if read == 0 {
                    return Ok(None);
                }
                Ok(Some(strip_line_ending(line)))
            }
            BodySource::File(path) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|e| CliError::body_read(path.display().to_string(), e)),
            BodySource::Inline(text) => Ok(Some(text.clone())),
        }
    }
}

fn strip_line_ending(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

/// Connect, read the body and publish it to each topic in order.
///
/// Stops at the first failed publish; nothing is published when the body is
/// empty.
pub async fn run<S: Session, R: BufRead>(
    session: &mut S,
    options: &ConnectOptions,
    source: &BodySource,
    stdin: &mut R,
) -> CliResult<()> {
    session.connect().await.map_err(CliError::Connection)?;
    debug!(host = %options.host, port = options.port, "connected");

    let body = match source.resolve(stdin)? {
        Some(body) if !body.is_empty() => body,
        _ => return Err(CliError::EmptyBody),
    };
    let payload = Bytes::from(body);

    for topic in &options.topics {
        session
            .publish(topic, payload.clone(), options.qos)
            .await
            .map_err(CliError::Transport)?;
        debug!(topic = %topic, qos = options.qos.as_u8(), bytes = payload.len(), "published");
    }

    Ok(())
}
