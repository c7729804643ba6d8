//! A protocol client that talks IRC over stdin/stdout.
//!
//! Every stdin line is parsed as an IRC line. Lines that do not start with a
//! prefix or an upper-case verb are treated as a channel message from
//! `you`, so `.ping` typed at the prompt works.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use kaa::prelude::*;
use kaa::core::ClientError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const CONSOLE_CHANNEL: &str = "#console";
const CONSOLE_NICK: &str = "you";

pub struct ConsoleClient {
    connected: AtomicBool,
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            stdout: Mutex::new(tokio::io::stdout()),
        })
    }
}

#[async_trait]
impl Outbound for ConsoleClient {
    async fn send(&self, target: &str, text: &str, mode: DeliveryMode) -> ClientResult<()> {
        let line = match mode {
            DeliveryMode::Message => format!("PRIVMSG {target} :{text}\r\n"),
            DeliveryMode::Notice => format!("NOTICE {target} :{text}\r\n"),
            DeliveryMode::Action => format!("PRIVMSG {target} :\u{1}ACTION {text}\u{1}\r\n"),
        };

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ProtocolClient for ConsoleClient {
    async fn connect(&self) -> ClientResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn run(&self, publisher: InboundPublisher) -> ClientResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(raw)) if raw.trim().is_empty() => continue,
                    Ok(Some(raw)) => {
                        let line = parse_line(raw.trim_end());
                        debug!(raw = %line.raw, "Received line");
                        if publisher.publish(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(error = %err, "Failed to read stdin");
                        break;
                    }
                }
            }
            debug!("Console input closed");
        });
        Ok(())
    }
}

/// Parses one IRC line. Bare text becomes a `PRIVMSG` to the console channel.
pub fn parse_line(raw: &str) -> InboundLine {
    let looks_like_irc = raw.starts_with(':')
        || raw
            .split(' ')
            .next()
            .is_some_and(|verb| verb.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    if !looks_like_irc {
        return InboundLine::privmsg(CONSOLE_NICK, CONSOLE_CHANNEL, raw);
    }

    let mut rest = raw;
    let mut sender = None;
    if let Some(stripped) = rest.strip_prefix(':') {
        let (prefix, tail) = stripped.split_once(' ').unwrap_or((stripped, ""));
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        sender = Some(nick.to_string());
        rest = tail;
    }

    let (verb, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
    let mut params = Vec::new();
    let mut trailing = None;
    while !rest.is_empty() {
        if let Some(text) = rest.strip_prefix(':') {
            trailing = Some(text.to_string());
            params.push(text.to_string());
            break;
        }
        let (param, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        if !param.is_empty() {
            params.push(param.to_string());
        }
        rest = tail;
    }

    InboundLine {
        raw: raw.to_string(),
        command: (!verb.is_empty()).then(|| verb.to_string()),
        target: params.first().cloned(),
        message: trailing.unwrap_or_default(),
        params,
        sender,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg() {
        let line = parse_line(":alice!a@example.org PRIVMSG #rust :.google cats");
        assert_eq!(line.command.as_deref(), Some("PRIVMSG"));
        assert_eq!(line.sender.as_deref(), Some("alice"));
        assert_eq!(line.target.as_deref(), Some("#rust"));
        assert_eq!(line.message, ".google cats");
        assert_eq!(line.params, ["#rust", ".google cats"]);
    }

    #[test]
    fn test_parse_join_and_numeric() {
        let join = parse_line(":bob JOIN #rust");
        assert_eq!(join.command.as_deref(), Some("JOIN"));
        assert_eq!(join.target.as_deref(), Some("#rust"));
        assert!(join.message.is_empty());

        let welcome = parse_line(":server 001 Kaa :Welcome");
        assert_eq!(welcome.command.as_deref(), Some("001"));
        assert_eq!(welcome.message, "Welcome");
    }

    #[test]
    fn test_bare_text_is_console_message() {
        let line = parse_line(".ping");
        assert_eq!(line.sender.as_deref(), Some(CONSOLE_NICK));
        assert_eq!(line.target.as_deref(), Some(CONSOLE_CHANNEL));
        assert_eq!(line.message, ".ping");
    }
}
