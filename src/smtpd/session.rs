// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/smtpd/session.rs
// Session of SMTPd.

use super::reply::{self, SmtpReply};
use crate::linebuf::{self, LineBuffer};
use crate::store::{MailStore, Store};
use crate::{conf, constants};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

const DATA_TERMINATOR: &[u8] = b".\r\n";

/// Each state carries only the envelope fields that are live in it, so
/// a transaction cannot be observed half-built.
pub enum SmtpSessionStatus {
    Init,
    Hello,
    Sender {
        reverse_path: String,
    },
    Rcpt {
        reverse_path: String,
        forward_paths: Vec<String>,
    },
    Data {
        reverse_path: String,
        forward_paths: Vec<String>,
        body: Vec<u8>,
        overflow: bool,
    },
}

pub struct SmtpSession {
    pub config: Arc<conf::Config>,
    pub store: Arc<Store>,
    pub addr: SocketAddr,
    pub reader: LineBuffer<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
    pub status: SmtpSessionStatus,
}

impl SmtpSession {
    pub fn new(
        config: Arc<conf::Config>,
        store: Arc<Store>,
        addr: SocketAddr,
        stream: TcpStream,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        SmtpSession {
            config,
            store,
            addr,
            reader: LineBuffer::new(reader, constants::MAX_LINE_LENGTH),
            writer,
            status: SmtpSessionStatus::Init,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        reply::welcome(&mut self.writer, &self.config.domain).await?;
        let mut line = Vec::with_capacity(constants::MAX_LINE_LENGTH);
        loop {
            match self.reader.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }

            // message content only needs the CRLF terminator; command
            // lines are held to the strict form
            let admissible = match &self.status {
                SmtpSessionStatus::Data { .. } => linebuf::ends_with_crlf(&line),
                _ => linebuf::is_well_formed(&line),
            };
            if !admissible {
                SmtpReply::new(500).send(&mut self.writer).await?;
                continue;
            }

            let status = std::mem::replace(&mut self.status, SmtpSessionStatus::Init);
            let (status, open) = match status {
                SmtpSessionStatus::Data {
                    reverse_path,
                    forward_paths,
                    body,
                    overflow,
                } => {
                    self.data(reverse_path, forward_paths, body, overflow, &line)
                        .await?
                }
                status => self.command(status, &line).await?,
            };
            self.status = status;
            if !open {
                break;
            }
        }
        Ok(())
    }

    async fn command(
        &mut self,
        status: SmtpSessionStatus,
        line: &[u8],
    ) -> anyhow::Result<(SmtpSessionStatus, bool)> {
        let text = String::from_utf8_lossy(line);
        let command = linebuf::first_token(&text);
        debug!("{} SMTP <- {}", self.addr, text.trim_end());

        // accepted in every state except DATA, ahead of the state rules
        if command.eq_ignore_ascii_case("NOOP") {
            SmtpReply::new(250).send(&mut self.writer).await?;
            return Ok((status, true));
        }
        if command.eq_ignore_ascii_case("QUIT") {
            SmtpReply::new(221).send(&mut self.writer).await?;
            return Ok((status, false));
        }
        if is_one_of(command, &["EHLO", "RSET", "VRFY", "EXPN", "HELP"]) {
            SmtpReply::new(502).send(&mut self.writer).await?;
            return Ok((status, true));
        }

        match status {
            SmtpSessionStatus::Init => {
                if command.eq_ignore_ascii_case("HELO") {
                    reply::hello(&mut self.writer, &self.config.domain).await?;
                    Ok((SmtpSessionStatus::Hello, true))
                } else if is_one_of(command, &["MAIL", "RCPT", "DATA"]) {
                    SmtpReply::new(503).send(&mut self.writer).await?;
                    Ok((SmtpSessionStatus::Init, true))
                } else {
                    SmtpReply::new(500).send(&mut self.writer).await?;
                    Ok((SmtpSessionStatus::Init, true))
                }
            }
            SmtpSessionStatus::Hello => {
                if command.eq_ignore_ascii_case("MAIL") {
                    match linebuf::argument(&text).and_then(|args| bracket_path(args, "FROM:<")) {
                        Some(address) => {
                            let reverse_path = address.to_string();
                            SmtpReply::new(250).send(&mut self.writer).await?;
                            Ok((SmtpSessionStatus::Sender { reverse_path }, true))
                        }
                        None => {
                            SmtpReply::new(501).send(&mut self.writer).await?;
                            Ok((SmtpSessionStatus::Hello, true))
                        }
                    }
                } else if is_one_of(command, &["HELO", "RCPT", "DATA"]) {
                    SmtpReply::new(503).send(&mut self.writer).await?;
                    Ok((SmtpSessionStatus::Hello, true))
                } else {
                    SmtpReply::new(500).send(&mut self.writer).await?;
                    Ok((SmtpSessionStatus::Hello, true))
                }
            }
            SmtpSessionStatus::Sender { reverse_path } => {
                if command.eq_ignore_ascii_case("RCPT") {
                    self.rcpt(&text, reverse_path, Vec::new()).await
                } else if is_one_of(command, &["HELO", "MAIL", "DATA"]) {
                    SmtpReply::new(503).send(&mut self.writer).await?;
                    Ok((SmtpSessionStatus::Sender { reverse_path }, true))
                } else {
                    SmtpReply::new(500).send(&mut self.writer).await?;
                    Ok((SmtpSessionStatus::Sender { reverse_path }, true))
                }
            }
            SmtpSessionStatus::Rcpt {
                reverse_path,
                forward_paths,
            } => {
                if command.eq_ignore_ascii_case("DATA") && line.len() == 6 {
                    SmtpReply::new(354).send(&mut self.writer).await?;
                    Ok((
                        SmtpSessionStatus::Data {
                            reverse_path,
                            forward_paths,
                            body: Vec::with_capacity(constants::DATA_BUFFER_INITIAL),
                            overflow: false,
                        },
                        true,
                    ))
                } else if command.eq_ignore_ascii_case("RCPT") {
                    self.rcpt(&text, reverse_path, forward_paths).await
                } else if is_one_of(command, &["HELO", "MAIL"]) {
                    SmtpReply::new(503).send(&mut self.writer).await?;
                    Ok((
                        SmtpSessionStatus::Rcpt {
                            reverse_path,
                            forward_paths,
                        },
                        true,
                    ))
                } else {
                    SmtpReply::new(500).send(&mut self.writer).await?;
                    Ok((
                        SmtpSessionStatus::Rcpt {
                            reverse_path,
                            forward_paths,
                        },
                        true,
                    ))
                }
            }
            status @ SmtpSessionStatus::Data { .. } => {
                // message content is routed to data(); a command line
                // cannot arrive here
                SmtpReply::new(500).send(&mut self.writer).await?;
                Ok((status, true))
            }
        }
    }

    /// RCPT handling shared by the Sender and Rcpt states.
    async fn rcpt(
        &mut self,
        text: &str,
        reverse_path: String,
        mut forward_paths: Vec<String>,
    ) -> anyhow::Result<(SmtpSessionStatus, bool)> {
        match linebuf::argument(text).and_then(|args| bracket_path(args, "TO:<")) {
            Some(address) => {
                if forward_paths.len() >= constants::MAX_RECIPIENTS {
                    SmtpReply::new(451).send(&mut self.writer).await?;
                } else if self.store.validate(address, None).await {
                    forward_paths.push(address.to_string());
                    SmtpReply::new(250).send(&mut self.writer).await?;
                } else {
                    SmtpReply::new(555).send(&mut self.writer).await?;
                }
            }
            None => SmtpReply::new(501).send(&mut self.writer).await?,
        }
        if forward_paths.is_empty() {
            Ok((SmtpSessionStatus::Sender { reverse_path }, true))
        } else {
            Ok((
                SmtpSessionStatus::Rcpt {
                    reverse_path,
                    forward_paths,
                },
                true,
            ))
        }
    }

    async fn data(
        &mut self,
        reverse_path: String,
        forward_paths: Vec<String>,
        mut body: Vec<u8>,
        mut overflow: bool,
        line: &[u8],
    ) -> anyhow::Result<(SmtpSessionStatus, bool)> {
        if line == DATA_TERMINATOR {
            if overflow {
                SmtpReply::new(451).send(&mut self.writer).await?;
            } else {
                match self.commit(&body, &forward_paths).await {
                    Ok(()) => SmtpReply::new(250).send(&mut self.writer).await?,
                    Err(e) => {
                        debug!("{} delivery failed: {}", self.addr, e);
                        SmtpReply::new(451).send(&mut self.writer).await?;
                    }
                }
            }
            // the transaction is finished either way
            return Ok((SmtpSessionStatus::Hello, true));
        }

        if body.len() + line.len() > constants::DATA_BUFFER_MAX {
            overflow = true;
        } else {
            body.extend_from_slice(line);
        }
        Ok((
            SmtpSessionStatus::Data {
                reverse_path,
                forward_paths,
                body,
                overflow,
            },
            true,
        ))
    }

    /// Spools the finished body to a temporary file whose contents are
    /// handed to the store for every recipient, then removes the spool.
    async fn commit(&self, body: &[u8], recipients: &[String]) -> anyhow::Result<()> {
        let mut spool = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut spool, body)?;
        let spooled = std::fs::read(spool.path())?;
        self.store.deliver(&spooled, recipients).await?;
        spool.close()?;
        Ok(())
    }
}

fn is_one_of(command: &str, set: &[&str]) -> bool {
    set.iter().any(|c| command.eq_ignore_ascii_case(c))
}

/// MAIL/RCPT path argument: the case-insensitive `prefix`, a final '>',
/// and at least one character between the first '<' and the last '>'.
fn bracket_path<'a>(args: &'a str, prefix: &str) -> Option<&'a str> {
    let head = args.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let open = args.find('<')?;
    let close = args.rfind('>')?;
    if close <= open + 1 || !args.ends_with('>') {
        return None;
    }
    Some(&args[open + 1..close])
}

#[cfg(test)]
mod tests {
    use super::bracket_path;

    #[test]
    fn accepts_bracketed_paths() {
        assert_eq!(bracket_path("FROM:<a@x>", "FROM:<"), Some("a@x"));
        assert_eq!(bracket_path("from:<a@x>", "FROM:<"), Some("a@x"));
        assert_eq!(bracket_path("TO:<bob@host>", "TO:<"), Some("bob@host"));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(bracket_path("FROM:<>", "FROM:<"), None);
        assert_eq!(bracket_path("FROM:a@x", "FROM:<"), None);
        assert_eq!(bracket_path("FROM:<a@x", "FROM:<"), None);
        assert_eq!(bracket_path("FROM:<a@x> x", "FROM:<"), None);
        assert_eq!(bracket_path("TO:<a@x>", "FROM:<"), None);
        assert_eq!(bracket_path("", "FROM:<"), None);
    }
}
