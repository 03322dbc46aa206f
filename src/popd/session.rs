// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/popd/session.rs
// Session of POP3d.

use super::reply;
use crate::linebuf::{self, LineBuffer};
use crate::store::{MailStore, Mailbox, Store};
use crate::{conf, constants};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

/// The payload carries only what is live in each state: the accepted
/// USER name while authorizing, the mailbox snapshot afterwards.
pub enum Pop3SessionStatus {
    Authorization { accepted_user: Option<String> },
    Transaction { mailbox: Mailbox },
}

pub struct Pop3Session {
    pub config: Arc<conf::Config>,
    pub store: Arc<Store>,
    pub addr: SocketAddr,
    pub reader: LineBuffer<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
    pub status: Pop3SessionStatus,
}

impl Pop3Session {
    pub fn new(
        config: Arc<conf::Config>,
        store: Arc<Store>,
        addr: SocketAddr,
        stream: TcpStream,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        Pop3Session {
            config,
            store,
            addr,
            reader: LineBuffer::new(reader, constants::MAX_LINE_LENGTH),
            writer,
            status: Pop3SessionStatus::Authorization {
                accepted_user: None,
            },
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        reply::welcome(&mut self.writer).await?;
        let mut line = Vec::with_capacity(constants::MAX_LINE_LENGTH);
        loop {
            match self.reader.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if !linebuf::is_well_formed(&line) {
                reply::negative(&mut self.writer).await?;
                continue;
            }
            let text = String::from_utf8_lossy(&line).into_owned();
            debug!("{} POP3 <- {}", self.addr, text.trim_end());

            let status = std::mem::replace(
                &mut self.status,
                Pop3SessionStatus::Authorization {
                    accepted_user: None,
                },
            );
            let (status, open) = match status {
                Pop3SessionStatus::Authorization { accepted_user } => {
                    self.authorization(accepted_user, &text).await?
                }
                Pop3SessionStatus::Transaction { mailbox } => {
                    self.transaction(mailbox, &text).await?
                }
            };
            self.status = status;
            if !open {
                break;
            }
        }
        Ok(())
    }

    async fn authorization(
        &mut self,
        accepted_user: Option<String>,
        line: &str,
    ) -> anyhow::Result<(Pop3SessionStatus, bool)> {
        let command = linebuf::first_token(line);

        if command.eq_ignore_ascii_case("USER") {
            if line.len() > 6 {
                if let Some(name) = linebuf::argument(line) {
                    if self.store.validate(name, None).await {
                        reply::positive(&mut self.writer).await?;
                        return Ok((
                            Pop3SessionStatus::Authorization {
                                accepted_user: Some(name.to_string()),
                            },
                            true,
                        ));
                    }
                }
            }
            reply::negative(&mut self.writer).await?;
            return Ok((
                Pop3SessionStatus::Authorization {
                    accepted_user: None,
                },
                true,
            ));
        }

        if command.eq_ignore_ascii_case("PASS") {
            if let (Some(name), Some(password)) =
                (accepted_user.as_deref(), linebuf::argument(line))
            {
                if self.store.validate(name, Some(password)).await {
                    if let Ok(mailbox) = self.store.load_mailbox(name).await {
                        reply::positive(&mut self.writer).await?;
                        return Ok((Pop3SessionStatus::Transaction { mailbox }, true));
                    }
                }
            }
            reply::negative(&mut self.writer).await?;
            return Ok((
                Pop3SessionStatus::Authorization {
                    accepted_user: None,
                },
                true,
            ));
        }

        if command.eq_ignore_ascii_case("QUIT") && line.len() == 6 {
            reply::positive(&mut self.writer).await?;
            return Ok((
                Pop3SessionStatus::Authorization { accepted_user },
                false,
            ));
        }

        reply::negative(&mut self.writer).await?;
        Ok((Pop3SessionStatus::Authorization { accepted_user }, true))
    }

    async fn transaction(
        &mut self,
        mut mailbox: Mailbox,
        line: &str,
    ) -> anyhow::Result<(Pop3SessionStatus, bool)> {
        let command = linebuf::first_token(line);

        if command.eq_ignore_ascii_case("STAT") && line.len() == 6 {
            reply::count_positive(&mut self.writer, mailbox.count(), mailbox.total_size())
                .await?;
        } else if command.eq_ignore_ascii_case("LIST") {
            if line.len() == 6 {
                reply::count_positive(&mut self.writer, mailbox.count(), mailbox.total_size())
                    .await?;
                for (index, item) in mailbox.positions() {
                    reply::count(&mut self.writer, index, item.size()).await?;
                }
                reply::terminator(&mut self.writer).await?;
            } else {
                match numeric_argument(line).and_then(|index| {
                    mailbox.item(index).map(|item| (index, item.size()))
                }) {
                    Some((index, size)) => {
                        reply::count_positive(&mut self.writer, index, size).await?
                    }
                    None => reply::negative(&mut self.writer).await?,
                }
            }
        } else if command.eq_ignore_ascii_case("RETR") {
            match numeric_argument(line).and_then(|index| mailbox.item(index)) {
                Some(item) => {
                    reply::positive(&mut self.writer).await?;
                    self.stream_body(item.body()).await?;
                    reply::terminator(&mut self.writer).await?;
                }
                None => reply::negative(&mut self.writer).await?,
            }
        } else if command.eq_ignore_ascii_case("DELE") {
            let marked = numeric_argument(line)
                .map(|index| mailbox.mark_deleted(index))
                .unwrap_or(false);
            if marked {
                reply::positive(&mut self.writer).await?;
            } else {
                reply::negative(&mut self.writer).await?;
            }
        } else if command.eq_ignore_ascii_case("NOOP") {
            reply::positive(&mut self.writer).await?;
        } else if command.eq_ignore_ascii_case("RSET") && line.len() == 6 {
            mailbox.reset_deletions();
            reply::count_positive(&mut self.writer, mailbox.count(), mailbox.total_size())
                .await?;
        } else if command.eq_ignore_ascii_case("QUIT") && line.len() == 6 {
            drop(mailbox);
            reply::positive(&mut self.writer).await?;
            return Ok((
                Pop3SessionStatus::Authorization {
                    accepted_user: None,
                },
                false,
            ));
        } else {
            reply::negative(&mut self.writer).await?;
        }

        Ok((Pop3SessionStatus::Transaction { mailbox }, true))
    }

    /// Streams stored message bytes line by line, as they are on disk.
    async fn stream_body(&mut self, body: &[u8]) -> anyhow::Result<()> {
        use tokio::io::AsyncWriteExt;
        for chunk in body.split_inclusive(|&b| b == b'\n') {
            self.writer.write_all(chunk).await?;
        }
        Ok(())
    }
}

/// The argument as a message index: non-empty, ASCII decimal digits only.
fn numeric_argument(line: &str) -> Option<usize> {
    let arg = linebuf::argument(line)?;
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    arg.parse().ok()
}
