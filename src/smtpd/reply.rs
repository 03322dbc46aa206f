// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/smtpd/reply.rs
// SMTP status replies.

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;

/// The fixed status lines the daemon emits. Every literal lives here.
pub enum SmtpReply {
    Quit(&'static str),
    Ok(&'static str),
    DataStart(&'static str),
    ProcessingError(&'static str),
    SyntaxError(&'static str),
    ParamSyntaxError(&'static str),
    CommandNotImplemented(&'static str),
    BadSequence(&'static str),
    UnknownRecipient(&'static str),
}

impl SmtpReply {
    pub fn new(code: u16) -> Self {
        match code {
            221 => SmtpReply::Quit("221 OK\r\n"),
            250 => SmtpReply::Ok("250 OK\r\n"),
            354 => SmtpReply::DataStart("354 End data with <CRLF>.<CRLF>\r\n"),
            451 => SmtpReply::ProcessingError(
                "451 Requested action aborted: error in processing\r\n",
            ),
            501 => SmtpReply::ParamSyntaxError("501 Syntax error in parameters or arguments\r\n"),
            502 => SmtpReply::CommandNotImplemented("502 Command not implemented\r\n"),
            503 => SmtpReply::BadSequence("503 Bad sequence of commands\r\n"),
            555 => SmtpReply::UnknownRecipient("555 Recipient not recognized\r\n"),
            _ => SmtpReply::SyntaxError("500 Syntax error, command unrecognized\r\n"),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SmtpReply::Quit(msg) => msg,
            SmtpReply::Ok(msg) => msg,
            SmtpReply::DataStart(msg) => msg,
            SmtpReply::ProcessingError(msg) => msg,
            SmtpReply::SyntaxError(msg) => msg,
            SmtpReply::ParamSyntaxError(msg) => msg,
            SmtpReply::CommandNotImplemented(msg) => msg,
            SmtpReply::BadSequence(msg) => msg,
            SmtpReply::UnknownRecipient(msg) => msg,
        }
    }

    pub async fn send(self, writer: &mut OwnedWriteHalf) -> anyhow::Result<()> {
        writer.write_all(self.message().as_bytes()).await?;
        Ok(())
    }
}

pub async fn welcome(writer: &mut OwnedWriteHalf, domain: &str) -> anyhow::Result<()> {
    let banner = format!("220 {} SMTP Server Ready\r\n", domain);
    writer.write_all(banner.as_bytes()).await?;
    Ok(())
}

pub async fn hello(writer: &mut OwnedWriteHalf, domain: &str) -> anyhow::Result<()> {
    let message = format!("250 {}\r\n", domain);
    writer.write_all(message.as_bytes()).await?;
    Ok(())
}
