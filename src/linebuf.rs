// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/linebuf.rs
// Buffered line reading and line validation.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Turns a byte stream into protocol lines of bounded length.
///
/// Bytes received past the first LF are cached for the next call, so a
/// peer that batches several lines into one segment is still handled one
/// line at a time.
pub struct LineBuffer<R> {
    stream: R,
    buf: Box<[u8]>,
    avail: usize,
}

impl<R> LineBuffer<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(stream: R, max_line: usize) -> Self {
        LineBuffer {
            stream,
            buf: vec![0u8; max_line].into_boxed_slice(),
            avail: 0,
        }
    }

    /// Reads the next line, LF included, into `out`.
    ///
    /// Returns the line length, or 0 when the peer closed the stream at a
    /// line boundary. A close in the middle of a line hands back whatever
    /// was buffered. When the buffer fills without an LF the full
    /// `max_line` bytes come back as one unterminated line; the CRLF
    /// check rejects it downstream. At most `max_line` bytes per call.
    pub async fn read_line(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        let len = loop {
            if let Some(pos) = self.buf[..self.avail].iter().position(|&b| b == b'\n') {
                break pos + 1;
            }
            if self.avail == self.buf.len() {
                break self.avail;
            }
            let n = self.stream.read(&mut self.buf[self.avail..]).await?;
            if n == 0 {
                if self.avail == 0 {
                    return Ok(0);
                }
                break self.avail;
            }
            self.avail += n;
        };

        out.clear();
        out.extend_from_slice(&self.buf[..len]);
        self.buf.copy_within(len..self.avail, 0);
        self.avail -= len;
        Ok(len)
    }
}

/// Strict command-line form: at least three bytes, CRLF-terminated, and
/// the byte before the CR is not whitespace. A bare CRLF fails.
pub fn is_well_formed(line: &[u8]) -> bool {
    line.len() >= 3 && line.ends_with(b"\r\n") && !line[line.len() - 3].is_ascii_whitespace()
}

/// Relaxed form used inside an SMTP DATA transmission, where empty lines
/// and trailing whitespace are message content.
pub fn ends_with_crlf(line: &[u8]) -> bool {
    line.len() >= 2 && line.ends_with(b"\r\n")
}

/// First whitespace-delimited word of a command line.
pub fn first_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Everything after the first space, up to the trailing CR.
pub fn argument(line: &str) -> Option<&str> {
    let line = line.strip_suffix("\r\n").unwrap_or(line);
    line.split_once(' ').map(|(_, args)| args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn splits_batched_lines() {
        let mut reader = LineBuffer::new(&b"USER alice\r\nPASS pw\r\n"[..], 1024);
        let mut out = Vec::new();
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 12);
        assert_eq!(out, b"USER alice\r\n");
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 9);
        assert_eq!(out, b"PASS pw\r\n");
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn joins_fragmented_line() {
        let (client, server) = tokio::io::duplex(64);
        let mut reader = LineBuffer::new(server, 1024);
        let write = tokio::spawn(async move {
            let mut client = client;
            client.write_all(b"STA").await.unwrap();
            client.write_all(b"T\r\n").await.unwrap();
        });
        let mut out = Vec::new();
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 6);
        assert_eq!(out, b"STAT\r\n");
        write.await.unwrap();
    }

    #[tokio::test]
    async fn overlong_line_is_capped() {
        let mut input = vec![b'a'; 1030];
        input.extend_from_slice(b"\r\n");
        let mut reader = LineBuffer::new(&input[..], 1024);
        let mut out = Vec::new();

        // first call hands back a full unterminated buffer
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 1024);
        assert!(!out.ends_with(b"\n"));

        // the tail of the line follows on the next call
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 8);
        assert_eq!(out, b"aaaaaa\r\n");
    }

    #[tokio::test]
    async fn flushes_partial_line_on_close() {
        let mut reader = LineBuffer::new(&b"QUIT"[..], 1024);
        let mut out = Vec::new();
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 4);
        assert_eq!(out, b"QUIT");
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clean_close_returns_zero() {
        let mut reader = LineBuffer::new(&b""[..], 1024);
        let mut out = Vec::new();
        assert_eq!(reader.read_line(&mut out).await.unwrap(), 0);
    }

    #[test]
    fn well_formed_lines() {
        assert!(is_well_formed(b"STAT\r\n"));
        assert!(is_well_formed(b"a\r\n"));
        assert!(!is_well_formed(b"\r\n"));
        assert!(!is_well_formed(b"STAT \r\n"));
        assert!(!is_well_formed(b"STAT\t\r\n"));
        assert!(!is_well_formed(b"STAT\n"));
        assert!(!is_well_formed(b"STAT"));
    }

    #[test]
    fn relaxed_lines() {
        assert!(ends_with_crlf(b"\r\n"));
        assert!(ends_with_crlf(b"body text \r\n"));
        assert!(!ends_with_crlf(b"body"));
        assert!(!ends_with_crlf(b"\n"));
    }

    #[test]
    fn token_and_argument() {
        assert_eq!(first_token("RETR 1\r\n"), "RETR");
        assert_eq!(first_token("\r\n"), "");
        assert_eq!(argument("USER alice\r\n"), Some("alice"));
        assert_eq!(argument("USER  alice\r\n"), Some(" alice"));
        assert_eq!(argument("QUIT\r\n"), None);
        assert_eq!(
            argument("MAIL FROM:<a@x> extra\r\n"),
            Some("FROM:<a@x> extra")
        );
    }
}
