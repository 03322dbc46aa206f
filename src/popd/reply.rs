// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/popd/reply.rs
// POP3 reply strings.

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;

const WELCOME: &str = "+OK POP3 Server Ready\r\n";
const POSITIVE: &str = "+OK\r\n";
const NEGATIVE: &str = "-ERR\r\n";
const TERMINATOR: &str = ".\r\n";

pub async fn welcome(writer: &mut OwnedWriteHalf) -> anyhow::Result<()> {
    writer.write_all(WELCOME.as_bytes()).await?;
    Ok(())
}

pub async fn positive(writer: &mut OwnedWriteHalf) -> anyhow::Result<()> {
    writer.write_all(POSITIVE.as_bytes()).await?;
    Ok(())
}

pub async fn negative(writer: &mut OwnedWriteHalf) -> anyhow::Result<()> {
    writer.write_all(NEGATIVE.as_bytes()).await?;
    Ok(())
}

/// `+OK <count> <size>` drop-listing header, also used by STAT and RSET.
pub async fn count_positive(
    writer: &mut OwnedWriteHalf,
    count: usize,
    size: usize,
) -> anyhow::Result<()> {
    let line = format!("+OK {} {}\r\n", count, size);
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

/// One `<index> <size>` scan-listing line.
pub async fn count(writer: &mut OwnedWriteHalf, index: usize, size: usize) -> anyhow::Result<()> {
    let line = format!("{} {}\r\n", index, size);
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

pub async fn terminator(writer: &mut OwnedWriteHalf) -> anyhow::Result<()> {
    writer.write_all(TERMINATOR.as_bytes()).await?;
    Ok(())
}
