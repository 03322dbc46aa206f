// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// tests/pop3.rs
// Wire-level tests of the POP3 daemon.

use arcpost::conf::Config;
use arcpost::popd::server::Pop3Server;
use arcpost::store::{MemoryStore, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

async fn start_server(store: MemoryStore) -> SocketAddr {
    let config = Arc::new(Config::default());
    let store = Arc::new(Store::Memory(store));
    let mut server = Pop3Server::new(config, store);
    let addr = server.add("127.0.0.1:0").await.unwrap();
    std::mem::forget(server.run());
    addr
}

/// alice/pw with a single 100-octet message.
async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_user("alice", "pw").await;
    let mut body = vec![b'x'; 98];
    body.extend_from_slice(b"\r\n");
    store.push_mail("alice", &body).await.unwrap();
    store
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Client {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    async fn send(&mut self, line: &str) {
        self.send_raw(format!("{}\r\n", line).as_bytes()).await;
    }

    /// One reply line, CRLF included. Empty when the peer closed.
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line
    }
}

#[tokio::test]
async fn happy_path_with_delete_and_reset() {
    let addr = start_server(seeded_store().await).await;
    let mut client = Client::connect(addr).await;
    assert_eq!(client.recv().await, "+OK POP3 Server Ready\r\n");

    client.send("USER alice").await;
    assert_eq!(client.recv().await, "+OK\r\n");
    client.send("PASS pw").await;
    assert_eq!(client.recv().await, "+OK\r\n");

    client.send("STAT").await;
    assert_eq!(client.recv().await, "+OK 1 100\r\n");

    client.send("LIST").await;
    assert_eq!(client.recv().await, "+OK 1 100\r\n");
    assert_eq!(client.recv().await, "1 100\r\n");
    assert_eq!(client.recv().await, ".\r\n");

    client.send("DELE 1").await;
    assert_eq!(client.recv().await, "+OK\r\n");
    client.send("STAT").await;
    assert_eq!(client.recv().await, "+OK 0 0\r\n");

    client.send("RSET").await;
    assert_eq!(client.recv().await, "+OK 1 100\r\n");

    client.send("QUIT").await;
    assert_eq!(client.recv().await, "+OK\r\n");
    assert_eq!(client.recv().await, "");
}

#[tokio::test]
async fn user_argument_and_line_validation() {
    let addr = start_server(seeded_store().await).await;
    let mut client = Client::connect(addr).await;
    client.recv().await;

    // missing argument
    client.send("USER").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    // trailing whitespace before the CRLF
    client.send_raw(b"USER alice \r\n").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    // bare LF is not a line terminator
    client.send_raw(b"USER alice\n").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    // unknown user
    client.send("USER mallory").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    // the session is still usable
    client.send("USER alice").await;
    assert_eq!(client.recv().await, "+OK\r\n");
}

#[tokio::test]
async fn pass_requires_prior_user() {
    let addr = start_server(seeded_store().await).await;
    let mut client = Client::connect(addr).await;
    client.recv().await;

    client.send("PASS pw").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    // still in authorization
    client.send("USER alice").await;
    assert_eq!(client.recv().await, "+OK\r\n");
    client.send("PASS pw").await;
    assert_eq!(client.recv().await, "+OK\r\n");
}

#[tokio::test]
async fn failed_pass_clears_accepted_user() {
    let addr = start_server(seeded_store().await).await;
    let mut client = Client::connect(addr).await;
    client.recv().await;

    client.send("USER alice").await;
    assert_eq!(client.recv().await, "+OK\r\n");
    client.send("PASS wrong").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    // the earlier USER no longer counts
    client.send("PASS pw").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    client.send("USER alice").await;
    assert_eq!(client.recv().await, "+OK\r\n");
    client.send("PASS pw").await;
    assert_eq!(client.recv().await, "+OK\r\n");
}

#[tokio::test]
async fn retr_streams_the_stored_message() {
    let store = MemoryStore::new();
    store.add_user("alice", "pw").await;
    store
        .push_mail("alice", b"Subject: hi\r\n\r\nhello world\r\n")
        .await
        .unwrap();
    let addr = start_server(store).await;

    let mut client = Client::connect(addr).await;
    client.recv().await;
    client.send("USER alice").await;
    client.recv().await;
    client.send("PASS pw").await;
    client.recv().await;

    client.send("RETR 1").await;
    assert_eq!(client.recv().await, "+OK\r\n");
    assert_eq!(client.recv().await, "Subject: hi\r\n");
    assert_eq!(client.recv().await, "\r\n");
    assert_eq!(client.recv().await, "hello world\r\n");
    assert_eq!(client.recv().await, ".\r\n");

    client.send("RETR 2").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
    client.send("RETR x").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
}

#[tokio::test]
async fn transaction_argument_validation() {
    let addr = start_server(seeded_store().await).await;
    let mut client = Client::connect(addr).await;
    client.recv().await;
    client.send("USER alice").await;
    client.recv().await;
    client.send("PASS pw").await;
    client.recv().await;

    client.send("LIST 1").await;
    assert_eq!(client.recv().await, "+OK 1 100\r\n");
    client.send("LIST 0").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
    client.send("LIST 2").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
    client.send("LIST 1x").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    // STAT, RSET and QUIT take no argument
    client.send("STAT 1").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
    client.send("RSET 1").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
    client.send("QUIT now").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    // a deleted item is no longer addressable
    client.send("DELE 1").await;
    assert_eq!(client.recv().await, "+OK\r\n");
    client.send("LIST 1").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
    client.send("DELE 1").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    client.send("NOOP").await;
    assert_eq!(client.recv().await, "+OK\r\n");
}

#[tokio::test]
async fn commands_are_gated_by_state() {
    let addr = start_server(seeded_store().await).await;
    let mut client = Client::connect(addr).await;
    client.recv().await;

    client.send("STAT").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
    client.send("NOOP").await;
    assert_eq!(client.recv().await, "-ERR\r\n");

    client.send("USER alice").await;
    client.recv().await;
    client.send("PASS pw").await;
    client.recv().await;

    client.send("USER alice").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
    client.send("PASS pw").await;
    assert_eq!(client.recv().await, "-ERR\r\n");
}

#[tokio::test]
async fn overlong_line_never_executes() {
    let addr = start_server(seeded_store().await).await;
    let mut client = Client::connect(addr).await;
    client.recv().await;

    let mut long = vec![b'a'; 1500];
    long.extend_from_slice(b"\r\n");
    client.send_raw(&long).await;
    // the capped first segment has no CRLF, the remainder is no command
    assert_eq!(client.recv().await, "-ERR\r\n");
    assert_eq!(client.recv().await, "-ERR\r\n");

    client.send("USER alice").await;
    assert_eq!(client.recv().await, "+OK\r\n");
}
