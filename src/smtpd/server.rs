// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/smtpd/server.rs
// Server of SMTPd.

use super::session;
use crate::conf;
use crate::store::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::watch};
use tracing::{debug, warn};

#[derive(Debug)]
pub enum SmtpServerControl {
    Initialize,
    Shutdown,
}

#[derive(Debug)]
pub struct SmtpServer {
    listeners: Vec<TcpListener>,
    config: Arc<conf::Config>,
    store: Arc<Store>,
    control: watch::Sender<SmtpServerControl>,
}

impl SmtpServer {
    pub fn new(config: Arc<conf::Config>, store: Arc<Store>) -> Self {
        let (control, _) = watch::channel(SmtpServerControl::Initialize);
        Self {
            listeners: Vec::new(),
            config,
            store,
            control,
        }
    }

    pub async fn add(&mut self, addr: &str) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        self.listeners.push(listener);
        Ok(bound)
    }

    /// Spawns one accept task per listener and one task per connection.
    /// In-flight sessions run to their natural end after Shutdown.
    pub fn run(self) -> watch::Sender<SmtpServerControl> {
        for listener in self.listeners {
            let mut rx = self.control.subscribe();
            let config = self.config.clone();
            let store = self.store.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        changed = rx.changed() => {
                            if changed.is_err()
                                || matches!(*rx.borrow(), SmtpServerControl::Shutdown)
                            {
                                break;
                            }
                        }
                        res = listener.accept() => {
                            match res {
                                Ok((stream, addr)) => {
                                    debug!("SMTP connection from {}", addr);
                                    let session = session::SmtpSession::new(
                                        config.clone(),
                                        store.clone(),
                                        addr,
                                        stream,
                                    );
                                    tokio::spawn(async move {
                                        if let Err(e) = session.run().await {
                                            debug!("SMTP session {} closed: {}", addr, e);
                                        }
                                    });
                                }
                                Err(e) => {
                                    warn!("SMTP accept failed: {}", e);
                                }
                            }
                        }
                    }
                }
            });
        }
        self.control
    }
}
