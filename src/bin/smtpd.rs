// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/bin/smtpd.rs
// SMTP server entry point.

use arcpost::conf::Config;
use arcpost::smtpd::server::{SmtpServer, SmtpServerControl};
use arcpost::store::{MemoryStore, Store};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "arcpost.json";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let port = match args.as_slice() {
        [_, port] => port.parse::<u16>().ok(),
        _ => None,
    };
    let Some(port) = port else {
        let prog = args.first().map(String::as_str).unwrap_or("smtpd");
        eprintln!("Invalid arguments. Expected: {} <port>", prog);
        std::process::exit(1);
    };

    let config = match Config::load_path_or_default(CONFIG_PATH) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Cannot load {}: {}", CONFIG_PATH, e);
            std::process::exit(1);
        }
    };
    let store = Arc::new(Store::Memory(MemoryStore::from_config(&config)));

    let mut server = SmtpServer::new(config.clone(), store);
    let addr = format!("{}:{}", config.bind, port);
    if let Err(e) = server.add(&addr).await {
        eprintln!("Cannot bind {}: {}", addr, e);
        std::process::exit(1);
    }
    info!("{} listening on {}", arcpost::constants::SMTPD_NAME, addr);

    let control = server.run();
    if tokio::signal::ctrl_c().await.is_ok() {
        let _ = control.send(SmtpServerControl::Shutdown);
    }
}
