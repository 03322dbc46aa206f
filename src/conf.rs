// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/conf.rs
// Manage configure file.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUser {
    pub name: String,
    pub password: String,
    /// Message bodies seeded into the user's mailbox at startup.
    #[serde(default)]
    pub mail: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Host name advertised in the SMTP 220 and 250 banners.
    pub domain: String,
    pub bind: String,
    #[serde(default)]
    pub users: Vec<ConfigUser>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            domain: String::from("localhost"),
            bind: String::from("0.0.0.0"),
            users: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_path(path: &str) -> anyhow::Result<Config> {
        let file = File::open(path)?;
        Self::load_reader(file)
    }

    /// Loads the file if it exists, falls back to defaults otherwise.
    pub fn load_path_or_default(path: &str) -> anyhow::Result<Config> {
        if Path::new(path).exists() {
            Self::load_path(path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_reader<R: std::io::Read>(mut reader: R) -> anyhow::Result<Config> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(serde_json::from_slice(&buf)?)
    }

    pub fn save_path(&self, path: &str) -> anyhow::Result<()> {
        let tmp = format!("{}.tmp", path);
        let mut file = File::create(&tmp)?;
        file.write_all(serde_json::to_vec_pretty(self)?.as_slice())?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_reader_parses_users() {
        let json = r#"{
            "domain": "mail.example.org",
            "bind": "127.0.0.1",
            "users": [
                { "name": "alice", "password": "pw" },
                { "name": "bob@host", "password": "x", "mail": ["Subject: hi\r\n"] }
            ]
        }"#;
        let config = Config::load_reader(json.as_bytes()).unwrap();
        assert_eq!(config.domain, "mail.example.org");
        assert_eq!(config.users.len(), 2);
        assert!(config.users[0].mail.is_empty());
        assert_eq!(config.users[1].mail.len(), 1);
    }

    #[test]
    fn defaults_when_file_missing() {
        let config = Config::load_path_or_default("does-not-exist.json").unwrap();
        assert_eq!(config.domain, "localhost");
        assert!(config.users.is_empty());
    }
}
