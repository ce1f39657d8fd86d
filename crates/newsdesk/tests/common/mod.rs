//! Common test utilities for newsdesk integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated home directory for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".newsdesk");

        Ok(Self { temp_dir, data_dir })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.temp_dir.path().join("audit")
    }

    /// Command with HOME pointed at the temp directory and no key in the environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_newsdesk"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env_remove("NEWSDESK_API_KEY");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write a config that talks to `api_base` and audits into the temp directory
    pub fn create_config(&self, api_base: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let config = serde_json::json!({
            "provider": { "api_key": "test-api-key", "api_base": api_base },
            "agent": { "model": "test/model" },
            "retry": { "max_attempts": 1 },
            "audit": { "dir": self.audit_dir() },
        });
        std::fs::write(self.config_file(), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }
}
