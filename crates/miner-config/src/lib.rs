#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Configuration store for the Ember miner.
//!
//! Two JSON artifacts describe a miner installation:
//! - the general config (HTTP port, daemon mode, log file)
//! - the pool config (currency plus an ordered pool list)
//!
//! The guided wizard renders both from the templates in this crate;
//! [`parse`] loads and validates them before the engine is allowed to start.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Currency used when none was supplied or the supplied one is unknown.
pub const DEFAULT_CURRENCY: &str = "monero";

/// Currency name → default pool address.
static DEFAULT_POOLS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("monero", "pool.supportxmr.com:5555"),
        ("aeon", "mine.aeon-pool.com:5555"),
        ("sumokoin", "pool.sumokoin.hashvault.pro:3333"),
        ("turtlecoin", "turtle.pool.mine2gether.com:3335"),
    ]
});

/// Template for the general configuration artifact.
pub const GENERAL_TEMPLATE: &str = r#"{
  "daemon_mode" : false,
  "output_file" : "",
  "httpd_port" : HTTP_PORT
}
"#;

/// Template for the pool configuration artifact.
pub const POOL_TEMPLATE: &str = r#"{
  "currency" : "CURRENCY",
  "pool_list" : [
POOLCONF
  ]
}
"#;

/// General miner configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub daemon_mode: bool,
    #[serde(default)]
    pub output_file: String,
    pub httpd_port: u16,
}

/// One pool entry of the pool list.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PoolEntry {
    pub pool_address: String,
    pub wallet_address: String,
    #[serde(default)]
    pub rig_id: String,
    #[serde(default)]
    pub pool_password: String,
    #[serde(default)]
    pub use_nicehash: bool,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub tls_fingerprint: String,
    pub pool_weight: i64,
}

/// Pool configuration: the mined currency plus the pool list.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PoolConfig {
    pub currency: String,
    pub pool_list: Vec<PoolEntry>,
}

/// Fully parsed miner configuration.
#[derive(Clone, Debug)]
pub struct MinerConfig {
    pub general: GeneralConfig,
    pub pools: PoolConfig,
}

impl MinerConfig {
    /// Highest-weight pool; the list is guaranteed non-empty after [`parse`].
    pub fn primary_pool(&self) -> &PoolEntry {
        self.pools
            .pool_list
            .iter()
            .max_by_key(|p| p.pool_weight)
            .unwrap_or(&self.pools.pool_list[0])
    }
}

/// Load and validate both artifacts.
pub fn parse(general_path: &Path, pool_path: &Path) -> anyhow::Result<MinerConfig> {
    let general_text = fs::read_to_string(general_path)
        .with_context(|| format!("Cannot read config file '{}'", general_path.display()))?;
    let general: GeneralConfig = serde_json::from_str(&general_text)
        .with_context(|| format!("Cannot parse config file '{}'", general_path.display()))?;

    let pool_text = fs::read_to_string(pool_path)
        .with_context(|| format!("Cannot read pool config file '{}'", pool_path.display()))?;
    let pools: PoolConfig = serde_json::from_str(&pool_text)
        .with_context(|| format!("Cannot parse pool config file '{}'", pool_path.display()))?;

    if pools.pool_list.is_empty() {
        anyhow::bail!(
            "Pool config '{}' contains no pool entries",
            pool_path.display()
        );
    }
    for entry in &pools.pool_list {
        if entry.pool_address.is_empty() {
            anyhow::bail!("A pool entry has an empty pool_address");
        }
        if entry.pool_weight <= 0 {
            anyhow::bail!(
                "Pool '{}' has weight {}; weights must be positive",
                entry.pool_address,
                entry.pool_weight
            );
        }
    }
    if !is_known_currency(&pools.currency) {
        anyhow::bail!("Unknown currency '{}'", pools.currency);
    }

    Ok(MinerConfig { general, pools })
}

/// Default pool address for a currency (falls back to the default currency).
pub fn default_pool(currency: &str) -> &'static str {
    DEFAULT_POOLS
        .iter()
        .find(|(name, _)| *name == currency)
        .or_else(|| DEFAULT_POOLS.iter().find(|(name, _)| *name == DEFAULT_CURRENCY))
        .map(|(_, pool)| *pool)
        .unwrap_or("")
}

pub fn is_known_currency(currency: &str) -> bool {
    DEFAULT_POOLS.iter().any(|(name, _)| *name == currency)
}

/// Supported currencies, for the help text.
pub fn currency_list() -> String {
    DEFAULT_POOLS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Named-placeholder template, written out as a config artifact.
pub struct Template {
    body: String,
}

impl Template {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }

    /// Substitute every occurrence of a placeholder token.
    pub fn replace(&mut self, placeholder: &str, value: &str) {
        self.body = self.body.replace(placeholder, value);
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, &self.body)
            .with_context(|| format!("Cannot write config file '{}'", path.display()))
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_general(dir: &Path, port: u16) -> std::path::PathBuf {
        let path = dir.join("config.json");
        let mut tpl = Template::new(GENERAL_TEMPLATE);
        tpl.replace("HTTP_PORT", &port.to_string());
        tpl.write(&path).expect("write general");
        path
    }

    fn write_pools(dir: &Path, entries: &[PoolEntry], currency: &str) -> std::path::PathBuf {
        let path = dir.join("pools.json");
        let rendered: Vec<String> = entries
            .iter()
            .map(|e| format!("    {}", serde_json::to_string(e).expect("entry json")))
            .collect();
        let mut tpl = Template::new(POOL_TEMPLATE);
        tpl.replace("CURRENCY", currency);
        tpl.replace("POOLCONF", &rendered.join(",\n"));
        tpl.write(&path).expect("write pools");
        path
    }

    fn entry(weight: i64) -> PoolEntry {
        PoolEntry {
            pool_address: "pool.example.com:3333".to_string(),
            wallet_address: "WALLET".to_string(),
            rig_id: String::new(),
            pool_password: String::new(),
            use_nicehash: false,
            use_tls: false,
            tls_fingerprint: String::new(),
            pool_weight: weight,
        }
    }

    #[test]
    fn rendered_templates_parse_back() {
        let dir = tempdir().expect("tempdir");
        let general = write_general(dir.path(), 8282);
        let pools = write_pools(dir.path(), &[entry(1)], "monero");

        let config = parse(&general, &pools).expect("parse");
        assert_eq!(config.general.httpd_port, 8282);
        assert!(!config.general.daemon_mode);
        assert_eq!(config.pools.currency, "monero");
        assert_eq!(config.pools.pool_list.len(), 1);
    }

    #[test]
    fn primary_pool_is_the_heaviest() {
        let dir = tempdir().expect("tempdir");
        let general = write_general(dir.path(), 0);
        let mut heavy = entry(10);
        heavy.pool_address = "heavy.example.com:3333".to_string();
        let pools = write_pools(dir.path(), &[entry(1), heavy], "monero");

        let config = parse(&general, &pools).expect("parse");
        assert_eq!(config.primary_pool().pool_address, "heavy.example.com:3333");
    }

    #[test]
    fn empty_pool_list_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let general = write_general(dir.path(), 0);
        let pools = write_pools(dir.path(), &[], "monero");
        assert!(parse(&general, &pools).is_err());
    }

    #[test]
    fn non_positive_weight_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let general = write_general(dir.path(), 0);
        let pools = write_pools(dir.path(), &[entry(0)], "monero");
        assert!(parse(&general, &pools).is_err());
    }

    #[test]
    fn unknown_currency_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let general = write_general(dir.path(), 0);
        let pools = write_pools(dir.path(), &[entry(1)], "dogecoin");
        assert!(parse(&general, &pools).is_err());
    }

    #[test]
    fn missing_files_are_reported_with_their_path() {
        let dir = tempdir().expect("tempdir");
        let err = parse(&dir.path().join("nope.json"), &dir.path().join("nope2.json"))
            .expect_err("must fail");
        assert!(format!("{err:#}").contains("nope.json"));
    }

    #[test]
    fn default_pool_falls_back_to_default_currency() {
        assert_eq!(default_pool("monero"), "pool.supportxmr.com:5555");
        assert_eq!(default_pool("no-such-coin"), default_pool(DEFAULT_CURRENCY));
    }

    #[test]
    fn currency_table_round_trips() {
        assert!(is_known_currency("monero"));
        assert!(!is_known_currency("MONERO"));
        assert!(currency_list().contains("aeon"));
    }
}
