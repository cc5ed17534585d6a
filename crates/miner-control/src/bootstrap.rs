//! Guided first-run configuration.
//!
//! Runs during every configuration phase for each artifact whose file does
//! not exist yet. Non-expert mode writes fixed defaults without asking
//! anything; expert mode prompts for every field the CLI did not supply.
//! On return both artifacts exist and parse.

use std::fs;
use std::path::Path;

use miner_config::{
    default_pool, file_exists, is_known_currency, PoolEntry, Template, DEFAULT_CURRENCY,
    GENERAL_TEMPLATE, POOL_TEMPLATE,
};

use crate::params::ProcessParameters;
use crate::prompt::Prompt;

/// HTTP port written by the hands-off (non-expert) flow.
pub const DEFAULT_HTTP_PORT: u16 = 8282;

/// Wallet used by the hands-off flow so the miner works out of the box.
pub const DEMO_WALLET: &str =
    "46gYGj7ZyVqPU8UGxDRvQCF3oWPgHWyqbYJ1pECJxRFSEFAphtXUuMPo8MGXGLZKpWZxefzibnUpT7R1TsCwGnrTQMHDatL";

/// Legacy plain-text config files backed up after rendering, relative to the
/// artifact directory.
const LEGACY_BACKUPS: &[(&str, &str)] = &[
    ("config.txt", "config-bck.txt"),
    ("pools.txt", "pools-bck.txt"),
];

pub struct ConfigBootstrapper<'a> {
    params: &'a ProcessParameters,
    prompt: &'a mut dyn Prompt,
}

impl<'a> ConfigBootstrapper<'a> {
    pub fn new(params: &'a ProcessParameters, prompt: &'a mut dyn Prompt) -> Self {
        Self { params, prompt }
    }

    /// Render whichever artifacts are missing. Existing files are never
    /// touched.
    pub fn ensure_configs(&mut self, expert: bool) -> anyhow::Result<()> {
        if !file_exists(&self.params.config_file) {
            self.render_general(expert)?;
            backup_legacy(&self.params.config_file);
        }
        if !file_exists(&self.params.pool_config_file) {
            self.render_pools(expert)?;
            backup_legacy(&self.params.pool_config_file);
        }
        Ok(())
    }

    fn render_general(&mut self, expert: bool) -> anyhow::Result<()> {
        let port = if !expert {
            DEFAULT_HTTP_PORT
        } else if let Some(port) = self.params.httpd_port {
            port
        } else {
            println!("- Do you want to use the HTTP interface?");
            println!("Enter 0 to disable it, otherwise the port the miner should listen on.");
            self.prompt.int_in_range("- HTTP port:", 0, 65535)? as u16
        };

        let mut tpl = Template::new(GENERAL_TEMPLATE);
        tpl.replace("HTTP_PORT", &port.to_string());
        tpl.write(&self.params.config_file)?;
        println!(
            "Configuration stored in file '{}'",
            self.params.config_file.display()
        );
        Ok(())
    }

    fn render_pools(&mut self, expert: bool) -> anyhow::Result<()> {
        let currency = if is_known_currency(&self.params.currency) {
            self.params.currency.clone()
        } else {
            DEFAULT_CURRENCY.to_string()
        };

        let user_set_pool = self.params.pool_url.is_some();

        let pool_address = if !expert {
            default_pool(&currency).to_string()
        } else if let Some(url) = &self.params.pool_url {
            url.clone()
        } else {
            self.prompt.line(&format!(
                "- Pool address: e.g. {}",
                default_pool(&currency)
            ))?
        };

        let wallet_address = if !expert {
            DEMO_WALLET.to_string()
        } else if let Some(user) = &self.params.pool_user {
            user.clone()
        } else {
            self.prompt
                .line("- Username (wallet address or pool login):")?
        };

        let pool_password = if !expert {
            String::new()
        } else if self.params.user_set_pass {
            self.params.pool_pass.clone().unwrap_or_default()
        } else {
            self.prompt.line("- Password (mostly empty or x):")?
        };

        let rig_id = if !expert {
            String::new()
        } else if self.params.user_set_rigid {
            self.params.pool_rigid.clone().unwrap_or_default()
        } else {
            self.prompt
                .line("- Rig identifier for pool-side statistics. Can be empty:")?
        };

        let use_tls = if !expert {
            false
        } else if !user_set_pool {
            self.prompt
                .yes_no("- Does this pool port support TLS/SSL? Use no if unknown. (y/n)")?
        } else {
            self.params.pool_use_tls
        };

        let use_nicehash = if !expert {
            false
        } else if !user_set_pool {
            self.prompt
                .yes_no("- Do you want to use nicehash on this pool? (y/n)")?
        } else {
            self.params.use_nicehash
        };

        let multipool = if expert && !user_set_pool {
            self.prompt.yes_no("- Do you want to use multiple pools? (y/n)")?
        } else {
            false
        };

        let pool_weight = if multipool {
            println!("Pool weight is a number telling the miner how important the pool is.");
            println!("The miner mines mostly at the pool with the highest weight, unless it fails.");
            self.prompt
                .int_in_range("- Please enter a weight for this pool:", 1, i64::MAX)?
        } else {
            1
        };

        let mut entries = vec![PoolEntry {
            pool_address,
            wallet_address,
            rig_id,
            pool_password,
            use_nicehash,
            use_tls,
            tls_fingerprint: String::new(),
            pool_weight,
        }];

        if multipool {
            loop {
                let (entry, last) = self.next_pool_entry()?;
                entries.push(entry);
                if last {
                    break;
                }
            }
        }

        let rendered: Vec<String> = entries
            .iter()
            .map(|e| serde_json::to_string(e).map(|json| format!("    {json}")))
            .collect::<Result<_, _>>()?;

        let mut tpl = Template::new(POOL_TEMPLATE);
        tpl.replace("CURRENCY", &currency);
        tpl.replace("POOLCONF", &rendered.join(",\n"));
        tpl.write(&self.params.pool_config_file)?;
        println!(
            "Pool configuration stored in file '{}'",
            self.params.pool_config_file.display()
        );
        Ok(())
    }

    /// One additional multi-pool entry; the second value is true when the
    /// user declined to add another.
    fn next_pool_entry(&mut self) -> anyhow::Result<(PoolEntry, bool)> {
        println!();
        println!("- Next Pool:");

        let pool_address = self.prompt.line(&format!(
            "- Pool address: e.g. {}",
            default_pool(DEFAULT_CURRENCY)
        ))?;
        let wallet_address = self
            .prompt
            .line("- Username (wallet address or pool login):")?;
        let pool_password = self.prompt.line("- Password (mostly empty or x):")?;
        let rig_id = self
            .prompt
            .line("- Rig identifier for pool-side statistics. Can be empty:")?;
        let use_tls = self
            .prompt
            .yes_no("- Does this pool port support TLS/SSL? Use no if unknown. (y/n)")?;
        let use_nicehash = self
            .prompt
            .yes_no("- Do you want to use nicehash on this pool? (y/n)")?;
        let pool_weight = self
            .prompt
            .int_in_range("- Please enter a weight for this pool:", 1, i64::MAX)?;
        let last = !self.prompt.yes_no("- Do you want to add another pool? (y/n)")?;

        Ok((
            PoolEntry {
                pool_address,
                wallet_address,
                rig_id,
                pool_password,
                use_nicehash,
                use_tls,
                tls_fingerprint: String::new(),
                pool_weight,
            },
            last,
        ))
    }
}

/// Best-effort copy of the legacy plain-text configs living next to the
/// artifact. Never fatal.
fn backup_legacy(artifact: &Path) {
    let dir = artifact.parent().unwrap_or_else(|| Path::new("."));
    for (src, dst) in LEGACY_BACKUPS {
        let src = dir.join(src);
        if !src.is_file() {
            continue;
        }
        if let Err(e) = fs::copy(&src, dir.join(dst)) {
            log::warn!("Config file backup of '{}' failed: {e}", src.display());
        }
    }
}
