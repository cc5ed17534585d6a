//! Console banners and version strings.

/// Short version line, shown by `-v` and the credits block.
pub fn version_short() -> String {
    format!("ember-miner/{}", env!("CARGO_PKG_VERSION"))
}

/// Long version line with build metadata when available, shown by `-V`.
pub fn version_long() -> String {
    match option_env!("EMBER_BUILD_VERSION") {
        Some(build) => format!("ember-miner/{build}"),
        None => format!(
            "ember-miner/{} ({}/{})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        ),
    }
}

/// Credits block printed after every configuration phase.
pub fn show_credits() {
    println!("-------------------------------------------------------------------");
    println!("{}", version_short());
    println!();
    println!("Guided pool miner with play/pause control and an HTTP status page.");
    println!("CPU mining backend with AMD/NVIDIA backend slots.");
}

/// Manage-mode banner shown while the miner is paused in non-expert mode.
pub fn show_manage_info(http_port: u16) {
    println!("-------------------------------------------------------------------");
    println!("Miner execution in pause");
    println!("-------------------------------------------------------------------");
    println!("To manage your miner:");
    if http_port != 0 {
        println!(" 1. Open the status page on http://localhost:{http_port}/api/status");
        println!(" 2. Press 'p' to play");
        println!(" 3. Press 'i' to see the current configuration");
    } else {
        println!(" 1. Press 'p' to play");
        println!(" 2. Press 'i' to see the current configuration");
    }
}

/// Runtime key help, shown when mining starts.
pub fn show_runtime_help() {
    println!("-------------------------------------------------------------------");
    println!();
    println!("You can use the following keys to display reports:");
    println!("'i' - configuration");
    println!("'h' - hashrate (not paused)");
    println!("'r' - results (not paused)");
    println!("'c' - connection (not paused)");
    println!();
    println!("'p' - play/pause");
    println!("-------------------------------------------------------------------");
}

/// Notice shown when keys arrive while a restart is in progress.
pub fn show_restart_notice() {
    println!("-------------------------------------------------------------------");
    println!(" The miner is restarting, please wait ...");
    println!("-------------------------------------------------------------------");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_strings_carry_the_package_version() {
        assert!(version_short().contains(env!("CARGO_PKG_VERSION")));
        assert!(version_long().starts_with("ember-miner/"));
    }
}
