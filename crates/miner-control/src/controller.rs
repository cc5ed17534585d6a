//! The lifecycle controller.
//!
//! A watchdog loop ticking every 500ms drives the miner through its states:
//! first-run configuration, starting, running, paused and restarting.
//! Keyboard commands and the HTTP restart endpoint only request transitions
//! through [`ControlHandle`]; the loop applies them on its next tick.
//!
//! All live resources (engine, status server, parsed config) are owned by a
//! [`MinerContext`]. A restart tears the context down and builds a fresh one
//! from disk - nothing survives in memory except the process parameters.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use engine::{Engine, EngineMode, EngineOptions, WorkPayload};
use miner_config::MinerConfig;
use status_http::{ConfigSnapshot, StatusServer};

use crate::banner;
use crate::benchmark;
use crate::bootstrap::ConfigBootstrapper;
use crate::control::ControlHandle;
use crate::expert_state::{ExpertState, ExpertStateStore, StateField, STATE_FILE};
use crate::input::{map_key, InputListener, ListenerMode, MinerCommand, COMMAND_CHANNEL_CAPACITY};
use crate::params::ProcessParameters;
use crate::prompt::{Prompt, StdinPrompt};

/// Watchdog cadence; ticks are never closer together than this.
pub const TICK: Duration = Duration::from_millis(500);

/// Drain window before and after teardown during a restart.
const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Everything a running miner owns. Exactly one context is live at a time.
pub struct MinerContext {
    pub params: Arc<ProcessParameters>,
    pub config: MinerConfig,
    pub expert: ExpertState,
    pub engine: Option<Engine>,
    pub status: Option<StatusServer>,
}

/// Engine options derived from the parameters and the parsed config.
pub fn engine_options(params: &ProcessParameters, config: &MinerConfig) -> EngineOptions {
    let pool = config.primary_pool();
    EngineOptions {
        use_cpu: params.use_cpu,
        use_amd: params.use_amd,
        use_nvidia: params.use_nvidia,
        cpu_workers: None,
        pool_address: pool.pool_address.clone(),
        currency: config.pools.currency.clone(),
    }
}

fn config_snapshot(params: &ProcessParameters, config: &MinerConfig) -> ConfigSnapshot {
    let pool = config.primary_pool();
    let cpus = num_cpus::get();
    ConfigSnapshot {
        http_port: config.general.httpd_port,
        currency: config.pools.currency.clone(),
        pool_address: pool.pool_address.clone(),
        wallet_address: pool.wallet_address.clone(),
        cpu_workers: if params.use_cpu { cpus } else { 0 },
        cpus_available: cpus,
        amd_enabled: params.use_amd,
        nvidia_enabled: params.use_nvidia,
    }
}

fn live_payload(config: &MinerConfig) -> WorkPayload {
    WorkPayload::seed(config.primary_pool().pool_address.as_bytes())
}

/// The full configuration phase: expert-state resolution, guided bootstrap
/// for missing artifacts, config parse, compute self-test and status server
/// start. Runs at startup and again after every restart.
pub fn build_context(
    params: &Arc<ProcessParameters>,
    store: &ExpertStateStore,
    control: &ControlHandle,
    prompt: &mut dyn Prompt,
) -> anyhow::Result<MinerContext> {
    let expert = store.resolve(params.ask_expert, prompt)?;

    ConfigBootstrapper::new(params, prompt).ensure_configs(expert.expert_mode)?;

    let config = miner_config::parse(&params.config_file, &params.pool_config_file)?;

    Engine::self_test()?;

    let status = if config.general.httpd_port != 0 {
        let remote = control.clone();
        Some(StatusServer::start(
            config.general.httpd_port,
            config_snapshot(params, &config),
            Arc::new(move || remote.request_restart()),
        )?)
    } else {
        None
    };

    Ok(MinerContext {
        params: params.clone(),
        config,
        expert,
        engine: None,
        status,
    })
}

/// Sleep out the remainder of the tick budget.
pub async fn pace_tick(tick_start: Instant) {
    tokio::time::sleep_until(tick_start + TICK).await;
}

/// Run the miner to completion and return the process exit code.
pub async fn run(params: ProcessParameters) -> anyhow::Result<i32> {
    let params = Arc::new(params);
    let control = ControlHandle::new();
    let store = ExpertStateStore::new(STATE_FILE);
    let mut prompt = StdinPrompt;

    let mut ctx = match build_context(&params, &store, &control, &mut prompt) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("{e:#}");
            return Ok(1);
        }
    };

    banner::show_credits();
    if !ctx.expert.expert_mode {
        banner::show_manage_info(ctx.config.general.httpd_port);
    }

    // Benchmark mode bypasses the whole state machine.
    if let Some(spec) = params.benchmark {
        println!(
            "!!!! Doing only a benchmark and exiting. To mine, remove the '--benchmark' option. !!!!"
        );
        let outcome = benchmark::run_benchmark(&params, &ctx.config, spec, &control).await;
        if let Some(status) = ctx.status.take() {
            status.stop().await;
        }
        return match outcome {
            Ok(_) => Ok(0),
            Err(e) => {
                log::error!("{e:#}");
                Ok(1)
            }
        };
    }

    if (!ctx.expert.first_run && ctx.expert.expert_mode) || ctx.expert.start_running {
        control.request_resume();
        if let Some(status) = &ctx.status {
            status.set_mining_state(true);
        }
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let listener = InputListener::spawn(cmd_tx, control.shutdown_watch());

    let mut controller = LifecycleController {
        params,
        store,
        control,
        cmd_rx,
        _listener: listener,
        ctx,
        was_started: false,
        manage_shown: false,
        from_pause: false,
    };
    controller.run_loop().await
}

struct LifecycleController {
    params: Arc<ProcessParameters>,
    store: ExpertStateStore,
    control: ControlHandle,
    cmd_rx: mpsc::Receiver<char>,
    _listener: InputListener,
    ctx: MinerContext,
    was_started: bool,
    manage_shown: bool,
    from_pause: bool,
}

impl LifecycleController {
    async fn run_loop(&mut self) -> anyhow::Result<i32> {
        let mut first_run_pending = self.ctx.expert.first_run;

        loop {
            let tick_start = Instant::now();

            if first_run_pending {
                first_run_pending = false;
                self.configure_first_run().await?;
            } else if self.control.restart_requested() {
                self.process_restart(&mut first_run_pending).await?;
            } else {
                self.drive_tick()?;
            }

            pace_tick(tick_start).await;
        }
    }

    /// One forced start cycle so the configuration side effects materialize,
    /// then persist the post-first-run flags. Non-expert installations end
    /// up paused.
    async fn configure_first_run(&mut self) -> anyhow::Result<()> {
        log::info!("Configuring, please wait a little...");
        self.control.request_resume();
        self.start_engine()?;
        self.store.complete_first_run();

        if !self.ctx.expert.expert_mode {
            self.control.settle_sleep(SETTLE_DELAY).await;
            self.control.request_pause();
            self.store.update_field(StateField::StartRunning, false);
        } else if let Some(status) = &self.ctx.status {
            status.set_mining_state(true);
        }
        Ok(())
    }

    fn start_engine(&mut self) -> anyhow::Result<()> {
        if self.ctx.engine.is_some() {
            return Ok(());
        }
        let mode = if self.ctx.config.general.daemon_mode {
            EngineMode::Daemon
        } else {
            EngineMode::Interactive
        };
        let engine = Engine::start(engine_options(&self.ctx.params, &self.ctx.config), mode)?;
        engine.switch_work(live_payload(&self.ctx.config));
        self.ctx.engine = Some(engine);
        if let Some(status) = &self.ctx.status {
            status.set_mining_state(true);
        }
        Ok(())
    }

    fn drive_tick(&mut self) -> anyhow::Result<()> {
        if !self.control.is_paused() && !self.was_started {
            self.was_started = true;
            banner::show_runtime_help();
            self.start_engine()?;
        }

        if !self.control.is_paused() {
            if self.from_pause {
                self.from_pause = false;
                if let Some(engine) = &self.ctx.engine {
                    engine.switch_work(live_payload(&self.ctx.config));
                }
                if let Some(status) = &self.ctx.status {
                    status.set_mining_state(true);
                }
            }
            self.manage_shown = false;
            self.drain_commands(ListenerMode::Running);
        } else {
            self.from_pause = true;
            if !self.manage_shown {
                self.manage_shown = true;
                banner::show_manage_info(self.ctx.config.general.httpd_port);
                self.store.update_field(StateField::StartRunning, false);
                if let Some(engine) = &self.ctx.engine {
                    engine.switch_work(WorkPayload::idle());
                }
                if let Some(status) = &self.ctx.status {
                    status.set_mining_state(false);
                }
            }
            self.drain_commands(ListenerMode::Paused);
        }
        Ok(())
    }

    /// The restart critical section: nothing else happens until the fresh
    /// context is up. Roughly two seconds of settle delays by design of the
    /// teardown sequence.
    async fn process_restart(&mut self, first_run_pending: &mut bool) -> anyhow::Result<()> {
        self.drain_commands(ListenerMode::Restarting);

        if let Some(status) = self.ctx.status.take() {
            status.stop().await;
        }

        println!("---------------------------------------------------");
        log::info!("Shutting down miner, please wait...");
        self.control.settle_sleep(SETTLE_DELAY).await;

        if let Some(engine) = self.ctx.engine.take() {
            engine.shutdown();
        }

        println!("---------------------------------------------------");
        log::info!("Restarting miner, please wait...");
        self.control.settle_sleep(SETTLE_DELAY).await;

        let mut prompt = StdinPrompt;
        self.ctx = build_context(&self.params, &self.store, &self.control, &mut prompt)?;

        banner::show_credits();
        if !self.ctx.expert.expert_mode {
            banner::show_manage_info(self.ctx.config.general.httpd_port);
        }

        if self.ctx.expert.start_running {
            self.control.request_resume();
        } else {
            self.control.request_pause();
        }
        *first_run_pending = self.ctx.expert.first_run;
        self.was_started = false;
        self.manage_shown = false;
        self.from_pause = false;

        self.drain_commands(ListenerMode::Restarting);
        self.control.clear_restart();
        Ok(())
    }

    fn drain_commands(&mut self, mode: ListenerMode) {
        let mut notice_shown = false;
        while let Ok(key) = self.cmd_rx.try_recv() {
            if mode == ListenerMode::Restarting {
                if !notice_shown {
                    notice_shown = true;
                    banner::show_restart_notice();
                }
                continue;
            }
            if let Some(command) = map_key(mode, key) {
                self.apply_command(command);
            }
        }
    }

    fn apply_command(&mut self, command: MinerCommand) {
        match command {
            MinerCommand::ShowHashrate => {
                if let Some(engine) = &self.ctx.engine {
                    println!("{}", engine.hashrate_report());
                }
            }
            MinerCommand::ShowResults => {
                if let Some(engine) = &self.ctx.engine {
                    println!("{}", engine.results_report());
                }
            }
            MinerCommand::ShowConnection => {
                if let Some(engine) = &self.ctx.engine {
                    println!("{}", engine.connection_report());
                }
            }
            MinerCommand::Pause => self.control.request_pause(),
            MinerCommand::Resume => self.control.request_resume(),
            MinerCommand::ShowConfig => {
                if let Some(status) = &self.ctx.status {
                    println!("{}", status.config_snapshot());
                } else {
                    log::warn!("HTTP status interface is disabled; no configuration snapshot");
                }
            }
        }
    }
}
