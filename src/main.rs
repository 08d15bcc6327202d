use anyhow::{anyhow, Context};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use scanbox::{
    exit_code_for_analysis_error, exit_code_for_io_error, init_logging, Config, ContainerEngine,
    DockerApi, DockerCli, RunId, ToolInvocation,
};

mod cli;

use cli::{Cli, Command};

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match cli.config.as_deref() {
        Some(p) => Config::load(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(Config::from_env()),
    }
}

fn parse_run_id(s: Option<&str>) -> anyhow::Result<RunId> {
    match s {
        Some(v) => v
            .parse::<RunId>()
            .map_err(|e| anyhow!("invalid run id {v:?}: {e}")),
        None => Ok(RunId::new()),
    }
}

fn run_doctor() -> ExitCode {
    eprintln!("scanbox doctor");
    eprintln!("  version: v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("  host: {} / {}", std::env::consts::OS, std::env::consts::ARCH);
    let engine = match DockerCli::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("  docker: not found ({e})");
            return ExitCode::from(exit_code_for_io_error(&e));
        }
    };
    eprintln!("  docker: {}", engine.runtime().display());
    match engine.ping() {
        Ok(()) => {
            eprintln!("  daemon: reachable");
            eprintln!("doctor: completed diagnostics.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("  daemon: unreachable ({e})");
            ExitCode::from(1)
        }
    }
}

/// Engine and config for the subcommands that talk to docker.
fn setup(cli: &Cli) -> Result<(Arc<dyn ContainerEngine>, Config), ExitCode> {
    let engine = DockerCli::new().map_err(|e| {
        eprintln!("scanbox: {e}");
        ExitCode::from(exit_code_for_io_error(&e))
    })?;
    let config = load_config(cli).map_err(|e| {
        eprintln!("scanbox: {e:#}");
        ExitCode::from(1)
    })?;
    let engine: Arc<dyn ContainerEngine> = Arc::new(engine);
    Ok((engine, config))
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Doctor => run_doctor(),
        Command::Run {
            tool,
            image,
            run_id,
            cleanup,
            cmd,
        } => {
            let run_id = match parse_run_id(run_id.as_deref()) {
                Ok(id) => id,
                Err(e) => {
                    eprintln!("scanbox: {e}");
                    return ExitCode::from(2);
                }
            };
            let (engine, config) = match setup(&cli) {
                Ok(v) => v,
                Err(code) => return code,
            };
            let inv = ToolInvocation::new(tool.as_str(), image.as_str(), cmd.join(" "))
                .with_config_overrides(&config);
            let api = DockerApi::new(engine, config, run_id);
            tracing::info!(analysis_id = %run_id, tool = %tool, "starting analysis container");

            let result = api
                .pull_image(inv.effective_image())
                .and_then(|()| api.create_analysis_container(&inv));
            if *cleanup {
                api.delete_containers_from_api();
            }
            match result {
                Ok(out) => {
                    print!("{out}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("scanbox: {e}");
                    ExitCode::from(exit_code_for_analysis_error(&e))
                }
            }
        }
        Command::Pull { image } => {
            let (engine, config) = match setup(&cli) {
                Ok(v) => v,
                Err(code) => return code,
            };
            let api = DockerApi::new(engine, config, RunId::new());
            match api.pull_image(image) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("scanbox: {e}");
                    ExitCode::from(exit_code_for_analysis_error(&e))
                }
            }
        }
        Command::Cleanup { run_id } => {
            let run_id = match parse_run_id(Some(run_id.as_str())) {
                Ok(id) => id,
                Err(e) => {
                    eprintln!("scanbox: {e}");
                    return ExitCode::from(2);
                }
            };
            let (engine, config) = match setup(&cli) {
                Ok(v) => v,
                Err(code) => return code,
            };
            let report = DockerApi::new(engine, config, run_id).delete_containers_from_api();
            eprintln!(
                "scanbox: removed {} container(s), {} failure(s)",
                report.removed.len(),
                report.failed.len()
            );
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
    }
}
