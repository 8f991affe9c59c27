mod cli;
mod error_fmt;
mod rt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use serde_json::json;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{EXIT_OK, exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match real_main(&cli) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            if cli.json {
                println!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    let _ = color_eyre::install();

    let cfg = stepgen_config::load_file(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), axes = cfg.axis.len(), "config loaded");

    match &cli.cmd {
        Commands::Move(args) => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("installing Ctrl-C handler")?;

            let out = run::run_move_cmd(&cfg, args, shutdown)?;
            if args.stats {
                run::print_stats(&out, cfg.timing.tick_hz);
            }
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "status": "complete",
                        "axis": args.axis,
                        "port_bit": cfg.axis.get(args.axis).map(|a| a.port_bit),
                        "final_position": out.final_position,
                        "travelled": out.travelled,
                        "ticks": out.ticks,
                        "peak_burst": out.peak_burst,
                        "overruns": out.overruns,
                    })
                );
            } else {
                println!(
                    "move complete: position={} travelled={} ticks={} peak={}",
                    out.final_position, out.travelled, out.ticks, out.peak_burst
                );
            }
        }
        Commands::SelfCheck => {
            let axes = run::self_check(&cfg)?;
            if cli.json {
                println!("{}", json!({ "status": "ok", "axes": axes }));
            } else {
                println!("self-check ok: {}", axes.join(", "));
            }
        }
        Commands::Health => {
            let body = json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "tick_hz": cfg.timing.tick_hz,
                "axes": cfg.axis.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
                "hardware": cfg!(feature = "hardware"),
            });
            if cli.json {
                println!("{body}");
            } else {
                println!("healthy: stepgen {} ({} axes)", env!("CARGO_PKG_VERSION"), cfg.axis.len());
            }
        }
    }
    Ok(())
}

/// Console output to stderr (pretty or JSON), plus an optional JSON-lines
/// file sink from `[logging]`. `RUST_LOG` overrides `--log-level`.
fn init_tracing(json: bool, level: &str, logging: &stepgen_config::Logging) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    if json {
        layers.push(console.json().with_filter(console_filter).boxed());
    } else {
        layers.push(console.with_filter(console_filter).boxed());
    }

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or(path.as_os_str());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
            .wrap_err("invalid logging.level")?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    Ok(())
}
