//! confd sidecar - run a service next to confd and reload it on change.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use confd_sidecar::config::{utf8_environment, ConfigLoader, Provisioning};
use confd_sidecar::exit_code;
use confd_sidecar::supervisor::Supervisor;

const AFTER_HELP: &str = "\
confd is configured through the environment:

    CONFD_PATH                path to the confd binary (default: confd on PATH)
    CONFD_CONFDIR             confd configuration directory (default: /etc/confd)
    CONFD_BACKEND             data backend (default: consul)
    CONFD_NODE                value passed as confd -node (default: none)
    CONFD_CONFDFILE_<x>       file to create in $CONFD_CONFDIR/conf.d/
    CONFD_TEMPLATE_<x>        file to create in $CONFD_CONFDIR/templates/
    CONFD_SIDECAR_SETTLE_MS   quiet period before start and reload (default: 1000)

The first line of each CONFD_CONFDFILE_<x> and CONFD_TEMPLATE_<x> value is the
file name, the rest is its content. The program is started once confd has been
quiet for the settle window and receives SIGHUP one settle window after the
last file confd rewrites.";

#[derive(Parser)]
#[command(
    name = "confd-sidecar",
    about = "Run a service next to confd, sending it SIGHUP when confd rewrites its configuration",
    after_help = AFTER_HELP,
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Read settings from this TOML file instead of the default locations.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// The service program to run, followed by its arguments.
    #[arg(
        value_name = "PROGRAM",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn exit_with(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}

/// Cancel `token` when the supervisor receives SIGTERM.
fn forward_termination(token: CancellationToken) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            if sigterm.recv().await.is_some() {
                token.cancel();
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return exit_with(exit_code::USAGE);
        }
    };
    init_tracing(cli.verbose);

    let span = tracing::info_span!("supervisor", pid = std::process::id());
    run(cli).instrument(span).await
}

async fn run(cli: Cli) -> ExitCode {
    let Some((program, args)) = cli.command.split_first() else {
        return exit_with(exit_code::USAGE);
    };
    tracing::info!(%program, ?args, "Main program and arguments to be run");

    let env = match utf8_environment(std::env::vars_os()) {
        Ok(env) => env,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return exit_with(exit_code::PROVISION_FAILED);
        }
    };

    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load_with_env(env.iter().map(|(k, v)| (k.as_str(), v.as_str()))) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return exit_with(exit_code::PROVISION_FAILED);
        }
    };

    let provisioned = Provisioning::from_env(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .and_then(|p| p.write_all(&config.watcher.confdir));
    if let Err(e) = provisioned {
        tracing::error!(error = %e, "Failed to provision confd files");
        return exit_with(exit_code::PROVISION_FAILED);
    }

    let cancel = CancellationToken::new();
    if let Err(e) = forward_termination(cancel.clone()) {
        tracing::warn!(error = %e, "Could not install SIGTERM handler");
    }

    let supervisor =
        Supervisor::from_config(&config, program, args).with_cancellation(cancel);
    match supervisor.run().await {
        Ok(report) => exit_with(report.exit_code),
        Err(e) => {
            tracing::error!(error = %e, "Supervisor aborted");
            exit_with(exit_code::for_supervisor_error(&e))
        }
    }
}
