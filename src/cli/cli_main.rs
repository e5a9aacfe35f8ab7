//! Main CLI entrypoints for tcpfetch and tcpfetchd
// (c) 2024 Ross Younger

use std::ffi::OsString;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;
use figment::providers::Serialized;
use indicatif::{MultiProgress, ProgressDrawTarget};
use tracing::debug;

use super::args::{ClientArgs, ServerArgs};
use super::styles::{configure_colours, error, use_colours, RESET};
use crate::{
    client::{client_main, MAX_UPDATE_FPS},
    config::{structure::PartialConfiguration, Configuration, Manager},
    server::server_main,
    util::{setup_tracing, trace_level, ConsoleTraceType},
};

/// Client CLI entrypoint
///
/// Call this from `main`, passing the arguments to use.
/// Normally you will call `client_cli(std::env::args_os())` but you can pass in alternate arguments for CLI testing.
///
/// # Safety
/// - This function starts a tokio runtime and performs work in it.
/// - This function is not safe to call from multi-threaded code.
#[must_use]
pub fn client_cli<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let success = match parse_args::<ClientArgs, _, _>(args) {
        Ok(args) => report(client_inner(args)),
        Err(success) => success,
    };
    exit_code(success)
}

/// Server CLI entrypoint
///
/// As [`client_cli`], but for the server. Returns only if the server failed to start
/// or has been interrupted.
#[must_use]
pub fn server_cli<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let success = match parse_args::<ServerArgs, _, _>(args) {
        Ok(args) => report(server_inner(args).map(|()| true)),
        Err(success) => success,
    };
    exit_code(success)
}

/// Parses the command line.
///
/// If this returns `Err`, clap has already explained itself and the program should exit;
/// the value says whether that counts as success (help and version requests do).
fn parse_args<A, I, T>(args: I) -> Result<A, bool>
where
    A: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    use clap::error::ErrorKind::{DisplayHelp, DisplayVersion};
    A::try_parse_from(args).map_err(|e| {
        let _ = e.print();
        matches!(e.kind(), DisplayHelp | DisplayVersion)
    })
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Reports any error not yet seen by the user.
///
/// `Ok(false)` is a failure which has already been logged.
fn report(result: Result<bool>) -> bool {
    match result {
        Ok(success) => success,
        Err(e) => {
            if crate::util::tracing_is_initialised() {
                tracing::error!("{e:#}");
            } else {
                anstream::eprintln!("{ERROR}Error:{RESET} {e:#}", ERROR = error());
            }
            false
        }
    }
}

/// Folds the configuration sources together, command line last
fn resolve_config(file: Option<&Path>, overrides: &PartialConfiguration) -> Result<Configuration> {
    let mut manager = Manager::standard(file)?;
    manager.merge_provider(Serialized::defaults(overrides));
    manager
        .get::<Configuration>()
        .context("invalid configuration")?
        .validate()
}

fn client_inner(args: ClientArgs) -> Result<bool> {
    configure_colours(args.output.color);
    let config = resolve_config(args.config.as_deref(), &args.overrides)?;
    run_client(&args, &config)
}

#[tokio::main(flavor = "current_thread")]
async fn run_client(args: &ClientArgs, config: &Configuration) -> Result<bool> {
    let display = if args.output.quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(MAX_UPDATE_FPS))
    };
    setup_tracing(
        trace_level(&args.output),
        ConsoleTraceType::Indicatif(display.clone()),
        args.output.log_file.as_ref(),
        config.time_format,
        use_colours(),
    )?; // to provoke error: set RUST_LOG=tcpfetch=sundial
    debug!("configuration:\n{config}");

    // this may return false
    client_main(config, display, &args.parameters, args.output.quiet).await
}

fn server_inner(args: ServerArgs) -> Result<()> {
    configure_colours(args.output.color);
    let config = resolve_config(args.config.as_deref(), &args.overrides)?;
    run_server(&args, &config)
}

#[tokio::main(flavor = "current_thread")]
async fn run_server(args: &ServerArgs, config: &Configuration) -> Result<()> {
    setup_tracing(
        trace_level(&args.output),
        ConsoleTraceType::Standard,
        args.output.log_file.as_ref(),
        config.time_format,
        use_colours(),
    )?;
    debug!("configuration:\n{config}");
    server_main(config, &args.parameters)
        .await
        .context("server failed to start")
}
