//! PowerSync native probe.
//!
//! Registers the native extensions the same way a host plugin would and
//! prints the reply (`{"responseCode": N}`) on stdout. Logs go to stderr.

use anyhow::Result;
use clap::Parser;
use powersync_native::loader::library_present;
use powersync_native::{
    configure_core, core_report, register_core, DependencyPlan, LinkMode, Registrar,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "powersync-native")]
#[command(about = "Load the PowerSync native extensions and report the response code")]
struct Args {
    /// Directory to search for native libraries (repeatable, searched in order)
    #[arg(short = 'L', long = "lib-dir")]
    lib_dirs: Vec<PathBuf>,

    /// Ignore POWERSYNC_NATIVE_LIB_DIR
    #[arg(long)]
    no_env: bool,

    /// Do not fall back to the system library search path
    #[arg(long)]
    no_system_fallback: bool,

    /// Print the full registration report instead of the reply
    #[arg(long)]
    report: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Planned libraries that none of `dirs` contains.
fn missing_libraries(plan: &DependencyPlan, dirs: &[PathBuf]) -> Vec<String> {
    plan.iter()
        .filter(|dep| !dirs.iter().any(|dir| library_present(dir, &dep.name)))
        .map(|dep| dep.name.clone())
        .collect()
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // stdout carries the reply, so logs go to stderr
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    info!(
        "powersync-native {} ({} link)",
        powersync_native::version(),
        LinkMode::BUILD
    );

    if !args.lib_dirs.is_empty() {
        for name in missing_libraries(&DependencyPlan::default(), &args.lib_dirs) {
            warn!("{} not found in any --lib-dir", name);
        }
    }

    let builder = args.lib_dirs.iter().fold(
        Registrar::builder()
            .search_dirs_from_env(!args.no_env)
            .system_fallback(!args.no_system_fallback),
        |builder, dir| builder.search_dir(dir),
    );
    configure_core(builder)?;

    let code = register_core();
    let output = if args.report {
        serde_json::to_string_pretty(&core_report())?
    } else {
        serde_json::json!({ "responseCode": code }).to_string()
    };

    // Intentional stdout: this is the reply a host would receive
    println!("{}", output);

    Ok(if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
