//! # show-port 📡
//!
//! Herramienta de línea de comandos para Linux que lista los sockets de
//! red activos, los asocia a su proceso dueño y al servicio conocido del
//! puerto, y los presenta como un reporte filtrable y ordenado.
//!
//! ## Características
//! - Vista por defecto: puertos en LISTEN agrupados por (protocolo, puerto)
//! - Vista `--all` con cada conexión por separado
//! - Filtros por protocolo, estado, puerto y límite de resultados
//! - Fuente de datos `/proc/net` o comando `ss`
//! - Salida en tabla coloreada o JSON
//!
//! ## Uso
//! `show-port`, `show-port --all`, `show-port --port 5432 --json`.
//! Ejecutar como root para ver los PIDs de procesos de otros usuarios.

mod cli;
mod error;
mod filter;
mod pipeline;
mod record;
mod render;
mod resolver;
mod services;
mod source;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;

use crate::cli::Args;
use crate::resolver::ProcfsResolver;
use crate::services::ServiceCatalog;

/// Inicializa el logging en stderr.
///
/// Nivel WARN por defecto (DEBUG con `--verbose`), configurable con
/// `RUST_LOG`. El reporte va a stdout y no se mezcla con los logs.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

/// Punto de entrada principal de show-port.
///
/// Un fallo al enumerar las conexiones aborta el reporte completo y
/// termina con código 1.
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(err) = run(&args) {
        eprintln!("{} {err:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    if args.version {
        println!("show-port version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.no_color {
        colored::control::set_override(false);
    }

    log::info!("📡 show-port v{} iniciando...", env!("CARGO_PKG_VERSION"));

    let source = args.connection_source();
    let filter = args.filter_config();
    log::debug!("Filtro: {filter:?}, agregación: {}", args.aggregate());

    let report = pipeline::build_report(
        source.as_ref(),
        &ProcfsResolver,
        &ServiceCatalog::well_known(),
        &filter,
        args.aggregate(),
    )
    .context("Error al obtener la información de puertos")?;

    if args.json {
        println!("{}", render::render_json(&report)?);
        return Ok(());
    }

    render::print_header();

    if report.is_empty() {
        render::print_empty();
        return Ok(());
    }

    render::print_table(&report);
    render::print_summary(&report);
    Ok(())
}
