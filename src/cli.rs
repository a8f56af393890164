//! Definición de argumentos de línea de comandos.
//!
//! Además de parsear los flags, este módulo construye la `FilterConfig`
//! explícitamente, incluyendo la vista "solo LISTEN" por defecto.

use clap::{Parser, ValueEnum};

use crate::filter::FilterConfig;
use crate::source::{ConnectionSource, ProcfsSource, SsSource};

/// show-port - Monitor de puertos activos
///
/// Lista los sockets de red del sistema con su proceso dueño y el
/// servicio conocido del puerto. Por defecto muestra solo los puertos en
/// LISTEN, agrupados por protocolo y puerto.
#[derive(Parser, Debug)]
#[command(name = "show-port")]
#[command(author, long_about = None, disable_version_flag = true)]
#[command(after_help = "EJEMPLOS:
    # Puertos en escucha (vista por defecto)
    show-port

    # Todas las conexiones, sin agrupar
    show-port --all

    # Conexiones establecidas por TCP
    show-port --protocol tcp --status ESTABLISHED

    # Quién usa el puerto 5432, en JSON
    show-port --port 5432 --json
")]
pub struct Args {
    /// Filtrar por protocolo (tcp, udp, tcp6, udp6)
    #[arg(long)]
    pub protocol: Option<String>,

    /// Filtrar por estado (LISTEN, ESTABLISHED, etc.)
    #[arg(long)]
    pub status: Option<String>,

    /// Filtrar por número de puerto
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Limitar la cantidad de resultados (0 = sin límite)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Mostrar solo puertos en LISTEN (modo por defecto)
    #[arg(long)]
    pub listen: bool,

    /// Mostrar todas las conexiones (sin agrupar)
    #[arg(long)]
    pub all: bool,

    /// Imprimir el reporte como JSON
    #[arg(long)]
    pub json: bool,

    /// Desactivar los colores
    #[arg(long)]
    pub no_color: bool,

    /// Fuente de conexiones
    #[arg(long, value_enum, default_value_t = SourceKind::Procfs)]
    pub source: SourceKind,

    /// Logs de diagnóstico en stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Mostrar la versión
    #[arg(long)]
    pub version: bool,
}

/// Backend usado para enumerar los sockets
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceKind {
    /// Tablas de /proc/net
    #[default]
    Procfs,
    /// Salida del comando `ss`
    Ss,
}

impl Args {
    /// Construye la configuración del filtro.
    ///
    /// Si no se pidió `--all`, ni `--status`, ni `--listen`, se activa la
    /// vista solo LISTEN.
    pub fn filter_config(&self) -> FilterConfig {
        let implicit_listen = !self.all && self.status.is_none() && !self.listen;

        FilterConfig {
            protocol: self.protocol.clone().filter(|p| !p.is_empty()),
            status: self.status.clone().filter(|s| !s.is_empty()),
            port: Some(self.port).filter(|p| *p > 0),
            listen_only: self.listen || implicit_listen,
            limit: self.limit,
        }
    }

    /// La agregación se aplica salvo en la vista cruda (`--all`).
    pub fn aggregate(&self) -> bool {
        !self.all
    }

    pub fn connection_source(&self) -> Box<dyn ConnectionSource> {
        match self.source {
            SourceKind::Procfs => Box::new(ProcfsSource),
            SourceKind::Ss => Box::new(SsSource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("show-port").chain(args.iter().copied()))
    }

    #[test]
    fn test_default_is_listen_only_and_aggregated() {
        let args = parse(&[]);
        let config = args.filter_config();
        assert!(config.listen_only);
        assert_eq!(config.status, None);
        assert_eq!(config.port, None);
        assert_eq!(config.limit, 0);
        assert!(args.aggregate());
        assert_eq!(args.source, SourceKind::Procfs);
    }

    #[test]
    fn test_all_disables_implicit_listen_and_aggregation() {
        let args = parse(&["--all"]);
        assert!(!args.filter_config().listen_only);
        assert!(!args.aggregate());
    }

    #[test]
    fn test_status_disables_implicit_listen() {
        let config = parse(&["--status", "established"]).filter_config();
        assert!(!config.listen_only);
        assert_eq!(config.status.as_deref(), Some("established"));
    }

    /// `--listen` explícito se mantiene junto a `--all`
    #[test]
    fn test_explicit_listen_with_all() {
        let args = parse(&["--all", "--listen"]);
        assert!(args.filter_config().listen_only);
        assert!(!args.aggregate());
    }

    #[test]
    fn test_filters_are_forwarded() {
        let config = parse(&["--protocol", "UDP6", "--port", "53", "--limit", "3"]).filter_config();
        assert_eq!(config.protocol.as_deref(), Some("UDP6"));
        assert_eq!(config.port, Some(53));
        assert_eq!(config.limit, 3);
    }

    #[test]
    fn test_source_flag() {
        assert_eq!(parse(&["--source", "ss"]).source, SourceKind::Ss);
    }
}
