/// Presentación del reporte en la terminal.
///
/// Dos vistas de tabla: la detallada (`--all`), con una fila por conexión,
/// y la agregada, con una fila por (protocolo, puerto). Los marcadores de
/// campos vacíos ("-", "*") se aplican solo aquí.
use colored::{ColoredString, Colorize};

use crate::error::Result;
use crate::pipeline::Report;
use crate::record::PortRecord;

/// Marcador para estado o PID ausente
const PLACEHOLDER: &str = "-";
/// Marcador para dirección remota ausente
const ANY_REMOTE: &str = "*";

const DETAILED_RULE: &str = "────────────────────────────────────────────────────────────────────────────────────────────────────────────────────────────";
const AGGREGATED_RULE: &str = "──────────────────────────────────────────────────────────────────────────────────────────────────────";

pub fn print_header() {
    println!();
    println!("{}", "╔═══════════════════════════════════════════════════════════════╗".cyan().bold());
    println!("{}", "║           📡  Active Ports Monitor  📡                        ║".cyan().bold());
    println!("{}", "╚═══════════════════════════════════════════════════════════════╝".cyan().bold());
    println!();
}

pub fn print_summary(report: &Report) {
    println!();
    let label = if report.aggregated {
        "puertos activos"
    } else {
        "conexiones activas"
    };
    println!("{}", format!("✅ Total: {} {}", report.total, label).green().bold());
    println!();
}

pub fn print_empty() {
    println!("{}", "No active ports found matching the criteria.".yellow());
}

/// Imprime la tabla del reporte con la vista que corresponda.
pub fn print_table(report: &Report) {
    let detailed = !report.aggregated;

    if detailed {
        println!(
            "{}",
            format!(
                "{:<10} {:<18} {:<8} {:<18} {:<12} {:<8} {:<15} {:<20}",
                "PROTOCOL", "LOCAL ADDR", "PORT", "REMOTE ADDR", "STATUS", "PID", "PROCESS", "SERVICE"
            )
            .cyan()
            .bold()
        );
        println!("{DETAILED_RULE}");
    } else {
        println!(
            "{}",
            format!(
                "{:<10} {:<8} {:<20} {:<8} {:<8} {:<15} {:<20}",
                "PROTOCOL", "PORT", "SERVICE", "CONNS", "PID", "PROCESS", "STATUS"
            )
            .cyan()
            .bold()
        );
        println!("{AGGREGATED_RULE}");
    }

    for record in &report.records {
        println!("{}", format_row(record, detailed));
    }
}

/// Serializa el reporte completo como JSON.
pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Construye una fila de la tabla con colores por columna.
fn format_row(record: &PortRecord, detailed: bool) -> String {
    let pid = pid_cell(record);
    let status = status_cell(record);
    let protocol = protocol_color(record, format!("{:<10}", record.protocol.as_str()));
    let port = format!("{:<8}", record.local_port).yellow().bold();
    let process = format!("{:<15}", record.owner_name).cyan();

    if detailed {
        format!(
            "{} {:<18} {} {:<18} {:<12} {} {} {:<20}",
            protocol,
            record.local_address,
            port,
            remote_cell(record),
            status,
            format!("{pid:<8}").magenta(),
            process,
            record.service_name
        )
    } else {
        format!(
            "{} {} {:<20} {} {:<8} {} {:<20}",
            protocol,
            port,
            record.service_name,
            format!("{:<8}", record.connection_count).magenta(),
            pid,
            process,
            status
        )
    }
}

/// tcp en verde, udp en azul, el resto sin color
fn protocol_color(record: &PortRecord, text: String) -> ColoredString {
    if record.protocol.is_tcp() {
        text.green()
    } else if record.protocol.is_udp() {
        text.bright_blue()
    } else {
        text.normal()
    }
}

fn pid_cell(record: &PortRecord) -> String {
    match record.owner_pid {
        Some(pid) if pid > 0 => pid.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

fn status_cell(record: &PortRecord) -> &str {
    if record.status.is_empty() {
        PLACEHOLDER
    } else {
        &record.status
    }
}

fn remote_cell(record: &PortRecord) -> String {
    if record.remote_address.is_empty() {
        ANY_REMOTE.to_string()
    } else if record.remote_port == 0 {
        record.remote_address.clone()
    } else {
        format!("{}:{}", record.remote_address, record.remote_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Protocol, UNKNOWN};

    fn record() -> PortRecord {
        PortRecord {
            protocol: Protocol::Tcp,
            local_address: "0.0.0.0".into(),
            local_port: 22,
            remote_address: String::new(),
            remote_port: 0,
            status: String::new(),
            owner_pid: None,
            owner_name: UNKNOWN.into(),
            service_name: "SSH".into(),
            connection_count: 3,
        }
    }

    #[test]
    fn test_placeholders() {
        let r = record();
        assert_eq!(pid_cell(&r), "-");
        assert_eq!(status_cell(&r), "-");
        assert_eq!(remote_cell(&r), "*");
    }

    #[test]
    fn test_cells_with_values() {
        let r = PortRecord {
            remote_address: "10.0.0.5".into(),
            remote_port: 41000,
            status: "ESTABLISHED".into(),
            owner_pid: Some(812),
            ..record()
        };
        assert_eq!(pid_cell(&r), "812");
        assert_eq!(status_cell(&r), "ESTABLISHED");
        assert_eq!(remote_cell(&r), "10.0.0.5:41000");
    }

    #[test]
    fn test_rows_contain_fields() {
        colored::control::set_override(false);
        let r = record();

        let aggregated = format_row(&r, false);
        assert!(aggregated.starts_with("tcp"));
        assert!(aggregated.contains("SSH"));
        assert!(aggregated.contains(" 3 "));

        let detailed = format_row(&r, true);
        assert!(detailed.contains("0.0.0.0"));
        assert!(detailed.contains(UNKNOWN));
    }

    #[test]
    fn test_json_has_total_and_records() {
        let report = Report::new(vec![record()], true);
        let json = render_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["aggregated"], true);
        assert_eq!(value["records"][0]["protocol"], "tcp");
        assert_eq!(value["records"][0]["local_port"], 22);
        assert_eq!(value["records"][0]["owner_pid"], serde_json::Value::Null);
    }
}
