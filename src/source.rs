/// Fuentes de conexiones de red del sistema.
///
/// Hay dos implementaciones para Linux:
/// - `ProcfsSource` lee las tablas de `/proc/net` y asocia cada socket a su
///   PID recorriendo los descriptores de `/proc/<pid>/fd`.
/// - `SsSource` ejecuta `ss -tuanpH` y parsea su salida.
///
/// Ninguna resuelve nombres de proceso; eso lo hace el pipeline.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::process::Command;

use procfs::net::TcpState;

use crate::error::{Result, ShowPortError};
use crate::record::{Endpoint, Protocol, RawConnection};

/// Estado reportado para sockets UDP, que no tienen máquina de estados
const UDP_STATUS: &str = "NONE";

/// Entrega una instantánea de las conexiones del host.
pub trait ConnectionSource {
    /// Nombre corto de la fuente, usado en logs y errores
    fn name(&self) -> &'static str;

    /// Enumera todas las conexiones actuales.
    ///
    /// Un fallo aquí es fatal para el reporte completo.
    fn enumerate(&self) -> Result<Vec<RawConnection>>;
}

/// Avisa que sin root solo se verán los PIDs de procesos propios.
fn warn_if_unprivileged() {
    if !nix::unistd::geteuid().is_root() {
        log::warn!("Ejecutando sin root - solo se verán los PIDs de procesos propios");
    }
}

// ─────────────────────────────────────────────────────────────
// Fuente basada en procfs
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsSource;

impl ConnectionSource for ProcfsSource {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn enumerate(&self) -> Result<Vec<RawConnection>> {
        warn_if_unprivileged();
        let owners = build_inode_owner_map();
        log::debug!("{} sockets con proceso dueño visible", owners.len());

        let mut connections = Vec::new();

        // IPv4 es obligatorio; las tablas IPv6 no existen si el kernel
        // tiene IPv6 deshabilitado
        let tcp = procfs::net::tcp().map_err(|e| self.unavailable("/proc/net/tcp", e))?;
        push_tcp_entries(&mut connections, tcp, Protocol::Tcp, &owners);

        match procfs::net::tcp6() {
            Ok(tcp6) => push_tcp_entries(&mut connections, tcp6, Protocol::Tcp6, &owners),
            Err(err) => log::warn!("No se pudo leer /proc/net/tcp6: {err}"),
        }

        let udp = procfs::net::udp().map_err(|e| self.unavailable("/proc/net/udp", e))?;
        push_udp_entries(&mut connections, udp, Protocol::Udp, &owners);

        match procfs::net::udp6() {
            Ok(udp6) => push_udp_entries(&mut connections, udp6, Protocol::Udp6, &owners),
            Err(err) => log::warn!("No se pudo leer /proc/net/udp6: {err}"),
        }

        Ok(connections)
    }
}

impl ProcfsSource {
    fn unavailable(&self, table: &str, err: procfs::ProcError) -> ShowPortError {
        ShowPortError::SourceUnavailable {
            backend: self.name(),
            reason: format!("{table}: {err}"),
        }
    }
}

/// Construye el mapa inodo de socket → PID recorriendo `/proc/<pid>/fd`.
///
/// Los procesos cuyos descriptores no se pueden leer (otros usuarios sin
/// root, procesos que terminaron durante el recorrido) se omiten.
fn build_inode_owner_map() -> HashMap<u64, u32> {
    let mut owners = HashMap::new();

    let processes = match procfs::process::all_processes() {
        Ok(processes) => processes,
        Err(err) => {
            log::warn!("No se pudo listar /proc: {err}");
            return owners;
        }
    };

    for process in processes.flatten() {
        let Ok(pid) = u32::try_from(process.pid()) else {
            continue;
        };
        let Ok(fds) = process.fd() else {
            continue;
        };
        for fd_info in fds.flatten() {
            if let procfs::process::FDTarget::Socket(inode) = fd_info.target {
                // Un socket compartido tras fork queda con el primer PID visto
                owners.entry(inode).or_insert(pid);
            }
        }
    }

    owners
}

fn push_tcp_entries(
    out: &mut Vec<RawConnection>,
    entries: Vec<procfs::net::TcpNetEntry>,
    protocol: Protocol,
    owners: &HashMap<u64, u32>,
) {
    for entry in entries {
        out.push(RawConnection {
            protocol,
            local: to_endpoint(entry.local_address),
            remote: remote_endpoint(entry.remote_address),
            status: tcp_state_name(&entry.state).to_string(),
            pid: owners.get(&entry.inode).copied(),
        });
    }
}

fn push_udp_entries(
    out: &mut Vec<RawConnection>,
    entries: Vec<procfs::net::UdpNetEntry>,
    protocol: Protocol,
    owners: &HashMap<u64, u32>,
) {
    for entry in entries {
        out.push(RawConnection {
            protocol,
            local: to_endpoint(entry.local_address),
            remote: remote_endpoint(entry.remote_address),
            status: UDP_STATUS.to_string(),
            pid: owners.get(&entry.inode).copied(),
        });
    }
}

fn to_endpoint(addr: SocketAddr) -> Endpoint {
    Endpoint::new(addr.ip().to_string(), addr.port())
}

/// El extremo remoto no existe si es la dirección no especificada con puerto 0.
fn remote_endpoint(addr: SocketAddr) -> Option<Endpoint> {
    if addr.port() == 0 && addr.ip().is_unspecified() {
        None
    } else {
        Some(to_endpoint(addr))
    }
}

/// Nombre del estado TCP con el vocabulario de netstat.
fn tcp_state_name(state: &TcpState) -> &'static str {
    match state {
        TcpState::Established => "ESTABLISHED",
        TcpState::SynSent => "SYN_SENT",
        TcpState::SynRecv => "SYN_RECV",
        TcpState::FinWait1 => "FIN_WAIT1",
        TcpState::FinWait2 => "FIN_WAIT2",
        TcpState::TimeWait => "TIME_WAIT",
        TcpState::Close => "CLOSE",
        TcpState::CloseWait => "CLOSE_WAIT",
        TcpState::LastAck => "LAST_ACK",
        TcpState::Listen => "LISTEN",
        TcpState::Closing => "CLOSING",
        TcpState::NewSynRecv => "NEW_SYN_RECV",
    }
}

// ─────────────────────────────────────────────────────────────
// Fuente basada en `ss`
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct SsSource;

/// Flags de `ss`: TCP y UDP, todos los estados, numérico, procesos, sin encabezado
const SS_FLAGS: &str = "-tuanpH";

impl ConnectionSource for SsSource {
    fn name(&self) -> &'static str {
        "ss"
    }

    fn enumerate(&self) -> Result<Vec<RawConnection>> {
        let raw_output = self.execute_ss_command()?;
        let connections = parse_ss_output(&raw_output);
        log::debug!("ss: {} líneas parseadas", connections.len());
        Ok(connections)
    }
}

impl SsSource {
    /// Ejecuta `ss`, primero con `sudo -n` para ver los PIDs de todos los
    /// procesos y luego sin privilegios.
    fn execute_ss_command(&self) -> Result<String> {
        let result = Command::new("sudo").args(["-n", "ss", SS_FLAGS]).output();

        if let Ok(output) = result {
            if output.status.success() {
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
        }

        // Fallback sin sudo (solo verá procesos propios)
        log::warn!("Ejecutando ss sin sudo - solo se verán procesos propios");
        let fallback = Command::new("ss")
            .arg(SS_FLAGS)
            .output()
            .map_err(|e| self.spawn_failure(e))?;

        if !fallback.status.success() {
            return Err(ShowPortError::SourceUnavailable {
                backend: self.name(),
                reason: String::from_utf8_lossy(&fallback.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&fallback.stdout).into_owned())
    }

    /// No poder lanzar `ss` deja a la fuente sin datos: es un fallo fatal.
    fn spawn_failure(&self, err: std::io::Error) -> ShowPortError {
        ShowPortError::SourceUnavailable {
            backend: self.name(),
            reason: format!("no se pudo ejecutar ss: {err}"),
        }
    }
}

/// Parsea la salida completa de `ss -tuanpH`, omitiendo las líneas inválidas.
fn parse_ss_output(output: &str) -> Vec<RawConnection> {
    output.lines().filter_map(parse_ss_line).collect()
}

/// Parsea una línea individual de la salida de `ss`.
///
/// Formato esperado:
/// ```text
/// tcp  LISTEN  0  128  0.0.0.0:8080  0.0.0.0:*  users:(("node",pid=1234,fd=5))
/// ```
/// Campos: [NetId, Estado, RecvQ, SendQ, DirLocal, DirRemota, Proceso?]
fn parse_ss_line(line: &str) -> Option<RawConnection> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 6 {
        return None;
    }

    let (local, ipv6) = split_address(parts[4])?;
    let (remote, _) = split_address(parts[5])?;
    let protocol = Protocol::from_netid(parts[0], ipv6);

    let status = if protocol.is_udp() {
        UDP_STATUS.to_string()
    } else {
        normalize_ss_state(parts[1])
    };

    let remote = if remote.port == 0 && is_unspecified(&remote.address) {
        None
    } else {
        Some(remote)
    };

    Some(RawConnection {
        protocol,
        local,
        remote,
        status,
        pid: extract_pid(line),
    })
}

/// Separa `DIRECCION:PUERTO` y devuelve también si la dirección es IPv6.
///
/// Maneja IPv4 (`0.0.0.0:8080`), IPv6 (`[::]:8080`), comodines (`*:5353`)
/// y sufijos de interfaz (`127.0.0.53%lo:53`). Un puerto `*` se toma como 0.
fn split_address(field: &str) -> Option<(Endpoint, bool)> {
    let colon_pos = field.rfind(':')?;
    let addr_part = &field[..colon_pos];
    let port_str = &field[colon_pos + 1..];

    let port = if port_str == "*" {
        0
    } else {
        port_str.parse::<u16>().ok()?
    };

    // iproute2 antiguo imprime IPv6 sin corchetes (`:::22`)
    let ipv6 = addr_part.starts_with('[') || addr_part.contains(':');
    let cleaned = addr_part.trim_start_matches('[').trim_end_matches(']');
    let cleaned = match cleaned.find('%') {
        Some(pos) => &cleaned[..pos],
        None => cleaned,
    };
    let address = if cleaned == "*" { "0.0.0.0" } else { cleaned };

    Some((Endpoint::new(address, port), ipv6))
}

fn is_unspecified(address: &str) -> bool {
    matches!(address, "0.0.0.0" | "::" | "*")
}

/// Traduce los nombres de estado de `ss` al vocabulario de netstat.
fn normalize_ss_state(state: &str) -> String {
    match state {
        "ESTAB" => "ESTABLISHED".to_string(),
        "UNCONN" => "CLOSE".to_string(),
        "FIN-WAIT-1" => "FIN_WAIT1".to_string(),
        "FIN-WAIT-2" => "FIN_WAIT2".to_string(),
        other => other.replace('-', "_"),
    }
}

/// Extrae el PID de la sección `users:((...))` de `ss`.
///
/// Busca el patrón: users:(("nombre",pid=1234,fd=5))
fn extract_pid(line: &str) -> Option<u32> {
    let users_start = line.find("users:((")?;
    let users_section = &line[users_start..];

    let pid_marker = "pid=";
    let pid_start = users_section.find(pid_marker)? + pid_marker.len();
    let pid_end = users_section[pid_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| i + pid_start)
        .unwrap_or(users_section.len());

    users_section[pid_start..pid_end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifica que el parser maneja líneas vacías correctamente
    #[test]
    fn test_parse_empty_line() {
        assert!(parse_ss_line("").is_none());
        assert!(parse_ss_line("   ").is_none());
    }

    /// Verifica el parsing de una línea real de ss
    #[test]
    fn test_parse_ss_listen_line() {
        let line = r#"tcp LISTEN 0 128 0.0.0.0:8080 0.0.0.0:* users:(("node",pid=12345,fd=19))"#;
        let conn = parse_ss_line(line).unwrap();
        assert_eq!(conn.protocol, Protocol::Tcp);
        assert_eq!(conn.local, Endpoint::new("0.0.0.0", 8080));
        assert_eq!(conn.remote, None);
        assert_eq!(conn.status, "LISTEN");
        assert_eq!(conn.pid, Some(12345));
    }

    #[test]
    fn test_parse_ss_established_ipv6() {
        let line = r#"tcp ESTAB 0 0 [::1]:5432 [::1]:51234 users:(("postgres",pid=987,fd=3))"#;
        let conn = parse_ss_line(line).unwrap();
        assert_eq!(conn.protocol, Protocol::Tcp6);
        assert_eq!(conn.local, Endpoint::new("::1", 5432));
        assert_eq!(conn.remote, Some(Endpoint::new("::1", 51234)));
        assert_eq!(conn.status, "ESTABLISHED");
    }

    #[test]
    fn test_parse_ss_udp_with_interface_and_no_process() {
        let line = "udp UNCONN 0 0 127.0.0.53%lo:53 0.0.0.0:*";
        let conn = parse_ss_line(line).unwrap();
        assert_eq!(conn.protocol, Protocol::Udp);
        assert_eq!(conn.local, Endpoint::new("127.0.0.53", 53));
        assert_eq!(conn.status, "NONE");
        assert_eq!(conn.pid, None);
    }

    /// Un puerto local `*` se conserva como 0; el enriquecimiento lo descarta
    #[test]
    fn test_parse_ss_wildcard_port() {
        let line = "tcp UNCONN 0 0 *:* *:*";
        let conn = parse_ss_line(line).unwrap();
        assert_eq!(conn.local, Endpoint::new("0.0.0.0", 0));
        assert_eq!(conn.status, "CLOSE");
        assert_eq!(conn.remote, None);
    }

    #[test]
    fn test_parse_ss_unbracketed_ipv6() {
        let line = r#"tcp LISTEN 0 128 :::22 :::* users:(("sshd",pid=1,fd=4))"#;
        let conn = parse_ss_line(line).unwrap();
        assert_eq!(conn.protocol, Protocol::Tcp6);
        assert_eq!(conn.local, Endpoint::new("::", 22));
        assert_eq!(conn.remote, None);

        let line = "udp UNCONN 0 0 ::ffff:127.0.0.1:5353 :::*";
        let conn = parse_ss_line(line).unwrap();
        assert_eq!(conn.protocol, Protocol::Udp6);
        assert_eq!(conn.local, Endpoint::new("::ffff:127.0.0.1", 5353));
    }

    #[test]
    fn test_ss_spawn_failure_is_source_unavailable() {
        let err = SsSource.spawn_failure(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(
            err,
            ShowPortError::SourceUnavailable { backend: "ss", .. }
        ));
    }

    #[test]
    fn test_parse_ss_output_skips_garbage() {
        let output = "\
tcp LISTEN 0 4096 0.0.0.0:22 0.0.0.0:* users:((\"sshd\",pid=1,fd=3))
basura
tcp TIME-WAIT 0 0 10.0.0.2:443 10.0.0.9:40000
";
        let conns = parse_ss_output(output);
        assert_eq!(conns.len(), 2);
        assert_eq!(conns[1].status, "TIME_WAIT");
    }

    #[test]
    fn test_normalize_ss_state() {
        assert_eq!(normalize_ss_state("CLOSE-WAIT"), "CLOSE_WAIT");
        assert_eq!(normalize_ss_state("FIN-WAIT-2"), "FIN_WAIT2");
        assert_eq!(normalize_ss_state("LISTEN"), "LISTEN");
    }

    #[test]
    fn test_extract_pid() {
        let line = r#"tcp LISTEN 0 5 127.0.0.1:5432 0.0.0.0:* users:(("postgres",pid=987,fd=3))"#;
        assert_eq!(extract_pid(line), Some(987));
        assert_eq!(extract_pid("tcp LISTEN 0 5 127.0.0.1:5432 0.0.0.0:*"), None);
    }

    #[test]
    fn test_tcp_state_names() {
        assert_eq!(tcp_state_name(&TcpState::Listen), "LISTEN");
        assert_eq!(tcp_state_name(&TcpState::Established), "ESTABLISHED");
        assert_eq!(tcp_state_name(&TcpState::TimeWait), "TIME_WAIT");
        assert_eq!(tcp_state_name(&TcpState::NewSynRecv), "NEW_SYN_RECV");
    }

    #[test]
    fn test_remote_endpoint_absent_when_unspecified() {
        let listen: SocketAddr = "0.0.0.0:0".parse().unwrap();
        let listen6: SocketAddr = "[::]:0".parse().unwrap();
        let peer: SocketAddr = "192.168.1.10:51000".parse().unwrap();
        assert_eq!(remote_endpoint(listen), None);
        assert_eq!(remote_endpoint(listen6), None);
        assert_eq!(
            remote_endpoint(peer),
            Some(Endpoint::new("192.168.1.10", 51000))
        );
    }
}
