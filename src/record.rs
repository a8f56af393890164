/// Modelo de datos de los sockets reportados.
///
/// `RawConnection` es la tupla cruda que entrega una fuente de conexiones;
/// `PortRecord` es el registro normalizado que recorre el pipeline.
use serde::Serialize;
use std::fmt;

/// Marcador usado cuando no se pudo resolver un proceso o un servicio.
pub const UNKNOWN: &str = "unknown";

/// Protocolo de un socket.
///
/// El orden de declaración coincide con el orden lexicográfico de
/// `as_str()`, aunque el ordenamiento siempre compara las cadenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Tcp6,
    Udp,
    Udp6,
    Unknown,
}

impl Protocol {
    /// Nombre en minúsculas del protocolo ("tcp", "udp6", ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Tcp6 => "tcp6",
            Protocol::Udp => "udp",
            Protocol::Udp6 => "udp6",
            Protocol::Unknown => "unknown",
        }
    }

    /// Construye el protocolo a partir del "netid" de `ss` y de si la
    /// dirección local es IPv6.
    pub fn from_netid(netid: &str, ipv6: bool) -> Self {
        match (netid.to_ascii_lowercase().as_str(), ipv6) {
            ("tcp", false) => Protocol::Tcp,
            ("tcp", true) => Protocol::Tcp6,
            ("udp", false) => Protocol::Udp,
            ("udp", true) => Protocol::Udp6,
            _ => Protocol::Unknown,
        }
    }

    pub fn is_tcp(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Tcp6)
    }

    pub fn is_udp(self) -> bool {
        matches!(self, Protocol::Udp | Protocol::Udp6)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dirección IP (como texto) y puerto de un extremo del socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

/// Tupla cruda tal como la entrega una `ConnectionSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConnection {
    pub protocol: Protocol,
    pub local: Endpoint,
    /// `None` cuando no hay par remoto (sockets en LISTEN, UDP sin conectar)
    pub remote: Option<Endpoint>,
    /// Estado del socket tal cual lo reporta la fuente (LISTEN, ESTABLISHED, ...)
    pub status: String,
    /// PID dueño del socket, si es visible
    pub pid: Option<u32>,
}

/// Registro normalizado de un puerto.
///
/// Se crea una vez por conexión cruda en el enriquecimiento y luego se
/// descarta (filtro), se fusiona (agregación) o pasa sin cambios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortRecord {
    pub protocol: Protocol,
    pub local_address: String,
    /// Siempre mayor que cero
    pub local_port: u16,
    /// Vacío cuando no hay par remoto
    pub remote_address: String,
    /// Cero cuando no hay par remoto
    pub remote_port: u16,
    /// Puede estar vacío; el marcador "-" se aplica al renderizar
    pub status: String,
    pub owner_pid: Option<u32>,
    pub owner_name: String,
    pub service_name: String,
    pub connection_count: usize,
}

impl PortRecord {
    /// Compara el estado contra LISTEN sin distinguir mayúsculas.
    pub fn is_listen(&self) -> bool {
        self.status.eq_ignore_ascii_case("LISTEN")
    }

    /// Clave de agrupación usada por la agregación.
    pub fn key(&self) -> (Protocol, u16) {
        (self.protocol, self.local_port)
    }
}

impl fmt::Display for PortRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner_pid {
            Some(pid) => write!(
                f,
                "{} {}: {} (PID: {})",
                self.protocol, self.local_port, self.owner_name, pid
            ),
            None => write!(f, "{} {}: {}", self.protocol, self.local_port, self.owner_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_from_netid() {
        assert_eq!(Protocol::from_netid("tcp", false), Protocol::Tcp);
        assert_eq!(Protocol::from_netid("TCP", true), Protocol::Tcp6);
        assert_eq!(Protocol::from_netid("udp", true), Protocol::Udp6);
        assert_eq!(Protocol::from_netid("raw", false), Protocol::Unknown);
    }

    #[test]
    fn test_protocol_names_sort_like_variants() {
        let mut names: Vec<&str> = [
            Protocol::Unknown,
            Protocol::Udp6,
            Protocol::Tcp6,
            Protocol::Udp,
            Protocol::Tcp,
        ]
        .iter()
        .map(|p| p.as_str())
        .collect();
        names.sort();
        assert_eq!(names, vec!["tcp", "tcp6", "udp", "udp6", "unknown"]);
    }

    #[test]
    fn test_display_without_pid() {
        let record = PortRecord {
            protocol: Protocol::Udp,
            local_address: "0.0.0.0".into(),
            local_port: 5353,
            remote_address: String::new(),
            remote_port: 0,
            status: "NONE".into(),
            owner_pid: None,
            owner_name: UNKNOWN.into(),
            service_name: UNKNOWN.into(),
            connection_count: 1,
        };
        assert_eq!(record.to_string(), "udp 5353: unknown");
    }
}
