/// Catálogo de servicios conocidos por número de puerto.
///
/// Es un mapeo inmutable que se inyecta en la etapa de enriquecimiento;
/// solo admite búsquedas exactas por puerto.
use std::collections::HashMap;

/// Puertos bien conocidos y la etiqueta que se muestra para cada uno
const WELL_KNOWN: &[(u16, &str)] = &[
    (20, "FTP-DATA"),
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (1433, "MS-SQL"),
    (3000, "Node.js/React Dev"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5000, "Flask/Dev Server"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8000, "Django/Dev"),
    (8080, "HTTP-Alt/Proxy"),
    (8443, "HTTPS-Alt"),
    (9000, "PHP-FPM"),
    (27017, "MongoDB"),
];

#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    entries: HashMap<u16, &'static str>,
}

impl ServiceCatalog {
    /// Catálogo con los puertos bien conocidos que trae la herramienta.
    pub fn well_known() -> Self {
        Self::from_entries(WELL_KNOWN)
    }

    /// Construye un catálogo a partir de pares (puerto, etiqueta).
    ///
    /// Si un puerto aparece repetido gana la última entrada.
    pub fn from_entries(entries: &[(u16, &'static str)]) -> Self {
        Self {
            entries: entries.iter().copied().collect(),
        }
    }

    /// Busca la etiqueta del servicio para un puerto exacto.
    pub fn lookup(&self, port: u16) -> Option<&'static str> {
        self.entries.get(&port).copied()
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::well_known()
    }
}
