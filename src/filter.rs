/// Etapa de filtrado del pipeline.
///
/// Evalúa predicados puros sobre los registros enriquecidos. No decide
/// ningún valor por defecto: la vista "solo LISTEN" implícita la arma
/// quien construye la configuración (ver `cli::Args::filter_config`).
use crate::record::PortRecord;

/// Opciones de filtrado reconocidas.
///
/// Todas las opciones presentes se combinan con AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// Protocolo exacto, sin distinguir mayúsculas
    pub protocol: Option<String>,
    /// Estado exacto, sin distinguir mayúsculas
    pub status: Option<String>,
    /// Puerto local exacto; `Some(0)` equivale a no filtrar
    pub port: Option<u16>,
    /// Equivale a `status == LISTEN` y se combina con `status`
    pub listen_only: bool,
    /// Máximo de registros aceptados; 0 significa sin límite
    pub limit: usize,
}

impl FilterConfig {
    /// Indica si un registro cumple todos los predicados configurados.
    pub fn matches(&self, record: &PortRecord) -> bool {
        if let Some(protocol) = &self.protocol {
            if !record.protocol.as_str().eq_ignore_ascii_case(protocol) {
                return false;
            }
        }

        if let Some(status) = &self.status {
            if !record.status.eq_ignore_ascii_case(status) {
                return false;
            }
        }

        if let Some(port) = self.port.filter(|p| *p > 0) {
            if record.local_port != port {
                return false;
            }
        }

        if self.listen_only && !record.is_listen() {
            return false;
        }

        true
    }
}

/// Aplica el filtro conservando el orden de entrada.
///
/// El recorrido se corta en cuanto se aceptan `limit` registros, así que
/// el resultado tiene exactamente `min(limit, coincidencias)` elementos.
pub fn filter_records(records: Vec<PortRecord>, config: &FilterConfig) -> Vec<PortRecord> {
    let matching = records.into_iter().filter(|record| config.matches(record));

    if config.limit > 0 {
        matching.take(config.limit).collect()
    } else {
        matching.collect()
    }
}
