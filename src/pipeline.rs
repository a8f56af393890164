/// Pipeline de agregación de puertos.
///
/// Flujo: tuplas crudas → enriquecimiento → orden → filtro →
/// agregación (opcional) → orden final.
///
/// Todo es síncrono y de un solo hilo: cada llamada a `build_report`
/// produce una instantánea y descarta su caché de procesos al terminar.
use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::filter::{filter_records, FilterConfig};
use crate::record::{PortRecord, Protocol, RawConnection, UNKNOWN};
use crate::resolver::{ProcessNameCache, ProcessResolver};
use crate::services::ServiceCatalog;
use crate::source::ConnectionSource;

/// Resultado final listo para presentar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub records: Vec<PortRecord>,
    pub total: usize,
    pub aggregated: bool,
}

impl Report {
    pub fn new(records: Vec<PortRecord>, aggregated: bool) -> Self {
        Self {
            total: records.len(),
            records,
            aggregated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Ejecuta el pipeline completo sobre una instantánea de la fuente.
///
/// # Arguments
/// * `source` - Fuente de conexiones; su fallo aborta el reporte
/// * `resolver` - Resolvedor de nombres de proceso (memoizado por ejecución)
/// * `catalog` - Catálogo de servicios conocidos
/// * `filter` - Configuración de filtrado ya construida por el llamador
/// * `aggregate` - `false` para la vista cruda de todas las conexiones
pub fn build_report(
    source: &dyn ConnectionSource,
    resolver: &dyn ProcessResolver,
    catalog: &ServiceCatalog,
    filter: &FilterConfig,
    aggregate: bool,
) -> Result<Report> {
    let raw = source.enumerate()?;
    log::info!("{}: {} conexiones crudas", source.name(), raw.len());

    let mut cache = ProcessNameCache::new();
    let mut records = enrich_connections(raw, resolver, catalog, &mut cache);
    log::debug!(
        "Caché de procesos: {} consultas, {} aciertos",
        cache.misses(),
        cache.hits()
    );

    // El límite del filtro toma los primeros registros en este orden
    order_records(&mut records);

    let mut records = filter_records(records, filter);
    log::debug!("{} registros tras el filtro", records.len());

    if aggregate {
        records = aggregate_records(records);
        log::debug!("{} registros tras la agregación", records.len());
    }

    order_records(&mut records);
    for record in &records {
        log::trace!("{record}");
    }
    Ok(Report::new(records, aggregate))
}

// ─────────────────────────────────────────────────────────────
// Enriquecimiento
// ─────────────────────────────────────────────────────────────

/// Convierte las tuplas crudas en registros normalizados.
///
/// Las tuplas con puerto local 0 se descartan.
pub fn enrich_connections(
    raw: Vec<RawConnection>,
    resolver: &dyn ProcessResolver,
    catalog: &ServiceCatalog,
    cache: &mut ProcessNameCache,
) -> Vec<PortRecord> {
    let before = raw.len();
    let records: Vec<PortRecord> = raw
        .into_iter()
        .filter_map(|conn| enrich_connection(conn, resolver, catalog, cache))
        .collect();

    let discarded = before - records.len();
    if discarded > 0 {
        log::debug!("{discarded} conexiones sin puerto local descartadas");
    }
    records
}

/// Enriquece una conexión individual con nombre de proceso y servicio.
///
/// # Returns
/// `None` si el puerto local es 0, en otro caso un registro con
/// `connection_count = 1`.
pub fn enrich_connection(
    conn: RawConnection,
    resolver: &dyn ProcessResolver,
    catalog: &ServiceCatalog,
    cache: &mut ProcessNameCache,
) -> Option<PortRecord> {
    if conn.local.port == 0 {
        return None;
    }

    let owner_pid = conn.pid.filter(|pid| *pid > 0);
    let owner_name = cache.resolve(resolver, owner_pid);
    let service_name = catalog
        .lookup(conn.local.port)
        .unwrap_or(UNKNOWN)
        .to_string();

    let (remote_address, remote_port) = match conn.remote {
        Some(remote) => (remote.address, remote.port),
        None => (String::new(), 0),
    };

    Some(PortRecord {
        protocol: conn.protocol,
        local_address: conn.local.address,
        local_port: conn.local.port,
        remote_address,
        remote_port,
        status: conn.status,
        owner_pid,
        owner_name,
        service_name,
        connection_count: 1,
    })
}

// ─────────────────────────────────────────────────────────────
// Agregación
// ─────────────────────────────────────────────────────────────

/// Colapsa los registros que comparten (protocolo, puerto local).
///
/// Los grupos salen en el orden en que apareció su primer miembro.
/// `connection_count` suma los contadores de los miembros, por lo que
/// volver a agregar un resultado ya agregado no lo cambia.
pub fn aggregate_records(records: Vec<PortRecord>) -> Vec<PortRecord> {
    let mut index: HashMap<(Protocol, u16), usize> = HashMap::new();
    let mut groups: Vec<Vec<PortRecord>> = Vec::new();

    for record in records {
        match index.get(&record.key()) {
            Some(&slot) => groups[slot].push(record),
            None => {
                index.insert(record.key(), groups.len());
                groups.push(vec![record]);
            }
        }
    }

    groups.into_iter().filter_map(summarize_group).collect()
}

/// Produce el registro canónico de un grupo.
///
/// Si algún miembro está en LISTEN, el resumen es ese miembro completo;
/// si no, es el primer miembro visto. Entre varios miembros en LISTEN gana
/// el de menor PID conocido, de modo que el resultado no depende del orden
/// de llegada.
fn summarize_group(group: Vec<PortRecord>) -> Option<PortRecord> {
    let connection_count = group.iter().map(|r| r.connection_count).sum();

    let listen_owner = group
        .iter()
        .filter(|r| r.is_listen())
        .min_by(|a, b| compare_listen_owners(a, b))
        .cloned();

    let mut summary = match listen_owner {
        Some(owner) => owner,
        None => group.into_iter().next()?,
    };
    summary.connection_count = connection_count;
    Some(summary)
}

/// Orden total entre candidatos LISTEN: PID conocido antes que ausente,
/// luego PID menor, luego nombre, estado y direcciones.
fn compare_listen_owners(a: &PortRecord, b: &PortRecord) -> Ordering {
    let rank = |r: &PortRecord| (r.owner_pid.is_none(), r.owner_pid.unwrap_or(0));
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.owner_name.cmp(&b.owner_name))
        .then_with(|| a.status.cmp(&b.status))
        .then_with(|| a.local_address.cmp(&b.local_address))
        .then_with(|| a.remote_address.cmp(&b.remote_address))
        .then_with(|| a.remote_port.cmp(&b.remote_port))
}

// ─────────────────────────────────────────────────────────────
// Ordenamiento
// ─────────────────────────────────────────────────────────────

/// Ordena por puerto local ascendente y luego por nombre de protocolo.
///
/// El ordenamiento es estable: los empates restantes conservan su orden.
pub fn order_records(records: &mut [PortRecord]) {
    records.sort_by(|a, b| {
        a.local_port
            .cmp(&b.local_port)
            .then_with(|| a.protocol.as_str().cmp(b.protocol.as_str()))
    });
}
