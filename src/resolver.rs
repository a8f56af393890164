/// Resolución de PIDs a nombres de proceso.
///
/// El resolvedor real lee `/proc/<pid>/stat`. La caché vive solo durante
/// una ejecución del pipeline y evita consultar dos veces el mismo PID.
use std::collections::HashMap;

use crate::error::{Result, ShowPortError};
use crate::record::UNKNOWN;

/// Traduce un PID al nombre legible del proceso.
pub trait ProcessResolver {
    /// Devuelve el nombre del proceso o `ProcessNotFound` si no existe
    /// o no se puede leer.
    fn name_of(&self, pid: u32) -> Result<String>;
}

/// Resolvedor basado en procfs (campo `comm` de `/proc/<pid>/stat`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsResolver;

impl ProcessResolver for ProcfsResolver {
    fn name_of(&self, pid: u32) -> Result<String> {
        let raw_pid = i32::try_from(pid).map_err(|_| ShowPortError::ProcessNotFound(pid))?;
        let process =
            procfs::process::Process::new(raw_pid).map_err(|_| ShowPortError::ProcessNotFound(pid))?;
        let stat = process
            .stat()
            .map_err(|_| ShowPortError::ProcessNotFound(pid))?;
        Ok(stat.comm)
    }
}

/// Caché de nombres de proceso para una sola ejecución.
///
/// Guarda también los fallos: un PID que no se pudo resolver no se vuelve
/// a consultar en la misma ejecución.
#[derive(Debug, Default)]
pub struct ProcessNameCache {
    names: HashMap<u32, Option<String>>,
    hits: usize,
    misses: usize,
}

impl ProcessNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtiene el nombre del proceso, consultando al resolvedor solo la
    /// primera vez que aparece cada PID.
    ///
    /// # Returns
    /// El nombre resuelto, o `"unknown"` si no hay PID o la resolución falla.
    pub fn resolve(&mut self, resolver: &dyn ProcessResolver, pid: Option<u32>) -> String {
        let pid = match pid {
            Some(pid) if pid > 0 => pid,
            _ => return UNKNOWN.to_string(),
        };

        if let Some(cached) = self.names.get(&pid) {
            self.hits += 1;
            return cached.clone().unwrap_or_else(|| UNKNOWN.to_string());
        }

        self.misses += 1;
        let resolved = match resolver.name_of(pid) {
            Ok(name) if !name.is_empty() => Some(name),
            Ok(_) => None,
            Err(err) => {
                log::debug!("No se pudo resolver el proceso: {err}");
                None
            }
        };
        self.names.insert(pid, resolved.clone());
        resolved.unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Consultas respondidas desde la caché
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Consultas que llegaron al resolvedor
    pub fn misses(&self) -> usize {
        self.misses
    }
}
