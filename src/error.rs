use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShowPortError {
    #[error("Fuente de conexiones no disponible ({backend}): {reason}")]
    SourceUnavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("Proceso no encontrado: PID {0}")]
    ProcessNotFound(u32),

    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShowPortError>;
