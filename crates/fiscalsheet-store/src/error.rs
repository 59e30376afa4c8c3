use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("cannot write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("io error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("remote storage error: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),
}
