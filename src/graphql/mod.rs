pub mod client;
pub mod error;
pub mod operations;
pub mod types;

pub use client::GraphqlClient;
pub use error::ClientError;
pub use operations::{PdfService, ReportRunService, document_status_dispatch};
