//! Admin GraphQL operations used by the monitors, and the backend
//! implementations built on them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::client::GraphqlClient;
use super::error::ClientError;
use super::types::{
    DocumentStatusData, DownloadLinkData, PdfGenerateData, ReportRunStatusData,
    TriggerReportRunData,
};
use crate::dispatch::{JobBackend, StatusDispatch, StatusQuery};
use crate::job::{JobId, JobInput, ResourceType, StartedJob, StatusSnapshot};
use crate::report_run::{ReportRunBackend, RunStatus};

const PDF_GENERATE: &str = r#"
mutation PdfGenerate($input: PdfGenerateInput!) {
  pdfGenerate(input: $input) {
    document {
      __typename
      ... on LoanAgreement {
        id
        loanAgreementStatus: status
        createdAt
      }
      ... on CreditFacilityExport {
        id
        creditFacilityExportStatus: status
        createdAt
      }
    }
  }
}"#;

const PDF_DOWNLOAD_LINK_GENERATE: &str = r#"
mutation PdfDownloadLinkGenerate($input: PdfDownloadLinkGenerateInput!) {
  pdfDownloadLinkGenerate(input: $input) {
    pdfId
    link
  }
}"#;

const LOAN_AGREEMENT: &str = r#"
query LoanAgreement($id: UUID!) {
  loanAgreement(id: $id) {
    id
    status
  }
}"#;

const CREDIT_FACILITY_EXPORT: &str = r#"
query CreditFacilityExport($id: UUID!) {
  creditFacilityExport(id: $id) {
    id
    status
  }
}"#;

const TRIGGER_REPORT_RUN: &str = r#"
mutation TriggerReportRun {
  triggerReportRun {
    runId
  }
}"#;

const REPORT_RUN_STATUS: &str = r#"
query ReportRunStatus {
  reportRunStatus {
    running
    logs
    error
    lastRun {
      runId
      status
      logs
    }
  }
}"#;

/// Builds the `PdfGenerateInput` oneOf object.
fn pdf_generate_input(input: &JobInput) -> serde_json::Value {
    match input {
        JobInput::LoanAgreement { customer_id } => {
            json!({ "loanAgreement": { "customerId": customer_id } })
        }
        JobInput::CreditFacilityExport => json!({ "creditFacilityExport": { "generate": true } }),
    }
}

/// PDF generation and link issuance through the admin API.
pub struct PdfService {
    client: Arc<GraphqlClient>,
}

impl PdfService {
    pub fn new(client: Arc<GraphqlClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobBackend for PdfService {
    async fn start_job(&self, input: &JobInput) -> Result<StartedJob, ClientError> {
        let data: PdfGenerateData = self
            .client
            .execute(
                "PdfGenerate",
                PDF_GENERATE,
                json!({ "input": pdf_generate_input(input) }),
            )
            .await?;

        let document = data
            .pdf_generate
            .and_then(|payload| payload.document)
            .ok_or(ClientError::MissingData("pdfGenerate.document"))?;

        let resource_type = document
            .typename
            .parse::<ResourceType>()
            .map_err(ClientError::UnknownDocumentType)?;

        Ok(StartedJob {
            id: JobId::new(document.id),
            resource_type,
            status: document.status,
            created_at: document.created_at,
        })
    }

    async fn issue_download_link(&self, id: &JobId) -> Result<Option<String>, ClientError> {
        let data: DownloadLinkData = self
            .client
            .execute(
                "PdfDownloadLinkGenerate",
                PDF_DOWNLOAD_LINK_GENERATE,
                json!({ "input": { "pdfId": id } }),
            )
            .await?;

        let payload = data
            .pdf_download_link_generate
            .ok_or(ClientError::MissingData("pdfDownloadLinkGenerate"))?;
        tracing::debug!(pdf_id = %payload.pdf_id, issued = payload.link.is_some(), "Download link response");
        Ok(payload.link.filter(|link| !link.trim().is_empty()))
    }
}

/// A per-document status query. Every document kind answers with the same
/// `{ id status }` shape, so one struct covers all table entries.
pub struct DocumentStatusQuery {
    client: Arc<GraphqlClient>,
    operation: &'static str,
    query: &'static str,
    field: &'static str,
}

#[async_trait]
impl StatusQuery for DocumentStatusQuery {
    async fn poll_status(&self, id: &JobId) -> Result<StatusSnapshot, ClientError> {
        let mut data: serde_json::Map<String, serde_json::Value> = self
            .client
            .execute(self.operation, self.query, json!({ "id": id }))
            .await?;

        let document = match data.remove(self.field) {
            Some(serde_json::Value::Null) | None => return Err(ClientError::MissingData(self.field)),
            Some(value) => serde_json::from_value::<DocumentStatusData>(value)
                .map_err(|source| ClientError::Decode {
                    field: self.field,
                    source,
                })?,
        };
        tracing::trace!(id = %document.id, status = %document.status, "Document status");

        Ok(StatusSnapshot {
            status: document.status,
            error: None,
        })
    }
}

/// The resource-type table for PDF documents.
pub fn document_status_dispatch(client: Arc<GraphqlClient>) -> StatusDispatch {
    let entry = |operation: &'static str,
                 query: &'static str,
                 field: &'static str|
     -> Arc<dyn StatusQuery> {
        Arc::new(DocumentStatusQuery {
            client: client.clone(),
            operation,
            query,
            field,
        })
    };

    StatusDispatch::new()
        .register(
            ResourceType::LoanAgreement,
            entry("LoanAgreement", LOAN_AGREEMENT, "loanAgreement"),
        )
        .register(
            ResourceType::CreditFacilityExport,
            entry(
                "CreditFacilityExport",
                CREDIT_FACILITY_EXPORT,
                "creditFacilityExport",
            ),
        )
}

/// Regulatory report runs through the admin API.
pub struct ReportRunService {
    client: Arc<GraphqlClient>,
}

impl ReportRunService {
    pub fn new(client: Arc<GraphqlClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportRunBackend for ReportRunService {
    async fn trigger_run(&self) -> Result<Option<String>, ClientError> {
        let data: TriggerReportRunData = self
            .client
            .execute("TriggerReportRun", TRIGGER_REPORT_RUN, json!({}))
            .await?;
        let payload = data
            .trigger_report_run
            .ok_or(ClientError::MissingData("triggerReportRun"))?;
        Ok(payload.run_id)
    }

    async fn run_status(&self) -> Result<RunStatus, ClientError> {
        let data: ReportRunStatusData = self
            .client
            .execute("ReportRunStatus", REPORT_RUN_STATUS, json!({}))
            .await?;
        data.report_run_status
            .ok_or(ClientError::MissingData("reportRunStatus"))
    }
}
