//! Tipos de dados para requisições e respostas GraphQL.
//!
//! O envelope [`GraphqlRequest`] segue o formato padrão `{query, operationName,
//! variables}`. As structs de payload refletem exatamente as seleções feitas
//! pelas operações em [`super::operations`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::ObservedStatus;

/// Corpo de uma requisição GraphQL.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<'a, V> {
    /// Texto da operação.
    pub query: &'a str,
    /// Nome da operação a executar. Serializado como `operationName`.
    #[serde(rename = "operationName")]
    pub operation_name: &'a str,
    /// Variáveis da operação.
    pub variables: V,
}

/// Envelope de resposta GraphQL.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<D> {
    /// Dados retornados; `None` quando a execução falhou por completo.
    pub data: Option<D>,
    /// Erros de execução ou validação.
    #[serde(default)]
    pub errors: Vec<GraphqlErrorEntry>,
}

/// Uma entrada do array `errors`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlErrorEntry {
    pub message: String,
}

/// Payload de `pdfGenerate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfGenerateData {
    pub pdf_generate: Option<PdfGeneratePayload>,
}

#[derive(Debug, Deserialize)]
pub struct PdfGeneratePayload {
    pub document: Option<GeneratedDocument>,
}

/// Documento retornado pela mutação de geração.
///
/// Cada membro da união expõe o status sob um alias próprio
/// (`loanAgreementStatus`, `creditFacilityExportStatus`); ambos caem em `status`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDocument {
    /// Nome do tipo concreto na união (`LoanAgreement`, `CreditFacilityExport`).
    #[serde(rename = "__typename")]
    pub typename: String,
    pub id: String,
    #[serde(alias = "loanAgreementStatus", alias = "creditFacilityExportStatus")]
    pub status: ObservedStatus,
    pub created_at: DateTime<Utc>,
}

/// Resultado de uma consulta de status por documento.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatusData {
    pub id: String,
    pub status: ObservedStatus,
}

/// Payload de `pdfDownloadLinkGenerate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLinkData {
    pub pdf_download_link_generate: Option<DownloadLinkPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLinkPayload {
    pub pdf_id: String,
    pub link: Option<String>,
}

/// Payload de `triggerReportRun`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReportRunData {
    pub trigger_report_run: Option<TriggerReportRunPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReportRunPayload {
    pub run_id: Option<String>,
}

/// Payload de `reportRunStatus`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRunStatusData {
    pub report_run_status: Option<crate::report_run::RunStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[test]
    fn request_uses_operation_name_field() {
        let req = GraphqlRequest {
            query: "query X { x }",
            operation_name: "X",
            variables: serde_json::json!({}),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""operationName":"X""#));
        assert!(!json.contains("operation_name"));
    }

    #[test]
    fn generated_document_reads_aliased_status() {
        let json = r#"{
            "__typename": "CreditFacilityExport",
            "id": "5f0c",
            "creditFacilityExportStatus": "PENDING",
            "createdAt": "2025-03-01T10:00:00Z"
        }"#;
        let doc: GeneratedDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.typename, "CreditFacilityExport");
        assert_eq!(doc.status, ObservedStatus::Known(JobStatus::Pending));

        let json = r#"{
            "__typename": "LoanAgreement",
            "id": "a1",
            "loanAgreementStatus": "COMPLETED",
            "createdAt": "2025-03-01T10:00:00Z"
        }"#;
        let doc: GeneratedDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.status, ObservedStatus::Known(JobStatus::Completed));
    }

    #[test]
    fn response_without_errors_field() {
        let json = r#"{"data": {"pdfDownloadLinkGenerate": {"pdfId": "p", "link": null}}}"#;
        let resp: GraphqlResponse<DownloadLinkData> = serde_json::from_str(json).unwrap();
        assert!(resp.errors.is_empty());
        let payload = resp.data.unwrap().pdf_download_link_generate.unwrap();
        assert_eq!(payload.pdf_id, "p");
        assert_eq!(payload.link, None);
    }
}
