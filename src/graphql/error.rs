//! Tipos de erro para o cliente GraphQL do painel administrativo.
//!
//! Define [`ClientError`] com variantes para erros HTTP, erros GraphQL,
//! respostas sem dados ou malformadas e falhas de rede. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao falar com a API GraphQL.
#[derive(Debug, Error)]
pub enum ClientError {
    /// O servidor respondeu com status HTTP fora da faixa 2xx.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A resposta trouxe um array `errors` não vazio.
    #[error("GraphQL error: {0}")]
    Graphql(String),

    /// O campo esperado veio `null` ou ausente em `data`.
    #[error("response is missing `{0}`")]
    MissingData(&'static str),

    /// O campo veio presente mas com formato inesperado.
    #[error("malformed `{field}`: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// O `__typename` do documento gerado não corresponde a nenhum tipo conhecido.
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
