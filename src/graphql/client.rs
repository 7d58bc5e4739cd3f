use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::ClientError;
use super::types::{GraphqlRequest, GraphqlResponse};

pub struct GraphqlClient {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl GraphqlClient {
    pub fn new(
        endpoint: String,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            auth_token: auth_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute one operation and return its `data` payload.
    ///
    /// A non-empty `errors` array is an error even when partial data came back.
    #[tracing::instrument(name = "graphql.execute", skip(self, query, variables))]
    pub async fn execute<V, D>(
        &self,
        operation_name: &str,
        query: &str,
        variables: V,
    ) -> Result<D, ClientError>
    where
        V: Serialize,
        D: DeserializeOwned,
    {
        let body = GraphqlRequest {
            query,
            operation_name,
            variables,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = response.json::<GraphqlResponse<D>>().await?;
        if !envelope.errors.is_empty() {
            let message = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ClientError::Graphql(message));
        }

        envelope.data.ok_or(ClientError::MissingData("data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, serde::Deserialize)]
    struct Ping {
        ping: String,
    }

    fn client_for(server: &MockServer, token: Option<&str>) -> GraphqlClient {
        GraphqlClient::new(
            format!("{}/graphql", server.uri()),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn execute_returns_data_and_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({"operationName": "Ping"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"ping": "pong"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let data: Ping = client
            .execute("Ping", "query Ping { ping }", json!({}))
            .await
            .unwrap();
        assert_eq!(data.ping, "pong");
    }

    #[tokio::test]
    async fn execute_maps_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{"message": "not authorized"}, {"message": "try again"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client
            .execute::<_, Ping>("Ping", "query Ping { ping }", json!({}))
            .await
            .unwrap_err();
        match err {
            ClientError::Graphql(message) => assert_eq!(message, "not authorized; try again"),
            other => panic!("expected Graphql error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn execute_maps_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client
            .execute::<_, Ping>("Ping", "query Ping { ping }", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 503, ref message } if message == "maintenance"));
    }

    #[tokio::test]
    async fn execute_rejects_missing_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client
            .execute::<_, Ping>("Ping", "query Ping { ping }", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingData("data")));
    }

    #[test]
    fn empty_token_is_ignored() {
        let client = GraphqlClient::new(
            "http://localhost:4455/admin/graphql".into(),
            Some(String::new()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(client.auth_token.is_none());
        assert_eq!(client.endpoint(), "http://localhost:4455/admin/graphql");
    }
}
