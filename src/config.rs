//! Configuração do genwatch carregada a partir de `genwatch.toml`.
//!
//! A struct [`GenwatchConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `GENWATCH_TOKEN` tem precedência sobre o arquivo.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::poll::PollConfig;

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "genwatch.toml";

/// Variável de ambiente com o token de acesso.
pub const TOKEN_ENV: &str = "GENWATCH_TOKEN";

/// Configuração de nível superior carregada de `genwatch.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenwatchConfig {
    /// URL do endpoint GraphQL do painel administrativo.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Token Bearer enviado em cada requisição.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Intervalo entre consultas de status de PDF, em milissegundos.
    #[serde(default = "default_pdf_poll_interval_ms")]
    pub pdf_poll_interval_ms: u64,

    /// Intervalo entre consultas do status de relatórios, em milissegundos.
    #[serde(default = "default_report_poll_interval_ms")]
    pub report_poll_interval_ms: u64,

    /// Limite de consultas antes de desistir. Sem limite quando ausente.
    #[serde(default)]
    pub max_polls: Option<u32>,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Endpoint padrão: servidor admin local.
fn default_endpoint() -> String {
    "http://localhost:4455/graphql".to_string()
}

// Valor padrão para o intervalo de PDF: 2000ms.
fn default_pdf_poll_interval_ms() -> u64 {
    2000
}

// Valor padrão para o intervalo de relatórios: 5000ms.
fn default_report_poll_interval_ms() -> u64 {
    5000
}

// Valor padrão para o timeout: 30s.
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for GenwatchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_token: None,
            pdf_poll_interval_ms: default_pdf_poll_interval_ms(),
            report_poll_interval_ms: default_report_poll_interval_ms(),
            max_polls: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl GenwatchConfig {
    /// Carrega a configuração de `genwatch.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    /// Um arquivo ausente não é erro; um arquivo inválido é.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<GenwatchConfig>(&contents)
                .with_context(|| format!("invalid config in {}", path.display()))?
        } else {
            Self::default()
        };

        config.validate()?;

        // Variável de ambiente tem precedência sobre o arquivo de configuração para o token.
        config.apply_token(std::env::var(TOKEN_ENV).ok());

        Ok(config)
    }

    /// Rejeita intervalos de consulta zerados.
    pub fn validate(&self) -> Result<()> {
        if self.pdf_poll_interval_ms == 0 {
            bail!("pdf_poll_interval_ms must be greater than zero");
        }
        if self.report_poll_interval_ms == 0 {
            bail!("report_poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    // Tokens vazios são ignorados.
    fn apply_token(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.auth_token = Some(token);
        }
    }

    /// Cadência de consulta para a geração de PDFs.
    pub fn pdf_poll(&self) -> PollConfig {
        PollConfig::every(Duration::from_millis(self.pdf_poll_interval_ms))
            .with_max_polls(self.max_polls)
    }

    /// Cadência de consulta para execuções de relatório.
    pub fn report_poll(&self) -> PollConfig {
        PollConfig::every(Duration::from_millis(self.report_poll_interval_ms))
            .with_max_polls(self.max_polls)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
