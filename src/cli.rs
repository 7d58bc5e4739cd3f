//! Interface de linha de comando do genwatch baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (pdf, report)
//! e flags globais (--endpoint, --config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::job::JobInput;

/// genwatch — acompanha a geração de documentos e relatórios do painel administrativo.
#[derive(Debug, Parser)]
#[command(name = "genwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Endpoint GraphQL; sobrescreve o valor do arquivo de configuração.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Caminho para o arquivo de configuração.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Gera um PDF e abre o link de download ao concluir.
    Pdf {
        #[command(subcommand)]
        document: PdfCommand,

        /// Mensagem exibida em caso de sucesso.
        #[arg(long)]
        success_message: Option<String>,

        /// Mensagem exibida em caso de falha.
        #[arg(long)]
        error_message: Option<String>,
    },

    /// Dispara ou acompanha execuções de relatório.
    Report {
        #[command(subcommand)]
        action: ReportCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum PdfCommand {
    /// Contrato de empréstimo de um cliente.
    LoanAgreement {
        /// Identificador do cliente.
        #[arg(long)]
        customer_id: Uuid,
    },

    /// Exportação das linhas de crédito.
    CreditFacilityExport,
}

impl PdfCommand {
    pub fn input(&self) -> JobInput {
        match self {
            PdfCommand::LoanAgreement { customer_id } => JobInput::LoanAgreement {
                customer_id: *customer_id,
            },
            PdfCommand::CreditFacilityExport => JobInput::CreditFacilityExport,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Dispara uma execução e espera o resultado.
    Run,

    /// Acompanha o status e os logs até Ctrl-C.
    Watch,
}
