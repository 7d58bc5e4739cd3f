//! Interface de terminal do genwatch — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`TerminalNotifier`] é a implementação de
//! [`Notifier`] usada pelo binário.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::MonitorError;
use crate::job::ArtifactLink;
use crate::notify::Notifier;
use crate::report_run::RunView;

/// Notificações no terminal para uma geração em andamento.
///
/// Exibe um spinner animado enquanto o job roda e mensagens coloridas
/// para sucesso (verde) e falha (vermelho). O link de download é
/// impresso para que o usuário possa abri-lo.
pub struct TerminalNotifier {
    // Spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo ciano para links.
    cyan: Style,
    // Marcado quando a última tentativa terminou em erro.
    failed: AtomicBool,
}

impl TerminalNotifier {
    /// Inicia o spinner com a descrição do documento.
    pub fn start(description: &str) -> Self {
        let pb = spinner(description);
        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            cyan: Style::new().cyan().underlined(),
            failed: AtomicBool::new(false),
        }
    }

    /// Indica se a geração terminou com erro, para o código de saída.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Remove o spinner sem imprimir resultado (ex.: Ctrl-C).
    pub fn abandon(&self) {
        self.pb.finish_and_clear();
    }
}

impl Notifier for TerminalNotifier {
    fn open_artifact(&self, link: &ArtifactLink) {
        self.pb.println(format!(
            "  ↓ {} {}",
            link.job_id,
            self.cyan.apply_to(&link.url)
        ));
    }

    fn success(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.green.apply_to("✓"));
    }

    fn error(&self, error: &MonitorError, message: &str) {
        self.failed.store(true, Ordering::SeqCst);
        self.pb.finish_and_clear();
        eprintln!("  {} {message}", self.red.apply_to("✗"));
        eprintln!("    {}", Style::new().dim().apply_to(error));
    }
}

/// Spinner padrão do genwatch.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Imprime o estado de uma execução de relatório com estilo colorido.
pub fn print_run_view(view: &RunView) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();

    let header = if view.running {
        yellow.apply_to("─── Report run: running ───".to_string())
    } else {
        match view.last_status.as_ref().map(|s| s.class()) {
            Some(crate::job::StatusClass::Succeeded) => {
                green.apply_to(format!("─── Report run: {} ───", status_label(view)))
            }
            Some(crate::job::StatusClass::Failed) => {
                red.apply_to(format!("─── Report run: {} ───", status_label(view)))
            }
            _ => yellow.apply_to(format!("─── Report run: {} ───", status_label(view))),
        }
    };
    println!();
    println!("{header}");

    let logs = if view.running {
        &view.logs
    } else {
        &view.last_run_logs
    };
    if !logs.is_empty() {
        println!("{logs}");
    }
    if let Some(error) = &view.error {
        eprintln!("  {} {error}", red.apply_to("✗"));
    }
}

fn status_label(view: &RunView) -> String {
    view.last_status
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "idle".to_string())
}
