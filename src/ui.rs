//! Interface de terminal do iprbatch — barra de progresso, confirmações e
//! saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores e leitura das respostas do usuário.

use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use crate::driver::Confirm;
use crate::scheduler::{BatchReport, ProgressSink};
use crate::state_machine::{Job, JobRecord};

/// Indicador visual de progresso para um lote de jobs.
///
/// A barra avança quando um job termina; a mensagem mostra quantos estão
/// em execução. Falhas são impressas acima da barra em vermelho.
pub struct BatchProgress {
    pb: ProgressBar,
    red: Style,
}

impl BatchProgress {
    /// Cria a barra para `total` jobs esperados.
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            red: Style::new().red().bold(),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl ProgressSink for BatchProgress {
    fn admitted(&self, job: &Job, running: usize) {
        self.pb
            .set_message(format!("#{} submitted, {running} running", job.ordinal));
    }

    fn finished(&self, record: &JobRecord, running: usize) {
        self.pb.inc(1);
        self.pb.set_message(format!("{running} running"));
        if !record.outcome.is_success() {
            self.pb.println(format!(
                "  {} Job {} ({}): {}",
                self.red.apply_to("✗"),
                record.ordinal,
                record.output_path.display(),
                record.outcome
            ));
        }
    }
}

/// Imprime o resumo final da execução.
pub fn print_summary(report: &BatchReport) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let failed = report.jobs.len() - report.succeeded();

    println!();
    println!(
        "  {} {} job(s) finished successfully",
        green.apply_to("✓"),
        report.succeeded()
    );
    if failed > 0 {
        println!("  {} {failed} job(s) did not succeed:", red.apply_to("✗"));
        for record in report.failures() {
            println!(
                "      #{} {} — {}",
                record.ordinal,
                record.output_path.display(),
                record.outcome
            );
        }
    }
    println!("  run id: {}", report.run_id);
}

/// Confirmações lidas do terminal. Resposta vazia conta como "sim".
pub struct TerminalConfirm {
    term: Term,
    yellow: Style,
}

impl TerminalConfirm {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            yellow: Style::new().yellow(),
        }
    }
}

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> std::io::Result<bool> {
        self.term
            .write_str(&format!("{} (Y/n) ", self.yellow.apply_to(prompt)))?;
        let answer = self.term.read_line()?;
        Ok(is_yes(&answer))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim(), "" | "y" | "Y")
}
