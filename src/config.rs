//! Configuração do iprbatch carregada a partir de `iprbatch.toml`.
//!
//! A struct [`BatchConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `IPRBATCH_EMAIL` tem precedência sobre o arquivo,
//! e as flags da CLI têm precedência sobre ambos.

use std::path::Path;

use serde::Deserialize;

use crate::error::BatchError;
use crate::launch::CommandTemplate;
use crate::scheduler::MAX_CONCURRENT_CEILING;

pub const CONFIG_FILE: &str = "iprbatch.toml";
pub const EMAIL_ENV: &str = "IPRBATCH_EMAIL";

/// Configuração de nível superior carregada de `iprbatch.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Email de contato exigido pelo serviço remoto.
    #[serde(default)]
    pub email: String,

    /// Máximo de jobs simultâneos (limitado a 20).
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Intervalo de verificação dos jobs em execução, em segundos.
    #[serde(default = "default_polling_time")]
    pub polling_time: f64,

    /// Pausa entre dois lançamentos consecutivos, em milissegundos.
    #[serde(default = "default_launch_delay_ms")]
    pub launch_delay_ms: u64,

    /// Tempo máximo de execução de um job antes de ser encerrado.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    /// Programa auxiliar que executa a análise remota.
    #[serde(default = "default_program")]
    pub program: String,

    /// Argumentos fixos passados ao programa antes dos argumentos do job.
    #[serde(default = "default_program_args")]
    pub program_args: Vec<String>,

    /// Descarta stdout/stderr do programa auxiliar.
    #[serde(default)]
    pub quiet_jobs: bool,

    /// Restringe o formato de saída (ex.: "svg", "xml").
    #[serde(default)]
    pub single_results_format: Option<String>,
}

// Valor padrão para jobs simultâneos: o teto do serviço.
fn default_max_concurrent_jobs() -> usize {
    MAX_CONCURRENT_CEILING
}

// Valor padrão para o intervalo de verificação: 10s.
fn default_polling_time() -> f64 {
    10.0
}

// Valor padrão para a pausa entre lançamentos: 500ms.
fn default_launch_delay_ms() -> u64 {
    500
}

fn default_program() -> String {
    CommandTemplate::default().program
}

fn default_program_args() -> Vec<String> {
    CommandTemplate::default().args
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            polling_time: default_polling_time(),
            launch_delay_ms: default_launch_delay_ms(),
            job_timeout_secs: None,
            program: default_program(),
            program_args: default_program_args(),
            quiet_jobs: false,
            single_results_format: None,
        }
    }
}

impl BatchConfig {
    /// Carrega a configuração de `iprbatch.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, BatchError> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;

        // Variável de ambiente tem precedência sobre o arquivo para o email.
        if let Ok(email) = std::env::var(EMAIL_ENV) {
            if !email.is_empty() {
                config.email = email;
            }
        }

        Ok(config)
    }

    /// Carrega a configuração de um caminho explícito, sem consultar o ambiente.
    pub fn load_from(path: &Path) -> Result<Self, BatchError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<BatchConfig>(&contents)?)
    }

    pub fn command_template(&self) -> CommandTemplate {
        CommandTemplate {
            program: self.program.clone(),
            args: self.program_args.clone(),
        }
    }
}
