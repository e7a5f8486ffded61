//! Interface de linha de comando do iprbatch baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, count)
//! e a flag global `--verbose`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::naming::DescriptionMode;

/// iprbatch — envia as sequências de um FASTA ao InterProScan em lote.
#[derive(Debug, Parser)]
#[command(name = "iprbatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia um job por registro do FASTA e salva os resultados.
    ///
    /// Os arquivos são numerados: com prefixo e descrições ativados ficam
    /// como `prefix_0001_-_descricao do registro.svg.svg`; sem ambos,
    /// apenas `0001.svg.svg`.
    Run(RunArgs),

    /// Mostra quantos registros o arquivo FASTA contém.
    Count {
        /// Caminho do arquivo FASTA.
        fasta_file: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Caminho do arquivo FASTA.
    pub fasta_file: PathBuf,

    /// Diretório onde os resultados serão salvos.
    pub out_dir: PathBuf,

    /// Email de contato exigido pelo serviço (ou `IPRBATCH_EMAIL`).
    pub email: Option<String>,

    /// Prefixo opcional para todos os arquivos de resultado.
    #[arg(short, long, value_name = "RESULTS-PREFIX", default_value = "")]
    pub prefix: String,

    /// Usa as descrições dos registros FASTA nos nomes dos arquivos.
    #[arg(short = 'd', long = "use-fasta-descript")]
    pub use_fasta_descriptions: bool,

    /// Como a descrição é reduzida: full, first-word ou truncate:<N>.
    #[arg(long, value_name = "MODE", default_value = "full")]
    pub desc_mode: DescriptionMode,

    /// Não numera os arquivos de resultado.
    #[arg(short = 'n', long = "no-numbering")]
    pub no_numbering: bool,

    /// Registro inicial (inclusivo). Útil se um processo foi interrompido.
    #[arg(short = 'f', long = "frm", value_name = "FROM_RECORD", default_value_t = 0)]
    pub from_record: usize,

    /// Registro final (exclusivo). Continua até o fim do FASTA por padrão.
    #[arg(short = 't', long = "to", value_name = "TO_RECORD")]
    pub to_record: Option<usize>,

    /// Restringe o formato de saída (ex.: svg, xml).
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Máximo de jobs simultâneos (máx. 20).
    #[arg(short = 'j', long)]
    pub max_jobs: Option<usize>,

    /// Intervalo de verificação dos jobs, em segundos.
    #[arg(long, value_name = "SECONDS")]
    pub poll: Option<f64>,

    /// Encerra jobs que rodam por mais que este número de segundos.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Responde "sim" a todas as confirmações.
    #[arg(short, long)]
    pub yes: bool,

    /// Lista os nomes dos arquivos sem lançar nenhum job.
    #[arg(long)]
    pub dry_run: bool,

    /// Grava o relatório da execução em JSON neste caminho.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Sai com código de erro se algum job falhar.
    #[arg(long)]
    pub fail_on_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["iprbatch", "run", "seqs.faa", "out", "me@example.org"]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.fasta_file, PathBuf::from("seqs.faa"));
                assert_eq!(args.out_dir, PathBuf::from("out"));
                assert_eq!(args.email.as_deref(), Some("me@example.org"));
                assert_eq!(args.prefix, "");
                assert!(!args.use_fasta_descriptions);
                assert!(!args.no_numbering);
                assert_eq!(args.from_record, 0);
                assert!(args.to_record.is_none());
                assert_eq!(args.desc_mode, DescriptionMode::Full);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_naming_and_window_flags() {
        let cli = Cli::parse_from([
            "iprbatch",
            "run",
            "seqs.faa",
            "out",
            "-p",
            "batch1",
            "-d",
            "-n",
            "--desc-mode",
            "truncate:30",
            "-f",
            "2",
            "-t",
            "4",
            "-j",
            "8",
            "--poll",
            "2.5",
            "--yes",
            "--dry-run",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected Run command");
        };
        assert_eq!(args.prefix, "batch1");
        assert!(args.use_fasta_descriptions);
        assert!(args.no_numbering);
        assert_eq!(args.desc_mode, DescriptionMode::Truncate(30));
        assert_eq!(args.from_record, 2);
        assert_eq!(args.to_record, Some(4));
        assert_eq!(args.max_jobs, Some(8));
        assert_eq!(args.poll, Some(2.5));
        assert!(args.yes);
        assert!(args.dry_run);
        assert!(args.email.is_none());
    }

    #[test]
    fn cli_rejects_bad_desc_mode() {
        let result = Cli::try_parse_from(["iprbatch", "run", "a", "b", "--desc-mode", "half"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_global_verbose() {
        let cli = Cli::parse_from(["iprbatch", "count", "seqs.faa", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Count { .. }));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
