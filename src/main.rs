use std::path::PathBuf;

use clap::Parser;
use tower_lsp::{LspService, Server};
use tracing::info;

use cobol_language_server::config::ConfigOverrides;
use cobol_language_server::logging::init_logger;
use cobol_language_server::lsp::backend::CobolBackend;
use cobol_language_server::parsers::cobol::SourceFormat;

/// COBOL language server: references, definitions and workspace symbols
/// over stdio.
#[derive(Parser, Debug)]
#[command(name = "cobol-language-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Communicate over stdin/stdout (the only transport; accepted for client compatibility)
    #[arg(long)]
    stdio: bool,

    /// Process id of the client, for log correlation
    #[arg(long)]
    client_process_id: Option<u32>,

    /// Log filter for stderr (e.g. "debug", "cobol_language_server=trace")
    #[arg(long)]
    log_level: Option<String>,

    /// Disable ANSI colors in stderr output
    #[arg(long)]
    no_color: bool,

    /// Do not write a session log file
    #[arg(long)]
    no_file_logging: bool,

    /// Directory for the global symbol cache, overriding the per-workspace default
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Additional copybook search directory (repeatable)
    #[arg(long = "copybook-dir", value_name = "DIR")]
    copybook_dirs: Vec<PathBuf>,

    /// Reference format: fixed, variable or free
    #[arg(long, value_name = "FORMAT")]
    source_format: Option<SourceFormat>,

    /// Skip the workspace scan on startup
    #[arg(long)]
    no_workspace_scan: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            cache_directory: self.cache_dir.clone(),
            copybook_directories: self.copybook_dirs.clone(),
            source_format: self.source_format,
            no_workspace_scan: self.no_workspace_scan,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _log_guard = init_logger(args.no_color, args.log_level.as_deref(), !args.no_file_logging)?;
    info!(
        "Starting {} {} (client pid: {:?})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        args.client_process_id
    );

    if !args.stdio {
        info!("No transport flag given; serving on stdio");
    }

    let overrides = args.overrides();
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| CobolBackend::new(client, overrides));
    Server::new(stdin, stdout, socket).serve(service).await;

    info!("Server stopped");
    Ok(())
}
