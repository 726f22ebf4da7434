use anyhow::{bail, Context};
use std::path::PathBuf;
use tracing::info;

use quoteserver::core::shared::RecordId;
use quoteserver::documents::{export_proforma, DocumentFormat};
use quoteserver::import::{import_from_store, sample_template, TableFormat};
use quoteserver::quotes::recalculate_packing;
use quoteserver::{store, AppConfig, AppState};

const USAGE: &str = "\
Usage: quoteserver <command>

Commands:
  serve                               Start the HTTP server
  export <id> <pdf|xlsx|docx> [--user <id>]
                                      Write a proforma into the output directory
  pack <id>                           Recalculate box allocation for a quotation
  import <file.xlsx|file.csv>         Match a table of codes against the catalog
  template <file>                     Write the import template";

enum Command {
    Serve,
    Export {
        id: RecordId,
        format: DocumentFormat,
        user: String,
    },
    Pack {
        id: RecordId,
    },
    Import {
        path: PathBuf,
    },
    Template {
        path: PathBuf,
    },
}

fn parse_id(value: Option<&String>) -> anyhow::Result<RecordId> {
    let value = value.context("Missing quotation id")?;
    value
        .parse()
        .with_context(|| format!("Invalid quotation id: {value}"))
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let Some(command) = args.first() else {
        bail!("{USAGE}");
    };

    match command.as_str() {
        "serve" => Ok(Command::Serve),
        "export" => {
            let id = parse_id(args.get(1))?;
            let format = args
                .get(2)
                .context("Missing format")?
                .parse::<DocumentFormat>()
                .map_err(anyhow::Error::msg)?;
            let user = match args.get(3).map(String::as_str) {
                Some("--user") => args.get(4).context("Missing value for --user")?.clone(),
                Some(other) => bail!("Unknown option: {other}"),
                None => "cli".to_string(),
            };
            Ok(Command::Export { id, format, user })
        }
        "pack" => Ok(Command::Pack {
            id: parse_id(args.get(1))?,
        }),
        "import" => Ok(Command::Import {
            path: args.get(1).context("Missing file")?.into(),
        }),
        "template" => Ok(Command::Template {
            path: args.get(1).context("Missing file")?.into(),
        }),
        "--help" | "-h" | "help" => {
            println!("{USAGE}");
            std::process::exit(0);
        }
        other => bail!("Unknown command: {other}\n\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quoteserver=info,tower_http=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    if let Command::Template { path } = &command {
        let bytes = sample_template()?;
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = AppConfig::load().context("Failed to load configuration")?;
    let store = store::connect(&config.store)
        .await
        .context("Failed to connect to the store")?;
    let state = AppState::new(config, store);
    info!(backend = ?state.config.store.backend, "Store ready");

    match command {
        Command::Serve => serve(state).await?,
        Command::Export { id, format, user } => {
            let outcome = export_proforma(&state, id, &user, format).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Command::Pack { id } => {
            let report = recalculate_packing(state.store.as_ref(), id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Import { path } => {
            let format = TableFormat::from_path(&path)?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let outcome = import_from_store(state.store.as_ref(), &bytes, format).await;
            info!("{}", outcome.summary());
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Command::Template { .. } => {}
    }

    Ok(())
}

#[cfg(feature = "server")]
async fn serve(state: AppState) -> anyhow::Result<()> {
    quoteserver::api::serve(std::sync::Arc::new(state)).await?;
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn serve(_state: AppState) -> anyhow::Result<()> {
    bail!("This build has no HTTP server; enable the `server` feature")
}
