use clap::Parser;
use dbaction::{ActionEngine, ActionRequest, Application, EngineConfig, InputTable, ParamValue};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dbaction")]
#[command(about = "Run a database action and print its result table as JSON", long_about = None)]
struct Args {
    /// Application definition (TOML)
    #[arg(long)]
    app: PathBuf,

    /// Action id to run
    #[arg(long)]
    action: String,

    /// Input data file, {"fields": [...], "rows": [[...]]}
    #[arg(long)]
    input: Option<PathBuf>,

    /// Authenticated user name
    #[arg(long)]
    user: Option<String>,

    /// Requesting device
    #[arg(long)]
    device: Option<String>,

    /// Session attribute (e.g., --session region=north)
    #[arg(long = "session", value_parser = parse_session)]
    session: Vec<(String, ParamValue)>,

    /// Directory holding dbaction.toml and .env
    #[arg(long, default_value = ".")]
    config: PathBuf,

    /// Disable the result cache
    #[arg(long)]
    no_cache: bool,
}

fn parse_session(arg: &str) -> Result<(String, ParamValue), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", arg))?;
    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) if !json.is_array() && !json.is_object() => ParamValue::from(&json),
        _ => ParamValue::from(value),
    };
    Ok((key.to_string(), value))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbaction=info,dbaction_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = EngineConfig::load(&args.config)?;
    if args.no_cache {
        config.cache.capacity = 0;
    }

    let app = Arc::new(Application::load(&args.app)?);
    tracing::info!("Loaded application '{}' from {}", app.id, args.app.display());

    let mut request = ActionRequest::new();
    if let Some(user) = args.user {
        request = request.with_user(user);
    }
    if let Some(device) = args.device {
        request = request.with_device(device);
    }
    for (key, value) in args.session {
        request = request.with_session_attribute(key, value);
    }
    if let Some(path) = &args.input {
        let content = std::fs::read_to_string(path)?;
        let input: InputTable = serde_json::from_str(&content)?;
        request = request.with_input(input);
    }

    let engine = ActionEngine::from_config(app, config)?;

    let started = Instant::now();
    let table = engine.run_action(&args.action, &request)?;
    tracing::info!(
        "Action '{}' finished in {:?} with {} rows",
        args.action,
        started.elapsed(),
        table.rows.len()
    );

    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session() {
        assert_eq!(
            parse_session("region=north").unwrap(),
            ("region".to_string(), ParamValue::from("north"))
        );
        assert_eq!(
            parse_session("limit=10").unwrap(),
            ("limit".to_string(), ParamValue::Integer(10))
        );
        assert_eq!(
            parse_session("tags=[1,2]").unwrap().1,
            ParamValue::from("[1,2]")
        );
        assert!(parse_session("novalue").is_err());
    }
}
