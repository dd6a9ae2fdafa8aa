use std::{path::PathBuf, time::Duration};

use clap::Parser;
use gatehouse::{AuthorizationEngine, AuthorizerRequest, Config};
use tokio_util::sync::CancellationToken;

/// Authorizes one gateway call and prints the resulting policy
///
/// The authorizer itself is configured from the environment, or from a
/// `.env` file, as it would be when deployed.
#[derive(Debug, Parser)]
struct Opts {
    /// The method identifier of the call
    #[arg(short, long, env = "METHOD_ARN", conflicts_with = "event")]
    method_arn: Option<String>,

    /// The bearer token presented by the caller
    #[arg(short, long, env = "AUTHORIZATION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// A token authorizer event, as delivered by the gateway
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Abandons the call after this many milliseconds
    #[arg(long, default_value_t = 5000)]
    deadline_ms: u64,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();

    let request = match (opts.event, opts.method_arn, opts.token) {
        (Some(path), _, _) => serde_json::from_slice(&std::fs::read(path)?)?,
        (None, Some(method_arn), Some(token)) => AuthorizerRequest {
            kind: "TOKEN".to_owned(),
            authorization_token: token.into(),
            method_arn,
        },
        _ => color_eyre::eyre::bail!("either an event or a method ARN and token are required"),
    };

    let engine = AuthorizationEngine::from_config(Config::from_env()?)?;

    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    let deadline = Duration::from_millis(opts.deadline_ms);
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        timer.cancel();
    });

    let response = tokio::select! {
        result = engine.authorize_with_cancellation(
            &request.method_arn,
            request.authorization_token.as_str(),
            &cancel,
        ) => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            color_eyre::eyre::bail!("interrupted");
        }
    };

    println!("{}", serde_json::to_string_pretty(&response?)?);

    Ok(())
}
