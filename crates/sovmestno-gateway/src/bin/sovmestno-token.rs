//! Issues gateway-acceptable tokens for local development and smoke tests.
//!
//! Uses the same `auth.jwt_secret` resolution as the gateway itself, so a
//! token printed here is admitted by a gateway started with the same config.

use anyhow::{Context, Result, bail};
use clap::Parser;

use sovmestno_auth::{IdentityClaims, Role, TokenVerifier};
use sovmestno_gateway::config::loader::{DEFAULT_CONFIG_PATH, load_config};

#[derive(Parser)]
#[command(name = "sovmestno-token")]
#[command(about = "Sign an identity token for the Sovmestno gateway")]
#[command(version)]
struct Cli {
    /// Numeric user id placed in the `user_id` claim
    #[arg(long)]
    user_id: i64,

    /// Role claim: creator, venue or admin
    #[arg(long)]
    role: Role,

    /// Lifetime of the token in seconds
    #[arg(long, default_value_t = 86_400)]
    ttl_secs: i64,

    /// Gateway config file (falls back to SOVMESTNO_CONFIG, then sovmestno.toml)
    #[arg(long, env = "SOVMESTNO_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if cli.ttl_secs <= 0 {
        bail!("--ttl-secs must be positive");
    }

    let cfg = load_config(Some(&cli.config))
        .map_err(anyhow::Error::msg)
        .context("loading gateway configuration")?;

    let verifier = TokenVerifier::new(&cfg.auth.jwt_secret);
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = IdentityClaims::new(cli.user_id, cli.role, now, cli.ttl_secs);
    let token = verifier.sign(&claims).context("signing token")?;

    println!("{token}");
    Ok(())
}
