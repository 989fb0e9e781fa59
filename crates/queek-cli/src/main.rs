//! Queek CLI - drive the client login flow from a terminal.
//!
//! Tokens are kept in a JSON file (see `--token-file`) so consecutive
//! invocations share one session.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use logging::init_logging;
use queek_client::{
    ApiEnvelope, AuthSession, ClientConfig, ClientMode, OtpChannel, QueekClient, RegisterPayload,
    RequestOptions, RequestOtpPayload, VerifyOtpPayload,
};
use queek_storage::FileStorage;
use serde_json::{json, Value};
use tracing::debug;

/// Queek client command-line interface.
#[derive(Parser)]
#[command(name = "queek")]
#[command(about = "Log in to the Queek API and make authenticated calls")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// API base URL, e.g. https://api.queek.com.ng/api/v1
    #[arg(long, env = "QUEEK_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Public client key (required in external-sdk mode)
    #[arg(long, env = "QUEEK_CLIENT_KEY", global = true)]
    client_key: Option<String>,

    #[arg(long, env = "QUEEK_VENDOR_SLUG", global = true)]
    vendor_slug: Option<String>,

    #[arg(long, value_enum, env = "QUEEK_MODE", default_value = "external-sdk", global = true)]
    mode: ModeArg,

    /// Platform reported to the auth endpoints
    #[arg(long, env = "QUEEK_PLATFORM", global = true)]
    platform: Option<String>,

    /// Session file. Defaults to the user data directory.
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a one-time passcode to a phone number
    RequestOtp {
        phone: String,
        #[arg(long)]
        country_code: Option<String>,
        #[arg(long, value_enum, default_value = "sms")]
        channel: ChannelArg,
    },
    /// Log in with a received passcode
    VerifyOtp {
        phone: String,
        otp_code: String,
        #[arg(long)]
        country_code: Option<String>,
    },
    /// Create an account with a received passcode
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        otp_code: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        country_code: Option<String>,
    },
    /// Show the logged-in account
    Me,
    /// Refresh the session tokens
    Refresh,
    /// Log out and forget the stored session
    Logout,
    /// GET an arbitrary API path with the current session
    Get { path: String },
    /// Show whether a session is stored
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    #[value(alias = "external_sdk")]
    ExternalSdk,
    #[value(alias = "hosted_storefront")]
    HostedStorefront,
}

impl From<ModeArg> for ClientMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::ExternalSdk => ClientMode::ExternalSdk,
            ModeArg::HostedStorefront => ClientMode::HostedStorefront,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    Sms,
    Whatsapp,
}

impl From<ChannelArg> for OtpChannel {
    fn from(channel: ChannelArg) -> Self {
        match channel {
            ChannelArg::Sms => OtpChannel::Sms,
            ChannelArg::Whatsapp => OtpChannel::Whatsapp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.json_logs);

    let storage = match &cli.token_file {
        Some(path) => FileStorage::new(path),
        None => FileStorage::default_location()?,
    };
    debug!(path = %storage.path().display(), "Using session file");
    let token_file = storage.path().to_path_buf();

    let client = QueekClient::new(build_config(&cli, Arc::new(storage))?)?;
    let auth = client.auth();

    match cli.command {
        Commands::RequestOtp {
            phone,
            country_code,
            channel,
        } => {
            let mut payload = RequestOtpPayload::new(phone).with_channel(channel.into());
            if let Some(code) = country_code {
                payload = payload.with_country_code(code);
            }
            print_json(&auth.request_otp(payload).await?)?;
        }
        Commands::VerifyOtp {
            phone,
            otp_code,
            country_code,
        } => {
            let mut payload = VerifyOtpPayload::new(phone, otp_code);
            if let Some(code) = country_code {
                payload = payload.with_country_code(code);
            }
            print_json(&session_summary(&auth.verify_otp(payload).await?))?;
        }
        Commands::Register {
            first_name,
            last_name,
            phone,
            otp_code,
            email,
            username,
            country_code,
        } => {
            let session = auth
                .register(RegisterPayload {
                    first_name,
                    last_name,
                    email,
                    phone,
                    country_code,
                    otp_code,
                    username,
                    platform: None,
                })
                .await?;
            print_json(&session_summary(&session))?;
        }
        Commands::Me => {
            print_json(&auth.me().await?)?;
        }
        Commands::Refresh => {
            print_json(&session_summary(&auth.refresh().await?))?;
        }
        Commands::Logout => {
            auth.logout().await;
            print_json(&json!({ "logged_out": true }))?;
        }
        Commands::Get { path } => {
            let envelope: ApiEnvelope<Value> = client.get(&path, RequestOptions::default()).await?;
            print_json(&envelope)?;
        }
        Commands::Status => {
            print_json(&json!({
                "state": auth.auth_state(),
                "authenticated": auth.is_authenticated(),
                "token_file": token_file.display().to_string(),
            }))?;
        }
    }

    Ok(())
}

fn build_config(
    cli: &Cli,
    storage: Arc<FileStorage>,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let base_url = cli
        .base_url
        .clone()
        .ok_or("--base-url or QUEEK_BASE_URL is required")?;

    let mut config = ClientConfig::new(base_url)
        .with_mode(cli.mode.into())
        .with_storage(storage);
    if let Some(key) = &cli.client_key {
        config = config.with_client_key(key);
    }
    if let Some(slug) = &cli.vendor_slug {
        config = config.with_vendor_slug(slug);
    }
    if let Some(platform) = &cli.platform {
        config = config.with_platform(platform);
    }
    Ok(config)
}

/// Session fields safe to print; tokens stay in the session file.
fn session_summary(session: &AuthSession) -> Value {
    json!({
        "user": session.user,
        "platform": session.platform,
        "expires_at": session.expires_at,
        "refresh_expires_at": session.refresh_expires_at,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
