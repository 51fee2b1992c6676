// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator CLI for the interview console backend.

use std::process;

use clap::{Args, Parser, Subcommand};
use interview_console_client::{
    auth::OtpLogin,
    config::{ClientConfig, LOG_FORMAT_ENV},
    gateway::{GatewayClient, Method},
    logging::{self, LogFormat},
    models::EncryptedEnvelope,
    Error, Result,
};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "console-auth", about = "Interview console backend client", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in with a mobile number and OTP and persist the session
    Login(LoginArgs),
    /// Drop the persisted session
    Logout,
    /// Show the user of the persisted session
    Whoami,
    /// Make an authenticated gateway call and print the result
    Call(CallArgs),
    /// Seal a JSON document into an envelope
    Encrypt(EncryptArgs),
    /// Open an envelope
    Decrypt(DecryptArgs),
}

#[derive(Debug, Args)]
struct LoginArgs {
    /// Registered mobile number
    #[arg(long)]
    mobile: String,

    /// Backend user type id
    #[arg(long)]
    user_type: i64,

    /// OTP code; read from stdin when omitted
    #[arg(long)]
    otp: Option<String>,
}

#[derive(Debug, Args)]
struct CallArgs {
    /// HTTP method (GET, POST, PUT, DELETE, ...)
    method: String,

    /// Endpoint path relative to the base URL
    endpoint: String,

    /// JSON request body, sent encrypted
    #[arg(long)]
    body: Option<String>,
}

#[derive(Debug, Args)]
struct EncryptArgs {
    /// JSON document
    json: String,
}

#[derive(Debug, Args)]
struct DecryptArgs {
    /// Base64 `enc_data` value
    enc_data: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(error) = logging::init(cli.log_format) {
        eprintln!("{error}");
        process::exit(1);
    }

    if let Err(error) = run(cli.command).await {
        eprintln!("error[{}]: {error}", error.error_code());
        process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    let config = ClientConfig::from_env()?;
    debug!(config = ?config, "Configuration loaded");

    match command {
        Commands::Login(args) => login(&config, args).await,
        Commands::Logout => logout(&config),
        Commands::Whoami => whoami(&config),
        Commands::Call(args) => call(&config, args).await,
        Commands::Encrypt(args) => encrypt(&config, args),
        Commands::Decrypt(args) => decrypt(&config, args),
    }
}

fn connect(config: &ClientConfig) -> Result<GatewayClient> {
    let store = config.token_store();
    store.init()?;
    Ok(GatewayClient::from_config(config, store)?)
}

async fn login(config: &ClientConfig, args: LoginArgs) -> Result<()> {
    let gateway = connect(config)?;
    let mut login = OtpLogin::new(gateway, config.endpoints.clone());

    let sent = login.request_otp(&args.mobile).await?;
    eprintln!("{}", non_empty(&sent.message).unwrap_or("OTP sent"));

    let otp = match args.otp {
        Some(otp) => otp,
        None => prompt("Enter OTP: ").await?,
    };
    if otp.is_empty() {
        return Err(Error::Input("OTP cannot be empty".to_string()));
    }

    let result = login.submit_otp(&args.mobile, &otp, args.user_type).await?;
    print_json(&result.data)
}

fn logout(config: &ClientConfig) -> Result<()> {
    let gateway = connect(config)?;
    let mut login = OtpLogin::new(gateway, config.endpoints.clone());
    login.logout()?;
    eprintln!("logged out");
    Ok(())
}

fn whoami(config: &ClientConfig) -> Result<()> {
    match config.token_store().init()? {
        Some(session) => print_json(&session.user),
        None => {
            println!("not logged in");
            Ok(())
        }
    }
}

async fn call(config: &ClientConfig, args: CallArgs) -> Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::Input(format!("invalid method '{}': {e}", args.method)))?;
    let body = args.body.as_deref().map(parse_json).transpose()?;

    let gateway = connect(config)?;
    let result = gateway.call(&args.endpoint, method, body.as_ref()).await?;
    print_json(&result)
}

fn encrypt(config: &ClientConfig, args: EncryptArgs) -> Result<()> {
    let value = parse_json(&args.json)?;
    let envelope = config.codec()?.encrypt(&value)?;
    print_json(&envelope)
}

fn decrypt(config: &ClientConfig, args: DecryptArgs) -> Result<()> {
    let envelope = EncryptedEnvelope::from(args.enc_data);
    let plaintext = config.codec()?.decrypt(&envelope)?;
    print_json(&plaintext.into_value())
}

async fn prompt(label: &str) -> Result<String> {
    eprint!("{label}");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| Error::Input(format!("failed to read OTP: {e}")))?;

    Ok(line.trim().to_string())
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| Error::Input(format!("invalid JSON: {e}")))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Input(format!("failed to render output: {e}")))?;
    println!("{rendered}");
    Ok(())
}

fn non_empty(s: &str) -> Option<&str> {
    Some(s.trim()).filter(|s| !s.is_empty())
}
