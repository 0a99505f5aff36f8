//! Taleem Edge CLI - a command line client for the Taleem Edge backend.
//!
//! Signs in, keeps the session in the configured credential store and sends
//! authenticated requests, refreshing the access token when it expires.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use taleem_core::api::{FormPart, SessionListener};
use taleem_core::auth::{AuthService, FileStore, KeyringStore, SessionStore, SignupForm};
use taleem_core::config::CredentialBackend;
use taleem_core::models::Role;
use taleem_core::reqwest::Method;
use taleem_core::{ApiClient, ApiConfig, ApiResponse, Config};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: taleem <command> [args]

Commands:
  login [email]                       Sign in and store the session
  signup                              Create a student account
  logout                              Remove the stored session
  whoami                              Show the signed-in user
  status                              Show backend and session state
  get <path>                          GET a resource
  delete <path>                       DELETE a resource
  post|put|patch <path> <json>        Send a JSON body
  upload <path> <field> <file> [k=v]  POST a multipart form with one file
  download <path> <out-file>          Save a binary resource

Environment:
  TALEEM_MODE=development selects TALEEM_API_BASE_URL_LOCAL,
  otherwise TALEEM_API_BASE_URL_DEPLOY is used.";

/// Prints the logout notice instead of navigating
struct CliListener;

impl SessionListener for CliListener {
    fn session_expired(&self, _login_path: &str) {
        eprintln!("Session expired. Please log in again with `taleem login`.");
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    // Fail on a missing base URL before anything touches the network
    let api_config = ApiConfig::from_env().context("Backend is not configured")?;
    let mut config = Config::load().context("Failed to load config")?;
    let store = open_store(&config)?;
    let api = ApiClient::new(api_config, store)?.with_listener(Arc::new(CliListener));
    info!(base_url = %api.config().base_url(), "Taleem CLI starting");

    let rest = &args[1..];
    match command {
        "login" => login(&api, &mut config, rest.first().cloned()).await,
        "signup" => signup(&api, &mut config).await,
        "logout" => {
            AuthService::new(api).logout()?;
            println!("Logged out.");
            Ok(())
        }
        "whoami" => whoami(&api),
        "status" => {
            println!("Backend: {}", api.config().base_url());
            println!("Session: {:?}", api.session_state()?);
            Ok(())
        }
        "get" => print_response(api.get(arg(rest, 0, "path")?).await?),
        "delete" => print_response(api.delete(arg(rest, 0, "path")?).await?),
        "post" | "put" | "patch" => {
            let path = arg(rest, 0, "path")?;
            let body: serde_json::Value =
                serde_json::from_str(arg(rest, 1, "json")?).context("Body is not valid JSON")?;
            let response = match command {
                "post" => api.post(path, &body).await?,
                "put" => api.put(path, &body).await?,
                _ => api.patch(path, &body).await?,
            };
            print_response(response)
        }
        "upload" => upload(&api, rest).await,
        "download" => {
            let path = arg(rest, 0, "path")?;
            let out = arg(rest, 1, "out-file")?;
            let bytes = api.download(path).await?;
            std::fs::write(out, &bytes).with_context(|| format!("Failed to write {}", out))?;
            println!("Saved {} bytes to {}", bytes.len(), out);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    Ok(match config.credential_backend {
        CredentialBackend::File => {
            let dir = Config::data_dir().context("Failed to locate data directory")?;
            debug!(dir = %dir.display(), "Using file session store");
            Arc::new(FileStore::new(dir))
        }
        CredentialBackend::Keyring => Arc::new(KeyringStore::new()),
    })
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .with_context(|| format!("Missing <{}> argument\n\n{}", name, USAGE))
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn login(api: &ApiClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;

    let auth = AuthService::new(api.clone());
    let outcome = auth
        .login(&email, &password)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    config.last_email = Some(email);
    config.save().context("Failed to save config")?;

    println!(
        "{}",
        outcome.message.as_deref().unwrap_or("Login successful!")
    );
    println!(
        "Signed in as {} ({}), dashboard: {}",
        outcome.user.name,
        outcome.user.role.display_name(),
        outcome.landing_path()
    );
    Ok(())
}

async fn signup(api: &ApiClient, config: &mut Config) -> Result<()> {
    let form = SignupForm {
        full_name: prompt("Full name")?,
        email: prompt("Email")?,
        school_name: prompt("School name")?,
        password: rpassword::prompt_password("Password: ")?,
        confirm_password: rpassword::prompt_password("Confirm password: ")?,
        role: Role::Student,
    };

    let auth = AuthService::new(api.clone());
    let outcome = auth
        .signup(&form)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    config.last_email = Some(form.email.clone());
    config.save().context("Failed to save config")?;

    println!("Welcome, {}! Dashboard: {}", outcome.user.name, outcome.landing_path());
    Ok(())
}

fn whoami(api: &ApiClient) -> Result<()> {
    match AuthService::new(api.clone()).current_user()? {
        Some(user) => println!(
            "{} <{}> - {}",
            user.name,
            user.email,
            user.role.display_name()
        ),
        None => println!("Not logged in."),
    }
    Ok(())
}

async fn upload(api: &ApiClient, args: &[String]) -> Result<()> {
    let path = arg(args, 0, "path")?;
    let field = arg(args, 1, "field")?;
    let file = arg(args, 2, "file")?;

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file))?;
    let file_name = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file)
        .to_string();

    let mut parts = vec![FormPart::file(field, file_name, bytes)];
    for pair in &args[3..] {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected key=value, got '{}'", pair))?;
        parts.push(FormPart::text(key, value));
    }

    print_response(api.upload(Method::POST, path, parts).await?)
}

fn print_response(response: ApiResponse) -> Result<()> {
    if response.body.is_empty() {
        println!("{}", response.status);
        return Ok(());
    }
    match response.json::<serde_json::Value>() {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}
