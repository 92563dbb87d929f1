// UI layer: turns parsed commands into calls on the core (`config`, `api`)
// and renders the typed results. All terminal output lives here; the core
// modules only return data.

use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::api::{ApiClient, ExecutionResult, Profile};
use crate::cli::{Cli, Command, ConfigCommand};
use crate::config::{Config, ConfigStore};
use crate::language;

const UPGRADE_URL: &str = "mockfactory.io/pricing";

/// Dispatch one parsed command line.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let store = match cli.config_dir {
        Some(dir) => ConfigStore::at(dir),
        None => ConfigStore::open_default()?,
    };

    match cli.command {
        Command::Login { email, password } => login(&store, email, password)?,
        Command::Signup { email, password } => signup(&store, email, password)?,
        Command::Logout => {
            store.delete_token().context("Failed to remove token")?;
            success("Successfully logged out!");
        }
        Command::Status => status(&store)?,
        Command::Run {
            language,
            code,
            file,
            timeout,
            raw,
        } => {
            let code = match (code, file) {
                (Some(code), None) => code,
                (None, Some(path)) => read_source(&path)?,
                (Some(_), Some(_)) => bail!("Cannot specify both --code and --file"),
                (None, None) => bail!("Must specify either --code or --file"),
            };
            return execute(&store, &code, &language, &language, timeout, raw);
        }
        Command::Execute { file, timeout, raw } => {
            let Some(language) = language::detect(&file) else {
                let ext = file
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_else(|| "(none)".into());
                bail!("Unsupported file extension: {ext}");
            };
            let code = read_source(&file)?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            return execute(&store, &code, language, &name, timeout, raw);
        }
        Command::Usage => usage(&store)?,
        Command::Config(cmd) => config(&store, cmd)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn login(store: &ConfigStore, email: Option<String>, password: Option<String>) -> Result<()> {
    let config = store.load();
    let client = ApiClient::from_store(&config, store)?;
    let email = prompt_email(email)?;
    let password = prompt_password(password, false)?;

    let token = with_spinner("Signing in...", || client.signin(&email, &password))?;
    store.save_token(&token).context("Failed to save token")?;
    success("Successfully logged in!");

    let client = ApiClient::new(&config, Some(&token))?;
    let name = match client.get_profile() {
        Ok(profile) => profile_str(&profile, "email").unwrap_or("user").to_string(),
        Err(e) => {
            debug!(error = %e, "could not fetch profile after login");
            "user".to_string()
        }
    };
    info(&format!("Welcome back, {name}!"));
    Ok(())
}

fn signup(store: &ConfigStore, email: Option<String>, password: Option<String>) -> Result<()> {
    let config = store.load();
    let client = ApiClient::from_store(&config, store)?;
    let email = prompt_email(email)?;
    let password = prompt_password(password, true)?;

    let token = with_spinner("Creating account...", || client.signup(&email, &password))?;
    store.save_token(&token).context("Failed to save token")?;
    success("Account created successfully!");
    info("You now have 10 free code executions per day.");
    Ok(())
}

fn status(store: &ConfigStore) -> Result<()> {
    let config = store.load();
    let client = ApiClient::from_store(&config, store)?;
    let mut rows = vec![("API URL", config.api_url().to_string())];

    if client.is_authenticated() {
        match client.get_profile() {
            Ok(profile) => {
                rows.push(("Status", "Authenticated".green().to_string()));
                rows.push(("Email", profile_str(&profile, "email").unwrap_or("N/A").to_string()));
                let plan = profile_str(&profile, "subscription_tier").unwrap_or("free");
                rows.push(("Plan", title_case(plan)));
            }
            Err(e) if matches!(e.status(), Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)) => {
                rows.push(("Status", "Token expired".yellow().to_string()));
            }
            Err(e) => {
                rows.push(("Status", format!("{} ({})", "Unknown".yellow(), e)));
            }
        }
    } else {
        rows.push(("Status", "Not authenticated".red().to_string()));
    }

    match client.get_usage() {
        Ok(usage) => {
            rows.push(("Usage", format!("{}/{} runs", usage.runs_used, usage.runs_limit)));
            rows.push(("Tier", title_case(&usage.tier)));
        }
        Err(e) => debug!(error = %e, "usage unavailable"),
    }

    print_table("MockFactory Status", &rows);
    Ok(())
}

fn execute(
    store: &ConfigStore,
    code: &str,
    language: &str,
    label: &str,
    timeout: Option<u64>,
    raw: bool,
) -> Result<ExitCode> {
    let config = store.load();
    let client = ApiClient::from_store(&config, store)?;
    let result = with_spinner(format!("Executing {label}..."), || {
        client.execute_code(code, language, timeout)
    })?;

    if raw {
        print_raw(&result);
    } else {
        print_execution(&result, label);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn usage(store: &ConfigStore) -> Result<()> {
    let config = store.load();
    let client = ApiClient::from_store(&config, store)?;
    let usage = with_spinner("Fetching usage...", || client.get_usage())?;

    let remaining = usage.remaining();
    let remaining = if remaining > 0 {
        remaining.to_string().green().to_string()
    } else {
        remaining.to_string().red().to_string()
    };
    print_table(
        "Usage Statistics",
        &[
            ("Tier", title_case(&usage.tier)),
            ("Runs Used", usage.runs_used.to_string()),
            ("Runs Limit", usage.runs_limit.to_string()),
            ("Remaining", remaining),
        ],
    );

    if matches!(usage.tier.as_str(), "anonymous" | "free") {
        info(&format!("Upgrade to Pro for unlimited executions: {UPGRADE_URL}"));
    }
    Ok(())
}

fn config(store: &ConfigStore, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let cfg = store.load();
            let mut rows = vec![
                ("API URL", cfg.api_url().to_string()),
                ("Timeout", format!("{}s", cfg.timeout())),
            ];
            if let Some(session_id) = cfg.session_id() {
                rows.push(("Session ID", session_id.to_string()));
            }
            rows.push(("Config file", store.config_path().display().to_string()));
            print_table("Configuration", &rows);
        }
        ConfigCommand::Set { key, value } => {
            let mut cfg = store.load();
            cfg.apply(key, &value)?;
            store.save(&cfg).context("Failed to save configuration")?;
            success(&format!("Set {key} = {value}"));
        }
        ConfigCommand::Reset => {
            store
                .save(&Config::default())
                .context("Failed to save configuration")?;
            success("Configuration reset to defaults");
        }
    }
    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn prompt_email(email: Option<String>) -> Result<String> {
    match email {
        Some(email) => Ok(email),
        None => Ok(Input::<String>::new().with_prompt("Email").interact_text()?),
    }
}

fn prompt_password(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let mut prompt = Password::new();
    prompt.with_prompt("Password");
    if confirm {
        prompt.with_confirmation("Repeat password", "Passwords do not match");
    }
    Ok(prompt.interact()?)
}

/// Show a spinner on stderr while `f` runs.
fn with_spinner<T>(message: impl Into<Cow<'static, str>>, f: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let out = f();
    spinner.finish_and_clear();
    out
}

fn print_raw(result: &ExecutionResult) {
    print!("{}", result.output);
    if let Some(err) = &result.error {
        eprint!("{err}");
    }
}

fn print_execution(result: &ExecutionResult, label: &str) {
    if result.success {
        print_panel(&format!("Output ({label})").green().to_string(), &result.output);
        if let Some(diagnostics) = result.error.as_deref().filter(|d| !d.is_empty()) {
            print_panel(&"Diagnostics".yellow().to_string(), diagnostics);
        }
        if let Some(secs) = result.execution_time {
            info(&format!("Completed in {secs:.2}s"));
        }
    } else {
        if !result.output.is_empty() {
            print_panel(&format!("Output ({label})"), &result.output);
        }
        let err = result.error.as_deref().unwrap_or("Unknown error");
        print_panel(&format!("Error ({label})").red().to_string(), err);
    }
}

fn print_panel(title: &str, body: &str) {
    println!("── {title} ──");
    println!("{}", body.trim_end_matches('\n'));
    println!("────");
}

fn print_table(title: &str, rows: &[(&str, String)]) {
    println!("{}", title.bold().blue());
    for (label, value) in rows {
        println!("  {} {}", format!("{label:<12}").cyan(), value);
    }
}

fn profile_str<'a>(profile: &'a Profile, key: &str) -> Option<&'a str> {
    profile.get(key).and_then(Value::as_str)
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}
