use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use time::Duration;

const DEFAULT_STORE_FILE: &str = "dishcast-store.json";

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve {
        addr: SocketAddr,
        config: dishcast::config::AppConfig,
    },
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Init(args)) => return RunOutcome::Exit(run_init(args)),
        Some(Command::AdminKey) => return RunOutcome::Exit(run_admin_key()),
        Some(Command::AdminToken(args)) => return RunOutcome::Exit(run_admin_token(args)),
        None => {}
    }

    match resolve_config(&cli.serve) {
        Ok(config) => RunOutcome::Serve {
            addr: cli.serve.listen,
            config,
        },
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "dishcast",
    version,
    about = "Web push broadcaster for a restaurant storefront"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "DISHCAST_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    #[arg(long, env = "DISHCAST_STORE_URL")]
    store_url: Option<String>,
    #[arg(long, env = "DISHCAST_STORE_KEY")]
    store_key: Option<String>,
    #[arg(long, env = "DISHCAST_STORE_TIMEOUT")]
    store_timeout: Option<String>,
    #[arg(long, env = "DISHCAST_STORE_FILE")]
    store_file: Option<PathBuf>,
    #[arg(long, env = "DISHCAST_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "DISHCAST_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "DISHCAST_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "DISHCAST_ADMIN_KEY")]
    admin_key: Option<String>,
    #[arg(long, env = "DISHCAST_DELIVERY_TIMEOUT")]
    delivery_timeout: Option<String>,
    #[arg(long, env = "DISHCAST_RECORD_HISTORY")]
    record_history: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a VAPID key pair.
    Init(InitArgs),
    /// Generate a key for signing admin tokens.
    AdminKey,
    /// Issue a bearer token for the broadcast endpoint.
    AdminToken(AdminTokenArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct AdminTokenArgs {
    #[arg(long, env = "DISHCAST_ADMIN_KEY")]
    key: String,
    #[arg(long, default_value = "admin")]
    subject: String,
    #[arg(long, default_value = "30d")]
    ttl: String,
}

fn run_init(args: InitArgs) -> i32 {
    let keys = match dishcast::generate_vapid_keys() {
        Ok(keys) => keys,
        Err(err) => {
            eprintln!("failed to generate VAPID keys: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID keys generated.");
    println!();
    println!("DISHCAST_VAPID_PRIVATE_KEY=\"{}\"", keys.private_key);
    println!("DISHCAST_VAPID_PUBLIC_KEY=\"{}\"", keys.public_key);
    println!("DISHCAST_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace DISHCAST_VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!("Share the public key with the storefront; keep the private key on the server.");
    0
}

fn run_admin_key() -> i32 {
    println!("{}", dishcast::auth::generate_admin_key());
    0
}

fn run_admin_token(args: AdminTokenArgs) -> i32 {
    let ttl = match parse_duration(&args.ttl, "admin token ttl") {
        Ok(ttl) => ttl,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };
    let token = dishcast::auth::AdminAuth::from_key(&args.key)
        .and_then(|auth| auth.issue_token(&args.subject, ttl));
    match token {
        Ok(token) => {
            println!("{token}");
            0
        }
        Err(err) => {
            eprintln!("failed to issue admin token: {err}");
            1
        }
    }
}

fn resolve_config(args: &ServeArgs) -> Result<dishcast::config::AppConfig, String> {
    let store = resolve_store_config(args)?;

    if let Some(key) = args.admin_key.as_deref()
        && key.trim().is_empty()
    {
        return Err("admin key cannot be empty".to_string());
    }

    let delivery_timeout = match args.delivery_timeout.as_deref() {
        Some(raw) => parse_timeout(raw, "delivery timeout")?,
        None => dishcast::config::DEFAULT_DELIVERY_TIMEOUT,
    };

    Ok(dishcast::config::AppConfig {
        store,
        vapid_private_key: args.vapid_private_key.clone(),
        vapid_public_key: args.vapid_public_key.clone(),
        vapid_subject: args.vapid_subject.clone(),
        admin_key: args.admin_key.clone(),
        delivery_timeout,
        record_history: args.record_history,
    })
}

fn resolve_store_config(args: &ServeArgs) -> Result<dishcast::config::StoreConfig, String> {
    let url = args.store_url.as_deref().map(str::trim);
    let key = args.store_key.as_deref().map(str::trim);

    match (url, key) {
        (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
            if args.store_file.is_some() {
                return Err("--store-file cannot be combined with --store-url".to_string());
            }
            let timeout = match args.store_timeout.as_deref() {
                Some(raw) => parse_timeout(raw, "store timeout")?,
                None => dishcast::config::DEFAULT_STORE_TIMEOUT,
            };
            Ok(dishcast::config::StoreConfig::Rest {
                url: url.to_string(),
                key: key.to_string(),
                timeout,
            })
        }
        (None, None) => Ok(dishcast::config::StoreConfig::File {
            path: args
                .store_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE)),
        }),
        _ => Err("the hosted store needs both --store-url and --store-key".to_string()),
    }
}

fn parse_duration(raw: &str, what: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid {what} '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err(format!("{what} must be greater than 0"));
    }

    let unit_seconds: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => {
            return Err(format!(
                "invalid {what} '{value}'; expected <number>[s|m|h|d]"
            ));
        }
    };

    amount
        .checked_mul(unit_seconds)
        .map(Duration::seconds)
        .ok_or_else(|| format!("{what} is out of range"))
}

fn parse_timeout(raw: &str, what: &str) -> Result<std::time::Duration, String> {
    parse_duration(raw, what)?
        .try_into()
        .map_err(|_| format!("{what} is out of range"))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use dishcast::config::StoreConfig;

    fn base_args() -> ServeArgs {
        ServeArgs {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            store_url: None,
            store_key: None,
            store_timeout: None,
            store_file: None,
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            admin_key: None,
            delivery_timeout: None,
            record_history: false,
        }
    }

    #[test]
    fn parse_duration__should_parse_seconds_when_unit_missing() {
        // When
        let duration = parse_duration("30", "timeout").expect("parse duration");

        // Then
        assert_eq!(duration, Duration::seconds(30));
    }

    #[test]
    fn parse_duration__should_parse_units() {
        // When
        let duration = parse_duration("15m", "timeout").expect("parse duration");

        // Then
        assert_eq!(duration, Duration::minutes(15));
    }

    #[test]
    fn parse_duration__should_reject_invalid_values() {
        // Then
        assert!(parse_duration("", "timeout").is_err());
        assert!(parse_duration("0", "timeout").is_err());
        assert!(parse_duration("abc", "timeout").is_err());
        assert!(parse_duration("5w", "timeout").is_err());
    }

    #[test]
    fn parse_duration__should_reject_overflowing_values() {
        // When
        let result = parse_duration("999999999999999999d", "delivery timeout");

        // Then
        assert_eq!(
            result,
            Err("delivery timeout is out of range".to_string())
        );
    }

    #[test]
    fn resolve_config__should_default_to_file_store_and_timeout() {
        // When
        let config = resolve_config(&base_args()).expect("resolve config");

        // Then
        assert!(matches!(
            config.store,
            StoreConfig::File { ref path } if path == &PathBuf::from(DEFAULT_STORE_FILE)
        ));
        assert_eq!(
            config.delivery_timeout,
            dishcast::config::DEFAULT_DELIVERY_TIMEOUT
        );
    }

    #[test]
    fn resolve_config__should_select_rest_store_when_url_and_key_set() {
        // Given
        let mut args = base_args();
        args.store_url = Some("https://backend.example".to_string());
        args.store_key = Some("service-key".to_string());
        args.delivery_timeout = Some("3s".to_string());

        // When
        let config = resolve_config(&args).expect("resolve config");

        // Then
        assert!(matches!(
            config.store,
            StoreConfig::Rest { timeout, .. } if timeout == dishcast::config::DEFAULT_STORE_TIMEOUT
        ));
        assert_eq!(config.delivery_timeout, std::time::Duration::from_secs(3));
    }

    #[test]
    fn resolve_config__should_apply_store_timeout_to_rest_store() {
        // Given
        let mut args = base_args();
        args.store_url = Some("https://backend.example".to_string());
        args.store_key = Some("service-key".to_string());
        args.store_timeout = Some("2s".to_string());

        // When
        let config = resolve_config(&args).expect("resolve config");

        // Then
        assert!(matches!(
            config.store,
            StoreConfig::Rest { timeout, .. } if timeout == std::time::Duration::from_secs(2)
        ));
    }

    #[test]
    fn resolve_config__should_require_store_key_with_url() {
        // Given
        let mut args = base_args();
        args.store_url = Some("https://backend.example".to_string());

        // Then
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn resolve_config__should_reject_empty_admin_key() {
        // Given
        let mut args = base_args();
        args.admin_key = Some("  ".to_string());

        // Then
        assert!(resolve_config(&args).is_err());
    }
}
