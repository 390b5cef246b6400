use clap::Parser;
use logo_animator::cli::{self, Args};
use logo_animator::credential::{API_KEY_ENV, API_KEY_ENV_FALLBACK};

/// Warn when neither key variable is set after loading .env
fn check_api_key_env() {
    if std::env::var(API_KEY_ENV).is_err() && std::env::var(API_KEY_ENV_FALLBACK).is_err() {
        log::warn!(
            "{} is not set; you will be asked for a key before generating",
            API_KEY_ENV
        );
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() {
    // Load .env before anything else; existing variables win.
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();

    let args = Args::parse();
    init_logging(args.verbose);
    check_api_key_env();

    if let Err(e) = cli::run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_env_var_accessible_after_dotenv() {
        let _ = dotenv::dotenv();
        std::env::set_var("LOGO_ANIMATOR_TEST_EXISTING", "original_value");
        let _ = dotenv::dotenv();
        assert_eq!(
            std::env::var("LOGO_ANIMATOR_TEST_EXISTING").unwrap(),
            "original_value",
            "Existing env vars should not be overridden by dotenv"
        );
        std::env::remove_var("LOGO_ANIMATOR_TEST_EXISTING");
    }
}
