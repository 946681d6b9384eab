use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use std::path::PathBuf;

pub fn postgres_url_from_environment() -> String {
    #[derive(Debug, PartialEq, Deserialize)]
    struct PostgresConfig {
        user: String,
        password: Option<String>,
        password_file: Option<PathBuf>,
        host: Option<String>,
        db: String,
    }
    let provider = figment::providers::Env::prefixed("POSTGRES_");
    let postgres_config: PostgresConfig = figment::Figment::from(provider)
        .extract()
        .expect("Postgres configuration environment variable(s) missing or invalid");

    let password = if let Some(password) = postgres_config.password {
        password
    } else if let Some(password_file) = postgres_config.password_file {
        std::fs::read_to_string(password_file).expect("Failed to read postgres password file")
    } else {
        panic!("One of POSTGRES_PASSWORD or POSTGRES_PASSWORD_FILE must be provided");
    };

    // Postgres truncates the password at the first newline. A trailing
    // newline is such a strong file convention that we trim it silently, but
    // any other newline means the user's intended password cannot be used,
    // so refuse to continue.
    let password = if let Some(pw) = password.strip_suffix("\n") {
        pw
    } else {
        &password
    };

    if password.contains("\n") {
        eprintln!(
            "Postgres password contains a non-terminal newline. This password would be \
            insecurely truncated. Please try again with a password that does not contain non-\
            terminal newlines."
        );
        panic!(
            "Postgres password contains a non-terminal newline. This password would be \
            insecurely truncated. Please try again with a password that does not contain non-\
            terminal newlines."
        );
    }

    // Must percent encode password.
    let password = utf8_percent_encode(password, NON_ALPHANUMERIC);

    let host = postgres_config.host.as_deref().unwrap_or("db");

    format!(
        "postgres://{}:{}@{}/{}",
        postgres_config.user, password, host, postgres_config.db
    )
}
