use chrono::{SecondsFormat, Utc};
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::io;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(author, about, version)]
pub struct Args {
    #[arg(short = 'c', long, default_value = "quiz_server.toml")]
    config: String,
    #[arg(short = 'a', long)]
    listen_addr: Option<SocketAddr>,
    #[arg(short = 'l', long)]
    log_level: Option<log::LevelFilter>,
}

#[derive(Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_seed_file")]
    pub seed_file: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Code a registering client must supply to be granted the admin role.
    /// Defaults to the historical constant, but an `ADMIN_SECRET` environment
    /// variable always wins (see DESIGN.md, Open Question 2).
    #[serde(skip, default = "default_admin_secret")]
    pub admin_secret: String,
}

impl Config {
    pub fn apply_args(&mut self, args: Args) {
        if let Some(listen_addr) = args.listen_addr {
            self.listen_addr = listen_addr;
        }
        if let Some(log_level) = args.log_level {
            self.logging.level = log_level;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str("").unwrap()
    }
}

#[derive(Deserialize)]
pub struct LoggingConfig {
    pub level: log::LevelFilter,
    pub color: bool,
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: log::LevelFilter::Info,
            color: true,
            file: default_log_file(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:9000".parse().unwrap()
}

fn default_db_path() -> String {
    "quiz.db".to_string()
}

fn default_seed_file() -> Option<String> {
    None
}

fn default_log_file() -> String {
    "quiz_server.log".to_string()
}

fn default_admin_secret() -> String {
    std::env::var("ADMIN_SECRET").unwrap_or_else(|_| "network_programming".to_string())
}

impl LoggingConfig {
    pub fn to_dispatch(&self) -> fern::Dispatch {
        let colors = ColoredLevelConfig::new()
            .error(Color::Red)
            .warn(Color::Yellow);
        let color_enabled = self.color;
        let dispatch = fern::Dispatch::new()
            .level(self.level)
            .format(move |out, message, record| {
                let level = if color_enabled {
                    colors.color(record.level()).to_string()
                } else {
                    record.level().to_string()
                };
                out.finish(format_args!(
                    "{} [{}] [{}] {}",
                    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    level,
                    record.target(),
                    message
                ))
            })
            .chain(std::io::stdout());

        match fern::log_file(&self.file) {
            Ok(file) => dispatch.chain(file),
            Err(err) => {
                // println because the dispatch that would log this isn't built yet.
                println!("couldn't open log file {}: {}, logging to stdout only", self.file, err);
                dispatch
            }
        }
    }
}

pub fn get_config() -> Result<Config, Box<dyn Error>> {
    let args = Args::parse();
    let toml_str = fs::read(&args.config).or_else(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            // println because logging isn't initialized yet
            println!(
                "No config file found in {}, using defaults instead.",
                args.config
            );
            Ok(Vec::new())
        } else {
            Err(err)
        }
    })?;
    let mut config: Config = toml::from_slice(&toml_str).map_err(|err| {
        println!("Error while reading {}: {}", args.config, err);
        err
    })?;
    config.apply_args(args);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_historical_constants() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.db_path, "quiz.db");
        assert!(config.seed_file.is_none());
        assert_eq!(config.logging.level, log::LevelFilter::Info);
        assert!(config.logging.color);
    }

    #[test]
    fn admin_secret_falls_back_when_env_var_unset() {
        std::env::remove_var("ADMIN_SECRET");
        assert_eq!(default_admin_secret(), "network_programming");
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml_str = r#"
            listen_addr = "127.0.0.1:1234"
            db_path = "custom.db"

            [logging]
            level = "debug"
            color = false
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:1234".parse().unwrap());
        assert_eq!(config.db_path, "custom.db");
        assert_eq!(config.logging.level, log::LevelFilter::Debug);
        assert!(!config.logging.color);
    }

    #[test]
    fn apply_args_overrides_listen_addr_and_log_level() {
        let mut config = Config::default();
        let args = Args {
            config: "ignored.toml".to_string(),
            listen_addr: Some("127.0.0.1:4000".parse().unwrap()),
            log_level: Some(log::LevelFilter::Warn),
        };
        config.apply_args(args);
        assert_eq!(config.listen_addr, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.logging.level, log::LevelFilter::Warn);
    }
}
