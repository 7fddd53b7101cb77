use std::time::Duration;

use clap::Parser;

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "report-cacher",
    about = "Caches ShopKeep reports on disk and makes them available to other applications"
)]
pub struct Cli {
    /// How often reports are retrieved, e.g. 30m or 6h
    #[arg(long, default_value = "6h", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Address of the ShopKeep site reports are retrieved from
    #[arg(
        long,
        env = "REPORT_CACHER_SITE",
        default_value = "https://jonesboroughfarmersmkt.shopkeepapp.com"
    )]
    pub site: String,

    /// Email used to log in
    #[arg(short = 'e', long, env = "REPORT_CACHER_EMAIL")]
    pub email: String,

    /// Password used to log in.
    /// WARNING: passing via --password is visible in process listings.
    /// Prefer the REPORT_CACHER_PASSWORD environment variable instead.
    #[arg(short = 'p', long, env = "REPORT_CACHER_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Directory where reports are placed (created if missing)
    #[arg(short = 'd', long, default_value = "files")]
    pub directory: String,

    /// Port the report file server listens on
    #[arg(long, default_value_t = 8085)]
    pub port: u16,

    /// Disable the report file server
    #[arg(long)]
    pub no_web: bool,

    /// Stop after this long; 0s runs until interrupted
    #[arg(long, default_value = "3m", value_parser = humantime::parse_duration)]
    pub max_run_time: Duration,

    /// Time allowed for in-flight updates after a shutdown request
    #[arg(long, default_value = "8s", value_parser = humantime::parse_duration)]
    pub shutdown_grace: Duration,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}
