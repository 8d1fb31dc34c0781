//! WeatherLink station check.
//!
//! Sends a message when a configured metric reaches its limit at any
//! station, or when no station could be read.

use basin_watch::config::{Runtime, WeatherLinkCredentials};
use basin_watch::ingest::fetch::HttpFetcher;
use basin_watch::logging::{self, DataSource};
use basin_watch::notify::TelegramNotifier;
use basin_watch::pipeline::{self, RunContext};
use std::process::ExitCode;

fn main() -> ExitCode {
    let _log_guard = logging::init_from_env();

    let loaded = Runtime::load().and_then(|runtime| Ok((runtime, WeatherLinkCredentials::from_env()?)));
    let (runtime, credentials) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            logging::error(DataSource::System, None, &format!("configuration error: {}", e));
            return ExitCode::FAILURE;
        }
    };
    let notifier = match TelegramNotifier::new(&runtime.config.telegram, &runtime.telegram) {
        Ok(notifier) => notifier,
        Err(e) => {
            logging::error(DataSource::Telegram, None, &format!("cannot set up notifier: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let ctx = RunContext::now();
    let config = &runtime.config;
    match HttpFetcher::new(&config.weatherlink.http_settings()) {
        Ok(fetcher) => {
            pipeline::run_weatherlink_check(config, &credentials, &fetcher, &notifier, &ctx);
        }
        Err(e) => {
            pipeline::report_fetch_failure(
                DataSource::WeatherLink,
                "WeatherLink",
                &e,
                &notifier,
                &ctx,
                config.telegram.max_message_len,
            );
        }
    }
    ExitCode::SUCCESS
}
