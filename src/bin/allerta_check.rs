//! Civil-protection alert bulletin check.
//!
//! Looks at the configured days and areas and always reports: the relevant
//! alerts, an all-clear, or the days whose bulletin could not be read.

use basin_watch::config::Runtime;
use basin_watch::ingest::fetch::HttpFetcher;
use basin_watch::logging::{self, DataSource};
use basin_watch::notify::TelegramNotifier;
use basin_watch::pipeline::{self, RunContext};
use std::process::ExitCode;

fn main() -> ExitCode {
    let _log_guard = logging::init_from_env();

    let runtime = match Runtime::load() {
        Ok(runtime) => runtime,
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
    match HttpFetcher::new(&config.allerta.http_settings()) {
        Ok(fetcher) => {
            pipeline::run_bulletin_check(config, &fetcher, &notifier, &ctx);
        }
        Err(e) => {
            pipeline::report_fetch_failure(
                DataSource::Allerta,
                "the alert bulletin",
                &e,
                &notifier,
                &ctx,
                config.telegram.max_message_len,
            );
        }
    }
    ExitCode::SUCCESS
}
