/// Run-to-completion orchestration.
///
/// Each entry point performs one scheduled check: fetch, evaluate, decide,
/// render, deliver. Fetch failures become a single error notice; delivery
/// failures are logged and the run still completes. Nothing is retried and
/// nothing is carried over between runs.

use crate::alert::bulletin::{self, BulletinStatus, DayCheck};
use crate::alert::dispatch::{self, DispatchPlan, DispatchState, ReportMode};
use crate::alert::thresholds::{self, Comparison};
use crate::config::{MonitorConfig, WeatherLinkCredentials};
use crate::ingest::allerta;
use crate::ingest::fetch::DataFetcher;
use crate::ingest::retemir;
use crate::ingest::weatherlink;
use crate::logging::{self, DataSource};
use crate::model::{FetchError, NotifyError};
use crate::notify::Notifier;
use crate::report::{self, BasinLayout, ReportLayout};
use crate::stations::{ReportOrder, StationRegistry};
use chrono::Local;

/// Wall-clock inputs of a run, injected so rendering is reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Header timestamp, `dd/mm/YYYY HH:MM:SS`.
    pub display_time: String,
    /// Seconds since the epoch, used to sign API requests.
    pub unix_time: i64,
}

impl RunContext {
    pub fn now() -> Self {
        let now = Local::now();
        RunContext {
            display_time: now.format("%d/%m/%Y %H:%M:%S").to_string(),
            unix_time: now.timestamp(),
        }
    }

    pub fn fixed(display_time: &str, unix_time: i64) -> Self {
        RunContext {
            display_time: display_time.to_string(),
            unix_time,
        }
    }
}

/// What a run ended with.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub state: DispatchState,
    /// The text handed to the notifier, if any.
    pub message: Option<String>,
    pub delivery: Option<Result<(), NotifyError>>,
}

impl RunOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self.delivery, Some(Ok(())))
    }
}

pub const STATION_ALERT_TITLE: &str = "HYDRO-METEO ALERTS";
pub const STATION_REPORT_TITLE: &str = "HYDRO-METEO REPORT";
pub const WEATHERLINK_TITLE: &str = "WEATHERLINK ALERTS";

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

fn deliver(notifier: &dyn Notifier, text: &str, source: DataSource) -> Result<(), NotifyError> {
    let result = notifier.notify(text);
    match &result {
        Ok(()) => logging::info(DataSource::Telegram, None, &format!("{} message sent", source)),
        Err(e) => logging::error(
            DataSource::Telegram,
            None,
            &format!("could not deliver {} message: {}", source, e),
        ),
    }
    result
}

/// Applies the dispatch plan: renders and sends, or stays silent.
fn conclude(
    state: DispatchState,
    mode: ReportMode,
    render: impl FnOnce() -> String,
    notifier: &dyn Notifier,
    max_len: usize,
    source: DataSource,
) -> RunOutcome {
    let plan = dispatch::plan(state, mode);
    logging::info(source, None, &format!("dispatch state {}, plan {:?}", state, plan));
    if plan == DispatchPlan::StaySilent {
        return RunOutcome {
            state,
            message: None,
            delivery: None,
        };
    }
    let text = report::truncate_message(&render(), max_len);
    let delivery = deliver(notifier, &text, source);
    RunOutcome {
        state,
        message: Some(text),
        delivery: Some(delivery),
    }
}

/// Sends the error notice for a run whose data could not be fetched.
pub fn report_fetch_failure(
    source: DataSource,
    source_name: &str,
    error: &FetchError,
    notifier: &dyn Notifier,
    ctx: &RunContext,
    max_len: usize,
) -> RunOutcome {
    logging::log_fetch_failure(source, None, "data fetch", error);
    conclude(
        DispatchState::FetchFailed,
        ReportMode::ThresholdOnly,
        || report::render_fetch_error(source_name, error, &ctx.display_time),
        notifier,
        max_len,
        source,
    )
}

// ---------------------------------------------------------------------------
// Station network
// ---------------------------------------------------------------------------

/// Checks the regional station network against its thresholds.
pub fn run_station_check(
    config: &MonitorConfig,
    fetcher: &dyn DataFetcher,
    notifier: &dyn Notifier,
    mode: ReportMode,
    ctx: &RunContext,
) -> RunOutcome {
    let max_len = config.telegram.max_message_len;
    let registry = StationRegistry::from_config(&config.retemir);

    let readings = match retemir::fetch_readings(fetcher, &registry, config) {
        Ok(readings) => readings,
        Err(e) => return report_fetch_failure(DataSource::Retemir, "RETEMIR", &e, notifier, ctx, max_len),
    };

    let evaluation = thresholds::evaluate_all(
        &readings,
        &config.retemir.thresholds,
        Comparison::Above,
        DataSource::Retemir,
    );
    logging::log_run_summary(
        DataSource::Retemir,
        evaluation.readings,
        evaluation.current.len(),
        evaluation.alerts.len(),
    );

    let layout = ReportLayout {
        title: match mode {
            ReportMode::ThresholdOnly => STATION_ALERT_TITLE,
            ReportMode::FullReport => STATION_REPORT_TITLE,
        },
        order: registry.report_order(),
        basins: BasinLayout::Grouped,
        include_current: mode == ReportMode::FullReport,
        comparison: Comparison::Above,
    };
    conclude(
        DispatchState::from_evaluation(&evaluation),
        mode,
        || report::render_report(&evaluation, &layout, &ctx.display_time),
        notifier,
        max_len,
        DataSource::Retemir,
    )
}

// ---------------------------------------------------------------------------
// Alert bulletin
// ---------------------------------------------------------------------------

/// Checks the civil-protection bulletin for the configured days.
///
/// Always sends: an error report, the relevant alerts, or an all-clear.
pub fn run_bulletin_check(
    config: &MonitorConfig,
    fetcher: &dyn DataFetcher,
    notifier: &dyn Notifier,
    ctx: &RunContext,
) -> RunOutcome {
    let checks: Vec<DayCheck> = config
        .allerta
        .days
        .iter()
        .map(|&day| {
            let outcome = allerta::fetch_bulletin(fetcher, &config.allerta, day)
                .map(|areas| bulletin::relevant_events(&areas, &config.allerta));
            if let Err(e) = &outcome {
                logging::log_fetch_failure(DataSource::Allerta, None, &format!("{} bulletin", day.label()), e);
            }
            DayCheck { day, outcome }
        })
        .collect();

    let state = match bulletin::status(&checks) {
        BulletinStatus::Error => DispatchState::FetchFailed,
        BulletinStatus::Alerts => DispatchState::AlertsPresent,
        BulletinStatus::AllClear => DispatchState::NoAlerts,
    };
    conclude(
        state,
        ReportMode::FullReport,
        || bulletin::render_bulletin(&checks, &config.allerta.areas, &ctx.display_time),
        notifier,
        config.telegram.max_message_len,
        DataSource::Allerta,
    )
}

// ---------------------------------------------------------------------------
// WeatherLink
// ---------------------------------------------------------------------------

/// Checks the WeatherLink stations; silent unless a limit is reached.
pub fn run_weatherlink_check(
    config: &MonitorConfig,
    credentials: &WeatherLinkCredentials,
    fetcher: &dyn DataFetcher,
    notifier: &dyn Notifier,
    ctx: &RunContext,
) -> RunOutcome {
    let wl = &config.weatherlink;
    let max_len = config.telegram.max_message_len;

    let readings = match weatherlink::fetch_all_readings(fetcher, wl, credentials, ctx.unix_time) {
        Ok(readings) => readings,
        Err(e) => return report_fetch_failure(DataSource::WeatherLink, "WeatherLink", &e, notifier, ctx, max_len),
    };

    let evaluation = thresholds::evaluate_all(&readings, &wl.thresholds, Comparison::AtOrAbove, DataSource::WeatherLink);
    logging::log_run_summary(
        DataSource::WeatherLink,
        evaluation.readings,
        evaluation.current.len(),
        evaluation.alerts.len(),
    );

    let order = ReportOrder::single_group(&wl.group, wl.stations.iter().map(|s| s.name.clone()).collect());
    let layout = ReportLayout {
        title: WEATHERLINK_TITLE,
        order: &order,
        basins: BasinLayout::Flat,
        include_current: false,
        comparison: Comparison::AtOrAbove,
    };
    conclude(
        DispatchState::from_evaluation(&evaluation),
        ReportMode::ThresholdOnly,
        || report::render_report(&evaluation, &layout, &ctx.display_time),
        notifier,
        max_len,
        DataSource::WeatherLink,
    )
}
