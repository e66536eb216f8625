use autosnap_common::SystemClock;
use autosnap_orchestrator::exit_policy::{finish_run, RunExit};
use autosnap_orchestrator::provider_manager::ProviderManager;
use autosnap_orchestrator::settings::{LogFormat, Settings};
use autosnap_orchestrator::snapshot_job::SnapshotJob;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    // stderr is what cron/systemd forward to the system log.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Full => builder.init(),
    }
}

fn config_error(e: &dyn std::fmt::Display) -> ExitCode {
    tracing::error!("{}", e);
    ExitCode::from(RunExit::ConfigError.code())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing(LogFormat::from_env());

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => return config_error(&e),
    };
    let provider = match ProviderManager::get_provider(&settings).await {
        Ok(p) => p,
        Err(e) => return config_error(&e),
    };
    let metadata = match ProviderManager::get_metadata(&settings) {
        Ok(m) => m,
        Err(e) => return config_error(&e),
    };

    let job = SnapshotJob::new(provider.as_ref(), metadata.as_ref(), &SystemClock, &settings.job);
    let result = job.run().await;
    ExitCode::from(finish_run(&result, settings.fail_on_error, job.logger()).code())
}
