use clap::Parser;
use diamond_data::config::Command;
use diamond_data::core::cluster::generate_clusters;
use diamond_data::core::import::import_postcodes_file;
use diamond_data::core::Stage;
use diamond_data::utils::error::{DataError, ErrorSeverity};
use diamond_data::utils::monitor::SystemMonitor;
use diamond_data::utils::{logger, validation::Validate};
use diamond_data::{server, CliConfig, Services};

async fn run_stage(stage: impl Stage, monitor: bool) -> diamond_data::Result<()> {
    let monitor = SystemMonitor::new(monitor);
    let report = stage.run().await?;
    tracing::info!(
        "✅ {} completed: {} processed, {} succeeded, {} failed",
        stage.name(),
        report.processed,
        report.succeeded,
        report.failed
    );
    monitor.log_final_stats();
    Ok(())
}

async fn run(cli: &CliConfig) -> diamond_data::Result<()> {
    let settings = cli.settings()?;
    settings.validate()?;
    if cli.verbose {
        tracing::debug!("Settings: {:?}", settings);
    }
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 只有批次指令需要開啟資料庫
    match &cli.command {
        Command::Serve { .. } => server::serve(&settings).await,
        Command::ImportPostcodes { file } => {
            let services = Services::open(settings).await?;
            import_postcodes_file(services.store.as_ref(), file).await?;
            Ok(())
        }
        Command::Cluster { .. } => {
            let services = Services::open(settings).await?;
            generate_clusters(services.store.as_ref(), services.settings.cluster.radius_km).await?;
            Ok(())
        }
        Command::Scrape => {
            let services = Services::open(settings).await?;
            run_stage(services.scrape_stage()?, cli.monitor).await
        }
        Command::Enrich => {
            let services = Services::open(settings).await?;
            run_stage(services.enrich_stage()?, cli.monitor).await
        }
        Command::Screenshot => {
            let services = Services::open(settings).await?;
            run_stage(services.screenshot_stage()?, cli.monitor).await
        }
        Command::Publish => {
            let services = Services::open(settings).await?;
            run_stage(services.publish_stage()?, cli.monitor).await
        }
        Command::Pipeline => {
            let services = Services::open(settings).await?;
            services.pipeline(cli.monitor)?.run().await?;
            Ok(())
        }
        Command::Directory { .. } => {
            let services = Services::open(settings).await?;
            services.directory_builder()?.run().await?;
            Ok(())
        }
    }
}

fn exit_code(error: &DataError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 外部服務或網路，可重試
        ErrorSeverity::High => 1,     // 設定或資料錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    logger::init_logger(cli.verbose);
    tracing::info!("Starting diamond-data CLI");

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let code = exit_code(&e);
        if code > 0 {
            std::process::exit(code);
        }
    }

    Ok(())
}
