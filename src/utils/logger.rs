use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_cli_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("diamond_data=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("diamond_data=info,tower_http=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

pub fn init_json_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("diamond_data=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(), // 容器環境用 JSON 方便收集
        )
        .init();
}

/// 依 `LOG_FORMAT` 選擇輸出格式
pub fn init_logger(verbose: bool) {
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => init_json_logger(),
        _ => init_cli_logger(verbose),
    }
}

/// 進度紀錄，每 10 筆或最後一筆輸出一次
pub fn log_progress(current: usize, total: usize, message: &str) {
    if total == 0 {
        return;
    }
    if current == 1 || current == total || current % 10 == 0 {
        let percent = (current as f64 / total as f64) * 100.0;
        tracing::info!("⏳ {}: {}/{} ({:.1}%)", message, current, total, percent);
    }
}
