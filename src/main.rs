use std::path::PathBuf;
use std::sync::Arc;

use ccbridge::proxy::ProxyService;
use ccbridge::store::{ConfigStore, VendorConfig};
use ccbridge::vendor::{detect_api_format, infer_provider_from_url, ApiFormat, VendorKind};
use ccbridge::{logger, store};

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ccbridge")
}

fn print_usage() {
    eprintln!("usage: ccbridge [--db <path>] [--import <config.json>]");
}

struct Args {
    db_path: PathBuf,
    import: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut db_path = data_dir().join("ccbridge.db");
    let mut import = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                db_path = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or("--db requires a path")?;
            }
            "--import" => {
                import = Some(
                    args.next()
                        .map(PathBuf::from)
                        .ok_or("--import requires a file")?,
                );
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(Args { db_path, import })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            std::process::exit(2);
        }
    };

    logger::setup_logger(Some(&data_dir().join("ccbridge.log")))?;

    let store: Arc<ConfigStore> = Arc::new(store::ConfigStore::new(&args.db_path)?);

    if let Some(path) = &args.import {
        let raw = std::fs::read_to_string(path)?;
        let mut config: VendorConfig = serde_json::from_str(&raw)?;

        // Pasted base URLs often include the full endpoint path; strip a
        // recognized suffix and infer the vendor when none was given.
        let pasted_url = config.base_url.clone();
        let detection = detect_api_format(&pasted_url);
        if detection.format != ApiFormat::Unknown {
            log::info!(
                "detected '{}' suffix on base URL, using {}",
                detection.detected_path,
                detection.clean_base_url
            );
            config.base_url = detection.clean_base_url.clone();
        }
        if config.api_type == VendorKind::Custom {
            if let Some(kind) = infer_provider_from_url(&pasted_url) {
                log::info!("inferred vendor '{}' from base URL", kind);
                config.api_type = kind;
            }
        }

        store.save_api_config(&config)?;
        log::info!("imported API configuration '{}' from {}", config.name, path.display());
    }

    if store.load_api_config()?.is_none() {
        log::error!("no API configuration found; import one with: ccbridge --import <config.json>");
        std::process::exit(2);
    }

    let service = ProxyService::new(store);

    match service.needs_proxy().await {
        Ok(true) => log::info!("backend lacks native count_tokens, local shim active"),
        Ok(false) => log::info!("backend supports count_tokens natively"),
        Err(e) => log::warn!("needs-proxy probe failed: {}", e),
    }

    let status = service.start().await?;
    log::info!(
        "ccbridge ready at {} -> {}",
        status.url.unwrap_or_default(),
        status.target_api.unwrap_or_default()
    );

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    service.stop().await;
    Ok(())
}
