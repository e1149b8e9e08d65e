use easeread_auth::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "info,easeread_auth=debug".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!("application trace log");
    debug!(target: "easeread_auth::demo", "application debug log");
    info!("application info log");

    // Invalid directives are rejected and the previous filter stays in place
    let bad = LogConfig {
        filter: "info,=[".to_string(),
    };
    warn!(rejected = logger.reload_from_config(&bad).is_err());

    Ok(())
}
