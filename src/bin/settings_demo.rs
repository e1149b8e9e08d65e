use easeread_auth::settings::*;

fn main() -> anyhow::Result<()> {
    // Load settings from the default location
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // Environment variables override file values
    // $ EASEREAD__SESSION__BACKEND=redis cargo run --bin settings_demo
    let session = &project_settings.session;
    println!(
        "Session backend: {} (prefix {:?})",
        session.backend, session.key_prefix
    );

    Ok(())
}
