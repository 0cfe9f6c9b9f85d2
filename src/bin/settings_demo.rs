use courtside::server::jwt_config;
use courtside::settings::*;

fn main() -> anyhow::Result<()> {
    // Load settings from the default location
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // $ cargo run --bin settings_demo -- --settings=settings/release.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("Loaded settings: {:?}", project_settings);

    // The secret itself is never printed, only whether it resolves.
    match jwt_config(&project_settings.jwt) {
        Ok(cfg) => println!("JWT config usable: {:?}", cfg),
        Err(e) => println!("JWT config rejected: {}", e),
    }
    Ok(())
}
