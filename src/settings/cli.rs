use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "courtside", about = "Session and token service")]
pub struct Cli {
    /// Path to a settings TOML file.
    #[arg(long)]
    pub settings: Option<String>,
}
