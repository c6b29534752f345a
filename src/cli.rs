//! CLI argument parsing for the doorstep-geo binary.

use clap::Parser;

#[derive(Parser)]
#[command(name = "doorstep-geo", about = "Distance estimates for Doorstep service providers")]
pub struct Cli {
    /// Provider locations to estimate the distance to (free text)
    #[arg(required = true)]
    pub locations: Vec<String>,

    /// Current latitude (defaults to the Delhi city center)
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Current longitude
    #[arg(long, allow_hyphen_values = true)]
    pub lng: Option<f64>,

    /// Also print each location's resolved display name
    #[arg(long)]
    pub places: bool,
}
