use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// City to show (e.g. 臺北市); saved as the new default
    #[arg(short, long)]
    pub city: Option<String>,

    /// Keep refreshing on the configured interval until Ctrl-C
    #[arg(short, long)]
    pub watch: bool,

    /// Print the supported cities and exit
    #[arg(long)]
    pub list_cities: bool,

    /// Config directory (defaults to the platform config dir)
    #[arg(long, value_name = "DIR")]
    pub config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,
}
