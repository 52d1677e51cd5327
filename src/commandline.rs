use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use u50_telemetry::config::DEFAULT_CONFIG_FILE;

#[derive(Parser, Debug)]
#[command(version, about = "Read a U-50 multiprobe and forward readings to a webhook", long_about = None)]
pub struct CliArgs {
    /// YAML configuration file. Defaults are used if it does not exist.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: CliCommands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// List the serial ports found on this machine.
    Ports,

    /// Request one measurement and print it.
    Read,

    /// Request one measurement and send it to the webhook.
    Send,

    /// Run the collection and webhook loops until Ctrl-C.
    Run {
        /// Do not start the collection loop.
        #[arg(long)]
        no_collect: bool,

        /// Do not start the webhook loop.
        #[arg(long)]
        no_webhook: bool,
    },
}
