mod commandline;

use anyhow::{Context, Result};
use clap::Parser;
use serialport::SerialPortType;

use u50_protocol::transport::serial;
use u50_protocol::{ParameterKind, Probe, ProbeConfig};
use u50_telemetry::{Config, LoopKind, Scheduler, Snapshot, WebhookClient};

use commandline::{CliArgs, CliCommands};

fn main() -> Result<()> {
    let args = CliArgs::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.verbose.log_level_filter().as_str()),
    )
    .init();

    let config = Config::load(&args.config)
        .with_context(|| format!("cannot load {}", args.config.display()))?;

    match args.command {
        CliCommands::Ports => list_ports(),
        CliCommands::Read => read_once(&config),
        CliCommands::Send => {
            // Connect in plain sync context (before the tokio runtime starts).
            let probe = connect(&config)?;
            let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
            rt.block_on(send_once(&config, probe))
        }
        CliCommands::Run {
            no_collect,
            no_webhook,
        } => {
            if no_collect && no_webhook {
                log::warn!("both loops disabled, nothing to do");
                return Ok(());
            }
            let probe = connect(&config)?;
            let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
            rt.block_on(run(&config, probe, !no_collect, !no_webhook))
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = serial::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        match port.port_type {
            SerialPortType::UsbPort(info) => println!(
                "{}  USB {:04x}:{:04x} {}",
                port.port_name,
                info.vid,
                info.pid,
                info.product.unwrap_or_default()
            ),
            other => println!("{}  {:?}", port.port_name, other),
        }
    }
    Ok(())
}

fn connect(config: &Config) -> Result<Probe> {
    let port = if config.auto_port() {
        serial::find_port()?
    } else {
        config.serial.port.clone()
    };

    println!("Connecting to probe on {port}...");
    let probe_config = ProbeConfig {
        settle: config.serial.settle,
    };
    match Probe::open(
        &port,
        config.serial.baud_rate,
        config.serial.timeout,
        probe_config,
    ) {
        Ok(probe) => {
            println!("Connected.");
            Ok(probe)
        }
        Err(e) => {
            eprintln!("Failed to connect: {e}");
            eprintln!();
            eprintln!("Troubleshooting:");
            eprintln!("  1. Connect the U-50 control unit via its USB communication cable");
            eprintln!("  2. Check the port name with `u50-telemetry ports` (or set serial.port: auto)");
            eprintln!("  3. Ensure the probe is set to {} baud", config.serial.baud_rate);
            Err(e).context("cannot open probe port")
        }
    }
}

fn read_once(config: &Config) -> Result<()> {
    let mut probe = connect(config)?;
    let (reading, values) = probe.read_reading().context("request failed")?;

    println!("Parameters:");
    for parameter in &reading.parameters {
        match parameter.kind() {
            Some(ParameterKind::Unused) => {}
            Some(kind) => println!("  {kind:<18} {:>6} {}", parameter.data, kind.unit()),
            None => println!("  code {:<13} {:>6}", parameter.code.trim(), parameter.data),
        }
    }
    print!("{}", Snapshot::new(reading, values));
    Ok(())
}

fn build_scheduler(config: &Config) -> Result<Scheduler<WebhookClient>> {
    let webhook = &config.webhook;
    let client = WebhookClient::new(
        webhook.url.clone(),
        webhook.authorization.as_deref(),
        webhook.timeout,
    )?;

    let scheduler = Scheduler::new(client);
    scheduler.set_field_map(webhook.fields.clone());
    scheduler.set_interval(LoopKind::Collection, config.intervals.collect.clone());
    scheduler.set_interval(LoopKind::Webhook, config.intervals.webhook.clone());
    Ok(scheduler)
}

async fn send_once(config: &Config, probe: Probe) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    scheduler.connect(probe);

    let snapshot = scheduler.request_now().await.context("request failed")?;
    print!("{snapshot}");
    scheduler.send_now().await.context("webhook failed")?;
    println!("Sent to {}", config.webhook.url);

    scheduler.disconnect();
    Ok(())
}

async fn run(config: &Config, probe: Probe, collect: bool, webhook: bool) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    scheduler.connect(probe);

    for (kind, enabled) in [(LoopKind::Collection, collect), (LoopKind::Webhook, webhook)] {
        if enabled {
            scheduler
                .toggle(kind)
                .with_context(|| format!("cannot start {kind} loop"))?;
        }
    }

    let mut snapshots = scheduler.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = latest {
                    println!("--- {}", snapshot.captured_at.format("%Y-%m-%d %H:%M:%S"));
                    print!("{snapshot}");
                }
            }
        }
    }

    scheduler.disconnect();
    Ok(())
}
