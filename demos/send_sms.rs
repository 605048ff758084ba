// ABOUTME: Demo application sending one SMS through a reconnecting ESME service
// ABOUTME: Waits for the bind, submits, prints the SMSC acknowledgement and any delivery report

use argh::FromArgs;
use smpp_esme::client::{EsmeConfig, EsmeEvent, SubmitSmParams, start_esme};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Send a single SMS message and wait for its delivery report
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// TOML file with the ESME settings; the options below override it
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// the system id
    #[argh(option)]
    system_id: Option<String>,

    /// the password
    #[argh(option)]
    password: Option<String>,

    /// the hostname of IP address of the SMSC (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port to use when connecting to the SMSC (default: 2775)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// the message to send
    #[argh(option, short = 'm')]
    message: String,

    /// the recipient telephone number
    #[argh(option, short = 't')]
    to: String,

    /// the telephone number that the message will be from
    #[argh(option, short = 'f')]
    from: String,

    /// seconds to wait for a delivery report after the ack (default: 30)
    #[argh(option, default = "30")]
    wait: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli_args.config {
        Some(path) => EsmeConfig::load_from_file(path)?,
        None => EsmeConfig::default(),
    };
    if let Some(host) = cli_args.host {
        config.host = host;
    }
    if let Some(port) = cli_args.port {
        config.port = port;
    }
    if let Some(system_id) = cli_args.system_id {
        config.system_id = system_id;
    }
    if let Some(password) = cli_args.password {
        config.password = password;
    }
    config.validate()?;

    let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut service = start_esme(&config, Arc::new(events)).await?;

    let mut outstanding = Vec::new();
    let mut message_id = None;

    while let Some(event) = rx.recv().await {
        match event {
            EsmeEvent::Connected(handle) if message_id.is_none() && outstanding.is_empty() => {
                let params = SubmitSmParams::new(&cli_args.to, cli_args.message.clone())
                    .source_addr(cli_args.from.clone())
                    .data_coding(1);
                outstanding = handle.submit_sm(params).await?;
                info!("Submitted {} part(s)", outstanding.len());
            }
            EsmeEvent::SubmitAck {
                sequence_number,
                command_status,
                message_id: id,
                ..
            } => {
                if !command_status.is_ok() {
                    warn!("SMSC rejected the message: {command_status:?}");
                    break;
                }
                outstanding.retain(|seq| *seq != sequence_number);
                println!("Message accepted, id {id}");
                message_id = Some(id);
                if outstanding.is_empty() {
                    break;
                }
            }
            EsmeEvent::Disconnected { unacked } if !unacked.is_empty() => {
                warn!("Connection lost with {} part(s) unacknowledged", unacked.len());
                break;
            }
            other => info!("{other:?}"),
        }
    }

    if let Some(id) = message_id {
        let deadline = tokio::time::sleep(Duration::from_secs(cli_args.wait));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    println!("No delivery report within {}s", cli_args.wait);
                    break;
                }
                event = rx.recv() => match event {
                    Some(EsmeEvent::DeliveryReport { report, .. }) if report.id == id => {
                        println!("Delivery report: {} ({:?})", report.stat, report.status);
                        break;
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }
    }

    service.stop().await;
    Ok(())
}
