mod cli;
mod signal;

use anyhow::Result;
use bigip_xfer::{config, ApplianceClient, Config, Credentials, Mode};
use std::env;
use std::future::Future;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DOWNLOAD_USAGE: &str =
    "Usage: bigip-xfer download <host> <username> <password> <file> [-i | -u]";
const UPLOAD_USAGE: &str =
    "Usage: bigip-xfer upload <host> <username> <password> <file> [-i | -u | -g]";

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let cfg = Config::load();

    match args.get(1).map(|s| s.as_str()) {
        Some("download") | Some("dl") => {
            let target = parse_transfer_args(&args[2..], Mode::Image, &[Mode::Image, Mode::Ucs], DOWNLOAD_USAGE)?;
            let output = cfg.resolve_output_path(&target.file);
            let client = ApplianceClient::new(&target.host, target.credentials, cfg.transfer_settings())?;

            eprintln!("  Downloading: {}", target.file);
            run_until_signal(|cancel| async move {
                cli::run_download(&client, target.mode, &output, &cancel).await
            })
        }

        Some("upload") | Some("up") => {
            let target = parse_transfer_args(
                &args[2..], Mode::General, &[Mode::Image, Mode::Ucs, Mode::General], UPLOAD_USAGE,
            )?;
            let client = ApplianceClient::new(&target.host, target.credentials, cfg.transfer_settings())?;

            eprintln!("  Uploading: {}", target.file);
            run_until_signal(|cancel| async move {
                cli::run_upload(&client, target.mode, Path::new(&target.file), &cancel).await
            })
        }

        Some("config") => {
            let path = config::config_path();
            eprintln!("BIG-IP Transfer — Configuration");
            eprintln!();
            eprintln!("  Exists       : {}", if path.exists() { "yes" } else { "no" });
            cfg.print();
            Ok(())
        }

        _ => {
            eprintln!("BIG-IP Transfer — chunked iControl REST file transfer");
            eprintln!();
            eprintln!("Usage:");
            eprintln!("  bigip-xfer download <host> <user> <pass> <file> [-i | -u]        Download from the appliance");
            eprintln!("  bigip-xfer upload   <host> <user> <pass> <file> [-i | -u | -g]   Upload to the appliance");
            eprintln!("  bigip-xfer config                                               Show configuration");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  -i, --image     Software image or MD5 file -- /shared/images/ (download default)");
            eprintln!("  -u, --ucs       UCS archive -- /var/local/ucs/");
            eprintln!("  -g, --general   Any other file -- /var/config/rest/downloads/ (upload default, upload only)");
            eprintln!();
            eprintln!("Uploads of .iso files always go to the image endpoint; .ucs and .md5 to the general one.");
            eprintln!("Set RUST_LOG=debug to trace every chunk request.");
            eprintln!();
            eprintln!("Config: {}", config::config_path().display());
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Runs a transfer on a fresh runtime. SIGINT/SIGTERM fires the token handed
/// to the transfer, which stops after flushing what it has; the process then
/// exits with status 130.
fn run_until_signal<T, F>(transfer: T) -> Result<()>
where
    T: FnOnce(CancellationToken) -> F,
    F: Future<Output = Result<()>>,
{
    let cancel = CancellationToken::new();
    let result = tokio::runtime::Builder::new_multi_thread().enable_all().build()?
        .block_on(async {
            let sh = signal::spawn_signal_handler(cancel.clone());
            let result = transfer(cancel.clone()).await;
            sh.abort();
            result
        });

    if cancel.is_cancelled() {
        if let Err(e) = &result {
            eprintln!("  Error: {:#}", e);
        }
        std::process::exit(130);
    }
    result
}

#[derive(Debug)]
struct TransferTarget {
    host: String,
    credentials: Credentials,
    file: String,
    mode: Mode,
}

fn parse_transfer_args(
    args: &[String],
    default_mode: Mode,
    allowed: &[Mode],
    usage: &str,
) -> Result<TransferTarget> {
    let mut positional: Vec<&str> = Vec::new();
    let mut mode: Option<Mode> = None;

    for arg in args {
        let flag = match arg.as_str() {
            "-i" | "--image" => Some(Mode::Image),
            "-u" | "--ucs" => Some(Mode::Ucs),
            "-g" | "--general" => Some(Mode::General),
            other if other.starts_with('-') && other.len() > 1 => {
                anyhow::bail!("Unknown option '{}'\n{}", other, usage);
            }
            other => {
                positional.push(other);
                None
            }
        };

        if let Some(m) = flag {
            if !allowed.contains(&m) {
                anyhow::bail!("--{} is not available here\n{}", m, usage);
            }
            if mode.is_some_and(|prev| prev != m) {
                anyhow::bail!("Mode options are mutually exclusive\n{}", usage);
            }
            mode = Some(m);
        }
    }

    let [host, username, password, file] = positional.as_slice() else {
        anyhow::bail!("Expected host, username, password and file\n{}", usage);
    };

    Ok(TransferTarget {
        host: (*host).to_string(),
        credentials: Credentials::new(*username, *password),
        file: (*file).to_string(),
        mode: mode.unwrap_or(default_mode),
    })
}
