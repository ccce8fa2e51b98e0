//! Fetch a URL over HTTPS and print the status and body.
//!
//! Use `--help` to see the options.

use std::io::Write as _;
use std::time::Duration;

use clap::{arg, value_parser, ArgAction};
use color_eyre::eyre::{self, WrapErr as _};
use getweb::client::conn::tls::{CertificateVerification, RustlsProvider};
use getweb::client::conn::TcpTransportConfig;
use getweb::Client;
use tracing::Level;
use tracing_subscriber::{
    filter::Targets, fmt::format::FmtSpan, layer::SubscriberExt as _,
    util::SubscriberInitExt as _, Layer as _,
};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let filter = Targets::new()
        .with_target("getweb", Level::DEBUG)
        .with_default(Level::INFO);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(filter),
        )
        .init();

    let args = clap::Command::new("getweb")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fetch a single https:// URL")
        .args([
            clap::Arg::new("url").help("Target URL").required(true),
            clap::Arg::new("insecure")
                .long("insecure")
                .short('k')
                .help("Do not verify the server certificate")
                .action(ArgAction::SetTrue),
            arg!(--"max-body" [BYTES] "Maximum number of body bytes to capture")
                .default_value("20480")
                .value_parser(value_parser!(usize)),
            arg!(--timeout [SECONDS] "Connect, read and write timeout in seconds")
                .default_value("30")
                .value_parser(value_parser!(u64).range(1..)),
            arg!(--"ca-file" [CERTIFICATE] "Path to a PEM CA root to trust instead of the platform roots"),
        ])
        .get_matches();

    let timeout = args
        .get_one::<u64>("timeout")
        .copied()
        .map(Duration::from_secs);
    let tcp = TcpTransportConfig {
        connect_timeout: timeout,
        read_timeout: timeout,
        write_timeout: timeout,
        ..Default::default()
    };

    let verification = if args.get_flag("insecure") {
        CertificateVerification::Disabled
    } else {
        CertificateVerification::Enabled
    };
    let mut tls = RustlsProvider::new().with_verification(verification);
    if let Some(path) = args.get_one::<String>("ca-file") {
        tls = tls.with_root_store(load_root(path)?);
    }

    let mut builder = Client::builder().with_tcp(tcp).with_tls(tls);
    if let Some(limit) = args.get_one::<usize>("max-body") {
        builder = builder.body_limit(*limit);
    }
    let client = builder.build();

    let url = args
        .get_one::<String>("url")
        .ok_or_else(|| eyre::eyre!("url argument must be present"))?;

    match client.get(url) {
        Ok(response) => {
            println!("Status: {}", response.status());
            let mut stdout = std::io::stdout();
            stdout.write_all(String::from_utf8_lossy(response.body()).as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
        Err(error) => {
            let stage = error.stage();
            Err(eyre::Report::new(error).wrap_err(format!("request failed during {stage}")))
        }
    }
}

fn load_root(path: &str) -> eyre::Result<rustls::RootCertStore> {
    let pem = std::fs::read(path).wrap_err_with(|| format!("reading {path}"))?;
    let (label, der) = pem_rfc7468::decode_vec(&pem)
        .map_err(|error| eyre::eyre!("decoding {path}: {error}"))?;
    eyre::ensure!(label == "CERTIFICATE", "{path} is not a certificate: {label}");

    let mut roots = rustls::RootCertStore::empty();
    roots.add(rustls::pki_types::CertificateDer::from(der))?;
    Ok(roots)
}
