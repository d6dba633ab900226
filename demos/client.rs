use std::env;
use std::fs::File;
use std::path::Path;

use tftp_transfer::packet::Mode;
use tftp_transfer::{client, Client, Error, TransferStream};
use tracing_subscriber::EnvFilter;

fn put<T: AsRef<Path>>(src: T, client: &Client) -> Result<(), Error> {
    let target = src
        .as_ref()
        .file_name()
        .and_then(|name| name.to_str())
        .expect("source must name a file")
        .to_string();
    let source = TransferStream::file_source(File::open(src)?)?;

    let transfer = client.write(target, Mode::Octet)?;
    transfer.on_progress(|p| tracing::debug!(sent = p.transferred, total = ?p.expected, "progress"));
    transfer.run(source)
}

fn get(file: &str, client: &Client) -> Result<(), Error> {
    let transfer = client.read(file, Mode::Octet)?;
    transfer.on_progress(|p| tracing::debug!(received = p.transferred, total = ?p.expected, "progress"));
    transfer.run(TransferStream::sink(std::io::stdout()))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let (server, verb, file) = match (args.next(), args.next(), args.next()) {
        (Some(server), Some(verb), Some(file)) => (server, verb, file),
        _ => {
            eprintln!("usage: ./client address:port get|put file");
            std::process::exit(2);
        }
    };

    let client = client::Builder::new()
        .connect_to(server)
        .expect("couldn't resolve server")
        .build();

    let result = match verb.as_str() {
        "get" => get(&file, &client),
        "put" => put(&file, &client),
        _ => panic!("unknown verb"),
    };

    if let Err(err) = result {
        tracing::error!(%err, "transfer failed");
        std::process::exit(1);
    }
}
