use std::env;
use std::fs::{File, OpenOptions};
use std::path::Path;

use tftp_transfer::packet::ErrorPacket;
use tftp_transfer::{Error, Role, Server, Transfer, TransferStream};
use tracing_subscriber::EnvFilter;

/// Answers one request with a file from `dir`.
fn handle(transfer: Transfer, dir: &Path) -> Result<(), Error> {
    // Requests name files relative to the served directory only.
    let name = transfer.filename();
    let path = match Path::new(&name).file_name() {
        Some(file_name) => dir.join(file_name),
        None => {
            transfer.cancel(ErrorPacket::new(
                tftp_transfer::packet::ErrorCode::AccessViolation,
                "bad file name",
            ));
            return Ok(());
        }
    };

    let opened = match transfer.role() {
        Role::ServerRead => File::open(&path).and_then(TransferStream::file_source),
        _ => OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map(TransferStream::sink),
    };

    match opened {
        Ok(stream) => transfer.run(stream),
        Err(err) => {
            transfer.cancel(ErrorPacket::from(&err));
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<_> = env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("usage ./server address:port directory");
        std::process::exit(2);
    }

    let dir = Path::new(&args[1]).to_path_buf();
    let server = Server::bind(&args[0]).expect("couldn't bind to address");
    println!("Serving Trivial File Transfer Protocol (TFTP) @ {}", args[0]);

    loop {
        let transfer = match server.serve() {
            Ok(transfer) => transfer,
            Err(err) => {
                tracing::warn!(%err, "request refused");
                continue;
            }
        };

        let file = transfer.filename();
        match handle(transfer, &dir) {
            Ok(()) => tracing::info!(%file, "done"),
            Err(err) => tracing::warn!(%file, %err, "transfer failed"),
        }
    }
}
