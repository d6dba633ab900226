use std::env;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::thread;

use tftp_transfer::packet::{ErrorCode, ErrorPacket};
use tftp_transfer::{Role, Server, TransferSettings, TransferStream};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_names(true)
        .init();

    let mut args = env::args().skip(1);
    let addr = args.next().expect("usage ./server_with_threads address:port directory");
    let dir = PathBuf::from(args.next().expect("missing directory"));

    let settings = TransferSettings {
        retry_count: 8,
        ..TransferSettings::default()
    };
    let server = Server::bind(&addr)
        .expect("couldn't bind to address")
        .with_settings(settings);
    println!("Serving Trivial File Transfer Protocol (TFTP) @ {}", addr);

    while let Ok(transfer) = server.serve() {
        let dir = dir.clone();
        let file = transfer.filename();
        tracing::info!(%file, role = ?transfer.role(), peer = %transfer.peer(), "handling request");

        thread::spawn(move || {
            let path = match PathBuf::from(&file).file_name() {
                Some(name) => dir.join(name),
                None => {
                    transfer.cancel(ErrorPacket::new(ErrorCode::AccessViolation, "bad file name"));
                    return;
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

            let stream = match opened {
                Ok(stream) => stream,
                Err(err) => return transfer.cancel(ErrorPacket::from(&err)),
            };

            match transfer.run(stream) {
                Ok(()) => tracing::info!(%file, "OK"),
                Err(err) => tracing::warn!(%file, %err, "FAIL"),
            }
        });
    }
}
