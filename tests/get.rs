use std::fs::File;
use std::path::Path;
use std::thread;

use tftp_transfer::packet::{ErrorCode, ErrorPacket, Mode};
use tftp_transfer::{client, Error, Role, Server, TransferError, TransferStream};

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

/// Serves a single read request from `dir`.
fn serve_one(server: Server, dir: &Path) -> thread::JoinHandle<()> {
    let dir = dir.to_path_buf();

    thread::spawn(move || {
        let transfer = server.serve().unwrap();
        assert_eq!(transfer.role(), Role::ServerRead);

        match File::open(dir.join(transfer.filename())) {
            Ok(file) => {
                let stream = TransferStream::file_source(file).unwrap();
                transfer.run(stream).unwrap();
            }
            Err(err) => transfer.cancel(ErrorPacket::from(&err)),
        }
    })
}

fn start_server(dir: &Path) -> (String, thread::JoinHandle<()>) {
    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    (format!("127.0.0.1:{}", port), serve_one(server, dir))
}

#[test]
fn test_get() {
    let serve_dir = tempfile::tempdir().unwrap();
    let exemplar = content(100_000);
    std::fs::write(serve_dir.path().join("exemplar.bin"), &exemplar).unwrap();

    let (server_addr, server_thread) = start_server(serve_dir.path());

    let client = client::Builder::new()
        .connect_to(server_addr)
        .unwrap()
        .build();

    let download_dir = tempfile::tempdir().unwrap();
    let target = download_dir.path().join("exemplar.bin");
    client
        .get("exemplar.bin", Mode::Octet, File::create(&target).unwrap())
        .unwrap();

    server_thread.join().unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), exemplar);
}

#[test]
fn test_get_with_larger_block_size() {
    let serve_dir = tempfile::tempdir().unwrap();
    let exemplar = content(3 * 1428);
    std::fs::write(serve_dir.path().join("exemplar.bin"), &exemplar).unwrap();

    let (server_addr, server_thread) = start_server(serve_dir.path());

    let client = client::Builder::new()
        .connect_to(server_addr)
        .unwrap()
        .build();

    let transfer = client.read("exemplar.bin", Mode::Octet).unwrap();
    transfer.set_block_size(1428).unwrap();

    let download_dir = tempfile::tempdir().unwrap();
    let target = download_dir.path().join("exemplar.bin");
    let sink = TransferStream::sink(File::create(&target).unwrap());
    transfer.run(sink).unwrap();

    server_thread.join().unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), exemplar);
}

#[test]
fn test_get_missing_file() {
    let serve_dir = tempfile::tempdir().unwrap();
    let (server_addr, server_thread) = start_server(serve_dir.path());

    let client = client::Builder::new()
        .connect_to(server_addr)
        .unwrap()
        .build();

    let result = client.get("missing.bin", Mode::Octet, std::io::sink());

    server_thread.join().unwrap();
    match result {
        Err(Error::Transfer(TransferError::Remote { code, .. })) => {
            assert_eq!(code, ErrorCode::FileNotFound)
        }
        other => panic!("unexpected {:?}", other),
    }
}
