use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::thread;

use tftp_transfer::packet::{ErrorCode, ErrorPacket, Mode};
use tftp_transfer::{client, Error, Role, Server, TransferError, TransferStream};

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 13 % 256) as u8).collect()
}

/// Accepts `count` write requests into `dir`, refusing to overwrite files.
fn serve_writes(server: Server, dir: &Path, count: usize) -> thread::JoinHandle<Vec<Option<u64>>> {
    let dir = dir.to_path_buf();

    thread::spawn(move || {
        let mut announced = vec![];

        for _ in 0..count {
            let transfer = server.serve().unwrap();
            assert_eq!(transfer.role(), Role::ServerWrite);
            announced.push(transfer.expected_size());

            let created = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(transfer.filename()));

            match created {
                Ok(file) => transfer.run(TransferStream::sink(file)).unwrap(),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    transfer.cancel(ErrorPacket::new(
                        ErrorCode::FileAlreadyExists,
                        ErrorCode::FileAlreadyExists.as_str(),
                    ));
                }
                Err(err) => transfer.cancel(ErrorPacket::from(&err)),
            }
        }

        announced
    })
}

#[test]
fn test_put() {
    let serve_dir = tempfile::tempdir().unwrap();
    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    let server_thread = serve_writes(server, serve_dir.path(), 1);

    let client = client::Builder::new()
        .connect_to(format!("127.0.0.1:{}", port))
        .unwrap()
        .build();

    let data = content(70_000);
    client
        .put("upload.bin", Mode::Octet, std::io::Cursor::new(data.clone()))
        .unwrap();

    let announced = server_thread.join().unwrap();
    // Without a known length, the client does not propose `tsize`.
    assert_eq!(announced, vec![None]);

    let actual = std::fs::read(serve_dir.path().join("upload.bin")).unwrap();
    assert_eq!(actual, data);
}

#[test]
fn test_put_announces_file_size() {
    let local_dir = tempfile::tempdir().unwrap();
    let source = local_dir.path().join("upload.bin");
    let data = content(2048);
    std::fs::write(&source, &data).unwrap();

    let serve_dir = tempfile::tempdir().unwrap();
    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    let server_thread = serve_writes(server, serve_dir.path(), 1);

    let client = client::Builder::new()
        .connect_to(format!("127.0.0.1:{}", port))
        .unwrap()
        .build();

    let transfer = client.write("upload.bin", Mode::Octet).unwrap();
    let stream = TransferStream::file_source(File::open(&source).unwrap()).unwrap();
    transfer.run(stream).unwrap();

    let announced = server_thread.join().unwrap();
    assert_eq!(announced, vec![Some(2048)]);

    let actual = std::fs::read(serve_dir.path().join("upload.bin")).unwrap();
    assert_eq!(actual, data);
}

#[test]
fn test_put_when_already_exists() {
    let serve_dir = tempfile::tempdir().unwrap();
    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    let server_thread = serve_writes(server, serve_dir.path(), 2);

    let client = client::Builder::new()
        .connect_to(format!("127.0.0.1:{}", port))
        .unwrap()
        .build();

    let data = content(100);
    client
        .put("upload.bin", Mode::Octet, std::io::Cursor::new(data.clone()))
        .unwrap();

    // Second put will return an error since the file already exists.
    let result = client.put("upload.bin", Mode::Octet, std::io::Cursor::new(data));

    server_thread.join().unwrap();
    match result {
        Err(Error::Transfer(TransferError::Remote { code, .. })) => {
            assert_eq!(code, ErrorCode::FileAlreadyExists)
        }
        other => panic!("unexpected {:?}", other),
    }
}
