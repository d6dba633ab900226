use std::io::{Cursor, ErrorKind};
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tftp_transfer::packet::Mode;
use tftp_transfer::{client, Role, Server, Transfer, TransferStream};

fn request_socket() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    socket
}

fn wait_until_done(transfer: &Transfer) {
    for _ in 0..50 {
        if transfer.is_done() {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Starts a write of `upload.bin` and returns the transfer, the client
/// socket and the transfer's address taken from its ACK 0.
fn accepted_write() -> (Transfer, UdpSocket, std::net::SocketAddr) {
    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    let socket = request_socket();

    socket
        .send_to(b"\x00\x02upload.bin\x00octet\x00", ("127.0.0.1", port))
        .unwrap();

    let transfer = server.serve().unwrap();
    assert_eq!(transfer.role(), Role::ServerWrite);
    transfer
        .start(TransferStream::sink(std::io::sink()))
        .unwrap();

    let mut buf = [0; 512];
    let (nbytes, tid) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..nbytes], b"\x00\x04\x00\x00");

    (transfer, socket, tid)
}

fn error_code(reply: &[u8]) -> u16 {
    assert_eq!(&reply[..2], &[0, 5]);
    u16::from_be_bytes([reply[2], reply[3]])
}

#[test]
fn test_serve_when_request_is_not_read_or_write() {
    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    let socket = request_socket();

    let op = vec![0, 5];
    let mut code = vec![0, 1];
    let mut message = b"file not found\0".to_vec();
    let mut bytes = op;
    bytes.append(&mut code);
    bytes.append(&mut message);

    socket
        .send_to(&bytes[..], ("127.0.0.1", port))
        .unwrap();

    let err = server.serve().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut buf = [0; 512];
    let (nbytes, _) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(error_code(&buf[..nbytes]), 4);
}

#[test]
fn test_serve_refuses_mail_mode() {
    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    let socket = request_socket();

    socket
        .send_to(b"\x00\x01inbox\x00mail\x00", ("127.0.0.1", port))
        .unwrap();

    assert!(server.serve().is_err());

    let mut buf = [0; 512];
    let (nbytes, _) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(error_code(&buf[..nbytes]), 4);
}

#[test]
fn test_serve_answers_from_new_port() {
    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    let socket = request_socket();

    socket
        .send_to(b"\x00\x01hello.txt\x00octet\x00", ("127.0.0.1", port))
        .unwrap();

    let transfer = server.serve().unwrap();
    assert_eq!(transfer.role(), Role::ServerRead);
    assert_eq!(transfer.filename(), "hello.txt");
    assert_eq!(transfer.mode(), Mode::Octet);
    assert_eq!(transfer.peer(), socket.local_addr().unwrap());

    transfer
        .start(TransferStream::source(Cursor::new(b"hi".to_vec())))
        .unwrap();

    let mut buf = [0; 512];
    let (nbytes, from) = socket.recv_from(&mut buf).unwrap();
    assert_ne!(from.port(), port);
    assert_eq!(&buf[..nbytes], b"\x00\x03\x00\x01hi");

    socket.send_to(b"\x00\x04\x00\x01", from).unwrap();

    // Wait for the final ACK to land.
    wait_until_done(&transfer);
    assert!(transfer.is_done());
}

#[test]
fn test_garbage_from_stranger_leaves_transfer_running() {
    let (transfer, socket, tid) = accepted_write();

    let stranger = request_socket();
    stranger.send_to(b"\xff\xffjunk", tid).unwrap();

    let mut buf = [0; 512];
    let (nbytes, _) = stranger.recv_from(&mut buf).unwrap();
    assert_eq!(error_code(&buf[..nbytes]), 5);
    assert!(!transfer.is_done());

    // The next thing the client hears is the ACK for its data.
    socket.send_to(b"\x00\x03\x00\x01bye", tid).unwrap();
    let (nbytes, _) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..nbytes], b"\x00\x04\x00\x01");

    wait_until_done(&transfer);
    assert!(transfer.is_done());
}

#[test]
fn test_garbage_from_peer_ends_transfer() {
    let (transfer, socket, tid) = accepted_write();

    socket.send_to(b"\xff\xffjunk", tid).unwrap();

    let mut buf = [0; 512];
    let (nbytes, _) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(error_code(&buf[..nbytes]), 4);

    wait_until_done(&transfer);
    assert!(transfer.is_done());

    // Exactly one error packet.
    socket
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    assert!(socket.recv_from(&mut buf).is_err());
}

#[test]
fn test_many_transfers() {
    let num_files = 25;
    let stored = Arc::new(Mutex::new(Vec::new()));

    let (port, server) = Server::random_port("127.0.0.1".parse().unwrap()).unwrap();
    let server_store = Arc::clone(&stored);
    let server_thread = thread::spawn(move || {
        for _ in 0..num_files * 2 {
            let transfer = server.serve().unwrap();
            let idx: usize = transfer
                .filename()
                .trim_start_matches("file")
                .parse()
                .unwrap();

            match transfer.role() {
                Role::ServerWrite => {
                    let sink = Vec::new();
                    let shared = Arc::clone(&server_store);
                    let stream = TransferStream::sink(Recorder(shared, idx, sink));
                    transfer.run(stream).unwrap();
                }
                Role::ServerRead => {
                    let content = server_store.lock().unwrap()[idx].clone();
                    let stream = TransferStream::source(Cursor::new(content));
                    transfer.run(stream).unwrap();
                }
                role => panic!("unexpected {:?}", role),
            }
        }
    });

    let client = client::Builder::new()
        .connect_to(("127.0.0.1", port))
        .unwrap()
        .build();

    for idx in 0..num_files {
        let content = format!("file{} content", idx).repeat(idx * 10);
        client
            .put(format!("file{}", idx), Mode::Octet, Cursor::new(content))
            .unwrap();
    }

    for idx in 0..num_files {
        let received = Arc::new(Mutex::new(Vec::new()));
        client
            .get(format!("file{}", idx), Mode::Octet, Shared(Arc::clone(&received)))
            .unwrap();

        let expected = format!("file{} content", idx).repeat(idx * 10);
        assert_eq!(&received.lock().unwrap()[..], expected.as_bytes());
    }

    server_thread.join().unwrap();
}

/// Stores a finished upload at its index once flushed.
struct Recorder(Arc<Mutex<Vec<Vec<u8>>>>, usize, Vec<u8>);

impl std::io::Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.2.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut store = self.0.lock().unwrap();
        if store.len() <= self.1 {
            store.resize(self.1 + 1, Vec::new());
        }
        store[self.1] = self.2.clone();
        Ok(())
    }
}

struct Shared(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Shared {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
