use assert_cmd::Command;
use predicates::prelude::*;
use std::io::{Read, Write};
use std::os::unix::net::UnixListener;
use std::thread;

const HEADER: &[u8] = b"GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n";

fn shim() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_filter-shim"));
    cmd.env_remove("FILTER_SHIM_LISTEN_SOCKET")
        .env_remove("FILTER_SHIM_IO_TIMEOUT_MS")
        .env_remove("FILTER_SHIM_EOF_POLICY")
        .env_remove("FILTER_SHIM_DONE_POLICY")
        .env("LOG_LEVEL", "warn");
    cmd
}

#[test]
fn test_binary_help() {
    shim()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reqmod"))
        .stdout(predicate::str::contains("respmod"));
}

#[test]
fn test_describe_lists_services() {
    shim()
        .arg("describe")
        .assert()
        .success()
        .stdout(predicate::str::contains("ecap://filter-shim.local/reqmod"))
        .stdout(predicate::str::contains("ecap://filter-shim.local/respmod"));
}

#[test]
fn test_reqmod_replay_against_filter_service() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("filter.sock");
    let header_file = dir.path().join("request.hdr");
    std::fs::write(&header_file, HEADER).unwrap();

    let listener = UnixListener::bind(&socket).unwrap();
    let service = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut header = vec![0u8; HEADER.len()];
        stream.read_exact(&mut header).unwrap();
        assert_eq!(header, HEADER);
        stream.write_all(b"mX-Test: 1\n\n\0\0").unwrap();
        let mut ack = [0u8; 1];
        stream.read_exact(&mut ack).unwrap();
        assert_eq!(&ack, b"r");
    });

    shim()
        .arg("--socket")
        .arg(&socket)
        .arg("reqmod")
        .arg("--header")
        .arg(&header_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("modified_header"))
        .stdout(predicate::str::contains("X-Test: 1"));

    service.join().unwrap();
}

#[test]
fn test_missing_socket_fails() {
    let dir = tempfile::tempdir().unwrap();
    let header_file = dir.path().join("request.hdr");
    std::fs::write(&header_file, HEADER).unwrap();

    shim()
        .arg("reqmod")
        .arg("--header")
        .arg(&header_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("listen_socket"));
}

#[test]
fn test_unreachable_filter_service_fails() {
    let dir = tempfile::tempdir().unwrap();
    let header_file = dir.path().join("request.hdr");
    std::fs::write(&header_file, HEADER).unwrap();

    shim()
        .arg("--socket")
        .arg(dir.path().join("nobody-listens.sock"))
        .arg("reqmod")
        .arg("--header")
        .arg(&header_file)
        .assert()
        .failure();
}

#[test]
fn test_invalid_env_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("filter.sock");
    let header_file = dir.path().join("request.hdr");
    std::fs::write(&header_file, HEADER).unwrap();
    let listener = UnixListener::bind(&socket).unwrap();

    shim()
        .env("FILTER_SHIM_IO_TIMEOUT_MS", "bogus")
        .env("FILTER_SHIM_EOF_POLICY", "strict")
        .arg("--socket")
        .arg(&socket)
        .arg("reqmod")
        .arg("--header")
        .arg(&header_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid io_timeout_ms value"))
        .stdout(predicate::str::is_empty());

    // the filter service was never contacted
    listener.set_nonblocking(true).unwrap();
    let err = listener.accept().unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
}
