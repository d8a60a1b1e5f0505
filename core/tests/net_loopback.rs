/*
 * net_loopback.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Network transport against throwaway HTTP/1.1 and FTP servers on 127.0.0.1.
 *
 * Run with:
 *   cargo test -p webclient_core --test net_loopback -- --nocapture
 */

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;

use std::time::Duration;

use webclient_core::{AsyncWebClient, RequestMethod, TransferMode, WebClient, WebError};

/// Read one request: head text (up to the blank line) and body.
fn read_request(stream: &mut BufReader<TcpStream>) -> (String, Vec<u8>) {
    let mut head = String::new();
    loop {
        let mut line = String::new();
        if stream.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
            break;
        }
        head.push_str(&line);
    }
    let length = head
        .lines()
        .find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).unwrap();
    (head, body)
}

/// Serve `count` connections, one request each, reporting every request head on `seen`.
fn spawn_http(count: usize, seen: mpsc::Sender<(String, Vec<u8>)>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for _ in 0..count {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let (head, body) = read_request(&mut reader);
            let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
            let reply: Vec<u8> = match path.as_str() {
                "/hello" => b"HTTP/1.1 100 Continue\r\n\r\n\
                              HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\
                              Set-Cookie: session=abc; Path=/\r\n\r\nhello"
                    .to_vec(),
                "/echo" => {
                    let mut r = format!(
                        "HTTP/1.1 201 Created\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
                        body.len()
                    )
                    .into_bytes();
                    r.extend_from_slice(&body);
                    r
                }
                "/chunked" => b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                                4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n"
                    .to_vec(),
                "/huge" => {
                    let mut r = b"HTTP/1.1 200 OK\r\n".to_vec();
                    for _ in 0..2000 {
                        r.extend_from_slice(b"X-Filler: 0123456789abcdef0123456789abcdef\r\n");
                    }
                    r.extend_from_slice(b"\r\n");
                    r
                }
                "/stall" => b"HTTP/1.1 102 Processing\r\n\r\n".repeat(100),
                _ => b"HTTP/1.1 404 Not Found\r\n\r\n".to_vec(),
            };
            seen.send((head, body)).unwrap();
            let mut stream = reader.into_inner();
            let _ = stream.write_all(&reply);
        }
    });
    port
}

#[test]
fn http_get_post_and_chunked() {
    let (tx, rx) = mpsc::channel();
    let port = spawn_http(4, tx);
    let mut client = WebClient::network().unwrap();
    client.connect(&format!("http://127.0.0.1:{}", port)).unwrap();

    client.cookies_mut().add("a", "1").add("b", "2");
    client.request("/hello", RequestMethod::Get, None).unwrap();
    assert_eq!(client.status_code(), Some(200));
    assert_eq!(client.content_type(), Some("text/plain"));
    assert_eq!(client.cookie(0).map(|c| c.value.clone()), Some("abc".to_string()));
    assert_eq!(client.response_bytes().unwrap(), b"hello");
    let (head, _) = rx.recv().unwrap();
    assert!(head.starts_with("GET /hello HTTP/1.1\r\n"));
    assert!(head.contains(&format!("Host: 127.0.0.1:{}\r\n", port)));
    assert!(head.contains("Cookie: a=1; b=2\r\n"));
    assert!(head.contains("Connection: close\r\n"));

    client.reset_cookies();
    client.arguments_mut().add("f", "sss").add("n", 3.5);
    client.request("/echo", RequestMethod::Post, None).unwrap();
    assert_eq!(client.status_code(), Some(201));
    assert_eq!(client.response_bytes().unwrap(), b"f=sss&n=3.5");
    let (head, body) = rx.recv().unwrap();
    assert!(head.starts_with("POST /echo HTTP/1.1\r\n"));
    assert!(head.contains("Content-Type: application/x-www-form-urlencoded\r\n"));
    assert_eq!(body, b"f=sss&n=3.5");

    client.request("/chunked", RequestMethod::Get, None).unwrap();
    assert_eq!(client.content_length(), None);
    assert_eq!(client.response_bytes().unwrap(), b"Wikipedia");
    rx.recv().unwrap();

    client.request("/missing", RequestMethod::Get, None).unwrap();
    assert_eq!(client.status_code(), Some(404));
    assert!(client.raw_header().unwrap().starts_with(b"HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(client.response_bytes().unwrap(), b"");
    client.close().unwrap();
}

#[test]
fn endless_interim_responses_are_refused() {
    let (tx, _rx) = mpsc::channel();
    let port = spawn_http(1, tx);
    let mut client = WebClient::network().unwrap();
    client.connect(&format!("http://127.0.0.1:{}", port)).unwrap();
    let err = client.request("/stall", RequestMethod::Get, None).unwrap_err();
    assert!(err.to_string().contains("interim"));
    assert!(client.status_code().is_none());
}

#[test]
fn oversized_response_head_is_a_protocol_error() {
    let (tx, _rx) = mpsc::channel();
    let port = spawn_http(1, tx);
    let mut client = WebClient::network().unwrap();
    client.connect(&format!("http://127.0.0.1:{}", port)).unwrap();
    let err = client.request("/huge", RequestMethod::Get, None).unwrap_err();
    assert!(matches!(err, WebError::Protocol(_)), "{}", err);
}

#[test]
fn http_connect_refused_is_reported_on_request() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut client = WebClient::network().unwrap();
    client.connect(&format!("http://127.0.0.1:{}", port)).unwrap();
    let err = client.request("/", RequestMethod::Get, None).unwrap_err();
    assert!(err.is_transport());
    assert!(client.is_connected());
}

/// Minimal passive-mode FTP server holding a single file. Returns its port; the stored
/// file arrives on `stored`.
fn spawn_ftp(initial: Vec<u8>, stored: mpsc::Sender<(String, Vec<u8>)>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut out = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);
        let mut data_listener: Option<TcpListener> = None;
        let mut file = initial;
        out.write_all(b"220-Welcome\r\n220 ready\r\n").unwrap();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 {
                break;
            }
            let line = line.trim_end();
            let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
            match cmd {
                "USER" => out.write_all(b"331 password please\r\n").unwrap(),
                "PASS" => out.write_all(b"230 logged in\r\n").unwrap(),
                "TYPE" => out.write_all(b"200 type set\r\n").unwrap(),
                "PASV" => {
                    let l = TcpListener::bind("127.0.0.1:0").unwrap();
                    let p = l.local_addr().unwrap().port();
                    // Advertise a bogus host: the client must use the control peer.
                    let reply = format!("227 Entering Passive Mode (10,9,8,7,{},{})\r\n", p >> 8, p & 0xff);
                    out.write_all(reply.as_bytes()).unwrap();
                    data_listener = Some(l);
                }
                "RETR" => {
                    out.write_all(b"150 sending\r\n").unwrap();
                    let (mut data, _) = data_listener.take().unwrap().accept().unwrap();
                    // The client may hang up early; the reply still follows.
                    let _ = data.write_all(&file);
                    drop(data);
                    out.write_all(b"226 done\r\n").unwrap();
                }
                "STOR" => {
                    out.write_all(b"150 receiving\r\n").unwrap();
                    let (mut data, _) = data_listener.take().unwrap().accept().unwrap();
                    file.clear();
                    data.read_to_end(&mut file).unwrap();
                    stored.send((arg.to_string(), file.clone())).unwrap();
                    out.write_all(b"226 stored\r\n").unwrap();
                }
                "QUIT" => {
                    out.write_all(b"221 bye\r\n").unwrap();
                    break;
                }
                _ => out.write_all(b"502 not implemented\r\n").unwrap(),
            }
        }
    });
    port
}

#[test]
fn ftp_binary_and_ascii_transfers() {
    let (tx, rx) = mpsc::channel();
    let port = spawn_ftp(b"one\r\ntwo\r\n".to_vec(), tx);
    let mut client = WebClient::network().unwrap();
    client.connect(&format!("ftp://127.0.0.1:{}", port)).unwrap();

    assert_eq!(client.get_bytes("/f.txt", TransferMode::Binary).unwrap(), b"one\r\ntwo\r\n");

    client.put_bytes("/up.txt", b"x\ny\n", TransferMode::Ascii).unwrap();
    let (path, wire) = rx.recv().unwrap();
    assert_eq!(path, "/up.txt");
    if cfg!(windows) {
        assert_eq!(wire, b"x\ny\n");
    } else {
        assert_eq!(wire, b"x\r\ny\r\n");
        assert_eq!(client.get_bytes("/up.txt", TransferMode::Ascii).unwrap(), b"x\ny\n");
    }
    client.close().unwrap();
}

/// Writer that refuses every write.
struct FullDisk;

impl Write for FullDisk {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn ftp_control_stays_in_step_after_local_write_error() {
    let (tx, _rx) = mpsc::channel();
    let port = spawn_ftp(b"payload".to_vec(), tx);
    let mut client = WebClient::network().unwrap();
    client.connect(&format!("ftp://127.0.0.1:{}", port)).unwrap();

    let err = client.get_to_writer("/f", &mut FullDisk, TransferMode::Binary).unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert_eq!(client.get_bytes("/f", TransferMode::Binary).unwrap(), b"payload");
    client.close().unwrap();
}

#[test]
fn ftp_file_round_trips() {
    let (tx, rx) = mpsc::channel();
    let port = spawn_ftp(Vec::new(), tx);
    let mut client = WebClient::network().unwrap();
    client.connect(&format!("ftp://127.0.0.1:{}", port)).unwrap();
    let dir = std::env::temp_dir().join(format!("webclient-ftp-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let binary = dir.join("mixed.bin");
    let contents = b"dos\r\nunix\n\x00\xff".to_vec();
    std::fs::write(&binary, &contents).unwrap();
    client.put_file("/mixed.bin", &binary, TransferMode::Binary).unwrap();
    assert_eq!(rx.recv().unwrap().1, contents);
    let back = dir.join("mixed.back");
    client.get_file("/mixed.bin", &back, TransferMode::Binary).unwrap();
    assert_eq!(std::fs::read(&back).unwrap(), contents);

    let text = dir.join("notes.txt");
    std::fs::write(&text, b"one\ntwo\n").unwrap();
    assert_eq!(client.put_file("/notes.txt", &text, TransferMode::Ascii).unwrap(), 8);
    rx.recv().unwrap();
    let back = dir.join("notes.back");
    assert_eq!(client.get_file("/notes.txt", &back, TransferMode::Ascii).unwrap(), 8);
    assert_eq!(std::fs::read(&back).unwrap(), b"one\ntwo\n");

    client.close().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn async_client_over_the_network() {
    let (tx, rx) = mpsc::channel();
    let port = spawn_http(1, tx);
    let mut client = AsyncWebClient::network().unwrap();
    client.connect(&format!("http://127.0.0.1:{}", port)).unwrap();
    client.request("/hello", RequestMethod::Get, None).unwrap();
    assert!(client.wait_complete(Some(Duration::from_secs(5))));
    assert_eq!(client.status_code(), Some(200));
    assert_eq!(client.response_bytes().unwrap(), b"hello");
    assert!(rx.recv().unwrap().0.starts_with("GET /hello HTTP/1.1\r\n"));
}
