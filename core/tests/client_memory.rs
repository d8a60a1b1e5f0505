/*
 * client_memory.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * End-to-end client behaviour against the in-memory transport: request bodies and
 * headers, multipart uploads from disk, FTP transfers, completion signalling, state
 * errors and handle release order.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use webclient_core::transport::memory::{HandleEvent, HandleKind, MemoryResponse};
use webclient_core::{
    AsyncWebClient, BoundaryPolicy, ClientConfig, ClientState, MemoryTransport, RequestMethod, Scheme,
    TransferMode, WebClient, WebError,
};

fn connected(address: &str) -> (MemoryTransport, WebClient) {
    let transport = MemoryTransport::new();
    let mut client = WebClient::new(Arc::new(transport.clone()));
    client.connect(address).unwrap();
    (transport, client)
}

fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("webclient-it-{}-{}", std::process::id(), name));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn get_has_no_body_and_post_sends_urlencoded_arguments() {
    let (transport, mut client) = connected("http://example.com");
    client.arguments_mut().add("f", "sss");

    client.request("/form", RequestMethod::Get, None).unwrap();
    let get = transport.last_request().unwrap();
    assert_eq!(get.head.method, "GET");
    assert_eq!(get.body, None);
    assert_eq!(get.head.get("Content-Type"), None);
    client.response_bytes().unwrap();

    client.request("/form", RequestMethod::Post, Some("http://example.com/")).unwrap();
    let post = transport.last_request().unwrap();
    assert_eq!(post.head.method, "POST");
    assert_eq!(post.body.as_deref(), Some(&b"f=sss"[..]));
    assert_eq!(post.head.get("Content-Type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(post.head.get("Referer"), Some("http://example.com/"));
}

#[test]
fn cookies_are_joined_into_one_header() {
    let (transport, mut client) = connected("example.com");
    client.cookies_mut().add("a", "1").add("b", 2);
    client.request("/", RequestMethod::Get, None).unwrap();
    assert_eq!(transport.last_request().unwrap().head.get("Cookie"), Some("a=1; b=2"));

    client.response_bytes().unwrap();
    client.reset_cookies();
    client.request("/", RequestMethod::Get, None).unwrap();
    assert_eq!(transport.last_request().unwrap().head.get("Cookie"), None);
}

#[test]
fn response_metadata_and_body() {
    let transport = MemoryTransport::new();
    transport.route(
        "/page",
        MemoryResponse::ok("hello world")
            .with_header("Content-Type", "text/plain")
            .with_header("Set-Cookie", "sid=42; Path=/"),
    );
    transport.read_chunk(4);
    let mut client = WebClient::new(Arc::new(transport.clone()));
    client.connect("http://example.com/start").unwrap();
    client.request("/page?x=1", RequestMethod::Get, None).unwrap();

    assert_eq!(client.status_code(), Some(200));
    assert_eq!(client.content_type(), Some("text/plain"));
    assert_eq!(client.content_length(), Some(11));
    let cookie = client.cookie(0).unwrap();
    assert_eq!((cookie.name.as_str(), cookie.value.as_str()), ("sid", "42"));
    assert!(client.cookie(1).is_none());

    let mut buf = [0u8; 64];
    assert_eq!(client.response(&mut buf).unwrap(), 4);
    assert_eq!(client.state(), ClientState::Reading);
    let rest = client.response_bytes().unwrap();
    assert_eq!(rest, b"o world");
    assert_eq!(client.response(&mut buf).unwrap(), 0);
    assert_eq!(client.status_code(), Some(200));
}

#[test]
fn multipart_upload_streams_files_from_disk() {
    let path = temp_file("notes.txt", b"line one\nline two\n");
    let transport = MemoryTransport::new();
    let config = ClientConfig {
        boundary: BoundaryPolicy::Fixed("XBOUNDARYX".to_string()),
        upload_chunk_size: 5,
        ..ClientConfig::default()
    };
    let mut client = WebClient::with_config(Arc::new(transport.clone()), config);
    client.connect("http://upload.example.com").unwrap();
    client.arguments_mut().add("title", "Notes").add_file("doc", &path);
    client.request("/upload", RequestMethod::PostMultipartFormData, None).unwrap();

    let sent = transport.last_request().unwrap();
    assert_eq!(
        sent.head.get("Content-Type"),
        Some("multipart/form-data; boundary=XBOUNDARYX")
    );
    let body = String::from_utf8(sent.body.unwrap()).unwrap();
    let expected = "--XBOUNDARYX\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nNotes\r\n\
                    --XBOUNDARYX\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"notes.txt\"\r\n\
                    Content-Type: text/plain\r\n\r\nline one\nline two\n\r\n\
                    --XBOUNDARYX--\r\n";
    assert_eq!(body, expected);
    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_attachment_fails_before_sending() {
    let (transport, mut client) = connected("example.com");
    client.arguments_mut().add_file("doc", "/nonexistent/webclient/missing.bin");
    let err = client
        .request("/upload", RequestMethod::PostMultipartFormData, None)
        .unwrap_err();
    assert!(matches!(err, WebError::Attachment { .. }));
    assert!(transport.requests().is_empty());
    assert_eq!(client.state(), ClientState::Connected);
}

#[test]
fn ftp_round_trip_in_both_modes() {
    let (transport, mut client) = connected("ftp://files.example.com");
    assert_eq!(client.protocol(), Some(Scheme::Ftp));

    let text = temp_file("readme.txt", b"a\nb\n");
    assert_eq!(client.put_file("/pub/readme.txt", &text, TransferMode::Ascii).unwrap(), 4);
    let copy = text.with_file_name("readme.copy");
    assert_eq!(client.get_file("/pub/readme.txt", &copy, TransferMode::Ascii).unwrap(), 4);
    assert_eq!(std::fs::read(&copy).unwrap(), b"a\nb\n");

    let blob: Vec<u8> = (0u8..=255).collect();
    client.put_bytes("ftp://files.example.com/bin/blob", &blob, TransferMode::Binary).unwrap();
    assert_eq!(transport.file("/bin/blob").unwrap(), blob);
    assert_eq!(client.get_bytes("/bin/blob", TransferMode::Binary).unwrap(), blob);

    assert_eq!(
        transport.transfers(),
        vec![
            ("/pub/readme.txt".to_string(), TransferMode::Ascii),
            ("/pub/readme.txt".to_string(), TransferMode::Ascii),
            ("/bin/blob".to_string(), TransferMode::Binary),
            ("/bin/blob".to_string(), TransferMode::Binary),
        ]
    );
    std::fs::remove_file(&text).ok();
    std::fs::remove_file(&copy).ok();
}

#[test]
fn failed_download_leaves_no_file() {
    let (_transport, mut client) = connected("ftp://files.example.com");
    let target = temp_file("absent.out", b"");
    let err = client.get_file("/no/such/file", &target, TransferMode::Binary).unwrap_err();
    assert!(err.to_string().contains("550"));
    assert!(!target.exists());
}

#[test]
fn state_errors() {
    let transport = MemoryTransport::new();
    let mut client = WebClient::new(Arc::new(transport.clone()));
    assert!(matches!(
        client.request("/", RequestMethod::Get, None),
        Err(WebError::NotConnected)
    ));

    client.connect("http://example.com").unwrap();
    assert!(matches!(client.connect("http://example.com"), Err(WebError::AlreadyConnected)));

    client.request("/", RequestMethod::Get, None).unwrap();
    assert!(matches!(
        client.request("/again", RequestMethod::Get, None),
        Err(WebError::ResponsePending)
    ));
    assert!(matches!(
        client.get_bytes("/file", TransferMode::Binary),
        Err(WebError::WrongProtocol { .. })
    ));
    client.close().unwrap();

    client.connect("ftp://files.example.com").unwrap();
    assert!(matches!(
        client.request("/", RequestMethod::Get, None),
        Err(WebError::WrongProtocol { actual: Scheme::Ftp, .. })
    ));
}

#[test]
fn close_releases_request_connection_session() {
    let (transport, mut client) = connected("example.com");
    assert_eq!(
        transport.events(),
        vec![
            HandleEvent::Opened(HandleKind::Session),
            HandleEvent::Opened(HandleKind::Connection),
        ]
    );
    client.request("/", RequestMethod::Get, None).unwrap();
    transport.clear_events();
    client.close().unwrap();
    assert_eq!(
        transport.events(),
        vec![
            HandleEvent::Closed(HandleKind::Request),
            HandleEvent::Closed(HandleKind::Connection),
            HandleEvent::Closed(HandleKind::Session),
        ]
    );
    assert_eq!(transport.open_handles(), 0);
    client.close().unwrap();
    assert_eq!(client.state(), ClientState::Closed);
}

#[test]
fn refused_connect_holds_no_handles() {
    let transport = MemoryTransport::new();
    transport.refuse_host("down.example.com");
    let mut client = WebClient::new(Arc::new(transport.clone()));
    let err = client.connect("http://down.example.com").unwrap_err();
    assert!(err.is_transport());
    assert!(!client.is_connected());
    assert_eq!(transport.open_handles(), 0);
    client.connect("http://up.example.com").unwrap();
    assert!(client.is_connected());
}

#[test]
fn dropping_the_client_releases_handles() {
    let transport = MemoryTransport::new();
    {
        let mut client = WebClient::new(Arc::new(transport.clone()));
        client.connect("example.com").unwrap();
        client.request("/", RequestMethod::Get, None).unwrap();
        assert_eq!(transport.open_handles(), 3);
    }
    assert_eq!(transport.open_handles(), 0);
}

#[test]
fn async_client_signals_completion_per_request() {
    let transport = MemoryTransport::new();
    transport.notify_completion(true);
    transport.route("/a", MemoryResponse::ok("A"));
    let mut client = AsyncWebClient::new(WebClient::new(Arc::new(transport)));
    client.connect("example.com").unwrap();

    client.request("/a", RequestMethod::Get, None).unwrap();
    assert!(client.wait_complete(Some(Duration::from_secs(5))));
    assert_eq!(client.response_bytes().unwrap(), b"A");

    client.request("/b", RequestMethod::Get, None).unwrap();
    assert!(client.wait_complete(None));
    assert_eq!(client.status_code(), Some(404));
    let plain = client.into_inner();
    assert!(plain.is_connected());
}

#[test]
fn external_thread_completes_a_silent_transport() {
    let mut client = AsyncWebClient::new(WebClient::new(Arc::new(MemoryTransport::new())));
    client.connect("example.com").unwrap();
    client.request("/", RequestMethod::Get, None).unwrap();
    assert!(!client.wait_complete(Some(Duration::from_millis(20))));

    let handle = client.completion_handle();
    std::thread::spawn(move || handle.set_complete()).join().unwrap();
    assert!(client.wait_complete(Some(Duration::from_secs(5))));
}

#[test]
fn wrapping_a_connected_client_still_signals_completion() {
    let transport = MemoryTransport::new();
    transport.notify_completion(true);
    transport.route("/a", MemoryResponse::ok("A"));
    let mut plain = WebClient::new(Arc::new(transport.clone()));
    plain.connect("example.com").unwrap();

    let mut client = AsyncWebClient::new(plain);
    client.request("/a", RequestMethod::Get, None).unwrap();
    assert!(client.wait_complete(Some(Duration::from_secs(5))));
    assert_eq!(client.response_bytes().unwrap(), b"A");

    // Unwrapped again, later completions go nowhere and nothing is left armed.
    let handle = client.completion_handle();
    let mut plain = client.into_inner();
    plain.request("/a", RequestMethod::Get, None).unwrap();
    assert!(!handle.set_complete());
}

#[test]
fn line_breaks_in_ftp_paths_are_rejected_before_sending() {
    let (transport, mut client) = connected("ftp://files.example.com");
    let err = client
        .put_bytes("/a\r\nDELE /important", b"x", TransferMode::Binary)
        .unwrap_err();
    assert!(matches!(err, WebError::InvalidHeader(_)));
    assert!(client.get_bytes("/a\nb", TransferMode::Binary).is_err());
    assert!(transport.transfers().is_empty());
    assert!(client.is_connected());
}

#[test]
fn header_injection_fails_before_sending() {
    let (transport, mut client) = connected("http://example.com");
    client.cookies_mut().add("sid", "1\r\nX-Admin: yes");
    let err = client.request("/", RequestMethod::Get, None).unwrap_err();
    assert!(matches!(err, WebError::InvalidHeader(_)));
    assert!(client
        .request("/", RequestMethod::Get, Some("http://a/\r\nX: y"))
        .is_err());
    assert!(transport.requests().is_empty());
    assert_eq!(client.state(), ClientState::Connected);
}

#[test]
fn query_carrying_a_url_keeps_the_whole_path() {
    let (transport, mut client) = connected("http://example.com");
    client.request("/login?next=http://other.example/home", RequestMethod::Get, None).unwrap();
    assert_eq!(transport.last_request().unwrap().head.path, "/login?next=http://other.example/home");
}

#[test]
fn unusable_fixed_boundary_fails_the_multipart_request() {
    let transport = MemoryTransport::new();
    let config = ClientConfig {
        boundary: BoundaryPolicy::Fixed("bad\r\nboundary".to_string()),
        ..ClientConfig::default()
    };
    let mut client = WebClient::with_config(Arc::new(transport.clone()), config);
    client.connect("http://upload.example.com").unwrap();
    client.arguments_mut().add("title", "Notes");
    let err = client
        .request("/upload", RequestMethod::PostMultipartFormData, None)
        .unwrap_err();
    assert!(matches!(err, WebError::InvalidHeader(_)));
    assert!(transport.requests().is_empty());
}
