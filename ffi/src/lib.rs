/*
 * lib.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Webclient, an HTTP and FTP client library.
 *
 * Webclient is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Webclient is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Webclient.  If not, see <http://www.gnu.org/licenses/>.
 */

//! C FFI for webclient core. A client is an opaque pointer from webclient_new or
//! webclient_async_new, released with webclient_free. All string parameters are UTF-8
//! NUL-terminated; strings returned to the caller are freed with webclient_free_string.
//! Functions returning c_int use 0 for success and a negative WEBCLIENT_ERR_* code on
//! failure, with the message available from webclient_last_error on the same thread.

use libc::{c_char, c_int, size_t, ssize_t};
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use webclient_core::{
    AsyncWebClient, ConnectOptions, NetTransport, RequestMethod, Scheme, TransferMode, Transport,
    WebClient, WebError,
};

pub const WEBCLIENT_OK: c_int = 0;
/// NULL client or string, invalid UTF-8, or an out-of-range enum value.
pub const WEBCLIENT_ERR_ARGUMENT: c_int = -1;
pub const WEBCLIENT_ERR_INVALID_URL: c_int = -2;
/// Call not valid in the client's current state (not connected, response pending, wrong protocol).
pub const WEBCLIENT_ERR_STATE: c_int = -3;
pub const WEBCLIENT_ERR_ATTACHMENT: c_int = -4;
/// Network or server failure.
pub const WEBCLIENT_ERR_TRANSPORT: c_int = -5;
pub const WEBCLIENT_ERR_CONFIG: c_int = -6;
/// Operation needs a client created with webclient_async_new.
pub const WEBCLIENT_ERR_NOT_ASYNC: c_int = -7;

pub const WEBCLIENT_METHOD_GET: c_int = 0;
pub const WEBCLIENT_METHOD_POST: c_int = 1;
pub const WEBCLIENT_METHOD_POST_MULTIPART: c_int = 2;

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = std::cell::RefCell::new(None);
}

fn set_last_error(msg: &str) {
    let msg = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn error_code(err: &WebError) -> c_int {
    match err {
        WebError::InvalidUrl(_) => WEBCLIENT_ERR_INVALID_URL,
        WebError::InvalidHeader(_) => WEBCLIENT_ERR_ARGUMENT,
        WebError::AlreadyConnected
        | WebError::NotConnected
        | WebError::NoResponse
        | WebError::ResponsePending
        | WebError::WrongProtocol { .. } => WEBCLIENT_ERR_STATE,
        WebError::Attachment { .. } => WEBCLIENT_ERR_ATTACHMENT,
        WebError::LengthMismatch { .. } | WebError::Protocol(_) | WebError::Transport(_) => {
            WEBCLIENT_ERR_TRANSPORT
        }
        WebError::Config(_) => WEBCLIENT_ERR_CONFIG,
    }
}

/// Record `err` as the thread's last error and return its code.
fn fail(err: WebError) -> c_int {
    set_last_error(&err.to_string());
    error_code(&err)
}

fn fail_argument(msg: &str) -> c_int {
    set_last_error(msg);
    WEBCLIENT_ERR_ARGUMENT
}

fn status(result: webclient_core::Result<()>) -> c_int {
    match result {
        Ok(()) => {
            clear_last_error();
            WEBCLIENT_OK
        }
        Err(e) => fail(e),
    }
}

/// One network transport (and its runtime) shared by every client.
fn shared_transport() -> Result<Arc<dyn Transport>, WebError> {
    static NET: OnceCell<Arc<NetTransport>> = OnceCell::new();
    let net = NET.get_or_try_init(|| NetTransport::new().map(Arc::new))?;
    Ok(net.clone() as Arc<dyn Transport>)
}

/// Opaque client handle.
pub enum WebclientClient {
    Sync(WebClient),
    Async(AsyncWebClient),
}

impl WebclientClient {
    fn client(&self) -> &WebClient {
        match self {
            WebclientClient::Sync(c) => c,
            WebclientClient::Async(c) => &**c,
        }
    }

    fn client_mut(&mut self) -> &mut WebClient {
        match self {
            WebclientClient::Sync(c) => c,
            WebclientClient::Async(c) => &mut **c,
        }
    }
}

unsafe fn opt_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, c_int> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(Some)
        .map_err(|_| fail_argument("string is not valid UTF-8"))
}

unsafe fn req_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, c_int> {
    match opt_str(ptr)? {
        Some(s) => Ok(s),
        None => Err(fail_argument(&format!("{} is NULL", what))),
    }
}

unsafe fn client_ref<'a>(client: *const WebclientClient) -> Result<&'a WebclientClient, c_int> {
    client.as_ref().ok_or_else(|| fail_argument("client is NULL"))
}

unsafe fn client_mut<'a>(client: *mut WebclientClient) -> Result<&'a mut WebclientClient, c_int> {
    client.as_mut().ok_or_else(|| fail_argument("client is NULL"))
}

fn into_c_string(s: &str) -> *mut c_char {
    CString::new(s.replace('\0', " "))
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Unwrap a Result<T, c_int> or return the code.
macro_rules! try_ffi {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(code) => return code,
        }
    };
}

fn new_client(make: impl FnOnce(WebClient) -> WebclientClient) -> *mut WebclientClient {
    match shared_transport() {
        Ok(transport) => {
            clear_last_error();
            Box::into_raw(Box::new(make(WebClient::new(transport))))
        }
        Err(e) => {
            fail(e);
            ptr::null_mut()
        }
    }
}

/// Create a synchronous client. Returns NULL on error.
#[no_mangle]
pub extern "C" fn webclient_new() -> *mut WebclientClient {
    new_client(WebclientClient::Sync)
}

/// Create a client whose requests arm a completion signal (see webclient_wait_complete).
#[no_mangle]
pub extern "C" fn webclient_async_new() -> *mut WebclientClient {
    new_client(|c| WebclientClient::Async(AsyncWebClient::new(c)))
}

/// Close and free a client. No-op if client is NULL.
#[no_mangle]
pub unsafe extern "C" fn webclient_free(client: *mut WebclientClient) {
    if !client.is_null() {
        drop(Box::from_raw(client));
    }
}

/// Connect. address is a URL or host name. port 0 keeps the port implied by the address.
/// scheme ("http", "https", "ftp"), user, password and agent may be NULL.
#[no_mangle]
pub unsafe extern "C" fn webclient_connect(
    client: *mut WebclientClient,
    address: *const c_char,
    port: c_int,
    scheme: *const c_char,
    user: *const c_char,
    password: *const c_char,
    agent: *const c_char,
) -> c_int {
    let client = try_ffi!(client_mut(client));
    let mut options = ConnectOptions::new(try_ffi!(req_str(address, "address")));
    if port != 0 {
        match u16::try_from(port) {
            Ok(p) => options.port = Some(p),
            Err(_) => return fail_argument("port out of range"),
        }
    }
    if let Some(s) = try_ffi!(opt_str(scheme)) {
        match s.parse::<Scheme>() {
            Ok(s) => options.scheme = Some(s),
            Err(()) => return fail_argument("unknown scheme"),
        }
    }
    options.user = try_ffi!(opt_str(user)).map(String::from);
    options.password = try_ffi!(opt_str(password)).map(String::from);
    options.agent = try_ffi!(opt_str(agent)).map(String::from);
    status(client.client_mut().connect_with(options))
}

/// Send a request. method is one of WEBCLIENT_METHOD_*; referrer may be NULL.
#[no_mangle]
pub unsafe extern "C" fn webclient_request(
    client: *mut WebclientClient,
    uri: *const c_char,
    method: c_int,
    referrer: *const c_char,
) -> c_int {
    let client = try_ffi!(client_mut(client));
    let uri = try_ffi!(req_str(uri, "uri"));
    let referrer = try_ffi!(opt_str(referrer));
    let method = match method {
        WEBCLIENT_METHOD_GET => RequestMethod::Get,
        WEBCLIENT_METHOD_POST => RequestMethod::Post,
        WEBCLIENT_METHOD_POST_MULTIPART => RequestMethod::PostMultipartFormData,
        _ => return fail_argument("unknown request method"),
    };
    status(match client {
        WebclientClient::Sync(c) => c.request(uri, method, referrer),
        WebclientClient::Async(c) => c.request(uri, method, referrer),
    })
}

/// Read up to len body bytes into buf. Returns the count, 0 at end of body, or a negative code.
#[no_mangle]
pub unsafe extern "C" fn webclient_response(client: *mut WebclientClient, buf: *mut u8, len: size_t) -> ssize_t {
    let client = match client_mut(client) {
        Ok(c) => c,
        Err(code) => return code as ssize_t,
    };
    if buf.is_null() && len > 0 {
        return fail_argument("buffer is NULL") as ssize_t;
    }
    let out: &mut [u8] = if len == 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(buf, len)
    };
    let result = match client {
        WebclientClient::Sync(c) => c.response(out),
        WebclientClient::Async(c) => c.response(out),
    };
    match result {
        Ok(n) => {
            clear_last_error();
            n as ssize_t
        }
        Err(e) => fail(e) as ssize_t,
    }
}

/// Release all handles of the client. May be called repeatedly.
#[no_mangle]
pub unsafe extern "C" fn webclient_close(client: *mut WebclientClient) -> c_int {
    let client = try_ffi!(client_mut(client));
    status(client.client_mut().close())
}

/// HTTP status of the last response, or a negative code when there is none.
#[no_mangle]
pub unsafe extern "C" fn webclient_query_status(client: *const WebclientClient) -> c_int {
    let client = try_ffi!(client_ref(client));
    match client.client().status_code() {
        Some(code) => c_int::from(code),
        None => fail(WebError::NoResponse),
    }
}

/// Content-Type of the last response (free with webclient_free_string), or NULL.
#[no_mangle]
pub unsafe extern "C" fn webclient_query_content_type(client: *const WebclientClient) -> *mut c_char {
    match client_ref(client) {
        Ok(c) => c.client().content_type().map(into_c_string).unwrap_or(ptr::null_mut()),
        Err(_) => ptr::null_mut(),
    }
}

/// Declared Content-Length of the last response, or -1 when unknown.
#[no_mangle]
pub unsafe extern "C" fn webclient_query_content_length(client: *const WebclientClient) -> i64 {
    match client_ref(client) {
        Ok(c) => c
            .client()
            .content_length()
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(-1),
        Err(_) => -1,
    }
}

/// index-th cookie set by the last response. On success *out_name and *out_value receive
/// strings to free with webclient_free_string.
#[no_mangle]
pub unsafe extern "C" fn webclient_query_cookie(
    client: *const WebclientClient,
    index: size_t,
    out_name: *mut *mut c_char,
    out_value: *mut *mut c_char,
) -> c_int {
    let client = try_ffi!(client_ref(client));
    if out_name.is_null() || out_value.is_null() {
        return fail_argument("output pointer is NULL");
    }
    match client.client().cookie(index) {
        Some(cookie) => {
            *out_name = into_c_string(&cookie.name);
            *out_value = into_c_string(&cookie.value);
            clear_last_error();
            WEBCLIENT_OK
        }
        None => fail_argument("no cookie at that index"),
    }
}

/// Status line and headers of the last response (free with webclient_free_string), or NULL.
#[no_mangle]
pub unsafe extern "C" fn webclient_query_raw_header(client: *const WebclientClient) -> *mut c_char {
    match client_ref(client) {
        Ok(c) => c
            .client()
            .raw_header()
            .map(|raw| into_c_string(&String::from_utf8_lossy(raw)))
            .unwrap_or(ptr::null_mut()),
        Err(_) => ptr::null_mut(),
    }
}

/// FTP download of uri to local_path. ascii non-zero selects TYPE A.
#[no_mangle]
pub unsafe extern "C" fn webclient_get_file(
    client: *mut WebclientClient,
    uri: *const c_char,
    local_path: *const c_char,
    ascii: c_int,
) -> c_int {
    let client = try_ffi!(client_mut(client));
    let uri = try_ffi!(req_str(uri, "uri"));
    let local_path = try_ffi!(req_str(local_path, "local_path"));
    let mode = TransferMode::from_ascii_flag(ascii != 0);
    status(client.client_mut().get_file(uri, local_path, mode).map(|_| ()))
}

/// FTP upload of local_path to uri. ascii non-zero selects TYPE A.
#[no_mangle]
pub unsafe extern "C" fn webclient_put_file(
    client: *mut WebclientClient,
    uri: *const c_char,
    local_path: *const c_char,
    ascii: c_int,
) -> c_int {
    let client = try_ffi!(client_mut(client));
    let uri = try_ffi!(req_str(uri, "uri"));
    let local_path = try_ffi!(req_str(local_path, "local_path"));
    let mode = TransferMode::from_ascii_flag(ascii != 0);
    status(client.client_mut().put_file(uri, local_path, mode).map(|_| ()))
}

unsafe fn add_argument(
    client: *mut WebclientClient,
    name: *const c_char,
    add: impl FnOnce(&mut WebClient, &str),
) -> c_int {
    let client = try_ffi!(client_mut(client));
    let name = try_ffi!(req_str(name, "name"));
    add(client.client_mut(), name);
    clear_last_error();
    WEBCLIENT_OK
}

#[no_mangle]
pub unsafe extern "C" fn webclient_add_argument_string(
    client: *mut WebclientClient,
    name: *const c_char,
    value: *const c_char,
) -> c_int {
    let value = try_ffi!(req_str(value, "value"));
    add_argument(client, name, |c, n| {
        c.arguments_mut().add(n, value);
    })
}

#[no_mangle]
pub unsafe extern "C" fn webclient_add_argument_int(client: *mut WebclientClient, name: *const c_char, value: i32) -> c_int {
    add_argument(client, name, |c, n| {
        c.arguments_mut().add(n, value);
    })
}

#[no_mangle]
pub unsafe extern "C" fn webclient_add_argument_long(client: *mut WebclientClient, name: *const c_char, value: i64) -> c_int {
    add_argument(client, name, |c, n| {
        c.arguments_mut().add(n, value);
    })
}

#[no_mangle]
pub unsafe extern "C" fn webclient_add_argument_float(client: *mut WebclientClient, name: *const c_char, value: f32) -> c_int {
    add_argument(client, name, |c, n| {
        c.arguments_mut().add(n, value);
    })
}

#[no_mangle]
pub unsafe extern "C" fn webclient_add_argument_double(client: *mut WebclientClient, name: *const c_char, value: f64) -> c_int {
    add_argument(client, name, |c, n| {
        c.arguments_mut().add(n, value);
    })
}

/// Attach the file at path (sent by WEBCLIENT_METHOD_POST_MULTIPART).
#[no_mangle]
pub unsafe extern "C" fn webclient_add_argument_file(
    client: *mut WebclientClient,
    name: *const c_char,
    path: *const c_char,
) -> c_int {
    let path = try_ffi!(req_str(path, "path"));
    add_argument(client, name, |c, n| {
        c.arguments_mut().add_file(n, path);
    })
}

#[no_mangle]
pub unsafe extern "C" fn webclient_reset_arguments(client: *mut WebclientClient) -> c_int {
    let client = try_ffi!(client_mut(client));
    client.client_mut().reset_arguments();
    WEBCLIENT_OK
}

#[no_mangle]
pub unsafe extern "C" fn webclient_add_cookie(
    client: *mut WebclientClient,
    name: *const c_char,
    value: *const c_char,
) -> c_int {
    let value = try_ffi!(req_str(value, "value"));
    add_argument(client, name, |c, n| {
        c.cookies_mut().add(n, value);
    })
}

#[no_mangle]
pub unsafe extern "C" fn webclient_reset_cookies(client: *mut WebclientClient) -> c_int {
    let client = try_ffi!(client_mut(client));
    client.client_mut().reset_cookies();
    WEBCLIENT_OK
}

/// Fire the completion signal. Returns 1 if it fired, 0 if none was armed or it already fired.
#[no_mangle]
pub unsafe extern "C" fn webclient_set_complete(client: *const WebclientClient) -> c_int {
    match try_ffi!(client_ref(client)) {
        WebclientClient::Async(c) => c_int::from(c.set_complete()),
        WebclientClient::Sync(_) => fail_argument_code("client is not asynchronous", WEBCLIENT_ERR_NOT_ASYNC),
    }
}

/// Wait for the completion signal. timeout_ms < 0 waits without limit. Returns 1 when
/// signaled, 0 on timeout or when no signal is armed.
#[no_mangle]
pub unsafe extern "C" fn webclient_wait_complete(client: *const WebclientClient, timeout_ms: i64) -> c_int {
    match try_ffi!(client_ref(client)) {
        WebclientClient::Async(c) => {
            let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
            c_int::from(c.wait_complete(timeout))
        }
        WebclientClient::Sync(_) => fail_argument_code("client is not asynchronous", WEBCLIENT_ERR_NOT_ASYNC),
    }
}

fn fail_argument_code(msg: &str, code: c_int) -> c_int {
    set_last_error(msg);
    code
}

/// Message for the last failed call on this thread, or NULL. Valid until the next call.
#[no_mangle]
pub extern "C" fn webclient_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null()))
}

/// Free a string returned by this library. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn webclient_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}
