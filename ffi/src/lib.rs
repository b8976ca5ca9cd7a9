//! C-ABI wrapper around `api-core`.
//!
//! # Overview
//! Exposes base URL resolution, request building, and response checking
//! through `extern "C"` functions so a native mobile host can do the network
//! I/O with its own stack while sharing the URL and error rules with Rust
//! callers.
//!
//! # Design
//! - Panics are caught with `catch_unwind` at every entry point.
//! - Requests come back as `FfiHttpRequest`; responses go in as
//!   `FfiHttpResponse` and come back as a single `FfiApiResult` envelope.
//! - JSON (payloads, query keys, parsed results) crosses as UTF-8 text.
//! - Everything returned is owned by the caller until passed to the matching
//!   `api_free_*` function.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use api_core::{
    ApiClient, BaseUrlResolver, DomainSource, HostContext, HttpResponse, QueryKey,
    UnauthorizedBehavior,
};
use serde_json::Value;

use types::*;

/// Borrow a C string as `&str`. `None` for null or invalid UTF-8.
unsafe fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client that reads the domain from `PUBLIC_API_DOMAIN` on every
/// resolution.
///
/// `origin` is the page origin for web hosts; pass null on native hosts.
/// The caller must free the returned pointer with `api_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn api_client_new(origin: *const c_char) -> *mut FfiApiClient {
    catch_unwind(|| {
        let host = match unsafe { opt_str(origin) } {
            Some(origin) => HostContext::Browser {
                origin: origin.to_string(),
            },
            None => HostContext::Native,
        };
        let client = ApiClient::new(BaseUrlResolver::new(DomainSource::default(), host));
        Box::into_raw(Box::new(FfiApiClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Pin the domain instead of reading the environment. Passing null returns
/// to reading `PUBLIC_API_DOMAIN`. Returns false if `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn api_client_set_domain(client: *mut FfiApiClient, domain: *const c_char) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return false;
        }
        let client = unsafe { &mut *client };
        let source = match unsafe { opt_str(domain) } {
            Some(domain) => DomainSource::Fixed(Some(domain.to_string())),
            None => DomainSource::default(),
        };
        let resolver = client.inner.resolver().clone().with_domain_source(source);
        client.inner = ApiClient::new(resolver);
        true
    }))
    .unwrap_or(false)
}

/// Free a client created by `api_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn api_client_free(client: *mut FfiApiClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

/// Current base URL, always ending in `/`. Free with `api_free_string`.
///
/// Returns null if `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn api_resolve_base_url(client: *const FfiApiClient) -> *mut c_char {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        c_string(client.inner.base_url())
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Store `failure` in `error` when the caller asked for it, otherwise free it.
/// Always returns null so builders can `return fail(...)`.
fn fail(error: *mut *mut FfiApiResult, failure: *mut FfiApiResult) -> *mut FfiHttpRequest {
    if error.is_null() {
        api_free_result(failure);
    } else {
        unsafe { *error = failure };
    }
    std::ptr::null_mut()
}

/// Build a credentialed request for `route`.
///
/// `json_body` is optional JSON text; when given it is re-serialized and
/// `Content-Type: application/json` is set. `headers` (may be null when
/// `headers_len` is 0) are applied after and replace a same-named default.
///
/// Returns null on failure. When `error` is non-null it then receives an
/// `FfiApiResult` describing why (free it with `api_free_result`); it is left
/// untouched on success.
#[unsafe(no_mangle)]
pub extern "C" fn api_build_request(
    client: *const FfiApiClient,
    method: FfiHttpMethod,
    route: *const c_char,
    json_body: *const c_char,
    headers: *const FfiHeader,
    headers_len: u32,
    error: *mut *mut FfiApiResult,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return fail(error, FfiApiResult::null_arg("client"));
        }
        if route.is_null() {
            return fail(error, FfiApiResult::null_arg("route"));
        }
        let client = unsafe { &*client };
        let Some(route) = (unsafe { opt_str(route) }) else {
            return fail(error, FfiApiResult::invalid_arg("route is not valid UTF-8"));
        };

        let payload: Option<Value> = match unsafe { opt_str(json_body) } {
            Some(text) => match serde_json::from_str(text) {
                Ok(value) => Some(value),
                Err(e) => {
                    return fail(error, FfiApiResult::invalid_arg(format!("json_body: {e}")));
                }
            },
            None => None,
        };

        let extra: Vec<(String, String)> = if headers.is_null() || headers_len == 0 {
            Vec::new()
        } else {
            let slice = unsafe { std::slice::from_raw_parts(headers, headers_len as usize) };
            slice
                .iter()
                .filter_map(|h| {
                    let key = unsafe { opt_str(h.key) }?;
                    let value = unsafe { opt_str(h.value) }?;
                    Some((key.to_string(), value.to_string()))
                })
                .collect()
        };

        match client
            .inner
            .build_request(method.into(), route, payload.as_ref(), extra)
        {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(e) => fail(error, FfiApiResult::from_error(e)),
        }
    })
    .unwrap_or_else(|_| fail(error, FfiApiResult::panic("panic in api_build_request")))
}

/// Build the `GET` the default query function sends for a query key given as
/// JSON array text, e.g. `["/users", {"id": 5}]`. Only the first element
/// reaches the URL.
///
/// Returns null on failure, reporting through `error` like
/// `api_build_request`: `InvalidArgument` when the text is not a JSON array,
/// `InvalidQueryKey` when its first element is not a string.
#[unsafe(no_mangle)]
pub extern "C" fn api_build_query(
    client: *const FfiApiClient,
    query_key_json: *const c_char,
    error: *mut *mut FfiApiResult,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return fail(error, FfiApiResult::null_arg("client"));
        }
        if query_key_json.is_null() {
            return fail(error, FfiApiResult::null_arg("query_key_json"));
        }
        let client = unsafe { &*client };
        let Some(text) = (unsafe { opt_str(query_key_json) }) else {
            return fail(error, FfiApiResult::invalid_arg("query key is not valid UTF-8"));
        };
        let key: QueryKey = match serde_json::from_str(text) {
            Ok(key) => key,
            Err(e) => {
                return fail(error, FfiApiResult::invalid_arg(format!("query key: {e}")));
            }
        };
        match client.inner.build_query(&key) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(e) => fail(error, FfiApiResult::from_error(e)),
        }
    })
    .unwrap_or_else(|_| fail(error, FfiApiResult::panic("panic in api_build_query")))
}

// ---------------------------------------------------------------------------
// Response functions
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`. A null body is an
/// empty body; invalid UTF-8 is replaced with U+FFFD.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(resp.body) }.to_string_lossy().into_owned()
    };
    HttpResponse {
        status: resp.status,
        headers: Vec::new(),
        body,
    }
}

/// Check a response from any request built by `api_build_request`.
///
/// On success `data` is the response body. On a non-2xx status the result
/// carries `Http`, the status, and `"<status>: <text>"`.
#[unsafe(no_mangle)]
pub extern "C" fn api_check_response(
    client: *const FfiApiClient,
    response: *const FfiHttpResponse,
) -> *mut FfiApiResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiApiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiApiResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client.inner.check_response(ffi_response_to_core(resp)) {
            Ok(resp) => FfiApiResult::ok_data(resp.body),
            Err(e) => FfiApiResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiApiResult::panic("panic in api_check_response"))
}

/// Interpret a response to a request built by `api_build_query`.
///
/// On success `data` is the parsed JSON re-encoded as text. A 401 under
/// `ReturnNull` succeeds with `is_null` set and `data` null.
#[unsafe(no_mangle)]
pub extern "C" fn api_parse_query(
    client: *const FfiApiClient,
    response: *const FfiHttpResponse,
    on401: FfiUnauthorizedBehavior,
) -> *mut FfiApiResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiApiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiApiResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        match client
            .inner
            .parse_query::<Value>(ffi_response_to_core(resp), on401.into())
        {
            Ok(Some(value)) => FfiApiResult::ok_data(value.to_string()),
            Ok(None) => FfiApiResult::ok_null(),
            Err(e) => FfiApiResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiApiResult::panic("panic in api_parse_query"))
}

/// Parse a 401 policy name (`"returnNull"` or `"throw"`). Unknown or null
/// names map to `Throw`.
#[unsafe(no_mangle)]
pub extern "C" fn api_unauthorized_behavior(name: *const c_char) -> FfiUnauthorizedBehavior {
    catch_unwind(|| match unsafe { opt_str(name) }.map(str::parse::<UnauthorizedBehavior>) {
        Some(Ok(UnauthorizedBehavior::ReturnNull)) => FfiUnauthorizedBehavior::ReturnNull,
        _ => FfiUnauthorizedBehavior::Throw,
    })
    .unwrap_or(FfiUnauthorizedBehavior::Throw)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `api_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn api_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        if !req.url.is_null() {
            drop(unsafe { CString::from_raw(req.url) });
        }
        if !req.body.is_null() {
            drop(unsafe { CString::from_raw(req.body) });
        }
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                if !h.key.is_null() {
                    drop(unsafe { CString::from_raw(h.key) });
                }
                if !h.value.is_null() {
                    drop(unsafe { CString::from_raw(h.value) });
                }
            }
        }
    });
}

/// Free an `FfiApiResult` returned by `api_check_response` or
/// `api_parse_query`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn api_free_result(result: *mut FfiApiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.data.is_null() {
            drop(unsafe { CString::from_raw(result.data) });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn api_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
