//! C layouts of the `api-core` request, response and result values.
//!
//! Strings are owned `*mut c_char` and header lists are a pointer plus a
//! length. Parsed JSON crosses as text for the host's own decoder.

use std::ffi::CString;
use std::os::raw::c_char;

use api_core::{ApiError, HttpMethod, UnauthorizedBehavior};

/// Opaque handle to an `ApiClient`. C callers receive a pointer to this
/// back into every `api_*` call that needs a client.
pub struct FfiApiClient {
    pub(crate) inner: api_core::ApiClient,
}

/// Convert a Rust string into an owned C string. Interior NULs are dropped
/// rather than failing the whole call.
pub(crate) fn c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', "") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request method with stable discriminants.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
    Head = 5,
    Options = 6,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Patch => FfiHttpMethod::Patch,
            HttpMethod::Delete => FfiHttpMethod::Delete,
            HttpMethod::Head => FfiHttpMethod::Head,
            HttpMethod::Options => FfiHttpMethod::Options,
        }
    }
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Patch => HttpMethod::Patch,
            FfiHttpMethod::Delete => HttpMethod::Delete,
            FfiHttpMethod::Head => HttpMethod::Head,
            FfiHttpMethod::Options => HttpMethod::Options,
        }
    }
}

/// One header name and value, both owned by this library.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// Request the host should send.
///
/// Built by `api_build_*` functions. The host executes the request with
/// cookies enabled when `include_credentials` is set, and passes the response
/// back through `api_check_response` or `api_parse_query`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
    pub include_credentials: bool,
}

impl FfiHttpRequest {
    /// Move a core request onto the heap. Freed by `api_free_request`.
    pub(crate) fn from_core(req: api_core::HttpRequest) -> *mut Self {
        let url = c_string(req.url);
        let body = match req.body {
            Some(b) => c_string(b),
            None => std::ptr::null_mut(),
        };

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: c_string(k),
                    value: c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        let ffi_req = Box::new(FfiHttpRequest {
            method: req.method.into(),
            url,
            headers,
            headers_len,
            body,
            include_credentials: req.credentials == api_core::Credentials::Include,
        });
        Box::into_raw(ffi_req)
    }
}

/// 401 policy for `api_parse_query`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiUnauthorizedBehavior {
    ReturnNull = 0,
    Throw = 1,
}

impl From<FfiUnauthorizedBehavior> for UnauthorizedBehavior {
    fn from(b: FfiUnauthorizedBehavior) -> Self {
        match b {
            FfiUnauthorizedBehavior::ReturnNull => UnauthorizedBehavior::ReturnNull,
            FfiUnauthorizedBehavior::Throw => UnauthorizedBehavior::Throw,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses (owned by the host)
// ---------------------------------------------------------------------------

/// What the host received: status and body text.
///
/// The host constructs this on the stack after executing a request, then
/// passes a pointer to `api_check_response` or `api_parse_query`. The FFI
/// layer reads but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiApiResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Http = 1,
    Transport = 2,
    Serialization = 3,
    Deserialization = 4,
    InvalidUrl = 5,
    InvalidQueryKey = 6,
    InvalidArgument = 7,
    Panic = 8,
    NullArg = 9,
}

/// Result envelope for `api_check_response` and `api_parse_query`.
///
/// On success `error_code` is `Ok` and `error_message` is null. `data` holds
/// the response body (check) or the parsed JSON re-encoded as text (query);
/// for a 401 tolerated under `returnNull`, `data` is null and `is_null` is set.
/// On failure `error_message` is `"<status>: <text>"` for HTTP errors and a
/// description otherwise; `http_status` is the status when one exists.
#[repr(C)]
pub struct FfiApiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data: *mut c_char,
    pub is_null: bool,
}

impl FfiApiResult {
    fn boxed(self) -> *mut Self {
        Box::into_raw(Box::new(self))
    }

    /// Build a success result carrying `data` as text.
    pub(crate) fn ok_data(data: String) -> *mut Self {
        FfiApiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            data: c_string(data),
            is_null: false,
        }
        .boxed()
    }

    /// Build a success result with no data (401 under `returnNull`).
    pub(crate) fn ok_null() -> *mut Self {
        FfiApiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            data: std::ptr::null_mut(),
            is_null: true,
        }
        .boxed()
    }

    /// Failure envelope carrying the error text and any HTTP status.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let error_code = match &err {
            ApiError::Http { .. } => FfiErrorCode::Http,
            ApiError::Transport(_) => FfiErrorCode::Transport,
            ApiError::Serialization(_) => FfiErrorCode::Serialization,
            ApiError::Deserialization(_) => FfiErrorCode::Deserialization,
            ApiError::InvalidUrl(_) => FfiErrorCode::InvalidUrl,
            ApiError::InvalidQueryKey(_) => FfiErrorCode::InvalidQueryKey,
            ApiError::Config(_) | ApiError::InvalidMethod(_) => FfiErrorCode::InvalidArgument,
        };
        FfiApiResult {
            error_code,
            http_status: err.status().unwrap_or(0),
            error_message: c_string(err.to_string()),
            data: std::ptr::null_mut(),
            is_null: false,
        }
        .boxed()
    }

    /// Failure for a required pointer that was null.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, format!("null argument: {name}"))
    }

    /// Failure for an argument that is present but unusable.
    pub(crate) fn invalid_arg(msg: impl Into<String>) -> *mut Self {
        Self::failure(FfiErrorCode::InvalidArgument, msg.into())
    }

    /// Failure for a panic caught at the boundary.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg.to_string())
    }

    fn failure(error_code: FfiErrorCode, msg: String) -> *mut Self {
        FfiApiResult {
            error_code,
            error_message: c_string(msg),
            http_status: 0,
            data: std::ptr::null_mut(),
            is_null: false,
        }
        .boxed()
    }
}
