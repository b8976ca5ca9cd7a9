//! Verify resolver, build, and parse behavior against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected results. Comparing parsed JSON (not raw strings) avoids
//! false negatives from field-ordering differences.

use api_core::{
    ApiClient, BaseUrlResolver, DomainSource, HostContext, HttpMethod, HttpResponse, QueryKey,
    Strategy, UnauthorizedBehavior,
};
use serde_json::Value;

const DOMAIN: &str = "api.example.com";

fn client() -> ApiClient {
    ApiClient::new(BaseUrlResolver::new(
        DomainSource::Fixed(Some(DOMAIN.to_string())),
        HostContext::Native,
    ))
}

fn parse_strategy(s: &str) -> Strategy {
    match s {
        "ConfiguredDomain" => Strategy::ConfiguredDomain,
        "BrowserOrigin" => Strategy::BrowserOrigin,
        "LocalFallback" => Strategy::LocalFallback,
        other => panic!("unknown strategy: {other}"),
    }
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Base URL
// ---------------------------------------------------------------------------

#[test]
fn base_url_test_vectors() {
    let raw = include_str!("../../test-vectors/base_url.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let domain = case["domain"].as_str().map(str::to_string);
        let host = match case["origin"].as_str() {
            Some(origin) => HostContext::Browser {
                origin: origin.to_string(),
            },
            None => HostContext::Native,
        };

        let resolver = BaseUrlResolver::new(DomainSource::Fixed(domain), host);
        let (url, strategy) = resolver.resolve_with_strategy();
        assert_eq!(url, case["expected"].as_str().unwrap(), "{name}: url");
        assert_eq!(
            strategy,
            parse_strategy(case["strategy"].as_str().unwrap()),
            "{name}: strategy"
        );
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/request.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let expected_req = &case["expected_request"];

        let method: HttpMethod = input["method"].as_str().unwrap().parse().unwrap();
        let payload = Some(&input["payload"]).filter(|p| !p.is_null());
        let headers: Vec<(String, String)> = input["headers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| {
                let arr = h.as_array().unwrap();
                (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
            })
            .collect();

        // Verify build
        let req = c
            .build_request(method, input["route"].as_str().unwrap(), payload, headers)
            .unwrap();
        assert_eq!(req.method.as_str(), expected_req["method"].as_str().unwrap(), "{name}: method");
        assert_eq!(req.url, expected_req["url"].as_str().unwrap(), "{name}: url");

        let expected_headers: Vec<(String, String)> =
            serde_json::from_value(expected_req["headers"].clone()).unwrap();
        assert_eq!(req.headers, expected_headers, "{name}: headers");

        match req.body.as_deref() {
            Some(body) => {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body, expected_req["body"], "{name}: body");
            }
            None => assert!(expected_req["body"].is_null(), "{name}: body should be None"),
        }

        // Verify check
        let result = c.check_response(simulated(case));
        match case.get("expected_error") {
            Some(expected) => {
                let err = result.unwrap_err();
                assert_eq!(err.to_string(), expected.as_str().unwrap(), "{name}: error");
            }
            None => assert!(result.is_ok(), "{name}: expected success"),
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn query_test_vectors() {
    let raw = include_str!("../../test-vectors/query.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let key: QueryKey = serde_json::from_value(case["key"].clone()).unwrap();
        let on401: UnauthorizedBehavior = serde_json::from_value(case["on401"].clone()).unwrap();

        // Verify build
        let req = c.build_query(&key).unwrap();
        assert_eq!(req.method, HttpMethod::Get, "{name}: method");
        assert_eq!(req.url, case["expected_url"].as_str().unwrap(), "{name}: url");
        assert!(req.body.is_none(), "{name}: body should be None");

        // Verify parse
        let result = c.parse_query::<Value>(simulated(case), on401);
        match case.get("expected_error") {
            Some(expected) => {
                let err = result.unwrap_err();
                assert_eq!(err.to_string(), expected.as_str().unwrap(), "{name}: error");
            }
            None => {
                let value = result.unwrap().unwrap_or(Value::Null);
                assert_eq!(value, case["expected_result"], "{name}: parsed result");
            }
        }
    }
}
