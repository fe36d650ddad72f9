//! Integration tests for the model HTTP client using wiremock
//!
//! These tests verify request encoding, response decoding against registry
//! models, and handling of error status codes and empty bodies.

use cloudmodels::model::{build, get_registry, Diagnostic, FieldValue, RecordingSink};
use cloudmodels::transport::{format_api_error, ModelClient};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod model_client_tests {
    use super::*;

    /// GET decodes through polymorphic dispatch
    #[tokio::test]
    async fn test_get_decodes_concrete_subtype() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/20210930/webAppFirewallPolicies/p1/rules/r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "REQUEST_RATE_LIMITING",
                "name": "burst",
                "actionName": "throttle",
                "configurations": [{"periodInSeconds": 10, "requestsLimit": 50}]
            })))
            .mount(&server)
            .await;

        let client = ModelClient::new(&format!("{}/20210930", server.uri()), get_registry()).unwrap();
        let rule = client
            .get("webAppFirewallPolicies/p1/rules/r1", "WebAppFirewallPolicyRule")
            .await
            .expect("Request should succeed");

        assert_eq!(rule.model(), "RequestRateLimitingRule");
        let configs = rule.get("configurations").and_then(FieldValue::as_array).unwrap();
        assert_eq!(
            configs[0].as_instance().unwrap().get("requests_limit"),
            Some(&FieldValue::Integer(50))
        );
    }

    /// Query parameters are URL-encoded
    #[tokio::test]
    async fn test_get_with_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/logGroups/g1"))
            .and(query_param("compartmentId", "ocid1.compartment.oc1..aaa"))
            .and(query_param("displayName", "app logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "g1",
                "compartmentId": "ocid1.compartment.oc1..aaa",
                "displayName": "app logs",
                "lifecycleState": "ACTIVE"
            })))
            .mount(&server)
            .await;

        let client = ModelClient::new(&server.uri(), get_registry()).unwrap();
        let group = client
            .get_with_query(
                "/logGroups/g1",
                &[("compartmentId", "ocid1.compartment.oc1..aaa"), ("displayName", "app logs")],
                "LogGroup",
            )
            .await
            .unwrap();

        assert_eq!(group.get("lifecycle_state"), Some(&FieldValue::from("ACTIVE")));
    }

    /// Enum fallbacks in responses reach the injected sink
    #[tokio::test]
    async fn test_response_diagnostics() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vcns/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "v1",
                "compartmentId": "c",
                "cidrBlocks": ["10.0.0.0/16"],
                "lifecycleState": "MIGRATING"
            })))
            .mount(&server)
            .await;

        let sink = RecordingSink::new();
        let client = ModelClient::new(&server.uri(), get_registry()).unwrap().with_sink(&sink);
        let vcn = client.get("/vcns/v1", "Vcn").await.unwrap();

        assert_eq!(vcn.get("lifecycle_state"), Some(&FieldValue::from("UNKNOWN_ENUM_VALUE")));
        assert!(matches!(
            sink.take().as_slice(),
            [Diagnostic::UnknownEnumValue { path, .. }] if path == "$.lifecycleState"
        ));
    }

    /// POST sends the wire-format body and decodes the response
    #[tokio::test]
    async fn test_post_encodes_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/vcns"))
            .and(body_json(json!({
                "compartmentId": "ocid1.compartment",
                "cidrBlocks": ["10.0.0.0/16"],
                "displayName": "prod"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ocid1.vcn",
                "compartmentId": "ocid1.compartment",
                "cidrBlocks": ["10.0.0.0/16"],
                "displayName": "prod",
                "lifecycleState": "PROVISIONING"
            })))
            .mount(&server)
            .await;

        let details = build(
            "CreateVcnDetails",
            &json!({"compartment_id": "ocid1.compartment", "cidr_blocks": ["10.0.0.0/16"], "displayName": "prod"}),
        )
        .unwrap();

        let client = ModelClient::new(&server.uri(), get_registry()).unwrap();
        let vcn = client
            .post("/vcns", &details, Some("Vcn"))
            .await
            .unwrap()
            .expect("Response should decode");

        assert_eq!(vcn.model(), "Vcn");
        assert_eq!(vcn.get("id"), Some(&FieldValue::from("ocid1.vcn")));
    }

    /// Explicit nulls in update bodies are sent as null
    #[tokio::test]
    async fn test_put_sends_explicit_null() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/logGroups/g1"))
            .and(body_json(json!({"displayName": "renamed", "description": null})))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut update = build("UpdateLogGroupDetails", &json!({"display_name": "renamed"})).unwrap();
        update.clear("description");

        let client = ModelClient::new(&server.uri(), get_registry()).unwrap();
        let response = client
            .put("/logGroups/g1", &update, Some("LogGroup"))
            .await
            .unwrap();
        assert!(response.is_none());
    }

    /// Test DELETE request
    #[tokio::test]
    async fn test_delete_request() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/logGroups/g1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = ModelClient::new(&server.uri(), get_registry()).unwrap();
        client.delete("/logGroups/g1").await.unwrap();
    }

    /// Test 404 response maps to a friendly message
    #[tokio::test]
    async fn test_404_returns_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/logGroups/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "NotAuthorizedOrNotFound",
                "message": "Authorization failed or requested resource not found."
            })))
            .mount(&server)
            .await;

        let client = ModelClient::new(&server.uri(), get_registry()).unwrap();
        let err = client.get("/logGroups/missing", "LogGroup").await.unwrap_err();

        assert!(err.to_string().contains("404"));
        assert_eq!(format_api_error(&err), "Resource not found.");
    }

    /// Test rate limit response
    #[tokio::test]
    async fn test_rate_limit_429() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vcns/v1"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = ModelClient::new(&server.uri(), get_registry()).unwrap();
        let err = client.get("/vcns/v1", "Vcn").await.unwrap_err();
        assert_eq!(format_api_error(&err), "Rate limit exceeded. Please try again later.");
    }

    /// Responses of the wrong shape fail with the field path
    #[tokio::test]
    async fn test_malformed_response_reports_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/logGroups/g1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "g1",
                "freeformTags": ["not", "a", "map"]
            })))
            .mount(&server)
            .await;

        let client = ModelClient::new(&server.uri(), get_registry()).unwrap();
        let err = client.get("/logGroups/g1", "LogGroup").await.unwrap_err();
        let message = format_api_error(&err);
        assert!(message.contains("Failed to decode response as LogGroup"), "{}", message);
        assert!(message.contains("$.freeformTags"), "{}", message);
    }

    /// Test invalid JSON body
    #[tokio::test]
    async fn test_invalid_json_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vcns/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = ModelClient::new(&server.uri(), get_registry()).unwrap();
        let err = client.get("/vcns/v1", "Vcn").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse response JSON"));
    }
}
