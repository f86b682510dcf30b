use recipe_gen::api_connection::{
    connection::ApiConnectionError, endpoints::ChatMessage, OpenRouterClient,
};
use recipe_gen::config::{FieldNaming, GenerationConfig};
use recipe_gen::recipe_schema::recipe_json_schema;
use recipe_gen::search::{SearchError, TavilySearch, WebSearch, NO_RESULTS};
use recipe_gen::GenerationService;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_API_KEY: &str = "test-key";

fn test_config(server: &MockServer) -> GenerationConfig {
    GenerationConfig {
        base_url: server.uri(),
        retry_base_delay: Duration::from_millis(1),
        max_retries: 2,
        ..GenerationConfig::default()
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "gen-1",
        "object": "chat.completion",
        "created": 1_700_000_000u64,
        "model": "google/gemma-2-9b-it",
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": { "role": "assistant", "content": content }
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}

#[tokio::test]
async fn test_missing_api_key_error() {
    let server = MockServer::start().await;
    let config = GenerationConfig {
        api_key_env_var: "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ".to_string(),
        ..test_config(&server)
    };
    let client = OpenRouterClient::new(&config).unwrap();

    let result = client.invoke("Hello", None).await;
    match result {
        Err(ApiConnectionError::MissingApiKey(key_name)) => {
            assert_eq!(key_name, "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
        }
        other => panic!("expected MissingApiKey, got {other:?}"),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_free_text_call_sends_prompt_and_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "google/gemma-2-9b-it",
            "messages": [{ "role": "user", "content": "What is the capital of France?" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Paris")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(&test_config(&server))
        .unwrap()
        .with_api_key(TEST_API_KEY);
    let response = client
        .invoke("What is the capital of France?", None)
        .await
        .unwrap();
    assert_eq!(response.content, "Paris");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("response_format").is_none());
}

#[tokio::test]
async fn test_structured_call_sends_json_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "recipe", "strict": false }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(&test_config(&server))
        .unwrap()
        .with_api_key(TEST_API_KEY);
    let schema = recipe_json_schema(FieldNaming::Canonical);
    let response = client.invoke("make a recipe", Some(&schema)).await.unwrap();
    assert_eq!(response.content, "{}");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let properties = &body["response_format"]["json_schema"]["schema"]["properties"];
    assert!(properties["preparation_steps"].is_object());
    assert!(properties["preparation_time"].is_object());
}

#[tokio::test]
async fn test_retries_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("third time lucky")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(&test_config(&server))
        .unwrap()
        .with_api_key(TEST_API_KEY);
    let response = client.invoke("hi", None).await.unwrap();
    assert_eq!(response.content, "third time lucky");
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(&test_config(&server))
        .unwrap()
        .with_api_key(TEST_API_KEY);
    let result = client.invoke("hi", None).await;
    assert!(
        matches!(result, Err(ApiConnectionError::ApiError { status, .. }) if status == reqwest::StatusCode::TOO_MANY_REQUESTS),
        "Expected ApiError 429, got {result:?}"
    );
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(&test_config(&server))
        .unwrap()
        .with_api_key("this_is_a_deliberately_bad_api_key_string_for_testing");
    let result = client.invoke("hi", None).await;
    match result {
        Err(ApiConnectionError::ApiError { status, error_body }) => {
            assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
            assert_eq!(error_body, "bad key");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_choices_are_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .expect(3)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(&test_config(&server))
        .unwrap()
        .with_api_key(TEST_API_KEY);
    let result = client.invoke("hi", None).await;
    assert!(matches!(result, Err(ApiConnectionError::EmptyResponse)));
}

#[tokio::test]
async fn test_malformed_envelope_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(&test_config(&server))
        .unwrap()
        .with_api_key(TEST_API_KEY);
    let response = client.invoke("hi", None).await.unwrap();
    assert_eq!(response.content, "recovered");
}

#[tokio::test]
async fn test_malformed_envelope_surfaces_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let client = OpenRouterClient::new(&test_config(&server))
        .unwrap()
        .with_api_key(TEST_API_KEY);
    let result = client.invoke("hi", None).await;
    assert!(matches!(result, Err(ApiConnectionError::SerializationError(_))));
}

#[test]
fn test_build_request_uses_config() {
    let config = GenerationConfig {
        model_name: "some/model".to_string(),
        temperature: 0.1,
        max_tokens: 512,
        ..GenerationConfig::default()
    };
    let request = OpenRouterClient::new(&config)
        .unwrap()
        .build_request("prompt", None);
    assert_eq!(request.model, "some/model");
    assert_eq!(request.temperature, Some(0.1));
    assert_eq!(request.max_tokens, Some(512));
    assert_eq!(request.messages, vec![ChatMessage::user("prompt")]);
}

#[tokio::test]
async fn test_tavily_search_formats_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("authorization", "Bearer tvly-test"))
        .and(body_partial_json(json!({ "query": "recipes with rice, beans", "max_results": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "recipes with rice, beans",
            "results": [
                { "title": "Rice and beans", "url": "https://example.com/rb", "content": "Simmer beans.", "score": 0.9 },
                { "title": "Gallo pinto", "url": "https://example.com/gp", "content": "Fry rice with beans.", "score": 0.8 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let search = TavilySearch::new(Duration::from_secs(5))
        .unwrap()
        .with_base_url(server.uri())
        .with_api_key("tvly-test");
    let text = search.search("recipes with rice, beans", 2).await.unwrap();
    assert!(text.starts_with("1. Rice and beans (https://example.com/rb)\nSimmer beans."));
    assert!(text.contains("2. Gallo pinto"));
}

#[tokio::test]
async fn test_tavily_empty_results_is_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;

    let search = TavilySearch::new(Duration::from_secs(5))
        .unwrap()
        .with_base_url(server.uri())
        .with_api_key("tvly-test");
    assert_eq!(search.search("nothing", 3).await.unwrap(), NO_RESULTS);
}

#[tokio::test]
async fn test_tavily_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let search = TavilySearch::new(Duration::from_secs(5))
        .unwrap()
        .with_base_url(server.uri())
        .with_api_key("tvly-test");
    let err = search.search("anything", 3).await.unwrap_err();
    assert!(matches!(err, SearchError::Api { status, .. } if status.as_u16() == 500));
}
