mod common;

use std::sync::Arc;

use serde_json::json;

use common::{Reply, ScriptedClient, image_reply, text_reply};
use nbproxy_common::GlobalConfig;
use nbproxy_core::{
    DispatchError, DispatchInput, Dispatcher, GeminiInput, GenerationOutput, Message,
    UpstreamBody, UpstreamHttpRequest, UpstreamTransportErrorKind, header_get,
};

const PNG: &str = "data:image/png;base64,AAA=";

fn config() -> GlobalConfig {
    GlobalConfig {
        image_model: "primary/model".to_string(),
        fallback_models: vec!["fallback/one".to_string(), "fallback/two".to_string()],
        base_delay_ms: 0,
        ..GlobalConfig::default()
    }
}

fn input(prompt: &str) -> DispatchInput {
    DispatchInput {
        messages: vec![Message::user(prompt, &[] as &[&str])],
        api_key: "sk-test".to_string(),
        model: None,
        referer: Some("https://banana.app".to_string()),
    }
}

fn last_user_text(body: &serde_json::Value) -> String {
    let messages = body["messages"].as_array().unwrap();
    messages.last().unwrap()["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn primary_image_returns_without_fallback() {
    let client = Arc::new(ScriptedClient::new(vec![Reply::Json(200, image_reply(PNG))]));
    let dispatcher = Dispatcher::from_config(client.clone(), &config());

    let result = dispatcher.generate(input("a cat in a hat")).await.unwrap();

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"type": "image", "content": PNG, "meta": {"usedFallback": false, "model": "primary/model"}})
    );
    let bodies = client.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["modalities"], json!(["image", "text"]));
    assert_eq!(bodies[0]["stream"], json!(false));
    assert!(last_user_text(&bodies[0]).starts_with("Generate an image"));
    let req = &client.requests()[0];
    assert_eq!(header_get(&req.headers, "authorization"), Some("Bearer sk-test"));
    assert_eq!(header_get(&req.headers, "http-referer"), Some("https://banana.app"));
    assert_eq!(dispatcher.gate().active(), 0);
}

#[tokio::test]
async fn intent_prompt_retries_strengthened_then_walks_fallbacks() {
    let client = Arc::new(ScriptedClient::new(vec![
        Reply::Json(200, text_reply("here is a description")),
        Reply::Json(200, text_reply("still just words")),
        Reply::Json(200, text_reply("")),
        Reply::Json(200, image_reply(PNG)),
    ]));
    let dispatcher = Dispatcher::from_config(client.clone(), &config());

    let result = dispatcher.generate(input("请生成一只猫")).await.unwrap();

    assert_eq!(result.output, GenerationOutput::Image(PNG.to_string()));
    assert!(result.meta.used_fallback);
    assert_eq!(result.meta.model, "fallback/two");
    assert_eq!(
        client.models(),
        vec!["primary/model", "primary/model", "fallback/one", "fallback/two"]
    );
    let bodies = client.bodies();
    assert!(last_user_text(&bodies[1]).starts_with("Create a safe"));
    assert!(last_user_text(&bodies[1]).ends_with("请生成一只猫"));
    assert!(last_user_text(&bodies[2]).starts_with("Create a safe"));
}

#[tokio::test]
async fn no_intent_goes_straight_to_fallbacks() {
    let client = Arc::new(ScriptedClient::new(vec![
        Reply::Json(200, text_reply("a cat is a small mammal")),
        Reply::Json(200, image_reply(PNG)),
    ]));
    let dispatcher = Dispatcher::from_config(client.clone(), &config());

    let result = dispatcher.generate(input("a cat")).await.unwrap();

    assert!(result.is_image());
    assert_eq!(result.meta.model, "fallback/one");
    assert_eq!(client.models(), vec!["primary/model", "fallback/one"]);
    assert!(last_user_text(&client.bodies()[1]).starts_with("Generate an image"));
}

#[tokio::test]
async fn primary_failure_propagates() {
    let client = Arc::new(ScriptedClient::new(vec![
        Reply::Raw(503, vec![("cf-ray".to_string(), "8f-LHR".to_string())], "busy"),
        Reply::Raw(503, Vec::new(), "busy"),
        Reply::Raw(503, Vec::new(), "<html>overloaded</html>"),
    ]));
    let dispatcher = Dispatcher::from_config(client.clone(), &config());

    let err = dispatcher.generate(input("a cat")).await.unwrap_err();

    let DispatchError::Status { status, body, .. } = err else {
        panic!("expected status error, got {err:?}");
    };
    assert_eq!(status, 503);
    assert_eq!(body, "<html>overloaded</html>");
    assert_eq!(client.requests().len(), 3);
    assert_eq!(dispatcher.gate().active(), 0);
}

#[tokio::test]
async fn primary_transport_failure_propagates_as_network_error() {
    let mut cfg = config();
    cfg.retries = 0;
    let client = Arc::new(ScriptedClient::new(vec![Reply::Fail(
        UpstreamTransportErrorKind::Connect,
        "connection refused",
    )]));
    let dispatcher = Dispatcher::from_config(client.clone(), &cfg);

    let err = dispatcher.generate(input("a cat")).await.unwrap_err();

    assert!(matches!(err, DispatchError::Transport(_)));
    assert_eq!(err.to_string(), "Network error: connection refused");
}

#[tokio::test]
async fn fallback_failures_are_swallowed() {
    let mut cfg = config();
    cfg.fallback_retries = 0;
    let client = Arc::new(ScriptedClient::new(vec![
        Reply::Json(200, text_reply("words")),
        Reply::Fail(UpstreamTransportErrorKind::Timeout, "timed out"),
        Reply::Json(200, image_reply(PNG)),
    ]));
    let dispatcher = Dispatcher::from_config(client.clone(), &cfg);

    let result = dispatcher.generate(input("a cat")).await.unwrap();

    assert_eq!(result.meta.model, "fallback/two");
    assert_eq!(client.requests().len(), 3);
}

#[tokio::test]
async fn exhausted_plan_returns_last_text() {
    let client = Arc::new(ScriptedClient::new(vec![
        Reply::Json(200, text_reply("only a description")),
        Reply::Json(200, text_reply("")),
        Reply::Json(200, json!({"choices": []})),
    ]));
    let dispatcher = Dispatcher::from_config(client.clone(), &config());

    let result = dispatcher.generate(input("a cat")).await.unwrap();

    assert_eq!(result.output, GenerationOutput::Text("only a description".to_string()));
    assert!(!result.meta.used_fallback);
    assert_eq!(result.meta.model, "primary/model");
}

#[tokio::test]
async fn exhausted_plan_without_text_returns_placeholder() {
    let client = Arc::new(ScriptedClient::new(vec![
        Reply::Json(200, text_reply("")),
        Reply::Json(200, text_reply("")),
        Reply::Json(200, text_reply("   ")),
    ]));
    let dispatcher = Dispatcher::from_config(client, &config());

    let result = dispatcher.generate(input("a cat")).await.unwrap();

    assert_eq!(result.output, GenerationOutput::Text("处理完成".to_string()));
}

#[tokio::test]
async fn invalid_primary_json_is_an_error() {
    let client = Arc::new(ScriptedClient::new(vec![Reply::Raw(200, Vec::new(), "not json")]));
    let dispatcher = Dispatcher::from_config(client, &config());

    let err = dispatcher.generate(input("a cat")).await.unwrap_err();

    assert!(matches!(err, DispatchError::InvalidJson(_)));
    assert!(err.to_string().starts_with("Invalid upstream JSON"));
}

#[tokio::test]
async fn same_request_twice_gives_same_result_type() {
    let client = Arc::new(ScriptedClient::new(vec![
        Reply::Json(200, image_reply(PNG)),
        Reply::Json(200, image_reply(PNG)),
    ]));
    let dispatcher = Dispatcher::from_config(client, &config());

    let first = dispatcher.generate(input("draw a fox")).await.unwrap();
    let second = dispatcher.generate(input("draw a fox")).await.unwrap();

    assert_eq!(first.kind(), second.kind());
    assert_eq!(first, second);
}

#[tokio::test]
async fn request_model_overrides_configured_primary() {
    let client = Arc::new(ScriptedClient::new(vec![Reply::Json(200, image_reply(PNG))]));
    let dispatcher = Dispatcher::from_config(client.clone(), &config());
    let mut request = input("a cat");
    request.model = Some("custom/model".to_string());

    let result = dispatcher.generate(request).await.unwrap();

    assert_eq!(result.meta.model, "custom/model");
    assert_eq!(client.models(), vec!["custom/model"]);
}

#[tokio::test]
async fn gemini_generation_sends_image_config() {
    let client = Arc::new(ScriptedClient::new(vec![Reply::Json(
        200,
        json!({"candidates": [{"content": {"role": "model", "parts": [
            {"text": "Here you go"},
            {"inlineData": {"mimeType": "image/png", "data": "AAA="}}
        ]}}]}),
    )]));
    let dispatcher = Dispatcher::from_config(client.clone(), &config());

    let result = dispatcher
        .generate_with_gemini(GeminiInput {
            messages: vec![
                Message::system("You are a painter."),
                Message::user("a red fox", &["data:image/jpeg;base64,/9j/"]),
            ],
            api_key: "g-key".to_string(),
            model: None,
            aspect_ratio: Some("16:9".to_string()),
            image_size: Some("2K".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(result.output, GenerationOutput::Image(PNG.to_string()));
    assert_eq!(result.meta.model, "gemini-3-pro-image-preview");
    let req = &client.requests()[0];
    assert!(req.url.ends_with("/models/gemini-3-pro-image-preview:generateContent"));
    assert_eq!(header_get(&req.headers, "x-goog-api-key"), Some("g-key"));
    let body = &client.bodies()[0];
    assert_eq!(
        body["generationConfig"],
        json!({"responseModalities": ["TEXT", "IMAGE"], "imageConfig": {"aspectRatio": "16:9", "imageSize": "2K"}})
    );
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are a painter.");
    assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
}

#[tokio::test]
async fn forward_keeps_slot_until_stream_ends() {
    let client = Arc::new(ScriptedClient::new(vec![Reply::Stream(vec![
        "data: {\"choices\":[]}\n\n",
        "data: [DONE]\n\n",
    ])]));
    let dispatcher = Dispatcher::from_config(client, &config());
    let req = UpstreamHttpRequest::post_json("https://up/chat", Vec::new(), "{}".into()).streaming();

    let resp = dispatcher.forward(req).await.unwrap();

    assert_eq!(resp.status, 200);
    let UpstreamBody::Stream(_) = &resp.body else {
        panic!("expected a stream body");
    };
    let body = resp.body.collect().await;
    assert_eq!(&body[..], b"data: {\"choices\":[]}\n\ndata: [DONE]\n\n");
    tokio::task::yield_now().await;
    assert_eq!(dispatcher.gate().active(), 0);
}
