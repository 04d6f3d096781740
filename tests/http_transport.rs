//! HttpTransport を mockito サーバーに向けた結合テスト

use mockito::Matcher;
use youtube_live_chat::{
    ChatMode, ClientConfig, ContinuationPhase, HttpTransport, IdType, LiveChatClient,
    LiveChatError, Transport, TransportError,
};

const WATCH_PAGE: &str = r#"<script>{"videoDetails":{"channelId":"UCowner","isOwnerViewing":false}}
{"isReplay":false,"subMenuItems":[
{"selected":true,"continuation":{"reloadContinuationData":{"continuation":"top-token"}}},
{"selected":false,"continuation":{"reloadContinuationData":{"continuation":"all-token"}}}]}
"innertubeApiKey":"AIzaSyTestKey1234"</script>"#;

const LIVE_CHAT_PAGE: &str = r#"<script>var ytInitialData = {"continuationContents":{"liveChatContinuation":{}}};</script>"#;

const POLL_RESPONSE: &str = r#"{"continuationContents":{"liveChatContinuation":{
"continuations":[{"invalidationContinuationData":{"continuation":"next-1","timeoutMs":3000}}],
"actions":[{"addChatItemAction":{"item":{"liveChatTextMessageRenderer":{"id":"x1","authorName":{"simpleText":"Ann"},"message":{"runs":[{"text":"hi"}]},"timestampUsec":"1000000"}}}}]}}}"#;

#[tokio::test]
async fn test_http_transport_get_and_post() {
    let mut server = mockito::Server::new_async().await;
    let get = server
        .mock("GET", "/hello")
        .match_query(Matcher::Any)
        .match_header("x-test", "1")
        .with_status(200)
        .with_body("world")
        .create_async()
        .await;
    let post = server
        .mock("POST", "/echo")
        .match_query(Matcher::Any)
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJsonString(r#"{"a":1}"#.to_string()))
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
    let headers = vec![("x-test".to_string(), "1".to_string())];
    let body = transport
        .get(&format!("{}/hello", server.url()), &headers)
        .await
        .unwrap();
    assert_eq!(body, "world");

    let body = transport
        .post_json(&format!("{}/echo", server.url()), r#"{"a": 1}"#, &[])
        .await
        .unwrap();
    assert_eq!(body, "ok");

    get.assert_async().await;
    post.assert_async().await;
}

#[tokio::test]
async fn test_http_transport_status_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/missing")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;

    let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
    let result = transport
        .get(&format!("{}/missing", server.url()), &[])
        .await;
    match result {
        Err(TransportError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "not found");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_live_chat_client_over_http() {
    let mut server = mockito::Server::new_async().await;
    let watch = server
        .mock("GET", "/watch")
        .match_query(Matcher::UrlEncoded("v".into(), "vid1".into()))
        .with_status(200)
        .with_body(WATCH_PAGE)
        .create_async()
        .await;
    let live_chat = server
        .mock("GET", "/live_chat")
        .match_query(Matcher::UrlEncoded("continuation".into(), "top-token".into()))
        .with_status(200)
        .with_body(LIVE_CHAT_PAGE)
        .create_async()
        .await;
    let poll = server
        .mock("POST", "/youtubei/v1/live_chat/get_live_chat")
        .match_query(Matcher::UrlEncoded("key".into(), "AIzaSyTestKey1234".into()))
        .match_body(Matcher::PartialJsonString(
            r#"{"continuation":"top-token","context":{"client":{"clientName":"WEB","gl":"US","hl":"en"}}}"#
                .to_string(),
        ))
        .with_status(200)
        .with_body(POLL_RESPONSE)
        .expect(1)
        .create_async()
        .await;

    let mut client = LiveChatClient::with_config(ClientConfig::with_base_url(server.url())).unwrap();
    client
        .initialize("vid1", ChatMode::TopChat, IdType::Video)
        .await
        .unwrap();
    assert_eq!(client.channel_id(), Some("UCowner"));

    // 1回目は初期化時の取得済みデータを使うため通信しない
    client.update(0).await.unwrap();
    assert!(client.chat_items().is_empty());

    client.update(0).await.unwrap();
    assert_eq!(client.chat_items().len(), 1);
    assert_eq!(client.chat_items()[0].author_name.as_deref(), Some("Ann"));
    assert_eq!(client.continuation_phase(), ContinuationPhase::Polling);

    watch.assert_async().await;
    live_chat.assert_async().await;
    poll.assert_async().await;
}

#[tokio::test]
async fn test_live_chat_client_surfaces_http_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/watch")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let mut client = LiveChatClient::with_config(ClientConfig::with_base_url(server.url())).unwrap();
    let err = client
        .initialize("vid1", ChatMode::TopChat, IdType::Video)
        .await
        .unwrap_err();
    assert!(matches!(err, LiveChatError::TransportFailure { .. }));
    assert!(err.to_string().contains("503"));
}
