//! Integration tests for the API helpers.
//!
//! Uses wiremock for the platform; every instance caches its token in a
//! fresh temp dir.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use wechat_sdk::cache::CacheStore;
use wechat_sdk::media::MediaType;
use wechat_sdk::menu::Button;
use wechat_sdk::template::TemplateMessageData;
use wechat_sdk::token::ACCESS_TOKEN_KEY;
use wechat_sdk::{Api, Endpoints, MemoryCache, Message, Wechat, WechatConfig, WechatError};
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_wechat(mock_server: &MockServer, cache_dir: &TempDir) -> Wechat {
    let config = WechatConfig::new("wx_test", "test_secret", "token")
        .with_cache_dir(cache_dir.path())
        .with_endpoints(Endpoints::single(mock_server.uri()))
        .with_request_timeout(5);
    Wechat::make(config).expect("failed to create wechat")
}

/// Instance whose cache already holds `token`
fn create_wechat_with_token(mock_server: &MockServer, token: &str) -> Wechat {
    let config = WechatConfig::new("wx_test", "test_secret", "token")
        .with_endpoints(Endpoints::single(mock_server.uri()));
    let wechat = Wechat::make(config).expect("failed to create wechat");

    let cache = Arc::new(MemoryCache::new());
    cache
        .put(ACCESS_TOKEN_KEY, token, Duration::from_secs(7200))
        .unwrap();
    wechat.cache_store(cache);
    wechat
}

async fn mount_token(mock_server: &MockServer, token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .and(query_param("grant_type", "client_credential"))
        .and(query_param("appid", "wx_test"))
        .and(query_param("secret", "test_secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": token, "expires_in": 7200})),
        )
        .expect(times)
        .mount(mock_server)
        .await;
}

// =============================================================================
// Access token
// =============================================================================

#[tokio::test]
async fn test_access_token_fetched_once() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    mount_token(&mock_server, "ACCESS_TOKEN", 1).await;

    let wechat = create_wechat(&mock_server, &cache_dir);
    assert_eq!(wechat.access_token().await.unwrap(), "ACCESS_TOKEN");
    assert_eq!(wechat.access_token().await.unwrap(), "ACCESS_TOKEN");
}

#[tokio::test]
async fn test_access_token_survives_new_instance() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();
    mount_token(&mock_server, "ACCESS_TOKEN", 1).await;

    create_wechat(&mock_server, &cache_dir)
        .access_token()
        .await
        .unwrap();

    // Second instance reads the file cache
    let token = create_wechat(&mock_server, &cache_dir)
        .access_token()
        .await
        .unwrap();
    assert_eq!(token, "ACCESS_TOKEN");
}

#[tokio::test]
async fn test_refresh_bypasses_cache() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, "FRESH", 1).await;

    let wechat = create_wechat_with_token(&mock_server, "STALE");
    assert_eq!(wechat.access_token().await.unwrap(), "STALE");
    assert_eq!(wechat.refresh_access_token().await.unwrap(), "FRESH");
    assert_eq!(wechat.access_token().await.unwrap(), "FRESH");
}

#[tokio::test]
async fn test_token_error_is_reported() {
    let mock_server = MockServer::start().await;
    let cache_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/cgi-bin/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 40013, "errmsg": "invalid appid"})),
        )
        .mount(&mock_server)
        .await;

    let wechat = create_wechat(&mock_server, &cache_dir);
    let seen: Arc<Mutex<Vec<Option<i64>>>> = Arc::default();
    let sink = seen.clone();
    wechat.on_error(move |e| sink.lock().push(e.code()));

    let err = wechat.access_token().await.unwrap_err();
    assert_eq!(err.code(), Some(40013));
    assert_eq!(seen.lock().as_slice(), [Some(40013)]);
}

#[tokio::test]
async fn test_expired_token_is_refetched_once() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, "FRESH", 1).await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/custom/send"))
        .and(query_param("access_token", "STALE"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 42001, "errmsg": "access_token expired"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/custom/send"))
        .and(query_param("access_token", "FRESH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "STALE");
    let result = wechat.client().send_text("openid1", "Hello").await.unwrap();
    assert_eq!(result.errmsg, "ok");
}

#[tokio::test]
async fn test_persistent_token_rejection_fails() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, "FRESH", 1).await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/menu/get"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 40001, "errmsg": "invalid credential"})),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "STALE");
    let err = wechat.menu().get().await.unwrap_err();
    assert!(err.is_token_expired());
}

#[tokio::test]
async fn test_cache_write_failure_with_reader_closure() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, "T", 1).await;

    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").unwrap();

    let config = WechatConfig::new("wx_test", "test_secret", "token")
        .with_cache_dir(blocker.join("cache"))
        .with_endpoints(Endpoints::single(mock_server.uri()));
    let wechat = Wechat::make(config).unwrap();
    wechat.cache_reader(|_| None);

    let err = wechat.access_token().await.unwrap_err();
    assert!(matches!(err, WechatError::Cache(_)));
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn test_local_failures_are_reported() {
    let mock_server = MockServer::start().await;
    let wechat = create_wechat_with_token(&mock_server, "TOKEN");

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = seen.clone();
    wechat.on_error(move |e| sink.lock().push(e.to_string()));

    // None of these reach the platform
    assert!(wechat.client().send(&Message::transfer(), "openid1").await.is_err());
    assert!(wechat.client().send(&Message::news(vec![]), "openid1").await.is_err());
    assert!(wechat.media().image("/no/such/file.jpg").await.is_err());
    assert!(wechat.menu().create(&[]).await.is_err());
    assert!(wechat.qrcode().forever(0).await.is_err());

    assert_eq!(seen.lock().len(), 5);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_api_failure_reported_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/menu/create"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 40018, "errmsg": "invalid button name size"})),
        )
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let seen: Arc<Mutex<Vec<Option<i64>>>> = Arc::default();
    let sink = seen.clone();
    wechat.on_error(move |e| sink.lock().push(e.code()));

    let err = wechat
        .menu()
        .create(&[Button::click("Today", "K")])
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(40018));
    assert_eq!(seen.lock().as_slice(), [Some(40018)]);
}

#[tokio::test]
async fn test_empty_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/groups/get"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let err = wechat.group().list().await.unwrap_err();
    assert!(matches!(err, WechatError::EmptyResponse));
}

#[tokio::test]
async fn test_raw_get_with_auto_token_disabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/menu/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"menu": {"button": []}})))
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    wechat.auto_request_token(false);

    let url = wechat.make_url(Api::MenuGet, &[]).await.unwrap();
    assert!(!url.contains("access_token"));

    let response = wechat.get(Api::MenuGet, &[]).await.unwrap();
    assert_eq!(response["menu"]["button"], json!([]));
}

// =============================================================================
// Helpers
// =============================================================================

#[tokio::test]
async fn test_send_news() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/custom/send"))
        .and(query_param("access_token", "TOKEN"))
        .and(body_json(json!({
            "touser": "openid1",
            "msgtype": "news",
            "news": {"articles": [{"title": "Title", "url": "http://a"}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let message = Message::news(vec![wechat_sdk::Article::new("Title").url("http://a")]);
    wechat.client().send(&message, "openid1").await.unwrap();
}

#[tokio::test]
async fn test_media_upload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/media/upload"))
        .and(query_param("type", "image"))
        .and(query_param("access_token", "TOKEN"))
        .and(body_string_contains("name=\"media\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "image", "media_id": "MEDIA_ID", "created_at": 123456789
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("photo.jpg");
    std::fs::write(&file, b"fake-jpeg-bytes").unwrap();

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    assert_eq!(wechat.media().image(&file).await.unwrap(), "MEDIA_ID");
}

#[tokio::test]
async fn test_media_upload_checks_file() {
    let mock_server = MockServer::start().await;
    let wechat = create_wechat_with_token(&mock_server, "TOKEN");

    let err = wechat.media().image("/no/such/file.jpg").await.unwrap_err();
    assert!(matches!(err, WechatError::Media(_)));

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("thumb.jpg");
    std::fs::write(&file, vec![0u8; MediaType::Thumb.max_size() + 1]).unwrap();
    let err = wechat.media().thumb(&file).await.unwrap_err();
    assert!(err.to_string().contains("too large"));
}

#[tokio::test]
async fn test_media_download() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/media/get"))
        .and(query_param("media_id", "MEDIA_ID"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(b"jpeg-bytes".to_vec()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/media/get"))
        .and(query_param("media_id", "MISSING"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 40007, "errmsg": "invalid media_id"})),
        )
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let dir = TempDir::new().unwrap();

    let saved = wechat
        .media()
        .download("MEDIA_ID", MediaType::Image, dir.path())
        .await
        .unwrap();
    assert_eq!(saved, dir.path().join("MEDIA_ID.jpg"));
    assert_eq!(std::fs::read(saved).unwrap(), b"jpeg-bytes");

    let err = wechat.media().fetch("MISSING").await.unwrap_err();
    assert_eq!(err.code(), Some(40007));

    let err = wechat
        .media()
        .download("../MEDIA_ID", MediaType::Image, dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, WechatError::Media(_)));
}

#[tokio::test]
async fn test_media_fetch_refetches_expired_token() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, "FRESH", 1).await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/media/get"))
        .and(query_param("access_token", "STALE"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 42001, "errmsg": "access_token expired"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/media/get"))
        .and(query_param("access_token", "FRESH"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(b"jpeg-bytes".to_vec()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "STALE");
    assert_eq!(wechat.media().fetch("m1").await.unwrap(), b"jpeg-bytes");
}

#[tokio::test]
async fn test_menu_create_and_get() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/menu/create"))
        .and(body_json(json!({"button": [
            {"name": "Today", "type": "click", "key": "V1001_TODAY_MUSIC"}
        ]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/menu/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"menu": {"button": [
            {"name": "Today", "type": "click", "key": "V1001_TODAY_MUSIC", "sub_button": []}
        ]}})))
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let menu = vec![Button::click("Today", "V1001_TODAY_MUSIC")];
    wechat.menu().create(&menu).await.unwrap();
    assert_eq!(wechat.menu().get().await.unwrap(), menu);
}

#[tokio::test]
async fn test_groups() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/groups/create"))
        .and(body_json(json!({"group": {"name": "test"}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"group": {"id": 107, "name": "test"}})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/groups/members/update"))
        .and(body_json(json!({"openid": "openid1", "to_groupid": 107})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/groups/getid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"groupid": 107})))
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let group = wechat.group().create("test").await.unwrap();
    assert_eq!(group.id, 107);

    wechat.group().move_user("openid1", group.id).await.unwrap();
    assert_eq!(wechat.group().user_group("openid1").await.unwrap(), 107);
}

#[tokio::test]
async fn test_user_get_and_list() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/info"))
        .and(query_param("openid", "openid1"))
        .and(query_param("lang", "zh_CN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscribe": 1, "openid": "openid1", "nickname": "Band", "sex": 1
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cgi-bin/user/get"))
        .and(query_param("next_openid", "openid1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2, "count": 1, "data": {"openid": ["openid2"]}, "next_openid": "openid2"
        })))
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let user = wechat.user().get("openid1", "zh_CN").await.unwrap();
    assert_eq!(user.nickname.as_deref(), Some("Band"));

    let page = wechat.user().list(Some("openid1")).await.unwrap();
    assert_eq!(page.data.openid, vec!["openid2"]);
}

#[tokio::test]
async fn test_oauth_exchange() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/oauth2/access_token"))
        .and(query_param("code", "CODE"))
        .and(query_param("grant_type", "authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "USER_TOKEN", "expires_in": 7200,
            "refresh_token": "REFRESH", "openid": "openid1", "scope": "snsapi_userinfo"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sns/userinfo"))
        .and(query_param("access_token", "USER_TOKEN"))
        .and(query_param("openid", "openid1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "openid": "openid1", "nickname": "Band", "privilege": ["PRIVILEGE1"]
        })))
        .mount(&mock_server)
        .await;

    // Neither call needs the account token, so none is fetched
    let cache_dir = TempDir::new().unwrap();
    let wechat = create_wechat(&mock_server, &cache_dir);

    let token = wechat.auth().access_token("CODE").await.unwrap();
    assert_eq!(token.openid, "openid1");

    let user = wechat.auth().user(&token, "zh_CN").await.unwrap();
    assert_eq!(user.privilege, vec!["PRIVILEGE1"]);
}

#[tokio::test]
async fn test_qrcode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/qrcode/create"))
        .and(body_json(json!({
            "expire_seconds": 604800,
            "action_name": "QR_SCENE",
            "action_info": {"scene": {"scene_id": 123}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ticket": "gQH47joAAAAAAAAAASxodHRw", "expire_seconds": 604800,
            "url": "http://weixin.qq.com/q/kZgfwMTm72WWPkovabbI"
        })))
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let ticket = wechat.qrcode().temporary(123, 604800).await.unwrap();
    assert_eq!(ticket.expire_seconds, Some(604800));

    let url = wechat.qrcode().url(&ticket.ticket).await.unwrap();
    assert_eq!(
        url,
        format!("{}/cgi-bin/showqrcode?ticket=gQH47joAAAAAAAAAASxodHRw", mock_server.uri())
    );

    assert!(wechat.qrcode().forever(0).await.is_err());
}

#[tokio::test]
async fn test_template_send() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cgi-bin/message/template/send"))
        .and(body_json(json!({
            "touser": "openid1",
            "template_id": "TEMPLATE",
            "url": "http://weixin.qq.com/download",
            "data": {"first": {"value": "Hello", "color": "#173177"}}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 0, "errmsg": "ok", "msgid": 200228332})),
        )
        .mount(&mock_server)
        .await;

    let wechat = create_wechat_with_token(&mock_server, "TOKEN");
    let data = TemplateMessageData::new().add_field("first", "Hello", Some("#173177"));
    let result = wechat
        .template()
        .send("openid1", "TEMPLATE", &data, Some("http://weixin.qq.com/download"))
        .await
        .unwrap();
    assert_eq!(result.msgid, Some(200228332));
}
