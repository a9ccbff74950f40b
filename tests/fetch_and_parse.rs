//! Integration tests for the fetch-then-parse path used by the CLI.

use feedscan::config::Config;
use feedscan::feed::FeedParser;
use feedscan::fetch::{fetch_feed, FetchError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ATOM_DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Served</title>
  <link href="https://served.example.com/"/>
  <entry><id>1</id><title>One</title><updated>2022-02-02T02:02:02Z</updated></entry>
</feed>"#;

#[tokio::test]
async fn test_fetch_and_parse_atom() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/atom.xml"))
        .and(header("user-agent", "feedscan-test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ATOM_DOC)
                .insert_header("Content-Type", "application/atom+xml"),
        )
        .mount(&mock_server)
        .await;

    let config = Config {
        user_agent: "feedscan-test".to_string(),
        ..Config::default()
    };
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .unwrap();

    let url = format!("{}/atom.xml", mock_server.uri());
    let bytes = fetch_feed(&client, &url, &config.fetch_options())
        .await
        .unwrap();
    let feed = FeedParser::new(config.parser_options())
        .parse_bytes(&bytes)
        .unwrap();

    assert_eq!(feed.title, "Served");
    assert_eq!(feed.link, "https://served.example.com/");
    assert_eq!(feed.items.len(), 1);
    assert_eq!(feed.items[0].title, "One");
}

#[tokio::test]
async fn test_fetch_legacy_charset_body() {
    let mut body = b"<?xml version=\"1.0\" encoding=\"windows-1251\"?><rss><channel><title>".to_vec();
    // "Новости" in windows-1251
    body.extend_from_slice(&[0xCD, 0xEE, 0xE2, 0xEE, 0xF1, 0xF2, 0xE8]);
    body.extend_from_slice(b"</title></channel></rss>");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::new();
    let url = format!("{}/rss", mock_server.uri());
    let bytes = fetch_feed(&client, &url, &Config::default().fetch_options())
        .await
        .unwrap();
    let feed = FeedParser::default().parse_bytes(&bytes).unwrap();

    assert_eq!(feed.title, "\u{41d}\u{43e}\u{432}\u{43e}\u{441}\u{442}\u{438}");
}

#[tokio::test]
async fn test_fetch_client_error_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::new();
    let url = format!("{}/feed", mock_server.uri());
    let result = fetch_feed(&client, &url, &Config::default().fetch_options()).await;

    assert!(matches!(result, Err(FetchError::HttpStatus(403))));
}
