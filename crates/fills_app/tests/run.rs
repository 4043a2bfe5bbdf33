use std::fs;

use clap::Parser;
use fills_app::{run, AppSettings, Cli, FileConfig};
use fills_core::FinishReason;
use fills_logging::initialize_for_tests;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn harvests_into_nested_output_path() {
    initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "orderFilledEvents": [{
                "fee": "0",
                "id": "0xabc",
                "maker": "0xmaker",
                "makerAmountFilled": "10",
                "makerAssetId": "0",
                "orderHash": "0xorder",
                "taker": "0xtaker",
                "takerAmountFilled": "5",
                "takerAssetId": "99",
                "timestamp": "1700000000",
                "transactionHash": "0xtx"
            }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let output = temp.path().join("goldsky").join("orderFilled.csv");
    let endpoint = format!("{}/gn", server.uri());
    let output_arg = output.to_string_lossy().into_owned();
    let cli = Cli::try_parse_from([
        "fills-harvester",
        "--endpoint",
        endpoint.as_str(),
        "--output",
        output_arg.as_str(),
    ])
    .unwrap();
    let settings = AppSettings::resolve(&cli, FileConfig::default());

    let outcome = run(&settings, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.reason, FinishReason::ShortBatch);
    assert_eq!(outcome.appended(), 1);
    let content = fs::read_to_string(&output).unwrap();
    assert_eq!(
        content,
        "timestamp,maker,makerAssetId,makerAmountFilled,taker,takerAssetId,takerAmountFilled,transactionHash\n\
         1700000000,0xmaker,0,10,0xtaker,99,5,0xtx\n"
    );
}

#[tokio::test]
async fn invalid_endpoint_is_an_error() {
    initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("orderFilled.csv");
    let output_arg = output.to_string_lossy().into_owned();
    let cli = Cli::try_parse_from([
        "fills-harvester",
        "--endpoint",
        "::not a url::",
        "--output",
        output_arg.as_str(),
    ])
    .unwrap();
    let settings = AppSettings::resolve(&cli, FileConfig::default());

    let err = run(&settings, CancellationToken::new()).await.unwrap_err();
    assert!(format!("{err:#}").contains("invalid endpoint"));
    assert!(!output.exists());
}
