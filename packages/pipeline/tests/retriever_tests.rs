mod common;

use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pfr_harvester::config::parse_host;
use pfr_harvester::HarvestConfig;
use pfr_pipeline::models::TaskKind;
use pfr_pipeline::{params, retrieve, task_queue};

const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH><ListRecords>
<record><header><identifier>oai:arXiv.org:2403.00001</identifier><datestamp>2024-03-01</datestamp></header>
<metadata><oai_dc:dc><dc:title>First</dc:title><dc:description>One</dc:description></oai_dc:dc></metadata></record>
<record><header><identifier>oai:arXiv.org:2403.00002</identifier><datestamp>2024-03-01</datestamp></header>
<metadata><oai_dc:dc><dc:title>Second</dc:title><dc:description>Two</dc:description></oai_dc:dc></metadata></record>
<resumptionToken cursor="0" completeListSize="2"></resumptionToken>
</ListRecords></OAI-PMH>"#;

fn harvest_config(server: &MockServer) -> HarvestConfig {
    HarvestConfig::new("cs", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .unwrap()
        .with_host(parse_host(&format!("{}/oai2", server.uri())).unwrap())
        .with_check_interval(Duration::ZERO)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_retrieve_queues_records_and_sets_checkpoint() {
    let db = common::TestDb::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("from", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let report = retrieve(&db.pool, harvest_config(&server)).await.unwrap();

    assert_eq!(report.records, 2);
    let tasks = task_queue::list_tasks(&db.pool, Some(TaskKind::UpdateArticle))
        .await
        .unwrap();
    let ids: Vec<&str> = tasks.iter().filter_map(|t| t.payload["id"].as_str()).collect();
    assert_eq!(ids, vec!["oai:arXiv.org:2403.00001", "oai:arXiv.org:2403.00002"]);
    assert_eq!(
        params::get_retrieval_time(&db.pool).await.unwrap(),
        Some(report.finished_at)
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_retrieve_resumes_from_checkpoint() {
    let db = common::TestDb::new().await;
    let last = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
    params::set_retrieval_time(&db.pool, last).await.unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("from", "2024-03-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<OAI-PMH><error code="noRecordsMatch">No records</error></OAI-PMH>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let report = retrieve(&db.pool, harvest_config(&server)).await.unwrap();

    assert_eq!(report.records, 0);
    assert!(params::get_retrieval_time(&db.pool).await.unwrap() > Some(last));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_failed_retrieval_keeps_checkpoint() {
    let db = common::TestDb::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = retrieve(&db.pool, harvest_config(&server)).await.unwrap_err();

    assert!(err.to_string().contains("503"));
    assert_eq!(params::get_retrieval_time(&db.pool).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_failed_push_stops_before_next_page() {
    let db = common::TestDb::new().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("from", "2024-01-01"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(PAGE.replace("completeListSize=\"2\">", "completeListSize=\"4\">NEXT")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("resumptionToken", "NEXT"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(0)
        .mount(&server)
        .await;

    sqlx::query("DROP TABLE tasks")
        .execute(&db.pool)
        .await
        .unwrap();

    let err = retrieve(&db.pool, harvest_config(&server)).await.unwrap_err();

    assert!(err.to_string().contains("tasks"));
    assert_eq!(params::get_retrieval_time(&db.pool).await.unwrap(), None);
    server.verify().await;
}
