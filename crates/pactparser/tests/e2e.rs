//! End-to-end tests: a generated PDF goes through submission, the worker
//! pool, text extraction, a scripted model and scoring, and the result is
//! read back through the query surface.

mod common;

use std::sync::Arc;

use pactparser::broadcast::JobProgressBroadcaster;
use pactparser::error::ServiceError;
use pactparser::job::JobStatus;
use pactparser::pipeline::NoopProgress;
use pactparser::scoring::gaps;
use pactparser::service::ListQuery;
use pactparser::store::{JobFilter, JobStore};
use pactparser::worker::{execute_with_retry, Dispatcher, Job, RetryPolicy};

use common::harness::{quick_retry, stop, wait_for_results};
use common::{ContractBuilder, Reply, ScriptedModel, TestHarness};

const MSA_PAGES: &[&str] = &[
    "MASTER SERVICES AGREEMENT\nBetween Acme Corp and Globex LLC",
    "Payment terms: Net 30\nUptime commitment: 99.9%",
];

#[test]
fn test_pdf_submission_completes_with_full_score() {
    let harness = TestHarness::new();
    let model = Arc::new(ScriptedModel::always(Reply::Json(
        ContractBuilder::complete().build(),
    )));
    let pool = harness.pool(
        harness.pipeline(Arc::clone(&model) as _),
        1,
        RetryPolicy::default(),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("msa.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    assert_eq!(submission.filename, "msa.pdf");

    let results = wait_for_results(&pool, 1);
    stop(&pool);

    let result = &results[0];
    assert!(result.success, "job failed: {:?}", result.error);
    assert_eq!(result.job_id, submission.job_id);
    assert_eq!(result.confidence_score, Some(100.0));
    assert_eq!(result.attempts, 1);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("MASTER SERVICES AGREEMENT"));
    assert!(prompts[0].contains("Net 30"));

    let status = service.status(&submission.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.progress_percentage, 100);
    assert!(status.error_message.is_none());

    let record = service.contract(&submission.job_id).unwrap();
    assert_eq!(record.extracted_data, Some(ContractBuilder::complete().build()));
    assert_eq!(record.gap_analysis, Some(vec![]));
    assert!(record.invariant_violation().is_none());

    let document = service.document(&submission.job_id).unwrap();
    assert!(document.path.starts_with(&harness.uploads_dir));
    assert_eq!(document.mime_type, "application/pdf");
}

#[test]
fn test_progress_events_follow_checkpoints() {
    let harness = TestHarness::new();
    let broadcaster = JobProgressBroadcaster::default();
    let mut events = broadcaster.subscribe();

    let model = Arc::new(ScriptedModel::always(Reply::Json(
        ContractBuilder::complete().build(),
    )));
    let pool = harness.pool(
        harness.pipeline(model),
        1,
        RetryPolicy::default(),
        Some(broadcaster.clone()),
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("msa.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    wait_for_results(&pool, 1);
    stop(&pool);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    let progress: Vec<u8> = received.iter().map(|e| e.progress_percentage).collect();
    assert_eq!(progress, vec![0, 10, 30, 70, 90, 100]);
    assert!(received.iter().all(|e| e.job_id == submission.job_id));

    let last = received.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.confidence_score, Some(100.0));
    assert_eq!(last.gap_count, Some(0));
}

#[test]
fn test_partial_contract_reports_gaps() {
    let harness = TestHarness::new();
    let reply = ContractBuilder::complete()
        .without("payment_structure")
        .without("service_level_agreements")
        .build();
    let pool = harness.pool(
        harness.pipeline(Arc::new(ScriptedModel::always(Reply::Json(reply)))),
        1,
        RetryPolicy::default(),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("order-form.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    let results = wait_for_results(&pool, 1);
    stop(&pool);

    assert!(results[0].success);
    assert_eq!(results[0].gap_count, 2);

    let record = service.contract(&submission.job_id).unwrap();
    assert_eq!(record.confidence_score, Some(65.0));
    let gap_list = record.gap_analysis.unwrap();
    assert!(gap_list.contains(&gaps::PAYMENT_ABSENT.to_string()));
    assert!(gap_list.contains(&gaps::SLA_ABSENT.to_string()));
}

#[test]
fn test_malformed_model_output_completes_with_zero_score() {
    let harness = TestHarness::new();
    let reply = ContractBuilder::complete()
        .field("parties", serde_json::json!("Acme and Globex"))
        .build();
    let pool = harness.pool(
        harness.pipeline(Arc::new(ScriptedModel::always(Reply::Json(reply.clone())))),
        1,
        RetryPolicy::default(),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("msa.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    wait_for_results(&pool, 1);
    stop(&pool);

    let record = service.contract(&submission.job_id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.confidence_score, Some(0.0));
    let gap_list = record.gap_analysis.unwrap();
    assert_eq!(gap_list.len(), 1);
    assert!(gap_list[0].starts_with(gaps::STRUCTURAL_PARSE_FAILURE));
    assert!(gap_list[0].contains("$.parties"), "gap: {}", gap_list[0]);
    assert_eq!(record.extracted_data, Some(reply));
}

#[test]
fn test_model_failure_marks_job_failed() {
    let harness = TestHarness::new();
    let model = Arc::new(ScriptedModel::always(Reply::Unavailable));
    let pool = harness.pool(
        harness.pipeline(Arc::clone(&model) as _),
        1,
        quick_retry(3),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("msa.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    let results = wait_for_results(&pool, 1);
    stop(&pool);

    // A processing failure is an outcome, not a dispatch fault.
    assert!(!results[0].success);
    assert_eq!(results[0].attempts, 1);
    assert_eq!(model.calls(), 1);

    let record = harness.record(&submission.job_id);
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.progress_percentage, 0);
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Structured extraction failed"));
    assert!(record.extracted_data.is_none());
    assert!(record.invariant_violation().is_none());

    match service.contract(&submission.job_id) {
        Err(ServiceError::NotReady(JobStatus::Failed)) => {}
        other => panic!("expected NotReady, got {:?}", other),
    }
}

#[test]
fn test_pdf_without_text_layer_fails_extraction() {
    let harness = TestHarness::new();
    let model = Arc::new(ScriptedModel::always(Reply::Json(
        ContractBuilder::complete().build(),
    )));
    let pool = harness.pool(
        harness.pipeline(Arc::clone(&model) as _),
        1,
        RetryPolicy::default(),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("scan.pdf", &harness.pdf_bytes(&[""]))
        .unwrap();
    wait_for_results(&pool, 1);
    stop(&pool);

    assert_eq!(model.calls(), 0);
    let status = service.status(&submission.job_id).unwrap();
    assert_eq!(status.status, JobStatus::Failed);
    assert!(status
        .error_message
        .unwrap()
        .starts_with("Text extraction failed"));
}

#[test]
fn test_panicking_model_is_retried() {
    let harness = TestHarness::new();
    let model = Arc::new(ScriptedModel::new(vec![
        Reply::Panic,
        Reply::Json(ContractBuilder::complete().build()),
    ]));
    let pool = harness.pool(
        harness.pipeline(Arc::clone(&model) as _),
        1,
        quick_retry(2),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("msa.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    let results = wait_for_results(&pool, 1);
    stop(&pool);

    assert!(results[0].success);
    assert_eq!(results[0].attempts, 2);
    assert_eq!(model.calls(), 2);

    let record = harness.record(&submission.job_id);
    assert_eq!(record.status, JobStatus::Completed);
    assert!(record.invariant_violation().is_none());
}

#[test]
fn test_exhausted_retries_mark_job_failed() {
    let harness = TestHarness::new();
    let model = Arc::new(ScriptedModel::always(Reply::Panic));
    let pool = harness.pool(
        harness.pipeline(Arc::clone(&model) as _),
        1,
        quick_retry(1),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("msa.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    let results = wait_for_results(&pool, 1);
    stop(&pool);

    assert!(!results[0].success);
    assert_eq!(results[0].attempts, 2);
    assert_eq!(results[0].status, Some(JobStatus::Failed));
    assert_eq!(model.calls(), 2);

    let record = harness.record(&submission.job_id);
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.progress_percentage, 0);
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Dispatch failed after 2 attempts"));
    assert!(record.invariant_violation().is_none());
}

#[test]
fn test_redelivered_job_is_noop() {
    let harness = TestHarness::new();
    let model = Arc::new(ScriptedModel::always(Reply::Json(
        ContractBuilder::complete().build(),
    )));
    let pipeline = harness.pipeline(Arc::clone(&model) as _);
    let pool = harness.pool(Arc::clone(&pipeline), 1, RetryPolicy::default(), None);
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("msa.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    wait_for_results(&pool, 1);
    stop(&pool);

    let before = harness.record(&submission.job_id);
    let document = service.document(&submission.job_id).unwrap();
    let job = Job::new(&submission.job_id, document.path, "msa.pdf");

    let result = execute_with_retry(&pipeline, &job, RetryPolicy::default(), &NoopProgress);
    assert!(result.success);
    assert_eq!(result.status, Some(JobStatus::Completed));
    assert_eq!(model.calls(), 1);
    assert_eq!(harness.record(&submission.job_id), before);
}

#[test]
fn test_rejected_uploads_leave_no_record() {
    let harness = TestHarness::new();
    let pool = harness.pool(
        harness.pipeline(Arc::new(ScriptedModel::always(Reply::Unavailable))),
        1,
        RetryPolicy::default(),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let result = service.submit("notes.txt", b"Payment terms: Net 30");
    assert!(matches!(result, Err(ServiceError::UnsupportedFileType(_))));

    let result = service.submit("fake.pdf", b"<html>not a pdf</html>");
    assert!(matches!(result, Err(ServiceError::InvalidDocument(_))));

    stop(&pool);

    let listing = service.list(&ListQuery::default()).unwrap();
    assert_eq!(listing.total_count, 0);
    assert!(!harness.uploads_dir.exists());
}

#[test]
fn test_listing_filters_and_pages() {
    let harness = TestHarness::new();
    let model = Arc::new(ScriptedModel::new(vec![
        Reply::Json(ContractBuilder::complete().build()),
        Reply::Json(ContractBuilder::empty().parties(&[("Acme Corp", "Customer")]).build()),
        Reply::Json(ContractBuilder::complete().build()),
    ]));
    // One worker keeps the scripted replies in submission order.
    let pool = harness.pool(harness.pipeline(model), 1, RetryPolicy::default(), None);
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let bytes = harness.pdf_bytes(MSA_PAGES);
    for name in ["alpha-msa.pdf", "beta-sow.pdf", "gamma-MSA.pdf"] {
        service.submit(name, &bytes).unwrap();
    }
    wait_for_results(&pool, 3);
    stop(&pool);

    let by_name = service
        .list(&ListQuery {
            filter: JobFilter {
                filename_contains: Some("msa".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_name.total_count, 2);

    let high_scores = service
        .list(&ListQuery {
            filter: JobFilter {
                min_score: Some(90.0),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
    assert_eq!(high_scores.total_count, 2);
    assert!(high_scores.items.iter().all(|i| i.confidence_score == Some(100.0)));

    let low_scores = service
        .list(&ListQuery {
            filter: JobFilter {
                max_score: Some(50.0),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
    assert_eq!(low_scores.total_count, 1);
    assert_eq!(low_scores.items[0].filename, "beta-sow.pdf");

    let second_page = service
        .list(&ListQuery {
            page: Some(2),
            page_size: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(second_page.total_count, 3);
    assert_eq!(second_page.items.len(), 1);

    let counts = harness.store.count_by_status().unwrap();
    assert_eq!(counts.get(&JobStatus::Completed), Some(&3));

    let invalid = service.list(&ListQuery {
        page_size: Some(0),
        ..Default::default()
    });
    assert!(matches!(invalid, Err(ServiceError::InvalidQuery(_))));
}

#[test]
fn test_records_survive_reopening_the_database() {
    let harness = TestHarness::new();
    let pool = harness.pool(
        harness.pipeline(Arc::new(ScriptedModel::always(Reply::Json(
            ContractBuilder::complete().build(),
        )))),
        1,
        RetryPolicy::default(),
        None,
    );
    let service = harness.service(Arc::clone(&pool) as Arc<dyn Dispatcher>);

    let submission = service
        .submit("msa.pdf", &harness.pdf_bytes(MSA_PAGES))
        .unwrap();
    wait_for_results(&pool, 1);
    stop(&pool);

    let reopened = harness.reopen_store();
    let record = reopened.find_by_id(&submission.job_id).unwrap().unwrap();
    assert_eq!(record, harness.record(&submission.job_id));
    assert_eq!(record.status, JobStatus::Completed);
}
