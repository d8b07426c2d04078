//! End-to-end pipeline tests
//!
//! Transcript documents go in, analyzed artifacts come out, with a scripted
//! LLM standing in for the analysis service.

use std::fs;
use std::sync::Arc;

use callpipe::analysis::{AssemblerConfig, LlmAnalysisClient, ResultAssembler, RetryPolicy, RetryingAnalyzer, SubstringAgentLookup};
use callpipe::batch::{BatchConfig, BatchCoordinator};
use callpipe::error::{AnalysisError, RecordFailureCause, TransportError};
use callpipe::llm::{CompletionResponse, LlmClient, MockLlmClient, Usage};
use callpipe::prompt::{AnalysisPrompt, PromptLoader};
use callpipe::storage::{ArtifactSink, LocalArtifactSink};
use callpipe::transcript;
use tempfile::TempDir;

fn transcript_doc(display: &str, duration: &str) -> String {
    serde_json::json!({
        "duration": duration,
        "combinedRecognizedPhrases": [{ "channel": 0, "display": display }]
    })
    .to_string()
}

fn coordinator<L: LlmClient + 'static>(llm: Arc<L>, workers: usize) -> BatchCoordinator<LlmAnalysisClient<L>> {
    let client = LlmAnalysisClient::new(llm, AnalysisPrompt::new("Summarize the call as JSON"));
    BatchCoordinator::new(
        RetryingAnalyzer::new(Arc::new(client), RetryPolicy::default()),
        ResultAssembler::new(AssemblerConfig::default(), Arc::new(SubstringAgentLookup::default())),
        BatchConfig::default().with_max_workers(workers),
    )
}

#[test]
fn test_mock_llm_client_creation() {
    let mock = MockLlmClient::new(vec![]);
    assert!(mock.is_ready());
    assert_eq!(mock.model(), "mock-model");
}

#[tokio::test]
async fn test_single_call_end_to_end() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("linus_042.json");
    fs::write(&source, transcript_doc("Hej, jag ringer om fakturan.", "00:01:02")).unwrap();

    let record = transcript::read(&source).unwrap();
    let llm = Arc::new(MockLlmClient::always("{\"Summary\":\"hi\",\"Score\":3}\n", Usage::new(30, 12)));

    let result = coordinator(llm.clone(), 4).run_batch(vec![record]).await.unwrap();

    assert_eq!(result.artifacts.len(), 1);
    let artifact = &result.artifacts[0];
    assert_eq!(artifact.destination_path, "analyzed/linus_042.json");
    assert_eq!(
        artifact.payload,
        "{\n  \"Summary\": \"hi\",\n  \"Score\": 3,\n  \"FileLength\": \"00:01:02\",\n  \"TokensUsed\": 42,\n  \"AgentName\": \"Linus\"\n}"
    );
    assert_eq!(result.tokens_used(), 42);
    assert_eq!(llm.call_count(), 1);

    let requests = llm.requests();
    assert_eq!(requests[0].messages.last().unwrap().content, "Hej, jag ringer om fakturan.");
}

#[tokio::test]
async fn test_retries_invalid_output_then_saves() {
    let llm = Arc::new(MockLlmClient::new(vec![
        CompletionResponse::new("Sure! Here is the analysis:", Usage::new(10, 5)),
        CompletionResponse::new("{\"Summary\":\"ok\"}\n", Usage::new(10, 7)),
    ]));
    let record = transcript::parse("calls/axel_7.json", &transcript_doc("Hallå", "PT12S")).unwrap();

    let result = coordinator(llm.clone(), 1).run_batch(vec![record]).await.unwrap();

    assert_eq!(llm.call_count(), 2);
    assert_eq!(result.artifacts[0].tokens_used, 17);
    assert!(result.artifacts[0].payload.contains("\"AgentName\": \"Axel\""));
}

#[tokio::test]
async fn test_batch_failure_keeps_partial_artifacts() {
    let llm = Arc::new(MockLlmClient::with_results(vec![
        Ok(CompletionResponse::new("{\"n\":1}", Usage::new(1, 1))),
        Err(TransportError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        }),
        Ok(CompletionResponse::new("{\"n\":3}", Usage::new(1, 1))),
    ]));
    let records = ["calls/henrik_1.json", "calls/henrik_2.json", "calls/henrik_3.json"]
        .iter()
        .map(|p| transcript::parse(p, &transcript_doc("text", "PT1S")).unwrap())
        .collect();

    // One worker keeps the script order aligned with the record order
    let err = coordinator(llm, 1).run_batch(records).await.unwrap_err();

    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.failures()[0].source_path, "calls/henrik_2.json");
    assert!(matches!(
        err.failures()[0].cause,
        RecordFailureCause::Analysis(AnalysisError::Transport(TransportError::Api { status: 401, .. }))
    ));

    let dir = TempDir::new().unwrap();
    let sink = LocalArtifactSink::new(dir.path());
    let report = sink.persist_all(&err.partial().artifacts);
    assert!(report.is_complete());
    assert_eq!(report.saved.len(), 2);
    assert!(dir.path().join("analyzed/henrik_1.json").exists());
    assert!(dir.path().join("analyzed/henrik_3.json").exists());
    assert!(!dir.path().join("analyzed/henrik_2.json").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_large_batch_every_record_saved_once() {
    let llm = Arc::new(MockLlmClient::always("{\"Summary\":\"ok\"}", Usage::new(2, 3)));
    let records = (0..120)
        .map(|i| transcript::parse(&format!("calls/call_{i}.json"), &transcript_doc("x", "PT1S")).unwrap())
        .collect();

    let result = coordinator(llm.clone(), 20).run_batch(records).await.unwrap();

    let dir = TempDir::new().unwrap();
    let report = LocalArtifactSink::new(dir.path()).persist_all(&result.artifacts);

    assert_eq!(report.saved.len(), 120);
    assert_eq!(fs::read_dir(dir.path().join("analyzed")).unwrap().count(), 120);
    assert_eq!(llm.call_count(), 120);
    assert_eq!(result.tokens_used(), 600);
}

#[tokio::test]
async fn test_prompt_loaded_from_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("prompt.txt"), "Return a JSON object with a Summary key.").unwrap();

    let prompt = PromptLoader::new(dir.path())
        .load_analysis_prompt("prompt.txt", "Before continuing, REMOVE OLD CACHE.")
        .unwrap();
    let llm = Arc::new(MockLlmClient::always("{}", Usage::default()));
    let client = LlmAnalysisClient::new(llm.clone(), prompt);
    let coordinator = BatchCoordinator::new(
        RetryingAnalyzer::new(Arc::new(client), RetryPolicy::default()),
        ResultAssembler::default(),
        BatchConfig::default(),
    );

    let record = transcript::parse("calls/x.json", &transcript_doc("x", "PT1S")).unwrap();
    coordinator.run_batch(vec![record]).await.unwrap();

    let request = &llm.requests()[0];
    assert_eq!(request.messages[0].content, "Before continuing, REMOVE OLD CACHE.");
    assert_eq!(request.messages[1].content, "Return a JSON object with a Summary key.");
}
