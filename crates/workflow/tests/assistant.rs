//! Assistant routing against a live store.

mod common;

use std::sync::Arc;

use common::*;
use hoi_workflow::assistant::{DisabledGenerator, DISABLED_REPLY};
use hoi_workflow::{NewSubmission, ReplySource};

#[tokio::test]
async fn stats_question_uses_live_counts_not_generator() {
    let desk = Desk::new().await;
    for _ in 0..3 {
        desk.lifecycle
            .submit(
                NewSubmission::from_form_body(SUBMITTER, serde_json::json!({"form_type": "Academics"})),
                T0,
            )
            .await
            .unwrap();
    }
    let generator = Arc::new(StubGenerator::answering("should not be used"));
    let assistant = desk.assistant(generator.clone());

    let reply = assistant.reply("show me pending stats", T0).await;
    assert_eq!(reply.source, ReplySource::Summary);
    assert!(reply.text.contains("Total Submissions: 3"));
    assert!(reply.text.contains("Pending Approvals: 0"));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn activity_question_lists_last_five() {
    let desk = Desk::new().await;
    for _ in 0..7 {
        desk.lifecycle
            .submit(NewSubmission::from_form_body(SUBMITTER, serde_json::json!({})), T0)
            .await
            .unwrap();
    }
    let assistant = desk.assistant(Arc::new(DisabledGenerator));

    let reply = assistant.reply("recent logs", T0).await;
    assert_eq!(reply.source, ReplySource::Activity);
    let lines: Vec<&str> = reply.text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("1. [09:00:00] Form Submit: Unknown Form:"));
    assert!(lines[5].starts_with("5. "));
}

#[tokio::test]
async fn empty_log_has_fixed_answer() {
    let desk = Desk::new().await;
    let assistant = desk.assistant(Arc::new(DisabledGenerator));

    let reply = assistant.reply("usage", T0).await;
    assert_eq!(reply.text, "No recent activity logs found.");
}

#[tokio::test]
async fn other_questions_are_generated_verbatim() {
    let desk = Desk::new().await;
    let generator = Arc::new(StubGenerator::answering("Q3 revenue grew."));
    let assistant = desk.assistant(generator.clone());

    let reply = assistant.reply("How did revenue do?", T0).await;
    assert_eq!(reply.source, ReplySource::Generated);
    assert_eq!(reply.text, "Q3 revenue grew.");
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn generator_failure_yields_apology() {
    let desk = Desk::new().await;
    let assistant = desk.assistant(Arc::new(StubGenerator::failing()));

    let reply = assistant.reply("How did revenue do?", T0).await;
    assert_eq!(reply.source, ReplySource::Unavailable);
    assert!(reply.text.starts_with("Sorry"));
}

#[tokio::test]
async fn disabled_generator_has_fixed_reply() {
    let desk = Desk::new().await;
    let assistant = desk.assistant(Arc::new(DisabledGenerator));

    let reply = assistant.reply("write a memo", T0).await;
    assert_eq!(reply.text, DISABLED_REPLY);
}

#[tokio::test]
async fn assistant_never_writes() {
    let desk = Desk::new().await;
    let assistant = desk.assistant(Arc::new(DisabledGenerator));
    let before = desk.activity().await.len();

    assistant.reply("stats", T0).await;
    assistant.reply("recent activity", T0).await;
    assistant.reply("hello", T0).await;
    assert_eq!(desk.activity().await.len(), before);
}
