use serde_json::json;
use webhook_queue::domain::job::WebhookJobData;
use webhook_queue::processor::mock::MockProcessor;
use webhook_queue::processor::WebhookProcessor;

fn job_data(event_id: &str) -> WebhookJobData {
    WebhookJobData {
        event_type: "payment.paid".to_string(),
        event_data: json!({"payment_id": "pay_001"}),
        event_id: event_id.to_string(),
        webhook_db_id: 1,
        raw_payload: Some("{}".to_string()),
    }
}

#[tokio::test]
async fn default_behavior_succeeds_first_try() {
    let processor = MockProcessor::new("");
    let result = processor.process(&job_data("evt_123")).await.expect("success");
    assert_eq!(result["processed"], json!(true));
    assert_eq!(processor.calls(), 1);
}

#[tokio::test]
async fn always_failure_never_recovers() {
    let processor = MockProcessor::new("ALWAYS_FAILURE");
    for _ in 0..3 {
        assert!(processor.process(&job_data("evt_456")).await.is_err());
    }
    assert_eq!(processor.calls(), 3);
}

#[tokio::test]
async fn fail_twice_recovers_on_the_third_attempt() {
    let processor = MockProcessor::new("FAIL_TWICE");
    assert!(processor.process(&job_data("evt_789")).await.is_err());
    assert!(processor.process(&job_data("evt_789")).await.is_err());
    let result = processor.process(&job_data("evt_789")).await.expect("third attempt");
    assert_eq!(result["call"], json!(3));
}
