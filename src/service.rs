use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info, warn};

use crate::{
    error::{ParseError, RenderError},
    helpers::{
        aggregate::{aggregate, Aggregate},
        delivery::{DeliverySink, ReportDocument},
        llm::LlmInvoker,
        retriever::MessageRetriever,
        storage::{report_file_name, ArtifactStore},
        summary::{failure_notice, report_summary},
        validator::{validate, ValidationPolicy, ValidationVerdict, VerdictStatus},
        xlsx::ReportRenderer,
    },
    models::{calendar::MonthKey, report::parse_raw_report},
};

/// Configuration for the report service
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Whose worklog this is; names the rendered file.
    pub owner: String,
    pub chat_id: String,
    /// Where reports and notices are delivered.
    pub destination: String,
    pub prompt_template: String,
    pub policy: ValidationPolicy,
    pub store: ArtifactStore,
}

/// A validated month together with its totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub verdict: ValidationVerdict,
    pub aggregate: Aggregate,
}

/// What a pipeline run ended with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub month: MonthKey,
    pub status: VerdictStatus,
    pub warnings: usize,
    pub missing_days: usize,
    /// Absent when the verdict failed and nothing was rendered.
    pub report_path: Option<PathBuf>,
    /// Acknowledgement from the delivery sink, for the report or the failure notice.
    pub delivery_id: String,
}

/// Sequences retrieval, report generation, validation, rendering and delivery
/// for one month at a time.
#[derive(Clone)]
pub struct ReportService {
    pub retriever: Arc<dyn MessageRetriever>,
    pub llm: Arc<dyn LlmInvoker>,
    pub sink: Arc<dyn DeliverySink>,
    pub config: ReportConfig,
}

impl ReportService {
    pub fn new(
        retriever: Arc<dyn MessageRetriever>,
        llm: Arc<dyn LlmInvoker>,
        sink: Arc<dyn DeliverySink>,
        config: ReportConfig,
    ) -> Self {
        info!("Creating new ReportService instance for {}", config.owner);
        Self {
            retriever,
            llm,
            sink,
            config,
        }
    }

    /// Create an Axum router for the report service
    pub fn router(self) -> Router {
        info!("Creating report service router");
        let shared_state = Arc::new(self);

        Router::new()
            .route("/report-run", post(report_run))
            .route("/report-validate", post(report_validate))
            .route("/health", get(|| async { "OK" }))
            .with_state(shared_state)
    }

    /// Parse, validate and aggregate a raw report. Touches neither disk nor network.
    pub fn evaluate(&self, raw_json: &str, month: MonthKey) -> Result<Evaluation, ParseError> {
        let report = parse_raw_report(raw_json, month)?;
        let verdict = validate(&report, &self.config.policy);
        let aggregate = aggregate(&verdict.normalized_report);

        Ok(Evaluation { verdict, aggregate })
    }

    pub fn build_document(
        &self,
        evaluation: &Evaluation,
        generated_on: NaiveDate,
    ) -> Result<ReportDocument, RenderError> {
        let bytes = ReportRenderer::new(generated_on)
            .render(&evaluation.verdict, &evaluation.aggregate)?;

        Ok(ReportDocument {
            file_name: report_file_name(
                &self.config.owner,
                evaluation.verdict.month(),
                generated_on,
            ),
            bytes,
        })
    }

    /// Run the whole pipeline for `month`. Any error is reported to the
    /// destination as a failure notice before it is returned.
    pub async fn process_month(&self, month: MonthKey) -> anyhow::Result<PipelineOutcome> {
        info!("Processing worklog report for {}", month);

        match self.run_pipeline(month).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Report pipeline for {} failed: {:#}", month, e);
                let notice = failure_notice(month, &format!("{:#}", e));
                if let Err(notify_err) = self.sink.notify(&self.config.destination, &notice).await
                {
                    error!("Failed to send failure notice: {}", notify_err);
                }
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, month: MonthKey) -> anyhow::Result<PipelineOutcome> {
        let store = &self.config.store;

        let messages = self
            .retriever
            .fetch(&self.config.chat_id, month)
            .await
            .context("failed to fetch chat messages")?;
        store
            .write_json(&store.raw_messages_path(month), &messages)
            .await?;

        let history = serde_json::to_value(&messages)?;
        let raw_json = self
            .llm
            .generate(&self.config.prompt_template, &history)
            .await
            .context("failed to generate the raw report")?;
        store
            .write_text(&store.raw_report_path(month), &raw_json)
            .await?;

        let evaluation = self.evaluate(&raw_json, month)?;
        let verdict = &evaluation.verdict;
        info!(
            "Validated {}: {} with {} warning(s), {} missing day(s)",
            month,
            verdict.status.as_str(),
            verdict.warnings.len(),
            verdict.missing_days.len()
        );
        store
            .write_json(
                &store.normalized_report_path(month),
                &verdict.normalized_report.to_raw(),
            )
            .await?;

        let summary = report_summary(verdict, &evaluation.aggregate, &self.config.policy);

        if !verdict.is_renderable() {
            warn!("Verdict for {} is FAILED, skipping render and delivery", month);
            let delivery_id = self
                .sink
                .notify(&self.config.destination, &failure_notice(month, &summary))
                .await?;
            return Ok(self.outcome(&evaluation, None, delivery_id));
        }

        let generated_on = Local::now().date_naive();
        let document = self.build_document(&evaluation, generated_on)?;
        let report_path = store.report_path(&self.config.owner, month, generated_on);
        store.write_report(&report_path, &document.bytes).await?;

        let delivery_id = self
            .sink
            .send(&self.config.destination, &document, &summary)
            .await?;
        info!("Report for {} delivered with ID: {}", month, delivery_id);

        Ok(self.outcome(&evaluation, Some(report_path), delivery_id))
    }

    fn outcome(
        &self,
        evaluation: &Evaluation,
        report_path: Option<PathBuf>,
        delivery_id: String,
    ) -> PipelineOutcome {
        PipelineOutcome {
            month: evaluation.verdict.month(),
            status: evaluation.verdict.status,
            warnings: evaluation.verdict.warnings.len(),
            missing_days: evaluation.verdict.missing_days.len(),
            report_path,
            delivery_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MonthParams {
    month: MonthKey,
}

// Route handlers
async fn report_run(
    State(service): State<Arc<ReportService>>,
    Json(params): Json<MonthParams>,
) -> Result<Json<PipelineOutcome>, (StatusCode, String)> {
    info!("Received report run request for {}", params.month);

    match service.process_month(params.month).await {
        Ok(outcome) => {
            info!("Report for {} processed: {:?}", params.month, outcome.status);
            Ok(Json(outcome))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error processing report: {:#}", e),
        )),
    }
}

async fn report_validate(
    State(service): State<Arc<ReportService>>,
    Query(params): Query<MonthParams>,
    body: String,
) -> Result<Json<Evaluation>, (StatusCode, String)> {
    info!("Validating submitted report for {}", params.month);

    service
        .evaluate(&body, params.month)
        .map(Json)
        .map_err(|e| {
            warn!("Submitted report for {} rejected: {}", params.month, e);
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeliveryError, LlmError};
    use crate::models::raw::ChatMessage;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct NoMessages;

    #[async_trait]
    impl MessageRetriever for NoMessages {
        async fn fetch(&self, _: &str, _: MonthKey) -> anyhow::Result<Vec<ChatMessage>> {
            Ok(Vec::new())
        }
    }

    struct CannedLlm(String);

    #[async_trait]
    impl LlmInvoker for CannedLlm {
        async fn generate(&self, _: &str, _: &serde_json::Value) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct Outbox {
        notices: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeliverySink for Outbox {
        async fn send(
            &self,
            _: &str,
            document: &ReportDocument,
            _: &str,
        ) -> Result<String, DeliveryError> {
            Ok(document.file_name.clone())
        }

        async fn notify(&self, _: &str, text: &str) -> Result<String, DeliveryError> {
            self.notices.lock().unwrap().push(text.to_string());
            Ok("notice".to_string())
        }
    }

    fn service(dir: &std::path::Path, reply: &str) -> (ReportService, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let config = ReportConfig {
            owner: "Tester".to_string(),
            chat_id: "worklog".to_string(),
            destination: "boss@example.com".to_string(),
            prompt_template: "Build the report.".to_string(),
            policy: ValidationPolicy::default(),
            store: ArtifactStore::new(dir.join("data"), dir.join("reports")),
        };
        let service = ReportService::new(
            Arc::new(NoMessages),
            Arc::new(CannedLlm(reply.to_string())),
            outbox.clone(),
            config,
        );
        (service, outbox)
    }

    const FEBRUARY: &str = r#"{
        "days": [
            {"date": "2027-02-01", "done": [
                {"task": "daily", "duration": 1, "type": "meeting"},
                {"task": "abrau: tests", "duration": 7, "type": "task", "tags": ["qa"]}
            ]}
        ],
        "not-mentioned-days": []
    }"#;

    #[test]
    fn evaluate_reports_missing_days_without_io() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path(), "");
        let february = MonthKey::new(2027, 2).unwrap();

        let evaluation = service.evaluate(FEBRUARY, february).unwrap();
        assert_eq!(evaluation.verdict.status, VerdictStatus::OkWithWarnings);
        assert_eq!(evaluation.verdict.missing_days.len(), 27);
        assert_eq!(evaluation.aggregate.month_total_hours, 8);
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn unparseable_reply_sends_failure_notice() {
        let dir = tempfile::tempdir().unwrap();
        let (service, outbox) = service(dir.path(), r#"{"days": [{"date": "2027-02-30"}]}"#);
        let february = MonthKey::new(2027, 2).unwrap();

        assert!(service.process_month(february).await.is_err());

        let notices = outbox.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("2027-02-30"));
        assert!(dir.path().join("data/report_data_2027-02.json").exists());
        assert!(!dir.path().join("reports").exists());
    }

    #[tokio::test]
    async fn validate_endpoint_returns_verdict_json() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path(), "");
        let app = service.router();

        let response = app
            .oneshot(
                Request::post("/report-validate?month=2027-02")
                    .body(Body::from(FEBRUARY))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["verdict"]["status"], "OK_WITH_WARNINGS");
        assert_eq!(json["aggregate"]["monthTotalHours"], 8);
    }

    #[tokio::test]
    async fn validate_endpoint_rejects_malformed_dates() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path(), "");
        let app = service.router();

        let response = app
            .oneshot(
                Request::post("/report-validate?month=2025-06")
                    .body(Body::from(r#"{"days": [{"date": "2025-06-31", "done": []}]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(dir.path(), "");

        let response = service
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
