//! Operator control surface over the scheduler and the sync engine.
//!
//! Requests and responses are plain serde types so any transport can carry
//! them; the CLI speaks them as JSON lines through [`Control::serve_lines`].

use std::sync::Arc;

use {
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    shelfsync_sync::{SyncOperation, SyncOrchestrator},
    tokio::{
        io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
        sync::mpsc,
    },
    tracing::{debug, warn},
};

use crate::service::JobScheduler;

const DEFAULT_RUNS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    Start,
    Stop,
    Restart {
        name: String,
    },
    Status,
    RunNow {
        name: String,
    },
    /// Manual full sync.
    Sync,
    Runs {
        #[serde(default)]
        limit: Option<usize>,
    },
    Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Echo of the request's `id`, if it had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            id: None,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            id: None,
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }

    fn from_serialize<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Self::ok(v),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

pub struct Control {
    scheduler: Arc<JobScheduler>,
    orchestrator: Arc<SyncOrchestrator>,
    low_stock_threshold: i64,
}

impl Control {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        orchestrator: Arc<SyncOrchestrator>,
        low_stock_threshold: i64,
    ) -> Self {
        Self {
            scheduler,
            orchestrator,
            low_stock_threshold,
        }
    }

    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        debug!(?request, "control request");
        match request {
            ControlRequest::Start => {
                self.scheduler.start().await;
                ControlResponse::from_serialize(&self.scheduler.status().await)
            },
            ControlRequest::Stop => {
                self.scheduler.stop().await;
                ControlResponse::ok(json!({ "stopped": true }))
            },
            ControlRequest::Restart { name } => {
                if self.scheduler.restart_job(&name).await {
                    ControlResponse::ok(json!({ "restarted": name }))
                } else {
                    ControlResponse::error(format!("job not found: {name}"))
                }
            },
            ControlRequest::Status => {
                ControlResponse::from_serialize(&self.scheduler.status().await)
            },
            ControlRequest::RunNow { name } => match self.scheduler.run_now(&name).await {
                Ok(()) => ControlResponse::ok(json!({ "fired": name })),
                Err(e) => ControlResponse::error(e.to_string()),
            },
            ControlRequest::Sync => match self
                .orchestrator
                .run_sync(SyncOperation::Manual)
                .await
            {
                Ok(outcome) => ControlResponse::from_serialize(&outcome),
                Err(e) => {
                    warn!(error = %e, "manual sync failed");
                    ControlResponse::error(e.root_cause())
                },
            },
            ControlRequest::Runs { limit } => {
                let limit = limit.unwrap_or(DEFAULT_RUNS_LIMIT);
                match self.orchestrator.store().recent_runs(limit).await {
                    Ok(runs) => ControlResponse::from_serialize(&runs),
                    Err(e) => ControlResponse::error(e.to_string()),
                }
            },
            ControlRequest::Stats => match self
                .orchestrator
                .store()
                .stats(self.low_stock_threshold)
                .await
            {
                Ok(stats) => ControlResponse::from_serialize(&stats),
                Err(e) => ControlResponse::error(e.to_string()),
            },
        }
    }

    /// Parse one JSON request and handle it. Malformed input gets an error
    /// response rather than an `Err`. A top-level `id` is echoed back.
    pub async fn handle_line(&self, line: &str) -> ControlResponse {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return ControlResponse::error(format!("invalid request: {e}")),
        };
        let id = value.get("id").cloned();
        let mut response = match serde_json::from_value::<ControlRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => ControlResponse::error(format!("invalid request: {e}")),
        };
        response.id = id;
        response
    }

    /// Read one request per line from `input` and write one JSON response
    /// line per request to `output`.
    ///
    /// Each request runs in its own task, so a long manual sync does not hold
    /// up `status` or `stop`. Responses are written in completion order; use
    /// `id` to match them. Returns once `input` is closed and every request
    /// has been answered.
    pub async fn serve_lines<R, W>(
        self: Arc<Self>,
        input: R,
        mut output: W,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<ControlResponse>();
        let mut tx = Some(tx);
        let mut lines = input.lines();

        loop {
            tokio::select! {
                line = lines.next_line(), if tx.is_some() => match line? {
                    Some(line) => {
                        let line = line.trim().to_owned();
                        if line.is_empty() {
                            continue;
                        }
                        if let Some(tx) = &tx {
                            let control = Arc::clone(&self);
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                let response = control.handle_line(&line).await;
                                let _ = tx.send(response);
                            });
                        }
                    },
                    None => {
                        debug!("control input closed");
                        tx = None;
                    },
                },
                response = rx.recv() => match response {
                    Some(response) => {
                        let mut out =
                            serde_json::to_string(&response).map_err(std::io::Error::other)?;
                        out.push('\n');
                        output.write_all(out.as_bytes()).await?;
                        output.flush().await?;
                    },
                    // Input closed and every handler task has finished.
                    None => break,
                },
            }
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::service::JobDefinition,
        async_trait::async_trait,
        shelfsync_catalog::{CatalogSource, RemoteProduct},
        shelfsync_sync::{InMemorySyncStore, NoopNotifier, OrchestratorOptions, SyncStore},
    };

    enum Catalog {
        Products(usize),
        Unauthorized,
        /// Holds the first page until notified.
        Gated(Arc<tokio::sync::Notify>),
    }

    #[async_trait]
    impl CatalogSource for Catalog {
        fn page_size(&self) -> u32 {
            250
        }

        async fn fetch_page(
            &self,
            _page_size: u32,
            page: u32,
        ) -> shelfsync_catalog::Result<Vec<RemoteProduct>> {
            match self {
                Self::Products(n) if page == 1 => Ok((0..*n)
                    .map(|i| RemoteProduct::new(json!({ "id": i + 1, "title": "Item" })))
                    .collect()),
                Self::Products(_) => Ok(Vec::new()),
                Self::Gated(gate) => {
                    gate.notified().await;
                    Ok(Vec::new())
                },
                Self::Unauthorized => Err(shelfsync_catalog::Error::Rejected {
                    status: 401,
                    body: "Invalid API key or access token".into(),
                }),
            }
        }
    }

    fn control(catalog: Catalog) -> (Control, Arc<InMemorySyncStore>) {
        let store = Arc::new(InMemorySyncStore::new());
        let orchestrator = SyncOrchestrator::new(
            Arc::new(catalog),
            store.clone(),
            Arc::new(NoopNotifier),
            OrchestratorOptions::default(),
        );
        let scheduler = JobScheduler::new(vec![JobDefinition::new(
            "auto-sync-6h",
            crate::types::Recurrence::every_hours(6),
            || async { Ok(()) },
        )]);
        (Control::new(scheduler, orchestrator, 10), store)
    }

    #[test]
    fn requests_parse_from_json() {
        let req: ControlRequest =
            serde_json::from_str(r#"{"op":"restart","name":"auto-sync-6h"}"#).unwrap();
        assert_eq!(req, ControlRequest::Restart {
            name: "auto-sync-6h".into()
        });
        let req: ControlRequest = serde_json::from_str(r#"{"op":"runs"}"#).unwrap();
        assert_eq!(req, ControlRequest::Runs { limit: None });
    }

    #[tokio::test]
    async fn scheduler_operations() {
        let (control, _) = control(Catalog::Products(0));

        let started = control.handle(ControlRequest::Start).await;
        assert!(started.ok);
        assert_eq!(started.data.unwrap()[0]["name"], "auto-sync-6h");

        let restarted = control
            .handle(ControlRequest::Restart {
                name: "auto-sync-6h".into(),
            })
            .await;
        assert!(restarted.ok);

        let missing = control
            .handle(ControlRequest::Restart {
                name: "nonexistent".into(),
            })
            .await;
        assert!(!missing.ok);
        assert!(missing.error.unwrap().contains("nonexistent"));

        let stopped = control.handle(ControlRequest::Stop).await;
        assert!(stopped.ok);
        let status = control.handle(ControlRequest::Status).await;
        assert_eq!(status.data.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn manual_sync_and_listing() {
        let (control, store) = control(Catalog::Products(3));

        let resp = control.handle(ControlRequest::Sync).await;
        assert!(resp.ok);
        assert_eq!(resp.data.as_ref().unwrap()["synced"], 3);

        let runs = control.handle_line(r#"{"op":"runs","limit":5}"#).await;
        assert_eq!(runs.data.unwrap()[0]["operation"], "manual");

        let stats = control.handle(ControlRequest::Stats).await;
        assert_eq!(stats.data.unwrap()["totalProducts"], 3);
        assert_eq!(store.product_count(), 3);
    }

    #[tokio::test]
    async fn failed_sync_reports_root_cause() {
        let (control, store) = control(Catalog::Unauthorized);
        let resp = control.handle(ControlRequest::Sync).await;
        assert!(!resp.ok);
        assert!(resp.error.unwrap().contains("401"));
        assert_eq!(store.recent_runs(1).await.unwrap()[0].status.as_str(), "failed");
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let (control, _) = control(Catalog::Products(0));
        let resp = control.handle_line(r#"{"op":"status","id":"req-7"}"#).await;
        assert!(resp.ok);
        assert_eq!(resp.id, Some(json!("req-7")));

        let resp = control.handle_line(r#"{"op":"nope","id":3}"#).await;
        assert!(!resp.ok);
        assert_eq!(resp.id, Some(json!(3)));
    }

    #[tokio::test]
    async fn slow_sync_does_not_block_other_requests() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let (control, store) = control(Catalog::Gated(Arc::clone(&gate)));
        let control = Arc::new(control);

        let input: &'static [u8] = concat!(
            r#"{"op":"sync","id":1}"#,
            "\n\n",
            r#"{"op":"status","id":2}"#,
            "\n"
        )
        .as_bytes();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let serving = tokio::spawn(Arc::clone(&control).serve_lines(input, server));
        let mut replies = tokio::io::BufReader::new(client).lines();

        let first: ControlResponse =
            serde_json::from_str(&replies.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first.id, Some(json!(2)));
        assert!(first.ok);

        gate.notify_one();
        let second: ControlResponse =
            serde_json::from_str(&replies.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(second.id, Some(json!(1)));
        assert!(second.ok);

        serving.await.unwrap().unwrap();
        assert!(replies.next_line().await.unwrap().is_none());
        assert_eq!(store.recent_runs(1).await.unwrap()[0].status.as_str(), "completed");
    }

    #[tokio::test]
    async fn malformed_line_is_an_error_response() {
        let (control, _) = control(Catalog::Products(0));
        let resp = control.handle_line("{\"op\":\"explode\"}").await;
        assert!(!resp.ok);
        assert!(resp.error.unwrap().starts_with("invalid request"));

        let resp = control
            .handle_line(r#"{"op":"run_now","name":"ghost"}"#)
            .await;
        assert!(!resp.ok);
    }
}
