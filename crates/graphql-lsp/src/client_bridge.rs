//! Forwards project events to the editor.
//!
//! Projects report through synchronous traits; the bridge queues each event
//! and a single task delivers them in order over the LSP connection.

use crate::convert::{lsp_diagnostic, lsp_range, lsp_uri};
use graphql_project::{
    DebugLog, Decoration, FileDiagnostics, LoadingNotifier, ProjectError, ProjectListener,
};
use lsp_types::notification::{Notification, Progress};
use lsp_types::request::WorkDoneProgressCreate;
use lsp_types::{
    MessageType, NumberOrString, ProgressParams, ProgressParamsValue, WorkDoneProgress,
    WorkDoneProgressBegin, WorkDoneProgressCreateParams, WorkDoneProgressEnd,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_lsp_server::Client;

/// Inline decorations for one document
pub enum EngineDecorations {}

impl Notification for EngineDecorations {
    type Params = DecorationsParams;
    const METHOD: &'static str = "apollographql/engineDecorations";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecorationsParams {
    pub document: String,
    pub decorations: Vec<DecorationPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecorationPayload {
    pub range: lsp_types::Range,
    pub message: String,
}

impl DecorationsParams {
    fn new(document: &str, decorations: Vec<Decoration>) -> Self {
        Self {
            document: document.to_string(),
            decorations: decorations
                .into_iter()
                .map(|decoration| DecorationPayload {
                    range: lsp_range(decoration.range),
                    message: decoration.message,
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
enum Outbound {
    Diagnostics(FileDiagnostics),
    Decorations(DecorationsParams),
    ProgressBegin { token: u64, title: String },
    ProgressEnd { token: u64 },
    Message(MessageType, String),
    Log(MessageType, String),
}

fn progress_token(token: u64) -> NumberOrString {
    NumberOrString::String(format!("graphql-loading-{token}"))
}

/// The editor side of every project
#[derive(Debug, Clone)]
pub struct ClientBridge {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ClientBridge {
    /// Start delivering to `client`. Must be called inside a tokio runtime.
    pub fn spawn(client: Client) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(deliver(client, receiver));
        Self { sender }
    }

    fn send(&self, event: Outbound) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Client connection closed; dropping event");
        }
    }
}

async fn deliver(client: Client, mut receiver: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(event) = receiver.recv().await {
        match event {
            Outbound::Diagnostics(batch) => {
                let Some(uri) = lsp_uri(&batch.uri) else {
                    tracing::warn!(uri = %batch.uri, "Cannot publish diagnostics for URI");
                    continue;
                };
                let diagnostics = batch.diagnostics.iter().map(lsp_diagnostic).collect();
                client.publish_diagnostics(uri, diagnostics, None).await;
            }
            Outbound::Decorations(params) => {
                client.send_notification::<EngineDecorations>(params).await;
            }
            Outbound::ProgressBegin { token, title } => {
                let token = progress_token(token);
                let created = client
                    .send_request::<WorkDoneProgressCreate>(WorkDoneProgressCreateParams {
                        token: token.clone(),
                    })
                    .await;
                if let Err(error) = created {
                    tracing::debug!(error = %error, "Client declined progress");
                    continue;
                }
                client
                    .send_notification::<Progress>(ProgressParams {
                        token,
                        value: ProgressParamsValue::WorkDone(WorkDoneProgress::Begin(
                            WorkDoneProgressBegin {
                                title,
                                ..Default::default()
                            },
                        )),
                    })
                    .await;
            }
            Outbound::ProgressEnd { token } => {
                client
                    .send_notification::<Progress>(ProgressParams {
                        token: progress_token(token),
                        value: ProgressParamsValue::WorkDone(WorkDoneProgress::End(
                            WorkDoneProgressEnd::default(),
                        )),
                    })
                    .await;
            }
            Outbound::Message(kind, message) => client.show_message(kind, message).await,
            Outbound::Log(kind, message) => client.log_message(kind, message).await,
        }
    }
}

impl ProjectListener for ClientBridge {
    fn publish_diagnostics(&self, batch: FileDiagnostics) {
        self.send(Outbound::Diagnostics(batch));
    }

    fn publish_decorations(&self, uri: &str, decorations: Vec<Decoration>) {
        self.send(Outbound::Decorations(DecorationsParams::new(uri, decorations)));
    }

    fn report_error(&self, error: &ProjectError) {
        self.send(Outbound::Message(MessageType::ERROR, error.to_string()));
    }
}

impl LoadingNotifier for ClientBridge {
    fn started(&self, token: u64, title: &str) {
        self.send(Outbound::ProgressBegin {
            token,
            title: title.to_string(),
        });
    }

    fn completed(&self, token: u64) {
        self.send(Outbound::ProgressEnd { token });
    }

    fn show_error(&self, message: &str) {
        self.send(Outbound::Message(MessageType::ERROR, message.to_string()));
    }
}

/// The debug channel is the client's output panel
impl DebugLog for ClientBridge {
    fn info(&self, message: &str) {
        tracing::info!(target: "graphql::debug", "{message}");
        self.send(Outbound::Log(MessageType::INFO, message.to_string()));
    }

    fn warning(&self, message: &str) {
        tracing::warn!(target: "graphql::debug", "{message}");
        self.send(Outbound::Log(MessageType::WARNING, message.to_string()));
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "graphql::debug", "{message}");
        self.send(Outbound::Log(MessageType::ERROR, message.to_string()));
    }
}
