//! Test utilities and common setup.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;

use paperqa::api::{self, AppState};
use paperqa::chat::Message;
use paperqa::db::Database;
use paperqa::document::{Document, DocumentProcessor, DocumentRepository};
use paperqa::llm::{GeneratorError, ModelInfo, ResponseGenerator};

/// One scripted generator outcome.
pub enum ScriptedReply {
    Text(String),
    Failure(String),
}

/// Generator double that replays scripted outcomes in order and echoes the
/// prompt once the script is exhausted.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<ScriptedReply>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
        })
    }

    pub async fn push_text(&self, text: &str) {
        self.replies
            .lock()
            .await
            .push_back(ScriptedReply::Text(text.to_string()));
    }

    pub async fn push_failure(&self, message: &str) {
        self.replies
            .lock()
            .await
            .push_back(ScriptedReply::Failure(message.to_string()));
    }
}

#[async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _context: &[Document],
        _history: &[Message],
        _model: &str,
    ) -> Result<String, GeneratorError> {
        match self.replies.lock().await.pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Failure(message)) => Err(GeneratorError::Api {
                status: 502,
                message,
            }),
            None => Ok(format!("echo: {prompt}")),
        }
    }
}

/// Handles to the application under test.
pub struct TestApp {
    pub state: AppState,
    pub generator: Arc<ScriptedGenerator>,
    /// Keeps the upload directory alive for the test's duration.
    pub _data_dir: TempDir,
}

fn test_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "deepseek-chat".to_string(),
            name: "DeepSeek Chat".to_string(),
            description: "General-purpose chat model".to_string(),
        },
        ModelInfo {
            id: "deepseek-reasoner".to_string(),
            name: "DeepSeek Reasoner".to_string(),
            description: "Reasoning model for harder questions".to_string(),
        },
    ]
}

/// Create a test application over an in-memory database and a scripted
/// generator.
pub async fn test_app() -> (axum::Router, TestApp) {
    let db = Database::in_memory().await.unwrap();
    let documents = DocumentRepository::new(db.pool().clone());

    let data_dir = TempDir::new().unwrap();
    let processor = DocumentProcessor::new(data_dir.path());
    processor.ensure_directories().await.unwrap();

    let generator = ScriptedGenerator::new();
    let state = AppState::new(
        documents,
        processor,
        generator.clone() as Arc<dyn ResponseGenerator>,
        test_models(),
        "deepseek-chat",
    );
    let router = api::create_router(state.clone());

    (
        router,
        TestApp {
            state,
            generator,
            _data_dir: data_dir,
        },
    )
}

/// Serve the router on an ephemeral port and return its address.
pub async fn spawn_server(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
