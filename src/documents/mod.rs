//! Knowledge base: the user's uploaded documents

pub mod upload;

pub use upload::{UploadAccepted, UploadError, UploadPoller};

use crate::gateway::{ApiCall, ApiGateway};
use crate::session::{NoticeLevel, Session};
use serde::Deserialize;

#[derive(Deserialize)]
struct DocumentList {
    documents: Vec<String>,
}

pub struct DocumentService<'a> {
    gateway: &'a ApiGateway,
}

impl<'a> DocumentService<'a> {
    pub fn new(gateway: &'a ApiGateway) -> Self {
        Self { gateway }
    }

    /// Names of the indexed documents; empty on any failure
    pub async fn list_documents(&self, session: &mut Session) -> Vec<String> {
        let outcome = self.gateway.call(session, ApiCall::get("/documents")).await;
        outcome
            .ok()
            .and_then(|resp| resp.json::<DocumentList>())
            .map(|list| list.documents)
            .unwrap_or_default()
    }

    pub async fn delete_document(&self, session: &mut Session, name: &str) -> bool {
        let call = ApiCall::delete(document_path(name));
        let deleted = self.gateway.call(session, call).await.ok().is_some();
        if deleted {
            tracing::info!("Deleted document {}", name);
            session.notify(NoticeLevel::Success, "Document deleted successfully!");
        } else if session.is_authenticated() {
            session.notify(NoticeLevel::Error, "Failed to delete document.");
        }
        deleted
    }

    pub async fn clear_documents(&self, session: &mut Session) -> bool {
        let cleared = self
            .gateway
            .call(session, ApiCall::delete("/documents"))
            .await
            .ok()
            .is_some();
        if cleared {
            tracing::info!("Cleared all documents");
            session.notify(NoticeLevel::Success, "All documents cleared!");
        } else if session.is_authenticated() {
            session.notify(NoticeLevel::Error, "Failed to clear documents.");
        }
        cleared
    }
}

/// `/documents/{name}` with the name encoded as a single path segment
fn document_path(name: &str) -> String {
    let encoded = url::Url::parse("http://localhost/documents")
        .ok()
        .and_then(|mut url| {
            url.path_segments_mut().ok()?.push(name);
            Some(url.path().to_string())
        });
    encoded.unwrap_or_else(|| format!("/documents/{}", name))
}
