//! Paged HTTP client for the upstream projects/documents API (spec §6).
//! Modeled on `scrapers/http_client/mod.rs`'s `HttpClient` construction
//! (`Client::builder().timeout(...)`) and `llm/client/mod.rs`'s typed
//! request/response structs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Settings;
use crate::models::{DocumentDescriptor, Project};

/// Project/document discovery, behind a trait so `Orchestrator` can be
/// driven by an in-memory fake in tests (the same seam `Embedder` and
/// `KeywordExtractor` use for their pluggable backends).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, MetadataClientError>;
    async fn list_documents(
        &self,
        project_id: &str,
    ) -> Result<Vec<DocumentDescriptor>, MetadataClientError>;
}

#[derive(Debug, Error)]
pub enum MetadataClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct ProjectsPage {
    items: Vec<ProjectItem>,
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProjectItem {
    project_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DocumentsPage {
    items: Vec<DocumentItem>,
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DocumentItem {
    document_id: String,
    name: String,
    s3_key: String,
}

pub struct MetadataClient {
    client: Client,
    base_url: String,
    project_page_size: u32,
    docs_page_size: u32,
}

impl MetadataClient {
    pub fn from_settings(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("metadata client http client");

        Self {
            client,
            base_url: settings.document_search_url.trim_end_matches('/').to_string(),
            project_page_size: settings.get_project_page,
            docs_page_size: settings.get_docs_page,
        }
    }

    /// Page through `GET {base}/projects`, following `next_page` until null.
    pub async fn list_projects(&self) -> Result<Vec<Project>, MetadataClientError> {
        let mut projects = Vec::new();
        let mut page = 1u32;

        loop {
            let url = format!(
                "{}/projects?page={}&size={}",
                self.base_url, page, self.project_page_size
            );
            let response: ProjectsPage = self.client.get(&url).send().await?.json().await?;

            projects.extend(response.items.into_iter().map(|item| Project {
                project_id: item.project_id,
                project_name: item.name,
                metadata: None,
            }));

            match response.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(projects)
    }

    /// Page through `GET {base}/projects/{id}/documents`, following
    /// `next_page` until null.
    pub async fn list_documents(
        &self,
        project_id: &str,
    ) -> Result<Vec<DocumentDescriptor>, MetadataClientError> {
        let mut documents = Vec::new();
        let mut page = 1u32;

        loop {
            let url = format!(
                "{}/projects/{}/documents?page={}&size={}",
                self.base_url, project_id, page, self.docs_page_size
            );
            let response: DocumentsPage = self.client.get(&url).send().await?.json().await?;

            documents.extend(response.items.into_iter().map(|item| DocumentDescriptor {
                document_id: item.document_id,
                project_id: project_id.to_string(),
                name: item.name,
                s3_key: item.s3_key,
            }));

            match response.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(documents)
    }
}

#[async_trait]
impl MetadataSource for MetadataClient {
    async fn list_projects(&self) -> Result<Vec<Project>, MetadataClientError> {
        MetadataClient::list_projects(self).await
    }

    async fn list_documents(
        &self,
        project_id: &str,
    ) -> Result<Vec<DocumentDescriptor>, MetadataClientError> {
        MetadataClient::list_documents(self, project_id).await
    }
}
