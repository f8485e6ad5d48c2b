use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Url};
use tokio::time::timeout;

use crate::error::{Result, TaskError};
use crate::pool::Outcome;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:97.0) Gecko/20100101 Firefox/97.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub url: String,
    pub timeout: Duration,
}

/// Build the HTTP client shared by every fetch in a batch.
pub fn client(user_agent: &str) -> Result<Client> {
    let client = Client::builder().user_agent(user_agent).build()?;
    Ok(client)
}

/// Read a URL list, one per line. Blank lines are skipped.
pub async fn read_urls(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(parse_urls(&contents))
}

pub fn parse_urls(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn batch(urls: Vec<String>, timeout: Duration) -> Vec<FetchTask> {
    urls.into_iter()
        .map(|url| FetchTask { url, timeout })
        .collect()
}

/// Fetch one resource under the task's timeout and return its body.
pub async fn fetch_resource(client: Client, task: Arc<FetchTask>) -> Outcome<Bytes> {
    let url = parse_target(&task.url)?;
    match timeout(task.timeout, get(&client, url)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(TaskError::Timeout(task.timeout)),
    }
}

fn parse_target(raw: &str) -> Outcome<Url> {
    let url = Url::parse(raw).map_err(|e| TaskError::Construction(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(TaskError::Construction(format!(
            "{raw}: unsupported scheme {scheme}"
        ))),
    }
}

async fn get(client: &Client, url: Url) -> Outcome<Bytes> {
    let response = client.get(url).send().await.map_err(request_failure)?;
    let response = response.error_for_status().map_err(request_failure)?;
    response.bytes().await.map_err(request_failure)
}

fn request_failure(err: reqwest::Error) -> TaskError {
    if err.is_builder() {
        TaskError::Construction(err.to_string())
    } else {
        TaskError::Transport(err.to_string())
    }
}
