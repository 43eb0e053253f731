use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};

use crate::error::{AgentError, Result};
use crate::message::Message;

/// Durable backing for a [`Session`](crate::Session) transcript.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Every stored message, oldest first.
    async fn read(&self) -> Result<Vec<Message>>;
    /// Appends `messages` in order as a single write.
    async fn append(&self, messages: &[Message]) -> Result<()>;
    async fn reset(&self) -> Result<()>;
}

/// Transcript kept as JSON lines, one message per line.
///
/// A final line without its newline is the remains of an interrupted write
/// and is dropped on read; a malformed line anywhere else is an error.
#[derive(Debug, Clone)]
pub struct JsonlTranscriptStore {
    path: PathBuf,
}

impl JsonlTranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failure(&self, action: &str, err: impl std::fmt::Display) -> AgentError {
        AgentError::Storage(format!("{action} `{}`: {err}", self.path.display()))
    }
}

#[async_trait]
impl TranscriptStore for JsonlTranscriptStore {
    async fn read(&self) -> Result<Vec<Message>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.failure("cannot read transcript", err)),
        };

        let complete = raw.ends_with('\n');
        let lines: Vec<(usize, &str)> = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();
        let last = lines.len().saturating_sub(1);

        let mut messages = Vec::with_capacity(lines.len());
        for (pos, (lineno, line)) in lines.into_iter().enumerate() {
            match serde_json::from_str::<Message>(line) {
                Ok(message) => messages.push(message),
                Err(err) if pos == last && !complete => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        error = %err,
                        "dropping torn transcript record"
                    );
                }
                Err(err) => {
                    return Err(self.failure(&format!("corrupt record on line {}", lineno + 1), err))
                }
            }
        }
        Ok(messages)
    }

    async fn append(&self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut batch = String::new();
        for message in messages {
            batch.push_str(&serde_json::to_string(message)?);
            batch.push('\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| self.failure("cannot create directory for", err))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| self.failure("cannot open transcript", err))?;
        file.write_all(batch.as_bytes())
            .await
            .map_err(|err| self.failure("cannot write transcript", err))?;
        file.flush()
            .await
            .map_err(|err| self.failure("cannot flush transcript", err))
    }

    async fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.failure("cannot remove transcript", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlTranscriptStore::new(dir.path().join("absent.jsonl"));

        assert!(store.read().await.unwrap().is_empty());
        store.reset().await.unwrap();
    }

    #[tokio::test]
    async fn appends_batches_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlTranscriptStore::new(dir.path().join("nested/t.jsonl"));

        store.append(&[Message::user("a")]).await.unwrap();
        store
            .append(&[Message::assistant("b"), Message::observation("c")])
            .await
            .unwrap();

        assert_eq!(
            store.read().await.unwrap(),
            vec![
                Message::user("a"),
                Message::assistant("b"),
                Message::observation("c")
            ]
        );

        store.reset().await.unwrap();
        assert!(store.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drops_a_torn_final_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let store = JsonlTranscriptStore::new(&path);
        store.append(&[Message::user("kept")]).await.unwrap();
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str(r#"{"role":"assistant","cont"#);
        std::fs::write(&path, raw).unwrap();

        assert_eq!(store.read().await.unwrap(), vec![Message::user("kept")]);
    }

    #[tokio::test]
    async fn rejects_corruption_mid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        std::fs::write(&path, "not json\n{\"role\":\"user\",\"content\":\"x\"}\n").unwrap();

        let err = JsonlTranscriptStore::new(&path).read().await.unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
