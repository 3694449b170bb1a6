//! Makes episode audio available on disk.
use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use pod_proto::models::Episode;
use pod_proto::store::DataStore;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Progress callback, fraction in `[0, 1]`.
pub type ProgressFn<'p> = dyn Fn(f64) + Send + Sync + 'p;

pub trait EpisodeFetcher: Send + Sync {
    /// Resolve the local file for `episode`, transferring it if needed.
    /// A complete local copy is returned without touching the network.
    fn ensure_local<'a>(
        &'a self,
        episode: &'a Episode,
        on_progress: &'a ProgressFn<'a>,
    ) -> BoxFuture<'a, anyhow::Result<PathBuf>>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    store: DataStore,
}

impl HttpFetcher {
    /// `timeout` bounds the whole transfer.
    pub fn new(store: DataStore, timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, store })
    }

    async fn download(
        &self,
        episode: &Episode,
        on_progress: &ProgressFn<'_>,
    ) -> anyhow::Result<PathBuf> {
        let path = self.store.cache_path_for(episode)?;
        if let Ok(meta) = tokio::fs::metadata(&path).await {
            if meta.is_file() && meta.len() > 0 {
                debug!("fetch: cache hit {:?}", path);
                on_progress(1.0);
                return Ok(path);
            }
        }

        info!("fetch: {} -> {:?}", episode.audio_url, path);
        on_progress(0.0);
        let resp = self
            .client
            .get(&episode.audio_url)
            .send()
            .await?
            .error_for_status()?;
        let total = resp.content_length().filter(|len| *len > 0);

        let mut part = path.clone().into_os_string();
        part.push(".part");
        let part = PathBuf::from(part);

        let transfer = async {
            let mut file = tokio::fs::File::create(&part).await?;
            let mut stream = resp.bytes_stream();
            let mut received: u64 = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                received += chunk.len() as u64;
                if let Some(total) = total {
                    on_progress(received as f64 / total as f64);
                }
            }
            file.flush().await?;
            drop(file);

            if received == 0 {
                anyhow::bail!("server sent an empty file for {}", episode.audio_url);
            }
            tokio::fs::rename(&part, &path).await?;
            Ok::<u64, anyhow::Error>(received)
        };
        let received = match transfer.await {
            Ok(received) => received,
            Err(e) => {
                // only complete copies stay in the cache
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    debug!("fetch: could not remove {:?}: {}", part, rm);
                }
                warn!("fetch: {} failed: {:#}", episode.audio_url, e);
                return Err(e);
            }
        };
        on_progress(1.0);
        info!("fetch: done, {} bytes", received);
        Ok(path)
    }
}

impl EpisodeFetcher for HttpFetcher {
    fn ensure_local<'a>(
        &'a self,
        episode: &'a Episode,
        on_progress: &'a ProgressFn<'a>,
    ) -> BoxFuture<'a, anyhow::Result<PathBuf>> {
        Box::pin(self.download(episode, on_progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_proto::config::PathsConfig;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn fetcher(dir: &TempDir) -> HttpFetcher {
        let store = DataStore::new(&PathsConfig {
            data_dir: dir.path().join("data"),
            cache_dir: dir.path().join("cache"),
        });
        HttpFetcher::new(store, Duration::from_secs(5), "p0d-test").unwrap()
    }

    fn episode(url: &str) -> Episode {
        Episode {
            feed_title: "Feed".to_string(),
            title: "Ep".to_string(),
            published_at: None,
            audio_url: url.to_string(),
            id: None,
        }
    }

    /// Serves one HTTP response with `body`, then closes.
    async fn serve_once(body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await.unwrap();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            sock.write_all(head.as_bytes()).await.unwrap();
            sock.write_all(&body).await.unwrap();
            sock.flush().await.unwrap();
        });
        format!("http://{}/episode.mp3", addr)
    }

    #[tokio::test]
    async fn test_complete_copy_returns_without_network() {
        let dir = TempDir::new().unwrap();
        let f = fetcher(&dir);
        // nothing listens here; reaching the network would fail the test
        let ep = episode("http://127.0.0.1:9/ep.mp3");
        let path = f.store.cache_path_for(&ep).unwrap();
        std::fs::write(&path, b"ID3 audio").unwrap();

        let seen = Mutex::new(Vec::new());
        let progress = |p: f64| seen.lock().unwrap().push(p);
        let got = f.ensure_local(&ep, &progress).await.unwrap();
        assert_eq!(got, path);
        assert_eq!(*seen.lock().unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn test_download_writes_cache_and_reports_progress() {
        let dir = TempDir::new().unwrap();
        let f = fetcher(&dir);
        let body = vec![7u8; 64 * 1024];
        let ep = episode(&serve_once(body.clone()).await);

        let seen = Mutex::new(Vec::new());
        let progress = |p: f64| seen.lock().unwrap().push(p);
        let path = f.ensure_local(&ep, &progress).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert_eq!(path.extension().unwrap(), "mp3");
        let mut part = path.clone().into_os_string();
        part.push(".part");
        assert!(!PathBuf::from(part).exists());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_truncated_transfer_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let f = fetcher(&dir);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await.unwrap();
            let head = "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: 100000\r\nConnection: close\r\n\r\n";
            sock.write_all(head.as_bytes()).await.unwrap();
            sock.write_all(&[1u8; 4096]).await.unwrap();
            sock.flush().await.unwrap();
        });
        let ep = episode(&format!("http://{}/cut.mp3", addr));
        let path = f.store.cache_path_for(&ep).unwrap();

        let result = f.ensure_local(&ep, &|_: f64| {}).await;
        assert!(result.is_err());
        let mut part = path.clone().into_os_string();
        part.push(".part");
        assert!(!PathBuf::from(part).exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_cache_file_is_not_complete() {
        let dir = TempDir::new().unwrap();
        let f = fetcher(&dir);
        let ep = episode(&serve_once(b"fresh".to_vec()).await);
        let path = f.store.cache_path_for(&ep).unwrap();
        std::fs::write(&path, b"").unwrap();

        let got = f.ensure_local(&ep, &|_: f64| {}).await.unwrap();
        assert_eq!(std::fs::read(got).unwrap(), b"fresh");
    }
}
