//! ffconcat playlists and the local track cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::seq::IndexedRandom;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Extract track URLs from an ffconcat playlist.
///
/// Only `file '<url>'` lines pointing at http(s) locations are kept.
pub fn parse_ffconcat(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.contains("file") && line.contains("http"))
        .filter_map(|line| {
            let start = line.find('\'')? + 1;
            let len = line[start..].find('\'')?;
            let url = &line[start..start + len];
            (!url.is_empty()).then(|| url.to_string())
        })
        .collect()
}

pub fn pick_random(urls: &[String]) -> Option<&String> {
    urls.choose(&mut rand::rng())
}

/// Cache file name for a track URL: last path segment without the query.
pub fn track_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("track")
        .to_string()
}

/// Downloads playlist tracks into a directory, reusing cached files.
#[derive(Debug, Clone)]
pub struct TrackCache {
    http: reqwest::Client,
    dir: PathBuf,
}

impl TrackCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch and parse a playlist.
    pub async fn fetch_playlist(&self, playlist_url: &str) -> MediaResult<Vec<String>> {
        let text = self
            .http
            .get(playlist_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let urls = parse_ffconcat(&text);
        if urls.is_empty() {
            return Err(MediaError::InvalidPlaylist(format!(
                "{playlist_url} contains no http tracks"
            )));
        }
        Ok(urls)
    }

    /// Pick a random track from the playlist and return its local path.
    pub async fn random_track(&self, playlist_url: &str) -> MediaResult<PathBuf> {
        let urls = self.fetch_playlist(playlist_url).await?;
        let url = pick_random(&urls)
            .ok_or_else(|| MediaError::InvalidPlaylist("empty playlist".to_string()))?;
        self.fetch_track(url).await
    }

    /// Local path of `url`, downloading it when not cached yet.
    pub async fn fetch_track(&self, url: &str) -> MediaResult<PathBuf> {
        let local = self.dir.join(track_file_name(url));
        if tokio::fs::try_exists(&local).await.unwrap_or(false) {
            debug!(path = %local.display(), "Track found in cache");
            return Ok(local);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        info!(url, "Downloading track");

        let mut response = self.http.get(url).send().await?.error_for_status()?;
        let partial = local.with_extension("part");
        let mut file = tokio::fs::File::create(&partial).await?;

        use tokio::io::AsyncWriteExt;
        let written: MediaResult<()> = async {
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, &local).await?;
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAYLIST: &str = "ffconcat version 1.0\n\
        file 'https://cdn.example.com/music/one.mp3'\n\
        # comment with http://ignored\n\
        file 'local.mp3'\n\
        file 'https://cdn.example.com/music/two.mp3?token=abc'\n";

    #[test]
    fn test_parse_ffconcat() {
        assert_eq!(
            parse_ffconcat(PLAYLIST),
            vec![
                "https://cdn.example.com/music/one.mp3".to_string(),
                "https://cdn.example.com/music/two.mp3?token=abc".to_string(),
            ]
        );
    }

    #[test]
    fn test_track_file_name() {
        assert_eq!(track_file_name("https://cdn/x/two.mp3?token=abc"), "two.mp3");
        assert_eq!(track_file_name("https://cdn/x/one.mp3"), "one.mp3");
    }

    #[test]
    fn test_pick_random_empty() {
        assert!(pick_random(&[]).is_none());
    }

    #[tokio::test]
    async fn test_random_track_downloads_once() {
        let server = MockServer::start().await;
        let playlist = format!("ffconcat version 1.0\nfile '{}/music/song.mp3'\n", server.uri());
        Mock::given(method("GET"))
            .and(path("/youtube/playlist.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(playlist))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/music/song.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = TrackCache::new(dir.path().join("downloads"));
        let url = format!("{}/youtube/playlist.txt", server.uri());

        let first = cache.random_track(&url).await.unwrap();
        let second = cache.random_track(&url).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"ID3audio");
    }

    #[tokio::test]
    async fn test_playlist_without_tracks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ffconcat version 1.0\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = TrackCache::new(dir.path());
        let err = cache.fetch_playlist(&server.uri()).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidPlaylist(_)));
    }
}
