//! Playlist metadata extraction using yt-dlp.
//!
//! Runs `yt-dlp --flat-playlist --dump-single-json` and maps the result to
//! [`PlaylistInfo`]. Flat extraction never touches media streams, so a
//! playlist of hundreds of entries resolves in a single request.

use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use plpack_models::{PlaylistEntry, PlaylistInfo};

use crate::error::{MediaError, MediaResult};

/// Socket timeout handed to yt-dlp so a dead remote cannot hang a request.
const SOCKET_TIMEOUT_SECS: u32 = 15;

/// Raw shape of `--dump-single-json` output. Only the fields we consume.
#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    id: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    entries: Vec<Option<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
}

/// Fetch playlist metadata for a URL.
///
/// A URL pointing at a single video yields a one-entry playlist, so callers
/// never need to distinguish the two cases.
pub async fn fetch_playlist_info(url: &str) -> MediaResult<PlaylistInfo> {
    let url = url.trim();
    Url::parse(url).map_err(|_| MediaError::InvalidUrl(url.to_string()))?;

    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    debug!(url = url, "Extracting flat playlist metadata");

    let socket_timeout = SOCKET_TIMEOUT_SECS.to_string();
    let output = Command::new("yt-dlp")
        .args([
            "--flat-playlist",
            "--dump-single-json",
            "--no-warnings",
            "--socket-timeout",
            socket_timeout.as_str(),
            url,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        let message = stderr.lines().last().unwrap_or("Unknown error");
        return Err(MediaError::metadata_failed(message));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let info = parse_playlist_json(&stdout)?;

    info!(
        url = url,
        title = info.title.as_str(),
        entries = info.entries.len(),
        "Loaded playlist metadata"
    );

    Ok(info)
}

/// Map the raw yt-dlp JSON to [`PlaylistInfo`].
fn parse_playlist_json(json: &str) -> MediaResult<PlaylistInfo> {
    let raw: RawInfo = serde_json::from_str(json)?;

    if raw.kind.as_deref() == Some("playlist") {
        let title = raw.title.unwrap_or_else(|| "Playlist".to_string());
        let mut entries = Vec::new();

        // yt-dlp leaves null holes for deleted or private entries; the
        // index keeps counting so selections stay aligned with the source.
        for (idx, entry) in raw.entries.into_iter().enumerate() {
            let index = (idx + 1) as u32;
            let Some(entry) = entry else { continue };

            let title = entry
                .title
                .unwrap_or_else(|| format!("Video {}", index));
            let Some(source_ref) = entry_source_ref(entry.url.as_deref(), entry.id.as_deref())
            else {
                continue;
            };

            entries.push(PlaylistEntry {
                index,
                source_ref,
                title,
                thumbnail_url: entry.id.as_deref().map(thumbnail_for),
            });
        }

        Ok(PlaylistInfo { title, entries })
    } else {
        // Single video: degrade to a one-entry playlist
        let title = raw.title.unwrap_or_else(|| "Video".to_string());
        let source_ref = entry_source_ref(raw.webpage_url.as_deref(), raw.id.as_deref())
            .ok_or_else(|| MediaError::metadata_failed("no resolvable video reference"))?;

        Ok(PlaylistInfo {
            title: title.clone(),
            entries: vec![PlaylistEntry {
                index: 1,
                source_ref,
                title,
                thumbnail_url: raw.id.as_deref().map(thumbnail_for),
            }],
        })
    }
}

/// Pick the reference the fetch collaborator will be handed later.
fn entry_source_ref(url: Option<&str>, id: Option<&str>) -> Option<String> {
    if let Some(url) = url {
        return Some(url.to_string());
    }
    id.map(|id| format!("https://www.youtube.com/watch?v={}", id))
}

/// Standard thumbnail location for a video id.
fn thumbnail_for(id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST_JSON: &str = r#"{
        "_type": "playlist",
        "id": "PLx",
        "title": "My Mix",
        "entries": [
            {"id": "aaaaaaaaaaa", "title": "First", "url": "https://www.youtube.com/watch?v=aaaaaaaaaaa"},
            null,
            {"id": "ccccccccccc", "title": "Third"}
        ]
    }"#;

    const SINGLE_JSON: &str = r#"{
        "id": "ddddddddddd",
        "title": "Lone Video",
        "webpage_url": "https://www.youtube.com/watch?v=ddddddddddd"
    }"#;

    #[test]
    fn test_parse_playlist() {
        let info = parse_playlist_json(PLAYLIST_JSON).unwrap();
        assert_eq!(info.title, "My Mix");
        // The null hole is skipped but indices keep counting
        assert_eq!(info.entries.len(), 2);
        assert_eq!(info.entries[0].index, 1);
        assert_eq!(info.entries[1].index, 3);
        assert_eq!(info.entries[1].title, "Third");
        // Entry without a url falls back to a watch URL built from the id
        assert_eq!(
            info.entries[1].source_ref,
            "https://www.youtube.com/watch?v=ccccccccccc"
        );
        assert_eq!(
            info.entries[0].thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/aaaaaaaaaaa/hqdefault.jpg")
        );
    }

    #[test]
    fn test_parse_single_video_as_one_entry_playlist() {
        let info = parse_playlist_json(SINGLE_JSON).unwrap();
        assert_eq!(info.title, "Lone Video");
        assert_eq!(info.entries.len(), 1);
        assert_eq!(info.entries[0].index, 1);
        assert_eq!(
            info.entries[0].source_ref,
            "https://www.youtube.com/watch?v=ddddddddddd"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_playlist_json("not json").is_err());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_spawning() {
        let err = fetch_playlist_info("not a url").await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidUrl(_)));
    }

    #[test]
    fn test_untitled_entry_gets_positional_title() {
        let json = r#"{
            "_type": "playlist",
            "title": "Mix",
            "entries": [{"id": "aaaaaaaaaaa"}]
        }"#;
        let info = parse_playlist_json(json).unwrap();
        assert_eq!(info.entries[0].title, "Video 1");
    }
}
