//! Transcript retrieval.
//!
//! Shells out to `yt-dlp` with an ordered track preference: human-authored
//! subtitles in the target language family first, then auto-generated ones,
//! then a machine-translated track in the target language. The first hit
//! wins. Downloaded VTT is flattened to plain text and truncated to a fixed
//! budget before it reaches the LLM.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use vidigest_models::VideoId;

use crate::throttle::FetchThrottle;

/// Character budget for a fetched transcript. Anything longer is cut with
/// [`TRUNCATION_MARKER`] appended; a deliberate lossy policy to bound LLM
/// context cost.
pub const MAX_TRANSCRIPT_CHARS: usize = 30_000;

/// Appended when a transcript is truncated.
pub const TRUNCATION_MARKER: &str = "... [transcript truncated]";

const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 4;

/// Why a transcript could not be fetched. Rate limiting is handled
/// internally and surfaces only as `Transient` once the backoff budget is
/// spent.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("no transcript track available")]
    NoTranscript,

    #[error("transcripts are disabled for this video")]
    TranscriptsDisabled,

    #[error("video is unavailable")]
    VideoUnavailable,

    /// The fetch origin itself is rejected by the platform. Needs
    /// infrastructure remediation, not per-video retries.
    #[error("fetch origin blocked: {0}")]
    EnvironmentBlocked(String),

    /// Worth retrying later via queue redelivery; never recorded as a
    /// video-level failure.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    #[error("transcript fetch failed: {0}")]
    Unknown(String),
}

/// Seam for the pipeline so tests can substitute canned outcomes.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, video_id: &VideoId) -> Result<String, TranscriptError>;
}

enum AttemptError {
    RateLimited(String),
    Fatal(TranscriptError),
}

#[derive(Debug, PartialEq, Eq)]
enum StderrClass {
    RateLimited,
    Blocked,
    Disabled,
    Unavailable,
    NoCaptions,
    Other,
}

fn classify_stderr(stderr: &str) -> StderrClass {
    let lower = stderr.to_lowercase();
    // "http error 429" rather than bare "429": video IDs can contain that
    // digit run and show up verbatim in error lines.
    if lower.contains("http error 429") || lower.contains("too many requests") {
        StderrClass::RateLimited
    } else if lower.contains("sign in to confirm")
        || lower.contains("not a bot")
        || lower.contains("captcha")
        || lower.contains("blocked it from")
    {
        StderrClass::Blocked
    } else if lower.contains("subtitles are disabled")
        || (lower.contains("disabled") && lower.contains("subtitle"))
    {
        StderrClass::Disabled
    } else if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("has been removed")
        || lower.contains("account associated with this video has been terminated")
    {
        StderrClass::Unavailable
    } else if lower.contains("no subtitles") || lower.contains("unable to download video subtitles")
    {
        StderrClass::NoCaptions
    } else {
        StderrClass::Other
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF * 2u32.saturating_pow(attempt.saturating_sub(1));
    exp.min(MAX_BACKOFF)
}

/// Cut transcript text to the character budget, marking the cut.
pub fn truncate_transcript(text: &str) -> String {
    match text.char_indices().nth(MAX_TRANSCRIPT_CHARS) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Flatten VTT content to plain text, dropping cue timing, tags, and the
/// rolling duplicate lines auto-captions produce.
fn parse_vtt(content: &str) -> String {
    let ts_pattern = Regex::new(r"((?:\d{2}:)?\d{2}:\d{2}\.\d{3}) -->.*").unwrap();
    let tag_pattern = Regex::new(r"<[^>]+>").unwrap();

    let mut transcript = String::new();
    let mut previous_line = String::new();

    for line in content.lines() {
        let line = tag_pattern.replace_all(line.trim(), "").to_string();

        if line.is_empty() || line == "WEBVTT" || line.starts_with("Kind:") || line.starts_with("Language:") {
            continue;
        }
        if ts_pattern.is_match(&line) {
            continue;
        }
        // cue sequence numbers
        if line.chars().all(|c| c.is_numeric()) {
            continue;
        }
        if line != previous_line {
            if !transcript.is_empty() {
                transcript.push(' ');
            }
            transcript.push_str(&line);
            previous_line = line;
        }
    }

    transcript
}

/// yt-dlp-backed transcript fetcher with rate-limit backoff and an
/// injectable process-wide throttle.
pub struct TranscriptFetcher {
    throttle: Arc<FetchThrottle>,
    proxy: Option<String>,
    language: String,
    program: String,
}

impl TranscriptFetcher {
    pub fn new(throttle: Arc<FetchThrottle>, proxy: Option<String>, language: impl Into<String>) -> Self {
        Self {
            throttle,
            proxy,
            language: language.into(),
            program: "yt-dlp".to_string(),
        }
    }

    /// Run a different binary instead of `yt-dlp`. Test hook.
    #[cfg(test)]
    fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Ordered yt-dlp subtitle selections: manual tracks in the target
    /// language family, then auto-generated ones, then translated auto
    /// tracks in the target language. The last stage covers videos whose
    /// only captions are in another language: YouTube machine-translates
    /// any existing track on request, so the text still arrives in the
    /// target language rather than verbatim in whatever the video speaks.
    fn track_preferences(&self) -> Vec<(&'static str, Vec<String>)> {
        let lang = &self.language;
        let family = format!("{lang},{lang}-US,{lang}-GB");
        vec![
            (
                "manual",
                vec![
                    "--write-subs".to_string(),
                    "--sub-langs".to_string(),
                    family.clone(),
                ],
            ),
            (
                "auto",
                vec![
                    "--write-auto-subs".to_string(),
                    "--sub-langs".to_string(),
                    family,
                ],
            ),
            (
                "translated",
                vec![
                    "--write-auto-subs".to_string(),
                    "--sub-langs".to_string(),
                    format!("{lang}.*"),
                ],
            ),
        ]
    }

    async fn run_ytdlp(
        &self,
        video_id: &VideoId,
        workdir: &Path,
        selection: &[String],
    ) -> Result<std::process::Output, AttemptError> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let output_template = workdir.join("%(id)s");
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg("--skip-download")
            .arg("--sub-format")
            .arg("vtt")
            .arg("--output")
            .arg(&output_template)
            .args(selection);
        if let Some(ref proxy) = self.proxy {
            cmd.arg("--proxy").arg(proxy);
        }
        cmd.arg(&url);

        cmd.output().await.map_err(|e| {
            AttemptError::Fatal(TranscriptError::Unknown(format!(
                "failed to run yt-dlp: {e}"
            )))
        })
    }

    fn read_best_vtt(&self, workdir: &Path) -> Option<std::path::PathBuf> {
        let mut vtt_files: Vec<_> = std::fs::read_dir(workdir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("vtt"))
            .collect();
        if vtt_files.is_empty() {
            return None;
        }
        // prefer a track in the target language family
        let needle = format!(".{}", self.language);
        vtt_files.sort_by_key(|entry| {
            let name = entry.file_name();
            if name.to_string_lossy().contains(&needle) {
                0
            } else {
                1
            }
        });
        Some(vtt_files[0].path())
    }

    /// One full pass across the track preferences.
    async fn try_fetch(&self, video_id: &VideoId) -> Result<String, AttemptError> {
        let workdir = tempfile::tempdir().map_err(|e| {
            AttemptError::Fatal(TranscriptError::Unknown(format!("tempdir: {e}")))
        })?;

        let mut saw_no_captions = false;
        let mut last_unclassified: Option<String> = None;

        for (label, selection) in self.track_preferences() {
            let output = self.run_ytdlp(video_id, workdir.path(), &selection).await?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let snippet: String = stderr.chars().take(300).collect();
                match classify_stderr(&stderr) {
                    StderrClass::RateLimited => return Err(AttemptError::RateLimited(snippet)),
                    StderrClass::Blocked => {
                        return Err(AttemptError::Fatal(TranscriptError::EnvironmentBlocked(
                            snippet,
                        )))
                    }
                    StderrClass::Disabled => {
                        return Err(AttemptError::Fatal(TranscriptError::TranscriptsDisabled))
                    }
                    StderrClass::Unavailable => {
                        return Err(AttemptError::Fatal(TranscriptError::VideoUnavailable))
                    }
                    StderrClass::NoCaptions => {
                        saw_no_captions = true;
                        continue;
                    }
                    StderrClass::Other => {
                        last_unclassified = Some(snippet);
                        continue;
                    }
                }
            }

            match self.read_best_vtt(workdir.path()) {
                Some(vtt_path) => {
                    let content = tokio::fs::read_to_string(&vtt_path).await.map_err(|e| {
                        AttemptError::Fatal(TranscriptError::Unknown(format!(
                            "failed to read VTT file: {e}"
                        )))
                    })?;
                    let text = parse_vtt(&content);
                    if text.is_empty() {
                        saw_no_captions = true;
                        continue;
                    }
                    debug!(video_id = %video_id, track = label, "transcript track selected");
                    return Ok(text);
                }
                // exit 0 with no file means no track matched this selection
                None => {
                    saw_no_captions = true;
                    continue;
                }
            }
        }

        if saw_no_captions || last_unclassified.is_none() {
            Err(AttemptError::Fatal(TranscriptError::NoTranscript))
        } else {
            Err(AttemptError::Fatal(TranscriptError::Unknown(
                last_unclassified.unwrap_or_default(),
            )))
        }
    }
}

#[async_trait]
impl TranscriptSource for TranscriptFetcher {
    async fn fetch(&self, video_id: &VideoId) -> Result<String, TranscriptError> {
        let mut attempt = 1;
        loop {
            self.throttle.wait().await;
            match self.try_fetch(video_id).await {
                Ok(text) => {
                    info!(
                        video_id = %video_id,
                        chars = text.chars().count(),
                        "transcript fetched"
                    );
                    return Ok(truncate_transcript(&text));
                }
                Err(AttemptError::RateLimited(msg)) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(TranscriptError::Transient(format!(
                            "rate limited after {MAX_ATTEMPTS} attempts: {msg}"
                        )));
                    }
                    let wait = backoff_delay(attempt);
                    warn!(
                        video_id = %video_id,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(
            classify_stderr("ERROR: HTTP Error 429: Too Many Requests"),
            StderrClass::RateLimited
        );
    }

    #[test]
    fn test_classify_429_in_video_id_is_not_rate_limited() {
        // 11-char video IDs can embed "429"; only the HTTP status counts
        assert_eq!(
            classify_stderr("ERROR: [youtube] x429bQpKd3w: Video unavailable"),
            StderrClass::Unavailable
        );
        assert_eq!(
            classify_stderr("ERROR: [youtube] x429bQpKd3w: Unable to extract player response"),
            StderrClass::Other
        );
    }

    #[test]
    fn test_classify_blocked() {
        assert_eq!(
            classify_stderr("ERROR: Sign in to confirm you're not a bot"),
            StderrClass::Blocked
        );
    }

    #[test]
    fn test_classify_unavailable() {
        assert_eq!(
            classify_stderr("ERROR: Video unavailable. This video is private"),
            StderrClass::Unavailable
        );
        assert_eq!(
            classify_stderr("ERROR: This video has been removed by the uploader"),
            StderrClass::Unavailable
        );
    }

    #[test]
    fn test_classify_no_captions() {
        assert_eq!(
            classify_stderr("There are no subtitles for the requested languages"),
            StderrClass::NoCaptions
        );
    }

    #[test]
    fn test_classify_unrecognized() {
        assert_eq!(classify_stderr("segfault"), StderrClass::Other);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(5), Duration::from_secs(10));
        assert_eq!(backoff_delay(10), Duration::from_secs(10));
    }

    fn test_fetcher(language: &str) -> TranscriptFetcher {
        TranscriptFetcher::new(
            Arc::new(FetchThrottle::new(Duration::ZERO)),
            None,
            language,
        )
    }

    #[test]
    fn test_last_track_preference_requests_target_language() {
        let fetcher = test_fetcher("en");
        let prefs = fetcher.track_preferences();
        assert_eq!(prefs.len(), 3);

        let (label, args) = prefs.last().unwrap();
        assert_eq!(*label, "translated");
        let langs_idx = args.iter().position(|a| a == "--sub-langs").unwrap() + 1;
        assert!(args[langs_idx].starts_with("en"));

        // a foreign-only video must never yield an untranslated track
        for (_, args) in &prefs {
            assert!(!args.iter().any(|a| a == "all"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_rate_limiting_surfaces_transient() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("always-429");
        std::fs::write(
            &stub,
            "#!/bin/sh\necho 'ERROR: HTTP Error 429: Too Many Requests' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let fetcher = test_fetcher("en").with_program(stub.to_string_lossy());
        let err = fetcher
            .fetch(&VideoId::from("dQw4w9WgXcQ"))
            .await
            .unwrap_err();
        match err {
            TranscriptError::Transient(msg) => {
                assert!(msg.contains("rate limited after 4 attempts"), "{msg}");
            }
            other => panic!("expected Transient, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_vtt_flattens_and_dedupes() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n\
                   00:00.000 --> 00:02.000\nhello world\n\n\
                   00:02.000 --> 00:04.000\nhello world\n\n\
                   2\n00:04.000 --> 00:06.000\n<c>second line</c>\n";
        assert_eq!(parse_vtt(vtt), "hello world second line");
    }

    #[test]
    fn test_truncation_appends_marker() {
        let long = "a".repeat(MAX_TRANSCRIPT_CHARS + 100);
        let cut = truncate_transcript(&long);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            cut.chars().count(),
            MAX_TRANSCRIPT_CHARS + TRUNCATION_MARKER.chars().count()
        );

        let short = "short transcript";
        assert_eq!(truncate_transcript(short), short);
    }
}
