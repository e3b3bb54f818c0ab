//! Subtitle/synthesis server client
//!
//! Wire format:
//! - `GET /subtitles?video_id=&target_lang=&translate_source=` returns an
//!   ordered array of `{start, end, text}`; an empty array means the video
//!   has no usable subtitles, which is terminal for the session.
//! - `POST /synthesize` takes a batch of subtitle items and returns one
//!   base64 MP3 payload per item. Items the server failed to synthesize
//!   are absent from `results`.

use crate::error::{Error, Result};
use crate::timeline::SubtitleSegment;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One synthesis request batch
#[derive(Debug, Clone)]
pub struct SynthesisBatch {
    pub segments: Vec<SubtitleSegment>,
    pub voice: String,
    pub target_language: String,
}

/// Synthesized audio for one segment, still undecoded
#[derive(Debug, Clone)]
pub struct RawClip {
    pub id: usize,
    /// Transport-decoded audio bytes (MP3 from the reference server)
    pub audio: Vec<u8>,
    pub start_time: f64,
    pub end_time: f64,
}

/// Seam between the engine and the subtitle/synthesis server
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Fetch the ordered subtitle list for a video
    ///
    /// Returns `Error::NoSubtitles` when the server has none.
    async fn fetch_subtitles(
        &self,
        video_id: &str,
        target_lang: &str,
        translate_source: Option<&str>,
    ) -> Result<Vec<SubtitleSegment>>;

    /// Synthesize one batch of segments
    async fn synthesize(&self, batch: SynthesisBatch) -> Result<Vec<RawClip>>;
}

// ========================================
// Wire DTOs
// ========================================

#[derive(Debug, Deserialize)]
struct SubtitleDto {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Serialize)]
struct SynthesizeItemDto {
    id: String,
    text: String,
    start_time: f64,
    end_time: f64,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequestDto {
    subtitles: Vec<SynthesizeItemDto>,
    voice: String,
    target_language: String,
}

#[derive(Debug, Deserialize)]
struct AudioItemDto {
    id: String,
    audio_base64: String,
    start_time: f64,
    end_time: f64,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponseDto {
    results: Vec<AudioItemDto>,
}

/// HTTP implementation of [`SynthesisProvider`]
pub struct HttpSynthesisClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSynthesisClient {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl SynthesisProvider for HttpSynthesisClient {
    async fn fetch_subtitles(
        &self,
        video_id: &str,
        target_lang: &str,
        translate_source: Option<&str>,
    ) -> Result<Vec<SubtitleSegment>> {
        let mut query: Vec<(&str, &str)> =
            vec![("video_id", video_id), ("target_lang", target_lang)];
        if let Some(source) = translate_source {
            query.push(("translate_source", source));
        }

        debug!("Fetching subtitles for video {}", video_id);
        let response = self
            .http
            .get(format!("{}/subtitles", self.base_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?;

        let items: Vec<SubtitleDto> = response.json().await?;
        if items.is_empty() {
            return Err(Error::NoSubtitles(video_id.to_string()));
        }

        let segments = items
            .into_iter()
            .enumerate()
            .map(|(index, dto)| SubtitleSegment {
                index,
                start_sec: dto.start,
                end_sec: dto.end,
                text: dto.text,
            })
            .collect();
        Ok(segments)
    }

    async fn synthesize(&self, batch: SynthesisBatch) -> Result<Vec<RawClip>> {
        let request = SynthesizeRequestDto {
            subtitles: batch
                .segments
                .iter()
                .map(|s| SynthesizeItemDto {
                    id: s.index.to_string(),
                    text: s.text.clone(),
                    start_time: s.start_sec,
                    end_time: s.end_sec,
                })
                .collect(),
            voice: batch.voice,
            target_language: batch.target_language,
        };

        debug!("Synthesizing batch of {} segments", request.subtitles.len());
        let response = self
            .http
            .post(format!("{}/synthesize", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: SynthesizeResponseDto = response.json().await?;

        let mut clips = Vec::with_capacity(body.results.len());
        for item in body.results {
            let id: usize = match item.id.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!("Skipping synthesis result with non-numeric id {:?}", item.id);
                    continue;
                }
            };
            let audio = general_purpose::STANDARD
                .decode(&item.audio_base64)
                .map_err(|e| Error::Decode(format!("segment {}: invalid base64: {}", id, e)))?;
            clips.push(RawClip {
                id,
                audio,
                start_time: item.start_time,
                end_time: item.end_time,
            });
        }
        Ok(clips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_request_wire_shape() {
        let request = SynthesizeRequestDto {
            subtitles: vec![SynthesizeItemDto {
                id: "4".to_string(),
                text: "xin chào".to_string(),
                start_time: 1.0,
                end_time: 2.5,
            }],
            voice: "vi-VN-HoaiMyNeural".to_string(),
            target_language: "vi".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["subtitles"][0]["id"], "4");
        assert_eq!(json["subtitles"][0]["start_time"], 1.0);
        assert_eq!(json["voice"], "vi-VN-HoaiMyNeural");
        assert_eq!(json["target_language"], "vi");
    }

    #[test]
    fn test_synthesize_response_parse() {
        let body = r#"{
            "results": [
                {"id": "0", "audio_base64": "aGVsbG8=", "start_time": 0.0, "end_time": 2.0}
            ]
        }"#;

        let parsed: SynthesizeResponseDto = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].id, "0");
        assert_eq!(
            general_purpose::STANDARD
                .decode(&parsed.results[0].audio_base64)
                .unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_subtitle_dto_parse() {
        let body = r#"[{"start": 0.0, "end": 2.0, "text": "a"}, {"start": 2.0, "end": 5.0, "text": "b"}]"#;
        let items: Vec<SubtitleDto> = serde_json::from_str(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].text, "b");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            HttpSynthesisClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
