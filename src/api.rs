//! Pollinations image-generation client.
//!
//! One HTTP request per generation cycle: no retries, no caching. The
//! response must declare an `image/*` content type; anything else is surfaced
//! as a typed failure instead of being written to disk.

use std::time::Duration;

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;

/// Image generation endpoint.
const BASE_URL: &str = "https://gen.pollinations.ai/image";

/// Upper bound on the whole request; generation is slow on busy days.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// How much of an error body to keep for the user-facing message.
const BODY_EXCERPT_LEN: usize = 500;

/// Failure modes of a single generation attempt.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("image service unreachable: {0}")]
    Network(String),
    #[error("request timed out after {} seconds", REQUEST_TIMEOUT.as_secs())]
    Timeout,
    #[error("the image service rejected the API key")]
    AuthFailure,
    #[error("service returned {content_type} instead of an image: {body}")]
    InvalidResponse { content_type: String, body: String },
}

/// Parameters for one generation. Built fresh per cycle, never persisted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    /// Random when `None`; always sent so repeated prompts stay unique.
    pub seed: Option<u64>,
    /// Whether to add random variety/lighting descriptors to the prompt.
    pub enhance: bool,
}

/// Raw image bytes with the content type the service declared.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Blocking HTTP client for the Pollinations image endpoint.
pub struct PollinationsClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl PollinationsClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(BASE_URL, api_key, model)
    }

    fn with_base_url(base_url: &str, api_key: &str, model: &str) -> Self {
        let mut headers = HeaderMap::new();
        // Cache busting; every call must produce a fresh image.
        headers.insert("Cache-Control", HeaderValue::from_static("no-cache, no-store, must-revalidate"));
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));
        let key = api_key.trim();
        if !key.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: key.to_string(),
            model: model.to_string(),
        }
    }

    /// Swap credentials or model without rebuilding the caller.
    pub fn reconfigure(&mut self, api_key: &str, model: &str) {
        let base_url = self.base_url.clone();
        *self = Self::with_base_url(&base_url, api_key, model);
    }

    /// Issue a single generation request and return the image bytes.
    ///
    /// Exactly one attempt: the auto-change timer retries naturally on its
    /// next tick, so failures propagate immediately.
    pub fn generate(&self, request: &GenerationRequest) -> Result<ImagePayload, GenerateError> {
        let mut rng = rand::thread_rng();
        let seed = request.seed.unwrap_or_else(|| rng.gen_range(1..=1_000_000_000));
        let prompt = if request.enhance {
            vary_prompt(&request.prompt, &mut rng)
        } else {
            request.prompt.clone()
        };

        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|err| GenerateError::Network(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GenerateError::Network("invalid base url".to_string()))?
            .push(&prompt);

        let preview: String = prompt.chars().take(60).collect();
        info!(
            "generating {}x{} seed={seed} prompt={preview:?}",
            request.width, request.height
        );

        let response = self
            .http
            .get(url)
            .query(&[
                ("model", self.model.as_str()),
                ("width", &request.width.to_string()),
                ("height", &request.height.to_string()),
                ("seed", &seed.to_string()),
                ("enhance", "true"),
                ("nologo", "true"),
                ("private", "true"),
                ("nofeed", "true"),
            ])
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    GenerateError::Timeout
                } else {
                    GenerateError::Network(err.to_string())
                }
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        debug!("response status={status} content-type={content_type}");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GenerateError::AuthFailure);
        }
        if !status.is_success() {
            let body = excerpt(&response.bytes().unwrap_or_default());
            warn!("generation failed: {status} {body}");
            return Err(GenerateError::Network(format!("{status}: {body}")));
        }
        if !content_type.starts_with("image/") {
            let body = excerpt(&response.bytes().unwrap_or_default());
            return Err(GenerateError::InvalidResponse { content_type, body });
        }

        let bytes = response
            .bytes()
            .map_err(|err| GenerateError::Network(err.to_string()))?
            .to_vec();
        info!("received {} bytes ({content_type})", bytes.len());
        Ok(ImagePayload { bytes, content_type })
    }

    /// Small throwaway generation used by the setup panel to validate the
    /// configured key and connectivity.
    pub fn test_connection(&self) -> bool {
        let request = GenerationRequest {
            prompt: "test image".to_string(),
            width: 512,
            height: 512,
            seed: None,
            enhance: false,
        };
        self.generate(&request).is_ok()
    }
}

const VARIETY_DESCRIPTORS: [&str; 19] = [
    "stunning", "breathtaking", "magnificent", "spectacular", "gorgeous",
    "beautiful", "amazing", "incredible", "mesmerizing", "captivating",
    "detailed", "ultra-detailed", "highly detailed", "intricate",
    "vivid", "vibrant", "rich", "dynamic", "atmospheric",
];

const LIGHTING_DESCRIPTORS: [&str; 9] = [
    "perfect lighting", "dramatic lighting", "cinematic lighting",
    "natural lighting", "soft lighting", "volumetric lighting",
    "studio lighting", "golden hour", "blue hour",
];

/// Prepend one or two variety descriptors and append a lighting phrase so
/// identical table prompts still produce distinct images.
fn vary_prompt(prompt: &str, rng: &mut impl Rng) -> String {
    let count = rng.gen_range(1..=2);
    let selected: Vec<&str> = VARIETY_DESCRIPTORS
        .choose_multiple(rng, count)
        .copied()
        .collect();
    let light = LIGHTING_DESCRIPTORS
        .choose(rng)
        .copied()
        .unwrap_or(LIGHTING_DESCRIPTORS[0]);
    format!("{}, {prompt}, {light}", selected.join(", "))
}

fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim().chars().take(BODY_EXCERPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc::{self, Receiver};
    use std::thread;

    /// Minimal one-shot HTTP/1.1 server; returns the URL to hit and a
    /// channel carrying the raw request head for assertions.
    fn stub_server(status: &str, content_type: &str, body: Vec<u8>) -> (String, Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        let status = status.to_string();
        let content_type = content_type.to_string();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap_or(0);
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        });
        (format!("http://{addr}/image"), rx)
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            width: 1920,
            height: 1080,
            seed: Some(1234),
            enhance: false,
        }
    }

    #[test]
    fn successful_generation_returns_exact_bytes() {
        // Valid PNG header followed by junk; the client must not touch it.
        let png: Vec<u8> = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4].to_vec();
        let (url, _rx) = stub_server("200 OK", "image/png", png.clone());
        let client = PollinationsClient::with_base_url(&url, "", "flux");

        let payload = client
            .generate(&request("Northern lights display, dancing aurora borealis"))
            .unwrap();
        assert_eq!(payload.bytes, png);
        assert_eq!(payload.content_type, "image/png");
    }

    #[test]
    fn non_image_body_is_an_invalid_response() {
        let (url, _rx) = stub_server("200 OK", "text/plain", b"rate limit exceeded".to_vec());
        let client = PollinationsClient::with_base_url(&url, "", "flux");

        let err = client.generate(&request("anything")).unwrap_err();
        match err {
            GenerateError::InvalidResponse { content_type, body } => {
                assert_eq!(content_type, "text/plain");
                assert_eq!(body, "rate limit exceeded");
            }
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[test]
    fn unauthorized_maps_to_auth_failure() {
        let (url, _rx) = stub_server("401 Unauthorized", "text/plain", b"bad key".to_vec());
        let client = PollinationsClient::with_base_url(&url, "wrong-key", "flux");

        let err = client.generate(&request("anything")).unwrap_err();
        assert!(matches!(err, GenerateError::AuthFailure));
    }

    #[test]
    fn server_error_is_a_network_failure() {
        let (url, _rx) = stub_server("503 Service Unavailable", "text/plain", b"busy".to_vec());
        let client = PollinationsClient::with_base_url(&url, "", "flux");

        let err = client.generate(&request("anything")).unwrap_err();
        match err {
            GenerateError::Network(msg) => assert!(msg.contains("503")),
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn request_carries_parameters_and_encoded_prompt() {
        let (url, rx) = stub_server("200 OK", "image/png", vec![0x89]);
        let client = PollinationsClient::with_base_url(&url, "secret-key", "flux");
        client.generate(&request("neon city rain")).unwrap();

        let head = rx.recv().unwrap();
        assert!(head.contains("neon%20city%20rain"), "head: {head}");
        assert!(head.contains("width=1920"));
        assert!(head.contains("height=1080"));
        assert!(head.contains("seed=1234"));
        assert!(head.contains("model=flux"));
        assert!(head.contains("nologo=true"));
        assert!(head.contains("authorization: Bearer secret-key") ||
                head.contains("Authorization: Bearer secret-key"),
                "head: {head}");
    }

    #[test]
    fn varied_prompt_keeps_the_original_text() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let varied = vary_prompt("a quiet mountain lake", &mut rng);
            assert!(varied.contains("a quiet mountain lake"));
            assert_ne!(varied, "a quiet mountain lake");
            assert!(LIGHTING_DESCRIPTORS.iter().any(|l| varied.ends_with(l)));
        }
    }
}
