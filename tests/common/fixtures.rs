//! Snapshot fixtures and a range-aware mock bucket

use snapshot_dl::{ArtifactId, ArtifactNaming, Timestamp};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Payload served as the snapshot artifact
pub const SNAPSHOT_BODY: &[u8] = b"snapshot";

/// Requested date used throughout the tests
pub const START_DATE: &str = "2022-02-28_08-00-00";

/// Object key (with leading slash) of the artifact named after `date`
pub fn artifact_key(date: &str) -> String {
    let ts = Timestamp::parse(date).expect("fixture date must parse");
    let id = ArtifactId::for_timestamp(ts, &ArtifactNaming::default())
        .expect("fixture date must be after genesis");
    format!("/{id}")
}

/// Serves `body` honoring inclusive `Range: bytes=a-b` headers.
pub struct RangeResponder {
    /// Full artifact contents
    pub body: Vec<u8>,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(value) = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
        else {
            return ResponseTemplate::new(200).set_body_bytes(self.body.clone());
        };

        let bounds = value
            .strip_prefix("bytes=")
            .and_then(|r| r.split_once('-'))
            .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)));
        match bounds {
            Some((start, end)) if start <= end && end < self.body.len() => {
                ResponseTemplate::new(206)
                    .insert_header(
                        "Content-Range",
                        format!("bytes {}-{}/{}", start, end, self.body.len()).as_str(),
                    )
                    .set_body_bytes(self.body[start..=end].to_vec())
            }
            _ => ResponseTemplate::new(416),
        }
    }
}

/// Publish `body` under the artifact named after `date`.
pub async fn mount_snapshot(server: &MockServer, date: &str, body: &[u8]) {
    let key = artifact_key(date);
    Mock::given(method("HEAD"))
        .and(path(key.as_str()))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Content-Length", body.len().to_string().as_str()),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(key.as_str()))
        .respond_with(RangeResponder {
            body: body.to_vec(),
        })
        .mount(server)
        .await;
}
