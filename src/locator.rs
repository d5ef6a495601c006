//! Locator -- bounded guess-and-probe search for a published snapshot.
//!
//! Snapshots are published hourly, but the hour does not always line up with
//! the requested timestamp. The locator probes the artifact named after the
//! requested timestamp and, on a miss, moves the candidate forward by one
//! hour, giving up after `max_attempts` probes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ArtifactNaming;
use crate::epoch::Timestamp;
use crate::error::{Error, Result};
use crate::store::ArtifactProbe;
use crate::types::{ArtifactId, Event, Located, ProbeOutcome};

/// Hours added to the candidate timestamp after each miss
pub const PROBE_STEP_HOURS: i64 = 1;

/// Searches the store for the first existing artifact at or after a timestamp.
pub struct Locator {
    probe: Arc<dyn ArtifactProbe>,
    host: String,
    naming: ArtifactNaming,
    max_attempts: u32,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl Locator {
    /// Create a locator probing `host` through `probe`.
    pub fn new(
        probe: Arc<dyn ArtifactProbe>,
        host: impl Into<String>,
        naming: ArtifactNaming,
        max_attempts: u32,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        Self {
            probe,
            host: host.into(),
            naming,
            max_attempts,
            event_tx,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Stop probing once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Find the artifact for `start`, advancing an hour per miss.
    ///
    /// One probe is in flight at a time. A probe that fails at the transport
    /// level ends the search with that error.
    pub async fn locate(&self, start: Timestamp) -> Result<Located> {
        let mut candidate = start;
        let mut last_url = None;

        for attempt in 0..self.max_attempts {
            if self.cancel_token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let artifact = ArtifactId::for_timestamp(candidate, &self.naming)?;
            let url = artifact.url(&self.host);

            tracing::info!(date = %candidate, attempt, url = %url, "probing for snapshot");
            self.event_tx
                .send(Event::Probing {
                    attempt,
                    url: url.clone(),
                })
                .ok();

            let outcome = tokio::select! {
                outcome = self.probe.probe(&url) => outcome,
                _ = self.cancel_token.cancelled() => return Err(Error::Cancelled),
            };

            match outcome.inspect_err(|e| {
                tracing::error!(url = %url, error = %e, "probe failed");
            })? {
                ProbeOutcome::Found { content_length } => {
                    tracing::info!(url = %url, content_length, probes = attempt + 1, "snapshot located");
                    self.event_tx
                        .send(Event::Located {
                            url: url.clone(),
                            content_length,
                        })
                        .ok();
                    return Ok(Located {
                        artifact,
                        url,
                        content_length,
                        probes: attempt + 1,
                    });
                }
                ProbeOutcome::Missing { status } => {
                    tracing::warn!(url = %url, status, attempt, "couldn't find snapshot");
                    self.event_tx
                        .send(Event::ProbeMissed {
                            attempt,
                            url: url.clone(),
                            status,
                        })
                        .ok();
                    last_url = Some(url);
                    if attempt + 1 < self.max_attempts {
                        candidate = candidate.plus_hours(PROBE_STEP_HOURS).inspect_err(|e| {
                            tracing::error!(date = %candidate, error = %e, "cannot advance candidate");
                        })?;
                    }
                }
            }
        }

        tracing::error!(max_attempts = self.max_attempts, "reached max attempts");
        self.event_tx
            .send(Event::LocatorExhausted {
                attempts: self.max_attempts,
            })
            .ok();
        Err(Error::LocatorExhausted {
            attempts: self.max_attempts,
            last_url,
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Probe double that replays scripted outcomes and records every URL it sees.
    struct ScriptedProbe {
        outcomes: Mutex<VecDeque<Result<ProbeOutcome>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        fn new(outcomes: Vec<Result<ProbeOutcome>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ArtifactProbe for ScriptedProbe {
        async fn probe(&self, url: &str) -> Result<ProbeOutcome> {
            self.seen.lock().unwrap().push(url.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ProbeOutcome::Missing { status: 404 }))
        }
    }

    fn missing() -> Result<ProbeOutcome> {
        Ok(ProbeOutcome::Missing { status: 404 })
    }

    fn locator(probe: Arc<ScriptedProbe>, max_attempts: u32) -> Locator {
        let (event_tx, _rx) = tokio::sync::broadcast::channel(64);
        Locator::new(
            probe,
            "http://store.test/mainnet",
            ArtifactNaming::default(),
            max_attempts,
            event_tx,
        )
    }

    fn start() -> Timestamp {
        Timestamp::parse("2022-02-28_08-00-00").unwrap()
    }

    #[tokio::test]
    async fn found_on_first_probe() {
        let probe = ScriptedProbe::new(vec![Ok(ProbeOutcome::Found { content_length: 8 })]);
        let located = locator(probe.clone(), 4).locate(start()).await.unwrap();

        assert_eq!(
            located.url,
            "http://store.test/mainnet/minimal_finality_stateroots_1590960_2022-02-28_08-00-00.car"
        );
        assert_eq!(located.content_length, 8);
        assert_eq!(located.probes, 1);
        assert_eq!(probe.seen().len(), 1);
    }

    #[tokio::test]
    async fn advances_one_hour_per_miss() {
        let probe = ScriptedProbe::new(vec![
            missing(),
            missing(),
            missing(),
            Ok(ProbeOutcome::Found { content_length: 42 }),
        ]);
        let located = locator(probe.clone(), 4).locate(start()).await.unwrap();

        assert_eq!(located.artifact.timestamp, start().plus_hours(3).unwrap());
        assert_eq!(located.artifact.timestamp.to_string(), "2022-02-28_11-00-00");
        assert_eq!(located.probes, 4);

        let seen = probe.seen();
        assert_eq!(seen.len(), 4);
        assert!(seen[1].ends_with("_1591080_2022-02-28_09-00-00.car"));
        assert!(seen[3].ends_with("_1591320_2022-02-28_11-00-00.car"));
    }

    #[tokio::test]
    async fn exhaustion_issues_exactly_max_attempts_probes() {
        let probe = ScriptedProbe::new(vec![]);
        let err = locator(probe.clone(), 2).locate(start()).await.unwrap_err();

        match err {
            Error::LocatorExhausted { attempts, last_url } => {
                assert_eq!(attempts, 2);
                assert!(last_url.unwrap().ends_with("2022-02-28_09-00-00.car"));
            }
            other => panic!("expected LocatorExhausted, got {other:?}"),
        }
        assert_eq!(probe.seen().len(), 2, "no third probe");
    }

    #[tokio::test]
    async fn zero_attempts_never_probes() {
        let probe = ScriptedProbe::new(vec![Ok(ProbeOutcome::Found { content_length: 1 })]);
        let err = locator(probe.clone(), 0).locate(start()).await.unwrap_err();

        assert!(matches!(
            err,
            Error::LocatorExhausted {
                attempts: 0,
                last_url: None
            }
        ));
        assert!(probe.seen().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_aborts_search() {
        let probe = ScriptedProbe::new(vec![
            missing(),
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))),
            Ok(ProbeOutcome::Found { content_length: 1 }),
        ]);
        let err = locator(probe.clone(), 4).locate(start()).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(probe.seen().len(), 2, "no probe after a transport failure");
    }

    #[tokio::test]
    async fn advancing_past_year_9999_is_an_error() {
        let probe = ScriptedProbe::new(vec![]);
        let ts = Timestamp::parse("9999-12-31_23-30-00").unwrap();
        let err = locator(probe.clone(), 4).locate(ts).await.unwrap_err();

        assert!(matches!(err, Error::TimestampOutOfRange { hours: 1, .. }));
        assert_eq!(probe.seen().len(), 1);
    }

    #[tokio::test]
    async fn last_attempt_at_year_9999_exhausts_normally() {
        let probe = ScriptedProbe::new(vec![]);
        let ts = Timestamp::parse("9999-12-31_23-30-00").unwrap();
        let err = locator(probe.clone(), 1).locate(ts).await.unwrap_err();

        assert!(matches!(err, Error::LocatorExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn pre_genesis_start_is_invalid_epoch() {
        let probe = ScriptedProbe::new(vec![]);
        let ts = Timestamp::parse("2020-01-01_00-00-00").unwrap();
        let err = locator(probe.clone(), 4).locate(ts).await.unwrap_err();

        assert!(matches!(err, Error::InvalidEpoch { .. }));
        assert!(probe.seen().is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_probing() {
        let probe = ScriptedProbe::new(vec![]);
        let token = CancellationToken::new();
        token.cancel();
        let err = locator(probe.clone(), 4)
            .with_cancellation(token)
            .locate(start())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(probe.seen().is_empty());
    }

    #[tokio::test]
    async fn emits_probe_events() {
        let probe = ScriptedProbe::new(vec![
            missing(),
            Ok(ProbeOutcome::Found { content_length: 8 }),
        ]);
        let (event_tx, mut rx) = tokio::sync::broadcast::channel(64);
        let locator = Locator::new(
            probe,
            "http://store.test",
            ArtifactNaming::default(),
            4,
            event_tx,
        );
        locator.locate(start()).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                Event::Probing { .. } => "probing",
                Event::ProbeMissed { .. } => "missed",
                Event::Located { .. } => "located",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["probing", "missed", "probing", "located"]);
    }
}
