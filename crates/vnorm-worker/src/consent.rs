//! User consent for reformatting.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use vnorm_models::{PolicyDecision, VideoSource};

/// Answers whether a non-conforming video may be reformatted.
#[async_trait]
pub trait ConsentProvider: Send + Sync {
    async fn confirm(&self, source: &VideoSource, decision: &PolicyDecision) -> bool;
}

/// Always gives the same answer.
#[derive(Debug, Default)]
pub struct FixedConsent {
    answer: bool,
    asked: AtomicUsize,
}

impl FixedConsent {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::new(true)
    }

    pub fn denied() -> Self {
        Self::new(false)
    }

    /// How many times consent was requested.
    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentProvider for FixedConsent {
    async fn confirm(&self, _source: &VideoSource, _decision: &PolicyDecision) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Asks on the terminal. Anything but `y`/`yes` is a refusal.
#[derive(Debug, Default)]
pub struct PromptConsent;

#[async_trait]
impl ConsentProvider for PromptConsent {
    async fn confirm(&self, source: &VideoSource, decision: &PolicyDecision) -> bool {
        let question = format!(
            "{} is {}. Letterbox it to 9:16 and trim it to fit? [y/N] ",
            source.name(),
            decision.reasons().join(" and ")
        );

        let mut stderr = tokio::io::stderr();
        if let Err(e) = stderr.write_all(question.as_bytes()).await {
            warn!("Cannot prompt for consent: {}", e);
            return false;
        }
        let _ = stderr.flush().await;

        let mut answer = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut answer).await {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                warn!("Cannot read consent answer: {}", e);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn test_fixed_consent_counts() {
        let consent = FixedConsent::denied();
        let source = VideoSource::new(vec![1u8], "clip.mp4", "video/mp4");
        let decision = PolicyDecision::new(false, false);

        assert!(!consent.confirm(&source, &decision).await);
        assert!(!consent.confirm(&source, &decision).await);
        assert_eq!(consent.times_asked(), 2);
    }
}
