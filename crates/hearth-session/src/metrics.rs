//! Per-generation metrics events and the running usage summary.

use hearth_types::TokenUsage;
use serde::Serialize;
use std::fmt;

/// One metrics payload emitted by the session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricsEvent {
    /// A language-backend generation completed.
    LlmGeneration {
        provider: &'static str,
        usage: TokenUsage,
    },
    /// A reply was synthesized and published.
    SpeechSynthesis {
        provider: &'static str,
        characters: usize,
    },
    /// A user utterance was transcribed and fed to the session.
    Transcription { characters: usize },
}

/// Totals accumulated over one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub llm_prompt_tokens: u64,
    pub llm_completion_tokens: u64,
    pub tts_characters: u64,
    pub transcribed_characters: u64,
    /// Total number of metrics events folded in.
    pub events: u64,
}

impl fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "llm_prompt_tokens={} llm_completion_tokens={} tts_characters={} \
             transcribed_characters={} events={}",
            self.llm_prompt_tokens,
            self.llm_completion_tokens,
            self.tts_characters,
            self.transcribed_characters,
            self.events
        )
    }
}

/// Accumulates [`MetricsEvent`]s into a [`UsageSummary`], logged once at
/// shutdown.
#[derive(Debug, Default)]
pub struct UsageCollector {
    summary: UsageSummary,
}

impl UsageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(&mut self, event: &MetricsEvent) {
        self.summary.events += 1;
        match event {
            MetricsEvent::LlmGeneration { usage, .. } => {
                self.summary.llm_prompt_tokens += usage.prompt_tokens;
                self.summary.llm_completion_tokens += usage.completion_tokens;
            }
            MetricsEvent::SpeechSynthesis { characters, .. } => {
                self.summary.tts_characters += *characters as u64;
            }
            MetricsEvent::Transcription { characters } => {
                self.summary.transcribed_characters += *characters as u64;
            }
        }
    }

    pub fn summary(&self) -> UsageSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_accumulates_across_event_kinds() {
        let mut collector = UsageCollector::new();
        collector.collect(&MetricsEvent::LlmGeneration {
            provider: "openai",
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            },
        });
        collector.collect(&MetricsEvent::SpeechSynthesis {
            provider: "elevenlabs",
            characters: 42,
        });
        collector.collect(&MetricsEvent::Transcription { characters: 17 });

        let summary = collector.summary();
        assert_eq!(summary.llm_prompt_tokens, 100);
        assert_eq!(summary.llm_completion_tokens, 20);
        assert_eq!(summary.tts_characters, 42);
        assert_eq!(summary.transcribed_characters, 17);
        assert_eq!(summary.events, 3);
    }

    #[test]
    fn summary_renders_every_counter() {
        let mut collector = UsageCollector::new();
        collector.collect(&MetricsEvent::Transcription { characters: 5 });
        let rendered = collector.summary().to_string();
        assert!(rendered.contains("transcribed_characters=5"));
        assert!(rendered.contains("events=1"));
    }
}
