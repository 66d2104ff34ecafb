//! Sentiment and frustration analysis for maintainer communications
//!
//! Lexicon-based compound scoring plus keyword matching for frustration
//! detection. The keyword list is deliberately specific to avoid false
//! positives on normal development discussion.

use regex::Regex;

/// Keywords indicating maintainer frustration or burnout
const FRUSTRATION_KEYWORDS: &[&str] = &[
    // Direct economic frustration (high signal)
    "not getting paid",
    "unpaid work",
    "free labor",
    "work for free",
    "donating my time",
    "corporate exploitation",
    "open source exploitation",
    "mass resignation",
    // Burnout signals (moderate signal)
    "burned out",
    "burnout",
    "stepping down",
    "giving up on this",
    "abandoning this project",
    // Economic frustration (moderate signal)
    "fortune 500",
    "pay developers",
    "fund open source",
    "companies make millions",
    // Protest signals (high signal)
    "protest",
    "on strike",
    "boycott",
    // Explicit negative emotions (only strong ones)
    "resentment",
    "exploitation",
    "taken advantage of",
];

const POSITIVE_WORDS: &[&str] = &[
    "thanks", "thank", "great", "awesome", "excellent", "good", "nice", "love", "works",
    "fixed", "improve", "improved", "clean", "helpful", "appreciate", "perfect", "solid",
];

const NEGATIVE_WORDS: &[&str] = &[
    "broken", "bug", "fail", "failed", "failure", "crash", "wrong", "bad", "terrible",
    "awful", "hate", "annoying", "frustrated", "frustrating", "useless", "worst", "angry",
    "tired", "sick", "never", "impossible", "regression",
];

const MAX_EVIDENCE: usize = 10;

/// Aggregated sentiment over a batch of texts
#[derive(Debug, Clone, Default)]
pub struct SentimentSummary {
    pub total_analyzed: usize,
    /// Mean compound score, -1 (negative) to +1 (positive)
    pub average_compound: f64,
    pub frustration_count: usize,
    pub frustration_evidence: Vec<String>,
}

impl SentimentSummary {
    pub fn frustration_detected(&self) -> bool {
        self.frustration_count > 0
    }

    /// Combine two summaries (e.g. commit messages and issue threads).
    /// The compound average is weighted by how many texts each side analyzed.
    pub fn merge(mut self, other: SentimentSummary) -> SentimentSummary {
        let total = self.total_analyzed + other.total_analyzed;
        if total > 0 {
            self.average_compound = (self.average_compound * self.total_analyzed as f64
                + other.average_compound * other.total_analyzed as f64)
                / total as f64;
        }
        self.total_analyzed = total;
        self.frustration_count += other.frustration_count;
        for item in other.frustration_evidence {
            if self.frustration_evidence.len() >= MAX_EVIDENCE {
                break;
            }
            self.frustration_evidence.push(item);
        }
        self
    }
}

/// Keyword and lexicon based analyzer for commit messages and issue threads
pub struct SentimentAnalyzer {
    frustration_patterns: Vec<(String, Regex)>,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        let frustration_patterns = FRUSTRATION_KEYWORDS
            .iter()
            .map(|kw| {
                let pattern = format!(r"\b{}\b", regex::escape(kw));
                let re = Regex::new(&pattern).expect("frustration keyword regex");
                (kw.to_string(), re)
            })
            .collect();
        Self {
            frustration_patterns,
        }
    }

    /// Compound score for a single text: (positive - negative) word hits,
    /// dampened by text length so one angry word in a long message does not
    /// dominate.
    pub fn compound_score(&self, text: &str) -> f64 {
        let mut positive = 0i64;
        let mut negative = 0i64;
        let mut words = 0i64;

        for word in text.split_whitespace() {
            words += 1;
            let w: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if POSITIVE_WORDS.contains(&w.as_str()) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(&w.as_str()) {
                negative += 1;
            }
        }

        if words == 0 {
            return 0.0;
        }

        let raw = (positive - negative) as f64;
        // Normalization in the style of VADER's alpha dampening
        raw / (raw * raw + 15.0).sqrt()
    }

    fn detect_frustration(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.frustration_patterns
            .iter()
            .filter(|(_, re)| re.is_match(&lower))
            .map(|(kw, _)| kw.clone())
            .collect()
    }

    /// Analyze a batch of texts and aggregate the results.
    /// `source_type` tags the evidence strings (commit, issue).
    pub fn analyze(&self, texts: &[String], source_type: &str) -> SentimentSummary {
        let mut compound_sum = 0.0;
        let mut analyzed = 0usize;
        let mut frustration_count = 0usize;
        let mut evidence = Vec::new();

        for text in texts {
            if text.trim().is_empty() {
                continue;
            }
            analyzed += 1;
            compound_sum += self.compound_score(text);

            let keywords = self.detect_frustration(text);
            if !keywords.is_empty() {
                frustration_count += 1;
                if evidence.len() < MAX_EVIDENCE {
                    evidence.push(format!("[{source_type}] Found keywords: {keywords:?}"));
                }
            }
        }

        SentimentSummary {
            total_analyzed: analyzed,
            average_compound: if analyzed > 0 {
                compound_sum / analyzed as f64
            } else {
                0.0
            },
            frustration_count,
            frustration_evidence: evidence,
        }
    }

    pub fn analyze_commits(&self, messages: &[String]) -> SentimentSummary {
        self.analyze(messages, "commit")
    }

    pub fn analyze_issues(&self, texts: &[String]) -> SentimentSummary {
        self.analyze(texts, "issue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let analyzer = SentimentAnalyzer::new();
        let summary = analyzer.analyze(&[], "commit");
        assert_eq!(summary.total_analyzed, 0);
        assert_eq!(summary.average_compound, 0.0);
        assert!(!summary.frustration_detected());
    }

    #[test]
    fn test_frustration_keywords_detected() {
        let analyzer = SentimentAnalyzer::new();
        let texts = vec![
            "I am burned out and stepping down from this project".to_string(),
            "fix typo in readme".to_string(),
        ];
        let summary = analyzer.analyze(&texts, "commit");
        assert_eq!(summary.frustration_count, 1);
        assert!(summary.frustration_detected());
        assert_eq!(summary.frustration_evidence.len(), 1);
        assert!(summary.frustration_evidence[0].contains("burned out"));
    }

    #[test]
    fn test_no_false_positive_on_normal_messages() {
        let analyzer = SentimentAnalyzer::new();
        let texts = vec![
            "add support for streaming output".to_string(),
            "bump dependency versions".to_string(),
        ];
        let summary = analyzer.analyze(&texts, "commit");
        assert!(!summary.frustration_detected());
    }

    #[test]
    fn test_compound_polarity() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.compound_score("thanks, this works great, awesome fix") > 0.0);
        assert!(analyzer.compound_score("broken again, terrible regression, awful") < 0.0);
        assert_eq!(analyzer.compound_score(""), 0.0);
    }

    #[test]
    fn test_merge_weights_by_text_count() {
        let analyzer = SentimentAnalyzer::new();
        let commits: Vec<String> = (0..3)
            .map(|i| format!("commit {i}: thanks, works great"))
            .collect();
        let issues = vec!["this is broken and terrible".to_string()];

        let commit_summary = analyzer.analyze_commits(&commits);
        let issue_summary = analyzer.analyze_issues(&issues);
        let expected = (commit_summary.average_compound * 3.0
            + issue_summary.average_compound)
            / 4.0;

        let merged = commit_summary.merge(issue_summary);
        assert_eq!(merged.total_analyzed, 4);
        assert!((merged.average_compound - expected).abs() < 1e-9);
    }

    #[test]
    fn test_merge_caps_evidence_and_sums_counts() {
        let analyzer = SentimentAnalyzer::new();
        let many: Vec<String> = (0..8)
            .map(|i| format!("message {i}: this is unpaid work"))
            .collect();
        let commit_summary = analyzer.analyze_commits(&many);
        let issue_summary = analyzer.analyze_issues(&many);

        let merged = commit_summary.merge(issue_summary);
        assert_eq!(merged.frustration_count, 16);
        assert_eq!(merged.frustration_evidence.len(), 10);
        assert!(merged.frustration_evidence[0].starts_with("[commit]"));
        assert!(merged.frustration_evidence[9].starts_with("[issue]"));
    }

    #[test]
    fn test_merge_with_empty_side_is_identity() {
        let analyzer = SentimentAnalyzer::new();
        let commits = vec!["fix crash in parser".to_string()];
        let alone = analyzer.analyze_commits(&commits);
        let merged = analyzer
            .analyze_commits(&commits)
            .merge(analyzer.analyze_issues(&[]));
        assert_eq!(merged.total_analyzed, alone.total_analyzed);
        assert_eq!(merged.average_compound, alone.average_compound);
    }

    #[test]
    fn test_evidence_capped_at_ten() {
        let analyzer = SentimentAnalyzer::new();
        let texts: Vec<String> = (0..20)
            .map(|i| format!("message {i}: this is unpaid work"))
            .collect();
        let summary = analyzer.analyze(&texts, "issue");
        assert_eq!(summary.frustration_count, 20);
        assert_eq!(summary.frustration_evidence.len(), 10);
    }
}
