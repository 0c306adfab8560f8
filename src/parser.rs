//! Best-effort extraction from model review output.
//!
//! The remote model is asked for a markdown shape but never guaranteed to
//! produce it, so everything here returns `Option` and callers treat a miss
//! as "no score" or "no improved code", never as a failure.

use regex::Regex;
use std::sync::OnceLock;

fn score_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)quality\s+score[^0-9]{0,20}(\d{1,3})")
            .unwrap_or_else(|_| unreachable!("score pattern is valid"))
    })
}

fn improved_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)#+[^\n]*improved\s+code[^\n]*\n+```[a-zA-Z]*\n(.*?)```")
            .unwrap_or_else(|_| unreachable!("improved-code pattern is valid"))
    })
}

/// Pull a 0..=100 quality score out of the analysis markdown.
#[must_use]
pub fn extract_quality_score(analysis: &str) -> Option<i32> {
    let captures = score_re().captures(analysis)?;
    let score: i32 = captures.get(1)?.as_str().parse().ok()?;

    (0..=100).contains(&score).then_some(score)
}

/// Pull the fenced code block under an "Improved Code" heading, if present.
#[must_use]
pub fn extract_improved_code(analysis: &str) -> Option<String> {
    let captures = improved_code_re().captures(analysis)?;
    let code = captures.get(1)?.as_str().trim();

    (!code.is_empty()).then(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_score_from_heading() {
        let analysis = "## Bugs\n- none\n\n## Quality Score: 85\nSolid overall.";
        assert_eq!(extract_quality_score(analysis), Some(85));
    }

    #[test]
    fn test_extracts_score_with_noise_between() {
        let analysis = "### Quality Score — **72**/100";
        assert_eq!(extract_quality_score(analysis), Some(72));
    }

    #[test]
    fn test_out_of_range_score_is_dropped() {
        assert_eq!(extract_quality_score("Quality Score: 250"), None);
    }

    #[test]
    fn test_missing_score_section() {
        assert_eq!(extract_quality_score("## Bugs\n- off-by-one"), None);
        assert_eq!(extract_quality_score(""), None);
    }

    #[test]
    fn test_extracts_improved_code_block() {
        let analysis = concat!(
            "## Improved Code\n\n",
            "```python\n",
            "def add(a: int, b: int) -> int:\n    return a + b\n",
            "```\n"
        );

        let code = extract_improved_code(analysis).expect("block should parse");
        assert!(code.starts_with("def add"));
        assert!(!code.contains("```"));
    }

    #[test]
    fn test_improved_code_requires_fence() {
        let analysis = "## Improved Code\nJust prose, no fenced block.";
        assert_eq!(extract_improved_code(analysis), None);
    }

    #[test]
    fn test_empty_fenced_block_is_dropped() {
        let analysis = "## Improved Code\n```python\n\n```";
        assert_eq!(extract_improved_code(analysis), None);
    }

    #[test]
    fn test_unrelated_code_block_is_ignored() {
        let analysis = "## Bugs\n```python\nbroken()\n```";
        assert_eq!(extract_improved_code(analysis), None);
    }
}
