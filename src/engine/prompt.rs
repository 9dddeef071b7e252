//! Prompt assembly for grounded reasoning.
//!
//! The system directive pins the verdict taxonomy, the reply schema and the
//! refusal rule; the user prompt carries the claim and the numbered
//! evidence. Snippets are quoted verbatim — summarizing them here would let
//! the prompt drift from what the citations actually say.

use super::types::EvidenceItem;

/// Maximum characters of each evidence text quoted into the prompt.
pub const SNIPPET_LEN: usize = 500;

/// Builds the fixed system directive, parameterized only by the language
/// the explanation must be written in.
pub fn system_directive(language: &str) -> String {
    format!(
        r#"You are a fact-checking assistant. Verify the CLAIM using ONLY the numbered EVIDENCE items provided.

Rules:
1. Use only the EVIDENCE below. Do not use outside knowledge.
2. If the evidence is insufficient or does not address the claim, the verdict is "unverified".
3. Write the explanation in the language with ISO 639-1 code "{language}", in 2-3 sentences.
4. Cite evidence by the numbers shown in square brackets.
5. If evidence items contradict each other, reflect that in contradiction_score.

Reply with a single JSON object and nothing else:
{{
  "verdict": "true" | "false" | "misleading" | "unverified",
  "confidence": <number between 0.0 and 1.0>,
  "contradiction_score": <number between 0.0 and 1.0>,
  "explanation": "<2-3 sentence explanation>",
  "cited_evidence_indices": [<numbers of the evidence items you relied on>]
}}"#
    )
}

/// Renders the claim and the ranked evidence list.
pub fn build_prompt(claim: &str, evidence: &[EvidenceItem]) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("CLAIM TO VERIFY:\n");
    out.push_str(claim);
    out.push_str("\n\nEVIDENCE:\n");

    for (i, item) in evidence.iter().enumerate() {
        let published = item
            .published_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let snippet = truncate_chars(&item.text, SNIPPET_LEN);

        out.push_str(&format!(
            "[{}] ({}, {}, {}): {}\n",
            i + 1,
            item.kind,
            item.source,
            published,
            snippet
        ));
    }

    out.push_str("\nAnalyze the CLAIM against the EVIDENCE and reply with the JSON object described in the system instructions.");
    out
}

/// Instruction appended to the conversation when the first reply failed to
/// parse.
pub fn repair_prompt(claim: &str, previous_reply: &str) -> String {
    format!(
        "Your previous reply could not be parsed as JSON.\n\nPrevious reply:\n{previous_reply}\n\nRe-answer for the claim below. Respond with ONLY the JSON object, no prose, no code fences.\n\nCLAIM: {claim}"
    )
}

/// Character-based truncation (the budget is measured in characters, and
/// byte slicing could split a code point).
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
