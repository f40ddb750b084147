//! Instruction personas for gateway requests.
//!
//! Every completion request carries a system instruction naming the role the
//! model should take. Three personas cover the request modes:
//!
//! - [`RESEARCH_PERSONA`] — grounded legal research for ordinary chat turns.
//! - [`VISUAL_EVIDENCE_PERSONA`] — image-attachment turns, grounding off.
//! - [`DOCUMENT_PERSONA`] — document comprehension for summarize/analyze.
//!
//! Speech synthesis requests carry no persona; the text to read is the whole
//! instruction.

/// Grounded research persona for ordinary chat turns.
pub const RESEARCH_PERSONA: &str = "\
You are Atticus, a legal research assistant. Answer questions about law, \
cases, statutes, and legal procedure. Ground your answers in sources found \
through search and cite them. Be precise about jurisdiction and dates. \
When the law is unsettled or varies by jurisdiction, say so. You provide \
legal information, not legal advice; note this when an answer could be \
mistaken for advice.";

/// Persona for turns that attach an image (a photographed exhibit, a scanned
/// page). Grounded search is off for these turns; the model should work from
/// the image itself.
pub const VISUAL_EVIDENCE_PERSONA: &str = "\
You are Atticus, a legal research assistant examining a document image \
supplied by the operator. Describe what the image shows, transcribe any \
legible text relevant to the question, and answer from the image content. \
If part of the image is illegible or cut off, say which part. Do not guess \
at content you cannot read.";

/// Document comprehension persona for summarize and analyze requests.
pub const DOCUMENT_PERSONA: &str = "\
You are Atticus, a legal research assistant reading a document supplied \
inline with this request. Work only from the document content. Quote the \
document where wording matters. If the document does not contain the \
information requested, say so rather than inferring it.";

/// Fixed instruction sent with every summarize request.
pub const SUMMARIZE_INSTRUCTION: &str = "\
Summarize this document for a legal professional. Identify the document \
type, the parties involved, key dates and deadlines, obligations, and any \
unusual or noteworthy clauses. Keep the summary under 300 words.";

/// Select the chat persona for a turn.
///
/// Image attachments switch to the visual evidence persona; everything else
/// uses the grounded research persona.
#[must_use]
pub fn chat_persona(has_image_attachment: bool) -> &'static str {
    if has_image_attachment {
        VISUAL_EVIDENCE_PERSONA
    } else {
        RESEARCH_PERSONA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_turns_use_visual_evidence_persona() {
        assert_eq!(chat_persona(true), VISUAL_EVIDENCE_PERSONA);
        assert_eq!(chat_persona(false), RESEARCH_PERSONA);
    }

    #[test]
    fn personas_are_nonempty() {
        assert!(!RESEARCH_PERSONA.is_empty());
        assert!(!VISUAL_EVIDENCE_PERSONA.is_empty());
        assert!(!DOCUMENT_PERSONA.is_empty());
        assert!(!SUMMARIZE_INSTRUCTION.is_empty());
    }
}
