//! Citation normalization for grounded responses.
//!
//! The gateway hands over grounding chunks exactly as the service sent them:
//! possibly empty, possibly missing URIs or titles, possibly repeating the
//! same source several times in one response. Normalization turns that into
//! the list the citation rail shows, and the session replaces its citation
//! set with this list on every resolved turn. There is no cross-turn
//! deduplication; each response stands alone.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::gateway::GroundingChunk;

/// A presentable source reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Source URI, present exactly when the citation is verified.
    pub uri: Option<String>,
    /// Display title; falls back to the URI when the source had none.
    pub title: String,
    /// True when the service resolved a URI for this source.
    pub verified: bool,
}

/// Normalize raw grounding chunks into the presentable citation list.
///
/// Output preserves source order. Chunks sharing a URI are merged into the
/// first occurrence; a later duplicate can still contribute a title the
/// first occurrence lacked. Chunks with neither URI nor title have nothing
/// to show and are dropped.
#[must_use]
pub fn normalize_citations(chunks: &[GroundingChunk]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();
    let mut by_uri: HashMap<String, usize> = HashMap::new();

    for chunk in chunks {
        let uri = chunk.uri.as_deref().map(str::trim).filter(|u| !u.is_empty());
        let title = chunk
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match uri {
            Some(uri) => {
                if let Some(&idx) = by_uri.get(uri) {
                    // Duplicate source. The first occurrence wins, but a
                    // missing title (URI fallback) can be backfilled.
                    if citations[idx].title == uri
                        && let Some(title) = title
                    {
                        citations[idx].title = title.to_owned();
                    }
                    continue;
                }
                by_uri.insert(uri.to_owned(), citations.len());
                citations.push(Citation {
                    uri: Some(uri.to_owned()),
                    title: title.unwrap_or(uri).to_owned(),
                    verified: true,
                });
            }
            None => {
                let Some(title) = title else {
                    continue;
                };
                citations.push(Citation {
                    uri: None,
                    title: title.to_owned(),
                    verified: false,
                });
            }
        }
    }

    citations
}

/// Citations with resolvable sources, the rail's default view.
#[must_use]
pub fn verified_only(citations: &[Citation]) -> Vec<Citation> {
    citations.iter().filter(|c| c.verified).cloned().collect()
}
