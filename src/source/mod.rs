// src/source/mod.rs
//! Literature source boundaries: PubMed and the bioRxiv/medRxiv preprint API.
//!
//! Each fetcher keeps parsing separate from HTTP (fixture-testable, the
//! network layer stays thin). The PubMed search is the one upstream call
//! whose total failure aborts a run; preprint fetches degrade to empty
//! lists.

pub mod pubmed;
pub mod rxiv;

/// Number of author names shown before truncating with "et al.".
pub const MAX_AUTHORS_DISPLAY: usize = 5;
