//! Maintenance tools for a research group's BibTeX bibliography.
//!
//! `bibkeeper` keeps a single BibTeX file and a directory of member profiles
//! in shape for a static website. Every task is a small, self-contained
//! operation over those files.
//!
//! # Key Features
//!
//! - **Importing**:
//!   - PubMed records per member, by ORCID with a name fallback
//!   - Books and chapters from Crossref, filtered by author name
//!   - PhD theses entered by hand
//!
//! - **Upkeep**:
//!   - Citation counts refreshed from Crossref
//!   - Entries sharing a PMID removed
//!   - Publications excluded by PMID, with an audit record
//!   - The member list of the exclusion CI workflow kept in sync
//!
//! - **Publishing**:
//!   - Vancouver-style citations
//!   - The JSON indexes the website templates read
//!
//! # Basic Usage
//!
//! ```rust
//! use bibkeeper::bibtex::{parse_entry, split_entries};
//! use bibkeeper::vancouver::format_vancouver;
//! use std::collections::HashMap;
//!
//! let bib = r#"@article{Tolboom24,
//!   author = {Tolboom, Robert C.},
//!   title = {Title of the article},
//!   journal = {Journal Name},
//!   year = {2024},
//! }
//! "#;
//!
//! let raw = &split_entries(bib)[0];
//! let entry = parse_entry(raw.text, &HashMap::new()).unwrap();
//! assert_eq!(
//!     format_vancouver(&entry),
//!     "Tolboom RC. Title of the article. Journal Name. 2024."
//! );
//! ```
//!
//! # Duplicate Cleanup
//!
//! ```rust
//! use bibkeeper::dedupe::remove_duplicates;
//!
//! let bib = "@article{A20,\n  pmid = {1},\n}\n\n@article{B20,\n  pmid = {1},\n}\n";
//! let outcome = remove_duplicates(bib);
//! assert_eq!(outcome.removed, 1);
//! ```
//!
//! # Error Handling
//!
//! The library uses a custom [`Result`] type that wraps [`Error`] for
//! consistent error handling across all operations:
//!
//! ```rust
//! use bibkeeper::Error;
//! use bibkeeper::members::find_member;
//!
//! match find_member(std::path::Path::new("/nonexistent"), "jan-smit") {
//!     Ok(member) => println!("Found {}", member.name),
//!     Err(Error::MemberNotFound { slug, .. }) => eprintln!("No profile for {slug}"),
//!     Err(e) => eprintln!("Other error: {e}"),
//! }
//! ```
//!
//! # Network Access
//!
//! The PubMed and Crossref clients are blocking and spaced by a fixed rate
//! limit. The importers and the citation updater take their backend through
//! a trait ([`pubmed::PubMedSource`], [`crossref::WorkSource`],
//! [`citations::CitationSource`]), so they run against any implementation.

pub mod author;
pub mod bibtex;
pub mod citations;
pub mod config;
pub mod crossref;
pub mod dedupe;
mod error;
pub mod exclude;
pub mod index;
pub mod members;
pub mod pubmed;
pub mod rate_limit;
mod regex;
pub mod thesis;
pub mod vancouver;
pub mod workflow;

// Reexports
pub use config::Config;
pub use error::{Error, Result};
