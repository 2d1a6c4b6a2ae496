//! # kbprep
//!
//! Corpus and candidate-index preparation for entity linking.
//!
//! - **Index**: alias → ranked entity candidates, entity titles, pruning
//! - **Tagging**: greedy longest-match alias tagging over POS-gated windows
//! - **Filtering**: two-stage corpus filter with a rebuild in between
//! - **Statistics**: alias/entity counts, discard reasons, recall totals
//!
//! ## Quick Start
//!
//! ```rust
//! use kbprep::{AliasSet, MentionTagger};
//!
//! let aliases = AliasSet::new(["New York", "York"]);
//! let tagger = MentionTagger::default();
//! let mentions = tagger.tag_sentence("I live in New York city", &aliases);
//! assert_eq!(mentions.len(), 1);
//! assert_eq!(mentions[0].alias, "new york");
//! ```
//!
//! ## Filter Pipeline
//!
//! ```rust,ignore
//! use kbprep::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_toml_file("filter.toml".as_ref())?;
//! let report = Pipeline::new(config)?.run()?;
//! println!("{} mentions kept", report.recall.total_preserved);
//! ```
//!
//! Stage 1 filters raw documents per sentence and records every alias it
//! keeps. The raw index is then pruned to those aliases and capped. Stage 2
//! drops mentions the pruned index cannot support and accumulates
//! statistics. Both stages fan out over files and merge single-threaded.

#![warn(missing_docs)]

pub mod config;
mod error;
pub mod filter;
pub mod index;
pub mod lang;
pub mod normalize;
pub mod parallel;
pub mod pipeline;
pub mod rebuild;
pub mod record;
pub mod resolve;
pub mod stats;
pub mod tagger;

#[cfg(feature = "cli")]
pub mod cli;

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use kbprep::prelude::*;
    //!
    //! let index = CandidateIndex::default();
    //! assert!(!index.contains_alias(&normalize("Acme")));
    //! ```
    pub use crate::config::PipelineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::index::{Candidate, CandidateIndex};
    pub use crate::normalize::normalize;
    pub use crate::pipeline::{Pipeline, PipelineReport};
    pub use crate::record::{Mention, SentenceRecord, Span};
    pub use crate::stats::Merge;
    pub use crate::tagger::{AliasVocabulary, MentionTagger, TaggedMention};
}

// Re-exports
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use filter::{PredicateName, SentenceFilter, SentencePredicate, Stage1Filter, Stage2Filter};
pub use index::{Candidate, CandidateIndex};
pub use lang::{HeuristicTagger, LanguageResources, PosTagger};
pub use normalize::normalize;
pub use parallel::ParallelExecutor;
pub use pipeline::{Pipeline, PipelineReport};
pub use rebuild::{IndexRebuilder, RebuildReport};
pub use record::{Mention, SentenceRecord, Span};
pub use resolve::{EntityIdResolver, Resolution, ResolutionStrategy};
pub use stats::{
    AliasObservationSet, DiscardTally, Merge, RecallStats, StatisticsAccumulator,
};
pub use tagger::{AliasSet, AliasVocabulary, MentionTagger, TaggedMention};
