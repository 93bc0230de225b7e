//! Query normalization: modality hints, meta-language, synonyms, HyDE.

pub mod meta;
pub mod modality;
pub mod normalizer;
pub mod synonyms;
pub mod terms;

pub use meta::strip_meta_language;
pub use modality::{MODALITY_RULES, ModalityDetection, ModalityRule, detect_modalities};
pub use normalizer::{NormalizedQuery, QueryNormalizer};
pub use synonyms::expand;
pub use terms::QueryTerms;
