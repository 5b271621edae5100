//! Model creation from selector names.

use super::{LanguageModel, UnigramModel};
use crate::eval::config::ProbeConfig;
use crate::{Error, Result};

/// Selectors accepted by [`create_model`].
pub const AVAILABLE_MODELS: &[&str] = &["unigram"];

/// Create the model named by `selector`.
///
/// # Supported Models
///
/// - `unigram` / `UnigramModel` - frequency prior, needs `vocab_counts`
pub fn create_model(selector: &str, config: &ProbeConfig) -> Result<Box<dyn LanguageModel>> {
    match selector.to_lowercase().as_str() {
        "unigram" | "unigrammodel" => {
            let path = config.vocab_counts.as_ref().ok_or_else(|| {
                Error::config("the unigram model needs a counts file (--vocab-counts)")
            })?;
            Ok(Box::new(UnigramModel::load(path)?))
        }
        other => Err(Error::config(format!(
            "unknown language model {:?} (available: {})",
            other,
            AVAILABLE_MODELS.join(", ")
        ))),
    }
}
