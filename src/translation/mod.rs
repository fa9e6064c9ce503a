/*!
 * Fragment translation for dataset episodes.
 *
 * This module covers everything between a closed episode and its
 * translated form. It is split into several submodules:
 *
 * - `collector`: Distinct fragment texts of an episode and their positions
 * - `batch`: One transformer call per episode, length-checked
 * - `reassembly`: Writing results back, re-escaped per field role
 * - `transformer`: The `TextTransformer` seam and the identity transformer
 * - `core`: LLM-backed transformer over a `Provider`
 * - `markers`: Numbered-marker batch protocol used by `core`
 */

// Re-export main types for easier usage
pub use self::batch::BatchInvoker;
pub use self::collector::{CandidateSlots, CollectedEpisode, FragmentCollector, FragmentMap, Position};
pub use self::core::{TranslationOptions, TranslationService, transformer_from_config};
pub use self::reassembly::Reassembler;
pub use self::transformer::{PassthroughTransformer, TextTransformer};

// Submodules
pub mod batch;
pub mod collector;
pub mod core;
pub mod markers;
pub mod reassembly;
pub mod transformer;
