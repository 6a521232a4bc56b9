/*!
 * Story content model.
 *
 * - `model`: blocks, pages and language variants
 * - `store`: the canonical per-language tree and its structural mutations
 */

pub mod model;
pub mod store;

pub use self::model::{Block, BlockKind, ImageMediaType, ImagePayload, ImageTimings, LanguageVariant, Page};
pub use self::store::{BlockOrigin, ContentStore, PageReplacement, StoryDocument};
