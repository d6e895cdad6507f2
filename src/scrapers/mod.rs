//! Product page scraping: browser sessions, field extraction, normalization.

pub mod assets;
pub mod browser;
pub mod extract;
pub mod normalize;
pub mod session;

pub use assets::{HttpAssetFetcher, USER_AGENT};
pub use browser::{BrowserSession, BrowserSessionProvider, BrowserSettings};
pub use extract::{extract, extract_price, extract_rendered, ExtractedProduct, ExtractionRules};
pub use normalize::{normalize_price, normalize_rating, MissingPrice};
pub use session::{AssetFetcher, PageSession, SessionProvider};
