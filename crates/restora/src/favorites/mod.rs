//! Favorites: user-marked jobs kept viewable through the blob cache.

pub mod index;
pub mod record;
pub mod resolve;
pub mod url;

pub use index::{FavoritesIndex, ToggleOutcome, FAVORITES_KEY};
pub use record::FavoriteRecord;
pub use resolve::{resolve_favorites, ResolvedFavorite};
pub use url::normalize_url;
