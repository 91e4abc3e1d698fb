mod article;
mod content;
mod site;

pub use article::{Article, NewArticle};
pub use content::{DraftOutcome, DraftRequest, GeneratedContent, ManualDraft};
pub use site::{MediaInventory, MediaItem, Site, SiteProfile};
