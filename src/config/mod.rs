//! Configuration module

mod site;

pub use site::ExternalLinkConfig;
pub use site::FeedConfig;
pub use site::FeedContent;
pub use site::HighlightConfig;
pub use site::IndexGeneratorConfig;
pub use site::SiteConfig;
