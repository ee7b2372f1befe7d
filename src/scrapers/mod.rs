//! Page handlers for the crawled site.
//!
//! The crawl is a fan-out tree of three stages, each a pure function from a
//! fetched page to either follow-up requests or a record:
//!
//! | Stage | Function | Produces |
//! |-------|----------|----------|
//! | Homepage | [`telegraph::resolve_homepage`] | one listing request |
//! | Listing | [`telegraph::extract_listing`] | one article request per headline |
//! | Article | [`telegraph::extract_article`] | one [`ArticleRecord`](crate::models::ArticleRecord) |
//!
//! The CSS paths each stage relies on live in [`telegraph::SiteLayout`].

pub mod telegraph;
