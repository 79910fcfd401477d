//! Readiness-gated scroll scrubbing for a single page media element.
//!
//! A blocking overlay holds the page until media metadata is known and the
//! media transport swap has settled (or a fail-safe deadline passes). After
//! that, scroll progress through a pinned region drives the media playback
//! position directly.
//!
//! The core is host-agnostic: everything it needs from a document, media
//! element, scroll engine or network comes in through [`host::Host`], and the
//! host reports back through the [`events::EventQueue`].

pub mod config;
pub mod ease;
pub mod error;
pub mod events;
pub mod gate;
pub mod host;
pub mod intro;
pub mod overlay;
pub mod page;
pub mod runtime;
pub mod sim;
pub mod swap;
pub mod timeline;
pub mod unlock;

pub use config::ScrubConfig;
pub use page::ScrubPage;
