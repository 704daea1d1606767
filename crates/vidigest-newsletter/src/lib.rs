//! Weekly digest: compile unsent summaries, render, and send.

pub mod digest;
pub mod error;
pub mod mailer;
pub mod render;

pub use digest::{compile_digest, DIGEST_WINDOW_DAYS};
pub use error::{NewsletterError, NewsletterResult};
pub use mailer::{Mailer, SesMailer, SmtpMailer};
pub use render::{render_digest, RenderedDigest};
