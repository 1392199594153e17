//! Utility functions for common operations.
//!
//! - **URL validation**: shape checks for configured feed URLs
//! - **Text processing**: sanitising remote text and fitting it to a terminal
//!
//! # Examples
//!
//! ```
//! use gdacs_feed::util::{one_line, truncate_to_width, validate_feed_url};
//!
//! let url = validate_feed_url("https://www.gdacs.org/xml/rss.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! let title = one_line("Green alert\nfor drought");
//! assert_eq!(truncate_to_width(&title, 14), "Green alert...");
//! ```

mod text;
mod url_validator;

pub use text::{display_width, one_line, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_feed_url, UrlValidationError};
