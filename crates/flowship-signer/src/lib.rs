//! Flowship Signer
//!
//! Computes the `Authorization` header for S3-compatible HTTP requests when
//! no native object-store client is used (the "signed webhook" transport).
//!
//! The signature binds the request method, content type, timestamp and
//! resource path:
//!
//! ```text
//! METHOD\n\nCONTENT-TYPE\nDATE\n/bucket/key
//! ```
//!
//! keyed with HMAC-SHA1 over the shared secret and base64-encoded. Because the
//! timestamp is part of the signature, a [`SignedRequest`] is only valid for
//! one request and only within the endpoint's clock-skew tolerance. Time is
//! read through a [`Clock`] so tests can pin it.

mod clock;
mod signer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use signer::{
  DEFAULT_CONTENT_TYPE, RequestSigner, SignError, SignedRequest, canonical_string, format_date,
  sign,
};
