//! # Error Classifier
//!
//! Turns a failed API request into a single, display-ready message.
//!
//! Failures are captured once at the transport boundary as a [`Failure`]
//! (response / no response / setup) and then classified by a pure function.
//! Classification never fails: unexpected shapes fall through to a generic
//! message from the active [`Messages`] table.
//!
//! ```
//! use error_classifier::{Failure, classify};
//!
//! let failure = Failure::response(422, br#"{"email": ["required"], "phone": ["invalid"]}"#);
//! assert_eq!(classify(&failure), "required. invalid");
//! assert_eq!(classify(&Failure::NoResponse), "no connection to server");
//! ```

mod classify;
mod failure;
mod messages;

pub use classify::{classify, classify_with};
pub use failure::Failure;
pub use messages::Messages;
