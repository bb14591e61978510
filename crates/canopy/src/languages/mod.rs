//! Builtin grammars.
//!
//! Each grammar is a module exposing `register`, which adds its language
//! (and any helper languages) to a [`Registry`](crate::Registry) along with
//! its aliases. [`BuiltinProvider`](crate::BuiltinProvider) calls these on
//! first use.

#[cfg(feature = "lang-css")]
pub mod css;
#[cfg(feature = "lang-diff")]
pub mod diff;
#[cfg(feature = "lang-html")]
pub mod html;
#[cfg(feature = "lang-javascript")]
pub mod javascript;
#[cfg(feature = "lang-json")]
pub mod json;
#[cfg(feature = "lang-markdown")]
pub mod markdown;
#[cfg(feature = "lang-plain")]
pub mod plain;
#[cfg(feature = "lang-xml")]
pub mod xml;
