//! # Integration Tests
//!
//! End-to-end tests across the workspace crates.
//!
//! Covers:
//! - backup then restore round trips through real codecs and files
//! - backpressure and end-of-stream propagation between stages
//! - build-time failures (selectors, lookup, parameter coercion)
//! - run-time failure isolation, panics and deadlines

#[cfg(test)]
mod support;

#[cfg(test)]
mod round_trip;

#[cfg(test)]
mod streaming;

#[cfg(test)]
mod build_errors;

#[cfg(test)]
mod failures;
