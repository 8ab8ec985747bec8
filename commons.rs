//! Small cross-cutting helpers shared by the middle end.

use std::ops::Deref;

/// Marks a value that has passed structural validation.
///
/// A `Program` is only ever handed to the analysis pipeline after
/// `Program::validate` has returned `Ok`, so downstream code can assume
/// operand shapes without re-checking them at every call site.
#[derive(Clone, Debug)]
pub struct Valid<T>(pub T);

impl<T> Deref for Valid<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Valid<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}
