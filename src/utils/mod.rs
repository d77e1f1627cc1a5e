//! Small cross-cutting helpers that don't belong to a single domain module.

pub mod youtube;
