//! Pipeline scenario tests. Collaborators are fakes injected through the
//! traits: an export-backed record store, the hashing embedder, the
//! in-memory index and a scripted generator.

mod fakes;
