//! Scripted skills reachable through command prefixes.

pub mod catalog;
pub mod web_search;
pub mod youtube;
