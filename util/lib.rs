/*!
This crate contains small utilities shared by the other crates in the workspace: random identifiers, a wrapper for finite floats that can be sorted and hashed, and an atomic progress counter.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod finite;
pub mod id;
pub mod progress_counter;
