//! Core assembly pipeline for Bindery.
//!
//! Walks a package spine, tags each fragment with its structural role and
//! matter zone, and hands the sequence to one of the output serializers
//! (`assembler::markup` for the print PDF, `assembler::latex` for XeLaTeX
//! sources).

pub mod assembler;
pub mod assets;
pub mod classify;
pub mod pipeline;
pub mod report;
pub mod tools;
pub mod zone;
