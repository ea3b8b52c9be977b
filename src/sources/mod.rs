//! Remote sprite sources other than the fusion site.
//!
//! - `digimon`: bulk HTTP download of raw Digimon artwork
//! - `showdown`: `wget` mirror of the Showdown sprite directories

pub mod digimon;
pub mod showdown;
