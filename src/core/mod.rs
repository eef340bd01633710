//! Core pipeline: expression model and parser, options and context,
//! normalization, and the translation engine.

pub mod context;
pub mod model;
pub mod normalize;
pub mod options;
pub mod speak;
