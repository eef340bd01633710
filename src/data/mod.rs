//! Static data: the built-in symbol environment and the default
//! spoken-English rule table.

pub mod mathspeak;
pub mod symbols;
