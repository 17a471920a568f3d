//! Auxiliary command modules: a thin layer over the core. Only `json` is
//! carried as the concrete worked example for the printf format-table
//! mechanism; ELF inspection and the rest of the category stay out of scope.

pub(crate) mod json;
