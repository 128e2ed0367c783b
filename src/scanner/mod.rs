pub mod rules;
pub mod matcher;
pub mod overlay;
pub mod interaction;
pub mod placement;
pub mod validation;
pub mod edit;
pub mod surface;
pub mod wasm;

pub use rules::*;
pub use matcher::*;
pub use overlay::*;
pub use interaction::*;
pub use placement::*;
pub use validation::*;
pub use edit::*;
pub use surface::*;
pub use wasm::*;

#[cfg(test)]
mod tests;
