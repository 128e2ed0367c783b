//! Cross-module tests: end-to-end scenarios and scanner/overlay properties

mod properties;
mod scenarios;
