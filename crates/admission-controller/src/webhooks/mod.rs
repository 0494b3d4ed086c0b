mod config;
mod mutating;
mod validating;

pub use config::*;
pub use mutating::*;
pub use validating::*;

#[derive(Debug, Default, strum::Display)]
pub enum SideEffects {
    #[default]
    None,
    NoneOnDryRun,
}
