mod startup;
mod state;

pub(crate) use startup::start;
pub use state::AppState;
#[cfg(test)]
pub(crate) use state::state_from_toml;
